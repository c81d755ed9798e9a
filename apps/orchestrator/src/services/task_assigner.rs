// [apps/orchestrator/src/services/task_assigner.rs]
/*!
 * =================================================================
 * APARATO: TASK ASSIGNER (V29.0 - SERIAL PLAN, PARALLEL DISPATCH)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: PLANIFICACIÓN SECUENCIAL Y DESPACHO CONCURRENTE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SERIAL CUSTODY: La fase de planificación es mono-hilo; cada
 *    chunk se cristaliza en el Ledger antes de planificar el
 *    siguiente, garantizando rangos no solapados en commit.
 * 2. PARALLEL UPLINK: El envío de asignaciones a agentes distintos
 *    corre en paralelo con fan-out acotado; el fallo de un envío es
 *    no-fatal (el agente puede sondear).
 * 3. STRATEGY GATE: La decisión de fragmentación por reglas se toma
 *    en el primer despacho post-benchmark y queda sellada de por vida.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use hashforge_core_keyspace::{plan_next_chunk, rule_split, ChunkRequest};
use hashforge_domain_models::agent::Agent;
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{AttackMode, JobExecution};
use hashforge_domain_models::messages::{
    AgentDirective, JobAssignmentPayload, SyncFilesPayload,
};
use hashforge_domain_models::task::{JobTask, TaskStatus};
use hashforge_domain_scheduling::{Reservation, VersionPattern};
use hashforge_infra_db::DbError;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::event_bus::SchedulerEvent;

/// Fan-out máximo del despacho concurrente de asignaciones.
const DISPATCH_FANOUT_LIMIT: usize = 8;

/// Resultado agregado de una pasada de asignación.
#[derive(Debug, Default)]
pub struct AssignmentOutcome {
    pub planned_tasks: usize,
    pub dispatched_messages: usize,
    pub skipped_pairs: usize,
}

/// Paquete listo para el despacho paralelo.
struct PlannedDispatch {
    agent_id: String,
    job_id: Uuid,
    task_id: Uuid,
    directive: AgentDirective,
}

pub struct TaskAssigner {
    application_state: AppState,
}

impl TaskAssigner {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Consume las reservas del ciclo: planifica en serie, despacha en
     * paralelo.
     */
    #[instrument(skip_all, fields(reservations = reservations.len()))]
    pub async fn dispatch_reservations(
        &self,
        reservations: &[Reservation],
    ) -> Result<AssignmentOutcome> {
        let mut outcome = AssignmentOutcome::default();
        let mut planned_dispatches: Vec<PlannedDispatch> = Vec::new();

        // --- FASE 1: PLANIFICACIÓN SERIAL (CUSTODIA DE RANGOS) ---
        for reservation in reservations {
            match self.plan_single_pair(reservation).await {
                Ok(Some(planned)) => {
                    outcome.planned_tasks += 1;
                    planned_dispatches.push(planned);
                }
                Ok(None) => outcome.skipped_pairs += 1,
                Err(planning_fault) => {
                    outcome.skipped_pairs += 1;
                    warn!(
                        "⚠️ [PLAN_FAULT]: Pair (job {:?}, agent {}) skipped: {}",
                        reservation.slot.job_id, reservation.agent_id, planning_fault
                    );
                }
            }
        }

        // --- FASE 2: DESPACHO PARALELO ACOTADO ---
        let state = self.application_state.clone();
        let dispatch_results: Vec<(Uuid, Uuid, String, bool)> = stream::iter(planned_dispatches)
            .map(|planned| {
                let state = state.clone();
                async move {
                    let send_outcome =
                        state.agent_uplink.dispatch(&planned.agent_id, planned.directive);
                    match send_outcome {
                        Ok(()) => (planned.job_id, planned.task_id, planned.agent_id, true),
                        Err(uplink_fault) => {
                            // No fatal: la tarea queda asignada en el
                            // Ledger y el agente la recogerá por sondeo.
                            warn!("📵 [DISPATCH_SOFT_FAIL]: {}", uplink_fault);
                            (planned.job_id, planned.task_id, planned.agent_id, false)
                        }
                    }
                }
            })
            .buffer_unordered(DISPATCH_FANOUT_LIMIT)
            .collect()
            .await;

        for (job_id, task_id, agent_id, was_sent) in dispatch_results {
            if was_sent {
                outcome.dispatched_messages += 1;
                // Primer envío exitoso de un trabajo pendiente: running.
                self.application_state.job_repository.mark_running(&job_id).await?;
                self.application_state.event_bus.emit(SchedulerEvent::TaskDispatched {
                    task_id,
                    agent_id,
                });
            }
        }

        if outcome.planned_tasks > 0 {
            info!(
                "🚀 [ASSIGNER]: {} chunks planned, {} assignment messages delivered.",
                outcome.planned_tasks, outcome.dispatched_messages
            );
        }
        Ok(outcome)
    }

    /**
     * Planifica el chunk de una pareja (reserva, agente) aplicando las
     * guardias soberanas en orden. Retorna None ante una condición
     * recuperable (la pareja se salta este ciclo).
     */
    async fn plan_single_pair(
        &self,
        reservation: &Reservation,
    ) -> Result<Option<PlannedDispatch>> {
        let state = &self.application_state;
        let slot = &reservation.slot;

        // 0. EXISTENCIA Y ESTADO DEL TRABAJO
        let job = match state.job_repository.try_fetch_job(&slot.job_id).await? {
            Some(job) if job.status.is_schedulable() => job,
            _ => return Ok(None),
        };

        // 1. PREVENCIÓN DE HASHLIST AGOTADO
        let hashlist = state.hashlist_repository.fetch_hashlist(&job.hashlist_id).await?;
        if hashlist.is_fully_cracked() {
            debug!("🏁 [ASSIGN_SKIP]: Hashlist {} fully cracked; completion path owns it.", hashlist.id);
            return Ok(None);
        }

        // 2/3. DISPONIBILIDAD REAL DEL AGENTE (FICHA FRESCA)
        let agent = state.agent_repository.fetch_agent(&reservation.agent_id).await?;
        if !self.validate_agent_availability(&agent).await? {
            return Ok(None);
        }
        // La validación pudo limpiar una ocupación fantasma (y con ello
        // avanzar la versión del registro): se relee la ficha.
        let agent = state.agent_repository.fetch_agent(&reservation.agent_id).await?;

        // 2b. PREPARACIÓN DE ARTEFACTOS: sin sincronización completada
        //     se dispara una orden de sync no bloqueante y se salta.
        if agent.sync_status != hashforge_domain_models::agent::SyncStatus::Completed {
            let sync_directive = AgentDirective::SyncFiles(SyncFilesPayload {
                required_wordlists: job.attack.wordlist_ids.clone(),
                required_rules: job.attack.rule_ids.clone(),
                required_binary: Some(job.binary_version_pattern.clone()),
                required_hashlist: Some(job.hashlist_id.clone()),
            });
            let _ = state.agent_uplink.dispatch(&agent.id, sync_directive);
            return Ok(None);
        }

        // 4. GUARDIA DE INCREMENTO: las asignaciones contra el padre
        //    sin capa concreta se descartan.
        if job.attack.is_incremental() && slot.layer_id.is_none() {
            warn!("🛑 [INCREMENT_GUARD]: Parent-level reservation for {} dropped.", job.id);
            return Ok(None);
        }

        // 5. RESOLUCIÓN DE BINARIO CONCRETO
        let binary_reference = match resolve_binary_reference(
            &agent.binary_version_pattern,
            &job.binary_version_pattern,
        ) {
            Some(reference) => reference,
            None => {
                debug!("🧩 [BINARY_SKIP]: No concrete binary for pair ({}, {}).", agent.id, job.id);
                return Ok(None);
            }
        };

        // CONTEXTO DE CAPA (SI APLICA)
        let layer = match slot.layer_id {
            Some(layer_id) => {
                let layer = state.job_repository.fetch_increment_layer(&layer_id).await?;
                if !layer.is_accurate_keyspace || layer.base_keyspace == 0 {
                    return Ok(None);
                }
                Some(layer)
            }
            None => None,
        };

        let (base_keyspace, effective_keyspace, multiplication_factor) = match &layer {
            Some(layer) => (
                layer.base_keyspace,
                layer.effective_keyspace,
                JobExecution::derive_multiplication_factor(
                    layer.base_keyspace,
                    layer.effective_keyspace,
                ),
            ),
            None => (job.base_keyspace, job.effective_keyspace, job.multiplication_factor),
        };

        if base_keyspace == 0 {
            return Ok(None);
        }

        // CALIBRACIÓN DEL AGENTE
        let salt_count = if hashlist.is_salted { Some(hashlist.salt_count()) } else { None };
        let benchmark_speed = state
            .benchmark_repository
            .fetch_benchmark(&agent.id, job.attack.attack_mode, job.hash_type_id, salt_count)
            .await?
            .map(|benchmark| benchmark.speed)
            .unwrap_or(0);

        let chunk_duration =
            job.chunk_duration_or(state.settings.default_chunk_duration_seconds);
        let fluctuation = state.settings.chunk_fluctuation_percentage;

        // 6a. DECISIÓN DE ESTRATEGIA (PRIMER DESPACHO POST-BENCHMARK)
        let next_chunk_number = state.task_repository.next_chunk_number(&job.id).await?;
        let is_first_dispatch = next_chunk_number == 1;
        let mut uses_rule_splitting = job.uses_rule_splitting;
        let mut total_rule_count = job.rule_split_count as u64;

        let rule_mode_eligible = matches!(
            job.attack.attack_mode,
            AttackMode::Straight | AttackMode::Association
        ) && !job.attack.rule_ids.is_empty()
            && layer.is_none();

        if !uses_rule_splitting
            && is_first_dispatch
            && rule_mode_eligible
            && state.settings.rule_split_enabled
            && benchmark_speed > 0
        {
            let mut counted_rules: u64 = 0;
            for rule_path in rule_artifact_paths(&job) {
                counted_rules =
                    counted_rules.saturating_add(rule_split::count_rules(&rule_path)?);
            }

            // Umbral de disparo: la tolerancia de fluctuación o el
            // múltiplo configurado de la duración, el que sea mayor.
            let trigger_seconds = (chunk_duration as f64
                * (1.0 + fluctuation as f64 / 100.0))
                .max(state.settings.rule_split_trigger_seconds(chunk_duration));
            if rule_split::should_split_rules(
                effective_keyspace,
                benchmark_speed,
                trigger_seconds,
                counted_rules,
                state.settings.rule_split_min_rules,
            ) {
                state
                    .job_repository
                    .enable_rule_splitting(&job.id, counted_rules as u32, counted_rules as f64)
                    .await?;
                uses_rule_splitting = true;
                total_rule_count = counted_rules;
                info!(
                    "✂️ [STRATEGY_SEALED]: Job {} locked into rule splitting ({} rules).",
                    job.id, counted_rules
                );
            }
        }

        // 6b/7. PLANIFICACIÓN DEL CHUNK SEGÚN LA ESTRATEGIA SELLADA
        let planned_task = if uses_rule_splitting {
            self.plan_rule_split_task(
                &job,
                &agent,
                &hashlist,
                benchmark_speed,
                chunk_duration,
                total_rule_count,
                next_chunk_number,
            )
            .await?
        } else {
            self.plan_keyspace_task(
                &job,
                &agent,
                layer.as_ref().map(|layer| layer.id),
                layer.as_ref().map(|layer| layer.mask.as_str()),
                base_keyspace,
                multiplication_factor,
                benchmark_speed,
                chunk_duration,
                fluctuation,
                next_chunk_number,
            )
            .await?
        };

        let (mut task, is_preexisting_task) = match planned_task {
            Some(plan) => plan,
            None => return Ok(None),
        };

        // 8. CRISTALIZACIÓN + COMPROMISO DEL AGENTE (FASE SERIAL)
        task.agent_id = Some(agent.id.clone());
        task.status = TaskStatus::Assigned;
        task.assigned_at = Some(Utc::now());
        if is_preexisting_task {
            // Chunk huérfano rescatado: sólo cambia su propietario.
            state.task_repository.assign_agent(&task.id, &agent.id).await?;
        } else {
            state.task_repository.insert_task(&task).await?;
        }

        match state
            .agent_repository
            .engage_busy(&agent.id, &task.id, &job.id, agent.engagement.busy_version)
            .await
        {
            Ok(_) => {}
            Err(DbError::EngagementVersionConflict) => {
                // Otro escritor ganó la carrera: el chunk regresa a la
                // cola sin agente y la pareja se salta.
                state.task_repository.reset_for_retry(&task.id).await?;
                return Ok(None);
            }
            Err(other_fault) => return Err(other_fault.into()),
        }

        // 9. SOBRE DE ASIGNACIÓN
        let mut file_references = job.attack.wordlist_ids.clone();
        file_references.extend(job.attack.rule_ids.iter().cloned());
        file_references.push(job.hashlist_id.clone());

        let directive = AgentDirective::JobAssignment(JobAssignmentPayload {
            task_id: task.id,
            attack_cmd: task.attack_cmd.clone(),
            keyspace_start: task.keyspace_start,
            keyspace_end: task.keyspace_end,
            effective_keyspace_start: task.effective_keyspace_start,
            effective_keyspace_end: task.effective_keyspace_end,
            binary_reference,
            file_references,
        });

        Ok(Some(PlannedDispatch {
            agent_id: agent.id,
            job_id: job.id,
            task_id: task.id,
            directive,
        }))
    }

    /// Guardias 3: saneamiento de ocupaciones obsoletas y respeto a
    /// las reconexiones genuinas.
    async fn validate_agent_availability(&self, agent: &Agent) -> Result<bool> {
        let state = &self.application_state;

        if !agent.engagement.busy_status {
            return Ok(true);
        }

        let referenced_task = match agent.engagement.current_task_id {
            Some(task_id) => state.task_repository.try_fetch_task(&task_id).await?,
            None => None,
        };

        match referenced_task {
            None => {
                // Rastro sin tarea: ocupación fantasma.
                state.agent_repository.clear_busy(&agent.id).await?;
                Ok(true)
            }
            Some(task) if task.agent_id.as_deref() != Some(agent.id.as_str()) => {
                // La tarea pertenece a otro agente: rastro obsoleto.
                state.agent_repository.clear_busy(&agent.id).await?;
                Ok(true)
            }
            Some(task) if !task.status.holds_agent() => {
                state.agent_repository.clear_busy(&agent.id).await?;
                Ok(true)
            }
            Some(task) if task.status == TaskStatus::ReconnectPending => {
                // Reconexión genuina: el agente no se toca este ciclo.
                debug!("🔌 [RECONNECT_HOLD]: Agent {} awaiting task {}.", agent.id, task.id);
                Ok(false)
            }
            Some(_) => Ok(false),
        }
    }

    /// Rama de fragmentación por reglas: reasignación de huérfanos o
    /// materialización del siguiente subconjunto.
    #[allow(clippy::too_many_arguments)]
    async fn plan_rule_split_task(
        &self,
        job: &JobExecution,
        agent: &Agent,
        hashlist: &Hashlist,
        benchmark_speed: u64,
        chunk_duration: u64,
        total_rule_count: u64,
        next_chunk_number: u32,
    ) -> Result<Option<(JobTask, bool)>> {
        let state = &self.application_state;

        // Primero: rescatar un chunk huérfano existente.
        if let Some(orphan_task) =
            state.task_repository.fetch_reassignable_rule_task(&job.id).await?
        {
            if let Some(chunk_path) = &orphan_task.rule_chunk_path {
                state
                    .rule_split_manager
                    .register_reference(std::path::Path::new(chunk_path));
            }
            debug!("♻️ [RULE_REASSIGN]: Orphan chunk {} rescued for agent {}.", orphan_task.id, agent.id);
            return Ok(Some((orphan_task, true)));
        }

        let salt_count = if hashlist.is_salted { Some(hashlist.salt_count()) } else { None };
        let rule_cursor = state.task_repository.dispatched_rule_cursor(&job.id).await?;

        let (rule_start, rule_count) = match rule_split::plan_rule_chunk(
            benchmark_speed.max(1),
            chunk_duration,
            job.base_keyspace,
            salt_count,
            total_rule_count,
            rule_cursor,
            state.settings.chunk_fluctuation_percentage,
            state.settings.rule_split_max_chunks,
        ) {
            Ok(plan) => plan,
            Err(hashforge_core_keyspace::KeyspaceError::NoRemainingKeyspace) => {
                return Ok(None);
            }
            Err(planning_fault) => return Err(planning_fault.into()),
        };

        let source_rule_path = rule_artifact_paths(job)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("rule splitting job without rule artifacts"))?;

        let rule_chunk = state.rule_split_manager.create_chunk(
            &job.id,
            &source_rule_path,
            rule_start,
            rule_count,
        )?;

        let attack_cmd = build_attack_command(
            job,
            None,
            RuleArgument::ChunkFile(&rule_chunk.chunk_file_path),
            None,
        );

        // Cada regla del subconjunto recorre el diccionario completo.
        let per_rule_cost = job.base_keyspace.saturating_mul(salt_count.unwrap_or(1).max(1));
        let effective_start = rule_chunk.rule_start_index.saturating_mul(per_rule_cost);
        let effective_end = rule_chunk.rule_end_index.saturating_mul(per_rule_cost);

        Ok(Some((
            forge_task_skeleton(
                job,
                None,
                attack_cmd,
                0,
                job.base_keyspace,
                effective_start,
                effective_end,
                TaskShape::RuleSplit {
                    rule_start: rule_chunk.rule_start_index,
                    rule_end: rule_chunk.rule_end_index,
                    chunk_path: rule_chunk.chunk_file_path.display().to_string(),
                },
                chunk_duration,
                benchmark_speed,
                next_chunk_number,
            ),
            false,
        )))
    }

    /// Rama por defecto: fragmentación de keyspace con skip/limit.
    #[allow(clippy::too_many_arguments)]
    async fn plan_keyspace_task(
        &self,
        job: &JobExecution,
        _agent: &Agent,
        layer_id: Option<Uuid>,
        layer_mask: Option<&str>,
        base_keyspace: u64,
        multiplication_factor: u64,
        benchmark_speed: u64,
        chunk_duration: u64,
        fluctuation: u64,
        next_chunk_number: u32,
    ) -> Result<Option<(JobTask, bool)>> {
        let state = &self.application_state;

        let dispatched_cursor = state
            .task_repository
            .dispatched_base_cursor(&job.id, layer_id.as_ref())
            .await?;

        let chunk_plan = match plan_next_chunk(&ChunkRequest {
            benchmark_speed,
            chunk_duration_seconds: chunk_duration,
            multiplication_factor,
            base_keyspace,
            dispatched_cursor,
            fluctuation_percentage: fluctuation,
        }) {
            Ok(plan) => plan,
            Err(hashforge_core_keyspace::KeyspaceError::NoRemainingKeyspace) => {
                return Ok(None);
            }
            Err(planning_fault) => return Err(planning_fault.into()),
        };

        let is_partial_span =
            chunk_plan.keyspace_start > 0 || chunk_plan.keyspace_end < base_keyspace;
        let skip_limit = if is_partial_span {
            Some((chunk_plan.keyspace_start, chunk_plan.base_span()))
        } else {
            None
        };

        let attack_cmd = build_attack_command(
            job,
            layer_mask,
            RuleArgument::Files(&job.attack.rule_ids),
            skip_limit,
        );

        Ok(Some((
            forge_task_skeleton(
                job,
                layer_id,
                attack_cmd,
                chunk_plan.keyspace_start,
                chunk_plan.keyspace_end,
                chunk_plan.effective_keyspace_start,
                chunk_plan.effective_keyspace_end,
                TaskShape::KeyspaceSplit { is_partial: is_partial_span },
                chunk_duration,
                benchmark_speed,
                next_chunk_number,
            ),
            false,
        )))
    }
}

/// Forma del chunk planificado.
enum TaskShape {
    KeyspaceSplit { is_partial: bool },
    RuleSplit { rule_start: u64, rule_end: u64, chunk_path: String },
}

/// Esqueleto común de un chunk recién planificado.
#[allow(clippy::too_many_arguments)]
fn forge_task_skeleton(
    job: &JobExecution,
    layer_id: Option<Uuid>,
    attack_cmd: String,
    keyspace_start: u64,
    keyspace_end: u64,
    effective_start: u64,
    effective_end: u64,
    shape: TaskShape,
    chunk_duration: u64,
    benchmark_speed: u64,
    chunk_number: u32,
) -> JobTask {
    let now = Utc::now();
    let (is_keyspace_split, is_rule_split_task, rule_start_index, rule_end_index, rule_chunk_path) =
        match shape {
            TaskShape::KeyspaceSplit { is_partial } => (is_partial, false, None, None, None),
            TaskShape::RuleSplit { rule_start, rule_end, chunk_path } => {
                (false, true, Some(rule_start), Some(rule_end), Some(chunk_path))
            }
        };

    JobTask {
        id: Uuid::new_v4(),
        job_execution_id: job.id,
        increment_layer_id: layer_id,
        agent_id: None,
        status: TaskStatus::Pending,
        priority: job.priority,
        attack_cmd,
        keyspace_start,
        keyspace_end,
        keyspace_processed: 0,
        effective_keyspace_start: effective_start,
        effective_keyspace_end: effective_end,
        effective_keyspace_processed: 0,
        is_keyspace_split,
        is_rule_split_task,
        rule_start_index,
        rule_end_index,
        rule_chunk_path,
        chunk_number,
        chunk_duration,
        benchmark_speed,
        retry_count: 0,
        last_checkpoint: None,
        chunk_actual_keyspace: 0,
        is_actual_keyspace: false,
        created_at: now,
        assigned_at: None,
        updated_at: now,
    }
}

/// Argumento de reglas del comando de ataque.
enum RuleArgument<'rule_stratum> {
    Files(&'rule_stratum [String]),
    ChunkFile(&'rule_stratum std::path::Path),
}

/**
 * Serializa el comando de ataque tal como lo ejecutará el agente.
 * Las referencias de fichero son identificadores del almacén externo;
 * el agente las resuelve a rutas locales tras la sincronización.
 */
fn build_attack_command(
    job: &JobExecution,
    layer_mask: Option<&str>,
    rules: RuleArgument<'_>,
    skip_limit: Option<(u64, u64)>,
) -> String {
    let mut command_fragments: Vec<String> = vec![
        format!("-a {}", job.attack.attack_mode.binary_mode_flag()),
        format!("-m {}", job.hash_type_id),
        job.hashlist_id.clone(),
    ];

    let mask = layer_mask
        .map(str::to_string)
        .or_else(|| job.attack.mask.clone());

    match job.attack.attack_mode {
        AttackMode::Straight | AttackMode::Association => {
            if let Some(wordlist) = job.attack.wordlist_ids.first() {
                command_fragments.push(wordlist.clone());
            }
        }
        AttackMode::Combination => {
            for wordlist in job.attack.wordlist_ids.iter().take(2) {
                command_fragments.push(wordlist.clone());
            }
        }
        AttackMode::BruteForce => {
            if let Some(mask) = &mask {
                command_fragments.push(mask.clone());
            }
        }
        AttackMode::HybridWordlistMask => {
            if let Some(wordlist) = job.attack.wordlist_ids.first() {
                command_fragments.push(wordlist.clone());
            }
            if let Some(mask) = &mask {
                command_fragments.push(mask.clone());
            }
        }
        AttackMode::HybridMaskWordlist => {
            if let Some(mask) = &mask {
                command_fragments.push(mask.clone());
            }
            if let Some(wordlist) = job.attack.wordlist_ids.first() {
                command_fragments.push(wordlist.clone());
            }
        }
    }

    match rules {
        RuleArgument::Files(rule_files) => {
            for rule_file in rule_files {
                command_fragments.push(format!("-r {}", rule_file));
            }
        }
        RuleArgument::ChunkFile(chunk_path) => {
            command_fragments.push(format!("-r {}", chunk_path.display()));
        }
    }

    if let Some((skip, limit)) = skip_limit {
        command_fragments.push(format!("--skip {} --limit {}", skip, limit));
    }

    command_fragments.join(" ")
}

/**
 * Resolución de binario concreto: la intersección de patrones colapsa
 * al lado más específico. Retorna None ante patrones incompatibles o
 * malformados.
 */
fn resolve_binary_reference(agent_pattern: &str, job_pattern: &str) -> Option<String> {
    let agent_version: VersionPattern = agent_pattern.parse().ok()?;
    let job_version: VersionPattern = job_pattern.parse().ok()?;

    if !agent_version.is_compatible_with(&job_version) {
        return None;
    }

    let specificity = |pattern: &VersionPattern| match pattern {
        VersionPattern::Default => 0,
        VersionPattern::Major(_) => 1,
        VersionPattern::MajorMinor(_, _) => 2,
        VersionPattern::Exact { suffix: None, .. } => 3,
        VersionPattern::Exact { suffix: Some(_), .. } => 4,
    };

    let concrete = if specificity(&agent_version) >= specificity(&job_version) {
        agent_version
    } else {
        job_version
    };

    Some(format!("cracker-{}", concrete))
}

/// Proyección de los artefactos de reglas del trabajo a rutas locales.
/// La disposición del almacén de ficheros es un colaborador externo;
/// los identificadores llegan ya resueltos a rutas.
fn rule_artifact_paths(job: &JobExecution) -> Vec<PathBuf> {
    job.attack.rule_ids.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashforge_domain_models::job::{AttackConfiguration, IncrementMode, JobStatus};

    fn forge_job(mode: AttackMode) -> JobExecution {
        JobExecution {
            id: Uuid::new_v4(),
            hashlist_id: "hashes-ntlm".to_string(),
            hash_type_id: 1000,
            attack: AttackConfiguration {
                attack_mode: mode,
                wordlist_ids: vec!["rockyou.txt".to_string()],
                rule_ids: vec!["best64.rule".to_string()],
                mask: Some("?a?a?a?a".to_string()),
                increment_mode: IncrementMode::Off,
                increment_minimum: 0,
                increment_maximum: 0,
            },
            binary_version_pattern: "default".to_string(),
            priority: 100,
            max_agents: 0,
            chunk_size_seconds: 0,
            status: JobStatus::Pending,
            base_keyspace: 1_000_000,
            effective_keyspace: 77_000_000,
            multiplication_factor: 77,
            is_accurate_keyspace: true,
            uses_rule_splitting: false,
            rule_split_count: 0,
            avg_rule_multiplier: 0.0,
            processed_keyspace: 0,
            dispatched_keyspace: 0,
            overall_progress_percent: 0.0,
            consecutive_failures: 0,
            error_message: None,
            allow_high_priority_override: false,
            is_system_preset: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            created_by: None,
        }
    }

    #[test]
    fn certify_attack_command_shapes() {
        let job = forge_job(AttackMode::Straight);
        let command = build_attack_command(
            &job,
            None,
            RuleArgument::Files(&job.attack.rule_ids),
            Some((600_000, 400_000)),
        );
        assert!(command.starts_with("-a 0 -m 1000 hashes-ntlm rockyou.txt"));
        assert!(command.contains("-r best64.rule"));
        assert!(command.ends_with("--skip 600000 --limit 400000"));

        let hybrid_job = forge_job(AttackMode::HybridMaskWordlist);
        let command = build_attack_command(&hybrid_job, None, RuleArgument::Files(&[]), None);
        let mask_index = command.find("?a?a?a?a").unwrap();
        let wordlist_index = command.find("rockyou.txt").unwrap();
        assert!(mask_index < wordlist_index, "mode 7 places the mask first");
    }

    #[test]
    fn certify_binary_resolution_specificity() {
        assert_eq!(
            resolve_binary_reference("7.x", "7.1.2").as_deref(),
            Some("cracker-7.1.2")
        );
        assert_eq!(
            resolve_binary_reference("7.1.2-NTLMv3", "7.1.2").as_deref(),
            Some("cracker-7.1.2-NTLMv3")
        );
        assert_eq!(
            resolve_binary_reference("default", "default").as_deref(),
            Some("cracker-default")
        );
        assert!(resolve_binary_reference("6.x", "7.1.2").is_none());
        assert!(resolve_binary_reference("garbage", "7.1.2").is_none());
    }
}
