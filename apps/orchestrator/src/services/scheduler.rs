// [apps/orchestrator/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULING CYCLE ENGINE (V35.0 - MATRIX CYCLE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ORQUESTACIÓN DEL CICLO COMPLETO DE ASIGNACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE CYCLE: Un Mutex asíncrono garantiza que sólo un ciclo
 *    corra a la vez; la espera de benchmarks bloquea el ciclo vigente
 *    y ningún otro arranca mientras tanto.
 * 2. MATRIX ALLOCATION: La asignación es un único ciclo bipartito por
 *    tick (no existe bucle por-agente): keyspace → capas → benchmarks
 *    → matriz → conteos → reservas → despacho.
 * 3. IDEMPOTENT TICK: Un ciclo sin cambios de inventario no produce
 *    cambios de estado.
 *
 * # Mathematical Proof (Cycle Ordering):
 * La promoción de keyspace exacto ocurre dentro de la espera de
 * benchmarks; las candidatas se construyen DESPUÉS, de modo que un
 * trabajo promovido en este ciclo es asignable en este mismo ciclo.
 * =================================================================
 */

use crate::services::benchmark_coordinator::{BenchmarkCoordinator, BenchmarkTarget};
use crate::services::completion::CompletionService;
use crate::services::task_assigner::TaskAssigner;
use crate::state::AppState;
use anyhow::Result;
use chrono::{Timelike, Utc};
use hashforge_core_keyspace::AttackMaterialization;
use hashforge_domain_models::agent::Agent;
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{
    IncrementMode, JobExecution, JobIncrementLayer, JobStatus,
};
use hashforge_domain_scheduling::{
    allocate, reserve, AgentCapability, AllocationCandidate, CompatibilityMatrix, SlotKey,
    SlotRequirement, VersionPattern,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Cadencia nominal del ciclo de planificación.
const CYCLE_INTERVAL_SECONDS: u64 = 1;

/// Veredicto telemétrico de un ciclo.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub schedulable_jobs: usize,
    pub available_agents: usize,
    pub reservations: usize,
    pub planned_tasks: usize,
    pub preempted_tasks: usize,
}

pub struct SchedulerService {
    application_state: AppState,
}

impl SchedulerService {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Ignición del daemon de planificación perpetua.
    pub async fn spawn_scheduler_daemon(application_state: AppState) {
        let mut cycle_ticker = interval(Duration::from_secs(CYCLE_INTERVAL_SECONDS));
        cycle_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            info!("🗓️ [SCHEDULER_ACTIVE]: Matrix allocation cycle daemon initiated.");
            let scheduler_engine = SchedulerService::new(application_state);

            loop {
                cycle_ticker.tick().await;
                if let Err(cycle_fault) = scheduler_engine.run_cycle().await {
                    warn!("⚠️ [CYCLE_FAULT]: Scheduling cycle degraded: {:#}", cycle_fault);
                }
            }
        });
    }

    /**
     * Ejecuta un ciclo completo bajo el cerrojo de exclusividad.
     */
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let state = &self.application_state;
        let _cycle_guard = state.scheduling_cycle_lock.lock().await;

        let mut report = CycleReport::default();

        // --- FASE 1: INVENTARIO Y KEYSPACE ---
        let jobs = state.job_repository.fetch_schedulable_jobs().await?;
        report.schedulable_jobs = jobs.len();

        let mut hashlist_cache: HashMap<String, Hashlist> = HashMap::new();
        for job in &jobs {
            self.ensure_job_keyspace(job, &mut hashlist_cache).await?;
            self.ensure_increment_layers(job, &mut hashlist_cache).await?;
        }

        // --- FASE 2: FLOTA DISPONIBLE ---
        let available_agents = self.collect_available_agents().await?;
        report.available_agents = available_agents.len();

        if available_agents.is_empty() {
            // Sin agentes libres: única puerta del protocolo de
            // interrupción por prioridad.
            let completion_engine = CompletionService::new(state.clone());
            report.preempted_tasks = completion_engine.evaluate_preemption().await?;
            return Ok(report);
        }

        // --- FASE 3: GARANTÍA DE CALIBRACIONES (ESPERA ACOTADA) ---
        let benchmark_targets = self
            .collect_benchmark_targets(&jobs, &mut hashlist_cache)
            .await?;

        let requirement_index: HashMap<SlotKey, VersionPattern> = benchmark_targets
            .iter()
            .map(|target| {
                let pattern = jobs
                    .iter()
                    .find(|job| job.id == target.slot.job_id)
                    .and_then(|job| job.binary_version_pattern.parse().ok())
                    .unwrap_or(VersionPattern::Default);
                (target.slot.clone(), pattern)
            })
            .collect();

        let benchmark_matrix = CompatibilityMatrix::build(
            &agent_capabilities(&available_agents),
            &requirement_index
                .iter()
                .map(|(slot, pattern)| SlotRequirement {
                    slot: slot.clone(),
                    version_pattern: pattern.clone(),
                })
                .collect::<Vec<_>>(),
        );

        let coordinator = BenchmarkCoordinator::new(state.clone());
        let preferred_agents = coordinator
            .ensure_benchmarks(&benchmark_targets, &available_agents, &benchmark_matrix)
            .await?;

        // --- FASE 4: CANDIDATAS (POST-PROMOCIÓN) ---
        let refreshed_jobs = state.job_repository.fetch_schedulable_jobs().await?;
        let candidates = self.build_allocation_candidates(&refreshed_jobs).await?;

        if candidates.is_empty() {
            return Ok(report);
        }

        // --- FASE 5: MATRIZ, CONTEOS Y RESERVAS ---
        let slot_requirements: Vec<SlotRequirement> = candidates
            .iter()
            .map(|candidate| {
                let pattern = refreshed_jobs
                    .iter()
                    .find(|job| job.id == candidate.parent_job_id)
                    .and_then(|job| job.binary_version_pattern.parse().ok())
                    .unwrap_or(VersionPattern::Default);
                SlotRequirement { slot: candidate.slot.clone(), version_pattern: pattern }
            })
            .collect();

        let allocation_matrix =
            CompatibilityMatrix::build(&agent_capabilities(&available_agents), &slot_requirements);

        let available_agent_ids: Vec<String> =
            available_agents.iter().map(|agent| agent.id.clone()).collect();

        let allocation_plan = allocate(
            &candidates,
            &allocation_matrix,
            available_agent_ids.len(),
            state.settings.agent_overflow_allocation_mode,
        );

        let reservations = reserve(
            &allocation_plan,
            &candidates,
            &allocation_matrix,
            &available_agent_ids,
            &preferred_agents,
        );
        report.reservations = reservations.len();

        // --- FASE 6: PLANIFICACIÓN SERIAL + DESPACHO PARALELO ---
        let assigner = TaskAssigner::new(state.clone());
        let assignment_outcome = assigner.dispatch_reservations(&reservations).await?;
        report.planned_tasks = assignment_outcome.planned_tasks;

        if report.planned_tasks > 0 {
            debug!(
                "🗓️ [CYCLE]: {} jobs, {} agents, {} reservations, {} chunks planned.",
                report.schedulable_jobs,
                report.available_agents,
                report.reservations,
                report.planned_tasks
            );
        }

        Ok(report)
    }

    /// Garantiza el veredicto de keyspace de un trabajo recién llegado.
    async fn ensure_job_keyspace(
        &self,
        job: &JobExecution,
        hashlist_cache: &mut HashMap<String, Hashlist>,
    ) -> Result<()> {
        let state = &self.application_state;

        if job.base_keyspace > 0 || job.status != JobStatus::Pending {
            return Ok(());
        }

        let hashlist = self.fetch_hashlist_cached(&job.hashlist_id, hashlist_cache).await?;
        let salt_count = if hashlist.is_salted { Some(hashlist.salt_count()) } else { None };

        let materialization = self.materialize_attack(job, None).await;

        match state.keyspace_calculator.calculate(&materialization, salt_count).await {
            Ok(keyspace_report) => {
                state
                    .job_repository
                    .record_keyspace(
                        &job.id,
                        keyspace_report.base_keyspace,
                        keyspace_report.effective_keyspace,
                        keyspace_report.multiplication_factor,
                        keyspace_report.is_accurate,
                    )
                    .await?;
                info!(
                    "🧮 [KEYSPACE]: Job {} base={} effective={} accurate={}.",
                    job.id,
                    keyspace_report.base_keyspace,
                    keyspace_report.effective_keyspace,
                    keyspace_report.is_accurate
                );
            }
            Err(keyspace_fault) => {
                // Fatal por trabajo: configuración inválida, binario
                // irresoluble o colapso de la sonda base.
                let failure_reason = format!("keyspace calculation failed: {}", keyspace_fault);
                let failed = state.job_repository.mark_failed(&job.id, &failure_reason).await?;
                if failed {
                    state.notifier.notify_job_failed(
                        &job.id,
                        job.created_by.as_deref(),
                        &failure_reason,
                    );
                }
            }
        }
        Ok(())
    }

    /// Expande un trabajo en modo incremento en sus capas por longitud
    /// de máscara, calculando el keyspace de cada una.
    async fn ensure_increment_layers(
        &self,
        job: &JobExecution,
        hashlist_cache: &mut HashMap<String, Hashlist>,
    ) -> Result<()> {
        let state = &self.application_state;

        if !job.attack.is_incremental() || job.status.is_terminal() {
            return Ok(());
        }
        if !state.job_repository.fetch_increment_layers(&job.id).await?.is_empty() {
            return Ok(());
        }

        let full_mask = match &job.attack.mask {
            Some(mask) => mask.clone(),
            None => {
                warn!("🛑 [LAYER_FAULT]: Increment job {} lacks a mask.", job.id);
                return Ok(());
            }
        };

        let mask_tokens = tokenize_mask(&full_mask);
        let minimum_length = job.attack.increment_minimum.max(1);
        let maximum_length = job.attack.increment_maximum.min(mask_tokens.len() as u32);
        if minimum_length > maximum_length {
            return Ok(());
        }

        let mut lengths: Vec<u32> = (minimum_length..=maximum_length).collect();
        if job.attack.increment_mode == IncrementMode::IncrementInverse {
            lengths.reverse();
        }

        let hashlist = self.fetch_hashlist_cached(&job.hashlist_id, hashlist_cache).await?;
        let salt_count = if hashlist.is_salted { Some(hashlist.salt_count()) } else { None };

        for (layer_index, mask_length) in lengths.iter().enumerate() {
            let layer_mask = mask_tokens[..*mask_length as usize].concat();
            let materialization = self.materialize_attack(job, Some(layer_mask.clone())).await;

            let (base, effective, is_accurate) = match state
                .keyspace_calculator
                .calculate(&materialization, salt_count)
                .await
            {
                Ok(report) => (report.base_keyspace, report.effective_keyspace, report.is_accurate),
                Err(layer_fault) => {
                    warn!(
                        "📉 [LAYER_DEGRADED]: Layer {} of job {} without keyspace: {}",
                        layer_mask, job.id, layer_fault
                    );
                    (0, 0, false)
                }
            };

            let layer = JobIncrementLayer {
                id: Uuid::new_v4(),
                job_execution_id: job.id,
                layer_index: layer_index as u32,
                mask: layer_mask,
                base_keyspace: base,
                effective_keyspace: effective,
                is_accurate_keyspace: is_accurate,
                dispatched_keyspace: 0,
                processed_keyspace: 0,
                status: JobStatus::Pending,
                overall_progress_percent: 0.0,
            };
            state.job_repository.insert_increment_layer(&layer).await?;
        }

        info!("🪜 [LAYERS]: Job {} expanded into {} increment layers.", job.id, lengths.len());
        Ok(())
    }

    /// Flota elegible del ciclo: activa, habilitada, sincronizada,
    /// dentro de ventana horaria y bajo el tope de tareas vivas.
    async fn collect_available_agents(&self) -> Result<Vec<Agent>> {
        let state = &self.application_state;

        let eligible_agents = state.agent_repository.fetch_eligible_agents().await?;
        let live_task_counts = state.task_repository.count_live_tasks_per_agent().await?;

        let current_minute_of_day =
            Utc::now().time().hour() * 60 + Utc::now().time().minute();

        let available = eligible_agents
            .into_iter()
            .filter(|agent| {
                if state.settings.agent_scheduling_enabled
                    && agent.scheduling_enabled
                    && !agent.is_inside_schedule_window(current_minute_of_day)
                {
                    return false;
                }
                let live_tasks = live_task_counts.get(&agent.id).copied().unwrap_or(0);
                live_tasks < state.settings.max_concurrent_jobs_per_agent
            })
            .collect();

        Ok(available)
    }

    /// Objetivos de calibración del ciclo: forzados (keyspace estimado
    /// sin tareas) y recargas de caché del inventario asignable.
    async fn collect_benchmark_targets(
        &self,
        jobs: &[JobExecution],
        hashlist_cache: &mut HashMap<String, Hashlist>,
    ) -> Result<Vec<BenchmarkTarget>> {
        let state = &self.application_state;
        let mut targets = Vec::new();

        for job in jobs {
            if job.status.is_terminal() || job.base_keyspace == 0 {
                continue;
            }
            let hashlist = self.fetch_hashlist_cached(&job.hashlist_id, hashlist_cache).await?;
            let salt_count = if hashlist.is_salted { Some(hashlist.salt_count()) } else { None };
            let job_task_count = state.task_repository.next_chunk_number(&job.id).await? - 1;

            if job.attack.is_incremental() {
                for layer in state.job_repository.fetch_increment_layers(&job.id).await? {
                    if layer.status.is_terminal() || layer.base_keyspace == 0 {
                        continue;
                    }
                    let layer_cursor = state
                        .task_repository
                        .dispatched_base_cursor(&job.id, Some(&layer.id))
                        .await?;
                    targets.push(BenchmarkTarget {
                        slot: SlotKey::layered(job.id, layer.id),
                        attack_mode: job.attack.attack_mode,
                        hash_type_id: job.hash_type_id,
                        salt_count,
                        layer_mask: Some(layer.mask.clone()),
                        requires_forced: !layer.is_accurate_keyspace && layer_cursor == 0,
                    });
                }
            } else {
                targets.push(BenchmarkTarget {
                    slot: SlotKey::flat(job.id),
                    attack_mode: job.attack.attack_mode,
                    hash_type_id: job.hash_type_id,
                    salt_count,
                    layer_mask: None,
                    requires_forced: !job.is_accurate_keyspace && job_task_count == 0,
                });
            }
        }
        Ok(targets)
    }

    /// Construye las candidatas de asignación con la expansión de capas
    /// y la detección de trabajo sin despachar.
    async fn build_allocation_candidates(
        &self,
        jobs: &[JobExecution],
    ) -> Result<Vec<AllocationCandidate>> {
        let state = &self.application_state;
        let mut candidates = Vec::new();

        for job in jobs {
            if job.status.is_terminal() || job.base_keyspace == 0 {
                continue;
            }

            let job_tasks = state.task_repository.fetch_tasks_for_job(&job.id).await?;
            let parent_active_agents = job_tasks
                .iter()
                .filter(|task| task.status.holds_agent() && task.agent_id.is_some())
                .count() as u32;

            if job.attack.is_incremental() {
                // Expansión por capas: sólo capas exactas con trabajo.
                for layer in state.job_repository.fetch_increment_layers(&job.id).await? {
                    if !layer.is_accurate_keyspace
                        || layer.base_keyspace == 0
                        || layer.status.is_terminal()
                    {
                        continue;
                    }
                    let layer_cursor = state
                        .task_repository
                        .dispatched_base_cursor(&job.id, Some(&layer.id))
                        .await?;
                    let has_work = layer_cursor < layer.base_keyspace;
                    if !has_work {
                        continue;
                    }
                    candidates.push(AllocationCandidate {
                        slot: SlotKey::layered(job.id, layer.id),
                        parent_job_id: job.id,
                        priority: job.priority,
                        max_agents: job.max_agents,
                        created_at: job.created_at,
                        parent_active_agents,
                        has_undispatched_work: true,
                    });
                }
                continue;
            }

            // Trabajo sin tareas: siempre tiene trabajo pendiente. Los
            // estimados sin benchmark esperan su promoción forzada.
            let has_zero_tasks = job_tasks.is_empty();
            if has_zero_tasks && !job.is_accurate_keyspace {
                continue;
            }

            let has_undispatched_work = if has_zero_tasks {
                true
            } else if job.uses_rule_splitting {
                job.dispatched_keyspace < job.effective_keyspace
            } else {
                let base_cursor = state
                    .task_repository
                    .dispatched_base_cursor(&job.id, None)
                    .await?;
                base_cursor < job.base_keyspace
            };

            if !has_undispatched_work {
                continue;
            }

            candidates.push(AllocationCandidate {
                slot: SlotKey::flat(job.id),
                parent_job_id: job.id,
                priority: job.priority,
                max_agents: job.max_agents,
                created_at: job.created_at,
                parent_active_agents,
                has_undispatched_work: true,
            });
        }

        Ok(candidates)
    }

    /// Materializa la configuración de ataque a rutas locales. La
    /// disposición del almacén de ficheros es un colaborador externo:
    /// los diccionarios registrados resuelven por el Ledger y el resto
    /// de identificadores llega ya en forma de ruta.
    async fn materialize_attack(
        &self,
        job: &JobExecution,
        mask_override: Option<String>,
    ) -> AttackMaterialization {
        let state = &self.application_state;
        let mut wordlist_paths = Vec::new();

        for wordlist_id in &job.attack.wordlist_ids {
            let resolved_path = match state.wordlist_repository.fetch_wordlist(wordlist_id).await {
                Ok(Some(wordlist)) => PathBuf::from(wordlist.file_path),
                _ => PathBuf::from(wordlist_id),
            };
            wordlist_paths.push(resolved_path);
        }

        AttackMaterialization {
            attack_mode: job.attack.attack_mode,
            wordlist_paths,
            rule_paths: job.attack.rule_ids.iter().map(PathBuf::from).collect(),
            mask: mask_override.or_else(|| job.attack.mask.clone()),
        }
    }

    async fn fetch_hashlist_cached(
        &self,
        hashlist_id: &str,
        hashlist_cache: &mut HashMap<String, Hashlist>,
    ) -> Result<Hashlist> {
        if let Some(cached) = hashlist_cache.get(hashlist_id) {
            return Ok(cached.clone());
        }
        let hashlist = self
            .application_state
            .hashlist_repository
            .fetch_hashlist(hashlist_id)
            .await?;
        hashlist_cache.insert(hashlist_id.to_string(), hashlist.clone());
        Ok(hashlist)
    }
}

/// Proyección de capacidades de la flota para la matriz bipartita.
fn agent_capabilities(agents: &[Agent]) -> Vec<AgentCapability> {
    agents
        .iter()
        .map(|agent| AgentCapability {
            agent_id: agent.id.clone(),
            version_pattern: agent
                .binary_version_pattern
                .parse()
                .unwrap_or(VersionPattern::Default),
        })
        .collect()
}

/// Descompone una máscara en tokens: pares '?x' o literales sueltos.
fn tokenize_mask(mask: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut characters = mask.chars().peekable();

    while let Some(current) = characters.next() {
        if current == '?' {
            match characters.next() {
                Some(class_char) => tokens.push(format!("?{}", class_char)),
                None => tokens.push("?".to_string()),
            }
        } else {
            tokens.push(current.to_string());
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_mask_tokenization() {
        assert_eq!(tokenize_mask("?a?a?d"), vec!["?a", "?a", "?d"]);
        assert_eq!(tokenize_mask("ab?d"), vec!["a", "b", "?d"]);
        assert_eq!(tokenize_mask(""), Vec::<String>::new());

        let tokens = tokenize_mask("?a?a?a?a?a");
        assert_eq!(tokens[..3].concat(), "?a?a?a");
    }
}
