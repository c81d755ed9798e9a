// [apps/orchestrator/src/services/completion.rs]
/*!
 * =================================================================
 * APARATO: COMPLETION & PREEMPTION SERVICE (V26.0 - TERMINAL GUARD)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DETECCIÓN DE ESTADOS TERMINALES E INTERRUPCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. ORDERED VERDICT: La decisión de completitud sigue un orden
 *    estricto: terminal → todo-crackeado → chunks vivos → fallo →
 *    unanimidad de capas → frontera de reglas → frontera de keyspace.
 * 2. DRIFT REPAIR: Al completar, el keyspace efectivo se reconcilia
 *    con la suma de keyspace real de los chunks certificados,
 *    reparando tanto sub como sobre-estimación.
 * 3. COOPERATIVE PREEMPTION: Las tareas interrumpidas transitan por
 *    'stopping' y conservan su agente hasta el acuse; el sistema no
 *    asume cesación inmediata.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::Result;
use hashforge_domain_models::job::{JobExecution, JobStatus};
use hashforge_domain_models::messages::{AgentDirective, JobStopPayload};
use hashforge_domain_models::task::{JobTask, TaskStatus};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Causa registrada en los trabajos interrumpidos por prioridad.
const INTERRUPTION_REASON: &str = "interrupted by higher priority job";

pub struct CompletionService {
    application_state: AppState,
}

impl CompletionService {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Evalúa la completitud de un trabajo en el orden soberano.
     * Idempotente: sobre un trabajo terminal es un no-op.
     *
     * # Returns:
     * true sii esta invocación selló la completitud.
     */
    #[instrument(skip(self), fields(job = %job_id))]
    pub async fn evaluate_job_completion(&self, job_id: &Uuid) -> Result<bool> {
        let state = &self.application_state;

        // 1. ESTADO TERMINAL: ABSORBENTE
        let job = match state.job_repository.try_fetch_job(job_id).await? {
            Some(job) => job,
            None => return Ok(false),
        };
        if job.status.is_terminal() {
            return Ok(false);
        }

        // 2. COMPLETITUD ANTICIPADA: TODO EL HASHLIST CRACKEADO
        let hashlist = state.hashlist_repository.fetch_hashlist(&job.hashlist_id).await?;
        if job.overall_progress_percent >= 100.0 && hashlist.is_fully_cracked() {
            info!("🏁 [EARLY_COMPLETE]: Hashlist {} fully cracked. Sealing job {}.", hashlist.id, job_id);
            let reconciled = if job.processed_keyspace > 0 {
                job.processed_keyspace
            } else {
                job.effective_keyspace
            };
            self.finalize_completion(&job, reconciled).await?;
            return Ok(true);
        }

        // 3. CHUNKS VIVOS: AÚN NO
        let incomplete_count = state.task_repository.count_incomplete(job_id).await?;
        if incomplete_count > 0 {
            return Ok(false);
        }

        // 4. PRIMER FALLO PERMANENTE: EL TRABAJO MUERE
        if state.task_repository.has_failed_task(job_id).await? {
            let failed = state
                .job_repository
                .mark_failed(job_id, "chunk exhausted its retry budget")
                .await?;
            if failed {
                state.notifier.notify_job_failed(
                    job_id,
                    job.created_by.as_deref(),
                    "chunk exhausted its retry budget",
                );
                self.release_job_resources(&job).await;
            }
            return Ok(false);
        }

        let job_tasks = state.task_repository.fetch_tasks_for_job(job_id).await?;

        // 5. MODO INCREMENTO: UNANIMIDAD DE CAPAS
        if job.attack.is_incremental() {
            let layers = state.job_repository.fetch_increment_layers(job_id).await?;
            let all_layers_completed = !layers.is_empty()
                && layers.iter().all(|layer| layer.status == JobStatus::Completed);
            if !all_layers_completed {
                return Ok(false);
            }
            let reconciled = reconcile_effective_keyspace(&job, &job_tasks);
            self.finalize_completion(&job, reconciled).await?;
            return Ok(true);
        }

        // 6. FRAGMENTACIÓN POR REGLAS: FRONTERA DE REGLAS
        if job.uses_rule_splitting {
            let max_rule_end = job_tasks
                .iter()
                .filter_map(|task| task.rule_end_index)
                .max()
                .unwrap_or(0);
            if max_rule_end < job.rule_split_count as u64 {
                return Ok(false);
            }
            let reconciled = reconcile_effective_keyspace(&job, &job_tasks);
            self.finalize_completion(&job, reconciled).await?;
            return Ok(true);
        }

        // 7. FRONTERA DE KEYSPACE
        if job_tasks.is_empty() || job.dispatched_keyspace < job.effective_keyspace {
            return Ok(false);
        }
        let reconciled = reconcile_effective_keyspace(&job, &job_tasks);
        self.finalize_completion(&job, reconciled).await?;
        Ok(true)
    }

    /// Sella la completitud, notifica y libera recursos.
    async fn finalize_completion(&self, job: &JobExecution, reconciled: u64) -> Result<()> {
        let state = &self.application_state;

        let sealed = state.job_repository.mark_completed(&job.id, reconciled).await?;
        if !sealed {
            // Carrera benigna: otro tick selló primero.
            return Ok(());
        }

        // Capas restantes a completado (consistencia del padre).
        if job.attack.is_incremental() {
            for layer in state.job_repository.fetch_increment_layers(&job.id).await? {
                if layer.status != JobStatus::Completed {
                    state
                        .job_repository
                        .update_layer_progress(
                            &layer.id,
                            layer.effective_keyspace,
                            layer.effective_keyspace,
                            100.0,
                            JobStatus::Completed,
                        )
                        .await?;
                }
            }
        }

        state
            .notifier
            .notify_job_completed(&job.id, job.created_by.as_deref());
        self.release_job_resources(job).await;
        Ok(())
    }

    /// Limpieza de recursos: chunks de reglas y ocupaciones huérfanas.
    async fn release_job_resources(&self, job: &JobExecution) {
        let state = &self.application_state;

        state.rule_split_manager.cleanup_job(&job.id);

        match state.agent_repository.fetch_busy_agents().await {
            Ok(busy_agents) => {
                for busy_agent in busy_agents {
                    if busy_agent.engagement.current_job_id == Some(job.id) {
                        if let Err(release_fault) =
                            state.agent_repository.clear_busy(&busy_agent.id).await
                        {
                            warn!(
                                "⚠️ [RELEASE_FAULT]: Agent {} engagement not cleared: {}",
                                busy_agent.id, release_fault
                            );
                        }
                    }
                }
            }
            Err(scan_fault) => {
                warn!("⚠️ [RELEASE_FAULT]: Busy agent scan failed: {}", scan_fault);
            }
        }
    }

    /**
     * Protocolo de interrupción: sólo se invoca cuando ningún agente
     * está disponible. Identifica el trabajo pendiente de mayor
     * prioridad con override habilitado y detiene las tareas justas.
     *
     * # Returns:
     * Cantidad de tareas a las que se envió la orden de detención.
     */
    #[instrument(skip(self))]
    pub async fn evaluate_preemption(&self) -> Result<usize> {
        let state = &self.application_state;

        if !state.settings.job_interruption_enabled {
            return Ok(0);
        }

        // 1. ASPIRANTE: pendiente, override habilitado, prioridad máxima.
        let schedulable_jobs = state.job_repository.fetch_schedulable_jobs().await?;
        let aspirant = schedulable_jobs
            .iter()
            .filter(|job| {
                job.status == JobStatus::Pending && job.allow_high_priority_override
            })
            .max_by_key(|job| job.priority);

        let aspirant = match aspirant {
            Some(job) => job,
            None => return Ok(0),
        };

        // 2. SATURACIÓN: si ya está en su tope de agentes, no-op.
        let live_tasks = state.task_repository.fetch_live_tasks().await?;
        let aspirant_active = live_tasks
            .iter()
            .filter(|task| task.job_execution_id == aspirant.id && task.status.holds_agent())
            .count() as u32;

        let needed = if aspirant.max_agents == 0 {
            usize::MAX
        } else if aspirant_active >= aspirant.max_agents {
            return Ok(0);
        } else {
            (aspirant.max_agents - aspirant_active) as usize
        };

        // 3. VÍCTIMAS: prioridad inferior, más nuevas primero dentro de
        //    la prioridad más antigua.
        let interruptible = state
            .task_repository
            .fetch_interruptible_tasks(aspirant.priority)
            .await?;

        let victims: Vec<&JobTask> = interruptible.iter().take(needed).collect();
        if victims.is_empty() {
            return Ok(0);
        }

        let mut interrupted_jobs: HashSet<Uuid> = HashSet::new();
        let mut stop_count = 0usize;

        for victim in victims {
            state
                .task_repository
                .set_status(&victim.id, TaskStatus::Stopping)
                .await?;

            if let Some(agent_id) = &victim.agent_id {
                let stop_directive = AgentDirective::JobStop(JobStopPayload {
                    task_id: victim.id,
                    reason: format!("preempted by job {}", aspirant.id),
                });
                if let Err(uplink_fault) = state.agent_uplink.dispatch(agent_id, stop_directive) {
                    // No fatal: el agente recogerá la orden por sondeo.
                    debug!("📵 [PREEMPT_SEND]: {}", uplink_fault);
                }
            }

            interrupted_jobs.insert(victim.job_execution_id);
            stop_count += 1;
        }

        for interrupted_job_id in interrupted_jobs {
            state
                .job_repository
                .mark_interrupted(&interrupted_job_id, INTERRUPTION_REASON)
                .await?;
            state.notifier.notify_job_interrupted(&interrupted_job_id);
        }

        info!(
            "⚔️ [PREEMPTION]: {} tasks stopping in favor of job {} (priority {}).",
            stop_count, aspirant.id, aspirant.priority
        );
        Ok(stop_count)
    }
}

/**
 * Reconciliación de deriva: el keyspace efectivo definitivo es la suma
 * del keyspace real certificado por los chunks completados; ante la
 * ausencia de certificaciones, la suma de los rangos planificados.
 */
fn reconcile_effective_keyspace(job: &JobExecution, job_tasks: &[JobTask]) -> u64 {
    let mut certified_total: u64 = 0;
    let mut planned_total: u64 = 0;
    let mut any_certified = false;

    for task in job_tasks.iter().filter(|task| task.status == TaskStatus::Completed) {
        planned_total = planned_total.saturating_add(task.planned_effective_span());
        if task.is_actual_keyspace && task.chunk_actual_keyspace > 0 {
            any_certified = true;
            certified_total = certified_total.saturating_add(task.chunk_actual_keyspace);
        } else {
            certified_total = certified_total.saturating_add(task.planned_effective_span());
        }
    }

    if any_certified && certified_total > 0 {
        certified_total
    } else if planned_total > 0 {
        planned_total
    } else {
        job.effective_keyspace
    }
}
