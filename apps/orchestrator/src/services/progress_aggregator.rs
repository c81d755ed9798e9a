// [apps/orchestrator/src/services/progress_aggregator.rs]
/*!
 * =================================================================
 * APARATO: PROGRESS AGGREGATOR (V23.0 - TRYLOCK DISCIPLINE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: RECOMPUTACIÓN PERIÓDICA DE PROGRESO Y COMPLETITUD
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRYLOCK DISCIPLINE: Si el tick anterior sigue corriendo, éste se
 *    salta; jamás se encola.
 * 2. ABSOLUTE DETECTION: Los chunks completados almacenan conteos
 *    relativos mientras que los activos pueden reportar puntos de
 *    restauración absolutos; la heurística 'valor ≥ inicio ⇒ absoluto,
 *    restar' reconcilia ambos mundos.
 * 3. GRACE WINDOW: Los trabajos completados en los últimos 15 s se
 *    recomputan para absorber reportes tardíos de chunks.
 * 4. FEEDBACK LOOP: Tras la ráfaga de escritura, los trabajos cuyos
 *    chunks quedaron todos terminales re-evalúan su completitud,
 *    rescatando trabajos atascados por contadores obsoletos.
 * =================================================================
 */

use crate::services::completion::CompletionService;
use crate::state::AppState;
use anyhow::Result;
use hashforge_domain_models::job::{JobExecution, JobIncrementLayer, JobStatus};
use hashforge_domain_models::task::{JobTask, TaskStatus};
use hashforge_infra_db::repositories::job::JobProgressUpdate;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Cadencia del tick de agregación.
const AGGREGATION_INTERVAL_SECONDS: u64 = 2;

/// Ventana de gracia para reportes tardíos de chunks.
const COMPLETED_GRACE_WINDOW_SECONDS: i64 = 15;

pub struct ProgressAggregator {
    application_state: AppState,
}

impl ProgressAggregator {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Ignición del daemon de agregación con disciplina try-lock.
    pub async fn spawn_aggregator_daemon(application_state: AppState) {
        let mut aggregation_ticker = interval(Duration::from_secs(AGGREGATION_INTERVAL_SECONDS));
        aggregation_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            info!("📊 [AGGREGATOR_ACTIVE]: Progress recomputation daemon initiated.");
            let aggregation_engine = ProgressAggregator::new(application_state.clone());

            loop {
                aggregation_ticker.tick().await;

                // TryLock: un tick en curso descarta al siguiente.
                let tick_guard = match application_state.aggregation_lock.try_lock() {
                    Ok(guard) => guard,
                    Err(_) => {
                        debug!("⏭️ [AGGREGATOR]: Previous tick still running; skipping.");
                        continue;
                    }
                };

                if let Err(tick_fault) = aggregation_engine.run_aggregation_tick().await {
                    warn!("⚠️ [AGGREGATOR_FAULT]: Tick degraded: {:#}", tick_fault);
                }
                drop(tick_guard);
            }
        });
    }

    /**
     * Un tick completo: recomputar, escribir sólo cambios en una
     * transacción, y re-evaluar completitud de los trabajos saldados.
     */
    #[instrument(skip(self))]
    pub async fn run_aggregation_tick(&self) -> Result<usize> {
        let state = &self.application_state;

        let aggregation_targets = state
            .job_repository
            .fetch_jobs_for_aggregation(COMPLETED_GRACE_WINDOW_SECONDS)
            .await?;

        let mut progress_batch: Vec<JobProgressUpdate> = Vec::new();
        let mut settled_jobs: Vec<uuid::Uuid> = Vec::new();

        for job in &aggregation_targets {
            let job_tasks = state.task_repository.fetch_tasks_for_job(&job.id).await?;
            if job_tasks.is_empty() {
                continue;
            }

            let (processed, dispatched) = if job.attack.is_incremental() {
                self.aggregate_increment_job(job, &job_tasks).await?
            } else {
                aggregate_task_set(&job_tasks, job.multiplication_factor)
            };

            let percent = clamp_progress_percent(processed, job.effective_keyspace, &job.id);

            let has_changed = processed != job.processed_keyspace
                || dispatched != job.dispatched_keyspace
                || (percent - job.overall_progress_percent).abs() > f64::EPSILON;

            if has_changed && !job.status.is_terminal() {
                progress_batch.push(JobProgressUpdate {
                    job_id: job.id,
                    processed_keyspace: processed,
                    dispatched_keyspace: dispatched,
                    overall_progress_percent: percent,
                });
            }

            let all_tasks_settled =
                job_tasks.iter().all(|task| task.status.is_terminal());
            if all_tasks_settled && !job.status.is_terminal() {
                settled_jobs.push(job.id);
            }
        }

        // Ráfaga transaccional: una única transacción para el lote.
        let written_rows = state.job_repository.update_progress_batch(progress_batch).await?;

        // Bucle de retroalimentación: completitud post-escritura.
        if !settled_jobs.is_empty() {
            let completion_engine = CompletionService::new(state.clone());
            for settled_job_id in settled_jobs {
                if let Err(completion_fault) =
                    completion_engine.evaluate_job_completion(&settled_job_id).await
                {
                    warn!(
                        "⚠️ [FEEDBACK_FAULT]: Completion re-evaluation of {} degraded: {:#}",
                        settled_job_id, completion_fault
                    );
                }
            }
        }

        Ok(written_rows)
    }

    /// Agregación por capas de un trabajo en modo incremento: cada capa
    /// persiste su propio progreso y el padre suma las capas.
    async fn aggregate_increment_job(
        &self,
        job: &JobExecution,
        job_tasks: &[JobTask],
    ) -> Result<(u64, u64)> {
        let state = &self.application_state;
        let layers = state.job_repository.fetch_increment_layers(&job.id).await?;

        let mut parent_processed: u64 = 0;
        let mut parent_dispatched: u64 = 0;

        for layer in &layers {
            let layer_tasks: Vec<JobTask> = job_tasks
                .iter()
                .filter(|task| task.increment_layer_id == Some(layer.id))
                .cloned()
                .collect();

            let layer_factor = JobExecution::derive_multiplication_factor(
                layer.base_keyspace,
                layer.effective_keyspace,
            );
            let (layer_processed, layer_dispatched) =
                aggregate_task_set(&layer_tasks, layer_factor);

            let layer_percent =
                clamp_progress_percent(layer_processed, layer.effective_keyspace, &layer.id);

            let layer_status = derive_layer_status(layer, &layer_tasks, layer_dispatched);

            let layer_changed = layer_processed != layer.processed_keyspace
                || layer_dispatched != layer.dispatched_keyspace
                || layer_status != layer.status;

            if layer_changed {
                state
                    .job_repository
                    .update_layer_progress(
                        &layer.id,
                        layer_processed,
                        layer_dispatched,
                        layer_percent,
                        layer_status,
                    )
                    .await?;
            }

            parent_processed = parent_processed.saturating_add(layer_processed);
            parent_dispatched = parent_dispatched.saturating_add(layer_dispatched);
        }

        Ok((parent_processed, parent_dispatched))
    }
}

/**
 * Suma el progreso y el despacho de un conjunto de chunks en unidades
 * efectivas.
 *
 * # Logic:
 * - Despachado: el rango efectivo planificado de cada chunk; los
 *   certificados aportan su keyspace real.
 * - Procesado: preferencia por el conteo efectivo reportado; en su
 *   ausencia se deriva del conteo base con el factor conocido,
 *   aplicando la heurística de puntos de restauración absolutos.
 */
fn aggregate_task_set(tasks: &[JobTask], multiplication_factor: u64) -> (u64, u64) {
    let factor = multiplication_factor.max(1);
    let mut processed_total: u64 = 0;
    let mut dispatched_total: u64 = 0;

    for task in tasks {
        if task.status == TaskStatus::Cancelled {
            continue;
        }

        let planned_span = task.planned_effective_span();
        let dispatched_span = if task.status == TaskStatus::Completed
            && task.is_actual_keyspace
            && task.chunk_actual_keyspace > 0
        {
            task.chunk_actual_keyspace
        } else {
            planned_span
        };
        dispatched_total = dispatched_total.saturating_add(dispatched_span);

        let task_processed = if task.status == TaskStatus::Completed {
            dispatched_span
        } else if task.effective_keyspace_processed > 0 {
            task.effective_keyspace_processed
        } else {
            // Heurística de detección: un conteo base ≥ inicio del
            // chunk es un punto de restauración absoluto.
            let relative_base = if task.keyspace_processed >= task.keyspace_start {
                task.keyspace_processed - task.keyspace_start
            } else {
                task.keyspace_processed
            };
            relative_base.saturating_mul(factor)
        };

        processed_total = processed_total.saturating_add(task_processed.min(dispatched_span));
    }

    (processed_total, dispatched_total)
}

/// Acota el porcentaje a [0, 100] y deja rastro ante el desborde.
fn clamp_progress_percent(
    processed: u64,
    effective_keyspace: u64,
    entity_id: &uuid::Uuid,
) -> f64 {
    if effective_keyspace == 0 {
        return 0.0;
    }
    let raw_percent = processed as f64 / effective_keyspace as f64 * 100.0;
    if raw_percent > 100.0 {
        warn!(
            "📈 [PERCENT_OVERSHOOT]: Entity {} computed {:.2}% (clamped to 100).",
            entity_id, raw_percent
        );
    }
    raw_percent.clamp(0.0, 100.0)
}

/// Estado derivado de una capa según sus chunks y su frontera.
fn derive_layer_status(
    layer: &JobIncrementLayer,
    layer_tasks: &[JobTask],
    layer_dispatched: u64,
) -> JobStatus {
    if layer.status.is_terminal() {
        return layer.status;
    }
    let all_settled = !layer_tasks.is_empty()
        && layer_tasks.iter().all(|task| task.status.is_terminal());
    if all_settled && layer_dispatched >= layer.effective_keyspace {
        JobStatus::Completed
    } else if layer_tasks.is_empty() {
        JobStatus::Pending
    } else {
        JobStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn forge_task(
        start: u64,
        end: u64,
        processed_base: u64,
        effective_processed: u64,
        status: TaskStatus,
    ) -> JobTask {
        let now = Utc::now();
        JobTask {
            id: Uuid::new_v4(),
            job_execution_id: Uuid::new_v4(),
            increment_layer_id: None,
            agent_id: Some("agent-1".to_string()),
            status,
            priority: 0,
            attack_cmd: String::new(),
            keyspace_start: start,
            keyspace_end: end,
            keyspace_processed: processed_base,
            effective_keyspace_start: start,
            effective_keyspace_end: end,
            effective_keyspace_processed: effective_processed,
            is_keyspace_split: true,
            is_rule_split_task: false,
            rule_start_index: None,
            rule_end_index: None,
            rule_chunk_path: None,
            chunk_number: 1,
            chunk_duration: 60,
            benchmark_speed: 1_000,
            retry_count: 0,
            last_checkpoint: None,
            chunk_actual_keyspace: 0,
            is_actual_keyspace: false,
            created_at: now,
            assigned_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn certify_absolute_restore_point_detection() {
        // Chunk [1000, 2000) reportando 1600 en absoluto: el progreso
        // real es 600, no 1600.
        let running_task = forge_task(1_000, 2_000, 1_600, 0, TaskStatus::Running);
        let (processed, dispatched) = aggregate_task_set(&[running_task], 1);
        assert_eq!(processed, 600);
        assert_eq!(dispatched, 1_000);

        // Reporte relativo bajo el inicio: se toma tal cual.
        let relative_task = forge_task(1_000, 2_000, 400, 0, TaskStatus::Running);
        let (processed, _) = aggregate_task_set(&[relative_task], 1);
        assert_eq!(processed, 400);
    }

    #[test]
    fn certify_completed_chunk_counts_full_span() {
        let mut completed_task = forge_task(0, 1_000, 0, 0, TaskStatus::Completed);
        completed_task.is_actual_keyspace = true;
        completed_task.chunk_actual_keyspace = 1_050;

        let (processed, dispatched) = aggregate_task_set(&[completed_task], 1);
        assert_eq!(processed, 1_050, "certified actual keyspace wins");
        assert_eq!(dispatched, 1_050);
    }

    #[test]
    fn certify_effective_report_preferred() {
        let reporting_task = forge_task(0, 10_000, 50, 3_500, TaskStatus::Running);
        let (processed, _) = aggregate_task_set(&[reporting_task], 50);
        assert_eq!(processed, 3_500);
    }

    #[test]
    fn certify_percent_clamp() {
        let job_id = Uuid::new_v4();
        assert_eq!(clamp_progress_percent(500, 1_000, &job_id), 50.0);
        assert_eq!(clamp_progress_percent(1_500, 1_000, &job_id), 100.0);
        assert_eq!(clamp_progress_percent(10, 0, &job_id), 0.0);
    }
}
