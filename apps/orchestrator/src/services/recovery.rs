// [apps/orchestrator/src/services/recovery.rs]
/*!
 * =================================================================
 * APARATO: RECOVERY SERVICE (V18.0 - STALE CUSTODY SWEEP)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: RECUPERACIÓN DE ARRANQUE Y VIGILANCIA DE OCUPACIONES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. STARTUP SCAN: Al arrancar, los chunks en assigned/running sin
 *    agente regresan a pending; los de agentes activos con pulso
 *    reciente sobreviven; el resto regresa a la cola, y los trabajos
 *    sin chunks vivos vuelven a pending.
 * 2. PERIODIC SWEEP: Cada 5 minutos, las ocupaciones de agentes cuyo
 *    chunk referenciado no es válido se limpian por el único escritor.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use hashforge_domain_models::agent::AgentStatus;
use hashforge_domain_models::job::JobStatus;
use hashforge_domain_models::task::TaskStatus;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Umbral de frescura del pulso de un chunk en ejecución (5 minutos).
const CHECKPOINT_FRESHNESS_MINUTES: i64 = 5;

/// Cadencia de la vigilancia de ocupaciones obsoletas.
const STALE_SWEEP_INTERVAL_SECONDS: u64 = 300;

pub struct RecoveryService {
    application_state: AppState,
}

impl RecoveryService {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Recuperación de arranque: sanea el Ledger de chunks huérfanos de
     * una terminación abrupta del proceso anterior.
     */
    #[instrument(skip(self))]
    pub async fn perform_startup_recovery(&self) -> Result<usize> {
        let state = &self.application_state;
        let live_tasks = state.task_repository.fetch_live_tasks().await?;
        let freshness_threshold =
            Utc::now() - ChronoDuration::minutes(CHECKPOINT_FRESHNESS_MINUTES);

        let mut recovered_count = 0usize;
        let mut touched_jobs: HashSet<Uuid> = HashSet::new();

        for task in &live_tasks {
            if !matches!(task.status, TaskStatus::Assigned | TaskStatus::Running) {
                continue;
            }

            // Sin agente: regreso directo a la cola.
            let agent_id = match &task.agent_id {
                Some(agent_id) => agent_id.clone(),
                None => {
                    state.task_repository.set_status(&task.id, TaskStatus::Pending).await?;
                    touched_jobs.insert(task.job_execution_id);
                    recovered_count += 1;
                    continue;
                }
            };

            // Agente activo con pulso reciente: el chunk sobrevive.
            let agent_is_healthy = state
                .agent_repository
                .fetch_agent(&agent_id)
                .await
                .map(|agent| agent.status == AgentStatus::Active)
                .unwrap_or(false);

            let checkpoint_is_fresh = task
                .last_checkpoint
                .map(|checkpoint| checkpoint > freshness_threshold)
                .unwrap_or(false);

            if agent_is_healthy && checkpoint_is_fresh {
                continue;
            }

            state.task_repository.set_status(&task.id, TaskStatus::Pending).await?;
            state.task_repository.detach_agent(&task.id).await?;
            state.agent_repository.clear_busy(&agent_id).await?;
            touched_jobs.insert(task.job_execution_id);
            recovered_count += 1;
        }

        // Trabajos sin chunks vivos restantes: regresan a pending.
        for job_id in touched_jobs {
            let incomplete = state.task_repository.count_incomplete(&job_id).await?;
            let remaining_live = state
                .task_repository
                .fetch_tasks_for_job(&job_id)
                .await?
                .iter()
                .filter(|task| {
                    matches!(task.status, TaskStatus::Assigned | TaskStatus::Running)
                })
                .count();

            if remaining_live == 0 && incomplete > 0 {
                state
                    .job_repository
                    .set_status_non_terminal(&job_id, JobStatus::Pending)
                    .await?;
            }
        }

        if recovered_count > 0 {
            info!("♻️ [STARTUP_RECOVERY]: {} stale chunks returned to the queue.", recovered_count);
        }
        Ok(recovered_count)
    }

    /// Ignición del daemon de vigilancia de ocupaciones obsoletas.
    pub async fn spawn_stale_sweep_daemon(application_state: AppState) {
        let mut sweep_ticker = interval(Duration::from_secs(STALE_SWEEP_INTERVAL_SECONDS));
        sweep_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            info!("💀 [STALE_SWEEP_ACTIVE]: Engagement hygiene daemon initiated.");
            let recovery_engine = RecoveryService::new(application_state);

            loop {
                sweep_ticker.tick().await;
                if let Err(sweep_fault) = recovery_engine.sweep_stale_engagements().await {
                    warn!("⚠️ [SWEEP_FAULT]: Stale engagement sweep degraded: {:#}", sweep_fault);
                }
            }
        });
    }

    /**
     * Una pasada de vigilancia: toda ocupación cuyo chunk referenciado
     * no existe, pertenece a otro agente o ya no retiene agente, se
     * limpia a través del único escritor. Un chunk en ejecución cuyo
     * agente perdió su canal de directivas transita a reconexión
     * pendiente; el siguiente pulso de progreso lo devuelve a running.
     */
    #[instrument(skip(self))]
    pub async fn sweep_stale_engagements(&self) -> Result<usize> {
        let state = &self.application_state;
        let busy_agents = state.agent_repository.fetch_busy_agents().await?;
        let mut cleared_count = 0usize;

        for busy_agent in busy_agents {
            let referenced_task = match busy_agent.engagement.current_task_id {
                Some(task_id) => state.task_repository.try_fetch_task(&task_id).await?,
                None => None,
            };

            let is_engagement_valid = referenced_task
                .as_ref()
                .map(|task| {
                    task.agent_id.as_deref() == Some(busy_agent.id.as_str())
                        && matches!(
                            task.status,
                            TaskStatus::Running
                                | TaskStatus::Assigned
                                | TaskStatus::Stopping
                                | TaskStatus::ReconnectPending
                        )
                })
                .unwrap_or(false);

            if !is_engagement_valid {
                state.agent_repository.clear_busy(&busy_agent.id).await?;
                cleared_count += 1;
                continue;
            }

            // Enlace caído con chunk en ejecución: reconexión pendiente.
            if let Some(task) = referenced_task {
                if task.status == TaskStatus::Running
                    && !state.agent_uplink.is_connected(&busy_agent.id)
                {
                    state
                        .task_repository
                        .set_status(&task.id, TaskStatus::ReconnectPending)
                        .await?;
                    warn!(
                        "🔌 [RECONNECT_PENDING]: Task {} parked awaiting agent {}.",
                        task.id, busy_agent.id
                    );
                }
            }
        }

        if cleared_count > 0 {
            info!("💀 [STALE_SWEEP]: {} phantom engagements cleared.", cleared_count);
        }
        Ok(cleared_count)
    }
}
