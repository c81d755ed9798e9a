// [apps/orchestrator/src/services/benchmark_coordinator.rs]
/*!
 * =================================================================
 * APARATO: BENCHMARK COORDINATOR (V17.0 - CALIBRATION GATE)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: GARANTÍA DE CALIBRACIONES PREVIA A LA ASIGNACIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL PLAN: ForcedBenchmarks (ligados a trabajo/capa con keyspace
 *    estimado y cero tareas) y AgentBenchmarks (recarga genérica de
 *    caché vencida). El plan se filtra a lo efectivamente enviado.
 * 2. BOUNDED WAIT: El ciclo bloquea sobre la tabla de seguimiento
 *    hasta la completitud o el vencimiento; los rezagados se marcan
 *    fallidos y el ciclo continúa con lo que llegó.
 * 3. PREFERENCE OUTPUT: El agente que completa un benchmark forzado
 *    para el trabajo J queda preferido en la reserva de J.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use hashforge_domain_models::agent::Agent;
use hashforge_domain_models::benchmark::{BenchmarkRequest, BenchmarkRequestStatus};
use hashforge_domain_models::job::AttackMode;
use hashforge_domain_models::messages::{AgentDirective, BenchmarkRequestPayload};
use hashforge_domain_scheduling::{CompatibilityMatrix, SlotKey};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::event_bus::SchedulerEvent;

/// Cadencia de sondeo de la tabla de seguimiento durante la espera.
const WAIT_POLL_INTERVAL_SECONDS: u64 = 2;

/// Objetivo de calibración derivado del inventario del ciclo.
#[derive(Debug, Clone)]
pub struct BenchmarkTarget {
    pub slot: SlotKey,
    pub attack_mode: AttackMode,
    pub hash_type_id: u32,
    pub salt_count: Option<u64>,
    /// Máscara concreta cuando el objetivo es una capa.
    pub layer_mask: Option<String>,
    /// true si el keyspace es estimado y el trabajo/capa no tiene tareas.
    pub requires_forced: bool,
}

pub struct BenchmarkCoordinator {
    application_state: AppState,
}

impl BenchmarkCoordinator {
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /**
     * Garantiza calibraciones para el inventario del ciclo.
     *
     * # Returns:
     * Mapa de preferencia ranura → agentes que completaron un
     * benchmark forzado para ella en esta espera.
     */
    #[instrument(skip_all, fields(targets = targets.len(), agents = agents.len()))]
    pub async fn ensure_benchmarks(
        &self,
        targets: &[BenchmarkTarget],
        agents: &[Agent],
        matrix: &CompatibilityMatrix,
    ) -> Result<HashMap<SlotKey, Vec<String>>> {
        let state = &self.application_state;
        let mut sent_requests: Vec<(BenchmarkRequest, BenchmarkTarget)> = Vec::new();
        let mut planned_keys: HashSet<(String, String, u32, Option<u64>)> = HashSet::new();

        let ready_agents: Vec<&Agent> = agents
            .iter()
            .filter(|agent| !agent.engagement.busy_status)
            .collect();

        for target in targets {
            // Agentes compatibles con la ranura, especialistas primero.
            let mut compatible_ready: Vec<&&Agent> = ready_agents
                .iter()
                .filter(|agent| matrix.is_pair_compatible(&agent.id, &target.slot))
                .collect();
            compatible_ready.sort_by_key(|agent| matrix.flexibility_score(&agent.id));

            if target.requires_forced {
                // --- PLAN A: BENCHMARK FORZADO (LIGADO AL TRABAJO) ---
                // Un único agente compatible basta para promover el
                // keyspace; el primero especialista disponible.
                if let Some(chosen_agent) = compatible_ready.first() {
                    if let Some(sent) = self
                        .dispatch_single_request(target, &chosen_agent.id, true)
                        .await?
                    {
                        planned_keys.insert((
                            chosen_agent.id.clone(),
                            target.attack_mode.as_str().to_string(),
                            target.hash_type_id,
                            target.salt_count,
                        ));
                        sent_requests.push((sent, target.clone()));
                    }
                } else {
                    debug!(
                        "🧭 [BENCH_PLAN]: Forced target {:?} has no ready compatible agent.",
                        target.slot
                    );
                }
            } else {
                // --- PLAN B: RECARGA GENÉRICA DE CACHÉ ---
                for compatible_agent in &compatible_ready {
                    let cache_key = (
                        compatible_agent.id.clone(),
                        target.attack_mode.as_str().to_string(),
                        target.hash_type_id,
                        target.salt_count,
                    );
                    if planned_keys.contains(&cache_key) {
                        continue;
                    }

                    let cached = state
                        .benchmark_repository
                        .fetch_benchmark(
                            &compatible_agent.id,
                            target.attack_mode,
                            target.hash_type_id,
                            target.salt_count,
                        )
                        .await?;

                    let is_fresh = cached
                        .map(|benchmark| {
                            benchmark.is_fresh(
                                state.settings.benchmark_cache_duration_hours,
                                Utc::now(),
                            )
                        })
                        .unwrap_or(false);

                    if is_fresh {
                        continue;
                    }

                    if let Some(sent) = self
                        .dispatch_single_request(target, &compatible_agent.id, false)
                        .await?
                    {
                        planned_keys.insert(cache_key);
                        sent_requests.push((sent, target.clone()));
                    }
                }
            }
        }

        if sent_requests.is_empty() {
            return Ok(HashMap::new());
        }

        info!(
            "⏱️ [BENCH_WAIT]: Blocking cycle on {} calibration requests.",
            sent_requests.len()
        );
        self.await_settlement(&sent_requests).await
    }

    /// Envía una solicitud y registra su fila de seguimiento. El fallo
    /// de envío filtra la solicitud del plan (no se rastrea).
    async fn dispatch_single_request(
        &self,
        target: &BenchmarkTarget,
        agent_id: &str,
        is_forced: bool,
    ) -> Result<Option<BenchmarkRequest>> {
        let state = &self.application_state;
        let request_id = Uuid::new_v4();

        let payload = BenchmarkRequestPayload {
            request_id,
            job_execution_id: if is_forced { Some(target.slot.job_id) } else { None },
            increment_layer_id: if is_forced { target.slot.layer_id } else { None },
            layer_mask: target.layer_mask.clone(),
            attack_mode: target.attack_mode,
            hash_type_id: target.hash_type_id,
        };

        if let Err(uplink_fault) = state
            .agent_uplink
            .dispatch(agent_id, AgentDirective::BenchmarkRequest(payload))
        {
            debug!("📵 [BENCH_SEND]: Request to {} filtered from plan: {}.", agent_id, uplink_fault);
            return Ok(None);
        }

        let tracking_row = BenchmarkRequest {
            id: request_id,
            agent_id: agent_id.to_string(),
            job_execution_id: Some(target.slot.job_id),
            increment_layer_id: target.slot.layer_id,
            is_forced,
            status: BenchmarkRequestStatus::Pending,
            requested_at: Utc::now(),
        };
        state.benchmark_repository.insert_request(&tracking_row).await?;

        Ok(Some(tracking_row))
    }

    /// Espera acotada: sondea la tabla de seguimiento hasta que todas
    /// las filas queden selladas o venza la pared de reloj.
    async fn await_settlement(
        &self,
        sent_requests: &[(BenchmarkRequest, BenchmarkTarget)],
    ) -> Result<HashMap<SlotKey, Vec<String>>> {
        let state = &self.application_state;
        let wait_deadline = Instant::now()
            + Duration::from_secs(state.settings.benchmark_wait_timeout_seconds);

        loop {
            let mut pending_remaining = 0usize;
            for (request, _) in sent_requests {
                if let Some(tracked) =
                    state.benchmark_repository.fetch_request(&request.id).await?
                {
                    if tracked.status == BenchmarkRequestStatus::Pending {
                        pending_remaining += 1;
                    }
                }
            }

            if pending_remaining == 0 {
                break;
            }

            if Instant::now() >= wait_deadline {
                warn!(
                    "⌛ [BENCH_TIMEOUT]: {} calibration laggards marked failed.",
                    pending_remaining
                );
                self.settle_laggards(sent_requests).await?;
                break;
            }

            sleep(Duration::from_secs(WAIT_POLL_INTERVAL_SECONDS)).await;
        }

        // Mapa de preferencia: forzados completados por ranura.
        let mut preferred_agents: HashMap<SlotKey, Vec<String>> = HashMap::new();
        for (request, target) in sent_requests {
            if !request.is_forced {
                continue;
            }
            if let Some(tracked) = state.benchmark_repository.fetch_request(&request.id).await? {
                if tracked.status == BenchmarkRequestStatus::Completed {
                    preferred_agents
                        .entry(target.slot.clone())
                        .or_default()
                        .push(request.agent_id.clone());
                }
            }
        }
        Ok(preferred_agents)
    }

    /// Sella como fallidos los rezagados y degrada los trabajos que
    /// quedaron sin calibración alguna (fatal por trabajo).
    async fn settle_laggards(
        &self,
        sent_requests: &[(BenchmarkRequest, BenchmarkTarget)],
    ) -> Result<()> {
        let state = &self.application_state;

        for (request, target) in sent_requests {
            let tracked = match state.benchmark_repository.fetch_request(&request.id).await? {
                Some(tracked) if tracked.status == BenchmarkRequestStatus::Pending => tracked,
                _ => continue,
            };

            state
                .benchmark_repository
                .settle_request(&tracked.id, BenchmarkRequestStatus::Failed)
                .await?;

            state.event_bus.emit(SchedulerEvent::BenchmarkTimedOut {
                agent_id: tracked.agent_id.clone(),
                job_id: tracked.job_execution_id,
            });

            if !request.is_forced {
                continue;
            }

            // Benchmark forzado vencido sin calibración previa: el
            // trabajo no tiene plan posible.
            let prior_benchmark = state
                .benchmark_repository
                .fetch_benchmark(
                    &tracked.agent_id,
                    target.attack_mode,
                    target.hash_type_id,
                    target.salt_count,
                )
                .await?;

            if prior_benchmark.is_none() {
                let job_failed = state
                    .job_repository
                    .mark_failed(&target.slot.job_id, "benchmark timeout with no prior calibration")
                    .await?;
                if job_failed {
                    state.notifier.notify_job_failed(
                        &target.slot.job_id,
                        None,
                        "benchmark timeout with no prior calibration",
                    );
                }
            }
        }
        Ok(())
    }
}
