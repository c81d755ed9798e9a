// [apps/orchestrator/src/handlers/swarm.rs]
/*!
 * =================================================================
 * APARATO: SWARM UPLINK HANDLER (V33.0 - FLEET REPORTS)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA DE REPORTES DE LA FLOTA Y STREAM DE DIRECTIVAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. REPORT SINKS: Progreso, completitud, fallo, resultados de
 *    benchmark, acuses de detención y contraseñas crackeadas entran
 *    por este adaptador hacia los repositorios y servicios del núcleo.
 * 2. DIRECTIVE STREAM: Cada agente drena su cola de directivas por un
 *    canal SSE; el framing WebSocket equivalente es responsabilidad
 *    del transporte perimetral.
 * 3. RETRY DISCIPLINE: Un chunk fallido regresa a la cola hasta agotar
 *    su presupuesto de reintentos; el primer fallo permanente mata al
 *    trabajo.
 * =================================================================
 */

use crate::services::completion::CompletionService;
use crate::state::AppState;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::stream::Stream;
use hashforge_domain_models::agent::Agent;
use hashforge_domain_models::benchmark::{AgentBenchmark, BenchmarkRequestStatus};
use hashforge_domain_models::messages::{
    BenchmarkResultReport, CrackReport, TaskCompletedReport, TaskFailedReport,
    TaskProgressReport, TaskStopAck,
};
use hashforge_domain_models::task::TaskStatus;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};

/// Ficha de registro/refresco de un agente de la flota.
#[derive(Deserialize)]
pub struct AgentRegistrationPayload {
    pub agent: Agent,
}

pub struct SwarmUplinkHandler;

impl SwarmUplinkHandler {
    /**
     * Endpoint: POST /api/v1/swarm/agents/register
     * Registra o refresca la ficha de capacidad de un agente.
     */
    #[instrument(skip(application_state, registration), fields(agent = %registration.agent.id))]
    pub async fn register_agent(
        State(application_state): State<AppState>,
        Json(registration): Json<AgentRegistrationPayload>,
    ) -> impl IntoResponse {
        match application_state.agent_repository.upsert_agent(&registration.agent).await {
            Ok(()) => {
                info!("🤝 [FLEET]: Agent {} registered/refreshed.", registration.agent.id);
                StatusCode::OK.into_response()
            }
            Err(registration_fault) => {
                error!("❌ [FLEET_FAULT]: Registration rejected: {}", registration_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/swarm/agents/:agent_id/stream
     * Stream SSE por el que el agente drena sus directivas.
     */
    #[instrument(skip(application_state), fields(agent = %agent_id))]
    pub async fn establish_directive_stream(
        State(application_state): State<AppState>,
        Path(agent_id): Path<String>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let directive_receiver = application_state.agent_uplink.register(&agent_id);

        let directive_stream = ReceiverStream::new(directive_receiver).map(|directive| {
            let serialized_directive = serde_json::to_string(&directive)
                .unwrap_or_else(|_| "{\"directive_type\":\"malformed\"}".to_string());
            Ok(Event::default().event("directive").data(serialized_directive))
        });

        Sse::new(directive_stream).keep_alive(KeepAlive::default())
    }

    /**
     * Endpoint: POST /api/v1/swarm/tasks/progress
     * Pulso de progreso de un chunk activo.
     */
    #[instrument(skip(application_state, progress_report), fields(task = %progress_report.task_id))]
    pub async fn handle_task_progress(
        State(application_state): State<AppState>,
        Json(progress_report): Json<TaskProgressReport>,
    ) -> impl IntoResponse {
        let update_outcome = application_state
            .task_repository
            .update_progress(
                &progress_report.task_id,
                progress_report.keyspace_processed,
                progress_report.effective_progress,
            )
            .await;

        if let Err(progress_fault) = update_outcome {
            warn!("⚠️ [PROGRESS_REJECTED]: Task {}: {}", progress_report.task_id, progress_fault);
            return StatusCode::NOT_FOUND.into_response();
        }

        // Telemetría de dispositivos (incluye ventiladores) al rastro.
        for device_metric in &progress_report.device_metrics {
            debug!(
                device = %device_metric.device_name,
                temperature = device_metric.temperature_celsius,
                fan = device_metric.fan_speed_percent,
                hash_rate = device_metric.hash_rate,
                "📟 [DEVICE_PULSE]"
            );
        }

        StatusCode::ACCEPTED.into_response()
    }

    /**
     * Endpoint: POST /api/v1/swarm/tasks/complete
     * Certificación de chunk finalizado con keyspace real.
     */
    #[instrument(skip(application_state, completion_report), fields(task = %completion_report.task_id))]
    pub async fn handle_task_completed(
        State(application_state): State<AppState>,
        Json(completion_report): Json<TaskCompletedReport>,
    ) -> impl IntoResponse {
        let task = match application_state
            .task_repository
            .try_fetch_task(&completion_report.task_id)
            .await
        {
            Ok(Some(task)) => task,
            Ok(None) => return StatusCode::NOT_FOUND.into_response(),
            Err(fetch_fault) => {
                error!("❌ [COMPLETE_FAULT]: {}", fetch_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let effective_processed = if completion_report.chunk_actual_keyspace > 0 {
            completion_report.chunk_actual_keyspace
        } else {
            task.planned_effective_span()
        };

        if let Err(seal_fault) = application_state
            .task_repository
            .mark_completed(
                &completion_report.task_id,
                completion_report.chunk_actual_keyspace,
                completion_report.is_actual_keyspace,
                effective_processed,
            )
            .await
        {
            error!("❌ [COMPLETE_FAULT]: {}", seal_fault);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        // El chunk de reglas suelta su referencia al fichero.
        if let Some(chunk_path) = &task.rule_chunk_path {
            application_state
                .rule_split_manager
                .release_reference(std::path::Path::new(chunk_path));
        }

        // Contabilidad de cracks del hashlist del trabajo.
        if completion_report.crack_count > 0 {
            if let Ok(job) =
                application_state.job_repository.fetch_job(&task.job_execution_id).await
            {
                let _ = application_state
                    .hashlist_repository
                    .add_cracked(&job.hashlist_id, completion_report.crack_count)
                    .await;
            }
        }

        // El agente queda libre en cuanto su tarea abandona running.
        if let Some(agent_id) = &task.agent_id {
            let _ = application_state.agent_repository.clear_busy(agent_id).await;
        }

        // Evaluación inmediata de completitud del trabajo.
        let completion_engine = CompletionService::new(application_state.clone());
        if let Err(completion_fault) =
            completion_engine.evaluate_job_completion(&task.job_execution_id).await
        {
            warn!("⚠️ [COMPLETION_DEGRADED]: {:#}", completion_fault);
        }

        StatusCode::OK.into_response()
    }

    /**
     * Endpoint: POST /api/v1/swarm/tasks/failed
     * Fallo de chunk: reintento hasta agotar presupuesto.
     */
    #[instrument(skip(application_state, failure_report), fields(task = %failure_report.task_id))]
    pub async fn handle_task_failed(
        State(application_state): State<AppState>,
        Json(failure_report): Json<TaskFailedReport>,
    ) -> impl IntoResponse {
        let task = match application_state
            .task_repository
            .try_fetch_task(&failure_report.task_id)
            .await
        {
            Ok(Some(task)) => task,
            Ok(None) => return StatusCode::NOT_FOUND.into_response(),
            Err(fetch_fault) => {
                error!("❌ [FAILURE_FAULT]: {}", fetch_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        warn!(
            "🧨 [CHUNK_FAILED]: Task {} on agent {:?}: {}",
            task.id, task.agent_id, failure_report.error_message
        );

        if let Some(agent_id) = &task.agent_id {
            let _ = application_state.agent_repository.clear_busy(agent_id).await;
        }

        let _ = application_state
            .job_repository
            .bump_consecutive_failures(&task.job_execution_id)
            .await;

        let retry_budget = application_state.settings.max_chunk_retry_attempts;
        if task.retry_count + 1 < retry_budget {
            // Regreso a la cola: otro agente lo rescatará.
            if let Err(retry_fault) =
                application_state.task_repository.reset_for_retry(&task.id).await
            {
                error!("❌ [RETRY_FAULT]: {}", retry_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        } else {
            // Presupuesto agotado: fallo permanente del chunk y del trabajo.
            if let Err(seal_fault) = application_state
                .task_repository
                .set_status(&task.id, TaskStatus::Failed)
                .await
            {
                error!("❌ [FAILURE_SEAL_FAULT]: {}", seal_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }

            let failure_reason = format!(
                "chunk {} failed permanently: {}",
                task.id, failure_report.error_message
            );
            match application_state
                .job_repository
                .mark_failed(&task.job_execution_id, &failure_reason)
                .await
            {
                Ok(true) => {
                    let created_by = application_state
                        .job_repository
                        .try_fetch_job(&task.job_execution_id)
                        .await
                        .ok()
                        .flatten()
                        .and_then(|job| job.created_by);
                    application_state.notifier.notify_job_failed(
                        &task.job_execution_id,
                        created_by.as_deref(),
                        &failure_reason,
                    );
                }
                Ok(false) => {}
                Err(job_fault) => error!("❌ [JOB_FAIL_FAULT]: {}", job_fault),
            }
        }

        StatusCode::OK.into_response()
    }

    /**
     * Endpoint: POST /api/v1/swarm/tasks/stop-ack
     * Acuse de detención cooperativa: libera al agente.
     */
    #[instrument(skip(application_state, stop_ack), fields(task = %stop_ack.task_id))]
    pub async fn handle_task_stop_ack(
        State(application_state): State<AppState>,
        Json(stop_ack): Json<TaskStopAck>,
    ) -> impl IntoResponse {
        let task = match application_state.task_repository.try_fetch_task(&stop_ack.task_id).await
        {
            Ok(Some(task)) => task,
            Ok(None) => return StatusCode::NOT_FOUND.into_response(),
            Err(fetch_fault) => {
                error!("❌ [STOP_ACK_FAULT]: {}", fetch_fault);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if task.status != TaskStatus::Stopping {
            debug!("⚪ [STOP_ACK]: Task {} not in stopping state; ignoring.", task.id);
            return StatusCode::OK.into_response();
        }

        if let Err(cancel_fault) = application_state
            .task_repository
            .set_status(&task.id, TaskStatus::Cancelled)
            .await
        {
            error!("❌ [STOP_ACK_FAULT]: {}", cancel_fault);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        if let Some(chunk_path) = &task.rule_chunk_path {
            application_state
                .rule_split_manager
                .release_reference(std::path::Path::new(chunk_path));
        }

        if let Some(agent_id) = &task.agent_id {
            let _ = application_state.agent_repository.clear_busy(agent_id).await;
        }

        info!("🛑 [STOP_ACKED]: Task {} cancelled; agent released.", task.id);
        StatusCode::OK.into_response()
    }

    /**
     * Endpoint: POST /api/v1/swarm/benchmarks/result
     * Resultado de calibración: caché + promoción de keyspace exacto.
     */
    #[instrument(skip(application_state, benchmark_report), fields(agent = %benchmark_report.agent_id))]
    pub async fn handle_benchmark_result(
        State(application_state): State<AppState>,
        Json(benchmark_report): Json<BenchmarkResultReport>,
    ) -> impl IntoResponse {
        // 1. SELLADO DE LA CALIBRACIÓN EN CACHÉ
        let benchmark_row = AgentBenchmark {
            agent_id: benchmark_report.agent_id.clone(),
            attack_mode: benchmark_report.attack_mode,
            hash_type_id: benchmark_report.hash_type_id,
            salt_count: benchmark_report.salt_count,
            speed: benchmark_report.speed,
            reported_effective_keyspace: benchmark_report.effective_keyspace,
            measured_at: Utc::now(),
        };
        if let Err(cache_fault) =
            application_state.benchmark_repository.upsert_benchmark(&benchmark_row).await
        {
            error!("❌ [BENCH_CACHE_FAULT]: {}", cache_fault);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        // 2. CASAMIENTO CON LA FILA DE SEGUIMIENTO
        let tracked_request = match benchmark_report.request_id {
            Some(request_id) => application_state
                .benchmark_repository
                .fetch_request(&request_id)
                .await
                .ok()
                .flatten(),
            None => application_state
                .benchmark_repository
                .fetch_latest_pending_for_agent(&benchmark_report.agent_id)
                .await
                .ok()
                .flatten(),
        };

        if let Some(tracked) = tracked_request {
            let _ = application_state
                .benchmark_repository
                .settle_request(&tracked.id, BenchmarkRequestStatus::Completed)
                .await;

            // 3. PROMOCIÓN ESTIMADO → EXACTO (FUENTE: EL PROPIO BINARIO)
            if tracked.is_forced {
                if let Some(reported_effective) = benchmark_report.effective_keyspace {
                    match tracked.increment_layer_id {
                        Some(layer_id) => {
                            if let Ok(layer) = application_state
                                .job_repository
                                .fetch_increment_layer(&layer_id)
                                .await
                            {
                                let _ = application_state
                                    .job_repository
                                    .record_layer_keyspace(
                                        &layer_id,
                                        layer.base_keyspace,
                                        reported_effective,
                                        true,
                                    )
                                    .await;
                            }
                        }
                        None => {
                            if let Some(job_id) = tracked.job_execution_id {
                                let _ = application_state
                                    .job_repository
                                    .promote_accurate_keyspace(&job_id, reported_effective)
                                    .await;
                            }
                        }
                    }
                }
            }
        }

        let _ = application_state
            .agent_repository
            .touch_last_seen(&benchmark_report.agent_id)
            .await;

        StatusCode::OK.into_response()
    }

    /**
     * Endpoint: POST /api/v1/swarm/cracks
     * Ráfaga de contraseñas crackeadas hacia el staging de potfile.
     */
    #[instrument(skip(application_state, crack_reports), fields(count = crack_reports.len()))]
    pub async fn handle_crack_reports(
        State(application_state): State<AppState>,
        Json(crack_reports): Json<Vec<CrackReport>>,
    ) -> impl IntoResponse {
        let staging_rows: Vec<(String, String, Option<String>)> = crack_reports
            .into_iter()
            .map(|report| (report.plaintext, report.hash_value, report.client_id))
            .collect();

        match application_state.potfile_staging_repository.stage_batch(&staging_rows).await {
            Ok(staged_count) => {
                debug!("🍯 [CRACK_INGEST]: {} fresh rows staged.", staged_count);
                StatusCode::ACCEPTED.into_response()
            }
            Err(staging_fault) => {
                error!("❌ [CRACK_INGEST_FAULT]: {}", staging_fault);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /**
     * Endpoint: GET /api/v1/swarm/potfile/:wordlist_id/digest-history
     * Anillo de digests recientes para la tolerancia de carrera de los
     * agentes en sincronización.
     */
    #[instrument(skip(application_state), fields(wordlist = %wordlist_id))]
    pub async fn handle_digest_history(
        State(application_state): State<AppState>,
        Path(wordlist_id): Path<String>,
    ) -> impl IntoResponse {
        let observation_ring = application_state.digest_history.snapshot(&wordlist_id);
        (StatusCode::OK, Json(observation_ring)).into_response()
    }
}
