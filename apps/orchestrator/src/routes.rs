// INICIO DEL ARCHIVO [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V22.0 - SWARM UPLINK)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE RED DEL ENLACE CON LA FLOTA
 *
 * VISION HIPER-HOLÍSTICA:
 * El front-end REST completo, la autenticación y la gestión de
 * usuarios viven en colaboradores externos; esta matriz expone sólo
 * la costura del enlace de agentes:
 * 1. Registro y stream de directivas (SSE de alta frecuencia).
 * 2. Reportes de chunks (progreso, completitud, fallo, acuses).
 * 3. Resultados de benchmark y ráfagas de cracks.
 * =================================================================
 */

use crate::handlers::swarm::SwarmUplinkHandler;
use crate::state::AppState;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_sovereign_router(application_shared_state: AppState) -> Router {
    // Escudo de Red: CORS laxo para herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // ESTRATO TÁCTICO: Enlace con la flota de agentes.
    let swarm_uplink_stratum = Router::new()
        // Registro de capacidad y stream de directivas
        .route("/agents/register", post(SwarmUplinkHandler::register_agent))
        .route("/agents/:agent_id/stream", get(SwarmUplinkHandler::establish_directive_stream))
        // Reportes de chunks
        .route("/tasks/progress", post(SwarmUplinkHandler::handle_task_progress))
        .route("/tasks/complete", post(SwarmUplinkHandler::handle_task_completed))
        .route("/tasks/failed", post(SwarmUplinkHandler::handle_task_failed))
        .route("/tasks/stop-ack", post(SwarmUplinkHandler::handle_task_stop_ack))
        // Calibraciones
        .route("/benchmarks/result", post(SwarmUplinkHandler::handle_benchmark_result))
        // Ingesta de contraseñas crackeadas
        .route("/cracks", post(SwarmUplinkHandler::handle_crack_reports))
        // Tolerancia de carrera de sincronización de potfiles
        .route(
            "/potfile/:wordlist_id/digest-history",
            get(SwarmUplinkHandler::handle_digest_history),
        );

    // COMPOSICIÓN GLOBAL (Root Topology)
    Router::new()
        .route("/health", get(|| async { "STATUS_OK" }))
        .nest("/api/v1/swarm", swarm_uplink_stratum)
        .layer(network_security_shield)
        .with_state(application_shared_state)
}
// FIN DEL ARCHIVO [apps/orchestrator/src/routes.rs]
