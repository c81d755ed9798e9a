// INICIO DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V19.0 - DAEMON MATRIX)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Actúa como la placa base donde se conectan todos los servicios.
 * Cada daemon es un bucle nominado con cadencia explícita:
 * planificación (1 s, Mutex), agregación (2 s, TryLock), vigilancia
 * de ocupaciones (5 min) e ingestión de potfile (configurable).
 * =================================================================
 */

use crate::bootstrap::Bootstrap;
use crate::routes::create_sovereign_router;
use crate::services::potfile_pipeline::PotfilePipeline;
use crate::services::progress_aggregator::ProgressAggregator;
use crate::services::recovery::RecoveryService;
use crate::services::scheduler::SchedulerService;
use crate::state::AppState;
use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::LedgerClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument};

pub struct OrchestratorKernel {
    pub server_network_port: u16,
    pub application_shared_state: AppState,
}

impl OrchestratorKernel {
    /**
     * Realiza la ignición del cliente táctico y el estado neural.
     * Establece la conexión a la base de datos antes de levantar servicios.
     */
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
    ) -> Self {
        let database_client = LedgerClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Database link collapse. Ignition aborted.");

        let settings = SchedulerSettings::from_environment();

        Self {
            server_network_port: listening_port,
            application_shared_state: AppState::new(database_client, settings),
        }
    }

    /**
     * Lanza la ejecución de todas las operaciones autónomas del núcleo.
     * Configura los daemons de fondo y el servidor HTTP principal.
     */
    pub async fn launch_sovereign_operations(self) {
        let shared_application_state = self.application_shared_state.clone();

        // --- 1. CUSTODIA DE ARRANQUE EN FRÍO ---
        // Recuperación de chunks huérfanos y provisión del preset.
        if let Err(bootstrap_fault) = Bootstrap::perform_cold_start(&shared_application_state).await
        {
            error!("❌ [BOOTSTRAP_FAILED]: Cold start collapsed: {:#}", bootstrap_fault);
            std::process::exit(1);
        }

        // --- 2. DESPLIEGUE DE DAEMONS NOMINADOS ---

        // A. Ciclo de planificación (matriz de asignación, ~1 s)
        SchedulerService::spawn_scheduler_daemon(shared_application_state.clone()).await;

        // B. Agregador de progreso (2 s, disciplina TryLock)
        ProgressAggregator::spawn_aggregator_daemon(shared_application_state.clone()).await;

        // C. Vigilancia de ocupaciones obsoletas (5 min)
        RecoveryService::spawn_stale_sweep_daemon(shared_application_state.clone()).await;

        // D. Pipeline de ingestión de potfile (cadencia configurable)
        PotfilePipeline::spawn_pipeline_daemon(shared_application_state.clone()).await;

        // --- 3. IGNICIÓN DEL TRANSPORTE HTTP (AXUM) ---
        let sovereign_router = create_sovereign_router(shared_application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address is well-formed"),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Scheduler Control Center listening at {}", bind_address);

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        if let Err(server_error) = axum::serve(tcp_listener, sovereign_router).await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {}", server_error);
            std::process::exit(1);
        }
    }
}
// FIN DEL ARCHIVO [apps/orchestrator/src/kernel.rs]
