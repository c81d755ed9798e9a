// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN STATE ORCHESTRATOR (V11.0 - SCHEDULER HUB)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ORQUESTACIÓN DE REPOSITORIOS, PUERTOS Y CERROJOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SMALL CONTEXT OBJECT: Los servicios reciben este contenedor en
 *    lugar de un dios-struct; cada uno toma sólo los puertos que usa.
 * 2. CYCLE EXCLUSIVITY: Un único Mutex asíncrono garantiza que sólo
 *    un ciclo de planificación corra a la vez; el agregador usa su
 *    propio cerrojo con disciplina try-lock.
 * 3. INJECTED NOTIFIER: Las notificaciones de ciclo de vida salen por
 *    un puerto inyectado; los tests suministran un doble.
 * =================================================================
 */

pub mod agent_uplink;
pub mod digest_history;

use crate::services::event_bus::{EventBus, EventBusNotifier, NotifierPort};
use hashforge_core_keyspace::{KeyspaceCalculator, RuleSplitManager};
use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::repositories::{
    AgentRepository, BenchmarkRepository, HashlistRepository, JobRepository,
    PotfileStagingRepository, TaskRepository, WordlistRepository,
};
use hashforge_infra_db::LedgerClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/**
 * Contenedor de estado compartido (Thread-Safe) para el Orquestador.
 * Actúa como la placa base donde se conectan todos los estratos.
 */
#[derive(Clone)]
pub struct AppState {
    /// Cliente táctico del Ledger libSQL.
    pub database_client: LedgerClient,
    /// Superficie de configuración hidratada una vez en la ignición.
    pub settings: Arc<SchedulerSettings>,
    /// Bus de eventos para la difusión de señales en tiempo real.
    pub event_bus: Arc<EventBus>,
    /// Puerto de notificaciones de ciclo de vida (inyectable).
    pub notifier: Arc<dyn NotifierPort>,
    /// Registro de canales de directivas hacia los agentes conectados.
    pub agent_uplink: Arc<agent_uplink::AgentUplinkRegistry>,
    /// Anillo de digests recientes del potfile (tolerancia de carrera).
    pub digest_history: Arc<digest_history::PotfileDigestHistory>,
    /// Sonda de metadatos de keyspace (binario externo).
    pub keyspace_calculator: Arc<KeyspaceCalculator>,
    /// Autoridad única sobre los ficheros de chunk de reglas.
    pub rule_split_manager: Arc<RuleSplitManager>,

    // --- REPOSITORIOS DE AUTORIDAD ÚNICA ---
    pub job_repository: Arc<JobRepository>,
    pub task_repository: Arc<TaskRepository>,
    pub agent_repository: Arc<AgentRepository>,
    pub benchmark_repository: Arc<BenchmarkRepository>,
    pub hashlist_repository: Arc<HashlistRepository>,
    pub potfile_staging_repository: Arc<PotfileStagingRepository>,
    pub wordlist_repository: Arc<WordlistRepository>,

    // --- CERROJOS DE DISCIPLINA DE CICLO ---
    /// Exclusividad del ciclo de planificación (~1 s).
    pub scheduling_cycle_lock: Arc<Mutex<()>>,
    /// Disciplina try-lock del agregador de progreso (2 s).
    pub aggregation_lock: Arc<Mutex<()>>,
}

impl AppState {
    /**
     * Forja una nueva instancia del Estado Maestro inyectando todas
     * las dependencias desde el cliente de base de datos y la
     * configuración hidratada.
     */
    pub fn new(database_client: LedgerClient, settings: SchedulerSettings) -> Self {
        debug!("🧬 [APP_STATE]: Executing sovereign ignition sequence V11.0...");

        let event_bus_instance = Arc::new(EventBus::new());
        let notifier_instance: Arc<dyn NotifierPort> =
            Arc::new(EventBusNotifier::new(event_bus_instance.clone()));

        let keyspace_probe = Arc::new(KeyspaceCalculator::new(
            settings.cracking_binary_path.clone(),
            settings.session_workspace.clone(),
        ));
        let rule_split_authority =
            Arc::new(RuleSplitManager::new(settings.rule_chunk_directory.clone()));

        Self {
            settings: Arc::new(settings),
            event_bus: event_bus_instance,
            notifier: notifier_instance,
            agent_uplink: Arc::new(agent_uplink::AgentUplinkRegistry::new()),
            digest_history: Arc::new(digest_history::PotfileDigestHistory::new()),
            keyspace_calculator: keyspace_probe,
            rule_split_manager: rule_split_authority,

            job_repository: Arc::new(JobRepository::new(database_client.clone())),
            task_repository: Arc::new(TaskRepository::new(database_client.clone())),
            agent_repository: Arc::new(AgentRepository::new(database_client.clone())),
            benchmark_repository: Arc::new(BenchmarkRepository::new(database_client.clone())),
            hashlist_repository: Arc::new(HashlistRepository::new(database_client.clone())),
            potfile_staging_repository: Arc::new(PotfileStagingRepository::new(
                database_client.clone(),
            )),
            wordlist_repository: Arc::new(WordlistRepository::new(database_client.clone())),

            scheduling_cycle_lock: Arc::new(Mutex::new(())),
            aggregation_lock: Arc::new(Mutex::new(())),

            database_client,
        }
    }

    /// Variante de pruebas: estado real con un notificador doble.
    pub fn with_notifier(
        database_client: LedgerClient,
        settings: SchedulerSettings,
        notifier: Arc<dyn NotifierPort>,
    ) -> Self {
        let mut state = Self::new(database_client, settings);
        state.notifier = notifier;
        state
    }
}
