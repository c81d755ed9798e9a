// [apps/orchestrator/src/services/event_bus.rs]
/*!
 * =================================================================
 * APARATO: NEURAL EVENT BUS SERVICE (V21.0 - LIFECYCLE BROADCASTER)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DIFUSIÓN DE SEÑALES Y PUERTO DE NOTIFICACIONES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. INJECTED NOTIFIER: El despachador global de notificaciones fue
 *    sustituido por un puerto inyectado; los tests suministran un
 *    doble sin tocar el bus real.
 * 2. LOCK-FREE EMISSION: La pérdida de un suscriptor no afecta el
 *    determinismo del reactor asíncrono principal.
 *
 * # Mathematical Proof (Signal Propagation):
 * El Bus garantiza un tiempo de despacho O(1) independientemente del
 * número de receptores (broadcast multi-productor multi-consumidor).
 * =================================================================
 */

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacidad del canal de difusión soberano.
/// Sintonizado para absorber ráfagas sin disparar errores de 'Lagging'.
const SOVEREIGN_CHANNEL_CAPACITY: usize = 4096;

/// Señales de ciclo de vida difundidas a los consumidores adjuntos.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    JobCompleted { job_id: Uuid },
    JobFailed { job_id: Uuid, reason: String },
    JobInterrupted { job_id: Uuid },
    TaskDispatched { task_id: Uuid, agent_id: String },
    BenchmarkTimedOut { agent_id: String, job_id: Option<Uuid> },
    PotfileGrew { line_count: u64 },
}

/**
 * Orquestador central de señales en tiempo real (El Sistema Nervioso).
 */
#[derive(Debug, Clone)]
pub struct EventBus {
    internal_transmission_channel: broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    /// Forja una nueva instancia del Bus con buffer endurecido.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SOVEREIGN_CHANNEL_CAPACITY);
        Self { internal_transmission_channel: sender }
    }

    /// Genera un nuevo receptor para consumidores en tiempo real.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.internal_transmission_channel.subscribe()
    }

    /// Emisión tolerante: sin suscriptores no es un fallo.
    pub fn emit(&self, event: SchedulerEvent) {
        let subscriber_count = self.internal_transmission_channel.receiver_count();
        if subscriber_count == 0 {
            debug!("🕳️ [EVENT_BUS]: Signal emitted into the void (no subscribers).");
        }
        let _ = self.internal_transmission_channel.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * Puerto de notificaciones de ciclo de vida. La implementación real
 * traza y difunde; los tests inyectan un doble que captura.
 */
pub trait NotifierPort: Send + Sync {
    /// Notifica la completitud de un trabajo al usuario creador.
    fn notify_job_completed(&self, job_id: &Uuid, created_by: Option<&str>);
    /// Notifica un fallo terminal con su causa.
    fn notify_job_failed(&self, job_id: &Uuid, created_by: Option<&str>, reason: &str);
    /// Notifica una interrupción por prioridad superior.
    fn notify_job_interrupted(&self, job_id: &Uuid);
}

/// Implementación por defecto: rastro estructurado + difusión al bus.
pub struct EventBusNotifier {
    event_bus: std::sync::Arc<EventBus>,
}

impl EventBusNotifier {
    #[must_use]
    pub fn new(event_bus: std::sync::Arc<EventBus>) -> Self {
        Self { event_bus }
    }
}

impl NotifierPort for EventBusNotifier {
    fn notify_job_completed(&self, job_id: &Uuid, created_by: Option<&str>) {
        info!(
            "📬 [NOTIFY]: Job {} completed (owner: {}).",
            job_id,
            created_by.unwrap_or("system")
        );
        self.event_bus.emit(SchedulerEvent::JobCompleted { job_id: *job_id });
    }

    fn notify_job_failed(&self, job_id: &Uuid, created_by: Option<&str>, reason: &str) {
        warn!(
            "📬 [NOTIFY]: Job {} failed (owner: {}): {}",
            job_id,
            created_by.unwrap_or("system"),
            reason
        );
        self.event_bus.emit(SchedulerEvent::JobFailed {
            job_id: *job_id,
            reason: reason.to_string(),
        });
    }

    fn notify_job_interrupted(&self, job_id: &Uuid) {
        info!("📬 [NOTIFY]: Job {} interrupted by higher priority work.", job_id);
        self.event_bus.emit(SchedulerEvent::JobInterrupted { job_id: *job_id });
    }
}
