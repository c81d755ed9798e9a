// [apps/orchestrator/src/services/mod.rs]
/**
 * =================================================================
 * APARATO: SERVICES REGISTRY (V16.0 - NAMED DAEMONS)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE DAEMONS Y SERVICIOS DE CICLO
 *
 * # Logic:
 * Cada bucle de fondo es un daemon nominado con ignición y cadencia
 * explícitas: planificación (~1 s, Mutex), agregación (2 s, TryLock),
 * vigilancia de ocupaciones (5 min) e ingestión de potfile
 * (configurable). Ningún trabajo diferido anónimo.
 * =================================================================
 */

pub mod benchmark_coordinator;
pub mod completion;
pub mod event_bus;
pub mod potfile_pipeline;
pub mod progress_aggregator;
pub mod recovery;
pub mod scheduler;
pub mod task_assigner;

pub use benchmark_coordinator::BenchmarkCoordinator;
pub use completion::CompletionService;
pub use event_bus::{EventBus, EventBusNotifier, NotifierPort, SchedulerEvent};
pub use potfile_pipeline::PotfilePipeline;
pub use progress_aggregator::ProgressAggregator;
pub use recovery::RecoveryService;
pub use scheduler::SchedulerService;
pub use task_assigner::TaskAssigner;
