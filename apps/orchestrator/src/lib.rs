// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY ROOT (V14.0 - SCHEDULER AUTHORITY)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN SUPREMA DEL ÁRBOL DE MÓDULOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. MODULE HIERARCHY HARDENING: Establece la autoridad única de
 *    módulos, permitiendo que 'crate::' sea resuelto de forma
 *    determinista tanto en la librería como en el binario.
 * 2. DOWNWARD REFERENCES ONLY: El ciclo de planificación posee
 *    referencias hacia los estratos inferiores; ningún estrato puro
 *    referencia de vuelta al orquestador.
 * 3. PUBLIC INTERFACE: Expone 'prelude' para la ignición del Kernel.
 * =================================================================
 */

// --- ESTRATO DE INFRAESTRUCTURA Y ARRANQUE ---
/// Recuperación de arranque y provisión del preset de potfile.
pub mod bootstrap;

// --- ESTRATO DE DATOS Y ESTADO (L1-APP) ---
/// Gestor del sistema nervioso central del orquestador.
pub mod state;

// --- ESTRATO DE TRANSPORTE Y ACCIÓN ---
/// Adaptadores de entrada para los reportes de la flota.
pub mod handlers;
/// Núcleo de mando y control para la ignición de servicios.
pub mod kernel;
/// El túnel de mando: Definición de rutas y topología de red.
pub mod routes;

// --- ESTRATO DE DAEMONS ---
/// Ciclo de planificación, agregación, recuperación e ingestión.
pub mod services;

/**
 * PRELUDIO DEL ORQUESTADOR
 *
 * Re-exportación estratégica de los componentes necesarios para
 * la ignición mínima del sistema. Reduce el acoplamiento en 'main.rs'.
 */
pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::AppState;
}
