// [libs/domain/scheduling/src/errors.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULING ERROR CATALOG (V6.0 - SOBERANO)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE ASIGNACIÓN
 * =================================================================
 */

use thiserror::Error;

/// Fallos semánticos del estrato de asignación.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// El patrón de versión no pertenece a la gramática reconocida
    /// (`default | M.x | M.N.x | M.N.P | M.N.P-sufijo`).
    #[error("[L2_SCHED_FAULT]: MALFORMED_VERSION_PATTERN -> {0}")]
    MalformedVersionPattern(String),
}
