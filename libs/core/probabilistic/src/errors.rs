// libs/core/probabilistic/src/errors.rs
// =================================================================
// APARATO: PROBABILISTIC ERRORS
// RESPONSABILIDAD: CATÁLOGO DE FALLOS EN EL FILTRO DE DEDUPLICACIÓN
// ESTADO: ELITE COMPLIANCE (FULL RUSTDOC)
// =================================================================

use thiserror::Error;

/// Define los errores posibles durante la operación del filtro de
/// deduplicación probabilística.
///
/// Este enum centraliza los fallos que pueden ocurrir al manipular la
/// estructura, cubriendo desde problemas de sistema de archivos (I/O)
/// hasta corrupción de datos binarios.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Error crítico durante la serialización o deserialización binaria.
    ///
    /// Generalmente ocurre si:
    /// - El artefacto `.bin` está corrupto o truncado (EOF inesperado).
    /// - La estructura del struct ha cambiado (Breaking Change).
    #[error("Error de serialización/deserialización: {0}")]
    SerializationError(#[from] bincode::Error),

    /// Error de Entrada/Salida del sistema operativo.
    ///
    /// Ocurre si:
    /// - No se encuentra el artefacto del filtro (`NotFound`).
    /// - No hay permisos de lectura/escritura (`PermissionDenied`).
    /// - El disco está lleno.
    #[error("Error de I/O: {0}")]
    IoError(#[from] std::io::Error),
}
