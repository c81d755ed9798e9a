// [libs/core/keyspace/src/errors.rs]
/*!
 * =================================================================
 * APARATO: KEYSPACE ERROR CATALOG (V10.0 - SOBERANO)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE KEYSPACE
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TAXONOMY PARITY: Cada variante mapea a una rama de decisión del
 *    orquestador: fallo fatal por trabajo, degradación a estimación,
 *    o agotamiento natural del keyspace.
 * 2. PANOPTICON COMPLIANCE: Mensajes con prefijo de estrato para su
 *    triaje programático en los logs estructurados.
 * =================================================================
 */

use std::path::PathBuf;
use thiserror::Error;

/// Fallos semánticos del estrato de keyspace y fragmentación.
#[derive(Error, Debug)]
pub enum KeyspaceError {
    /// El patrón de versión del trabajo no resuelve a ningún binario.
    #[error("[L1_KEYSPACE_FAULT]: BINARY_UNRESOLVABLE -> {0}")]
    BinaryUnresolvable(String),

    /// El binario resuelto no existe en el filesystem local.
    #[error("[L1_KEYSPACE_FAULT]: BINARY_MISSING -> {0}")]
    BinaryMissing(PathBuf),

    /// La invocación del binario colapsó (spawn, señal o timeout).
    #[error("[L1_KEYSPACE_FAULT]: INVOKE_FAILED -> {0}")]
    InvokeFailed(String),

    /// La salida del binario no contiene un entero decimal positivo.
    #[error("[L1_KEYSPACE_FAULT]: PARSE_FAILED -> {0}")]
    ParseFailed(String),

    /// El modo de ataque no soporta consultas de metadatos.
    #[error("[L1_KEYSPACE_FAULT]: UNSUPPORTED_ATTACK -> {0}")]
    UnsupportedAttack(String),

    /// El cursor de despacho alcanzó el final del keyspace base.
    #[error("[L1_PLANNER_FAULT]: NO_REMAINING_KEYSPACE")]
    NoRemainingKeyspace,

    /// El trabajo llegó al planificador con keyspace base nulo.
    #[error("[L1_PLANNER_FAULT]: EMPTY_BASE_KEYSPACE")]
    EmptyBaseKeyspace,

    /// Fallo de I/O al contar, materializar o purgar chunks de reglas.
    #[error("[L1_RULESPLIT_FAULT]: CHUNK_IO_COLLAPSE -> {0}")]
    RuleChunkIo(#[from] std::io::Error),

    /// El rango de reglas solicitado excede el fichero origen.
    #[error("[L1_RULESPLIT_FAULT]: RULE_RANGE_OUT_OF_BOUNDS -> start {start}, count {count}, total {total}")]
    RuleRangeOutOfBounds {
        /// Índice inicial solicitado.
        start: u64,
        /// Cantidad de reglas solicitada.
        count: u64,
        /// Total de reglas efectivas del fichero.
        total: u64,
    },
}
