// [libs/infra/db-libsql/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V15.0 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. TRIAGE READY: Cada variante distingue entre fallos de enlace,
 *    consultas rechazadas, deriva de mapeo y violaciones de dominio,
 *    permitiendo recuperación autonómica en el ciclo del planificador.
 * 2. ZERO ABBREVIATIONS: Nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE DOMINIO DEL PLANIFICADOR ---

    /// El trabajo solicitado no existe en las tablas activas.
    #[error("[L3_JOB_FAULT]: JOB_NOT_FOUND")]
    JobNotFound,

    /// La capa de incremento solicitada no existe.
    #[error("[L3_JOB_FAULT]: LAYER_NOT_FOUND")]
    LayerNotFound,

    /// El chunk solicitado no existe en el Ledger.
    #[error("[L3_TASK_FAULT]: TASK_NOT_FOUND")]
    TaskNotFound,

    /// El agente referenciado no está registrado.
    #[error("[L3_AGENT_FAULT]: AGENT_NOT_FOUND")]
    AgentNotFound,

    /// El hashlist referenciado no está registrado.
    #[error("[L3_HASHLIST_FAULT]: HASHLIST_NOT_FOUND")]
    HashlistNotFound,

    /// Conflicto optimista: el registro de ocupación del agente fue
    /// mutado por otra escritura entre lectura y sellado.
    #[error("[L3_AGENT_FAULT]: ENGAGEMENT_VERSION_CONFLICT")]
    EngagementVersionConflict,

    /// La entidad no se encuentra en un estado apto para la operación.
    #[error("[L3_STATE_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,
}
