// [libs/infra/db-libsql/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V18.0 - ACCESS MATRIX)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE AUTORIDADES DE PERSISTENCIA
 * =================================================================
 */

pub mod agent;
pub mod benchmark;
pub mod hashlist;
pub mod job;
pub mod potfile;
pub mod task;
pub mod wordlist;

pub use agent::AgentRepository;
pub use benchmark::BenchmarkRepository;
pub use hashlist::HashlistRepository;
pub use job::JobRepository;
pub use potfile::PotfileStagingRepository;
pub use task::TaskRepository;
pub use wordlist::WordlistRepository;

use crate::errors::DbError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Hidratación de una marca temporal RFC3339 desde el Ledger.
pub(crate) fn parse_timestamp(raw_value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw_value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|fault| DbError::MappingError(format!("TIMESTAMP_DRIFT: {}", fault)))
}

/// Hidratación opcional de marca temporal (columnas anulables).
pub(crate) fn parse_optional_timestamp(raw_value: Option<String>) -> Option<DateTime<Utc>> {
    raw_value
        .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Hidratación de un identificador UUID desde el Ledger.
pub(crate) fn parse_uuid(raw_value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw_value)
        .map_err(|fault| DbError::MappingError(format!("UUID_DRIFT: {}", fault)))
}
