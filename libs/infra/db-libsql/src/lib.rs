// [libs/infra/db-libsql/src/lib.rs]
/*!
 * =================================================================
 * APARATO: INFRA DB ROOT (V22.0 - SCHEDULER LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN SOBERANA DEL ADAPTADOR DE PERSISTENCIA
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::LedgerClient;
pub use errors::DbError;
