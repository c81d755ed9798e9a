// [libs/core/keyspace/src/lib.rs]

#![deny(missing_docs)]

//! # APARATO: KEYSPACE STRATUM ROOT (V19.0 - CHUNK ALGEBRA)
//! CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
//! RESPONSABILIDAD: ÁLGEBRA DE KEYSPACE Y FRAGMENTACIÓN DE ATAQUES
//!
//! ## Visión Holística 2026
//! Este estrato transforma una configuración de ataque en unidades de
//! trabajo acotadas: consulta los metadatos de keyspace al binario
//! externo, dimensiona rangos por velocidad de benchmark y duración
//! objetivo, y materializa subconjuntos de reglas en disco cuando la
//! amplificación lo exige. Es puro hacia arriba: no conoce persistencia
//! ni transporte.
//!
//! ## Características de Élite
//! 1. **Bounded Invocation:** Toda llamada al binario está acotada por
//!    timeout y sesión efímera única, permitiendo concurrencia.
//! 2. **Tail Merge:** Los remanentes sub-umbral se absorben en el chunk
//!    precedente tanto en la dimensión de keyspace como en la de reglas.
//! 3. **Strategy Immutability:** La decisión de fragmentar por reglas se
//!    toma una única vez por trabajo y jamás se revisa.

/// Catálogo semántico de fallos del estrato de keyspace.
pub mod errors;

/// Calculador de keyspace vía binario externo (modos de metadatos).
pub mod calculator;

/// Planificador puro de chunks de keyspace.
pub mod planner;

/// Fragmentador de ficheros de reglas con conteo de referencias.
pub mod rule_split;

pub use crate::calculator::{AttackMaterialization, KeyspaceCalculator, KeyspaceReport};
pub use crate::errors::KeyspaceError;
pub use crate::planner::{plan_next_chunk, ChunkPlan, ChunkRequest, SYNTHETIC_BENCHMARK_CANDIDATES};
pub use crate::rule_split::{RuleChunk, RuleSplitManager};
