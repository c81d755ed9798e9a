// [libs/domain/scheduling/src/lib.rs]

#![deny(missing_docs)]

//! # APARATO: SCHEDULING STRATUM ROOT (V15.0 - MATRIX MASTER)
//! CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
//! RESPONSABILIDAD: ÁLGEBRA PURA DE ASIGNACIÓN DE AGENTES A TRABAJOS
//!
//! ## Visión Holística 2026
//! Este estrato es deliberadamente puro: recibe instantáneas tipadas de
//! la flota y del inventario de trabajos y produce un plan de reservas,
//! sin referencias hacia persistencia ni transporte. El ciclo del
//! orquestador es el único dueño de las referencias descendentes.
//!
//! ## Características de Élite
//! 1. **Matrix Cycle:** La asignación se resuelve en un único ciclo
//!    bipartito por tick; no existe bucle por-agente.
//! 2. **Strict Priority:** Mientras un nivel superior conserve trabajo
//!    despachable con agentes compatibles, ningún nivel inferior recibe.
//! 3. **Residual Flexibility:** La selección concreta maximiza la
//!    flexibilidad restante (trabajos restringidos primero, agentes
//!    especialistas primero).

/// Catálogo semántico de fallos de asignación.
pub mod errors;

/// Gramática de patrones de versión y regla de compatibilidad.
pub mod version_pattern;

/// Grafo bipartito de compatibilidad agente ⇄ trabajo.
pub mod compatibility;

/// Distribución de conteos por buckets de prioridad (Fases 1 y 2).
pub mod allocator;

/// Resolución de conteos a agentes concretos.
pub mod reservation;

pub use crate::allocator::{allocate, AllocationCandidate, AllocationGrant, AllocationPlan};
pub use crate::compatibility::{AgentCapability, CompatibilityMatrix, SlotKey, SlotRequirement};
pub use crate::errors::SchedulingError;
pub use crate::reservation::{reserve, Reservation};
pub use crate::version_pattern::VersionPattern;
