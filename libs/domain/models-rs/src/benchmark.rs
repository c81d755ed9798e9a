// [libs/domain/models-rs/src/benchmark.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::AttackMode;

/// Clave de caché de benchmark: un agente medido contra una combinación
/// concreta de modo de ataque, tipo de hash y conteo de sales.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BenchmarkKey {
    pub agent_id: String,
    pub attack_mode: AttackMode,
    pub hash_type_id: u32,
    pub salt_count: Option<u64>,
}

/// Velocidad medida (candidatos/segundo) para una clave de benchmark.
/// El `reported_effective_keyspace` del binario es la fuente de verdad
/// que promueve un trabajo estimado a keyspace exacto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBenchmark {
    pub agent_id: String,
    pub attack_mode: AttackMode,
    pub hash_type_id: u32,
    pub salt_count: Option<u64>,
    pub speed: u64,
    pub reported_effective_keyspace: Option<u64>,
    pub measured_at: DateTime<Utc>,
}

impl AgentBenchmark {
    /// Evalúa la frescura del benchmark contra la ventana de caché.
    #[must_use]
    pub fn is_fresh(&self, cache_duration_hours: u64, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.measured_at);
        age.num_hours() >= 0 && (age.num_hours() as u64) < cache_duration_hours
    }
}

/// Estado de una solicitud de benchmark en la tabla de seguimiento.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkRequestStatus {
    Pending,
    Completed,
    Failed,
}

impl BenchmarkRequestStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Fila de seguimiento insertada por cada solicitud efectivamente
/// enviada. El ciclo de planificación bloquea sobre estas filas hasta
/// su completitud o el vencimiento de la espera acotada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub id: Uuid,
    pub agent_id: String,
    /// Presente sólo en benchmarks forzados, ligados a un trabajo.
    pub job_execution_id: Option<Uuid>,
    pub increment_layer_id: Option<Uuid>,
    pub is_forced: bool,
    pub status: BenchmarkRequestStatus,
    pub requested_at: DateTime<Utc>,
}
