// [libs/domain/models-rs/src/task.rs]
//! =================================================================
//! APARATO: JOB TASK DOMAIN MODEL (V27.0 - CHUNK LEDGER)
//! CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
//! RESPONSABILIDAD: UNIDAD ATÓMICA DE TRABAJO DESPACHADA A UN AGENTE
//! =================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ciclo de vida de un chunk. `Stopping` modela la interrupción
/// cooperativa: el agente conserva la propiedad hasta su acuse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Stopping,
    Completed,
    Failed,
    Cancelled,
    ReconnectPending,
}

impl TaskStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Determina si el chunk retiene la propiedad de su agente.
    /// Un agente vuelve a ser elegible en cuanto su tarea abandona
    /// los estados de ejecución activa.
    #[must_use]
    pub fn holds_agent(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Assigned | Self::Running | Self::Stopping
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::ReconnectPending => "reconnect_pending",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "running" => Some(Self::Running),
            "stopping" => Some(Self::Stopping),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "reconnect_pending" => Some(Self::ReconnectPending),
            _ => None,
        }
    }
}

/**
 * Chunk soberano: sub-rango acotado de keyspace o de índices de regla,
 * dimensionado para una duración de pared objetivo y asignado a un
 * único agente.
 *
 * # Invariantes:
 * - `keyspace_start < keyspace_end`, ambos dentro de `[0, base_keyspace]`.
 * - Para tareas de fragmentación de reglas, `rule_start_index < rule_end_index`
 *   y el fichero de chunk existe mientras la tarea no sea terminal.
 * - La unión de rangos de un trabajo cubre `[0, base_keyspace)` sin
 *   solapamiento en el momento del despacho de cada uno.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTask {
    pub id: Uuid,
    pub job_execution_id: Uuid,
    pub increment_layer_id: Option<Uuid>,
    pub agent_id: Option<String>,
    pub status: TaskStatus,
    /// Instantánea de la prioridad del trabajo al momento de planificar.
    pub priority: i64,
    /// Comando de ataque serializado tal como lo ejecutará el agente.
    pub attack_cmd: String,

    // --- RANGO EN UNIDADES BASE ---
    pub keyspace_start: u64,
    pub keyspace_end: u64,
    pub keyspace_processed: u64,

    // --- RANGO EN UNIDADES EFECTIVAS ---
    pub effective_keyspace_start: u64,
    pub effective_keyspace_end: u64,
    pub effective_keyspace_processed: u64,

    // --- ESTRATEGIA DE FRAGMENTACIÓN ---
    pub is_keyspace_split: bool,
    pub is_rule_split_task: bool,
    pub rule_start_index: Option<u64>,
    pub rule_end_index: Option<u64>,
    pub rule_chunk_path: Option<String>,

    pub chunk_number: u32,
    /// Duración objetivo (segundos) usada al dimensionar el chunk.
    pub chunk_duration: u64,
    /// Velocidad de benchmark (candidatos/s) usada al dimensionar.
    pub benchmark_speed: u64,
    pub retry_count: u32,
    pub last_checkpoint: Option<DateTime<Utc>>,

    /// Keyspace real reportado por el binario al completar el chunk.
    pub chunk_actual_keyspace: u64,
    pub is_actual_keyspace: bool,

    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobTask {
    /// Volumen efectivo planificado para este chunk.
    #[must_use]
    pub fn planned_effective_span(&self) -> u64 {
        self.effective_keyspace_end
            .saturating_sub(self.effective_keyspace_start)
    }
}
