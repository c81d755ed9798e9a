// [libs/domain/models-rs/src/messages.rs]
/*!
 * =================================================================
 * APARATO: AGENT UPLINK MESSAGE CONTRACTS (V19.0 - WIRE PARITY)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SOBRES DE TRANSPORTE ENTRE NÚCLEO Y FLOTA
 *
 * # Logic:
 * Las directivas salientes viajan etiquetadas por tipo para que el
 * agente despache sin ambigüedad; los reportes entrantes son payloads
 * planos consumidos por los handlers del enjambre. El framing y la
 * autenticación del canal son responsabilidad del transporte externo.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::DeviceMetric;
use crate::job::AttackMode;

/// Directiva saliente del núcleo hacia un agente concreto.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "directive_type", content = "payload", rename_all = "snake_case")]
pub enum AgentDirective {
    JobAssignment(JobAssignmentPayload),
    BenchmarkRequest(BenchmarkRequestPayload),
    JobStop(JobStopPayload),
    SyncFiles(SyncFilesPayload),
}

/// Asignación de chunk: todo lo que el agente necesita para ejecutar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAssignmentPayload {
    pub task_id: Uuid,
    /// Comando de ataque serializado con skip/limit o ruta de chunk
    /// de reglas ya sustituidos.
    pub attack_cmd: String,
    pub keyspace_start: u64,
    pub keyspace_end: u64,
    pub effective_keyspace_start: u64,
    pub effective_keyspace_end: u64,
    /// Identificador del binario concreto resuelto por versión.
    pub binary_reference: String,
    /// Artefactos que el agente debe tener sincronizados en disco.
    pub file_references: Vec<String>,
}

/// Solicitud de calibración de velocidad.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequestPayload {
    pub request_id: Uuid,
    pub job_execution_id: Option<Uuid>,
    pub increment_layer_id: Option<Uuid>,
    /// Máscara concreta de la capa cuando el benchmark es por capa.
    pub layer_mask: Option<String>,
    pub attack_mode: AttackMode,
    pub hash_type_id: u32,
}

/// Orden de detención cooperativa de un chunk en ejecución.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStopPayload {
    pub task_id: Uuid,
    pub reason: String,
}

/// Solicitud de sincronización de artefactos faltantes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFilesPayload {
    pub required_wordlists: Vec<String>,
    pub required_rules: Vec<String>,
    pub required_binary: Option<String>,
    pub required_hashlist: Option<String>,
}

// --- REPORTES ENTRANTES (AGENTE -> NÚCLEO) ---

/// Pulso de progreso de un chunk activo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgressReport {
    pub task_id: Uuid,
    pub keyspace_processed: u64,
    pub effective_progress: u64,
    pub hash_rate: u64,
    pub progress_percent: f64,
    pub device_metrics: Vec<DeviceMetric>,
}

/// Certificación de chunk finalizado con el keyspace real observado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletedReport {
    pub task_id: Uuid,
    pub chunk_actual_keyspace: u64,
    pub is_actual_keyspace: bool,
    pub crack_count: u64,
    pub detailed_status: String,
}

/// Reporte de fallo de chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailedReport {
    pub task_id: Uuid,
    pub error_message: String,
}

/// Resultado de benchmark, genérico o forzado.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResultReport {
    /// Presente cuando el agente responde a una solicitud rastreada.
    pub request_id: Option<Uuid>,
    pub agent_id: String,
    pub attack_mode: AttackMode,
    pub hash_type_id: u32,
    pub salt_count: Option<u64>,
    pub speed: u64,
    /// Keyspace efectivo reportado por el binario; promueve trabajos
    /// estimados a keyspace exacto.
    pub effective_keyspace: Option<u64>,
}

/// Acuse de detención: libera la propiedad del agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStopAck {
    pub task_id: Uuid,
}

/// Contraseña crackeada reportada por un agente, opcionalmente
/// etiquetada por cliente para el enrutamiento de potfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackReport {
    pub hash_value: String,
    pub plaintext: String,
    pub client_id: Option<String>,
}
