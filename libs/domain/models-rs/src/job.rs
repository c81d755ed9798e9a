// [libs/domain/models-rs/src/job.rs]
/*!
 * =================================================================
 * APARATO: JOB EXECUTION DOMAIN MODELS (V42.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICIÓN DE CONTRATOS SOBERANOS DE EJECUCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. KEYSPACE ALGEBRA: Cristaliza la distinción entre keyspace base
 *    (candidatos del diccionario/máscara) y keyspace efectivo
 *    (evaluaciones reales tras reglas y sales).
 * 2. INCREMENT LAYERING: Modela los sub-trabajos por longitud de
 *    máscara como entidades de primera clase con progreso propio.
 * 3. NOMINAL PRECISION: Nomenclatura nominal absoluta en todos los campos.
 *
 * # Mathematical Proof (Keyspace Consistency):
 * effective = base × multiplicador, donde el multiplicador colapsa
 * reglas y sales en un solo factor entero ≥ 1. Toda la contabilidad
 * de despacho y progreso se deriva de esta identidad.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Modos de generación de candidatos soportados por el binario de cracking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    /// Diccionario directo, con reglas opcionales de amplificación.
    Straight,
    /// Producto cartesiano de dos diccionarios.
    Combination,
    /// Fuerza bruta dirigida por máscara.
    BruteForce,
    /// Híbrido: diccionario a la izquierda, máscara a la derecha.
    HybridWordlistMask,
    /// Híbrido: máscara a la izquierda, diccionario a la derecha.
    HybridMaskWordlist,
    /// Asociación hash-a-candidato. El binario no expone metadatos
    /// de keyspace para este modo.
    Association,
}

impl AttackMode {
    /// Valor numérico del modo en la interfaz argv del binario.
    #[must_use]
    pub fn binary_mode_flag(&self) -> u8 {
        match self {
            Self::Straight => 0,
            Self::Combination => 1,
            Self::BruteForce => 3,
            Self::HybridWordlistMask => 6,
            Self::HybridMaskWordlist => 7,
            Self::Association => 9,
        }
    }

    /// Representación textual estable para el Ledger.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Straight => "straight",
            Self::Combination => "combination",
            Self::BruteForce => "brute_force",
            Self::HybridWordlistMask => "hybrid_wordlist_mask",
            Self::HybridMaskWordlist => "hybrid_mask_wordlist",
            Self::Association => "association",
        }
    }

    /// Hidratación inversa desde el rastro de persistencia.
    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "straight" => Some(Self::Straight),
            "combination" => Some(Self::Combination),
            "brute_force" => Some(Self::BruteForce),
            "hybrid_wordlist_mask" => Some(Self::HybridWordlistMask),
            "hybrid_mask_wordlist" => Some(Self::HybridMaskWordlist),
            "association" => Some(Self::Association),
            _ => None,
        }
    }
}

/// Política de incremento de longitud de máscara.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IncrementMode {
    Off,
    Increment,
    IncrementInverse,
}

impl IncrementMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Increment => "increment",
            Self::IncrementInverse => "increment_inverse",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "off" => Some(Self::Off),
            "increment" => Some(Self::Increment),
            "increment_inverse" => Some(Self::IncrementInverse),
            _ => None,
        }
    }
}

/// Ciclo de vida soberano de una orden de ejecución.
/// Los estados terminales son absorbentes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Determina si el estado es absorbente (ninguna transición posterior).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Determina si el trabajo es candidato al ciclo de planificación.
    #[must_use]
    pub fn is_schedulable(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Configuración técnica del ataque: artefactos de entrada y política
/// de incremento. Inmutable tras la creación del trabajo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfiguration {
    pub attack_mode: AttackMode,
    /// Diccionarios en orden posicional (el modo combinación usa dos).
    pub wordlist_ids: Vec<String>,
    /// Ficheros de reglas en orden posicional.
    pub rule_ids: Vec<String>,
    /// Máscara para los modos de fuerza bruta e híbridos.
    pub mask: Option<String>,
    pub increment_mode: IncrementMode,
    pub increment_minimum: u32,
    pub increment_maximum: u32,
}

impl AttackConfiguration {
    /// Determina si el ataque genera capas de incremento.
    #[must_use]
    pub fn is_incremental(&self) -> bool {
        self.increment_mode != IncrementMode::Off
    }
}

/**
 * Orden de ejecución soberana: un trabajo lógico de cracking sobre
 * una hashlist, fragmentado en chunks por el planificador.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    /// Identificador único universal del trabajo.
    pub id: Uuid,
    pub hashlist_id: String,
    pub hash_type_id: u32,
    pub attack: AttackConfiguration,
    /// Patrón de versión de binario exigido (gramática `default|M.x|M.N.x|M.N.P[-sufijo]`).
    pub binary_version_pattern: String,
    /// Prioridad entera; mayor gana. Gobierna los buckets de asignación.
    pub priority: i64,
    /// Tope de agentes concurrentes. Cero = ilimitado.
    pub max_agents: u32,
    /// Duración objetivo de chunk en segundos. Cero = usar el default global.
    pub chunk_size_seconds: u64,
    pub status: JobStatus,

    // --- ÁLGEBRA DE KEYSPACE ---
    /// Candidatos del artefacto subyacente, sin amplificación de reglas ni sales.
    pub base_keyspace: u64,
    /// Evaluaciones totales que el binario ejecutará de extremo a extremo.
    pub effective_keyspace: u64,
    /// round(effective / base), acotado inferiormente a 1.
    pub multiplication_factor: u64,
    /// true sólo si effective_keyspace proviene del propio binario.
    pub is_accurate_keyspace: bool,

    // --- ESTRATEGIA DE FRAGMENTACIÓN ---
    /// Inmutable una vez fijado en true (previene deriva contable).
    pub uses_rule_splitting: bool,
    pub rule_split_count: u32,
    pub avg_rule_multiplier: f64,

    // --- CONTABILIDAD DE PROGRESO (unidades efectivas) ---
    pub processed_keyspace: u64,
    pub dispatched_keyspace: u64,
    /// Acotado a [0, 100] por el agregador.
    pub overall_progress_percent: f64,

    pub consecutive_failures: u32,
    /// Causa visible para el usuario ante un fallo terminal.
    pub error_message: Option<String>,
    pub allow_high_priority_override: bool,
    /// true para el trabajo preset del sistema cuyo keyspace es el
    /// conteo de líneas del potfile global.
    pub is_system_preset: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

impl JobExecution {
    /// Recalcula el factor de multiplicación a partir de la identidad
    /// effective = base × factor. Acotado inferiormente a 1.
    #[must_use]
    pub fn derive_multiplication_factor(base_keyspace: u64, effective_keyspace: u64) -> u64 {
        if base_keyspace == 0 {
            return 1;
        }
        let ratio = effective_keyspace as f64 / base_keyspace as f64;
        (ratio.round() as u64).max(1)
    }

    /// Duración de chunk vigente para este trabajo.
    #[must_use]
    pub fn chunk_duration_or(&self, default_chunk_duration_seconds: u64) -> u64 {
        if self.chunk_size_seconds > 0 {
            self.chunk_size_seconds
        } else {
            default_chunk_duration_seconds
        }
    }
}

/// Sub-trabajo por longitud de máscara de un trabajo en modo incremento.
/// Hereda prioridad y tope de agentes del padre en la asignación.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIncrementLayer {
    pub id: Uuid,
    pub job_execution_id: Uuid,
    /// Posición de la capa dentro de la secuencia de incremento.
    pub layer_index: u32,
    /// Máscara concreta de esta longitud.
    pub mask: String,
    pub base_keyspace: u64,
    pub effective_keyspace: u64,
    pub is_accurate_keyspace: bool,
    pub dispatched_keyspace: u64,
    pub processed_keyspace: u64,
    pub status: JobStatus,
    pub overall_progress_percent: f64,
}
