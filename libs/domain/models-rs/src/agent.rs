// [libs/domain/models-rs/src/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT DOMAIN MODELS (V31.0 - SINGLE WRITER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE CAPACIDAD Y OCUPACIÓN DE LA FLOTA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VERSIONED ENGAGEMENT: La ocupación del agente es un registro
 *    versionado mutado por un único repositorio, erradicando la clase
 *    de bugs de flags 'busy' dispersos.
 * 2. SCHEDULE WINDOWS: Ventanas diarias de elegibilidad en minutos UTC.
 * 3. FAN TELEMETRY: Métrica de ventilador de primera clase en el
 *    contrato de dispositivos.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado operacional reportado por el agente.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Error,
}

impl AgentStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Error => "error",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Estado de sincronización de artefactos (diccionarios, reglas,
/// binarios, hashlists) en el disco del agente.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Registro versionado de ocupación. Toda mutación pasa por el
/// repositorio de agentes, que estampa `busy_version` para detectar
/// actualizaciones perdidas.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentEngagement {
    pub busy_status: bool,
    pub current_task_id: Option<Uuid>,
    pub current_job_id: Option<Uuid>,
    pub busy_version: i64,
}

/**
 * Nodo de cómputo externo de la flota. El núcleo no posee al agente;
 * un mapa de reservas por ciclo rastrea la intención de asignación.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub hostname: String,
    pub status: AgentStatus,
    pub enabled: bool,
    pub sync_status: SyncStatus,
    /// Gate de ventanas horarias. Sólo se evalúa si la instalación
    /// habilita 'agent_scheduling_enabled'.
    pub scheduling_enabled: bool,
    /// Minuto UTC del día (0..1440) de apertura de ventana.
    pub schedule_daily_start_minutes: Option<u32>,
    /// Minuto UTC del día (0..1440) de cierre de ventana.
    pub schedule_daily_end_minutes: Option<u32>,
    pub binary_version_pattern: String,
    pub engagement: AgentEngagement,
    pub last_seen_at: DateTime<Utc>,
}

impl Agent {
    /// Evalúa la ventana horaria diaria contra un minuto UTC dado.
    /// Ventanas que cruzan medianoche (start > end) son válidas.
    #[must_use]
    pub fn is_inside_schedule_window(&self, minute_of_day_utc: u32) -> bool {
        match (self.schedule_daily_start_minutes, self.schedule_daily_end_minutes) {
            (Some(window_start), Some(window_end)) => {
                if window_start <= window_end {
                    minute_of_day_utc >= window_start && minute_of_day_utc < window_end
                } else {
                    minute_of_day_utc >= window_start || minute_of_day_utc < window_end
                }
            }
            // Sin ventana declarada: el agente es elegible a toda hora.
            _ => true,
        }
    }
}

/// Telemetría por dispositivo adjunta a los reportes de progreso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceMetric {
    pub device_name: String,
    pub temperature_celsius: f64,
    pub utilization_percent: f64,
    pub hash_rate: u64,
    /// Métrica de ventilador de primera clase (no un alias de potencia).
    pub fan_speed_percent: f64,
}
