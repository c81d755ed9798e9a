// [libs/domain/models-rs/src/settings.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULER SETTINGS SURFACE (V12.0 - ENV HYDRATION)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: SUPERFICIE DE CONFIGURACIÓN RECONOCIDA DEL NÚCLEO
 *
 * # Logic:
 * Cada ajuste reconocido se hidrata una sola vez desde el entorno
 * (prefijo HASHFORGE_) con un default endurecido en código. Los
 * valores malformados caen al default en lugar de abortar la ignición.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Política de distribución del excedente de agentes dentro de un
/// nivel de prioridad.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowAllocationMode {
    /// Volcado del excedente sobre el trabajo más antiguo con trabajo
    /// pendiente y agentes compatibles.
    Fifo,
    /// Reparto de uno en uno entre los trabajos del nivel.
    RoundRobin,
}

impl OverflowAllocationMode {
    pub fn parse(raw_value: &str) -> Option<Self> {
        match raw_value {
            "fifo" => Some(Self::Fifo),
            "round-robin" | "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

/**
 * Superficie de configuración reconocida por el núcleo de planificación.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Tope de tareas vivas simultáneas por agente.
    pub max_concurrent_jobs_per_agent: u32,
    /// Gate de aplicación de ventanas horarias por agente.
    pub agent_scheduling_enabled: bool,
    /// Gate del protocolo de interrupción por prioridad.
    pub job_interruption_enabled: bool,
    pub agent_overflow_allocation_mode: OverflowAllocationMode,
    /// Duración objetivo de chunk en segundos.
    pub default_chunk_duration_seconds: u64,
    /// Tolerancia de fusión de cola (porcentaje del chunk objetivo).
    pub chunk_fluctuation_percentage: u64,
    pub rule_split_enabled: bool,
    pub rule_split_min_rules: u64,
    /// Umbral de activación como múltiplo de la duración de chunk.
    pub rule_split_threshold: f64,
    pub rule_split_max_chunks: u64,
    pub benchmark_cache_duration_hours: u64,
    /// Espera acotada del ciclo sobre benchmarks pendientes (segundos).
    pub benchmark_wait_timeout_seconds: u64,
    pub potfile_batch_interval_seconds: u64,
    pub potfile_max_batch_size: u64,
    pub max_chunk_retry_attempts: u32,

    // --- COORDENADAS DE FILESYSTEM ---
    /// Binario de cracking para las consultas de metadatos de keyspace.
    pub cracking_binary_path: PathBuf,
    /// Raíz de materialización de chunks de reglas.
    pub rule_chunk_directory: PathBuf,
    /// Raíz de los potfiles global y por cliente.
    pub potfile_directory: PathBuf,
    /// Workspace de sesiones efímeras del calculador de keyspace.
    pub session_workspace: PathBuf,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs_per_agent: 1,
            agent_scheduling_enabled: false,
            job_interruption_enabled: true,
            agent_overflow_allocation_mode: OverflowAllocationMode::Fifo,
            default_chunk_duration_seconds: 1200,
            chunk_fluctuation_percentage: 20,
            rule_split_enabled: true,
            rule_split_min_rules: 100,
            rule_split_threshold: 2.0,
            rule_split_max_chunks: 1000,
            benchmark_cache_duration_hours: 168,
            benchmark_wait_timeout_seconds: 300,
            potfile_batch_interval_seconds: 60,
            potfile_max_batch_size: 100_000,
            max_chunk_retry_attempts: 3,
            cracking_binary_path: PathBuf::from("/opt/hashforge/bin/hashcat"),
            rule_chunk_directory: PathBuf::from("/var/lib/hashforge/rule-chunks"),
            potfile_directory: PathBuf::from("/var/lib/hashforge/potfiles"),
            session_workspace: PathBuf::from("/var/lib/hashforge/sessions"),
        }
    }
}

impl SchedulerSettings {
    /**
     * Hidrata la superficie completa desde el entorno del proceso.
     * Toda variable ausente o malformada conserva su default endurecido.
     */
    #[must_use]
    pub fn from_environment() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs_per_agent: parse_env(
                "HASHFORGE_MAX_CONCURRENT_JOBS_PER_AGENT",
                defaults.max_concurrent_jobs_per_agent,
            ),
            agent_scheduling_enabled: parse_env(
                "HASHFORGE_AGENT_SCHEDULING_ENABLED",
                defaults.agent_scheduling_enabled,
            ),
            job_interruption_enabled: parse_env(
                "HASHFORGE_JOB_INTERRUPTION_ENABLED",
                defaults.job_interruption_enabled,
            ),
            agent_overflow_allocation_mode: env::var("HASHFORGE_AGENT_OVERFLOW_ALLOCATION_MODE")
                .ok()
                .and_then(|raw| OverflowAllocationMode::parse(raw.trim()))
                .unwrap_or(defaults.agent_overflow_allocation_mode),
            default_chunk_duration_seconds: parse_env(
                "HASHFORGE_DEFAULT_CHUNK_DURATION",
                defaults.default_chunk_duration_seconds,
            ),
            chunk_fluctuation_percentage: parse_env(
                "HASHFORGE_CHUNK_FLUCTUATION_PERCENTAGE",
                defaults.chunk_fluctuation_percentage,
            ),
            rule_split_enabled: parse_env("HASHFORGE_RULE_SPLIT_ENABLED", defaults.rule_split_enabled),
            rule_split_min_rules: parse_env(
                "HASHFORGE_RULE_SPLIT_MIN_RULES",
                defaults.rule_split_min_rules,
            ),
            rule_split_threshold: parse_env(
                "HASHFORGE_RULE_SPLIT_THRESHOLD",
                defaults.rule_split_threshold,
            ),
            rule_split_max_chunks: parse_env(
                "HASHFORGE_RULE_SPLIT_MAX_CHUNKS",
                defaults.rule_split_max_chunks,
            ),
            benchmark_cache_duration_hours: parse_env(
                "HASHFORGE_BENCHMARK_CACHE_DURATION_HOURS",
                defaults.benchmark_cache_duration_hours,
            ),
            benchmark_wait_timeout_seconds: parse_env(
                "HASHFORGE_BENCHMARK_WAIT_TIMEOUT_SECONDS",
                defaults.benchmark_wait_timeout_seconds,
            ),
            potfile_batch_interval_seconds: parse_env(
                "HASHFORGE_POTFILE_BATCH_INTERVAL",
                defaults.potfile_batch_interval_seconds,
            ),
            potfile_max_batch_size: parse_env(
                "HASHFORGE_POTFILE_MAX_BATCH_SIZE",
                defaults.potfile_max_batch_size,
            ),
            max_chunk_retry_attempts: parse_env(
                "HASHFORGE_MAX_CHUNK_RETRY_ATTEMPTS",
                defaults.max_chunk_retry_attempts,
            ),
            cracking_binary_path: parse_env_path(
                "HASHFORGE_CRACKING_BINARY_PATH",
                defaults.cracking_binary_path,
            ),
            rule_chunk_directory: parse_env_path(
                "HASHFORGE_RULE_CHUNK_DIRECTORY",
                defaults.rule_chunk_directory,
            ),
            potfile_directory: parse_env_path(
                "HASHFORGE_POTFILE_DIRECTORY",
                defaults.potfile_directory,
            ),
            session_workspace: parse_env_path(
                "HASHFORGE_SESSION_WORKSPACE",
                defaults.session_workspace,
            ),
        }
    }

    /// Umbral absoluto (segundos) de activación de fragmentación de
    /// reglas para una duración de chunk dada.
    #[must_use]
    pub fn rule_split_trigger_seconds(&self, chunk_duration_seconds: u64) -> f64 {
        chunk_duration_seconds as f64 * self.rule_split_threshold
    }
}

/// Lectura tipada de una variable de entorno con default endurecido.
fn parse_env<T: std::str::FromStr>(variable_name: &str, default_value: T) -> T {
    env::var(variable_name)
        .ok()
        .and_then(|raw_value| raw_value.trim().parse::<T>().ok())
        .unwrap_or(default_value)
}

fn parse_env_path(variable_name: &str, default_value: PathBuf) -> PathBuf {
    env::var(variable_name)
        .ok()
        .map(PathBuf::from)
        .unwrap_or(default_value)
}
