// [libs/infra/db-libsql/src/schema.rs]
/**
 * =================================================================
 * APARATO: SCHEDULER DATABASE SCHEMA (V22.0 - CHUNK LEDGER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. CHUNK LEDGER: Tablas de trabajos, capas de incremento y chunks
 *    con contabilidad dual (unidades base y efectivas).
 * 2. SINGLE WRITER: Registro versionado de ocupación de agentes.
 * 3. IDEMPOTENCIA: Gestión de errores para migraciones en caliente.
 * 4. PERFORMANCE: Índices de aceleración para el ciclo de despacho.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del núcleo de planificación.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            hostname TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'inactive',
            enabled INTEGER NOT NULL DEFAULT 1,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            scheduling_enabled INTEGER NOT NULL DEFAULT 0,
            schedule_daily_start INTEGER,
            schedule_daily_end INTEGER,
            binary_version_pattern TEXT NOT NULL DEFAULT 'default',
            busy_status INTEGER NOT NULL DEFAULT 0,
            current_task_id TEXT,
            current_job_id TEXT,
            busy_version INTEGER NOT NULL DEFAULT 0,
            last_seen_at TEXT NOT NULL DEFAULT ''
        );
    "#),
    ("TABLE_HASHLISTS", r#"
        CREATE TABLE IF NOT EXISTS hashlists (
            id TEXT PRIMARY KEY,
            hash_type_id INTEGER NOT NULL,
            total_hashes INTEGER NOT NULL DEFAULT 0,
            cracked_hashes INTEGER NOT NULL DEFAULT 0,
            is_salted INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_WORDLISTS", r#"
        CREATE TABLE IF NOT EXISTS wordlists (
            id TEXT PRIMARY KEY,
            file_path TEXT NOT NULL,
            md5_hash TEXT,
            file_size INTEGER NOT NULL DEFAULT 0,
            line_count INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_JOB_EXECUTIONS", r#"
        CREATE TABLE IF NOT EXISTS job_executions (
            id TEXT PRIMARY KEY,
            hashlist_id TEXT NOT NULL,
            hash_type_id INTEGER NOT NULL,
            attack_config TEXT NOT NULL,
            binary_version_pattern TEXT NOT NULL DEFAULT 'default',
            priority INTEGER NOT NULL DEFAULT 0,
            max_agents INTEGER NOT NULL DEFAULT 0,
            chunk_size_seconds INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            base_keyspace INTEGER NOT NULL DEFAULT 0,
            effective_keyspace INTEGER NOT NULL DEFAULT 0,
            multiplication_factor INTEGER NOT NULL DEFAULT 1,
            is_accurate_keyspace INTEGER NOT NULL DEFAULT 0,
            uses_rule_splitting INTEGER NOT NULL DEFAULT 0,
            rule_split_count INTEGER NOT NULL DEFAULT 0,
            avg_rule_multiplier REAL NOT NULL DEFAULT 0.0,
            processed_keyspace INTEGER NOT NULL DEFAULT 0,
            dispatched_keyspace INTEGER NOT NULL DEFAULT 0,
            overall_progress_percent REAL NOT NULL DEFAULT 0.0,
            consecutive_failures INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            allow_high_priority_override INTEGER NOT NULL DEFAULT 0,
            is_system_preset INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            created_by TEXT
        );
    "#),
    ("TABLE_JOB_INCREMENT_LAYERS", r#"
        CREATE TABLE IF NOT EXISTS job_increment_layers (
            id TEXT PRIMARY KEY,
            job_execution_id TEXT NOT NULL,
            layer_index INTEGER NOT NULL,
            mask TEXT NOT NULL,
            base_keyspace INTEGER NOT NULL DEFAULT 0,
            effective_keyspace INTEGER NOT NULL DEFAULT 0,
            is_accurate_keyspace INTEGER NOT NULL DEFAULT 0,
            dispatched_keyspace INTEGER NOT NULL DEFAULT 0,
            processed_keyspace INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            overall_progress_percent REAL NOT NULL DEFAULT 0.0,
            FOREIGN KEY(job_execution_id) REFERENCES job_executions(id) ON DELETE CASCADE
        );
    "#),
    ("TABLE_JOB_TASKS", r#"
        CREATE TABLE IF NOT EXISTS job_tasks (
            id TEXT PRIMARY KEY,
            job_execution_id TEXT NOT NULL,
            increment_layer_id TEXT,
            agent_id TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            priority INTEGER NOT NULL DEFAULT 0,
            attack_cmd TEXT NOT NULL DEFAULT '',
            keyspace_start INTEGER NOT NULL DEFAULT 0,
            keyspace_end INTEGER NOT NULL DEFAULT 0,
            keyspace_processed INTEGER NOT NULL DEFAULT 0,
            effective_keyspace_start INTEGER NOT NULL DEFAULT 0,
            effective_keyspace_end INTEGER NOT NULL DEFAULT 0,
            effective_keyspace_processed INTEGER NOT NULL DEFAULT 0,
            is_keyspace_split INTEGER NOT NULL DEFAULT 0,
            is_rule_split_task INTEGER NOT NULL DEFAULT 0,
            rule_start_index INTEGER,
            rule_end_index INTEGER,
            rule_chunk_path TEXT,
            chunk_number INTEGER NOT NULL DEFAULT 0,
            chunk_duration INTEGER NOT NULL DEFAULT 0,
            benchmark_speed INTEGER NOT NULL DEFAULT 0,
            retry_count INTEGER NOT NULL DEFAULT 0,
            last_checkpoint TEXT,
            chunk_actual_keyspace INTEGER NOT NULL DEFAULT 0,
            is_actual_keyspace INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            assigned_at TEXT,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(job_execution_id) REFERENCES job_executions(id) ON DELETE CASCADE
        );
    "#),
    ("TABLE_AGENT_BENCHMARKS", r#"
        CREATE TABLE IF NOT EXISTS agent_benchmarks (
            agent_id TEXT NOT NULL,
            attack_mode TEXT NOT NULL,
            hash_type_id INTEGER NOT NULL,
            salt_count INTEGER NOT NULL DEFAULT 0,
            speed INTEGER NOT NULL DEFAULT 0,
            reported_effective_keyspace INTEGER,
            measured_at TEXT NOT NULL,
            PRIMARY KEY(agent_id, attack_mode, hash_type_id, salt_count)
        );
    "#),
    ("TABLE_BENCHMARK_REQUESTS", r#"
        CREATE TABLE IF NOT EXISTS benchmark_requests (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            job_execution_id TEXT,
            increment_layer_id TEXT,
            is_forced INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            requested_at TEXT NOT NULL
        );
    "#),
    ("TABLE_POTFILE_STAGING", r#"
        CREATE TABLE IF NOT EXISTS potfile_staging (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            password TEXT NOT NULL,
            hash_value TEXT NOT NULL,
            client_id TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            processed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(hash_value, password, client_id)
        );
    "#),
];

/**
 * ESTRATO 2: ENDURECIMIENTO (Índices de Aceleración)
 * Optimiza el acceso para el ciclo de despacho y el agregador.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_JOBS_STATUS", "CREATE INDEX IF NOT EXISTS idx_jobs_status ON job_executions(status, priority);"),
    ("IDX_LAYERS_JOB", "CREATE INDEX IF NOT EXISTS idx_layers_job ON job_increment_layers(job_execution_id);"),
    ("IDX_TASKS_JOB", "CREATE INDEX IF NOT EXISTS idx_tasks_job ON job_tasks(job_execution_id, status);"),
    ("IDX_TASKS_AGENT", "CREATE INDEX IF NOT EXISTS idx_tasks_agent ON job_tasks(agent_id, status);"),
    ("IDX_BENCH_REQUESTS", "CREATE INDEX IF NOT EXISTS idx_bench_requests ON benchmark_requests(status, requested_at);"),
    ("IDX_STAGING_DRAIN", "CREATE INDEX IF NOT EXISTS idx_staging_drain ON potfile_staging(processed, id);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 *
 * # Errors:
 * Retorna error si alguna tabla base falla en solidificarse, indicando
 * un colapso en el enlace con el motor libSQL.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_scheduler_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V22.0...");

    solidify_base_strata(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Scheduler Ledger V22.0 level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        match db.execute(*sql, ()).await {
            Ok(_) => debug!("  ↳ Hardened: {}", identifier),
            Err(e) => warn!("  ⚠️ [HARDENING_BYPASS]: {} check incomplete: {}", identifier, e),
        }
    }
    Ok(())
}
