// [libs/infra/db-libsql/src/repositories/job/queries.rs]
/*!
 * =================================================================
 * APARATO: JOB LEDGER SQL STORE (V14.0 - EXECUTION LIFECYCLE)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DE SENTENCIAS ATÓMICAS PARA TRABAJOS
 *
 * # Mathematical Proof (ACID Consistency):
 * Las transiciones de estado usan guardias (WHERE status = ...) para
 * garantizar que los estados terminales sean absorbentes y que la
 * completitud sea idempotente en el cluster libSQL.
 * =================================================================
 */

/// Proyección canónica de columnas de un trabajo. Todo SELECT de esta
/// tabla usa este orden; el mapeador depende de él.
pub const JOB_COLUMNS: &str = r#"
    id, hashlist_id, hash_type_id, attack_config, binary_version_pattern,
    priority, max_agents, chunk_size_seconds, status,
    base_keyspace, effective_keyspace, multiplication_factor, is_accurate_keyspace,
    uses_rule_splitting, rule_split_count, avg_rule_multiplier,
    processed_keyspace, dispatched_keyspace, overall_progress_percent,
    consecutive_failures, error_message, allow_high_priority_override,
    is_system_preset, created_at, started_at, completed_at, created_by
"#;

// --- ESTRATO DE IGNICIÓN ---

/// Cristaliza una nueva orden de ejecución en el Ledger.
pub const INSERT_JOB: &str = r#"
    INSERT INTO job_executions (
        id, hashlist_id, hash_type_id, attack_config, binary_version_pattern,
        priority, max_agents, chunk_size_seconds, status,
        base_keyspace, effective_keyspace, multiplication_factor, is_accurate_keyspace,
        uses_rule_splitting, rule_split_count, avg_rule_multiplier,
        processed_keyspace, dispatched_keyspace, overall_progress_percent,
        consecutive_failures, error_message, allow_high_priority_override,
        is_system_preset, created_at, started_at, completed_at, created_by
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
        ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
    )
"#;

// --- ESTRATO DE PLANIFICACIÓN ---

/// Inventario de trabajos candidatos al ciclo, priorizados.
pub const FETCH_SCHEDULABLE: &str = r#"
    SELECT {columns} FROM job_executions
    WHERE status IN ('pending', 'running')
    ORDER BY priority DESC, created_at ASC
"#;

/// Trabajos activos más los completados dentro de la ventana de gracia
/// del agregador (reportes tardíos de chunks).
pub const FETCH_FOR_AGGREGATION: &str = r#"
    SELECT {columns} FROM job_executions
    WHERE status IN ('pending', 'running', 'paused')
       OR (status = 'completed' AND completed_at >= ?1)
"#;

/// Recupera el trabajo preset del sistema (potfile).
pub const FETCH_SYSTEM_PRESET: &str = r#"
    SELECT {columns} FROM job_executions
    WHERE is_system_preset = 1
    LIMIT 1
"#;

// --- ESTRATO DE KEYSPACE ---

/// Sella el veredicto del calculador de keyspace.
pub const RECORD_KEYSPACE: &str = r#"
    UPDATE job_executions
    SET base_keyspace = ?2,
        effective_keyspace = ?3,
        multiplication_factor = ?4,
        is_accurate_keyspace = ?5
    WHERE id = ?1
"#;

/// Promoción a keyspace exacto desde un benchmark forzado.
pub const PROMOTE_ACCURATE: &str = r#"
    UPDATE job_executions
    SET effective_keyspace = ?2,
        multiplication_factor = ?3,
        is_accurate_keyspace = 1
    WHERE id = ?1 AND is_accurate_keyspace = 0
"#;

/// Fija la estrategia de fragmentación por reglas (inmutable: sólo 0 → 1).
pub const ENABLE_RULE_SPLITTING: &str = r#"
    UPDATE job_executions
    SET uses_rule_splitting = 1,
        rule_split_count = ?2,
        avg_rule_multiplier = ?3
    WHERE id = ?1 AND uses_rule_splitting = 0
"#;

// --- ESTRATO DE CICLO DE VIDA ---

/// Transición pending → running al primer despacho exitoso.
pub const MARK_RUNNING: &str = r#"
    UPDATE job_executions
    SET status = 'running', started_at = ?2
    WHERE id = ?1 AND status = 'pending'
"#;

/// Sella la completitud con el keyspace efectivo reconciliado.
pub const MARK_COMPLETED: &str = r#"
    UPDATE job_executions
    SET status = 'completed',
        completed_at = ?2,
        effective_keyspace = ?3,
        dispatched_keyspace = ?3,
        processed_keyspace = ?3,
        overall_progress_percent = 100.0
    WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')
"#;

/// Transición terminal a fallo con causa visible.
pub const MARK_FAILED: &str = r#"
    UPDATE job_executions
    SET status = 'failed',
        completed_at = ?2,
        error_message = ?3
    WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')
"#;

/// Pausa por interrupción de prioridad superior.
pub const MARK_INTERRUPTED: &str = r#"
    UPDATE job_executions
    SET status = 'paused', error_message = ?2
    WHERE id = ?1 AND status = 'running'
"#;

/// Transición no-terminal genérica (recuperación de arranque).
pub const SET_STATUS_NON_TERMINAL: &str = r#"
    UPDATE job_executions
    SET status = ?2
    WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')
"#;

/// Contabilidad de fallos consecutivos de chunks del trabajo.
pub const BUMP_CONSECUTIVE_FAILURES: &str = r#"
    UPDATE job_executions
    SET consecutive_failures = consecutive_failures + 1
    WHERE id = ?1
"#;

/// Actualización de contabilidad de progreso del agregador.
pub const UPDATE_PROGRESS: &str = r#"
    UPDATE job_executions
    SET processed_keyspace = ?2,
        dispatched_keyspace = ?3,
        overall_progress_percent = ?4
    WHERE id = ?1
"#;

// --- ESTRATO DE CAPAS DE INCREMENTO ---

/// Proyección canónica de una capa de incremento.
pub const LAYER_COLUMNS: &str = r#"
    id, job_execution_id, layer_index, mask,
    base_keyspace, effective_keyspace, is_accurate_keyspace,
    dispatched_keyspace, processed_keyspace, status, overall_progress_percent
"#;

/// Cristaliza una capa de incremento.
pub const INSERT_LAYER: &str = r#"
    INSERT INTO job_increment_layers (
        id, job_execution_id, layer_index, mask,
        base_keyspace, effective_keyspace, is_accurate_keyspace,
        dispatched_keyspace, processed_keyspace, status, overall_progress_percent
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
"#;

/// Capas de un trabajo en orden de incremento.
pub const FETCH_LAYERS: &str = r#"
    SELECT {columns} FROM job_increment_layers
    WHERE job_execution_id = ?1
    ORDER BY layer_index ASC
"#;

/// Capa concreta por identificador.
pub const FETCH_LAYER: &str = r#"
    SELECT {columns} FROM job_increment_layers
    WHERE id = ?1
"#;

/// Sella el veredicto de keyspace de una capa.
pub const RECORD_LAYER_KEYSPACE: &str = r#"
    UPDATE job_increment_layers
    SET base_keyspace = ?2, effective_keyspace = ?3, is_accurate_keyspace = ?4
    WHERE id = ?1
"#;

/// Contabilidad de progreso de una capa.
pub const UPDATE_LAYER_PROGRESS: &str = r#"
    UPDATE job_increment_layers
    SET processed_keyspace = ?2,
        dispatched_keyspace = ?3,
        overall_progress_percent = ?4,
        status = ?5
    WHERE id = ?1
"#;
