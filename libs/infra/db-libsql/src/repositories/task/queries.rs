// [libs/infra/db-libsql/src/repositories/task/queries.rs]
/*!
 * =================================================================
 * APARATO: TASK LEDGER SQL STORE (V16.0 - CHUNK CUSTODY)
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DE SENTENCIAS ATÓMICAS PARA CHUNKS
 *
 * # Mathematical Proof (Non-Overlap Custody):
 * El cursor de despacho es MAX(keyspace_end) observado en commit. Dado
 * que la planificación del ciclo es serial y cada chunk se cristaliza
 * antes de planificar el siguiente, dos chunks del mismo (trabajo,
 * capa) jamás solapan su rango base.
 * =================================================================
 */

/// Proyección canónica de columnas de un chunk.
pub const TASK_COLUMNS: &str = r#"
    id, job_execution_id, increment_layer_id, agent_id, status, priority,
    attack_cmd, keyspace_start, keyspace_end, keyspace_processed,
    effective_keyspace_start, effective_keyspace_end, effective_keyspace_processed,
    is_keyspace_split, is_rule_split_task, rule_start_index, rule_end_index,
    rule_chunk_path, chunk_number, chunk_duration, benchmark_speed,
    retry_count, last_checkpoint, chunk_actual_keyspace, is_actual_keyspace,
    created_at, assigned_at, updated_at
"#;

/// Cristaliza un chunk recién planificado (fase serial del ciclo).
pub const INSERT_TASK: &str = r#"
    INSERT INTO job_tasks (
        id, job_execution_id, increment_layer_id, agent_id, status, priority,
        attack_cmd, keyspace_start, keyspace_end, keyspace_processed,
        effective_keyspace_start, effective_keyspace_end, effective_keyspace_processed,
        is_keyspace_split, is_rule_split_task, rule_start_index, rule_end_index,
        rule_chunk_path, chunk_number, chunk_duration, benchmark_speed,
        retry_count, last_checkpoint, chunk_actual_keyspace, is_actual_keyspace,
        created_at, assigned_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
        ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
    )
"#;

// --- ESTRATO DE CURSORES ---

/// Frontera de despacho en unidades base para un trabajo plano.
pub const BASE_CURSOR_FOR_JOB: &str = r#"
    SELECT COALESCE(MAX(keyspace_end), 0) FROM job_tasks
    WHERE job_execution_id = ?1 AND increment_layer_id IS NULL
"#;

/// Frontera de despacho en unidades base para una capa concreta.
pub const BASE_CURSOR_FOR_LAYER: &str = r#"
    SELECT COALESCE(MAX(keyspace_end), 0) FROM job_tasks
    WHERE increment_layer_id = ?1
"#;

/// Frontera de despacho en la dimensión de reglas.
pub const RULE_CURSOR_FOR_JOB: &str = r#"
    SELECT COALESCE(MAX(rule_end_index), 0) FROM job_tasks
    WHERE job_execution_id = ?1 AND is_rule_split_task = 1
"#;

/// Número de chunk siguiente dentro del trabajo.
pub const NEXT_CHUNK_NUMBER: &str = r#"
    SELECT COALESCE(MAX(chunk_number), 0) + 1 FROM job_tasks
    WHERE job_execution_id = ?1
"#;

// --- ESTRATO DE INVENTARIO ---

/// Chunks de un trabajo (todas las capas).
pub const FETCH_FOR_JOB: &str = r#"
    SELECT {columns} FROM job_tasks
    WHERE job_execution_id = ?1
    ORDER BY chunk_number ASC
"#;

/// Chunks vivos (planificados, asignados o en ejecución) del sistema.
pub const FETCH_LIVE: &str = r#"
    SELECT {columns} FROM job_tasks
    WHERE status IN ('pending', 'assigned', 'running', 'stopping', 'reconnect_pending')
"#;

/// Chunk de reglas reasignable: pendiente y sin agente propietario.
pub const FETCH_REASSIGNABLE_RULE_TASK: &str = r#"
    SELECT {columns} FROM job_tasks
    WHERE job_execution_id = ?1
      AND is_rule_split_task = 1
      AND status = 'pending'
      AND agent_id IS NULL
    ORDER BY rule_start_index ASC
    LIMIT 1
"#;

/// Chunks interrumpibles para la preempción: prioridad inferior a la
/// entrante, más nuevos primero dentro de la prioridad más antigua.
pub const FETCH_INTERRUPTIBLE: &str = r#"
    SELECT {columns} FROM job_tasks
    WHERE status IN ('assigned', 'running')
      AND priority < ?1
    ORDER BY priority ASC, created_at DESC
"#;

/// Conteo de chunks no terminales de un trabajo.
pub const COUNT_INCOMPLETE: &str = r#"
    SELECT COUNT(*) FROM job_tasks
    WHERE job_execution_id = ?1
      AND status NOT IN ('completed', 'failed', 'cancelled')
"#;

/// Detección de fallo permanente en el trabajo.
pub const COUNT_FAILED: &str = r#"
    SELECT COUNT(*) FROM job_tasks
    WHERE job_execution_id = ?1 AND status = 'failed'
"#;

/// Chunks vivos por agente (tope de concurrencia por agente).
pub const COUNT_LIVE_PER_AGENT: &str = r#"
    SELECT agent_id, COUNT(*) FROM job_tasks
    WHERE status IN ('pending', 'assigned', 'running', 'stopping')
      AND agent_id IS NOT NULL
    GROUP BY agent_id
"#;

// --- ESTRATO DE TRANSICIONES ---

/// Compromete el chunk con un agente concreto.
pub const ASSIGN_AGENT: &str = r#"
    UPDATE job_tasks
    SET agent_id = ?2, status = 'assigned', assigned_at = ?3, updated_at = ?3
    WHERE id = ?1
"#;

/// Pulso de progreso desde el agente.
pub const UPDATE_PROGRESS: &str = r#"
    UPDATE job_tasks
    SET keyspace_processed = ?2,
        effective_keyspace_processed = ?3,
        status = 'running',
        last_checkpoint = ?4,
        updated_at = ?4
    WHERE id = ?1 AND status IN ('assigned', 'running', 'reconnect_pending')
"#;

/// Certificación de chunk completado con keyspace real.
pub const MARK_COMPLETED: &str = r#"
    UPDATE job_tasks
    SET status = 'completed',
        chunk_actual_keyspace = ?2,
        is_actual_keyspace = ?3,
        effective_keyspace_processed = ?4,
        updated_at = ?5
    WHERE id = ?1 AND status NOT IN ('completed', 'failed', 'cancelled')
"#;

/// Transición genérica de estado con sello temporal.
pub const SET_STATUS: &str = r#"
    UPDATE job_tasks
    SET status = ?2, updated_at = ?3
    WHERE id = ?1
"#;

/// Reintento de chunk fallido: regresa a pending sin agente.
pub const RESET_FOR_RETRY: &str = r#"
    UPDATE job_tasks
    SET status = 'pending',
        agent_id = NULL,
        assigned_at = NULL,
        retry_count = retry_count + 1,
        updated_at = ?2
    WHERE id = ?1
"#;

/// Liberación del agente preservando el estado del chunk.
pub const DETACH_AGENT: &str = r#"
    UPDATE job_tasks
    SET agent_id = NULL, updated_at = ?2
    WHERE id = ?1
"#;
