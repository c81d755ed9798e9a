// [libs/infra/db-libsql/src/repositories/task/mod.rs]
/*!
 * =================================================================
 * APARATO: TASK REPOSITORY (V24.0 - CHUNK CUSTODY GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CUSTODIA DEL LEDGER DE CHUNKS Y SUS CURSORES
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SERIAL CUSTODY: Los chunks se cristalizan durante la fase serial
 *    del ciclo; los cursores MAX() garantizan no-solapamiento.
 * 2. RETRY DISCIPLINE: El reintento regresa el chunk a pending sin
 *    agente e incrementa el contador; el orquestador decide el fallo
 *    permanente contra el tope configurado.
 * 3. RECOVERY SCANS: Inventario de chunks vivos para la recuperación
 *    de arranque y la purga de ocupaciones obsoletas.
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::{params, Row};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use self::queries as sql_registry;
use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};
use hashforge_domain_models::task::{JobTask, TaskStatus};

/**
 * Repositorio de autoridad única para el Ledger de chunks.
 */
pub struct TaskRepository {
    database_client: LedgerClient,
}

impl TaskRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // =============================================================
    // ESTRATO DE CRISTALIZACIÓN Y LECTURA
    // =============================================================

    /// Cristaliza un chunk planificado. Debe invocarse dentro de la
    /// fase serial del ciclo para preservar el no-solapamiento.
    #[instrument(skip(self, task), fields(task = %task.id, job = %task.job_execution_id))]
    pub async fn insert_task(&self, task: &JobTask) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::INSERT_TASK,
                params![
                    task.id.to_string(),
                    task.job_execution_id.to_string(),
                    task.increment_layer_id.map(|layer_id| layer_id.to_string()),
                    task.agent_id.clone(),
                    task.status.as_str(),
                    task.priority,
                    task.attack_cmd.clone(),
                    task.keyspace_start as i64,
                    task.keyspace_end as i64,
                    task.keyspace_processed as i64,
                    task.effective_keyspace_start as i64,
                    task.effective_keyspace_end as i64,
                    task.effective_keyspace_processed as i64,
                    if task.is_keyspace_split { 1 } else { 0 },
                    if task.is_rule_split_task { 1 } else { 0 },
                    task.rule_start_index.map(|index| index as i64),
                    task.rule_end_index.map(|index| index as i64),
                    task.rule_chunk_path.clone(),
                    task.chunk_number as i64,
                    task.chunk_duration as i64,
                    task.benchmark_speed as i64,
                    task.retry_count as i64,
                    task.last_checkpoint.map(|stamp| stamp.to_rfc3339()),
                    task.chunk_actual_keyspace as i64,
                    if task.is_actual_keyspace { 1 } else { 0 },
                    task.created_at.to_rfc3339(),
                    task.assigned_at.map(|stamp| stamp.to_rfc3339()),
                    task.updated_at.to_rfc3339()
                ],
            )
            .await?;

        debug!(
            "🧱 [TASK_LEDGER]: Chunk #{} [{}, {}) crystallized for job {}.",
            task.chunk_number, task.keyspace_start, task.keyspace_end, task.job_execution_id
        );
        Ok(())
    }

    /// Recupera un chunk por identificador.
    pub async fn fetch_task(&self, task_id: &Uuid) -> Result<JobTask, DbError> {
        self.try_fetch_task(task_id).await?.ok_or(DbError::TaskNotFound)
    }

    /// Variante tolerante a ausencia.
    pub async fn try_fetch_task(&self, task_id: &Uuid) -> Result<Option<JobTask>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = format!(
            "SELECT {} FROM job_tasks WHERE id = ?1",
            sql_registry::TASK_COLUMNS
        );
        let mut query_result = connection.query(&select_sql, params![task_id.to_string()]).await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_task_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Chunks de un trabajo (todas sus capas) en orden de despacho.
    pub async fn fetch_tasks_for_job(&self, job_id: &Uuid) -> Result<Vec<JobTask>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_FOR_JOB.replace("{columns}", sql_registry::TASK_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![job_id.to_string()]).await?;

        let mut job_tasks = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            job_tasks.push(map_task_row(&data_row)?);
        }
        Ok(job_tasks)
    }

    /// Inventario completo de chunks vivos (recuperación y vigilancia).
    pub async fn fetch_live_tasks(&self) -> Result<Vec<JobTask>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = sql_registry::FETCH_LIVE.replace("{columns}", sql_registry::TASK_COLUMNS);
        let mut query_result = connection.query(&select_sql, ()).await?;

        let mut live_tasks = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            live_tasks.push(map_task_row(&data_row)?);
        }
        Ok(live_tasks)
    }

    /// Chunk de reglas huérfano listo para reasignación.
    pub async fn fetch_reassignable_rule_task(
        &self,
        job_id: &Uuid,
    ) -> Result<Option<JobTask>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = sql_registry::FETCH_REASSIGNABLE_RULE_TASK
            .replace("{columns}", sql_registry::TASK_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![job_id.to_string()]).await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_task_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Chunks interrumpibles bajo la prioridad entrante, más nuevos
    /// primero dentro de la prioridad más antigua.
    pub async fn fetch_interruptible_tasks(
        &self,
        below_priority: i64,
    ) -> Result<Vec<JobTask>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_INTERRUPTIBLE.replace("{columns}", sql_registry::TASK_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![below_priority]).await?;

        let mut interruptible_tasks = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            interruptible_tasks.push(map_task_row(&data_row)?);
        }
        Ok(interruptible_tasks)
    }

    // =============================================================
    // ESTRATO DE CURSORES Y CONTEOS
    // =============================================================

    /// Frontera de despacho en unidades base del trabajo o capa.
    pub async fn dispatched_base_cursor(
        &self,
        job_id: &Uuid,
        layer_id: Option<&Uuid>,
    ) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = match layer_id {
            Some(layer_identifier) => {
                connection
                    .query(
                        sql_registry::BASE_CURSOR_FOR_LAYER,
                        params![layer_identifier.to_string()],
                    )
                    .await?
            }
            None => {
                connection
                    .query(sql_registry::BASE_CURSOR_FOR_JOB, params![job_id.to_string()])
                    .await?
            }
        };

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Frontera de despacho en la dimensión de reglas.
    pub async fn dispatched_rule_cursor(&self, job_id: &Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(sql_registry::RULE_CURSOR_FOR_JOB, params![job_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Número de chunk siguiente dentro del trabajo.
    pub async fn next_chunk_number(&self, job_id: &Uuid) -> Result<u32, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(sql_registry::NEXT_CHUNK_NUMBER, params![job_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u32),
            None => Ok(1),
        }
    }

    /// Conteo de chunks no terminales.
    pub async fn count_incomplete(&self, job_id: &Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(sql_registry::COUNT_INCOMPLETE, params![job_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }

    /// Detección de fallo permanente.
    pub async fn has_failed_task(&self, job_id: &Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(sql_registry::COUNT_FAILED, params![job_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? > 0),
            None => Ok(false),
        }
    }

    /// Chunks vivos por agente, para el tope de concurrencia.
    pub async fn count_live_tasks_per_agent(&self) -> Result<HashMap<String, u32>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection.query(sql_registry::COUNT_LIVE_PER_AGENT, ()).await?;

        let mut live_counts = HashMap::new();
        while let Some(data_row) = query_result.next().await? {
            let agent_identifier: String = data_row.get(0)?;
            let live_task_count = data_row.get::<i64>(1)? as u32;
            live_counts.insert(agent_identifier, live_task_count);
        }
        Ok(live_counts)
    }

    // =============================================================
    // ESTRATO DE TRANSICIONES
    // =============================================================

    /// Compromete el chunk con un agente concreto (pending → assigned).
    pub async fn assign_agent(&self, task_id: &Uuid, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::ASSIGN_AGENT,
                params![task_id.to_string(), agent_id, Utc::now().to_rfc3339()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    /// Pulso de progreso del agente (absoluto o relativo; el agregador
    /// aplica la heurística de detección).
    pub async fn update_progress(
        &self,
        task_id: &Uuid,
        keyspace_processed: u64,
        effective_keyspace_processed: u64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_PROGRESS,
                params![
                    task_id.to_string(),
                    keyspace_processed as i64,
                    effective_keyspace_processed as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Certificación de chunk completado con el keyspace real observado.
    #[instrument(skip(self), fields(task = %task_id))]
    pub async fn mark_completed(
        &self,
        task_id: &Uuid,
        chunk_actual_keyspace: u64,
        is_actual_keyspace: bool,
        effective_keyspace_processed: u64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::MARK_COMPLETED,
                params![
                    task_id.to_string(),
                    chunk_actual_keyspace as i64,
                    if is_actual_keyspace { 1 } else { 0 },
                    effective_keyspace_processed as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        if rows_affected > 0 {
            info!("✅ [CHUNK_SEALED]: Task {} completed ({} actual).", task_id, chunk_actual_keyspace);
        }
        Ok(())
    }

    /// Transición genérica de estado.
    pub async fn set_status(&self, task_id: &Uuid, status: TaskStatus) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::SET_STATUS,
                params![task_id.to_string(), status.as_str(), Utc::now().to_rfc3339()],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::TaskNotFound);
        }
        Ok(())
    }

    /// Regresa un chunk fallido a pending sin agente, sumando un reintento.
    pub async fn reset_for_retry(&self, task_id: &Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::RESET_FOR_RETRY,
                params![task_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Libera el agente de un chunk preservando su estado.
    pub async fn detach_agent(&self, task_id: &Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::DETACH_AGENT,
                params![task_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }
}

// =============================================================
// MAPEADOR DE FILA (orden sincronizado con TASK_COLUMNS)
// =============================================================

fn map_task_row(data_row: &Row) -> Result<JobTask, DbError> {
    let raw_id: String = data_row.get(0)?;
    let raw_job_id: String = data_row.get(1)?;
    let raw_status: String = data_row.get(4)?;
    let status = TaskStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_TASK_STATUS: {}", raw_status)))?;

    let increment_layer_id = match data_row.get::<String>(2).ok() {
        Some(raw_layer_id) => Some(parse_uuid(&raw_layer_id)?),
        None => None,
    };

    let raw_created_at: String = data_row.get(25)?;
    let raw_updated_at: String = data_row.get(27)?;

    Ok(JobTask {
        id: parse_uuid(&raw_id)?,
        job_execution_id: parse_uuid(&raw_job_id)?,
        increment_layer_id,
        agent_id: data_row.get::<String>(3).ok(),
        status,
        priority: data_row.get(5)?,
        attack_cmd: data_row.get(6)?,
        keyspace_start: data_row.get::<i64>(7)? as u64,
        keyspace_end: data_row.get::<i64>(8)? as u64,
        keyspace_processed: data_row.get::<i64>(9)? as u64,
        effective_keyspace_start: data_row.get::<i64>(10)? as u64,
        effective_keyspace_end: data_row.get::<i64>(11)? as u64,
        effective_keyspace_processed: data_row.get::<i64>(12)? as u64,
        is_keyspace_split: data_row.get::<i64>(13)? != 0,
        is_rule_split_task: data_row.get::<i64>(14)? != 0,
        rule_start_index: data_row.get::<i64>(15).ok().map(|index| index as u64),
        rule_end_index: data_row.get::<i64>(16).ok().map(|index| index as u64),
        rule_chunk_path: data_row.get::<String>(17).ok(),
        chunk_number: data_row.get::<i64>(18)? as u32,
        chunk_duration: data_row.get::<i64>(19)? as u64,
        benchmark_speed: data_row.get::<i64>(20)? as u64,
        retry_count: data_row.get::<i64>(21)? as u32,
        last_checkpoint: parse_optional_timestamp(data_row.get::<String>(22).ok()),
        chunk_actual_keyspace: data_row.get::<i64>(23)? as u64,
        is_actual_keyspace: data_row.get::<i64>(24)? != 0,
        created_at: parse_timestamp(&raw_created_at)?,
        assigned_at: parse_optional_timestamp(data_row.get::<String>(26).ok()),
        updated_at: parse_timestamp(&raw_updated_at)?,
    })
}
