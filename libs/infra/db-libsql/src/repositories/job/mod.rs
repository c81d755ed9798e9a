// [libs/infra/db-libsql/src/repositories/job/mod.rs]
/*!
 * =================================================================
 * APARATO: JOB REPOSITORY (V20.0 - EXECUTION LEDGER GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DEL CICLO DE VIDA DE ÓRDENES DE EJECUCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SEMANTIC ERROR HANDLING: Utiliza 'DbError' para reportar fallos
 *    de transición, permitiendo recuperación autonómica en el ciclo.
 * 2. ABSORBING TERMINALS: Las sentencias de finalización llevan
 *    guardias de estado; completar un trabajo completado es un no-op.
 * 3. LAYER AUTHORITY: Las capas de incremento viven bajo la misma
 *    autoridad que su trabajo padre (borrado en cascada).
 * 4. HYGIENE: Documentación técnica exhaustiva y rastro #[instrument].
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::{params, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use self::queries as sql_registry;
use super::{parse_optional_timestamp, parse_timestamp, parse_uuid};
use hashforge_domain_models::job::{
    AttackConfiguration, JobExecution, JobIncrementLayer, JobStatus,
};

/**
 * Repositorio de autoridad única para el inventario de trabajos y sus
 * capas de incremento.
 */
pub struct JobRepository {
    database_client: LedgerClient,
}

impl JobRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // =============================================================
    // ESTRATO DE IGNICIÓN Y LECTURA
    // =============================================================

    /**
     * Cristaliza una nueva orden de ejecución.
     *
     * # Errors:
     * - `DbError::MappingError`: configuración de ataque no serializable.
     * - `DbError::QueryError`: rechazo del motor libSQL.
     */
    #[instrument(skip(self, job), fields(job = %job.id))]
    pub async fn create_job(&self, job: &JobExecution) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let attack_config_json = serde_json::to_string(&job.attack)
            .map_err(|fault| DbError::MappingError(format!("ATTACK_CONFIG_DRIFT: {}", fault)))?;

        connection
            .execute(
                sql_registry::INSERT_JOB,
                params![
                    job.id.to_string(),
                    job.hashlist_id.clone(),
                    job.hash_type_id as i64,
                    attack_config_json,
                    job.binary_version_pattern.clone(),
                    job.priority,
                    job.max_agents as i64,
                    job.chunk_size_seconds as i64,
                    job.status.as_str(),
                    job.base_keyspace as i64,
                    job.effective_keyspace as i64,
                    job.multiplication_factor as i64,
                    if job.is_accurate_keyspace { 1 } else { 0 },
                    if job.uses_rule_splitting { 1 } else { 0 },
                    job.rule_split_count as i64,
                    job.avg_rule_multiplier,
                    job.processed_keyspace as i64,
                    job.dispatched_keyspace as i64,
                    job.overall_progress_percent,
                    job.consecutive_failures as i64,
                    job.error_message.clone(),
                    if job.allow_high_priority_override { 1 } else { 0 },
                    if job.is_system_preset { 1 } else { 0 },
                    job.created_at.to_rfc3339(),
                    job.started_at.map(|stamp| stamp.to_rfc3339()),
                    job.completed_at.map(|stamp| stamp.to_rfc3339()),
                    job.created_by.clone()
                ],
            )
            .await?;

        info!("✨ [JOB_LEDGER]: Execution {} crystallized (priority {}).", job.id, job.priority);
        Ok(())
    }

    /// Recupera un trabajo por identificador.
    pub async fn fetch_job(&self, job_id: &Uuid) -> Result<JobExecution, DbError> {
        self.try_fetch_job(job_id).await?.ok_or(DbError::JobNotFound)
    }

    /// Variante tolerante a ausencia.
    pub async fn try_fetch_job(&self, job_id: &Uuid) -> Result<Option<JobExecution>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = format!(
            "SELECT {} FROM job_executions WHERE id = ?1",
            sql_registry::JOB_COLUMNS
        );
        let mut query_result = connection
            .query(&select_sql, params![job_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_job_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Inventario priorizado de trabajos candidatos al ciclo.
    #[instrument(skip(self))]
    pub async fn fetch_schedulable_jobs(&self) -> Result<Vec<JobExecution>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_SCHEDULABLE.replace("{columns}", sql_registry::JOB_COLUMNS);
        let mut query_result = connection.query(&select_sql, ()).await?;

        let mut schedulable_jobs = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            schedulable_jobs.push(map_job_row(&data_row)?);
        }
        Ok(schedulable_jobs)
    }

    /// Trabajos activos más los completados dentro de la ventana de
    /// gracia del agregador.
    pub async fn fetch_jobs_for_aggregation(
        &self,
        grace_window_seconds: i64,
    ) -> Result<Vec<JobExecution>, DbError> {
        let connection = self.database_client.get_connection()?;
        let grace_threshold = (Utc::now() - chrono::Duration::seconds(grace_window_seconds)).to_rfc3339();
        let select_sql =
            sql_registry::FETCH_FOR_AGGREGATION.replace("{columns}", sql_registry::JOB_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![grace_threshold]).await?;

        let mut aggregation_targets = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            aggregation_targets.push(map_job_row(&data_row)?);
        }
        Ok(aggregation_targets)
    }

    /// Trabajo preset del sistema (potfile), si está provisionado.
    pub async fn fetch_system_preset_job(&self) -> Result<Option<JobExecution>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_SYSTEM_PRESET.replace("{columns}", sql_registry::JOB_COLUMNS);
        let mut query_result = connection.query(&select_sql, ()).await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_job_row(&data_row)?)),
            None => Ok(None),
        }
    }

    // =============================================================
    // ESTRATO DE KEYSPACE
    // =============================================================

    /// Sella el veredicto del calculador de keyspace.
    #[instrument(skip(self), fields(job = %job_id))]
    pub async fn record_keyspace(
        &self,
        job_id: &Uuid,
        base_keyspace: u64,
        effective_keyspace: u64,
        multiplication_factor: u64,
        is_accurate: bool,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::RECORD_KEYSPACE,
                params![
                    job_id.to_string(),
                    base_keyspace as i64,
                    effective_keyspace as i64,
                    multiplication_factor as i64,
                    if is_accurate { 1 } else { 0 }
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::JobNotFound);
        }
        Ok(())
    }

    /**
     * Promueve un trabajo estimado a keyspace exacto con el valor
     * reportado por el binario del agente. No-op si ya era exacto.
     */
    #[instrument(skip(self), fields(job = %job_id))]
    pub async fn promote_accurate_keyspace(
        &self,
        job_id: &Uuid,
        reported_effective_keyspace: u64,
    ) -> Result<bool, DbError> {
        let job = self.fetch_job(job_id).await?;
        let multiplication_factor = JobExecution::derive_multiplication_factor(
            job.base_keyspace,
            reported_effective_keyspace,
        );

        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::PROMOTE_ACCURATE,
                params![
                    job_id.to_string(),
                    reported_effective_keyspace as i64,
                    multiplication_factor as i64
                ],
            )
            .await?;

        if rows_affected > 0 {
            info!(
                "🎯 [KEYSPACE_PROMOTED]: Job {} now accurate (effective = {}).",
                job_id, reported_effective_keyspace
            );
        }
        Ok(rows_affected > 0)
    }

    /// Fija la fragmentación por reglas. La sentencia lleva guardia de
    /// inmutabilidad: una vez en true, ninguna escritura la revierte.
    pub async fn enable_rule_splitting(
        &self,
        job_id: &Uuid,
        rule_split_count: u32,
        avg_rule_multiplier: f64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::ENABLE_RULE_SPLITTING,
                params![job_id.to_string(), rule_split_count as i64, avg_rule_multiplier],
            )
            .await?;
        Ok(())
    }

    // =============================================================
    // ESTRATO DE CICLO DE VIDA
    // =============================================================

    /// Transición pending → running al primer despacho exitoso.
    pub async fn mark_running(&self, job_id: &Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::MARK_RUNNING,
                params![job_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /**
     * Sella la completitud reconciliando el keyspace efectivo con el
     * esfuerzo real observado. Idempotente por guardia de estado.
     *
     * # Returns:
     * true si esta llamada ejecutó la transición; false si el trabajo
     * ya era terminal.
     */
    #[instrument(skip(self), fields(job = %job_id))]
    pub async fn mark_completed(
        &self,
        job_id: &Uuid,
        reconciled_effective_keyspace: u64,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::MARK_COMPLETED,
                params![
                    job_id.to_string(),
                    Utc::now().to_rfc3339(),
                    reconciled_effective_keyspace as i64
                ],
            )
            .await?;

        if rows_affected > 0 {
            info!("✅ [JOB_SEALED]: Execution {} completed.", job_id);
        } else {
            debug!("⚪ [JOB_SEALED]: Execution {} already terminal.", job_id);
        }
        Ok(rows_affected > 0)
    }

    /// Transición terminal a fallo con causa visible para el usuario.
    #[instrument(skip(self, error_message), fields(job = %job_id))]
    pub async fn mark_failed(&self, job_id: &Uuid, error_message: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::MARK_FAILED,
                params![job_id.to_string(), Utc::now().to_rfc3339(), error_message],
            )
            .await?;

        if rows_affected > 0 {
            warn!("💀 [JOB_FAILED]: Execution {} failed: {}", job_id, error_message);
        }
        Ok(rows_affected > 0)
    }

    /// Acumula un fallo de chunk en el contador del trabajo.
    pub async fn bump_consecutive_failures(&self, job_id: &Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::BUMP_CONSECUTIVE_FAILURES,
                params![job_id.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Transición de estado no-terminal (recuperación y reanudación).
    pub async fn set_status_non_terminal(
        &self,
        job_id: &Uuid,
        status: JobStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::SET_STATUS_NON_TERMINAL,
                params![job_id.to_string(), status.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Pausa por interrupción de prioridad superior.
    pub async fn mark_interrupted(&self, job_id: &Uuid, reason: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::MARK_INTERRUPTED,
                params![job_id.to_string(), reason],
            )
            .await?;
        Ok(())
    }

    /**
     * Ráfaga transaccional de contabilidad de progreso: sólo filas con
     * cambios reales entran al lote.
     *
     * # Performance:
     * O(N) sentencias dentro de una única transacción; el coste de
     * sincronización de red se amortiza a O(1) commits.
     */
    #[instrument(skip(self, progress_batch), fields(count = progress_batch.len()))]
    pub async fn update_progress_batch(
        &self,
        progress_batch: Vec<JobProgressUpdate>,
    ) -> Result<usize, DbError> {
        if progress_batch.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let batch_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let batch_volume = progress_batch.len();

        for progress_update in &progress_batch {
            batch_transaction
                .execute(
                    sql_registry::UPDATE_PROGRESS,
                    params![
                        progress_update.job_id.to_string(),
                        progress_update.processed_keyspace as i64,
                        progress_update.dispatched_keyspace as i64,
                        progress_update.overall_progress_percent
                    ],
                )
                .await?;
        }

        batch_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!("📊 [PROGRESS_BATCH]: {} job rows updated atomically.", batch_volume);
        Ok(batch_volume)
    }

    // =============================================================
    // ESTRATO DE CAPAS DE INCREMENTO
    // =============================================================

    /// Cristaliza una capa de incremento del trabajo padre.
    pub async fn insert_increment_layer(&self, layer: &JobIncrementLayer) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::INSERT_LAYER,
                params![
                    layer.id.to_string(),
                    layer.job_execution_id.to_string(),
                    layer.layer_index as i64,
                    layer.mask.clone(),
                    layer.base_keyspace as i64,
                    layer.effective_keyspace as i64,
                    if layer.is_accurate_keyspace { 1 } else { 0 },
                    layer.dispatched_keyspace as i64,
                    layer.processed_keyspace as i64,
                    layer.status.as_str(),
                    layer.overall_progress_percent
                ],
            )
            .await?;
        Ok(())
    }

    /// Capas de un trabajo en orden de incremento.
    pub async fn fetch_increment_layers(
        &self,
        job_id: &Uuid,
    ) -> Result<Vec<JobIncrementLayer>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_LAYERS.replace("{columns}", sql_registry::LAYER_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![job_id.to_string()]).await?;

        let mut increment_layers = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            increment_layers.push(map_layer_row(&data_row)?);
        }
        Ok(increment_layers)
    }

    /// Capa concreta por identificador.
    pub async fn fetch_increment_layer(
        &self,
        layer_id: &Uuid,
    ) -> Result<JobIncrementLayer, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql =
            sql_registry::FETCH_LAYER.replace("{columns}", sql_registry::LAYER_COLUMNS);
        let mut query_result = connection
            .query(&select_sql, params![layer_id.to_string()])
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_layer_row(&data_row),
            None => Err(DbError::LayerNotFound),
        }
    }

    /// Sella el veredicto de keyspace de una capa.
    pub async fn record_layer_keyspace(
        &self,
        layer_id: &Uuid,
        base_keyspace: u64,
        effective_keyspace: u64,
        is_accurate: bool,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                sql_registry::RECORD_LAYER_KEYSPACE,
                params![
                    layer_id.to_string(),
                    base_keyspace as i64,
                    effective_keyspace as i64,
                    if is_accurate { 1 } else { 0 }
                ],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::LayerNotFound);
        }
        Ok(())
    }

    /// Contabilidad de progreso y estado de una capa.
    pub async fn update_layer_progress(
        &self,
        layer_id: &Uuid,
        processed_keyspace: u64,
        dispatched_keyspace: u64,
        overall_progress_percent: f64,
        status: JobStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_LAYER_PROGRESS,
                params![
                    layer_id.to_string(),
                    processed_keyspace as i64,
                    dispatched_keyspace as i64,
                    overall_progress_percent,
                    status.as_str()
                ],
            )
            .await?;
        Ok(())
    }
}

/// Fila de lote de progreso del agregador.
#[derive(Debug, Clone)]
pub struct JobProgressUpdate {
    pub job_id: Uuid,
    pub processed_keyspace: u64,
    pub dispatched_keyspace: u64,
    pub overall_progress_percent: f64,
}

// =============================================================
// MAPEADORES DE FILA (orden sincronizado con las proyecciones)
// =============================================================

fn map_job_row(data_row: &Row) -> Result<JobExecution, DbError> {
    let raw_id: String = data_row.get(0)?;
    let raw_attack_config: String = data_row.get(3)?;
    let attack: AttackConfiguration = serde_json::from_str(&raw_attack_config)
        .map_err(|fault| DbError::MappingError(format!("ATTACK_CONFIG_DRIFT: {}", fault)))?;

    let raw_status: String = data_row.get(8)?;
    let status = JobStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_JOB_STATUS: {}", raw_status)))?;

    let raw_created_at: String = data_row.get(23)?;

    Ok(JobExecution {
        id: parse_uuid(&raw_id)?,
        hashlist_id: data_row.get(1)?,
        hash_type_id: data_row.get::<i64>(2)? as u32,
        attack,
        binary_version_pattern: data_row.get(4)?,
        priority: data_row.get(5)?,
        max_agents: data_row.get::<i64>(6)? as u32,
        chunk_size_seconds: data_row.get::<i64>(7)? as u64,
        status,
        base_keyspace: data_row.get::<i64>(9)? as u64,
        effective_keyspace: data_row.get::<i64>(10)? as u64,
        multiplication_factor: (data_row.get::<i64>(11)? as u64).max(1),
        is_accurate_keyspace: data_row.get::<i64>(12)? != 0,
        uses_rule_splitting: data_row.get::<i64>(13)? != 0,
        rule_split_count: data_row.get::<i64>(14)? as u32,
        avg_rule_multiplier: data_row.get(15)?,
        processed_keyspace: data_row.get::<i64>(16)? as u64,
        dispatched_keyspace: data_row.get::<i64>(17)? as u64,
        overall_progress_percent: data_row.get(18)?,
        consecutive_failures: data_row.get::<i64>(19)? as u32,
        error_message: data_row.get::<String>(20).ok(),
        allow_high_priority_override: data_row.get::<i64>(21)? != 0,
        is_system_preset: data_row.get::<i64>(22)? != 0,
        created_at: parse_timestamp(&raw_created_at)?,
        started_at: parse_optional_timestamp(data_row.get::<String>(24).ok()),
        completed_at: parse_optional_timestamp(data_row.get::<String>(25).ok()),
        created_by: data_row.get::<String>(26).ok(),
    })
}

fn map_layer_row(data_row: &Row) -> Result<JobIncrementLayer, DbError> {
    let raw_id: String = data_row.get(0)?;
    let raw_job_id: String = data_row.get(1)?;
    let raw_status: String = data_row.get(9)?;
    let status = JobStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_LAYER_STATUS: {}", raw_status)))?;

    Ok(JobIncrementLayer {
        id: parse_uuid(&raw_id)?,
        job_execution_id: parse_uuid(&raw_job_id)?,
        layer_index: data_row.get::<i64>(2)? as u32,
        mask: data_row.get(3)?,
        base_keyspace: data_row.get::<i64>(4)? as u64,
        effective_keyspace: data_row.get::<i64>(5)? as u64,
        is_accurate_keyspace: data_row.get::<i64>(6)? != 0,
        dispatched_keyspace: data_row.get::<i64>(7)? as u64,
        processed_keyspace: data_row.get::<i64>(8)? as u64,
        status,
        overall_progress_percent: data_row.get(10)?,
    })
}
