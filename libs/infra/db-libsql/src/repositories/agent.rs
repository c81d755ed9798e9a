// [libs/infra/db-libsql/src/repositories/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT REPOSITORY (V19.0 - SINGLE WRITER ENGAGEMENT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CAPACIDAD DE FLOTA Y OCUPACIÓN VERSIONADA
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE WRITER: Toda mutación del registro de ocupación pasa por
 *    este repositorio, que estampa 'busy_version' en cada escritura.
 *    El sello optimista detecta actualizaciones perdidas entre el
 *    ciclo del planificador y la recuperación.
 * 2. AVAILABILITY PROJECTION: El filtro de elegibilidad base (activo,
 *    habilitado, sincronizado) vive en SQL; las ventanas horarias y el
 *    tope de tareas se evalúan en el dominio.
 *
 * # Mathematical Proof (Lost Update Shielding):
 * Sea v la versión leída. La escritura exige WHERE busy_version = v y
 * estampa v+1. Dos escritores concurrentes con la misma lectura
 * producen exactamente un éxito; el perdedor recibe un conflicto
 * semántico y relee.
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::{params, Row};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use hashforge_domain_models::agent::{Agent, AgentEngagement, AgentStatus, SyncStatus};

const AGENT_COLUMNS: &str = r#"
    id, hostname, status, enabled, sync_status, scheduling_enabled,
    schedule_daily_start, schedule_daily_end, binary_version_pattern,
    busy_status, current_task_id, current_job_id, busy_version, last_seen_at
"#;

/**
 * Repositorio de autoridad única sobre la flota y su ocupación.
 */
pub struct AgentRepository {
    database_client: LedgerClient,
}

impl AgentRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Registra o refresca la ficha de un agente (handshake de flota).
    /// El registro de ocupación no se toca en el upsert.
    #[instrument(skip(self, agent), fields(agent = %agent.id))]
    pub async fn upsert_agent(&self, agent: &Agent) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO agents (
                    id, hostname, status, enabled, sync_status, scheduling_enabled,
                    schedule_daily_start, schedule_daily_end, binary_version_pattern,
                    last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO UPDATE SET
                    hostname = excluded.hostname,
                    status = excluded.status,
                    enabled = excluded.enabled,
                    sync_status = excluded.sync_status,
                    scheduling_enabled = excluded.scheduling_enabled,
                    schedule_daily_start = excluded.schedule_daily_start,
                    schedule_daily_end = excluded.schedule_daily_end,
                    binary_version_pattern = excluded.binary_version_pattern,
                    last_seen_at = excluded.last_seen_at
                "#,
                params![
                    agent.id.clone(),
                    agent.hostname.clone(),
                    agent.status.as_str(),
                    if agent.enabled { 1 } else { 0 },
                    agent.sync_status.as_str(),
                    if agent.scheduling_enabled { 1 } else { 0 },
                    agent.schedule_daily_start_minutes.map(|minute| minute as i64),
                    agent.schedule_daily_end_minutes.map(|minute| minute as i64),
                    agent.binary_version_pattern.clone(),
                    agent.last_seen_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Recupera la ficha íntegra de un agente.
    pub async fn fetch_agent(&self, agent_id: &str) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS);
        let mut query_result = connection.query(&select_sql, params![agent_id]).await?;

        match query_result.next().await? {
            Some(data_row) => map_agent_row(&data_row),
            None => Err(DbError::AgentNotFound),
        }
    }

    /// Proyección de elegibilidad base: activos, habilitados y con la
    /// sincronización de artefactos completada.
    #[instrument(skip(self))]
    pub async fn fetch_eligible_agents(&self) -> Result<Vec<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = format!(
            r#"SELECT {} FROM agents
               WHERE status = 'active' AND enabled = 1 AND sync_status = 'completed'"#,
            AGENT_COLUMNS
        );
        let mut query_result = connection.query(&select_sql, ()).await?;

        let mut eligible_agents = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            eligible_agents.push(map_agent_row(&data_row)?);
        }
        Ok(eligible_agents)
    }

    /// Agentes cuyo registro de ocupación afirma estar comprometidos.
    pub async fn fetch_busy_agents(&self) -> Result<Vec<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select_sql = format!("SELECT {} FROM agents WHERE busy_status = 1", AGENT_COLUMNS);
        let mut query_result = connection.query(&select_sql, ()).await?;

        let mut busy_agents = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            busy_agents.push(map_agent_row(&data_row)?);
        }
        Ok(busy_agents)
    }

    /**
     * Compromete al agente con un chunk bajo sello optimista.
     *
     * # Errors:
     * - `DbError::EngagementVersionConflict`: otra escritura ganó la
     *   carrera; el llamador debe releer y decidir.
     */
    #[instrument(skip(self), fields(agent = %agent_id, task = %task_id))]
    pub async fn engage_busy(
        &self,
        agent_id: &str,
        task_id: &Uuid,
        job_id: &Uuid,
        expected_version: i64,
    ) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;
        let next_version = expected_version + 1;

        let rows_affected = connection
            .execute(
                r#"
                UPDATE agents
                SET busy_status = 1,
                    current_task_id = ?2,
                    current_job_id = ?3,
                    busy_version = ?4
                WHERE id = ?1 AND busy_version = ?5
                "#,
                params![
                    agent_id,
                    task_id.to_string(),
                    job_id.to_string(),
                    next_version,
                    expected_version
                ],
            )
            .await?;

        if rows_affected == 0 {
            warn!("⚔️ [ENGAGEMENT_RACE]: Version conflict engaging agent {}.", agent_id);
            return Err(DbError::EngagementVersionConflict);
        }

        debug!("🔒 [ENGAGED]: Agent {} bound to task {} (v{}).", agent_id, task_id, next_version);
        Ok(next_version)
    }

    /// Limpia el registro de ocupación. Escritura incondicional del
    /// único escritor; estampa versión para los lectores optimistas.
    #[instrument(skip(self), fields(agent = %agent_id))]
    pub async fn clear_busy(&self, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                UPDATE agents
                SET busy_status = 0,
                    current_task_id = NULL,
                    current_job_id = NULL,
                    busy_version = busy_version + 1
                WHERE id = ?1
                "#,
                params![agent_id],
            )
            .await?;
        Ok(())
    }

    /// Refresca el pulso de vida de un agente.
    pub async fn touch_last_seen(&self, agent_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agents SET last_seen_at = ?2 WHERE id = ?1",
                params![agent_id, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }
}

fn map_agent_row(data_row: &Row) -> Result<Agent, DbError> {
    let raw_status: String = data_row.get(2)?;
    let status = AgentStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_AGENT_STATUS: {}", raw_status)))?;

    let raw_sync_status: String = data_row.get(4)?;
    let sync_status = SyncStatus::parse(&raw_sync_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_SYNC_STATUS: {}", raw_sync_status)))?;

    let current_task_id = match data_row.get::<String>(10).ok() {
        Some(raw_task_id) => Some(parse_uuid(&raw_task_id)?),
        None => None,
    };
    let current_job_id = match data_row.get::<String>(11).ok() {
        Some(raw_job_id) => Some(parse_uuid(&raw_job_id)?),
        None => None,
    };

    let raw_last_seen: String = data_row.get(13)?;
    let last_seen_at = if raw_last_seen.is_empty() {
        Utc::now()
    } else {
        parse_timestamp(&raw_last_seen)?
    };

    Ok(Agent {
        id: data_row.get(0)?,
        hostname: data_row.get(1)?,
        status,
        enabled: data_row.get::<i64>(3)? != 0,
        sync_status,
        scheduling_enabled: data_row.get::<i64>(5)? != 0,
        schedule_daily_start_minutes: data_row.get::<i64>(6).ok().map(|minute| minute as u32),
        schedule_daily_end_minutes: data_row.get::<i64>(7).ok().map(|minute| minute as u32),
        binary_version_pattern: data_row.get(8)?,
        engagement: AgentEngagement {
            busy_status: data_row.get::<i64>(9)? != 0,
            current_task_id,
            current_job_id,
            busy_version: data_row.get(12)?,
        },
        last_seen_at,
    })
}
