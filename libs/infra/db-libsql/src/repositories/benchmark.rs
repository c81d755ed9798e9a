// [libs/infra/db-libsql/src/repositories/benchmark.rs]
/*!
 * =================================================================
 * APARATO: BENCHMARK REPOSITORY (V13.0 - CALIBRATION CACHE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CACHÉ DE CALIBRACIONES Y TABLA DE SEGUIMIENTO
 *
 * # Logic:
 * La clave de calibración es (agente, modo, tipo de hash, sales). El
 * conteo de sales se almacena con centinela 0 para el caso sin sal,
 * preservando la unicidad de la clave primaria en SQLite. La tabla de
 * seguimiento sostiene la espera acotada del ciclo: una fila por
 * solicitud efectivamente enviada.
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use libsql::{params, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use hashforge_domain_models::benchmark::{
    AgentBenchmark, BenchmarkRequest, BenchmarkRequestStatus,
};
use hashforge_domain_models::job::AttackMode;

/// Centinela de almacenamiento para la ausencia de sales.
const UNSALTED_SENTINEL: i64 = 0;

pub struct BenchmarkRepository {
    database_client: LedgerClient,
}

impl BenchmarkRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Sella una calibración medida (upsert por clave compuesta).
    #[instrument(skip(self, benchmark), fields(agent = %benchmark.agent_id))]
    pub async fn upsert_benchmark(&self, benchmark: &AgentBenchmark) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO agent_benchmarks (
                    agent_id, attack_mode, hash_type_id, salt_count,
                    speed, reported_effective_keyspace, measured_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(agent_id, attack_mode, hash_type_id, salt_count) DO UPDATE SET
                    speed = excluded.speed,
                    reported_effective_keyspace = excluded.reported_effective_keyspace,
                    measured_at = excluded.measured_at
                "#,
                params![
                    benchmark.agent_id.clone(),
                    benchmark.attack_mode.as_str(),
                    benchmark.hash_type_id as i64,
                    benchmark.salt_count.map(|salts| salts as i64).unwrap_or(UNSALTED_SENTINEL),
                    benchmark.speed as i64,
                    benchmark.reported_effective_keyspace.map(|keyspace| keyspace as i64),
                    benchmark.measured_at.to_rfc3339()
                ],
            )
            .await?;

        debug!(
            "🧭 [BENCH_CACHE]: {} calibrated at {} c/s for {}.",
            benchmark.agent_id,
            benchmark.speed,
            benchmark.attack_mode.as_str()
        );
        Ok(())
    }

    /// Recupera la calibración cacheada de una clave concreta.
    pub async fn fetch_benchmark(
        &self,
        agent_id: &str,
        attack_mode: AttackMode,
        hash_type_id: u32,
        salt_count: Option<u64>,
    ) -> Result<Option<AgentBenchmark>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"
                SELECT agent_id, attack_mode, hash_type_id, salt_count,
                       speed, reported_effective_keyspace, measured_at
                FROM agent_benchmarks
                WHERE agent_id = ?1 AND attack_mode = ?2
                  AND hash_type_id = ?3 AND salt_count = ?4
                "#,
                params![
                    agent_id,
                    attack_mode.as_str(),
                    hash_type_id as i64,
                    salt_count.map(|salts| salts as i64).unwrap_or(UNSALTED_SENTINEL)
                ],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_benchmark_row(&data_row)?)),
            None => Ok(None),
        }
    }

    // =============================================================
    // TABLA DE SEGUIMIENTO (ESPERA ACOTADA DEL CICLO)
    // =============================================================

    /// Inserta una fila de seguimiento por solicitud enviada.
    pub async fn insert_request(&self, request: &BenchmarkRequest) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO benchmark_requests (
                    id, agent_id, job_execution_id, increment_layer_id,
                    is_forced, status, requested_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    request.id.to_string(),
                    request.agent_id.clone(),
                    request.job_execution_id.map(|job_id| job_id.to_string()),
                    request.increment_layer_id.map(|layer_id| layer_id.to_string()),
                    if request.is_forced { 1 } else { 0 },
                    request.status.as_str(),
                    request.requested_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Recupera una fila de seguimiento.
    pub async fn fetch_request(&self, request_id: &Uuid) -> Result<Option<BenchmarkRequest>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"
                SELECT id, agent_id, job_execution_id, increment_layer_id,
                       is_forced, status, requested_at
                FROM benchmark_requests WHERE id = ?1
                "#,
                params![request_id.to_string()],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_request_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Marca la fila de seguimiento con su desenlace.
    pub async fn settle_request(
        &self,
        request_id: &Uuid,
        outcome: BenchmarkRequestStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE benchmark_requests SET status = ?2 WHERE id = ?1",
                params![request_id.to_string(), outcome.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Solicitudes pendientes de la última solicitud del agente (el
    /// resultado entrante se casa con la más reciente).
    pub async fn fetch_latest_pending_for_agent(
        &self,
        agent_id: &str,
    ) -> Result<Option<BenchmarkRequest>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"
                SELECT id, agent_id, job_execution_id, increment_layer_id,
                       is_forced, status, requested_at
                FROM benchmark_requests
                WHERE agent_id = ?1 AND status = 'pending'
                ORDER BY requested_at DESC
                LIMIT 1
                "#,
                params![agent_id],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_request_row(&data_row)?)),
            None => Ok(None),
        }
    }
}

fn map_benchmark_row(data_row: &Row) -> Result<AgentBenchmark, DbError> {
    let raw_attack_mode: String = data_row.get(1)?;
    let attack_mode = AttackMode::parse(&raw_attack_mode)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_ATTACK_MODE: {}", raw_attack_mode)))?;

    let stored_salt_count = data_row.get::<i64>(3)?;
    let raw_measured_at: String = data_row.get(6)?;

    Ok(AgentBenchmark {
        agent_id: data_row.get(0)?,
        attack_mode,
        hash_type_id: data_row.get::<i64>(2)? as u32,
        salt_count: if stored_salt_count == UNSALTED_SENTINEL {
            None
        } else {
            Some(stored_salt_count as u64)
        },
        speed: data_row.get::<i64>(4)? as u64,
        reported_effective_keyspace: data_row.get::<i64>(5).ok().map(|keyspace| keyspace as u64),
        measured_at: parse_timestamp(&raw_measured_at)?,
    })
}

fn map_request_row(data_row: &Row) -> Result<BenchmarkRequest, DbError> {
    let raw_id: String = data_row.get(0)?;
    let raw_status: String = data_row.get(5)?;
    let status = BenchmarkRequestStatus::parse(&raw_status)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_REQUEST_STATUS: {}", raw_status)))?;

    let job_execution_id = match data_row.get::<String>(2).ok() {
        Some(raw_job_id) => Some(parse_uuid(&raw_job_id)?),
        None => None,
    };
    let increment_layer_id = match data_row.get::<String>(3).ok() {
        Some(raw_layer_id) => Some(parse_uuid(&raw_layer_id)?),
        None => None,
    };

    let raw_requested_at: String = data_row.get(6)?;

    Ok(BenchmarkRequest {
        id: parse_uuid(&raw_id)?,
        agent_id: data_row.get(1)?,
        job_execution_id,
        increment_layer_id,
        is_forced: data_row.get::<i64>(4)? != 0,
        status,
        requested_at: parse_timestamp(&raw_requested_at)?,
    })
}
