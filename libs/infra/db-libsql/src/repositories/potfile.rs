// [libs/infra/db-libsql/src/repositories/potfile.rs]
/*!
 * =================================================================
 * APARATO: POTFILE STAGING REPOSITORY (V16.0 - PARTIAL DRAIN)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: STAGING TRANSACCIONAL DE CONTRASEÑAS CRACKEADAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. CONFLICT IGNORE: La ráfaga de staging descarta duplicados exactos
 *    (hash, password, cliente) sin abortar la transacción.
 * 2. PARTIAL DRAIN: El worker borra únicamente los ids confirmados
 *    como escritos o duplicados; un fallo de escritura jamás pierde
 *    filas pendientes.
 *
 * # Mathematical Proof (At-Least-Once Delivery):
 * Toda fila sobrevive en staging hasta su confirmación explícita. El
 * filtro de Bloom del worker colapsa los reintentos en no-ops, por lo
 * que la entrega converge a exactamente-una-línea en el potfile.
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::params;
use tracing::{debug, instrument};

use super::parse_timestamp;
use hashforge_domain_models::potfile::PotfileStagingEntry;

/// Centinela de almacenamiento del ámbito global (sin cliente).
const GLOBAL_SCOPE_SENTINEL: &str = "";

pub struct PotfileStagingRepository {
    database_client: LedgerClient,
}

impl PotfileStagingRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /**
     * Ráfaga de staging con descarte de duplicados exactos.
     *
     * # Returns:
     * Cantidad de filas nuevas realmente insertadas.
     */
    #[instrument(skip(self, crack_entries), fields(count = crack_entries.len()))]
    pub async fn stage_batch(
        &self,
        crack_entries: &[(String, String, Option<String>)],
    ) -> Result<usize, DbError> {
        if crack_entries.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let staging_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut inserted_count: usize = 0;
        let staged_at = Utc::now().to_rfc3339();

        for (password, hash_value, client_id) in crack_entries {
            let scope = client_id.as_deref().unwrap_or(GLOBAL_SCOPE_SENTINEL);
            let rows_affected = staging_transaction
                .execute(
                    r#"
                    INSERT OR IGNORE INTO potfile_staging
                        (password, hash_value, client_id, created_at, processed)
                    VALUES (?1, ?2, ?3, ?4, 0)
                    "#,
                    params![password.clone(), hash_value.clone(), scope, staged_at.clone()],
                )
                .await?;
            inserted_count += rows_affected as usize;
        }

        staging_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!("🧾 [STAGING]: {} fresh rows staged.", inserted_count);
        Ok(inserted_count)
    }

    /// Lote de filas sin procesar en orden de llegada.
    pub async fn fetch_unprocessed(
        &self,
        batch_limit: u64,
    ) -> Result<Vec<PotfileStagingEntry>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                r#"
                SELECT id, password, hash_value, client_id, created_at, processed
                FROM potfile_staging
                WHERE processed = 0
                ORDER BY id ASC
                LIMIT ?1
                "#,
                params![batch_limit as i64],
            )
            .await?;

        let mut staged_entries = Vec::new();
        while let Some(data_row) = query_result.next().await? {
            let stored_client: String = data_row.get(3)?;
            let raw_created_at: String = data_row.get(4)?;
            staged_entries.push(PotfileStagingEntry {
                id: data_row.get(0)?,
                password: data_row.get(1)?,
                hash_value: data_row.get(2)?,
                client_id: if stored_client.is_empty() { None } else { Some(stored_client) },
                created_at: parse_timestamp(&raw_created_at)
                    .unwrap_or_else(|_| Utc::now()),
                processed: data_row.get::<i64>(5)? != 0,
            });
        }
        Ok(staged_entries)
    }

    /**
     * Drenaje parcial: borra exactamente los ids confirmados.
     * Las filas no confirmadas permanecen para el siguiente ciclo.
     */
    #[instrument(skip(self, confirmed_ids), fields(count = confirmed_ids.len()))]
    pub async fn delete_confirmed(&self, confirmed_ids: &[i64]) -> Result<usize, DbError> {
        if confirmed_ids.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let drain_transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut deleted_count: usize = 0;
        for staging_id in confirmed_ids {
            let rows_affected = drain_transaction
                .execute(
                    "DELETE FROM potfile_staging WHERE id = ?1",
                    params![*staging_id],
                )
                .await?;
            deleted_count += rows_affected as usize;
        }

        drain_transaction
            .commit()
            .await
            .map_err(|_| DbError::TransactionError)?;

        debug!("🧹 [STAGING]: {} confirmed rows drained.", deleted_count);
        Ok(deleted_count)
    }

    /// Volumen de filas pendientes (telemetría del worker).
    pub async fn unprocessed_count(&self) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query("SELECT COUNT(*) FROM potfile_staging WHERE processed = 0", ())
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(data_row.get::<i64>(0)? as u64),
            None => Ok(0),
        }
    }
}
