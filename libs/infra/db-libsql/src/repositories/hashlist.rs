// [libs/infra/db-libsql/src/repositories/hashlist.rs]

use crate::errors::DbError;
use crate::LedgerClient;
use libsql::{params, Row};
use tracing::{debug, instrument};

use hashforge_domain_models::hashlist::Hashlist;

/// Autoridad de lectura y conteo sobre los hashlists. El parsing de
/// hashes y su criptografía viven fuera del núcleo; aquí sólo importan
/// los contadores que gobiernan la planificación.
pub struct HashlistRepository {
    database_client: LedgerClient,
}

impl HashlistRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    pub async fn upsert_hashlist(&self, hashlist: &Hashlist) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO hashlists (id, hash_type_id, total_hashes, cracked_hashes, is_salted)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    hash_type_id = excluded.hash_type_id,
                    total_hashes = excluded.total_hashes,
                    cracked_hashes = excluded.cracked_hashes,
                    is_salted = excluded.is_salted
                "#,
                params![
                    hashlist.id.clone(),
                    hashlist.hash_type_id as i64,
                    hashlist.total_hashes as i64,
                    hashlist.cracked_hashes as i64,
                    if hashlist.is_salted { 1 } else { 0 }
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_hashlist(&self, hashlist_id: &str) -> Result<Hashlist, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                "SELECT id, hash_type_id, total_hashes, cracked_hashes, is_salted FROM hashlists WHERE id = ?1",
                params![hashlist_id],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => map_hashlist_row(&data_row),
            None => Err(DbError::HashlistNotFound),
        }
    }

    /// Acumula hashes crackeados, saturando en el total.
    #[instrument(skip(self), fields(hashlist = %hashlist_id))]
    pub async fn add_cracked(&self, hashlist_id: &str, newly_cracked: u64) -> Result<(), DbError> {
        if newly_cracked == 0 {
            return Ok(());
        }
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                r#"
                UPDATE hashlists
                SET cracked_hashes = MIN(total_hashes, cracked_hashes + ?2)
                WHERE id = ?1
                "#,
                params![hashlist_id, newly_cracked as i64],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::HashlistNotFound);
        }
        debug!("🔓 [HASHLIST]: {} new cracks registered on {}.", newly_cracked, hashlist_id);
        Ok(())
    }
}

fn map_hashlist_row(data_row: &Row) -> Result<Hashlist, DbError> {
    Ok(Hashlist {
        id: data_row.get(0)?,
        hash_type_id: data_row.get::<i64>(1)? as u32,
        total_hashes: data_row.get::<i64>(2)? as u64,
        cracked_hashes: data_row.get::<i64>(3)? as u64,
        is_salted: data_row.get::<i64>(4)? != 0,
    })
}
