// [libs/infra/db-libsql/src/repositories/wordlist.rs]

use crate::errors::DbError;
use crate::LedgerClient;
use libsql::{params, Row};
use tracing::{debug, instrument};

use hashforge_domain_models::potfile::WordlistMetadata;

/// Metadatos derivados de los diccionarios registrados. El potfile
/// global y los potfiles por cliente se consumen como diccionarios, de
/// modo que su md5, tamaño y conteo de líneas viven en esta tabla.
pub struct WordlistRepository {
    database_client: LedgerClient,
}

impl WordlistRepository {
    #[must_use]
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    pub async fn upsert_wordlist(&self, wordlist: &WordlistMetadata) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO wordlists (id, file_path, md5_hash, file_size, line_count)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    file_path = excluded.file_path,
                    md5_hash = excluded.md5_hash,
                    file_size = excluded.file_size,
                    line_count = excluded.line_count
                "#,
                params![
                    wordlist.id.clone(),
                    wordlist.file_path.clone(),
                    wordlist.md5_hash.clone(),
                    wordlist.file_size as i64,
                    wordlist.line_count as i64
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_wordlist(&self, wordlist_id: &str) -> Result<Option<WordlistMetadata>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut query_result = connection
            .query(
                "SELECT id, file_path, md5_hash, file_size, line_count FROM wordlists WHERE id = ?1",
                params![wordlist_id],
            )
            .await?;

        match query_result.next().await? {
            Some(data_row) => Ok(Some(map_wordlist_row(&data_row)?)),
            None => Ok(None),
        }
    }

    /// Actualización atómica de los metadatos derivados tras una ráfaga
    /// de ingestión del worker de potfile.
    #[instrument(skip(self, md5_digest), fields(wordlist = %wordlist_id))]
    pub async fn update_derived_metadata(
        &self,
        wordlist_id: &str,
        md5_digest: &str,
        file_size: u64,
        line_count: u64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let rows_affected = connection
            .execute(
                r#"
                UPDATE wordlists
                SET md5_hash = ?2, file_size = ?3, line_count = ?4
                WHERE id = ?1
                "#,
                params![wordlist_id, md5_digest, file_size as i64, line_count as i64],
            )
            .await?;

        if rows_affected == 0 {
            return Err(DbError::MappingError(format!(
                "WORDLIST_METADATA_ORPHAN: {}",
                wordlist_id
            )));
        }
        debug!("📇 [WORDLIST_META]: {} -> {} lines, {} bytes.", wordlist_id, line_count, file_size);
        Ok(())
    }
}

fn map_wordlist_row(data_row: &Row) -> Result<WordlistMetadata, DbError> {
    Ok(WordlistMetadata {
        id: data_row.get(0)?,
        file_path: data_row.get(1)?,
        md5_hash: data_row.get::<String>(2).ok(),
        file_size: data_row.get::<i64>(3)? as u64,
        line_count: data_row.get::<i64>(4)? as u64,
    })
}
