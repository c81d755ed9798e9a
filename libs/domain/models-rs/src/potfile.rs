// [libs/domain/models-rs/src/potfile.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registro transitorio de una contraseña crackeada a la espera de
/// persistencia por el worker de potfile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotfileStagingEntry {
    pub id: i64,
    pub password: String,
    pub hash_value: String,
    pub client_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
}

/// Observación histórica del digest del potfile. El anillo de
/// observaciones recientes tolera la ventana de carrera entre una
/// ingesta pesada y la verificación de un agente en sincronización.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PotfileDigestObservation {
    pub md5_digest: String,
    pub file_size: u64,
    pub observed_at: DateTime<Utc>,
}

/// Metadatos derivados del fichero de diccionario asociado a un
/// potfile (global o por cliente).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordlistMetadata {
    pub id: String,
    pub file_path: String,
    pub md5_hash: Option<String>,
    pub file_size: u64,
    pub line_count: u64,
}
