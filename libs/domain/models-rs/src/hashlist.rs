// [libs/domain/models-rs/src/hashlist.rs]

use serde::{Deserialize, Serialize};

/// Colección ordenada de hashes de un único tipo. Entidad externa al
/// núcleo: sólo sus contadores participan en la planificación.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashlist {
    pub id: String,
    pub hash_type_id: u32,
    pub total_hashes: u64,
    pub cracked_hashes: u64,
    /// Derivado del tipo de hash; gobierna el ajuste por sales del
    /// keyspace efectivo.
    pub is_salted: bool,
}

impl Hashlist {
    /// Un hashlist totalmente crackeado habilita la completitud
    /// anticipada de sus trabajos.
    #[must_use]
    pub fn is_fully_cracked(&self) -> bool {
        self.total_hashes > 0 && self.cracked_hashes >= self.total_hashes
    }

    /// Conteo de sales vigente: el total de hashes presentes.
    #[must_use]
    pub fn salt_count(&self) -> u64 {
        self.total_hashes
    }
}
