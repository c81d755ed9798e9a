// [apps/orchestrator/src/state/digest_history.rs]
//! =================================================================
//! APARATO: POTFILE DIGEST HISTORY (V7.0 - RACE WINDOW SHIELD)
//! CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
//! RESPONSABILIDAD: ANILLO DE DIGESTS RECIENTES POR DICCIONARIO
//! =================================================================

use chrono::Utc;
use hashforge_domain_models::potfile::PotfileDigestObservation;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Profundidad del anillo de observaciones por diccionario.
const HISTORY_RING_DEPTH: usize = 8;

/// Historia acotada de (md5, tamaño) observados por diccionario.
/// Durante una ingesta pesada, un agente en sincronización puede ver
/// un digest que ya fue reemplazado; aceptar cualquier digest del
/// anillo reciente absorbe esa ventana de carrera.
pub struct PotfileDigestHistory {
    observation_rings: RwLock<HashMap<String, VecDeque<PotfileDigestObservation>>>,
}

impl PotfileDigestHistory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            observation_rings: RwLock::new(HashMap::new()),
        }
    }

    /// Registra la observación más reciente de un diccionario.
    pub fn record(&self, wordlist_id: &str, md5_digest: String, file_size: u64) {
        let mut rings_guard = self
            .observation_rings
            .write()
            .expect("FATAL: Digest history poisoned.");

        let observation_ring = rings_guard.entry(wordlist_id.to_string()).or_default();
        observation_ring.push_front(PotfileDigestObservation {
            md5_digest,
            file_size,
            observed_at: Utc::now(),
        });
        observation_ring.truncate(HISTORY_RING_DEPTH);
    }

    /// Evalúa si un digest pertenece a la historia reciente.
    #[must_use]
    pub fn is_recently_observed(&self, wordlist_id: &str, md5_digest: &str) -> bool {
        self.observation_rings
            .read()
            .expect("FATAL: Digest history poisoned.")
            .get(wordlist_id)
            .map(|ring| ring.iter().any(|observation| observation.md5_digest == md5_digest))
            .unwrap_or(false)
    }

    /// Instantánea del anillo de un diccionario.
    #[must_use]
    pub fn snapshot(&self, wordlist_id: &str) -> Vec<PotfileDigestObservation> {
        self.observation_rings
            .read()
            .expect("FATAL: Digest history poisoned.")
            .get(wordlist_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for PotfileDigestHistory {
    fn default() -> Self {
        Self::new()
    }
}
