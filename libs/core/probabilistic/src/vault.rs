// [libs/core/probabilistic/src/vault.rs]
/*!
 * =================================================================
 * APARATO: CLIENT FILTER VAULT (V9.0 - LRU EVICTION)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: BÓVEDA LRU DE FILTROS DE DEDUPLICACIÓN POR CLIENTE
 *
 * # Logic:
 * Cada cliente con potfile propio posee su filtro de deduplicación.
 * La bóveda acota el consumo de RAM a una capacidad configurable,
 * desalojando el filtro de acceso menos reciente. Un filtro desalojado
 * se re-sintetiza en frío en su próximo uso; el coste es un ciclo de
 * staging adicional para los duplicados, jamás pérdida de material.
 * =================================================================
 */

use crate::plaintext_filter::PlaintextDedupFilter;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, instrument};

/// Capacidad por defecto de la bóveda (filtros de cliente residentes).
pub const DEFAULT_VAULT_CAPACITY: usize = 50;

/// Bóveda thread-safe de filtros por cliente con desalojo LRU.
pub struct ClientFilterVault {
    resident_filters: Mutex<LruCache<String, Arc<RwLock<PlaintextDedupFilter>>>>,
    per_client_expected_lines: usize,
    target_false_positive_rate: f64,
}

impl ClientFilterVault {
    /**
     * Construye la bóveda con su capacidad de residencia y los
     * parámetros de síntesis de los filtros por cliente.
     */
    #[must_use]
    pub fn new(
        vault_capacity: usize,
        per_client_expected_lines: usize,
        target_false_positive_rate: f64,
    ) -> Self {
        let bounded_capacity = NonZeroUsize::new(vault_capacity.max(1))
            .expect("capacity is clamped to at least one");

        Self {
            resident_filters: Mutex::new(LruCache::new(bounded_capacity)),
            per_client_expected_lines,
            target_false_positive_rate,
        }
    }

    /**
     * Recupera el filtro de un cliente, sintetizándolo en frío si no
     * reside en la bóveda. El acceso refresca su posición LRU.
     */
    #[instrument(skip(self), fields(client = %client_identifier))]
    pub fn acquire(&self, client_identifier: &str) -> Arc<RwLock<PlaintextDedupFilter>> {
        let mut vault_guard = self
            .resident_filters
            .lock()
            .expect("FATAL: Client filter vault poisoned.");

        if let Some(resident_filter) = vault_guard.get(client_identifier) {
            return Arc::clone(resident_filter);
        }

        debug!("🧊 [VAULT_COLD_START]: Synthesizing filter for client {}.", client_identifier);

        let fresh_filter = Arc::new(RwLock::new(PlaintextDedupFilter::new(
            self.per_client_expected_lines,
            self.target_false_positive_rate,
        )));

        vault_guard.put(client_identifier.to_string(), Arc::clone(&fresh_filter));
        fresh_filter
    }

    /**
     * Sustituye el filtro residente de un cliente tras una regeneración
     * de potfile desde material autoritativo.
     */
    pub fn replace(&self, client_identifier: &str, rebuilt_filter: PlaintextDedupFilter) {
        let mut vault_guard = self
            .resident_filters
            .lock()
            .expect("FATAL: Client filter vault poisoned.");
        vault_guard.put(
            client_identifier.to_string(),
            Arc::new(RwLock::new(rebuilt_filter)),
        );
    }

    /// Volumen de filtros residentes (instrumentación de pruebas).
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.resident_filters
            .lock()
            .expect("FATAL: Client filter vault poisoned.")
            .len()
    }
}
