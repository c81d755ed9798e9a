// [libs/core/probabilistic/src/lib.rs]

#![deny(missing_docs)]

//! # APARATO: PROBABILISTIC STRATUM ROOT (V20.0 - INGESTION GOLD)
//! CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
//! RESPONSABILIDAD: ORQUESTACIÓN Y EXPOSICIÓN DEL MOTOR PROBABILÍSTICO
//!
//! ## Visión Holística 2026
//! Actúa como la autoridad de deduplicación del pipeline de potfile.
//! Esta versión sella la integración entre el filtro de texto plano y
//! la bóveda LRU por cliente, garantizando que la ingesta masiva de
//! contraseñas opere sobre memoria acotada y determinista.
//!
//! ## Características de Élite
//! 1. **Bounded Memory:** La deduplicación de decenas de millones de
//!    líneas reside en mapas de bits de tamaño fijo.
//! 2. **Nominal Symmetry:** Tipos sincronizados con el contrato del
//!    worker de ingestión L4.
//! 3. **Higiene L1:** Erradicación total de advertencias del compilador.

/// Definiciones de errores semánticos para el triaje programático de fallos.
pub mod errors;

/// Filtro de deduplicación de texto plano con persistencia Bincode.
pub mod plaintext_filter;

/// Bóveda LRU de filtros por cliente.
pub mod vault;

pub use crate::errors::FilterError;
pub use crate::plaintext_filter::PlaintextDedupFilter;
pub use crate::vault::{ClientFilterVault, DEFAULT_VAULT_CAPACITY};

/**
 * PRELUDIO PROBABILÍSTICO
 *
 * Colección de tipos de alta frecuencia para inyección directa en el
 * worker de ingestión.
 */
pub mod prelude {
    pub use crate::errors::FilterError;
    pub use crate::plaintext_filter::PlaintextDedupFilter;
    pub use crate::vault::ClientFilterVault;
}

#[cfg(test)]
mod tests {
    use super::*;

    /**
     * CERTIFICACIÓN: Ley de deduplicación del pipeline.
     * Una contraseña registrada dos veces produce exactamente una
     * admisión: la segunda consulta la reporta presente.
     */
    #[test]
    fn certify_double_ingest_single_admission() {
        let mut dedup_filter = PlaintextDedupFilter::new(10_000, 0.01);

        assert!(!dedup_filter.contains_plaintext(b"hunter2"));
        dedup_filter.register_plaintext(b"hunter2");
        assert!(dedup_filter.contains_plaintext(b"hunter2"));

        // La contraseña vacía es un ciudadano legítimo del potfile.
        assert!(!dedup_filter.contains_plaintext(b""));
        dedup_filter.register_plaintext(b"");
        assert!(dedup_filter.contains_plaintext(b""));

        assert_eq!(dedup_filter.registered_lines(), 2);
    }

    /**
     * CERTIFICACIÓN: Paridad binaria del ciclo persistencia/hidratación.
     */
    #[test]
    fn certify_disk_roundtrip_parity() {
        let workspace = tempfile::tempdir().unwrap();
        let artifact_path = workspace.path().join("global.filter.bin");

        let mut original_filter = PlaintextDedupFilter::new(1_000, 0.01);
        for seed in 0..500u32 {
            original_filter.register_plaintext(format!("password-{seed}").as_bytes());
        }
        original_filter.save_to_disk(&artifact_path).unwrap();

        let hydrated_filter = PlaintextDedupFilter::load_from_disk(&artifact_path).unwrap();
        assert_eq!(hydrated_filter.registered_lines(), 500);
        for seed in 0..500u32 {
            assert!(hydrated_filter.contains_plaintext(format!("password-{seed}").as_bytes()));
        }

        println!("✅ STRATUM_L1: Binary parity certified.");
    }

    /**
     * CERTIFICACIÓN: Desalojo LRU de la bóveda por cliente.
     */
    #[test]
    fn certify_vault_lru_eviction() {
        let vault = ClientFilterVault::new(2, 100, 0.01);

        let first_filter = vault.acquire("client-alpha");
        first_filter.write().unwrap().register_plaintext(b"alpha-secret");

        vault.acquire("client-beta");
        assert_eq!(vault.resident_count(), 2);

        // El tercer cliente desaloja al de acceso menos reciente (alpha).
        vault.acquire("client-gamma");
        assert_eq!(vault.resident_count(), 2);

        // Alpha re-sintetiza en frío: el rastro previo ya no reside.
        let resurrected_filter = vault.acquire("client-alpha");
        assert!(!resurrected_filter.read().unwrap().contains_plaintext(b"alpha-secret"));
    }
}
