// [libs/core/probabilistic/src/plaintext_filter.rs]
/*!
 * =================================================================
 * APARATO: PLAINTEXT DEDUP FILTER (V18.0 - INGESTION GOLD)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: DEDUPLICACIÓN PROBABILÍSTICA DE CONTRASEÑAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED MEMORY: El filtro acota la memoria de deduplicación de
 *    potfiles de decenas de millones de líneas a un mapa de bits fijo.
 * 2. FALSE POSITIVE TOLERANCE: Un falso positivo retiene la contraseña
 *    en staging un ciclo adicional; jamás pierde material.
 * 3. BINARY PARITY: Serialización Bincode con orden Little-Endian y
 *    enteros de ancho fijo para paridad entre arquitecturas.
 *
 * # Mathematical Proof (Bloom Saturation):
 * Para n elementos esperados y tasa p, el filtro dimensiona
 * m = −n·ln(p)/ln²(2) bits con k = m/n·ln(2) funciones hash. La tasa
 * de falsos positivos se mantiene ≤ p hasta la saturación nominal.
 * =================================================================
 */

use crate::errors::FilterError;
use bincode::Options;
use bloomfilter::Bloom;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Límite de seguridad del artefacto serializado (256MB).
const MAXIMUM_FILTER_ARTIFACT_BYTES: u64 = 256_000_000;

/**
 * Genera la configuración soberana de serialización Bincode.
 * Garantiza determinismo entre arquitecturas x86_64 y ARM64.
 */
fn get_filter_serialization_config() -> impl bincode::Options {
    bincode::DefaultOptions::new()
        .with_little_endian()
        .with_fixint_encoding()
        .with_limit(MAXIMUM_FILTER_ARTIFACT_BYTES)
        .allow_trailing_bytes()
}

/// Matriz de deduplicación de texto plano para un potfile concreto.
#[derive(Serialize, Deserialize)]
pub struct PlaintextDedupFilter {
    /// Matriz de Bloom sobre los bytes crudos de cada línea.
    /// El parámetro de tipo es propietario para preservar la paridad
    /// de serialización del artefacto binario.
    plaintext_bloom_matrix: Bloom<Vec<u8>>,
    /// Volumen total de líneas registradas en este filtro.
    registered_line_count: u64,
}

impl PlaintextDedupFilter {
    /**
     * Inicializa un filtro con parámetros de saturación específicos.
     *
     * # Performance:
     * Complejidad O(1). Alocación inicial proporcional a la capacidad
     * nominal y la tasa de error deseada.
     */
    #[must_use]
    #[instrument(level = "debug", skip(expected_line_volume, target_false_positive_rate))]
    pub fn new(expected_line_volume: usize, target_false_positive_rate: f64) -> Self {
        let nominal_capacity = if expected_line_volume == 0 { 1 } else { expected_line_volume };
        let acceptable_error_rate = if target_false_positive_rate <= 0.0 {
            0.0000001
        } else {
            target_false_positive_rate
        };

        debug!("🧠 [FILTER_GENESIS]: Synthesizing dedup matrix for {} lines...", nominal_capacity);

        Self {
            plaintext_bloom_matrix: Bloom::new_for_fp_rate(nominal_capacity, acceptable_error_rate),
            registered_line_count: 0,
        }
    }

    /// Registra una contraseña en la matriz de deduplicación.
    #[inline(always)]
    pub fn register_plaintext(&mut self, plaintext_payload: &[u8]) {
        self.plaintext_bloom_matrix.set(&plaintext_payload.to_vec());
        self.registered_line_count += 1;
    }

    /**
     * Consulta la presencia probable de una contraseña.
     *
     * # Returns:
     * - `true` ante una colisión probable (FPR controlado).
     * - `false` ante la ausencia absoluta del rastro.
     */
    #[must_use]
    #[inline(always)]
    pub fn contains_plaintext(&self, plaintext_payload: &[u8]) -> bool {
        self.plaintext_bloom_matrix.check(&plaintext_payload.to_vec())
    }

    /// Retorna el volumen de líneas registradas.
    #[must_use]
    pub fn registered_lines(&self) -> u64 {
        self.registered_line_count
    }

    /**
     * Reconstruye el filtro desde un corpus autoritativo de líneas.
     * Usado en la regeneración de potfiles por cliente.
     */
    pub fn rebuild_from_lines<'line_stream>(
        expected_line_volume: usize,
        target_false_positive_rate: f64,
        authoritative_lines: impl Iterator<Item = &'line_stream str>,
    ) -> Self {
        let mut rebuilt_filter = Self::new(expected_line_volume, target_false_positive_rate);
        for authoritative_line in authoritative_lines {
            rebuilt_filter.register_plaintext(authoritative_line.as_bytes());
        }
        rebuilt_filter
    }

    /**
     * Persiste el filtro en el almacenamiento físico mediante ráfagas
     * de escritura bufferizadas.
     *
     * # Errors:
     * Falla si el filesystem deniega el acceso o la serialización colapsa.
     */
    #[instrument(skip(self, storage_path))]
    pub fn save_to_disk<P: AsRef<Path>>(&self, storage_path: P) -> Result<(), FilterError> {
        let performance_timer = Instant::now();
        let file_handle = File::create(&storage_path).map_err(FilterError::IoError)?;
        let buffered_writer = BufWriter::new(file_handle);

        get_filter_serialization_config()
            .serialize_into(buffered_writer, &self)
            .map_err(|serialization_fault| {
                error!("❌ [SERIALIZATION_COLLAPSE]: Failed to package filter: {}", serialization_fault);
                FilterError::SerializationError(serialization_fault)
            })?;

        info!(
            "💾 [FILTER_SYNC]: {} lines crystallized. Latency: {:?}",
            self.registered_line_count,
            performance_timer.elapsed()
        );
        Ok(())
    }

    /**
     * Hidrata el filtro desde su artefacto binario en disco.
     *
     * # Errors:
     * Falla ante corrupción del artefacto o ausencia del fichero.
     */
    #[instrument(skip(storage_path))]
    pub fn load_from_disk<P: AsRef<Path>>(storage_path: P) -> Result<Self, FilterError> {
        let performance_timer = Instant::now();
        let file_handle = File::open(&storage_path).map_err(FilterError::IoError)?;
        let buffered_reader = BufReader::new(file_handle);

        let filter_instance: Self = get_filter_serialization_config()
            .deserialize_from(buffered_reader)
            .map_err(|decoding_fault| {
                error!("❌ [DECODING_FAULT]: Binary strata is malformed: {}", decoding_fault);
                FilterError::SerializationError(decoding_fault)
            })?;

        info!(
            "🚀 [FILTER_HYDRATED]: {} lines restored. Latency: {:?}",
            filter_instance.registered_line_count,
            performance_timer.elapsed()
        );
        Ok(filter_instance)
    }
}
