// [libs/core/keyspace/src/planner.rs]
/*!
 * =================================================================
 * APARATO: CHUNK PLANNER ENGINE (V17.0 - TAIL MERGE)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: DIMENSIONADO PURO DE RANGOS DE KEYSPACE
 *
 * # Mathematical Proof (Duration Targeting):
 * objetivo_efectivo = v × T candidatos. La conversión a unidades base
 * divide por el factor de multiplicación (reglas × sales), de modo que
 * el chunk despachado consume ≈T segundos de pared en el agente
 * independientemente de la amplificación del ataque.
 * =================================================================
 */

use crate::errors::KeyspaceError;

/// Velocidad sintética cuando el agente carece de benchmark: un millón
/// de candidatos por segundo.
pub const SYNTHETIC_BENCHMARK_CANDIDATES: u64 = 1_000_000;

/// Entrada pura del planificador para el siguiente chunk de un
/// trabajo o capa.
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Velocidad medida del agente en candidatos efectivos por segundo.
    /// Cero activa el default sintético.
    pub benchmark_speed: u64,
    /// Duración de pared objetivo del chunk, en segundos.
    pub chunk_duration_seconds: u64,
    /// Factor de amplificación (reglas × sales), acotado ≥ 1.
    pub multiplication_factor: u64,
    /// Keyspace base total del trabajo o capa.
    pub base_keyspace: u64,
    /// Máximo keyspace_end despachado hasta ahora (cursor).
    pub dispatched_cursor: u64,
    /// Tolerancia de fusión de cola como porcentaje del chunk objetivo.
    pub fluctuation_percentage: u64,
}

/// Rango planificado en unidades base y su proyección efectiva
/// estimada. El conteo efectivo real lo reporta el binario del agente
/// y sobrescribe la estimación al completarse el chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Inicio del rango base (inclusive).
    pub keyspace_start: u64,
    /// Fin del rango base (exclusive).
    pub keyspace_end: u64,
    /// Proyección efectiva del inicio.
    pub effective_keyspace_start: u64,
    /// Proyección efectiva del fin.
    pub effective_keyspace_end: u64,
    /// true cuando la fusión de cola extendió el rango hasta el final.
    pub is_tail_merged: bool,
}

impl ChunkPlan {
    /// Volumen del rango en unidades base.
    #[must_use]
    pub fn base_span(&self) -> u64 {
        self.keyspace_end - self.keyspace_start
    }

    /// Determina si el chunk cubre el keyspace hasta su final.
    #[must_use]
    pub fn reaches_keyspace_end(&self, base_keyspace: u64) -> bool {
        self.keyspace_end >= base_keyspace
    }
}

/**
 * Dimensiona el siguiente rango `[start, end)` en unidades base.
 *
 * # Errors:
 * - `KeyspaceError::EmptyBaseKeyspace`: keyspace base nulo (estado inesperado).
 * - `KeyspaceError::NoRemainingKeyspace`: el cursor alcanzó el final.
 *
 * # Logic:
 * 1. objetivo_base = (v × T) / factor, acotado ≥ 1.
 * 2. end = min(start + objetivo_base, base).
 * 3. Fusión de cola: si el remanente tras `end` cabe dentro del
 *    porcentaje de fluctuación del objetivo, `end` se extiende hasta
 *    el final para no dejar un sub-chunk residual.
 */
pub fn plan_next_chunk(request: &ChunkRequest) -> Result<ChunkPlan, KeyspaceError> {
    if request.base_keyspace == 0 {
        return Err(KeyspaceError::EmptyBaseKeyspace);
    }

    let keyspace_start = request.dispatched_cursor;
    if keyspace_start >= request.base_keyspace {
        return Err(KeyspaceError::NoRemainingKeyspace);
    }

    let effective_speed = if request.benchmark_speed == 0 {
        SYNTHETIC_BENCHMARK_CANDIDATES
    } else {
        request.benchmark_speed
    };

    let multiplication_factor = request.multiplication_factor.max(1);

    let chunk_target_effective = effective_speed.saturating_mul(request.chunk_duration_seconds);
    let chunk_target_base = (chunk_target_effective / multiplication_factor).max(1);

    let mut keyspace_end = keyspace_start
        .saturating_add(chunk_target_base)
        .min(request.base_keyspace);

    // Fusión de cola: absorbe remanentes sub-umbral en este chunk.
    let tail_remainder = request.base_keyspace - keyspace_end;
    let merge_tolerance = chunk_target_base
        .saturating_mul(request.fluctuation_percentage)
        / 100;
    let mut is_tail_merged = false;

    if tail_remainder > 0 && tail_remainder <= merge_tolerance {
        keyspace_end = request.base_keyspace;
        is_tail_merged = true;
    }

    Ok(ChunkPlan {
        keyspace_start,
        keyspace_end,
        effective_keyspace_start: keyspace_start.saturating_mul(multiplication_factor),
        effective_keyspace_end: keyspace_end.saturating_mul(multiplication_factor),
        is_tail_merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        benchmark_speed: u64,
        chunk_duration_seconds: u64,
        multiplication_factor: u64,
        base_keyspace: u64,
        dispatched_cursor: u64,
    ) -> ChunkRequest {
        ChunkRequest {
            benchmark_speed,
            chunk_duration_seconds,
            multiplication_factor,
            base_keyspace,
            dispatched_cursor,
            fluctuation_percentage: 20,
        }
    }

    #[test]
    fn certify_single_chunk_covers_small_wordlist() {
        // Diccionario de 1M, 100k/s, 60s: el objetivo (6M base) engulle
        // todo el keyspace en un único chunk.
        let plan = plan_next_chunk(&request(100_000, 60, 1, 1_000_000, 0)).unwrap();
        assert_eq!(plan.keyspace_start, 0);
        assert_eq!(plan.keyspace_end, 1_000_000);
        assert_eq!(plan.effective_keyspace_end, 1_000_000);
        assert!(plan.reaches_keyspace_end(1_000_000));
    }

    #[test]
    fn certify_keyspace_split_sizing_with_rules() {
        // base=10_000, 50 reglas, 10_000/s, 60s: objetivo efectivo 600k
        // → 12_000 base, pero el keyspace sólo tiene 10_000.
        let plan = plan_next_chunk(&request(10_000, 60, 50, 10_000, 0)).unwrap();
        assert_eq!(plan.keyspace_end, 10_000);

        // Con un keyspace mayor, el chunk base queda en 600k/50 = 12k.
        let plan = plan_next_chunk(&request(10_000, 60, 50, 100_000, 0)).unwrap();
        assert_eq!(plan.base_span(), 12_000);
        assert_eq!(plan.effective_keyspace_end, 600_000);
    }

    #[test]
    fn certify_salt_adjustment_shrinks_base_span() {
        // Sales N=10 entran al factor: el mismo objetivo efectivo
        // produce un rango base 10 veces menor.
        let unsalted = plan_next_chunk(&request(10_000, 60, 5, 1_000_000, 0)).unwrap();
        let salted = plan_next_chunk(&request(10_000, 60, 50, 1_000_000, 0)).unwrap();
        assert_eq!(unsalted.base_span(), salted.base_span() * 10);
    }

    #[test]
    fn certify_tail_merge_absorbs_residue() {
        // Objetivo base 1000; cursor 8000 de 9050: el chunk natural
        // termina en 9000 y el remanente de 50 ≤ 200 (20% de 1000)
        // se fusiona en este chunk.
        let plan = plan_next_chunk(&request(1_000, 1, 1, 9_050, 8_000)).unwrap();
        assert_eq!(plan.keyspace_start, 8_000);
        assert_eq!(plan.keyspace_end, 9_050, "50-unit residue must merge into the chunk");
        assert!(plan.is_tail_merged);
    }

    #[test]
    fn certify_tail_above_tolerance_stays() {
        // Remanente 300 > 200 (20% de 1000): se conserva para otro chunk.
        let plan = plan_next_chunk(&request(1_000, 1, 1, 9_300, 8_000)).unwrap();
        assert_eq!(plan.keyspace_end, 9_000);
        assert!(!plan.is_tail_merged);
    }

    #[test]
    fn certify_synthetic_default_without_benchmark() {
        let plan = plan_next_chunk(&request(0, 1, 1, 50_000_000, 0)).unwrap();
        assert_eq!(plan.base_span(), SYNTHETIC_BENCHMARK_CANDIDATES);
    }

    #[test]
    fn certify_exhausted_cursor_fails() {
        let fault = plan_next_chunk(&request(1_000, 60, 1, 10_000, 10_000)).unwrap_err();
        assert!(matches!(fault, KeyspaceError::NoRemainingKeyspace));
    }

    #[test]
    fn certify_zero_base_keyspace_fails() {
        let fault = plan_next_chunk(&request(1_000, 60, 1, 0, 0)).unwrap_err();
        assert!(matches!(fault, KeyspaceError::EmptyBaseKeyspace));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Ley universal del planificador: todo chunk nace en el
            /// cursor, avanza estrictamente y jamás desborda el keyspace.
            #[test]
            fn certify_chunk_bounds_universal(
                benchmark_speed in 1u64..100_000_000,
                chunk_duration in 1u64..7_200,
                multiplication_factor in 1u64..100_000,
                base_keyspace in 1u64..1_000_000_000_000,
                cursor_seed in 0u64..1_000_000_000_000,
                fluctuation in 0u64..100,
            ) {
                let dispatched_cursor = cursor_seed % base_keyspace;
                let plan = plan_next_chunk(&ChunkRequest {
                    benchmark_speed,
                    chunk_duration_seconds: chunk_duration,
                    multiplication_factor,
                    base_keyspace,
                    dispatched_cursor,
                    fluctuation_percentage: fluctuation,
                }).unwrap();

                prop_assert_eq!(plan.keyspace_start, dispatched_cursor);
                prop_assert!(plan.keyspace_start < plan.keyspace_end);
                prop_assert!(plan.keyspace_end <= base_keyspace);
                prop_assert!(plan.effective_keyspace_start <= plan.effective_keyspace_end);
            }
        }
    }
}
