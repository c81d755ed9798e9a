// [libs/core/keyspace/src/rule_split.rs]
/*!
 * =================================================================
 * APARATO: RULE SPLIT MANAGER (V14.0 - REFERENCE LEDGER)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: MATERIALIZACIÓN Y CICLO DE VIDA DE CHUNKS DE REGLAS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. BOUNDED SUBSETS: Cuando la amplificación de reglas haría que un
 *    único chunk exceda la duración objetivo, el fichero de reglas se
 *    particiona en subconjuntos contiguos en disco; cada tarea ejecuta
 *    un subconjunto acotado sobre el diccionario completo.
 * 2. REFERENCE COUNTING: Un fichero de chunk es compartido por todas
 *    las tareas que lo referencian; se purga al llegar su conteo a
 *    cero o al terminar el trabajo propietario.
 * 3. STRATEGY IMMUTABILITY: La selección de fragmentación por reglas
 *    es definitiva para la vida del trabajo; este aparato nunca la
 *    revisa.
 *
 * # Mathematical Proof (Chunk Sizing):
 * reglas_por_chunk = max(1, (v × T) / (base × sales)). Cada regla del
 * subconjunto recorre el diccionario completo (× sales si aplica), por
 * lo que el tiempo de pared del chunk converge a T segundos.
 * =================================================================
 */

use crate::errors::KeyspaceError;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Subconjunto contiguo de reglas materializado en disco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleChunk {
    /// Ruta del fichero de chunk generado.
    pub chunk_file_path: PathBuf,
    /// Índice de regla inicial (inclusive).
    pub rule_start_index: u64,
    /// Índice de regla final (exclusive).
    pub rule_end_index: u64,
    /// Cantidad de reglas contenidas.
    pub rule_count: u64,
}

/**
 * Autoridad única sobre los ficheros de chunk de reglas y su conteo
 * de referencias. Ningún otro aparato muta estos ficheros.
 */
pub struct RuleSplitManager {
    chunk_storage_root: PathBuf,
    /// Ledger de referencias vivas por fichero de chunk.
    reference_ledger: Mutex<HashMap<PathBuf, usize>>,
}

impl RuleSplitManager {
    /// Construye el gestor sobre una raíz de almacenamiento de chunks.
    #[must_use]
    pub fn new(chunk_storage_root: PathBuf) -> Self {
        Self {
            chunk_storage_root,
            reference_ledger: Mutex::new(HashMap::new()),
        }
    }

    /**
     * Materializa las reglas `[start, start+count)` del fichero origen
     * en un chunk propio del trabajo y registra una referencia inicial.
     *
     * # Errors:
     * - `KeyspaceError::RuleRangeOutOfBounds`: el rango excede el origen.
     * - `KeyspaceError::RuleChunkIo`: colapso de I/O al leer o escribir.
     */
    #[instrument(skip(self, source_rule_path), fields(job = %job_execution_id))]
    pub fn create_chunk(
        &self,
        job_execution_id: &Uuid,
        source_rule_path: &Path,
        rule_start_index: u64,
        rule_count: u64,
    ) -> Result<RuleChunk, KeyspaceError> {
        let effective_rules = read_effective_rules(source_rule_path)?;
        let total_rules = effective_rules.len() as u64;

        let rule_end_index = rule_start_index.saturating_add(rule_count);
        if rule_start_index >= total_rules || rule_end_index > total_rules || rule_count == 0 {
            return Err(KeyspaceError::RuleRangeOutOfBounds {
                start: rule_start_index,
                count: rule_count,
                total: total_rules,
            });
        }

        let job_chunk_directory = self.chunk_storage_root.join(job_execution_id.to_string());
        fs::create_dir_all(&job_chunk_directory)?;

        let chunk_file_path = job_chunk_directory.join(format!(
            "rules_{}_{}.rule",
            rule_start_index, rule_end_index
        ));

        let mut chunk_file = fs::File::create(&chunk_file_path)?;
        for rule_line in &effective_rules[rule_start_index as usize..rule_end_index as usize] {
            writeln!(chunk_file, "{}", rule_line)?;
        }
        chunk_file.flush()?;

        // Referencia inicial de la tarea que provoca la materialización.
        self.register_reference(&chunk_file_path);

        info!(
            "✂️ [RULE_CHUNK]: Materialized rules [{}, {}) for job {} at {}.",
            rule_start_index,
            rule_end_index,
            job_execution_id,
            chunk_file_path.display()
        );

        Ok(RuleChunk {
            chunk_file_path,
            rule_start_index,
            rule_end_index,
            rule_count,
        })
    }

    /// Registra una referencia viva adicional sobre un chunk existente.
    pub fn register_reference(&self, chunk_file_path: &Path) {
        let mut ledger_guard = self
            .reference_ledger
            .lock()
            .expect("FATAL: Rule chunk ledger poisoned.");
        *ledger_guard.entry(chunk_file_path.to_path_buf()).or_insert(0) += 1;
    }

    /**
     * Libera una referencia; al llegar a cero el fichero se purga.
     * La purga es best-effort: un fallo de borrado se degrada a warning.
     */
    pub fn release_reference(&self, chunk_file_path: &Path) {
        let remaining_references = {
            let mut ledger_guard = self
                .reference_ledger
                .lock()
                .expect("FATAL: Rule chunk ledger poisoned.");

            match ledger_guard.get_mut(chunk_file_path) {
                Some(reference_count) => {
                    *reference_count = reference_count.saturating_sub(1);
                    let remaining = *reference_count;
                    if remaining == 0 {
                        ledger_guard.remove(chunk_file_path);
                    }
                    remaining
                }
                None => return,
            }
        };

        if remaining_references == 0 {
            if let Err(purge_fault) = fs::remove_file(chunk_file_path) {
                warn!(
                    "⚠️ [RULE_CHUNK]: Failed to purge {}: {}",
                    chunk_file_path.display(),
                    purge_fault
                );
            } else {
                debug!("💀 [RULE_CHUNK]: Purged {}.", chunk_file_path.display());
            }
        }
    }

    /**
     * Purga todos los chunks de un trabajo al terminar su ciclo de vida,
     * independientemente de las referencias vivas.
     */
    #[instrument(skip(self), fields(job = %job_execution_id))]
    pub fn cleanup_job(&self, job_execution_id: &Uuid) {
        let job_chunk_directory = self.chunk_storage_root.join(job_execution_id.to_string());

        {
            let mut ledger_guard = self
                .reference_ledger
                .lock()
                .expect("FATAL: Rule chunk ledger poisoned.");
            ledger_guard.retain(|chunk_path, _| !chunk_path.starts_with(&job_chunk_directory));
        }

        match fs::remove_dir_all(&job_chunk_directory) {
            Ok(()) => info!(
                "💀 [RULE_CHUNK]: Job {} chunk directory purged.",
                job_execution_id
            ),
            Err(purge_fault) if purge_fault.kind() == std::io::ErrorKind::NotFound => {}
            Err(purge_fault) => warn!(
                "⚠️ [RULE_CHUNK]: Cleanup of job {} failed: {}",
                job_execution_id, purge_fault
            ),
        }
    }

    /// Referencias vivas de un chunk (instrumentación de pruebas).
    #[must_use]
    pub fn live_references(&self, chunk_file_path: &Path) -> usize {
        self.reference_ledger
            .lock()
            .expect("FATAL: Rule chunk ledger poisoned.")
            .get(chunk_file_path)
            .copied()
            .unwrap_or(0)
    }
}

/// Número de reglas efectivas de un fichero: líneas no vacías que no
/// son comentarios.
pub fn count_rules(rule_file_path: &Path) -> Result<u64, KeyspaceError> {
    Ok(read_effective_rules(rule_file_path)?.len() as u64)
}

/**
 * Decide si un trabajo entra en fragmentación por reglas.
 *
 * # Logic:
 * estimated_seconds = effective / v debe exceder el umbral de disparo
 * y el total de reglas debe alcanzar el mínimo configurado. La
 * decisión es definitiva para la vida del trabajo.
 */
#[must_use]
pub fn should_split_rules(
    effective_keyspace: u64,
    benchmark_speed: u64,
    trigger_seconds: f64,
    total_rule_count: u64,
    minimum_rule_count: u64,
) -> bool {
    if benchmark_speed == 0 || total_rule_count < minimum_rule_count {
        return false;
    }
    let estimated_seconds = effective_keyspace as f64 / benchmark_speed as f64;
    estimated_seconds > trigger_seconds
}

/**
 * Dimensiona el siguiente rango de reglas `[start, start+count)`.
 *
 * # Errors:
 * - `KeyspaceError::NoRemainingKeyspace`: el cursor agotó las reglas.
 * - `KeyspaceError::EmptyBaseKeyspace`: keyspace base nulo.
 *
 * # Logic:
 * reglas_por_chunk = max(1, (v × T) / (base × sales)), con fusión de
 * cola análoga a la dimensión de keyspace y un suelo que acota el
 * número total de chunks del trabajo.
 */
pub fn plan_rule_chunk(
    benchmark_speed: u64,
    chunk_duration_seconds: u64,
    base_keyspace: u64,
    salt_count: Option<u64>,
    total_rule_count: u64,
    dispatched_rule_cursor: u64,
    fluctuation_percentage: u64,
    max_chunks: u64,
) -> Result<(u64, u64), KeyspaceError> {
    if base_keyspace == 0 {
        return Err(KeyspaceError::EmptyBaseKeyspace);
    }
    if dispatched_rule_cursor >= total_rule_count {
        return Err(KeyspaceError::NoRemainingKeyspace);
    }

    let salt_factor = salt_count.unwrap_or(1).max(1);
    let per_rule_cost = base_keyspace.saturating_mul(salt_factor).max(1);
    let chunk_target_effective = benchmark_speed
        .max(1)
        .saturating_mul(chunk_duration_seconds);

    let mut rules_per_chunk = (chunk_target_effective / per_rule_cost).max(1);

    // Suelo anti-explosión: el trabajo no debe superar max_chunks.
    if max_chunks > 0 {
        let floor_per_chunk = total_rule_count.div_ceil(max_chunks);
        rules_per_chunk = rules_per_chunk.max(floor_per_chunk);
    }

    let mut rule_count = rules_per_chunk.min(total_rule_count - dispatched_rule_cursor);

    // Fusión de cola en la dimensión de reglas.
    let tail_remainder = total_rule_count - dispatched_rule_cursor - rule_count;
    let merge_tolerance = rules_per_chunk.saturating_mul(fluctuation_percentage) / 100;
    if tail_remainder > 0 && tail_remainder <= merge_tolerance {
        rule_count += tail_remainder;
    }

    Ok((dispatched_rule_cursor, rule_count))
}

/// Proyección de reglas efectivas de un fichero.
fn read_effective_rules(rule_file_path: &Path) -> Result<Vec<String>, KeyspaceError> {
    let raw_content = fs::read_to_string(rule_file_path)?;
    Ok(raw_content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forge_rule_file(directory: &Path, rule_count: usize) -> PathBuf {
        let rule_path = directory.join("giant.rule");
        let mut body = String::from("# generated header\n\n");
        for rule_index in 0..rule_count {
            body.push_str(&format!("${}\n", rule_index % 10));
        }
        fs::write(&rule_path, body).unwrap();
        rule_path
    }

    #[test]
    fn certify_rule_counting_ignores_noise() {
        let workspace = tempfile::tempdir().unwrap();
        let rule_path = workspace.path().join("noisy.rule");
        fs::write(&rule_path, "# header\n\n:\nu\n   \n# tail\nl\n").unwrap();
        assert_eq!(count_rules(&rule_path).unwrap(), 3);
    }

    #[test]
    fn certify_split_decision_thresholds() {
        // Escenario de activación: base=10k, 500 reglas, 10k/s, 60s.
        // estimated = 5_000_000 / 10_000 = 500s > 72s y 500 ≥ 100.
        assert!(should_split_rules(5_000_000, 10_000, 72.0, 500, 100));

        // 50 reglas: volumen efectivo 500k → 50s ≤ 72s. Sin fragmentación.
        assert!(!should_split_rules(500_000, 10_000, 72.0, 50, 100));

        // Reglas suficientes pero ataque corto: sin fragmentación.
        assert!(!should_split_rules(100_000, 10_000, 72.0, 500, 100));
    }

    #[test]
    fn certify_rule_chunk_sizing_with_tail_merge() {
        // v=10k/s, T=60s, base=10k: 600k/10k = 60 reglas por chunk.
        let (start, count) =
            plan_rule_chunk(10_000, 60, 10_000, None, 500, 0, 20, 1000).unwrap();
        assert_eq!((start, count), (0, 60));

        let (start, count) =
            plan_rule_chunk(10_000, 60, 10_000, None, 500, 60, 20, 1000).unwrap();
        assert_eq!((start, count), (60, 60));

        // Cursor 440: las 60 reglas restantes caben exactas.
        let (start, count) =
            plan_rule_chunk(10_000, 60, 10_000, None, 500, 440, 20, 1000).unwrap();
        assert_eq!((start, count), (440, 60));

        // Cursor 432: remanente 8 ≤ 12 (20% de 60) se fusiona → 68.
        let (start, count) =
            plan_rule_chunk(10_000, 60, 10_000, None, 500, 432, 20, 1000).unwrap();
        assert_eq!((start, count), (432, 68));

        // Sales multiplican el coste por regla y encogen el chunk.
        let (_, salted_count) =
            plan_rule_chunk(10_000, 60, 10_000, Some(10), 500, 0, 20, 1000).unwrap();
        assert_eq!(salted_count, 6);

        // Cursor agotado.
        assert!(matches!(
            plan_rule_chunk(10_000, 60, 10_000, None, 500, 500, 20, 1000),
            Err(KeyspaceError::NoRemainingKeyspace)
        ));
    }

    #[test]
    fn certify_max_chunks_floor() {
        // 10_000 reglas con tope de 10 chunks: mínimo 1000 reglas/chunk
        // aunque la velocidad pidiera chunks minúsculos.
        let (_, count) =
            plan_rule_chunk(1, 1, 1_000_000, None, 10_000, 0, 20, 10).unwrap();
        assert_eq!(count, 1_000);
    }

    #[test]
    fn certify_chunk_materialization_and_refcount() {
        let workspace = tempfile::tempdir().unwrap();
        let manager = RuleSplitManager::new(workspace.path().join("chunks"));
        let rule_path = forge_rule_file(workspace.path(), 100);
        let job_identifier = Uuid::new_v4();

        let chunk = manager
            .create_chunk(&job_identifier, &rule_path, 30, 40)
            .unwrap();
        assert!(chunk.chunk_file_path.exists());
        assert_eq!(chunk.rule_end_index, 70);
        assert_eq!(count_rules(&chunk.chunk_file_path).unwrap(), 40);
        assert_eq!(manager.live_references(&chunk.chunk_file_path), 1);

        // Segunda tarea comparte el chunk; la primera liberación no purga.
        manager.register_reference(&chunk.chunk_file_path);
        manager.release_reference(&chunk.chunk_file_path);
        assert!(chunk.chunk_file_path.exists());

        // Última liberación: purga física.
        manager.release_reference(&chunk.chunk_file_path);
        assert!(!chunk.chunk_file_path.exists());
        assert_eq!(manager.live_references(&chunk.chunk_file_path), 0);
    }

    #[test]
    fn certify_out_of_bounds_chunk_rejected() {
        let workspace = tempfile::tempdir().unwrap();
        let manager = RuleSplitManager::new(workspace.path().join("chunks"));
        let rule_path = forge_rule_file(workspace.path(), 10);
        let job_identifier = Uuid::new_v4();

        assert!(matches!(
            manager.create_chunk(&job_identifier, &rule_path, 5, 10),
            Err(KeyspaceError::RuleRangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn certify_job_cleanup_removes_every_chunk() {
        let workspace = tempfile::tempdir().unwrap();
        let manager = RuleSplitManager::new(workspace.path().join("chunks"));
        let rule_path = forge_rule_file(workspace.path(), 100);
        let job_identifier = Uuid::new_v4();

        let first_chunk = manager.create_chunk(&job_identifier, &rule_path, 0, 50).unwrap();
        let second_chunk = manager.create_chunk(&job_identifier, &rule_path, 50, 50).unwrap();

        manager.cleanup_job(&job_identifier);

        assert!(!first_chunk.chunk_file_path.exists());
        assert!(!second_chunk.chunk_file_path.exists());
        assert_eq!(manager.live_references(&first_chunk.chunk_file_path), 0);

        println!("✅ RULE_SPLIT: Lifecycle and ledger certified.");
    }
}
