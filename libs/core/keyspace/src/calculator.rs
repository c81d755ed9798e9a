// [libs/core/keyspace/src/calculator.rs]
/*!
 * =================================================================
 * APARATO: KEYSPACE CALCULATOR ENGINE (V25.0 - METADATA PROBE)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: CONSULTA ACOTADA DE KEYSPACE AL BINARIO EXTERNO
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. DUAL PROBE: Primera llamada consulta el keyspace base; la segunda
 *    el total de candidatos (incluye amplificación de reglas). El
 *    contrato de salida es la última línea no vacía de stdout como
 *    entero decimal positivo.
 * 2. EPHEMERAL SESSIONS: Cada invocación usa un identificador de
 *    sesión único y deshabilita el fichero de restauración, lo que
 *    permite invocaciones concurrentes del mismo binario.
 * 3. GRACEFUL DEGRADATION: El fallo de la segunda llamada degrada a
 *    estimación (base × número de ficheros de reglas) marcando el
 *    keyspace como no exacto; jamás mata al trabajo por sí solo.
 *
 * # Mathematical Proof (Concurrency Guard Retry):
 * El binario serializa instancias mediante un guard propio. Ante el
 * rastro "already running" en stderr, el calculador reintenta hasta 3
 * veces con back-off fijo de 5 s, acotando la espera total a 15 s por
 * consulta de candidatos.
 * =================================================================
 */

use crate::errors::KeyspaceError;
use crate::rule_split;
use hashforge_domain_models::job::AttackMode;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Timeout de la consulta de keyspace base.
const BASE_KEYSPACE_TIMEOUT_SECONDS: u64 = 240;
/// Timeout por intento de la consulta de total de candidatos.
const TOTAL_CANDIDATES_TIMEOUT_SECONDS: u64 = 120;
/// Reintentos ante la colisión del guard de concurrencia del binario.
const CONCURRENCY_GUARD_MAX_RETRIES: u32 = 3;
/// Back-off fijo entre reintentos, en segundos.
const CONCURRENCY_GUARD_BACKOFF_SECONDS: u64 = 5;

/// Rastros de stderr que identifican la colisión del guard de
/// concurrencia del binario.
const CONCURRENCY_GUARD_MARKERS: [&str; 2] = ["already running", "Already an instance"];

/// Configuración de ataque ya materializada a rutas locales, lista
/// para la invocación del binario.
#[derive(Debug, Clone)]
pub struct AttackMaterialization {
    /// Modo de generación de candidatos.
    pub attack_mode: AttackMode,
    /// Diccionarios en orden posicional.
    pub wordlist_paths: Vec<PathBuf>,
    /// Ficheros de reglas en orden posicional.
    pub rule_paths: Vec<PathBuf>,
    /// Máscara para los modos que la requieren.
    pub mask: Option<String>,
}

/// Veredicto del calculador: la pareja (base, efectivo) y su pedigrí.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceReport {
    /// Candidatos del artefacto subyacente, sin amplificación.
    pub base_keyspace: u64,
    /// Evaluaciones totales, con reglas y ajuste de sales aplicados.
    pub effective_keyspace: u64,
    /// round(effective / base), acotado ≥ 1.
    pub multiplication_factor: u64,
    /// true sólo si el efectivo proviene del propio binario.
    pub is_accurate: bool,
    /// Valor efectivo previo al ajuste por sales, para auditoría.
    pub pre_salt_effective_keyspace: Option<u64>,
}

/**
 * Sonda de metadatos del binario de cracking. No ejecuta cracking:
 * sólo los modos de consulta de keyspace.
 */
pub struct KeyspaceCalculator {
    binary_path: PathBuf,
    session_workspace: PathBuf,
}

impl KeyspaceCalculator {
    /// Construye la sonda sobre un binario concreto y un workspace de
    /// sesiones efímeras.
    #[must_use]
    pub fn new(binary_path: PathBuf, session_workspace: PathBuf) -> Self {
        Self { binary_path, session_workspace }
    }

    /**
     * Calcula (base, efectivo, exactitud) para una configuración de ataque.
     *
     * # Errors:
     * - `KeyspaceError::BinaryUnresolvable` / `BinaryMissing`: binario ausente.
     * - `KeyspaceError::InvokeFailed`: colapso de la consulta base.
     * - `KeyspaceError::ParseFailed`: salida base no numérica.
     * - `KeyspaceError::UnsupportedAttack`: configuración malformada.
     *
     * # Logic:
     * El modo asociación no soporta metadatos: su base es el conteo de
     * líneas del diccionario y su efectivo una estimación por conteo de
     * reglas, siempre inexacto (exigirá benchmark forzado). El resto de
     * modos ejecuta la doble sonda contra el binario.
     */
    #[instrument(skip(self, attack), fields(mode = attack.attack_mode.as_str()))]
    pub async fn calculate(
        &self,
        attack: &AttackMaterialization,
        salt_count: Option<u64>,
    ) -> Result<KeyspaceReport, KeyspaceError> {
        if attack.attack_mode == AttackMode::Association {
            return self.estimate_association_keyspace(attack, salt_count);
        }

        self.verify_binary_presence()?;

        // --- SONDA 1: KEYSPACE BASE ---
        let base_session = EphemeralSession::forge(&self.session_workspace);
        let base_arguments =
            Self::metadata_arguments(attack, &base_session, "--keyspace")?;

        let base_outcome = self
            .run_bounded_probe(&base_arguments, BASE_KEYSPACE_TIMEOUT_SECONDS)
            .await;
        base_session.cleanup();

        let base_keyspace = parse_final_count(&base_outcome?.stdout)?;

        // --- SONDA 2: TOTAL DE CANDIDATOS (CON REINTENTOS) ---
        let (effective_raw, is_accurate) =
            match self.probe_total_candidates(attack).await {
                Ok(total_candidates) => (total_candidates, true),
                Err(probe_fault) => {
                    // Degradación a estimación: base × nº de ficheros de reglas.
                    let rule_file_factor = (attack.rule_paths.len() as u64).max(1);
                    let estimated = base_keyspace.saturating_mul(rule_file_factor);
                    warn!(
                        "📉 [KEYSPACE_DEGRADED]: Candidate probe failed ({}). Estimating effective = {} (base × {} rule files).",
                        probe_fault, estimated, rule_file_factor
                    );
                    (estimated, false)
                }
            };

        Ok(Self::assemble_report(base_keyspace, effective_raw, is_accurate, salt_count))
    }

    /// Estimación del modo asociación: base = líneas del diccionario,
    /// efectivo = base × Σ reglas por fichero. Siempre inexacto.
    fn estimate_association_keyspace(
        &self,
        attack: &AttackMaterialization,
        salt_count: Option<u64>,
    ) -> Result<KeyspaceReport, KeyspaceError> {
        let association_wordlist = attack.wordlist_paths.first().ok_or_else(|| {
            KeyspaceError::UnsupportedAttack(
                "association attack requires a wordlist".to_string(),
            )
        })?;

        let base_keyspace = count_plain_lines(association_wordlist)?;
        if base_keyspace == 0 {
            return Err(KeyspaceError::ParseFailed(
                "association wordlist is empty".to_string(),
            ));
        }

        let mut total_rule_count: u64 = 0;
        for rule_path in &attack.rule_paths {
            total_rule_count =
                total_rule_count.saturating_add(rule_split::count_rules(rule_path)?);
        }
        let rule_factor = total_rule_count.max(1);

        let effective = base_keyspace.saturating_mul(rule_factor);

        info!(
            "🧮 [KEYSPACE_ASSOC]: Estimated association keyspace base={} effective={} (forced benchmark required).",
            base_keyspace, effective
        );

        Ok(Self::assemble_report(base_keyspace, effective, false, salt_count))
    }

    /// Aplica el ajuste por sales y deriva el factor de multiplicación.
    fn assemble_report(
        base_keyspace: u64,
        effective_before_salt: u64,
        is_accurate: bool,
        salt_count: Option<u64>,
    ) -> KeyspaceReport {
        let (effective_keyspace, pre_salt_effective_keyspace) = match salt_count {
            Some(salts) if salts > 1 => {
                let adjusted = effective_before_salt.saturating_mul(salts);
                debug!(
                    "🧂 [SALT_ADJUST]: effective {} × {} salts = {}",
                    effective_before_salt, salts, adjusted
                );
                (adjusted, Some(effective_before_salt))
            }
            _ => (effective_before_salt, None),
        };

        let multiplication_factor = if base_keyspace == 0 {
            1
        } else {
            ((effective_keyspace as f64 / base_keyspace as f64).round() as u64).max(1)
        };

        KeyspaceReport {
            base_keyspace,
            effective_keyspace,
            multiplication_factor,
            is_accurate,
            pre_salt_effective_keyspace,
        }
    }

    /// Sonda de total de candidatos con reintentos ante el guard de
    /// concurrencia del binario.
    async fn probe_total_candidates(
        &self,
        attack: &AttackMaterialization,
    ) -> Result<u64, KeyspaceError> {
        let mut attempt_index: u32 = 0;

        loop {
            let session = EphemeralSession::forge(&self.session_workspace);
            let arguments =
                Self::metadata_arguments(attack, &session, "--total-candidates")?;

            let outcome = self
                .run_bounded_probe(&arguments, TOTAL_CANDIDATES_TIMEOUT_SECONDS)
                .await;
            session.cleanup();

            match outcome {
                Ok(probe_output) => return parse_final_count(&probe_output.stdout),
                Err(probe_fault) => {
                    let is_guard_collision = match &probe_fault {
                        KeyspaceError::InvokeFailed(detail) => CONCURRENCY_GUARD_MARKERS
                            .iter()
                            .any(|marker| detail.contains(marker)),
                        _ => false,
                    };

                    if is_guard_collision && attempt_index < CONCURRENCY_GUARD_MAX_RETRIES {
                        attempt_index += 1;
                        warn!(
                            "⏳ [GUARD_COLLISION]: Binary instance lock detected. Retry {}/{} in {}s.",
                            attempt_index,
                            CONCURRENCY_GUARD_MAX_RETRIES,
                            CONCURRENCY_GUARD_BACKOFF_SECONDS
                        );
                        tokio::time::sleep(Duration::from_secs(
                            CONCURRENCY_GUARD_BACKOFF_SECONDS,
                        ))
                        .await;
                        continue;
                    }

                    return Err(probe_fault);
                }
            }
        }
    }

    /// Construye el argv completo de una sonda de metadatos.
    fn metadata_arguments(
        attack: &AttackMaterialization,
        session: &EphemeralSession,
        metadata_flag: &str,
    ) -> Result<Vec<String>, KeyspaceError> {
        let mut arguments: Vec<String> = vec![
            "--session".to_string(),
            session.identifier.clone(),
            "--restore-disable".to_string(),
            "--potfile-path".to_string(),
            session.potfile_path.display().to_string(),
            "--quiet".to_string(),
            metadata_flag.to_string(),
            "-a".to_string(),
            attack.attack_mode.binary_mode_flag().to_string(),
        ];

        let missing = |artifact: &str| {
            KeyspaceError::UnsupportedAttack(format!(
                "{} attack lacks required artifact: {}",
                attack.attack_mode.as_str(),
                artifact
            ))
        };

        match attack.attack_mode {
            AttackMode::Straight => {
                let wordlist = attack.wordlist_paths.first().ok_or_else(|| missing("wordlist"))?;
                arguments.push(wordlist.display().to_string());
                for rule_path in &attack.rule_paths {
                    arguments.push("-r".to_string());
                    arguments.push(rule_path.display().to_string());
                }
            }
            AttackMode::Combination => {
                if attack.wordlist_paths.len() < 2 {
                    return Err(missing("second wordlist"));
                }
                arguments.push(attack.wordlist_paths[0].display().to_string());
                arguments.push(attack.wordlist_paths[1].display().to_string());
            }
            AttackMode::BruteForce => {
                let mask = attack.mask.as_ref().ok_or_else(|| missing("mask"))?;
                arguments.push(mask.clone());
            }
            AttackMode::HybridWordlistMask => {
                let wordlist = attack.wordlist_paths.first().ok_or_else(|| missing("wordlist"))?;
                let mask = attack.mask.as_ref().ok_or_else(|| missing("mask"))?;
                arguments.push(wordlist.display().to_string());
                arguments.push(mask.clone());
            }
            AttackMode::HybridMaskWordlist => {
                let wordlist = attack.wordlist_paths.first().ok_or_else(|| missing("wordlist"))?;
                let mask = attack.mask.as_ref().ok_or_else(|| missing("mask"))?;
                arguments.push(mask.clone());
                arguments.push(wordlist.display().to_string());
            }
            AttackMode::Association => {
                return Err(KeyspaceError::UnsupportedAttack(
                    "association mode does not expose keyspace metadata".to_string(),
                ));
            }
        }

        Ok(arguments)
    }

    /// Ejecuta una sonda acotada por timeout capturando stdout/stderr.
    async fn run_bounded_probe(
        &self,
        arguments: &[String],
        timeout_seconds: u64,
    ) -> Result<ProbeOutput, KeyspaceError> {
        debug!("🔬 [KEYSPACE_PROBE]: {} {:?}", self.binary_path.display(), arguments);

        let spawn_future = Command::new(&self.binary_path)
            .args(arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // El vencimiento del timeout debe segar el proceso huérfano.
            .kill_on_drop(true)
            .output();

        let probe_result = timeout(Duration::from_secs(timeout_seconds), spawn_future)
            .await
            .map_err(|_| {
                KeyspaceError::InvokeFailed(format!(
                    "metadata probe exceeded {}s wall clock",
                    timeout_seconds
                ))
            })?
            .map_err(|spawn_fault| KeyspaceError::InvokeFailed(spawn_fault.to_string()))?;

        let stdout = String::from_utf8_lossy(&probe_result.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&probe_result.stderr).into_owned();

        if !probe_result.status.success() {
            return Err(KeyspaceError::InvokeFailed(format!(
                "exit {:?}: {}",
                probe_result.status.code(),
                stderr.trim()
            )));
        }

        Ok(ProbeOutput { stdout })
    }

    fn verify_binary_presence(&self) -> Result<(), KeyspaceError> {
        if self.binary_path.as_os_str().is_empty() {
            return Err(KeyspaceError::BinaryUnresolvable(
                "empty binary path".to_string(),
            ));
        }
        if !self.binary_path.exists() {
            return Err(KeyspaceError::BinaryMissing(self.binary_path.clone()));
        }
        Ok(())
    }
}

/// Salida capturada de una sonda exitosa.
struct ProbeOutput {
    stdout: String,
}

/// Sesión efímera: identificador único y rastros en disco a purgar.
struct EphemeralSession {
    identifier: String,
    potfile_path: PathBuf,
    log_path: PathBuf,
}

impl EphemeralSession {
    fn forge(session_workspace: &Path) -> Self {
        let identifier = format!("hf-probe-{}", Uuid::new_v4().simple());
        Self {
            potfile_path: session_workspace.join(format!("{}.potfile", identifier)),
            log_path: session_workspace.join(format!("{}.log", identifier)),
            identifier,
        }
    }

    /// Purga de rastros de sesión. Best-effort: el fallo se ignora.
    fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.potfile_path);
        let _ = std::fs::remove_file(&self.log_path);
    }
}

/// Contrato de salida del binario: la última línea no vacía de stdout
/// es un entero decimal positivo.
fn parse_final_count(stdout: &str) -> Result<u64, KeyspaceError> {
    let final_line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| KeyspaceError::ParseFailed("empty probe output".to_string()))?;

    let parsed_count = final_line
        .parse::<u64>()
        .map_err(|_| KeyspaceError::ParseFailed(format!("non-numeric tail line: {final_line}")))?;

    if parsed_count == 0 {
        return Err(KeyspaceError::ParseFailed("zero keyspace reported".to_string()));
    }

    Ok(parsed_count)
}

/// Conteo de líneas no vacías de un fichero plano.
fn count_plain_lines(file_path: &Path) -> Result<u64, KeyspaceError> {
    let content = std::fs::read_to_string(file_path)?;
    Ok(content.lines().filter(|line| !line.trim().is_empty()).count() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn certify_final_count_contract() {
        assert_eq!(parse_final_count("garbage\n14344385\n").unwrap(), 14_344_385);
        assert_eq!(parse_final_count("14344385\n\n   \n").unwrap(), 14_344_385);
        assert!(matches!(
            parse_final_count("no numbers here\n"),
            Err(KeyspaceError::ParseFailed(_))
        ));
        assert!(matches!(parse_final_count(""), Err(KeyspaceError::ParseFailed(_))));
        assert!(matches!(parse_final_count("0\n"), Err(KeyspaceError::ParseFailed(_))));
    }

    #[test]
    fn certify_metadata_argv_shapes() {
        let session = EphemeralSession::forge(Path::new("/tmp"));

        let straight = AttackMaterialization {
            attack_mode: AttackMode::Straight,
            wordlist_paths: vec![PathBuf::from("/data/rockyou.txt")],
            rule_paths: vec![PathBuf::from("/data/best64.rule")],
            mask: None,
        };
        let arguments =
            KeyspaceCalculator::metadata_arguments(&straight, &session, "--keyspace").unwrap();
        assert!(arguments.contains(&"--keyspace".to_string()));
        assert!(arguments.contains(&"-r".to_string()));
        assert!(arguments.contains(&"/data/rockyou.txt".to_string()));
        assert_eq!(arguments[arguments.len() - 1], "/data/best64.rule");

        let hybrid = AttackMaterialization {
            attack_mode: AttackMode::HybridMaskWordlist,
            wordlist_paths: vec![PathBuf::from("/data/rockyou.txt")],
            rule_paths: vec![],
            mask: Some("?d?d?d?d".to_string()),
        };
        let arguments =
            KeyspaceCalculator::metadata_arguments(&hybrid, &session, "--total-candidates")
                .unwrap();
        // Posicionales: máscara antes del diccionario en el modo 7.
        let mask_index = arguments.iter().position(|a| a == "?d?d?d?d").unwrap();
        let wordlist_index = arguments.iter().position(|a| a == "/data/rockyou.txt").unwrap();
        assert!(mask_index < wordlist_index);

        let association = AttackMaterialization {
            attack_mode: AttackMode::Association,
            wordlist_paths: vec![],
            rule_paths: vec![],
            mask: None,
        };
        assert!(matches!(
            KeyspaceCalculator::metadata_arguments(&association, &session, "--keyspace"),
            Err(KeyspaceError::UnsupportedAttack(_))
        ));
    }

    #[tokio::test]
    async fn certify_probe_against_scripted_binary() {
        // Binario simulado: responde 1000 a --keyspace y 50000 a
        // --total-candidates, replicando el contrato de salida.
        let workspace = tempfile::tempdir().unwrap();
        let binary_path = workspace.path().join("fake-cracker.sh");
        {
            let mut script = std::fs::File::create(&binary_path).unwrap();
            writeln!(script, "#!/bin/sh").unwrap();
            writeln!(script, "for arg in \"$@\"; do").unwrap();
            writeln!(script, "  if [ \"$arg\" = \"--keyspace\" ]; then echo 1000; exit 0; fi").unwrap();
            writeln!(
                script,
                "  if [ \"$arg\" = \"--total-candidates\" ]; then echo 50000; exit 0; fi"
            )
            .unwrap();
            writeln!(script, "done").unwrap();
            writeln!(script, "exit 1").unwrap();
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary_path, std::fs::Permissions::from_mode(0o755))
                .unwrap();
        }

        let wordlist_path = workspace.path().join("wordlist.txt");
        std::fs::write(&wordlist_path, "alpha\nbeta\n").unwrap();

        let calculator =
            KeyspaceCalculator::new(binary_path, workspace.path().to_path_buf());
        let attack = AttackMaterialization {
            attack_mode: AttackMode::Straight,
            wordlist_paths: vec![wordlist_path],
            rule_paths: vec![],
            mask: None,
        };

        let report = calculator.calculate(&attack, None).await.unwrap();
        assert_eq!(report.base_keyspace, 1_000);
        assert_eq!(report.effective_keyspace, 50_000);
        assert_eq!(report.multiplication_factor, 50);
        assert!(report.is_accurate);

        // Con sales, el efectivo se multiplica y el original queda auditado.
        let salted_report = calculator.calculate(&attack, Some(10)).await.unwrap();
        assert_eq!(salted_report.effective_keyspace, 500_000);
        assert_eq!(salted_report.pre_salt_effective_keyspace, Some(50_000));
        assert_eq!(salted_report.multiplication_factor, 500);

        println!("✅ KEYSPACE: Scripted binary probe certified.");
    }

    #[tokio::test]
    async fn certify_association_estimation_path() {
        let workspace = tempfile::tempdir().unwrap();
        let wordlist_path = workspace.path().join("assoc.txt");
        std::fs::write(&wordlist_path, "one\ntwo\nthree\n").unwrap();
        let rule_path = workspace.path().join("tweaks.rule");
        std::fs::write(&rule_path, "# comment\n:\nu\nl\n").unwrap();

        let calculator = KeyspaceCalculator::new(
            PathBuf::from("/nonexistent/binary"),
            workspace.path().to_path_buf(),
        );
        let attack = AttackMaterialization {
            attack_mode: AttackMode::Association,
            wordlist_paths: vec![wordlist_path],
            rule_paths: vec![rule_path],
            mask: None,
        };

        // La asociación jamás toca el binario: 3 líneas × 3 reglas efectivas.
        let report = calculator.calculate(&attack, None).await.unwrap();
        assert_eq!(report.base_keyspace, 3);
        assert_eq!(report.effective_keyspace, 9);
        assert!(!report.is_accurate);
    }

    #[tokio::test]
    async fn certify_missing_binary_fault() {
        let workspace = tempfile::tempdir().unwrap();
        let calculator = KeyspaceCalculator::new(
            PathBuf::from("/nonexistent/binary"),
            workspace.path().to_path_buf(),
        );
        let wordlist_path = workspace.path().join("w.txt");
        std::fs::write(&wordlist_path, "a\n").unwrap();

        let attack = AttackMaterialization {
            attack_mode: AttackMode::Straight,
            wordlist_paths: vec![wordlist_path],
            rule_paths: vec![],
            mask: None,
        };

        assert!(matches!(
            calculator.calculate(&attack, None).await,
            Err(KeyspaceError::BinaryMissing(_))
        ));
    }
}
