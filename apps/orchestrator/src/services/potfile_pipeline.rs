// [apps/orchestrator/src/services/potfile_pipeline.rs]
/*!
 * =================================================================
 * APARATO: POTFILE INGESTION PIPELINE (V27.0 - EXACTLY ONE LINE)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4)
 * RESPONSABILIDAD: DRENAJE DE STAGING, DEDUPLICACIÓN Y METADATOS
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. PARTITIONED DESTINATIONS: Cada fila de staging se enruta al
 *    potfile global y/o al del cliente según su etiqueta de origen.
 * 2. BLOOM GATE: La deduplicación es probabilística; un falso
 *    positivo retiene la contraseña un ciclo extra en staging, coste
 *    aceptado. Jamás se pierde material.
 * 3. PARTIAL CONFIRMATION: Sólo los ids escritos o confirmados como
 *    duplicados se drenan; un fallo de escritura conserva el resto.
 * 4. DERIVED METADATA: md5, tamaño y conteo de líneas se actualizan
 *    atómicamente en la fila de diccionario asociada, y el anillo de
 *    digests absorbe la ventana de carrera de los agentes en sync.
 *
 * # Mathematical Proof (Convergence):
 * Sea S el conjunto de filas de staging. Cada tick mueve un lote de S
 * a {escrito, duplicado} o lo conserva. El filtro colapsa reintentos
 * en no-ops, por lo que ingestar dos veces la misma contraseña añade
 * exactamente una línea al potfile.
 * =================================================================
 */

use crate::services::event_bus::SchedulerEvent;
use crate::state::AppState;
use anyhow::{Context, Result};
use hashforge_core_probabilistic::{ClientFilterVault, PlaintextDedupFilter};
use hashforge_domain_models::potfile::{PotfileStagingEntry, WordlistMetadata};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Identificador de diccionario del potfile global.
pub const GLOBAL_POTFILE_WORDLIST_ID: &str = "potfile-global";

/// Capacidad nominal del filtro global (≈15M líneas al 1% FPR).
const GLOBAL_FILTER_EXPECTED_LINES: usize = 15_000_000;
/// Capacidad nominal de cada filtro de cliente (1M líneas al 1% FPR).
const CLIENT_FILTER_EXPECTED_LINES: usize = 1_000_000;
/// Tasa de falsos positivos objetivo de los filtros.
const TARGET_FALSE_POSITIVE_RATE: f64 = 0.01;
/// Capacidad de la bóveda LRU de filtros de cliente.
const CLIENT_VAULT_CAPACITY: usize = 50;

pub struct PotfilePipeline {
    application_state: AppState,
    global_filter: RwLock<PlaintextDedupFilter>,
    client_vault: ClientFilterVault,
}

impl PotfilePipeline {
    /**
     * Forja el pipeline hidratando el filtro global desde el potfile
     * existente (re-síntesis en frío tras un reinicio).
     */
    #[must_use]
    pub fn new(application_state: AppState) -> Self {
        let global_potfile_path = global_potfile_path(&application_state);
        let mut global_filter =
            PlaintextDedupFilter::new(GLOBAL_FILTER_EXPECTED_LINES, TARGET_FALSE_POSITIVE_RATE);

        if let Ok(existing_content) = fs::read_to_string(&global_potfile_path) {
            for existing_line in existing_content.lines() {
                global_filter.register_plaintext(existing_line.as_bytes());
            }
            info!(
                "🧠 [POTFILE_HYDRATION]: Global filter re-synthesized from {} lines.",
                global_filter.registered_lines()
            );
        }

        Self {
            application_state,
            global_filter: RwLock::new(global_filter),
            client_vault: ClientFilterVault::new(
                CLIENT_VAULT_CAPACITY,
                CLIENT_FILTER_EXPECTED_LINES,
                TARGET_FALSE_POSITIVE_RATE,
            ),
        }
    }

    /// Ignición del worker de ingestión con la cadencia configurada.
    pub async fn spawn_pipeline_daemon(application_state: AppState) {
        let batch_interval_seconds = application_state.settings.potfile_batch_interval_seconds;
        let mut ingestion_ticker = interval(Duration::from_secs(batch_interval_seconds.max(1)));
        ingestion_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::spawn(async move {
            info!("🍯 [POTFILE_ACTIVE]: Ingestion pipeline daemon initiated.");
            let pipeline_engine = PotfilePipeline::new(application_state);

            loop {
                ingestion_ticker.tick().await;
                match pipeline_engine.run_ingestion_tick().await {
                    Ok(0) => {}
                    Ok(ingested) => debug!("🍯 [POTFILE]: {} staging rows settled.", ingested),
                    Err(tick_fault) => {
                        warn!("⚠️ [POTFILE_FAULT]: Ingestion tick degraded: {:#}", tick_fault);
                    }
                }
            }
        });
    }

    /**
     * Un tick completo del worker: lote → partición → dedupe →
     * append → confirmación parcial → metadatos → recálculo preset.
     */
    #[instrument(skip(self))]
    pub async fn run_ingestion_tick(&self) -> Result<usize> {
        let state = &self.application_state;

        // 1. LOTE DE STAGING
        let staged_batch = state
            .potfile_staging_repository
            .fetch_unprocessed(state.settings.potfile_max_batch_size)
            .await?;
        if staged_batch.is_empty() {
            return Ok(0);
        }

        // 2-5. PARTICIÓN, DEDUPLICACIÓN Y ESCRITURA POR DESTINO
        let mut confirmed_ids: Vec<i64> = Vec::new();
        let mut global_appended: u64 = 0;
        let mut client_appended: HashMap<String, u64> = HashMap::new();

        for staged_entry in &staged_batch {
            let mut fully_settled = true;
            let mut was_duplicate_everywhere = true;

            // Destino global: filas sin cliente, o clientes que
            // contribuyen al corpus global (política por defecto).
            match self.settle_into_global(staged_entry) {
                Ok(SettleOutcome::Appended) => {
                    global_appended += 1;
                    was_duplicate_everywhere = false;
                }
                Ok(SettleOutcome::Duplicate) => {}
                Err(write_fault) => {
                    warn!("⚠️ [POTFILE_WRITE]: Global append failed: {}", write_fault);
                    fully_settled = false;
                }
            }

            // Destino por cliente.
            if let Some(client_identifier) = &staged_entry.client_id {
                match self.settle_into_client(client_identifier, staged_entry) {
                    Ok(SettleOutcome::Appended) => {
                        *client_appended.entry(client_identifier.clone()).or_insert(0) += 1;
                        was_duplicate_everywhere = false;
                    }
                    Ok(SettleOutcome::Duplicate) => {}
                    Err(write_fault) => {
                        warn!(
                            "⚠️ [POTFILE_WRITE]: Client {} append failed: {}",
                            client_identifier, write_fault
                        );
                        fully_settled = false;
                    }
                }
            }

            // 5. CONFIRMACIÓN PARCIAL: escrito o duplicado confirmado.
            if fully_settled {
                confirmed_ids.push(staged_entry.id);
                if was_duplicate_everywhere {
                    debug!("🔁 [POTFILE_DUP]: Staging row {} was a known line.", staged_entry.id);
                }
            }
        }

        let settled_count = confirmed_ids.len();
        state.potfile_staging_repository.delete_confirmed(&confirmed_ids).await?;

        // 6. METADATOS DERIVADOS + ANILLO DE DIGESTS
        if global_appended > 0 {
            let line_count = self
                .refresh_wordlist_metadata(GLOBAL_POTFILE_WORDLIST_ID, &global_potfile_path(state))
                .await?;

            // 7. NOTIFICACIÓN DE CRECIMIENTO A CONSUMIDORES ADJUNTOS
            state.event_bus.emit(SchedulerEvent::PotfileGrew { line_count });

            // 8. RECÁLCULO DEL TRABAJO PRESET DEL SISTEMA
            self.refresh_system_preset_keyspace(line_count).await?;
        }

        for client_identifier in client_appended.keys() {
            let client_path = client_potfile_path(state, client_identifier);
            let wordlist_id = client_wordlist_id(client_identifier);
            self.refresh_wordlist_metadata(&wordlist_id, &client_path).await?;
        }

        Ok(settled_count)
    }

    /// Deduplicación + append al potfile global.
    fn settle_into_global(&self, staged_entry: &PotfileStagingEntry) -> Result<SettleOutcome> {
        let plaintext_bytes = staged_entry.password.as_bytes();

        {
            let filter_guard = self
                .global_filter
                .read()
                .expect("FATAL: Global filter poisoned.");
            if filter_guard.contains_plaintext(plaintext_bytes) {
                return Ok(SettleOutcome::Duplicate);
            }
        }

        append_potfile_line(
            &global_potfile_path(&self.application_state),
            &staged_entry.password,
        )?;

        let mut filter_guard = self
            .global_filter
            .write()
            .expect("FATAL: Global filter poisoned.");
        filter_guard.register_plaintext(plaintext_bytes);
        Ok(SettleOutcome::Appended)
    }

    /// Deduplicación + append al potfile del cliente.
    fn settle_into_client(
        &self,
        client_identifier: &str,
        staged_entry: &PotfileStagingEntry,
    ) -> Result<SettleOutcome> {
        let plaintext_bytes = staged_entry.password.as_bytes();
        let client_filter = self.client_vault.acquire(client_identifier);

        {
            let filter_guard = client_filter
                .read()
                .expect("FATAL: Client filter poisoned.");
            if filter_guard.contains_plaintext(plaintext_bytes) {
                return Ok(SettleOutcome::Duplicate);
            }
        }

        append_potfile_line(
            &client_potfile_path(&self.application_state, client_identifier),
            &staged_entry.password,
        )?;

        let mut filter_guard = client_filter
            .write()
            .expect("FATAL: Client filter poisoned.");
        filter_guard.register_plaintext(plaintext_bytes);
        Ok(SettleOutcome::Appended)
    }

    /**
     * Regeneración autoritativa del potfile de un cliente tras un
     * borrado de hashlist con retiro de contraseñas: reconstruye el
     * fichero, re-sintetiza su filtro y actualiza los metadatos.
     */
    #[instrument(skip(self, authoritative_pairs), fields(client = %client_identifier))]
    pub async fn regenerate_client_potfile(
        &self,
        client_identifier: &str,
        authoritative_pairs: &[(String, String)],
    ) -> Result<u64> {
        let state = &self.application_state;
        let client_path = client_potfile_path(state, client_identifier);

        if let Some(parent_directory) = client_path.parent() {
            fs::create_dir_all(parent_directory)?;
        }

        // Reconstrucción: línea en blanco inicial + corpus autoritativo.
        let mut regenerated_body = String::from("\n");
        for (_hash_value, plaintext) in authoritative_pairs {
            regenerated_body.push_str(plaintext);
            regenerated_body.push('\n');
        }
        fs::write(&client_path, regenerated_body)?;

        let rebuilt_filter = PlaintextDedupFilter::rebuild_from_lines(
            CLIENT_FILTER_EXPECTED_LINES,
            TARGET_FALSE_POSITIVE_RATE,
            authoritative_pairs.iter().map(|(_, plaintext)| plaintext.as_str()),
        );
        self.client_vault.replace(client_identifier, rebuilt_filter);

        let wordlist_id = client_wordlist_id(client_identifier);
        let line_count = self.refresh_wordlist_metadata(&wordlist_id, &client_path).await?;

        info!(
            "🔄 [POTFILE_REGEN]: Client {} potfile rebuilt with {} lines.",
            client_identifier, line_count
        );
        Ok(line_count)
    }

    /// Recalcula md5, tamaño y conteo de líneas; actualiza el Ledger y
    /// registra la observación en el anillo de digests.
    async fn refresh_wordlist_metadata(
        &self,
        wordlist_id: &str,
        potfile_path: &PathBuf,
    ) -> Result<u64> {
        let state = &self.application_state;

        let file_bytes = fs::read(potfile_path)
            .with_context(|| format!("potfile vanished: {}", potfile_path.display()))?;
        let md5_digest = format!("{:x}", md5::compute(&file_bytes));
        let file_size = file_bytes.len() as u64;
        let line_count = file_bytes.iter().filter(|byte| **byte == b'\n').count() as u64;

        state
            .wordlist_repository
            .upsert_wordlist(&WordlistMetadata {
                id: wordlist_id.to_string(),
                file_path: potfile_path.display().to_string(),
                md5_hash: Some(md5_digest.clone()),
                file_size,
                line_count,
            })
            .await?;

        state.digest_history.record(wordlist_id, md5_digest, file_size);
        Ok(line_count)
    }

    /// El keyspace del trabajo preset es el conteo de líneas del
    /// potfile global.
    async fn refresh_system_preset_keyspace(&self, line_count: u64) -> Result<()> {
        let state = &self.application_state;

        if let Some(preset_job) = state.job_repository.fetch_system_preset_job().await? {
            if !preset_job.status.is_terminal() {
                state
                    .job_repository
                    .record_keyspace(&preset_job.id, line_count, line_count, 1, true)
                    .await?;
                debug!("🧮 [PRESET_SYNC]: Potfile preset keyspace refreshed to {}.", line_count);
            }
        }
        Ok(())
    }
}

/// Desenlace de una fila frente a un destino concreto.
enum SettleOutcome {
    Appended,
    Duplicate,
}

/**
 * Append de una línea de potfile. Si el fichero no existe, nace con
 * la línea en blanco inicial que representa la contraseña vacía.
 */
fn append_potfile_line(potfile_path: &PathBuf, plaintext: &str) -> Result<()> {
    if let Some(parent_directory) = potfile_path.parent() {
        fs::create_dir_all(parent_directory)?;
    }

    let is_newborn = !potfile_path.exists();
    let mut potfile_handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(potfile_path)?;

    if is_newborn {
        potfile_handle.write_all(b"\n")?;
    }
    potfile_handle.write_all(plaintext.as_bytes())?;
    potfile_handle.write_all(b"\n")?;
    potfile_handle.flush()?;
    Ok(())
}

fn global_potfile_path(state: &AppState) -> PathBuf {
    state.settings.potfile_directory.join("global.potfile")
}

fn client_potfile_path(state: &AppState, client_identifier: &str) -> PathBuf {
    state
        .settings
        .potfile_directory
        .join("clients")
        .join(format!("{}.potfile", client_identifier))
}

fn client_wordlist_id(client_identifier: &str) -> String {
    format!("potfile-client-{}", client_identifier)
}
