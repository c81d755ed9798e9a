// [apps/orchestrator/src/bootstrap.rs]
/*!
 * =================================================================
 * APARATO: BOOTSTRAP ENGINE (V15.0 - COLD START CUSTODY)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L1-APP)
 * RESPONSABILIDAD: SANEAMIENTO DE ARRANQUE Y PROVISIÓN DEL PRESET
 *
 * # Logic:
 * Antes de abrir el socket y arrancar daemons: (1) los chunks
 * huérfanos de la vida anterior regresan a la cola; (2) el trabajo
 * preset del sistema (potfile) queda provisionado junto a su fila de
 * diccionario, de modo que la primera ingesta ya tenga destino.
 * =================================================================
 */

use crate::services::recovery::RecoveryService;
use crate::services::potfile_pipeline::GLOBAL_POTFILE_WORDLIST_ID;
use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobStatus,
};
use hashforge_domain_models::potfile::WordlistMetadata;
use tracing::{info, instrument};
use uuid::Uuid;

/// Hashlist sintético al que apunta el preset hasta que el operador lo
/// re-dirija a un objetivo real.
const PRESET_HASHLIST_ID: &str = "system-preset-target";

pub struct Bootstrap;

impl Bootstrap {
    /**
     * Secuencia completa de arranque en frío.
     */
    #[instrument(skip(application_state))]
    pub async fn perform_cold_start(application_state: &AppState) -> Result<()> {
        // 1. RECUPERACIÓN DE CHUNKS HUÉRFANOS
        let recovery_engine = RecoveryService::new(application_state.clone());
        recovery_engine.perform_startup_recovery().await?;

        // 2. PROVISIÓN DEL PRESET DE POTFILE
        Self::provision_system_preset(application_state).await?;

        info!("🧬 [BOOTSTRAP]: Cold start custody sequence complete.");
        Ok(())
    }

    /// Provisión idempotente del trabajo preset del sistema: un ataque
    /// directo cuyo diccionario es el potfile global.
    async fn provision_system_preset(application_state: &AppState) -> Result<()> {
        if application_state.job_repository.fetch_system_preset_job().await?.is_some() {
            return Ok(());
        }

        let potfile_path = application_state
            .settings
            .potfile_directory
            .join("global.potfile");

        application_state
            .wordlist_repository
            .upsert_wordlist(&WordlistMetadata {
                id: GLOBAL_POTFILE_WORDLIST_ID.to_string(),
                file_path: potfile_path.display().to_string(),
                md5_hash: None,
                file_size: 0,
                line_count: 0,
            })
            .await?;

        application_state
            .hashlist_repository
            .upsert_hashlist(&Hashlist {
                id: PRESET_HASHLIST_ID.to_string(),
                hash_type_id: 0,
                total_hashes: 0,
                cracked_hashes: 0,
                is_salted: false,
            })
            .await?;

        let preset_job = JobExecution {
            id: Uuid::new_v4(),
            hashlist_id: PRESET_HASHLIST_ID.to_string(),
            hash_type_id: 0,
            attack: AttackConfiguration {
                attack_mode: AttackMode::Straight,
                wordlist_ids: vec![GLOBAL_POTFILE_WORDLIST_ID.to_string()],
                rule_ids: Vec::new(),
                mask: None,
                increment_mode: IncrementMode::Off,
                increment_minimum: 0,
                increment_maximum: 0,
            },
            binary_version_pattern: "default".to_string(),
            priority: 0,
            max_agents: 0,
            chunk_size_seconds: 0,
            status: JobStatus::Paused,
            base_keyspace: 0,
            effective_keyspace: 0,
            multiplication_factor: 1,
            is_accurate_keyspace: true,
            uses_rule_splitting: false,
            rule_split_count: 0,
            avg_rule_multiplier: 0.0,
            processed_keyspace: 0,
            dispatched_keyspace: 0,
            overall_progress_percent: 0.0,
            consecutive_failures: 0,
            error_message: None,
            allow_high_priority_override: false,
            is_system_preset: true,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            created_by: Some("system".to_string()),
        };

        application_state.job_repository.create_job(&preset_job).await?;
        info!("🍯 [BOOTSTRAP]: System potfile preset job provisioned ({}).", preset_job.id);
        Ok(())
    }
}
