// [tests/mirror/apps/orchestrator/services/potfile_pipeline.test.rs]
/**
 * =================================================================
 * APARATO: POTFILE PIPELINE TEST (TRINITY EVIDENCE)
 * RESPONSABILIDAD: LEY EXACTLY-ONE-LINE, METADATOS Y REGENERACIÓN
 * =================================================================
 */

use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::LedgerClient;
use hashforge_orchestrator::bootstrap::Bootstrap;
use hashforge_orchestrator::services::potfile_pipeline::{
    PotfilePipeline, GLOBAL_POTFILE_WORDLIST_ID,
};
use hashforge_orchestrator::state::AppState;
use tempfile::TempDir;

async fn forge_state(workspace: &TempDir) -> AppState {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let mut settings = SchedulerSettings::default();
    settings.rule_chunk_directory = workspace.path().join("rule-chunks");
    settings.potfile_directory = workspace.path().join("potfiles");
    settings.session_workspace = workspace.path().join("sessions");
    AppState::new(client, settings)
}

/// Ley central: ingestar dos veces la misma contraseña añade
/// exactamente una línea al potfile.
#[tokio::test]
async fn certify_double_ingest_single_line() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    Bootstrap::perform_cold_start(&state).await.unwrap();

    // Dos hashes distintos con el mismo texto plano.
    state
        .potfile_staging_repository
        .stage_batch(&[
            ("hunter2".to_string(), "hash-a".to_string(), None),
            ("hunter2".to_string(), "hash-b".to_string(), None),
            ("letmein".to_string(), "hash-c".to_string(), Some("client-x".to_string())),
        ])
        .await
        .unwrap();

    let pipeline = PotfilePipeline::new(state.clone());
    let settled = pipeline.run_ingestion_tick().await.unwrap();
    assert_eq!(settled, 3, "every staging row must settle");
    assert_eq!(state.potfile_staging_repository.unprocessed_count().await.unwrap(), 0);

    // Potfile global: línea en blanco inicial + una única 'hunter2' +
    // la contribución del cliente al corpus global.
    let global_content = std::fs::read_to_string(
        workspace.path().join("potfiles").join("global.potfile"),
    )
    .unwrap();
    assert!(global_content.starts_with('\n'), "empty password line leads the file");
    assert_eq!(global_content.matches("hunter2").count(), 1);
    assert_eq!(global_content.matches("letmein").count(), 1);

    // Potfile del cliente con su propio material.
    let client_content = std::fs::read_to_string(
        workspace
            .path()
            .join("potfiles")
            .join("clients")
            .join("client-x.potfile"),
    )
    .unwrap();
    assert_eq!(client_content.matches("letmein").count(), 1);

    // Segunda oleada de la misma contraseña: staging drena sin escribir.
    state
        .potfile_staging_repository
        .stage_batch(&[("hunter2".to_string(), "hash-z".to_string(), None)])
        .await
        .unwrap();
    pipeline.run_ingestion_tick().await.unwrap();

    let replayed_content = std::fs::read_to_string(
        workspace.path().join("potfiles").join("global.potfile"),
    )
    .unwrap();
    assert_eq!(replayed_content.matches("hunter2").count(), 1, "exactly one line law");

    println!("✅ POTFILE: Exactly-one-line ingestion law certified.");
}

/// Metadatos derivados, anillo de digests y recálculo del preset.
#[tokio::test]
async fn certify_metadata_and_preset_recalculation() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    Bootstrap::perform_cold_start(&state).await.unwrap();

    state
        .potfile_staging_repository
        .stage_batch(&[
            ("alpha".to_string(), "h1".to_string(), None),
            ("beta".to_string(), "h2".to_string(), None),
        ])
        .await
        .unwrap();

    let pipeline = PotfilePipeline::new(state.clone());
    pipeline.run_ingestion_tick().await.unwrap();

    // Fila de diccionario con md5, tamaño y conteo de líneas frescos.
    let metadata = state
        .wordlist_repository
        .fetch_wordlist(GLOBAL_POTFILE_WORDLIST_ID)
        .await
        .unwrap()
        .expect("global potfile wordlist row must exist");
    assert_eq!(metadata.line_count, 3, "blank line + alpha + beta");
    assert!(metadata.file_size > 0);
    let recorded_digest = metadata.md5_hash.clone().unwrap();

    // El anillo de digests reconoce la observación reciente.
    assert!(state
        .digest_history
        .is_recently_observed(GLOBAL_POTFILE_WORDLIST_ID, &recorded_digest));

    // El trabajo preset del sistema hereda el conteo de líneas.
    let preset = state
        .job_repository
        .fetch_system_preset_job()
        .await
        .unwrap()
        .expect("preset job must be provisioned");
    assert_eq!(preset.base_keyspace, 3);
    assert_eq!(preset.effective_keyspace, 3);
    assert!(preset.is_accurate_keyspace);

    println!("✅ POTFILE: Derived metadata and preset recalculation certified.");
}

/// Regeneración autoritativa del potfile de un cliente.
#[tokio::test]
async fn certify_client_regeneration() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    Bootstrap::perform_cold_start(&state).await.unwrap();

    state
        .potfile_staging_repository
        .stage_batch(&[
            ("doomed".to_string(), "h1".to_string(), Some("client-z".to_string())),
            ("kept".to_string(), "h2".to_string(), Some("client-z".to_string())),
        ])
        .await
        .unwrap();

    let pipeline = PotfilePipeline::new(state.clone());
    pipeline.run_ingestion_tick().await.unwrap();

    // Borrado de hashlist con retiro: sólo 'kept' sobrevive.
    let authoritative = vec![("h2".to_string(), "kept".to_string())];
    let line_count = pipeline
        .regenerate_client_potfile("client-z", &authoritative)
        .await
        .unwrap();
    assert_eq!(line_count, 2, "blank line + kept");

    let regenerated = std::fs::read_to_string(
        workspace
            .path()
            .join("potfiles")
            .join("clients")
            .join("client-z.potfile"),
    )
    .unwrap();
    assert!(!regenerated.contains("doomed"));
    assert_eq!(regenerated.matches("kept").count(), 1);

    // El filtro regenerado olvida el material retirado: una nueva
    // ingesta de 'doomed' vuelve a entrar.
    state
        .potfile_staging_repository
        .stage_batch(&[("doomed".to_string(), "h9".to_string(), Some("client-z".to_string()))])
        .await
        .unwrap();
    pipeline.run_ingestion_tick().await.unwrap();

    let reingested = std::fs::read_to_string(
        workspace
            .path()
            .join("potfiles")
            .join("clients")
            .join("client-z.potfile"),
    )
    .unwrap();
    assert_eq!(reingested.matches("doomed").count(), 1);

    println!("✅ POTFILE: Authoritative client regeneration certified.");
}
