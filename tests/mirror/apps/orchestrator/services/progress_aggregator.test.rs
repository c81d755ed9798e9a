// [tests/mirror/apps/orchestrator/services/progress_aggregator.test.rs]
/**
 * =================================================================
 * APARATO: PROGRESS AGGREGATOR TEST (TRINITY EVIDENCE)
 * RESPONSABILIDAD: AGREGACIÓN, HEURÍSTICA ABSOLUTA Y FEEDBACK LOOP
 * =================================================================
 */

use chrono::Utc;
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobStatus,
};
use hashforge_domain_models::task::{JobTask, TaskStatus};
use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::LedgerClient;
use hashforge_orchestrator::services::progress_aggregator::ProgressAggregator;
use hashforge_orchestrator::state::AppState;
use tempfile::TempDir;
use uuid::Uuid;

async fn forge_state(workspace: &TempDir) -> AppState {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let mut settings = SchedulerSettings::default();
    settings.rule_chunk_directory = workspace.path().join("rule-chunks");
    settings.potfile_directory = workspace.path().join("potfiles");
    settings.session_workspace = workspace.path().join("sessions");
    AppState::new(client, settings)
}

fn forge_job() -> JobExecution {
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: "hl-agg".to_string(),
        hash_type_id: 1000,
        attack: AttackConfiguration {
            attack_mode: AttackMode::Straight,
            wordlist_ids: vec!["rockyou.txt".to_string()],
            rule_ids: vec![],
            mask: None,
            increment_mode: IncrementMode::Off,
            increment_minimum: 0,
            increment_maximum: 0,
        },
        binary_version_pattern: "default".to_string(),
        priority: 100,
        max_agents: 0,
        chunk_size_seconds: 0,
        status: JobStatus::Running,
        base_keyspace: 10_000,
        effective_keyspace: 10_000,
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
        is_system_preset: false,
        created_at: Utc::now(),
        started_at: Some(Utc::now()),
        completed_at: None,
        created_by: None,
    }
}

fn forge_task(job_id: Uuid, start: u64, end: u64, status: TaskStatus) -> JobTask {
    let now = Utc::now();
    JobTask {
        id: Uuid::new_v4(),
        job_execution_id: job_id,
        increment_layer_id: None,
        agent_id: Some("agent-1".to_string()),
        status,
        priority: 100,
        attack_cmd: String::new(),
        keyspace_start: start,
        keyspace_end: end,
        keyspace_processed: 0,
        effective_keyspace_start: start,
        effective_keyspace_end: end,
        effective_keyspace_processed: 0,
        is_keyspace_split: true,
        is_rule_split_task: false,
        rule_start_index: None,
        rule_end_index: None,
        rule_chunk_path: None,
        chunk_number: 1,
        chunk_duration: 60,
        benchmark_speed: 1_000,
        retry_count: 0,
        last_checkpoint: None,
        chunk_actual_keyspace: 0,
        is_actual_keyspace: false,
        created_at: now,
        assigned_at: None,
        updated_at: now,
    }
}

/// Mezcla de chunk completado y chunk activo con punto de restauración
/// absoluto: la heurística resta el inicio del rango.
#[tokio::test]
async fn certify_aggregation_with_absolute_restore_point() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    state
        .hashlist_repository
        .upsert_hashlist(&Hashlist {
            id: "hl-agg".to_string(),
            hash_type_id: 1000,
            total_hashes: 100,
            cracked_hashes: 0,
            is_salted: false,
        })
        .await
        .unwrap();

    let job = forge_job();
    state.job_repository.create_job(&job).await.unwrap();

    let mut sealed = forge_task(job.id, 0, 5_000, TaskStatus::Completed);
    sealed.is_actual_keyspace = true;
    sealed.chunk_actual_keyspace = 5_000;
    state.task_repository.insert_task(&sealed).await.unwrap();

    // Chunk [5000, 10000) reportando 7000 absoluto: progreso real 2000.
    let mut live = forge_task(job.id, 5_000, 10_000, TaskStatus::Running);
    live.keyspace_processed = 7_000;
    state.task_repository.insert_task(&live).await.unwrap();

    let engine = ProgressAggregator::new(state.clone());
    let written_rows = engine.run_aggregation_tick().await.unwrap();
    assert_eq!(written_rows, 1);

    let aggregated = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert_eq!(aggregated.processed_keyspace, 7_000, "5000 sealed + 2000 relative");
    assert_eq!(aggregated.dispatched_keyspace, 10_000);
    assert!((aggregated.overall_progress_percent - 70.0).abs() < 0.01);
    assert_eq!(aggregated.status, JobStatus::Running);

    // Tick sin cambios: cero filas escritas (idempotencia).
    let rewritten_rows = engine.run_aggregation_tick().await.unwrap();
    assert_eq!(rewritten_rows, 0);

    println!("✅ AGGREGATOR: Absolute restore-point heuristic certified.");
}

/// Bucle de retroalimentación: cuando el último chunk queda terminal,
/// el tick siguiente sella la completitud del trabajo.
#[tokio::test]
async fn certify_feedback_loop_completes_settled_job() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    state
        .hashlist_repository
        .upsert_hashlist(&Hashlist {
            id: "hl-agg".to_string(),
            hash_type_id: 1000,
            total_hashes: 100,
            cracked_hashes: 10,
            is_salted: false,
        })
        .await
        .unwrap();

    let job = forge_job();
    state.job_repository.create_job(&job).await.unwrap();

    let mut sealed = forge_task(job.id, 0, 10_000, TaskStatus::Completed);
    sealed.is_actual_keyspace = true;
    sealed.chunk_actual_keyspace = 10_000;
    state.task_repository.insert_task(&sealed).await.unwrap();

    let engine = ProgressAggregator::new(state.clone());
    engine.run_aggregation_tick().await.unwrap();

    let completed = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed, "feedback loop must seal the job");
    assert_eq!(completed.overall_progress_percent, 100.0);
    assert_eq!(completed.processed_keyspace, 10_000);

    println!("✅ AGGREGATOR: Post-write completion feedback certified.");
}
