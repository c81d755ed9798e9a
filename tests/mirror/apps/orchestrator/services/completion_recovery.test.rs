// [tests/mirror/apps/orchestrator/services/completion_recovery.test.rs]
/**
 * =================================================================
 * APARATO: COMPLETION & RECOVERY TEST (TRINITY EVIDENCE)
 * RESPONSABILIDAD: COMPLETITUD, PREEMPCIÓN Y RECUPERACIÓN DE ARRANQUE
 * =================================================================
 */

use chrono::Utc;
use hashforge_domain_models::agent::{Agent, AgentEngagement, AgentStatus, SyncStatus};
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobStatus,
};
use hashforge_domain_models::task::{JobTask, TaskStatus};
use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::repositories::job::JobProgressUpdate;
use hashforge_infra_db::LedgerClient;
use hashforge_orchestrator::services::completion::CompletionService;
use hashforge_orchestrator::services::recovery::RecoveryService;
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

fn forge_job(priority: i64, status: JobStatus) -> JobExecution {
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: "hl-cr".to_string(),
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
        priority,
        max_agents: 1,
        chunk_size_seconds: 0,
        status,
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
        started_at: None,
        completed_at: None,
        created_by: None,
    }
}

fn forge_task(job_id: Uuid, start: u64, end: u64, status: TaskStatus, agent: Option<&str>) -> JobTask {
    let now = Utc::now();
    JobTask {
        id: Uuid::new_v4(),
        job_execution_id: job_id,
        increment_layer_id: None,
        agent_id: agent.map(str::to_string),
        status,
        priority: 500,
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

async fn seed_hashlist(state: &AppState, cracked: u64, total: u64) {
    state
        .hashlist_repository
        .upsert_hashlist(&Hashlist {
            id: "hl-cr".to_string(),
            hash_type_id: 1000,
            total_hashes: total,
            cracked_hashes: cracked,
            is_salted: false,
        })
        .await
        .unwrap();
}

/// Completitud por frontera de keyspace + idempotencia.
#[tokio::test]
async fn certify_completion_and_idempotence() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, 5, 100).await;

    let job = forge_job(100, JobStatus::Running);
    state.job_repository.create_job(&job).await.unwrap();

    let mut sealed_task = forge_task(job.id, 0, 10_000, TaskStatus::Completed, Some("agent-1"));
    sealed_task.is_actual_keyspace = true;
    sealed_task.chunk_actual_keyspace = 10_250;
    state.task_repository.insert_task(&sealed_task).await.unwrap();

    state
        .job_repository
        .update_progress_batch(vec![JobProgressUpdate {
            job_id: job.id,
            processed_keyspace: 10_250,
            dispatched_keyspace: 10_250,
            overall_progress_percent: 100.0,
        }])
        .await
        .unwrap();

    let engine = CompletionService::new(state.clone());
    assert!(engine.evaluate_job_completion(&job.id).await.unwrap());

    let completed = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    // Reconciliación de deriva: el keyspace real certificado gana.
    assert_eq!(completed.effective_keyspace, 10_250);

    // Idempotencia: la segunda evaluación es un no-op.
    assert!(!engine.evaluate_job_completion(&job.id).await.unwrap());

    println!("✅ COMPLETION: Drift reconciliation and idempotence certified.");
}

/// Completitud anticipada: el hashlist se agota con chunks a medias.
#[tokio::test]
async fn certify_early_completion_on_all_cracked() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, 100, 100).await;

    let job = forge_job(100, JobStatus::Running);
    state.job_repository.create_job(&job).await.unwrap();

    // Chunk aún corriendo: la vía ordinaria no completaría.
    let live_task = forge_task(job.id, 0, 10_000, TaskStatus::Running, Some("agent-1"));
    state.task_repository.insert_task(&live_task).await.unwrap();

    state
        .job_repository
        .update_progress_batch(vec![JobProgressUpdate {
            job_id: job.id,
            processed_keyspace: 4_000,
            dispatched_keyspace: 10_000,
            overall_progress_percent: 100.0,
        }])
        .await
        .unwrap();

    let engine = CompletionService::new(state.clone());
    assert!(engine.evaluate_job_completion(&job.id).await.unwrap());

    let completed = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    // Efectivo y despachado reconciliados al esfuerzo real procesado.
    assert_eq!(completed.effective_keyspace, 4_000);

    println!("✅ COMPLETION: Early completion on all-cracked certified.");
}

/// Preempción: dos agentes ocupados por el trabajo A (prio 500); el
/// trabajo B (prio 1000, override, tope 1) detiene la tarea más nueva.
#[tokio::test]
async fn certify_preemption_stops_newest_victim() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, 0, 100).await;

    let mut running_job = forge_job(500, JobStatus::Running);
    running_job.max_agents = 2;
    state.job_repository.create_job(&running_job).await.unwrap();

    let mut older_task = forge_task(running_job.id, 0, 5_000, TaskStatus::Running, Some("agent-1"));
    older_task.created_at = Utc::now() - chrono::Duration::seconds(300);
    state.task_repository.insert_task(&older_task).await.unwrap();
    let newer_task =
        forge_task(running_job.id, 5_000, 10_000, TaskStatus::Running, Some("agent-2"));
    state.task_repository.insert_task(&newer_task).await.unwrap();

    let mut aspirant = forge_job(1_000, JobStatus::Pending);
    aspirant.allow_high_priority_override = true;
    aspirant.max_agents = 1;
    state.job_repository.create_job(&aspirant).await.unwrap();

    let engine = CompletionService::new(state.clone());
    let stopped = engine.evaluate_preemption().await.unwrap();
    assert_eq!(stopped, 1, "exactly enough victims to free max_agents");

    let victim = state.task_repository.fetch_task(&newer_task.id).await.unwrap();
    assert_eq!(victim.status, TaskStatus::Stopping, "newest task is the victim");
    assert_eq!(victim.agent_id.as_deref(), Some("agent-2"), "agent held until ack");

    let survivor = state.task_repository.fetch_task(&older_task.id).await.unwrap();
    assert_eq!(survivor.status, TaskStatus::Running);

    let interrupted = state.job_repository.fetch_job(&running_job.id).await.unwrap();
    assert_eq!(interrupted.status, JobStatus::Paused, "victim job marked interrupted");

    println!("✅ PREEMPTION: Newest-victim selection certified.");
}

/// Recuperación de arranque: chunks huérfanos regresan a la cola y el
/// trabajo sin chunks vivos vuelve a pending.
#[tokio::test]
async fn certify_startup_recovery() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, 0, 100).await;

    let job = forge_job(100, JobStatus::Running);
    state.job_repository.create_job(&job).await.unwrap();

    // Huérfano sin agente.
    let orphan = forge_task(job.id, 0, 5_000, TaskStatus::Assigned, None);
    state.task_repository.insert_task(&orphan).await.unwrap();

    // Huérfano con agente inactivo y sin pulso.
    state
        .agent_repository
        .upsert_agent(&Agent {
            id: "agent-gone".to_string(),
            hostname: "rig".to_string(),
            status: AgentStatus::Inactive,
            enabled: true,
            sync_status: SyncStatus::Completed,
            scheduling_enabled: false,
            schedule_daily_start_minutes: None,
            schedule_daily_end_minutes: None,
            binary_version_pattern: "default".to_string(),
            engagement: AgentEngagement::default(),
            last_seen_at: Utc::now(),
        })
        .await
        .unwrap();
    let stale = forge_task(job.id, 5_000, 10_000, TaskStatus::Running, Some("agent-gone"));
    state.task_repository.insert_task(&stale).await.unwrap();

    let engine = RecoveryService::new(state.clone());
    let recovered = engine.perform_startup_recovery().await.unwrap();
    assert_eq!(recovered, 2);

    for task_id in [orphan.id, stale.id] {
        let rescued = state.task_repository.fetch_task(&task_id).await.unwrap();
        assert_eq!(rescued.status, TaskStatus::Pending);
    }

    let requeued_job = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert_eq!(requeued_job.status, JobStatus::Pending);

    println!("✅ RECOVERY: Startup custody sweep certified.");
}
