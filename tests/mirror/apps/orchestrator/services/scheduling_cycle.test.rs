// [tests/mirror/apps/orchestrator/services/scheduling_cycle.test.rs]
/**
 * =================================================================
 * APARATO: SCHEDULING CYCLE TEST (TRINITY EVIDENCE)
 * RESPONSABILIDAD: CERTIFICACIÓN E2E DEL CICLO DE ASIGNACIÓN
 * =================================================================
 */

use chrono::Utc;
use hashforge_domain_models::agent::{Agent, AgentEngagement, AgentStatus, SyncStatus};
use hashforge_domain_models::benchmark::AgentBenchmark;
use hashforge_domain_models::hashlist::Hashlist;
use hashforge_domain_models::job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobStatus,
};
use hashforge_domain_models::SchedulerSettings;
use hashforge_infra_db::LedgerClient;
use hashforge_orchestrator::services::scheduler::SchedulerService;
use hashforge_orchestrator::state::AppState;
use std::io::Write as _;
use tempfile::TempDir;
use uuid::Uuid;

async fn forge_state(workspace: &TempDir) -> AppState {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let mut settings = SchedulerSettings::default();
    settings.rule_chunk_directory = workspace.path().join("rule-chunks");
    settings.potfile_directory = workspace.path().join("potfiles");
    settings.session_workspace = workspace.path().join("sessions");
    settings.cracking_binary_path = workspace.path().join("missing-binary");
    AppState::new(client, settings)
}

async fn seed_hashlist(state: &AppState, hashlist_id: &str) {
    state
        .hashlist_repository
        .upsert_hashlist(&Hashlist {
            id: hashlist_id.to_string(),
            hash_type_id: 1000,
            total_hashes: 100,
            cracked_hashes: 0,
            is_salted: false,
        })
        .await
        .unwrap();
}

async fn seed_agent(state: &AppState, agent_id: &str) {
    state
        .agent_repository
        .upsert_agent(&Agent {
            id: agent_id.to_string(),
            hostname: "rig".to_string(),
            status: AgentStatus::Active,
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
}

async fn seed_benchmark(state: &AppState, agent_id: &str, speed: u64) {
    state
        .benchmark_repository
        .upsert_benchmark(&AgentBenchmark {
            agent_id: agent_id.to_string(),
            attack_mode: AttackMode::Straight,
            hash_type_id: 1000,
            salt_count: None,
            speed,
            reported_effective_keyspace: None,
            measured_at: Utc::now(),
        })
        .await
        .unwrap();
}

fn forge_straight_job(
    base: u64,
    effective: u64,
    rule_ids: Vec<String>,
    chunk_seconds: u64,
) -> JobExecution {
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: "hl-e2e".to_string(),
        hash_type_id: 1000,
        attack: AttackConfiguration {
            attack_mode: AttackMode::Straight,
            wordlist_ids: vec!["rockyou.txt".to_string()],
            rule_ids,
            mask: None,
            increment_mode: IncrementMode::Off,
            increment_minimum: 0,
            increment_maximum: 0,
        },
        binary_version_pattern: "default".to_string(),
        priority: 100,
        max_agents: 0,
        chunk_size_seconds: chunk_seconds,
        status: JobStatus::Pending,
        base_keyspace: base,
        effective_keyspace: effective,
        multiplication_factor: JobExecution::derive_multiplication_factor(base, effective),
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

/// Escenario nominal: diccionario de 1M sin reglas, un agente a
/// 100k c/s con chunks de 60 s. Un único chunk cubre todo el keyspace.
#[tokio::test]
async fn certify_simple_straight_attack_single_chunk() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, "hl-e2e").await;
    seed_agent(&state, "agent-1").await;
    seed_benchmark(&state, "agent-1", 100_000).await;

    let job = forge_straight_job(1_000_000, 1_000_000, vec![], 60);
    state.job_repository.create_job(&job).await.unwrap();

    let engine = SchedulerService::new(state.clone());
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.reservations, 1);
    assert_eq!(report.planned_tasks, 1);

    let tasks = state.task_repository.fetch_tasks_for_job(&job.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].keyspace_start, 0);
    assert_eq!(tasks[0].keyspace_end, 1_000_000);
    assert_eq!(tasks[0].agent_id.as_deref(), Some("agent-1"));

    let engaged = state.agent_repository.fetch_agent("agent-1").await.unwrap();
    assert!(engaged.engagement.busy_status);

    // Segundo ciclo sin cambios de inventario: ningún estado nuevo.
    let idle_report = engine.run_cycle().await.unwrap();
    assert_eq!(idle_report.planned_tasks, 0);
    assert_eq!(
        state.task_repository.fetch_tasks_for_job(&job.id).await.unwrap().len(),
        1
    );

    println!("✅ CYCLE: Single-chunk straight attack certified.");
}

/// Escenario de activación de fragmentación por reglas: base=10k con
/// 500 reglas a 10k c/s excede 72 s → chunks de 60 reglas.
#[tokio::test]
async fn certify_rule_splitting_trigger() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, "hl-e2e").await;
    seed_agent(&state, "agent-1").await;
    seed_benchmark(&state, "agent-1", 10_000).await;

    // Fichero de reglas real con 500 reglas efectivas.
    let rule_path = workspace.path().join("giant.rule");
    {
        let mut rule_file = std::fs::File::create(&rule_path).unwrap();
        writeln!(rule_file, "# forged rules").unwrap();
        for rule_index in 0..500 {
            writeln!(rule_file, "${}", rule_index % 10).unwrap();
        }
    }

    let job = forge_straight_job(
        10_000,
        5_000_000,
        vec![rule_path.display().to_string()],
        60,
    );
    state.job_repository.create_job(&job).await.unwrap();

    let engine = SchedulerService::new(state.clone());
    engine.run_cycle().await.unwrap();

    let locked = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert!(locked.uses_rule_splitting, "500 rules over 500s must trigger the split");
    assert_eq!(locked.rule_split_count, 500);

    let tasks = state.task_repository.fetch_tasks_for_job(&job.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    let rule_task = &tasks[0];
    assert!(rule_task.is_rule_split_task);
    assert_eq!(rule_task.rule_start_index, Some(0));
    assert_eq!(rule_task.rule_end_index, Some(60), "10k c/s × 60s / 10k base = 60 rules");
    assert_eq!(rule_task.keyspace_start, 0);
    assert_eq!(rule_task.keyspace_end, 10_000, "rule chunks sweep the whole wordlist");

    let chunk_path = rule_task.rule_chunk_path.as_ref().unwrap();
    assert!(std::path::Path::new(chunk_path).exists());
    assert!(rule_task.attack_cmd.contains(chunk_path));

    println!("✅ CYCLE: Rule splitting trigger certified.");
}

/// Contra-escenario: 50 reglas a 10k c/s caben en 50 s ≤ 72 s → el
/// trabajo permanece en fragmentación de keyspace.
#[tokio::test]
async fn certify_keyspace_splitting_below_threshold() {
    let workspace = TempDir::new().unwrap();
    let state = forge_state(&workspace).await;
    seed_hashlist(&state, "hl-e2e").await;
    seed_agent(&state, "agent-1").await;
    seed_benchmark(&state, "agent-1", 10_000).await;

    let rule_path = workspace.path().join("small.rule");
    {
        let mut rule_file = std::fs::File::create(&rule_path).unwrap();
        for rule_index in 0..50 {
            writeln!(rule_file, "${}", rule_index % 10).unwrap();
        }
    }

    let job = forge_straight_job(10_000, 500_000, vec![rule_path.display().to_string()], 60);
    state.job_repository.create_job(&job).await.unwrap();

    let engine = SchedulerService::new(state.clone());
    engine.run_cycle().await.unwrap();

    let untouched = state.job_repository.fetch_job(&job.id).await.unwrap();
    assert!(!untouched.uses_rule_splitting);

    let tasks = state.task_repository.fetch_tasks_for_job(&job.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].is_keyspace_split || tasks[0].keyspace_end == 10_000);
    assert!(!tasks[0].is_rule_split_task);
    // Objetivo efectivo 600k a factor 50 → 12k base; el keyspace entero cabe.
    assert_eq!(tasks[0].keyspace_end, 10_000);

    println!("✅ CYCLE: Keyspace splitting below threshold certified.");
}
