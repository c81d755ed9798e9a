// [tests/mirror/libs/infra/db_libsql/task_ledger.test.rs]

use chrono::Utc;
use hashforge_domain_models::task::{JobTask, TaskStatus};
use hashforge_infra_db::repositories::TaskRepository;
use hashforge_infra_db::LedgerClient;
use uuid::Uuid;

fn forge_task(job_id: Uuid, start: u64, end: u64, chunk_number: u32) -> JobTask {
    let now = Utc::now();
    JobTask {
        id: Uuid::new_v4(),
        job_execution_id: job_id,
        increment_layer_id: None,
        agent_id: None,
        status: TaskStatus::Pending,
        priority: 100,
        attack_cmd: "-a 0 -m 1000 hl-1 rockyou.txt".to_string(),
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
        chunk_number,
        chunk_duration: 60,
        benchmark_speed: 10_000,
        retry_count: 0,
        last_checkpoint: None,
        chunk_actual_keyspace: 0,
        is_actual_keyspace: false,
        created_at: now,
        assigned_at: None,
        updated_at: now,
    }
}

#[tokio::test]
async fn certify_dispatch_cursor_monotonicity() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = TaskRepository::new(client.clone());
    let job_id = Uuid::new_v4();

    assert_eq!(repo.dispatched_base_cursor(&job_id, None).await.unwrap(), 0);
    assert_eq!(repo.next_chunk_number(&job_id).await.unwrap(), 1);

    repo.insert_task(&forge_task(job_id, 0, 600_000, 1)).await.unwrap();
    assert_eq!(repo.dispatched_base_cursor(&job_id, None).await.unwrap(), 600_000);

    repo.insert_task(&forge_task(job_id, 600_000, 1_000_000, 2)).await.unwrap();
    assert_eq!(repo.dispatched_base_cursor(&job_id, None).await.unwrap(), 1_000_000);
    assert_eq!(repo.next_chunk_number(&job_id).await.unwrap(), 3);

    // El cursor es la frontera MAX: los rangos nunca retroceden.
    let ledger_tasks = repo.fetch_tasks_for_job(&job_id).await.unwrap();
    assert_eq!(ledger_tasks.len(), 2);
    assert!(ledger_tasks.windows(2).all(|pair| pair[0].keyspace_end <= pair[1].keyspace_start));

    println!("✅ TASK_LEDGER: Non-overlapping cursor custody certified.");
}

#[tokio::test]
async fn certify_retry_discipline_and_terminal_counts() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = TaskRepository::new(client.clone());
    let job_id = Uuid::new_v4();

    let mut task = forge_task(job_id, 0, 1_000, 1);
    task.agent_id = Some("agent-1".to_string());
    task.status = TaskStatus::Running;
    repo.insert_task(&task).await.unwrap();

    assert_eq!(repo.count_incomplete(&job_id).await.unwrap(), 1);

    // Reintento: regreso a pending sin agente, contador incrementado.
    repo.reset_for_retry(&task.id).await.unwrap();
    let retried = repo.fetch_task(&task.id).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Pending);
    assert!(retried.agent_id.is_none());
    assert_eq!(retried.retry_count, 1);

    // Fallo permanente: cuenta como terminal y como fallo del trabajo.
    repo.set_status(&task.id, TaskStatus::Failed).await.unwrap();
    assert_eq!(repo.count_incomplete(&job_id).await.unwrap(), 0);
    assert!(repo.has_failed_task(&job_id).await.unwrap());

    println!("✅ TASK_LEDGER: Retry discipline certified.");
}

#[tokio::test]
async fn certify_completion_seals_actual_keyspace() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = TaskRepository::new(client.clone());
    let job_id = Uuid::new_v4();

    let task = forge_task(job_id, 0, 10_000, 1);
    repo.insert_task(&task).await.unwrap();
    repo.assign_agent(&task.id, "agent-9").await.unwrap();

    repo.mark_completed(&task.id, 10_250, true, 10_250).await.unwrap();
    let sealed = repo.fetch_task(&task.id).await.unwrap();
    assert_eq!(sealed.status, TaskStatus::Completed);
    assert_eq!(sealed.chunk_actual_keyspace, 10_250);
    assert!(sealed.is_actual_keyspace);
    assert_eq!(sealed.agent_id.as_deref(), Some("agent-9"));

    println!("✅ TASK_LEDGER: Actual keyspace certification sealed.");
}

#[tokio::test]
async fn certify_interruptible_ordering() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = TaskRepository::new(client.clone());
    let job_id = Uuid::new_v4();

    let mut older_low = forge_task(job_id, 0, 1_000, 1);
    older_low.priority = 100;
    older_low.status = TaskStatus::Running;
    older_low.agent_id = Some("agent-1".to_string());
    older_low.created_at = Utc::now() - chrono::Duration::seconds(120);
    repo.insert_task(&older_low).await.unwrap();

    let mut newer_low = forge_task(job_id, 1_000, 2_000, 2);
    newer_low.priority = 100;
    newer_low.status = TaskStatus::Running;
    newer_low.agent_id = Some("agent-2".to_string());
    repo.insert_task(&newer_low).await.unwrap();

    let mut high = forge_task(job_id, 2_000, 3_000, 3);
    high.priority = 950;
    high.status = TaskStatus::Running;
    high.agent_id = Some("agent-3".to_string());
    repo.insert_task(&high).await.unwrap();

    // Bajo prioridad 900: sólo las dos de prioridad 100, la más nueva primero.
    let victims = repo.fetch_interruptible_tasks(900).await.unwrap();
    assert_eq!(victims.len(), 2);
    assert_eq!(victims[0].id, newer_low.id, "newest-first inside the oldest priority");

    println!("✅ TASK_LEDGER: Preemption victim ordering certified.");
}
