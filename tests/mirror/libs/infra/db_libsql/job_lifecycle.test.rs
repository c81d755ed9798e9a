// [tests/mirror/libs/infra/db_libsql/job_lifecycle.test.rs]

use chrono::Utc;
use hashforge_domain_models::job::{
    AttackConfiguration, AttackMode, IncrementMode, JobExecution, JobStatus,
};
use hashforge_infra_db::repositories::JobRepository;
use hashforge_infra_db::LedgerClient;
use uuid::Uuid;

fn forge_job(priority: i64) -> JobExecution {
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: "hl-1".to_string(),
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
        max_agents: 0,
        chunk_size_seconds: 0,
        status: JobStatus::Pending,
        base_keyspace: 1_000_000,
        effective_keyspace: 1_000_000,
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
        created_by: Some("operator-7".to_string()),
    }
}

#[tokio::test]
async fn certify_job_lifecycle_transitions() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = JobRepository::new(client.clone());

    let job = forge_job(500);
    repo.create_job(&job).await.unwrap();

    // 1. Hidratación íntegra
    let hydrated = repo.fetch_job(&job.id).await.unwrap();
    assert_eq!(hydrated.status, JobStatus::Pending);
    assert_eq!(hydrated.base_keyspace, 1_000_000);
    assert_eq!(hydrated.attack.attack_mode, AttackMode::Straight);
    assert_eq!(hydrated.created_by.as_deref(), Some("operator-7"));

    // 2. Transición a running
    repo.mark_running(&job.id).await.unwrap();
    let running = repo.fetch_job(&job.id).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert!(running.started_at.is_some());

    // 3. Completitud con reconciliación de keyspace
    let sealed = repo.mark_completed(&job.id, 999_500).await.unwrap();
    assert!(sealed);
    let completed = repo.fetch_job(&job.id).await.unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    assert_eq!(completed.effective_keyspace, 999_500);
    assert_eq!(completed.overall_progress_percent, 100.0);

    // 4. Idempotencia: los estados terminales son absorbentes
    let resealed = repo.mark_completed(&job.id, 1).await.unwrap();
    assert!(!resealed);
    let failed = repo.mark_failed(&job.id, "late failure must not land").await.unwrap();
    assert!(!failed);
    assert_eq!(repo.fetch_job(&job.id).await.unwrap().effective_keyspace, 999_500);

    println!("✅ JOB_LIFECYCLE: Absorbing terminal states certified.");
}

#[tokio::test]
async fn certify_schedulable_ordering_and_rule_split_immutability() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = JobRepository::new(client.clone());

    let low = forge_job(100);
    let high = forge_job(900);
    repo.create_job(&low).await.unwrap();
    repo.create_job(&high).await.unwrap();

    let ordered = repo.fetch_schedulable_jobs().await.unwrap();
    assert_eq!(ordered[0].id, high.id, "priority DESC must lead");

    // Inmutabilidad de estrategia: la primera fijación gana.
    repo.enable_rule_splitting(&low.id, 500, 500.0).await.unwrap();
    repo.enable_rule_splitting(&low.id, 7, 7.0).await.unwrap();
    let locked = repo.fetch_job(&low.id).await.unwrap();
    assert!(locked.uses_rule_splitting);
    assert_eq!(locked.rule_split_count, 500, "second write must be a no-op");

    println!("✅ JOB_LIFECYCLE: Rule split strategy immutability certified.");
}

#[tokio::test]
async fn certify_accurate_keyspace_promotion() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = JobRepository::new(client.clone());

    let mut estimated = forge_job(100);
    estimated.is_accurate_keyspace = false;
    estimated.base_keyspace = 10_000;
    estimated.effective_keyspace = 30_000;
    estimated.multiplication_factor = 3;
    repo.create_job(&estimated).await.unwrap();

    // El binario reporta el total real: promoción y factor re-derivado.
    let promoted = repo.promote_accurate_keyspace(&estimated.id, 50_000).await.unwrap();
    assert!(promoted);
    let accurate = repo.fetch_job(&estimated.id).await.unwrap();
    assert!(accurate.is_accurate_keyspace);
    assert_eq!(accurate.effective_keyspace, 50_000);
    assert_eq!(accurate.multiplication_factor, 5);

    // Segunda promoción: el candado ya está sellado.
    let repromoted = repo.promote_accurate_keyspace(&estimated.id, 99).await.unwrap();
    assert!(!repromoted);

    println!("✅ JOB_LIFECYCLE: Estimation → accurate promotion certified.");
}
