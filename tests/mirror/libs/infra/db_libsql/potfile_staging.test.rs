// [tests/mirror/libs/infra/db_libsql/potfile_staging.test.rs]

use hashforge_infra_db::repositories::PotfileStagingRepository;
use hashforge_infra_db::LedgerClient;

#[tokio::test]
async fn certify_conflict_ignore_staging() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = PotfileStagingRepository::new(client.clone());

    let burst = vec![
        ("hunter2".to_string(), "aa11".to_string(), None),
        ("hunter2".to_string(), "aa11".to_string(), None), // duplicado exacto
        ("hunter2".to_string(), "bb22".to_string(), None), // mismo plano, otro hash
        ("letmein".to_string(), "cc33".to_string(), Some("client-x".to_string())),
    ];

    let inserted = repo.stage_batch(&burst).await.unwrap();
    assert_eq!(inserted, 3, "exact duplicates must be ignored at staging");
    assert_eq!(repo.unprocessed_count().await.unwrap(), 3);

    println!("✅ POTFILE_STAGING: Conflict-ignore burst certified.");
}

#[tokio::test]
async fn certify_partial_drain_preserves_unconfirmed() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = PotfileStagingRepository::new(client.clone());

    let burst = vec![
        ("alpha".to_string(), "h1".to_string(), None),
        ("beta".to_string(), "h2".to_string(), None),
        ("gamma".to_string(), "h3".to_string(), Some("client-y".to_string())),
    ];
    repo.stage_batch(&burst).await.unwrap();

    let staged = repo.fetch_unprocessed(100).await.unwrap();
    assert_eq!(staged.len(), 3);
    assert_eq!(staged[2].client_id.as_deref(), Some("client-y"));

    // Drenaje parcial: sólo los dos primeros ids confirmados.
    let confirmed: Vec<i64> = staged.iter().take(2).map(|entry| entry.id).collect();
    let drained = repo.delete_confirmed(&confirmed).await.unwrap();
    assert_eq!(drained, 2);

    let survivors = repo.fetch_unprocessed(100).await.unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].password, "gamma", "unconfirmed rows must survive");

    println!("✅ POTFILE_STAGING: Partial drain custody certified.");
}

#[tokio::test]
async fn certify_batch_limit_respected() {
    let client = LedgerClient::connect("file::memory:", None).await.unwrap();
    let repo = PotfileStagingRepository::new(client.clone());

    let burst: Vec<(String, String, Option<String>)> = (0..50)
        .map(|seed| (format!("pw-{seed}"), format!("hash-{seed}"), None))
        .collect();
    repo.stage_batch(&burst).await.unwrap();

    let limited = repo.fetch_unprocessed(10).await.unwrap();
    assert_eq!(limited.len(), 10);
    // Orden de llegada: el id autoincremental gobierna el drenaje FIFO.
    assert!(limited.windows(2).all(|pair| pair[0].id < pair[1].id));

    println!("✅ POTFILE_STAGING: Batch cap certified.");
}
