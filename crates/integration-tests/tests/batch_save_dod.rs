//! Batch Save Definition of Done (DoD) Integration Tests
//!
//! Every strategy against a real SQLite file: all-or-nothing visibility,
//! capacity handling, chunking and the sequential chain bound.

mod common;

use batchtx_core::application::{BatchConfig, PoolConfig, Strategy, WorkerPool};
use batchtx_core::domain::{ChunkPreset, RollbackCause, TransactionState};
use batchtx_core::error::AppError;
use batchtx_core::port::UserRepository;
use common::*;
use std::sync::Arc;

fn rollback_cause<T: std::fmt::Debug>(result: Result<T, AppError>) -> RollbackCause {
    match result {
        Err(AppError::BatchRolledBack { cause }) => cause,
        other => panic!("expected rolled back batch, got {:?}", other),
    }
}

/// DoD 1: All-positive outcomes commit and every record is visible
#[tokio::test]
async fn test_every_strategy_commits_all_records() {
    for strategy in Strategy::ALL {
        let db = TestDb::new().await;
        let service = db.service(PoolConfig::new(4, 400), config(7));

        let report = tokio::time::timeout(TEST_TIMEOUT, service.save(strategy, users("u", 50)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.chunks, 8, "{}", strategy);
        assert_eq!(report.rows_inserted, 50);
        assert_eq!(report.state, TransactionState::Committed);
        assert_eq!(db.count().await, 50);
    }

    println!("✅ DoD 1: Every strategy commits a full batch");
}

/// DoD 2: A failing chunk rolls back the whole batch, including the clear
#[tokio::test]
async fn test_failed_chunk_leaves_previous_rows_untouched() {
    for strategy in Strategy::ALL {
        let db = TestDb::new().await;
        let service = db.service(PoolConfig::new(4, 400), config(10));
        service.save(strategy, users("old", 5)).await.unwrap();

        // Duplicate email inside chunk 2 violates the UNIQUE constraint
        let mut batch = users("new", 30);
        batch[25].email = batch[21].email.clone();

        let cause = rollback_cause(service.save(strategy, batch).await);
        assert_eq!(cause, RollbackCause::ExecutionFault { chunk: 2 }, "{}", strategy);

        let names = db.names().await;
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.starts_with("old")));
    }

    println!("✅ DoD 2: Failed chunk rolls back every chunk");
}

/// DoD 2b: A chunk reporting 0 rows rolls back rows other chunks wrote
#[tokio::test]
async fn test_zero_row_chunk_rolls_back_written_rows() {
    for strategy in Strategy::ALL {
        let db = TestDb::new().await;
        let repo = Arc::new(ZeroRowsRepo(db.repo.clone()));
        let pool = Arc::new(WorkerPool::new(PoolConfig::new(4, 100)));
        let service = service_with(repo, pool, config(4));

        let mut batch = users("u", 12);
        batch[9].name = format!("{}-9", ZERO_ROWS_MARKER);

        let cause = rollback_cause(service.save(strategy, batch).await);
        assert_eq!(cause, RollbackCause::NonPositiveOutcome { chunk: 2, rows: 0 });
        assert_eq!(db.count().await, 0, "{}", strategy);
    }

    println!("✅ DoD 2b: Zero-row chunk forces rollback");
}

/// DoD 4: Wait-all refuses a batch larger than the pool can hold
#[tokio::test]
async fn test_wait_all_over_capacity_is_explicit() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(4, 1), config(ChunkPreset::Single.size()));
    service.save_wait_all(users("seed", 2)).await.unwrap();

    let result = tokio::time::timeout(TEST_TIMEOUT, service.save_wait_all(users("big", 6)))
        .await
        .expect("wait-all must not hang on an oversized batch");

    assert_eq!(
        rollback_cause(result),
        RollbackCause::CapacityExceeded { capacity: 5 }
    );
    assert_eq!(db.count().await, 2);

    println!("✅ DoD 4: Wait-all over capacity is refused");
}

/// DoD 5: Submit-collect over capacity faults at submission and rolls back
#[tokio::test]
async fn test_submit_collect_over_capacity_rolls_back() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(4, 1), config(1));

    let result = tokio::time::timeout(TEST_TIMEOUT, service.save_submit_collect(users("u", 6)))
        .await
        .unwrap();

    assert_eq!(
        rollback_cause(result),
        RollbackCause::CapacityExceeded { capacity: 5 }
    );

    // Admitted jobs finish against a finalized transaction
    tokio::time::timeout(TEST_TIMEOUT, async {
        while service.pool().stats().in_flight > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(db.count().await, 0);
    assert_eq!(service.pool().stats().rejected, 1);

    // The connection went back to the pool: the next save works
    service.save_submit_collect(users("u", 5)).await.unwrap();
    assert_eq!(db.count().await, 5);

    println!("✅ DoD 5: Submit-collect rejection leaves nothing behind");
}

/// DoD 6: Sequential chain never has two jobs running
#[tokio::test]
async fn test_sequential_chain_runs_one_job_at_a_time() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(8, 100), config(1));

    let report = service.save_sequential_chain(users("u", 40)).await.unwrap();

    assert_eq!(report.chunks, 40);
    let stats = service.pool().stats();
    assert_eq!(stats.started, 40);
    assert_eq!(stats.peak_running, 1);
    assert_eq!(db.count().await, 40);

    println!("✅ DoD 6: Sequential chain max concurrency is 1");
}

/// DoD 7: 5 records, chunk 1, 4 workers, backlog 1 completes under wait-all
#[tokio::test]
async fn test_wait_all_at_exact_capacity_completes() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(4, 1), config(1));

    let report = tokio::time::timeout(TEST_TIMEOUT, service.save_wait_all(users("u", 5)))
        .await
        .expect("wait-all at capacity must complete")
        .unwrap();

    assert_eq!(report.chunks, 5);
    assert_eq!(db.count().await, 5);

    println!("✅ DoD 7: Wait-all at exact capacity completes");
}

/// DoD 8: 600 records with chunk 200 make exactly 3 chunks everywhere
#[tokio::test]
async fn test_600_records_make_three_chunks() {
    for strategy in Strategy::ALL {
        let db = TestDb::new().await;
        let service = db.service(PoolConfig::default(), config(ChunkPreset::Standard.size()));

        let report = service.save(strategy, users("u", 600)).await.unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.rows_inserted, 600);
        assert_eq!(db.count().await, 600);
    }

    println!("✅ DoD 8: 600 records -> 3 chunks for every strategy");
}

/// DoD 9: Clear-before-insert replaces the user set; disabled it appends
#[tokio::test]
async fn test_clear_before_insert_replaces_user_set() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(4, 100), config(200));
    service.save_wait_all(users("first", 10)).await.unwrap();
    let report = service.save_wait_all(users("second", 3)).await.unwrap();

    assert_eq!(report.rows_cleared, 10);
    let names = db.names().await;
    assert_eq!(names, vec!["second-0", "second-1", "second-2"]);

    let appending = db.service(
        PoolConfig::new(4, 100),
        BatchConfig {
            chunk_size: 200,
            clear_before_insert: false,
        },
    );
    appending.save_wait_all(users("third", 2)).await.unwrap();
    assert_eq!(db.count().await, 5);

    println!("✅ DoD 9: Clear-before-insert is part of the transaction");
}

/// DoD 10: Committed users survive a restart
#[tokio::test]
async fn test_committed_users_persist_after_reopen() {
    let db = TestDb::new().await;
    let service = db.service(PoolConfig::new(4, 100), config(3));
    service.save_submit_collect(users("keep", 9)).await.unwrap();

    let reopened = TestDb::open(&db.path).await;
    let listed = reopened.list_users().await.unwrap();
    assert_eq!(listed.len(), 9);
    assert_eq!(listed[0].name, "keep-0");
    assert!(listed.iter().all(|u| u.created_at > 0));

    println!("✅ DoD 10: Users persist after reopen");
}
