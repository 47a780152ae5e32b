use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use super::common::*;
use crate::badges::ledger::{AwardLedger, SqliteAwardLedger};

const WORKERS: usize = 8;

#[test]
fn concurrent_awards_on_shared_connection_grant_once() {
    let ledger = Arc::new(SqliteAwardLedger::open_in_memory().expect("ledger opens"));
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let ledger = ledger.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .try_award(&user("ada"), &badge("first-link"), Utc::now())
                    .expect("award attempt succeeds")
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker finished"))
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.granted).count(), 1);
    assert_eq!(
        outcomes.iter().filter(|outcome| !outcome.granted).count(),
        WORKERS - 1
    );
    assert_eq!(ledger.awards_for(&user("ada")).expect("awards listed").len(), 1);
}

#[test]
fn independent_connections_to_one_database_grant_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("awards.db");

    // One ledger per simulated worker, each with its own connection.
    let ledgers: Vec<SqliteAwardLedger> = (0..WORKERS)
        .map(|_| SqliteAwardLedger::open(&path, Duration::from_secs(10)).expect("ledger opens"))
        .collect();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = ledgers
        .into_iter()
        .map(|ledger| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger
                    .try_award(&user("ada"), &badge("century-views"), Utc::now())
                    .expect("award attempt succeeds")
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker finished"))
        .collect();

    let winners: Vec<_> = outcomes.iter().filter(|outcome| outcome.granted).collect();
    assert_eq!(winners.len(), 1);
    assert!(winners[0].record.is_some());
    assert!(outcomes
        .iter()
        .filter(|outcome| !outcome.granted)
        .all(|outcome| outcome.record.is_none()));

    let observer = SqliteAwardLedger::open(&path, Duration::from_secs(10)).expect("ledger opens");
    assert_eq!(
        observer.awards_for(&user("ada")).expect("awards listed").len(),
        1
    );
}
