use std::thread;

use chrono::{Duration, TimeZone, Utc};
use camino::Utf8PathBuf;

use kira_protein_report::config::UsageLimits;
use kira_protein_report::usage::UsageLedger;

fn ledger(dir: &tempfile::TempDir, limits: UsageLimits) -> UsageLedger {
    let path = Utf8PathBuf::from_path_buf(dir.path().join("nested").join("usage.json")).unwrap();
    UsageLedger::new(path, limits)
}

#[test]
fn reservations_persist_between_instances() {
    let temp = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert!(ledger(&temp, UsageLimits::default()).try_reserve_at(1, 1200, now).unwrap());
    let status = ledger(&temp, UsageLimits::default())
        .status_at(now + Duration::seconds(10))
        .unwrap();
    assert_eq!(status.requests_last_minute, 1);
    assert_eq!(status.tokens_last_minute, 1200);
    assert_eq!(status.requests_today, 1);
}

#[test]
fn minute_window_limits_requests() {
    let temp = tempfile::tempdir().unwrap();
    let limits = UsageLimits {
        requests_per_minute: 2,
        ..UsageLimits::default()
    };
    let ledger = ledger(&temp, limits);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert!(ledger.try_reserve_at(1, 10, now).unwrap());
    assert!(ledger.try_reserve_at(1, 10, now + Duration::seconds(5)).unwrap());
    assert!(!ledger.try_reserve_at(1, 10, now + Duration::seconds(30)).unwrap());
    // The first mark has left the window.
    assert!(ledger.try_reserve_at(1, 10, now + Duration::seconds(61)).unwrap());
}

#[test]
fn token_limit_rejects_without_recording() {
    let temp = tempfile::tempdir().unwrap();
    let limits = UsageLimits {
        tokens_per_minute: 1000,
        ..UsageLimits::default()
    };
    let ledger = ledger(&temp, limits);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert!(!ledger.try_reserve_at(1, 1001, now).unwrap());
    let status = ledger.status_at(now).unwrap();
    assert_eq!(status.requests_last_minute, 0);
    assert_eq!(status.requests_today, 0);
    assert!(ledger.try_reserve_at(1, 1000, now).unwrap());
}

#[test]
fn daily_counter_resets_after_a_day() {
    let temp = tempfile::tempdir().unwrap();
    let limits = UsageLimits {
        requests_per_day: 1,
        ..UsageLimits::default()
    };
    let ledger = ledger(&temp, limits);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    assert!(ledger.try_reserve_at(1, 10, now).unwrap());
    assert!(!ledger.try_reserve_at(1, 10, now + Duration::hours(2)).unwrap());
    assert!(ledger.try_reserve_at(1, 10, now + Duration::hours(24)).unwrap());
    assert_eq!(
        ledger
            .status_at(now + Duration::hours(24))
            .unwrap()
            .requests_today,
        1
    );
}

#[test]
fn concurrent_reservations_respect_the_limit() {
    let temp = tempfile::tempdir().unwrap();
    let limits = UsageLimits {
        requests_per_minute: 5,
        ..UsageLimits::default()
    };
    let shared = ledger(&temp, limits);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let accepted = thread::scope(|scope| {
        let workers: Vec<_> = (0..16)
            .map(|_| scope.spawn(|| shared.try_reserve_at(1, 0, now).unwrap()))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(accepted, 5);

    let status = ledger(&temp, limits).status_at(now).unwrap();
    assert_eq!(status.requests_today, 5);
    assert_eq!(status.requests_last_minute, 5);
}

#[test]
fn separate_ledgers_on_one_file_share_the_limit() {
    let temp = tempfile::tempdir().unwrap();
    let limits = UsageLimits {
        requests_per_day: 3,
        ..UsageLimits::default()
    };
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let accepted = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let own = ledger(&temp, limits);
                scope.spawn(move || own.try_reserve_at(1, 10, now).unwrap())
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(accepted, 3);
    assert_eq!(ledger(&temp, limits).status_at(now).unwrap().requests_today, 3);
}

#[test]
fn status_of_missing_ledger_is_empty() {
    let temp = tempfile::tempdir().unwrap();
    let ledger = ledger(&temp, UsageLimits::default());
    let status = ledger.status().unwrap();
    assert_eq!(status.requests_today, 0);
    assert!(!ledger.path().exists());
}
