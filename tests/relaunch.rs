//! Tests for relaunching finished challenges and reviewing the copies.

use academy::challenge::{
    CHALLENGES, RelaunchEdits, RelaunchError, discard_relaunch, edit_relaunch, pending_relaunches, relaunch,
    validate_relaunch,
};
use academy::docstore::{DocumentStore, MemoryStore, fields};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

// =============================================================================
// Helper functions
// =============================================================================

fn now() -> DateTime<Utc> {
    // A Wednesday.
    return Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
}

fn seeded() -> MemoryStore {
    let mut store = MemoryStore::new();
    let challenges = [
        ("slalom", json!({ "title": "Slalom week", "deadline": "2026-10-10T00:00:00Z", "participantsCount": 12, "status": "active" })),
        ("moguls", json!({ "name": "Moguls", "deadline": 1760054400000i64 })),
        ("station", json!({ "title": "Val Thorens", "kind": "station", "deadline": "2026-10-01T00:00:00Z" })),
        ("running", json!({ "title": "Powder", "deadline": "2026-12-01T00:00:00Z" })),
    ];
    for (id, doc) in challenges {
        store.set(CHALLENGES, id, fields(doc)).unwrap();
    }
    return store;
}

// =============================================================================
// Relaunch
// =============================================================================

#[test]
fn relaunch_archives_and_copies() {
    let mut store = seeded();
    let report = relaunch(&mut store, now()).unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.message, "Processed 2 challenge(s)");
    let mut originals: Vec<&str> = report.results.iter().map(|r| r.original_id.as_str()).collect();
    originals.sort();
    assert_eq!(originals, vec!["moguls", "slalom"]);
    assert!(report.results.iter().all(|r| r.new_deadline == "2026-11-01T00:00:00.000Z"));

    let slalom = store.get(CHALLENGES, "slalom").unwrap().unwrap();
    assert_eq!(slalom.bool_field("archived"), Some(true));

    let result = report.results.iter().find(|r| r.original_id == "slalom").unwrap();
    assert_eq!(result.title, "Slalom week");
    let copy = store.get(CHALLENGES, &result.new_id).unwrap().unwrap();
    assert_eq!(copy.str_field("status"), Some("non_active"));
    assert_eq!(copy.f64_field("participantsCount"), Some(0.0));
    assert_eq!(copy.str_field("originalChallengeId"), Some("slalom"));

    let running = store.get(CHALLENGES, "running").unwrap().unwrap();
    assert_eq!(running.bool_field("archived"), None);
    assert_eq!(store.count(CHALLENGES), 6);
}

#[test]
fn relaunch_twice_is_a_no_op() {
    let mut store = seeded();
    relaunch(&mut store, now()).unwrap();

    // The archived originals are still past their deadline.
    let second = relaunch(&mut store, now()).unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.message, "Processed 0 challenge(s)");
    assert_eq!(store.count(CHALLENGES), 6);
}

#[test]
fn nothing_past_deadline_reports_no_finished_challenges() {
    let mut store = MemoryStore::new();
    store
        .set(CHALLENGES, "running", fields(json!({ "title": "Powder", "deadline": "2026-12-01T00:00:00Z" })))
        .unwrap();

    let report = relaunch(&mut store, now()).unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(report.message, "No finished challenges to process");

    let empty = relaunch(&mut MemoryStore::new(), now()).unwrap();
    assert_eq!(empty.message, "No finished challenges to process");
}

#[test]
fn finished_station_alone_counts_as_processed_zero() {
    let mut store = MemoryStore::new();
    store
        .set(CHALLENGES, "station", fields(json!({ "kind": "station", "deadline": "2026-10-01T00:00:00Z" })))
        .unwrap();

    let report = relaunch(&mut store, now()).unwrap();
    assert_eq!(report.message, "Processed 0 challenge(s)");
    assert_eq!(store.count(CHALLENGES), 1);
}

// =============================================================================
// Review
// =============================================================================

#[test]
fn pending_lists_only_relaunched_copies() {
    let mut store = seeded();
    store
        .set(CHALLENGES, "draft", fields(json!({ "status": "non_active", "archived": false })))
        .unwrap();
    relaunch(&mut store, now()).unwrap();

    let pending = pending_relaunches(&store).unwrap();
    let mut originals: Vec<&str> = pending.iter().map(|p| p.original_id.as_str()).collect();
    originals.sort();
    assert_eq!(originals, vec!["moguls", "slalom"]);
}

#[test]
fn pending_newest_first() {
    let mut store = MemoryStore::new();
    for (id, created) in [("older", "2026-10-01T00:00:00Z"), ("newer", "2026-10-05T00:00:00Z")] {
        store
            .set(CHALLENGES, id, fields(json!({
                "status": "non_active",
                "archived": false,
                "originalChallengeId": "c0",
                "createdAt": created,
            })))
            .unwrap();
    }

    let pending = pending_relaunches(&store).unwrap();
    let ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["newer", "older"]);
}

#[test]
fn pending_without_created_at_is_not_listed() {
    let mut store = MemoryStore::new();
    store
        .set(CHALLENGES, "undated", fields(json!({
            "status": "non_active",
            "archived": false,
            "originalChallengeId": "c0",
        })))
        .unwrap();

    assert!(pending_relaunches(&store).unwrap().is_empty());
}

#[test]
fn validate_edit_and_discard() {
    let mut store = seeded();
    let report = relaunch(&mut store, now()).unwrap();
    let first = report.results[0].new_id.clone();
    let second = report.results[1].new_id.clone();

    let edits = RelaunchEdits { title: Some("Slalom, again".into()), ..RelaunchEdits::default() };
    edit_relaunch(&mut store, &first, edits, now()).unwrap();
    validate_relaunch(&mut store, &first, now()).unwrap();

    let doc = store.get(CHALLENGES, &first).unwrap().unwrap();
    assert_eq!(doc.str_field("status"), Some("active"));
    assert_eq!(doc.str_field("title"), Some("Slalom, again"));

    discard_relaunch(&mut store, &second).unwrap();
    assert!(store.get(CHALLENGES, &second).unwrap().is_none());
    assert!(pending_relaunches(&store).unwrap().is_empty());
}

#[test]
fn review_rejects_non_pending() {
    let mut store = seeded();

    assert!(matches!(
        validate_relaunch(&mut store, "running", now()),
        Err(RelaunchError::NotPending(_))
    ));
    assert!(matches!(
        discard_relaunch(&mut store, "missing"),
        Err(RelaunchError::NotFound(_))
    ));
    assert!(store.get(CHALLENGES, "running").unwrap().is_some());
}
