use chrono::{TimeZone, Utc};
use finmarket_core::{
    clock::ManualClock,
    storage::{MemoryStore, SnapshotStore, SqliteStore, KEY_ACTIVITIES, KEY_PROFILES, KEY_SESSIONS},
    tracking_store::{ActivityKind, DeviceKind, TrackingStore, VisitorStatus},
};
use serde_json::json;

// ── Test helpers ────────────────────────────────────────────────────────────

fn manual_clock() -> ManualClock {
    let _ = env_logger::builder().is_test(true).try_init();
    ManualClock::starting_at(Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap())
}

/// Drive a representative slice of state through the store: two visitors,
/// an ended session, an upload, and a status change.
fn populate(store: &mut TrackingStore, clock: &ManualClock) {
    store.start_session("ana@example.com", DeviceKind::Desktop, "direct", "compare");
    store.track_activity(ActivityKind::PageView, json!({ "page": "landing" }), "Landing page");
    store.track_activity(
        ActivityKind::ProductView,
        json!({ "product": "Atlas Express Credit" }),
        "Viewed Atlas Express Credit",
    );
    store.track_file_upload("payslip.pdf", "pdf", 52_133);
    clock.advance_secs(240);
    store.end_session();

    clock.advance_secs(60);
    store.start_session("ben@example.com", DeviceKind::Mobile, "ad", "rates");
    store.track_activity(ActivityKind::ProcessCompleted, json!({}), "Finished application");
    store.end_session();

    store.update_user_status("ben@example.com", VisitorStatus::Converted, "contract signed");
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Rebuilding over the same backend must reproduce every collection
/// deep-equal: sessions, activities, profiles, files, and events.
#[test]
fn rebuild_reproduces_state() {
    let clock = manual_clock();
    let backend = MemoryStore::new();
    let mut store = TrackingStore::new(Box::new(backend.clone()), Box::new(clock.clone()));
    populate(&mut store, &clock);

    let rebuilt = TrackingStore::new(Box::new(backend), Box::new(clock));

    assert_eq!(rebuilt.sessions(), store.sessions());
    assert_eq!(rebuilt.activities(), store.activities());
    assert_eq!(rebuilt.files(), store.files());
    assert_eq!(rebuilt.events(), store.events());
    assert_eq!(rebuilt.profile("ana@example.com"), store.profile("ana@example.com"));
    assert_eq!(rebuilt.profile("ben@example.com"), store.profile("ben@example.com"));
}

/// Same round-trip through SQLite. A shared-cache URI keeps one in-memory
/// database alive across two connections, so the rebuilt store reads the
/// bytes the first store wrote.
#[test]
fn sqlite_round_trip_via_shared_cache() {
    const URI: &str = "file:persistence_roundtrip?mode=memory&cache=shared";

    let clock = manual_clock();
    let first = SqliteStore::open(URI).expect("open first connection");
    let second = SqliteStore::open(URI).expect("open second connection");

    let mut store = TrackingStore::new(Box::new(first), Box::new(clock.clone()));
    populate(&mut store, &clock);

    let sessions = store.sessions().to_vec();
    let activities = store.activities().to_vec();
    let ben = store.profile("ben@example.com").cloned();
    drop(store); // second connection keeps the shared db alive

    let rebuilt = TrackingStore::new(Box::new(second), Box::new(clock));
    assert_eq!(rebuilt.sessions(), sessions.as_slice());
    assert_eq!(rebuilt.activities(), activities.as_slice());
    assert_eq!(rebuilt.profile("ben@example.com").cloned(), ben);
}

/// A corrupt snapshot under one key resets only that collection; the other
/// four load untouched and construction never fails.
#[test]
fn corrupt_key_resets_only_that_collection() {
    let clock = manual_clock();
    let backend = MemoryStore::new();
    let mut store = TrackingStore::new(Box::new(backend.clone()), Box::new(clock.clone()));
    populate(&mut store, &clock);
    drop(store);

    backend.set_raw(KEY_ACTIVITIES, "{definitely not json");

    let rebuilt = TrackingStore::new(Box::new(backend), Box::new(clock));
    assert!(rebuilt.activities().is_empty(), "corrupt collection must reset");
    assert_eq!(rebuilt.sessions().len(), 2, "healthy collections must survive");
    assert!(rebuilt.profile("ana@example.com").is_some());
    assert_eq!(rebuilt.files().len(), 1);
}

/// Every mutation flushes synchronously: the raw snapshot must reflect the
/// change before the mutating call returns.
#[test]
fn mutations_flush_synchronously() {
    let clock = manual_clock();
    let backend = MemoryStore::new();
    let mut store = TrackingStore::new(Box::new(backend.clone()), Box::new(clock));

    store.start_session("cass@example.com", DeviceKind::Tablet, "direct", "browse");
    let raw_sessions = backend.raw(KEY_SESSIONS).expect("sessions written immediately");
    assert!(
        raw_sessions.contains("cass@example.com"),
        "snapshot must already carry the new session"
    );

    store.track_activity(ActivityKind::PageView, json!({}), "Landing page");
    let raw_activities = backend.raw(KEY_ACTIVITIES).expect("activities written immediately");
    let parsed: serde_json::Value = serde_json::from_str(&raw_activities).expect("valid json");
    assert_eq!(parsed.as_array().map(|a| a.len()), Some(1));
}

/// Profiles persist as an entry list, not a keyed object: the snapshot
/// must parse as a JSON array whose entries carry their own email.
#[test]
fn profiles_persist_as_entry_list() {
    let clock = manual_clock();
    let backend = MemoryStore::new();
    let mut store = TrackingStore::new(Box::new(backend.clone()), Box::new(clock));
    store.start_session("dee@example.com", DeviceKind::Desktop, "direct", "browse");

    let raw = backend.raw(KEY_PROFILES).expect("profiles written");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    let entries = parsed.as_array().expect("profiles must serialize as a list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["email"], json!("dee@example.com"));
}

/// An empty backend yields an empty store, and unknown extra keys are
/// simply ignored by the loader.
#[test]
fn empty_backend_starts_clean() {
    let clock = manual_clock();
    let mut backend = MemoryStore::new();
    backend.save("unrelated_key", "whatever").expect("save");

    let store = TrackingStore::new(Box::new(backend), Box::new(clock));
    assert!(store.sessions().is_empty());
    assert!(store.activities().is_empty());
    assert!(store.files().is_empty());
    assert!(store.events().is_empty());
    assert!(store.current_session().is_none());
}
