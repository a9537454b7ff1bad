use chrono::{TimeZone, Utc};
use finmarket_core::{
    clock::ManualClock,
    metrics::RECENT_FEED_LIMIT,
    storage::MemoryStore,
    tracking_store::{ActivityKind, DeviceKind, TrackingStore, VisitorStatus},
};
use serde_json::json;

// ── Test helpers ────────────────────────────────────────────────────────────

fn manual_clock() -> ManualClock {
    ManualClock::starting_at(Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap())
}

fn fresh_store(clock: &ManualClock) -> TrackingStore {
    let _ = env_logger::builder().is_test(true).try_init();
    TrackingStore::new(Box::new(MemoryStore::new()), Box::new(clock.clone()))
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Average duration counts ended sessions only; an open session changes the
/// total but not the mean.
#[test]
fn average_duration_over_ended_sessions_only() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);

    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "browse");
    clock.advance_secs(100);
    store.end_session();

    store.start_session("b@example.com", DeviceKind::Mobile, "ad", "rates");
    clock.advance_secs(200);
    store.end_session();

    store.start_session("c@example.com", DeviceKind::Tablet, "direct", "browse");

    let report = store.all_metrics();
    assert_eq!(report.total_sessions, 3);
    assert_eq!(report.total_users, 3);
    assert!(
        (report.avg_session_duration_secs - 150.0).abs() < 1e-9,
        "mean over the two ended sessions should be 150, got {}",
        report.avg_session_duration_secs
    );
    assert_eq!(report.devices.desktop, 1);
    assert_eq!(report.devices.mobile, 1);
    assert_eq!(report.devices.tablet, 1);
}

/// The product leaderboard ranks by views, breaks ties by name, and keeps
/// at most five entries.
#[test]
fn top_products_rank_and_truncate() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);
    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "browse");

    let views = [
        "Harborview Wheels",
        "Harborview Wheels",
        "Harborview Wheels",
        "Atlas Express Credit",
        "Atlas Express Credit",
        "Meridian FlexLoan",
        "Pioneer Home Loan",
        "Crestline Advance",
        "Union Square QuickLoan",
    ];
    for product in views {
        store.track_activity(
            ActivityKind::ProductView,
            json!({ "product": product }),
            &format!("Viewed {product}"),
        );
    }
    // Non-view noise that must not count.
    store.track_activity(ActivityKind::PageView, json!({ "page": "faq" }), "FAQ");

    let report = store.all_metrics();
    assert_eq!(report.top_products.len(), 5, "leaderboard caps at five");
    assert_eq!(report.top_products[0].product, "Harborview Wheels");
    assert_eq!(report.top_products[0].views, 3);
    assert_eq!(report.top_products[1].product, "Atlas Express Credit");
    assert_eq!(report.top_products[1].views, 2);
    // The four single-view products tie; names ascending decides who stays.
    assert_eq!(report.top_products[2].product, "Crestline Advance");
    assert_eq!(report.top_products[3].product, "Meridian FlexLoan");
    assert_eq!(report.top_products[4].product, "Pioneer Home Loan");
}

/// Session starts land in the 24-bucket histogram by UTC hour.
#[test]
fn hourly_histogram_buckets_session_starts() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);

    clock.set(Utc.with_ymd_and_hms(2026, 3, 14, 9, 15, 0).unwrap());
    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "browse");
    store.end_session();

    clock.set(Utc.with_ymd_and_hms(2026, 3, 14, 9, 55, 0).unwrap());
    store.start_session("b@example.com", DeviceKind::Mobile, "ad", "rates");
    store.end_session();

    clock.set(Utc.with_ymd_and_hms(2026, 3, 15, 22, 5, 0).unwrap());
    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "resume");
    store.end_session();

    let report = store.all_metrics();
    assert_eq!(report.hourly_traffic[9], 2);
    assert_eq!(report.hourly_traffic[22], 1);
    assert_eq!(report.hourly_traffic.iter().sum::<u32>(), 3);
}

/// The recent feed merges activities and events, newest first, capped at
/// twenty entries.
#[test]
fn recent_feed_merges_and_caps() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);
    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "browse");

    for step in 0..30 {
        clock.advance_secs(60);
        store.track_activity(
            ActivityKind::FormStepCompleted,
            json!({ "step": step }),
            &format!("Step {step}"),
        );
    }

    let report = store.all_metrics();
    assert_eq!(report.recent_feed.len(), RECENT_FEED_LIMIT);
    assert_eq!(
        report.recent_feed[0].label, "Step 29",
        "feed must lead with the newest entry"
    );
    for pair in report.recent_feed.windows(2) {
        assert!(pair[0].at >= pair[1].at, "feed must be newest first");
    }
}

/// File-kind and visitor-status breakdowns count what was recorded.
#[test]
fn file_and_status_breakdowns() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);

    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "apply");
    store.track_file_upload("payslip-jan.pdf", "pdf", 10_000);
    store.track_file_upload("payslip-feb.pdf", "pdf", 11_000);
    store.track_file_upload("id-card.jpg", "jpg", 5_000);
    store.end_session();

    clock.advance_secs(60);
    store.start_session("b@example.com", DeviceKind::Mobile, "ad", "rates");
    store.end_session();
    store.update_user_status("b@example.com", VisitorStatus::Dormant, "no follow-up");

    let report = store.all_metrics();
    assert_eq!(report.total_files, 3);
    assert_eq!(report.file_kinds.get("pdf"), Some(&2));
    assert_eq!(report.file_kinds.get("jpg"), Some(&1));
    assert_eq!(report.statuses.new, 1);
    assert_eq!(report.statuses.dormant, 1);
    assert_eq!(report.statuses.active, 0);
    assert_eq!(report.statuses.converted, 0);
}

/// No outcomes at all means a 0% conversion rate, not a division error.
#[test]
fn conversion_rate_zero_without_outcomes() {
    let clock = manual_clock();
    let mut store = fresh_store(&clock);
    store.start_session("a@example.com", DeviceKind::Desktop, "direct", "browse");
    store.track_activity(ActivityKind::PageView, json!({}), "Landing page");

    let report = store.all_metrics();
    assert_eq!(report.conversion_rate_pct, 0.0);
}
