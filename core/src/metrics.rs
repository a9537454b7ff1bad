//! Aggregate analytics over the tracking collections.
//!
//! Pure summaries over borrowed state: no storage access, no clock, no
//! mutation. [`compute`] is called by `TrackingStore::all_metrics`, which
//! is the only place that assembles the inputs.

use crate::tracking_store::{
    ActivityKind, TrackingActivity, TrackingSession, UploadedFileRecord, UserEvent,
    VisitorProfile, VisitorStatus,
};
use crate::types::{Email, SessionId};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// How many merged feed entries `compute` keeps, newest first.
pub const RECENT_FEED_LIMIT: usize = 20;
/// How many products the view leaderboard keeps.
pub const TOP_PRODUCT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub total_sessions:   usize,
    pub total_activities: usize,
    pub total_users:      usize,
    pub total_files:      usize,
    pub total_events:     usize,
    /// Mean duration over ended sessions only; 0 when none have ended.
    pub avg_session_duration_secs: f64,
    pub top_products:     Vec<ProductViews>,
    pub devices:          DeviceBreakdown,
    /// Session starts bucketed by UTC hour of day.
    pub hourly_traffic:   [u32; 24],
    /// completed / (completed + abandoned) · 100; 0 when nothing finished
    /// either way.
    pub conversion_rate_pct: f64,
    pub file_kinds:       BTreeMap<String, u32>,
    pub statuses:         StatusBreakdown,
    pub recent_feed:      Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductViews {
    pub product: String,
    pub views:   u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeviceBreakdown {
    pub desktop: u32,
    pub mobile:  u32,
    pub tablet:  u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusBreakdown {
    pub new:       u32,
    pub active:    u32,
    pub converted: u32,
    pub dormant:   u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedItem {
    pub at:         DateTime<Utc>,
    pub session_id: SessionId,
    pub source:     FeedSource,
    pub label:      String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSource {
    Activity,
    Event,
}

pub fn compute(
    sessions: &[TrackingSession],
    activities: &[TrackingActivity],
    profiles: &BTreeMap<Email, VisitorProfile>,
    files: &[UploadedFileRecord],
    events: &[UserEvent],
) -> MetricsReport {
    MetricsReport {
        total_sessions:   sessions.len(),
        total_activities: activities.len(),
        total_users:      profiles.len(),
        total_files:      files.len(),
        total_events:     events.len(),
        avg_session_duration_secs: average_duration(sessions),
        top_products:     top_products(activities),
        devices:          device_breakdown(sessions),
        hourly_traffic:   hourly_traffic(sessions),
        conversion_rate_pct: conversion_rate(profiles),
        file_kinds:       file_kinds(files),
        statuses:         status_breakdown(profiles),
        recent_feed:      recent_feed(activities, events),
    }
}

fn average_duration(sessions: &[TrackingSession]) -> f64 {
    let ended: Vec<i64> = sessions.iter().filter_map(|s| s.duration_secs).collect();
    if ended.is_empty() {
        return 0.0;
    }
    ended.iter().sum::<i64>() as f64 / ended.len() as f64
}

/// `ProductView` counts by the payload's `product` field. Views without
/// one land in an `unknown` bucket rather than vanishing.
fn top_products(activities: &[TrackingActivity]) -> Vec<ProductViews> {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    for activity in activities {
        if activity.kind != ActivityKind::ProductView {
            continue;
        }
        let product = activity
            .data
            .get("product")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        *counts.entry(product.to_string()).or_insert(0) += 1;
    }

    let mut ranked: Vec<ProductViews> = counts
        .into_iter()
        .map(|(product, views)| ProductViews { product, views })
        .collect();
    // Views descending; the BTreeMap already yields names ascending, so a
    // stable sort keeps that order on ties.
    ranked.sort_by(|a, b| b.views.cmp(&a.views));
    ranked.truncate(TOP_PRODUCT_LIMIT);
    ranked
}

fn device_breakdown(sessions: &[TrackingSession]) -> DeviceBreakdown {
    use crate::tracking_store::DeviceKind;

    let mut out = DeviceBreakdown::default();
    for session in sessions {
        match session.device {
            DeviceKind::Desktop => out.desktop += 1,
            DeviceKind::Mobile => out.mobile += 1,
            DeviceKind::Tablet => out.tablet += 1,
        }
    }
    out
}

fn hourly_traffic(sessions: &[TrackingSession]) -> [u32; 24] {
    let mut buckets = [0u32; 24];
    for session in sessions {
        buckets[session.started_at.hour() as usize] += 1;
    }
    buckets
}

fn conversion_rate(profiles: &BTreeMap<Email, VisitorProfile>) -> f64 {
    let completed: u32 = profiles.values().map(|p| p.completed_processes).sum();
    let abandoned: u32 = profiles.values().map(|p| p.abandoned_processes).sum();
    let denominator = completed + abandoned;
    if denominator == 0 {
        return 0.0;
    }
    f64::from(completed) / f64::from(denominator) * 100.0
}

fn file_kinds(files: &[UploadedFileRecord]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for file in files {
        *counts.entry(file.file_kind.clone()).or_insert(0) += 1;
    }
    counts
}

fn status_breakdown(profiles: &BTreeMap<Email, VisitorProfile>) -> StatusBreakdown {
    let mut out = StatusBreakdown::default();
    for profile in profiles.values() {
        match profile.status {
            VisitorStatus::New => out.new += 1,
            VisitorStatus::Active => out.active += 1,
            VisitorStatus::Converted => out.converted += 1,
            VisitorStatus::Dormant => out.dormant += 1,
        }
    }
    out
}

fn recent_feed(activities: &[TrackingActivity], events: &[UserEvent]) -> Vec<FeedItem> {
    let mut feed: Vec<FeedItem> = Vec::with_capacity(activities.len() + events.len());
    feed.extend(activities.iter().map(|a| FeedItem {
        at:         a.at,
        session_id: a.session_id.clone(),
        source:     FeedSource::Activity,
        label:      a.description.clone(),
    }));
    feed.extend(events.iter().map(|e| FeedItem {
        at:         e.at,
        session_id: e.session_id.clone(),
        source:     FeedSource::Event,
        label:      e.kind.wire_name().to_string(),
    }));
    feed.sort_by(|a, b| b.at.cmp(&a.at));
    feed.truncate(RECENT_FEED_LIMIT);
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking_store::DeviceKind;
    use chrono::TimeZone;

    fn session_at(hour: u32, device: DeviceKind) -> TrackingSession {
        TrackingSession {
            session_id:    format!("s-{hour}-{device:?}"),
            email:         "a@example.com".to_string(),
            started_at:    Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0).unwrap(),
            ended_at:      None,
            duration_secs: None,
            device,
            entry_method:  "direct".to_string(),
            entry_reason:  "browse".to_string(),
        }
    }

    fn product_view(product: &str) -> TrackingActivity {
        TrackingActivity {
            at:          Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
            session_id:  "s".to_string(),
            kind:        ActivityKind::ProductView,
            data:        serde_json::json!({ "product": product }),
            description: format!("Viewed {product}"),
        }
    }

    #[test]
    fn hourly_buckets_and_devices() {
        let sessions = vec![
            session_at(9, DeviceKind::Desktop),
            session_at(9, DeviceKind::Mobile),
            session_at(23, DeviceKind::Desktop),
        ];
        let report = compute(&sessions, &[], &BTreeMap::new(), &[], &[]);
        assert_eq!(report.hourly_traffic[9], 2);
        assert_eq!(report.hourly_traffic[23], 1);
        assert_eq!(report.hourly_traffic[0], 0);
        assert_eq!(report.devices.desktop, 2);
        assert_eq!(report.devices.mobile, 1);
        assert_eq!(report.devices.tablet, 0);
    }

    #[test]
    fn top_products_break_ties_by_name() {
        let activities = vec![
            product_view("zeta-loan"),
            product_view("alpha-loan"),
            product_view("zeta-loan"),
            product_view("alpha-loan"),
            product_view("mid-loan"),
        ];
        let report = compute(&[], &activities, &BTreeMap::new(), &[], &[]);
        let names: Vec<&str> = report.top_products.iter().map(|p| p.product.as_str()).collect();
        assert_eq!(names, vec!["alpha-loan", "zeta-loan", "mid-loan"]);
        assert_eq!(report.top_products[0].views, 2);
    }

    #[test]
    fn unlabeled_product_views_bucket_as_unknown() {
        let mut view = product_view("ignored");
        view.data = serde_json::json!({ "page": "catalog" });
        let report = compute(&[], &[view], &BTreeMap::new(), &[], &[]);
        assert_eq!(report.top_products.len(), 1);
        assert_eq!(report.top_products[0].product, "unknown");
    }

    #[test]
    fn empty_state_yields_zeroes() {
        let report = compute(&[], &[], &BTreeMap::new(), &[], &[]);
        assert_eq!(report.total_sessions, 0);
        assert_eq!(report.avg_session_duration_secs, 0.0);
        assert_eq!(report.conversion_rate_pct, 0.0);
        assert!(report.top_products.is_empty());
        assert!(report.recent_feed.is_empty());
    }
}
