//! Activity tracking store — persisted session and visitor analytics.
//!
//! RULE: analytics must never break the caller. Every mutating operation
//! is fire-and-forget: storage failures are logged and swallowed, missing
//! preconditions are warn + no-op, nothing here panics or returns Err.
//!
//! State is five in-memory collections (sessions, activities, profiles,
//! files, events), loaded wholesale at construction and written back
//! wholesale after every mutation via [`SnapshotStore`]. The
//! current-session pointer is per-instance and deliberately not persisted:
//! a reload starts with no session in flight.

use crate::{
    clock::Clock,
    error::MarketResult,
    metrics::{self, MetricsReport},
    storage::{
        SnapshotStore, KEY_ACTIVITIES, KEY_EVENTS, KEY_FILES, KEY_PROFILES, KEY_SESSIONS,
    },
    types::{Email, EventId, FileId, SessionId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Session id stamped on events raised outside any session
/// (administrative profile/status updates).
const SYSTEM_SESSION: &str = "system";

// ── Vocabulary ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Desktop, DeviceKind::Mobile, DeviceKind::Tablet];
}

/// What happened during a session. Closed set: new interaction kinds are
/// added here, never smuggled through as free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PageView,
    ProductView,
    FormStepCompleted,
    FormSubmitted,
    OffersGenerated,
    OfferSelected,
    FileUpload,
    ProcessCompleted,
    ProcessAbandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Registration,
    DocumentUpload,
    StatusChange,
    ProfileUpdate,
}

impl EventKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::Registration => "registration",
            EventKind::DocumentUpload => "document_upload",
            EventKind::StatusChange => "status_change",
            EventKind::ProfileUpdate => "profile_update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorStatus {
    New,
    Active,
    Converted,
    Dormant,
}

// ── Records ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSession {
    pub session_id:    SessionId,
    pub email:         Email,
    pub started_at:    DateTime<Utc>,
    pub ended_at:      Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub device:        DeviceKind,
    pub entry_method:  String,
    pub entry_reason:  String,
}

/// Append-only; never mutated after the push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingActivity {
    pub at:          DateTime<Utc>,
    pub session_id:  SessionId,
    pub kind:        ActivityKind,
    pub data:        serde_json::Value,
    pub description: String,
}

/// Aggregated per-visitor counters, keyed by email. Distinct from the
/// financial `ApplicantProfile`: this side only knows presence and
/// funnel progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorProfile {
    pub email:               Email,
    pub first_seen:          DateTime<Utc>,
    pub last_seen:           DateTime<Utc>,
    pub total_sessions:      u32,
    pub total_time_secs:     i64,
    pub completed_processes: u32,
    pub abandoned_processes: u32,
    pub status:              VisitorStatus,
    pub tags:                Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFileRecord {
    pub file_id:     FileId,
    pub session_id:  SessionId,
    pub email:       Email,
    pub file_name:   String,
    pub file_kind:   String,
    pub size_bytes:  u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    pub event_id:   EventId,
    pub at:         DateTime<Utc>,
    pub session_id: SessionId,
    pub email:      Email,
    pub kind:       EventKind,
    pub details:    serde_json::Value,
}

/// Merge-patch for [`TrackingStore::update_user_profile`]; only `Some`
/// fields overwrite.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub status:              Option<VisitorStatus>,
    pub tags:                Option<Vec<String>>,
    pub completed_processes: Option<u32>,
    pub abandoned_processes: Option<u32>,
}

// ── History view ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct UserHistory {
    pub profile:    Option<VisitorProfile>,
    pub sessions:   Vec<TrackingSession>,
    pub activities: Vec<TrackingActivity>,
    pub files:      Vec<UploadedFileRecord>,
    pub events:     Vec<UserEvent>,
    /// Union of activities, events, and files, newest first.
    pub timeline:   Vec<TimelineEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub at:    DateTime<Utc>,
    pub kind:  TimelineKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Activity,
    Event,
    File,
}

// ── Store ──────────────────────────────────────────────────────

pub struct TrackingStore {
    sessions:        Vec<TrackingSession>,
    activities:      Vec<TrackingActivity>,
    profiles:        BTreeMap<Email, VisitorProfile>,
    files:           Vec<UploadedFileRecord>,
    events:          Vec<UserEvent>,
    current_session: Option<SessionId>,
    storage:         Box<dyn SnapshotStore>,
    clock:           Box<dyn Clock>,
}

impl TrackingStore {
    /// Rebuild the store from whatever the backend holds. A missing or
    /// unreadable key leaves that one collection empty; construction
    /// itself never fails.
    pub fn new(storage: Box<dyn SnapshotStore>, clock: Box<dyn Clock>) -> Self {
        let sessions: Vec<TrackingSession> = load_collection(storage.as_ref(), KEY_SESSIONS);
        let activities: Vec<TrackingActivity> = load_collection(storage.as_ref(), KEY_ACTIVITIES);
        let profile_entries: Vec<VisitorProfile> = load_collection(storage.as_ref(), KEY_PROFILES);
        let files: Vec<UploadedFileRecord> = load_collection(storage.as_ref(), KEY_FILES);
        let events: Vec<UserEvent> = load_collection(storage.as_ref(), KEY_EVENTS);

        let profiles: BTreeMap<Email, VisitorProfile> = profile_entries
            .into_iter()
            .map(|p| (p.email.clone(), p))
            .collect();

        log::info!(
            "tracking: loaded {} sessions, {} activities, {} profiles, {} files, {} events",
            sessions.len(),
            activities.len(),
            profiles.len(),
            files.len(),
            events.len()
        );

        Self {
            sessions,
            activities,
            profiles,
            files,
            events,
            current_session: None,
            storage,
            clock,
        }
    }

    // ── Mutations ──────────────────────────────────────────────

    /// Open a session for `email` and make it current. A first-time email
    /// gets a fresh profile (status `New`) and a `Registration` event.
    pub fn start_session(
        &mut self,
        email: &str,
        device: DeviceKind,
        entry_method: &str,
        entry_reason: &str,
    ) -> SessionId {
        if let Some(open) = self.current_session.take() {
            // Known gap: the replaced session keeps ended_at = None and
            // never accrues time.
            log::warn!("tracking: session {open} replaced without end_session");
        }

        let now = self.clock.now();
        let session_id = uuid::Uuid::new_v4().to_string();

        self.sessions.push(TrackingSession {
            session_id:    session_id.clone(),
            email:         email.to_string(),
            started_at:    now,
            ended_at:      None,
            duration_secs: None,
            device,
            entry_method:  entry_method.to_string(),
            entry_reason:  entry_reason.to_string(),
        });

        let first_sight = !self.profiles.contains_key(email);
        let profile = self
            .profiles
            .entry(email.to_string())
            .or_insert_with(|| VisitorProfile {
                email:               email.to_string(),
                first_seen:          now,
                last_seen:           now,
                total_sessions:      0,
                total_time_secs:     0,
                completed_processes: 0,
                abandoned_processes: 0,
                status:              VisitorStatus::New,
                tags:                Vec::new(),
            });
        profile.total_sessions += 1;
        profile.last_seen = now;

        if first_sight {
            self.push_event(
                now,
                &session_id,
                email,
                EventKind::Registration,
                serde_json::json!({
                    "device": device,
                    "entry_method": entry_method,
                    "entry_reason": entry_reason,
                }),
            );
        }

        self.current_session = Some(session_id.clone());
        log::info!("tracking: session {session_id} started for {email}");
        self.flush();
        session_id
    }

    /// Close the current session: stamp `ended_at`, compute the duration,
    /// and accrue it onto the visitor's `total_time_secs`.
    pub fn end_session(&mut self) {
        let session_id = match self.current_session.take() {
            Some(id) => id,
            None => {
                log::warn!("tracking: end_session without a current session; ignored");
                return;
            }
        };

        let now = self.clock.now();
        let mut accrued = None;
        if let Some(session) = self.sessions.iter_mut().find(|s| s.session_id == session_id) {
            let duration = (now - session.started_at).num_seconds();
            session.ended_at = Some(now);
            session.duration_secs = Some(duration);
            accrued = Some((session.email.clone(), duration));
        }

        if let Some((email, duration)) = accrued {
            if let Some(profile) = self.profiles.get_mut(&email) {
                profile.total_time_secs += duration;
            }
            log::info!("tracking: session {session_id} ended after {duration}s");
        }

        self.flush();
    }

    /// Record one activity against the current session. Without a current
    /// session the activity is dropped (with a warning), never buffered.
    pub fn track_activity(&mut self, kind: ActivityKind, data: serde_json::Value, description: &str) {
        let session_id = match self.current_session.clone() {
            Some(id) => id,
            None => {
                log::warn!("tracking: {kind:?} dropped; no current session");
                return;
            }
        };

        let now = self.clock.now();
        self.activities.push(TrackingActivity {
            at:          now,
            session_id:  session_id.clone(),
            kind,
            data,
            description: description.to_string(),
        });

        if let Some(email) = self.session_email(&session_id) {
            if let Some(profile) = self.profiles.get_mut(&email) {
                profile.last_seen = now;
                match kind {
                    ActivityKind::ProcessCompleted => profile.completed_processes += 1,
                    ActivityKind::ProcessAbandoned => profile.abandoned_processes += 1,
                    _ => {}
                }
            }
        }

        self.flush();
    }

    /// Record a document upload: a file record, plus the paired
    /// `FileUpload` activity and `DocumentUpload` event. Returns the new
    /// file id, or `None` when no session is open.
    pub fn track_file_upload(
        &mut self,
        file_name: &str,
        file_kind: &str,
        size_bytes: u64,
    ) -> Option<FileId> {
        let session_id = match self.current_session.clone() {
            Some(id) => id,
            None => {
                log::warn!("tracking: upload '{file_name}' dropped; no current session");
                return None;
            }
        };
        let email = match self.session_email(&session_id) {
            Some(e) => e,
            None => {
                log::warn!("tracking: current session {session_id} missing from log; upload dropped");
                return None;
            }
        };

        let now = self.clock.now();
        let file_id = uuid::Uuid::new_v4().to_string();

        self.files.push(UploadedFileRecord {
            file_id:     file_id.clone(),
            session_id:  session_id.clone(),
            email:       email.clone(),
            file_name:   file_name.to_string(),
            file_kind:   file_kind.to_string(),
            size_bytes,
            uploaded_at: now,
        });

        self.activities.push(TrackingActivity {
            at:          now,
            session_id:  session_id.clone(),
            kind:        ActivityKind::FileUpload,
            data:        serde_json::json!({
                "file_name": file_name,
                "file_kind": file_kind,
                "size_bytes": size_bytes,
            }),
            description: format!("Uploaded {file_name}"),
        });

        self.push_event(
            now,
            &session_id,
            &email,
            EventKind::DocumentUpload,
            serde_json::json!({
                "file_id": file_id,
                "file_name": file_name,
                "file_kind": file_kind,
                "size_bytes": size_bytes,
            }),
        );

        if let Some(profile) = self.profiles.get_mut(&email) {
            profile.last_seen = now;
        }

        self.flush();
        Some(file_id)
    }

    /// Merge-patch a visitor profile and record a `ProfileUpdate` event
    /// carrying before/after snapshots. Unknown emails are ignored.
    pub fn update_user_profile(&mut self, email: &str, patch: ProfilePatch, reason: &str) {
        let now = self.clock.now();
        let (before, after) = match self.profiles.get_mut(email) {
            Some(profile) => {
                let before = serde_json::to_value(&*profile).unwrap_or(serde_json::Value::Null);
                if let Some(status) = patch.status {
                    profile.status = status;
                }
                if let Some(tags) = patch.tags {
                    profile.tags = tags;
                }
                if let Some(completed) = patch.completed_processes {
                    profile.completed_processes = completed;
                }
                if let Some(abandoned) = patch.abandoned_processes {
                    profile.abandoned_processes = abandoned;
                }
                let after = serde_json::to_value(&*profile).unwrap_or(serde_json::Value::Null);
                (before, after)
            }
            None => {
                log::warn!("tracking: profile update for unknown {email} ignored");
                return;
            }
        };

        let session_id = self.current_or_system_session();
        self.push_event(
            now,
            &session_id,
            email,
            EventKind::ProfileUpdate,
            serde_json::json!({
                "reason": reason,
                "before": before,
                "after": after,
            }),
        );

        self.flush();
    }

    /// Set a visitor's status and record a `StatusChange` event with the
    /// before/after pair.
    pub fn update_user_status(&mut self, email: &str, status: VisitorStatus, reason: &str) {
        let now = self.clock.now();
        let from = match self.profiles.get_mut(email) {
            Some(profile) => {
                let from = profile.status;
                profile.status = status;
                from
            }
            None => {
                log::warn!("tracking: status change for unknown {email} ignored");
                return;
            }
        };

        let session_id = self.current_or_system_session();
        self.push_event(
            now,
            &session_id,
            email,
            EventKind::StatusChange,
            serde_json::json!({
                "from": from,
                "to": status,
                "reason": reason,
            }),
        );

        log::info!("tracking: {email} status {from:?} -> {status:?} ({reason})");
        self.flush();
    }

    // ── Reads ──────────────────────────────────────────────────

    /// Everything recorded for one visitor, including a merged timeline
    /// (activities + events + files) sorted newest first.
    pub fn get_user_history(&self, email: &str) -> UserHistory {
        let sessions: Vec<TrackingSession> = self
            .sessions
            .iter()
            .filter(|s| s.email == email)
            .cloned()
            .collect();
        let session_ids: BTreeSet<&str> =
            sessions.iter().map(|s| s.session_id.as_str()).collect();

        let activities: Vec<TrackingActivity> = self
            .activities
            .iter()
            .filter(|a| session_ids.contains(a.session_id.as_str()))
            .cloned()
            .collect();
        let files: Vec<UploadedFileRecord> =
            self.files.iter().filter(|f| f.email == email).cloned().collect();
        let events: Vec<UserEvent> =
            self.events.iter().filter(|e| e.email == email).cloned().collect();

        let mut timeline: Vec<TimelineEntry> =
            Vec::with_capacity(activities.len() + events.len() + files.len());
        timeline.extend(activities.iter().map(|a| TimelineEntry {
            at:    a.at,
            kind:  TimelineKind::Activity,
            label: a.description.clone(),
        }));
        timeline.extend(events.iter().map(|e| TimelineEntry {
            at:    e.at,
            kind:  TimelineKind::Event,
            label: e.kind.wire_name().to_string(),
        }));
        timeline.extend(files.iter().map(|f| TimelineEntry {
            at:    f.uploaded_at,
            kind:  TimelineKind::File,
            label: f.file_name.clone(),
        }));
        timeline.sort_by(|a, b| b.at.cmp(&a.at));

        UserHistory {
            profile: self.profiles.get(email).cloned(),
            sessions,
            activities,
            files,
            events,
            timeline,
        }
    }

    pub fn all_metrics(&self) -> MetricsReport {
        metrics::compute(
            &self.sessions,
            &self.activities,
            &self.profiles,
            &self.files,
            &self.events,
        )
    }

    pub fn sessions(&self) -> &[TrackingSession] {
        &self.sessions
    }

    pub fn activities(&self) -> &[TrackingActivity] {
        &self.activities
    }

    pub fn files(&self) -> &[UploadedFileRecord] {
        &self.files
    }

    pub fn events(&self) -> &[UserEvent] {
        &self.events
    }

    pub fn profile(&self, email: &str) -> Option<&VisitorProfile> {
        self.profiles.get(email)
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    // ── Internals ──────────────────────────────────────────────

    fn session_email(&self, session_id: &str) -> Option<Email> {
        self.sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .map(|s| s.email.clone())
    }

    fn current_or_system_session(&self) -> SessionId {
        self.current_session
            .clone()
            .unwrap_or_else(|| SYSTEM_SESSION.to_string())
    }

    fn push_event(
        &mut self,
        at: DateTime<Utc>,
        session_id: &str,
        email: &str,
        kind: EventKind,
        details: serde_json::Value,
    ) {
        self.events.push(UserEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            at,
            session_id: session_id.to_string(),
            email: email.to_string(),
            kind,
            details,
        });
    }

    /// Serialize and write all five collections. Callers go through
    /// [`Self::flush`]; this is the only fallible half.
    fn persist(&mut self) -> MarketResult<()> {
        let profile_entries: Vec<&VisitorProfile> = self.profiles.values().collect();

        let sessions = serde_json::to_string(&self.sessions)?;
        let activities = serde_json::to_string(&self.activities)?;
        let profiles = serde_json::to_string(&profile_entries)?;
        let files = serde_json::to_string(&self.files)?;
        let events = serde_json::to_string(&self.events)?;

        self.storage.save(KEY_SESSIONS, &sessions)?;
        self.storage.save(KEY_ACTIVITIES, &activities)?;
        self.storage.save(KEY_PROFILES, &profiles)?;
        self.storage.save(KEY_FILES, &files)?;
        self.storage.save(KEY_EVENTS, &events)?;
        Ok(())
    }

    /// Synchronous best-effort flush after every mutation. Errors stop
    /// here: analytics never propagates storage failures to the caller.
    fn flush(&mut self) {
        if let Err(e) = self.persist() {
            log::warn!("tracking: snapshot flush failed: {e}");
        }
    }
}

fn load_collection<T: serde::de::DeserializeOwned>(
    storage: &dyn SnapshotStore,
    key: &str,
) -> Vec<T> {
    match storage.load(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("tracking: snapshot {key} unreadable, starting empty: {e}");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            log::warn!("tracking: cannot load {key}, starting empty: {e}");
            Vec::new()
        }
    }
}
