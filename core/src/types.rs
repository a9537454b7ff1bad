//! Shared primitive types used across the marketplace core.

/// Unique identifier of one tracking session.
pub type SessionId = String;

/// Unique identifier of one uploaded-file record.
pub type FileId = String;

/// Unique identifier of one user event.
pub type EventId = String;

/// A user's email address. The canonical user key on the tracking side;
/// there is no separate numeric id.
pub type Email = String;
