//! Database models
//!
//! Rust structs representing locally stored entities. All persisted
//! timestamps are epoch seconds; ids are opaque strings (uuid v4 for rows
//! created on this client, remote-assigned ids accepted verbatim).

use crate::config;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Current time as epoch seconds.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Generate a new opaque row id.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A registered user, mirrored from remote registration.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A note-sharing group this client has joined.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub joined_at: i64,
    pub updated_at: i64,
}

/// A sticky note. Content is an opaque string the engine never interprets.
/// `deleted` is a tombstone: rows are never physically removed so deletions
/// propagate through sync.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: String,
    pub local_id: Option<String>,
    pub server_id: Option<String>,
    pub title: String,
    pub content: String,
    pub color: String,
    pub theme: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub locked: bool,
    pub lock_password: Option<String>,
    pub alarm_enabled: bool,
    /// Denormalized copy of the alarm fire time for display.
    pub alarm_time: i64,
    pub deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub group_id: String,
    pub author_id: String,
    pub recipient_id: String,
}

impl Note {
    /// Build a new note with default geometry, colors and content.
    pub fn new(group_id: &str, recipient_id: &str, author_id: &str) -> Self {
        let now = now();
        Self {
            id: new_id(),
            local_id: None,
            server_id: None,
            title: config::NOTE_DEFAULT_TITLE.to_string(),
            content: config::NOTE_EMPTY_DOCUMENT.to_string(),
            color: config::NOTE_BACKGROUND_HEX.to_string(),
            theme: config::NOTE_BORDER_HEX.to_string(),
            x: config::NOTE_DEFAULT_X,
            y: config::NOTE_DEFAULT_Y,
            width: config::NOTE_DEFAULT_WIDTH,
            height: config::NOTE_DEFAULT_HEIGHT,
            locked: false,
            lock_password: None,
            alarm_enabled: false,
            alarm_time: 0,
            deleted: false,
            created_at: now,
            updated_at: now,
            group_id: group_id.to_string(),
            author_id: author_id.to_string(),
            recipient_id: recipient_id.to_string(),
        }
    }
}

/// An image attached to a note, stored as an opaque file path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NoteImage {
    pub id: String,
    pub note_id: String,
    pub path: Option<String>,
    pub order_index: i64,
    pub duration: i64,
    pub created_at: i64,
}

/// A per-note alarm. `snooze_until`, when set, overrides `alarm_at` for
/// due detection and is consumed the next time the alarm fires.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alarm {
    pub id: String,
    pub note_id: String,
    pub alarm_at: i64,
    pub snooze_until: Option<i64>,
    pub is_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Alarm {
    pub fn new(note_id: &str, alarm_at: i64) -> Self {
        let now = now();
        Self {
            id: new_id(),
            note_id: note_id.to_string(),
            alarm_at,
            snooze_until: None,
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The due invariant: enabled, and either the plain fire time or the
    /// snooze override has passed.
    pub fn is_due(&self, now: i64) -> bool {
        if !self.is_enabled {
            return false;
        }
        match self.snooze_until {
            Some(snooze) => snooze <= now,
            None => self.alarm_at <= now,
        }
    }
}

/// A process-wide key/value setting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
