//! Remote sync API
//!
//! Wire DTOs and the `RemoteApi` trait the sync engine talks through.
//! `HttpRemote` is the production implementation; tests substitute an
//! in-memory fake.

use crate::config::{NOTE_DEFAULT_TITLE, NOTE_EMPTY_DOCUMENT};
use crate::database::Note;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// A note event returned by `sync/updates`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteNoteEvent {
    pub event_id: Option<String>,
    pub note: Option<RemoteNote>,
}

/// The remote's view of a note. Absent or blank fields mean "no change";
/// the merge keeps the local value for them.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteNote {
    pub id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
    pub created_by_user_id: Option<String>,
    pub target_user_id: Option<String>,
    pub group_id: Option<String>,
}

/// Payload for `sync/send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendNotePayload {
    pub id: String,
    pub title: String,
    pub content: String,
    pub updated_at: i64,
    pub target_user_id: String,
    pub created_by_user_id: String,
    pub group_id: String,
    pub deleted: bool,
}

impl SendNotePayload {
    /// Build the outbound payload, defaulting a blank title and blank
    /// content so the remote never stores an empty note.
    pub fn from_note(note: &Note) -> Self {
        let title = if note.title.trim().is_empty() {
            NOTE_DEFAULT_TITLE.to_string()
        } else {
            note.title.clone()
        };
        let content = if note.content.trim().is_empty() {
            NOTE_EMPTY_DOCUMENT.to_string()
        } else {
            note.content.clone()
        };
        Self {
            id: note.id.clone(),
            title,
            content,
            updated_at: note.updated_at,
            target_user_id: note.recipient_id.clone(),
            created_by_user_id: note.author_id.clone(),
            group_id: note.group_id.clone(),
            deleted: note.deleted,
        }
    }
}

#[derive(Serialize)]
struct AckPayload<'a> {
    event_ids: &'a [String],
}

/// The remote endpoints the sync engine depends on.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// All events with timestamp greater than `since`. Empty means
    /// "nothing new".
    async fn updates(&self, since: i64) -> Result<Vec<RemoteNoteEvent>>;

    /// Acknowledge a batch of event ids. `Ok(false)` is a rejected ack,
    /// which the engine treats as non-fatal.
    async fn ack(&self, event_ids: &[String]) -> Result<bool>;

    /// Push a locally authored note. Non-2xx responses are errors the
    /// caller may retry.
    async fn send_note(&self, payload: &SendNotePayload) -> Result<()>;
}

/// reqwest-backed implementation of [`RemoteApi`].
#[derive(Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// `base_url` must end with a slash; [`crate::config::RemoteConfig`]
    /// guarantees that.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn updates(&self, since: i64) -> Result<Vec<RemoteNoteEvent>> {
        let response = self
            .client
            .get(self.url("sync/updates"))
            .query(&[("since", since)])
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }

        let response = response.error_for_status()?;
        let events: Vec<RemoteNoteEvent> = response.json().await?;
        Ok(events)
    }

    async fn ack(&self, event_ids: &[String]) -> Result<bool> {
        if event_ids.is_empty() {
            return Ok(true);
        }

        let response = self
            .client
            .post(self.url("sync/ack"))
            .json(&AckPayload { event_ids })
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn send_note(&self, payload: &SendNotePayload) -> Result<()> {
        let response = self
            .client
            .post(self.url("sync/send"))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!(
                "sync/send returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
