//! Sync engine
//!
//! Keeps the local note set eventually consistent with the remote
//! authority. One cycle pulls every event past the cursor, merges each
//! into the store last-writer-wins, then acknowledges the batch. The
//! cursor only advances as events land, so a crash mid-cycle re-pulls
//! from the last fully applied point; merges are idempotent overwrites,
//! making at-least-once redelivery safe.

pub mod remote;

pub use remote::{HttpRemote, RemoteApi, RemoteNote, RemoteNoteEvent, SendNotePayload};

use crate::config::{SETTING_LAST_SYNC, SYNC_INTERVAL_SECS};
use crate::database::{models, Note, Repository};
use crate::error::Result;
use crate::events::{CoreEvent, EventBus};
use crate::session::Session;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Periodic pull/ack engine over a [`RemoteApi`].
#[derive(Clone)]
pub struct SyncEngine {
    repo: Repository,
    remote: Arc<dyn RemoteApi>,
    session: Session,
    events: EventBus,
    cursor: Arc<Mutex<i64>>,
    running: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        repo: Repository,
        remote: Arc<dyn RemoteApi>,
        session: Session,
        events: EventBus,
    ) -> Self {
        Self {
            repo,
            remote,
            session,
            events,
            cursor: Arc::new(Mutex::new(0)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Seed the cursor and spawn the fixed-interval cycle. The returned
    /// handle is aborted on shutdown; abandoning a cycle mid-flight is
    /// safe because every store write is an idempotent upsert.
    pub async fn start(self) -> Result<JoinHandle<()>> {
        let since = self.initialize_cursor().await?;
        tracing::info!("Sync engine starting, cursor seeded at {}", since);

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(SYNC_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.tick().await;
            }
        });

        Ok(handle)
    }

    /// Seed the cursor from the newest locally known note, or from now on
    /// a fresh install. Bounds the first pull so a client that already has
    /// local data never replays its own history.
    pub async fn initialize_cursor(&self) -> Result<i64> {
        let since = match self.repo.latest_note_timestamp().await? {
            Some(latest) => latest,
            None => models::now(),
        };
        *self.cursor.lock().await = since;
        Ok(since)
    }

    /// Current cursor value.
    pub async fn last_sync(&self) -> i64 {
        *self.cursor.lock().await
    }

    /// Run one cycle unless the previous one is still in flight. Any
    /// failure is logged and dropped; the next tick is the retry.
    pub async fn tick(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Sync cycle still running, skipping tick");
            return;
        }

        if let Err(e) = self.run_cycle().await {
            tracing::error!("Sync cycle failed: {}", e);
        }

        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) -> Result<()> {
        let since = *self.cursor.lock().await;
        let updates = self.remote.updates(since).await?;
        if updates.is_empty() {
            return Ok(());
        }

        tracing::debug!("Pulled {} events since {}", updates.len(), since);

        let mut ack_ids = Vec::new();
        for event in updates {
            let Some(remote_note) = event.note else {
                continue;
            };

            let merged = self.apply_remote_note(&remote_note).await?;
            self.advance_cursor(remote_note.updated_at).await?;

            let ack_id = match event.event_id {
                Some(id) if !id.trim().is_empty() => id,
                _ => merged.id.clone(),
            };
            ack_ids.push(ack_id);

            self.events.emit(CoreEvent::NoteMerged {
                note_id: merged.id.clone(),
                title: merged.title.clone(),
                deleted: merged.deleted,
            });
        }

        if ack_ids.is_empty() {
            return Ok(());
        }

        // Ack failure is accepted: the events are already applied and
        // idempotent, so redelivery beats rollback.
        match self.remote.ack(&ack_ids).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Remote rejected ack of {} events", ack_ids.len()),
            Err(e) => tracing::warn!("Failed to ack {} events: {}", ack_ids.len(), e),
        }

        Ok(())
    }

    /// Last-writer-wins merge at whole-note granularity: non-blank remote
    /// fields overwrite, local values survive only where the remote is
    /// absent or blank.
    async fn apply_remote_note(&self, remote: &RemoteNote) -> Result<Note> {
        let mut note = match self.repo.get_note(&remote.id).await? {
            Some(existing) => existing,
            None => {
                let mut materialized = Note::new(
                    remote.group_id.as_deref().unwrap_or(&self.session.group_id),
                    remote
                        .target_user_id
                        .as_deref()
                        .unwrap_or(&self.session.user_id),
                    remote
                        .created_by_user_id
                        .as_deref()
                        .unwrap_or(&self.session.author_id),
                );
                materialized.id = remote.id.clone();
                materialized
            }
        };

        if let Some(title) = &remote.title {
            if !title.trim().is_empty() {
                note.title = title.clone();
            }
        }
        if let Some(content) = &remote.content {
            if !content.trim().is_empty() {
                note.content = content.clone();
            }
        }
        note.updated_at = if remote.updated_at == 0 {
            models::now()
        } else {
            remote.updated_at
        };
        note.deleted = remote.deleted;
        if let Some(recipient) = &remote.target_user_id {
            note.recipient_id = recipient.clone();
        }
        if let Some(author) = &remote.created_by_user_id {
            note.author_id = author.clone();
        }
        if let Some(group) = &remote.group_id {
            note.group_id = group.clone();
        }

        self.repo.upsert_note(&note).await?;
        Ok(note)
    }

    /// Advance the cursor monotonically and persist it.
    async fn advance_cursor(&self, event_timestamp: i64) -> Result<()> {
        let mut cursor = self.cursor.lock().await;
        if event_timestamp > *cursor {
            *cursor = event_timestamp;
            self.repo
                .set_setting(SETTING_LAST_SYNC, &cursor.to_string())
                .await?;
        }
        Ok(())
    }

    /// Push a locally authored note to the remote.
    pub async fn push_note(&self, note: &Note) -> Result<()> {
        self.remote
            .send_note(&SendNotePayload::from_note(note))
            .await
    }
}
