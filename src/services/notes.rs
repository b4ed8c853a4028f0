//! Notes service
//!
//! Note lifecycle for UI collaborators: creation (with best-effort push
//! to the remote when the note targets another user), debounced saves
//! during continuous typing/dragging, alarm upsert-by-note, lock
//! handling and cascading delete.

use crate::config::SAVE_DEBOUNCE_MS;
use crate::crypto;
use crate::database::{models, Alarm, Note, Repository};
use crate::error::{AppError, Result};
use crate::events::{CoreEvent, EventBus};
use crate::session::Session;
use crate::sync::{RemoteApi, SendNotePayload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Options for creating a note. Everything is optional; defaults come
/// from the session and the standard note template.
#[derive(Debug, Default)]
pub struct CreateNoteOptions {
    /// Target user; defaults to the session's active user.
    pub recipient_id: Option<String>,
    pub title: Option<String>,
    pub initial_text: Option<String>,
    /// Attach an alarm firing at this epoch second.
    pub alarm_at: Option<i64>,
}

/// Result of a note creation. `push_warning` carries a non-fatal message
/// when the outbound push failed; the note is durable locally either way.
#[derive(Debug)]
pub struct CreateNoteOutcome {
    pub note: Note,
    pub push_warning: Option<String>,
}

/// Service for managing notes.
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    remote: Arc<dyn RemoteApi>,
    session: Session,
    events: EventBus,
    pending: Arc<Mutex<HashMap<String, Note>>>,
}

impl NotesService {
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
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create and persist a note. When the recipient is not the author,
    /// the note is pushed to the remote; a push failure is surfaced as a
    /// warning on the outcome, never an error — local durability does not
    /// depend on remote reachability.
    pub async fn create_note(&self, opts: CreateNoteOptions) -> Result<CreateNoteOutcome> {
        let recipient_id = opts
            .recipient_id
            .unwrap_or_else(|| self.session.user_id.clone());

        let mut note = Note::new(&self.session.group_id, &recipient_id, &self.session.author_id);
        if let Some(title) = opts.title {
            if !title.trim().is_empty() {
                note.title = title.trim().to_string();
            }
        }
        if let Some(text) = opts.initial_text {
            if !text.trim().is_empty() {
                note.content = text;
            }
        }

        self.repo.upsert_note(&note).await?;
        tracing::info!("Created note {} for {}", note.id, recipient_id);

        let push_warning = if !recipient_id.eq_ignore_ascii_case(&self.session.author_id) {
            match self.remote.send_note(&SendNotePayload::from_note(&note)).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!("Failed to push note {}: {}", note.id, e);
                    Some(format!(
                        "Note saved locally but could not be sent to the server: {}",
                        e
                    ))
                }
            }
        } else {
            None
        };

        if let Some(alarm_at) = opts.alarm_at {
            note = self.set_alarm(&note.id, alarm_at).await?;
        }

        self.events.emit(CoreEvent::NoteMerged {
            note_id: note.id.clone(),
            title: note.title.clone(),
            deleted: false,
        });

        Ok(CreateNoteOutcome { note, push_warning })
    }

    /// Fetch a note by id, tombstones included.
    pub async fn get_note(&self, id: &str) -> Result<Note> {
        self.repo
            .get_note(id)
            .await?
            .ok_or_else(|| AppError::NoteNotFound(id.to_string()))
    }

    /// All visible notes in the session's group.
    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        self.repo.list_notes(Some(&self.session.group_id)).await
    }

    // ===== Debounced saves =====

    /// Queue a note write. Repeated queues for the same note coalesce;
    /// the newest version wins when the flusher runs. The contract is
    /// only that a queued write eventually lands.
    pub fn queue_save(&self, mut note: Note) {
        note.updated_at = models::now();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(note.id.clone(), note);
    }

    /// Persist everything queued. Returns how many notes were written.
    pub async fn flush(&self) -> Result<usize> {
        let drained: Vec<Note> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain().map(|(_, note)| note).collect()
        };

        for note in &drained {
            self.repo.upsert_note(note).await?;
        }

        if !drained.is_empty() {
            tracing::debug!("Flushed {} debounced note writes", drained.len());
        }
        Ok(drained.len())
    }

    /// Spawn the background flusher. Abort the handle on shutdown after a
    /// final [`flush`](Self::flush).
    pub fn start_flusher(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(SAVE_DEBOUNCE_MS));
            loop {
                interval.tick().await;
                if let Err(e) = service.flush().await {
                    tracing::error!("Debounced flush failed: {}", e);
                }
            }
        })
    }

    // ===== Alarms =====

    /// Set the alarm for a note, reusing the existing row so a note never
    /// accumulates duplicates. Keeps the note's denormalized alarm fields
    /// in step and returns the updated note.
    pub async fn set_alarm(&self, note_id: &str, alarm_at: i64) -> Result<Note> {
        let mut note = self.get_note(note_id).await?;

        let now = models::now();
        let alarm = match self.repo.get_alarm_for_note(note_id).await? {
            Some(mut existing) => {
                existing.alarm_at = alarm_at;
                existing.snooze_until = None;
                existing.is_enabled = true;
                existing.updated_at = now;
                existing
            }
            None => Alarm::new(note_id, alarm_at),
        };
        self.repo.upsert_alarm(&alarm).await?;

        note.alarm_enabled = true;
        note.alarm_time = alarm_at;
        note.updated_at = now;
        self.repo.upsert_note(&note).await?;

        self.events.emit(CoreEvent::AlarmStateChanged {
            note_id: note_id.to_string(),
        });

        Ok(note)
    }

    /// Remove a note's alarm and clear the denormalized fields.
    pub async fn clear_alarm(&self, note_id: &str) -> Result<Note> {
        let mut note = self.get_note(note_id).await?;

        self.repo.delete_alarms_for_note(note_id).await?;

        note.alarm_enabled = false;
        note.alarm_time = 0;
        note.updated_at = models::now();
        self.repo.upsert_note(&note).await?;

        self.events.emit(CoreEvent::AlarmStateChanged {
            note_id: note_id.to_string(),
        });

        Ok(note)
    }

    // ===== Locking =====

    /// Lock a note behind a password.
    pub async fn lock_note(&self, note_id: &str, password: &str) -> Result<Note> {
        let mut note = self.get_note(note_id).await?;
        note.locked = true;
        note.lock_password = Some(crypto::hash_password(password));
        note.updated_at = models::now();
        self.repo.upsert_note(&note).await?;
        Ok(note)
    }

    /// Check a password attempt against a note's lock.
    pub async fn verify_lock(&self, note_id: &str, password: &str) -> Result<bool> {
        let note = self.get_note(note_id).await?;
        Ok(match &note.lock_password {
            Some(hash) => crypto::verify_password(password, hash),
            None => true,
        })
    }

    /// Remove a note's lock, given the correct password.
    pub async fn remove_lock(&self, note_id: &str, password: &str) -> Result<Note> {
        if !self.verify_lock(note_id, password).await? {
            return Err(AppError::Generic("Incorrect lock password".to_string()));
        }
        let mut note = self.get_note(note_id).await?;
        note.locked = false;
        note.lock_password = None;
        note.updated_at = models::now();
        self.repo.upsert_note(&note).await?;
        Ok(note)
    }

    // ===== Deletion =====

    /// Tombstone a note so the deletion propagates through sync, and
    /// physically remove its images and alarms.
    pub async fn delete_note(&self, id: &str) -> Result<()> {
        let note = self.get_note(id).await?;

        self.repo.soft_delete_note(id, models::now()).await?;
        self.repo.delete_images_for_note(id).await?;
        self.repo.delete_alarms_for_note(id).await?;

        self.events.emit(CoreEvent::NoteMerged {
            note_id: id.to_string(),
            title: note.title,
            deleted: true,
        });

        tracing::info!("Deleted note {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, NoteImage};
    use crate::sync::{RemoteNoteEvent, SendNotePayload};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;

    #[derive(Default)]
    struct FakeRemote {
        sends: Mutex<Vec<SendNotePayload>>,
        fail_send: Mutex<bool>,
    }

    #[async_trait]
    impl RemoteApi for FakeRemote {
        async fn updates(&self, _since: i64) -> Result<Vec<RemoteNoteEvent>> {
            Ok(Vec::new())
        }

        async fn ack(&self, _event_ids: &[String]) -> Result<bool> {
            Ok(true)
        }

        async fn send_note(&self, payload: &SendNotePayload) -> Result<()> {
            if *self.fail_send.lock().unwrap() {
                return Err(AppError::Remote("connection refused".to_string()));
            }
            self.sends.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    async fn create_test_service() -> (NotesService, Arc<FakeRemote>, Repository) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        initialize_database(&pool).await.unwrap();
        let repo = Repository::new(pool);
        let remote = Arc::new(FakeRemote::default());
        let session = Session::new("g1".to_string(), "u2".to_string(), "u1".to_string()).unwrap();
        let service = NotesService::new(
            repo.clone(),
            remote.clone(),
            session,
            EventBus::default(),
        );
        (service, remote, repo)
    }

    #[tokio::test]
    async fn test_personal_note_is_not_pushed() {
        let (service, remote, _repo) = create_test_service().await;

        let outcome = service
            .create_note(CreateNoteOptions {
                recipient_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.push_warning.is_none());
        assert!(remote.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_note_for_other_user_is_pushed() {
        let (service, remote, _repo) = create_test_service().await;

        let outcome = service
            .create_note(CreateNoteOptions {
                recipient_id: Some("u2".to_string()),
                title: Some("Lunch".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.push_warning.is_none());
        let sends = remote.sends.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].target_user_id, "u2");
        assert_eq!(sends[0].created_by_user_id, "u1");
        assert_eq!(sends[0].title, "Lunch");
    }

    #[tokio::test]
    async fn test_push_failure_keeps_note_and_warns() {
        let (service, remote, _repo) = create_test_service().await;
        *remote.fail_send.lock().unwrap() = true;

        let outcome = service
            .create_note(CreateNoteOptions {
                recipient_id: Some("u2".to_string()),
                initial_text: Some("call the plumber".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.push_warning.is_some());

        // Local durability is untouched by the network failure.
        let stored = service.get_note(&outcome.note.id).await.unwrap();
        assert_eq!(stored.content, "call the plumber");
    }

    #[tokio::test]
    async fn test_create_with_alarm_sets_denormalized_fields() {
        let (service, _remote, repo) = create_test_service().await;
        let fire_at = models::now() + 3600;

        let outcome = service
            .create_note(CreateNoteOptions {
                alarm_at: Some(fire_at),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(outcome.note.alarm_enabled);
        assert_eq!(outcome.note.alarm_time, fire_at);

        let alarm = repo
            .get_alarm_for_note(&outcome.note.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alarm.alarm_at, fire_at);
        assert!(alarm.is_enabled);
    }

    #[tokio::test]
    async fn test_set_alarm_reuses_existing_row() {
        let (service, _remote, repo) = create_test_service().await;
        let outcome = service.create_note(CreateNoteOptions::default()).await.unwrap();

        service.set_alarm(&outcome.note.id, 1000).await.unwrap();
        let first = repo
            .get_alarm_for_note(&outcome.note.id)
            .await
            .unwrap()
            .unwrap();

        service.set_alarm(&outcome.note.id, 2000).await.unwrap();
        let second = repo
            .get_alarm_for_note(&outcome.note.id)
            .await
            .unwrap()
            .unwrap();

        // Upsert by note: same row, new fire time, snooze consumed.
        assert_eq!(first.id, second.id);
        assert_eq!(second.alarm_at, 2000);
        assert!(second.snooze_until.is_none());
    }

    #[tokio::test]
    async fn test_clear_alarm() {
        let (service, _remote, repo) = create_test_service().await;
        let outcome = service
            .create_note(CreateNoteOptions {
                alarm_at: Some(models::now() + 60),
                ..Default::default()
            })
            .await
            .unwrap();

        let note = service.clear_alarm(&outcome.note.id).await.unwrap();
        assert!(!note.alarm_enabled);
        assert_eq!(note.alarm_time, 0);
        assert!(repo
            .get_alarm_for_note(&outcome.note.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_debounced_saves_coalesce() {
        let (service, _remote, _repo) = create_test_service().await;
        let outcome = service.create_note(CreateNoteOptions::default()).await.unwrap();

        let mut draft = outcome.note.clone();
        draft.content = "first keystroke".to_string();
        service.queue_save(draft.clone());
        draft.content = "second keystroke".to_string();
        service.queue_save(draft);

        // One coalesced write, last version wins.
        assert_eq!(service.flush().await.unwrap(), 1);
        let stored = service.get_note(&outcome.note.id).await.unwrap();
        assert_eq!(stored.content, "second keystroke");

        // Nothing left pending.
        assert_eq!(service.flush().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_background_flusher_lands_writes() {
        let (service, _remote, _repo) = create_test_service().await;
        let outcome = service.create_note(CreateNoteOptions::default()).await.unwrap();

        let mut draft = outcome.note.clone();
        draft.title = "flushed".to_string();
        service.queue_save(draft);

        let flusher = service.start_flusher();
        tokio::time::sleep(tokio::time::Duration::from_millis(SAVE_DEBOUNCE_MS * 3)).await;
        flusher.abort();

        let stored = service.get_note(&outcome.note.id).await.unwrap();
        assert_eq!(stored.title, "flushed");
    }

    #[tokio::test]
    async fn test_delete_note_cascades() {
        let (service, _remote, repo) = create_test_service().await;
        let outcome = service
            .create_note(CreateNoteOptions {
                alarm_at: Some(models::now() + 60),
                ..Default::default()
            })
            .await
            .unwrap();
        let note_id = outcome.note.id.clone();

        repo.upsert_image(&NoteImage {
            id: models::new_id(),
            note_id: note_id.clone(),
            path: Some("images/pic.png".to_string()),
            order_index: 0,
            duration: 0,
            created_at: models::now(),
        })
        .await
        .unwrap();

        service.delete_note(&note_id).await.unwrap();

        // Tombstone survives; children are physically gone.
        let stored = service.get_note(&note_id).await.unwrap();
        assert!(stored.deleted);
        assert!(service.list_notes().await.unwrap().is_empty());
        assert!(repo.list_images(&note_id).await.unwrap().is_empty());
        assert!(repo.get_alarm_for_note(&note_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_verify_and_remove() {
        let (service, _remote, _repo) = create_test_service().await;
        let outcome = service.create_note(CreateNoteOptions::default()).await.unwrap();
        let id = outcome.note.id;

        let note = service.lock_note(&id, "pw").await.unwrap();
        assert!(note.locked);

        assert!(service.verify_lock(&id, "pw").await.unwrap());
        assert!(!service.verify_lock(&id, "nope").await.unwrap());

        assert!(service.remove_lock(&id, "nope").await.is_err());
        let note = service.remove_lock(&id, "pw").await.unwrap();
        assert!(!note.locked);
        assert!(note.lock_password.is_none());
    }
}
