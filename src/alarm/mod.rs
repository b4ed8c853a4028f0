//! Alarm scheduler
//!
//! Scans the store for due alarms on a fixed tick and drives alert
//! surfaces through the [`AlertSink`] contract. The due query is
//! level-triggered — it stays true every tick until the alarm is stopped
//! or snoozed — so the active-alert set is the sole thing preventing the
//! same alarm from re-alerting each second.

pub mod sound;

pub use sound::AlarmSound;

use crate::config::{ALARM_TICK_MS, SETTING_ALARM_SOUND_PATH};
use crate::database::{models, Alarm, Note, Repository};
use crate::error::{AppError, Result};
use crate::events::{CoreEvent, EventBus};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Alert surface contract. The implementor decides whether the alert is
/// shown inline in an open note view or as a standalone surface, plays
/// the resolved sound, and drives the handle from user input.
pub trait AlertSink: Send + Sync {
    fn begin_alert(&self, note: Note, alarm: Alarm, sound: AlarmSound, handle: AlertHandle);
}

/// Callbacks handed to the alert surface for one firing.
#[derive(Clone)]
pub struct AlertHandle {
    scheduler: AlarmScheduler,
    alarm: Alarm,
}

impl AlertHandle {
    pub fn note_id(&self) -> &str {
        &self.alarm.note_id
    }

    /// Reschedule the alarm `minutes` from now and release the alert.
    pub async fn snooze(&self, minutes: i64) -> Result<()> {
        self.scheduler.snooze(&self.alarm, minutes).await.map(|_| ())
    }

    /// Disable the alarm and release the alert.
    pub async fn stop(&self) -> Result<()> {
        self.scheduler.stop(&self.alarm).await.map(|_| ())
    }

    /// Release the alert without touching the alarm (surface closed).
    /// The alarm is still due, so the next tick re-alerts.
    pub fn dismiss(&self) {
        self.scheduler.release(&self.alarm.id);
    }
}

/// Periodic due-scan over the store with at-most-one concurrent alert
/// per alarm id.
#[derive(Clone)]
pub struct AlarmScheduler {
    repo: Repository,
    events: EventBus,
    sink: Arc<dyn AlertSink>,
    sound_dirs: Vec<PathBuf>,
    custom_sound: Arc<RwLock<Option<PathBuf>>>,
    active: Arc<Mutex<HashSet<String>>>,
    checking: Arc<AtomicBool>,
}

impl AlarmScheduler {
    pub fn new(
        repo: Repository,
        events: EventBus,
        sink: Arc<dyn AlertSink>,
        sound_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            repo,
            events,
            sink,
            sound_dirs,
            custom_sound: Arc::new(RwLock::new(None)),
            active: Arc::new(Mutex::new(HashSet::new())),
            checking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load the persisted custom sound and spawn the due-scan loop.
    pub async fn start(self) -> Result<JoinHandle<()>> {
        if let Some(path) = self.repo.get_setting(SETTING_ALARM_SOUND_PATH).await? {
            if !path.is_empty() {
                *self.custom_sound.write().await = Some(PathBuf::from(path));
            }
        }

        tracing::info!("Alarm scheduler starting");

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(ALARM_TICK_MS));
            loop {
                interval.tick().await;
                self.tick().await;
            }
        });

        Ok(handle)
    }

    /// Configure the custom alarm sound and persist the choice. `None`
    /// clears it back to folder resolution.
    pub async fn set_custom_sound(&self, path: Option<PathBuf>) -> Result<()> {
        let value = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.repo
            .set_setting(SETTING_ALARM_SOUND_PATH, &value)
            .await?;
        *self.custom_sound.write().await = path;
        Ok(())
    }

    /// Run one due-scan unless the previous one is still executing.
    pub async fn tick(&self) {
        if self
            .checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        match self.repo.due_alarms(models::now()).await {
            Ok(alarms) => {
                for alarm in alarms {
                    let alarm_id = alarm.id.clone();
                    if let Err(e) = self.fire(alarm).await {
                        tracing::error!("Failed to fire alarm {}: {}", alarm_id, e);
                        self.release(&alarm_id);
                    }
                }
            }
            Err(e) => tracing::error!("Due-alarm scan failed: {}", e),
        }

        self.checking.store(false, Ordering::SeqCst);
    }

    /// Begin alerting for one due alarm. The check-and-insert on the
    /// active set happens before any await, so overlapping ticks cannot
    /// double-fire the same id.
    async fn fire(&self, mut alarm: Alarm) -> Result<()> {
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if !active.insert(alarm.id.clone()) {
                return Ok(());
            }
        }

        // Orphaned alarm: the owning note is gone. Not an error.
        let Some(note) = self.repo.get_note(&alarm.note_id).await? else {
            tracing::debug!("Skipping orphaned alarm {} (note {})", alarm.id, alarm.note_id);
            self.release(&alarm.id);
            return Ok(());
        };

        // Snoozing is single-shot: consume the override now that the
        // alarm is firing again.
        if alarm.snooze_until.is_some() {
            alarm.snooze_until = None;
            alarm.updated_at = models::now();
            self.repo.upsert_alarm(&alarm).await?;
        }

        let sound = {
            let custom = self.custom_sound.read().await;
            sound::resolve(custom.as_deref(), &self.sound_dirs)
        };

        tracing::info!("Alarm {} firing for note {}", alarm.id, alarm.note_id);

        let handle = AlertHandle {
            scheduler: self.clone(),
            alarm: alarm.clone(),
        };
        self.sink.begin_alert(note, alarm, sound, handle);

        Ok(())
    }

    /// Reschedule an alarm `minutes` from now. Both `alarm_at` and
    /// `snooze_until` move to the new due time; the alert is released.
    pub async fn snooze(&self, alarm: &Alarm, minutes: i64) -> Result<Alarm> {
        if minutes <= 0 {
            return Err(AppError::InvalidSnooze(minutes));
        }

        let now = models::now();
        let new_due = snoozed_due(now, minutes);

        let mut updated = alarm.clone();
        updated.alarm_at = new_due;
        updated.snooze_until = Some(new_due);
        updated.is_enabled = true;
        updated.updated_at = now;
        self.repo.upsert_alarm(&updated).await?;

        self.events.emit(CoreEvent::AlarmStateChanged {
            note_id: updated.note_id.clone(),
        });
        self.release(&updated.id);

        tracing::info!("Alarm {} snoozed until {}", updated.id, new_due);
        Ok(updated)
    }

    /// Disable an alarm and release the alert.
    pub async fn stop(&self, alarm: &Alarm) -> Result<Alarm> {
        let mut updated = alarm.clone();
        updated.is_enabled = false;
        updated.snooze_until = None;
        updated.updated_at = models::now();
        self.repo.upsert_alarm(&updated).await?;

        self.events.emit(CoreEvent::AlarmStateChanged {
            note_id: updated.note_id.clone(),
        });
        self.release(&updated.id);

        tracing::info!("Alarm {} stopped", updated.id);
        Ok(updated)
    }

    /// Remove an id from the active-alert set.
    pub fn release(&self, alarm_id: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(alarm_id);
    }

    /// Whether an alert is currently active for this alarm.
    pub fn is_alerting(&self, alarm_id: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains(alarm_id)
    }
}

/// Snooze arithmetic: at least one second past `now`.
fn snoozed_due(now: i64, minutes: i64) -> i64 {
    now + (minutes * 60).max(1)
}
