//! Engine event bus
//!
//! Broadcast channel carrying core state changes out to UI collaborators.
//! Subscribers come and go freely; emitting with no subscribers is a no-op.

use tokio::sync::broadcast;

/// State changes the engine announces to collaborators.
#[derive(Debug, Clone, serde::Serialize)]
pub enum CoreEvent {
    /// A note was merged from the remote or mutated locally. A tombstone
    /// (`deleted: true`) means "close this note's view if open"; otherwise
    /// the note is available to display.
    NoteMerged {
        note_id: String,
        title: String,
        deleted: bool,
    },
    /// A note's alarm was created, snoozed, stopped or cleared; the UI
    /// should refresh its alarm badge.
    AlarmStateChanged { note_id: String },
}

/// Clonable handle to the broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Lagging or absent subscribers never fail the caller.
    pub fn emit(&self, event: CoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
