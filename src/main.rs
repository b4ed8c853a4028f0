// StickySync - headless sync and alarm engine runner
// Starts the store, sync engine and alarm scheduler without a UI;
// alerts are logged instead of displayed.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use stickysync::alarm::{AlarmScheduler, AlarmSound, AlertHandle, AlertSink};
use stickysync::config::RemoteConfig;
use stickysync::database::{create_pool, Alarm, Note, Repository};
use stickysync::events::EventBus;
use stickysync::session::Session;
use stickysync::sync::{HttpRemote, SyncEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Logs alerts and leaves them ringing until the alarm is edited; a
/// headless process has nobody to press snooze.
struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn begin_alert(&self, note: Note, alarm: Alarm, sound: AlarmSound, handle: AlertHandle) {
        tracing::info!(
            "ALARM for note '{}' ({}) at {}, sound: {:?}",
            note.title,
            note.id,
            alarm.alarm_at,
            sound
        );
        handle.dismiss();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stickysync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting StickySync engine");

    let data_dir = std::env::var("STICKYSYNC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("stickysync-data"));
    std::fs::create_dir_all(&data_dir).context("creating data directory")?;
    let sounds_dir = data_dir.join("alarms");
    std::fs::create_dir_all(&sounds_dir).context("creating alarm sounds directory")?;

    let remote_config = RemoteConfig::load(&data_dir).await?;
    tracing::info!("Remote API: {}", remote_config.api_url);

    let pool = create_pool(&data_dir.join("stickysync.db")).await?;
    let repo = Repository::new(pool);
    let events = EventBus::default();

    let scheduler = AlarmScheduler::new(
        repo.clone(),
        events.clone(),
        Arc::new(LoggingAlertSink),
        vec![sounds_dir],
    );
    let alarm_handle = scheduler.start().await?;

    let sync_handle = match Session::load(&repo).await? {
        Some(session) => {
            let remote = Arc::new(HttpRemote::new(remote_config.api_url));
            let engine = SyncEngine::new(repo, remote, session, events);
            Some(engine.start().await?)
        }
        None => {
            tracing::warn!(
                "No active session; sync disabled. Set the active_group_id, \
                 active_user_id and active_author_id settings to enable it."
            );
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    // In-flight cycles are safe to abandon: every store write is an
    // idempotent upsert.
    alarm_handle.abort();
    if let Some(handle) = sync_handle {
        handle.abort();
    }

    Ok(())
}
