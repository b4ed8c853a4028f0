//! Alarm sound resolution
//!
//! Picks which sound an alert should play. Resolution never fails: any
//! missing file or unreadable folder falls through to the system default,
//! so a sound problem can never stop an alarm from firing. Actual playback
//! is the alert surface's job.

use crate::config::{AUDIO_EXTENSIONS, PREFERRED_ALARM_FILES};
use std::path::{Path, PathBuf};

/// The sound an alert surface should play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmSound {
    File(PathBuf),
    SystemDefault,
}

/// Resolve the alarm sound:
/// 1. the configured custom file, if it exists
/// 2. a file literally named `alarm.wav`/`alarm.mp3` in a sound folder
/// 3. the first audio file with a recognized extension in a sound folder
/// 4. the system default alert
pub fn resolve(custom: Option<&Path>, folders: &[PathBuf]) -> AlarmSound {
    if let Some(custom) = custom {
        if custom.is_file() {
            return AlarmSound::File(custom.to_path_buf());
        }
    }

    for folder in folders {
        for name in PREFERRED_ALARM_FILES {
            let candidate = folder.join(name);
            if candidate.is_file() {
                return AlarmSound::File(candidate);
            }
        }

        if let Some(found) = first_audio_file(folder) {
            return AlarmSound::File(found);
        }
    }

    AlarmSound::SystemDefault
}

fn first_audio_file(folder: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(folder).ok()?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_audio_extension(path))
        .collect();

    // Directory order is filesystem-dependent; sort for a stable pick.
    candidates.sort();
    candidates.into_iter().next()
}

fn has_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
