//! Session context
//!
//! The active group and user identities for this client install. Passed
//! explicitly into the sync engine and the notes service instead of living
//! in process-wide globals, so tests can run isolated sessions side by side.

use crate::config::{SETTING_ACTIVE_AUTHOR_ID, SETTING_ACTIVE_GROUP_ID, SETTING_ACTIVE_USER_ID};
use crate::database::Repository;
use crate::error::{AppError, Result};

/// Active session identities: the group being displayed, the default
/// recipient for new notes, and the authoring user.
#[derive(Debug, Clone)]
pub struct Session {
    pub group_id: String,
    pub user_id: String,
    pub author_id: String,
}

impl Session {
    pub fn new(group_id: String, user_id: String, author_id: String) -> Result<Self> {
        if group_id.trim().is_empty() {
            return Err(AppError::SessionNotReady("no active group".to_string()));
        }
        if user_id.trim().is_empty() || author_id.trim().is_empty() {
            return Err(AppError::SessionNotReady("no active user".to_string()));
        }
        Ok(Self {
            group_id,
            user_id,
            author_id,
        })
    }

    /// Load the persisted session, if one has been activated on this install.
    pub async fn load(repo: &Repository) -> Result<Option<Self>> {
        let group_id = repo.get_setting(SETTING_ACTIVE_GROUP_ID).await?;
        let user_id = repo.get_setting(SETTING_ACTIVE_USER_ID).await?;
        let author_id = repo.get_setting(SETTING_ACTIVE_AUTHOR_ID).await?;

        match (group_id, user_id, author_id) {
            (Some(g), Some(u), Some(a)) => Ok(Some(Self::new(g, u, a)?)),
            _ => Ok(None),
        }
    }

    /// Persist this session as the active one.
    pub async fn save(&self, repo: &Repository) -> Result<()> {
        repo.set_setting(SETTING_ACTIVE_GROUP_ID, &self.group_id)
            .await?;
        repo.set_setting(SETTING_ACTIVE_USER_ID, &self.user_id)
            .await?;
        repo.set_setting(SETTING_ACTIVE_AUTHOR_ID, &self.author_id)
            .await?;
        Ok(())
    }
}
