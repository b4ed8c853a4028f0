//! Repository layer for database operations
//!
//! Idempotent upserts keyed by primary id (`INSERT .. ON CONFLICT DO
//! UPDATE`) plus the auxiliary queries the sync engine and alarm scheduler
//! run. The pool serializes conflicting writes to the same row; callers
//! read-modify-write through here and hold no private copies.

use super::models::*;
use crate::error::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Repository for database operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ===== Users =====

    /// Insert or fully overwrite a user.
    pub async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, password_hash, is_admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                email=excluded.email,
                phone=excluded.phone,
                password_hash=excluded.password_hash,
                is_admin=excluded.is_admin,
                created_at=excluded.created_at,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Groups =====

    pub async fn upsert_group(&self, group: &Group) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO groups (id, name, description, joined_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name=excluded.name,
                description=excluded.description,
                joined_at=excluded.joined_at,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.joined_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_group(&self, id: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(group)
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let groups = sqlx::query_as::<_, Group>("SELECT * FROM groups")
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    pub async fn delete_group(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Notes =====

    /// Insert or fully overwrite a note. Safe to call repeatedly with
    /// identical data; sync merges rely on this being a pure overwrite.
    pub async fn upsert_note(&self, note: &Note) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notes (id, local_id, server_id, title, content, color, theme,
                               x, y, width, height, locked, lock_password,
                               alarm_enabled, alarm_time, deleted, created_at, updated_at,
                               group_id, author_id, recipient_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                local_id=excluded.local_id,
                server_id=excluded.server_id,
                title=excluded.title,
                content=excluded.content,
                color=excluded.color,
                theme=excluded.theme,
                x=excluded.x,
                y=excluded.y,
                width=excluded.width,
                height=excluded.height,
                locked=excluded.locked,
                lock_password=excluded.lock_password,
                alarm_enabled=excluded.alarm_enabled,
                alarm_time=excluded.alarm_time,
                deleted=excluded.deleted,
                created_at=excluded.created_at,
                updated_at=excluded.updated_at,
                group_id=excluded.group_id,
                author_id=excluded.author_id,
                recipient_id=excluded.recipient_id
            "#,
        )
        .bind(&note.id)
        .bind(&note.local_id)
        .bind(&note.server_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.color)
        .bind(&note.theme)
        .bind(note.x)
        .bind(note.y)
        .bind(note.width)
        .bind(note.height)
        .bind(note.locked)
        .bind(&note.lock_password)
        .bind(note.alarm_enabled)
        .bind(note.alarm_time)
        .bind(note.deleted)
        .bind(note.created_at)
        .bind(note.updated_at)
        .bind(&note.group_id)
        .bind(&note.author_id)
        .bind(&note.recipient_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Upserted note: {}", note.id);
        Ok(())
    }

    /// Fetch a note by id, tombstones included.
    pub async fn get_note(&self, id: &str) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    /// All non-deleted notes, optionally filtered by group.
    pub async fn list_notes(&self, group_id: Option<&str>) -> Result<Vec<Note>> {
        let notes = match group_id {
            Some(group_id) => {
                sqlx::query_as::<_, Note>(
                    "SELECT * FROM notes WHERE deleted = 0 AND group_id = ?",
                )
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE deleted = 0")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(notes)
    }

    /// Tombstone a note. Never a physical delete, so the deletion
    /// propagates through sync.
    pub async fn soft_delete_note(&self, id: &str, updated_at: i64) -> Result<()> {
        sqlx::query("UPDATE notes SET deleted = 1, updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Soft deleted note: {}", id);
        Ok(())
    }

    /// Greatest `updated_at` across all locally known notes, tombstones
    /// included. Seeds the sync cursor at startup.
    pub async fn latest_note_timestamp(&self) -> Result<Option<i64>> {
        let latest: Option<i64> = sqlx::query_scalar("SELECT MAX(updated_at) FROM notes")
            .fetch_one(&self.pool)
            .await?;
        Ok(latest)
    }

    // ===== Note images =====

    pub async fn upsert_image(&self, image: &NoteImage) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO note_images (id, note_id, path, order_index, duration, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                note_id=excluded.note_id,
                path=excluded.path,
                order_index=excluded.order_index,
                duration=excluded.duration,
                created_at=excluded.created_at
            "#,
        )
        .bind(&image.id)
        .bind(&image.note_id)
        .bind(&image.path)
        .bind(image.order_index)
        .bind(image.duration)
        .bind(image.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_images(&self, note_id: &str) -> Result<Vec<NoteImage>> {
        let images = sqlx::query_as::<_, NoteImage>(
            "SELECT * FROM note_images WHERE note_id = ? ORDER BY order_index",
        )
        .bind(note_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    pub async fn delete_image(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM note_images WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_images_for_note(&self, note_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM note_images WHERE note_id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Alarms =====

    pub async fn upsert_alarm(&self, alarm: &Alarm) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alarms (id, note_id, alarm_at, snooze_until, is_enabled, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                note_id=excluded.note_id,
                alarm_at=excluded.alarm_at,
                snooze_until=excluded.snooze_until,
                is_enabled=excluded.is_enabled,
                created_at=excluded.created_at,
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&alarm.id)
        .bind(&alarm.note_id)
        .bind(alarm.alarm_at)
        .bind(alarm.snooze_until)
        .bind(alarm.is_enabled)
        .bind(alarm.created_at)
        .bind(alarm.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Upserted alarm: {} for note: {}", alarm.id, alarm.note_id);
        Ok(())
    }

    /// The alarm for a note, if any. The service upserts by note, so at
    /// most one row exists per note in steady state.
    pub async fn get_alarm_for_note(&self, note_id: &str) -> Result<Option<Alarm>> {
        let alarm = sqlx::query_as::<_, Alarm>("SELECT * FROM alarms WHERE note_id = ? LIMIT 1")
            .bind(note_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alarm)
    }

    /// All alarms satisfying the due invariant: enabled, and either the
    /// plain fire time or the snooze override has passed.
    pub async fn due_alarms(&self, now: i64) -> Result<Vec<Alarm>> {
        let alarms = sqlx::query_as::<_, Alarm>(
            r#"
            SELECT * FROM alarms
            WHERE is_enabled = 1
              AND (
                    (snooze_until IS NULL AND alarm_at <= ?)
                    OR (snooze_until IS NOT NULL AND snooze_until <= ?)
                  )
            "#,
        )
        .bind(now)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(alarms)
    }

    pub async fn delete_alarm(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM alarms WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_alarms_for_note(&self, note_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM alarms WHERE note_id = ?")
            .bind(note_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Settings =====

    /// Single KV slot, last write wins.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = ? LIMIT 1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    pub async fn list_settings(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, Setting>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|s| (s.key, s.value)).collect())
    }
}
