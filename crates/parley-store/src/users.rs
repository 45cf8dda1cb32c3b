//! Identity directory: maps external identity keys to internal [`User`]s.

use rusqlite::{params, OptionalExtension, Row};

use parley_shared::types::UserId;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::sql::{micros, time_at, uuid_at};

/// Column list matching [`user_from_row`]. Callers joining `users` under an
/// alias use [`user_columns`] instead.
const USER_COLUMNS: &str = "id, identity_key, name, email, avatar_url, is_online, created_at";

pub(crate) fn user_columns(alias: &str) -> String {
    USER_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Database {
    /// Create the user for `identity_key`, or refresh it if it already exists.
    ///
    /// An existing record gets the new name and avatar and is marked online;
    /// its email and id are kept. New records start online.
    pub fn upsert_user(
        &self,
        identity_key: &str,
        name: &str,
        email: &str,
        avatar_url: &str,
    ) -> Result<UserId> {
        if identity_key.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "identity key must not be empty".into(),
            ));
        }

        let candidate = UserId::new();
        let id = self.conn().query_row(
            "INSERT INTO users (id, identity_key, name, email, avatar_url, is_online, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
             ON CONFLICT(identity_key) DO UPDATE SET
                 name = excluded.name,
                 avatar_url = excluded.avatar_url,
                 is_online = 1
             RETURNING id",
            params![
                candidate.to_string(),
                identity_key,
                name,
                email,
                avatar_url,
                micros(self.now()),
            ],
            |row| uuid_at(row, 0).map(UserId),
        )?;

        if id == candidate {
            tracing::info!(user = %id, "registered new user");
        } else {
            tracing::debug!(user = %id, "refreshed existing user");
        }
        Ok(id)
    }

    /// Flip the online flag. Unknown identity keys are ignored; returns
    /// whether a user was updated.
    pub fn set_online_status(&self, identity_key: &str, is_online: bool) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET is_online = ?2 WHERE identity_key = ?1",
            params![identity_key, is_online],
        )?;
        Ok(affected > 0)
    }

    /// Every user except the caller, in registration order.
    ///
    /// `search`, when given, keeps only users whose name contains it
    /// (case-insensitive).
    pub fn list_other_users(
        &self,
        exclude_identity_key: &str,
        search: Option<&str>,
    ) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE identity_key <> ?1
             ORDER BY created_at ASC, rowid ASC"
        ))?;

        let rows = stmt.query_map(params![exclude_identity_key], |row| user_from_row(row, 0))?;

        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut users = Vec::new();
        for row in rows {
            let user = row?;
            match &needle {
                Some(n) if !user.name.to_lowercase().contains(n.as_str()) => {}
                _ => users.push(user),
            }
        }
        Ok(users)
    }

    pub fn get_user_by_identity(&self, identity_key: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE identity_key = ?1"),
                params![identity_key],
                |row| user_from_row(row, 0),
            )
            .optional()?)
    }

    pub fn get_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                |row| user_from_row(row, 0),
            )
            .optional()?)
    }

    pub(crate) fn require_user(&self, id: UserId) -> Result<User> {
        self.get_user(id)?
            .ok_or_else(|| StoreError::InvalidArgument(format!("unknown user {id}")))
    }
}

/// Map the seven user columns starting at `base` to a [`User`].
pub(crate) fn user_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(uuid_at(row, base)?),
        identity_key: row.get(base + 1)?,
        name: row.get(base + 2)?,
        email: row.get(base + 3)?,
        avatar_url: row.get(base + 4)?,
        is_online: row.get(base + 5)?,
        created_at: time_at(row, base + 6)?,
    })
}
