use chrono::{DateTime, Utc};
use rusqlite::params;

use murmur_shared::types::{UserId, UserProfile};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::UserAccount;

impl Database {
    pub fn insert_user(&self, account: &UserAccount) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, username, display_name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.id.to_string(),
                    account.username,
                    account.display_name,
                    account.password_hash,
                    account.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::UsernameTaken
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    pub fn get_user_by_id(&self, id: UserId) -> Result<UserAccount> {
        self.conn()
            .query_row(
                "SELECT id, username, display_name, password_hash, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_account,
            )
            .map_err(not_found)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<UserAccount> {
        self.conn()
            .query_row(
                "SELECT id, username, display_name, password_hash, created_at
                 FROM users WHERE username = ?1",
                params![username],
                row_to_account,
            )
            .map_err(not_found)
    }

    /// All users except the given one, as the roster shown to that user.
    pub fn list_users_except(&self, caller: UserId) -> Result<Vec<UserProfile>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, username, display_name, password_hash, created_at
             FROM users
             WHERE id != ?1
             ORDER BY username",
        )?;

        let rows = stmt.query_map(params![caller.to_string()], row_to_account)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.profile());
        }
        Ok(users)
    }
}

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
    let id_str: String = row.get(0)?;
    let username: String = row.get(1)?;
    let display_name: Option<String> = row.get(2)?;
    let password_hash: String = row.get(3)?;
    let ts_str: String = row.get(4)?;

    let id = UserId::parse(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserAccount {
        id,
        username,
        display_name,
        password_hash,
        created_at,
    })
}
