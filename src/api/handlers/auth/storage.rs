//! User persistence.
//!
//! [`UserStore`] is implemented by [`PgUserStore`] (sqlx, PostgreSQL) and by
//! [`MemoryUserStore`], which the server falls back to when no DSN is given.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row};
use std::{collections::HashMap, future::Future, pin::Pin};
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};
use ulid::Ulid;

use super::types::UserResponse;

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

pub const DEFAULT_TIER: &str = "free";

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<Vec<u8>>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub tier: String,
    pub settings: serde_json::Value,
}

impl User {
    /// New active user on the default tier with a fresh ULID.
    #[must_use]
    pub fn new(email: String, name: String, hashed_password: String) -> Self {
        Self {
            id: Ulid::new().to_string(),
            email,
            name,
            hashed_password,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
            reset_token_hash: None,
            reset_token_expiry: None,
            tier: DEFAULT_TIER.to_string(),
            settings: serde_json::json!({}),
        }
    }

    #[must_use]
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            tier: self.tier.clone(),
        }
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    Conflict,
}

pub trait UserStore: Send + Sync {
    /// Reachability check used by `/health`.
    fn ping(&self) -> StoreFuture<'_, ()>;

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>>;

    fn find_by_id<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<User>>;

    /// Insert `user`, reporting a conflict when the email is taken.
    fn create_user(&self, user: User) -> StoreFuture<'_, CreateOutcome>;

    fn update_password<'a>(&'a self, id: &'a str, hashed_password: &'a str)
        -> StoreFuture<'a, ()>;

    fn set_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()>;

    /// Replace the password if `token_hash` is the user's outstanding, unexpired
    /// reset token, clearing it in the same step. Returns `false` otherwise.
    fn consume_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        hashed_password: &'a str,
    ) -> StoreFuture<'a, bool>;
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn set_active(&self, id: &str, is_active: bool) {
        if let Some(user) = self.users.write().await.get_mut(id) {
            user.is_active = is_active;
        }
    }
}

impl UserStore for MemoryUserStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move {
            let users = self.users.read().await;
            Ok(users.values().find(|user| user.email == email).cloned())
        })
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(async move { Ok(self.users.read().await.get(id).cloned()) })
    }

    fn create_user(&self, user: User) -> StoreFuture<'_, CreateOutcome> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            if users.values().any(|existing| existing.email == user.email) {
                return Ok(CreateOutcome::Conflict);
            }
            users.insert(user.id.clone(), user.clone());
            Ok(CreateOutcome::Created(user))
        })
    }

    fn update_password<'a>(
        &'a self,
        id: &'a str,
        hashed_password: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let user = users.get_mut(id).context("user not found")?;
            user.hashed_password = hashed_password.to_string();
            user.updated_at = Some(Utc::now());
            Ok(())
        })
    }

    fn set_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let user = users.get_mut(id).context("user not found")?;
            user.reset_token_hash = Some(token_hash.to_vec());
            user.reset_token_expiry = Some(expires_at);
            user.updated_at = Some(Utc::now());
            Ok(())
        })
    }

    fn consume_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        hashed_password: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let Some(user) = users.get_mut(id) else {
                return Ok(false);
            };
            let now = Utc::now();
            let valid = user.reset_token_hash.as_deref() == Some(token_hash)
                && user.reset_token_expiry.is_some_and(|expiry| expiry > now);
            if valid {
                user.hashed_password = hashed_password.to_string();
                user.reset_token_hash = None;
                user.reset_token_expiry = None;
                user.updated_at = Some(now);
            }
            Ok(valid)
        })
    }
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

const USER_COLUMNS: &str = "id, email, name, hashed_password, is_active, created_at, updated_at, \
     reset_token_hash, reset_token_expiry, tier, settings";

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        hashed_password: row.get("hashed_password"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        reset_token_hash: row.get("reset_token_hash"),
        reset_token_expiry: row.get("reset_token_expiry"),
        tier: row.get("tier"),
        settings: row.get("settings"),
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Split a schema file into single statements; `sqlx::query` runs one at a time.
pub(crate) fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`; every statement is `IF NOT EXISTS`.
    pub async fn apply_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .instrument(db_span("DDL", statement))
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }

    async fn find_one(&self, column: &'static str, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .with_context(|| format!("failed to lookup user by {column}"))?;
        Ok(row.as_ref().map(user_from_row))
    }
}

impl UserStore for PgUserStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self
                .pool
                .acquire()
                .instrument(info_span!(
                    "db.acquire",
                    db.system = "postgresql",
                    db.operation = "ACQUIRE"
                ))
                .await
                .context("failed to acquire database connection")?;
            conn.ping()
                .instrument(info_span!(
                    "db.ping",
                    db.system = "postgresql",
                    db.operation = "PING"
                ))
                .await
                .context("failed to ping database")
        })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_one("email", email))
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<User>> {
        Box::pin(self.find_one("id", id))
    }

    fn create_user(&self, user: User) -> StoreFuture<'_, CreateOutcome> {
        Box::pin(async move {
            let query = r"
                INSERT INTO users
                    (id, email, name, hashed_password, is_active, created_at, tier, settings)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ";
            let result = sqlx::query(query)
                .bind(&user.id)
                .bind(&user.email)
                .bind(&user.name)
                .bind(&user.hashed_password)
                .bind(user.is_active)
                .bind(user.created_at)
                .bind(&user.tier)
                .bind(&user.settings)
                .execute(&self.pool)
                .instrument(db_span("INSERT", query))
                .await;

            match result {
                Ok(_) => Ok(CreateOutcome::Created(user)),
                Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
                Err(err) => Err(err).context("failed to insert user"),
            }
        })
    }

    fn update_password<'a>(
        &'a self,
        id: &'a str,
        hashed_password: &'a str,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = "UPDATE users SET hashed_password = $2, updated_at = NOW() WHERE id = $1";
            sqlx::query(query)
                .bind(id)
                .bind(hashed_password)
                .execute(&self.pool)
                .instrument(db_span("UPDATE", query))
                .await
                .context("failed to update password")?;
            Ok(())
        })
    }

    fn set_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        expires_at: DateTime<Utc>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = r"
                UPDATE users
                SET reset_token_hash = $2, reset_token_expiry = $3, updated_at = NOW()
                WHERE id = $1
            ";
            sqlx::query(query)
                .bind(id)
                .bind(token_hash)
                .bind(expires_at)
                .execute(&self.pool)
                .instrument(db_span("UPDATE", query))
                .await
                .context("failed to store reset token")?;
            Ok(())
        })
    }

    fn consume_reset_token<'a>(
        &'a self,
        id: &'a str,
        token_hash: &'a [u8],
        hashed_password: &'a str,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let query = r"
                UPDATE users
                SET hashed_password = $3,
                    reset_token_hash = NULL,
                    reset_token_expiry = NULL,
                    updated_at = NOW()
                WHERE id = $1
                  AND reset_token_hash = $2
                  AND reset_token_expiry > NOW()
            ";
            let result = sqlx::query(query)
                .bind(id)
                .bind(token_hash)
                .bind(hashed_password)
                .execute(&self.pool)
                .instrument(db_span("UPDATE", query))
                .await
                .context("failed to consume reset token")?;
            Ok(result.rows_affected() == 1)
        })
    }
}
