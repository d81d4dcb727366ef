//! Passwordless sign-in: a six digit code is sent to an email address and
//! exchanged for a local session.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Email is required.")]
    MissingEmail,

    #[error("Code is required.")]
    MissingCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Delivers login codes.
pub trait Mailer {
    fn send_code(&self, email: &str, code: &str) -> Result<()>;
}

/// Writes the code to the log and to stderr instead of sending an email.
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send_code(&self, email: &str, code: &str) -> Result<()> {
        info!(%email, %code, "login code issued");
        eprintln!("Login code for {}: {}", email, code);
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AuthError::MissingEmail);
    }
    Ok(email)
}

/// Issue a login code for `email`, creating the user on first use.
///
/// Delivery failures are logged and otherwise ignored, so the caller cannot
/// tell whether an address exists.
pub fn request_code(
    db: &Connection,
    mailer: &dyn Mailer,
    email: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<()> {
    let email = normalize_email(email)?;
    let user = find_or_create_user(db, &email, now)?;

    let code = format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000));
    db.execute(
        "INSERT INTO login_code (code, email, expires_at, used) VALUES (?1, ?2, ?3, 0)",
        params![code, email, now + ttl],
    )
    .context("Failed to store login code.")?;
    debug!(user = %user.id, "stored login code");

    if let Err(error) = mailer.send_code(&email, &code) {
        warn!(%email, error = %format!("{:#}", error), "failed to deliver login code");
    }
    Ok(())
}

/// Exchange an unused, unexpired code for its user. The code is spent.
pub fn confirm_code(db: &Connection, code: &str, now: DateTime<Utc>) -> Result<Option<User>> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AuthError::MissingCode.into());
    }

    let pending = db
        .query_row(
            "SELECT id, email FROM login_code
             WHERE code = ?1 AND used = 0 AND expires_at > ?2
             ORDER BY id DESC LIMIT 1",
            params![code, now],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .context("Failed to look up login code.")?;

    let (code_id, email) = match pending {
        Some(pending) => pending,
        None => {
            debug!("rejected login code");
            return Ok(None);
        }
    };

    db.execute("UPDATE login_code SET used = 1 WHERE id = ?1", params![code_id])
        .context("Failed to spend login code.")?;
    find_user(db, &email)
}

pub fn find_user(db: &Connection, email: &str) -> Result<Option<User>> {
    let user = db
        .query_row(
            "SELECT id, email, created_at FROM user WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    created_at: row.get::<_, DateTime<Utc>>(2)?,
                })
            },
        )
        .optional()
        .context("Failed to look up user.")?;
    Ok(user)
}

fn find_or_create_user(db: &Connection, email: &str, now: DateTime<Utc>) -> Result<User> {
    if let Some(user) = find_user(db, email)? {
        return Ok(user);
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        created_at: now,
    };
    db.execute(
        "INSERT INTO user (id, email, created_at) VALUES (?1, ?2, ?3)",
        params![user.id, user.email, user.created_at],
    )
    .context("Failed to create user.")?;
    info!(user = %user.id, "created user");
    Ok(user)
}

/// Who is signed in on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Session {
            user_id: user.id.clone(),
            email: user.email.clone(),
        }
    }
}

impl Session {
    pub fn load(path: &Path) -> Result<Option<Session>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}.", path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse session {}.", path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}.", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(self).context("Failed to encode session.")?;
        fs::write(path, raw).with_context(|| format!("Failed to write session {}.", path.display()))
    }

    /// Forget the session. Returns whether someone was signed in.
    pub fn sign_out(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).with_context(|| format!("Failed to remove session {}.", path.display()))?;
        Ok(true)
    }
}
