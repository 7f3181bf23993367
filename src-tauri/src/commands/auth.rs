use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db::DbPool;
use crate::events::{emit_event, event_names};
use crate::types::auth::{Session, SignUpOutcome, SignUpResult, UserInfo};

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_LEN: usize = 32;
const SESSION_TTL_DAYS: u32 = 7;

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn validate_credentials(email: &str, password: &str) -> Result<(), String> {
    let (local, domain) = email
        .split_once('@')
        .ok_or("Please enter a valid email address")?;
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err("Please enter a valid email address".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn sign_up_db(pool: &DbPool, email: &str, password: &str) -> Result<SignUpResult, String> {
    let email = normalize_email(email);
    validate_credentials(&email, password)?;

    let conn = pool.get().map_err(|e| e.to_string())?;
    let exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            [&email],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())?;
    if exists > 0 {
        return Err("An account with this email already exists".to_string());
    }

    let salt = random_string(16);
    let hash = hash_password(password, &salt);
    // The hosted original defers account activation to an email link; the
    // local store records the account as confirmed and the UI still shows
    // the confirmation notice.
    conn.execute(
        "INSERT INTO users (email, password_hash, salt, confirmed) VALUES (?1, ?2, ?3, 1)",
        rusqlite::params![email, hash, salt],
    )
    .map_err(|e| e.to_string())?;

    info!(email = %email, "User signed up");
    Ok(SignUpResult {
        outcome: SignUpOutcome::ConfirmationSent,
        email,
    })
}

pub fn sign_in_db(pool: &DbPool, email: &str, password: &str) -> Result<Session, String> {
    let email = normalize_email(email);
    let conn = pool.get().map_err(|e| e.to_string())?;

    let row: Option<(i64, String, String, bool)> = match conn.query_row(
        "SELECT id, password_hash, salt, confirmed FROM users WHERE email = ?1",
        [&email],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get::<_, i64>(3)? != 0,
            ))
        },
    ) {
        Ok(row) => Some(row),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.to_string()),
    };

    let (user_id, stored_hash, salt, confirmed) =
        row.ok_or("Invalid login credentials")?;
    if hash_password(password, &salt) != stored_hash {
        return Err("Invalid login credentials".to_string());
    }

    let token = random_string(TOKEN_LEN);
    conn.execute(
        "INSERT INTO sessions (token, user_id, expires_at)
         VALUES (?1, ?2, datetime('now', ?3))",
        rusqlite::params![token, user_id, format!("+{} days", SESSION_TTL_DAYS)],
    )
    .map_err(|e| e.to_string())?;

    let expires_at: String = conn
        .query_row(
            "SELECT expires_at FROM sessions WHERE token = ?1",
            [&token],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())?;

    info!(email = %email, "User signed in");
    Ok(Session {
        token,
        user: UserInfo {
            id: user_id,
            email,
            confirmed,
        },
        expires_at,
    })
}

/// Resolve a live session token to its user. Expired sessions are deleted
/// lazily and resolve to None.
pub fn session_get_db(pool: &DbPool, token: &str) -> Result<Option<UserInfo>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
        .map_err(|e| e.to_string())?;

    match conn.query_row(
        "SELECT u.id, u.email, u.confirmed FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1",
        [token],
        |row| {
            Ok(UserInfo {
                id: row.get(0)?,
                email: row.get(1)?,
                confirmed: row.get::<_, i64>(2)? != 0,
            })
        },
    ) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.to_string()),
    }
}

pub fn sign_out_db(pool: &DbPool, token: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", [token])
        .map_err(|e| e.to_string())?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tauri command wrappers
// ---------------------------------------------------------------------------

#[tauri::command]
pub fn auth_sign_up(
    pool: tauri::State<'_, DbPool>,
    email: String,
    password: String,
) -> Result<SignUpResult, String> {
    sign_up_db(&pool, &email, &password)
}

#[tauri::command]
pub fn auth_sign_in(
    app: tauri::AppHandle,
    pool: tauri::State<'_, DbPool>,
    email: String,
    password: String,
) -> Result<Session, String> {
    let session = sign_in_db(&pool, &email, &password)?;
    if let Err(e) = emit_event(&app, event_names::AUTH_CHANGE, Some(session.user.clone())) {
        warn!(error = %e, "Failed to emit auth change");
    }
    Ok(session)
}

#[tauri::command]
pub fn auth_sign_out(
    app: tauri::AppHandle,
    pool: tauri::State<'_, DbPool>,
    token: String,
) -> Result<(), String> {
    sign_out_db(&pool, &token)?;
    if let Err(e) = emit_event(&app, event_names::AUTH_CHANGE, None::<UserInfo>) {
        warn!(error = %e, "Failed to emit auth change");
    }
    Ok(())
}

#[tauri::command]
pub fn auth_session(
    pool: tauri::State<'_, DbPool>,
    token: Option<String>,
) -> Result<Option<UserInfo>, String> {
    match token {
        Some(token) => session_get_db(&pool, &token),
        None => Ok(None),
    }
}
