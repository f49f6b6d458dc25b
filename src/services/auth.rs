use crate::models::User;
use crate::web::error::{ApiError, ApiResult};
use crate::Database;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use rusqlite::OptionalExtension;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 254;

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, is_banned, banned_by, \
                            ban_time, ban_comment, avatar_id, created_at, updated_at";

pub fn validate_name(name: &str) -> ApiResult<()> {
    if name.is_empty() {
        return Err(ApiError::validation("name", "Name cannot be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::validation(
            "name",
            format!("Name must be {} characters or less", MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    if email.is_empty() {
        return Err(ApiError::validation("email", "Email cannot be empty"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ApiError::validation(
            "email",
            format!("Email must be {} characters or less", MAX_EMAIL_LENGTH),
        ));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::validation("email", "Invalid email format"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    validate_password(password)?;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dW5rbm93bg$0000000000000000000000000000000000000000000";

pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            // Burn the same work as a real verification to keep timing flat.
            if let Ok(dummy) = PasswordHash::new(DUMMY_HASH) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &dummy);
            }
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn name_is_free(db: &Database, name: &str, exclude_id: Option<i64>) -> ApiResult<bool> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let count: i64 = match exclude_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE name = ? AND id <> ?",
            (name, id),
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM users WHERE name = ?", [name], |row| {
            row.get(0)
        })?,
    };
    Ok(count == 0)
}

pub fn email_is_free(db: &Database, email: &str, exclude_id: Option<i64>) -> ApiResult<bool> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let count: i64 = match exclude_id {
        Some(id) => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ? AND id <> ?",
            (email, id),
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?",
            [email],
            |row| row.get(0),
        )?,
    };
    Ok(count == 0)
}

pub fn create_user(
    db: &Database,
    name: &str,
    email: &str,
    password: &str,
    is_admin: bool,
) -> ApiResult<i64> {
    validate_name(name)?;
    validate_email(email)?;
    if !name_is_free(db, name, None)? {
        return Err(ApiError::validation("name", "This name is already in use"));
    }
    if !email_is_free(db, email, None)? {
        return Err(ApiError::validation("email", "This email is already in use"));
    }
    let password_hash = hash_password(password)?;
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "INSERT INTO users (name, email, password_hash, is_admin) VALUES (?, ?, ?, ?)",
        (name, email, &password_hash, is_admin),
    )
    .map_err(|e| {
        tracing::warn!("auth::create_user: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    Ok(conn.last_insert_rowid())
}

pub fn authenticate(db: &Database, email: &str, password: &str) -> ApiResult<Option<User>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let user: Option<User> = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            [email],
            row_to_user,
        )
        .optional()?;

    match user {
        Some(u) if verify_password(password, &u.password_hash) => Ok(Some(u)),
        _ => Ok(None),
    }
}

pub fn create_session(db: &Database, user_id: i64, duration_days: i64) -> ApiResult<String> {
    let token = generate_session_token();
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "INSERT INTO sessions (user_id, token, expires_at) VALUES (?, ?, datetime('now', ?||' days'))",
        (user_id, &token, duration_days),
    )?;
    Ok(token)
}

pub fn validate_session(db: &Database, token: &str) -> ApiResult<Option<User>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let user = conn
        .query_row(
            &format!(
                "SELECT u.{} FROM users u \
                 JOIN sessions s ON s.user_id = u.id \
                 WHERE s.token = ? AND s.expires_at > datetime('now')",
                USER_COLUMNS.replace(", ", ", u.")
            ),
            [token],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn delete_session(db: &Database, token: &str) -> ApiResult<()> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute("DELETE FROM sessions WHERE token = ?", [token])?;
    Ok(())
}

pub fn get_user(db: &Database, id: i64) -> ApiResult<Option<User>> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            [id],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn update_password(db: &Database, user_id: i64, password: &str) -> ApiResult<()> {
    let password_hash = hash_password(password)?;
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        (&password_hash, user_id),
    )
    .map_err(|e| {
        tracing::warn!("auth::update_password: Failed saving to the DB: {}", e);
        ApiError::db("Failed saving to the DB")
    })?;
    Ok(())
}

/// Points the user at one of their own non-post images.
pub fn set_avatar(db: &Database, user_id: i64, image_id: i64) -> ApiResult<()> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    let owner: Option<(i64, bool)> = conn
        .query_row(
            "SELECT user_id, attached_to_post FROM images WHERE id = ?",
            [image_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match owner {
        None => Err(ApiError::not_found("Image was not found")),
        Some((owner_id, _)) if owner_id != user_id => Err(ApiError::AccessDenied),
        Some((_, true)) => Err(ApiError::bad_request(
            "Bad request: a post image cannot be used as an avatar",
        )),
        Some(_) => {
            conn.execute(
                "UPDATE users SET avatar_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                (image_id, user_id),
            )?;
            Ok(())
        }
    }
}

pub fn clear_avatar(db: &Database, user_id: i64) -> ApiResult<()> {
    let conn = db.get().map_err(|e| ApiError::db(e.to_string()))?;
    conn.execute(
        "UPDATE users SET avatar_id = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        [user_id],
    )?;
    Ok(())
}

pub(crate) fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_admin: row.get(4)?,
        is_banned: row.get(5)?,
        banned_by: row.get(6)?,
        ban_time: row.get(7)?,
        ban_comment: row.get(8)?,
        avatar_id: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
