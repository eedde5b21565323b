//! Admin user persistence

use crate::db::models::User;
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Insert a new admin user; `password_hash` must already be hashed
pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    mobile: &str,
    password_hash: &str,
) -> Result<User> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, mobile, password_hash)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(email)
    .bind(mobile)
    .bind(password_hash)
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::InvalidInput(format!("Email already registered: {}", email))
        }
        _ => Error::Database(e),
    })?;

    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        mobile: mobile.to_string(),
        password_hash: password_hash.to_string(),
    })
}

/// Look up a user by email (exact match)
pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, email, mobile, password_hash
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let id_str: String = row.get("id");
            let id = Uuid::parse_str(&id_str)
                .map_err(|e| Error::Internal(format!("Corrupt user id {}: {}", id_str, e)))?;

            Ok(Some(User {
                id,
                name: row.get("name"),
                email: row.get("email"),
                mobile: row.get("mobile"),
                password_hash: row.get("password_hash"),
            }))
        }
        None => Ok(None),
    }
}
