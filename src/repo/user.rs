use sqlx::MySqlPool;

use crate::error::AppResult;
use crate::model::user::User;

const USER_COLUMNS: &str =
    "id, username, password, role_id, employee_id, is_active, last_login_at";

pub async fn find_by_username(pool: &MySqlPool, username: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_id(pool: &MySqlPool, id: u64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

/// Inserts the account and returns its id. Duplicate usernames surface as
/// the raw `sqlx::Error` so the caller can map them to 409.
pub async fn insert(
    pool: &MySqlPool,
    username: &str,
    password_hash: &str,
    role_id: u8,
    employee_id: Option<u64>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(role_id)
    .bind(employee_id)
    .execute(pool)
    .await?;
    Ok(result.last_insert_id())
}

/// Returns false when the user does not exist. A second account for the
/// same employee fails on the unique key.
pub async fn set_employee(
    pool: &MySqlPool,
    user_id: u64,
    employee_id: Option<u64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET employee_id = ? WHERE id = ?")
        .bind(employee_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        return Ok(true);
    }
    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(exists.is_some())
}

pub async fn touch_last_login(pool: &MySqlPool, user_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/* ============================
   Refresh tokens
   ============================ */

pub async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    jti: &str,
    expires_at: usize,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(jti)
    .bind(expires_at as i64)
    .execute(pool)
    .await?;
    Ok(())
}

/// Revokes a live refresh token and stores its replacement atomically.
/// Returns false when the old jti is unknown, already revoked or expired.
pub async fn rotate_refresh_token(
    pool: &MySqlPool,
    old_jti: &str,
    new_jti: &str,
    new_expires_at: usize,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let record = sqlx::query_as::<_, (u64, u64)>(
        r#"
        SELECT id, user_id
        FROM refresh_tokens
        WHERE jti = ? AND revoked = 0 AND expires_at > NOW()
        FOR UPDATE
        "#,
    )
    .bind(old_jti)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((token_id, user_id)) = record else {
        return Ok(false);
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(new_jti)
    .bind(new_expires_at as i64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

pub async fn revoke_refresh_token(pool: &MySqlPool, jti: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(jti)
        .execute(pool)
        .await?;
    Ok(())
}
