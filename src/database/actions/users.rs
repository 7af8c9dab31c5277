use sqlx::{Pool, Postgres};

use crate::{
    authentication::{cryptography, jwt::generate_session_token},
    config::Config,
    constants::USER_COUNT_PER_PAGE,
    database::{
        error::{ApiError, ValidationError},
        form::UserForm,
        pagination::PageContext,
        schema::{Id, User, UserListRow, UserProfile},
    },
};

use super::is_subscribed;

pub async fn get_user(pool: &Pool<Postgres>, username: &str) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, ApiError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Creates a user with a hashed password and the default role. Duplicate
/// username or email surfaces as a conflict, not a silent no-op.
pub async fn register_user(form: &UserForm, pool: &Pool<Postgres>) -> Result<User, ApiError> {
    form.validate()?;

    let password_hash = cryptography::hash_password(&form.password)
        .map_err(|e| ValidationError::new("password", format!("Unusable password: {e}")))?;

    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password_hash)
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(|| ApiError::conflict("A user with this username or email already exists"))
}

/// Verifies credentials and issues a session token. Unknown users and bad
/// passwords are indistinguishable to the caller.
pub async fn login_user(
    username: &str,
    password: &str,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let invalid = || ValidationError::new("credentials", "Invalid username or password");

    let user = get_user(pool, username).await?.ok_or_else(invalid)?;

    let authenticated = cryptography::verify_password(password, &user.password)
        .map_err(|_| ApiError::from(invalid()))?;
    if !authenticated {
        return Err(invalid().into());
    }

    generate_session_token(&user, &config.session_secret)
}

/// User as seen by an (optional) viewer; `is_subscribed` is always false
/// for anonymous viewers.
pub async fn get_user_profile(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, ApiError> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No user exists with specified id"))?;

    let subscribed = match viewer {
        Some(viewer_id) => is_subscribed(user.id, viewer_id, pool).await?,
        None => false,
    };

    Ok(UserProfile {
        email: user.email,
        id: user.id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: subscribed,
    })
}

pub async fn fetch_users(
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserListRow>, ApiError> {
    let rows: Vec<UserListRow> = sqlx::query_as(
        "
        SELECT id, email, username, first_name, last_name, COUNT(*) OVER () AS count
        FROM users
        ORDER BY id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
