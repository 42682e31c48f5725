use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::User;

const USER_COLUMNS: &str = "id, username, email, password, image, bio, created_at, updated_at";

/// Fields of a partial user update. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

pub async fn insert_user(
    conn: &mut SqliteConnection,
    email: &str,
    username: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, username, password, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_user_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_user_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_user_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn update_user(
    conn: &mut SqliteConnection,
    id: i64,
    UserChanges {
        email,
        username,
        password,
        bio,
        image,
    }: UserChanges,
    now: DateTime<Utc>,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
        SET email      = COALESCE($1, email),
            username   = COALESCE($2, username),
            password   = COALESCE($3, password),
            bio        = COALESCE($4, bio),
            image      = COALESCE($5, image),
            updated_at = $6
        WHERE id = $7
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(email)
    .bind(username)
    .bind(password)
    .bind(bio)
    .bind(image)
    .bind(now)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}
