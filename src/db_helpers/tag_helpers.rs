use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::Tag;

/// Creates the tag unless a row with that exact name already exists.
pub async fn insert_tag_if_absent(
    conn: &mut SqliteConnection,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tags (name, created_at, updated_at)
        VALUES ($1, $2, $2)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn get_tag_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_tags_in_db(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
        .fetch_all(&mut *conn)
        .await
}
