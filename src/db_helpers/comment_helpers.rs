use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::CommentRow;

// $1 is the viewer id (NULL for anonymous callers).
const COMMENT_QUERY: &str = r#"
        SELECT comments.id         AS "id",
               comments.body       AS "body",
               comments.created_at AS "created_at",
               comments.updated_at AS "updated_at",
               comments.article_id AS "article_id",
               comments.author_id  AS "author_id",
               users.username      AS "author_username",
               users.bio           AS "author_bio",
               users.image         AS "author_image",
               EXISTS (SELECT 1
                       FROM   follows
                       WHERE  follows.followee_id = comments.author_id
                              AND follows.follower_id = $1) AS "following"
        FROM   comments
               JOIN users
                 ON comments.author_id = users.id
"#;

pub async fn add_comments_to_article_in_db(
    conn: &mut SqliteConnection,
    author_id: i64,
    article_id: i64,
    body: &str,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO comments (body, author_id, article_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        RETURNING id
        "#,
    )
    .bind(body)
    .bind(author_id)
    .bind(article_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get_comment_in_db(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    comment_id: i64,
) -> Result<Option<CommentRow>, sqlx::Error> {
    sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_QUERY} WHERE comments.id = $2"))
        .bind(viewer)
        .bind(comment_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_comments_for_article_in_db(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    article_id: i64,
) -> Result<Vec<CommentRow>, sqlx::Error> {
    sqlx::query_as::<_, CommentRow>(&format!(
        "{COMMENT_QUERY} WHERE comments.article_id = $2 ORDER BY comments.created_at, comments.id"
    ))
    .bind(viewer)
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn delete_comment_in_db(
    conn: &mut SqliteConnection,
    comment_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(comment_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
