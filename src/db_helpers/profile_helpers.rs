use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

pub async fn is_following(
    conn: &mut SqliteConnection,
    follower_id: Option<i64>,
    followee_id: i64,
) -> Result<bool, sqlx::Error> {
    let Some(follower_id) = follower_id else {
        return Ok(false);
    };
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2
        )
        "#,
    )
    .bind(follower_id)
    .bind(followee_id)
    .fetch_one(&mut *conn)
    .await
}

/// Adds the follow edge. Following twice leaves a single edge.
pub async fn insert_follow(
    conn: &mut SqliteConnection,
    follower_id: i64,
    followee_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO follows (follower_id, followee_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (follower_id, followee_id) DO NOTHING
        "#,
    )
    .bind(follower_id)
    .bind(followee_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn delete_follow(
    conn: &mut SqliteConnection,
    follower_id: i64,
    followee_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
        .bind(follower_id)
        .bind(followee_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{memory_pool, user};

    async fn edge_count(conn: &mut SqliteConnection) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn follow_edges_are_idempotent_and_directed() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let anne = user(&mut conn, "anne").await;

        insert_follow(&mut conn, jake.id, anne.id, Utc::now()).await.unwrap();
        insert_follow(&mut conn, jake.id, anne.id, Utc::now()).await.unwrap();
        assert_eq!(edge_count(&mut conn).await, 1);

        assert!(is_following(&mut conn, Some(jake.id), anne.id).await.unwrap());
        assert!(!is_following(&mut conn, Some(anne.id), jake.id).await.unwrap());
        assert!(!is_following(&mut conn, None, anne.id).await.unwrap());

        delete_follow(&mut conn, jake.id, anne.id).await.unwrap();
        delete_follow(&mut conn, jake.id, anne.id).await.unwrap();
        assert_eq!(edge_count(&mut conn).await, 0);
    }
}
