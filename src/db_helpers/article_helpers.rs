use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{ArticleFilter, ArticleRef, ArticleRow, Page};

// $1 is always the viewer id (NULL for anonymous callers).
const ARTICLE_QUERY: &str = r#"
            SELECT articles.id                                    AS "id",
                   articles.slug                                  AS "slug",
                   articles.title                                 AS "title",
                   articles.description                           AS "description",
                   articles.body                                  AS "body",
                   articles.author_id                             AS "author_id",
                   articles.created_at                            AS "created_at",
                   articles.updated_at                            AS "updated_at",
                   (SELECT Count(*)
                    FROM   favorites
                    WHERE  favorites.article_id = articles.id)   AS "favorites_count",
                   EXISTS (SELECT 1
                           FROM   favorites
                           WHERE  favorites.article_id = articles.id
                                  AND favorites.user_id = $1)    AS "favorited",
                   users.username                                 AS "author_username",
                   users.bio                                      AS "author_bio",
                   users.image                                    AS "author_image",
                   EXISTS (SELECT 1
                           FROM   follows
                           WHERE  follows.followee_id = articles.author_id
                                  AND follows.follower_id = $1)  AS "following"
            FROM   articles
                   JOIN users
                     ON articles.author_id = users.id
"#;

// $2 tag, $3 author username, $4 favoriting username.
const FILTER_CLAUSE: &str = r#"
            WHERE  ( $2 IS NULL
                     OR EXISTS (SELECT 1
                                FROM   article_tags
                                       JOIN tags
                                         ON tags.id = article_tags.tag_id
                                WHERE  article_tags.article_id = articles.id
                                       AND tags.name = $2) )
               AND ( $3 IS NULL
                     OR users.username = $3 )
               AND ( $4 IS NULL
                     OR EXISTS (SELECT 1
                                FROM   favorites
                                       JOIN users AS fans
                                         ON fans.id = favorites.user_id
                                WHERE  favorites.article_id = articles.id
                                       AND fans.username = $4) )
"#;

// $1 is the reader whose followees' articles make up the feed.
const FEED_CLAUSE: &str = r#"
            WHERE  EXISTS (SELECT 1
                           FROM   follows
                           WHERE  follows.followee_id = articles.author_id
                                  AND follows.follower_id = $1)
"#;

/// The stored fields of an article, as written on create and update.
#[derive(Debug, Clone, Copy)]
pub struct ArticleContent<'a> {
    pub slug: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub body: &'a str,
}

pub async fn get_article_by_slug_in_db(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    slug: &str,
) -> Result<Option<ArticleRow>, sqlx::Error> {
    sqlx::query_as::<_, ArticleRow>(&format!("{ARTICLE_QUERY} WHERE articles.slug = $2"))
        .bind(viewer)
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_article_ref_by_slug(
    conn: &mut SqliteConnection,
    slug: &str,
) -> Result<Option<ArticleRef>, sqlx::Error> {
    sqlx::query_as::<_, ArticleRef>("SELECT id, author_id FROM articles WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list_articles_in_db(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    filter: &ArticleFilter,
    page: Page,
) -> Result<Vec<ArticleRow>, sqlx::Error> {
    sqlx::query_as::<_, ArticleRow>(&format!(
        "{ARTICLE_QUERY} {FILTER_CLAUSE} ORDER BY articles.id DESC LIMIT $5 OFFSET $6"
    ))
    .bind(viewer)
    .bind(filter.tag.as_deref())
    .bind(filter.author.as_deref())
    .bind(filter.favorited.as_deref())
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(&mut *conn)
    .await
}

/// Counts every article matching `filter`, independent of any page.
pub async fn count_articles_in_db(
    conn: &mut SqliteConnection,
    filter: &ArticleFilter,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!(
        r#"
        SELECT Count(*)
        FROM   articles
               JOIN users
                 ON articles.author_id = users.id
        {FILTER_CLAUSE}
        "#
    ))
    // No viewer here; the placeholder keeps the filter's $2..$4 numbering.
    .bind(Option::<i64>::None)
    .bind(filter.tag.as_deref())
    .bind(filter.author.as_deref())
    .bind(filter.favorited.as_deref())
    .fetch_one(&mut *conn)
    .await
}

pub async fn list_feed_in_db(
    conn: &mut SqliteConnection,
    reader: i64,
    page: Page,
) -> Result<Vec<ArticleRow>, sqlx::Error> {
    sqlx::query_as::<_, ArticleRow>(&format!(
        "{ARTICLE_QUERY} {FEED_CLAUSE} ORDER BY articles.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(reader)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(&mut *conn)
    .await
}

pub async fn count_feed_in_db(conn: &mut SqliteConnection, reader: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT Count(*) FROM articles {FEED_CLAUSE}"))
        .bind(reader)
        .fetch_one(&mut *conn)
        .await
}

pub async fn get_article_tags_in_db(
    conn: &mut SqliteConnection,
    article_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT tags.name
        FROM   tags
               JOIN article_tags
                 ON article_tags.tag_id = tags.id
        WHERE  article_tags.article_id = $1
        ORDER  BY tags.name
        "#,
    )
    .bind(article_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_article_in_db(
    conn: &mut SqliteConnection,
    author_id: i64,
    content: ArticleContent<'_>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO articles (slug, title, description, body, author_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING id
        "#,
    )
    .bind(content.slug)
    .bind(content.title)
    .bind(content.description)
    .bind(content.body)
    .bind(author_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
}

pub async fn update_article_in_db(
    conn: &mut SqliteConnection,
    id: i64,
    content: ArticleContent<'_>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE articles
        SET    slug = $1,
               title = $2,
               description = $3,
               body = $4,
               updated_at = $5
        WHERE  id = $6
        "#,
    )
    .bind(content.slug)
    .bind(content.title)
    .bind(content.description)
    .bind(content.body)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn link_tag_in_db(
    conn: &mut SqliteConnection,
    article_id: i64,
    tag_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO article_tags (article_id, tag_id)
        VALUES ($1, $2)
        ON CONFLICT (article_id, tag_id) DO NOTHING
        "#,
    )
    .bind(article_id)
    .bind(tag_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Removes the article together with everything that references it, children
/// first so the foreign keys hold at every step.
pub async fn delete_article_in_db(
    conn: &mut SqliteConnection,
    article_id: i64,
) -> Result<(), sqlx::Error> {
    for statement in [
        "DELETE FROM article_tags WHERE article_id = $1",
        "DELETE FROM favorites WHERE article_id = $1",
        "DELETE FROM comments WHERE article_id = $1",
        "DELETE FROM articles WHERE id = $1",
    ] {
        sqlx::query(statement)
            .bind(article_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Adds the favorite edge. Favoriting twice leaves a single edge.
pub async fn favourite_article_in_db(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO favorites (user_id, article_id, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, article_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(article_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn unfavourite_article_in_db(
    conn: &mut SqliteConnection,
    user_id: i64,
    article_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND article_id = $2")
        .bind(user_id)
        .bind(article_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db_helpers::test_support::{memory_pool, user};
    use crate::db_helpers::{get_tag_by_name, insert_follow, insert_tag_if_absent};
    use crate::utils::is_unique_violation;

    fn content<'a>(slug: &'a str) -> ArticleContent<'a> {
        ArticleContent {
            slug,
            title: "Title",
            description: "Description",
            body: "Body",
        }
    }

    async fn tag(conn: &mut SqliteConnection, article_id: i64, name: &str) {
        insert_tag_if_absent(conn, name, Utc::now()).await.unwrap();
        let tag = get_tag_by_name(conn, name).await.unwrap().unwrap();
        link_tag_in_db(conn, article_id, tag.id).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_slugs_violate_the_slug_constraint() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;

        insert_article_in_db(&mut conn, jake.id, content("title"), Utc::now())
            .await
            .unwrap();
        let error = insert_article_in_db(&mut conn, jake.id, content("title"), Utc::now())
            .await
            .unwrap_err();
        assert!(is_unique_violation(&error, "articles.slug"));
    }

    #[tokio::test]
    async fn rows_carry_viewer_relative_flags() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let anne = user(&mut conn, "anne").await;
        let id = insert_article_in_db(&mut conn, jake.id, content("title"), Utc::now())
            .await
            .unwrap();
        favourite_article_in_db(&mut conn, anne.id, id, Utc::now())
            .await
            .unwrap();
        insert_follow(&mut conn, anne.id, jake.id, Utc::now()).await.unwrap();

        let seen_by_anne = get_article_by_slug_in_db(&mut conn, Some(anne.id), "title")
            .await
            .unwrap()
            .unwrap();
        assert!(seen_by_anne.favorited);
        assert!(seen_by_anne.following);
        assert_eq!(seen_by_anne.favorites_count, 1);
        assert_eq!(seen_by_anne.author_username, "jake");

        let anonymous = get_article_by_slug_in_db(&mut conn, None, "title")
            .await
            .unwrap()
            .unwrap();
        assert!(!anonymous.favorited);
        assert!(!anonymous.following);
        assert_eq!(anonymous.favorites_count, 1);
    }

    #[tokio::test]
    async fn filters_are_conjunctive_and_counts_ignore_paging() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let anne = user(&mut conn, "anne").await;

        for slug in ["one", "two", "three"] {
            let id = insert_article_in_db(&mut conn, jake.id, content(slug), Utc::now())
                .await
                .unwrap();
            tag(&mut conn, id, "rust").await;
        }
        let other = insert_article_in_db(&mut conn, anne.id, content("four"), Utc::now())
            .await
            .unwrap();
        tag(&mut conn, other, "rust").await;

        let filter = ArticleFilter {
            tag: Some("rust".into()),
            author: Some("jake".into()),
            favorited: None,
        };
        let page = Page { offset: 1, limit: 1 };
        let rows = list_articles_in_db(&mut conn, None, &filter, page).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "two");
        assert_eq!(count_articles_in_db(&mut conn, &filter).await.unwrap(), 3);

        let everything = ArticleFilter::default();
        assert_eq!(count_articles_in_db(&mut conn, &everything).await.unwrap(), 4);

        favourite_article_in_db(&mut conn, anne.id, other, Utc::now())
            .await
            .unwrap();
        let favorited_by_anne = ArticleFilter {
            favorited: Some("anne".into()),
            ..Default::default()
        };
        let rows = list_articles_in_db(&mut conn, None, &favorited_by_anne, Page::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].slug, "four");
    }

    #[tokio::test]
    async fn articles_with_several_tags_are_listed_once() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let id = insert_article_in_db(&mut conn, jake.id, content("title"), Utc::now())
            .await
            .unwrap();
        tag(&mut conn, id, "zebra").await;
        tag(&mut conn, id, "apple").await;

        let rows = list_articles_in_db(&mut conn, None, &ArticleFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            get_article_tags_in_db(&mut conn, id).await.unwrap(),
            vec!["apple", "zebra"]
        );
    }

    #[tokio::test]
    async fn deleting_an_article_clears_its_links_but_keeps_tags() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let id = insert_article_in_db(&mut conn, jake.id, content("title"), Utc::now())
            .await
            .unwrap();
        tag(&mut conn, id, "lonely").await;
        favourite_article_in_db(&mut conn, jake.id, id, Utc::now())
            .await
            .unwrap();

        delete_article_in_db(&mut conn, id).await.unwrap();

        for table in ["article_tags", "favorites", "articles"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty");
        }
        assert!(get_tag_by_name(&mut conn, "lonely").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn feed_holds_followed_authors_only() {
        let pool = memory_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let jake = user(&mut conn, "jake").await;
        let anne = user(&mut conn, "anne").await;
        let bob = user(&mut conn, "bob").await;
        insert_article_in_db(&mut conn, jake.id, content("by-jake"), Utc::now())
            .await
            .unwrap();
        insert_article_in_db(&mut conn, bob.id, content("by-bob"), Utc::now())
            .await
            .unwrap();
        insert_follow(&mut conn, anne.id, jake.id, Utc::now()).await.unwrap();

        let feed = list_feed_in_db(&mut conn, anne.id, Page::default()).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].slug, "by-jake");
        assert!(feed[0].following);
        assert_eq!(count_feed_in_db(&mut conn, anne.id).await.unwrap(), 1);
        assert_eq!(count_feed_in_db(&mut conn, bob.id).await.unwrap(), 0);
    }
}
