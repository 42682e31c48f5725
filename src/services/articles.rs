use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::{
    db_helpers::{
        count_articles_in_db, count_feed_in_db, delete_article_in_db, favourite_article_in_db,
        get_article_by_slug_in_db, get_article_ref_by_slug, get_article_tags_in_db,
        insert_article_in_db, link_tag_in_db, list_articles_in_db, list_feed_in_db,
        unfavourite_article_in_db, update_article_in_db, ArticleContent,
    },
    errors::RequestError,
    models::{Article, ArticleFilter, ArticleRef, ArticleRow, Page},
    utils::{is_unique_violation, slugify},
    Database,
};

use super::{optional_field, required_field, TagService};

const SLUG_COLUMN: &str = "articles.slug";

#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
}

/// Fields of a partial article update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Clone)]
pub struct ArticleService {
    db: Database,
    tags: TagService,
}

impl ArticleService {
    pub fn new(db: Database, tags: TagService) -> Self {
        Self { db, tags }
    }

    pub async fn get(&self, viewer: Option<i64>, slug: &str) -> Result<Article, RequestError> {
        let mut conn = self.db.reader.acquire().await?;
        load_article(&mut conn, viewer, slug).await
    }

    /// Creates the article under a slug derived from its title. A slug that is
    /// already taken is retried with a fresh random suffix until one sticks.
    pub async fn create(&self, author_id: i64, new_article: NewArticle) -> Result<Article, RequestError> {
        let new_article = NewArticle {
            title: required_field(&new_article.title, "title")?,
            description: required_field(&new_article.description, "description")?,
            body: required_field(&new_article.body, "body")?,
            tag_list: new_article.tag_list,
        };

        let mut suffixed = false;
        loop {
            let slug = slugify(&new_article.title, suffixed);
            match self.try_create(author_id, &slug, &new_article).await {
                Err(RequestError::Database(e)) if is_unique_violation(&e, SLUG_COLUMN) => {
                    debug!(%slug, "slug already taken, retrying with a suffix");
                    suffixed = true;
                }
                result => return result,
            }
        }
    }

    async fn try_create(
        &self,
        author_id: i64,
        slug: &str,
        new_article: &NewArticle,
    ) -> Result<Article, RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let tags = self.tags.upsert_tags_in(&mut tx, &new_article.tag_list).await?;

        let content = ArticleContent {
            slug,
            title: &new_article.title,
            description: &new_article.description,
            body: &new_article.body,
        };
        let article_id = insert_article_in_db(&mut tx, author_id, content, Utc::now()).await?;
        for tag in &tags {
            link_tag_in_db(&mut tx, article_id, tag.id).await?;
        }

        let article = load_article(&mut tx, Some(author_id), slug).await?;
        tx.commit().await?;
        info!(article_id, slug, author_id, "created article");
        Ok(article)
    }

    /// Updates the supplied fields. Only the author may do this; a new title
    /// means a new slug, with the same collision retry as [`Self::create`].
    pub async fn update(
        &self,
        caller_id: i64,
        slug: &str,
        changes: ArticleChanges,
    ) -> Result<Article, RequestError> {
        let changes = ArticleChanges {
            title: optional_field(changes.title, "title")?,
            description: optional_field(changes.description, "description")?,
            body: optional_field(changes.body, "body")?,
        };

        let mut suffixed = false;
        loop {
            match self.try_update(caller_id, slug, &changes, suffixed).await {
                Err(RequestError::Database(e)) if is_unique_violation(&e, SLUG_COLUMN) => {
                    debug!(%slug, "new slug already taken, retrying with a suffix");
                    suffixed = true;
                }
                result => return result,
            }
        }
    }

    async fn try_update(
        &self,
        caller_id: i64,
        slug: &str,
        changes: &ArticleChanges,
        suffixed: bool,
    ) -> Result<Article, RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let current = get_article_by_slug_in_db(&mut tx, Some(caller_id), slug)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))?;
        if current.author_id != caller_id {
            return Err(RequestError::Forbidden("Only the author can edit this article"));
        }

        let new_slug = match &changes.title {
            Some(title) if *title != current.title => slugify(title, suffixed),
            _ => current.slug.clone(),
        };
        let content = ArticleContent {
            slug: &new_slug,
            title: changes.title.as_deref().unwrap_or(&current.title),
            description: changes.description.as_deref().unwrap_or(&current.description),
            body: changes.body.as_deref().unwrap_or(&current.body),
        };
        update_article_in_db(&mut tx, current.id, content, Utc::now()).await?;

        let article = load_article(&mut tx, Some(caller_id), &new_slug).await?;
        tx.commit().await?;
        Ok(article)
    }

    pub async fn delete(&self, caller_id: i64, slug: &str) -> Result<(), RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let article = find_ref(&mut tx, slug).await?;
        if article.author_id != caller_id {
            return Err(RequestError::Forbidden("Only the author can delete this article"));
        }
        delete_article_in_db(&mut tx, article.id).await?;
        tx.commit().await?;
        info!(article_id = article.id, slug, "deleted article");
        Ok(())
    }

    pub async fn favorite(&self, user_id: i64, slug: &str) -> Result<Article, RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let article = find_ref(&mut tx, slug).await?;
        favourite_article_in_db(&mut tx, user_id, article.id, Utc::now()).await?;
        let article = load_article(&mut tx, Some(user_id), slug).await?;
        tx.commit().await?;
        Ok(article)
    }

    pub async fn unfavorite(&self, user_id: i64, slug: &str) -> Result<Article, RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let article = find_ref(&mut tx, slug).await?;
        unfavourite_article_in_db(&mut tx, user_id, article.id).await?;
        let article = load_article(&mut tx, Some(user_id), slug).await?;
        tx.commit().await?;
        Ok(article)
    }

    /// One page of matching articles, newest first, plus the total number of
    /// matches.
    pub async fn list(
        &self,
        viewer: Option<i64>,
        filter: &ArticleFilter,
        page: Page,
    ) -> Result<(Vec<Article>, i64), RequestError> {
        let mut tx = self.db.reader.begin().await?;
        let rows = list_articles_in_db(&mut tx, viewer, filter, page).await?;
        let articles = with_tags(&mut tx, rows).await?;
        let count = count_articles_in_db(&mut tx, filter).await?;
        tx.commit().await?;
        Ok((articles, count))
    }

    /// Articles by authors the reader follows, newest first.
    pub async fn feed(&self, reader: i64, page: Page) -> Result<(Vec<Article>, i64), RequestError> {
        let mut tx = self.db.reader.begin().await?;
        let rows = list_feed_in_db(&mut tx, reader, page).await?;
        let articles = with_tags(&mut tx, rows).await?;
        let count = count_feed_in_db(&mut tx, reader).await?;
        tx.commit().await?;
        Ok((articles, count))
    }
}

async fn find_ref(conn: &mut SqliteConnection, slug: &str) -> Result<ArticleRef, RequestError> {
    get_article_ref_by_slug(conn, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))
}

async fn load_article(
    conn: &mut SqliteConnection,
    viewer: Option<i64>,
    slug: &str,
) -> Result<Article, RequestError> {
    let row = get_article_by_slug_in_db(conn, viewer, slug)
        .await?
        .ok_or(RequestError::NotFound("Article not found"))?;
    let tags = get_article_tags_in_db(conn, row.id).await?;
    Ok(row.into_article(tags))
}

async fn with_tags(
    conn: &mut SqliteConnection,
    rows: Vec<ArticleRow>,
) -> Result<Vec<Article>, sqlx::Error> {
    let mut articles = Vec::with_capacity(rows.len());
    for row in rows {
        let tags = get_article_tags_in_db(conn, row.id).await?;
        articles.push(row.into_article(tags));
    }
    Ok(articles)
}
