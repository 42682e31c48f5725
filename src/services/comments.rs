use chrono::Utc;
use tracing::info;

use crate::{
    db_helpers::{
        add_comments_to_article_in_db, delete_comment_in_db, get_article_ref_by_slug,
        get_comment_in_db, get_comments_for_article_in_db,
    },
    errors::RequestError,
    models::Comment,
    Database,
};

use super::required_field;

#[derive(Clone)]
pub struct CommentService {
    db: Database,
}

impl CommentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, author_id: i64, slug: &str, body: &str) -> Result<Comment, RequestError> {
        let body = required_field(body, "body")?;
        let mut tx = self.db.writer.begin().await?;
        let article = get_article_ref_by_slug(&mut tx, slug)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))?;
        let id = add_comments_to_article_in_db(&mut tx, author_id, article.id, &body, Utc::now())
            .await?;
        let comment = get_comment_in_db(&mut tx, Some(author_id), id)
            .await?
            .ok_or(RequestError::NotFound("Comment not found"))?;
        tx.commit().await?;
        Ok(comment.into())
    }

    /// Comments on the article, oldest first.
    pub async fn list(&self, viewer: Option<i64>, slug: &str) -> Result<Vec<Comment>, RequestError> {
        let mut tx = self.db.reader.begin().await?;
        let article = get_article_ref_by_slug(&mut tx, slug)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))?;
        let comments = get_comments_for_article_in_db(&mut tx, viewer, article.id).await?;
        tx.commit().await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    /// Deletes a comment of the article at `slug`. The author check happens
    /// before anything is removed.
    pub async fn delete(&self, user_id: i64, slug: &str, comment_id: i64) -> Result<(), RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let article = get_article_ref_by_slug(&mut tx, slug)
            .await?
            .ok_or(RequestError::NotFound("Article not found"))?;
        let comment = get_comment_in_db(&mut tx, None, comment_id)
            .await?
            .filter(|comment| comment.article_id == article.id)
            .ok_or(RequestError::NotFound("Comment not found"))?;
        if comment.author_id != user_id {
            return Err(RequestError::Forbidden("You can only delete your own comments"));
        }
        delete_comment_in_db(&mut tx, comment_id).await?;
        tx.commit().await?;
        info!(comment_id, slug, "deleted comment");
        Ok(())
    }
}
