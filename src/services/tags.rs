use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_helpers::{get_tag_by_name, get_tags_in_db, insert_tag_if_absent},
    errors::RequestError,
    models::Tag,
    Database,
};

#[derive(Clone)]
pub struct TagService {
    db: Database,
}

impl TagService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn list_tags(&self) -> Result<Vec<String>, RequestError> {
        let mut conn = self.db.reader.acquire().await?;
        Ok(get_tags_in_db(&mut conn).await?)
    }

    /// Upserts `names` in a transaction of its own.
    pub async fn upsert_tags(&self, names: &[String]) -> Result<Vec<Tag>, RequestError> {
        let mut tx = self.db.writer.begin().await?;
        let tags = self.upsert_tags_in(&mut tx, names).await?;
        tx.commit().await?;
        Ok(tags)
    }

    /// Resolves every distinct name to its tag row, creating missing ones.
    /// Racing writers both insert-or-ignore and then re-read the winner's row.
    pub async fn upsert_tags_in(
        &self,
        conn: &mut SqliteConnection,
        names: &[String],
    ) -> Result<Vec<Tag>, sqlx::Error> {
        let names: BTreeSet<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .collect();

        let now = Utc::now();
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            insert_tag_if_absent(conn, name, now).await?;
            match get_tag_by_name(conn, name).await? {
                Some(tag) => tags.push(tag),
                None => return Err(sqlx::Error::RowNotFound),
            }
        }
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{app, file_app, register, TempDatabase};
    use crate::services::NewArticle;

    #[tokio::test]
    async fn upserting_reuses_existing_rows() {
        let app = app().await;
        let first = app
            .tags
            .upsert_tags(&["rust".into(), "web".into()])
            .await
            .unwrap();
        let second = app
            .tags
            .upsert_tags(&["web".into(), "web".into(), "sqlite".into()])
            .await
            .unwrap();

        let web_first = first.iter().find(|tag| tag.name == "web").unwrap();
        let web_second = second.iter().find(|tag| tag.name == "web").unwrap();
        assert_eq!(web_first.id, web_second.id);
        assert_eq!(second.len(), 2);

        assert_eq!(app.tags.list_tags().await.unwrap(), vec!["rust", "sqlite", "web"]);
    }

    #[tokio::test]
    async fn blank_names_are_skipped() {
        let app = app().await;
        let tags = app.tags.upsert_tags(&["".into(), "  ".into()]).await.unwrap();
        assert!(tags.is_empty());
        assert!(app.tags.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writers_share_one_new_tag() {
        let file = TempDatabase::new();
        let app = file_app(&file).await;
        let jake = register(&app, "jake").await;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let app = app.clone();
                let author_id = jake.user.id;
                tokio::spawn(async move {
                    let new_article = NewArticle {
                        title: format!("Fresh take {i}"),
                        description: "description".into(),
                        body: "body".into(),
                        tag_list: vec!["fresh".into(), format!("own-{i}")],
                    };
                    app.articles.create(author_id, new_article).await
                })
            })
            .collect();
        for task in tasks {
            let article = task.await.unwrap().unwrap();
            assert!(article.tag_list.contains(&"fresh".to_string()));
        }

        let tags = app.tags.list_tags().await.unwrap();
        assert_eq!(tags.iter().filter(|tag| *tag == "fresh").count(), 1);
        assert_eq!(tags.len(), 17);

        let fresh = app.tags.upsert_tags(&["fresh".into()]).await.unwrap();
        assert_eq!(fresh.len(), 1);
    }
}
