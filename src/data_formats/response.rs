use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Article, Comment, Profile, User};

#[derive(Deserialize, Serialize, Debug)]
pub struct UserResponse {
    pub email: String,
    pub token: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct ProfileResponse {
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub following: bool,
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResponse {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: ProfileResponse,
}

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub body: String,
    pub author: ProfileResponse,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl UserResponse {
    pub fn new(
        User {
            username,
            email,
            bio,
            image,
            ..
        }: User,
        token: String,
    ) -> Self {
        UserResponse {
            username,
            email,
            bio,
            image,
            token,
        }
    }
}

impl From<Profile> for ProfileResponse {
    fn from(
        Profile {
            username,
            bio,
            image,
            following,
        }: Profile,
    ) -> Self {
        ProfileResponse {
            username,
            bio,
            image,
            following,
        }
    }
}

impl From<Comment> for CommentResponse {
    fn from(
        Comment {
            id,
            body,
            created_at,
            updated_at,
            author,
        }: Comment,
    ) -> Self {
        CommentResponse {
            id,
            created_at: timestamp(created_at),
            updated_at: timestamp(updated_at),
            body,
            author: author.into(),
        }
    }
}

impl From<Article> for ArticleResponse {
    fn from(
        Article {
            slug,
            title,
            description,
            body,
            tag_list,
            created_at,
            updated_at,
            favorited,
            favorites_count,
            author,
            ..
        }: Article,
    ) -> Self {
        ArticleResponse {
            slug,
            title,
            description,
            body,
            tag_list,
            created_at: timestamp(created_at),
            updated_at: timestamp(updated_at),
            favorited,
            favorites_count,
            author: author.into(),
        }
    }
}
