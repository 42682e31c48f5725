use serde::{Deserialize, Serialize};

use crate::services::{ArticleChanges, NewArticle, NewUser, UserChanges};

// ----------------- User Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl From<RegisterRequest> for NewUser {
    fn from(RegisterRequest { email, password, username }: RegisterRequest) -> Self {
        NewUser {
            email,
            username,
            password,
        }
    }
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        UserChanges {
            email: request.email,
            username: request.username,
            password: request.password,
            bio: request.bio,
            image: request.image,
        }
    }
}

// ----------------- Article Request -----------------
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Default)]
#[serde(default)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

impl From<CreateArticleRequest> for NewArticle {
    fn from(request: CreateArticleRequest) -> Self {
        NewArticle {
            title: request.title,
            description: request.description,
            body: request.body,
            tag_list: request.tag_list,
        }
    }
}

impl From<UpdateArticleRequest> for ArticleChanges {
    fn from(request: UpdateArticleRequest) -> Self {
        ArticleChanges {
            title: request.title,
            description: request.description,
            body: request.body,
        }
    }
}

// ----------------- Comment Request -----------------
#[derive(Deserialize, Serialize, Debug)]
pub struct CommentRequest {
    pub body: String,
}
