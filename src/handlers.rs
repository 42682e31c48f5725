use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use tracing::error;

use crate::{
    authentication::{AuthUser, MaybeUser},
    data_formats::*,
    errors::{RequestError, UnknownError},
    state::AppState,
};

type UserJson = UserWrapper<UserResponse>;
type ArticleJson = ArticleWrapper<ArticleResponse>;
type CommentJson = CommentWrapper<CommentResponse>;

type JsonResult<T> = Result<Json<T>, RequestError>;

/// `axum::Json`, with body rejections reported as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RequestError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(RequestError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(RequestError))]
pub struct PathParams<T>(pub T);

// ----------------- Helper Handlers -----------------
pub async fn alive() -> &'static str {
    "alive"
}

pub async fn not_found(uri: Uri) -> RequestError {
    tracing::debug!(%uri, "no route matched");
    RequestError::NotFound("Route not found")
}

/// Reports the detail of unclassified failures, which the response body hides.
pub async fn log_unknown_errors<B>(request: Request<B>, next: Next<B>) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;
    if let Some(UnknownError(detail)) = response.extensions().get::<UnknownError>() {
        error!(%method, %path, status = %response.status(), "{detail}");
    }
    response
}

// ----------------- User Handlers -----------------
pub async fn login_user(
    Extension(app): Extension<Arc<AppState>>,
    JsonBody(UserWrapper { user: request }): JsonBody<UserWrapper<LoginRequest>>,
) -> JsonResult<UserJson> {
    let authenticated = app.identity.login(&request.email, request.password).await?;
    let result = UserResponse::new(authenticated.user, authenticated.token);
    Ok(Json(UserWrapper::wrap_with_user_data(result)))
}

pub async fn register_user(
    Extension(app): Extension<Arc<AppState>>,
    JsonBody(UserWrapper { user: request }): JsonBody<UserWrapper<RegisterRequest>>,
) -> Result<(StatusCode, Json<UserJson>), RequestError> {
    let authenticated = app.identity.register(request.into()).await?;
    let result = UserResponse::new(authenticated.user, authenticated.token);
    Ok((
        StatusCode::CREATED,
        Json(UserWrapper::wrap_with_user_data(result)),
    ))
}

pub async fn get_current_user(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
) -> JsonResult<UserJson> {
    let authenticated = app.identity.current_user(id).await?;
    let result = UserResponse::new(authenticated.user, authenticated.token);
    Ok(Json(UserWrapper::wrap_with_user_data(result)))
}

pub async fn update_user(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, token }: AuthUser,
    JsonBody(UserWrapper { user: request }): JsonBody<UserWrapper<UpdateUserRequest>>,
) -> JsonResult<UserJson> {
    let user = app.identity.update_user(id, request.into()).await?;
    Ok(Json(UserWrapper::wrap_with_user_data(UserResponse::new(
        user, token,
    ))))
}

// ----------------- Profile Handlers -----------------
pub async fn get_profile(
    Extension(app): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    PathParams(username): PathParams<String>,
) -> JsonResult<ProfileWrapper> {
    let profile = app
        .identity
        .get_profile(maybe_user.get_id(), &username)
        .await?;
    Ok(Json(ProfileWrapper {
        profile: profile.into(),
    }))
}

pub async fn follow_user(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(username): PathParams<String>,
) -> JsonResult<ProfileWrapper> {
    let profile = app.identity.follow(id, &username).await?;
    Ok(Json(ProfileWrapper {
        profile: profile.into(),
    }))
}

pub async fn unfollow_user(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(username): PathParams<String>,
) -> JsonResult<ProfileWrapper> {
    let profile = app.identity.unfollow(id, &username).await?;
    Ok(Json(ProfileWrapper {
        profile: profile.into(),
    }))
}

// ----------------- Article Handlers -----------------
pub async fn list_articles(
    Extension(app): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    QueryParams(params): QueryParams<ArticleQueryParams>,
) -> JsonResult<MultipleArticlesWrapper> {
    let (filter, page) = params.into_parts();
    let (articles, article_count) = app
        .articles
        .list(maybe_user.get_id(), &filter, page)
        .await?;
    Ok(Json(MultipleArticlesWrapper {
        articles: articles.into_iter().map(Into::into).collect(),
        article_count,
    }))
}

pub async fn feed_articles(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    QueryParams(params): QueryParams<FeedQueryParams>,
) -> JsonResult<MultipleArticlesWrapper> {
    let (articles, article_count) = app.articles.feed(id, params.page()).await?;
    Ok(Json(MultipleArticlesWrapper {
        articles: articles.into_iter().map(Into::into).collect(),
        article_count,
    }))
}

pub async fn get_article(
    Extension(app): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    PathParams(slug): PathParams<String>,
) -> JsonResult<ArticleJson> {
    let article = app.articles.get(maybe_user.get_id(), &slug).await?;
    Ok(Json(ArticleWrapper {
        article: article.into(),
    }))
}

pub async fn create_article(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    JsonBody(ArticleWrapper { article: request }): JsonBody<ArticleWrapper<CreateArticleRequest>>,
) -> Result<(StatusCode, Json<ArticleJson>), RequestError> {
    let article = app.articles.create(id, request.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ArticleWrapper {
            article: article.into(),
        }),
    ))
}

pub async fn update_article(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(slug): PathParams<String>,
    JsonBody(ArticleWrapper { article: request }): JsonBody<ArticleWrapper<UpdateArticleRequest>>,
) -> JsonResult<ArticleJson> {
    let article = app.articles.update(id, &slug, request.into()).await?;
    Ok(Json(ArticleWrapper {
        article: article.into(),
    }))
}

pub async fn delete_article(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(slug): PathParams<String>,
) -> Result<StatusCode, RequestError> {
    app.articles.delete(id, &slug).await?;
    Ok(StatusCode::OK)
}

pub async fn favorite_article(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(slug): PathParams<String>,
) -> JsonResult<ArticleJson> {
    let article = app.articles.favorite(id, &slug).await?;
    Ok(Json(ArticleWrapper {
        article: article.into(),
    }))
}

pub async fn unfavorite_article(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(slug): PathParams<String>,
) -> JsonResult<ArticleJson> {
    let article = app.articles.unfavorite(id, &slug).await?;
    Ok(Json(ArticleWrapper {
        article: article.into(),
    }))
}

// ----------------- Comment Handlers -----------------
pub async fn add_comment(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams(slug): PathParams<String>,
    JsonBody(CommentWrapper { comment: request }): JsonBody<CommentWrapper<CommentRequest>>,
) -> Result<(StatusCode, Json<CommentJson>), RequestError> {
    let comment = app.comments.create(id, &slug, &request.body).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentWrapper {
            comment: comment.into(),
        }),
    ))
}

pub async fn get_comments(
    Extension(app): Extension<Arc<AppState>>,
    maybe_user: MaybeUser,
    PathParams(slug): PathParams<String>,
) -> JsonResult<MultipleCommentsWrapper> {
    let comments = app.comments.list(maybe_user.get_id(), &slug).await?;
    Ok(Json(MultipleCommentsWrapper {
        comments: comments.into_iter().map(Into::into).collect(),
    }))
}

pub async fn delete_comment(
    Extension(app): Extension<Arc<AppState>>,
    AuthUser { id, .. }: AuthUser,
    PathParams((slug, comment_id)): PathParams<(String, i64)>,
) -> Result<StatusCode, RequestError> {
    app.comments.delete(id, &slug, comment_id).await?;
    Ok(StatusCode::OK)
}

// ----------------- Tag Handlers -----------------
pub async fn get_tags(Extension(app): Extension<Arc<AppState>>) -> JsonResult<TagsWrapper> {
    let tags = app.tags.list_tags().await?;
    Ok(Json(TagsWrapper { tags }))
}
