use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::JsonResponse;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Detail of an unclassified failure, attached to the response so the
/// logging middleware can report it without leaking it into the body.
#[derive(Debug, Clone)]
pub struct UnknownError(pub String);

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJsonWrapper {
    pub errors: RequestErrorJson,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJson {
    pub body: Vec<String>,
}

impl RequestErrorJsonWrapper {
    pub fn new(error: &str) -> RequestErrorJsonWrapper {
        RequestErrorJsonWrapper {
            errors: RequestErrorJson {
                body: vec![error.to_string()],
            },
        }
    }
}

impl From<JsonRejection> for RequestError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for RequestError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

/// A path segment that does not parse names nothing that could exist.
impl From<PathRejection> for RequestError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound("Resource not found")
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let mut response = self.to_json_response().into_response();
        if self.is_unknown() {
            response
                .extensions_mut()
                .insert(UnknownError(self.to_string()));
        }
        response
    }
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RequestError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::Database(_) | RequestError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJsonWrapper> {
        let json = if self.is_unknown() {
            RequestErrorJsonWrapper::new("unknown error")
        } else {
            RequestErrorJsonWrapper::new(&self.to_string())
        };
        (self.status_code(), Json(json))
    }

    fn is_unknown(&self) -> bool {
        matches!(self, RequestError::Database(_) | RequestError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_errors_keep_their_message() {
        let (status, Json(body)) = RequestError::Forbidden("Not author").to_json_response();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.errors.body, vec!["Not author".to_string()]);

        let (status, Json(body)) =
            RequestError::Validation("email has already been taken".into()).to_json_response();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.errors.body, vec!["email has already been taken"]);
    }

    #[test]
    fn unknown_errors_hide_their_detail() {
        let error = RequestError::Database(sqlx::Error::PoolTimedOut);
        let (status, Json(body)) = error.to_json_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.errors.body, vec!["unknown error"]);

        let response = error.into_response();
        let detail = response.extensions().get::<UnknownError>().unwrap();
        assert!(detail.0.contains("database error"));
    }
}
