//! Business rules over the stores. Anything that writes goes through the
//! writer pool. Each call holds at most one connection or transaction and
//! reports typed [`RequestError`](crate::errors::RequestError)s.

mod articles;
mod comments;
mod identity;
mod tags;

pub use articles::{ArticleChanges, ArticleService, NewArticle};
pub use comments::CommentService;
pub use identity::{AuthenticatedUser, IdentityService, NewUser};
pub use tags::TagService;

pub use crate::db_helpers::UserChanges;

use crate::{errors::RequestError, utils::non_blank};

/// Trims a required text field, rejecting it when blank.
fn required_field(value: &str, field: &str) -> Result<String, RequestError> {
    non_blank(value)
        .map(str::to_owned)
        .ok_or_else(|| RequestError::Validation(format!("{field} can't be blank")))
}

/// Like [`required_field`] for fields that may be left out altogether.
fn optional_field(value: Option<String>, field: &str) -> Result<Option<String>, RequestError> {
    value.map(|value| required_field(&value, field)).transpose()
}
