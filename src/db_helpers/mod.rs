//! Table-level queries. Every helper takes a bare connection so callers decide
//! whether it runs inside a transaction or on a pooled connection.

mod article_helpers;
mod comment_helpers;
mod profile_helpers;
mod tag_helpers;
mod user_helpers;

pub use article_helpers::*;
pub use comment_helpers::*;
pub use profile_helpers::*;
pub use tag_helpers::*;
pub use user_helpers::*;
