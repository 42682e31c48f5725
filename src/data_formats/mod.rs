mod request;
mod response;
mod wrapper;

pub use request::*;
pub use response::*;
pub use wrapper::*;

use serde::{Deserialize, Serialize};

use crate::{
    models::{ArticleFilter, Page},
    utils::non_blank,
};

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct ArticleQueryParams {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub favorited: Option<String>,
    #[serde(default = "get_default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Deserialize, Serialize, Debug)]
pub struct FeedQueryParams {
    #[serde(default = "get_default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn get_default_limit() -> u32 {
    20
}

/// Blank filter values mean "don't filter".
fn filter_value(value: Option<String>) -> Option<String> {
    value.filter(|value| non_blank(value).is_some())
}

impl ArticleQueryParams {
    pub fn into_parts(self) -> (ArticleFilter, Page) {
        let filter = ArticleFilter {
            tag: filter_value(self.tag),
            author: filter_value(self.author),
            favorited: filter_value(self.favorited),
        };
        (filter, Page::new(self.offset, self.limit))
    }
}

impl FeedQueryParams {
    pub fn page(&self) -> Page {
        Page::new(self.offset, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filters_are_dropped() {
        let params = ArticleQueryParams {
            tag: Some(String::new()),
            author: Some("  ".into()),
            favorited: Some("jake".into()),
            limit: 5,
            offset: 10,
        };
        let (filter, page) = params.into_parts();
        assert_eq!(filter.tag, None);
        assert_eq!(filter.author, None);
        assert_eq!(filter.favorited.as_deref(), Some("jake"));
        assert_eq!(page.limit, 5);
        assert_eq!(page.offset, 10);
    }
}
