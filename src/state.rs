use std::sync::Arc;

use crate::{
    authentication::TokenKeys,
    config::Config,
    services::{ArticleService, CommentService, IdentityService, TagService},
    Database,
};

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    pub keys: Arc<TokenKeys>,
    pub identity: IdentityService,
    pub tags: TagService,
    pub articles: ArticleService,
    pub comments: CommentService,
}

impl AppState {
    pub fn new(db: Database, keys: TokenKeys) -> Self {
        let keys = Arc::new(keys);
        let tags = TagService::new(db.clone());
        Self {
            identity: IdentityService::new(db.clone(), keys.clone()),
            articles: ArticleService::new(db.clone(), tags.clone()),
            comments: CommentService::new(db),
            tags,
            keys,
        }
    }

    pub fn from_config(db: Database, config: &Config) -> Self {
        let keys = TokenKeys::new(
            &config.jwt_secret,
            time::Duration::days(config.jwt_expiry_days),
        );
        Self::new(db, keys)
    }
}
