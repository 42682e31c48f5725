use std::{net::TcpListener, sync::Arc};

use anyhow::Context;
use conduit::{config::Config, init_db, make_router, run_app, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("conduit=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let db = init_db(&config.database_url).await?;
    let app = Arc::new(AppState::from_config(db, &config));

    let address = config.address();
    let listener =
        TcpListener::bind(address).with_context(|| format!("could not bind to {address}"))?;
    run_app(make_router(app), listener).await
}
