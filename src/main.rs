use std::net::SocketAddr;

use circleboard::config::ServerConfig;
use circleboard::{ServeError, routes, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("failed to load .env: {e}");
        }
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env()?;
    let addr = SocketAddr::new(config.bind_addr, config.port);
    let prefix = config.path_prefix.clone();
    let state = state::AppState::new(config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, %prefix, "circleboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}
