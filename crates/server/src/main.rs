use std::{net::SocketAddr, sync::Arc};

use tracing::info;

mod app_state;
mod config;
mod cookies;
mod routes;
mod views;

use app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = config::load_settings();
    // Fail fast: without an upstream URL and a cookie secret there is
    // nothing meaningful to serve.
    let validated = config::validate(settings)?;

    let state = AppState::from_settings(&validated);
    let app = routes::build_router(Arc::new(state));

    let addr: SocketAddr = validated.bind_addr.parse()?;
    info!(%addr, upstream = %validated.upstream_base_url, "campus-front listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
