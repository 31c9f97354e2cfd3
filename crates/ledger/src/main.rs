use std::{net::SocketAddr, sync::Arc};

use ledger::{
    build_router,
    config::{load_settings, prepare_database_url},
    AppState,
};
use processor::MarblesHandler;
use shared::address::Namespace;
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let handler = MarblesHandler::new(Namespace::marbles());
    info!(
        family = handler.family_name(),
        versions = ?handler.family_versions(),
        namespaces = ?handler.namespaces(),
        "registered transaction handler"
    );

    let app = build_router(Arc::new(AppState::new(storage, handler)));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "ledger node listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
