mod ws;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use corkboard_core::ServerConfig;
use corkboard_persistence::{BoardStore, MemoryBoardStore};
use corkboard_sync::{AuthedUser, Dispatcher, Gatekeeper, RoomRegistry, RosterAuthorizer, SyncEngine};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use ws::AppState;

#[derive(Parser)]
#[command(name = "corkboard-server", version, about = "Real-time collaborative kanban board server")]
struct Cli {
    /// Address to listen on (overrides the config file)
    #[arg(long)]
    listen_addr: Option<String>,

    /// Snapshot file for durable state (overrides the config file)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Create a board with this title, owned by every configured user
    #[arg(long)]
    seed_board: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load_from(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?,
        None => ServerConfig::load(),
    };
    if cli.listen_addr.is_some() {
        config.listen_addr = cli.listen_addr;
    }
    if cli.data_file.is_some() {
        config.data_file = cli.data_file;
    }

    let store = Arc::new(match &config.data_file {
        Some(path) => MemoryBoardStore::restore(path).await?,
        None => MemoryBoardStore::new(),
    });

    if let Some(title) = &cli.seed_board {
        let members = config.users.iter().map(|u| u.id).collect();
        let board = store.create_board(title, members).await?;
        tracing::info!("Seeded board '{}' with id {}", board.title, board.id);
    }
    for board in store.list_boards().await {
        tracing::info!("Serving board '{}' ({})", board.title, board.id);
    }

    let mut authorizer = RosterAuthorizer::new(store.clone() as Arc<dyn BoardStore>);
    for entry in &config.users {
        authorizer = authorizer.with_token(
            entry.token.clone(),
            AuthedUser {
                id: entry.id,
                username: entry.name.clone(),
            },
        );
    }

    let rooms = Arc::new(RoomRegistry::new());
    let gatekeeper = Arc::new(Gatekeeper::new(Arc::new(authorizer), Arc::clone(&rooms)));
    let engine = SyncEngine::new(
        store as Arc<dyn BoardStore>,
        Arc::clone(&gatekeeper),
        Dispatcher::new(Arc::clone(&rooms)),
    );

    let state = AppState {
        engine,
        gatekeeper,
        rooms,
    };
    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let addr = config.effective_listen_addr();
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
