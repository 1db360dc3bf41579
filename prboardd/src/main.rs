mod aggregate;
mod app;
mod config;
mod gh_client;
mod refresh;
mod sink;
mod store;

use std::sync::Arc;

use app::AppState;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use config::{config_path, load_config, Config};
use gh_client::GithubClient;
use log::info;
use sink::PersistenceSink;
use store::{DocumentStore, JsonFileStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(help = "path to config file, also set by PRBOARD_CONFIG_FILE env variable")]
    config: Option<String>,
}

async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>, store::StoreError> {
    let store: Arc<dyn DocumentStore> = match &config.store_file {
        Some(path) => {
            info!("Persisting pull requests to {}", path.display());
            Arc::new(JsonFileStore::open(path).await?)
        }
        None => {
            info!("No store_file configured, pull requests are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(store)
}

async fn serve(config: Config, github_client: GithubClient, sink: PersistenceSink) {
    let address = config.bind_address();

    let app_state = Arc::new(AppState {
        config,
        github_client,
        sink,
    });

    let app = Router::new()
        .route("/refresh", post(app::refresh))
        .route("/pull-requests", get(app::pull_requests))
        .route("/metadata", get(app::metadata))
        .with_state(app_state);

    info!("Listening on {address}");
    axum::Server::bind(&address.parse().expect("invalid host address"))
        .serve(app.into_make_service())
        .await
        .expect("failed to start axum service");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::init_with_env()?;
    let config = load_config(&config_path(Args::parse().config)).await?;
    let github_client = GithubClient::new(&config.github)?;
    let sink = PersistenceSink::new(open_store(&config).await?);

    serve(config, github_client, sink).await;

    Ok(())
}
