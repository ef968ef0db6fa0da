use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use oneroster_gradebook::config::{AppConfig, LogFormat};
use oneroster_gradebook::database::{MemoryStore, PgStore, RecordStore};
use oneroster_gradebook::{app, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Parser)]
#[command(name = "oneroster-gradebook")]
#[command(about = "OneRoster v1.2 gradebook service")]
#[command(version)]
struct Args {
    #[arg(long, help = "Bind address (overrides HOST)")]
    host: Option<String>,

    #[arg(long, help = "Bind port (overrides PORT)")]
    port: Option<u16>,

    #[arg(long, value_enum, default_value = "memory", help = "Record store backend")]
    store: StoreKind,

    #[arg(long, help = "Create the records table before serving (postgres only)")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, OAUTH_* etc.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config);
    tracing::info!("Starting OneRoster gradebook in {:?} mode", config.environment);

    let store: Arc<dyn RecordStore> = match args.store {
        StoreKind::Memory => {
            tracing::info!("using in-memory record store");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Postgres => {
            let url = config
                .database
                .url
                .clone()
                .context("DATABASE_URL is required for the postgres store")?;
            let store = PgStore::connect(&url, &config.database).await?;
            if args.migrate {
                store.migrate().await?;
                tracing::info!("records table migrated");
            }
            Arc::new(store)
        }
    };

    let state = AppState::new(config.clone(), store)?;

    if let Some(secs) = config.oauth.token_sweep_interval_secs {
        let tokens = state.tokens.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                let evicted = tokens.evict_expired(chrono::Utc::now());
                if evicted > 0 {
                    tracing::debug!("evicted {} expired tokens", evicted);
                }
            }
        });
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
