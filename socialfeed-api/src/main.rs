use serde::Deserialize;
use socialfeed_db::{client::DbClient, config::DbConfig};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error connecting to the database: {0}")]
    DbConnect(#[from] sqlx::Error),
    #[error("Error running database migrations: {0}")]
    DbMigrate(#[from] sqlx::migrate::MigrateError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    db_max_connections: Option<u32>,
    db_min_connections: Option<u32>,
    db_idle_timeout_secs: Option<u64>,
    db_query_timeout_secs: Option<u64>,
    #[serde(default = "run_migrations_default")]
    run_migrations: bool,
}

fn run_migrations_default() -> bool {
    true
}

impl Env {
    /// Unset pool settings keep the [`DbConfig`] defaults.
    fn db_config(&self) -> DbConfig {
        let mut config = DbConfig::new(self.database_url.clone());
        if let Some(max_connections) = self.db_max_connections {
            config.max_connections = max_connections;
        }
        if let Some(min_connections) = self.db_min_connections {
            config.min_connections = min_connections;
        }
        if let Some(secs) = self.db_idle_timeout_secs {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.db_query_timeout_secs {
            config.query_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "socialfeed_api=debug,\
                socialfeed_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                error!(%err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let db_config = env.db_config();
    debug!(?db_config, "Connecting to database");
    let db_client = DbClient::connect(&db_config).await?;
    if env.run_migrations {
        db_client.migrate().await?;
        info!("Database migrations applied");
    }

    let state = server::ServerState {
        db_client: Arc::new(db_client),
    };
    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
