use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;

use sesam_server::auth::htpasswd::HtPasswd;
use sesam_server::auth::middleware::AuthGate;
use sesam_server::config::{generate_config_template, Config};
use sesam_server::domains::retention::RetentionSweeper;
use sesam_server::domains::store::BlobStore;
use sesam_server::{db, routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sesam_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("c't SESAM storage server v{} starting", env!("CARGO_PKG_VERSION"));

    let db = db::init_db(&config.data_dir)?;
    let store = BlobStore::new(db);

    tracing::info!("Parsing {} ...", config.credentials_file);
    let credentials = HtPasswd::load(Path::new(&config.credentials_file))?;
    if credentials.is_empty() {
        tracing::warn!("{} has no entries, every request will be rejected", config.credentials_file);
    } else {
        tracing::info!("Loaded {} credentials", credentials.len());
    }

    let sweeper = RetentionSweeper::spawn(store.clone(), config.sweep_config());

    let app_state = state::AppState {
        store,
        auth: AuthGate {
            credentials: Arc::new(credentials),
            realm: Arc::from(config.realm.as_str()),
        },
        store_timeout: config.store_timeout(),
        max_blob_bytes: config.max_blob_bytes(),
    };

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    sweeper.shutdown().await;

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
