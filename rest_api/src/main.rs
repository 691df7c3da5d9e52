// rest_api/src/main.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notifications::{LogMailer, Mailer, SmtpMailer};
use reports::JobTracker;
use rest_api::{load_server_config, start_server, AppState};
use security::TokenAuthority;
use storage::HospitalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_server_config(None).context("Failed to load server configuration")?;

    let store = Arc::new(
        HospitalStore::open(&config.data_directory).with_context(|| {
            format!("Failed to open database at {}", config.data_directory)
        })?,
    );
    if store.seed_admin()?.is_some() {
        info!("created default admin account on first startup");
    }

    let mailer: Arc<dyn Mailer> = if config.mail.is_configured() {
        match SmtpMailer::from_config(&config.mail) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                warn!(error = %e, "SMTP transport unavailable, falling back to log-only mail");
                Arc::new(LogMailer)
            }
        }
    } else {
        info!("mail transport not configured, notifications will be logged only");
        Arc::new(LogMailer)
    };

    let state = AppState {
        store: store.clone(),
        tokens: TokenAuthority::new(&config.jwt_secret, config.token_ttl_secs),
        mailer: mailer.clone(),
        jobs: Arc::new(JobTracker::new()),
        reports_dir: PathBuf::from(&config.reports_directory),
    };

    // Reminder and digest mails run on their own task for the life of the
    // process.
    let _beat = reports::spawn_beat(store, mailer);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    start_server(state, addr, shutdown_rx).await
}
