use chrono::Utc;
use clap::Parser;
use mimalloc::MiMalloc;
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use tiergate_internal::config::{Config, Credentials, GenerationConfig};
use tiergate_internal::dispatcher::Dispatcher;
use tiergate_internal::endpoints::{self, StatusState};
use tiergate_internal::generation::{Generators, HuggingFaceBackend};
use tiergate_internal::membership::MembershipCache;
use tiergate_internal::menu::MenuPresenter;
use tiergate_internal::observability::{self, LogFormat};
use tiergate_internal::router::ConversationRouter;
use tiergate_internal::store::CoreStore;
use tiergate_internal::transport::TelegramClient;
use tiergate_internal::usage_limit::{QuotaPolicy, UsageLedger};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Use the `tiergate.toml` config file at the specified path
    #[arg(long)]
    config_file: PathBuf,

    /// Sets the log format used for all bot logs.
    #[arg(long)]
    #[arg(value_enum)]
    #[clap(default_value_t = LogFormat::default())]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    observability::setup_observability(args.log_format).expect_pretty("Failed to set up logs");

    let config = Config::load_and_verify_from_path(&args.config_file)
        .ok() // Already logged when the error was constructed
        .expect_pretty("Failed to load config");
    let credentials = Credentials::from_env()
        .ok()
        .expect_pretty("Failed to read credentials");

    tracing::info!(
        "Starting {} with {} required groups",
        config.bot.name,
        config.membership.groups.len()
    );

    let telegram = Arc::new(
        TelegramClient::new(&config.telegram, credentials.telegram_token.clone())
            .ok()
            .expect_pretty("Failed to build Telegram client"),
    );
    // Long polling is rejected while a webhook is registered
    telegram
        .delete_webhook()
        .await
        .ok()
        .expect_pretty("Failed to delete Telegram webhook");

    let ledger = Arc::new(UsageLedger::new(config.usage.retention_days));
    let membership = Arc::new(MembershipCache::new(&config.membership, telegram.clone()));
    let store = Arc::new(CoreStore::new(ledger.clone(), membership.clone()));
    let policy = QuotaPolicy::new(&config.limits, membership.clone(), ledger.clone());
    let presenter = MenuPresenter::new(
        config.bot.name.clone(),
        &config.membership.groups,
        &config.limits,
    );
    let generators = build_generators(&config.generation, &credentials);
    let router = Arc::new(ConversationRouter::new(
        store,
        policy,
        presenter,
        generators,
        config.generation.timeout(),
    ));

    let status_state = StatusState {
        bot_name: config.bot.name.clone(),
        groups: Arc::new(config.membership.groups.clone()),
        ledger,
        membership,
        started_at: Utc::now(),
    };
    let app = endpoints::status_router(status_state).layer(
        TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
    );

    let bind_address = config.bot.bind_address;
    let listener = match tokio::net::TcpListener::bind(bind_address).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            tracing::error!(
                "Failed to bind to socket address {bind_address}: {e}. Tip: Ensure no other process is using port {} or try a different port.",
                bind_address.port()
            );
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Failed to bind to socket address {bind_address}: {e}");
            std::process::exit(1);
        }
    };
    // This will give us the chosen port if the config specified a port of 0
    let actual_bind_address = listener
        .local_addr()
        .expect_pretty("Failed to get bind address from listener");

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(true);
    });

    let server = tokio::spawn({
        let stop_rx = stop_rx.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(stopped(stop_rx))
                .await
        }
    });

    tracing::info!(
        "{} status endpoints are listening on {actual_bind_address}; polling Telegram for updates",
        config.bot.name
    );

    Dispatcher::new(telegram, router)
        .run(stopped(stop_rx))
        .await;

    server
        .await
        .expect_pretty("Status server task panicked")
        .expect_pretty("Failed to start server");
    tracing::info!("{} stopped", config.bot.name);
}

/// Placeholder acknowledgments everywhere, upgraded to Hugging Face for the
/// features that have a model configured and a token available.
fn build_generators(config: &GenerationConfig, credentials: &Credentials) -> Generators {
    let mut generators = Generators::placeholder();
    let Some(token) = &credentials.huggingface_token else {
        tracing::info!("No Hugging Face token set; all features answer with placeholders");
        return generators;
    };

    if let Some(model) = &config.text_model {
        tracing::info!("Chat replies are served by `{model}`");
        generators.text = Arc::new(HuggingFaceBackend::new(config, token.clone(), model));
    }
    if let Some(model) = &config.image_model {
        tracing::info!("Images are served by `{model}`");
        generators.image = Arc::new(HuggingFaceBackend::new(config, token.clone(), model));
    }
    generators
}

async fn stopped(mut stop_rx: watch::Receiver<bool>) {
    // A dropped sender also means shutdown
    let _ = stop_rx.wait_for(|stop| *stop).await;
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect_pretty("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect_pretty("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(unix)]
    let hangup = async {
        signal::unix::signal(signal::unix::SignalKind::hangup())
            .expect_pretty("Failed to install SIGHUP handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
        _ = hangup => {
            tracing::info!("Received SIGHUP signal");
        }
    };
}

/// ┌──────────────────────────────────────────────────────────────────────────┐
/// │                           MAIN.RS ESCAPE HATCH                           │
/// └──────────────────────────────────────────────────────────────────────────┘
///
/// Only `expect_pretty` may end the process, and only while main.rs is
/// starting up. Everything past initialization handles its errors.
trait ExpectPretty<T> {
    fn expect_pretty(self, msg: &str) -> T;
}

impl<T, E: Display> ExpectPretty<T> for Result<T, E> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("{msg}: {err}");
                std::process::exit(1);
            }
        }
    }
}

impl<T> ExpectPretty<T> for Option<T> {
    fn expect_pretty(self, msg: &str) -> T {
        match self {
            Some(value) => value,
            None => {
                tracing::error!("{msg}");
                std::process::exit(1);
            }
        }
    }
}
