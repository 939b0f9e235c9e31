mod api;
mod channels;
mod config;
mod delivery;
mod dispatcher;
mod error;
mod notification;
mod observers;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;

use delivery::{AttemptJournal, JournalEntry, RetryPolicy};
use dispatcher::Dispatcher;
use notification::{MetaValue, NotificationRequest};
use observers::{AnalyticsObserver, BillingObserver};

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Notification dispatch with retry, logging and delivery observers"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.herald/config.toml")]
    config: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config to ~/.herald/config.toml
    Init,
    /// List the enabled channel types
    Channels,
    /// Dispatch a single notification and print every attempt
    Send {
        message: String,
        /// Channel type, e.g. direct-message, short-message, push-alert
        #[arg(long)]
        channel: String,
        /// Recipient identifier for the channel
        #[arg(long)]
        to: String,
        /// Notification category used by analytics and billing
        #[arg(long = "type")]
        notification_type: Option<String>,
        /// Metadata entry as key=value (repeatable)
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Serve the HTTP API
    Serve,
}

struct Services {
    dispatcher: Dispatcher,
    analytics: Arc<AnalyticsObserver>,
    billing: Arc<BillingObserver>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Init => {
            let path = config::init_config_dir().await?;
            tracing::info!("Initialized {}", path.display());
        }
        Commands::Channels => {
            let cfg = config::load(&cli.config)?;
            let services = build(&cfg, None)?;
            for channel in services.dispatcher.channel_types() {
                println!("{channel}");
            }
        }
        Commands::Send {
            message,
            channel,
            to,
            notification_type,
            meta,
        } => {
            let cfg = config::load(&cli.config)?;
            let mut request = NotificationRequest::new(to, message, channel);
            if let Some(t) = notification_type {
                request = request.with_type(t);
            }
            for (key, value) in meta {
                request = request.with_metadata(key, meta_value(value));
            }
            if !send(&cfg, request).await? {
                std::process::exit(1);
            }
        }
        Commands::Serve => serve(&cli.config).await?,
    }
    Ok(())
}

fn build(cfg: &config::Config, journal: Option<Arc<AttemptJournal>>) -> Result<Services> {
    let analytics = Arc::new(AnalyticsObserver::new());
    let billing = Arc::new(BillingObserver::new(cfg.billing.clone()));
    let policy = RetryPolicy::from(&cfg.dispatch);
    tracing::debug!("Retry budget: {} attempts", policy.max_attempts());

    let mut builder = channels::register_builtin(Dispatcher::builder(), cfg)?
        .retry_policy(policy)
        .register_observer(analytics.clone())
        .register_observer(billing.clone());
    if let Some(journal) = journal {
        builder = builder.journal(journal);
    }

    Ok(Services {
        dispatcher: builder.build(),
        analytics,
        billing,
    })
}

/// Returns whether the notification was delivered.
async fn send(cfg: &config::Config, request: NotificationRequest) -> Result<bool> {
    let journal = Arc::new(AttemptJournal::new());
    let services = build(cfg, Some(journal.clone()))?;

    let outcome = services.dispatcher.dispatch(request).await;

    for entry in journal.entries() {
        match entry {
            JournalEntry::Attempt {
                channel,
                recipient,
                attempt,
                at,
            } => {
                let at = at.format("%H:%M:%S%.3f");
                println!("[{at}] attempt {attempt} via {channel} to {recipient}");
            }
            JournalEntry::Outcome {
                attempt,
                success,
                error,
                elapsed,
            } => {
                let status = if success { "ok" } else { "failed" };
                let detail = error.map(|e| format!(": {e}")).unwrap_or_default();
                println!("  attempt {attempt}: {status} in {elapsed:?}{detail}");
            }
        }
    }
    println!("{} attempt(s)", journal.attempts());
    match outcome.error() {
        None => {
            let cost = services.billing.total();
            println!("delivered (billed {cost})");
            Ok(true)
        }
        Some(e) => {
            eprintln!("not delivered: {e}");
            Ok(false)
        }
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = config::load(config_path)?;
    let services = build(&cfg, None)?;
    tracing::info!(
        "Channels: {}",
        services.dispatcher.channel_types().join(", ")
    );

    let state = api::AppState {
        dispatcher: Arc::new(services.dispatcher),
        analytics: services.analytics,
        billing: services.billing,
    };
    let listener = tokio::net::TcpListener::bind(&cfg.api.bind).await?;
    tracing::info!("herald listening on {}", cfg.api.bind);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Numeric-looking values become numbers, everything else stays text.
fn meta_value(raw: String) -> MetaValue {
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => MetaValue::Number(n),
        _ => MetaValue::Text(raw),
    }
}
