use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use appwatch::data::duration::{format_duration, parse_duration};
use appwatch::{
    ConnectionStatus, HttpTransport, MetricSnapshot, ResourceView, Settings, StaticToken,
    StreamRegistry,
};

/// Bar levels for sparklines, lowest first.
const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Parser, Debug)]
#[command(name = "appwatch")]
#[command(about = "Stream live metrics of a monitored cloud application")]
struct Args {
    /// Id of the resource to watch
    #[arg(short, long)]
    resource: String,

    /// Collector type: compute-instance, object-store, serverless-function
    /// (or ec2, s3, lambda)
    #[arg(short, long)]
    collector: String,

    /// Path to a TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides backend.endpoint)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Bearer token (overrides backend.token)
    #[arg(short, long)]
    token: Option<String>,

    /// Delay between reconnect attempts (e.g., "5s", "500ms")
    #[arg(long)]
    retry_delay: Option<String>,

    /// Log level for appwatch itself; RUST_LOG takes precedence when set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let settings = load_settings(&args)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(run(&args, settings))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("appwatch={},appwatch_adapters={}", level, level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings file and environment, then command-line overrides.
fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;

    if let Some(endpoint) = &args.endpoint {
        settings.backend.endpoint = endpoint.trim_end_matches('/').to_string();
    }
    if let Some(token) = &args.token {
        settings.backend.token = Some(token.clone());
    }
    if let Some(delay) = &args.retry_delay {
        settings.stream.retry_delay =
            parse_duration(delay).with_context(|| format!("invalid --retry-delay '{}'", delay))?;
    }

    Ok(settings)
}

/// Watch one resource until Ctrl-C.
async fn run(args: &Args, settings: Settings) -> Result<()> {
    let transport = Arc::new(HttpTransport::new(settings.backend_adapter()?));
    let registry = StreamRegistry::new(transport)
        .with_credentials(StaticToken(settings.backend.token.clone()))
        .with_options(settings.stream_options());

    let view = registry.open(&args.resource, &args.collector)?;
    println!(
        "Watching {} ({}) at {}, retrying every {}",
        view.resource_id(),
        view.collector_type(),
        settings.backend.endpoint,
        format_duration(settings.stream.retry_delay)
    );

    let mut status = view.status_receiver();
    let mut snapshots = view.store().subscribe();
    print_status(&view, &status.borrow_and_update().clone());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                print_status(&view, &current);
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *snapshots.borrow_and_update();
                if let Some(snapshot) = current {
                    print_snapshot(&view, &snapshot);
                }
            }
        }
    }

    registry.close_all();
    println!("Stopped watching {}", view.resource_id());
    Ok(())
}

fn print_status(view: &ResourceView, status: &ConnectionStatus) {
    let indicator = status.indicator(view.snapshot().is_some());
    match &status.error {
        Some(error) => println!(
            "[{}] {} ({}, attempt {})",
            indicator.symbol(),
            status.state,
            error,
            status.attempt
        ),
        None => println!("[{}] {}", indicator.symbol(), status.state),
    }
}

fn print_snapshot(view: &ResourceView, snapshot: &MetricSnapshot) {
    let history = view.store().history();
    let fields: Vec<String> = snapshot
        .channel_values()
        .into_iter()
        .map(|(metric, value)| {
            format!(
                "{} {} {}",
                metric.label(),
                format_value(value),
                sparkline(&history.sparkline(metric))
            )
            .trim_end()
            .to_string()
        })
        .collect();

    println!("[{}] {}", view.indicator().symbol(), fields.join(" | "));
}

fn sparkline(levels: &[u8]) -> String {
    levels
        .iter()
        .map(|&level| SPARK_CHARS[(level as usize).min(SPARK_CHARS.len() - 1)])
        .collect()
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
