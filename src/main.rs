//! Chart Indexer CLI
//!
//! Entry point for the `chart-indexer` command-line tool. The regenerated
//! index goes to stdout (or `--dst`); logs go to stderr.

use chart_indexer::{
    Config, ConfigError, ConfigLayer, ReconcileError, Reconciler, SignalHandler,
    EXIT_CODE_CANCELLED,
};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chart-indexer")]
#[command(about = "Reconcile a Helm repository index with the charts in a bucket", version)]
struct Cli {
    /// Bucket holding the charts: gs://name, a bare bucket name, or file:///dir
    #[arg(long, short = 'b')]
    bucket: Option<String>,

    /// Project whose charts are indexed (archive name prefix)
    #[arg(long, short = 'p')]
    project: Option<String>,

    /// Base URL for chart downloads (default: the bucket's public URL)
    #[arg(long)]
    url: Option<String>,

    /// Write the index to this file instead of stdout
    #[arg(long)]
    dst: Option<PathBuf>,

    /// Credential file: an OAuth2 access token, a service account key or
    /// authorized_user credentials (default: application default credentials)
    #[arg(long)]
    auth_path: Option<PathBuf>,

    /// Name of the existing index object in the bucket (default: index.yaml)
    #[arg(long)]
    index_object: Option<String>,

    /// Separator between project name and version (default: "-")
    #[arg(long)]
    delimiter: Option<String>,

    /// Storage API endpoint, e.g. for an emulator
    #[arg(long)]
    endpoint: Option<String>,

    /// Per-request timeout in seconds (default: 60)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// TOML file supplying defaults for any of the options above
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_layer(self) -> ConfigLayer {
        ConfigLayer {
            bucket: self.bucket,
            project: self.project,
            url: self.url,
            dst: self.dst,
            auth_path: self.auth_path,
            index_object: self.index_object,
            delimiter: self.delimiter,
            endpoint: self.endpoint,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    process::exit(run(&config));
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,chart_indexer={0},chart_index={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: Cli) -> Result<Config, ConfigError> {
    let file_layer = match &cli.config {
        Some(path) => ConfigLayer::from_file(path)?,
        None => ConfigLayer::default(),
    };
    Config::resolve(file_layer.merge(cli.into_layer()))
}

fn run(config: &Config) -> i32 {
    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        tracing::warn!(error = %e, "could not install signal handler");
    }

    let store = match config.open_store() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    tracing::info!(
        storage = %config.storage,
        project = %config.project,
        index = %config.index_object,
        "reconciling index"
    );

    let reconciler = Reconciler::new(config, &*store).with_cancel_token(signals.token());
    match reconciler.run() {
        Ok(report) => {
            if !report.changed() {
                tracing::info!("index entries already match storage");
            }
            0
        }
        Err(e @ ReconcileError::Cancelled { .. }) => {
            eprintln!("Error: {}; index not written", e);
            EXIT_CODE_CANCELLED
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
