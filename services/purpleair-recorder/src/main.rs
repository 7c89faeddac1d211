use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use purpleair_recorder::{Config, InfluxSink, IngestPipeline, PipelineSettings, SensorClient};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "purpleair-recorder", about = "Record PurpleAir sensor readings")]
struct Cli {
    /// Append output to the log file (default)
    #[arg(long, global = true, overrides_with = "no_log")]
    log: bool,
    /// Send output to stderr instead of the log file
    #[arg(long, global = true, overrides_with = "log")]
    no_log: bool,
    /// Increase verbosity
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn logs_to_file(&self) -> bool {
        self.log || !self.no_log
    }
}

#[derive(Subcommand)]
enum Command {
    /// Record the current reading to the database
    RecordStatus {
        /// Don't write to the database
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Exit non-zero when the cycle fails
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(cli.verbose, cli.logs_to_file().then_some(config.log_file.as_path()))?;

    match cli.command {
        Command::RecordStatus { dry_run, strict } => {
            let client = SensorClient::new(config.http_timeout, &config.legacy_url, &config.api_url)
                .context("failed to build sensor http client")?;
            let sink = InfluxSink::new(&config.influx_url, &config.influx_db, config.http_timeout)
                .context("failed to build influx sink")?;
            let pipeline =
                IngestPipeline::new(client, sink, PipelineSettings::from_config(&config, dry_run));
            let outcome = pipeline.run().await;
            if !outcome.is_success() && (strict || config.strict_exit) {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into())
    };
    let registry = tracing_subscriber::registry().with(EnvFilter::new(filter));
    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty() && !d.exists()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        set_mode(dir, 0o755)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    set_mode(path, 0o644)?;
    Ok(file)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
