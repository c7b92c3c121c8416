mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memscan_client::config_manager::{Config, ConfigLoader};
use memscan_client::flows::{DumpFlow, ScanFlow};
use memscan_common::platform::Platform;
use memscan_common::recorder::ResultRecorder;
use memscan_common::target_process::NamePattern;
use memscan_common::types::flow::{DumpRequest, FlowResult, ScanRequest};
use memscan_engine::signature::SignatureSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "memscan", about = "Process memory scan and dump agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file to use instead of the user-level one.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan matching processes against a signature ruleset.
    Scan {
        /// JSON ruleset file.
        #[arg(long)]
        rules: PathBuf,

        /// Process-name prefix; defaults to the platform's agent binary.
        #[arg(long)]
        pattern: Option<String>,

        /// Rule matches kept per process.
        #[arg(long)]
        cap: Option<usize>,

        /// Per-process scan deadline in milliseconds.
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Derive the default pattern for this platform instead of the
        /// current one.
        #[arg(long, value_enum)]
        platform: Option<Platform>,
    },

    /// Dump the memory of matching processes to part files.
    Dump {
        #[arg(long)]
        pattern: Option<String>,

        /// Rotate part files at this many bytes.
        #[arg(long)]
        byte_limit: Option<u64>,

        /// Skip regions larger than this many bytes.
        #[arg(long)]
        max_region_size: Option<u64>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[arg(long, value_enum)]
        platform: Option<Platform>,
    },

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.log_file.as_deref())?;

    let config = ConfigLoader::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan {
            rules,
            pattern,
            cap,
            deadline_ms,
            platform,
        } => {
            let signatures = SignatureSet::load(&rules)
                .with_context(|| format!("failed to load ruleset {}", rules.display()))?;
            let request = ScanRequest {
                pattern: resolve_pattern(pattern, platform, &config),
                max_results_per_process: cap.unwrap_or(config.max_results_per_process),
                deadline: deadline_ms
                    .map(Duration::from_millis)
                    .or_else(|| config.scan_deadline()),
            };
            run_scan(signatures, request, &config).await
        }
        Command::Dump {
            pattern,
            byte_limit,
            max_region_size,
            output_dir,
            platform,
        } => {
            let request = DumpRequest {
                pattern: resolve_pattern(pattern, platform, &config),
                byte_limit: Some(byte_limit.unwrap_or(config.dump_byte_limit)),
                max_region_size: max_region_size.or(config.max_region_size),
                output_dir: output_dir.unwrap_or_else(|| config.output_dir.clone()),
            };
            run_dump(request, &config).await
        }
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn resolve_pattern(
    pattern: Option<String>,
    platform: Option<Platform>,
    config: &Config,
) -> NamePattern {
    match pattern {
        Some(prefix) => NamePattern::new(prefix),
        None => config
            .binary_names
            .scan_pattern(platform.unwrap_or_else(Platform::current)),
    }
}

async fn run_scan(signatures: SignatureSet, request: ScanRequest, config: &Config) -> Result<()> {
    let (recorder, rx) = ResultRecorder::channel(config.result_channel_capacity);
    let printer = spawn_printer(rx);

    let flow = ScanFlow::new(
        Arc::new(signatures),
        request,
        config.chunk_size,
        recorder,
        cancel_on_ctrl_c(),
    );
    let summary = flow.run().await?;

    let printed = printer.await.context("result printer failed")??;
    info!(
        matched = summary.matched,
        emitted = summary.emitted,
        failed = summary.failed,
        printed,
        "scan complete"
    );
    Ok(())
}

async fn run_dump(request: DumpRequest, config: &Config) -> Result<()> {
    let (recorder, rx) = ResultRecorder::channel(config.result_channel_capacity);
    let printer = spawn_printer(rx);

    let flow = DumpFlow::new(request, config.chunk_size, recorder, cancel_on_ctrl_c());
    let summary = flow.run().await?;

    let printed = printer.await.context("result printer failed")??;
    info!(
        matched = summary.matched,
        emitted = summary.emitted,
        failed = summary.failed,
        printed,
        "dump complete"
    );
    Ok(())
}

/// Prints each flow record as one JSON line on stdout, in stream order.
fn spawn_printer(rx: Receiver<FlowResult>) -> JoinHandle<Result<usize>> {
    tokio::spawn(async move {
        let mut stream = ReceiverStream::new(rx);
        let mut printed = 0usize;
        while let Some(record) = stream.next().await {
            println!("{}", serde_json::to_string(&record)?);
            printed += 1;
        }
        Ok(printed)
    })
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping in-flight work");
            token.cancel();
        }
    });
    cancel
}
