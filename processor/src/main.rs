use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use generator::profile::{write_log, GeneratorConfig};
use gui_bridge::bridge::{default_bind_address, ReportBridge};
use navlasercore::prelude::{LogFormat, SplitMode};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod generator;
mod gui_bridge;
mod workflow;

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Binary,
}

impl From<FormatArg> for LogFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => LogFormat::InterleavedText,
            FormatArg::Binary => LogFormat::BinaryWithMarkers,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitArg {
    Always,
    IfMissing,
    Never,
}

impl From<SplitArg> for SplitMode {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::Always => SplitMode::Always,
            SplitArg::IfMissing => SplitMode::IfMissing,
            SplitArg::Never => SplitMode::Never,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = "Navigation and laser-altimeter log processor")]
struct Args {
    /// Recorded log to ingest
    #[arg(long)]
    log: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,
    /// Laser sample rate in Hz; 0 disables laser ingestion
    #[arg(long)]
    laser_rate: Option<f64>,
    #[arg(long, value_enum)]
    split: Option<SplitArg>,
    /// Load a workflow config from YAML instead of the flags above
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Write the full result as JSON
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write a synthetic log to the log path before ingesting it
    #[arg(long, default_value_t = false)]
    synthesize: bool,
    #[arg(long, default_value_t = 200)]
    epochs: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Keep the report bridge alive for plotting clients
    #[arg(long, default_value_t = false)]
    serve: bool,
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Directory the bridge may ingest logs from; defaults to the log's directory
    #[arg(long)]
    ingest_root: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = match (&args.workflow, &args.log) {
        (Some(path), _) => WorkflowConfig::load(path)?,
        (None, Some(log)) => WorkflowConfig::from_args(
            log.clone(),
            args.format.into(),
            args.laser_rate,
            args.split.map(Into::into),
        ),
        (None, None) => bail!("either --log or --workflow is required"),
    };

    if args.synthesize {
        let generator = GeneratorConfig {
            format: workflow_config.format,
            seed: args.seed,
            epochs: args.epochs,
            ..Default::default()
        };
        write_log(&workflow_config.log, &generator)?;
        println!(
            "Synthesized {} epochs into {}",
            generator.epochs,
            workflow_config.log.display()
        );
    }

    let ingest_root = args
        .ingest_root
        .clone()
        .or_else(|| workflow_config.log.parent().map(PathBuf::from))
        .filter(|root| !root.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let runner = Runner::new(workflow_config);
    let result = runner.execute()?;
    for line in result.summary_lines() {
        println!("{}", line);
    }

    if let Some(report_path) = &args.report {
        if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating report directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&result).context("serializing report")?;
        fs::write(report_path, json)
            .with_context(|| format!("writing report {}", report_path.display()))?;
    }

    if args.serve {
        let bridge = ReportBridge::new(Arc::new(runner), ingest_root);
        bridge.publish(result);
        let address = args.bind.unwrap_or_else(default_bind_address);
        let _server = bridge.serve(address);
        println!("Report bridge running on {} (Ctrl+C to stop)...", address);
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
