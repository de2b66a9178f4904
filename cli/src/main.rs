//! Host driver for the coredump staging subsystem
//!
//! `init` runs the boot-time sequence against a device node or image file,
//! `capture` streams a file into the volume the way the failure handler
//! would (no restore first), and `status` reports whether a dump is pending.

mod producer;
mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coredump::header::read_header;
use coredump::{
    capture, is_enabled, CaptureOutcome, Coredump, FileBlockIo, FileRestorer, Platform,
    SystemPlatform, Volume,
};
use env_logger::Env;
use log::{error, info};
use producer::ReaderProducer;
use settings::{load_settings, Settings};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILTER: &str = "info,coredump=info";

#[derive(Parser, Debug, Clone)]
#[command(name = "coredump", version, about = "Stage crash dumps on a raw volume")]
pub struct Cli {
    /// Path to settings YAML; defaults apply when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// env_logger-style filter string (e.g. "info,coredump=debug"); overrides RUST_LOG/defaults
    #[arg(long)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Boot-time init: extract any pending dump and reclaim the volume
    Init,
    /// Stream a file into the volume as a crash snapshot
    Capture {
        /// Snapshot bytes to stage
        #[arg(long)]
        input: PathBuf,
    },
    /// Show the pending header, if any
    Status,
}

pub fn init_logging(cli_filter: Option<&str>) {
    let env = Env::default().default_filter_or(DEFAULT_LOG_FILTER);
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = cli_filter {
        builder.parse_filters(filter);
    }
    builder.format_timestamp_secs();
    builder.format(|buf, record| {
        let ts = buf.timestamp();
        writeln!(
            buf,
            "[{} {:<5} {}] {}",
            ts,
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_filter.as_deref());
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Init => run_init(&settings),
        Command::Capture { input } => run_capture(&settings, &input),
        Command::Status => run_status(&settings),
    }
}

fn bring_up(settings: &Settings) -> Result<(Coredump<FileBlockIo>, FileRestorer)> {
    let config = settings.config_store()?;
    let mut dump = Coredump::with_policy(settings.clear_policy.into());
    let mut restorer = FileRestorer::new(settings.restore_options());
    dump.init(
        config.as_ref(),
        || FileBlockIo::open(&settings.device, settings.sector_size),
        &mut restorer,
    )
    .with_context(|| format!("init coredump volume {}", settings.device.display()))?;
    Ok((dump, restorer))
}

fn run_init(settings: &Settings) -> Result<()> {
    let (mut dump, restorer) = bring_up(settings)?;
    match restorer.last_report() {
        Some(report) => println!(
            "extracted {} ({} of {} bytes)",
            report.path.display(),
            report.bytes_copied,
            report.payload_size
        ),
        None => println!("no dump extracted; state {:?}", dump.state()),
    }
    dump.shutdown();
    Ok(())
}

/// Stage `input` the way the failure handler would
///
/// The volume is opened directly, without the boot-time restore, so a dump
/// still pending from an earlier capture is kept and reported. Capture
/// failures are logged and dropped.
fn run_capture(settings: &Settings, input: &Path) -> Result<()> {
    let file = File::open(input).with_context(|| format!("open snapshot {}", input.display()))?;
    if !is_enabled(settings.config_store()?.as_ref()) {
        println!("capture disabled");
        return Ok(());
    }

    let device = FileBlockIo::open(&settings.device, settings.sector_size)
        .with_context(|| format!("open {}", settings.device.display()))?;
    let mut volume = Volume::open(device).context("probe volume geometry")?;
    let mut scratch = vec![0u8; volume.sector_size()];
    let mut producer = ReaderProducer::new(BufReader::new(file));
    let platform = SystemPlatform;
    info!("capturing {} as {}", input.display(), platform.identity().name());

    match capture(&mut volume, &mut scratch, &[], &mut producer, &platform) {
        Ok(CaptureOutcome::Captured { payload_size }) => println!("captured {} bytes", payload_size),
        Ok(CaptureOutcome::AlreadyPending) => println!("a dump is already pending; snapshot discarded"),
        Ok(CaptureOutcome::Disabled) => println!("capture disabled"),
        Err(e) => error!("capture of {} failed: {}", input.display(), e),
    }
    volume.close();
    Ok(())
}

fn run_status(settings: &Settings) -> Result<()> {
    let device = FileBlockIo::open(&settings.device, settings.sector_size)
        .with_context(|| format!("open {}", settings.device.display()))?;
    let mut volume = Volume::open(device).context("probe volume geometry")?;
    println!(
        "volume {}: {} sectors of {} bytes, {} bytes payload capacity",
        settings.device.display(),
        volume.sector_count(),
        volume.sector_size(),
        volume.payload_capacity()
    );

    let mut block = vec![0u8; volume.sector_size()];
    match read_header(&mut volume, &mut block).context("read header")? {
        Some(header) => println!(
            "pending dump: {} {}, {} bytes, captured at {}",
            header.identity.name(),
            header.identity.version(),
            header.payload_size,
            header.captured_at
        ),
        None => println!("no pending dump"),
    }
    volume.close();
    Ok(())
}
