mod config;
mod link;
mod snapshot;
mod sync;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::config::HostConfig;
use crate::link::DeviceLink;
use crate::sync::LatencyEstimate;

#[derive(Parser)]
#[command(name = "respbox-cli")]
#[command(about = "Host tool for the response box: clock sync, remapping, monitoring")]
struct Cli {
    /// Serial port of the device (overrides the config file)
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports,
    /// Estimate link latency and align the device clock to host time
    Sync {
        /// Number of round trips (default from config)
        #[arg(short, long)]
        rounds: Option<u32>,
    },
    /// Set the symbol typed by each button, home last (e.g. "wxyz_")
    Remap { symbols: String },
    /// Show the current symbol mapping
    List,
    /// Show the raw capacitive reading
    Raw,
    /// Show the capacitive running average
    Average,
    /// Sync, then print every snapshot with its host time
    Monitor {
        /// Stop after this many seconds (default: run until interrupted)
        #[arg(short, long)]
        duration: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => {
            HostConfig::load_from(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => HostConfig::load().context("loading config")?,
    };

    match cli.command {
        Command::Ports => {
            let ports = DeviceLink::list_ports().context("enumerating serial ports")?;
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in ports {
                println!("{port}");
            }
        }
        Command::Sync { rounds } => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            let estimate = run_sync(&mut link, rounds.unwrap_or(config.sync_rounds))?;
            print_estimate(&estimate);
        }
        Command::Remap { symbols } => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            let kept = link.remap(&symbols).context("remapping")?;
            if kept != symbols {
                warn!("device rejected some symbols");
            }
            println!("Mapping: {kept}");
        }
        Command::List => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            println!("Mapping: {}", link.list_mapping()?);
        }
        Command::Raw => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            println!("Raw intensity: {:.2}", link.raw_intensity()?);
        }
        Command::Average => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            println!("Running average: {:.2}", link.average()?);
        }
        Command::Monitor { duration } => {
            let mut link = open_link(cli.port.as_deref(), &config)?;
            let estimate = run_sync(&mut link, config.sync_rounds)?;
            print_estimate(&estimate);
            monitor(&mut link, &estimate, &config, duration.map(Duration::from_secs))?;
        }
    }

    Ok(())
}

/// `--port` wins over the config file.
fn open_link(port: Option<&str>, config: &HostConfig) -> Result<DeviceLink> {
    let Some(port) = port.or(config.port.as_deref()) else {
        bail!("no serial port given; pass --port or set `port` in the config file");
    };
    DeviceLink::open(port, config.baud_rate, config.read_timeout())
        .with_context(|| format!("opening {port}"))
}

fn run_sync(link: &mut DeviceLink, rounds: u32) -> Result<LatencyEstimate> {
    if rounds == 0 {
        bail!("need at least one sync round");
    }

    let pb = ProgressBar::new(u64::from(rounds));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} rounds")
            .context("progress bar template")?
            .progress_chars("=> "),
    );
    pb.set_message("Syncing");

    let mut samples = Vec::with_capacity(rounds as usize);
    for round in 0..rounds {
        let sample = link
            .sync_round()
            .with_context(|| format!("sync round {}", round + 1))?;
        samples.push(sample);
        pb.inc(1);
    }
    pb.finish_with_message("Synced");

    sync::estimate(&samples).context("no sync samples")
}

fn print_estimate(estimate: &LatencyEstimate) {
    println!(
        "One-way latency over {} rounds: min {:.0} us, mean {:.0} us, max {:.0} us, stddev {:.1} us",
        estimate.rounds, estimate.min_us, estimate.mean_us, estimate.max_us, estimate.stddev_us
    );
    println!("Device epoch: {}", estimate.anchor.format("%Y-%m-%d %H:%M:%S%.6f UTC"));
}

fn monitor(
    link: &mut DeviceLink,
    estimate: &LatencyEstimate,
    config: &HostConfig,
    duration: Option<Duration>,
) -> Result<()> {
    let stop_at = duration.map(|d| Instant::now() + d);
    info!("monitoring; press Ctrl-C to stop");

    loop {
        let now = Instant::now();
        if stop_at.is_some_and(|stop| now >= stop) {
            return Ok(());
        }
        let next_second = now + Duration::from_secs(1);
        let wait_until = stop_at.map_or(next_second, |stop| stop.min(next_second));
        let Some(line) = link.read_line(wait_until)? else {
            continue;
        };

        match snapshot::parse_line(&line, config.snapshot_format) {
            Ok(snapshot) => {
                let at = estimate.host_time(snapshot.elapsed_us);
                println!("{}  {}", at.format("%H:%M:%S%.6f"), snapshot);
            }
            Err(e) => warn!("ignoring line {line:?}: {e}"),
        }
    }
}
