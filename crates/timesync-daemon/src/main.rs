//! Time-sync daemon entry point.
//!
//! Wires the system clock, the message-bus collaborator, and optional
//! serial-device bring-up into the time broadcaster, with signal
//! handling for clean shutdown.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use timebase_bus::{SimulatedBus, TimeBus};
use timebase_common::{BusDriver, TimesyncConfig};
use timebase_core::{ShutdownToken, SystemClock, TimeBroadcaster};
use timebase_serial::SerialDevice;
use tracing::{debug, info, warn};

use crate::signals::SignalHandler;

/// Time-sync daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "mbot-timesyncd",
    about = "MBot time-sync daemon - broadcasts the reference clock on the message bus",
    version,
    long_about = None
)]
struct Args {
    /// Path to a daemon configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Channel to publish time samples on (overrides config file).
    #[arg(long, value_name = "NAME")]
    channel: Option<String>,

    /// Inter-sample interval, e.g. "1s" or "250ms" (overrides config file).
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    interval: Option<Duration>,

    /// Maximum cycles to run, 0 = run until shutdown (overrides config file).
    #[arg(long, value_name = "N")]
    max_cycles: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting time-sync daemon"
    );

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args);

    info!(
        channel = %config.broadcast.channel,
        interval = ?config.broadcast.interval,
        driver = ?config.bus.driver,
        "Configuration loaded"
    );

    run_daemon(&config)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "timesync_daemon={level},timebase_core={level},timebase_bus={level},\
         timebase_serial={level},timebase_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `MBOT_TIMESYNC_CONFIG` environment variable
/// 3. `/etc/mbot/timesync.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<TimesyncConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return TimesyncConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("MBOT_TIMESYNC_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from MBOT_TIMESYNC_CONFIG");
            return TimesyncConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from MBOT_TIMESYNC_CONFIG={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "MBOT_TIMESYNC_CONFIG set but file does not exist, checking other locations"
        );
    }

    let system_path = PathBuf::from("/etc/mbot/timesync.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return TimesyncConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {system_path:?}"));
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return TimesyncConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    info!("No config file found, using built-in defaults");
    Ok(TimesyncConfig::default())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut TimesyncConfig, args: &Args) {
    if let Some(channel) = &args.channel {
        config.broadcast.channel.clone_from(channel);
    }
    if let Some(interval) = args.interval {
        config.broadcast.interval = interval;
    }
    if let Some(max_cycles) = args.max_cycles {
        config.broadcast.max_cycles = max_cycles;
    }
}

/// Main daemon run loop.
fn run_daemon(config: &TimesyncConfig) -> Result<()> {
    let shutdown = ShutdownToken::new();
    let signal_handler = SignalHandler::install(shutdown.clone())
        .context("Failed to install signal handlers")?;

    // Bring up the serial collaborator, if configured
    let mut serial = bring_up_serial(config)?;

    let bus = create_bus(config);
    let clock = SystemClock::new();
    let start = clock.probe().context("OS clock unavailable")?;
    info!(%start, "Time base established");

    let mut broadcaster = TimeBroadcaster::new(bus, config);

    let summary = broadcaster
        .run(&clock, &shutdown)
        .context("Time broadcast loop failed")?;

    if signal_handler.take_reload_request() {
        warn!("Config reload was requested but live reload is not supported; restart to apply");
    }

    if config.metrics.enabled {
        for &p in &config.metrics.percentiles {
            if let Some(period) = broadcaster.metrics().percentile(p) {
                info!(
                    percentile = p,
                    period_us = period.as_micros() as u64,
                    "Inter-publish period percentile"
                );
            }
        }
        if let Some(jitter_ns) = summary.metrics.jitter_ns() {
            info!(jitter_us = jitter_ns / 1_000, "Inter-publish jitter");
        }
    }

    if let Some(device) = serial.as_mut() {
        if let Err(e) = device.close() {
            warn!(error = %e, "Serial close failed");
        }
    }

    info!(
        published = summary.published,
        failures = summary.publish_failures,
        "Time-sync daemon exiting"
    );
    Ok(())
}

/// Create the message-bus backend based on configuration.
///
/// The LCM transport belongs to the external bus collaborator; when it
/// is selected but not linked into this build, the daemon falls back to
/// the simulated bus rather than refusing to start.
fn create_bus(config: &TimesyncConfig) -> Box<dyn TimeBus> {
    match config.bus.driver {
        BusDriver::Simulated => {
            info!("Using simulated message bus");
            Box::new(SimulatedBus::new())
        }
        BusDriver::Lcm => {
            warn!(
                url = ?config.bus.multicast_url,
                "LCM transport not linked into this build, falling back to simulated bus"
            );
            Box::new(SimulatedBus::new())
        }
    }
}

/// Open and configure the serial device, if one is configured.
fn bring_up_serial(config: &TimesyncConfig) -> Result<Option<Box<dyn SerialDevice>>> {
    let Some(port) = &config.serial.port else {
        debug!("No serial port configured, skipping serial bring-up");
        return Ok(None);
    };

    #[cfg(target_os = "linux")]
    let mut device: Box<dyn SerialDevice> = Box::new(
        timebase_serial::TermiosSerial::open(port, config.serial.baud, config.serial.blocking)
            .with_context(|| format!("Failed to open serial port {}", port.display()))?,
    );

    #[cfg(not(target_os = "linux"))]
    let mut device: Box<dyn SerialDevice> = {
        warn!(port = %port.display(), "Real serial ports unsupported on this platform, using simulated device");
        Box::new(timebase_serial::SimulatedSerial::open(
            &port.display().to_string(),
            config.serial.baud,
            config.serial.blocking,
        ))
    };

    device
        .set_mode(
            config.serial.databits,
            config.serial.parity,
            config.serial.stopbits,
        )
        .context("Failed to set serial mode")?;

    if let Some(kind) = config.serial.flow_control {
        device
            .enable_flow_control(kind)
            .context("Failed to enable serial flow control")?;
    }

    info!(
        port = %port.display(),
        baud = config.serial.baud,
        "Serial device configured"
    );
    Ok(Some(device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_with_config(path: Option<PathBuf>) -> Args {
        Args {
            config: path,
            channel: None,
            interval: None,
            max_cycles: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_cli_config_file_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[broadcast]\ninterval = \"250ms\"\n")
            .unwrap();

        let args = args_with_config(Some(file.path().to_path_buf()));
        let config = load_config(&args).unwrap();
        assert_eq!(config.broadcast.interval, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_cli_config_file_is_an_error() {
        let args = args_with_config(Some(PathBuf::from("/nonexistent/timesync.toml")));
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn test_cli_overrides_beat_file_values() {
        let mut config = TimesyncConfig::default();
        let mut args = args_with_config(None);
        args.channel = Some("TEST_TIME".to_string());
        args.interval = Some(Duration::from_millis(100));
        args.max_cycles = Some(7);

        apply_overrides(&mut config, &args);
        assert_eq!(config.broadcast.channel, "TEST_TIME");
        assert_eq!(config.broadcast.interval, Duration::from_millis(100));
        assert_eq!(config.broadcast.max_cycles, 7);
    }
}
