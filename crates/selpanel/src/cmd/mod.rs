use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use selpanel_frame::{Catalog, MAX_CATALOG_SIZE};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod media;
pub mod ports;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the serial-to-WebSocket bridge.
    Serve(ServeArgs),
    /// Check that every catalog entry has its image and audio file.
    Media(MediaArgs),
    /// List serial ports visible to this host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Media(args) => media::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Catalog options shared by `serve` and `media`.
#[derive(Args, Debug, Clone)]
pub struct MediaOptions {
    /// Number of media entries (valid ids are 1..=N).
    #[arg(
        long = "catalog-size",
        short = 'n',
        env = "SELPANEL_CATALOG_SIZE",
        default_value_t = 10
    )]
    pub catalog_size: u16,

    /// Directory holding NNN.jpg and NNN.mp3 assets.
    #[arg(long, env = "SELPANEL_MEDIA_DIR", default_value = "media")]
    pub media_dir: PathBuf,
}

impl MediaOptions {
    pub fn catalog(&self) -> CliResult<Catalog> {
        Catalog::new(self.catalog_size).ok_or_else(|| {
            CliError::new(
                USAGE,
                format!(
                    "invalid catalog size {}: expected 1..={MAX_CATALOG_SIZE}",
                    self.catalog_size
                ),
            )
        })
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Serial device node of the button panel.
    #[arg(long, env = "SELPANEL_PORT", default_value = "/dev/ttyACM0")]
    pub port: PathBuf,

    /// Serial line speed.
    #[arg(long, env = "SELPANEL_BAUD", default_value_t = 115_200)]
    pub baud: u32,

    /// Light LEDs from the host (send LEDSET on every press).
    ///
    /// By default the firmware lights its own LED when a button is pressed.
    #[arg(long)]
    pub host_leds: bool,

    /// How long to wait for the rest of a split line (e.g. 50ms).
    #[arg(long, default_value = "50ms")]
    pub fragment_timeout: String,

    /// Delay between serial reconnect attempts (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub reconnect_delay: String,

    /// HTTP/WebSocket bind address.
    #[arg(long, env = "SELPANEL_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Send PING at this interval while connected (e.g. 30s).
    #[arg(long)]
    pub heartbeat: Option<String>,

    #[command(flatten)]
    pub media: MediaOptions,
}

#[derive(Args, Debug)]
pub struct MediaArgs {
    #[command(flatten)]
    pub media: MediaOptions,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub(crate) fn parse_duration(value: &str) -> CliResult<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, to_duration): (&str, fn(u64) -> Duration) =
        if let Some(ms) = value.strip_suffix("ms") {
            (ms, Duration::from_millis)
        } else if let Some(s) = value.strip_suffix('s') {
            (s, Duration::from_secs)
        } else {
            (value, Duration::from_secs)
        };

    let amount = number
        .trim()
        .parse::<u64>()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {value}")))?;
    if amount == 0 {
        return Err(CliError::new(
            USAGE,
            format!("duration must be greater than zero: {value}"),
        ));
    }
    Ok(to_duration(amount))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("50ms").unwrap(), Duration::from_millis(50));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn rejects_bad_durations() {
        for bad in ["", "0ms", "fast", "-1s", "1.5s"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.code, USAGE, "{bad:?}");
        }
    }

    #[test]
    fn catalog_size_is_validated() {
        let options = MediaOptions {
            catalog_size: 0,
            media_dir: PathBuf::from("media"),
        };
        assert_eq!(options.catalog().unwrap_err().code, USAGE);

        let options = MediaOptions {
            catalog_size: 42,
            ..options
        };
        assert_eq!(options.catalog().unwrap().size(), 42);
    }
}
