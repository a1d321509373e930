mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "selpanel",
    version,
    about = "Bridge a serial button panel to WebSocket media players"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_defaults() {
        let cli = Cli::try_parse_from(["selpanel", "serve"]).expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(!args.host_leds);
        assert_eq!(args.fragment_timeout, "50ms");
        assert!(args.heartbeat.is_none());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "selpanel",
            "media",
            "--format",
            "json",
            "--log-level",
            "debug",
        ])
        .expect("global flags should parse after the subcommand");

        assert!(matches!(cli.command, Command::Media(_)));
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn rejects_non_numeric_catalog_size() {
        let err = Cli::try_parse_from(["selpanel", "media", "--catalog-size", "ten"])
            .expect_err("catalog size must be numeric");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
