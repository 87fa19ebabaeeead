//! Command-line configuration
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8080";
pub const REPORT_INTERVAL: Duration = Duration::from_millis(250);

pub const USAGE: &str = "\
NR Simulation Telemetry Monitor

Listens for real-time telemetry snapshots from the NR simulation via UDP.
Displays UE positions, attachments, traffic stats, handovers and alerts,
and serves a live dashboard at http://127.0.0.1:8080.

Usage:
    nr-telemetry-monitor [OPTIONS] [port]

Arguments:
    port              UDP port to listen on (default 5555)

Options:
    -v, --verbose     Show per-UE traffic, recent handovers and events
        --no-dashboard
                      Do not start the web dashboard
    -h, --help        Print this help

Logging is controlled with RUST_LOG (default: info).";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub port: u16,
    pub verbose: bool,
    pub dashboard_addr: Option<SocketAddr>,
    pub report_interval: Duration,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Run(MonitorConfig),
    Help,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            verbose: false,
            dashboard_addr: DEFAULT_DASHBOARD_ADDR.parse().ok(),
            report_interval: REPORT_INTERVAL,
        }
    }
}

impl MonitorConfig {
    /// Parse arguments without the program name.
    ///
    /// `-h` wins as soon as it is seen. Unrecognised flags are skipped with a warning.
    pub fn from_args<I, S>(args: I) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = MonitorConfig::default();

        for arg in args {
            let arg = arg.as_ref();
            if arg.starts_with('-') {
                match arg {
                    "-v" | "--verbose" => config.verbose = true,
                    "-h" | "--help" => return Ok(Command::Help),
                    "--no-dashboard" => config.dashboard_addr = None,
                    other => log::warn!("Ignoring unknown option {}", other),
                }
            } else {
                config.port = arg
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(arg.to_string()))?;
            }
        }

        Ok(Command::Run(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> MonitorConfig {
        match MonitorConfig::from_args(args) {
            Ok(Command::Run(config)) => config,
            other => panic!("expected run config, got {other:?}"),
        }
    }

    #[test]
    fn defaults() {
        let config = run(&[]);
        assert_eq!(config.port, 5555);
        assert!(!config.verbose);
        assert!(config.dashboard_addr.is_some());
    }

    #[test]
    fn port_and_flags() {
        let config = run(&["-v", "6000", "--no-dashboard"]);
        assert_eq!(config.port, 6000);
        assert!(config.verbose);
        assert_eq!(config.dashboard_addr, None);

        assert!(run(&["--verbose"]).verbose);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(MonitorConfig::from_args(["-h", "notaport"]), Ok(Command::Help));
        assert_eq!(MonitorConfig::from_args(["--help"]), Ok(Command::Help));
    }

    #[test]
    fn invalid_port_is_an_error() {
        assert_eq!(
            MonitorConfig::from_args(["abc"]),
            Err(ConfigError::InvalidPort("abc".to_string()))
        );
        assert!(MonitorConfig::from_args(["70000"]).is_err());
    }

    #[test]
    fn unknown_flags_are_ignored() {
        assert_eq!(run(&["--color", "5000"]).port, 5000);
    }
}
