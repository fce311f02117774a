//! Command-line arguments

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::config::ServerConfig;
use crate::error::Result;

/// Tagarela chat server command-line arguments.
///
/// CLI values override settings loaded from the config file.
#[derive(Parser, Debug, Default)]
#[command(name = "tagarela", about = "Multi-user line-oriented chat server")]
pub struct CliArgs {
    /// Port to listen on (all interfaces).
    pub port: Option<u16>,

    /// Full listen address; takes precedence over PORT.
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log destination: "stdout" or a file path.
    #[arg(long)]
    pub log: Option<String>,

    /// Minimum log level (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Recent-history capacity.
    #[arg(long)]
    pub history: Option<usize>,
}

impl ServerConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) -> Result<()> {
        if let Some(port) = args.port {
            self.bind_addr.set_port(port);
        }
        if let Some(bind) = args.bind {
            self.bind_addr = bind;
        }
        if let Some(ref target) = args.log {
            self.log_target = target.clone();
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.parse()?;
        }
        if let Some(history) = args.history {
            self.history_capacity = history;
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Level;

    #[test]
    fn test_cli_override() {
        let mut config = ServerConfig::default();
        let args = CliArgs::parse_from([
            "tagarela",
            "5000",
            "--log",
            "stdout",
            "--log-level",
            "warn",
        ]);
        config.apply_cli_overrides(&args).unwrap();

        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.log_target, "stdout");
        assert_eq!(config.log_level, Level::Warn);
        // Non-overridden fields retain defaults
        assert_eq!(config.history_capacity, 100);
    }

    #[test]
    fn test_bind_wins_over_port() {
        let mut config = ServerConfig::default();
        let args = CliArgs::parse_from(["tagarela", "5000", "--bind", "127.0.0.1:6000"]);
        config.apply_cli_overrides(&args).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:6000".parse().unwrap());
    }

    #[test]
    fn test_cli_no_override() {
        let original = ServerConfig::default();
        let mut config = ServerConfig::default();
        config.apply_cli_overrides(&CliArgs::default()).unwrap();
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        let mut config = ServerConfig::default();
        let args = CliArgs::parse_from(["tagarela", "--log-level", "shouty"]);
        assert!(config.apply_cli_overrides(&args).is_err());

        let mut config = ServerConfig::default();
        let args = CliArgs::parse_from(["tagarela", "--history", "0"]);
        assert!(config.apply_cli_overrides(&args).is_err());
    }
}
