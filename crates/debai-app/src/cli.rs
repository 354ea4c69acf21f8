//! CLI argument definitions for the DebAI binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// DebAI - a chat assistant that sends email, manages the employee
/// directory and writes documents.
#[derive(Parser, Debug)]
#[command(name = "debai", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// API server bind address.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// Data directory for the employee database, uploads and documents.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Use the keyword router and the outbox mailer; no network calls.
    #[arg(long = "offline")]
    pub offline: bool,

    /// Chat in the terminal instead of serving HTTP.
    #[arg(long = "chat")]
    pub chat: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DEBAI_CONFIG env var > ~/.debai/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DEBAI_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > DEBAI_PORT env var > config file value > 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("DEBAI_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        8000
    }

    /// Resolve the bind address. Returns `None` if not overridden.
    pub fn resolve_host(&self) -> Option<String> {
        self.host.clone()
    }

    /// Resolve the data directory. Returns `None` if not overridden.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level. Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".debai").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".debai").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("debai").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_parse() {
        let args = parse(&["--port", "9000", "--host", "0.0.0.0", "--offline", "--chat"]);
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.resolve_host().as_deref(), Some("0.0.0.0"));
        assert!(args.offline);
        assert!(args.chat);
    }

    #[test]
    fn test_port_flag_wins_over_config() {
        let args = parse(&["-p", "9100"]);
        assert_eq!(args.resolve_port(8000), 9100);
    }

    #[test]
    fn test_config_flag_wins() {
        let args = parse(&["--config", "/tmp/debai.toml"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/debai.toml"));
    }

    #[test]
    fn test_unset_overrides_are_none() {
        let args = parse(&[]);
        assert!(args.resolve_data_dir().is_none());
        assert!(args.resolve_log_level().is_none());
        assert!(args.resolve_host().is_none());
        assert!(!args.offline);
    }
}
