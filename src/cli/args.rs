//! CLI argument definitions using Clap

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::domain::recording::SessionConstraints;

/// Mictape - pause/resume microphone recorder
#[derive(Parser, Debug)]
#[command(name = "mictape")]
#[command(version = "0.2.0")]
#[command(about = "Record from the microphone to an incrementally encoded Ogg/Opus file")]
#[command(long_about = None)]
pub struct Cli {
    /// Recording duration (e.g., 10s, 1m, 2m30s); Ctrl-C stops early
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Capture sample rate in Hz (8000, 12000, 16000, 24000 or 48000)
    #[arg(short = 'r', long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Encoder bit rate in bits per second
    #[arg(short = 'b', long, value_name = "BPS")]
    pub bit_rate: Option<u32>,

    /// Output file path
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<String>,

    /// Pause halfway through with a preview, then resume
    #[arg(long)]
    pub pause_demo: bool,

    /// Record a synthetic 440 Hz tone instead of the microphone
    #[arg(long)]
    pub synth: bool,

    /// Config subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed recording options
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub duration: Duration,
    pub constraints: SessionConstraints,
    pub output: PathBuf,
    pub pause_demo: bool,
    pub synth: bool,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &["sample_rate", "bit_rate", "duration", "output"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

/// Parse a duration string like "30s", "1m" or "2m30s".
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let invalid = || format!("Invalid duration: \"{input}\". Expected e.g. 30s, 1m or 2m30s");

    let mut minutes: u64 = 0;
    let mut seconds: u64 = 0;
    let mut number = String::new();
    let mut found_any = false;

    for ch in input.trim().to_lowercase().chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
        } else if ch == 'm' && !number.is_empty() {
            minutes = number.parse().map_err(|_| invalid())?;
            number.clear();
            found_any = true;
        } else if ch == 's' && !number.is_empty() {
            seconds = number.parse().map_err(|_| invalid())?;
            number.clear();
            found_any = true;
        } else {
            return Err(invalid());
        }
    }

    if !number.is_empty() || !found_any {
        return Err(invalid());
    }

    let total = minutes * 60 + seconds;
    if total == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["mictape"]);
        assert!(cli.duration.is_none());
        assert!(cli.sample_rate.is_none());
        assert!(cli.bit_rate.is_none());
        assert!(cli.output.is_none());
        assert!(!cli.pause_demo);
        assert!(!cli.synth);
    }

    #[test]
    fn cli_parses_rates() {
        let cli = Cli::parse_from(["mictape", "-r", "16000", "-b", "24000"]);
        assert_eq!(cli.sample_rate, Some(16_000));
        assert_eq!(cli.bit_rate, Some(24_000));
    }

    #[test]
    fn cli_parses_output_and_duration() {
        let cli = Cli::parse_from(["mictape", "-d", "30s", "-o", "take.ogg"]);
        assert_eq!(cli.duration, Some("30s".to_string()));
        assert_eq!(cli.output, Some("take.ogg".to_string()));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["mictape", "config", "set", "sample_rate", "16000"]);
        if let Some(Commands::Config {
            action: ConfigAction::Set { key, value },
        }) = cli.command
        {
            assert_eq!(key, "sample_rate");
            assert_eq!(value, "16000");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn parse_duration_formats() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2m30s").unwrap(), Duration::from_secs(150));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("sample_rate"));
        assert!(is_valid_config_key("bit_rate"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        // Verify the CLI definition is valid
        Cli::command().debug_assert();
    }
}
