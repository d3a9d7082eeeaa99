//! Command-line arguments for the `nudge` console.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Nudge: a conversational reminder assistant on the console.
#[derive(Parser, Debug)]
#[command(name = "nudge", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// IANA timezone used to read and display due dates.
    #[arg(short = 'z', long = "timezone")]
    pub timezone: Option<String>,

    /// Data directory holding the reminder database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Database file, overriding `storage.db_path`.
    #[arg(long = "db")]
    pub db: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Send replies to the log instead of stdout.
    #[arg(long = "headless")]
    pub headless: bool,

    /// Conversation id the console speaks as.
    #[arg(long = "conversation", default_value_t = 1)]
    pub conversation: i64,
}

impl CliArgs {
    /// Priority: --config flag > NUDGE_CONFIG env var > ~/.nudge/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("NUDGE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --timezone flag > NUDGE_TIMEZONE env var.
    /// Returns `None` when the config value should stand.
    pub fn resolve_timezone(&self) -> Option<String> {
        if let Some(ref tz) = self.timezone {
            return Some(tz.clone());
        }
        std::env::var("NUDGE_TIMEZONE")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
    }

    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_filter(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(filter) = std::env::var("RUST_LOG") {
            if !filter.trim().is_empty() {
                return filter;
            }
        }
        config_level.to_string()
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".nudge").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".nudge").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_parse() {
        let args = CliArgs::try_parse_from([
            "nudge",
            "--config",
            "/tmp/nudge.toml",
            "-z",
            "Asia/Singapore",
            "--log-level",
            "debug",
            "--conversation",
            "7",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/nudge.toml"));
        assert_eq!(args.resolve_timezone().as_deref(), Some("Asia/Singapore"));
        assert_eq!(args.resolve_log_filter("info"), "debug");
        assert_eq!(args.conversation, 7);
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["nudge"]).unwrap();
        assert_eq!(args.conversation, 1);
        assert!(args.db.is_none());
        assert!(!args.headless);
        assert!(args.resolve_data_dir().is_none());
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/lib/nudge"), PathBuf::from("/var/lib/nudge"));
        assert!(!expand_home("~/.nudge/data").starts_with("~"));
    }
}
