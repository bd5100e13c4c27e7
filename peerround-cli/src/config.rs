/// Config file loading and creation for the peerround CLI.
///
/// Config lives at ~/.config/peerround/config.toml.
/// All fields are optional. CLI args override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::bail;

#[derive(Deserialize, Default, Debug)]
pub struct PeerroundConfig {
    /// Default `simulate --rounds`.
    pub rounds: Option<usize>,
    /// Default `simulate --participants`.
    pub participants: Option<usize>,
    /// Fixed seed for tie-breaking. Unset = fresh randomness every run.
    pub seed: Option<u64>,
    /// Log filter used when RUST_LOG is unset (e.g. "warn", "peerround_core=debug").
    pub log_level: Option<String>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# peerround configuration
# All values here can be overridden by CLI flags.

# Rounds run by `peerround simulate`
# rounds = 5

# Participants created by `peerround simulate`
# participants = 10

# Fixed seed for random tie-breaking (reproducible pairings).
# Leave unset for fresh randomness on every run.
# seed = 42

# Log filter used when RUST_LOG is not set
# log_level = \"warn\"
";

/// Returns the default config path: ~/.config/peerround/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("peerround").join("config.toml")
}

/// Load config from a file path. Returns default (all None) if file doesn't exist.
pub fn load_config(path: &Path) -> PeerroundConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content)
            .unwrap_or_else(|e| bail(format!("Failed to parse config at {}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => PeerroundConfig::default(),
        Err(e) => bail(format!("Failed to read config at {}: {e}", path.display())),
    }
}

fn parse_config(content: &str) -> Result<PeerroundConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
