//! Application configuration management.
//!
//! Configuration is read from `~/.config/swadge-finder/config.json` when
//! present; every field falls back to a default, and `FINDER_*` environment
//! variables override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bus::GameRegistration;

/// Application name used for the config directory path
const APP_NAME: &str = "swadge-finder";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default seconds between scan requests for a badge
const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the FIND resolver
    pub resolver_url: String,
    /// FIND group all badges are tracked under
    pub resolver_group: String,
    /// Unique name of this game in the game directory
    pub game_id: String,
    /// Button sequence that joins a badge to learn mode; empty disables it
    pub join_sequence: String,
    /// Location whose occupants auto-join; empty disables it
    pub join_location: String,
    pub scan_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolver_url: "http://find.hackafe.net".to_string(),
            resolver_group: "hackafe".to_string(),
            game_id: "finder".to_string(),
            join_sequence: "babaes".to_string(),
            join_location: String::new(),
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Override fields from `FINDER_*` variables looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("FINDER_RESOLVER_URL") {
            self.resolver_url = url;
        }
        if let Some(group) = lookup("FINDER_RESOLVER_GROUP") {
            self.resolver_group = group;
        }
        if let Some(game_id) = lookup("FINDER_GAME_ID") {
            self.game_id = game_id;
        }
        if let Some(sequence) = lookup("FINDER_JOIN_SEQUENCE") {
            self.join_sequence = sequence;
        }
        if let Some(location) = lookup("FINDER_JOIN_LOCATION") {
            self.join_location = location;
        }
        if let Some(secs) = lookup("FINDER_SCAN_INTERVAL_SECS") {
            self.scan_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid FINDER_SCAN_INTERVAL_SECS: {}", secs))?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn registration(&self) -> GameRegistration {
        GameRegistration {
            game_id: self.game_id.clone(),
            sequence: self.join_sequence.clone(),
            location: self.join_location.clone(),
        }
    }
}
