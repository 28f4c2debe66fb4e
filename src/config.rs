//! Configuration types for Tapedeck

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::matcher::{MatcherKind, MatcherSet};
use crate::{Result, TapedeckError};

/// File extension used for cassettes stored as JSON lines
pub const CASSETTE_EXTENSION: &str = "jsonl";

/// Replay mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Always allow live calls and add them to the cassette
    #[default]
    NewEpisodes,
    /// Only allow live calls while the cassette is new
    Once,
    /// Treat the cassette as read only, never allow live calls
    None,
    /// Like `Once`, but playback must follow recorded order exactly and
    /// the cassette must be played entirely
    Strict,
}

impl Mode {
    /// Whether a request without a recording may go live and be recorded.
    ///
    /// `is_new` is the cassette's "no recordings existed at open time" flag.
    #[must_use]
    pub fn allows_recording(self, is_new: bool) -> bool {
        match self {
            Self::NewEpisodes => true,
            Self::Once | Self::Strict => is_new,
            Self::None => false,
        }
    }

    /// Whether playback is sequential and order sensitive
    #[must_use]
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }

    /// Name used in configuration files
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewEpisodes => "new_episodes",
            Self::Once => "once",
            Self::None => "none",
            Self::Strict => "strict",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Replay mode
    #[serde(default)]
    pub mode: Mode,
    /// Directory holding cassette files
    pub cassette_dir: PathBuf,
    /// Request matchers, all of which must agree for a request to match
    #[serde(default = "default_matchers")]
    pub request_matchers: Vec<MatcherKind>,
}

fn default_matchers() -> Vec<MatcherKind> {
    MatcherKind::ALL.to_vec()
}

impl Config {
    /// Create a configuration with every built-in matcher enabled
    #[must_use]
    pub fn new(mode: Mode, cassette_dir: PathBuf) -> Self {
        Self {
            mode,
            cassette_dir,
            request_matchers: default_matchers(),
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if !self.cassette_dir.is_dir() {
            return Err(TapedeckError::ConfigError(format!(
                "Cassette directory does not exist: {}",
                self.cassette_dir.display()
            )));
        }

        // An empty matcher list would make every request match every recording
        if self.request_matchers.is_empty() {
            return Err(TapedeckError::ConfigError(
                "At least one request matcher must be configured".to_string(),
            ));
        }

        for (i, kind) in self.request_matchers.iter().enumerate() {
            if self.request_matchers[..i].contains(kind) {
                return Err(TapedeckError::ConfigError(format!(
                    "Request matcher '{kind}' is configured twice"
                )));
            }
        }

        Ok(())
    }

    /// Build the matcher set for the configured matcher names
    #[must_use]
    pub fn matcher_set(&self) -> MatcherSet {
        MatcherSet::from_kinds(&self.request_matchers)
    }

    /// Path of the cassette file for `name`
    #[must_use]
    pub fn cassette_path(&self, name: &str) -> PathBuf {
        self.cassette_dir
            .join(format!("{name}.{CASSETTE_EXTENSION}"))
    }
}
