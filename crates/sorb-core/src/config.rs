//! Configuration management for sorb.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sorb_oracle::Strategy;

use crate::error::{Error, Result};

/// Repository-level configuration stored in .git/sorb/config.toml.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absorb behaviour.
    pub absorb: AbsorbConfig,

    /// Oracle backend settings.
    pub oracle: OracleConfig,
}

/// Settings for `sorb absorb`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsorbConfig {
    /// How assignments are accepted.
    pub strategy: Strategy,

    /// Minimum confidence for best-match assignments.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Which commits are candidates.
    pub range: RangeMode,

    /// Run an autosquash rebase after creating fixups.
    pub autosquash: bool,
}

impl Default for AbsorbConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            confidence: default_confidence(),
            range: RangeMode::default(),
            autosquash: false,
        }
    }
}

const fn default_confidence() -> f64 {
    0.7
}

/// Candidate commit range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeMode {
    /// Commits not yet on the upstream branch.
    #[default]
    Unpushed,
    /// Commits since the merge-base with the main branch.
    BranchPoint,
}

impl FromStr for RangeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unpushed" => Ok(Self::Unpushed),
            "branch-point" | "branch_point" => Ok(Self::BranchPoint),
            other => Err(Error::InvalidConfig(format!("unknown range '{other}'"))),
        }
    }
}

/// Oracle backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local command fed on stdin.
    #[default]
    Command,
    /// HTTP completion endpoint.
    Http,
}

/// Settings for the oracle backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Backend kind.
    pub backend: Backend,

    /// Program for the command backend.
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments for the command backend.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Model name passed to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Time limit per oracle call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Endpoint for the http backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the http bearer key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            command: default_command(),
            args: default_args(),
            model: None,
            timeout_secs: default_timeout_secs(),
            endpoint: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-p".to_string()]
}

const fn default_timeout_secs() -> u64 {
    120
}

fn default_api_key_env() -> String {
    "SORB_API_KEY".to_string()
}

impl Config {
    /// Load config from a file path, or return default if file doesn't exist.
    ///
    /// # Errors
    /// Returns error if file exists but can't be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to a file path.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a value that doesn't parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("SORB_STRATEGY") {
            self.absorb.strategy = value
                .parse()
                .map_err(|e: String| Error::InvalidConfig(format!("SORB_STRATEGY: {e}")))?;
        }
        if let Some(value) = lookup("SORB_CONFIDENCE") {
            self.absorb.confidence = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("SORB_CONFIDENCE: not a number: '{value}'"))
            })?;
        }
        if let Some(value) = lookup("SORB_RANGE") {
            self.absorb.range = value.parse()?;
        }
        if let Some(value) = lookup("SORB_MODEL") {
            self.oracle.model = Some(value).filter(|m| !m.is_empty());
        }
        if let Some(value) = lookup("SORB_ORACLE_TIMEOUT") {
            self.oracle.timeout_secs = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("SORB_ORACLE_TIMEOUT: not a number: '{value}'"))
            })?;
        }
        self.validate()
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `InvalidConfig` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.absorb.confidence) {
            return Err(Error::InvalidConfig(format!(
                "confidence must be between 0 and 1, got {}",
                self.absorb.confidence
            )));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "oracle timeout must be at least 1 second".to_string(),
            ));
        }
        if self.oracle.backend == Backend::Http && self.oracle.endpoint.is_none() {
            return Err(Error::InvalidConfig(
                "the http backend needs oracle.endpoint".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.absorb.strategy, Strategy::Interactive);
        assert!((config.absorb.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.absorb.range, RangeMode::Unpushed);
        assert!(!config.absorb.autosquash);
        assert_eq!(config.oracle.backend, Backend::Command);
        assert_eq!(config.oracle.command, "claude");
        assert_eq!(config.oracle.args, vec!["-p"]);
        assert_eq!(config.oracle.timeout_secs, 120);
        assert_eq!(config.oracle.api_key_env, "SORB_API_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(&temp.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[absorb]\nstrategy = \"best-match\"\n\n[oracle]\ncommand = \"sh\"\nargs = [\"-c\", \"cat reply.json\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.absorb.strategy, Strategy::BestMatch);
        assert!((config.absorb.confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.oracle.command, "sh");
        assert_eq!(config.oracle.args, vec!["-c", "cat reply.json"]);
        assert_eq!(config.oracle.timeout_secs, 120);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sorb").join("config.toml");

        let mut config = Config::default();
        config.absorb.range = RangeMode::BranchPoint;
        config.absorb.autosquash = true;
        config.oracle.model = Some("opus".to_string());
        config.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("range = \"branch-point\""));
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[absorb\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Toml(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("SORB_STRATEGY", "best-match"),
                ("SORB_CONFIDENCE", "0.9"),
                ("SORB_RANGE", "branch-point"),
                ("SORB_MODEL", "haiku"),
                ("SORB_ORACLE_TIMEOUT", "30"),
            ]))
            .unwrap();

        assert_eq!(config.absorb.strategy, Strategy::BestMatch);
        assert!((config.absorb.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.absorb.range, RangeMode::BranchPoint);
        assert_eq!(config.oracle.model.as_deref(), Some("haiku"));
        assert_eq!(config.oracle.timeout_secs, 30);
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[("SORB_CONFIDENCE", "high")])),
            Err(Error::InvalidConfig(_))
        ));

        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[("SORB_CONFIDENCE", "1.5")])),
            Err(Error::InvalidConfig(_))
        ));

        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[("SORB_RANGE", "everything")])),
            Err(Error::InvalidConfig(_))
        ));

        let mut config = Config::default();
        assert!(matches!(
            config.apply_env(env(&[("SORB_STRATEGY", "yolo")])),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_http_backend_needs_endpoint() {
        let mut config = Config::default();
        config.oracle.backend = Backend::Http;
        assert!(config.validate().is_err());

        config.oracle.endpoint = Some("http://localhost:8080/v1/complete".to_string());
        assert!(config.validate().is_ok());
    }
}
