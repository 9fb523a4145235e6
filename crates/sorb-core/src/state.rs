//! State persistence for the .git/sorb/ directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

/// Manages the .git/sorb/ directory state.
#[derive(Debug, Clone)]
pub struct State {
    /// Path to the .git/sorb/ directory.
    sorb_dir: PathBuf,
}

impl State {
    /// File names within .git/sorb/
    const CONFIG_FILE: &'static str = "config.toml";
    const ABSORB_STATE_FILE: &'static str = "absorb-undo";

    /// Create a State for the repository whose git directory is `git_dir`.
    #[must_use]
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            sorb_dir: git_dir.as_ref().join("sorb"),
        }
    }

    /// Get the path to the sorb directory.
    #[must_use]
    pub fn sorb_dir(&self) -> &Path {
        &self.sorb_dir
    }

    // === Config operations ===

    /// Path to config.toml.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.sorb_dir.join(Self::CONFIG_FILE)
    }

    /// Load the config, defaulting when the file doesn't exist.
    ///
    /// # Errors
    /// Returns error if the file exists but can't be read or parsed.
    pub fn load_config(&self) -> Result<Config> {
        Config::load(&self.config_path())
    }

    /// Save the config.
    ///
    /// # Errors
    /// Returns error if serialization or write fails.
    pub fn save_config(&self, config: &Config) -> Result<()> {
        config.save(&self.config_path())
    }

    // === Absorb state operations ===

    fn absorb_state_path(&self) -> PathBuf {
        self.sorb_dir.join(Self::ABSORB_STATE_FILE)
    }

    /// Check if an undo record exists.
    #[must_use]
    pub fn has_absorb_state(&self) -> bool {
        self.absorb_state_path().exists()
    }

    /// Load the undo record.
    ///
    /// # Errors
    /// Returns `NothingToUndo` if there is none, or a parse error.
    pub fn load_absorb_state(&self) -> Result<AbsorbState> {
        let path = self.absorb_state_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NothingToUndo);
            }
            Err(e) => return Err(e.into()),
        };
        AbsorbState::parse(&content).map_err(|message| Error::StateParseError {
            file: path,
            message,
        })
    }

    /// Save the undo record, replacing any previous one.
    ///
    /// The file is written next to its final name and renamed into place.
    ///
    /// # Errors
    /// Returns error if the write fails.
    pub fn save_absorb_state(&self, state: &AbsorbState) -> Result<()> {
        fs::create_dir_all(&self.sorb_dir)?;
        let path = self.absorb_state_path();
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, state.to_record())?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Delete the undo record. A missing record is not an error.
    ///
    /// # Errors
    /// Returns error if file removal fails.
    pub fn clear_absorb_state(&self) -> Result<()> {
        match fs::remove_file(self.absorb_state_path()) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Everything `sorb undo` needs to rewind the last absorb.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsorbState {
    /// HEAD before the absorb started.
    pub original_head: String,

    /// Backup ref pointing at `original_head`.
    pub backup_ref: String,

    /// Branch the absorb ran on.
    pub current_branch: String,

    /// Creation time, unix seconds.
    pub timestamp: i64,

    /// Auto-stash left behind when popping it failed.
    pub stash_sha: Option<String>,

    /// What was done, in order.
    pub operations: Vec<String>,
}

impl AbsorbState {
    /// Serialize as `key=value` lines.
    #[must_use]
    pub fn to_record(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "original_head={}", self.original_head);
        let _ = writeln!(out, "backup_ref={}", self.backup_ref);
        let _ = writeln!(out, "current_branch={}", self.current_branch);
        let _ = writeln!(out, "timestamp={}", self.timestamp);
        if let Some(stash) = &self.stash_sha {
            let _ = writeln!(out, "stash_sha={stash}");
        }
        for op in &self.operations {
            let _ = writeln!(out, "operation={}", op.replace('\n', " "));
        }
        out
    }

    /// Parse `key=value` lines. Unknown keys are skipped.
    fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut state = Self::default();
        let mut timestamp = None;

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key {
                "original_head" => state.original_head = value.to_string(),
                "backup_ref" => state.backup_ref = value.to_string(),
                "current_branch" => state.current_branch = value.to_string(),
                "timestamp" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| format!("bad timestamp '{value}'"))?,
                    );
                }
                "stash_sha" if !value.is_empty() => state.stash_sha = Some(value.to_string()),
                "operation" => state.operations.push(value.to_string()),
                _ => {}
            }
        }

        for (key, value) in [
            ("original_head", &state.original_head),
            ("backup_ref", &state.backup_ref),
            ("current_branch", &state.current_branch),
        ] {
            if value.is_empty() {
                return Err(format!("missing {key}"));
            }
        }
        state.timestamp = timestamp.ok_or("missing timestamp")?;
        Ok(state)
    }
}
