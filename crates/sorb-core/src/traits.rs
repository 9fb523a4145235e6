//! Trait abstractions for state storage operations.
//!
//! `StateStore` lets the absorb and undo flows run against an in-memory
//! store in tests.

use std::path::Path;

use crate::Result;
use crate::config::Config;
use crate::state::{AbsorbState, State};

/// Trait for state storage operations.
#[allow(clippy::missing_errors_doc)]
pub trait StateStore {
    /// Get the path to the sorb directory.
    fn sorb_dir(&self) -> &Path;

    // === Config Operations ===

    /// Load the config from disk.
    fn load_config(&self) -> Result<Config>;

    /// Save the config to disk.
    fn save_config(&self, config: &Config) -> Result<()>;

    // === Absorb State Operations ===

    /// Check if an undo record exists.
    fn has_absorb_state(&self) -> bool;

    /// Load the undo record.
    fn load_absorb_state(&self) -> Result<AbsorbState>;

    /// Save the undo record, replacing any previous one.
    fn save_absorb_state(&self, state: &AbsorbState) -> Result<()>;

    /// Delete the undo record.
    fn clear_absorb_state(&self) -> Result<()>;
}

impl StateStore for State {
    fn sorb_dir(&self) -> &Path {
        Self::sorb_dir(self)
    }

    fn load_config(&self) -> Result<Config> {
        Self::load_config(self)
    }

    fn save_config(&self, config: &Config) -> Result<()> {
        Self::save_config(self, config)
    }

    fn has_absorb_state(&self) -> bool {
        Self::has_absorb_state(self)
    }

    fn load_absorb_state(&self) -> Result<AbsorbState> {
        Self::load_absorb_state(self)
    }

    fn save_absorb_state(&self, state: &AbsorbState) -> Result<()> {
        Self::save_absorb_state(self, state)
    }

    fn clear_absorb_state(&self) -> Result<()> {
        Self::clear_absorb_state(self)
    }
}
