//! # sorb-core
//!
//! Core logic for sorb: the review session over an oracle's proposals,
//! fixup orchestration, and the backup/undo state kept in `.git/sorb/`.
//!
//! Git work goes through [`sorb_git::GitOps`] and persistence through
//! [`StateStore`], so both can be swapped in tests.

pub mod absorb;
pub mod config;
mod error;
pub mod review;
pub mod state;
pub mod traits;
pub mod undo;

pub use absorb::{
    AbsorbOptions, AbsorbOutcome, ApplyReport, FailedTarget, FixupRecord, apply_assignments,
    execute,
};
pub use config::{AbsorbConfig, Backend, Config, OracleConfig, RangeMode};
pub use error::{Error, Result};
pub use review::{ReviewMode, ReviewState};
pub use state::{AbsorbState, State};
pub use traits::StateStore;
pub use undo::{BackupEntry, CleanupReport, PendingBackup, UndoReport};
