//! Service layer for business logic with dependency injection.
//!
//! This module contains services that encapsulate business logic and accept
//! trait-based dependencies, enabling testing with mock implementations.

pub mod absorb;

#[cfg(test)]
pub mod test_mocks;

pub use absorb::{AbsorbService, AbsorbSettings, OracleBackend};
