//! Trait abstraction for oracle backends.
//!
//! This module defines the `Oracle` trait, the seam between the absorb
//! pipeline and whatever produces hunk-to-commit proposals.

use crate::Result;

/// A backend that turns a rendered prompt into a raw reply.
///
/// This trait abstracts oracle calls, allowing for:
/// - A local command (`claude -p` by default)
/// - An HTTP completion endpoint
/// - Scripted replies in tests
///
/// Implementations return the reply text verbatim; validation happens in
/// [`crate::analyze`].
pub trait Oracle: Send + Sync {
    /// Short name used in logs and as the fallback model label.
    fn name(&self) -> &str;

    /// Send a prompt and wait for the reply.
    fn complete(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}
