//! # sorb-oracle
//!
//! Asks an external oracle which earlier commit each staged hunk belongs
//! to, and turns its reply into a validated [`AbsorbResponse`].
//!
//! # Security
//!
//! API keys for the HTTP backend are stored using `SecretString` which
//! zeroizes memory when dropped.

mod client;
mod command;
mod error;
mod request;
mod response;
mod scripted;
pub mod traits;
mod types;

use tracing::{debug, instrument};

pub use client::HttpOracle;
pub use command::CommandOracle;
pub use error::{Error, Result};
pub use request::render_prompt;
pub use response::parse_response;
pub use scripted::ScriptedOracle;
// Re-export SecretString for constructing HttpOracle keys
pub use secrecy::SecretString;
pub use traits::Oracle;
pub use types::{
    AbsorbRequest, AbsorbResponse, AlternativeAssignment, HunkAssignment, Strategy,
    clamp_confidence,
};

/// Ask `oracle` to place the request's hunks.
///
/// With no candidate commits every hunk is unmatched and the oracle is not
/// called.
///
/// # Errors
/// Returns `NothingToAnalyze` for a request without hunks, `EmptyResponse`
/// for a blank reply, `Parse` for an unusable one, or the backend's error.
#[instrument(skip_all, fields(
    oracle = oracle.name(),
    hunks = request.hunks.len(),
    commits = request.commits.len()
))]
pub async fn analyze<O: Oracle>(oracle: &O, request: &AbsorbRequest) -> Result<AbsorbResponse> {
    if request.hunks.is_empty() {
        return Err(Error::NothingToAnalyze);
    }
    if request.commits.is_empty() {
        debug!("no candidate commits, every hunk unmatched");
        return Ok(AbsorbResponse {
            assignments: Vec::new(),
            unmatched: request.hunks.clone(),
            model: None,
        });
    }

    let prompt = render_prompt(request);
    debug!(bytes = prompt.len(), "rendered prompt");

    let reply = oracle.complete(&prompt, request.model.as_deref()).await?;
    if reply.trim().is_empty() {
        return Err(Error::EmptyResponse);
    }
    debug!(bytes = reply.len(), "received reply");

    let mut response = parse_response(&reply, request)?;
    response.model = Some(
        request
            .model
            .clone()
            .unwrap_or_else(|| oracle.name().to_string()),
    );
    debug!(
        assigned = response.assignments.len(),
        unmatched = response.unmatched.len(),
        "validated reply"
    );
    Ok(response)
}
