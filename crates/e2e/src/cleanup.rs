//! Best-effort cleanup
//!
//! Teardown steps must never hide the failure that made a test end, so
//! their own errors are logged and dropped here.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

/// Await a cleanup step, logging instead of propagating its error.
///
/// Returns the step's value when it succeeded.
pub async fn best_effort<T, E, F>(what: &str, step: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match step.await {
        Ok(value) => {
            debug!("{}: done", what);
            Some(value)
        }
        Err(e) => {
            warn!("{} failed (ignored): {}", what, e);
            None
        }
    }
}
