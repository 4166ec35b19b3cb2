//! PyPy.js editor test primitives
//!
//! Browser-independent pieces of the editor harness: text normalization,
//! the console diff reporter, the console assertion and the polling
//! completion waiter.

pub mod assertion;
pub mod diff;
pub mod text;
pub mod wait;

// Re-export commonly used types
pub use assertion::{assert_console, ConsoleMismatch};
pub use diff::{diff_entries, make_diff, DiffEntry, DiffTag};
pub use text::{dedent, encode_for_script, TextBlock, ENCODED_NEWLINE};
pub use wait::{
    poll_until, Clock, CompletionWaiter, ManualClock, Pacing, TokioClock, WaitOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
