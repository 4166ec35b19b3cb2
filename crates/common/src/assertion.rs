//! Console output assertion

use thiserror::Error;

use crate::diff::make_diff;
use crate::text::TextBlock;

/// Console text differs from the reference
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "\n\n*** Console output is: ***\n{actual}\n\n*** the reference: ***\n{expected}\n\n*** diff: ***\n{diff}"
)]
pub struct ConsoleMismatch {
    pub actual: TextBlock,
    pub expected: TextBlock,
    pub diff: String,
}

impl ConsoleMismatch {
    pub fn new(actual: TextBlock, expected: TextBlock) -> Self {
        let diff = make_diff(actual.as_str(), expected.as_str());
        Self {
            actual,
            expected,
            diff,
        }
    }
}

/// Compare console text with an inline reference.
///
/// The console text is trimmed; the reference is dedented and trimmed. The
/// diff is rendered only when the blocks differ.
pub fn assert_console(actual: &str, expected: &str) -> Result<(), ConsoleMismatch> {
    let actual = TextBlock::new(actual);
    let expected = TextBlock::reference(expected);
    if actual == expected {
        Ok(())
    } else {
        Err(ConsoleMismatch::new(actual, expected))
    }
}
