//! Text normalization shared by the console assertion and the submission path
//!
//! Code and expected output travel to the page inside single-quoted
//! JavaScript literals, which cannot hold raw line breaks. Both sides agree
//! on [`ENCODED_NEWLINE`] (a backslash followed by `n`) as the stand-in.

use std::fmt;

/// Two-character stand-in for a line break inside an injected script string
pub const ENCODED_NEWLINE: &str = "\\n";

/// A console or reference block, compared after trimming the whole block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TextBlock(String);

impl TextBlock {
    /// Normalize raw text into a block
    pub fn new(raw: &str) -> Self {
        Self(normalize_block(raw).to_string())
    }

    /// Dedent, then normalize. Used for reference text written inline.
    pub fn reference(raw: &str) -> Self {
        Self::new(&dedent(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.0.lines()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TextBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TextBlock {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Strip leading and trailing whitespace of the whole block
pub fn normalize_block(raw: &str) -> &str {
    raw.trim()
}

/// Remove the common leading whitespace from every line.
///
/// Lines holding only whitespace are ignored when computing the margin and
/// come out empty. Tabs and spaces are not treated as equivalent.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(leading_whitespace)
        .fold(None::<&str>, |common, indent| match common {
            None => Some(indent),
            Some(common) => Some(common_prefix(common, indent)),
        })
        .unwrap_or("");

    let mut out = String::with_capacity(text.len());
    for segment in text.split_inclusive('\n') {
        let (line, newline) = match segment.strip_suffix('\n') {
            Some(line) => (line, "\n"),
            None => (segment, ""),
        };
        if !line.trim().is_empty() {
            out.push_str(line.strip_prefix(margin).unwrap_or(line));
        }
        out.push_str(newline);
    }
    out
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()));
    &a[..end]
}

/// Follow every encoded newline with a real one, so it shows up as its own
/// line in a diff.
pub fn expand_encoded_newlines(raw: &str) -> String {
    raw.replace(ENCODED_NEWLINE, "\\n\n")
}

/// Split a raw block into diff lines.
///
/// Encoded newlines are expanded first. A trailing line break yields a
/// trailing empty line.
pub fn split_diff_lines(raw: &str) -> Vec<String> {
    expand_encoded_newlines(raw)
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Encode source code for `CodeMirrorEditor.setValue('...')`.
///
/// Backslashes and single quotes are escaped, the code is dedented and
/// trimmed, and its lines are joined with [`ENCODED_NEWLINE`].
pub fn encode_for_script(code: &str) -> String {
    let escaped = code.replace('\\', "\\\\").replace('\'', "\\'");
    dedent(&escaped)
        .trim()
        .lines()
        .collect::<Vec<_>>()
        .join(ENCODED_NEWLINE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_block_equality_ignores_outer_whitespace() {
        assert_eq!(TextBlock::new("\n  Hello!\n\n"), TextBlock::new("Hello!"));
        assert_ne!(TextBlock::new("a\nb"), TextBlock::new("a\n\nb"));
    }

    #[test]
    fn test_block_lines() {
        let block = TextBlock::new("\none\ntwo\n");
        assert_eq!(block.lines().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn test_reference_block_dedents() {
        let block = TextBlock::reference(
            "
            0
            1
            OK
        ",
        );
        assert_eq!(block.as_str(), "0\n1\nOK");
    }

    #[test_case("    a\n      b\n    c" => "a\n  b\nc"; "nested indent")]
    #[test_case("  a\n\n  b" => "a\n\nb"; "blank line kept")]
    #[test_case("  a\n   \n  b\n" => "a\n\nb\n"; "whitespace only line emptied")]
    #[test_case("a\n  b" => "a\n  b"; "no common margin")]
    #[test_case("\ta\n\tb" => "a\nb"; "tabs")]
    #[test_case("\ta\n    b" => "\ta\n    b"; "mixed tabs and spaces")]
    #[test_case("" => ""; "empty")]
    fn test_dedent(input: &str) -> String {
        dedent(input)
    }

    #[test]
    fn test_split_expands_encoded_newline() {
        assert_eq!(split_diff_lines("a\\nnew line"), vec!["a\\n", "new line"]);
        assert_eq!(split_diff_lines("one\ntwo\n"), vec!["one", "two", ""]);
        assert_eq!(split_diff_lines(""), vec![""]);
    }

    #[test_case("print 'single quote'" => "print \\'single quote\\'"; "single quotes")]
    #[test_case("print \"a\\nnew line\"" => "print \"a\\\\nnew line\""; "escaped newline")]
    #[test_case("\n    print \"one\"\n    print \"two\"\n" => "print \"one\"\\nprint \"two\""; "multiline")]
    #[test_case("for i in range(2):\n    print i" => "for i in range(2):\\n    print i"; "indent kept")]
    fn test_encode_for_script(code: &str) -> String {
        encode_for_script(code)
    }

    #[test]
    fn test_encoded_script_is_single_line() {
        let encoded = encode_for_script("import sys\n\nprint sys.platform\n");
        assert!(!encoded.contains('\n'));
        assert_eq!(encoded, "import sys\\n\\nprint sys.platform");
    }
}
