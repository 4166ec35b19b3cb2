//! Line diffs for console assertion failures
//!
//! Only used to explain a mismatch; pass/fail is decided by plain string
//! equality in [`crate::assertion`]. Lines are diffed with Myers from
//! `similar`; changed hunks are refined ndiff style so that a line which was
//! merely edited shows up as `-`/`?`/`+`/`?` with intraline markers.

use std::fmt;
use std::ops::Range;

use similar::{capture_diff_slices, Algorithm, DiffTag as OpTag, TextDiff};

use crate::text::split_diff_lines;

/// Minimum similarity for two lines to be reported as one edited line
const PAIR_CUTOFF: f32 = 0.75;

/// Classification of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffTag {
    Unchanged,
    Added,
    Removed,
    /// Intraline change markers for the line above
    Hint,
}

impl DiffTag {
    pub fn prefix(&self) -> &'static str {
        match self {
            DiffTag::Unchanged => "  ",
            DiffTag::Added => "+ ",
            DiffTag::Removed => "- ",
            DiffTag::Hint => "? ",
        }
    }
}

/// One line of a merged diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Zero-based position in the merged output
    pub index: usize,
    pub tag: DiffTag,
    pub text: String,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>2} {}{}", self.index, self.tag.prefix(), self.text)
    }
}

/// Diff two raw blocks into tagged entries, in document order
pub fn diff_entries(actual: &str, expected: &str) -> Vec<DiffEntry> {
    let old = split_diff_lines(actual);
    let new = split_diff_lines(expected);

    let mut out = Vec::new();
    for hunk in hunks(&old, &new) {
        match hunk {
            Hunk::Equal(range) => {
                for line in &old[range] {
                    out.push((DiffTag::Unchanged, line.clone()));
                }
            }
            Hunk::Changed(a, b) => refine(&old[a], &new[b], &mut out),
        }
    }

    out.into_iter()
        .enumerate()
        .map(|(index, (tag, text))| DiffEntry { index, tag, text })
        .collect()
}

/// Render the diff of two blocks, one numbered line per entry
pub fn make_diff(actual: &str, expected: &str) -> String {
    diff_entries(actual, expected)
        .iter()
        .map(|entry| format!("{entry}\n"))
        .collect()
}

enum Hunk {
    Equal(Range<usize>),
    Changed(Range<usize>, Range<usize>),
}

/// Group the Myers ops into equal runs and changed hunks.
///
/// Adjacent deletes and inserts are merged into one changed hunk.
fn hunks(old: &[String], new: &[String]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut pending: Option<(Range<usize>, Range<usize>)> = None;

    for op in capture_diff_slices(Algorithm::Myers, old, new) {
        let (tag, a, b) = op.as_tag_tuple();
        if tag == OpTag::Equal {
            if let Some((pa, pb)) = pending.take() {
                hunks.push(Hunk::Changed(pa, pb));
            }
            hunks.push(Hunk::Equal(a));
            continue;
        }
        pending = Some(match pending.take() {
            Some((pa, pb)) => (pa.start..a.end, pb.start..b.end),
            None => (a, b),
        });
    }
    if let Some((pa, pb)) = pending {
        hunks.push(Hunk::Changed(pa, pb));
    }
    hunks
}

fn refine(a: &[String], b: &[String], out: &mut Vec<(DiffTag, String)>) {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => {}
        (false, true) => push_all(DiffTag::Removed, a, out),
        (true, false) => push_all(DiffTag::Added, b, out),
        (false, false) => fancy_replace(a, b, out),
    }
}

fn push_all(tag: DiffTag, lines: &[String], out: &mut Vec<(DiffTag, String)>) {
    out.extend(lines.iter().map(|line| (tag, line.clone())));
}

/// Find the most similar pair in a changed hunk, report it as an edit and
/// recurse on either side of it.
fn fancy_replace(a: &[String], b: &[String], out: &mut Vec<(DiffTag, String)>) {
    let mut best_ratio = PAIR_CUTOFF - 0.01;
    let mut best = None;
    for (j, new_line) in b.iter().enumerate() {
        for (i, old_line) in a.iter().enumerate() {
            let ratio = line_ratio(old_line, new_line);
            if ratio > best_ratio {
                best_ratio = ratio;
                best = Some((i, j));
            }
        }
    }

    let Some((i, j)) = best else {
        plain_replace(a, b, out);
        return;
    };

    refine(&a[..i], &b[..j], out);
    if a[i] == b[j] {
        out.push((DiffTag::Unchanged, a[i].clone()));
    } else {
        push_edited_pair(&a[i], &b[j], out);
    }
    refine(&a[i + 1..], &b[j + 1..], out);
}

/// Shorter side first; removals first on a tie
fn plain_replace(a: &[String], b: &[String], out: &mut Vec<(DiffTag, String)>) {
    if b.len() < a.len() {
        push_all(DiffTag::Added, b, out);
        push_all(DiffTag::Removed, a, out);
    } else {
        push_all(DiffTag::Removed, a, out);
        push_all(DiffTag::Added, b, out);
    }
}

fn line_ratio(a: &str, b: &str) -> f32 {
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b)
        .ratio()
}

fn push_edited_pair(old: &str, new: &str, out: &mut Vec<(DiffTag, String)>) {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(old, new);

    let mut old_marks = String::new();
    let mut new_marks = String::new();
    for op in diff.ops() {
        let (tag, a, b) = op.as_tag_tuple();
        let (old_mark, new_mark) = match tag {
            OpTag::Equal => (' ', ' '),
            OpTag::Replace => ('^', '^'),
            OpTag::Delete => ('-', ' '),
            OpTag::Insert => (' ', '+'),
        };
        if tag != OpTag::Insert {
            old_marks.extend(std::iter::repeat(old_mark).take(a.len()));
        }
        match tag {
            OpTag::Delete => {}
            OpTag::Equal => new_marks.extend(std::iter::repeat(' ').take(a.len())),
            _ => new_marks.extend(std::iter::repeat(new_mark).take(b.len())),
        }
    }

    out.push((DiffTag::Removed, old.to_string()));
    let old_marks = keep_original_whitespace(old, &old_marks);
    if !old_marks.is_empty() {
        out.push((DiffTag::Hint, old_marks));
    }
    out.push((DiffTag::Added, new.to_string()));
    let new_marks = keep_original_whitespace(new, &new_marks);
    if !new_marks.is_empty() {
        out.push((DiffTag::Hint, new_marks));
    }
}

/// Blank marker positions reuse the line's own whitespace so tabs line up.
/// Trailing blanks are dropped.
fn keep_original_whitespace(line: &str, marks: &str) -> String {
    let aligned: String = line
        .chars()
        .zip(marks.chars())
        .map(|(c, mark)| if mark == ' ' && c.is_whitespace() { c } else { mark })
        .collect();
    aligned.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(entries: &[DiffEntry]) -> Vec<DiffTag> {
        entries.iter().map(|e| e.tag).collect()
    }

    #[test]
    fn test_identical_blocks_are_unchanged() {
        let text = "locals: {}\nglobals: {}";
        let entries = diff_entries(text, text);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.tag == DiffTag::Unchanged));
    }

    #[test]
    fn test_entry_format() {
        let entry = DiffEntry {
            index: 3,
            tag: DiffTag::Removed,
            text: "one".to_string(),
        };
        assert_eq!(entry.to_string(), " 3 - one");

        let entry = DiffEntry {
            index: 12,
            tag: DiffTag::Unchanged,
            text: "two".to_string(),
        };
        assert_eq!(entry.to_string(), "12   two");
    }

    #[test]
    fn test_added_line() {
        let entries = diff_entries("one", "one\ntwo");
        assert_eq!(tags(&entries), vec![DiffTag::Unchanged, DiffTag::Added]);
        assert_eq!(entries[1].text, "two");
    }

    #[test]
    fn test_edited_line_gets_markers() {
        let entries = diff_entries("Hello PyPy", "Hello PyPy.js!");
        assert_eq!(
            tags(&entries),
            vec![DiffTag::Removed, DiffTag::Added, DiffTag::Hint]
        );
        assert_eq!(entries[2].text, "          ++++");
    }

    #[test]
    fn test_replaced_characters() {
        let entries = diff_entries("2.7.8", "2.7.9");
        assert_eq!(
            tags(&entries),
            vec![DiffTag::Removed, DiffTag::Hint, DiffTag::Added, DiffTag::Hint]
        );
        assert_eq!(entries[1].text, "    ^");
        assert_eq!(entries[3].text, "    ^");
    }

    #[test]
    fn test_unrelated_lines_are_plain() {
        let entries = diff_entries("js", "Traceback (most recent call last):");
        assert_eq!(tags(&entries), vec![DiffTag::Removed, DiffTag::Added]);
    }

    #[test]
    fn test_plain_replace_shorter_side_first() {
        let entries = diff_entries("abc\ndef", "xyz");
        assert_eq!(
            tags(&entries),
            vec![DiffTag::Added, DiffTag::Removed, DiffTag::Removed]
        );
    }

    #[test]
    fn test_encoded_newline_becomes_line_break() {
        let entries = diff_entries("a\\nnew line", "a\nnew line");
        let texts: Vec<_> = entries.iter().map(|e| e.text.as_str()).collect();
        assert!(texts.contains(&"a\\n"));
        assert_eq!(entries.last().map(|e| e.tag), Some(DiffTag::Unchanged));
        assert_eq!(entries.last().map(|e| e.text.as_str()), Some("new line"));
    }

    #[test]
    fn test_keep_original_whitespace() {
        assert_eq!(keep_original_whitespace("\tab", "  ^"), "\t ^");
        assert_eq!(keep_original_whitespace("abc", "^  "), "^");
    }

    #[test]
    fn test_make_diff_numbers_lines() {
        let diff = make_diff("one\ntwo", "one\nthree");
        let lines: Vec<_> = diff.lines().collect();
        assert_eq!(lines[0], " 0   one");
        assert!(lines[1].starts_with(" 1 - two"));
        assert!(diff.ends_with('\n'));
    }
}
