//! Character-based text patches in diff-match-patch text form.
//!
//! ```text
//! @@ -1,3 +1,4 @@
//!  ab
//! -c
//! +de
//! ```
//!
//! Each hunk header gives the start and length of the hunk in the old and
//! new text, in characters. Body lines start with ` ` (context), `-`
//! (deleted) or `+` (inserted) and are percent-encoded, so a body line never
//! contains a raw newline.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

/// How far from its expected position a hunk may be found.
pub const MATCH_DISTANCE: usize = 1000;

// Characters left readable by the encoder on the server side.
const BODY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b' ')
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'?')
    .remove(b'@')
    .remove(b'_')
    .remove(b'~');

/// Errors from parsing patch text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchTextError {
    /// Hunk header is not `@@ -a[,b] +c[,d] @@`
    #[error("line {line}: invalid hunk header {header:?}")]
    InvalidHeader {
        /// 1-based line number
        line: usize,
        /// Offending header
        header: String,
    },

    /// Body line starts with an unknown operation
    #[error("line {line}: invalid operation {op:?}")]
    InvalidOp {
        /// 1-based line number
        line: usize,
        /// Offending operation character
        op: char,
    },

    /// Body line does not percent-decode to UTF-8
    #[error("line {line}: body is not valid percent-encoded UTF-8")]
    InvalidEncoding {
        /// 1-based line number
        line: usize,
    },

    /// Body line before the first hunk header
    #[error("line {line}: body line outside of a hunk")]
    BodyOutsideHunk {
        /// 1-based line number
        line: usize,
    },
}

/// Kind of a diff segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Present in both texts
    Equal,
    /// Only in the old text
    Delete,
    /// Only in the new text
    Insert,
}

impl Op {
    fn sign(self) -> char {
        match self {
            Self::Equal => ' ',
            Self::Delete => '-',
            Self::Insert => '+',
        }
    }
}

/// One hunk of a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Start in the old text, in characters
    pub start1: usize,
    /// Length in the old text, in characters
    pub length1: usize,
    /// Start in the new text, in characters
    pub start2: usize,
    /// Length in the new text, in characters
    pub length2: usize,
    /// Diff segments in order
    pub diffs: Vec<(Op, String)>,
}

impl Hunk {
    fn empty(start1: usize, length1: usize, start2: usize, length2: usize) -> Self {
        Self {
            start1,
            length1,
            start2,
            length2,
            diffs: Vec::new(),
        }
    }

    /// The text this hunk expects to find.
    #[must_use]
    pub fn old_text(&self) -> String {
        self.collect(Op::Insert)
    }

    /// The text this hunk leaves behind.
    #[must_use]
    pub fn new_text(&self) -> String {
        self.collect(Op::Delete)
    }

    fn collect(&self, skip: Op) -> String {
        self.diffs
            .iter()
            .filter(|(op, _)| *op != skip)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

/// Parse patch text into hunks.
///
/// # Errors
///
/// Returns a [`PatchTextError`] describing the first malformed line.
pub fn parse(text: &str) -> Result<Vec<Hunk>, PatchTextError> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for (idx, raw_line) in text.split('\n').enumerate() {
        let line = idx.saturating_add(1);
        let mut chars = raw_line.chars();
        let Some(sign) = chars.next() else {
            continue;
        };

        if sign == '@' {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            current = Some(parse_header(line, raw_line)?);
            continue;
        }

        let op = match sign {
            ' ' => Op::Equal,
            '-' => Op::Delete,
            '+' => Op::Insert,
            other => return Err(PatchTextError::InvalidOp { line, op: other }),
        };
        let hunk = current
            .as_mut()
            .ok_or(PatchTextError::BodyOutsideHunk { line })?;
        let body = percent_decode_str(chars.as_str())
            .decode_utf8()
            .map_err(|_| PatchTextError::InvalidEncoding { line })?;
        hunk.diffs.push((op, body.into_owned()));
    }

    if let Some(hunk) = current {
        hunks.push(hunk);
    }
    Ok(hunks)
}

fn parse_header(line: usize, header: &str) -> Result<Hunk, PatchTextError> {
    let invalid = || PatchTextError::InvalidHeader {
        line,
        header: header.to_string(),
    };

    let inner = header
        .strip_prefix("@@ -")
        .and_then(|rest| rest.strip_suffix(" @@"))
        .ok_or_else(invalid)?;
    let (old, new) = inner.split_once(" +").ok_or_else(invalid)?;
    let (start1, length1) = parse_range(old).ok_or_else(invalid)?;
    let (start2, length2) = parse_range(new).ok_or_else(invalid)?;
    Ok(Hunk::empty(start1, length1, start2, length2))
}

// `s` is 1-based unless the length is zero, and a missing length means 1.
fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, length) = match range.split_once(',') {
        Some((start, length)) => (start, length),
        None => (range, ""),
    };
    let start = parse_digits(start)?;
    match length {
        "" => Some((start.checked_sub(1)?, 1)),
        "0" => Some((start, 0)),
        length => Some((start.checked_sub(1)?, parse_digits(length)?)),
    }
}

fn parse_digits(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Render hunks as patch text.
#[must_use]
pub fn to_text(hunks: &[Hunk]) -> String {
    let mut out = String::new();
    for hunk in hunks {
        out.push_str("@@ -");
        out.push_str(&format_range(hunk.start1, hunk.length1));
        out.push_str(" +");
        out.push_str(&format_range(hunk.start2, hunk.length2));
        out.push_str(" @@\n");
        for (op, text) in &hunk.diffs {
            out.push(op.sign());
            out.extend(utf8_percent_encode(text, BODY_ENCODE_SET));
            out.push('\n');
        }
    }
    out
}

fn format_range(start: usize, length: usize) -> String {
    match length {
        0 => format!("{start},0"),
        1 => start.saturating_add(1).to_string(),
        _ => format!("{},{length}", start.saturating_add(1)),
    }
}

/// Build a single-hunk patch turning `old` into `new`.
///
/// The hunk spans everything between the common prefix and the common
/// suffix of the two texts. Identical texts produce an empty patch.
#[must_use]
pub fn make_patch(old: &str, new: &str) -> String {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let prefix = old_chars
        .iter()
        .zip(&new_chars)
        .take_while(|(a, b)| a == b)
        .count();
    let old_rest = old_chars.get(prefix..).unwrap_or_default();
    let new_rest = new_chars.get(prefix..).unwrap_or_default();
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let removed: String = old_rest
        .get(..old_rest.len().saturating_sub(suffix))
        .unwrap_or_default()
        .iter()
        .collect();
    let inserted: String = new_rest
        .get(..new_rest.len().saturating_sub(suffix))
        .unwrap_or_default()
        .iter()
        .collect();

    if removed.is_empty() && inserted.is_empty() {
        return String::new();
    }

    let mut hunk = Hunk::empty(
        prefix,
        removed.chars().count(),
        prefix,
        inserted.chars().count(),
    );
    if !removed.is_empty() {
        hunk.diffs.push((Op::Delete, removed));
    }
    if !inserted.is_empty() {
        hunk.diffs.push((Op::Insert, inserted));
    }
    to_text(&[hunk])
}

/// Apply hunks to `text`.
///
/// Returns the patched text and one success flag per hunk. A hunk is
/// applied where its old text sits exactly at the expected position, or
/// else at the nearest exact occurrence within [`MATCH_DISTANCE`]
/// characters; otherwise it is skipped and reported as `false`.
#[must_use]
pub fn apply(hunks: &[Hunk], text: &str) -> (String, Vec<bool>) {
    let mut chars: Vec<char> = text.chars().collect();
    let mut results = Vec::with_capacity(hunks.len());
    // Actual position minus the position the server computed.
    let mut delta: isize = 0;

    for hunk in hunks {
        let old: Vec<char> = hunk.old_text().chars().collect();
        let new: Vec<char> = hunk.new_text().chars().collect();
        let expected = shift(hunk.start2, delta);

        match locate(&chars, &old, expected) {
            Some(loc) => {
                delta = signed(loc).saturating_sub(signed(hunk.start2));
                let end = loc.saturating_add(old.len()).min(chars.len());
                let _replaced: Vec<char> = chars.splice(loc..end, new).collect();
                results.push(true);
            }
            None => {
                delta = delta.saturating_sub(signed(new.len()).saturating_sub(signed(old.len())));
                results.push(false);
            }
        }
    }

    (chars.into_iter().collect(), results)
}

fn locate(haystack: &[char], needle: &[char], expected: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(expected.min(haystack.len()));
    }

    let end = expected.saturating_add(needle.len());
    if haystack.get(expected..end) == Some(needle) {
        return Some(expected);
    }

    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(pos, window)| *window == needle && pos.abs_diff(expected) <= MATCH_DISTANCE)
        .map(|(pos, _)| pos)
        .min_by_key(|pos| pos.abs_diff(expected))
}

fn signed(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

fn shift(base: usize, delta: isize) -> usize {
    usize::try_from(signed(base).saturating_add(delta)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), PatchTextError>;

    #[test]
    fn test_parse_single_line_replacement() -> TestResult {
        let hunks = parse("@@ -1,1 +1,1 @@\n-a\n+b\n")?;
        assert_eq!(
            hunks,
            vec![Hunk {
                start1: 0,
                length1: 1,
                start2: 0,
                length2: 1,
                diffs: vec![(Op::Delete, "a".into()), (Op::Insert, "b".into())],
            }]
        );
        Ok(())
    }

    #[test]
    fn test_parse_header_forms() -> TestResult {
        let hunks = parse("@@ -0,0 +1,3 @@\n+abc\n@@ -5 +7 @@\n-x\n+y\n")?;
        assert_eq!(hunks.len(), 2);
        let first = hunks.first().map(|h| (h.start1, h.length1, h.start2, h.length2));
        let second = hunks.get(1).map(|h| (h.start1, h.length1, h.start2, h.length2));
        assert_eq!(first, Some((0, 0, 0, 3)));
        assert_eq!(second, Some((4, 1, 6, 1)));
        Ok(())
    }

    #[test]
    fn test_parse_decodes_body() -> TestResult {
        let hunks = parse("@@ -1,4 +1,6 @@\n x%0Ay\n+%25%0A\n %C3%A9\n")?;
        let new_text = hunks.first().map(Hunk::new_text);
        assert_eq!(new_text.as_deref(), Some("x\ny%\n\u{e9}"));
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(
            parse("@@ -a +1 @@\n"),
            Err(PatchTextError::InvalidHeader { line: 1, .. })
        ));
        assert!(matches!(
            parse("@@ -1 +1 @@\n*x\n"),
            Err(PatchTextError::InvalidOp { line: 2, op: '*' })
        ));
        assert!(matches!(
            parse("-x\n"),
            Err(PatchTextError::BodyOutsideHunk { line: 1 })
        ));
        assert!(matches!(
            parse("@@ -1 +1 @@\n-%FF\n"),
            Err(PatchTextError::InvalidEncoding { line: 2 })
        ));
    }

    #[test]
    fn test_apply_at_expected_position() -> TestResult {
        let hunks = parse("@@ -1,1 +1,1 @@\n-a\n+b\n")?;
        assert_eq!(apply(&hunks, "a"), ("b".to_string(), vec![true]));
        Ok(())
    }

    #[test]
    fn test_apply_finds_shifted_context() -> TestResult {
        let hunks = parse("@@ -1,5 +1,5 @@\n hel\n-lo\n+p!\n")?;
        let (text, results) = apply(&hunks, "### hello");
        assert_eq!(text, "### help!");
        assert_eq!(results, vec![true]);
        Ok(())
    }

    #[test]
    fn test_apply_reports_missing_context() -> TestResult {
        let hunks = parse("@@ -1,3 +1,3 @@\n-abc\n+xyz\n")?;
        let (text, results) = apply(&hunks, "something else");
        assert_eq!(text, "something else");
        assert_eq!(results, vec![false]);
        Ok(())
    }

    #[test]
    fn test_make_patch_then_apply() -> TestResult {
        let old = "import os\nVALUE = 1\nprint(VALUE)\n";
        let new = "import os\nVALUE = 42\nprint(VALUE)\n";
        let hunks = parse(&make_patch(old, new))?;
        let (text, results) = apply(&hunks, old);
        assert_eq!(text, new);
        assert_eq!(results, vec![true]);
        Ok(())
    }

    #[test]
    fn test_make_patch_for_new_file() -> TestResult {
        let hunks = parse(&make_patch("", "print('hi')\n"))?;
        assert_eq!(apply(&hunks, "").0, "print('hi')\n");
        Ok(())
    }

    #[test]
    fn test_identical_texts_make_empty_patch() {
        assert_eq!(make_patch("same", "same"), "");
    }
}
