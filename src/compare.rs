//! Output comparison between the reference answer and the program's output.
//!
//! Lines are split on `\n` and a single trailing `\r` is dropped from each,
//! so CRLF and LF answers are interchangeable. Everything else, trailing
//! spaces and the presence of a final newline included, must match exactly.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{JudgeError, Result};

const CONTEXT_LINES: usize = 2;
const MAX_HUNK_LINES: usize = 5;
const MAX_LINE_BYTES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub equal: bool,
    /// Unified-diff excerpt of the first discrepancy, only when unequal.
    pub diff: Option<String>,
}

impl Comparison {
    fn equal() -> Self {
        Self { equal: true, diff: None }
    }
}

struct Text<'a> {
    lines: Vec<&'a [u8]>,
    final_newline: bool,
}

impl<'a> Text<'a> {
    fn new(content: &'a [u8]) -> Self {
        let mut lines: Vec<&[u8]> = content.split(|&b| b == b'\n').map(strip_cr).collect();
        // `split` yields an empty tail when the content ends with a newline.
        let final_newline = content.last() == Some(&b'\n');
        if final_newline || content.is_empty() {
            lines.pop();
        }
        Self { lines, final_newline }
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

pub fn compare_files(expected: &Path, actual: &Path) -> Result<Comparison> {
    let expected_content = fs::read(expected).map_err(|e| JudgeError::file(expected, e))?;
    let actual_content = fs::read(actual).map_err(|e| JudgeError::file(actual, e))?;
    Ok(compare_bytes(&expected_content, &actual_content))
}

pub fn compare_bytes(expected: &[u8], actual: &[u8]) -> Comparison {
    let expected = Text::new(expected);
    let actual = Text::new(actual);

    match first_difference(&expected.lines, &actual.lines) {
        Some(at) => Comparison {
            equal: false,
            diff: Some(render_hunk(&expected, &actual, at)),
        },
        None if expected.final_newline != actual.final_newline => Comparison {
            equal: false,
            diff: Some(render_newline_hunk(&expected, &actual)),
        },
        None => Comparison::equal(),
    }
}

fn first_difference(expected: &[&[u8]], actual: &[&[u8]]) -> Option<usize> {
    let common = expected.len().min(actual.len());
    (0..common)
        .find(|&i| expected[i] != actual[i])
        .or_else(|| (expected.len() != actual.len()).then_some(common))
}

fn render_hunk(expected: &Text, actual: &Text, at: usize) -> String {
    let start = at.saturating_sub(CONTEXT_LINES);

    // Extent of the differing region: stop at the first index where both
    // sides line up again, or at the hunk cap.
    let mut end = at;
    while end < at + MAX_HUNK_LINES {
        let e = expected.lines.get(end);
        let a = actual.lines.get(end);
        if (e.is_none() && a.is_none()) || (end > at && e == a) {
            break;
        }
        end += 1;
    }
    let removed = &expected.lines[at.min(expected.lines.len())..end.min(expected.lines.len())];
    let added = &actual.lines[at.min(actual.lines.len())..end.min(actual.lines.len())];
    let context = &expected.lines[start..at];

    let mut out = String::from("--- expected\n+++ actual\n");
    let _ = writeln!(
        out,
        "@@ -{} +{} @@",
        hunk_range(start, context.len() + removed.len()),
        hunk_range(start, context.len() + added.len())
    );
    for line in context {
        push_line(&mut out, ' ', line);
    }
    for (i, line) in removed.iter().enumerate() {
        push_line(&mut out, '-', line);
        if at + i + 1 == expected.lines.len() && !expected.final_newline {
            out.push_str("\\ No newline at end of file\n");
        }
    }
    for (i, line) in added.iter().enumerate() {
        push_line(&mut out, '+', line);
        if at + i + 1 == actual.lines.len() && !actual.final_newline {
            out.push_str("\\ No newline at end of file\n");
        }
    }
    out
}

fn render_newline_hunk(expected: &Text, actual: &Text) -> String {
    let last = expected.lines.last().copied().unwrap_or_default();
    let line_no = expected.lines.len().max(1);

    let mut out = String::from("--- expected\n+++ actual\n");
    let _ = writeln!(out, "@@ -{line_no} +{line_no} @@");
    push_line(&mut out, '-', last);
    if !expected.final_newline {
        out.push_str("\\ No newline at end of file\n");
    }
    push_line(&mut out, '+', last);
    if !actual.final_newline {
        out.push_str("\\ No newline at end of file\n");
    }
    out
}

/// Formats a unified-diff range for `len` lines starting at zero-based `start`.
fn hunk_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", start),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

fn push_line(out: &mut String, marker: char, line: &[u8]) {
    out.push(marker);
    if line.len() > MAX_LINE_BYTES {
        out.push_str(&String::from_utf8_lossy(&line[..MAX_LINE_BYTES]));
        out.push_str("...");
    } else {
        out.push_str(&String::from_utf8_lossy(line));
    }
    out.push('\n');
}
