//! Verification of a programmed image against its read-back
//!
//! The read-back is compared byte for byte, address aligned. The controller
//! returns the whole device, so anything past the end of the image is
//! padding and is dropped before comparing. Differences are reported as a
//! unified diff where each line is one byte rendered as 8-bit binary text,
//! the same form as the image files.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::error::{Error, Result};

/// Unchanged lines shown around each difference
pub const DIFF_CONTEXT: usize = 3;

/// One byte that differs between image and read-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteMismatch {
    /// Address of the byte
    pub address: usize,
    /// Value from the program image
    pub expected: u8,
    /// Value read back from the chip
    pub actual: u8,
}

/// Kind of a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// Present on both sides
    Context,
    /// Only in the program image
    Removed,
    /// Only in the read-back
    Added,
}

/// One line of a diff hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffLine {
    /// Line kind
    pub kind: DiffKind,
    /// Byte value on this line
    pub value: u8,
}

impl DiffLine {
    fn prefix(&self) -> char {
        match self.kind {
            DiffKind::Context => ' ',
            DiffKind::Removed => '-',
            DiffKind::Added => '+',
        }
    }
}

/// A contiguous block of differences with surrounding context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Address of the first line of the hunk
    pub start: usize,
    /// Number of addresses the hunk spans
    pub len: usize,
    /// Lines in unified diff order
    pub lines: Vec<DiffLine>,
}

/// Outcome of comparing an image with its read-back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    compared: usize,
    mismatches: Vec<ByteMismatch>,
    hunks: Vec<Hunk>,
}

/// Compare the program image with the bytes read back from the chip
///
/// `actual` is truncated to the length of `expected`. A read-back shorter
/// than the image is reported as [`Error::ShortReadback`].
pub fn compare(expected: &[u8], actual: &[u8]) -> Result<VerificationReport> {
    if actual.len() < expected.len() {
        return Err(Error::ShortReadback {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    let actual = &actual[..expected.len()];

    let mismatches: Vec<ByteMismatch> = expected
        .iter()
        .zip(actual.iter())
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .map(|(address, (&expected, &actual))| ByteMismatch {
            address,
            expected,
            actual,
        })
        .collect();

    let hunks = build_hunks(expected, actual, &mismatches);

    if mismatches.is_empty() {
        log::debug!("verify: {} bytes match", expected.len());
    } else {
        log::debug!(
            "verify: {} of {} bytes differ, first at 0x{:04X}",
            mismatches.len(),
            expected.len(),
            mismatches[0].address
        );
    }

    Ok(VerificationReport {
        compared: expected.len(),
        mismatches,
        hunks,
    })
}

/// Group mismatches into hunks, merging ones whose context overlaps
fn build_hunks(expected: &[u8], actual: &[u8], mismatches: &[ByteMismatch]) -> Vec<Hunk> {
    let mut windows: Vec<(usize, usize)> = Vec::new();
    for m in mismatches {
        let lo = m.address.saturating_sub(DIFF_CONTEXT);
        let hi = core::cmp::min(m.address + 1 + DIFF_CONTEXT, expected.len());
        match windows.last_mut() {
            Some((_, end)) if lo <= *end => *end = hi,
            _ => windows.push((lo, hi)),
        }
    }

    windows
        .into_iter()
        .map(|(start, end)| {
            let mut lines = Vec::with_capacity(end - start);
            let mut addr = start;
            while addr < end {
                if expected[addr] == actual[addr] {
                    lines.push(DiffLine {
                        kind: DiffKind::Context,
                        value: expected[addr],
                    });
                    addr += 1;
                    continue;
                }

                // A run of changed bytes: all removals, then all additions
                let run_start = addr;
                while addr < end && expected[addr] != actual[addr] {
                    addr += 1;
                }
                lines.extend(expected[run_start..addr].iter().map(|&value| DiffLine {
                    kind: DiffKind::Removed,
                    value,
                }));
                lines.extend(actual[run_start..addr].iter().map(|&value| DiffLine {
                    kind: DiffKind::Added,
                    value,
                }));
            }
            Hunk {
                start,
                len: end - start,
                lines,
            }
        })
        .collect()
}

impl VerificationReport {
    /// True when the read-back matches the image
    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Number of bytes compared (the image length)
    pub fn compared(&self) -> usize {
        self.compared
    }

    /// Every differing byte, in address order
    pub fn mismatches(&self) -> &[ByteMismatch] {
        &self.mismatches
    }

    /// Diff hunks, in address order
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    /// Diff as individual lines, without trailing newlines
    ///
    /// Empty when the verification succeeded.
    pub fn diff_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.hunks.is_empty() {
            return out;
        }

        out.push(String::from("--- expected"));
        out.push(String::from("+++ actual"));
        for hunk in &self.hunks {
            let range = format_range(hunk.start, hunk.len);
            let mut header = String::new();
            let _ = write!(header, "@@ -{} +{} @@", range, range);
            out.push(header);

            for line in &hunk.lines {
                let mut text = String::with_capacity(9);
                let _ = write!(text, "{}{:08b}", line.prefix(), line.value);
                out.push(text);
            }
        }
        out
    }

    /// Diff rendered as a single newline-terminated string
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.diff_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Turn a failed verification into [`Error::VerificationMismatch`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::VerificationMismatch {
                differing: self.mismatches.len(),
            })
        }
    }
}

/// Unified diff range: 1-based start, length omitted when it is 1
fn format_range(start: usize, len: usize) -> String {
    let mut out = String::new();
    if len == 1 {
        let _ = write!(out, "{}", start + 1);
    } else {
        let _ = write!(out, "{},{}", start + 1, len);
    }
    out
}
