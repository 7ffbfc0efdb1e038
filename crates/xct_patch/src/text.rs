//! Line-based text patches.
//!
//! Patches are generated with zero context lines so that drift elsewhere in a
//! file does not stop them from applying. A patch file looks like a unified
//! diff without context:
//!
//! ```text
//! --- a/types/TLaser.txt
//! +++ b/types/TLaser.txt
//! @@ -12 +12 @@
//! -A;10;20;B;
//! +A;15;20;B;
//! @@ -40,0 +41,2 @@
//! +C;1;2;D;
//! +E;3;4;F;
//! ```
//!
//! Lines are split on `\n` only, so a `\r` before the newline is part of the
//! line content on both sides.
//!
//! Replay walks the hunks in order with a running offset: each deletion
//! removes the line at the hunk's effective index after checking it against
//! the recorded text, each insertion adds a line there. Replay works on a
//! copy, so a mismatch leaves the caller's text untouched.

use crate::canonical::{canonicalize_markup, CanonicalOptions};
use crate::diff::{diff_lines, Edit};
use crate::error::{Error, Result};

/// Marker line recording that a patch was generated from canonicalized markup.
pub const CANONICAL_MARKER: &str = "# xct: canonical";

/// One contiguous block of deletions and insertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first deleted line, or for a pure insertion the line after
    /// which the insertion goes (0 = start of file).
    pub old_start: usize,
    /// Same convention on the modified side.
    pub new_start: usize,
    pub deletions: Vec<String>,
    pub insertions: Vec<String>,
}

impl Hunk {
    /// 0-based index in the original text where this hunk operates.
    fn base_index(&self) -> usize {
        if self.deletions.is_empty() {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

/// An ordered list of hunks for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPatch {
    /// Virtual path the patch was generated for, if recorded.
    pub target: Option<String>,
    /// Whether both sides were canonicalized before diffing.
    pub canonical: bool,
    pub hunks: Vec<Hunk>,
}

impl DiffPatch {
    /// Diff `original` against `modified`.
    pub fn generate(original: &str, modified: &str) -> Self {
        let old: Vec<&str> = original.split('\n').collect();
        let new: Vec<&str> = modified.split('\n').collect();
        let edits = diff_lines(&old, &new);

        let mut hunks = Vec::new();
        let mut current: Option<Hunk> = None;
        let (mut old_pos, mut new_pos) = (0usize, 0usize);

        for edit in edits {
            match edit {
                Edit::Equal { .. } => {
                    if let Some(hunk) = current.take() {
                        hunks.push(finish_hunk(hunk));
                    }
                    old_pos += 1;
                    new_pos += 1;
                }
                Edit::Delete { old: idx } => {
                    let hunk = current.get_or_insert_with(|| open_hunk(old_pos, new_pos));
                    hunk.deletions.push(old[idx].to_string());
                    old_pos += 1;
                }
                Edit::Insert { new: idx } => {
                    let hunk = current.get_or_insert_with(|| open_hunk(old_pos, new_pos));
                    hunk.insertions.push(new[idx].to_string());
                    new_pos += 1;
                }
            }
        }
        if let Some(hunk) = current.take() {
            hunks.push(finish_hunk(hunk));
        }

        Self {
            target: None,
            canonical: false,
            hunks,
        }
    }

    /// Canonicalize both markup inputs, then diff.
    pub fn generate_canonical(
        original: &str,
        modified: &str,
        options: &CanonicalOptions,
    ) -> Result<Self> {
        let original = canonicalize_markup(original, options)?;
        let modified = canonicalize_markup(modified, options)?;
        let mut patch = Self::generate(&original, &modified);
        patch.canonical = true;
        Ok(patch)
    }

    /// Record the virtual path this patch targets.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Apply the patch to `original`, returning the patched text.
    pub fn replay(&self, original: &str) -> Result<String> {
        let mut lines: Vec<&str> = original.split('\n').collect();
        let mut offset: isize = 0;

        for (hunk_no, hunk) in self.hunks.iter().enumerate() {
            let mut idx = hunk.base_index() as isize + offset;
            if idx < 0 || idx as usize > lines.len() {
                return Err(Error::Mismatch {
                    hunk: hunk_no + 1,
                    line: hunk.old_start,
                    expected: hunk.deletions.first().cloned().unwrap_or_default(),
                    found: None,
                });
            }

            for expected in &hunk.deletions {
                let at = idx as usize;
                match lines.get(at) {
                    Some(found) if *found == expected.as_str() => {
                        lines.remove(at);
                        offset -= 1;
                    }
                    found => {
                        return Err(Error::Mismatch {
                            hunk: hunk_no + 1,
                            line: (at as isize - offset) as usize + 1,
                            expected: expected.clone(),
                            found: found.map(|s| s.to_string()),
                        });
                    }
                }
            }

            for inserted in &hunk.insertions {
                lines.insert(idx as usize, inserted.as_str());
                idx += 1;
                offset += 1;
            }
        }

        Ok(lines.join("\n"))
    }

    /// Parse patch file text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut patch = DiffPatch::default();
        let mut current: Option<(Hunk, Option<usize>, Option<usize>)> = None;

        for (line_no, line) in text.split('\n').enumerate() {
            let line_no = line_no + 1;

            // While a hunk still expects change lines, `---` and `+++` are content.
            let (want_del, want_ins) = match &current {
                Some((hunk, old_count, new_count)) => (
                    hunk.deletions.len() < old_count.unwrap_or(1),
                    hunk.insertions.len() < new_count.unwrap_or(1),
                ),
                None => (false, false),
            };

            if want_del && line.starts_with('-') {
                hunk_for(&mut current, line_no)?.deletions.push(line[1..].to_string());
            } else if want_ins && line.starts_with('+') {
                hunk_for(&mut current, line_no)?.insertions.push(line[1..].to_string());
            } else if line.starts_with("@@") {
                if let Some(done) = current.take() {
                    patch.hunks.push(check_counts(done)?);
                }
                current = Some(parse_header(line, line_no)?);
            } else if line.starts_with("---") || line.starts_with("+++") {
                if current.is_none() && patch.target.is_none() {
                    if let Some(target) = line.strip_prefix("+++") {
                        let target = target.trim();
                        let target = target.strip_prefix("b/").unwrap_or(target);
                        patch.target = Some(target.to_string());
                    }
                }
            } else if let Some(body) = line.strip_prefix('-') {
                hunk_for(&mut current, line_no)?.deletions.push(body.to_string());
            } else if let Some(body) = line.strip_prefix('+') {
                hunk_for(&mut current, line_no)?.insertions.push(body.to_string());
            } else if line.starts_with('\\') || line.trim_end_matches('\r').is_empty() {
                continue;
            } else if current.is_none() {
                if line.trim() == CANONICAL_MARKER {
                    patch.canonical = true;
                }
            } else {
                return Err(Error::MalformedPatch {
                    line: line_no,
                    reason: format!("unexpected line inside hunk: {:?}", line),
                });
            }
        }

        if let Some(done) = current.take() {
            patch.hunks.push(check_counts(done)?);
        }
        Ok(patch)
    }

    /// Render as patch file text.
    pub fn to_patch_string(&self) -> String {
        let mut out = String::new();
        if self.canonical {
            out.push_str(CANONICAL_MARKER);
            out.push('\n');
        }
        if let Some(target) = &self.target {
            out.push_str(&format!("--- a/{}\n+++ b/{}\n", target, target));
        }
        for hunk in &self.hunks {
            out.push_str(&format!(
                "@@ -{} +{} @@\n",
                format_range(hunk.old_start, hunk.deletions.len()),
                format_range(hunk.new_start, hunk.insertions.len())
            ));
            for line in &hunk.deletions {
                out.push('-');
                out.push_str(line);
                out.push('\n');
            }
            for line in &hunk.insertions {
                out.push('+');
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

fn open_hunk(old_pos: usize, new_pos: usize) -> Hunk {
    Hunk {
        old_start: old_pos,
        new_start: new_pos,
        deletions: Vec::new(),
        insertions: Vec::new(),
    }
}

/// Convert the 0-based open positions to header numbering.
fn finish_hunk(mut hunk: Hunk) -> Hunk {
    if !hunk.deletions.is_empty() {
        hunk.old_start += 1;
    }
    if !hunk.insertions.is_empty() {
        hunk.new_start += 1;
    }
    hunk
}

fn format_range(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{},{}", start, count)
    }
}

fn parse_range(range: &str, line_no: usize) -> Result<(usize, Option<usize>)> {
    let malformed = |reason: &str| Error::MalformedPatch {
        line: line_no,
        reason: format!("{}: {:?}", reason, range),
    };
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (
            start,
            Some(count.parse().map_err(|_| malformed("bad count"))?),
        ),
        None => (range, None),
    };
    let start = start.parse().map_err(|_| malformed("bad start"))?;
    Ok((start, count))
}

fn parse_header(line: &str, line_no: usize) -> Result<(Hunk, Option<usize>, Option<usize>)> {
    let malformed = || Error::MalformedPatch {
        line: line_no,
        reason: format!("bad hunk header: {:?}", line),
    };
    let inner = line
        .trim_end_matches('\r')
        .strip_prefix("@@")
        .and_then(|rest| rest.split("@@").next())
        .ok_or_else(malformed)?;
    let mut parts = inner.split_whitespace();
    let old = parts
        .next()
        .and_then(|p| p.strip_prefix('-'))
        .ok_or_else(malformed)?;
    let new = parts
        .next()
        .and_then(|p| p.strip_prefix('+'))
        .ok_or_else(malformed)?;

    let (old_start, old_count) = parse_range(old, line_no)?;
    let (new_start, new_count) = parse_range(new, line_no)?;
    if old_start == 0 && old_count != Some(0) {
        return Err(malformed());
    }

    Ok((
        Hunk {
            old_start,
            new_start,
            deletions: Vec::new(),
            insertions: Vec::new(),
        },
        old_count,
        new_count,
    ))
}

fn hunk_for(
    current: &mut Option<(Hunk, Option<usize>, Option<usize>)>,
    line_no: usize,
) -> Result<&mut Hunk> {
    current
        .as_mut()
        .map(|(hunk, _, _)| hunk)
        .ok_or_else(|| Error::MalformedPatch {
            line: line_no,
            reason: "change line before any hunk header".to_string(),
        })
}

fn check_counts((hunk, old_count, new_count): (Hunk, Option<usize>, Option<usize>)) -> Result<Hunk> {
    let old_count = old_count.unwrap_or(1);
    let new_count = new_count.unwrap_or(1);
    if hunk.deletions.len() != old_count || hunk.insertions.len() != new_count {
        return Err(Error::MalformedPatch {
            line: hunk.old_start,
            reason: format!(
                "hunk declares -{} +{} lines but has -{} +{}",
                old_count,
                new_count,
                hunk.deletions.len(),
                hunk.insertions.len()
            ),
        });
    }
    Ok(hunk)
}
