// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Associating captured evidence files (screenshots) with failures.
//!
//! Evidence is captured by the UI layer into one folder per test method, named by convention.
//! For soft failures, the expected file name is derived from the failure's stack trace, so each
//! file can be bound to the failure at the same position.

use crate::{errors::EvidenceIoError, outcome::StackFrame};
use camino::Utf8Path;
use std::collections::BTreeMap;
use swrite::{SWrite, swrite};

/// The note logged next to paginated visual-diff artifacts, explaining how to read them.
pub const PDF_VALIDATION_GUIDE: &str = "<b>How to interpret PDF Visual validation:</b><br><ul><li>Pixels that are equal are faded a bit.</li><li>Pixels that differ are marked in red and green. Red for pixels that where expected, but didn't come. Green for pixels that are there, but where not expected.</li><li> Markings at the edge of the paper in magenta to find areas that differ quickly.</li><li> Ignored Areas are marked with a yellow background.</li><li> Pages that where expected, but did not come are marked with a red border.</l><li> Pages that appear, but where not expected are marked with a green border.</li></ul>";

/// Derives expected evidence file names from stack traces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvidenceNamer {
    namespace: String,
    suffix: String,
}

impl EvidenceNamer {
    /// Creates a new namer for frames whose declaring type starts with `namespace`.
    pub fn new(namespace: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            suffix: suffix.into(),
        }
    }

    /// Returns the expected evidence file name for a failure with the given stack trace.
    ///
    /// The name is the method name of the first frame within the namespace, followed by
    /// `-<line>` for every later frame within the namespace, followed by the suffix. Returns
    /// `None` if no frame is within the namespace.
    pub fn expected_name(&self, frames: &[StackFrame]) -> Option<String> {
        let mut matching = frames
            .iter()
            .filter(|frame| frame.declaring_type.starts_with(&self.namespace));
        let mut name = matching.next()?.method_name.clone();
        for frame in matching {
            swrite!(name, "-{}", frame.line_number);
        }
        name.push_str(&self.suffix);
        Some(name)
    }
}

/// Lists the names of the files in an evidence directory, sorted by name.
///
/// Symlinks count as files if they point to one.
pub fn list_evidence(dir: &Utf8Path) -> Result<Vec<String>, EvidenceIoError> {
    let read_dir = dir
        .read_dir_utf8()
        .map_err(|error| EvidenceIoError::new(dir, error))?;

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|error| EvidenceIoError::new(dir, error))?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_owned());
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// Markers identifying visual-diff artifacts by file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvidenceMatcher {
    visual_diff_marker: String,
    paginated_marker: String,
}

impl EvidenceMatcher {
    /// Creates a new matcher.
    ///
    /// Files whose names contain `visual_diff_marker` are visual-diff artifacts; those whose
    /// names contain `paginated_marker` are paginated (PDF) diffs.
    pub fn new(visual_diff_marker: impl Into<String>, paginated_marker: impl Into<String>) -> Self {
        Self {
            visual_diff_marker: visual_diff_marker.into(),
            paginated_marker: paginated_marker.into(),
        }
    }

    /// Associates `files` with a test's failures.
    ///
    /// `expected` holds the expected evidence name of every failure, by position. A file is
    /// bound to failure `i` if its name equals `expected[i]`, ignoring case. Other files are
    /// considered only if their names contain the method name or the visual-diff marker; those
    /// become whole-test evidence, or paginated diffs.
    pub fn match_files(
        &self,
        method_name: &str,
        files: &[String],
        expected: &[Option<&str>],
    ) -> EvidenceMatch {
        let mut result = EvidenceMatch::default();

        for file in files {
            let indexes: Vec<usize> = expected
                .iter()
                .enumerate()
                .filter(|(_, name)| name.is_some_and(|name| name.eq_ignore_ascii_case(file)))
                .map(|(index, _)| index)
                .collect();

            if !indexes.is_empty() {
                for index in indexes {
                    // Files are sorted, so the first case-insensitive match wins.
                    result.by_failure.entry(index).or_insert_with(|| file.clone());
                }
                continue;
            }

            if !file.contains(&self.visual_diff_marker) && !file.contains(method_name) {
                tracing::debug!("ignoring unrelated evidence file `{file}`");
                continue;
            }

            if file.contains(&self.paginated_marker) {
                result.paginated_diffs.push(file.clone());
            } else {
                result.whole_test.push(file.clone());
            }
        }

        result
    }
}

/// The result of [`EvidenceMatcher::match_files`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvidenceMatch {
    /// Files bound to individual failures, keyed by failure position.
    pub by_failure: BTreeMap<usize, String>,

    /// Files that document the test as a whole.
    pub whole_test: Vec<String>,

    /// Paginated visual-diff artifacts, offered as downloads.
    pub paginated_diffs: Vec<String>,
}

impl EvidenceMatch {
    /// Returns the file bound to the failure at `index`, if any.
    pub fn for_failure(&self, index: usize) -> Option<&str> {
        self.by_failure.get(&index).map(String::as_str)
    }

    /// Returns true if any paginated visual-diff artifact was found.
    pub fn has_paginated_diffs(&self) -> bool {
        !self.paginated_diffs.is_empty()
    }
}
