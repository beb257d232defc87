// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading run summaries from disk.

use crate::errors::RunSummaryReadError;
use camino::Utf8Path;
use checkpoint_metadata::RunSummary;

/// Reads and parses the run summary at `path`.
pub fn read_run_summary(path: &Utf8Path) -> Result<RunSummary, RunSummaryReadError> {
    let contents = std::fs::read_to_string(path).map_err(|error| RunSummaryReadError::Read {
        path: path.to_owned(),
        error,
    })?;
    let summary = RunSummary::parse_json(&contents).map_err(|error| RunSummaryReadError::Parse {
        path: path.to_owned(),
        error,
    })?;
    tracing::debug!(
        "read run summary from {path}: {} suites",
        summary.suites.len()
    );
    Ok(summary)
}
