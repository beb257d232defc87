// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the run summaries consumed by `checkpoint`.
//!
//! A run summary is written by the test-execution layer once a run has finished. It lists every
//! executed test method, grouped by suite and by result bucket, together with its raw failure
//! data. `checkpoint` reads it, correlates failures with known-failure records and evidence, and
//! produces a report.

mod errors;
mod exit_codes;
mod run_summary;

pub use errors::*;
pub use exit_codes::*;
pub use run_summary::*;
