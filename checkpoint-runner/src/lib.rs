// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for checkpoint: correlating the failures of a finished test run with
//! durable identities, known failures and captured evidence, and building a report from them.
//!
//! The basic flow is:
//!
//! 1. Read a [`RunSummary`](checkpoint_metadata::RunSummary) with [`input::read_run_summary`].
//! 2. Load a [`CheckpointConfig`](config::CheckpointConfig).
//! 3. Run a [`ResultAggregator`](reporter::ResultAggregator) over the summary, sending entries to
//!    a [`ReportSink`](reporter::ReportSink).

pub mod config;
pub mod errors;
pub mod evidence;
pub mod fingerprint;
pub mod input;
pub mod known_failures;
pub mod outcome;
pub mod reporter;
pub mod soft_failure;
