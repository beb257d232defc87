// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `checkpoint` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum CheckpointExitCode {}

impl CheckpointExitCode {
    /// No errors occurred and checkpoint exited normally.
    pub const OK: i32 = 0;

    /// The report was written, and it contains at least one failed test.
    ///
    /// Only produced when `--fail-on-failures` is passed.
    pub const REPORT_HAS_FAILURES: i32 = 100;

    /// The run summary could not be read or parsed.
    pub const RUN_SUMMARY_READ_FAILED: i32 = 104;

    /// The report sink failed to persist the report.
    pub const SINK_FAILED: i32 = 105;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a checkpoint invocation, e.g. invalid configuration.
    pub const SETUP_ERROR: i32 = 96;
}
