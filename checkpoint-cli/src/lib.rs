// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line entry point for checkpoint.
//!
//! `checkpoint report` turns the run summary of a finished test run into a report, correlating
//! failures with known failures and captured evidence. `checkpoint known-failures` shows how a
//! known-failures string is interpreted.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
