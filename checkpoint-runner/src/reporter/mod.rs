// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build reports from the results of a test run.
//!
//! The main type here is [`ResultAggregator`], which sends one entry per test outcome to a
//! [`ReportSink`].

mod aggregator;
mod helpers;
mod sink;

pub use aggregator::*;
pub use sink::*;
