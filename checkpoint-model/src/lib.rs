// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model and serializers for checkpoint reports.
//!
//! A [`Report`] is an ordered list of [`ReportEntry`] values, one per executed test method, each
//! carrying log lines, attached media and per-failure [`FailureSlot`]s. Reports can be written out
//! as XML or JSON.

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
