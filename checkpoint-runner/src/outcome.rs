// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test outcomes, as seen by the aggregator.
//!
//! These are converted from the wire-format types in [`checkpoint_metadata`] once per run, and are
//! never mutated afterwards.

use checkpoint_metadata::{
    FailureSummary, SoftErrorSummary, StackFrameSummary, TestOutcomeSummary, TestStatusSummary,
    ThrowableSummary,
};
use checkpoint_model::EntryStatus;
use chrono::{DateTime, FixedOffset};
use std::{collections::BTreeMap, fmt};

/// The attribute holding the start timestamp of a parameterized invocation.
///
/// The evidence folder of a parameterized test is named after it.
pub const START_TIMESTAMP_ATTRIBUTE: &str = "StartTimeStamp";

/// One executed test method instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestOutcome {
    /// The name of the test method.
    pub method_name: String,

    /// Group tags declared on the method.
    pub groups: Vec<String>,

    /// The free-text description of the method.
    pub description: Option<String>,

    /// The status of this outcome.
    pub status: TestStatus,

    /// The time at which the test started.
    pub start_time: Option<DateTime<FixedOffset>>,

    /// The time at which the test finished.
    pub end_time: Option<DateTime<FixedOffset>>,

    /// Invocation parameters, in order. `None` stands for an absent value.
    pub parameters: Vec<Option<String>>,

    /// The root failure, if any.
    pub failure: Option<RootFailure>,

    /// Arbitrary run metadata.
    pub attributes: BTreeMap<String, String>,
}

impl TestOutcome {
    /// Converts a wire-format summary into an outcome.
    pub fn from_summary(summary: &TestOutcomeSummary) -> Self {
        Self {
            method_name: summary.method_name.clone(),
            groups: summary.groups.clone(),
            description: summary.description.clone(),
            status: summary.status.into(),
            start_time: millis_to_time(summary.start_millis),
            end_time: millis_to_time(summary.end_millis),
            parameters: summary
                .parameters
                .iter()
                .map(|value| match value {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect(),
            failure: summary.failure.as_ref().map(RootFailure::from_summary),
            attributes: summary.attributes.clone(),
        }
    }

    /// Returns the soft-assertion failures of this outcome, if it failed through a composite
    /// failure.
    pub fn composite_failure(&self) -> Option<&CompositeFailure> {
        match &self.failure {
            Some(RootFailure::Composite(composite)) => Some(composite),
            _ => None,
        }
    }

    /// Returns the name of the folder holding this outcome's evidence files.
    ///
    /// Parameterized invocations are suffixed with their start timestamp attribute.
    pub fn evidence_folder_name(&self) -> String {
        if self.parameters.is_empty() {
            self.method_name.clone()
        } else {
            let timestamp = self
                .attributes
                .get(START_TIMESTAMP_ATTRIBUTE)
                .map_or("null", String::as_str);
            format!("{}_withParameters_{}", self.method_name, timestamp)
        }
    }
}

fn millis_to_time(millis: i64) -> Option<DateTime<FixedOffset>> {
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis).map(|time| time.fixed_offset())
}

/// The status of a test outcome.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TestStatus {
    /// The test passed.
    Pass,
    /// The test failed.
    Fail,
    /// The test was skipped.
    Skip,
}

impl From<TestStatusSummary> for TestStatus {
    fn from(status: TestStatusSummary) -> Self {
        match status {
            TestStatusSummary::Pass => TestStatus::Pass,
            TestStatusSummary::Fail => TestStatus::Fail,
            TestStatusSummary::Skip => TestStatus::Skip,
        }
    }
}

impl From<TestStatus> for EntryStatus {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Pass => EntryStatus::Pass,
            TestStatus::Fail => EntryStatus::Fail,
            TestStatus::Skip => EntryStatus::Skip,
        }
    }
}

/// The root failure of a test outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RootFailure {
    /// A single failure.
    Single(FailureRecord),

    /// Several soft-assertion failures.
    Composite(CompositeFailure),
}

impl RootFailure {
    fn from_summary(summary: &FailureSummary) -> Self {
        match summary {
            FailureSummary::Single(throwable) => {
                RootFailure::Single(FailureRecord::from_summary(throwable))
            }
            FailureSummary::Composite { errors } => RootFailure::Composite(CompositeFailure {
                entries: errors
                    .iter()
                    .map(|error| match error {
                        SoftErrorSummary::Structured(throwable) => {
                            SoftFailureEntry::Structured(FailureRecord::from_summary(throwable))
                        }
                        SoftErrorSummary::Serialized(text) => {
                            SoftFailureEntry::Serialized(text.clone())
                        }
                    })
                    .collect(),
            }),
        }
    }
}

/// A test-level failure aggregating soft-assertion failures, in the order they were recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeFailure {
    /// The recorded failures.
    pub entries: Vec<SoftFailureEntry>,
}

/// One entry of a composite failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoftFailureEntry {
    /// Recorded as structured data.
    Structured(FailureRecord),

    /// Recorded as serialized text, still to be decoded.
    Serialized(String),
}

/// One assertion failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureRecord {
    /// The failure message.
    pub message: Option<String>,

    /// The stack frames, innermost first.
    pub frames: Vec<StackFrame>,
}

impl FailureRecord {
    /// Creates a new failure record.
    pub fn new(message: Option<String>, frames: Vec<StackFrame>) -> Self {
        Self { message, frames }
    }

    fn from_summary(summary: &ThrowableSummary) -> Self {
        Self {
            message: summary.message.clone(),
            frames: summary.stack_trace.iter().map(StackFrame::from).collect(),
        }
    }

    /// Returns the message, or the empty string if there is none.
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

/// A single stack frame.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StackFrame {
    /// The fully qualified name of the type declaring the method.
    pub declaring_type: String,

    /// The method name.
    pub method_name: String,

    /// The line number, negative if unknown.
    pub line_number: i32,
}

impl StackFrame {
    /// Creates a new stack frame.
    pub fn new(
        declaring_type: impl Into<String>,
        method_name: impl Into<String>,
        line_number: i32,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            line_number,
        }
    }
}

impl From<&StackFrameSummary> for StackFrame {
    fn from(frame: &StackFrameSummary) -> Self {
        Self::new(
            frame.declaring_class.clone(),
            frame.method_name.clone(),
            frame.line_number,
        )
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line_number >= 0 {
            write!(
                f,
                "{}.{}:{}",
                self.declaring_type, self.method_name, self.line_number
            )
        } else {
            write!(f, "{}.{}", self.declaring_type, self.method_name)
        }
    }
}
