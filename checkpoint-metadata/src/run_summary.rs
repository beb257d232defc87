// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::RunSummaryParseError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// The root of a run summary: everything a finished test run hands over for reporting.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RunSummary {
    /// The known-failures configuration string declared by the run, if any.
    ///
    /// The format is `key1_ref1 ; key2_ref2 ; key3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_failures: Option<String>,

    /// Free-text output produced by the test runner itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runner_output: Vec<String>,

    /// The suites executed in this run, in execution order.
    #[serde(default)]
    pub suites: Vec<SuiteSummary>,
}

impl RunSummary {
    /// Parses a run summary from its JSON representation.
    pub fn parse_json(json: &str) -> Result<Self, RunSummaryParseError> {
        serde_json::from_str(json).map_err(RunSummaryParseError::new)
    }

    /// Returns the parent suite of this run, if one was recorded.
    pub fn parent_suite(&self) -> Option<&SuiteSummary> {
        self.suites.iter().find(|suite| suite.parent)
    }
}

/// A single suite within a run.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteSummary {
    /// The name of the suite.
    pub name: String,

    /// True if this is the top-level suite that includes the others.
    #[serde(default)]
    pub parent: bool,

    /// The test outcomes of this suite, partitioned by result bucket.
    #[serde(default)]
    pub results: SuiteResults,
}

/// Test outcomes of a suite, partitioned by result bucket.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteResults {
    /// Tests that failed.
    #[serde(default)]
    pub failed: Vec<TestOutcomeSummary>,

    /// Tests that were skipped.
    #[serde(default)]
    pub skipped: Vec<TestOutcomeSummary>,

    /// Tests that passed.
    #[serde(default)]
    pub passed: Vec<TestOutcomeSummary>,

    /// Configuration methods (setup/teardown) that failed.
    #[serde(default)]
    pub failed_configurations: Vec<TestOutcomeSummary>,
}

impl SuiteResults {
    /// Returns true if no outcomes were recorded in any bucket.
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
            && self.skipped.is_empty()
            && self.passed.is_empty()
            && self.failed_configurations.is_empty()
    }

    /// Returns the total number of outcomes across all buckets.
    pub fn len(&self) -> usize {
        self.failed.len() + self.skipped.len() + self.passed.len() + self.failed_configurations.len()
    }
}

/// One executed test method instance.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TestOutcomeSummary {
    /// The name of the test method.
    pub method_name: String,

    /// Group tags declared on the method.
    #[serde(default)]
    pub groups: Vec<String>,

    /// The free-text description of the method. May embed tracking tags after a `#`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The status of this outcome.
    pub status: TestStatusSummary,

    /// Start time, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub start_millis: i64,

    /// End time, in milliseconds since the Unix epoch.
    #[serde(default)]
    pub end_millis: i64,

    /// Invocation parameters, in order. `null` entries stand for absent values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<serde_json::Value>,

    /// The root failure, if the test did not pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureSummary>,

    /// Arbitrary run metadata attached to this outcome.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// The status of a test outcome.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatusSummary {
    /// The test passed.
    Pass,
    /// The test failed.
    Fail,
    /// The test was skipped.
    Skip,
}

impl fmt::Display for TestStatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// The root failure of a test outcome.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureSummary {
    /// A single assertion failure or exception.
    Single(ThrowableSummary),

    /// Several soft-assertion failures collected before the test method exited.
    Composite {
        /// The collected failures, in the order they were recorded.
        errors: Vec<SoftErrorSummary>,
    },
}

/// One entry of a composite failure.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SoftErrorSummary {
    /// A failure recorded directly as structured data.
    Structured(ThrowableSummary),

    /// A failure recorded as serialized JSON text, as produced by legacy assertion libraries.
    Serialized(String),
}

/// A structured failure: a message plus a stack trace.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ThrowableSummary {
    /// The failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The stack trace, innermost frame first.
    #[serde(default)]
    pub stack_trace: Vec<StackFrameSummary>,
}

/// A single stack frame.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub struct StackFrameSummary {
    /// The fully qualified name of the type declaring the method.
    pub declaring_class: String,

    /// The method name.
    pub method_name: String,

    /// The line number, or a negative number if unknown.
    #[serde(default = "unknown_line")]
    pub line_number: i32,
}

fn unknown_line() -> i32 {
    -1
}
