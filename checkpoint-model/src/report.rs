// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    serialize::{serialize_report, serialize_report_json},
    SerializeError,
};
use chrono::{DateTime, FixedOffset};
use indexmap::map::IndexMap;
use serde::Serialize;
use std::{fmt, io, ops::Deref};

/// The root element of a checkpoint report.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    /// The name of this report.
    pub name: String,

    /// The time at which the first test in this report began execution.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// The total number of entries in this report.
    pub tests: usize,

    /// The number of failed entries.
    pub failed: usize,

    /// The number of skipped entries.
    pub skipped: usize,

    /// The number of passed entries.
    pub passed: usize,

    /// Free-form key-value information about the run, e.g. tracking links and their status.
    pub system_info: IndexMap<String, String>,

    /// Output produced by the test runner itself.
    pub runner_output: Vec<XmlString>,

    /// The entries contained in this report, in emission order.
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Creates a new `Report` with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            tests: 0,
            failed: 0,
            skipped: 0,
            passed: 0,
            system_info: IndexMap::new(),
            runner_output: vec![],
            entries: vec![],
        }
    }

    /// Sets the start timestamp for the report.
    pub fn set_timestamp(&mut self, timestamp: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Adds a key-value pair of run information. Later values for the same key replace earlier
    /// ones, keeping the original position.
    pub fn add_system_info(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.system_info.insert(key.into(), value.into());
        self
    }

    /// Adds a line of test runner output.
    pub fn add_runner_output(&mut self, line: impl AsRef<str>) -> &mut Self {
        self.runner_output.push(XmlString::new(line));
        self
    }

    /// Adds a new entry and updates the `tests`, `failed`, `skipped` and `passed` counts.
    ///
    /// When generating a new report, use of this method is recommended over adding to
    /// `self.entries` directly.
    pub fn add_entry(&mut self, entry: ReportEntry) -> &mut Self {
        self.tests += 1;
        match entry.status {
            EntryStatus::Pass => self.passed += 1,
            EntryStatus::Fail => self.failed += 1,
            EntryStatus::Skip => self.skipped += 1,
        }
        self.entries.push(entry);
        self
    }

    /// Serialize this report as XML to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report(self, writer)
    }

    /// Serialize this report as pretty-printed JSON to the given writer.
    pub fn serialize_json(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        serialize_report_json(self, writer)
    }

    /// Serialize this report as XML to a string.
    pub fn to_string(&self) -> Result<String, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// The status of a report entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    /// The test passed.
    Pass,
    /// The test failed, either through an assertion or an unexpected error.
    Fail,
    /// The test was not run.
    Skip,
}

impl EntryStatus {
    /// Returns the lowercase name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            EntryStatus::Pass => "pass",
            EntryStatus::Fail => "fail",
            EntryStatus::Skip => "skip",
        }
    }

    /// Returns the past-tense verb describing this status, e.g. "failed".
    pub fn past_tense(self) -> &'static str {
        match self {
            EntryStatus::Pass => "passed",
            EntryStatus::Fail => "failed",
            EntryStatus::Skip => "skipped",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in a report, corresponding to one executed test method.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ReportEntry {
    /// The title of the entry. May contain hyperlink markup.
    pub title: XmlString,

    /// Category labels: the suite name, followed by the method's group tags.
    pub categories: Vec<String>,

    /// The status of this entry.
    pub status: EntryStatus,

    /// The time at which the test began execution.
    pub start_time: Option<DateTime<FixedOffset>>,

    /// The time at which the test finished execution.
    pub end_time: Option<DateTime<FixedOffset>>,

    /// Log lines, in the order they were added.
    pub logs: Vec<LogLine>,

    /// One slot per failure recorded by the test, in failure order.
    pub failures: Vec<FailureSlot>,
}

impl ReportEntry {
    /// Creates a new entry.
    pub fn new(title: impl AsRef<str>, status: EntryStatus) -> Self {
        Self {
            title: XmlString::new(title),
            categories: vec![],
            status,
            start_time: None,
            end_time: None,
            logs: vec![],
            failures: vec![],
        }
    }

    /// Assigns a category to this entry. Assigning the same category twice is a no-op.
    pub fn add_category(&mut self, category: impl Into<String>) -> &mut Self {
        let category = category.into();
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
        self
    }

    /// Sets the start time of this entry.
    pub fn set_start_time(&mut self, time: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.start_time = Some(time.into());
        self
    }

    /// Sets the end time of this entry.
    pub fn set_end_time(&mut self, time: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.end_time = Some(time.into());
        self
    }

    /// Adds a log line without media.
    pub fn log(&mut self, level: LogLevel, message: impl AsRef<str>) -> &mut Self {
        self.logs.push(LogLine::new(level, message));
        self
    }

    /// Adds a log line with attached media.
    pub fn log_with_media(
        &mut self,
        level: LogLevel,
        message: impl AsRef<str>,
        media: Media,
    ) -> &mut Self {
        let mut line = LogLine::new(level, message);
        line.media = Some(media);
        self.logs.push(line);
        self
    }

    /// Adds an informational log line.
    pub fn info(&mut self, message: impl AsRef<str>) -> &mut Self {
        self.log(LogLevel::Info, message)
    }

    /// Adds a warning log line.
    pub fn warning(&mut self, message: impl AsRef<str>) -> &mut Self {
        self.log(LogLevel::Warning, message)
    }

    /// Adds a failure slot.
    pub fn add_failure(&mut self, slot: FailureSlot) -> &mut Self {
        self.failures.push(slot);
        self
    }
}

/// The severity of a log line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// A passing step.
    Pass,
    /// A failing step.
    Fail,
    /// A skipped step.
    Skip,
    /// An unexpected error.
    Error,
    /// A warning, typically attached to evidence.
    Warning,
    /// General information.
    Info,
}

impl LogLevel {
    /// Returns the lowercase name of this level.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Pass => "pass",
            LogLevel::Fail => "fail",
            LogLevel::Skip => "skip",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
        }
    }
}

impl From<EntryStatus> for LogLevel {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Pass => LogLevel::Pass,
            EntryStatus::Fail => LogLevel::Fail,
            EntryStatus::Skip => LogLevel::Skip,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log line within an entry.
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    /// The severity of this line.
    pub level: LogLevel,

    /// The text of this line. May contain HTML-safe markup.
    pub message: XmlString,

    /// Media attached to this line.
    pub media: Option<Media>,
}

impl LogLine {
    /// Creates a new log line without media.
    pub fn new(level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            level,
            message: XmlString::new(message),
            media: None,
        }
    }
}

/// Media attached to a log line or failure slot.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Media {
    /// An image displayed inline.
    Screenshot {
        /// The path to the image, relative to the report.
        path: String,
    },

    /// A file offered as a download link rather than inline.
    Download {
        /// The path to the file, relative to the report.
        path: String,
    },
}

impl Media {
    /// Returns the path of this media.
    pub fn path(&self) -> &str {
        match self {
            Media::Screenshot { path } | Media::Download { path } => path,
        }
    }

    /// Returns the kind of this media, as serialized.
    pub fn kind(&self) -> &'static str {
        match self {
            Media::Screenshot { .. } => "screenshot",
            Media::Download { .. } => "download",
        }
    }
}

/// An external tracking reference, resolved to a hyperlink.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TrackingLink {
    /// The tracking reference, e.g. an issue key.
    pub reference: String,

    /// The URL the reference points to.
    pub url: String,
}

impl TrackingLink {
    /// Creates a new tracking link.
    pub fn new(reference: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            url: url.into(),
        }
    }
}

/// One failure recorded by a test: its identity, plus the evidence and tracking reference
/// resolved for it.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FailureSlot {
    /// The zero-based position of this failure within the test.
    pub index: usize,

    /// The checkpoint id the failure was correlated with.
    pub checkpoint_id: String,

    /// The failure message.
    pub message: Option<XmlString>,

    /// The evidence attached to this failure.
    pub evidence: Option<Media>,

    /// The tracking reference, if the failure is already known.
    pub tracking: Option<TrackingLink>,
}

impl FailureSlot {
    /// Creates a new, unresolved failure slot.
    pub fn new(index: usize, checkpoint_id: impl Into<String>) -> Self {
        Self {
            index,
            checkpoint_id: checkpoint_id.into(),
            message: None,
            evidence: None,
            tracking: None,
        }
    }

    /// Sets the failure message.
    pub fn set_message(&mut self, message: impl AsRef<str>) -> &mut Self {
        self.message = Some(XmlString::new(message));
        self
    }

    /// Sets the evidence.
    pub fn set_evidence(&mut self, evidence: Media) -> &mut Self {
        self.evidence = Some(evidence);
        self
    }

    /// Sets the tracking link.
    pub fn set_tracking(&mut self, tracking: TrackingLink) -> &mut Self {
        self.tracking = Some(tracking);
        self
    }
}

/// A string that can be written out to XML.
///
/// Characters that are not allowed in XML 1.0 documents are removed on construction.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct XmlString {
    data: Box<str>,
}

impl XmlString {
    /// Creates a new `XmlString`, removing any characters that are not allowed in XML.
    pub fn new(data: impl AsRef<str>) -> Self {
        let data = data
            .as_ref()
            .replace(
                |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
                "",
            )
            .into_boxed_str();
        Self { data }
    }

    /// Returns the string.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Converts this into a `String`.
    pub fn into_string(self) -> String {
        self.data.into_string()
    }
}

impl AsRef<str> for XmlString {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

impl Deref for XmlString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl fmt::Display for XmlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

impl From<XmlString> for String {
    fn from(s: XmlString) -> Self {
        s.into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_string_strips_control_characters() {
        let s = XmlString::new("a\x00b\x1bc\td\ne");
        assert_eq!(s.as_str(), "abc\td\ne");
    }

    #[test]
    fn add_entry_updates_counts() {
        let mut report = Report::new("run");
        for (title, status) in [
            ("a", EntryStatus::Fail),
            ("b", EntryStatus::Pass),
            ("c", EntryStatus::Pass),
            ("d", EntryStatus::Skip),
        ] {
            report.add_entry(ReportEntry::new(title, status));
        }
        assert_eq!(
            (report.tests, report.failed, report.passed, report.skipped),
            (4, 1, 2, 1)
        );
    }

    #[test]
    fn categories_are_deduplicated() {
        let mut entry = ReportEntry::new("t", EntryStatus::Pass);
        entry
            .add_category("smoke")
            .add_category("regression")
            .add_category("smoke");
        assert_eq!(entry.categories, vec!["smoke", "regression"]);
    }

    #[test]
    fn system_info_keeps_first_position() {
        let mut report = Report::new("run");
        report
            .add_system_info("a", "1")
            .add_system_info("b", "2")
            .add_system_info("a", "3");
        let pairs: Vec<_> = report
            .system_info
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }
}
