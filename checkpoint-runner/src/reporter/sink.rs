// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destinations for report entries.

use crate::{config::ReportFormat, errors::SinkError};
use camino::{Utf8Path, Utf8PathBuf};
use checkpoint_model::{Report, ReportEntry};
use std::fs::File;

/// Accepts structured report entries and persists them.
///
/// Calls arrive in a fixed order: [`start_report`](Self::start_report), then any number of
/// entries and system-info rows, then runner output, then [`flush`](Self::flush).
pub trait ReportSink {
    /// Starts a new report with the given name, discarding anything accepted before.
    fn start_report(&mut self, name: &str) -> Result<(), SinkError>;

    /// Adds a row of run information.
    fn add_system_info(&mut self, key: &str, value: &str) -> Result<(), SinkError>;

    /// Accepts a finished entry.
    fn accept(&mut self, entry: ReportEntry) -> Result<(), SinkError>;

    /// Adds a line of output produced by the test runner.
    fn add_runner_output(&mut self, line: &str) -> Result<(), SinkError>;

    /// Persists everything accepted so far.
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// A sink that keeps the report in memory.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    report: Option<Report>,
}

impl CollectingSink {
    /// Creates a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the report collected so far, if one was started.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// Consumes the sink, returning the collected report.
    pub fn into_report(self) -> Option<Report> {
        self.report
    }

    fn report_mut(&mut self) -> Result<&mut Report, SinkError> {
        self.report.as_mut().ok_or(SinkError::NotStarted)
    }
}

impl ReportSink for CollectingSink {
    fn start_report(&mut self, name: &str) -> Result<(), SinkError> {
        self.report = Some(Report::new(name));
        Ok(())
    }

    fn add_system_info(&mut self, key: &str, value: &str) -> Result<(), SinkError> {
        self.report_mut()?.add_system_info(key, value);
        Ok(())
    }

    fn accept(&mut self, entry: ReportEntry) -> Result<(), SinkError> {
        let report = self.report_mut()?;
        // The report's timestamp is the earliest start time of any entry.
        if let Some(start) = entry.start_time
            && report.timestamp.is_none_or(|timestamp| start < timestamp)
        {
            report.set_timestamp(start);
        }
        report.add_entry(entry);
        Ok(())
    }

    fn add_runner_output(&mut self, line: &str) -> Result<(), SinkError> {
        self.report_mut()?.add_runner_output(line);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.report_mut().map(|_| ())
    }
}

/// A sink that writes the report to a file on flush.
#[derive(Clone, Debug)]
pub struct FileSink {
    path: Utf8PathBuf,
    format: ReportFormat,
    inner: CollectingSink,
}

impl FileSink {
    /// Creates a new sink writing to `path` in the given format.
    pub fn new(path: impl Into<Utf8PathBuf>, format: ReportFormat) -> Self {
        Self {
            path: path.into(),
            format,
            inner: CollectingSink::new(),
        }
    }

    /// Returns the path the report is written to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the report collected so far, if one was started.
    pub fn report(&self) -> Option<&Report> {
        self.inner.report()
    }
}

impl ReportSink for FileSink {
    fn start_report(&mut self, name: &str) -> Result<(), SinkError> {
        self.inner.start_report(name)
    }

    fn add_system_info(&mut self, key: &str, value: &str) -> Result<(), SinkError> {
        self.inner.add_system_info(key, value)
    }

    fn accept(&mut self, entry: ReportEntry) -> Result<(), SinkError> {
        self.inner.accept(entry)
    }

    fn add_runner_output(&mut self, line: &str) -> Result<(), SinkError> {
        self.inner.add_runner_output(line)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let report = self.inner.report_mut()?;

        if let Some(dir) = self.path.parent()
            && !dir.as_str().is_empty()
        {
            std::fs::create_dir_all(dir).map_err(|error| SinkError::Fs {
                file: dir.to_path_buf(),
                error,
            })?;
        }

        let f = File::create(&self.path).map_err(|error| SinkError::Fs {
            file: self.path.clone(),
            error,
        })?;
        let res = match self.format {
            ReportFormat::Xml => report.serialize(f),
            ReportFormat::Json => report.serialize_json(f),
        };
        res.map_err(|error| SinkError::Serialize {
            file: self.path.clone(),
            error,
        })?;

        tracing::debug!(
            "wrote {} report with {} entries to {}",
            self.format,
            report.tests,
            self.path
        );
        Ok(())
    }
}
