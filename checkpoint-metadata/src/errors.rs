// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a [`RunSummary`](crate::RunSummary) from JSON.
#[derive(Debug)]
pub struct RunSummaryParseError {
    inner: serde_json::Error,
}

impl RunSummaryParseError {
    pub(crate) fn new(inner: serde_json::Error) -> Self {
        Self { inner }
    }

    /// Returns the line at which parsing failed.
    pub fn line(&self) -> usize {
        self.inner.line()
    }

    /// Returns the column at which parsing failed.
    pub fn column(&self) -> usize {
        self.inner.column()
    }
}

impl fmt::Display for RunSummaryParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "parsing run summary JSON failed at line {}, column {}",
            self.inner.line(),
            self.inner.column()
        )
    }
}

impl error::Error for RunSummaryParseError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.inner)
    }
}
