// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by checkpoint.

use camino::Utf8PathBuf;
use checkpoint_metadata::RunSummaryParseError;
use checkpoint_model::SerializeError;
use config::ConfigError;
use std::{error::Error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse checkpoint config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurred while reading a run summary from disk.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunSummaryReadError {
    /// The run summary could not be read.
    #[error("failed to read run summary at `{path}`")]
    Read {
        /// The path that failed to be read.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// The run summary could not be parsed.
    #[error("failed to parse run summary at `{path}`")]
    Parse {
        /// The path that failed to be parsed.
        path: Utf8PathBuf,

        /// The underlying parse error.
        #[source]
        error: RunSummaryParseError,
    },
}

/// A single soft-assertion failure could not be decoded into a structured failure.
///
/// Decode errors are recovered from: the entry is dropped from the decoded sequence.
#[derive(Debug, Error)]
#[error("failed to decode soft assertion failure at position {position}")]
pub struct DecodeError {
    position: usize,
    #[source]
    error: serde_json::Error,
}

impl DecodeError {
    pub(crate) fn new(position: usize, error: serde_json::Error) -> Self {
        Self { position, error }
    }

    /// Returns the zero-based position of the entry within the composite failure.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// The known-failures configuration string was malformed.
///
/// Registry parse errors are recovered from by treating the registry as empty.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("known-failures entry {position} (`{entry}`) has an empty key")]
pub struct RegistryParseError {
    position: usize,
    entry: String,
}

impl RegistryParseError {
    pub(crate) fn new(position: usize, entry: impl Into<String>) -> Self {
        Self {
            position,
            entry: entry.into(),
        }
    }

    /// Returns the zero-based position of the malformed entry.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the malformed entry.
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

/// An evidence directory could not be read.
///
/// Evidence errors are recovered from by treating the test as having no evidence.
#[derive(Debug, Error)]
#[error("failed to read evidence directory `{dir}`")]
pub struct EvidenceIoError {
    dir: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl EvidenceIoError {
    pub(crate) fn new(dir: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            dir: dir.into(),
            error,
        }
    }

    /// Returns the directory that could not be read.
    pub fn dir(&self) -> &Utf8PathBuf {
        &self.dir
    }

    /// Returns true if the directory does not exist.
    pub fn is_not_found(&self) -> bool {
        self.error.kind() == std::io::ErrorKind::NotFound
    }
}

/// An error that occurred while persisting report entries.
///
/// Sink errors are fatal: they abort the rest of the report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// An entry was sent to the sink before the report was started.
    #[error("report sink received data before the report was started")]
    NotStarted,

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while serializing the report.
    #[error("error writing report to {file}")]
    Serialize {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: SerializeError,
    },
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, "\n  caused by: {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
