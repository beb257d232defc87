// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for checkpoint.
//!
//! Configuration is layered: the embedded default config, then the user's config file. Command-line
//! overrides are applied on top through the setters on [`CheckpointConfig`].

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    evidence::{EvidenceMatcher, EvidenceNamer},
    fingerprint::Fingerprinter,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use swrite::{SWrite, swrite};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Overall configuration for checkpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct CheckpointConfig {
    report: ReportConfig,
    fingerprint: FingerprintConfig,
    evidence: EvidenceConfig,
    tracker: TrackerConfig,
    known_failures: KnownFailuresConfig,
}

impl CheckpointConfig {
    /// The default location of the config, relative to the working directory.
    pub const CONFIG_PATH: &'static str = ".config/checkpoint.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from `config_file`, or from [`Self::CONFIG_PATH`] under `root` if it
    /// isn't specified.
    ///
    /// An explicitly specified file must exist. The default location is optional.
    pub fn from_sources(
        root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (config, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        for key in &unknown {
            tracing::warn!("in config file {config_file}, ignoring unknown configuration key `{key}`");
        }

        Ok(config)
    }

    /// Returns the default config.
    pub fn default_config() -> Self {
        let (config, unknown) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");

        // The default config is embedded in the binary, so it must not have unknown keys.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        config
    }

    /// Returns the report name prefix.
    pub fn name_prefix(&self) -> &str {
        &self.report.name_prefix
    }

    /// Returns the path the report is written to.
    pub fn output(&self) -> &Utf8Path {
        &self.report.output
    }

    /// Returns the report format.
    pub fn format(&self) -> ReportFormat {
        self.report.format
    }

    /// Returns the namespace prefix used for fingerprints.
    pub fn fingerprint_namespace(&self) -> &str {
        &self.fingerprint.namespace
    }

    /// Returns the directory holding per-test evidence folders.
    pub fn evidence_dir(&self) -> &Utf8Path {
        &self.evidence.dir
    }

    /// Returns the prefix used for evidence paths in the report.
    pub fn evidence_link_prefix(&self) -> &str {
        &self.evidence.link_prefix
    }

    /// Returns the tracker URL template.
    pub fn tracker_url_template(&self) -> &str {
        &self.tracker.url_template
    }

    /// Returns the fallback known-failures string, if set.
    pub fn known_failures(&self) -> Option<&str> {
        let entries = self.known_failures.entries.trim();
        (!entries.is_empty()).then_some(entries)
    }

    /// Returns a fingerprinter for the configured namespace.
    pub fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new(&self.fingerprint.namespace)
    }

    /// Returns an evidence namer for the configured namespace and suffix.
    pub fn evidence_namer(&self) -> EvidenceNamer {
        EvidenceNamer::new(&self.evidence.namespace, &self.evidence.suffix)
    }

    /// Returns an evidence matcher for the configured markers.
    pub fn evidence_matcher(&self) -> EvidenceMatcher {
        EvidenceMatcher::new(
            &self.evidence.visual_diff_marker,
            &self.evidence.paginated_marker,
        )
    }

    /// Returns the URL for the given tracking reference.
    ///
    /// The reference is percent-encoded before it replaces `{id}` in the template.
    pub fn tracker_url(&self, reference: &str) -> String {
        self.tracker_url_template()
            .replace("{id}", &percent_encode(reference))
    }

    /// Overrides the output path.
    pub fn set_output(&mut self, output: impl Into<Utf8PathBuf>) -> &mut Self {
        self.report.output = output.into();
        self
    }

    /// Overrides the report format.
    pub fn set_format(&mut self, format: ReportFormat) -> &mut Self {
        self.report.format = format;
        self
    }

    /// Overrides the evidence directory.
    pub fn set_evidence_dir(&mut self, dir: impl Into<Utf8PathBuf>) -> &mut Self {
        self.evidence.dir = dir.into();
        self
    }

    /// Overrides the fallback known-failures string.
    pub fn set_known_failures(&mut self, entries: impl Into<String>) -> &mut Self {
        self.known_failures.entries = entries.into();
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: Self = serde_path_to_error::deserialize(ignored_de).map_err(|error| {
            // The config crate reports the key as well. Drop it so the path is only shown once.
            let path = error.path().clone();
            let error = match error.into_inner() {
                ConfigError::At { error, .. } => *error,
                other => other,
            };
            ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                path, error,
            )))
        })?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct ReportConfig {
    name_prefix: String,
    output: Utf8PathBuf,
    format: ReportFormat,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct FingerprintConfig {
    namespace: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct EvidenceConfig {
    dir: Utf8PathBuf,
    link_prefix: String,
    namespace: String,
    suffix: String,
    visual_diff_marker: String,
    paginated_marker: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct TrackerConfig {
    url_template: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
struct KnownFailuresConfig {
    #[serde(default)]
    entries: String,
}

/// Percent-encodes everything except RFC 3986 unreserved characters.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            swrite!(out, "%{byte:02X}");
        }
    }
    out
}

/// The format a report is written in.
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    /// XML.
    #[default]
    Xml,

    /// Pretty-printed JSON.
    Json,
}

impl ReportFormat {
    /// Returns the name of this format, as used in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            ReportFormat::Xml => "xml",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xml" => Ok(ReportFormat::Xml),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format `{other}` (expected xml or json)")),
        }
    }
}
