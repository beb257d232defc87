// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The registry of failures that are already known and tracked externally.

use crate::errors::{DisplayErrorChain, RegistryParseError};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

static ENTRY_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*;\s*").expect("separator regex is valid"));

/// A run-scoped mapping from checkpoint id to tracking reference.
///
/// Parsed from a single configuration line of the form `key1_ref1 ; key2_ref2 ; key3`. Each
/// entry is split on its first `_`; an entry without `_` maps to the empty reference. When a key
/// is repeated, the last occurrence wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnownFailureRegistry {
    entries: IndexMap<String, String>,
}

impl KnownFailureRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a known-failures configuration string.
    ///
    /// An empty string produces an empty registry. Empty entries, such as the one between the
    /// separators in `A_1 ; ; B_2`, are skipped. An entry with an empty key, such as `_JIRA-1`, is
    /// rejected.
    pub fn parse(input: &str) -> Result<Self, RegistryParseError> {
        let (registry, errors) = Self::parse_partial(input);
        match errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(registry),
        }
    }

    /// Parses a known-failures configuration string, keeping every valid entry.
    ///
    /// Entries with an empty key are left out of the registry and returned as errors, in the
    /// order they appear.
    pub fn parse_partial(input: &str) -> (Self, Vec<RegistryParseError>) {
        let mut entries = IndexMap::new();
        let mut errors = Vec::new();

        for (position, piece) in ENTRY_SEPARATOR.split(input.trim()).enumerate() {
            if piece.is_empty() {
                continue;
            }
            let (key, reference) = piece.split_once('_').unwrap_or((piece, ""));
            if key.is_empty() {
                errors.push(RegistryParseError::new(position, piece));
                continue;
            }
            entries.insert(key.to_owned(), reference.to_owned());
        }

        (Self { entries }, errors)
    }

    /// Parses a known-failures configuration string, dropping malformed entries with a warning.
    ///
    /// Absent input produces an empty registry.
    pub fn parse_lenient(input: Option<&str>) -> Self {
        let Some(input) = input else {
            return Self::empty();
        };
        let (registry, errors) = Self::parse_partial(input);
        for error in &errors {
            tracing::warn!("ignoring known failure: {}", DisplayErrorChain::new(error));
        }
        registry
    }

    /// Returns the tracking reference for the given key, if it is known.
    ///
    /// A known key may map to the empty reference.
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Returns true if `keys` is non-empty and every key is known.
    ///
    /// A test counts as "all expected" only if every one of its soft failures is known; partial
    /// matches don't count.
    pub fn all_known<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let mut any = false;
        for key in keys {
            if !self.entries.contains_key(key) {
                return false;
            }
            any = true;
        }
        any
    }

    /// Returns the number of known failures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no failures are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, reference)` pairs, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|(key, reference)| (key.as_str(), reference.as_str()))
    }
}
