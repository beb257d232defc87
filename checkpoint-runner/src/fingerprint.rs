// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable identities ("checkpoint ids") for failures.
//!
//! A fingerprint records where in the framework's own code a failure surfaced: the method name
//! and line number of every frame declared within the framework namespace, in trace order. The
//! same logical assertion failing again (on another run, or another browser) produces the same
//! fingerprint even if line numbers in test-writer code change.

use crate::outcome::StackFrame;
use swrite::{SWrite, swrite};

/// Computes fingerprints from stack traces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprinter {
    namespace: String,
}

impl Fingerprinter {
    /// Creates a new fingerprinter matching frames whose declaring type starts with `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Returns the fingerprint for the given stack trace.
    ///
    /// If no frame matches, the fingerprint is the empty string. Unrelated failures may collide
    /// on it.
    pub fn fingerprint(&self, frames: &[StackFrame]) -> String {
        let mut out = String::new();
        for frame in frames
            .iter()
            .filter(|frame| frame.declaring_type.starts_with(&self.namespace))
        {
            swrite!(out, "{}:{}", frame.method_name, frame.line_number);
        }
        out
    }
}

/// Returns the composite key for a soft-assertion failure: the fingerprint, followed by `#` and
/// the marker extracted from the message with [`bracket_extract`].
pub fn composite_key(fingerprint: &str, message: &str) -> String {
    format!(
        "{}#{}",
        fingerprint,
        bracket_extract(message).unwrap_or_default()
    )
}

/// Removes all whitespace from `message` and returns the text between its last pair of square
/// brackets.
///
/// The last pair is the last `]` together with the closest `[` preceding it. Returns `None` if
/// there is no such pair. Nested brackets are not treated specially.
pub fn bracket_extract(message: &str) -> Option<String> {
    let compact: String = message.chars().filter(|c| !c.is_whitespace()).collect();
    let close = compact.rfind(']')?;
    let open = compact[..close].rfind('[')?;
    Some(compact[open + 1..close].to_owned())
}
