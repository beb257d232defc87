// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding composite ("multiple assertions failed") failures into individual records.

use crate::{
    errors::{DecodeError, DisplayErrorChain},
    evidence::EvidenceNamer,
    fingerprint::{Fingerprinter, composite_key},
    outcome::{CompositeFailure, FailureRecord, SoftFailureEntry, StackFrame},
};
use serde::Deserialize;

/// Turns one serialized soft-assertion failure into a structured record.
pub trait FailureDecoder {
    /// Decodes `text`, the entry at `position` within its composite failure.
    fn decode(&self, position: usize, text: &str) -> Result<FailureRecord, DecodeError>;
}

/// Decodes failures serialized as JSON by Java assertion libraries: an object with `message` and
/// `stackTrace: [{className, methodName, lineNumber}]` fields. Other fields are ignored.
#[derive(Copy, Clone, Debug, Default)]
pub struct LegacyJsonDecoder;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedThrowable {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    stack_trace: Vec<SerializedFrame>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedFrame {
    class_name: String,
    method_name: String,
    #[serde(default = "unknown_line")]
    line_number: i32,
}

fn unknown_line() -> i32 {
    -1
}

impl FailureDecoder for LegacyJsonDecoder {
    fn decode(&self, position: usize, text: &str) -> Result<FailureRecord, DecodeError> {
        let throwable: SerializedThrowable =
            serde_json::from_str(text).map_err(|error| DecodeError::new(position, error))?;
        let frames = throwable
            .stack_trace
            .into_iter()
            .map(|frame| StackFrame::new(frame.class_name, frame.method_name, frame.line_number))
            .collect();
        Ok(FailureRecord::new(throwable.message, frames))
    }
}

/// A decoded soft-assertion failure, with the identities derived from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoftFailure {
    /// The position within the decoded sequence. Also the index used to match evidence.
    pub index: usize,

    /// The decoded failure.
    pub record: FailureRecord,

    /// The bare stack fingerprint.
    pub fingerprint: String,

    /// The composite key: the fingerprint plus the bracketed marker from the message. This is
    /// the checkpoint id used for registry lookups and evidence matching.
    pub checkpoint_id: String,

    /// The name of the evidence file expected for this failure, if it could be derived.
    pub expected_evidence: Option<String>,
}

/// The result of decoding a composite failure.
#[derive(Debug, Default)]
pub struct DecodedFailures {
    /// Successfully decoded failures, in recorded order.
    pub failures: Vec<SoftFailure>,

    /// Entries that could not be decoded and were dropped.
    pub errors: Vec<DecodeError>,
}

impl DecodedFailures {
    /// Returns the checkpoint ids of the decoded failures, in order.
    pub fn checkpoint_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.failures
            .iter()
            .map(|failure| failure.checkpoint_id.as_str())
    }

    /// Returns the expected evidence names of the decoded failures, in order.
    pub fn expected_evidence(&self) -> Vec<Option<&str>> {
        self.failures
            .iter()
            .map(|failure| failure.expected_evidence.as_deref())
            .collect()
    }
}

/// Unpacks composite failures into an ordered sequence of [`SoftFailure`]s.
#[derive(Debug)]
pub struct SoftFailureDecoder<'a, D = LegacyJsonDecoder> {
    fingerprinter: &'a Fingerprinter,
    namer: &'a EvidenceNamer,
    decoder: D,
}

impl<'a> SoftFailureDecoder<'a> {
    /// Creates a new decoder using the legacy JSON format for serialized entries.
    pub fn new(fingerprinter: &'a Fingerprinter, namer: &'a EvidenceNamer) -> Self {
        Self::with_decoder(fingerprinter, namer, LegacyJsonDecoder)
    }
}

impl<'a, D: FailureDecoder> SoftFailureDecoder<'a, D> {
    /// Creates a new decoder with a custom decoder for serialized entries.
    pub fn with_decoder(fingerprinter: &'a Fingerprinter, namer: &'a EvidenceNamer, decoder: D) -> Self {
        Self {
            fingerprinter,
            namer,
            decoder,
        }
    }

    /// Decodes every entry of `composite`.
    ///
    /// Entries that fail to decode are logged and skipped; they never fail the whole decode.
    pub fn decode(&self, composite: &CompositeFailure) -> DecodedFailures {
        let mut decoded = DecodedFailures::default();

        for (position, entry) in composite.entries.iter().enumerate() {
            let record = match entry {
                SoftFailureEntry::Structured(record) => record.clone(),
                SoftFailureEntry::Serialized(text) => match self.decoder.decode(position, text) {
                    Ok(record) => record,
                    Err(error) => {
                        tracing::warn!("{}", DisplayErrorChain::new(&error));
                        decoded.errors.push(error);
                        continue;
                    }
                },
            };

            let fingerprint = self.fingerprinter.fingerprint(&record.frames);
            let checkpoint_id = composite_key(&fingerprint, record.message_or_empty());
            let expected_evidence = self.namer.expected_name(&record.frames);
            decoded.failures.push(SoftFailure {
                index: decoded.failures.len(),
                record,
                fingerprint,
                checkpoint_id,
                expected_evidence,
            });
        }

        decoded
    }
}
