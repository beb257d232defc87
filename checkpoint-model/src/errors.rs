// Copyright (c) The checkpoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{io, string::FromUtf8Error};
use thiserror::Error;

/// An error that occurs while serializing a [`Report`](crate::Report).
///
/// Returned by [`Report::serialize`](crate::Report::serialize),
/// [`Report::serialize_json`](crate::Report::serialize_json) and
/// [`Report::to_string`](crate::Report::to_string).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializeError {
    /// An error occurred while writing XML.
    #[error("error serializing report as XML")]
    Xml(#[from] quick_xml::Error),

    /// An error occurred while writing JSON.
    #[error("error serializing report as JSON")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while writing to the destination.
    #[error("error writing report")]
    Io(#[from] io::Error),

    /// The serialized output was not valid UTF-8.
    #[error("serialized report is not valid UTF-8")]
    Utf8(#[from] FromUtf8Error),
}
