use std::{io, path::PathBuf};
use thiserror::Error;

/// Failures while turning cached vendor files into the price table.
///
/// Any of these aborts the whole rebuild; a half-built table is never
/// written out.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file was never fetched (or every fetch failed) and no cached copy
    /// exists.
    #[error("source {id} unavailable: no cached copy at {}", path.display())]
    SourceUnavailable { id: String, path: PathBuf },

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("bad price {value:?} in {id}")]
    BadNumber { id: String, value: String },

    /// Only raised when `remap.strict` is on.
    #[error("unmapped {kind} {key:?} in {id}")]
    Unmapped {
        id: String,
        kind: &'static str,
        key: String,
    },
}

impl ParseError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
