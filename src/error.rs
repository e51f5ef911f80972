use std::path::PathBuf;

use crate::pipeline::Stage;

// ---------------------------------------------------------------------------
// Error kinds raised while loading a dataset
// ---------------------------------------------------------------------------

/// Transport or decoding failure for a single resource.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("requesting {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{resource} is not valid JSON: {source}")]
    Decode {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A payload decoded fine but does not have the shape we need.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{resource}: required field '{field}' is missing")]
    MissingField { resource: String, field: String },

    #[error("{resource}: field '{field}' should be {expected}")]
    WrongType {
        resource: String,
        field: String,
        expected: &'static str,
    },

    #[error("event {kind}[{index}]: {reason}")]
    MalformedEvent {
        kind: String,
        index: usize,
        reason: String,
    },

    #[error("{resource}: {source}")]
    Invalid {
        resource: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Bad user input, rejected before any fetch is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("minimum steps must be an integer, got '{input}'")]
    NotAnInteger { input: String },

    #[error("unknown dataset '{id}'")]
    UnknownDataset { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadErrorKind {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A failed load: what went wrong and the stage it went wrong in.
#[derive(Debug, thiserror::Error)]
#[error("failed while {}: {kind}", .stage.activity())]
pub struct LoadError {
    pub stage: Stage,
    #[source]
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub fn new(stage: Stage, kind: impl Into<LoadErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }
}
