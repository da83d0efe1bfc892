#![forbid(unsafe_code)]

use thiserror::Error;

/// HLS ingestion errors.
///
/// Only structural problems surface here. Tag-level oddities (unknown tags,
/// malformed attribute values, unsupported key methods) degrade to omissions
/// inside the parser instead.
#[derive(Debug, Error)]
pub enum HlsError {
    #[error("Network error: {0}")]
    Net(#[from] kithara_net::NetError),

    #[error("Missing or malformed #EXTM3U header")]
    MissingHeader,

    #[error("Playlist parsing error: {0}")]
    PlaylistParse(String),

    #[error("Representation not found: {0}")]
    RepresentationNotFound(String),

    #[error("Key processing failed: {0}")]
    KeyProcessing(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<url::ParseError> for HlsError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidUrl(error.to_string())
    }
}

pub type HlsResult<T> = Result<T, HlsError>;
