use crate::maps::MapKind;
use thiserror::Error;

/// Errors produced by the texture core.
///
/// Only three variants abort a pipeline run: `InvalidRequest`,
/// `UpstreamImage`, and a `Derivation` failure for the diffuse master.
/// Everything else degrades to a warning and an omitted map.
#[derive(Debug, Error)]
pub enum TextureError {
    /// Malformed request: bad resolution, empty map set, parameter
    /// structurally out of range.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The AI provider failed or returned undecodable data.
    #[error("upstream image error: {0}")]
    UpstreamImage(String),

    /// A kernel saw an ill-formed buffer (dimension mismatch, zero area).
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    /// A kernel saw a non-finite sample.
    #[error("numeric error: {0}")]
    Numeric(String),

    /// A single map's derivation failed. Non-fatal unless the map is the
    /// diffuse master.
    #[error("{kind} derivation failed: {source}")]
    Derivation {
        kind: MapKind,
        #[source]
        source: Box<TextureError>,
    },

    /// Cooperative cancellation observed; the partial result is preserved.
    #[error("cancelled")]
    Cancelled,
}

impl TextureError {
    /// Wrap an error as a derivation failure for `kind`.
    pub fn derivation(kind: MapKind, source: TextureError) -> Self {
        TextureError::Derivation {
            kind,
            source: Box::new(source),
        }
    }

    /// True when the error is a cancellation (possibly wrapped by a
    /// derivation task).
    pub fn is_cancelled(&self) -> bool {
        match self {
            TextureError::Cancelled => true,
            TextureError::Derivation { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TextureError>;
