use crate::model::{ModelError, Path, Point};
use crate::registry::Key;
use crate::surface::SurfacePosition;

/// Transient inconsistency between the model, the registry and the surface.
///
/// None of these are fatal: event handlers abandon the current event, log it
/// and wait for the next render to bring everything back in line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Unable to resolve the path of node {key:?}, reached {partial:?} before a missing link")]
    PathResolution { key: Key, partial: Path },
    #[error("No mounted surface element for model point {0:?}")]
    UnresolvedPoint(Point),
    #[error("Surface position {0:?} does not belong to a rendered leaf")]
    UnresolvedSurfacePosition(SurfacePosition),
    #[error("Node {0:?} has no mounted surface element")]
    ElementNotMounted(Key),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Decoding failures for transferred fragments
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Fragment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Fragment is not a valid node list: {0}")]
    Json(#[from] serde_json::Error),
}
