use thiserror::Error;

/// Structured failure information for the core's public operations.
///
/// Predicate-level numerical edge cases and per-triangle/per-chain
/// degeneracies are resolved and counted internally; they never surface
/// here. Only conditions that abort the run are represented.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("value out of range: {reason}")]
    OutOfRange { reason: String },

    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry { reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal inconsistency: {reason}")]
    Inconsistency { reason: String },
}

/// Failures raised while constructing or mutating an [`crate::mesh::IndexedMesh`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("vertex index {index} out of range (mesh has {vertex_count} vertices)")]
    OutOfRange { index: u32, vertex_count: usize },

    #[error("mesh has zero triangles")]
    EmptyMesh,
}

impl From<MeshError> for SliceError {
    fn from(err: MeshError) -> Self {
        SliceError::InvalidInput { reason: err.to_string() }
    }
}
