pub mod aabb;
pub mod cancel;
pub mod error;
pub mod mesh;
pub mod slicer;

pub use aabb::{AABBTree, Node, RayHit, TreeStats};
pub use cancel::CancellationToken;
pub use error::{MeshError, SliceError};
pub use mesh::{IndexedMesh, RepairCounters, Stats};
pub use slicer::{GapClosingConfig, Layer, SliceResult, SliceStatistics, Slicer};
