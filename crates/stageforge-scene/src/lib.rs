//! stageforge-scene
//!
//! The in-memory stage data model consumed by the exporter: a rooted tree of
//! typed scene nodes, the per-group collision grid descriptor, the mesh
//! resource table, and transform animation tracks.
//!
//! The whole model is read-only input for an export. Nothing in the exporter
//! creates, mutates, or destroys nodes; the types here exist to be built by a
//! frontend (or a test), handed to the exporter by reference, and dropped.

pub mod animation;
pub mod grid;
pub mod mesh;
pub mod node;
pub mod stage;

pub use animation::{Easing, Keyframe, LoopType, TransformAnimation};
pub use grid::CollisionGrid;
pub use mesh::{MeshResource, MeshSegment, ModelTable, Vertex};
pub use node::{BananaKind, GoalKind, GroupData, MeshData, NodeKind, SceneNode, Transform};
pub use stage::{Stage, StageDescription};
