//! Mesh resources
//!
//! Meshes are produced by an import collaborator and supplied to the exporter
//! as a read-only table keyed by name. A resource holds one or more segments,
//! each a vertex buffer plus a triangle index buffer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stageforge_core::math::Vec3;

/// A single mesh vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Position in world space
    pub position: Vec3,
    /// Normal vector
    #[serde(default = "Vertex::default_normal")]
    pub normal: Vec3,
}

impl Vertex {
    fn default_normal() -> Vec3 {
        Vec3::UP
    }

    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            normal: Vec3::UP,
        }
    }
}

/// One segment of a mesh: a vertex buffer and a triangle index buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSegment {
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`; length is a multiple of 3
    pub indices: Vec<u32>,
}

impl MeshSegment {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A named mesh resource made of one or more segments
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshResource {
    pub segments: Vec<MeshSegment>,
}

impl MeshResource {
    pub fn triangle_count(&self) -> usize {
        self.segments.iter().map(MeshSegment::triangle_count).sum()
    }
}

/// Read-only mapping from mesh name to mesh resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelTable {
    models: HashMap<String, MeshResource>,
}

impl ModelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, mesh: MeshResource) {
        self.models.insert(name.into(), mesh);
    }

    pub fn get(&self, name: &str) -> Option<&MeshResource> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
