//! Stage root
//!
//! A stage is a scene graph plus the fallout plane height. The exporter's
//! structural conventions live here: collision groups and the background
//! group sit directly beneath the root, and the start node is a root child.

use serde::{Deserialize, Serialize};

use crate::mesh::ModelTable;
use crate::node::{GroupData, NodeKind, SceneNode};

/// A complete stage: scene graph root plus the fallout plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub root: SceneNode,
    /// Y height below which the player falls out of the stage
    pub fallout_y: f32,
}

impl Stage {
    pub fn new(root: SceneNode, fallout_y: f32) -> Self {
        Self { root, fallout_y }
    }

    /// Collision groups among the root's children, in graph order
    pub fn collision_groups(&self) -> Vec<(&SceneNode, &GroupData)> {
        self.root
            .children
            .iter()
            .filter_map(|child| match &child.kind {
                NodeKind::Group(data) => Some((child, data)),
                _ => None,
            })
            .collect()
    }

    /// Background group nodes among the root's children, in graph order
    pub fn background_groups(&self) -> Vec<&SceneNode> {
        self.root
            .children
            .iter()
            .filter(|child| matches!(child.kind, NodeKind::BackgroundGroup))
            .collect()
    }

    /// The first start node among the root's children, if any
    pub fn start_node(&self) -> Option<&SceneNode> {
        self.root
            .children
            .iter()
            .find(|child| matches!(child.kind, NodeKind::Start))
    }
}

/// A stage plus the mesh resources it references, as loaded by a frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescription {
    pub stage: Stage,
    #[serde(default)]
    pub models: ModelTable,
}

impl StageDescription {
    /// Normalize a freshly deserialized description: animation channels are
    /// sorted by time so downstream passes can rely on the ordering.
    pub fn normalize(&mut self) {
        fn walk(node: &mut SceneNode) {
            if let NodeKind::Group(data) = &mut node.kind {
                if let Some(anim) = &mut data.animation {
                    anim.sort_channels();
                }
            }
            for child in &mut node.children {
                walk(child);
            }
        }
        walk(&mut self.stage.root);
    }
}
