//! Scene graph nodes
//!
//! Node polymorphism is a closed set of kinds relevant to export, modeled as
//! a tagged enum so every traversal can match exhaustively instead of
//! downcasting. A node owns its children; the graph is acyclic and walked
//! depth-first.

use serde::{Deserialize, Serialize};
use stageforge_core::math::Vec3;

use crate::animation::TransformAnimation;
use crate::grid::CollisionGrid;

/// Local transform carried by every node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in world units
    #[serde(default)]
    pub position: Vec3,
    /// Euler rotation in radians, applied X then Y then Z
    #[serde(default)]
    pub rotation: Vec3,
    /// Per-axis scale
    #[serde(default = "Transform::default_scale")]
    pub scale: Vec3,
}

impl Transform {
    fn default_scale() -> Vec3 {
        Vec3::ONE
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Goal colour, determining which score the goal awards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalKind {
    Blue,
    Green,
    Red,
}

impl GoalKind {
    /// 1-based ordinal code shared by both format generations
    pub fn code(&self) -> u16 {
        match self {
            GoalKind::Blue => 1,
            GoalKind::Green => 2,
            GoalKind::Red => 3,
        }
    }
}

/// Single banana or a bunch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BananaKind {
    Single,
    Bunch,
}

impl BananaKind {
    pub fn code(&self) -> u32 {
        match self {
            BananaKind::Single => 0,
            BananaKind::Bunch => 1,
        }
    }
}

/// Payload of a collision group node
///
/// A collision group owns its own spatial grid plus whatever collision,
/// gameplay, and renderable children sit beneath it. The group node's own
/// transform doubles as the center of rotation for animated groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    /// 2D uniform grid descriptor used for broad-phase collision
    pub collision_grid: CollisionGrid,
    /// Optional transform animation track for the whole group
    #[serde(default)]
    pub animation: Option<TransformAnimation>,
}

/// Payload of a renderable model reference node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshData {
    /// Name of the mesh in the model table
    pub mesh_name: String,
    /// Whether the runtime renders this model with a realtime reflection
    #[serde(default)]
    pub runtime_reflective: bool,
}

/// The closed set of node kinds the exporter understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Pure grouping node with no payload (the scene root, organizational
    /// folders)
    Empty,
    /// Collision group: spatial grid plus collision/gameplay/render children
    Group(GroupData),
    /// Renderable model reference
    Mesh(MeshData),
    /// Collision geometry reference
    MeshCollision { mesh_name: String },
    /// Goal the player finishes a stage through
    Goal { kind: GoalKind },
    /// Bumper the player bounces off
    Bumper,
    /// Jamabar obstacle
    Jamabar,
    /// Collectible banana
    Banana { kind: BananaKind },
    /// Player start placement
    Start,
    /// Grouping node for background models
    BackgroundGroup,
    /// Teleporter, paired with a destination wormhole by name
    Wormhole { destination: String },
}

impl NodeKind {
    /// Human-readable kind label, used in summaries and diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Empty => "node",
            NodeKind::Group(_) => "collision group",
            NodeKind::Mesh(_) => "model",
            NodeKind::MeshCollision { .. } => "collision mesh",
            NodeKind::Goal { .. } => "goal",
            NodeKind::Bumper => "bumper",
            NodeKind::Jamabar => "jamabar",
            NodeKind::Banana { .. } => "banana",
            NodeKind::Start => "start",
            NodeKind::BackgroundGroup => "background group",
            NodeKind::Wormhole { .. } => "wormhole",
        }
    }
}

/// A node of the stage scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Node name, unique within its parent by convention (not enforced)
    pub name: String,
    /// Local transform
    #[serde(default)]
    pub transform: Transform,
    /// Type-specific payload
    pub kind: NodeKind,
    /// Owned children, traversed depth-first in declaration order
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            children: Vec::new(),
        }
    }

    /// Builder-style transform assignment
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style child attachment
    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first walk over this node and every descendant
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a SceneNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Total number of nodes in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |_| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CollisionGrid;

    fn sample_tree() -> SceneNode {
        SceneNode::new(
            "group",
            NodeKind::Group(GroupData {
                collision_grid: CollisionGrid::default(),
                animation: None,
            }),
        )
        .with_child(SceneNode::new(
            "floor",
            NodeKind::MeshCollision {
                mesh_name: "floor".into(),
            },
        ))
        .with_child(
            SceneNode::new("goal", NodeKind::Goal { kind: GoalKind::Blue }).with_child(
                SceneNode::new(
                    "banana",
                    NodeKind::Banana {
                        kind: BananaKind::Bunch,
                    },
                ),
            ),
        )
    }

    #[test]
    fn test_visit_is_depth_first() {
        let tree = sample_tree();
        let mut names = Vec::new();
        tree.visit(&mut |n| names.push(n.name.as_str()));
        assert_eq!(names, ["group", "floor", "goal", "banana"]);
    }

    #[test]
    fn test_subtree_len() {
        assert_eq!(sample_tree().subtree_len(), 4);
    }

    #[test]
    fn test_goal_codes() {
        assert_eq!(GoalKind::Blue.code(), 1);
        assert_eq!(GoalKind::Green.code(), 2);
        assert_eq!(GoalKind::Red.code(), 3);
    }

    #[test]
    fn test_kind_roundtrips_through_json() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).expect("serialize");
        let back: SceneNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(tree, back);
    }

    #[test]
    fn test_default_scale_is_one() {
        let t: Transform = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(t.scale, Vec3::ONE);
    }
}
