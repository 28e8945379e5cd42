//! Offset resolution
//!
//! The output format is a web of absolute byte offsets: the file header
//! points at section list heads, collision headers point at triangle data and
//! grid tables, model records point at name strings. Nothing can be written
//! until every one of those addresses is known, so resolution is its own
//! pass: a single forward walk that reserves space for every section in a
//! fixed order and records where each entity will land.
//!
//! Writers later look addresses up by entity; both directions are kept so no
//! pass ever has to reverse-search a forward map. The iteration order here
//! (groups in graph order, children in graph order) is the contract the
//! writers rely on; it is the only thing tying a written record to its
//! resolved address.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use stageforge_core::error::{Error, Result};
use stageforge_scene::{BananaKind, GoalKind, GroupData, MeshData, NodeKind, SceneNode, Stage};

use crate::grid::GroupCollision;

/// Stable identifier of a collision group: its index in graph order
pub type GroupId = usize;

/// Ordered offset-to-entity mapping with the reverse direction kept in sync
#[derive(Debug, Clone)]
pub struct OffsetMap<K: std::hash::Hash + Eq + Clone> {
    by_offset: BTreeMap<u32, K>,
    by_entity: HashMap<K, u32>,
}

impl<K: std::hash::Hash + Eq + Clone + std::fmt::Debug> OffsetMap<K> {
    pub fn new() -> Self {
        Self {
            by_offset: BTreeMap::new(),
            by_entity: HashMap::new(),
        }
    }

    /// Record that `entity`'s region begins at `offset`. Offsets are
    /// assigned monotonically by the resolver; a zero-length region shares
    /// its offset with whatever comes next, in which case the first entity
    /// encountered keeps the offset-to-entity slot.
    pub fn insert(&mut self, offset: u32, entity: K) {
        self.by_offset.entry(offset).or_insert_with(|| entity.clone());
        self.by_entity.insert(entity, offset);
    }

    /// Resolved address of `entity`. A miss means the resolver and a writer
    /// disagreed on iteration order, which is a bug, not a data problem.
    pub fn offset_of(&self, entity: &K) -> Result<u32> {
        self.by_entity.get(entity).copied().ok_or_else(|| {
            Error::internal(format!("dangling reference: {entity:?} has no resolved offset"))
        })
    }

    /// The lowest assigned offset: the section's list head
    pub fn first_offset(&self) -> Option<u32> {
        self.by_offset.keys().next().copied()
    }

    /// Entries in ascending offset order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &K)> {
        self.by_offset.iter().map(|(o, k)| (*o, k))
    }

    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

impl<K: std::hash::Hash + Eq + Clone + std::fmt::Debug> Default for OffsetMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Name table: every entry is written (duplicates included), lookups resolve
/// to the first occurrence of a name
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<(u32, String)>,
    lookup: HashMap<String, u32>,
}

impl NameTable {
    pub fn insert(&mut self, offset: u32, name: &str) {
        self.entries.push((offset, name.to_owned()));
        self.lookup.entry(name.to_owned()).or_insert(offset);
    }

    pub fn offset_of(&self, name: &str) -> Result<u32> {
        self.lookup.get(name).copied().ok_or_else(|| {
            Error::internal(format!("dangling reference: name {name:?} was never reserved"))
        })
    }

    /// Entries in write order
    pub fn entries(&self) -> &[(u32, String)] {
        &self.entries
    }
}

/// Per-group object counts, recorded once during resolution and reused by
/// every writer that needs them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupCounts {
    pub goals: u32,
    pub bumpers: u32,
    pub jamabars: u32,
    pub bananas: u32,
    pub level_models: u32,
    pub reflective_models: u32,
}

impl GroupCounts {
    /// Count a group's direct children by kind. Deterministic: running this
    /// twice over an unchanged graph yields identical values.
    pub fn compute(group: &SceneNode) -> Self {
        let mut counts = Self::default();
        for child in &group.children {
            match &child.kind {
                NodeKind::Goal { .. } => counts.goals += 1,
                NodeKind::Bumper => counts.bumpers += 1,
                NodeKind::Jamabar => counts.jamabars += 1,
                NodeKind::Banana { .. } => counts.bananas += 1,
                NodeKind::Mesh(data) => {
                    counts.level_models += 1;
                    if data.runtime_reflective {
                        counts.reflective_models += 1;
                    }
                }
                _ => {}
            }
        }
        counts
    }
}

/// Fixed record sizes for one format generation, in bytes
#[derive(Debug, Clone, Copy)]
pub struct SectionLengths {
    pub file_header: u32,
    pub start: u32,
    pub fallout: u32,
    pub collision_header: u32,
    pub collision_triangle: u32,
    pub cell_pointer: u32,
    pub triangle_index: u32,
    pub goal: u32,
    pub bumper: u32,
    pub jamabar: u32,
    pub banana: u32,
    pub level_model: u32,
    pub background_model: u32,
    /// Generation 2 only: indirection records in front of the model list
    pub model_pointer_a: u32,
    pub model_pointer_b: u32,
    /// Generation 1 only: animation and reflective-model records
    pub animation_header: u32,
    pub keyframe: u32,
    pub reflective_model: u32,
}

/// Which optional sections a format generation carries
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutOptions {
    /// Emit the two model pointer indirection lists (generation 2)
    pub model_pointer_lists: bool,
    /// Emit animation headers and keyframe channels (generation 1)
    pub animation: bool,
    /// Emit per-group reflective model lists (generation 1)
    pub reflective_models: bool,
}

/// Resolved keyframe channel addresses for one animated group
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelOffsets {
    /// Position X/Y/Z channels
    pub pos: [u32; 3],
    /// Rotation X/Y/Z channels
    pub rot: [u32; 3],
}

/// Every resolved address the writers need, produced by one forward pass
#[derive(Debug, Clone)]
pub struct Layout {
    pub start_offset: u32,
    pub fallout_offset: u32,
    pub collision_headers: OffsetMap<GroupId>,
    /// Start of each group's collision triangle records
    pub triangle_lists: OffsetMap<GroupId>,
    /// Start of each group's grid cell pointer table
    pub cell_pointer_tables: OffsetMap<GroupId>,
    /// Per group, per cell (X-major): address of the cell's index list, or 0
    /// for a cell with no triangles
    pub cell_list_offsets: Vec<Vec<u32>>,
    pub goals: OffsetMap<GroupId>,
    pub bumpers: OffsetMap<GroupId>,
    pub jamabars: OffsetMap<GroupId>,
    pub bananas: OffsetMap<GroupId>,
    pub model_pointers_a: OffsetMap<GroupId>,
    pub model_pointers_b: OffsetMap<GroupId>,
    pub level_models: OffsetMap<GroupId>,
    pub model_names: NameTable,
    /// Background model records, keyed by index into `background_meshes`
    pub backgrounds: OffsetMap<usize>,
    pub background_names: NameTable,
    pub animation_headers: OffsetMap<GroupId>,
    pub keyframe_channels: HashMap<GroupId, ChannelOffsets>,
    pub reflective_models: OffsetMap<GroupId>,
    /// Per-group object counts in group order
    pub counts: Vec<GroupCounts>,
    /// Total encoded size of the stage
    pub total_size: u32,
}

/// Round up to the next 4-byte boundary
pub fn round_up4(n: u32) -> u32 {
    if n % 4 == 0 { n } else { (n + 3) / 4 * 4 }
}

/// Bytes reserved for a name: raw bytes, NUL terminator, padding to 4
pub fn name_len(name: &str) -> u32 {
    round_up4(name.len() as u32 + 1)
}

/// Direct children of `node` that are renderable model references
pub fn mesh_children<'a>(
    node: &'a SceneNode,
) -> impl Iterator<Item = (&'a SceneNode, &'a MeshData)> {
    node.children.iter().filter_map(|child| match &child.kind {
        NodeKind::Mesh(data) => Some((child, data)),
        _ => None,
    })
}

/// Direct children of `node` that are goals
pub fn goal_children<'a>(
    node: &'a SceneNode,
) -> impl Iterator<Item = (&'a SceneNode, GoalKind)> {
    node.children.iter().filter_map(|child| match &child.kind {
        NodeKind::Goal { kind } => Some((child, *kind)),
        _ => None,
    })
}

/// Direct children of `node` that are bumpers
pub fn bumper_children<'a>(node: &'a SceneNode) -> impl Iterator<Item = &'a SceneNode> {
    node.children
        .iter()
        .filter(|child| matches!(child.kind, NodeKind::Bumper))
}

/// Direct children of `node` that are jamabars
pub fn jamabar_children<'a>(node: &'a SceneNode) -> impl Iterator<Item = &'a SceneNode> {
    node.children
        .iter()
        .filter(|child| matches!(child.kind, NodeKind::Jamabar))
}

/// Direct children of `node` that are bananas
pub fn banana_children<'a>(
    node: &'a SceneNode,
) -> impl Iterator<Item = (&'a SceneNode, BananaKind)> {
    node.children.iter().filter_map(|child| match &child.kind {
        NodeKind::Banana { kind } => Some((child, *kind)),
        _ => None,
    })
}

/// Background model nodes: mesh children of every background group, in graph
/// order. Anything else inside a background group is ignored with a warning.
pub fn background_meshes(stage: &Stage) -> Vec<(&SceneNode, &MeshData)> {
    let mut meshes = Vec::new();
    for group in stage.background_groups() {
        for child in &group.children {
            match &child.kind {
                NodeKind::Mesh(data) => meshes.push((child, data)),
                _ => {
                    warn!(
                        node = %child.name,
                        kind = child.kind.label(),
                        "non-model node inside a background group; ignoring"
                    );
                }
            }
        }
    }
    meshes
}

impl Layout {
    /// Resolve every section address in one forward pass.
    ///
    /// `groups` and `collisions` run parallel, both in graph order;
    /// `backgrounds` is the `background_meshes` gathering for the same
    /// stage. The section order is fixed per generation; `options` gates the
    /// sections only one generation carries.
    pub fn resolve(
        groups: &[(&SceneNode, &GroupData)],
        collisions: &[GroupCollision],
        backgrounds: &[(&SceneNode, &MeshData)],
        lengths: &SectionLengths,
        options: LayoutOptions,
    ) -> Layout {
        let mut cursor = lengths.file_header;

        let start_offset = cursor;
        cursor += lengths.start;

        let fallout_offset = cursor;
        cursor += lengths.fallout;

        // Collision headers
        let mut collision_headers = OffsetMap::new();
        for gi in 0..groups.len() {
            collision_headers.insert(cursor, gi);
            cursor += lengths.collision_header;
        }

        // Collision triangle records
        let mut triangle_lists = OffsetMap::new();
        for (gi, collision) in collisions.iter().enumerate() {
            triangle_lists.insert(cursor, gi);
            cursor += lengths.collision_triangle * collision.triangles.len() as u32;
        }

        // Grid cell pointer tables
        let mut cell_pointer_tables = OffsetMap::new();
        for (gi, (_, data)) in groups.iter().enumerate() {
            cell_pointer_tables.insert(cursor, gi);
            cursor += lengths.cell_pointer * data.collision_grid.cell_count() as u32;
        }

        // Triangle index lists: a pointer per non-empty cell, 0 for empty
        // cells, each list terminated by the 0xFFFF sentinel, each group's
        // run padded to 4 bytes
        let mut cell_list_offsets = Vec::with_capacity(groups.len());
        for collision in collisions {
            let mut offsets = Vec::with_capacity(collision.grid.cell_count());
            for cell in collision.grid.cells() {
                if cell.is_empty() {
                    offsets.push(0);
                } else {
                    offsets.push(cursor);
                    cursor += lengths.triangle_index * (cell.len() as u32 + 1);
                }
            }
            cursor = round_up4(cursor);
            cell_list_offsets.push(offsets);
        }

        // Gameplay object lists. Every group reserves a (possibly
        // zero-length) region for each kind, so the first group's region is
        // always a valid list head even when the whole stage has none of
        // that kind: an absent list would corrupt the runtime's next read.
        let counts: Vec<GroupCounts> = groups
            .iter()
            .map(|(node, _)| GroupCounts::compute(node))
            .collect();

        let mut goals = OffsetMap::new();
        for (gi, count) in counts.iter().enumerate() {
            goals.insert(cursor, gi);
            cursor += lengths.goal * count.goals;
        }

        let mut bumpers = OffsetMap::new();
        for (gi, count) in counts.iter().enumerate() {
            bumpers.insert(cursor, gi);
            cursor += lengths.bumper * count.bumpers;
        }

        let mut jamabars = OffsetMap::new();
        for (gi, count) in counts.iter().enumerate() {
            jamabars.insert(cursor, gi);
            cursor += lengths.jamabar * count.jamabars;
        }

        let mut bananas = OffsetMap::new();
        for (gi, count) in counts.iter().enumerate() {
            bananas.insert(cursor, gi);
            cursor += lengths.banana * count.bananas;
        }

        // Model pointer indirection lists (generation 2)
        let mut model_pointers_a = OffsetMap::new();
        let mut model_pointers_b = OffsetMap::new();
        if options.model_pointer_lists {
            for (gi, count) in counts.iter().enumerate() {
                model_pointers_a.insert(cursor, gi);
                cursor += lengths.model_pointer_a * count.level_models;
            }
            for (gi, count) in counts.iter().enumerate() {
                model_pointers_b.insert(cursor, gi);
                cursor += lengths.model_pointer_b * count.level_models;
            }
        }

        // Level model records
        let mut level_models = OffsetMap::new();
        for (gi, count) in counts.iter().enumerate() {
            level_models.insert(cursor, gi);
            cursor += lengths.level_model * count.level_models;
        }

        // Level model names
        let mut model_names = NameTable::default();
        for (node, _) in groups {
            for (_, data) in mesh_children(node) {
                model_names.insert(cursor, &data.mesh_name);
                cursor += name_len(&data.mesh_name);
            }
        }

        // Background model records and names
        let mut background_records = OffsetMap::new();
        for bi in 0..backgrounds.len() {
            background_records.insert(cursor, bi);
            cursor += lengths.background_model;
        }
        let mut background_names = NameTable::default();
        for (_, data) in backgrounds {
            background_names.insert(cursor, &data.mesh_name);
            cursor += name_len(&data.mesh_name);
        }

        // Animation headers and keyframe channels (generation 1)
        let mut animation_headers = OffsetMap::new();
        let mut keyframe_channels = HashMap::new();
        if options.animation {
            for (gi, (_, data)) in groups.iter().enumerate() {
                if data.animation.is_some() {
                    animation_headers.insert(cursor, gi);
                    cursor += lengths.animation_header;
                }
            }
            for (gi, (_, data)) in groups.iter().enumerate() {
                if let Some(anim) = &data.animation {
                    let mut channels = ChannelOffsets::default();
                    for (slot, keyframes) in channels
                        .pos
                        .iter_mut()
                        .chain(channels.rot.iter_mut())
                        .zip(anim.channels())
                    {
                        *slot = cursor;
                        cursor += lengths.keyframe * keyframes.len() as u32;
                    }
                    keyframe_channels.insert(gi, channels);
                }
            }
        }

        // Reflective model lists (generation 1)
        let mut reflective_models = OffsetMap::new();
        if options.reflective_models {
            for (gi, count) in counts.iter().enumerate() {
                reflective_models.insert(cursor, gi);
                cursor += lengths.reflective_model * count.reflective_models;
            }
        }

        Layout {
            start_offset,
            fallout_offset,
            collision_headers,
            triangle_lists,
            cell_pointer_tables,
            cell_list_offsets,
            goals,
            bumpers,
            jamabars,
            bananas,
            model_pointers_a,
            model_pointers_b,
            level_models,
            model_names,
            backgrounds: background_records,
            background_names,
            animation_headers,
            keyframe_channels,
            reflective_models,
            counts,
            total_size: cursor,
        }
    }

    /// Stage-wide total of one per-group count
    pub fn total(&self, f: impl Fn(&GroupCounts) -> u32) -> u32 {
        self.counts.iter().map(f).sum()
    }

    /// Section list head for a gameplay-object section: the first group's
    /// reserved region, or zero when the stage has no groups at all
    pub fn list_head(map: &OffsetMap<GroupId>) -> u32 {
        map.first_offset().unwrap_or(0)
    }
}
