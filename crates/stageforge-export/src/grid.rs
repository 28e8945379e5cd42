//! Triangle intersection grid
//!
//! For each collision group, the exporter flattens every collision mesh child
//! into one group-global triangle list and bins those triangles into the
//! group's 2D grid: a cell records the index of every triangle whose X/Z
//! projection overlaps the cell's rectangle. The runtime walks a single cell
//! per query instead of the whole triangle list.
//!
//! Partitioning is independent per group and runs one task per group on the
//! rayon pool; the export driver joins on all of them before resolving
//! offsets.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use stageforge_core::math::{Vec2, Vec3};
use stageforge_scene::{CollisionGrid, ModelTable, NodeKind, SceneNode, Stage};

use crate::ProgressCallback;

/// A single world-space collision triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }
}

/// One collision group's flattened triangles plus their cell binning
#[derive(Debug, Clone)]
pub struct GroupCollision {
    /// Group-global triangle list, in traversal order
    pub triangles: Vec<Triangle>,
    /// Per-cell triangle indices
    pub grid: TriangleIntersectionGrid,
}

/// 2D array of triangle index lists, X-major
#[derive(Debug, Clone)]
pub struct TriangleIntersectionGrid {
    step_count_x: u32,
    step_count_y: u32,
    cells: Vec<Vec<u16>>,
}

impl TriangleIntersectionGrid {
    /// Bin `triangles` into `grid`, testing every triangle's X/Z projection
    /// against every cell rectangle. Within a cell, indices end up in
    /// ascending triangle order; that order is serialized verbatim.
    pub fn build(triangles: &[Triangle], grid: &CollisionGrid) -> Self {
        // Triangle indices are written as u16 with 0xFFFF as the list
        // terminator, so anything past that cannot be referenced.
        if triangles.len() >= 0xFFFF {
            warn!(
                count = triangles.len(),
                "collision group exceeds the 65534-triangle index space; excess \
                 triangles will not be referenced by grid cells"
            );
        }

        let footprints: Vec<[Vec2; 3]> = triangles
            .iter()
            .map(|t| [t.a.xz(), t.b.xz(), t.c.xz()])
            .collect();

        let mut cells = Vec::with_capacity(grid.cell_count());
        for x in 0..grid.step_count.x {
            for y in 0..grid.step_count.y {
                let min = Vec2::new(
                    grid.start.x + x as f32 * grid.step.x,
                    grid.start.y + y as f32 * grid.step.y,
                );
                let max = Vec2::new(min.x + grid.step.x, min.y + grid.step.y);

                let mut indices = Vec::new();
                for (i, tri) in footprints.iter().enumerate() {
                    if i < 0xFFFF && tri_rect_overlap(tri, min, max) {
                        indices.push(i as u16);
                    }
                }
                cells.push(indices);
            }
        }

        Self {
            step_count_x: grid.step_count.x,
            step_count_y: grid.step_count.y,
            cells,
        }
    }

    /// Triangle indices for cell (x, y)
    pub fn cell(&self, x: u32, y: u32) -> &[u16] {
        assert!(x < self.step_count_x && y < self.step_count_y);
        &self.cells[(x * self.step_count_y + y) as usize]
    }

    /// All cells in serialization order (X-major)
    pub fn cells(&self) -> &[Vec<u16>] {
        &self.cells
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// 2D separating-axis overlap test between a (possibly degenerate) triangle
/// and an axis-aligned rectangle. Touching counts as overlapping.
fn tri_rect_overlap(tri: &[Vec2; 3], min: Vec2, max: Vec2) -> bool {
    // Rectangle axes: the triangle's bounding box against the rectangle
    let tri_min_x = tri[0].x.min(tri[1].x).min(tri[2].x);
    let tri_max_x = tri[0].x.max(tri[1].x).max(tri[2].x);
    let tri_min_y = tri[0].y.min(tri[1].y).min(tri[2].y);
    let tri_max_y = tri[0].y.max(tri[1].y).max(tri[2].y);
    if tri_max_x < min.x || tri_min_x > max.x || tri_max_y < min.y || tri_min_y > max.y {
        return false;
    }

    // Triangle edge normals
    let corners = [
        min,
        Vec2::new(max.x, min.y),
        max,
        Vec2::new(min.x, max.y),
    ];
    for i in 0..3 {
        let p0 = tri[i];
        let p1 = tri[(i + 1) % 3];
        let axis = Vec2::new(p0.y - p1.y, p1.x - p0.x);

        let project = |p: Vec2| axis.x * p.x + axis.y * p.y;

        let mut tri_lo = f32::INFINITY;
        let mut tri_hi = f32::NEG_INFINITY;
        for p in tri {
            let d = project(*p);
            tri_lo = tri_lo.min(d);
            tri_hi = tri_hi.max(d);
        }

        let mut rect_lo = f32::INFINITY;
        let mut rect_hi = f32::NEG_INFINITY;
        for p in corners {
            let d = project(p);
            rect_lo = rect_lo.min(d);
            rect_hi = rect_hi.max(d);
        }

        if tri_hi < rect_lo || tri_lo > rect_hi {
            return false;
        }
    }

    true
}

/// Recursively gather the collision triangles beneath `node` into `out`,
/// translating segment-local indices into the group-global triangle space.
/// A collision node referencing an unknown mesh is skipped with a warning.
fn collect_triangles(node: &SceneNode, models: &ModelTable, out: &mut Vec<Triangle>) {
    if let NodeKind::MeshCollision { mesh_name } = &node.kind {
        match models.get(mesh_name) {
            Some(mesh) => {
                for segment in &mesh.segments {
                    for tri in segment.indices.chunks_exact(3) {
                        out.push(Triangle::new(
                            segment.vertices[tri[0] as usize].position,
                            segment.vertices[tri[1] as usize].position,
                            segment.vertices[tri[2] as usize].position,
                        ));
                    }
                }
            }
            None => {
                warn!(mesh = %mesh_name, node = %node.name, "missing mesh for collision");
            }
        }
    }

    for child in &node.children {
        collect_triangles(child, models, out);
    }
}

/// Partition every collision group of `stage`, one rayon task per group.
///
/// Blocks until all groups are done (the collect is the join barrier); the
/// progress callback fires from each completed task with (done, total).
/// Results come back in group graph order. A group with no collision
/// triangles still yields a grid of empty cells.
pub fn partition_groups(
    stage: &Stage,
    models: &ModelTable,
    progress: Option<&ProgressCallback>,
) -> Vec<GroupCollision> {
    let groups = stage.collision_groups();
    let total = groups.len();
    let completed = AtomicUsize::new(0);

    debug!(groups = total, "partitioning collision grids");
    let started = std::time::Instant::now();

    let results: Vec<GroupCollision> = groups
        .par_iter()
        .map(|(node, data)| {
            let mut triangles = Vec::new();
            collect_triangles(node, models, &mut triangles);
            let grid = TriangleIntersectionGrid::build(&triangles, &data.collision_grid);

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(cb) = progress {
                cb(done, total);
            }

            GroupCollision { triangles, grid }
        })
        .collect();

    debug!(elapsed = ?started.elapsed(), "collision partitioning finished");
    results
}
