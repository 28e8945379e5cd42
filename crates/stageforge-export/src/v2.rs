//! Generation 2 writer set
//!
//! Record layouts for the second-generation runtime: a 2204-byte file
//! header, 1180-byte collision headers, and two levels of model pointer
//! indirection in front of the level model list. Triangle rotation angles
//! pass through degrees before quantization in this generation.

use tracing::debug;

use stageforge_core::error::{Error, Result};
use stageforge_scene::{GroupData, MeshData, ModelTable, SceneNode, Stage};

use crate::codec::{encode_rotation, encode_triangle, AngleUnit};
use crate::grid::{partition_groups, GroupCollision};
use crate::offsets::{
    background_meshes, banana_children, bumper_children, goal_children, jamabar_children,
    mesh_children, Layout, LayoutOptions, SectionLengths,
};
use crate::writer::BinWriter;
use crate::ProgressCallback;

/// Triangle angles pass through degrees in this generation
const ANGLE_UNIT: AngleUnit = AngleUnit::Degrees;

/// File magic, written after 4 reserved bytes
const MAGIC: u32 = 0x447A_0000;

pub const LENGTHS: SectionLengths = SectionLengths {
    file_header: 2204,
    start: 20,
    fallout: 4,
    collision_header: 1180,
    collision_triangle: 64,
    cell_pointer: 4,
    triangle_index: 2,
    goal: 20,
    bumper: 32,
    jamabar: 32,
    banana: 16,
    level_model: 16,
    background_model: 56,
    model_pointer_a: 12,
    model_pointer_b: 4,
    // This generation has no animation or reflective sections
    animation_header: 0,
    keyframe: 0,
    reflective_model: 0,
};

pub const LAYOUT_OPTIONS: LayoutOptions = LayoutOptions {
    model_pointer_lists: true,
    animation: false,
    reflective_models: false,
};

struct Ctx<'a> {
    stage: &'a Stage,
    groups: &'a [(&'a SceneNode, &'a GroupData)],
    collisions: &'a [GroupCollision],
    backgrounds: Vec<(&'a SceneNode, &'a MeshData)>,
    layout: Layout,
}

/// Export a stage as a generation-2 binary buffer
pub(crate) fn generate(
    stage: &Stage,
    models: &ModelTable,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<u8>> {
    // Malformed stages are rejected before any work happens
    let start = stage.start_node().ok_or(Error::MissingStartNode)?;

    let groups = stage.collision_groups();
    let collisions = partition_groups(stage, models, progress);
    let backgrounds = background_meshes(stage);
    let layout = Layout::resolve(&groups, &collisions, &backgrounds, &LENGTHS, LAYOUT_OPTIONS);
    debug!(
        groups = groups.len(),
        bytes = layout.total_size,
        "resolved generation 2 layout"
    );

    let ctx = Ctx {
        stage,
        groups: &groups,
        collisions: &collisions,
        backgrounds,
        layout,
    };

    let mut w = BinWriter::new(Vec::new());
    write_file_header(&mut w, &ctx)?;
    write_start(&mut w, start)?;
    w.put_f32(ctx.stage.fallout_y)?;
    for gi in 0..ctx.groups.len() {
        write_collision_header(&mut w, &ctx, gi)?;
    }
    for collision in ctx.collisions {
        write_collision_triangles(&mut w, collision)?;
    }
    for gi in 0..ctx.groups.len() {
        write_cell_pointer_table(&mut w, &ctx, gi)?;
    }
    for collision in ctx.collisions {
        write_triangle_index_lists(&mut w, collision)?;
    }
    for (node, _) in ctx.groups {
        for (goal, kind) in goal_children(node) {
            w.put_vec3(goal.transform.position)?;
            w.put_rotation(encode_rotation(goal.transform.rotation))?;
            w.put_u16(kind.code())?;
        }
    }
    for (node, _) in ctx.groups {
        for bumper in bumper_children(node) {
            write_scaled_object(&mut w, bumper)?;
        }
    }
    for (node, _) in ctx.groups {
        for jamabar in jamabar_children(node) {
            write_scaled_object(&mut w, jamabar)?;
        }
    }
    for (node, _) in ctx.groups {
        for (banana, kind) in banana_children(node) {
            w.put_vec3(banana.transform.position)?;
            w.put_u32(kind.code())?;
        }
    }
    for gi in 0..ctx.groups.len() {
        write_model_pointer_a_list(&mut w, &ctx, gi)?;
    }
    for gi in 0..ctx.groups.len() {
        write_model_pointer_b_list(&mut w, &ctx, gi)?;
    }
    for (node, _) in ctx.groups {
        write_level_models(&mut w, &ctx, node)?;
    }
    for (node, _) in ctx.groups {
        for (_, data) in mesh_children(node) {
            w.put_name(&data.mesh_name)?;
        }
    }
    for bi in 0..ctx.backgrounds.len() {
        write_background_model(&mut w, &ctx, bi)?;
    }
    for (_, data) in &ctx.backgrounds {
        w.put_name(&data.mesh_name)?;
    }

    let buffer = w.into_inner();
    if buffer.len() != ctx.layout.total_size as usize {
        return Err(Error::internal(format!(
            "wrote {} bytes but resolved {} (writer/resolver order mismatch)",
            buffer.len(),
            ctx.layout.total_size
        )));
    }
    Ok(buffer)
}

fn write_file_header<W: std::io::Write>(w: &mut BinWriter<W>, ctx: &Ctx<'_>) -> Result<()> {
    let layout = &ctx.layout;

    w.put_nulls(4)?;
    w.put_u32(MAGIC)?;
    w.put_u32(ctx.groups.len() as u32)?;
    w.put_u32(Layout::list_head(&layout.collision_headers))?;
    w.put_u32(layout.start_offset)?;
    w.put_u32(layout.fallout_offset)?;
    w.put_u32(layout.total(|c| c.goals))?;
    w.put_u32(Layout::list_head(&layout.goals))?;
    w.put_u32(layout.total(|c| c.bumpers))?;
    w.put_u32(Layout::list_head(&layout.bumpers))?;
    w.put_u32(layout.total(|c| c.jamabars))?;
    w.put_u32(Layout::list_head(&layout.jamabars))?;
    w.put_u32(layout.total(|c| c.bananas))?;
    w.put_u32(Layout::list_head(&layout.bananas))?;
    w.put_nulls(8)?; // cone collision objects
    w.put_nulls(8)?; // sphere collision objects
    w.put_nulls(8)?; // cylinder collision objects
    w.put_nulls(8)?; // fallout volumes
    w.put_u32(ctx.backgrounds.len() as u32)?;
    w.put_u32(layout.backgrounds.first_offset().unwrap_or(0))?;
    w.put_nulls(8)?;
    w.put_nulls(4)?;
    w.put_u32(0x0000_0001)?;
    w.put_nulls(8)?; // reflective level models
    w.put_nulls(12)?;
    w.put_nulls(8)?; // level model instances
    w.put_u32(layout.total(|c| c.level_models))?;
    w.put_u32(Layout::list_head(&layout.model_pointers_a))?;
    w.put_u32(layout.total(|c| c.level_models))?;
    w.put_u32(Layout::list_head(&layout.model_pointers_b))?;
    w.put_nulls(12)?;
    w.put_nulls(8)?; // switches
    w.put_nulls(4)?; // fog animation header
    w.put_nulls(8)?; // wormholes
    w.put_nulls(4)?; // fog
    w.put_nulls(20)?;
    w.put_nulls(4)?;
    w.put_nulls(1988)?;
    Ok(())
}

fn write_start<W: std::io::Write>(w: &mut BinWriter<W>, start: &SceneNode) -> Result<()> {
    w.put_vec3(start.transform.position)?;
    w.put_rotation(encode_rotation(start.transform.rotation))?;
    w.put_nulls(2)?;
    Ok(())
}

fn write_collision_header<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    let layout = &ctx.layout;
    let (_, data) = ctx.groups[gi];
    let counts = layout.counts[gi];
    let grid = &data.collision_grid;

    w.put_nulls(12)?; // center of rotation
    w.put_nulls(6)?; // initial rotation
    w.put_nulls(2)?; // animation loop type / seesaw
    w.put_nulls(4)?; // animation header offset
    w.put_nulls(12)?; // conveyor speed
    w.put_u32(layout.triangle_lists.offset_of(&gi)?)?;
    w.put_u32(layout.cell_pointer_tables.offset_of(&gi)?)?;
    w.put_vec2(grid.start)?;
    w.put_vec2(grid.step)?;
    w.put_uvec2(grid.step_count)?;
    w.put_u32(counts.goals)?;
    w.put_u32(layout.goals.offset_of(&gi)?)?;
    w.put_u32(counts.bumpers)?;
    w.put_u32(layout.bumpers.offset_of(&gi)?)?;
    w.put_u32(counts.jamabars)?;
    w.put_u32(layout.jamabars.offset_of(&gi)?)?;
    w.put_u32(counts.bananas)?;
    w.put_u32(layout.bananas.offset_of(&gi)?)?;
    w.put_nulls(48)?;
    w.put_u32(counts.level_models)?;
    w.put_u32(layout.model_pointers_b.offset_of(&gi)?)?;
    w.put_nulls(1024)?;
    Ok(())
}

fn write_collision_triangles<W: std::io::Write>(
    w: &mut BinWriter<W>,
    collision: &GroupCollision,
) -> Result<()> {
    for tri in &collision.triangles {
        let record = encode_triangle(tri, ANGLE_UNIT);
        w.put_vec3(record.vertex)?;
        w.put_vec3(record.normal)?;
        w.put_rotation(record.rotation)?;
        w.put_nulls(2)?;
        w.put_vec2(record.delta_b)?;
        w.put_vec2(record.delta_c)?;
        w.put_vec2(record.tangent)?;
        w.put_vec2(record.bitangent)?;
    }
    Ok(())
}

fn write_cell_pointer_table<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    for &offset in &ctx.layout.cell_list_offsets[gi] {
        w.put_u32(offset)?;
    }
    Ok(())
}

fn write_triangle_index_lists<W: std::io::Write>(
    w: &mut BinWriter<W>,
    collision: &GroupCollision,
) -> Result<()> {
    let mut bytes_written = 0usize;
    for cell in collision.grid.cells() {
        if cell.is_empty() {
            continue;
        }
        for &index in cell {
            w.put_u16(index)?;
            bytes_written += 2;
        }
        w.put_u16(0xFFFF)?;
        bytes_written += 2;
    }
    // Keep the next group's run 4-byte aligned
    if bytes_written % 4 != 0 {
        w.put_nulls(2)?;
    }
    Ok(())
}

/// Bumpers and jamabars share one record shape
fn write_scaled_object<W: std::io::Write>(w: &mut BinWriter<W>, node: &SceneNode) -> Result<()> {
    w.put_vec3(node.transform.position)?;
    w.put_rotation(encode_rotation(node.transform.rotation))?;
    w.put_nulls(2)?;
    w.put_vec3(node.transform.scale)?;
    Ok(())
}

fn write_model_pointer_a_list<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    // Level models for one group are stored sequentially, so each pointer is
    // the list base plus a record stride
    let mut next = ctx.layout.level_models.offset_of(&gi)?;
    for _ in mesh_children(ctx.groups[gi].0) {
        w.put_nulls(4)?;
        w.put_u32(0x0000_0001)?;
        w.put_u32(next)?;
        next += LENGTHS.level_model;
    }
    Ok(())
}

fn write_model_pointer_b_list<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    let mut next = ctx.layout.model_pointers_a.offset_of(&gi)?;
    for _ in mesh_children(ctx.groups[gi].0) {
        w.put_u32(next)?;
        next += LENGTHS.model_pointer_a;
    }
    Ok(())
}

fn write_level_models<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    node: &SceneNode,
) -> Result<()> {
    for (_, data) in mesh_children(node) {
        w.put_nulls(4)?;
        w.put_u32(ctx.layout.model_names.offset_of(&data.mesh_name)?)?;
        w.put_nulls(8)?;
    }
    Ok(())
}

fn write_background_model<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    bi: usize,
) -> Result<()> {
    let (node, data) = ctx.backgrounds[bi];
    w.put_u32(0x0000_001F)?;
    w.put_u32(ctx.layout.background_names.offset_of(&data.mesh_name)?)?;
    w.put_nulls(4)?;
    w.put_vec3(node.transform.position)?;
    w.put_rotation(encode_rotation(node.transform.rotation))?;
    w.put_nulls(2)?;
    w.put_vec3(node.transform.scale)?;
    w.put_nulls(12)?; // background animation
    Ok(())
}
