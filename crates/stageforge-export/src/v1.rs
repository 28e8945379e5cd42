//! Generation 1 writer set
//!
//! Record layouts for the first-generation runtime: a compact 160-byte file
//! header, 196-byte collision headers carrying the group's center of
//! rotation and animation pointer, per-group transform animation sections,
//! and runtime reflective model lists. Triangle rotation angles stay in
//! radians through this generation's whole pipeline.

use tracing::debug;

use stageforge_core::error::{Error, Result};
use stageforge_scene::{GoalKind, GroupData, LoopType, MeshData, ModelTable, SceneNode, Stage};

use crate::codec::{encode_rotation, encode_triangle, AngleUnit};
use crate::grid::{partition_groups, GroupCollision};
use crate::offsets::{
    background_meshes, banana_children, bumper_children, goal_children, jamabar_children,
    mesh_children, Layout, LayoutOptions, SectionLengths,
};
use crate::writer::BinWriter;
use crate::ProgressCallback;

/// Triangle angles stay in radians in this generation
const ANGLE_UNIT: AngleUnit = AngleUnit::Radians;

/// File magic, written after 4 reserved bytes
const MAGIC: u32 = 0x0000_0064;

/// Goal colour codes used by the first-generation runtime
const GOAL_TYPE_LUT: [u16; 3] = [0x4200, 0x4700, 0x5200];

pub const LENGTHS: SectionLengths = SectionLengths {
    file_header: 160,
    start: 20,
    fallout: 4,
    collision_header: 196,
    collision_triangle: 64,
    cell_pointer: 4,
    triangle_index: 2,
    goal: 20,
    bumper: 32,
    jamabar: 32,
    banana: 16,
    level_model: 12,
    background_model: 56,
    // This generation addresses level models directly, with no indirection
    model_pointer_a: 0,
    model_pointer_b: 0,
    animation_header: 64,
    keyframe: 20,
    reflective_model: 8,
};

pub const LAYOUT_OPTIONS: LayoutOptions = LayoutOptions {
    model_pointer_lists: false,
    animation: true,
    reflective_models: true,
};

struct Ctx<'a> {
    stage: &'a Stage,
    groups: &'a [(&'a SceneNode, &'a GroupData)],
    collisions: &'a [GroupCollision],
    backgrounds: Vec<(&'a SceneNode, &'a MeshData)>,
    layout: Layout,
}

/// Export a stage as a generation-1 binary buffer
pub(crate) fn generate(
    stage: &Stage,
    models: &ModelTable,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<u8>> {
    let start = stage.start_node().ok_or(Error::MissingStartNode)?;

    let groups = stage.collision_groups();
    let collisions = partition_groups(stage, models, progress);
    let backgrounds = background_meshes(stage);
    let layout = Layout::resolve(&groups, &collisions, &backgrounds, &LENGTHS, LAYOUT_OPTIONS);
    debug!(
        groups = groups.len(),
        bytes = layout.total_size,
        "resolved generation 1 layout"
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
            w.put_u16(goal_code(kind))?;
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
    for gi in 0..ctx.groups.len() {
        write_animation_header(&mut w, &ctx, gi)?;
    }
    for gi in 0..ctx.groups.len() {
        write_keyframe_channels(&mut w, &ctx, gi)?;
    }
    for gi in 0..ctx.groups.len() {
        write_reflective_models(&mut w, &ctx, gi)?;
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

fn goal_code(kind: GoalKind) -> u16 {
    GOAL_TYPE_LUT[kind.code() as usize - 1]
}

fn write_file_header<W: std::io::Write>(w: &mut BinWriter<W>, ctx: &Ctx<'_>) -> Result<()> {
    let layout = &ctx.layout;
    let goal_total = layout.total(|c| c.goals);
    let reflective_total = layout.total(|c| c.reflective_models);

    w.put_nulls(4)?;
    w.put_u32(MAGIC)?;
    w.put_u32(ctx.groups.len() as u32)?;
    w.put_u32(Layout::list_head(&layout.collision_headers))?;
    w.put_u32(layout.start_offset)?;
    w.put_u32(layout.fallout_offset)?;
    w.put_u32(goal_total)?;
    w.put_u32(Layout::list_head(&layout.goals))?;
    w.put_u32(goal_total)?;
    w.put_nulls(4)?;
    w.put_u32(layout.total(|c| c.bumpers))?;
    w.put_u32(Layout::list_head(&layout.bumpers))?;
    w.put_u32(layout.total(|c| c.jamabars))?;
    w.put_u32(Layout::list_head(&layout.jamabars))?;
    w.put_u32(layout.total(|c| c.bananas))?;
    w.put_u32(Layout::list_head(&layout.bananas))?;
    w.put_nulls(24)?;
    w.put_u32(layout.total(|c| c.level_models))?;
    w.put_u32(Layout::list_head(&layout.level_models))?;
    w.put_nulls(8)?;
    w.put_u32(ctx.backgrounds.len() as u32)?;
    w.put_u32(layout.backgrounds.first_offset().unwrap_or(0))?;
    w.put_nulls(12)?;
    w.put_u32(0x0000_0001)?;
    w.put_u32(reflective_total)?;
    w.put_u32(if reflective_total > 0 {
        Layout::list_head(&layout.reflective_models)
    } else {
        0
    })?;
    w.put_nulls(24)?;
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
    let (node, data) = ctx.groups[gi];
    let counts = layout.counts[gi];
    let grid = &data.collision_grid;
    let anim = data.animation.as_ref();

    // The group node's own transform is the center of rotation
    w.put_vec3(node.transform.position)?;
    w.put_rotation(encode_rotation(node.transform.rotation))?;
    w.put_u16(match anim.map(|a| a.loop_type) {
        Some(LoopType::PlayOnce) => 0x0001,
        _ => 0x0000,
    })?;
    w.put_u32(if anim.is_some() {
        layout.animation_headers.offset_of(&gi)?
    } else {
        0
    })?;
    w.put_nulls(4)?; // model reference offset
    w.put_u32(layout.triangle_lists.offset_of(&gi)?)?;
    w.put_u32(layout.cell_pointer_tables.offset_of(&gi)?)?;
    w.put_vec2(grid.start)?;
    w.put_vec2(grid.step)?;
    w.put_uvec2(grid.step_count)?;
    w.put_u32(counts.goals)?;
    w.put_u32(layout.goals.offset_of(&gi)?)?;
    w.put_u32(counts.goals)?;
    w.put_nulls(4)?;
    w.put_u32(counts.bumpers)?;
    w.put_u32(layout.bumpers.offset_of(&gi)?)?;
    w.put_u32(counts.jamabars)?;
    w.put_u32(layout.jamabars.offset_of(&gi)?)?;
    w.put_u32(counts.bananas)?;
    w.put_u32(layout.bananas.offset_of(&gi)?)?;
    w.put_nulls(24)?;
    w.put_u32(counts.level_models)?;
    w.put_u32(layout.level_models.offset_of(&gi)?)?;
    w.put_nulls(32)?;
    w.put_u32(counts.reflective_models)?;
    w.put_u32(layout.reflective_models.offset_of(&gi)?)?;
    w.put_nulls(24)?;
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
    if bytes_written % 4 != 0 {
        w.put_nulls(2)?;
    }
    Ok(())
}

fn write_scaled_object<W: std::io::Write>(w: &mut BinWriter<W>, node: &SceneNode) -> Result<()> {
    w.put_vec3(node.transform.position)?;
    w.put_rotation(encode_rotation(node.transform.rotation))?;
    w.put_nulls(2)?;
    w.put_vec3(node.transform.scale)?;
    Ok(())
}

fn write_level_models<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    node: &SceneNode,
) -> Result<()> {
    for (_, data) in mesh_children(node) {
        w.put_u32(0x0000_0001)?;
        w.put_u32(ctx.layout.model_names.offset_of(&data.mesh_name)?)?;
        w.put_nulls(4)?;
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

/// Animation header: rotation channels first, then position channels, even
/// though the keyframe data itself is laid out positions first. Both
/// orderings are what the runtime expects.
fn write_animation_header<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    let (_, data) = ctx.groups[gi];
    let Some(anim) = data.animation.as_ref() else {
        return Ok(());
    };
    let channels = ctx.layout.keyframe_channels.get(&gi).ok_or_else(|| {
        Error::internal(format!("group {gi} has animation but no resolved channels"))
    })?;

    w.put_u32(anim.rot_x.len() as u32)?;
    w.put_u32(channels.rot[0])?;
    w.put_u32(anim.rot_y.len() as u32)?;
    w.put_u32(channels.rot[1])?;
    w.put_u32(anim.rot_z.len() as u32)?;
    w.put_u32(channels.rot[2])?;
    w.put_u32(anim.pos_x.len() as u32)?;
    w.put_u32(channels.pos[0])?;
    w.put_u32(anim.pos_y.len() as u32)?;
    w.put_u32(channels.pos[1])?;
    w.put_u32(anim.pos_z.len() as u32)?;
    w.put_u32(channels.pos[2])?;
    w.put_nulls(16)?;
    Ok(())
}

fn write_keyframe_channels<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    let (_, data) = ctx.groups[gi];
    let Some(anim) = data.animation.as_ref() else {
        return Ok(());
    };
    // Keep the reservation order: positions, then rotations. Rotation values
    // are radians in the scene model but degrees on the wire.
    for keyframe in anim.pos_x.iter().chain(&anim.pos_y).chain(&anim.pos_z) {
        w.put_u32(keyframe.easing.code())?;
        w.put_f32(keyframe.time)?;
        w.put_f32(keyframe.value)?;
        w.put_nulls(8)?;
    }
    for keyframe in anim.rot_x.iter().chain(&anim.rot_y).chain(&anim.rot_z) {
        w.put_u32(keyframe.easing.code())?;
        w.put_f32(keyframe.time)?;
        w.put_f32(keyframe.value.to_degrees())?;
        w.put_nulls(8)?;
    }
    Ok(())
}

fn write_reflective_models<W: std::io::Write>(
    w: &mut BinWriter<W>,
    ctx: &Ctx<'_>,
    gi: usize,
) -> Result<()> {
    for (_, data) in mesh_children(ctx.groups[gi].0) {
        if data.runtime_reflective {
            w.put_u32(ctx.layout.model_names.offset_of(&data.mesh_name)?)?;
            w.put_nulls(4)?;
        }
    }
    Ok(())
}
