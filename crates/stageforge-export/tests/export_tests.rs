//! End-to-end exporter tests: build small stages in memory, export them, and
//! decode the interesting parts of the buffer back with byteorder.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use stageforge_core::math::{UVec2, Vec2, Vec3};
use stageforge_core::Error;
use stageforge_export::{export, FormatVersion};
use stageforge_scene::{
    CollisionGrid, Easing, GroupData, Keyframe, LoopType, MeshData, MeshResource, MeshSegment,
    ModelTable, NodeKind, SceneNode, Stage, Transform, TransformAnimation, Vertex,
};

fn read_u32_at(buffer: &[u8], offset: usize) -> u32 {
    let mut cursor = Cursor::new(&buffer[offset..offset + 4]);
    cursor.read_u32::<BigEndian>().expect("read u32")
}

fn read_u16_at(buffer: &[u8], offset: usize) -> u16 {
    let mut cursor = Cursor::new(&buffer[offset..offset + 2]);
    cursor.read_u16::<BigEndian>().expect("read u16")
}

fn read_f32_at(buffer: &[u8], offset: usize) -> f32 {
    let mut cursor = Cursor::new(&buffer[offset..offset + 4]);
    cursor.read_f32::<BigEndian>().expect("read f32")
}

fn read_vec3_at(buffer: &[u8], offset: usize) -> Vec3 {
    Vec3::new(
        read_f32_at(buffer, offset),
        read_f32_at(buffer, offset + 4),
        read_f32_at(buffer, offset + 8),
    )
}

fn single_triangle_mesh() -> MeshResource {
    MeshResource {
        segments: vec![MeshSegment {
            vertices: vec![
                Vertex::new(Vec3::new(0.25, 0.0, 0.25)),
                Vertex::new(Vec3::new(0.75, 0.0, 0.25)),
                Vertex::new(Vec3::new(0.25, 0.0, 0.75)),
            ],
            indices: vec![0, 1, 2],
        }],
    }
}

fn group_node(name: &str, cells: (u32, u32), children: Vec<SceneNode>) -> SceneNode {
    let mut node = SceneNode::new(
        name,
        NodeKind::Group(GroupData {
            collision_grid: CollisionGrid::new(
                Vec2::ZERO,
                Vec2::new(1.0, 1.0),
                UVec2::new(cells.0, cells.1),
            ),
            animation: None,
        }),
    );
    node.children = children;
    node
}

/// One collision group, one triangle, zero gameplay objects
fn single_triangle_stage() -> (Stage, ModelTable) {
    let mut models = ModelTable::new();
    models.insert("tri", single_triangle_mesh());

    let group = group_node(
        "group",
        (1, 1),
        vec![SceneNode::new(
            "collision",
            NodeKind::MeshCollision {
                mesh_name: "tri".into(),
            },
        )],
    );
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    (Stage::new(root, -12.5), models)
}

#[test]
fn single_triangle_stage_v2_header_and_record() {
    let (stage, models) = single_triangle_stage();
    let buffer = export(&stage, &models, FormatVersion::Two, None).expect("export");

    // header 2204 + start 20 + fallout 4 + collision header 1180
    // + triangle 64 + cell pointer 4 + index list 4 = 3480
    assert_eq!(buffer.len(), 3480);

    assert_eq!(read_u32_at(&buffer, 4), 0x447A0000, "magic");
    assert_eq!(read_u32_at(&buffer, 8), 1, "collision header count");
    assert_eq!(read_u32_at(&buffer, 12), 2228, "collision header offset");
    assert_eq!(read_u32_at(&buffer, 16), 2204, "start offset");
    assert_eq!(read_u32_at(&buffer, 20), 2224, "fallout offset");

    // Zero objects of every kind, but every list head still points at the
    // first group's reserved region instead of dangling at zero
    for (count_offset, label) in [(24, "goals"), (32, "bumpers"), (40, "jamabars"), (48, "bananas")]
    {
        assert_eq!(read_u32_at(&buffer, count_offset), 0, "{label} count");
        assert_eq!(
            read_u32_at(&buffer, count_offset + 4),
            3480,
            "{label} list head"
        );
    }

    // Start record carries the fallout plane right behind it
    assert!((read_f32_at(&buffer, 2224) - (-12.5)).abs() < 1e-6);

    // The one grid cell points at the one index list: [0, 0xFFFF]
    assert_eq!(read_u32_at(&buffer, 3472), 3476, "cell pointer");
    assert_eq!(read_u16_at(&buffer, 3476), 0, "triangle index");
    assert_eq!(read_u16_at(&buffer, 3478), 0xFFFF, "list terminator");

    // Collision triangle record: vertex A raw, then the normal
    let vertex = read_vec3_at(&buffer, 3408);
    assert!((vertex - Vec3::new(0.25, 0.0, 0.25)).length() < 1e-6);

    let normal = read_vec3_at(&buffer, 3420);
    let expected = Vec3::new(0.0, -1.0, 0.0);
    assert!(
        (normal - expected).length() < 1e-4,
        "normal {normal:?} should be {expected:?}"
    );
}

#[test]
fn single_triangle_stage_v1_layout() {
    let (stage, models) = single_triangle_stage();
    let buffer = export(&stage, &models, FormatVersion::One, None).expect("export");

    // header 160 + start 20 + fallout 4 + collision header 196
    // + triangle 64 + cell pointer 4 + index list 4 = 452
    assert_eq!(buffer.len(), 452);

    assert_eq!(read_u32_at(&buffer, 4), 0x64, "magic");
    assert_eq!(read_u32_at(&buffer, 8), 1, "collision header count");
    assert_eq!(read_u32_at(&buffer, 12), 184, "collision header offset");
    assert_eq!(read_u32_at(&buffer, 16), 160, "start offset");
    assert_eq!(read_u32_at(&buffer, 20), 180, "fallout offset");
    assert_eq!(read_u32_at(&buffer, 24), 0, "goal count");
    assert_eq!(read_u32_at(&buffer, 28), 452, "goal list head");

    // Same grid contents as generation 2, different addresses
    assert_eq!(read_u32_at(&buffer, 444), 448, "cell pointer");
    assert_eq!(read_u16_at(&buffer, 448), 0, "triangle index");
    assert_eq!(read_u16_at(&buffer, 450), 0xFFFF, "list terminator");
}

#[test]
fn export_is_idempotent() {
    let (stage, models) = single_triangle_stage();
    let first = export(&stage, &models, FormatVersion::Two, None).expect("export");
    let second = export(&stage, &models, FormatVersion::Two, None).expect("export");
    assert_eq!(first, second);

    let first = export(&stage, &models, FormatVersion::One, None).expect("export");
    let second = export(&stage, &models, FormatVersion::One, None).expect("export");
    assert_eq!(first, second);
}

#[test]
fn deluxe_fails_fast_with_no_output() {
    let (stage, models) = single_triangle_stage();
    match export(&stage, &models, FormatVersion::Deluxe, None) {
        Err(Error::UnsupportedVersion { version }) => assert_eq!(version, "deluxe"),
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn missing_start_node_is_fatal() {
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![group_node("group", (1, 1), vec![])];
    let stage = Stage::new(root, 0.0);

    for version in [FormatVersion::One, FormatVersion::Two] {
        match export(&stage, &ModelTable::new(), version, None) {
            Err(Error::MissingStartNode) => {}
            other => panic!("expected MissingStartNode, got {other:?}"),
        }
    }
}

#[test]
fn missing_mesh_is_skipped_not_fatal() {
    let group = group_node(
        "group",
        (2, 2),
        vec![SceneNode::new(
            "collision",
            NodeKind::MeshCollision {
                mesh_name: "not in the table".into(),
            },
        )],
    );
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &ModelTable::new(), FormatVersion::Two, None).expect("export");
    // No triangle records, a 4-cell pointer table of nulls, no index lists
    assert_eq!(buffer.len(), 2204 + 20 + 4 + 1180 + 16);
    let table_start = 2204 + 20 + 4 + 1180;
    for cell in 0..4 {
        assert_eq!(read_u32_at(&buffer, table_start + cell * 4), 0);
    }
}

#[test]
fn two_groups_get_independent_pointer_tables() {
    let mut models = ModelTable::new();
    models.insert("tri", single_triangle_mesh());

    let ga = group_node(
        "a",
        (2, 3),
        vec![SceneNode::new(
            "coli",
            NodeKind::MeshCollision {
                mesh_name: "tri".into(),
            },
        )],
    );
    let gb = group_node("b", (4, 4), vec![]);
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), ga, gb];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &models, FormatVersion::Two, None).expect("export");

    // Tables start after both groups' triangle records
    let tables_start = 2204 + 20 + 4 + 2 * 1180 + 64;
    // Group a: 6 cells; only cell (0,0) holds the triangle, the rest null
    let first_list = tables_start + (6 + 16) * 4;
    assert_eq!(read_u32_at(&buffer, tables_start), first_list as u32);
    for cell in 1..6 {
        assert_eq!(read_u32_at(&buffer, tables_start + cell * 4), 0);
    }
    // Group b: 16 null cells immediately after
    for cell in 0..16 {
        assert_eq!(read_u32_at(&buffer, tables_start + (6 + cell) * 4), 0);
    }

    // Index list: [0, 0xFFFF], 4-byte aligned, and the file ends there
    assert_eq!(read_u16_at(&buffer, first_list), 0);
    assert_eq!(read_u16_at(&buffer, first_list + 2), 0xFFFF);
    assert_eq!(buffer.len(), first_list + 4);
}

#[test]
fn gameplay_objects_round_trip_through_the_header() {
    let mut models = ModelTable::new();
    models.insert("tri", single_triangle_mesh());

    let group = group_node(
        "group",
        (1, 1),
        vec![
            SceneNode::new(
                "goal",
                NodeKind::Goal {
                    kind: stageforge_scene::GoalKind::Green,
                },
            )
            .with_transform(Transform {
                position: Vec3::new(1.0, 2.0, 3.0),
                rotation: Vec3::new(0.0, std::f32::consts::PI, 0.0),
                scale: Vec3::ONE,
            }),
            SceneNode::new("bumper", NodeKind::Bumper),
            SceneNode::new(
                "banana",
                NodeKind::Banana {
                    kind: stageforge_scene::BananaKind::Bunch,
                },
            ),
        ],
    );
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &models, FormatVersion::Two, None).expect("export");

    assert_eq!(read_u32_at(&buffer, 24), 1, "goal count");
    assert_eq!(read_u32_at(&buffer, 32), 1, "bumper count");
    assert_eq!(read_u32_at(&buffer, 40), 0, "jamabar count");
    assert_eq!(read_u32_at(&buffer, 48), 1, "banana count");

    // Goal record sits at the header's goal list head
    let goal_offset = read_u32_at(&buffer, 28) as usize;
    let position = read_vec3_at(&buffer, goal_offset);
    assert!((position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    // Rotation y = pi quantizes to half the fixed-point range
    assert_eq!(read_u16_at(&buffer, goal_offset + 14), 32768);
    // Green goal ordinal
    assert_eq!(read_u16_at(&buffer, goal_offset + 18), 2);

    // Banana record: position then the bunch code
    let banana_offset = read_u32_at(&buffer, 52) as usize;
    assert_eq!(read_u32_at(&buffer, banana_offset + 12), 1);
}

#[test]
fn level_model_names_are_terminated_and_aligned() {
    let mut models = ModelTable::new();
    models.insert("tri", single_triangle_mesh());

    let group = group_node(
        "group",
        (1, 1),
        vec![SceneNode::new(
            "model",
            NodeKind::Mesh(MeshData {
                mesh_name: "platform".into(),
                runtime_reflective: false,
            }),
        )],
    );
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &models, FormatVersion::Two, None).expect("export");

    // One model: pointer A (12) + pointer B (4) + record (16) + name
    let sections = 2204 + 20 + 4 + 1180 + 4; // header..cell pointer table
    let ptr_a = sections;
    let ptr_b = ptr_a + 12;
    let record = ptr_b + 4;
    let name = record + 16;

    assert_eq!(read_u32_at(&buffer, ptr_a + 4), 1);
    assert_eq!(read_u32_at(&buffer, ptr_a + 8), record as u32);
    assert_eq!(read_u32_at(&buffer, ptr_b), ptr_a as u32);
    assert_eq!(read_u32_at(&buffer, record + 4), name as u32);

    // "platform" is 8 bytes; with the terminator it pads to 12
    assert_eq!(&buffer[name..name + 8], b"platform");
    assert_eq!(&buffer[name + 8..name + 12], &[0, 0, 0, 0]);
    assert_eq!(buffer.len(), name + 12);
    assert_eq!((buffer.len() - name) % 4, 0);
}

#[test]
fn v1_animation_sections_are_written() {
    let mut anim = TransformAnimation::new(LoopType::PlayOnce, 4.0);
    anim.pos_y.push(Keyframe::new(0.0, 0.0, Easing::Linear));
    anim.pos_y.push(Keyframe::new(4.0, 2.0, Easing::Smooth));
    anim.rot_z
        .push(Keyframe::new(0.0, std::f32::consts::PI, Easing::Linear));

    let mut group = group_node("spinner", (1, 1), vec![]);
    if let NodeKind::Group(data) = &mut group.kind {
        data.animation = Some(anim);
    }
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &ModelTable::new(), FormatVersion::One, None).expect("export");

    // 160 + 20 + 4 + 196 + 4 (pointer table) = 384, then the animation
    // header (64) and three keyframes (60)
    assert_eq!(buffer.len(), 508);

    let header = 384;
    // Rotation channels first in the header: rot z holds one keyframe
    assert_eq!(read_u32_at(&buffer, header), 0, "rot x count");
    assert_eq!(read_u32_at(&buffer, header + 16), 1, "rot z count");
    assert_eq!(read_u32_at(&buffer, header + 20), 488, "rot z offset");
    // Position channels after: pos y holds two keyframes starting at 448
    assert_eq!(read_u32_at(&buffer, header + 32), 2, "pos y count");
    assert_eq!(read_u32_at(&buffer, header + 36), 448, "pos y offset");

    // PlayOnce loop flag in the collision header
    assert_eq!(read_u16_at(&buffer, 184 + 18), 0x0001);
    // Animation header offset in the collision header
    assert_eq!(read_u32_at(&buffer, 184 + 20), 384);

    // First pos y keyframe: linear easing, t=0, value 0
    assert_eq!(read_u32_at(&buffer, 448), 0);
    assert!((read_f32_at(&buffer, 452) - 0.0).abs() < 1e-6);
    // Second keyframe: smooth easing, t=4, value 2
    assert_eq!(read_u32_at(&buffer, 468), 1);
    assert!((read_f32_at(&buffer, 472) - 4.0).abs() < 1e-6);
    assert!((read_f32_at(&buffer, 476) - 2.0).abs() < 1e-6);
    // Rotation keyframes convert radians to degrees on the wire
    assert!((read_f32_at(&buffer, 488 + 8) - 180.0).abs() < 1e-3);
}

#[test]
fn v1_reflective_models_reference_the_name_table() {
    let mut models = ModelTable::new();
    models.insert("tri", single_triangle_mesh());

    let group = group_node(
        "group",
        (1, 1),
        vec![
            SceneNode::new(
                "shiny",
                NodeKind::Mesh(MeshData {
                    mesh_name: "mirror".into(),
                    runtime_reflective: true,
                }),
            ),
            SceneNode::new(
                "matte",
                NodeKind::Mesh(MeshData {
                    mesh_name: "stone".into(),
                    runtime_reflective: false,
                }),
            ),
        ],
    );
    let mut root = SceneNode::new("root", NodeKind::Empty);
    root.children = vec![SceneNode::new("start", NodeKind::Start), group];
    let stage = Stage::new(root, 0.0);

    let buffer = export(&stage, &models, FormatVersion::One, None).expect("export");

    // 160 + 20 + 4 + 196 + 4 = 384; two model records (24), two names
    // ("mirror" -> 8, "stone" -> 8), then one reflective entry (8)
    let names = 384 + 24;
    let reflective = names + 16;
    assert_eq!(buffer.len(), reflective + 8);

    // Header: one reflective model, list head at the reflective section
    assert_eq!(read_u32_at(&buffer, 128), 1);
    assert_eq!(read_u32_at(&buffer, 132), reflective as u32);

    // The reflective entry points back at "mirror" in the name table
    assert_eq!(read_u32_at(&buffer, reflective), names as u32);
    assert_eq!(&buffer[names..names + 6], b"mirror");
}

#[test]
fn v1_and_v2_share_grid_contents() {
    let (stage, models) = single_triangle_stage();
    let v1 = export(&stage, &models, FormatVersion::One, None).expect("export");
    let v2 = export(&stage, &models, FormatVersion::Two, None).expect("export");

    // Same index list bytes at each generation's own address
    assert_eq!(&v1[448..452], &v2[3476..3480]);
    // Different headers
    assert_ne!(read_u32_at(&v1, 4), read_u32_at(&v2, 4));
}
