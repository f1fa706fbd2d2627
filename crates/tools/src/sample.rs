//! A small built-in model for smoke-testing a data directory: a hull cube
//! with a turret cube on top, a muzzle attachment point and a collision
//! hull.

use glam::{Quat, Vec3};
use hearth_assets::builder::{AssetBuilder, MaterialSpec, NodeSpec, PrimitiveSpec};
use hearth_assets::ir::Dimensions;

pub const SAMPLE_MODEL_PATH: &str = "/models/sample.glb";
/// Shader the sample's material renders with.
pub const SAMPLE_SHADER_PATH: &str = "/shaders/sample.wgsl";

/// Unit cube centred on the origin: 24 vertices with flat normals, 36 indices.
fn cube_geometry() -> (Vec<[f32; 3]>, Vec<f32>, Vec<u16>) {
    let faces = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(72);
    let mut indices = Vec::with_capacity(36);
    for normal in faces {
        let rotation = Quat::from_rotation_arc(Vec3::Z, normal);
        let base = positions.len() as u16;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let p = rotation * Vec3::new(u, v, 0.5);
            positions.push(p.to_array());
            normals.extend_from_slice(&normal.to_array());
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (positions, normals, indices)
}

pub fn sample_model() -> Vec<u8> {
    let mut b = AssetBuilder::new();
    let material = b.add_material(MaterialSpec {
        name: Some("sample".into()),
        ..Default::default()
    });

    let (positions, normals, indices) = cube_geometry();
    let position_accessor = b.add_positions(&positions);
    let normal_accessor = b.add_float_accessor(&normals, Dimensions::Vec3);
    let index_accessor = b.add_indices_u16(&indices);
    let cube = b.add_mesh(vec![PrimitiveSpec {
        attributes: vec![
            ("POSITION".into(), position_accessor),
            ("NORMAL".into(), normal_accessor),
        ],
        indices: Some(index_accessor),
        material: Some(material),
        mode: None,
    }]);
    let hull_mesh = b.add_mesh(vec![PrimitiveSpec {
        attributes: vec![("POSITION".into(), position_accessor)],
        indices: None,
        material: None,
        mode: None,
    }]);

    let muzzle = b.add_node(NodeSpec {
        name: "AttachmentMuzzle".into(),
        translation: Some(Vec3::new(0.0, 0.0, 1.0)),
        ..Default::default()
    });
    let turret = b.add_node(NodeSpec {
        name: "Turret".into(),
        mesh: Some(cube),
        children: vec![muzzle],
        translation: Some(Vec3::new(0.0, 0.75, 0.0)),
        scale: Some(Vec3::splat(0.5)),
        ..Default::default()
    });
    let body = b.add_node(NodeSpec {
        name: "Body".into(),
        mesh: Some(cube),
        scale: Some(Vec3::new(2.0, 1.0, 3.0)),
        ..Default::default()
    });
    let collision = b.add_node(NodeSpec {
        name: "CollisionHull".into(),
        mesh: Some(hull_mesh),
        scale: Some(Vec3::new(2.0, 1.0, 3.0)),
        ..Default::default()
    });
    b.add_node(NodeSpec {
        name: "Sample".into(),
        children: vec![body, turret, collision],
        ..Default::default()
    });
    let glb = b.to_glb();
    tracing::debug!(bytes = glb.len(), "built sample model");
    glb
}
