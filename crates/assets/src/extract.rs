//! Attachment points and collision geometry, found by walking the node
//! forest with accumulated transforms.

use crate::AssetError;
use crate::collision::CollisionShape;
use crate::graph::visit_depth_first;
use crate::ir::{ATTACHMENT_PREFIX, Asset};
use glam::Mat4;

#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPoint {
    /// Node name without the `Attachment` prefix.
    pub name: String,
    pub local_transform: Mat4,
    /// Ancestors × local.
    pub model_transform: Mat4,
}

pub fn attachment_points(asset: &Asset) -> Vec<AttachmentPoint> {
    let mut points = Vec::new();
    visit_depth_first(&asset.nodes, |node, model| {
        if let Some(name) = node.name.strip_prefix(ATTACHMENT_PREFIX) {
            points.push(AttachmentPoint {
                name: name.to_string(),
                local_transform: node.local,
                model_transform: model,
            });
        }
    });
    points
}

/// Gather the model's collision hull. Every collision node with a mesh
/// contributes one hull built from all of its primitives' positions; more
/// than one hull is rejected.
pub fn collision_shape(asset: &Asset) -> Result<Option<CollisionShape>, AssetError> {
    let mut hulls = Vec::new();
    visit_depth_first(&asset.nodes, |node, model| {
        if !node.is_collision {
            return;
        }
        let Some(mesh) = node.mesh.and_then(|m| asset.meshes.get(m)) else {
            return;
        };
        let mut points = Vec::new();
        for primitive in &mesh.primitives {
            if primitive.positions.is_empty() {
                tracing::error!(node = %node.name, "collision primitive has no positions");
                continue;
            }
            points.extend(primitive.positions.iter().map(|&p| model.transform_point3(p)));
        }
        hulls.push(CollisionShape::ConvexHull { points });
    });

    match hulls.len() {
        0 => Ok(None),
        1 => Ok(hulls.pop()),
        n => Err(AssetError::MultipleCollisionHulls(n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{AssetBuilder, NodeSpec};
    use crate::reader::{ModelFormat, read};
    use glam::{Quat, Vec3};

    #[test]
    fn attachment_transform_is_ancestor_product() {
        let mut b = AssetBuilder::new();
        let muzzle = b.add_node(NodeSpec {
            name: "AttachmentMuzzle".into(),
            translation: Some(Vec3::new(0.0, 0.0, 2.0)),
            ..Default::default()
        });
        let turret = b.add_node(NodeSpec {
            name: "Turret".into(),
            children: vec![muzzle],
            rotation: Some(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
            ..Default::default()
        });
        b.add_node(NodeSpec {
            name: "Hull".into(),
            children: vec![turret],
            translation: Some(Vec3::new(5.0, 0.0, 0.0)),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();

        let points = attachment_points(&asset);
        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.name, "Muzzle");
        assert_eq!(point.local_transform, asset.nodes[muzzle].local);
        let expected =
            asset.nodes[2].local * asset.nodes[turret].local * asset.nodes[muzzle].local;
        assert!(point.model_transform.abs_diff_eq(expected, 1e-5));
        let origin = point.model_transform.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(7.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn bare_prefix_gives_empty_name() {
        let mut b = AssetBuilder::new();
        b.add_node(NodeSpec {
            name: "Attachment".into(),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        assert_eq!(attachment_points(&asset)[0].name, "");
    }

    #[test]
    fn collision_hull_uses_all_positions_in_model_space() {
        let mut b = AssetBuilder::new();
        let mesh = b.add_triangle_mesh(None);
        b.add_node(NodeSpec {
            name: "CollisionHull".into(),
            mesh: Some(mesh),
            translation: Some(Vec3::new(0.0, 10.0, 0.0)),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        let shape = collision_shape(&asset).unwrap().unwrap();
        assert_eq!(shape.point_count(), 3);
        let (lo, _) = shape.bounds().unwrap();
        assert_eq!(lo.y, 10.0);
    }

    #[test]
    fn no_collision_nodes_gives_none() {
        let mut b = AssetBuilder::new();
        let mesh = b.add_triangle_mesh(None);
        b.add_node(NodeSpec {
            name: "Body".into(),
            mesh: Some(mesh),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        assert_eq!(collision_shape(&asset).unwrap(), None);
    }

    #[test]
    fn two_hulls_fail() {
        let mut b = AssetBuilder::new();
        let mesh = b.add_triangle_mesh(None);
        for name in ["CollisionA", "CollisionB"] {
            b.add_node(NodeSpec {
                name: name.into(),
                mesh: Some(mesh),
                ..Default::default()
            });
        }
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        assert!(matches!(
            collision_shape(&asset),
            Err(AssetError::MultipleCollisionHulls(2))
        ));
    }
}
