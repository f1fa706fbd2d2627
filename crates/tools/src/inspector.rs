use hearth_assets::Asset;
use hearth_common::ResourceState;
use hearth_resources::{ModelResource, ResourceId, ResourceSystem};
use std::fmt;

/// Model inspector for developer tooling.
///
/// Summarizes what a model resource parsed and built: node tree,
/// attachment points, materials, GPU object counts and collision hull.
pub struct ModelInspector;

impl ModelInspector {
    pub fn summary(model: &ModelResource) -> ModelSummary {
        let asset = model.asset();
        ModelSummary {
            path: model.path().to_string(),
            state: model.state(),
            error: model.failure().map(ToString::to_string),
            nodes: asset.map(node_tree).unwrap_or_default(),
            attachments: model
                .attachment_points()
                .iter()
                .map(|p| {
                    let t = p.model_transform.w_axis;
                    (p.name.clone(), [t.x, t.y, t.z])
                })
                .collect(),
            materials: model
                .materials()
                .iter()
                .map(|m| MaterialInfo {
                    name: m.name.clone(),
                    shader_path: m.shader_path.clone(),
                    blend: format!("{:?}", m.blend_mode).to_lowercase(),
                    textures: m.texture_slots().iter().flatten().count(),
                    parameters: m.parameters().iter().map(|p| p.name.clone()).collect(),
                })
                .collect(),
            primitives: asset
                .map(|a| a.meshes.iter().map(|m| m.primitives.len()).sum())
                .unwrap_or(0),
            pipelines: model.pipeline_count(),
            textures: model.texture_count(),
            collision_points: model.collision_shape().map(|s| s.point_count()),
        }
    }
}

/// Pre-order node listing with depth.
fn node_tree(asset: &Asset) -> Vec<NodeInfo> {
    fn walk(asset: &Asset, index: usize, depth: usize, out: &mut Vec<NodeInfo>) {
        let Some(node) = asset.nodes.get(index) else {
            return;
        };
        out.push(NodeInfo {
            depth,
            name: node.name.clone(),
            mesh: node.mesh,
            collision: node.is_collision,
        });
        for &child in &node.children {
            walk(asset, child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for root in asset.roots() {
        walk(asset, root.index, 0, &mut out);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub depth: usize,
    pub name: String,
    pub mesh: Option<usize>,
    pub collision: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialInfo {
    pub name: String,
    pub shader_path: String,
    pub blend: String,
    pub textures: usize,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub path: String,
    pub state: ResourceState,
    pub error: Option<String>,
    pub nodes: Vec<NodeInfo>,
    /// Name and model-space origin.
    pub attachments: Vec<(String, [f32; 3])>,
    pub materials: Vec<MaterialInfo>,
    pub primitives: usize,
    pub pipelines: usize,
    pub textures: usize,
    pub collision_points: Option<usize>,
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model {} [{}]", self.path, self.state)?;
        if let Some(error) = &self.error {
            writeln!(f, "  error: {error}")?;
        }
        writeln!(f, "  nodes:")?;
        for node in &self.nodes {
            write!(f, "    {}{}", "  ".repeat(node.depth), node.name)?;
            if let Some(mesh) = node.mesh {
                write!(f, " mesh={mesh}")?;
            }
            if node.collision {
                write!(f, " (collision)")?;
            }
            writeln!(f)?;
        }
        for (name, [x, y, z]) in &self.attachments {
            writeln!(f, "  attachment {name} at ({x:.2}, {y:.2}, {z:.2})")?;
        }
        for m in &self.materials {
            writeln!(
                f,
                "  material {} shader={} blend={} textures={} params=[{}]",
                m.name,
                m.shader_path,
                m.blend,
                m.textures,
                m.parameters.join(", ")
            )?;
        }
        write!(
            f,
            "  primitives={} pipelines={} textures={}",
            self.primitives, self.pipelines, self.textures
        )?;
        match self.collision_points {
            Some(n) => write!(f, " collision_points={n}"),
            None => write!(f, " collision=none"),
        }
    }
}

/// Lists every resource the system knows about.
pub struct ResourceInspector;

impl ResourceInspector {
    pub fn lines(system: &ResourceSystem) -> Vec<ResourceLine> {
        system
            .paths()
            .map(|(path, id)| ResourceLine {
                id,
                path: path.to_string(),
                state: system.state(id),
                failure: system.resource(id).and_then(|r| r.failure()),
            })
            .collect()
    }

    pub fn failures(system: &ResourceSystem) -> Vec<ResourceLine> {
        Self::lines(system)
            .into_iter()
            .filter(|l| l.state == ResourceState::Error)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceLine {
    pub id: ResourceId,
    pub path: String,
    pub state: ResourceState,
    pub failure: Option<String>,
}

impl fmt::Display for ResourceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<8} {}", self.state, self.path)?;
        if let Some(reason) = &self.failure {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use hearth_assets::builder::{AssetBuilder, MaterialSpec, NodeSpec};
    use hearth_render::{GlobalUniformsBinding, RecordingDevice, RenderContext, RenderSettings};
    use hearth_vfs::MemoryFileSystem;

    fn load(fs: &MemoryFileSystem, path: &str) -> (ResourceSystem, ResourceId) {
        let mut device = RecordingDevice::new();
        let globals = GlobalUniformsBinding::create(&mut device);
        let ctx = RenderContext::new(
            &globals,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &RenderSettings::default(),
        );
        let mut system = ResourceSystem::default();
        let id = system.request(path).unwrap();
        let _ = system.update(&mut device, &ctx, fs);
        (system, id)
    }

    fn turret_glb() -> Vec<u8> {
        let mut b = AssetBuilder::new();
        let material = b.add_material(MaterialSpec {
            name: Some("turret".into()),
            ..Default::default()
        });
        let mesh = b.add_triangle_mesh(Some(material));
        let hull_mesh = b.add_triangle_mesh(None);
        let barrel = b.add_node(NodeSpec {
            name: "Barrel".into(),
            mesh: Some(mesh),
            ..Default::default()
        });
        let muzzle = b.add_node(NodeSpec {
            name: "AttachmentMuzzle".into(),
            translation: Some(Vec3::new(0.0, 0.5, 2.0)),
            ..Default::default()
        });
        let hull = b.add_node(NodeSpec {
            name: "CollisionHull".into(),
            mesh: Some(hull_mesh),
            ..Default::default()
        });
        b.add_node(NodeSpec {
            name: "Turret".into(),
            children: vec![barrel, muzzle, hull],
            ..Default::default()
        });
        b.to_glb()
    }

    #[test]
    fn summary_of_loaded_model() {
        let fs = MemoryFileSystem::new()
            .with_file("/models/turret.glb", turret_glb())
            .with_file("/shaders/turret.wgsl", "fn f() {}");
        let (system, id) = load(&fs, "/models/turret.glb");
        let summary = ModelInspector::summary(system.model(id).unwrap());

        assert_eq!(summary.state, ResourceState::Loaded);
        let names: Vec<(usize, &str)> = summary
            .nodes
            .iter()
            .map(|n| (n.depth, n.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                (0, "Turret"),
                (1, "Barrel"),
                (1, "AttachmentMuzzle"),
                (1, "CollisionHull")
            ]
        );
        assert_eq!(summary.attachments, vec![("Muzzle".to_string(), [0.0, 0.5, 2.0])]);
        assert_eq!(summary.materials.len(), 1);
        assert_eq!(summary.materials[0].shader_path, "/shaders/turret.wgsl");
        assert_eq!(summary.primitives, 2);
        assert_eq!(summary.pipelines, 1);
        assert_eq!(summary.collision_points, Some(3));

        let text = summary.to_string();
        assert!(text.starts_with("Model /models/turret.glb [loaded]"));
        assert!(text.contains("      Barrel mesh=0"));
        assert!(text.contains("CollisionHull mesh=1 (collision)"));
        assert!(text.contains("attachment Muzzle at (0.00, 0.50, 2.00)"));
    }

    #[test]
    fn summary_of_failed_model() {
        let fs = MemoryFileSystem::new().with_file("/models/bad.glb", b"glTF but not really".to_vec());
        let (system, id) = load(&fs, "/models/bad.glb");
        let summary = ModelInspector::summary(system.model(id).unwrap());
        assert_eq!(summary.state, ResourceState::Error);
        assert!(summary.error.is_some());
        assert!(summary.nodes.is_empty());
        assert!(summary.to_string().contains("collision=none"));
    }

    #[test]
    fn resource_lines_report_failures() {
        let fs = MemoryFileSystem::new().with_file("/models/turret.glb", turret_glb());
        let (system, _) = load(&fs, "/models/turret.glb");
        let lines = ResourceInspector::lines(&system);
        assert_eq!(lines.len(), 2);
        let failures = ResourceInspector::failures(&system);
        let paths: Vec<&str> = failures.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, vec!["/models/turret.glb", "/shaders/turret.wgsl"]);
        assert!(failures[1].to_string().starts_with("error    /shaders/turret.wgsl"));
    }
}
