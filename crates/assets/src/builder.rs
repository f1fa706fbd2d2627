//! Programmatic glTF writer. Produces small but valid `.glb` / `.gltf`
//! files for tools (the CLI's sample model) and tests.

use crate::ir::{Dimensions, Target};
use base64::Engine;
use glam::{Mat4, Quat, Vec3};
use serde_json::{Map, Value, json};

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub name: String,
    pub mesh: Option<usize>,
    pub children: Vec<usize>,
    pub translation: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    /// Exclusive with the TRS channels.
    pub matrix: Option<Mat4>,
}

#[derive(Debug, Clone, Default)]
pub struct PrimitiveSpec {
    pub attributes: Vec<(String, usize)>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    /// glTF mode number; triangles when unset.
    pub mode: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct MaterialSpec {
    pub name: Option<String>,
    pub base_color_texture: Option<usize>,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
    pub alpha_blend: bool,
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
    meshes: Vec<Value>,
    materials: Vec<Value>,
    images: Vec<Value>,
    textures: Vec<Value>,
    nodes: Vec<NodeSpec>,
}

impl AssetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes as a buffer view. Views start 4-byte aligned.
    pub fn add_view(&mut self, bytes: &[u8], target: Option<Target>, stride: Option<usize>) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(match target {
                Target::ArrayBuffer => 34962,
                Target::ElementArrayBuffer => 34963,
            });
        }
        if let Some(stride) = stride {
            view["byteStride"] = json!(stride);
        }
        self.bin.extend_from_slice(bytes);
        self.views.push(view);
        self.views.len() - 1
    }

    /// Tightly packed float accessor on its own vertex view, with min/max.
    pub fn add_float_accessor(&mut self, data: &[f32], dimensions: Dimensions) -> usize {
        let width = dimensions.multiplicity();
        let bytes: Vec<u8> = data.iter().flat_map(|f| f.to_le_bytes()).collect();
        let view = self.add_view(&bytes, Some(Target::ArrayBuffer), None);
        let mut min = vec![f32::MAX; width];
        let mut max = vec![f32::MIN; width];
        for element in data.chunks(width) {
            for (k, v) in element.iter().enumerate() {
                min[k] = min[k].min(*v);
                max[k] = max[k].max(*v);
            }
        }
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": data.len() / width,
            "type": type_name(dimensions),
            "min": min,
            "max": max,
        }));
        self.accessors.len() - 1
    }

    pub fn add_positions(&mut self, positions: &[[f32; 3]]) -> usize {
        self.add_float_accessor(positions.as_flattened(), Dimensions::Vec3)
    }

    pub fn add_indices_u16(&mut self, indices: &[u16]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        self.add_index_accessor(&bytes, indices.len(), UNSIGNED_SHORT)
    }

    pub fn add_indices_u32(&mut self, indices: &[u32]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        self.add_index_accessor(&bytes, indices.len(), UNSIGNED_INT)
    }

    fn add_index_accessor(&mut self, bytes: &[u8], count: usize, component: u32) -> usize {
        let view = self.add_view(bytes, Some(Target::ElementArrayBuffer), None);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": component,
            "count": count,
            "type": "SCALAR",
        }));
        self.accessors.len() - 1
    }

    /// Embed an encoded image; returns the texture index.
    pub fn add_image(&mut self, name: &str, mime_type: &str, bytes: &[u8]) -> usize {
        let view = self.add_view(bytes, None, None);
        self.images.push(json!({
            "name": name,
            "bufferView": view,
            "mimeType": mime_type,
        }));
        self.push_texture()
    }

    /// Reference an external image; returns the texture index.
    pub fn add_uri_image(&mut self, uri: &str) -> usize {
        self.images.push(json!({ "uri": uri }));
        self.push_texture()
    }

    fn push_texture(&mut self) -> usize {
        self.textures.push(json!({ "source": self.images.len() - 1 }));
        self.textures.len() - 1
    }

    pub fn add_material(&mut self, spec: MaterialSpec) -> usize {
        let texture = |index: Option<usize>| index.map(|i| json!({ "index": i }));
        let mut pbr = Map::new();
        if let Some(t) = texture(spec.base_color_texture) {
            pbr.insert("baseColorTexture".into(), t);
        }
        if let Some(t) = texture(spec.metallic_roughness_texture) {
            pbr.insert("metallicRoughnessTexture".into(), t);
        }
        let mut material = Map::new();
        if let Some(name) = spec.name {
            material.insert("name".into(), json!(name));
        }
        material.insert("pbrMetallicRoughness".into(), Value::Object(pbr));
        for (key, index) in [
            ("normalTexture", spec.normal_texture),
            ("occlusionTexture", spec.occlusion_texture),
            ("emissiveTexture", spec.emissive_texture),
        ] {
            if let Some(t) = texture(index) {
                material.insert(key.into(), t);
            }
        }
        if spec.alpha_blend {
            material.insert("alphaMode".into(), json!("BLEND"));
        }
        if let Some(extras) = spec.extras {
            material.insert("extras".into(), extras);
        }
        self.materials.push(Value::Object(material));
        self.materials.len() - 1
    }

    pub fn add_mesh(&mut self, primitives: Vec<PrimitiveSpec>) -> usize {
        let primitives: Vec<Value> = primitives
            .into_iter()
            .map(|p| {
                let attributes: Map<String, Value> = p
                    .attributes
                    .into_iter()
                    .map(|(semantic, accessor)| (semantic, json!(accessor)))
                    .collect();
                let mut primitive = json!({ "attributes": attributes });
                if let Some(indices) = p.indices {
                    primitive["indices"] = json!(indices);
                }
                if let Some(material) = p.material {
                    primitive["material"] = json!(material);
                }
                if let Some(mode) = p.mode {
                    primitive["mode"] = json!(mode);
                }
                primitive
            })
            .collect();
        self.meshes.push(json!({ "primitives": primitives }));
        self.meshes.len() - 1
    }

    /// One indexed triangle in the XY plane with normals.
    pub fn add_triangle_mesh(&mut self, material: Option<usize>) -> usize {
        let positions = self.add_positions(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let normals = self.add_float_accessor(&[0.0, 0.0, 1.0].repeat(3), Dimensions::Vec3);
        let indices = self.add_indices_u16(&[0, 1, 2]);
        self.add_mesh(vec![PrimitiveSpec {
            attributes: vec![("POSITION".into(), positions), ("NORMAL".into(), normals)],
            indices: Some(indices),
            material,
            mode: None,
        }])
    }

    pub fn add_node(&mut self, spec: NodeSpec) -> usize {
        self.nodes.push(spec);
        self.nodes.len() - 1
    }

    /// `.gltf` text with the binary buffer inlined as a base64 data URI.
    pub fn to_gltf_json(&self) -> Vec<u8> {
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&self.bin)
        );
        self.document(Some(uri)).to_string().into_bytes()
    }

    /// `.glb` container with JSON and BIN chunks.
    pub fn to_glb(&self) -> Vec<u8> {
        let mut json = self.document(None).to_string().into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = self.bin.clone();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let bin_chunk = if bin.is_empty() { 0 } else { 8 + bin.len() };
        let total = 12 + 8 + json.len() + bin_chunk;
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(b"BIN\0");
            out.extend_from_slice(&bin);
        }
        out
    }

    fn document(&self, buffer_uri: Option<String>) -> Value {
        let mut has_parent = vec![false; self.nodes.len()];
        for node in &self.nodes {
            for &child in &node.children {
                if let Some(flag) = has_parent.get_mut(child) {
                    *flag = true;
                }
            }
        }
        let roots: Vec<usize> = (0..self.nodes.len()).filter(|i| !has_parent[*i]).collect();

        let mut doc = json!({
            "asset": { "version": "2.0", "generator": "hearth-assets" },
            "scene": 0,
            "scenes": [{ "nodes": roots }],
            "nodes": self.nodes.iter().map(node_json).collect::<Vec<_>>(),
        });
        if !self.bin.is_empty() {
            let mut buffer = json!({ "byteLength": self.bin.len() });
            if let Some(uri) = buffer_uri {
                buffer["uri"] = json!(uri);
            }
            doc["buffers"] = json!([buffer]);
        }
        for (key, list) in [
            ("bufferViews", &self.views),
            ("accessors", &self.accessors),
            ("meshes", &self.meshes),
            ("materials", &self.materials),
            ("images", &self.images),
            ("textures", &self.textures),
        ] {
            if !list.is_empty() {
                doc[key] = json!(list);
            }
        }
        doc
    }
}

fn node_json(spec: &NodeSpec) -> Value {
    let mut node = json!({ "name": spec.name });
    if let Some(mesh) = spec.mesh {
        node["mesh"] = json!(mesh);
    }
    if !spec.children.is_empty() {
        node["children"] = json!(spec.children);
    }
    if let Some(matrix) = spec.matrix {
        node["matrix"] = json!(matrix.to_cols_array());
    } else {
        if let Some(t) = spec.translation {
            node["translation"] = json!(t.to_array());
        }
        if let Some(r) = spec.rotation {
            node["rotation"] = json!(r.to_array());
        }
        if let Some(s) = spec.scale {
            node["scale"] = json!(s.to_array());
        }
    }
    node
}

fn type_name(dimensions: Dimensions) -> &'static str {
    match dimensions {
        Dimensions::Scalar => "SCALAR",
        Dimensions::Vec2 => "VEC2",
        Dimensions::Vec3 => "VEC3",
        Dimensions::Vec4 => "VEC4",
        Dimensions::Mat2 => "MAT2",
        Dimensions::Mat3 => "MAT3",
        Dimensions::Mat4 => "MAT4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glb_header_and_alignment() {
        let mut b = AssetBuilder::new();
        b.add_triangle_mesh(None);
        let glb = b.to_glb();
        assert_eq!(&glb[0..4], b"glTF");
        let total = u32::from_le_bytes([glb[8], glb[9], glb[10], glb[11]]) as usize;
        assert_eq!(total, glb.len());
        assert_eq!(glb.len() % 4, 0);
    }

    #[test]
    fn views_are_four_byte_aligned() {
        let mut b = AssetBuilder::new();
        b.add_indices_u16(&[0, 1, 2]);
        let second = b.add_view(&[1, 2, 3, 4], None, None);
        assert_eq!(b.views[second]["byteOffset"], json!(8));
    }

    #[test]
    fn roots_exclude_children() {
        let mut b = AssetBuilder::new();
        let child = b.add_node(NodeSpec::default());
        b.add_node(NodeSpec {
            children: vec![child],
            ..Default::default()
        });
        assert_eq!(b.document(None)["scenes"][0]["nodes"], json!([1]));
    }
}
