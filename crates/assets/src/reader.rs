//! glTF 2.0 reader (`.glb` and `.gltf`) producing the [`Asset`] IR.

use crate::AssetError;
use crate::graph;
use crate::ir::{
    Accessor, Asset, BufferView, ImageDef, ImageSource, MaterialDef, MaterialExtras, Mesh, Node,
    Primitive,
};
use base64::Engine;
use glam::{Mat4, Quat, Vec3};
use gltf::Semantic;

const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Container variant, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Binary,
    Json,
}

impl ModelFormat {
    pub fn from_path(path: &str) -> Result<Self, AssetError> {
        match hearth_common::resource_extension(path).as_deref() {
            Some("glb") => Ok(ModelFormat::Binary),
            Some("gltf") => Ok(ModelFormat::Json),
            other => Err(AssetError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }
}

/// Parse a model file, taking the format from its path.
pub fn read_path(path: &str, bytes: &[u8]) -> Result<Asset, AssetError> {
    read(bytes, ModelFormat::from_path(path)?)
}

pub fn read(bytes: &[u8], format: ModelFormat) -> Result<Asset, AssetError> {
    let is_glb = bytes.starts_with(GLB_MAGIC);
    match format {
        ModelFormat::Binary if !is_glb => {
            return Err(AssetError::Parse("missing glTF binary header".into()));
        }
        ModelFormat::Json if is_glb => {
            return Err(AssetError::Parse("binary container in a .gltf file".into()));
        }
        _ => {}
    }

    let gltf = gltf::Gltf::from_slice(bytes).map_err(|e| AssetError::Parse(e.to_string()))?;
    let buffers = load_buffers(&gltf.document, gltf.blob.as_deref())?;

    let views = gltf
        .document
        .views()
        .map(|view| BufferView {
            buffer: view.buffer().index(),
            offset: view.offset(),
            length: view.length(),
            stride: view.stride(),
            target: view.target(),
        })
        .collect();

    let accessors = gltf
        .document
        .accessors()
        .map(|accessor| Accessor {
            view: accessor.view().map(|v| v.index()),
            offset: accessor.offset(),
            count: accessor.count(),
            component: accessor.data_type(),
            dimensions: accessor.dimensions(),
            normalized: accessor.normalized(),
        })
        .collect();

    let meshes = gltf
        .document
        .meshes()
        .map(|mesh| Mesh {
            name: mesh.name().map(str::to_string),
            primitives: mesh
                .primitives()
                .map(|primitive| {
                    let reader = primitive.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
                    Primitive {
                        attributes: primitive
                            .attributes()
                            .map(|(semantic, accessor)| {
                                (semantic_name(&semantic), accessor.index())
                            })
                            .collect(),
                        indices: primitive.indices().map(|a| a.index()),
                        material: primitive.material().index(),
                        mode: primitive.mode(),
                        positions: reader
                            .read_positions()
                            .map(|it| it.map(Vec3::from_array).collect())
                            .unwrap_or_default(),
                    }
                })
                .collect(),
        })
        .collect();

    let materials = gltf.document.materials().map(read_material).collect();

    let textures = gltf
        .document
        .textures()
        .map(|texture| texture.source().index())
        .collect();

    let images = gltf
        .document
        .images()
        .map(|image| ImageDef {
            name: image.name().map(str::to_string),
            source: match image.source() {
                gltf::image::Source::View { view, mime_type } => ImageSource::View {
                    view: view.index(),
                    mime_type: mime_type.to_string(),
                },
                gltf::image::Source::Uri { uri, .. } => ImageSource::Uri(uri.to_string()),
            },
        })
        .collect();

    let mut nodes: Vec<Node> = gltf
        .document
        .nodes()
        .map(|node| {
            let mut out = Node::new(
                node.index(),
                node.name().unwrap_or_default(),
                local_transform(node.transform()),
            );
            out.children = node.children().map(|c| c.index()).collect();
            out.mesh = node.mesh().map(|m| m.index());
            out
        })
        .collect();
    graph::link(&mut nodes)?;

    let asset = Asset {
        nodes,
        meshes,
        materials,
        textures,
        images,
        buffers,
        views,
        accessors,
    };
    tracing::debug!(
        nodes = asset.nodes.len(),
        meshes = asset.meshes.len(),
        materials = asset.materials.len(),
        images = asset.images.len(),
        "parsed glTF asset"
    );
    Ok(asset)
}

/// Explicit matrices are used verbatim; otherwise T × R × S.
fn local_transform(transform: gltf::scene::Transform) -> Mat4 {
    match transform {
        gltf::scene::Transform::Matrix { matrix } => Mat4::from_cols_array_2d(&matrix),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => Mat4::from_scale_rotation_translation(
            Vec3::from_array(scale),
            // glTF stores xyzw, which is glam's order.
            Quat::from_array(rotation),
            Vec3::from_array(translation),
        ),
    }
}

pub fn semantic_name(semantic: &Semantic) -> String {
    match semantic {
        Semantic::Positions => "POSITION".into(),
        Semantic::Normals => "NORMAL".into(),
        Semantic::Tangents => "TANGENT".into(),
        Semantic::Colors(n) => format!("COLOR_{n}"),
        Semantic::TexCoords(n) => format!("TEXCOORD_{n}"),
        Semantic::Joints(n) => format!("JOINTS_{n}"),
        Semantic::Weights(n) => format!("WEIGHTS_{n}"),
        #[allow(unreachable_patterns)]
        other => format!("{other:?}"),
    }
}

fn read_material(material: gltf::Material<'_>) -> MaterialDef {
    let pbr = material.pbr_metallic_roughness();
    let extras = match material.extras() {
        Some(raw) => serde_json::from_str::<MaterialExtras>(raw.get()).unwrap_or_else(|e| {
            tracing::error!(
                material = material.name().unwrap_or_default(),
                error = %e,
                "ignoring malformed material extras"
            );
            MaterialExtras::default()
        }),
        None => MaterialExtras::default(),
    };
    MaterialDef {
        name: material.name().map(str::to_string),
        base_color_factor: pbr.base_color_factor(),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        emissive_factor: material.emissive_factor(),
        base_color_texture: pbr.base_color_texture().map(|i| i.texture().index()),
        metallic_roughness_texture: pbr.metallic_roughness_texture().map(|i| i.texture().index()),
        normal_texture: material.normal_texture().map(|t| t.texture().index()),
        occlusion_texture: material.occlusion_texture().map(|t| t.texture().index()),
        emissive_texture: material.emissive_texture().map(|i| i.texture().index()),
        alpha_mode: material.alpha_mode(),
        extras,
    }
}

fn load_buffers(document: &gltf::Document, blob: Option<&[u8]>) -> Result<Vec<Vec<u8>>, AssetError> {
    document
        .buffers()
        .map(|buffer| {
            let mut data = match buffer.source() {
                gltf::buffer::Source::Bin => blob
                    .ok_or_else(|| AssetError::Parse("buffer refers to a missing binary chunk".into()))?
                    .to_vec(),
                gltf::buffer::Source::Uri(uri) => decode_data_uri(uri)?,
            };
            if data.len() < buffer.length() {
                return Err(AssetError::Parse(format!(
                    "buffer {} holds {} bytes, {} declared",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                )));
            }
            data.truncate(buffer.length());
            Ok(data)
        })
        .collect()
}

fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Err(AssetError::Parse(format!("external buffer uri not supported: {uri}")));
    };
    let Some((_, payload)) = rest.split_once(";base64,") else {
        return Err(AssetError::Parse("data uri is not base64".into()));
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| AssetError::Parse(format!("invalid base64 buffer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{AssetBuilder, NodeSpec};
    use crate::ir::Mode;

    fn two_node_builder() -> AssetBuilder {
        let mut b = AssetBuilder::new();
        let mesh = b.add_triangle_mesh(None);
        let child = b.add_node(NodeSpec {
            name: "child".into(),
            mesh: Some(mesh),
            translation: Some(Vec3::new(0.0, 1.0, 0.0)),
            ..Default::default()
        });
        b.add_node(NodeSpec {
            name: "root".into(),
            children: vec![child],
            translation: Some(Vec3::new(2.0, 0.0, 0.0)),
            ..Default::default()
        });
        b
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ModelFormat::from_path("/m/a.GLB").unwrap(), ModelFormat::Binary);
        assert_eq!(ModelFormat::from_path("/m/a.gltf").unwrap(), ModelFormat::Json);
        assert!(matches!(
            ModelFormat::from_path("/m/a.obj"),
            Err(AssetError::UnsupportedFormat(ext)) if ext == "obj"
        ));
    }

    #[test]
    fn reads_glb_and_json_alike() {
        let b = two_node_builder();
        let from_glb = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        let from_json = read(&b.to_gltf_json(), ModelFormat::Json).unwrap();
        assert_eq!(from_glb.nodes, from_json.nodes);
        assert_eq!(from_glb.buffers, from_json.buffers);
        assert_eq!(from_glb.meshes[0].primitives[0].mode, Mode::Triangles);
    }

    #[test]
    fn roots_and_transforms() {
        let asset = read(&two_node_builder().to_glb(), ModelFormat::Binary).unwrap();
        let roots: Vec<&str> = asset.roots().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, vec!["root"]);
        let child = &asset.nodes[0];
        assert!(!child.is_root);
        assert_eq!(child.local, Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn decomposed_transform_is_trs() {
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mut b = AssetBuilder::new();
        b.add_node(NodeSpec {
            name: "n".into(),
            translation: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: Some(rotation),
            scale: Some(Vec3::splat(2.0)),
            ..Default::default()
        });
        let asset = read(&b.to_gltf_json(), ModelFormat::Json).unwrap();
        let expected = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_quat(rotation)
            * Mat4::from_scale(Vec3::splat(2.0));
        assert!(asset.nodes[0].local.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn explicit_matrix_is_verbatim() {
        let matrix = Mat4::from_cols_array(&[
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 5.0, 6.0, 7.0, 1.0,
        ]);
        let mut b = AssetBuilder::new();
        b.add_node(NodeSpec {
            name: "m".into(),
            matrix: Some(matrix),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        assert_eq!(asset.nodes[0].local, matrix);
    }

    #[test]
    fn header_mismatch_is_parse_error() {
        let b = two_node_builder();
        assert!(matches!(
            read(&b.to_gltf_json(), ModelFormat::Binary),
            Err(AssetError::Parse(_))
        ));
        assert!(matches!(
            read(&b.to_glb(), ModelFormat::Json),
            Err(AssetError::Parse(_))
        ));
        assert!(matches!(
            read(b"not a model", ModelFormat::Json),
            Err(AssetError::Parse(_))
        ));
    }

    #[test]
    fn positions_come_from_the_mesh_reader() {
        let asset = read(&two_node_builder().to_glb(), ModelFormat::Binary).unwrap();
        let primitive = &asset.meshes[0].primitives[0];
        assert_eq!(primitive.positions.len(), 3);
        let accessor = primitive.attribute("POSITION").unwrap();
        assert_eq!(asset.accessors[accessor].count, primitive.positions.len());
    }

    fn le_floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Single-node `.gltf` whose one primitive takes POSITION from accessor 0.
    fn positions_document(
        blob: &[u8],
        views: serde_json::Value,
        accessor: serde_json::Value,
    ) -> Vec<u8> {
        let payload = base64::engine::general_purpose::STANDARD.encode(blob);
        serde_json::json!({
            "asset": {"version": "2.0"},
            "buffers": [{
                "byteLength": blob.len(),
                "uri": format!("data:application/octet-stream;base64,{payload}")
            }],
            "bufferViews": views,
            "accessors": [accessor],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "nodes": [{"name": "n", "mesh": 0}]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn strided_positions_skip_interleaved_bytes() {
        let mut blob = Vec::new();
        for v in [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]] {
            blob.extend(le_floats(&v));
            blob.extend_from_slice(&[0xff; 4]);
        }
        let views = serde_json::json!([
            {"buffer": 0, "byteLength": blob.len(), "byteStride": 16, "target": 34962}
        ]);
        let accessor = serde_json::json!({
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [1.0, 2.0, 3.0], "max": [7.0, 8.0, 9.0]
        });
        let asset = read(&positions_document(&blob, views, accessor), ModelFormat::Json).unwrap();
        assert_eq!(
            asset.meshes[0].primitives[0].positions,
            vec![
                Vec3::new(1.0, 2.0, 3.0),
                Vec3::new(4.0, 5.0, 6.0),
                Vec3::new(7.0, 8.0, 9.0)
            ]
        );
    }

    #[test]
    fn sparse_positions_override_base_values() {
        let mut blob = le_floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        blob.extend_from_slice(&1u16.to_le_bytes());
        blob.extend_from_slice(&[0; 2]);
        blob.extend(le_floats(&[5.0, 5.0, 5.0]));
        let views = serde_json::json!([
            {"buffer": 0, "byteOffset": 0, "byteLength": 36},
            {"buffer": 0, "byteOffset": 36, "byteLength": 2},
            {"buffer": 0, "byteOffset": 40, "byteLength": 12}
        ]);
        let accessor = serde_json::json!({
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [5.0, 5.0, 5.0],
            "sparse": {
                "count": 1,
                "indices": {"bufferView": 1, "componentType": 5123},
                "values": {"bufferView": 2}
            }
        });
        let asset = read(&positions_document(&blob, views, accessor), ModelFormat::Json).unwrap();
        assert_eq!(
            asset.meshes[0].primitives[0].positions,
            vec![Vec3::ZERO, Vec3::splat(5.0), Vec3::Y]
        );
    }

    #[test]
    fn semantic_names() {
        assert_eq!(semantic_name(&Semantic::Positions), "POSITION");
        assert_eq!(semantic_name(&Semantic::TexCoords(1)), "TEXCOORD_1");
        assert_eq!(semantic_name(&Semantic::Colors(0)), "COLOR_0");
    }

    #[test]
    fn external_buffer_uri_is_rejected() {
        assert!(matches!(
            decode_data_uri("mesh.bin"),
            Err(AssetError::Parse(msg)) if msg.contains("external")
        ));
        assert_eq!(
            decode_data_uri("data:application/octet-stream;base64,AQID").unwrap(),
            vec![1, 2, 3]
        );
    }
}
