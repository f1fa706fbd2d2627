//! In-memory representation of a parsed glTF asset.
//!
//! Only the subset the engine consumes is kept: node transforms, mesh
//! primitives, materials, embedded images and the raw buffer/view/accessor
//! tables. Everything references other tables by index, as glTF does.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub use gltf::accessor::{DataType, Dimensions};
pub use gltf::buffer::Target;
pub use gltf::material::AlphaMode;
pub use gltf::mesh::Mode;

/// Node name prefix marking an attachment point.
pub const ATTACHMENT_PREFIX: &str = "Attachment";
/// Node name prefix marking collision geometry.
pub const COLLISION_PREFIX: &str = "Collision";

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub index: usize,
    pub name: String,
    pub local: Mat4,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    /// No other node lists this one as a child.
    pub is_root: bool,
    pub is_collision: bool,
}

impl Node {
    pub fn new(index: usize, name: impl Into<String>, local: Mat4) -> Self {
        let name = name.into();
        Self {
            index,
            is_collision: name.starts_with(COLLISION_PREFIX),
            name,
            local,
            children: Vec::new(),
            mesh: None,
            is_root: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Semantic name (`POSITION`, `TEXCOORD_0`, ...) and accessor index, in
    /// declaration order.
    pub attributes: Vec<(String, usize)>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
    pub mode: Mode,
    /// Decoded `POSITION` values; empty when the attribute is absent.
    pub positions: Vec<Vec3>,
}

impl Primitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes
            .iter()
            .find(|(name, _)| name == semantic)
            .map(|(_, accessor)| *accessor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferView {
    pub buffer: usize,
    pub offset: usize,
    pub length: usize,
    pub stride: Option<usize>,
    pub target: Option<Target>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accessor {
    /// `None` for sparse-only accessors, which are not supported.
    pub view: Option<usize>,
    pub offset: usize,
    pub count: usize,
    pub component: DataType,
    pub dimensions: Dimensions,
    pub normalized: bool,
}

impl Accessor {
    pub fn element_size(&self) -> usize {
        self.component.size() * self.dimensions.multiplicity()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    View { view: usize, mime_type: String },
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDef {
    pub name: Option<String>,
    pub source: ImageSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    None,
    Blend,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderParameterType {
    Float,
    Vec2,
    Vec3,
    Vec4,
}

impl ShaderParameterType {
    pub fn component_count(self) -> usize {
        match self {
            ShaderParameterType::Float => 1,
            ShaderParameterType::Vec2 => 2,
            ShaderParameterType::Vec3 => 3,
            ShaderParameterType::Vec4 => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderParameterDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ShaderParameterType,
    #[serde(default)]
    pub default: Vec<f32>,
}

/// Engine-specific material data carried in the glTF `extras` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialExtras {
    pub shader_parameters: Vec<ShaderParameterDef>,
    pub blend_mode: Option<BlendMode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDef {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    /// Texture indices (into [`Asset::textures`]).
    pub base_color_texture: Option<usize>,
    pub metallic_roughness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub occlusion_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
    pub alpha_mode: AlphaMode,
    pub extras: MaterialExtras,
}

impl Default for MaterialDef {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0; 3],
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            alpha_mode: AlphaMode::Opaque,
            extras: MaterialExtras::default(),
        }
    }
}

impl MaterialDef {
    /// Normalized path of the shader resource rendering this material.
    pub fn shader_path(&self) -> String {
        hearth_common::normalize_path(&format!(
            "/shaders/{}.wgsl",
            self.name.as_deref().unwrap_or("default")
        ))
    }

    /// Explicit `blendMode` extra wins; otherwise glTF `BLEND` alpha mode blends.
    pub fn blend_mode(&self) -> BlendMode {
        match (self.extras.blend_mode, self.alpha_mode) {
            (Some(mode), _) => mode,
            (None, AlphaMode::Blend) => BlendMode::Blend,
            (None, _) => BlendMode::None,
        }
    }

    /// Texture slots in binding order: base color, metallic-roughness,
    /// normal, occlusion, emissive.
    pub fn texture_slots(&self) -> [Option<usize>; 5] {
        [
            self.base_color_texture,
            self.metallic_roughness_texture,
            self.normal_texture,
            self.occlusion_texture,
            self.emissive_texture,
        ]
    }
}

/// A parsed glTF asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Asset {
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<MaterialDef>,
    /// Texture index to image index.
    pub textures: Vec<usize>,
    pub images: Vec<ImageDef>,
    pub buffers: Vec<Vec<u8>>,
    pub views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
}

impl Asset {
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_root)
    }

    pub fn view_bytes(&self, view: usize) -> Option<&[u8]> {
        let view = self.views.get(view)?;
        self.buffers
            .get(view.buffer)?
            .get(view.offset..view.offset + view.length)
    }

    /// Image backing a texture, if the texture index is valid.
    pub fn texture_image(&self, texture: usize) -> Option<usize> {
        self.textures.get(texture).copied()
    }

    /// Byte offset of an accessor's first element within its buffer.
    pub fn accessor_buffer_offset(&self, accessor: usize) -> Option<(usize, usize)> {
        let accessor = self.accessors.get(accessor)?;
        let view = self.views.get(accessor.view?)?;
        Some((view.buffer, view.offset + accessor.offset))
    }
}
