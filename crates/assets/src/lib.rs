//! glTF model reading for the engine.
//!
//! [`reader`] turns `.glb` / `.gltf` bytes into the [`Asset`] IR. The node
//! forest is validated on load ([`graph`]), and [`extract`] derives the
//! engine-level data a model exposes besides its meshes: attachment points
//! and the collision hull.

pub mod builder;
pub mod collision;
pub mod extract;
pub mod graph;
pub mod ir;
pub mod reader;

pub use collision::CollisionShape;
pub use extract::{AttachmentPoint, attachment_points, collision_shape};
pub use ir::{Asset, BlendMode, MaterialDef, ShaderParameterDef, ShaderParameterType};
pub use reader::{ModelFormat, read, read_path};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("model has {0} collision hulls, at most one is supported")]
    MultipleCollisionHulls(usize),
}

pub fn crate_info() -> &'static str {
    "hearth-assets v0.1.0"
}
