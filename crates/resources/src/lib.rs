//! Resource system: path-addressed, deduplicated loading of engine resources.
//!
//! [`ResourceSystem`] owns every resource in an arena keyed by
//! [`ResourceId`]. File reads, dependency completion, shader hot reload and
//! load callbacks all happen inside [`ResourceSystem::update`], which the
//! embedding loop calls once per frame.
//!
//! The centrepiece is [`ModelResource`]: a glTF model that loads its shaders
//! and embedded textures, builds buffers, materials and pipelines, and draws
//! its node hierarchy with GPU instancing.
//!
//! # Invariants
//! - One resource per normalized path.
//! - A model never builds GPU state before every dependent has completed.
//! - A load callback fires at most once, and only for a Loaded resource.

pub mod bus;
pub mod data_store;
pub mod font;
pub mod model;
pub mod resource;
pub mod shader;
pub mod system;
pub mod texture;

pub use bus::{ShaderInjectedBus, Subscription};
pub use data_store::DataStore;
pub use font::FontResource;
pub use model::{LoadEvent, LoadState, ModelResource};
pub use resource::{Loadable, Resource, ResourceId};
pub use shader::ShaderResource;
pub use system::{ResourceEvent, ResourceSystem, ResourceSystemConfig};
pub use texture::{ColorSpace, Texture2D};

use hearth_assets::AssetError;
use hearth_render::CompilationMessage;
use hearth_vfs::{FileReadError, FileWriteError};

/// Errors from loading a glTF model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("could not read model: {0}")]
    Read(String),
    #[error("dependent resource {path} failed: {reason}")]
    DependentFailed { path: String, reason: String },
}

/// Errors from the resource system and resource variants.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("no resource type for {0}")]
    UnknownType(String),
    #[error("unknown resource id")]
    UnknownResource,
    #[error("{path} is not a {expected:?} resource")]
    WrongType {
        path: String,
        expected: hearth_common::ResourceType,
    },
    #[error(transparent)]
    Read(#[from] FileReadError),
    #[error(transparent)]
    Write(#[from] FileWriteError),
    #[error("{path} is not valid UTF-8")]
    Utf8 { path: String },
    #[error("shader {path} failed to compile with {} error(s)", messages.len())]
    ShaderCompile {
        path: String,
        messages: Vec<CompilationMessage>,
    },
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    /// A requested resource ended in the Error state; the caller decides
    /// whether to abort.
    #[error("resource {path} failed to load: {reason}")]
    Fatal { path: String, reason: String },
}

pub fn crate_info() -> &'static str {
    "hearth-resources v0.1.0"
}
