//! Shared types for the hearth engine: entity ids, transforms, resource
//! states and resource path helpers.

pub mod path;
pub mod types;

pub use path::{normalize_path, resource_extension, resource_name};
pub use types::{EntityId, ResourceState, ResourceType, Transform};

pub fn crate_info() -> &'static str {
    "hearth-common v0.1.0"
}
