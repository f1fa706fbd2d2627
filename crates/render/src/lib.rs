//! Renderer-agnostic GPU seam.
//!
//! Resources never talk to wgpu directly. They describe GPU objects with the
//! owned descriptors in [`descriptors`], create them through [`GpuDevice`],
//! and hold the returned typed handles. Two backends implement the seam: the
//! wgpu backend in `hearth-render-wgpu`, and [`RecordingDevice`], which keeps
//! everything in memory for tools and tests.
//!
//! # Invariants
//! - Handles are only valid on the device that created them.
//! - A released handle is never reused by the same arena slot version.

pub mod context;
pub mod descriptors;
pub mod device;
pub mod globals;
pub mod handles;
pub mod preprocessor;
pub mod recording;
pub mod settings;

pub use context::RenderContext;
pub use descriptors::*;
pub use device::{CompilationMessage, GpuDevice, PipelineError, RenderPassEncoder};
pub use globals::{GlobalUniforms, GlobalUniformsBinding};
pub use handles::*;
pub use recording::{ObjectCounts, PassCommand, RecordingDevice, RecordingPass};
pub use settings::{RenderSettings, SettingsError};

pub fn crate_info() -> &'static str {
    "hearth-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
