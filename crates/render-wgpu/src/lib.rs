//! wgpu backend for the hearth GPU seam.
//!
//! [`WgpuDevice`] owns every wgpu object in slot-map arenas and hands out the
//! typed handles from `hearth-render`; [`WgpuRenderPass`] resolves those
//! handles while recording a pass.

mod camera;
mod device;
mod frame;
mod shaders;

pub use camera::OrbitCamera;
pub use device::{WgpuDevice, WgpuRenderPass};
pub use frame::FrameTargets;
pub use shaders::MODEL_SHADER;
