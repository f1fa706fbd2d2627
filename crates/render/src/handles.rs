//! Typed handles into a device's object arenas.
//!
//! Handles are plain copyable keys. The owner of a handle is responsible for
//! handing it back through [`GpuDevice::release`](crate::GpuDevice::release).

use slotmap::new_key_type;

new_key_type! {
    pub struct BufferId;
    pub struct TextureId;
    pub struct SamplerId;
    pub struct BindGroupLayoutId;
    pub struct BindGroupId;
    pub struct PipelineLayoutId;
    pub struct RenderPipelineId;
    pub struct ShaderModuleId;
}

/// Any releasable GPU object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuObject {
    Buffer(BufferId),
    Texture(TextureId),
    Sampler(SamplerId),
    BindGroupLayout(BindGroupLayoutId),
    BindGroup(BindGroupId),
    PipelineLayout(PipelineLayoutId),
    RenderPipeline(RenderPipelineId),
    ShaderModule(ShaderModuleId),
}
