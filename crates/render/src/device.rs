use crate::descriptors::{
    BindGroupDescriptor, BindGroupLayoutDescriptor, BufferDescriptor, PipelineLayoutDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};
use crate::handles::{
    BindGroupId, BindGroupLayoutId, BufferId, GpuObject, PipelineLayoutId, RenderPipelineId,
    SamplerId, ShaderModuleId, TextureId,
};
use std::ops::Range;

/// One diagnostic reported by the shader compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationMessage {
    pub message: String,
    /// 1-based line in the submitted source, 0 when unknown.
    pub line: u32,
    /// 1-based column, 0 when unknown.
    pub column: u32,
}

impl std::fmt::Display for CompilationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Why the device refused to create a render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline references a released {0}")]
    Released(&'static str),
    #[error("pipeline failed validation: {0}")]
    Validation(String),
}

/// Renderer-agnostic device interface.
///
/// Object creation is synchronous from the caller's point of view; the
/// backend queues work internally. Every handle returned stays valid until it
/// is passed to [`GpuDevice::release`].
pub trait GpuDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferId;

    /// Create a buffer of `desc.size` bytes and copy `contents` into its
    /// start. `desc.size` must be a multiple of 4 and at least
    /// `contents.len()`.
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, contents: &[u8]) -> BufferId;

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]);

    /// Create a sampled 2D texture from tightly packed RGBA8 texels.
    fn create_texture_2d(&mut self, desc: &TextureDescriptor, rgba: &[u8]) -> TextureId;

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> SamplerId;

    fn create_bind_group_layout(&mut self, desc: &BindGroupLayoutDescriptor) -> BindGroupLayoutId;

    fn create_bind_group(&mut self, desc: &BindGroupDescriptor) -> BindGroupId;

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDescriptor) -> PipelineLayoutId;

    /// Fails when the descriptor references a released object or the shader
    /// does not match the vertex layout, bind group layouts or targets.
    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, PipelineError>;

    /// Compile WGSL. On failure returns the compiler diagnostics with line
    /// numbers relative to `source`.
    fn create_shader_module(
        &mut self,
        label: &str,
        source: &str,
    ) -> Result<ShaderModuleId, Vec<CompilationMessage>>;

    fn release(&mut self, object: GpuObject);
}

/// Commands recorded into a render pass.
pub trait RenderPassEncoder {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId);
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId);
    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64);
    fn set_index_buffer(&mut self, buffer: BufferId, format: wgpu::IndexFormat, offset: u64);
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}
