//! Recording backend.
//!
//! [`RecordingDevice`] keeps every created object's descriptor in an arena and
//! mirrors buffer contents in memory; [`RecordingPass`] logs pass commands.
//! Together they let headless tools and tests observe exactly what a real
//! backend would be asked to do.

use crate::descriptors::{
    BindGroupDescriptor, BindGroupLayoutDescriptor, BufferDescriptor, PipelineLayoutDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};
use crate::device::{CompilationMessage, GpuDevice, PipelineError, RenderPassEncoder};
use crate::handles::{
    BindGroupId, BindGroupLayoutId, BufferId, GpuObject, PipelineLayoutId, RenderPipelineId,
    SamplerId, ShaderModuleId, TextureId,
};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::ops::Range;

type ShaderCheck = Box<dyn Fn(&str) -> Result<(), Vec<CompilationMessage>>>;
type PipelineCheck = Box<dyn Fn(&RenderPipelineDescriptor, &str) -> Result<(), String>>;

#[derive(Debug)]
pub struct RecordedBuffer {
    pub desc: BufferDescriptor,
    pub contents: RefCell<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedShader {
    pub label: String,
    pub source: String,
}

/// A queued buffer write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferWrite {
    pub buffer: BufferId,
    pub offset: u64,
    pub len: usize,
}

/// Live object counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    pub buffers: usize,
    pub textures: usize,
    pub samplers: usize,
    pub bind_group_layouts: usize,
    pub bind_groups: usize,
    pub pipeline_layouts: usize,
    pub render_pipelines: usize,
    pub shader_modules: usize,
}

impl ObjectCounts {
    pub fn total(&self) -> usize {
        self.buffers
            + self.textures
            + self.samplers
            + self.bind_group_layouts
            + self.bind_groups
            + self.pipeline_layouts
            + self.render_pipelines
            + self.shader_modules
    }
}

impl std::fmt::Display for ObjectCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "buffers={} textures={} samplers={} layouts={} bind_groups={} pipeline_layouts={} pipelines={} shaders={}",
            self.buffers,
            self.textures,
            self.samplers,
            self.bind_group_layouts,
            self.bind_groups,
            self.pipeline_layouts,
            self.render_pipelines,
            self.shader_modules
        )
    }
}

/// Device that records instead of rendering.
#[derive(Default)]
pub struct RecordingDevice {
    buffers: SlotMap<BufferId, RecordedBuffer>,
    textures: SlotMap<TextureId, TextureDescriptor>,
    samplers: SlotMap<SamplerId, SamplerDescriptor>,
    bind_group_layouts: SlotMap<BindGroupLayoutId, BindGroupLayoutDescriptor>,
    bind_groups: SlotMap<BindGroupId, BindGroupDescriptor>,
    pipeline_layouts: SlotMap<PipelineLayoutId, PipelineLayoutDescriptor>,
    pipelines: SlotMap<RenderPipelineId, RenderPipelineDescriptor>,
    shaders: SlotMap<ShaderModuleId, RecordedShader>,
    writes: RefCell<Vec<BufferWrite>>,
    shader_check: Option<ShaderCheck>,
    pipeline_check: Option<PipelineCheck>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a compile check; sources it rejects fail `create_shader_module`.
    pub fn with_shader_check(
        mut self,
        check: impl Fn(&str) -> Result<(), Vec<CompilationMessage>> + 'static,
    ) -> Self {
        self.shader_check = Some(Box::new(check));
        self
    }

    /// Install a pipeline validation check. It sees the descriptor and the
    /// source of its shader module; an `Err` fails `create_render_pipeline`.
    pub fn with_pipeline_check(
        mut self,
        check: impl Fn(&RenderPipelineDescriptor, &str) -> Result<(), String> + 'static,
    ) -> Self {
        self.pipeline_check = Some(Box::new(check));
        self
    }

    pub fn live_objects(&self) -> ObjectCounts {
        ObjectCounts {
            buffers: self.buffers.len(),
            textures: self.textures.len(),
            samplers: self.samplers.len(),
            bind_group_layouts: self.bind_group_layouts.len(),
            bind_groups: self.bind_groups.len(),
            pipeline_layouts: self.pipeline_layouts.len(),
            render_pipelines: self.pipelines.len(),
            shader_modules: self.shaders.len(),
        }
    }

    pub fn buffer(&self, id: BufferId) -> Option<&RecordedBuffer> {
        self.buffers.get(id)
    }

    /// Current contents of a buffer, including padding.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        self.buffers.get(id).map(|b| b.contents.borrow().clone())
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureDescriptor> {
        self.textures.get(id)
    }

    pub fn bind_group_layout(&self, id: BindGroupLayoutId) -> Option<&BindGroupLayoutDescriptor> {
        self.bind_group_layouts.get(id)
    }

    pub fn bind_group(&self, id: BindGroupId) -> Option<&BindGroupDescriptor> {
        self.bind_groups.get(id)
    }

    pub fn pipeline_layout(&self, id: PipelineLayoutId) -> Option<&PipelineLayoutDescriptor> {
        self.pipeline_layouts.get(id)
    }

    pub fn pipeline(&self, id: RenderPipelineId) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.get(id)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = (RenderPipelineId, &RenderPipelineDescriptor)> {
        self.pipelines.iter()
    }

    pub fn shader(&self, id: ShaderModuleId) -> Option<&RecordedShader> {
        self.shaders.get(id)
    }

    /// Drain the buffer-write log.
    pub fn take_writes(&self) -> Vec<BufferWrite> {
        std::mem::take(&mut *self.writes.borrow_mut())
    }
}

impl GpuDevice for RecordingDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferId {
        self.buffers.insert(RecordedBuffer {
            desc: desc.clone(),
            contents: RefCell::new(vec![0; desc.size as usize]),
        })
    }

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, contents: &[u8]) -> BufferId {
        let mut data = vec![0; (desc.size as usize).max(contents.len())];
        data[..contents.len()].copy_from_slice(contents);
        self.buffers.insert(RecordedBuffer {
            desc: desc.clone(),
            contents: RefCell::new(data),
        })
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(recorded) = self.buffers.get(buffer) else {
            tracing::error!(?buffer, "write to released buffer");
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        let mut contents = recorded.contents.borrow_mut();
        if end > contents.len() {
            tracing::error!(
                label = %recorded.desc.label,
                end,
                size = contents.len(),
                "buffer write out of bounds"
            );
            return;
        }
        contents[start..end].copy_from_slice(data);
        self.writes.borrow_mut().push(BufferWrite {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture_2d(&mut self, desc: &TextureDescriptor, _rgba: &[u8]) -> TextureId {
        self.textures.insert(desc.clone())
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> SamplerId {
        self.samplers.insert(desc.clone())
    }

    fn create_bind_group_layout(&mut self, desc: &BindGroupLayoutDescriptor) -> BindGroupLayoutId {
        self.bind_group_layouts.insert(desc.clone())
    }

    fn create_bind_group(&mut self, desc: &BindGroupDescriptor) -> BindGroupId {
        self.bind_groups.insert(desc.clone())
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDescriptor) -> PipelineLayoutId {
        self.pipeline_layouts.insert(desc.clone())
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, PipelineError> {
        if !self.pipeline_layouts.contains_key(desc.layout) {
            return Err(PipelineError::Released("pipeline layout"));
        }
        let Some(shader) = self.shaders.get(desc.shader) else {
            return Err(PipelineError::Released("shader module"));
        };
        if let Some(check) = &self.pipeline_check {
            check(desc, &shader.source).map_err(PipelineError::Validation)?;
        }
        Ok(self.pipelines.insert(desc.clone()))
    }

    fn create_shader_module(
        &mut self,
        label: &str,
        source: &str,
    ) -> Result<ShaderModuleId, Vec<CompilationMessage>> {
        if let Some(check) = &self.shader_check {
            check(source)?;
        }
        Ok(self.shaders.insert(RecordedShader {
            label: label.to_string(),
            source: source.to_string(),
        }))
    }

    fn release(&mut self, object: GpuObject) {
        let removed = match object {
            GpuObject::Buffer(id) => self.buffers.remove(id).is_some(),
            GpuObject::Texture(id) => self.textures.remove(id).is_some(),
            GpuObject::Sampler(id) => self.samplers.remove(id).is_some(),
            GpuObject::BindGroupLayout(id) => self.bind_group_layouts.remove(id).is_some(),
            GpuObject::BindGroup(id) => self.bind_groups.remove(id).is_some(),
            GpuObject::PipelineLayout(id) => self.pipeline_layouts.remove(id).is_some(),
            GpuObject::RenderPipeline(id) => self.pipelines.remove(id).is_some(),
            GpuObject::ShaderModule(id) => self.shaders.remove(id).is_some(),
        };
        if !removed {
            tracing::warn!(?object, "release of unknown object");
        }
    }
}

/// A command recorded by [`RecordingPass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassCommand {
    SetPipeline(RenderPipelineId),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupId,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferId,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: BufferId,
        format: wgpu::IndexFormat,
        offset: u64,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

impl PassCommand {
    pub fn is_draw(&self) -> bool {
        matches!(self, PassCommand::Draw { .. } | PassCommand::DrawIndexed { .. })
    }
}

/// Render pass that records its commands.
#[derive(Debug, Default)]
pub struct RecordingPass {
    commands: Vec<PassCommand>,
}

impl RecordingPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PassCommand] {
        &self.commands
    }

    pub fn draws(&self) -> Vec<&PassCommand> {
        self.commands.iter().filter(|c| c.is_draw()).collect()
    }

    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Human-readable listing, one command per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== Render pass ({} commands) ===\n", self.commands.len()));
        for command in &self.commands {
            let line = match command {
                PassCommand::SetPipeline(p) => format!("  set_pipeline {p:?}"),
                PassCommand::SetBindGroup { index, bind_group } => {
                    format!("  set_bind_group {index} {bind_group:?}")
                }
                PassCommand::SetVertexBuffer {
                    slot,
                    buffer,
                    offset,
                } => format!("  set_vertex_buffer {slot} {buffer:?} +{offset}"),
                PassCommand::SetIndexBuffer {
                    buffer,
                    format,
                    offset,
                } => format!("  set_index_buffer {buffer:?} {format:?} +{offset}"),
                PassCommand::Draw {
                    vertices,
                    instances,
                } => format!("  draw vertices={vertices:?} instances={instances:?}"),
                PassCommand::DrawIndexed {
                    indices,
                    base_vertex,
                    instances,
                } => format!(
                    "  draw_indexed indices={indices:?} base={base_vertex} instances={instances:?}"
                ),
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

impl RenderPassEncoder for RecordingPass {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.commands.push(PassCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        self.commands.push(PassCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.commands.push(PassCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, format: wgpu::IndexFormat, offset: u64) {
        self.commands.push(PassCommand::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands.push(PassCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(PassCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}
