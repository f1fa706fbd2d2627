use hearth_render::{
    BindGroupDescriptor, BindGroupId, BindGroupLayoutDescriptor, BindGroupLayoutId,
    BindingResource, BufferDescriptor, BufferId, CompilationMessage, GpuDevice, GpuObject,
    PipelineError, PipelineLayoutDescriptor, PipelineLayoutId, RenderPassEncoder,
    RenderPipelineDescriptor, RenderPipelineId, SamplerDescriptor, SamplerId, ShaderModuleId,
    TextureDescriptor, TextureId,
};
use slotmap::SlotMap;
use std::ops::Range;

struct TextureEntry {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// [`GpuDevice`] backed by a live wgpu device and queue.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: SlotMap<BufferId, wgpu::Buffer>,
    textures: SlotMap<TextureId, TextureEntry>,
    samplers: SlotMap<SamplerId, wgpu::Sampler>,
    bind_group_layouts: SlotMap<BindGroupLayoutId, wgpu::BindGroupLayout>,
    bind_groups: SlotMap<BindGroupId, wgpu::BindGroup>,
    pipeline_layouts: SlotMap<PipelineLayoutId, wgpu::PipelineLayout>,
    pipelines: SlotMap<RenderPipelineId, wgpu::RenderPipeline>,
    shaders: SlotMap<ShaderModuleId, wgpu::ShaderModule>,
}

impl WgpuDevice {
    /// Errors outside an explicit scope are logged instead of panicking.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured wgpu error");
        }));
        Self {
            device,
            queue,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            samplers: SlotMap::with_key(),
            bind_group_layouts: SlotMap::with_key(),
            bind_groups: SlotMap::with_key(),
            pipeline_layouts: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn live_object_count(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.samplers.len()
            + self.bind_group_layouts.len()
            + self.bind_groups.len()
            + self.pipeline_layouts.len()
            + self.pipelines.len()
            + self.shaders.len()
    }

    /// Run `create` inside a validation error scope.
    fn validated<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    fn binding_resource(&self, resource: &BindingResource) -> Option<wgpu::BindingResource<'_>> {
        match *resource {
            BindingResource::Buffer {
                buffer,
                offset,
                size,
            } => self.buffers.get(buffer).map(|b| {
                wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: b,
                    offset,
                    size: size.and_then(wgpu::BufferSize::new),
                })
            }),
            BindingResource::Texture(id) => self
                .textures
                .get(id)
                .map(|t| wgpu::BindingResource::TextureView(&t.view)),
            BindingResource::Sampler(id) => {
                self.samplers.get(id).map(wgpu::BindingResource::Sampler)
            }
        }
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferId {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: false,
        });
        self.buffers.insert(buffer)
    }

    fn create_buffer_init(&mut self, desc: &BufferDescriptor, contents: &[u8]) -> BufferId {
        let size = desc.size.max(contents.len() as u64);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size,
            usage: desc.usage,
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..contents.len()].copy_from_slice(contents);
        buffer.unmap();
        self.buffers.insert(buffer)
    }

    fn write_buffer(&self, buffer: BufferId, offset: u64, data: &[u8]) {
        match self.buffers.get(buffer) {
            Some(b) => self.queue.write_buffer(b, offset, data),
            None => tracing::error!(?buffer, "write to released buffer"),
        }
    }

    fn create_texture_2d(&mut self, desc: &TextureDescriptor, rgba: &[u8]) -> TextureId {
        let size = wgpu::Extent3d {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
        let view = texture.create_view(&Default::default());
        self.textures.insert(TextureEntry {
            _texture: texture,
            view,
        })
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> SamplerId {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&desc.label),
            address_mode_u: desc.address_mode,
            address_mode_v: desc.address_mode,
            address_mode_w: desc.address_mode,
            mag_filter: desc.mag_filter,
            min_filter: desc.min_filter,
            mipmap_filter: desc.mipmap_filter,
            ..Default::default()
        });
        self.samplers.insert(sampler)
    }

    fn create_bind_group_layout(&mut self, desc: &BindGroupLayoutDescriptor) -> BindGroupLayoutId {
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&desc.label),
                entries: &desc.entries,
            });
        self.bind_group_layouts.insert(layout)
    }

    fn create_bind_group(&mut self, desc: &BindGroupDescriptor) -> BindGroupId {
        let Some(layout) = self.bind_group_layouts.get(desc.layout) else {
            tracing::error!(label = %desc.label, "bind group references a released layout");
            return BindGroupId::default();
        };
        let entries: Vec<wgpu::BindGroupEntry<'_>> = desc
            .entries
            .iter()
            .filter_map(|entry| {
                let resource = self.binding_resource(&entry.resource);
                if resource.is_none() {
                    tracing::error!(label = %desc.label, binding = entry.binding, "missing bound resource");
                }
                resource.map(|resource| wgpu::BindGroupEntry {
                    binding: entry.binding,
                    resource,
                })
            })
            .collect();
        let (group, error) = self.validated(|device| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&desc.label),
                layout,
                entries: &entries,
            })
        });
        if let Some(error) = error {
            tracing::error!(label = %desc.label, %error, "invalid bind group");
        }
        self.bind_groups.insert(group)
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDescriptor) -> PipelineLayoutId {
        let layouts: Vec<&wgpu::BindGroupLayout> = desc
            .bind_group_layouts
            .iter()
            .filter_map(|id| self.bind_group_layouts.get(*id))
            .collect();
        if layouts.len() != desc.bind_group_layouts.len() {
            tracing::error!(label = %desc.label, "pipeline layout references a released bind group layout");
        }
        let (layout, error) = self.validated(|device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&desc.label),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            })
        });
        if let Some(error) = error {
            tracing::error!(label = %desc.label, %error, "invalid pipeline layout");
        }
        self.pipeline_layouts.insert(layout)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, PipelineError> {
        let Some(layout) = self.pipeline_layouts.get(desc.layout) else {
            return Err(PipelineError::Released("pipeline layout"));
        };
        let Some(module) = self.shaders.get(desc.shader) else {
            return Err(PipelineError::Released("shader module"));
        };
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = desc
            .buffers
            .iter()
            .map(|b| wgpu::VertexBufferLayout {
                array_stride: b.array_stride,
                step_mode: b.step_mode,
                attributes: &b.attributes,
            })
            .collect();
        let targets: Vec<Option<wgpu::ColorTargetState>> =
            desc.targets.iter().cloned().map(Some).collect();

        let (pipeline, error) = self.validated(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&desc.label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: desc.vertex_entry.as_deref(),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: desc.fragment_entry.as_deref(),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                primitive: desc.primitive,
                depth_stencil: desc.depth_stencil.clone(),
                multisample: desc.multisample,
                multiview: None,
                cache: None,
            })
        });
        match error {
            Some(error) => Err(PipelineError::Validation(error.to_string())),
            None => Ok(self.pipelines.insert(pipeline)),
        }
    }

    fn create_shader_module(
        &mut self,
        label: &str,
        source: &str,
    ) -> Result<ShaderModuleId, Vec<CompilationMessage>> {
        let (module, error) = self.validated(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });
        let Some(error) = error else {
            return Ok(self.shaders.insert(module));
        };

        let info = pollster::block_on(module.get_compilation_info());
        let mut messages: Vec<CompilationMessage> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| CompilationMessage {
                message: m.message.clone(),
                line: m.location.as_ref().map_or(0, |l| l.line_number),
                column: m.location.as_ref().map_or(0, |l| l.line_position),
            })
            .collect();
        if messages.is_empty() {
            messages.push(CompilationMessage {
                message: error.to_string(),
                line: 0,
                column: 0,
            });
        }
        Err(messages)
    }

    fn release(&mut self, object: GpuObject) {
        match object {
            GpuObject::Buffer(id) => {
                if let Some(buffer) = self.buffers.remove(id) {
                    buffer.destroy();
                }
            }
            GpuObject::Texture(id) => {
                self.textures.remove(id);
            }
            GpuObject::Sampler(id) => {
                self.samplers.remove(id);
            }
            GpuObject::BindGroupLayout(id) => {
                self.bind_group_layouts.remove(id);
            }
            GpuObject::BindGroup(id) => {
                self.bind_groups.remove(id);
            }
            GpuObject::PipelineLayout(id) => {
                self.pipeline_layouts.remove(id);
            }
            GpuObject::RenderPipeline(id) => {
                self.pipelines.remove(id);
            }
            GpuObject::ShaderModule(id) => {
                self.shaders.remove(id);
            }
        }
    }
}

/// [`RenderPassEncoder`] over a live wgpu render pass.
pub struct WgpuRenderPass<'a, 'p> {
    pass: &'a mut wgpu::RenderPass<'p>,
    device: &'a WgpuDevice,
}

impl<'a, 'p> WgpuRenderPass<'a, 'p> {
    pub fn new(pass: &'a mut wgpu::RenderPass<'p>, device: &'a WgpuDevice) -> Self {
        Self { pass, device }
    }
}

impl RenderPassEncoder for WgpuRenderPass<'_, '_> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        match self.device.pipelines.get(pipeline) {
            Some(p) => self.pass.set_pipeline(p),
            None => tracing::error!(?pipeline, "unknown pipeline"),
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupId) {
        match self.device.bind_groups.get(bind_group) {
            Some(g) => self.pass.set_bind_group(index, g, &[]),
            None => tracing::error!(?bind_group, index, "unknown bind group"),
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        match self.device.buffers.get(buffer) {
            Some(b) => self.pass.set_vertex_buffer(slot, b.slice(offset..)),
            None => tracing::error!(?buffer, slot, "unknown vertex buffer"),
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferId, format: wgpu::IndexFormat, offset: u64) {
        match self.device.buffers.get(buffer) {
            Some(b) => self.pass.set_index_buffer(b.slice(offset..), format),
            None => tracing::error!(?buffer, "unknown index buffer"),
        }
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass.draw(vertices, instances);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.draw_indexed(indices, base_vertex, instances);
    }
}
