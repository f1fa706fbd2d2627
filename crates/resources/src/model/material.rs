//! Materials: bind group layout, bind group, blend state and the optional
//! dynamic shader parameters.
//!
//! Bindings: sampler at 0, present textures at 1..=5 (base color,
//! metallic-roughness, normal, occlusion, emissive), dynamic uniforms as a
//! read-only storage buffer at 6 when the material declares parameters.

use bytemuck::{Pod, Zeroable};
use hearth_assets::{BlendMode, MaterialDef, ShaderParameterType};
use hearth_render::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutId, BindingResource, BufferDescriptor, BufferId, GpuDevice, GpuObject,
    SamplerId, TextureId,
};

pub const MAX_PARAMETER_SLOTS: usize = 8;
pub const SAMPLER_BINDING: u32 = 0;
pub const FIRST_TEXTURE_BINDING: u32 = 1;
pub const DYNAMIC_UNIFORMS_BINDING: u32 = 6;

/// One element of the dynamic-uniforms array: a vec4 slot per parameter.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DynamicUniformsData {
    pub slots: [[f32; 4]; MAX_PARAMETER_SLOTS],
}

impl DynamicUniformsData {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Store `values` in the slot starting at float `offset`. Values past
    /// the slot's four floats are dropped.
    pub fn set(&mut self, offset: usize, values: &[f32]) {
        let slot = offset / 4;
        if let Some(target) = self.slots.get_mut(slot) {
            for (dst, src) in target.iter_mut().zip(values) {
                *dst = *src;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParameter {
    pub name: String,
    pub kind: ShaderParameterType,
    /// Offset in floats into [`DynamicUniformsData`].
    pub offset: usize,
    pub default: Vec<f32>,
}

/// Sampler and texture handles a material binds. Owned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialTextures {
    pub sampler: SamplerId,
    pub slots: [Option<TextureId>; 5],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DynamicUniforms {
    buffer: BufferId,
    /// In [`DynamicUniformsData`] elements.
    capacity: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader_path: String,
    pub blend_mode: BlendMode,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    parameters: Vec<ShaderParameter>,
    textures: MaterialTextures,
    layout: BindGroupLayoutId,
    bind_group: BindGroupId,
    dynamic: Option<DynamicUniforms>,
}

impl Material {
    pub fn new(
        device: &mut dyn GpuDevice,
        def: &MaterialDef,
        textures: MaterialTextures,
        label: &str,
    ) -> Self {
        let name = def.name.clone().unwrap_or_else(|| "default".into());
        let label = format!("{label}:material:{name}");
        let parameters = parameter_slots(&name, &def.extras.shader_parameters);

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: format!("{label}:layout"),
            entries: layout_entries(&textures.slots, !parameters.is_empty()),
        });

        let mut material = Self {
            name,
            shader_path: def.shader_path(),
            blend_mode: def.blend_mode(),
            base_color_factor: def.base_color_factor,
            metallic_factor: def.metallic_factor,
            roughness_factor: def.roughness_factor,
            emissive_factor: def.emissive_factor,
            parameters,
            textures,
            layout,
            bind_group: BindGroupId::default(),
            dynamic: None,
        };
        if !material.parameters.is_empty() {
            material.dynamic = Some(material.create_dynamic_buffer(device, 1, &label));
        }
        material.bind_group = material.create_bind_group(device, &label);
        tracing::debug!(
            material = %material.name,
            textures = material.textures.slots.iter().flatten().count(),
            parameters = material.parameters.len(),
            blend = ?material.blend_mode,
            "material created"
        );
        material
    }

    pub fn layout(&self) -> BindGroupLayoutId {
        self.layout
    }

    pub fn bind_group(&self) -> BindGroupId {
        self.bind_group
    }

    pub fn parameters(&self) -> &[ShaderParameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ShaderParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn texture_slots(&self) -> [Option<TextureId>; 5] {
        self.textures.slots
    }

    /// Elements the dynamic-uniforms buffer holds, 0 without parameters.
    pub fn dynamic_capacity(&self) -> usize {
        self.dynamic.map_or(0, |d| d.capacity)
    }

    pub fn dynamic_buffer(&self) -> Option<BufferId> {
        self.dynamic.map(|d| d.buffer)
    }

    pub fn blend_state(&self) -> wgpu::BlendState {
        blend_state(self.blend_mode)
    }

    /// Parameter defaults laid out in their slots.
    pub fn defaults(&self) -> DynamicUniformsData {
        let mut data = DynamicUniformsData::default();
        for parameter in &self.parameters {
            data.set(parameter.offset, &parameter.default);
        }
        data
    }

    /// Grow the dynamic-uniforms array to `capacity` elements. The buffer
    /// and bind group are recreated against the same layout and every
    /// element is reset to the defaults. Shrinking is a no-op.
    pub fn resize_dynamic_uniforms(&mut self, device: &mut dyn GpuDevice, capacity: usize) {
        let Some(current) = self.dynamic else {
            return;
        };
        if capacity <= current.capacity {
            return;
        }
        device.release(GpuObject::BindGroup(self.bind_group));
        device.release(GpuObject::Buffer(current.buffer));
        let label = format!("material:{}", self.name);
        self.dynamic = Some(self.create_dynamic_buffer(device, capacity, &label));
        self.bind_group = self.create_bind_group(device, &label);
        tracing::debug!(material = %self.name, capacity, "dynamic uniforms resized");
    }

    pub fn write_dynamic_uniforms(
        &self,
        device: &dyn GpuDevice,
        element: usize,
        data: &DynamicUniformsData,
    ) {
        let Some(dynamic) = self.dynamic else {
            tracing::error!(material = %self.name, "material has no dynamic uniforms");
            return;
        };
        if element >= dynamic.capacity {
            tracing::error!(
                material = %self.name,
                element,
                capacity = dynamic.capacity,
                "dynamic uniforms element out of range"
            );
            return;
        }
        device.write_buffer(
            dynamic.buffer,
            element as u64 * DynamicUniformsData::SIZE,
            bytemuck::bytes_of(data),
        );
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        device.release(GpuObject::BindGroup(self.bind_group));
        if let Some(dynamic) = self.dynamic {
            device.release(GpuObject::Buffer(dynamic.buffer));
        }
        device.release(GpuObject::BindGroupLayout(self.layout));
    }

    fn create_dynamic_buffer(
        &self,
        device: &mut dyn GpuDevice,
        capacity: usize,
        label: &str,
    ) -> DynamicUniforms {
        let defaults = self.defaults();
        let contents: Vec<DynamicUniformsData> = vec![defaults; capacity];
        let buffer = device.create_buffer_init(
            &BufferDescriptor {
                label: format!("{label}:dynamic_uniforms"),
                size: DynamicUniformsData::SIZE * capacity as u64,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            },
            bytemuck::cast_slice(&contents),
        );
        DynamicUniforms { buffer, capacity }
    }

    fn create_bind_group(&self, device: &mut dyn GpuDevice, label: &str) -> BindGroupId {
        let mut entries = vec![BindGroupEntry {
            binding: SAMPLER_BINDING,
            resource: BindingResource::Sampler(self.textures.sampler),
        }];
        for (binding, texture) in texture_bindings(&self.textures.slots) {
            entries.push(BindGroupEntry {
                binding,
                resource: BindingResource::Texture(texture),
            });
        }
        if let Some(dynamic) = self.dynamic {
            entries.push(BindGroupEntry {
                binding: DYNAMIC_UNIFORMS_BINDING,
                resource: BindingResource::Buffer {
                    buffer: dynamic.buffer,
                    offset: 0,
                    size: None,
                },
            });
        }
        device.create_bind_group(&BindGroupDescriptor {
            label: label.to_string(),
            layout: self.layout,
            entries,
        })
    }
}

fn texture_bindings(slots: &[Option<TextureId>; 5]) -> impl Iterator<Item = (u32, TextureId)> + '_ {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|t| (FIRST_TEXTURE_BINDING + i as u32, t)))
}

pub fn layout_entries(
    slots: &[Option<TextureId>; 5],
    has_parameters: bool,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![wgpu::BindGroupLayoutEntry {
        binding: SAMPLER_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }];
    for (binding, _) in texture_bindings(slots) {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    if has_parameters {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: DYNAMIC_UNIFORMS_BINDING,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(DynamicUniformsData::SIZE),
            },
            count: None,
        });
    }
    entries
}

/// Assign each declared parameter its own vec4 slot, in declaration order.
fn parameter_slots(
    material: &str,
    defs: &[hearth_assets::ShaderParameterDef],
) -> Vec<ShaderParameter> {
    if defs.len() > MAX_PARAMETER_SLOTS {
        tracing::error!(
            material,
            declared = defs.len(),
            max = MAX_PARAMETER_SLOTS,
            "too many shader parameters; extra ones are dropped"
        );
    }
    defs.iter()
        .take(MAX_PARAMETER_SLOTS)
        .enumerate()
        .map(|(slot, def)| {
            let width = def.kind.component_count();
            let mut default = def.default.clone();
            default.resize(width, 0.0);
            ShaderParameter {
                name: def.name.clone(),
                kind: def.kind,
                offset: slot * 4,
                default,
            }
        })
        .collect()
}

pub fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    use wgpu::{BlendComponent, BlendFactor as F, BlendOperation};
    let component = |src, dst| BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: BlendOperation::Add,
    };
    match mode {
        BlendMode::None => wgpu::BlendState {
            color: component(F::One, F::Zero),
            alpha: component(F::One, F::Zero),
        },
        BlendMode::Blend => wgpu::BlendState {
            color: component(F::SrcAlpha, F::OneMinusSrcAlpha),
            alpha: component(F::One, F::OneMinusSrcAlpha),
        },
        BlendMode::Additive => wgpu::BlendState {
            color: component(F::SrcAlpha, F::One),
            alpha: component(F::One, F::One),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_assets::ShaderParameterDef;
    use hearth_assets::ir::{AlphaMode, MaterialExtras};
    use hearth_render::{RecordingDevice, SamplerDescriptor, TextureDescriptor};

    fn textures(device: &mut RecordingDevice, present: [bool; 5]) -> MaterialTextures {
        let sampler = device.create_sampler(&SamplerDescriptor::default());
        let slots = present.map(|p| {
            p.then(|| {
                device.create_texture_2d(
                    &TextureDescriptor {
                        label: "t".into(),
                        width: 1,
                        height: 1,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                    },
                    &[0; 4],
                )
            })
        });
        MaterialTextures { sampler, slots }
    }

    fn with_parameters(defs: Vec<ShaderParameterDef>) -> MaterialDef {
        MaterialDef {
            name: Some("glow".into()),
            extras: MaterialExtras {
                shader_parameters: defs,
                blend_mode: None,
            },
            ..Default::default()
        }
    }

    fn param(name: &str, kind: ShaderParameterType, default: Vec<f32>) -> ShaderParameterDef {
        ShaderParameterDef {
            name: name.into(),
            kind,
            default,
        }
    }

    #[test]
    fn layout_skips_missing_textures() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [true, false, true, false, false]);
        let material = Material::new(&mut device, &MaterialDef::default(), tex, "m");
        let layout = device.bind_group_layout(material.layout()).unwrap();
        let bindings: Vec<u32> = layout.entries.iter().map(|e| e.binding).collect();
        assert_eq!(bindings, vec![0, 1, 3]);
        let group = device.bind_group(material.bind_group()).unwrap();
        assert_eq!(group.entries.len(), 3);
        assert_eq!(material.dynamic_capacity(), 0);
        assert_eq!(material.shader_path, "/shaders/default.wgsl");
    }

    #[test]
    fn parameters_get_vec4_slots_and_storage_binding() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let def = with_parameters(vec![
            param("intensity", ShaderParameterType::Float, vec![2.0]),
            param("tint", ShaderParameterType::Vec3, vec![1.0, 0.5, 0.25]),
        ]);
        let material = Material::new(&mut device, &def, tex, "m");
        assert_eq!(material.parameter("intensity").unwrap().offset, 0);
        assert_eq!(material.parameter("tint").unwrap().offset, 4);

        let layout = device.bind_group_layout(material.layout()).unwrap();
        let storage = layout.entries.iter().find(|e| e.binding == 6).unwrap();
        assert!(matches!(
            storage.ty,
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                ..
            }
        ));

        let buffer = material.dynamic_buffer().unwrap();
        let contents = device.buffer_contents(buffer).unwrap();
        let data: DynamicUniformsData = bytemuck::pod_read_unaligned(&contents[..128]);
        assert_eq!(data.slots[0], [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(data.slots[1], [1.0, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn resize_only_grows() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let def = with_parameters(vec![param("a", ShaderParameterType::Vec4, vec![])]);
        let mut material = Material::new(&mut device, &def, tex, "m");
        let layout = material.layout();
        let first_group = material.bind_group();

        material.resize_dynamic_uniforms(&mut device, 1);
        assert_eq!(material.bind_group(), first_group);

        material.resize_dynamic_uniforms(&mut device, 4);
        assert_eq!(material.dynamic_capacity(), 4);
        assert_ne!(material.bind_group(), first_group);
        assert_eq!(material.layout(), layout);
        let buffer = device.buffer(material.dynamic_buffer().unwrap()).unwrap();
        assert_eq!(buffer.desc.size, 4 * 128);
        assert_eq!(device.live_objects().buffers, 1);
        assert_eq!(device.live_objects().bind_groups, 1);
    }

    #[test]
    fn resize_without_parameters_is_noop() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let mut material = Material::new(&mut device, &MaterialDef::default(), tex, "m");
        material.resize_dynamic_uniforms(&mut device, 8);
        assert_eq!(material.dynamic_capacity(), 0);
        assert_eq!(device.live_objects().buffers, 0);
    }

    #[test]
    fn write_targets_element_offset() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let def = with_parameters(vec![param("a", ShaderParameterType::Float, vec![0.0])]);
        let mut material = Material::new(&mut device, &def, tex, "m");
        material.resize_dynamic_uniforms(&mut device, 2);
        let mut data = DynamicUniformsData::default();
        data.set(0, &[7.0]);
        material.write_dynamic_uniforms(&device, 1, &data);
        material.write_dynamic_uniforms(&device, 2, &data);
        let writes = device.take_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].offset, 128);
    }

    #[test]
    fn too_many_parameters_are_capped() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let defs = (0..10)
            .map(|i| param(&format!("p{i}"), ShaderParameterType::Float, vec![]))
            .collect();
        let material = Material::new(&mut device, &with_parameters(defs), tex, "m");
        assert_eq!(material.parameters().len(), MAX_PARAMETER_SLOTS);
        assert_eq!(material.parameters()[7].offset, 28);
    }

    #[test]
    fn blend_states() {
        let none = blend_state(BlendMode::None);
        assert_eq!(none.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(none.color.dst_factor, wgpu::BlendFactor::Zero);
        let blend = blend_state(BlendMode::Blend);
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(blend.alpha.src_factor, wgpu::BlendFactor::One);
        let additive = blend_state(BlendMode::Additive);
        assert_eq!(additive.color.dst_factor, wgpu::BlendFactor::One);
        assert_eq!(additive.alpha.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn alpha_blend_material_blends() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [false; 5]);
        let def = MaterialDef {
            alpha_mode: AlphaMode::Blend,
            ..Default::default()
        };
        let material = Material::new(&mut device, &def, tex, "m");
        assert_eq!(material.blend_state(), blend_state(BlendMode::Blend));
    }

    #[test]
    fn release_leaves_shared_handles() {
        let mut device = RecordingDevice::new();
        let tex = textures(&mut device, [true; 5]);
        let def = with_parameters(vec![param("a", ShaderParameterType::Vec2, vec![1.0, 2.0])]);
        let material = Material::new(&mut device, &def, tex, "m");
        material.release(&mut device);
        let live = device.live_objects();
        assert_eq!(live.textures, 5);
        assert_eq!(live.samplers, 1);
        assert_eq!(live.total(), 6);
    }
}
