//! Owned, backend-neutral object descriptors.
//!
//! These mirror the wgpu descriptors but reference other objects by handle,
//! so they can be built without a live device and inspected in tests.

use crate::handles::{
    BindGroupLayoutId, BufferId, PipelineLayoutId, SamplerId, ShaderModuleId, TextureId,
};

/// Rounds a byte size up to the next multiple of 4, the copy alignment GPU
/// buffers require.
pub fn align_to_four(size: u64) -> u64 {
    size.div_ceil(4) * 4
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDescriptor {
    pub label: String,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub address_mode: wgpu::AddressMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: "linear_sampler".into(),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            address_mode: wgpu::AddressMode::ClampToEdge,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupLayoutDescriptor {
    pub label: String,
    pub entries: Vec<wgpu::BindGroupLayoutEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    Buffer {
        buffer: BufferId,
        offset: u64,
        size: Option<u64>,
    },
    Texture(TextureId),
    Sampler(SamplerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindGroupDescriptor {
    pub label: String,
    pub layout: BindGroupLayoutId,
    pub entries: Vec<BindGroupEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineLayoutDescriptor {
    pub label: String,
    pub bind_group_layouts: Vec<BindGroupLayoutId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: wgpu::VertexStepMode,
    pub attributes: Vec<wgpu::VertexAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor {
    pub label: String,
    pub layout: PipelineLayoutId,
    pub shader: ShaderModuleId,
    /// `None` selects the module's only vertex entry point.
    pub vertex_entry: Option<String>,
    /// `None` selects the module's only fragment entry point.
    pub fragment_entry: Option<String>,
    pub buffers: Vec<VertexBufferLayout>,
    pub primitive: wgpu::PrimitiveState,
    pub depth_stencil: Option<wgpu::DepthStencilState>,
    pub multisample: wgpu::MultisampleState,
    pub targets: Vec<wgpu::ColorTargetState>,
}

/// A single uniform-buffer layout entry visible to both shader stages.
pub fn uniform_layout_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(min_size),
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_to_four(0), 0);
        assert_eq!(align_to_four(1), 4);
        assert_eq!(align_to_four(4), 4);
        assert_eq!(align_to_four(13), 16);
    }

    #[test]
    fn uniform_entry_has_min_size() {
        let entry = uniform_layout_entry(0, 64);
        match entry.ty {
            wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                min_binding_size,
                ..
            } => assert_eq!(min_binding_size.map(|s| s.get()), Some(64)),
            other => panic!("unexpected binding type {other:?}"),
        }
    }
}
