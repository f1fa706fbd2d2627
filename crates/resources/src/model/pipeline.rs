//! Per-primitive vertex/index bindings and render pipelines.

use super::material::Material;
use super::uniforms::ModelUniforms;
use hearth_assets::Asset;
use hearth_assets::ir::{Accessor, DataType, Dimensions, Mode, Primitive, Target};
use hearth_render::{
    GpuDevice, GpuObject, PipelineError, PipelineLayoutDescriptor, PipelineLayoutId,
    RenderContext, RenderPipelineDescriptor, RenderPipelineId, ShaderModuleId, VertexBufferLayout,
};
use std::collections::BTreeMap;

pub const VERTEX_ENTRY: &str = "vertexMain";
pub const FRAGMENT_ENTRY: &str = "fragmentMain";

/// Shader location an attribute semantic is bound to.
pub fn shader_location(semantic: &str) -> Option<u32> {
    match semantic {
        "POSITION" => Some(0),
        "NORMAL" => Some(1),
        "TEXCOORD_0" => Some(2),
        "COLOR_0" => Some(3),
        _ => None,
    }
}

pub fn vertex_format(accessor: &Accessor) -> Option<wgpu::VertexFormat> {
    match (accessor.component, accessor.dimensions) {
        (DataType::F32, Dimensions::Scalar) => Some(wgpu::VertexFormat::Float32),
        (DataType::F32, Dimensions::Vec2) => Some(wgpu::VertexFormat::Float32x2),
        (DataType::F32, Dimensions::Vec3) => Some(wgpu::VertexFormat::Float32x3),
        (DataType::F32, Dimensions::Vec4) => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}

/// The view's byte stride, or the packed size of float VEC2 / VEC3
/// accessors. Anything else without a stride gets 0.
pub fn vertex_stride(asset: &Asset, accessor: &Accessor) -> u64 {
    if let Some(stride) = accessor
        .view
        .and_then(|v| asset.views.get(v))
        .and_then(|v| v.stride)
    {
        return stride as u64;
    }
    match (accessor.component, accessor.dimensions) {
        (DataType::F32, Dimensions::Vec2) => 8,
        (DataType::F32, Dimensions::Vec3) => 12,
        (component, dimensions) => {
            tracing::error!(?component, ?dimensions, "no stride for vertex accessor; using 0");
            0
        }
    }
}

pub fn topology(mode: Mode) -> wgpu::PrimitiveTopology {
    match mode {
        Mode::Points => wgpu::PrimitiveTopology::PointList,
        Mode::Lines => wgpu::PrimitiveTopology::LineList,
        Mode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Mode::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Mode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        Mode::LineLoop | Mode::TriangleFan => {
            tracing::error!(?mode, "unsupported primitive mode; drawing as triangle list");
            wgpu::PrimitiveTopology::TriangleList
        }
    }
}

pub fn index_format(component: DataType) -> Option<wgpu::IndexFormat> {
    match component {
        DataType::U16 => Some(wgpu::IndexFormat::Uint16),
        DataType::U32 => Some(wgpu::IndexFormat::Uint32),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexBinding {
    pub semantic: String,
    pub slot: u32,
    /// Asset buffer index.
    pub buffer: usize,
    pub offset: u64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexBinding {
    pub buffer: usize,
    pub offset: u64,
    pub count: u32,
    pub format: wgpu::IndexFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveRenderData {
    /// Index of the primitive within its mesh.
    pub primitive: usize,
    pub vertex_bindings: Vec<VertexBinding>,
    pub index: Option<IndexBinding>,
    pub vertex_count: u32,
    pub material: usize,
    pub pipeline_layout: PipelineLayoutId,
    pub pipeline: RenderPipelineId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshRenderData {
    pub primitives: Vec<PrimitiveRenderData>,
}

/// Everything pipeline construction reads.
pub struct PipelineBuilder<'a> {
    pub asset: &'a Asset,
    pub materials: &'a [Material],
    pub shaders: &'a BTreeMap<String, Option<ShaderModuleId>>,
    pub uniforms: &'a ModelUniforms,
    pub ctx: &'a RenderContext,
    pub label: &'a str,
}

impl PipelineBuilder<'_> {
    /// Render data for every mesh, indexed like the asset's mesh list.
    /// Primitives whose pipeline the device rejects are logged and skipped.
    pub fn build(&self, device: &mut dyn GpuDevice) -> Vec<MeshRenderData> {
        self.asset
            .meshes
            .iter()
            .enumerate()
            .map(|(m, mesh)| MeshRenderData {
                primitives: mesh
                    .primitives
                    .iter()
                    .enumerate()
                    .filter_map(|(p, primitive)| match self.build_primitive(device, m, p, primitive) {
                        Ok(data) => data,
                        Err(e) => {
                            tracing::error!(
                                path = %self.label,
                                mesh = m,
                                primitive = p,
                                error = %e,
                                "pipeline rejected; primitive skipped"
                            );
                            None
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// All-or-nothing [`build`](Self::build): the first rejected pipeline
    /// releases everything built so far and is returned.
    pub fn try_build(&self, device: &mut dyn GpuDevice) -> Result<Vec<MeshRenderData>, PipelineError> {
        let mut meshes = Vec::with_capacity(self.asset.meshes.len());
        for (m, mesh) in self.asset.meshes.iter().enumerate() {
            let mut primitives = Vec::new();
            for (p, primitive) in mesh.primitives.iter().enumerate() {
                match self.build_primitive(device, m, p, primitive) {
                    Ok(data) => primitives.extend(data),
                    Err(e) => {
                        meshes.push(MeshRenderData { primitives });
                        release_meshes(meshes, device);
                        return Err(e);
                    }
                }
            }
            meshes.push(MeshRenderData { primitives });
        }
        Ok(meshes)
    }

    fn build_primitive(
        &self,
        device: &mut dyn GpuDevice,
        mesh: usize,
        index: usize,
        primitive: &Primitive,
    ) -> Result<Option<PrimitiveRenderData>, PipelineError> {
        let label = format!("model:{}:mesh{mesh}:prim{index}", self.label);
        let Some(material_index) = primitive.material else {
            tracing::debug!(%label, "primitive has no material; skipped");
            return Ok(None);
        };
        let Some(material) = self.materials.get(material_index) else {
            return Ok(None);
        };
        let Some(shader) = self.shaders.get(&material.shader_path).copied().flatten() else {
            tracing::error!(%label, shader = %material.shader_path, "shader not available; skipped");
            return Ok(None);
        };

        let mut vertex_bindings = Vec::new();
        let mut buffers = Vec::new();
        for (semantic, accessor_index) in &primitive.attributes {
            let Some(location) = shader_location(semantic) else {
                tracing::error!(%label, %semantic, "unmapped vertex attribute");
                continue;
            };
            let Some(accessor) = self.asset.accessors.get(*accessor_index) else {
                tracing::error!(%label, %semantic, accessor = accessor_index, "missing accessor");
                continue;
            };
            let Some(format) = vertex_format(accessor) else {
                tracing::error!(
                    %label,
                    %semantic,
                    component = ?accessor.component,
                    dimensions = ?accessor.dimensions,
                    "unsupported vertex format"
                );
                continue;
            };
            let Some((buffer, offset)) = self.asset.accessor_buffer_offset(*accessor_index) else {
                tracing::error!(%label, %semantic, "vertex accessor has no buffer view");
                continue;
            };
            let slot = buffers.len() as u32;
            buffers.push(VertexBufferLayout {
                array_stride: vertex_stride(self.asset, accessor),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: vec![wgpu::VertexAttribute {
                    format,
                    offset: 0,
                    shader_location: location,
                }],
            });
            vertex_bindings.push(VertexBinding {
                semantic: semantic.clone(),
                slot,
                buffer,
                offset: offset as u64,
                count: accessor.count as u32,
            });
        }

        let index_binding = primitive
            .indices
            .and_then(|accessor| self.index_binding(&label, accessor));
        let vertex_count = primitive
            .attribute("POSITION")
            .and_then(|a| self.asset.accessors.get(a))
            .map(|a| a.count as u32)
            .or_else(|| vertex_bindings.first().map(|b| b.count))
            .unwrap_or(0);

        let topology = topology(primitive.mode);
        let strip_index_format = match topology {
            wgpu::PrimitiveTopology::LineStrip | wgpu::PrimitiveTopology::TriangleStrip => {
                index_binding.map(|ib| ib.format)
            }
            _ => None,
        };

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: label.clone(),
            bind_group_layouts: vec![
                self.ctx.global_layout,
                self.uniforms.local_layout,
                self.uniforms.instance_layout,
                material.layout(),
            ],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: label.clone(),
            layout: pipeline_layout,
            shader,
            vertex_entry: Some(VERTEX_ENTRY.into()),
            fragment_entry: Some(FRAGMENT_ENTRY.into()),
            buffers,
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(self.ctx.depth_stencil()),
            multisample: self.ctx.multisample(),
            targets: vec![wgpu::ColorTargetState {
                format: self.ctx.color_format,
                blend: Some(material.blend_state()),
                write_mask: wgpu::ColorWrites::ALL,
            }],
        });
        let pipeline = match pipeline {
            Ok(pipeline) => pipeline,
            Err(e) => {
                device.release(GpuObject::PipelineLayout(pipeline_layout));
                return Err(e);
            }
        };
        tracing::trace!(%label, attributes = vertex_bindings.len(), indexed = index_binding.is_some(), "pipeline built");

        Ok(Some(PrimitiveRenderData {
            primitive: index,
            vertex_bindings,
            index: index_binding,
            vertex_count,
            material: material_index,
            pipeline_layout,
            pipeline,
        }))
    }

    fn index_binding(&self, label: &str, accessor_index: usize) -> Option<IndexBinding> {
        let accessor = self.asset.accessors.get(accessor_index)?;
        let view = accessor.view.and_then(|v| self.asset.views.get(v))?;
        if view.target != Some(Target::ElementArrayBuffer) {
            tracing::error!(label, "index accessor is not on an element-array view; drawing non-indexed");
            return None;
        }
        let Some(format) = index_format(accessor.component) else {
            tracing::error!(label, component = ?accessor.component, "unsupported index format; drawing non-indexed");
            return None;
        };
        let (buffer, offset) = self.asset.accessor_buffer_offset(accessor_index)?;
        Some(IndexBinding {
            buffer,
            offset: offset as u64,
            count: accessor.count as u32,
            format,
        })
    }
}

pub fn release_meshes(meshes: Vec<MeshRenderData>, device: &mut dyn GpuDevice) {
    for primitive in meshes.into_iter().flat_map(|m| m.primitives) {
        device.release(GpuObject::RenderPipeline(primitive.pipeline));
        device.release(GpuObject::PipelineLayout(primitive.pipeline_layout));
    }
}
