//! Hierarchical instanced drawing.

use super::GpuState;
use super::pipeline::PrimitiveRenderData;
use glam::Mat4;
use hearth_assets::Asset;
use hearth_assets::graph::visit_depth_first;
use hearth_render::{GpuDevice, RenderPassEncoder};

pub const LOCAL_GROUP: u32 = 1;
pub const INSTANCE_GROUP: u32 = 2;
pub const MATERIAL_GROUP: u32 = 3;

/// Draw every built primitive once per instance transform. Returns the
/// number of draw calls issued.
pub fn render(
    asset: &Asset,
    gpu: &GpuState,
    pass: &mut dyn RenderPassEncoder,
    device: &dyn GpuDevice,
    instances: &[Mat4],
) -> usize {
    let instance_count = gpu.uniforms.write_instances(device, instances);
    if instance_count == 0 {
        return 0;
    }
    pass.set_bind_group(INSTANCE_GROUP, gpu.uniforms.instances.bind_group);

    let mut draws = 0;
    visit_depth_first(&asset.nodes, |node, model| {
        if node.is_collision {
            return;
        }
        let Some(mesh) = node.mesh.and_then(|m| gpu.meshes.get(m)) else {
            return;
        };
        let Some(local) = gpu.uniforms.write_node(device, node.index, &model) else {
            return;
        };
        pass.set_bind_group(LOCAL_GROUP, local);
        for primitive in &mesh.primitives {
            if draw_primitive(gpu, primitive, pass, instance_count) {
                draws += 1;
            }
        }
    });
    draws
}

fn draw_primitive(
    gpu: &GpuState,
    primitive: &PrimitiveRenderData,
    pass: &mut dyn RenderPassEncoder,
    instance_count: u32,
) -> bool {
    let Some(material) = gpu.materials.get(primitive.material) else {
        return false;
    };
    pass.set_bind_group(MATERIAL_GROUP, material.bind_group());
    pass.set_pipeline(primitive.pipeline);
    for binding in &primitive.vertex_bindings {
        if let Some(buffer) = gpu.buffers.get(binding.buffer) {
            pass.set_vertex_buffer(binding.slot, *buffer, binding.offset);
        }
    }
    match primitive.index {
        Some(index) => {
            let Some(buffer) = gpu.buffers.get(index.buffer) else {
                return false;
            };
            pass.set_index_buffer(*buffer, index.format, index.offset);
            pass.draw_indexed(0..index.count, 0, 0..instance_count);
        }
        None => pass.draw(0..primitive.vertex_count, 0..instance_count),
    }
    true
}
