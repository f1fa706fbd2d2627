//! Per-node and per-instance transform uniforms.

use glam::Mat4;
use hearth_render::{
    BindGroupDescriptor, BindGroupEntry, BindGroupId, BindGroupLayoutDescriptor,
    BindGroupLayoutId, BindingResource, BufferDescriptor, BufferId, GpuDevice, GpuObject,
    uniform_layout_entry,
};

/// Instances drawn per render call; extra transforms are ignored.
pub const MAX_INSTANCES: usize = 256;

pub const LOCAL_UNIFORMS_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;
pub const INSTANCE_UNIFORMS_SIZE: u64 = LOCAL_UNIFORMS_SIZE * MAX_INSTANCES as u64;

/// A uniform buffer with the bind group exposing it at binding 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBinding {
    pub buffer: BufferId,
    pub bind_group: BindGroupId,
}

impl UniformBinding {
    fn create(device: &mut dyn GpuDevice, layout: BindGroupLayoutId, label: String, size: u64) -> Self {
        let buffer = device.create_buffer(&BufferDescriptor {
            label: label.clone(),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label,
            layout,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer,
                    offset: 0,
                    size: Some(size),
                },
            }],
        });
        Self { buffer, bind_group }
    }

    fn release(self, device: &mut dyn GpuDevice) {
        device.release(GpuObject::BindGroup(self.bind_group));
        device.release(GpuObject::Buffer(self.buffer));
    }
}

/// Group 1 (node transform) and group 2 (instance array) of every model
/// pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelUniforms {
    pub local_layout: BindGroupLayoutId,
    pub instance_layout: BindGroupLayoutId,
    /// One per asset node, indexed like the asset's node list.
    pub nodes: Vec<UniformBinding>,
    pub instances: UniformBinding,
}

impl ModelUniforms {
    pub fn create(device: &mut dyn GpuDevice, label: &str, node_count: usize) -> Self {
        let local_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: format!("{label}:local_layout"),
            entries: vec![uniform_layout_entry(0, LOCAL_UNIFORMS_SIZE)],
        });
        let instance_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: format!("{label}:instance_layout"),
            entries: vec![uniform_layout_entry(0, INSTANCE_UNIFORMS_SIZE)],
        });
        let nodes = (0..node_count)
            .map(|i| {
                UniformBinding::create(
                    device,
                    local_layout,
                    format!("{label}:node{i}"),
                    LOCAL_UNIFORMS_SIZE,
                )
            })
            .collect();
        let instances = UniformBinding::create(
            device,
            instance_layout,
            format!("{label}:instances"),
            INSTANCE_UNIFORMS_SIZE,
        );
        Self {
            local_layout,
            instance_layout,
            nodes,
            instances,
        }
    }

    /// Upload instance transforms, at most [`MAX_INSTANCES`]. Returns the
    /// count written.
    pub fn write_instances(&self, device: &dyn GpuDevice, transforms: &[Mat4]) -> u32 {
        let transforms = &transforms[..transforms.len().min(MAX_INSTANCES)];
        if transforms.is_empty() {
            return 0;
        }
        device.write_buffer(self.instances.buffer, 0, bytemuck::cast_slice(transforms));
        transforms.len() as u32
    }

    pub fn write_node(&self, device: &dyn GpuDevice, node: usize, model: &Mat4) -> Option<BindGroupId> {
        let binding = self.nodes.get(node)?;
        device.write_buffer(binding.buffer, 0, bytemuck::bytes_of(model));
        Some(binding.bind_group)
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        for node in self.nodes {
            node.release(device);
        }
        self.instances.release(device);
        device.release(GpuObject::BindGroupLayout(self.local_layout));
        device.release(GpuObject::BindGroupLayout(self.instance_layout));
    }
}
