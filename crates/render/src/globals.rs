//! Per-frame global uniforms bound at group 0 of every model pipeline.

use crate::descriptors::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindingResource,
    BufferDescriptor, uniform_layout_entry,
};
use crate::device::{GpuDevice, RenderPassEncoder};
use crate::handles::{BindGroupId, BindGroupLayoutId, BufferId, GpuObject};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// CPU mirror of the `GlobalUniforms` WGSL struct in the shader prelude.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub time: f32,
    pub window_width: f32,
    pub window_height: f32,
    pub _pad: f32,
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            camera_position: [0.0; 4],
            time: 0.0,
            window_width: 0.0,
            window_height: 0.0,
            _pad: 0.0,
        }
    }
}

impl GlobalUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(
        projection: Mat4,
        view: Mat4,
        camera_position: Vec3,
        time: f32,
        window: (u32, u32),
    ) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_position: camera_position.extend(1.0).to_array(),
            time,
            window_width: window.0 as f32,
            window_height: window.1 as f32,
            _pad: 0.0,
        }
    }

    /// Uniforms for frames without a camera: a pixel-space orthographic projection.
    pub fn screen_space(time: f32, width: u32, height: u32) -> Self {
        let projection = Mat4::orthographic_rh(0.0, width as f32, 0.0, height as f32, -1.0, 1.0);
        Self::new(projection, Mat4::IDENTITY, Vec3::ZERO, time, (width, height))
    }
}

/// The global uniform buffer, its layout and bind group.
#[derive(Debug, Clone, Copy)]
pub struct GlobalUniformsBinding {
    pub layout: BindGroupLayoutId,
    pub buffer: BufferId,
    pub bind_group: BindGroupId,
}

impl GlobalUniformsBinding {
    pub fn create(device: &mut dyn GpuDevice) -> Self {
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: "global_uniforms_layout".into(),
            entries: vec![uniform_layout_entry(0, GlobalUniforms::SIZE)],
        });
        let buffer = device.create_buffer_init(
            &BufferDescriptor {
                label: "global_uniforms".into(),
                size: GlobalUniforms::SIZE,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
            bytemuck::bytes_of(&GlobalUniforms::default()),
        );
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: "global_uniforms".into(),
            layout,
            entries: vec![BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer {
                    buffer,
                    offset: 0,
                    size: Some(GlobalUniforms::SIZE),
                },
            }],
        });
        Self {
            layout,
            buffer,
            bind_group,
        }
    }

    /// Upload this frame's values and bind them at group 0.
    pub fn update(
        &self,
        device: &dyn GpuDevice,
        pass: &mut dyn RenderPassEncoder,
        uniforms: &GlobalUniforms,
    ) {
        device.write_buffer(self.buffer, 0, bytemuck::bytes_of(uniforms));
        pass.set_bind_group(0, self.bind_group);
    }

    pub fn release(self, device: &mut dyn GpuDevice) {
        device.release(GpuObject::BindGroup(self.bind_group));
        device.release(GpuObject::Buffer(self.buffer));
        device.release(GpuObject::BindGroupLayout(self.layout));
    }
}
