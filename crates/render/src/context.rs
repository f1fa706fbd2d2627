use crate::globals::GlobalUniformsBinding;
use crate::handles::BindGroupLayoutId;
use crate::settings::RenderSettings;

/// What a resource needs to know about the frame it will be drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    /// Layout of group 0, owned by the render loop.
    pub global_layout: BindGroupLayoutId,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
}

impl RenderContext {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    pub fn new(
        globals: &GlobalUniformsBinding,
        color_format: wgpu::TextureFormat,
        settings: &RenderSettings,
    ) -> Self {
        Self {
            global_layout: globals.layout,
            color_format,
            depth_format: Self::DEPTH_FORMAT,
            sample_count: settings.msaa_samples,
        }
    }

    pub fn depth_stencil(&self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: self.depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }
    }

    pub fn multisample(&self) -> wgpu::MultisampleState {
        wgpu::MultisampleState {
            count: self.sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        }
    }
}
