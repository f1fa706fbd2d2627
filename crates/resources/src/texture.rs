use crate::ResourceError;
use hearth_common::ResourceState;
use hearth_render::{GpuDevice, GpuObject, TextureDescriptor, TextureId};

/// How texel values are interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

impl ColorSpace {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// Decode PNG or JPEG bytes into tightly packed RGBA8.
pub fn decode_rgba(bytes: &[u8]) -> Result<(u32, u32, Vec<u8>), ResourceError> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok((width, height, image.into_raw()))
}

/// A 2D texture resource.
#[derive(Debug)]
pub struct Texture2D {
    path: String,
    state: ResourceState,
    failure: Option<String>,
    texture: Option<TextureId>,
    width: u32,
    height: u32,
}

impl Texture2D {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: ResourceState::Unloaded,
            failure: None,
            texture: None,
            width: 0,
            height: 0,
        }
    }

    /// Build a loaded texture straight from encoded image bytes.
    pub fn from_encoded(
        device: &mut dyn GpuDevice,
        label: &str,
        bytes: &[u8],
        color_space: ColorSpace,
    ) -> Result<Self, ResourceError> {
        let mut texture = Self::new(label);
        texture.upload(device, bytes, color_space)?;
        Ok(texture)
    }

    /// File loads are color data, so they are sampled as sRGB.
    pub fn load(&mut self, bytes: &[u8], device: &mut dyn GpuDevice) -> Result<(), ResourceError> {
        self.upload(device, bytes, ColorSpace::Srgb)
    }

    fn upload(
        &mut self,
        device: &mut dyn GpuDevice,
        bytes: &[u8],
        color_space: ColorSpace,
    ) -> Result<(), ResourceError> {
        let (width, height, rgba) = decode_rgba(bytes)?;
        let texture = device.create_texture_2d(
            &TextureDescriptor {
                label: self.path.clone(),
                width,
                height,
                format: color_space.format(),
            },
            &rgba,
        );
        self.texture = Some(texture);
        self.width = width;
        self.height = height;
        self.state = ResourceState::Loaded;
        tracing::debug!(path = %self.path, width, height, ?color_space, "texture uploaded");
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn fail(&mut self, reason: String) {
        self.state = ResourceState::Error;
        self.failure = Some(reason);
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(texture) = self.texture.take() {
            device.release(GpuObject::Texture(texture));
        }
        self.state = ResourceState::Unloaded;
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}
