//! Resources a model waits on before building GPU state: one shader per
//! distinct material shader path, and one texture per image.

use crate::texture::{ColorSpace, Texture2D};
use hearth_assets::Asset;
use hearth_assets::ir::ImageSource;
use hearth_render::GpuDevice;
use std::collections::BTreeSet;

/// Distinct shader paths the materials render with.
pub fn shader_paths(asset: &Asset) -> BTreeSet<String> {
    asset.materials.iter().map(|m| m.shader_path()).collect()
}

/// Images sampled as base color or emissive hold color data; everything
/// else is linear.
pub fn image_color_spaces(asset: &Asset) -> Vec<ColorSpace> {
    let mut spaces = vec![ColorSpace::Linear; asset.images.len()];
    for material in &asset.materials {
        for texture in [material.base_color_texture, material.emissive_texture]
            .into_iter()
            .flatten()
        {
            if let Some(space) = asset
                .texture_image(texture)
                .and_then(|image| spaces.get_mut(image))
            {
                *space = ColorSpace::Srgb;
            }
        }
    }
    spaces
}

/// Decode every embedded image. Images that cannot be turned into a
/// texture resolve to `None` so the model can still complete.
pub fn load_images(asset: &Asset, device: &mut dyn GpuDevice, label: &str) -> Vec<Option<Texture2D>> {
    let spaces = image_color_spaces(asset);
    asset
        .images
        .iter()
        .zip(spaces)
        .enumerate()
        .map(|(index, (image, space))| {
            let name = image.name.as_deref().unwrap_or_default();
            match &image.source {
                ImageSource::Uri(uri) => {
                    tracing::error!(label, image = index, %uri, "external image uri not supported");
                    None
                }
                ImageSource::View { view, mime_type } => {
                    let Some(bytes) = asset.view_bytes(*view) else {
                        tracing::error!(label, image = index, view, "image view out of range");
                        return None;
                    };
                    let texture_label = format!("{label}:image{index}");
                    match Texture2D::from_encoded(device, &texture_label, bytes, space) {
                        Ok(texture) => Some(texture),
                        Err(e) => {
                            tracing::error!(label, image = index, name, %mime_type, error = %e, "embedded image decode failed");
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::png_bytes;
    use hearth_assets::builder::{AssetBuilder, MaterialSpec};
    use hearth_assets::{ModelFormat, read};
    use hearth_render::RecordingDevice;

    #[test]
    fn shader_paths_are_deduplicated() {
        let mut b = AssetBuilder::new();
        for name in [Some("hull"), Some("hull"), None] {
            b.add_material(MaterialSpec {
                name: name.map(str::to_string),
                ..Default::default()
            });
        }
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        let paths: Vec<String> = shader_paths(&asset).into_iter().collect();
        assert_eq!(paths, vec!["/shaders/default.wgsl", "/shaders/hull.wgsl"]);
    }

    #[test]
    fn embedded_images_become_textures() {
        let mut b = AssetBuilder::new();
        let color = b.add_image("albedo", "image/png", &png_bytes(2, 2, [255, 0, 0, 255]));
        let normal = b.add_image("normal", "image/png", &png_bytes(2, 2, [128, 128, 255, 255]));
        b.add_material(MaterialSpec {
            name: Some("hull".into()),
            base_color_texture: Some(color),
            normal_texture: Some(normal),
            ..Default::default()
        });
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        assert_eq!(
            image_color_spaces(&asset),
            vec![ColorSpace::Srgb, ColorSpace::Linear]
        );

        let mut device = RecordingDevice::new();
        let textures = load_images(&asset, &mut device, "m");
        assert_eq!(textures.len(), 2);
        let albedo = textures[0].as_ref().unwrap();
        let desc = device.texture(albedo.texture().unwrap()).unwrap();
        assert_eq!(desc.format, wgpu::TextureFormat::Rgba8UnormSrgb);
        assert!(textures[1].is_some());
    }

    #[test]
    fn uri_and_broken_images_resolve_to_none() {
        let mut b = AssetBuilder::new();
        b.add_uri_image("albedo.png");
        b.add_image("broken", "image/png", b"not a png at all");
        let asset = read(&b.to_glb(), ModelFormat::Binary).unwrap();
        let mut device = RecordingDevice::new();
        let textures = load_images(&asset, &mut device, "m");
        assert_eq!(textures.len(), 2);
        assert!(textures.iter().all(Option::is_none));
        assert_eq!(device.live_objects().textures, 0);
    }
}
