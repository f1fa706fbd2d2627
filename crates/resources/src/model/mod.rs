//! glTF model resource.
//!
//! A model moves through [`LoadState`]: its bytes are parsed into an
//! [`Asset`], dependents (material shaders, embedded images) are resolved,
//! and once the last one completes the GPU state is built in one step:
//! buffers, materials, node and instance uniforms, pipelines and the
//! collision shape. A Loaded model renders its node forest with every
//! instance transform in a single pass and rebuilds its pipelines when one
//! of its shaders is injected.

pub mod buffers;
pub mod dependents;
pub mod material;
pub mod pipeline;
pub mod render;
pub mod state;
pub mod uniforms;

pub use state::{LoadEvent, LoadState};

use crate::ModelError;
use crate::bus::{ShaderInjectedBus, Subscription};
use crate::texture::Texture2D;
use glam::Mat4;
use hearth_assets::{
    Asset, AttachmentPoint, CollisionShape, MaterialDef, attachment_points, collision_shape,
};
use hearth_common::ResourceState;
use hearth_render::{
    BufferId, GpuDevice, GpuObject, RenderContext, RenderPassEncoder, SamplerDescriptor,
    SamplerId, ShaderModuleId, TextureId,
};
use material::{Material, MaterialTextures};
use pipeline::{MeshRenderData, PipelineBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uniforms::ModelUniforms;

/// GPU objects owned by a loaded model.
#[derive(Debug)]
pub struct GpuState {
    pub sampler: SamplerId,
    /// One per asset buffer.
    pub buffers: Vec<BufferId>,
    /// One per asset material.
    pub materials: Vec<Material>,
    pub uniforms: ModelUniforms,
    /// One per asset mesh.
    pub meshes: Vec<MeshRenderData>,
}

#[derive(Debug)]
pub struct ModelResource {
    path: String,
    state: LoadState,
    error: Option<ModelError>,
    asset: Option<Asset>,
    attachments: Vec<AttachmentPoint>,
    collision: Option<Arc<CollisionShape>>,
    /// Shader path to compiled module, `None` until delivered.
    shaders: BTreeMap<String, Option<ShaderModuleId>>,
    /// One per asset image.
    textures: Vec<Option<Texture2D>>,
    gpu: Option<GpuState>,
    subscription: Option<Subscription>,
}

impl ModelResource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: LoadState::Unloaded,
            error: None,
            asset: None,
            attachments: Vec::new(),
            collision: None,
            shaders: BTreeMap::new(),
            textures: Vec::new(),
            gpu: None,
            subscription: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> ResourceState {
        self.state.resource_state()
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    pub fn failure(&self) -> Option<&ModelError> {
        self.error.as_ref()
    }

    fn transition(&mut self, event: LoadEvent) {
        let next = self.state.next(event);
        if next != self.state {
            tracing::debug!(path = %self.path, from = ?self.state, to = ?next, "model state");
        }
        self.state = next;
    }

    fn fail_with(&mut self, event: LoadEvent, error: ModelError) {
        tracing::error!(path = %self.path, error = %error, "model load failed");
        self.error = Some(error);
        self.transition(event);
    }

    /// The model file could not be read.
    pub fn fail(&mut self, reason: String) {
        self.fail_with(LoadEvent::ReadFailed, ModelError::Read(reason));
    }

    /// Parse the file and start resolving dependents. Returns the shader
    /// paths the caller must load and deliver through
    /// [`on_shader_ready`](Self::on_shader_ready). With nothing to wait for,
    /// the GPU state is built before this returns.
    pub fn on_bytes(
        &mut self,
        bytes: &[u8],
        device: &mut dyn GpuDevice,
        ctx: &RenderContext,
    ) -> Vec<String> {
        self.transition(LoadEvent::BytesReady);
        if self.state != LoadState::ParsingAsset {
            return Vec::new();
        }
        let asset = match hearth_assets::read_path(&self.path, bytes) {
            Ok(asset) => asset,
            Err(e) => {
                self.fail_with(LoadEvent::ParseFailed, e.into());
                return Vec::new();
            }
        };

        self.attachments = attachment_points(&asset);
        let shader_paths = dependents::shader_paths(&asset);
        self.shaders = shader_paths.iter().map(|p| (p.clone(), None)).collect();
        self.transition(LoadEvent::DependentsDiscovered(
            shader_paths.len() + asset.images.len(),
        ));
        tracing::debug!(
            path = %self.path,
            shaders = shader_paths.len(),
            images = asset.images.len(),
            attachments = self.attachments.len(),
            "model parsed"
        );

        self.textures = dependents::load_images(&asset, device, &self.path);
        self.asset = Some(asset);
        for _ in 0..self.textures.len() {
            self.transition(LoadEvent::DependentReady);
        }
        self.build_if_ready(device, ctx);

        if matches!(self.state, LoadState::AwaitingDependents { .. }) {
            shader_paths.into_iter().collect()
        } else {
            Vec::new()
        }
    }

    /// A requested shader compiled. Deliveries for unknown or already
    /// delivered paths are ignored.
    pub fn on_shader_ready(
        &mut self,
        path: &str,
        module: ShaderModuleId,
        device: &mut dyn GpuDevice,
        ctx: &RenderContext,
    ) {
        let Some(slot) = self.shaders.get_mut(path) else {
            return;
        };
        if slot.is_some() {
            return;
        }
        *slot = Some(module);
        self.transition(LoadEvent::DependentReady);
        self.build_if_ready(device, ctx);
    }

    pub fn on_dependent_failed(&mut self, path: &str, reason: &str) {
        if !matches!(self.state, LoadState::AwaitingDependents { .. })
            || !self.shaders.contains_key(path)
        {
            return;
        }
        self.fail_with(
            LoadEvent::DependentFailed,
            ModelError::DependentFailed {
                path: path.to_string(),
                reason: reason.to_string(),
            },
        );
    }

    fn build_if_ready(&mut self, device: &mut dyn GpuDevice, ctx: &RenderContext) {
        if self.state == LoadState::BuildingGpuState {
            self.build_gpu_state(device, ctx);
        }
    }

    fn build_gpu_state(&mut self, device: &mut dyn GpuDevice, ctx: &RenderContext) {
        let Some(asset) = self.asset.as_ref() else {
            return;
        };
        let collision = match collision_shape(asset) {
            Ok(shape) => shape,
            Err(e) => {
                self.fail_with(LoadEvent::GpuBuildFailed, e.into());
                return;
            }
        };

        let label = self.path.as_str();
        let buffers = buffers::upload(asset, device, label);
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: format!("{label}:sampler"),
            ..Default::default()
        });
        let materials: Vec<Material> = asset
            .materials
            .iter()
            .map(|def| {
                let textures = MaterialTextures {
                    sampler,
                    slots: material_textures(asset, &self.textures, def),
                };
                Material::new(device, def, textures, label)
            })
            .collect();
        let uniforms = ModelUniforms::create(device, label, asset.nodes.len());
        let meshes = PipelineBuilder {
            asset,
            materials: &materials,
            shaders: &self.shaders,
            uniforms: &uniforms,
            ctx,
            label,
        }
        .build(device);

        let primitives: usize = meshes.iter().map(|m| m.primitives.len()).sum();
        tracing::info!(
            path = %self.path,
            nodes = asset.nodes.len(),
            materials = materials.len(),
            primitives,
            collision = collision.is_some(),
            "model loaded"
        );
        self.gpu = Some(GpuState {
            sampler,
            buffers,
            materials,
            uniforms,
            meshes,
        });
        self.collision = collision.map(Arc::new);
        self.transition(LoadEvent::GpuStateBuilt);
    }

    /// Draw the model once per transform (at most
    /// [`MAX_INSTANCES`](uniforms::MAX_INSTANCES)). No-op unless Loaded.
    pub fn render(
        &self,
        pass: &mut dyn RenderPassEncoder,
        device: &dyn GpuDevice,
        instance_transforms: &[Mat4],
    ) {
        if self.state != LoadState::Loaded {
            return;
        }
        if let (Some(asset), Some(gpu)) = (&self.asset, &self.gpu) {
            render::render(asset, gpu, pass, device, instance_transforms);
        }
    }

    pub fn attachment_points(&self) -> &[AttachmentPoint] {
        &self.attachments
    }

    pub fn attachment_point(&self, name: &str) -> Option<&AttachmentPoint> {
        self.attachments.iter().find(|p| p.name == name)
    }

    pub fn attachment_point_at(&self, index: usize) -> Option<&AttachmentPoint> {
        let point = self.attachments.get(index);
        if point.is_none() {
            tracing::error!(
                path = %self.path,
                index,
                count = self.attachments.len(),
                "attachment point index out of range"
            );
        }
        point
    }

    pub fn collision_shape(&self) -> Option<Arc<CollisionShape>> {
        self.collision.clone()
    }

    pub fn asset(&self) -> Option<&Asset> {
        self.asset.as_ref()
    }

    pub fn gpu_state(&self) -> Option<&GpuState> {
        self.gpu.as_ref()
    }

    pub fn materials(&self) -> &[Material] {
        self.gpu.as_ref().map_or(&[], |g| g.materials.as_slice())
    }

    /// Mutable access for dynamic-uniform updates.
    pub fn material_mut(&mut self, index: usize) -> Option<&mut Material> {
        self.gpu.as_mut()?.materials.get_mut(index)
    }

    pub fn pipeline_count(&self) -> usize {
        self.gpu
            .as_ref()
            .map_or(0, |g| g.meshes.iter().map(|m| m.primitives.len()).sum())
    }

    pub fn shader_paths(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    /// Subscribe to shader injections once; later calls are no-ops.
    pub fn subscribe(&mut self, bus: &ShaderInjectedBus) {
        if self.subscription.is_none() {
            self.subscription = Some(bus.subscribe());
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Injected shaders this model renders with, since the last call.
    pub fn take_injected_shaders(&self) -> BTreeSet<String> {
        let Some(subscription) = &self.subscription else {
            return BTreeSet::new();
        };
        subscription
            .poll()
            .into_iter()
            .filter(|path| self.shaders.contains_key(path))
            .collect()
    }

    /// Swap in a recompiled shader. A Loaded model rebuilds every pipeline
    /// and returns true; the previous pipelines and layouts are released,
    /// unless the device rejects a new pipeline, in which case they stay.
    /// A model still awaiting dependents only records the module for its
    /// upcoming build.
    pub fn rebuild(
        &mut self,
        path: &str,
        module: ShaderModuleId,
        device: &mut dyn GpuDevice,
        ctx: &RenderContext,
    ) -> bool {
        let Some(slot) = self.shaders.get_mut(path) else {
            return false;
        };
        match self.state {
            LoadState::AwaitingDependents { .. } => {
                if slot.is_some() {
                    *slot = Some(module);
                }
                return false;
            }
            LoadState::Loaded => *slot = Some(module),
            _ => return false,
        }
        let (Some(asset), Some(gpu)) = (self.asset.as_ref(), self.gpu.as_mut()) else {
            return false;
        };
        let built = PipelineBuilder {
            asset,
            materials: &gpu.materials,
            shaders: &self.shaders,
            uniforms: &gpu.uniforms,
            ctx,
            label: &self.path,
        }
        .try_build(device);
        match built {
            Ok(meshes) => {
                pipeline::release_meshes(std::mem::replace(&mut gpu.meshes, meshes), device);
                tracing::info!(path = %self.path, shader = path, "model pipelines rebuilt");
                true
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path,
                    shader = path,
                    error = %e,
                    "rebuild rejected; keeping previous pipelines"
                );
                false
            }
        }
    }

    /// Free every GPU object the model owns and drop its subscription.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(gpu) = self.gpu.take() {
            pipeline::release_meshes(gpu.meshes, device);
            for material in gpu.materials {
                material.release(device);
            }
            gpu.uniforms.release(device);
            for buffer in gpu.buffers {
                device.release(GpuObject::Buffer(buffer));
            }
            device.release(GpuObject::Sampler(gpu.sampler));
        }
        for texture in self.textures.iter_mut().flatten() {
            texture.release(device);
        }
        self.textures.clear();
        self.subscription = None;
        self.state = LoadState::Unloaded;
    }
}

/// Texture handles for a material's five slots, following
/// texture → image → decoded texture.
fn material_textures(
    asset: &Asset,
    textures: &[Option<Texture2D>],
    def: &MaterialDef,
) -> [Option<TextureId>; 5] {
    def.texture_slots().map(|slot| {
        slot.and_then(|texture| asset.texture_image(texture))
            .and_then(|image| textures.get(image))
            .and_then(Option::as_ref)
            .and_then(Texture2D::texture)
    })
}
