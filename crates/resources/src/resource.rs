//! The closed set of resource kinds the system manages.

use crate::model::ModelResource;
use crate::{DataStore, FontResource, ShaderResource, Texture2D};
use hearth_common::{ResourceState, ResourceType};
use hearth_render::{GpuDevice, RenderContext};
use hearth_vfs::File;

slotmap::new_key_type! {
    /// Stable handle to a resource owned by [`ResourceSystem`](crate::ResourceSystem).
    pub struct ResourceId;
}

/// Lifecycle operations shared by every resource kind.
pub trait Loadable {
    fn path(&self) -> &str;
    fn state(&self) -> ResourceState;
    fn failure(&self) -> Option<String>;
    fn fail(&mut self, reason: String);
    fn release(&mut self, device: &mut dyn GpuDevice);
}

/// `gpu` kinds free their GPU objects on release; the rest hold none.
macro_rules! impl_loadable {
    ($ty:ty) => {
        impl_loadable!($ty, |_resource, _device| {});
    };
    ($ty:ty, gpu) => {
        impl_loadable!($ty, |resource, device| <$ty>::release(resource, device));
    };
    ($ty:ty, |$resource:ident, $device:ident| $release:expr) => {
        impl Loadable for $ty {
            fn path(&self) -> &str {
                <$ty>::path(self)
            }

            fn state(&self) -> ResourceState {
                <$ty>::state(self)
            }

            fn failure(&self) -> Option<String> {
                <$ty>::failure(self).map(ToString::to_string)
            }

            fn fail(&mut self, reason: String) {
                <$ty>::fail(self, reason)
            }

            fn release(&mut self, device: &mut dyn GpuDevice) {
                let ($resource, $device) = (self, device);
                $release
            }
        }
    };
}

impl_loadable!(DataStore);
impl_loadable!(FontResource);
impl_loadable!(ShaderResource, gpu);
impl_loadable!(Texture2D, gpu);
impl_loadable!(ModelResource, gpu);

#[derive(Debug)]
pub enum Resource {
    Shader(ShaderResource),
    Texture2D(Texture2D),
    Model(Box<ModelResource>),
    DataStore(DataStore),
    Font(FontResource),
}

impl Resource {
    pub fn new(kind: ResourceType, path: &str) -> Self {
        match kind {
            ResourceType::Shader => Resource::Shader(ShaderResource::new(path)),
            ResourceType::Texture2D => Resource::Texture2D(Texture2D::new(path)),
            ResourceType::Model => Resource::Model(Box::new(ModelResource::new(path))),
            ResourceType::DataStore => Resource::DataStore(DataStore::new(path)),
            ResourceType::Font => Resource::Font(FontResource::new(path)),
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::Shader(_) => ResourceType::Shader,
            Resource::Texture2D(_) => ResourceType::Texture2D,
            Resource::Model(_) => ResourceType::Model,
            Resource::DataStore(_) => ResourceType::DataStore,
            Resource::Font(_) => ResourceType::Font,
        }
    }

    fn loadable(&self) -> &dyn Loadable {
        match self {
            Resource::Shader(r) => r,
            Resource::Texture2D(r) => r,
            Resource::Model(r) => r.as_ref(),
            Resource::DataStore(r) => r,
            Resource::Font(r) => r,
        }
    }

    fn loadable_mut(&mut self) -> &mut dyn Loadable {
        match self {
            Resource::Shader(r) => r,
            Resource::Texture2D(r) => r,
            Resource::Model(r) => r.as_mut(),
            Resource::DataStore(r) => r,
            Resource::Font(r) => r,
        }
    }

    /// Feed a file read. Returns the paths of shaders a model now waits on.
    /// Failures are recorded on the resource, never returned.
    pub fn load(&mut self, file: File, device: &mut dyn GpuDevice, ctx: &RenderContext) -> Vec<String> {
        let result = match self {
            Resource::Model(model) => return model.on_bytes(file.data(), device, ctx),
            Resource::Shader(shader) => shader.load(file.data(), device),
            Resource::Texture2D(texture) => texture.load(file.data(), device),
            Resource::DataStore(store) => store.load(file.data()),
            Resource::Font(font) => font.load(file.data()),
        };
        if let Err(e) = result {
            tracing::error!(path = %self.path(), error = %e, "resource load failed");
            self.fail(e.to_string());
        }
        Vec::new()
    }

    pub fn path(&self) -> &str {
        self.loadable().path()
    }

    pub fn state(&self) -> ResourceState {
        self.loadable().state()
    }

    pub fn failure(&self) -> Option<String> {
        self.loadable().failure()
    }

    pub fn fail(&mut self, reason: String) {
        self.loadable_mut().fail(reason)
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.loadable_mut().release(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_render::{GlobalUniformsBinding, RecordingDevice, RenderSettings};

    fn ctx(device: &mut RecordingDevice) -> RenderContext {
        let globals = GlobalUniformsBinding::create(device);
        RenderContext::new(
            &globals,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &RenderSettings::default(),
        )
    }

    #[test]
    fn variant_matches_type() {
        for kind in [
            ResourceType::Shader,
            ResourceType::Texture2D,
            ResourceType::Model,
            ResourceType::DataStore,
            ResourceType::Font,
        ] {
            let resource = Resource::new(kind, "/a/b");
            assert_eq!(resource.resource_type(), kind);
            assert_eq!(resource.state(), ResourceState::Unloaded);
            assert_eq!(resource.path(), "/a/b");
        }
    }

    #[test]
    fn load_failure_is_recorded() {
        let mut device = RecordingDevice::new();
        let ctx = ctx(&mut device);
        let mut resource = Resource::new(ResourceType::DataStore, "/data/cfg.json");
        let deps = resource.load(File::new("/data/cfg.json", b"{ nope".to_vec()), &mut device, &ctx);
        assert!(deps.is_empty());
        assert_eq!(resource.state(), ResourceState::Error);
        assert!(resource.failure().is_some());
    }

    #[test]
    fn shader_loads_through_enum() {
        let mut device = RecordingDevice::new();
        let ctx = ctx(&mut device);
        let mut resource = Resource::new(ResourceType::Shader, "/shaders/a.wgsl");
        resource.load(File::new("/shaders/a.wgsl", b"fn f() {}".to_vec()), &mut device, &ctx);
        assert_eq!(resource.state(), ResourceState::Loaded);
        let Resource::Shader(shader) = &resource else {
            panic!("expected shader");
        };
        assert!(shader.module().is_some());
        resource.release(&mut device);
        assert_eq!(resource.state(), ResourceState::Unloaded);
    }

    #[test]
    fn every_variant_fails_and_releases_through_the_trait() {
        let mut device = RecordingDevice::new();
        for (kind, path) in [
            (ResourceType::Model, "/models/ship.glb"),
            (ResourceType::Texture2D, "/textures/a.png"),
            (ResourceType::Font, "/fonts/a.ttf"),
        ] {
            let mut resource = Resource::new(kind, path);
            resource.fail("unreadable".into());
            assert_eq!(resource.state(), ResourceState::Error);
            assert!(resource.failure().unwrap().contains("unreadable"));
            resource.release(&mut device);
        }
        assert_eq!(device.live_objects().total(), 0);
    }
}
