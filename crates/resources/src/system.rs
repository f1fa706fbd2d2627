//! Path-addressed resource arena and its per-frame update.

use crate::bus::ShaderInjectedBus;
use crate::model::ModelResource;
use crate::resource::{Resource, ResourceId};
use crate::{DataStore, FontResource, ResourceError, ShaderResource, Texture2D};
use hearth_common::{ResourceState, ResourceType, resource_extension};
use hearth_render::{GpuDevice, RenderContext, ShaderModuleId};
use hearth_vfs::{FileSystem, normalize_path};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSystemConfig {
    /// File reads performed per [`ResourceSystem::update`].
    pub max_reads_per_update: usize,
}

impl Default for ResourceSystemConfig {
    fn default() -> Self {
        Self {
            max_reads_per_update: 64,
        }
    }
}

/// Notifications produced by [`ResourceSystem::update`] and injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    Loaded { id: ResourceId, path: String },
    Failed { id: ResourceId, path: String, reason: String },
    ShaderInjected { id: ResourceId, path: String },
    ModelRebuilt { id: ResourceId, path: String },
}

#[derive(Debug)]
struct Entry {
    resource: Resource,
    queued: bool,
    /// Loaded or Failed has been emitted.
    reported: bool,
}

type LoadCallback = Box<dyn FnOnce(&[ResourceId])>;

struct PendingCallback {
    ids: Vec<ResourceId>,
    callback: LoadCallback,
}

/// Owns every resource. All loading work happens inside [`update`](Self::update).
pub struct ResourceSystem {
    config: ResourceSystemConfig,
    entries: SlotMap<ResourceId, Entry>,
    by_path: BTreeMap<String, ResourceId>,
    queue: VecDeque<ResourceId>,
    /// Shader → models waiting for it.
    waiters: BTreeMap<ResourceId, Vec<ResourceId>>,
    callbacks: Vec<PendingCallback>,
    bus: ShaderInjectedBus,
    events: Vec<ResourceEvent>,
}

impl Default for ResourceSystem {
    fn default() -> Self {
        Self::new(ResourceSystemConfig::default())
    }
}

impl ResourceSystem {
    pub fn new(config: ResourceSystemConfig) -> Self {
        Self {
            config,
            entries: SlotMap::with_key(),
            by_path: BTreeMap::new(),
            queue: VecDeque::new(),
            waiters: BTreeMap::new(),
            callbacks: Vec::new(),
            bus: ShaderInjectedBus::new(),
            events: Vec::new(),
        }
    }

    /// Handle for `path`, queueing a read the first time the path is seen.
    pub fn request(&mut self, path: &str) -> Result<ResourceId, ResourceError> {
        let path = normalize_path(path);
        if let Some(&id) = self.by_path.get(&path) {
            return Ok(id);
        }
        let kind = resource_extension(&path)
            .and_then(|ext| ResourceType::from_extension(&ext))
            .ok_or_else(|| ResourceError::UnknownType(path.clone()))?;
        let mut resource = Resource::new(kind, &path);
        if let Resource::Model(model) = &mut resource {
            model.subscribe(&self.bus);
        }
        let id = self.entries.insert(Entry {
            resource,
            queued: true,
            reported: false,
        });
        tracing::debug!(%path, ?kind, "resource requested");
        self.by_path.insert(path, id);
        self.queue.push_back(id);
        Ok(id)
    }

    /// Request `path` and run `callback` once it is Loaded. The callback is
    /// dropped unfired if the resource fails or is released.
    pub fn request_with(
        &mut self,
        path: &str,
        callback: impl FnOnce(ResourceId) + 'static,
    ) -> Result<ResourceId, ResourceError> {
        let id = self.request(path)?;
        self.callbacks.push(PendingCallback {
            ids: vec![id],
            callback: Box::new(move |ids| callback(ids[0])),
        });
        Ok(id)
    }

    /// Request every path; `callback` runs once all of them are Loaded.
    pub fn request_many<S: AsRef<str>>(
        &mut self,
        paths: &[S],
        callback: impl FnOnce(&[ResourceId]) + 'static,
    ) -> Result<Vec<ResourceId>, ResourceError> {
        let ids = paths
            .iter()
            .map(|p| self.request(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.callbacks.push(PendingCallback {
            ids: ids.clone(),
            callback: Box::new(callback),
        });
        Ok(ids)
    }

    /// Perform queued reads, apply shader injections, complete models whose
    /// shaders finished, and fire load callbacks. Injections are applied
    /// before completions so a model never builds against a replaced module.
    ///
    /// Returns [`ResourceError::Fatal`] for the first resource that newly
    /// entered the Error state.
    pub fn update(
        &mut self,
        device: &mut dyn GpuDevice,
        ctx: &RenderContext,
        fs: &dyn FileSystem,
    ) -> Result<(), ResourceError> {
        let _span = tracing::debug_span!("resource_update").entered();
        self.process_reads(device, ctx, fs);
        self.process_injections(device, ctx);
        self.deliver_dependents(device, ctx);
        self.dispatch_callbacks();
        self.check_failures()
    }

    fn process_reads(&mut self, device: &mut dyn GpuDevice, ctx: &RenderContext, fs: &dyn FileSystem) {
        let mut reads = 0;
        while reads < self.config.max_reads_per_update {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            entry.queued = false;
            reads += 1;
            let path = entry.resource.path().to_string();
            let shaders = match fs.read(&path) {
                Ok(file) => entry.resource.load(file, device, ctx),
                Err(e) => {
                    tracing::error!(%path, error = %e, "resource read failed");
                    entry.resource.fail(e.to_string());
                    continue;
                }
            };
            for shader_path in shaders {
                match self.request(&shader_path) {
                    Ok(shader) => self.waiters.entry(shader).or_default().push(id),
                    Err(e) => {
                        if let Some(model) = self.model_mut(id) {
                            model.on_dependent_failed(&shader_path, &e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn deliver_dependents(&mut self, device: &mut dyn GpuDevice, ctx: &RenderContext) {
        let finished: Vec<(ResourceId, String, Result<ShaderModuleId, String>)> = self
            .waiters
            .keys()
            .filter_map(|&id| {
                let shader = self.shader(id)?;
                let outcome = match (shader.state(), shader.module()) {
                    (ResourceState::Loaded, Some(module)) => Ok(module),
                    (ResourceState::Error, _) => Err(shader.failure().unwrap_or("error").to_string()),
                    _ => return None,
                };
                Some((id, shader.path().to_string(), outcome))
            })
            .collect();

        for (shader_id, path, outcome) in finished {
            let models = self.waiters.remove(&shader_id).unwrap_or_default();
            for model_id in models {
                let Some(model) = self.model_mut(model_id) else {
                    continue;
                };
                match &outcome {
                    Ok(module) => model.on_shader_ready(&path, *module, device, ctx),
                    Err(reason) => model.on_dependent_failed(&path, reason),
                }
            }
        }
    }

    /// Models subscribe when requested, so injections that land while a model
    /// is still waiting on other shaders reach it too.
    fn process_injections(&mut self, device: &mut dyn GpuDevice, ctx: &RenderContext) {
        let mut rebuilds = Vec::new();
        for (id, entry) in &self.entries {
            let Resource::Model(model) = &entry.resource else {
                continue;
            };
            for path in model.take_injected_shaders() {
                let module = self
                    .by_path
                    .get(&path)
                    .and_then(|&shader| self.shader(shader))
                    .and_then(ShaderResource::module);
                if let Some(module) = module {
                    rebuilds.push((id, path, module));
                }
            }
        }

        for (id, shader_path, module) in rebuilds {
            let Some(model) = self.model_mut(id) else {
                continue;
            };
            if model.rebuild(&shader_path, module, device, ctx) {
                let path = model.path().to_string();
                self.events.push(ResourceEvent::ModelRebuilt { id, path });
            }
        }
    }

    fn dispatch_callbacks(&mut self) {
        for pending in std::mem::take(&mut self.callbacks) {
            let states: Vec<ResourceState> = pending
                .ids
                .iter()
                .map(|&id| match self.entries.get(id) {
                    Some(entry) => entry.resource.state(),
                    None => ResourceState::Error,
                })
                .collect();
            if states.iter().all(|s| *s == ResourceState::Loaded) {
                (pending.callback)(&pending.ids);
            } else if states.contains(&ResourceState::Error) {
                tracing::warn!(resources = pending.ids.len(), "load callback dropped after failure");
            } else {
                self.callbacks.push(pending);
            }
        }
    }

    fn check_failures(&mut self) -> Result<(), ResourceError> {
        let mut fatal = None;
        for (id, entry) in &mut self.entries {
            if entry.reported {
                continue;
            }
            let path = entry.resource.path().to_string();
            match entry.resource.state() {
                ResourceState::Loaded => {
                    entry.reported = true;
                    tracing::info!(%path, "resource loaded");
                    self.events.push(ResourceEvent::Loaded { id, path });
                }
                ResourceState::Error => {
                    entry.reported = true;
                    let reason = entry.resource.failure().unwrap_or_default();
                    self.events.push(ResourceEvent::Failed {
                        id,
                        path: path.clone(),
                        reason: reason.clone(),
                    });
                    if fatal.is_none() {
                        fatal = Some(ResourceError::Fatal { path, reason });
                    }
                }
                _ => {}
            }
        }
        fatal.map_or(Ok(()), Err)
    }

    /// Recompile a shader from `code`, save it and notify subscribed models.
    /// A compile failure leaves the previous module in place.
    pub fn inject_shader(
        &mut self,
        id: ResourceId,
        code: &str,
        device: &mut dyn GpuDevice,
        fs: &mut dyn FileSystem,
    ) -> Result<(), ResourceError> {
        let entry = self.entries.get_mut(id).ok_or(ResourceError::UnknownResource)?;
        let Resource::Shader(shader) = &mut entry.resource else {
            return Err(ResourceError::WrongType {
                path: entry.resource.path().to_string(),
                expected: ResourceType::Shader,
            });
        };
        shader.inject(code, device)?;
        let path = shader.path().to_string();
        fs.write(&path, code.as_bytes())?;
        let delivered = self.bus.emit(&path);
        tracing::debug!(%path, subscribers = delivered, "shader injected");
        self.events.push(ResourceEvent::ShaderInjected { id, path });
        Ok(())
    }

    /// Replace a data store's document and save it.
    pub fn inject_data(
        &mut self,
        id: ResourceId,
        value: serde_json::Value,
        fs: &mut dyn FileSystem,
    ) -> Result<(), ResourceError> {
        let entry = self.entries.get_mut(id).ok_or(ResourceError::UnknownResource)?;
        let Resource::DataStore(store) = &mut entry.resource else {
            return Err(ResourceError::WrongType {
                path: entry.resource.path().to_string(),
                expected: ResourceType::DataStore,
            });
        };
        store.inject(value, fs)
    }

    /// Drop a resource and free its GPU objects. Models waiting on a
    /// released shader fail; a released model stops waiting.
    pub fn release(&mut self, id: ResourceId, device: &mut dyn GpuDevice) -> Result<(), ResourceError> {
        let mut entry = self.entries.remove(id).ok_or(ResourceError::UnknownResource)?;
        let path = entry.resource.path().to_string();
        self.by_path.remove(&path);
        entry.resource.release(device);

        for model_id in self.waiters.remove(&id).unwrap_or_default() {
            if let Some(model) = self.model_mut(model_id) {
                model.on_dependent_failed(&path, "released");
            }
        }
        for models in self.waiters.values_mut() {
            models.retain(|&m| m != id);
        }
        self.waiters.retain(|_, models| !models.is_empty());
        tracing::debug!(%path, "resource released");
        Ok(())
    }

    /// Unknown ids report Unloaded; queued reads report Loading.
    pub fn state(&self, id: ResourceId) -> ResourceState {
        match self.entries.get(id) {
            None => ResourceState::Unloaded,
            Some(entry) if entry.queued => ResourceState::Loading,
            Some(entry) => entry.resource.state(),
        }
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.entries.get(id).map(|e| &e.resource)
    }

    pub fn model(&self, id: ResourceId) -> Option<&ModelResource> {
        match self.resource(id)? {
            Resource::Model(model) => Some(model.as_ref()),
            _ => None,
        }
    }

    pub fn model_mut(&mut self, id: ResourceId) -> Option<&mut ModelResource> {
        match &mut self.entries.get_mut(id)?.resource {
            Resource::Model(model) => Some(model.as_mut()),
            _ => None,
        }
    }

    pub fn shader(&self, id: ResourceId) -> Option<&ShaderResource> {
        match self.resource(id)? {
            Resource::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    pub fn texture(&self, id: ResourceId) -> Option<&Texture2D> {
        match self.resource(id)? {
            Resource::Texture2D(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn data_store(&self, id: ResourceId) -> Option<&DataStore> {
        match self.resource(id)? {
            Resource::DataStore(store) => Some(store),
            _ => None,
        }
    }

    pub fn font(&self, id: ResourceId) -> Option<&FontResource> {
        match self.resource(id)? {
            Resource::Font(font) => Some(font),
            _ => None,
        }
    }

    pub fn path(&self, id: ResourceId) -> Option<&str> {
        self.resource(id).map(Resource::path)
    }

    pub fn id_for(&self, path: &str) -> Option<ResourceId> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    /// Every resource id with its path, in path order.
    pub fn paths(&self) -> impl Iterator<Item = (&str, ResourceId)> {
        self.by_path.iter().map(|(p, &id)| (p.as_str(), id))
    }

    /// No reads queued and no model waiting on a shader.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.waiters.is_empty()
    }

    pub fn bus(&self) -> &ShaderInjectedBus {
        &self.bus
    }

    pub fn drain_events(&mut self) -> Vec<ResourceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release everything, e.g. before the device goes away.
    pub fn clear(&mut self, device: &mut dyn GpuDevice) {
        for (_, mut entry) in self.entries.drain() {
            entry.resource.release(device);
        }
        self.by_path.clear();
        self.queue.clear();
        self.waiters.clear();
        self.callbacks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_render::{GlobalUniformsBinding, RecordingDevice, RenderSettings};
    use hearth_vfs::MemoryFileSystem;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup() -> (RecordingDevice, RenderContext) {
        let mut device = RecordingDevice::new();
        let globals = GlobalUniformsBinding::create(&mut device);
        let ctx = RenderContext::new(
            &globals,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &RenderSettings::default(),
        );
        (device, ctx)
    }

    #[test]
    fn request_dedupes_normalized_paths() {
        let mut system = ResourceSystem::default();
        let a = system.request("/data/cfg.json").unwrap();
        let b = system.request("data//cfg.json").unwrap();
        assert_eq!(a, b);
        assert_eq!(system.len(), 1);
        assert_eq!(system.state(a), ResourceState::Loading);
        assert_eq!(system.id_for("/data/./cfg.json"), Some(a));
    }

    #[test]
    fn requested_model_subscribes_before_loading() {
        let (mut device, _ctx) = setup();
        let mut system = ResourceSystem::default();
        let id = system.request("/models/ship.glb").unwrap();
        assert!(system.model(id).unwrap().is_subscribed());
        assert_eq!(system.bus().subscriber_count(), 1);
        system.request("/models/ship.glb").unwrap();
        assert_eq!(system.bus().subscriber_count(), 1);
        system.release(id, &mut device).unwrap();
        assert_eq!(system.bus().subscriber_count(), 0);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let mut system = ResourceSystem::default();
        assert!(matches!(
            system.request("/models/ship.obj"),
            Err(ResourceError::UnknownType(p)) if p == "/models/ship.obj"
        ));
        assert!(system.is_empty());
    }

    #[test]
    fn loads_data_and_fires_callback_once() {
        let (mut device, ctx) = setup();
        let fs = MemoryFileSystem::new().with_file("/data/cfg.json", r#"{"speed": 3}"#);
        let mut system = ResourceSystem::default();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        let id = system
            .request_with("/data/cfg.json", move |id| sink.borrow_mut().push(id))
            .unwrap();

        system.update(&mut device, &ctx, &fs).unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        assert_eq!(*fired.borrow(), vec![id]);
        assert_eq!(system.data_store(id).unwrap().get("/speed"), Some(&serde_json::json!(3)));
        assert_eq!(
            system.drain_events(),
            vec![ResourceEvent::Loaded {
                id,
                path: "/data/cfg.json".into()
            }]
        );
    }

    #[test]
    fn callback_for_loaded_resource_fires_next_update() {
        let (mut device, ctx) = setup();
        let fs = MemoryFileSystem::new().with_file("/fonts/a.ttf", vec![0, 1, 0, 0]);
        let mut system = ResourceSystem::default();
        system.request("/fonts/a.ttf").unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();

        let fired = Rc::new(RefCell::new(0));
        let sink = fired.clone();
        system
            .request_with("/fonts/a.ttf", move |_| *sink.borrow_mut() += 1)
            .unwrap();
        assert_eq!(*fired.borrow(), 0);
        system.update(&mut device, &ctx, &fs).unwrap();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn request_many_waits_for_all() {
        let (mut device, ctx) = setup();
        let fs = MemoryFileSystem::new()
            .with_file("/data/a.json", "1")
            .with_file("/data/b.json", "2");
        let mut system = ResourceSystem::new(ResourceSystemConfig {
            max_reads_per_update: 1,
        });
        let fired = Rc::new(RefCell::new(None));
        let sink = fired.clone();
        let ids = system
            .request_many(&["/data/a.json", "/data/b.json"], move |ids| {
                *sink.borrow_mut() = Some(ids.len())
            })
            .unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        assert_eq!(system.state(ids[0]), ResourceState::Loaded);
        assert_eq!(system.state(ids[1]), ResourceState::Loading);
        assert_eq!(*fired.borrow(), None);
        system.update(&mut device, &ctx, &fs).unwrap();
        assert_eq!(*fired.borrow(), Some(2));
        assert!(system.is_idle());
    }

    #[test]
    fn missing_file_is_fatal_once() {
        let (mut device, ctx) = setup();
        let fs = MemoryFileSystem::new();
        let mut system = ResourceSystem::default();
        let fired = Rc::new(RefCell::new(false));
        let sink = fired.clone();
        let id = system
            .request_with("/shaders/missing.wgsl", move |_| *sink.borrow_mut() = true)
            .unwrap();
        let err = system.update(&mut device, &ctx, &fs).unwrap_err();
        assert!(matches!(err, ResourceError::Fatal { ref path, .. } if path == "/shaders/missing.wgsl"));
        assert_eq!(system.state(id), ResourceState::Error);
        assert!(system.update(&mut device, &ctx, &fs).is_ok());
        assert!(!*fired.borrow());
    }

    #[test]
    fn inject_shader_writes_back_and_emits() {
        let (mut device, ctx) = setup();
        let mut fs = MemoryFileSystem::new().with_file("/shaders/a.wgsl", "fn a() {}");
        let mut system = ResourceSystem::default();
        let id = system.request("/shaders/a.wgsl").unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        let old = system.shader(id).unwrap().module().unwrap();

        let subscription = system.bus().subscribe();
        system
            .inject_shader(id, "fn b() {}", &mut device, &mut fs)
            .unwrap();
        assert_eq!(subscription.poll(), vec!["/shaders/a.wgsl".to_string()]);
        assert_eq!(fs.read("/shaders/a.wgsl").unwrap().data(), b"fn b() {}");
        assert_ne!(system.shader(id).unwrap().module(), Some(old));
        assert!(system
            .drain_events()
            .contains(&ResourceEvent::ShaderInjected {
                id,
                path: "/shaders/a.wgsl".into()
            }));
    }

    #[test]
    fn inject_into_wrong_type_is_rejected() {
        let (mut device, _ctx) = setup();
        let mut fs = MemoryFileSystem::new();
        let mut system = ResourceSystem::default();
        let id = system.request("/data/a.json").unwrap();
        assert!(matches!(
            system.inject_shader(id, "fn a() {}", &mut device, &mut fs),
            Err(ResourceError::WrongType { expected: ResourceType::Shader, .. })
        ));
    }

    #[test]
    fn inject_data_saves_document() {
        let (mut device, ctx) = setup();
        let mut fs = MemoryFileSystem::new().with_file("/data/a.json", "{}");
        let mut system = ResourceSystem::default();
        let id = system.request("/data/a.json").unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        system
            .inject_data(id, serde_json::json!({"hp": 10}), &mut fs)
            .unwrap();
        assert_eq!(system.data_store(id).unwrap().get("/hp"), Some(&serde_json::json!(10)));
        let saved: serde_json::Value =
            serde_json::from_slice(fs.read("/data/a.json").unwrap().data()).unwrap();
        assert_eq!(saved["hp"], 10);
    }

    #[test]
    fn release_forgets_path_and_frees_gpu_objects() {
        let (mut device, ctx) = setup();
        let fs = MemoryFileSystem::new().with_file("/shaders/a.wgsl", "fn a() {}");
        let mut system = ResourceSystem::default();
        let id = system.request("/shaders/a.wgsl").unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        assert_eq!(device.live_objects().shader_modules, 1);

        system.release(id, &mut device).unwrap();
        assert_eq!(device.live_objects().shader_modules, 0);
        assert_eq!(system.state(id), ResourceState::Unloaded);
        assert_eq!(system.id_for("/shaders/a.wgsl"), None);
        assert!(matches!(
            system.release(id, &mut device),
            Err(ResourceError::UnknownResource)
        ));
        let again = system.request("/shaders/a.wgsl").unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: ResourceSystemConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_reads_per_update, 64);
    }
}
