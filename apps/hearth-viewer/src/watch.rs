//! Shader hot reload: polls the modification time of every loaded shader
//! under the data directory and re-injects the ones that changed on disk.

use hearth_common::ResourceState;
use hearth_render::GpuDevice;
use hearth_resources::{ResourceId, ResourceSystem};
use hearth_vfs::NativeFileSystem;
use std::collections::BTreeMap;
use std::time::SystemTime;

#[derive(Debug, Default)]
pub struct ShaderWatcher {
    stamps: BTreeMap<ResourceId, SystemTime>,
}

impl ShaderWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shaders whose file changed since the last poll, with their new source.
    /// The first sighting of a shader only records its stamp.
    pub fn changed(
        &mut self,
        system: &ResourceSystem,
        fs: &NativeFileSystem,
    ) -> Vec<(ResourceId, String)> {
        let mut changed = Vec::new();
        for (path, id) in system.paths() {
            if system.shader(id).is_none() || system.state(id) != ResourceState::Loaded {
                continue;
            }
            let Ok(modified) = std::fs::metadata(fs.host_path(path)).and_then(|m| m.modified())
            else {
                continue;
            };
            match self.stamps.insert(id, modified) {
                Some(previous) if previous != modified => {
                    match std::fs::read_to_string(fs.host_path(path)) {
                        Ok(code) => changed.push((id, code)),
                        Err(e) => tracing::warn!(%path, error = %e, "cannot read changed shader"),
                    }
                }
                _ => {}
            }
        }
        self.stamps.retain(|id, _| system.shader(*id).is_some());
        changed
    }

    /// Inject every changed shader. A compile error keeps the old module and
    /// is only logged.
    pub fn poll(
        &mut self,
        system: &mut ResourceSystem,
        device: &mut dyn GpuDevice,
        fs: &mut NativeFileSystem,
    ) -> usize {
        let changed = self.changed(system, fs);
        let mut injected = 0;
        for (id, code) in changed {
            let path = system.path(id).unwrap_or_default().to_string();
            match system.inject_shader(id, &code, device, fs) {
                Ok(()) => {
                    tracing::info!(%path, "shader reloaded");
                    injected += 1;
                }
                Err(e) => tracing::error!(%path, error = %e, "shader reload failed"),
            }
            // The write-back above touched the file.
            if let Ok(modified) =
                std::fs::metadata(fs.host_path(&path)).and_then(|m| m.modified())
            {
                self.stamps.insert(id, modified);
            }
        }
        injected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_render::{GlobalUniformsBinding, RecordingDevice, RenderContext, RenderSettings};
    use hearth_resources::ResourceEvent;
    use hearth_vfs::FileSystem;
    use std::time::Duration;

    fn touch(fs: &mut NativeFileSystem, path: &str, code: &str, at: SystemTime) {
        fs.write(path, code.as_bytes()).unwrap();
        let file = std::fs::File::options()
            .write(true)
            .open(fs.host_path(path))
            .unwrap();
        file.set_modified(at).unwrap();
    }

    #[test]
    fn edited_shader_is_injected_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = NativeFileSystem::open(dir.path()).unwrap();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        touch(&mut fs, "/shaders/a.wgsl", "fn a() {}", start);

        let mut device = RecordingDevice::new();
        let globals = GlobalUniformsBinding::create(&mut device);
        let ctx = RenderContext::new(
            &globals,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            &RenderSettings::default(),
        );
        let mut system = ResourceSystem::default();
        let id = system.request("/shaders/a.wgsl").unwrap();
        system.update(&mut device, &ctx, &fs).unwrap();
        system.drain_events();

        let mut watcher = ShaderWatcher::new();
        assert_eq!(watcher.poll(&mut system, &mut device, &mut fs), 0);
        assert_eq!(watcher.poll(&mut system, &mut device, &mut fs), 0);

        touch(
            &mut fs,
            "/shaders/a.wgsl",
            "fn a() { let x = 1; }",
            start + Duration::from_secs(60),
        );
        assert_eq!(watcher.poll(&mut system, &mut device, &mut fs), 1);
        assert!(
            system
                .drain_events()
                .iter()
                .any(|e| matches!(e, ResourceEvent::ShaderInjected { id: i, .. } if *i == id))
        );
        assert_eq!(watcher.poll(&mut system, &mut device, &mut fs), 0);
    }

    #[test]
    fn unloaded_shaders_are_not_watched() {
        let dir = tempfile::tempdir().unwrap();
        let fs = NativeFileSystem::open(dir.path()).unwrap();
        let mut system = ResourceSystem::default();
        system.request("/shaders/missing.wgsl").unwrap();
        let mut watcher = ShaderWatcher::new();
        assert!(watcher.changed(&system, &fs).is_empty());
    }
}
