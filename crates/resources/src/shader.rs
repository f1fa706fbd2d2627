use crate::ResourceError;
use hearth_common::ResourceState;
use hearth_render::{GpuDevice, GpuObject, ShaderModuleId, preprocessor};

/// A WGSL shader. Every compile goes through the preprocessor, so the
/// `GlobalUniforms` declaration is always in scope.
#[derive(Debug)]
pub struct ShaderResource {
    path: String,
    state: ResourceState,
    failure: Option<String>,
    source: String,
    module: Option<ShaderModuleId>,
}

impl ShaderResource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: ResourceState::Unloaded,
            failure: None,
            source: String::new(),
            module: None,
        }
    }

    pub fn load(&mut self, bytes: &[u8], device: &mut dyn GpuDevice) -> Result<(), ResourceError> {
        let source = std::str::from_utf8(bytes).map_err(|_| ResourceError::Utf8 {
            path: self.path.clone(),
        })?;
        self.module = Some(compile(&self.path, source, device)?);
        self.source = source.to_string();
        self.state = ResourceState::Loaded;
        Ok(())
    }

    /// Recompile from new source. On failure the previous module stays.
    pub fn inject(&mut self, code: &str, device: &mut dyn GpuDevice) -> Result<(), ResourceError> {
        let module = compile(&self.path, code, device)?;
        if let Some(old) = self.module.replace(module) {
            device.release(GpuObject::ShaderModule(old));
        }
        self.source = code.to_string();
        self.state = ResourceState::Loaded;
        self.failure = None;
        tracing::info!(path = %self.path, "shader recompiled");
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

    pub fn module(&self) -> Option<ShaderModuleId> {
        self.module
    }

    /// Source as written by the user, without the prelude.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(module) = self.module.take() {
            device.release(GpuObject::ShaderModule(module));
        }
        self.state = ResourceState::Unloaded;
    }
}

fn compile(
    path: &str,
    source: &str,
    device: &mut dyn GpuDevice,
) -> Result<ShaderModuleId, ResourceError> {
    device
        .create_shader_module(path, &preprocessor::process(source))
        .map_err(|messages| {
            let messages = preprocessor::resolve_messages(messages);
            for m in &messages {
                tracing::error!(path, line = m.line, column = m.column, "{}", m.message);
            }
            ResourceError::ShaderCompile {
                path: path.to_string(),
                messages,
            }
        })
}
