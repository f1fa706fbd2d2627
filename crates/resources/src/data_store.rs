use crate::ResourceError;
use hearth_common::ResourceState;
use hearth_vfs::FileSystem;
use serde_json::Value;

/// A JSON document.
#[derive(Debug)]
pub struct DataStore {
    path: String,
    state: ResourceState,
    failure: Option<String>,
    value: Value,
}

impl DataStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: ResourceState::Unloaded,
            failure: None,
            value: Value::Null,
        }
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<(), ResourceError> {
        self.value = serde_json::from_slice(bytes)?;
        self.state = ResourceState::Loaded;
        Ok(())
    }

    /// Replace the document and save it pretty-printed.
    pub fn inject(&mut self, value: Value, fs: &mut dyn FileSystem) -> Result<(), ResourceError> {
        let text = serde_json::to_vec_pretty(&value)?;
        self.value = value;
        self.state = ResourceState::Loaded;
        self.failure = None;
        fs.write(&self.path, &text)?;
        tracing::debug!(path = %self.path, bytes = text.len(), "data store saved");
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

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Look up a value by JSON pointer (`/a/b/0`).
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.value.pointer(pointer)
    }
}
