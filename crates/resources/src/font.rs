use crate::ResourceError;
use hearth_common::ResourceState;

/// TrueType / OpenType font bytes, kept for the UI layer to rasterize.
#[derive(Debug)]
pub struct FontResource {
    path: String,
    state: ResourceState,
    failure: Option<String>,
    data: Vec<u8>,
}

impl FontResource {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: ResourceState::Unloaded,
            failure: None,
            data: Vec::new(),
        }
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<(), ResourceError> {
        if !has_font_signature(bytes) {
            tracing::warn!(path = %self.path, "unrecognized font signature");
        }
        self.data = bytes.to_vec();
        self.state = ResourceState::Loaded;
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

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

fn has_font_signature(bytes: &[u8]) -> bool {
    const SIGNATURES: [&[u8; 4]; 4] = [b"\x00\x01\x00\x00", b"OTTO", b"true", b"ttcf"];
    bytes
        .get(0..4)
        .is_some_and(|head| SIGNATURES.iter().any(|sig| head == sig.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_bytes() {
        let mut font = FontResource::new("/fonts/ui.ttf");
        font.load(&[0, 1, 0, 0, 9, 9]).unwrap();
        assert_eq!(font.state(), ResourceState::Loaded);
        assert_eq!(font.data().len(), 6);
    }

    #[test]
    fn signatures() {
        assert!(has_font_signature(b"OTTO...."));
        assert!(has_font_signature(&[0, 1, 0, 0]));
        assert!(!has_font_signature(b"PK\x03\x04"));
        assert!(!has_font_signature(b"ab"));
    }
}
