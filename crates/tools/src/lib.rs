//! Developer tooling: read-only inspectors over loaded models and the
//! resource system, rendered as plain text, plus a built-in sample model.
//!
//! # Invariants
//! - Inspectors never mutate what they inspect.

pub mod inspector;
pub mod sample;

pub use inspector::{
    MaterialInfo, ModelInspector, ModelSummary, NodeInfo, ResourceInspector, ResourceLine,
};
pub use sample::{SAMPLE_MODEL_PATH, SAMPLE_SHADER_PATH, sample_model};

pub fn crate_info() -> &'static str {
    "hearth-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
