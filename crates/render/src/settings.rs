use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("unsupported msaa sample count {0} (expected 1 or 4)")]
    SampleCount(u32),
}

/// Engine-wide render settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub msaa_samples: u32,
    pub clear_color: [f64; 4],
    pub vsync: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            msaa_samples: 4,
            clear_color: [0.1, 0.1, 0.15, 1.0],
            vsync: true,
        }
    }
}

impl RenderSettings {
    pub fn from_json_str(path: &str, text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(text).map_err(|source| SettingsError::Parse {
            path: path.to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json_str(&display, &text)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        match self.msaa_samples {
            1 | 4 => Ok(()),
            n => Err(SettingsError::SampleCount(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_four_samples() {
        assert_eq!(RenderSettings::default().msaa_samples, 4);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = RenderSettings::from_json_str("inline", r#"{"vsync": false}"#).unwrap();
        assert!(!settings.vsync);
        assert_eq!(settings.msaa_samples, 4);
    }

    #[test]
    fn rejects_odd_sample_count() {
        let err = RenderSettings::from_json_str("inline", r#"{"msaa_samples": 3}"#).unwrap_err();
        assert!(matches!(err, SettingsError::SampleCount(3)));
    }

    #[test]
    fn reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        std::fs::write(&path, r#"{"msaa_samples": 1}"#).unwrap();
        assert_eq!(RenderSettings::from_json_file(&path).unwrap().msaa_samples, 1);
        assert!(matches!(
            RenderSettings::from_json_file(dir.path().join("missing.json")),
            Err(SettingsError::Io { .. })
        ));
    }
}
