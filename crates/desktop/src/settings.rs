use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use facecam_core::detection::domain::detection_service::DetectionParams;
use facecam_core::shared::client_config::ClientConfig;
use facecam_core::shared::constants::DEFAULT_API_BASE_URL;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no configuration directory on this platform")]
    NoConfigDir,
    #[error("settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings format: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    System,
    Dark,
    Light,
}

impl Appearance {
    pub const ALL: &[Appearance] = &[Appearance::System, Appearance::Dark, Appearance::Light];
}

impl std::fmt::Display for Appearance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Appearance::System => write!(f, "System"),
            Appearance::Dark => write!(f, "Dark"),
            Appearance::Light => write!(f, "Light"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Manual confidence threshold in percent (10-100).
    pub confidence: u32,
    #[serde(default = "default_emotions")]
    pub emotions: bool,
    #[serde(default)]
    pub age: bool,
    pub appearance: Appearance,
    pub high_contrast: bool,
    pub font_scale: f32,
}

fn default_server_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_emotions() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            confidence: 50,
            emotions: default_emotions(),
            age: false,
            appearance: Appearance::System,
            high_contrast: false,
            font_scale: 1.0,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCam").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Reads settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.server_url.trim())
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            confidence: self.confidence.clamp(10, 100) as f64 / 100.0,
            emotions: self.emotions,
            age: self.age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FaceCam").join("settings.json");
        let settings = Settings {
            server_url: "http://10.0.0.5:5000".into(),
            confidence: 30,
            emotions: false,
            ..Settings::default()
        };

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_missing_or_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load_from(&path), Settings::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_older_file_without_server_fields_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let older = r#"{
            "confidence": 70,
            "appearance": "dark",
            "high_contrast": false,
            "font_scale": 1.2
        }"#;
        fs::write(&path, older).unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.server_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.appearance, Appearance::Dark);
        assert!(settings.emotions);
        assert!(!settings.age);
    }

    #[test]
    fn test_detection_params_from_percent() {
        let settings = Settings {
            confidence: 35,
            age: true,
            ..Settings::default()
        };
        let params = settings.detection_params();
        assert_relative_eq!(params.confidence, 0.35);
        assert!(params.age);
        assert!(params.emotions);
    }

    #[test]
    fn test_defaults_request_emotions_but_not_age() {
        let settings = Settings::default();
        assert_eq!(settings.confidence, 50);
        assert!(settings.emotions);
        assert!(!settings.age);

        let params = settings.detection_params();
        assert_relative_eq!(params.confidence, 0.5);
        assert!(params.emotions);
    }
}
