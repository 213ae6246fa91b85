use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for the detector API key, in order
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Parameters of the redaction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Margin added on each side, as a fraction of the detected box size
    pub padding_ratio: f64,
    /// Linear size of the pixelation thumbnail relative to the region
    pub pixel_scale: f32,
    /// Gaussian sigma of the soften pass, in pixels
    pub blur_sigma: f32,
    /// RGB multiplier applied after blurring
    pub brightness: f32,
    /// JPEG quality of the final encode (1-100)
    pub jpeg_quality: u8,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            padding_ratio: 0.25,
            pixel_scale: 0.05,
            blur_sigma: 12.0,
            brightness: 0.9,
            jpeg_quality: 90,
        }
    }
}

/// Settings for the remote plate detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
        }
    }
}

impl DetectorConfig {
    /// Defaults with the API key taken from the environment, if set
    pub fn from_env() -> Self {
        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());
        Self {
            api_key,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for writing processed images out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Delay between consecutive saves of a "save all" run
    pub stagger_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { stagger_ms: 300 }
    }
}

impl ExportConfig {
    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}
