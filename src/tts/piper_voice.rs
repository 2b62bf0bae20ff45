use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::ModelError;

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    pub audio: AudioConfig,
    pub espeak: Option<EspeakConfig>,
    #[serde(default)]
    pub phoneme_id_map: HashMap<String, Vec<i64>>,
    #[serde(default)]
    pub inference: Option<InferenceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakConfig {
    pub voice: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_length_scale")]
    pub length_scale: f32,
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

fn default_noise_scale() -> f32 {
    0.667
}

fn default_length_scale() -> f32 {
    1.0
}

fn default_noise_w() -> f32 {
    0.8
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            length_scale: default_length_scale(),
            noise_w: default_noise_w(),
        }
    }
}

/// An ONNX model file paired with its `<model>.json` config.
#[derive(Debug)]
pub struct PiperVoice {
    pub config: VoiceConfig,
    pub model_path: PathBuf,
}

impl PiperVoice {
    pub fn config_path(model_path: &Path) -> PathBuf {
        let mut name = model_path.as_os_str().to_os_string();
        name.push(".json");
        PathBuf::from(name)
    }

    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        let config_path = Self::config_path(model_path);

        if !model_path.is_file() {
            return Err(ModelError::Load(format!(
                "model file {} not found",
                model_path.display()
            )));
        }

        if !config_path.is_file() {
            return Err(ModelError::Load(format!(
                "model config {} not found",
                config_path.display()
            )));
        }

        let file = File::open(&config_path).map_err(|e| {
            ModelError::Load(format!("cannot open {}: {}", config_path.display(), e))
        })?;
        let config: VoiceConfig = serde_json::from_reader(file)
            .map_err(|e| ModelError::Load(format!("invalid model config: {}", e)))?;

        Ok(Self {
            config,
            model_path: model_path.to_path_buf(),
        })
    }

    pub fn espeak_voice(&self) -> &str {
        self.config
            .espeak
            .as_ref()
            .map(|e| e.voice.as_str())
            .unwrap_or("en")
    }
}
