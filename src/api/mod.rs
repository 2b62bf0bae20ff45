pub mod handlers;
pub mod routes;
pub mod upload;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::tts::SamplingParams;

pub const MAX_TEXT_CHARS: usize = 10_000;

/// Parameters shared by the JSON and multipart endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default)]
    pub min_p: f64,
    #[serde(default = "default_norm_loudness")]
    pub norm_loudness: bool,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default, alias = "voice_name")]
    pub voice: Option<String>,
    /// Legacy server-side reference path, used verbatim.
    #[serde(default)]
    pub audio_prompt_path: Option<String>,
}

fn default_temperature() -> f64 {
    0.8
}

fn default_top_p() -> f64 {
    0.95
}

fn default_top_k() -> i64 {
    1000
}

fn default_repetition_penalty() -> f64 {
    1.2
}

fn default_norm_loudness() -> bool {
    true
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            min_p: 0.0,
            norm_loudness: default_norm_loudness(),
            seed: None,
            voice: None,
            audio_prompt_path: None,
        }
    }

    /// Check every field and produce the sampling parameters for the model.
    pub fn validate(&self) -> Result<SamplingParams, AppError> {
        if self.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text cannot be empty".into()));
        }

        if self.text.chars().count() > MAX_TEXT_CHARS {
            return Err(AppError::BadRequest(format!(
                "Text too long (max {} chars)",
                MAX_TEXT_CHARS
            )));
        }

        check_range("temperature", self.temperature, 0.05, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        check_range("repetition_penalty", self.repetition_penalty, 1.0, 2.0)?;
        check_range("min_p", self.min_p, 0.0, 1.0)?;

        if !(0..=1000).contains(&self.top_k) {
            return Err(AppError::BadRequest(format!(
                "top_k must be between 0 and 1000, got {}",
                self.top_k
            )));
        }

        if matches!(self.seed, Some(seed) if seed < 0) {
            return Err(AppError::BadRequest("seed must be non-negative".into()));
        }

        Ok(SamplingParams {
            temperature: self.temperature as f32,
            top_p: self.top_p as f32,
            top_k: self.top_k as u32,
            repetition_penalty: self.repetition_penalty as f32,
            min_p: self.min_p as f32,
            norm_loudness: self.norm_loudness,
        })
    }

    /// Seed to hand to the model; validated to be non-negative.
    pub fn seed(&self) -> Option<u64> {
        self.seed.map(|s| s as u64)
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<(), AppError> {
    if value.is_nan() || value < min || value > max {
        return Err(AppError::BadRequest(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub device: String,
    pub model_loaded: bool,
    pub cuda_available: bool,
}
