pub mod command;
pub mod handle;
pub mod piper;
pub mod piper_voice;
#[cfg(test)]
pub mod testing;

use std::path::Path;

use ndarray::ArrayD;

use crate::config::Device;

pub use command::CommandLoader;
pub use handle::{GenerationJob, ModelHandle};
pub use piper::PiperLoader;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("{0}")]
    Load(String),

    #[error("reference audio not found: {0}")]
    ReferenceMissing(String),

    #[error("{0}")]
    Inference(String),
}

/// Sampling controls forwarded untouched to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
    pub min_p: f32,
    pub norm_loudness: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.95,
            top_k: 1000,
            repetition_penalty: 1.2,
            min_p: 0.0,
            norm_loudness: true,
        }
    }
}

/// Raw model output. Layout is whatever the model produced, usually
/// `(channels, frames)` or a flat 1-D buffer.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: ArrayD<f32>,
    pub sample_rate: u32,
}

/// A loaded text-to-speech model.
///
/// `reseed` resets whatever random state the model samples from. It is only
/// called by [`ModelHandle`] immediately before `generate`, under the same
/// lock, so a seeded call is reproducible.
pub trait SpeechModel: Send {
    fn sample_rate(&self) -> u32;

    fn reseed(&mut self, seed: u64);

    fn generate(
        &mut self,
        text: &str,
        reference: Option<&Path>,
        params: &SamplingParams,
    ) -> Result<Waveform, ModelError>;
}

/// Builds a model on the selected device. Called at most once per process.
pub trait ModelLoader: Send + Sync {
    fn load_pretrained(&self, device: Device) -> Result<Box<dyn SpeechModel>, ModelError>;
}
