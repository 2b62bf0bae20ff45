use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use super::piper_voice::PiperVoice;
use super::{ModelError, ModelLoader, SamplingParams, SpeechModel, Waveform};
use crate::config::Device;
use crate::markup;

/// Loads a Piper/VITS ONNX export.
pub struct PiperLoader {
    model_path: PathBuf,
}

impl PiperLoader {
    pub fn new(model_path: PathBuf) -> Self {
        Self { model_path }
    }
}

impl ModelLoader for PiperLoader {
    fn load_pretrained(&self, device: Device) -> Result<Box<dyn SpeechModel>, ModelError> {
        if device == Device::Cuda {
            tracing::warn!("Piper backend runs on the CPU execution provider");
        }
        let voice = PiperVoice::load(&self.model_path)?;
        Ok(Box::new(PiperModel::new(voice)?))
    }
}

/// VITS model run through ONNX Runtime.
///
/// The graph draws its own noise, so `reseed` cannot make output
/// reproducible, and reference audio cannot change the speaker.
/// `temperature` scales the noise terms relative to the model defaults
/// (0.8 keeps them unchanged).
pub struct PiperModel {
    session: Session,
    voice: PiperVoice,
    noise_scale: f32,
    length_scale: f32,
    noise_w: f32,
}

const NEUTRAL_TEMPERATURE: f32 = 0.8;

impl PiperModel {
    pub fn new(voice: PiperVoice) -> Result<Self, ModelError> {
        let session = Session::builder()
            .map_err(|e| ModelError::Load(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Load(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| ModelError::Load(format!("Failed to set threads: {}", e)))?
            .commit_from_file(&voice.model_path)
            .map_err(|e| ModelError::Load(format!("Failed to load model: {}", e)))?;

        let inference = voice.config.inference.clone().unwrap_or_default();

        Ok(Self {
            session,
            noise_scale: inference.noise_scale,
            length_scale: inference.length_scale,
            noise_w: inference.noise_w,
            voice,
        })
    }

    fn synthesize(&mut self, phoneme_ids: &[i64], temperature: f32) -> Result<Vec<f32>, ModelError> {
        if phoneme_ids.is_empty() {
            return Ok(Vec::new());
        }

        let input_len = phoneme_ids.len();
        let noise_factor = temperature / NEUTRAL_TEMPERATURE;

        // input: [batch, sequence] = [1, phoneme_count]
        let input_value = Value::from_array((vec![1, input_len], phoneme_ids.to_vec()))
            .map_err(|e| ModelError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let lengths_value = Value::from_array((vec![1], vec![input_len as i64]))
            .map_err(|e| ModelError::Inference(format!("Failed to create lengths tensor: {}", e)))?;

        // scales: [noise_scale, length_scale, noise_w]
        let scales_value = Value::from_array((
            vec![3],
            vec![
                self.noise_scale * noise_factor,
                self.length_scale,
                self.noise_w * noise_factor,
            ],
        ))
        .map_err(|e| ModelError::Inference(format!("Failed to create scales tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_value, lengths_value, scales_value])
            .map_err(|e| ModelError::Inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("output")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| ModelError::Inference("Missing output tensor".to_string()))?;

        let output_view = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok(output_view.1.iter().copied().collect())
    }
}

impl SpeechModel for PiperModel {
    fn sample_rate(&self) -> u32 {
        self.voice.config.audio.sample_rate
    }

    fn reseed(&mut self, seed: u64) {
        tracing::debug!(seed, "Piper graph samples its own noise; seed has no effect");
    }

    fn generate(
        &mut self,
        text: &str,
        reference: Option<&Path>,
        params: &SamplingParams,
    ) -> Result<Waveform, ModelError> {
        if let Some(reference) = reference {
            if !reference.exists() {
                return Err(ModelError::ReferenceMissing(reference.display().to_string()));
            }
            tracing::debug!("Piper backend ignores reference audio {}", reference.display());
        }

        let spoken = markup::events_to_pauses(text);
        let phonemes = phonemize(&spoken, self.voice.espeak_voice())?;
        let ids = phonemes_to_ids(&phonemes, &self.voice.config.phoneme_id_map);
        let samples = self.synthesize(&ids, params.temperature)?;

        let frames = samples.len();
        let samples = ArrayD::from_shape_vec(IxDyn(&[frames]), samples)
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        Ok(Waveform {
            samples,
            sample_rate: self.sample_rate(),
        })
    }
}

/// Convert text to phonemes using espeak-ng
pub fn phonemize(text: &str, voice: &str) -> Result<String, ModelError> {
    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let output = Command::new("espeak-ng")
        .args(["--ipa", "-q", "-v", voice, text])
        .output()
        .map_err(|e| {
            ModelError::Inference(format!("Failed to run espeak-ng (is it installed?): {}", e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ModelError::Inference(format!("espeak-ng failed: {}", stderr)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Convert phonemes to IDs using the model's phoneme map
pub fn phonemes_to_ids(phonemes: &str, id_map: &HashMap<String, Vec<i64>>) -> Vec<i64> {
    let mut ids = Vec::new();

    // BOS
    match id_map.get("^") {
        Some(bos) => ids.extend(bos),
        None => ids.push(0),
    }

    let pad = id_map.get("_");
    for ch in phonemes.chars() {
        if let Some(mapped) = id_map.get(ch.to_string().as_str()) {
            ids.extend(mapped);
        }
        if let Some(pad) = pad {
            ids.extend(pad);
        }
    }

    // EOS
    match id_map.get("$") {
        Some(eos) => ids.extend(eos),
        None => ids.push(0),
    }

    ids
}
