use std::path::PathBuf;
use std::sync::{Arc, OnceLock, PoisonError};
use std::time::Instant;

use tokio::sync::Mutex;

use super::{ModelError, ModelLoader, SamplingParams, SpeechModel, Waveform};
use crate::config::Device;

type SharedModel = Arc<Mutex<Box<dyn SpeechModel>>>;

/// One synthesis call as handed to the model.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub text: String,
    pub reference: Option<PathBuf>,
    pub params: SamplingParams,
    /// Non-zero values reseed the model right before this call. Zero or
    /// `None` keep whatever state earlier calls left behind.
    pub seed: Option<u64>,
}

/// Process-wide, lazily loaded model.
///
/// Loading runs at most once even when the first requests race or the
/// request that started it goes away: the load lives on the blocking pool,
/// gated by `load_gate`, and publishes into `model` itself. A failed load is
/// not cached and the next caller tries again. Generation is
/// serialized on the model lock, and reseeding happens under that same lock,
/// so concurrent seeded requests cannot perturb each other.
pub struct ModelHandle {
    loader: Arc<dyn ModelLoader>,
    device: Device,
    model: Arc<OnceLock<SharedModel>>,
    load_gate: Arc<std::sync::Mutex<()>>,
}

impl ModelHandle {
    pub fn new(loader: Arc<dyn ModelLoader>, device: Device) -> Self {
        Self {
            loader,
            device,
            model: Arc::new(OnceLock::new()),
            load_gate: Arc::new(std::sync::Mutex::new(())),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub async fn get_or_load(&self) -> Result<SharedModel, ModelError> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let loader = Arc::clone(&self.loader);
        let cell = Arc::clone(&self.model);
        let gate = Arc::clone(&self.load_gate);
        let device = self.device;

        // Dropping the JoinHandle detaches the task; the load still finishes
        // and lands in `cell` for the next caller.
        tokio::task::spawn_blocking(move || -> Result<SharedModel, ModelError> {
            let _gate = gate.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(model) = cell.get() {
                return Ok(Arc::clone(model));
            }

            tracing::info!("Loading TTS model on {}...", device);
            let started = Instant::now();
            let model = loader.load_pretrained(device)?;
            tracing::info!(
                sample_rate = model.sample_rate(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "TTS model loaded"
            );

            let model = Arc::new(Mutex::new(model));
            Ok(Arc::clone(cell.get_or_init(|| model)))
        })
        .await
        .map_err(|e| ModelError::Load(format!("loader task failed: {}", e)))?
    }

    /// Run one generation on the blocking pool.
    pub async fn generate(&self, job: GenerationJob) -> Result<Waveform, ModelError> {
        let model = self.get_or_load().await?;

        tokio::task::spawn_blocking(move || {
            let mut model = model.blocking_lock();
            if let Some(seed) = job.seed.filter(|s| *s != 0) {
                tracing::debug!(seed, "Reseeding model");
                model.reseed(seed);
            }
            model.generate(&job.text, job.reference.as_deref(), &job.params)
        })
        .await
        .map_err(|e| ModelError::Inference(format!("generation task failed: {}", e)))?
    }
}
