//! Recording fake model shared by unit and router tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ndarray::{ArrayD, IxDyn};

use super::{ModelError, ModelLoader, SamplingParams, SpeechModel, Waveform};
use crate::config::Device;

pub const FAKE_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub text: String,
    pub reference: Option<PathBuf>,
    pub reference_existed: bool,
    pub params: SamplingParams,
    pub rng_state: u64,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<RecordedCall>>,
    reseeds: Mutex<Vec<u64>>,
}

#[derive(Clone, Default)]
pub struct FakeLoader {
    pub loads: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    load_delay_ms: u64,
    shared: Arc<Shared>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_delay_ms(mut self, ms: u64) -> Self {
        self.load_delay_ms = ms;
        self
    }

    pub fn failing_loads(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn reseeds(&self) -> Vec<u64> {
        self.shared.reseeds.lock().unwrap().clone()
    }
}

impl ModelLoader for FakeLoader {
    fn load_pretrained(&self, _device: Device) -> Result<Box<dyn SpeechModel>, ModelError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.load_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.load_delay_ms));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ModelError::Load("weights unavailable".into()));
        }
        Ok(Box::new(FakeModel {
            rng_state: 1,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeModel {
    rng_state: u64,
    shared: Arc<Shared>,
}

impl SpeechModel for FakeModel {
    fn sample_rate(&self) -> u32 {
        FAKE_SAMPLE_RATE
    }

    fn reseed(&mut self, seed: u64) {
        self.rng_state = seed;
        self.shared.reseeds.lock().unwrap().push(seed);
    }

    fn generate(
        &mut self,
        text: &str,
        reference: Option<&Path>,
        params: &SamplingParams,
    ) -> Result<Waveform, ModelError> {
        self.shared.calls.lock().unwrap().push(RecordedCall {
            text: text.to_string(),
            reference: reference.map(Path::to_path_buf),
            reference_existed: reference.map(Path::exists).unwrap_or(false),
            params: params.clone(),
            rng_state: self.rng_state,
        });
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);

        if text.contains("fail") {
            return Err(ModelError::Inference("fake model refused".into()));
        }

        // (channels, frames) with out-of-range samples, like a raw model tensor
        let samples = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![0.0, 0.5, -1.5, 2.0])
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        Ok(Waveform {
            samples,
            sample_rate: FAKE_SAMPLE_RATE,
        })
    }
}
