use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use hound::{SampleFormat, WavReader};
use ndarray::Array2;

use super::{ModelError, ModelLoader, SamplingParams, SpeechModel, Waveform};
use crate::config::Device;

/// Sample rate reported before the first generation has been observed.
const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Runs an external synthesis program per request.
///
/// The program receives the text and sampling parameters as flags and must
/// write a WAV file to stdout:
///
/// ```text
/// <program> [args..] --text T --device D --temperature F --top-p F --top-k N
///     --repetition-penalty F --min-p F [--norm-loudness] [--audio-prompt PATH] [--seed N]
/// ```
pub struct CommandLoader {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandLoader {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl ModelLoader for CommandLoader {
    fn load_pretrained(&self, device: Device) -> Result<Box<dyn SpeechModel>, ModelError> {
        // bare names are looked up on PATH when the program runs
        let has_dir = self.program.components().count() > 1;
        if has_dir && !self.program.is_file() {
            return Err(ModelError::Load(format!(
                "synthesis program {} not found",
                self.program.display()
            )));
        }

        Ok(Box::new(CommandModel {
            program: self.program.clone(),
            args: self.args.clone(),
            device,
            pending_seed: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }))
    }
}

pub struct CommandModel {
    program: PathBuf,
    args: Vec<String>,
    device: Device,
    /// Passed as `--seed` on the next call only.
    pending_seed: Option<u64>,
    sample_rate: u32,
}

impl CommandModel {
    fn build_command(
        &self,
        text: &str,
        reference: Option<&Path>,
        params: &SamplingParams,
    ) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--text")
            .arg(text)
            .arg("--device")
            .arg(self.device.as_str())
            .arg("--temperature")
            .arg(params.temperature.to_string())
            .arg("--top-p")
            .arg(params.top_p.to_string())
            .arg("--top-k")
            .arg(params.top_k.to_string())
            .arg("--repetition-penalty")
            .arg(params.repetition_penalty.to_string())
            .arg("--min-p")
            .arg(params.min_p.to_string());

        if params.norm_loudness {
            cmd.arg("--norm-loudness");
        }
        if let Some(reference) = reference {
            cmd.arg("--audio-prompt").arg(reference);
        }
        if let Some(seed) = self.pending_seed {
            cmd.arg("--seed").arg(seed.to_string());
        }
        cmd
    }
}

impl SpeechModel for CommandModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn reseed(&mut self, seed: u64) {
        self.pending_seed = Some(seed);
    }

    fn generate(
        &mut self,
        text: &str,
        reference: Option<&Path>,
        params: &SamplingParams,
    ) -> Result<Waveform, ModelError> {
        let output = self
            .build_command(text, reference, params)
            .output()
            .map_err(|e| {
                ModelError::Inference(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;
        self.pending_seed = None;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModelError::Inference(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        let waveform = decode_wav(&output.stdout)?;
        self.sample_rate = waveform.sample_rate;
        Ok(waveform)
    }
}

/// Decode WAV bytes into a `(channels, frames)` float buffer.
pub fn decode_wav(bytes: &[u8]) -> Result<Waveform, ModelError> {
    let reader = WavReader::new(Cursor::new(bytes))
        .map_err(|e| ModelError::Inference(format!("Program did not produce WAV output: {}", e)))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| ModelError::Inference(format!("Invalid WAV samples: {}", e)))?,
        SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(|e| ModelError::Inference(format!("Invalid WAV samples: {}", e)))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let frames = interleaved.len() / channels;
    let frame_major = Array2::from_shape_vec((frames, channels), interleaved)
        .map_err(|e| ModelError::Inference(format!("Truncated WAV frame: {}", e)))?;

    Ok(Waveform {
        samples: frame_major.reversed_axes().as_standard_layout().into_owned().into_dyn(),
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn stereo_fixture(path: &Path) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for s in [16384i16, -16384, 0, 8192, 0, 0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn shell(script: &str) -> CommandModel {
        CommandModel {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string(), "synth".to_string()],
            device: Device::Cpu,
            pending_seed: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    #[test]
    fn decodes_interleaved_pcm_as_channels_first() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("out.wav");
        stereo_fixture(&fixture);

        let waveform = decode_wav(&std::fs::read(&fixture).unwrap()).unwrap();

        assert_eq!(waveform.sample_rate, 22_050);
        assert_eq!(waveform.samples.shape(), &[2, 3]);
        assert_eq!(waveform.samples[[0, 0]], 0.5);
        assert_eq!(waveform.samples[[1, 0]], -0.5);
        assert_eq!(waveform.samples[[1, 1]], 0.25);
    }

    #[test]
    fn passes_parameters_and_seed_once() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture = tmp.path().join("out.wav");
        let args_log = tmp.path().join("args.txt");
        stereo_fixture(&fixture);
        let script = format!(
            "printf '%s\\n' \"$@\" >> '{}'; cat '{}'",
            args_log.display(),
            fixture.display()
        );
        let mut model = shell(&script);
        let reference = tmp.path().join("ref.wav");

        model.reseed(42);
        let waveform = model
            .generate(
                "Hello [cough] world",
                Some(reference.as_path()),
                &SamplingParams::default(),
            )
            .unwrap();
        model
            .generate("again", None, &SamplingParams::default())
            .unwrap();

        assert_eq!(waveform.samples.shape(), &[2, 3]);
        assert_eq!(model.sample_rate(), 22_050);

        let log = std::fs::read_to_string(&args_log).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(&lines[..2], &["--text", "Hello [cough] world"]);
        assert!(lines.windows(2).any(|w| w == ["--top-k", "1000"]));
        assert!(lines.contains(&"--norm-loudness"));
        assert!(lines
            .windows(2)
            .any(|w| w[0] == "--audio-prompt" && w[1] == reference.to_str().unwrap()));
        assert_eq!(lines.iter().filter(|l| **l == "--seed").count(), 1);
        assert!(lines.windows(2).any(|w| w == ["--seed", "42"]));
    }

    #[test]
    fn failing_program_reports_stderr() {
        let mut model = shell("echo boom >&2; exit 3");

        let err = model
            .generate("hi", None, &SamplingParams::default())
            .unwrap_err();

        assert!(matches!(err, ModelError::Inference(msg) if msg.contains("boom")));
    }

    #[test]
    fn loader_accepts_bare_program_name() {
        let loader = CommandLoader::new(PathBuf::from("synth-on-path"), Vec::new());
        let model = loader.load_pretrained(Device::Cuda).unwrap();
        assert_eq!(model.sample_rate(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn loader_rejects_missing_program() {
        let loader = CommandLoader::new(PathBuf::from("/nonexistent/synth"), Vec::new());
        assert!(matches!(
            loader.load_pretrained(Device::Cpu),
            Err(ModelError::Load(_))
        ));
    }
}
