use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(name = "turbo-tts-server")]
#[command(about = "HTTP API for text-to-speech with voice cloning", version)]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "VOICES_DIR", default_value = "./voices")]
    pub voices_dir: PathBuf,

    #[arg(long, env = "STATIC_DIR", default_value = "./static")]
    pub static_dir: PathBuf,

    #[arg(long, env = "DEVICE", value_enum, help = "Compute device; detected when omitted")]
    pub device: Option<Device>,

    #[arg(long, env = "TTS_BACKEND", value_enum, default_value_t = Backend::Piper)]
    pub backend: Backend,

    #[arg(
        long,
        env = "TTS_MODEL",
        default_value = "./models/model.onnx",
        help = "ONNX model file (piper) or program to execute (command)"
    )]
    pub model: PathBuf,

    #[arg(
        long = "model-arg",
        env = "TTS_MODEL_ARGS",
        value_delimiter = ' ',
        allow_hyphen_values = true,
        help = "Extra arguments passed to the command backend"
    )]
    pub model_args: Vec<String>,

    #[arg(long, env = "WAV_FORMAT", value_enum, default_value_t = WavFormat::Pcm16)]
    pub wav_format: WavFormat,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    #[arg(long, env = "PRELOAD_MODEL", help = "Load the model at startup")]
    pub preload: bool,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn resolved_device(&self) -> Device {
        self.device.unwrap_or_else(Device::detect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    pub fn detect() -> Self {
        if cuda_available() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an NVIDIA driver is visible to this process.
pub fn cuda_available() -> bool {
    if let Ok(visible) = std::env::var("CUDA_VISIBLE_DEVICES") {
        let visible = visible.trim();
        if visible.is_empty() || visible == "-1" {
            return false;
        }
    }
    Path::new("/dev/nvidiactl").exists() || Path::new("/proc/driver/nvidia/version").exists()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Piper,
    Command,
}

impl Backend {
    /// Whether reference audio and seeds reach the model. Piper graphs have
    /// a fixed speaker and an internal noise source.
    pub fn clones_voices(&self) -> bool {
        matches!(self, Backend::Command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WavFormat {
    /// 16-bit signed integer PCM
    Pcm16,
    /// 32-bit IEEE float
    Float32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::parse_from(["turbo-tts-server", "--port", "8000"]);
        assert_eq!(config.backend, Backend::Piper);
        assert_eq!(config.wav_format, WavFormat::Pcm16);
        assert!(!config.preload);
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn only_command_backend_clones_voices() {
        assert!(!Backend::Piper.clones_voices());
        assert!(Backend::Command.clones_voices());
    }

    #[test]
    fn parses_command_backend_with_args() {
        let config = ServerConfig::parse_from([
            "turbo-tts-server",
            "--backend",
            "command",
            "--model",
            "/usr/local/bin/synth",
            "--model-arg",
            "--fast",
            "--device",
            "cpu",
        ]);
        assert_eq!(config.backend, Backend::Command);
        assert_eq!(config.model_args, vec!["--fast".to_string()]);
        assert_eq!(config.resolved_device(), Device::Cpu);
    }

    #[test]
    fn rejects_unknown_device() {
        let result = ServerConfig::try_parse_from(["turbo-tts-server", "--device", "tpu"]);
        assert!(result.is_err());
    }
}
