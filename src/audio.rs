use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::{Array1, Array2, ArrayD, Axis, Ix1, Ix2};

use crate::config::WavFormat;
use crate::error::AppError;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("unsupported waveform shape {0:?}")]
    UnsupportedShape(Vec<usize>),

    #[error("too many channels: {0}")]
    TooManyChannels(usize),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

impl From<AudioError> for AppError {
    fn from(e: AudioError) -> Self {
        AppError::AudioError(e.to_string())
    }
}

/// Float32 audio clipped to [-1, 1], ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalAudio {
    Mono(Array1<f32>),
    /// `(frames, channels)`, standard layout so iteration is interleaved.
    MultiChannel(Array2<f32>),
}

impl CanonicalAudio {
    pub fn channels(&self) -> usize {
        match self {
            CanonicalAudio::Mono(_) => 1,
            CanonicalAudio::MultiChannel(a) => a.ncols(),
        }
    }

    pub fn frames(&self) -> usize {
        match self {
            CanonicalAudio::Mono(a) => a.len(),
            CanonicalAudio::MultiChannel(a) => a.nrows(),
        }
    }

    #[cfg(test)]
    pub fn into_dyn(self) -> ArrayD<f32> {
        match self {
            CanonicalAudio::Mono(a) => a.into_dyn(),
            CanonicalAudio::MultiChannel(a) => a.into_dyn(),
        }
    }

    fn samples(&self) -> Box<dyn Iterator<Item = f32> + '_> {
        match self {
            CanonicalAudio::Mono(a) => Box::new(a.iter().copied()),
            CanonicalAudio::MultiChannel(a) => Box::new(a.iter().copied()),
        }
    }
}

/// Bring a raw model waveform into canonical form.
///
/// Multi-dimensional buffers whose first axis is shorter than the second are
/// transposed, a leading (or, for 2-D, trailing) single channel is dropped,
/// and every sample is cast to f32 and clipped to [-1, 1]. NaN becomes
/// silence.
pub fn normalize<T>(wav: ArrayD<T>) -> Result<CanonicalAudio, AudioError>
where
    T: Copy + Into<f64>,
{
    let mut wav = wav;

    if wav.ndim() > 1 {
        if wav.shape()[0] < wav.shape()[1] {
            wav = wav.reversed_axes();
        }
        if wav.shape()[0] == 1 {
            wav = wav.index_axis_move(Axis(0), 0);
        } else if wav.ndim() == 2 && wav.shape()[1] == 1 {
            wav = wav.index_axis_move(Axis(1), 0);
        }
    }

    let wav = wav.mapv(|s| {
        let s = s.into() as f32;
        if s.is_nan() {
            0.0
        } else {
            s.clamp(-1.0, 1.0)
        }
    });

    match wav.ndim() {
        0 => Ok(CanonicalAudio::Mono(Array1::from_iter(wav.iter().copied()))),
        1 => wav
            .into_dimensionality::<Ix1>()
            .map(CanonicalAudio::Mono)
            .map_err(|_| AudioError::UnsupportedShape(Vec::new())),
        2 => {
            let shape = wav.shape().to_vec();
            wav.into_dimensionality::<Ix2>()
                .map(|a| CanonicalAudio::MultiChannel(a.as_standard_layout().into_owned()))
                .map_err(|_| AudioError::UnsupportedShape(shape))
        }
        _ => Err(AudioError::UnsupportedShape(wav.shape().to_vec())),
    }
}

/// Encode canonical audio as an in-memory WAV file.
pub fn encode_wav(
    audio: &CanonicalAudio,
    sample_rate: u32,
    format: WavFormat,
) -> Result<Vec<u8>, AudioError> {
    let channels = u16::try_from(audio.channels())
        .map_err(|_| AudioError::TooManyChannels(audio.channels()))?;

    let spec = match format {
        WavFormat::Pcm16 => WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
        WavFormat::Float32 => WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    };

    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let mut writer = WavWriter::new(cursor, spec)?;

        for sample in audio.samples() {
            match format {
                WavFormat::Pcm16 => {
                    let scaled = (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16;
                    writer.write_sample(scaled)?;
                }
                WavFormat::Float32 => writer.write_sample(sample)?,
            }
        }

        writer.finalize()?;
    }

    Ok(buffer)
}
