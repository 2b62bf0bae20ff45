use std::io::Write;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tempfile::TempPath;

use super::GenerationRequest;
use crate::error::AppError;

/// Raw audio attachment from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct UploadForm {
    pub request: GenerationRequest,
    pub audio: Option<UploadedAudio>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut text: Option<String> = None;
        let mut request = GenerationRequest::new(String::new());
        let mut audio: Option<UploadedAudio> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {}", e)))?
        {
            let field_name = field.name().unwrap_or_default().to_string();

            if field_name == "audio_file" {
                let file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read audio_file: {}", e)))?;
                // browsers send an empty part when no file was chosen
                if !bytes.is_empty() {
                    audio = Some(UploadedAudio {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read {}: {}", field_name, e))
            })?;

            match field_name.as_str() {
                "text" => text = Some(value),
                "temperature" => request.temperature = parse_number(&field_name, &value)?,
                "top_p" => request.top_p = parse_number(&field_name, &value)?,
                "top_k" => request.top_k = parse_number(&field_name, &value)?,
                "repetition_penalty" => {
                    request.repetition_penalty = parse_number(&field_name, &value)?
                }
                "min_p" => request.min_p = parse_number(&field_name, &value)?,
                "norm_loudness" => request.norm_loudness = parse_bool(&field_name, &value)?,
                // unparsable seeds are ignored rather than rejected
                "seed" => request.seed = value.trim().parse().ok(),
                "voice" | "voice_name" => request.voice = non_blank(value),
                "audio_prompt_path" => request.audio_prompt_path = non_blank(value),
                _ => {}
            }
        }

        request.text = text.ok_or_else(|| AppError::BadRequest("text is required".into()))?;

        Ok(Self { request, audio })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a number, got '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadRequest(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Uploaded reference audio saved to a uniquely named temporary file.
///
/// The file belongs to one request. [`TempUpload::close`] deletes it and logs
/// failures; dropping the guard without closing (a panic or a cancelled
/// request) still removes it.
#[derive(Debug)]
pub struct TempUpload {
    path: TempPath,
}

impl TempUpload {
    pub fn persist(audio: &UploadedAudio) -> Result<Self, AppError> {
        let suffix = audio
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();

        let mut file = tempfile::Builder::new()
            .prefix("tts-upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&audio.bytes)?;
        file.flush()?;

        let path = file.into_temp_path();
        tracing::debug!(bytes = audio.bytes.len(), "Saved upload to {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) {
        let path_buf: PathBuf = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            tracing::warn!("Failed to remove temporary upload {}: {}", path_buf.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(name: Option<&str>) -> UploadedAudio {
        UploadedAudio {
            file_name: name.map(str::to_string),
            bytes: b"RIFF....WAVE".to_vec(),
        }
    }

    #[test]
    fn keeps_original_extension() {
        let upload = TempUpload::persist(&audio(Some("my voice.flac"))).unwrap();

        assert_eq!(upload.path().extension().unwrap(), "flac");
        assert_eq!(std::fs::read(upload.path()).unwrap(), b"RIFF....WAVE");
        upload.close();
    }

    #[test]
    fn unique_names_per_upload() {
        let a = TempUpload::persist(&audio(Some("a.wav"))).unwrap();
        let b = TempUpload::persist(&audio(Some("a.wav"))).unwrap();

        assert_ne!(a.path(), b.path());
        a.close();
        b.close();
    }

    #[test]
    fn close_deletes_file() {
        let upload = TempUpload::persist(&audio(None)).unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());

        upload.close();

        assert!(!path.exists());
    }

    #[test]
    fn drop_deletes_file() {
        let upload = TempUpload::persist(&audio(Some("x.mp3"))).unwrap();
        let path = upload.path().to_path_buf();

        drop(upload);

        assert!(!path.exists());
    }

    #[test]
    fn close_tolerates_already_removed_file() {
        let upload = TempUpload::persist(&audio(Some("x.wav"))).unwrap();
        std::fs::remove_file(upload.path()).unwrap();

        upload.close();
    }

    #[test]
    fn parses_lenient_booleans() {
        assert!(parse_bool("norm_loudness", "On").unwrap());
        assert!(!parse_bool("norm_loudness", "0").unwrap());
        assert!(parse_bool("norm_loudness", "maybe").is_err());
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(parse_number::<f64>("temperature", " 0.5 ").unwrap(), 0.5);
        assert!(parse_number::<i64>("top_k", "lots").is_err());
    }
}
