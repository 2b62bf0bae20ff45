use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, State,
    },
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::upload::{TempUpload, UploadForm};
use super::{GenerationRequest, HealthResponse, TagsResponse, VoicesResponse};
use crate::api::routes::AppState;
use crate::audio;
use crate::config;
use crate::error::AppError;
use crate::markup::EVENT_TAGS;
use crate::tts::{GenerationJob, SamplingParams};
use crate::voices::{ResolveMode, ResolvedVoiceReference, VoiceResolver};

const OUTPUT_FILENAME: &str = "tts_output.wav";
pub const X_SAMPLE_RATE: &str = "x-sample-rate";

/// `POST /api/tts`: unknown voice names fall through to `audio_prompt_path`.
pub async fn generate_tts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let params = request.validate()?;

    let reference = VoiceResolver::new(&state.catalog, ResolveMode::Lenient).resolve(
        request.voice.as_deref(),
        None,
        request.audio_prompt_path.as_deref(),
    )?;

    let seed = request.seed();
    synthesize(&state, request.text, reference, params, seed).await
}

/// `POST /api/tts/upload`: unknown voice names are rejected.
pub async fn generate_tts_upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let UploadForm { request, audio } = UploadForm::read(multipart?).await?;
    let params = request.validate()?;

    let upload = audio.as_ref().map(TempUpload::persist).transpose()?;

    let result = async {
        let reference = VoiceResolver::new(&state.catalog, ResolveMode::Strict).resolve(
            request.voice.as_deref(),
            upload.as_ref().map(TempUpload::path),
            request.audio_prompt_path.as_deref(),
        )?;
        synthesize(&state, request.text.clone(), reference, params, request.seed()).await
    }
    .await;

    if let Some(upload) = upload {
        upload.close();
    }

    result
}

async fn synthesize(
    state: &AppState,
    text: String,
    reference: ResolvedVoiceReference,
    params: SamplingParams,
    seed: Option<u64>,
) -> Result<Response, AppError> {
    tracing::info!(
        text_len = text.chars().count(),
        reference = reference.describe(),
        seed = ?seed,
        "Generating speech"
    );

    let waveform = state
        .model
        .generate(GenerationJob {
            text,
            reference: reference.path,
            params,
            seed,
        })
        .await?;

    let sample_rate = waveform.sample_rate;
    let audio = audio::normalize(waveform.samples)?;
    let wav = audio::encode_wav(&audio, sample_rate, state.wav_format)?;

    tracing::debug!(
        frames = audio.frames(),
        channels = audio.channels(),
        sample_rate,
        "Speech generated"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", OUTPUT_FILENAME),
            ),
            (HeaderName::from_static(X_SAMPLE_RATE), sample_rate.to_string()),
        ],
        wav,
    )
        .into_response())
}

pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.catalog.aliases(),
        count: state.catalog.file_count(),
    })
}

pub async fn list_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        tags: EVENT_TAGS.to_vec(),
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        device: state.model.device().to_string(),
        model_loaded: state.model.is_loaded(),
        cuda_available: config::cuda_available(),
    })
}
