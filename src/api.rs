//! HTTP API: upload, transcribe, translate, burn and download.
//!
//! Handlers own form parsing, authentication and response shaping. Media work
//! goes through [`MediaTool`], inference through the injected [`Transcriber`]
//! and [`TranslationService`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::audio::decode_wav_file;
use crate::backend::{TranscribeRequest, Transcriber};
use crate::config::{AppConfig, MAX_BATCH_SIZE};
use crate::error::AppError;
use crate::languages::{resolve_target, supported_languages};
use crate::media::MediaTool;
use crate::segments::SegmentInput;
use crate::storage::{derived_path, file_name, validate_video_extension, UploadStore};
use crate::subtitles::write_srt;
use crate::translate::TranslationService;

/// Human-readable service name returned by status endpoints.
pub const APP_NAME: &str = "video-translator";
/// Service version string returned by status endpoints.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state injected into all route handlers.
pub struct AppState {
    /// Runtime configuration loaded at startup.
    pub cfg: AppConfig,
    /// Upload directory.
    pub store: UploadStore,
    /// External media tool.
    pub media: MediaTool,
    /// Speech-to-text backend.
    pub transcriber: Arc<dyn Transcriber>,
    /// Translation policy over the loaded model.
    pub translation: TranslationService,
}

impl AppState {
    pub fn new(
        cfg: AppConfig,
        store: UploadStore,
        media: MediaTool,
        transcriber: Arc<dyn Transcriber>,
        translation: TranslationService,
    ) -> Self {
        Self {
            cfg,
            store,
            media,
            transcriber,
            translation,
        }
    }
}

/// Builds the Axum router for all public endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.cfg.max_upload_bytes();
    Router::new()
        .route("/", get(root))
        .route("/api/", get(api_root))
        .route("/upload/", post(upload_video))
        .route("/transcribe/", post(transcribe_video))
        .route("/translate/", post(translate_transcript))
        .route("/languages/", get(languages))
        .route("/info/:filename", get(video_info))
        .route("/burn/", post(burn_subtitles))
        .route("/download/:filename", get(download_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
}

/// Service status (`GET /`).
pub async fn root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    Ok(Json(json!({
        "status": "ok",
        "name": APP_NAME,
        "version": APP_VERSION,
    })))
}

/// API liveness message (`GET /api/`).
pub async fn api_root(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    Ok(Json(json!({"message": "Video Translator API is running"})))
}

/// Stores an uploaded video under a generated name (`POST /upload/`).
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    let form = read_form(&mut multipart).await?;

    let (original_name, bytes) = form.file.ok_or_else(|| {
        AppError::invalid_request("missing required multipart field: file", Some("file"), None)
    })?;
    validate_video_extension(&original_name)?;
    if bytes.is_empty() {
        return Err(AppError::invalid_request(
            "uploaded file is empty",
            Some("file"),
            Some("empty_file"),
        ));
    }

    let filename = state.store.save_upload(&original_name, &bytes).await?;
    Ok(Json(json!({
        "message": "Video uploaded successfully",
        "filename": filename,
    })))
}

/// Extracts audio, transcribes it and writes `<stem>.srt` (`POST /transcribe/`).
pub async fn transcribe_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    let form = read_form(&mut multipart).await?;
    let filename = form.required("filename")?;
    let language = form.text("lang").map(ToOwned::to_owned);

    let video = state.store.existing(filename, "Video")?;
    let audio = state.media.extract_audio(&video, state.store.root()).await?;
    let audio_16khz_mono_f32 = task::spawn_blocking(move || decode_wav_file(&audio))
        .await
        .map_err(|err| AppError::internal(format!("audio decode task failed: {err}")))??;

    info!(filename, language = language.as_deref().unwrap_or("auto"), "transcribing");
    let result = state
        .transcriber
        .transcribe(TranscribeRequest {
            audio_16khz_mono_f32,
            language,
        })
        .await?;

    let srt_path = derived_path(&video, ".srt");
    let entries = result
        .segments
        .iter()
        .cloned()
        .map(SegmentInput::from)
        .collect::<Vec<_>>();
    write_srt(&entries, &srt_path).await?;

    Ok(Json(json!({
        "message": "Transcription complete",
        "filename": filename,
        "transcript": result.text,
        "language": result.language,
        "segments": result.segments,
        "srt_file": file_name(&srt_path),
    })))
}

/// Translates a transcript and optional timed segments (`POST /translate/`).
///
/// Segments are translated one by one unless `batch_size` (or `batch=true`
/// for the configured size) asks for batching. Malformed segment JSON is
/// logged and reported as `translated_segments: null`. With `filename`, the
/// translated segments are also written to `<stem>_<target>.srt`.
pub async fn translate_transcript(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    let form = read_form(&mut multipart).await?;

    let transcript = form.raw("transcript").ok_or_else(|| missing_field("transcript"))?;
    let target_lang = form.required("target_lang")?;
    resolve_target(target_lang)?;
    let source_lang = form.text("source_lang").unwrap_or("en");
    let batch_size = requested_batch_size(&form, state.cfg.batch_size)?;

    let translated_text = state
        .translation
        .translate_text(transcript, target_lang, source_lang)
        .await?;

    let translated_segments = match form.text("segments") {
        None => None,
        Some(raw) => match serde_json::from_str::<Vec<SegmentInput>>(raw) {
            Ok(segments) => Some(match batch_size {
                Some(size) => {
                    state
                        .translation
                        .batch_translate_segments(&segments, target_lang, source_lang, size)
                        .await
                }
                None => {
                    state
                        .translation
                        .translate_segments(&segments, target_lang, source_lang)
                        .await
                }
            }),
            Err(err) => {
                warn!(error = %err, "error processing segments");
                None
            }
        },
    };

    let srt_file = match (form.text("filename"), translated_segments.as_ref()) {
        (Some(filename), Some(segments)) => {
            let video = state.store.existing(filename, "Video")?;
            let srt_path = derived_path(
                &video,
                &format!("_{}.srt", target_lang.trim().to_ascii_lowercase()),
            );
            let entries = segments
                .iter()
                .cloned()
                .map(SegmentInput::from)
                .collect::<Vec<_>>();
            write_srt(&entries, &srt_path).await?;
            Some(file_name(&srt_path))
        }
        _ => None,
    };

    Ok(Json(json!({
        "message": format!("Translation to '{target_lang}' complete"),
        "translated_text": translated_text,
        "translated_segments": translated_segments,
        "srt_file": srt_file,
    })))
}

/// Lists supported language codes (`GET /languages/`).
pub async fn languages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    Ok(Json(json!({"supported_languages": supported_languages()})))
}

/// Probes a stored video (`GET /info/{filename}`).
pub async fn video_info(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    let video = state.store.existing(&filename, "Video")?;
    let info = state.media.probe(&video).await?;
    Ok(Json(json!({"filename": filename, "info": info})))
}

/// Burns a stored SRT file into a stored video (`POST /burn/`).
pub async fn burn_subtitles(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_auth(&state.cfg, &headers)?;
    let form = read_form(&mut multipart).await?;

    let video = state.store.existing(form.required("filename")?, "Video")?;
    let srt = state.store.existing(form.required("srt_file")?, "SRT")?;
    let output = derived_path(&video, "_subtitled.mp4");

    state.media.burn_subtitles(&video, &srt, &output).await?;

    let output_name = file_name(&output);
    Ok(Json(json!({
        "message": "Subtitled video ready",
        "download_url": format!("/download/{output_name}"),
        "output": output_name,
    })))
}

/// Sends a stored file as an attachment (`GET /download/{filename}`).
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    require_auth(&state.cfg, &headers)?;
    let path = state.store.existing(&filename, "Requested")?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|err| AppError::internal(format!("failed to read {path:?}: {err}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name(&path)),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// Collected multipart fields: text fields by name plus at most one file.
#[derive(Debug, Default)]
struct FormData {
    fields: HashMap<String, String>,
    file: Option<(String, Vec<u8>)>,
}

impl FormData {
    /// Field value exactly as sent.
    fn raw(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Trimmed field value, `None` when missing or blank.
    fn text(&self, name: &str) -> Option<&str> {
        self.raw(name).map(str::trim).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name).ok_or_else(|| missing_field(name))
    }
}

fn missing_field(name: &str) -> AppError {
    AppError::invalid_request(
        format!("missing required form field: {name}"),
        Some(name),
        Some("missing_field"),
    )
}

async fn read_form(multipart: &mut Multipart) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_multipart(format!("invalid multipart body: {err}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        if name == "file" {
            let filename = field
                .file_name()
                .map(ToOwned::to_owned)
                .ok_or_else(|| AppError::bad_multipart("file field is missing filename"))?;
            let bytes = field.bytes().await.map_err(|err| {
                AppError::bad_multipart(format!("failed to read file bytes: {err}"))
            })?;
            form.file = Some((filename, bytes.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| AppError::bad_multipart(format!("invalid {name} field: {err}")))?;
        form.fields.insert(name, value);
    }

    Ok(form)
}

/// Resolves the batching request: explicit `batch_size`, `batch=true` for the
/// configured default, or `None` for per-segment translation.
fn requested_batch_size(form: &FormData, default: usize) -> Result<Option<usize>, AppError> {
    if let Some(raw) = form.text("batch_size") {
        let size = raw
            .parse::<usize>()
            .ok()
            .filter(|size| (1..=MAX_BATCH_SIZE).contains(size))
            .ok_or_else(|| {
                AppError::invalid_request(
                    format!("invalid batch_size={raw:?}; expected integer in range [1, {MAX_BATCH_SIZE}]"),
                    Some("batch_size"),
                    Some("invalid_batch_size"),
                )
            })?;
        return Ok(Some(size));
    }

    let batch = form
        .text("batch")
        .map(|raw| matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    Ok(batch.then_some(default))
}

/// Enforces optional bearer-token authentication.
fn require_auth(cfg: &AppConfig, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = cfg.api_key.as_deref() else {
        return Ok(());
    };

    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    let mut parts = value.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AppError::unauthorized("missing bearer token"));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("missing bearer token"));
    }
    if token != expected {
        return Err(AppError::unauthorized("invalid token"));
    }

    Ok(())
}
