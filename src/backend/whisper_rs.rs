//! `whisper-rs` backend implementation.
//!
//! The model is loaded once at startup; inference runs on a blocking worker
//! thread while holding the single context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task;
use tracing::{info, warn};
use whisper_rs::{
    get_lang_str, FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters,
    WhisperState,
};

use crate::backend::{normalize_text, TranscribeRequest, Transcriber, TranscriptResult};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::segments::Segment;

/// Local inference backend powered by `whisper-rs`.
pub struct WhisperRsBackend {
    model_path: String,
    context: Arc<Mutex<WhisperContext>>,
}

impl WhisperRsBackend {
    /// Loads the configured Whisper model.
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let model_path = cfg.whisper_model.clone();
        let mut params = WhisperContextParameters::default();
        params.use_gpu(cfg.whisper_use_gpu);

        let context = WhisperContext::new_with_params(&model_path, params).map_err(|err| {
            AppError::backend(format!("failed to load model at {model_path:?}: {err}"))
        })?;

        info!(
            model = %model_path,
            use_gpu = cfg.whisper_use_gpu,
            "loaded whisper model"
        );

        Ok(Self {
            model_path,
            context: Arc::new(Mutex::new(context)),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperRsBackend {
    async fn transcribe(&self, req: TranscribeRequest) -> Result<TranscriptResult, AppError> {
        let model_path = self.model_path.clone();
        let context = Arc::clone(&self.context);
        task::spawn_blocking(move || run_whisper_rs(req, &model_path, context))
            .await
            .map_err(|err| AppError::backend(format!("whisper-rs worker task failed: {err}")))?
    }
}

fn params_for(language: Option<&str>) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_no_timestamps(false);
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_max_initial_ts(5.0);
    match language {
        Some(language) => params.set_language(Some(language)),
        None => params.set_detect_language(true),
    }
    params
}

fn run_whisper_rs(
    req: TranscribeRequest,
    model_path: &str,
    context: Arc<Mutex<WhisperContext>>,
) -> Result<TranscriptResult, AppError> {
    let context_guard = context
        .lock()
        .map_err(|_| AppError::backend("failed to lock whisper model context"))?;

    let mut state = context_guard
        .create_state()
        .map_err(|err| AppError::backend(format!("failed to create whisper state: {err}")))?;

    let hint = req
        .language
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty());

    state
        .full(params_for(hint), &req.audio_16khz_mono_f32)
        .map_err(|err| {
            AppError::backend(format!(
                "whisper inference failed using {model_path:?}: {err}"
            ))
        })?;
    let mut segments = extract_segments(&state)?;

    if segments.is_empty() && hint.is_none() {
        state
            .full(params_for(Some("en")), &req.audio_16khz_mono_f32)
            .map_err(|err| {
                AppError::backend(format!(
                    "whisper fallback inference failed using {model_path:?}: {err}"
                ))
            })?;
        let fallback = extract_segments(&state)?;
        if !fallback.is_empty() {
            warn!(
                audio_samples = req.audio_16khz_mono_f32.len(),
                segment_count = fallback.len(),
                "whisper fallback used English after empty auto-detect output"
            );
            segments = fallback;
        }
    }

    let text = normalize_text(
        &segments
            .iter()
            .map(|seg| seg.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    );
    if text.is_empty() {
        warn!(
            audio_samples = req.audio_16khz_mono_f32.len(),
            "whisper inference completed with empty transcript"
        );
    }

    let language = match hint {
        Some(lang) => Some(lang.to_string()),
        None => get_lang_str(state.full_lang_id_from_state()).map(ToOwned::to_owned),
    };

    Ok(TranscriptResult {
        text,
        language,
        segments,
    })
}

fn extract_segments(state: &WhisperState) -> Result<Vec<Segment>, AppError> {
    let count = state.full_n_segments();
    let mut segments = Vec::with_capacity(count.max(0) as usize);
    for i in 0..count {
        let Some(seg) = state.get_segment(i) else {
            continue;
        };
        let text = seg
            .to_str_lossy()
            .map_err(|err| AppError::backend(format!("failed to read segment text: {err}")))?
            .trim()
            .to_string();
        if text.is_empty() {
            continue;
        }

        // whisper timestamps are in centiseconds
        segments.push(Segment::new(
            seg.start_timestamp() as f64 * 0.01,
            seg.end_timestamp() as f64 * 0.01,
            text,
        ));
    }
    Ok(segments)
}
