//! Backend abstraction for speech-to-text engines.
//!
//! The HTTP layer depends on the [`Transcriber`] trait instead of a concrete
//! implementation, which keeps request handling decoupled from inference code.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::segments::Segment;

pub mod whisper_rs;

/// Input payload consumed by a transcription backend.
#[derive(Debug, Clone)]
pub struct TranscribeRequest {
    /// Audio samples as 16 kHz mono PCM in `f32` range `[-1.0, 1.0]`.
    pub audio_16khz_mono_f32: Vec<f32>,
    /// Optional language hint such as `"en"`.
    pub language: Option<String>,
}

/// Full inference result returned by a backend.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    /// Concatenated normalized transcript text.
    pub text: String,
    /// Hinted or detected language if available.
    pub language: Option<String>,
    /// Timed segments in order of appearance.
    pub segments: Vec<Segment>,
}

/// Backend contract implemented by speech-to-text engines.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Runs inference and returns a transcript result.
    async fn transcribe(&self, req: TranscribeRequest) -> Result<TranscriptResult, AppError>;
}

/// Builds the configured backend implementation.
pub fn build_backend(cfg: &AppConfig) -> Result<Arc<dyn Transcriber>, AppError> {
    Ok(Arc::new(whisper_rs::WhisperRsBackend::new(cfg)?))
}

/// Collapses all whitespace runs to one space.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize_text;

    #[test]
    fn normalize_collapses_spaces() {
        assert_eq!(normalize_text("  hello   world\nagain"), "hello world again");
    }
}
