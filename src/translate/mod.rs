//! Text and segment translation on top of a pluggable model backend.
//!
//! Handlers depend on [`TranslationService`], which owns a [`Translator`] built
//! once at startup. Model call failures are typed as [`ModelCallError`] and are
//! always absorbed here: the caller gets the original text back instead.
//! Only an unknown target language escapes as an [`AppError`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::languages::{resolve_source, resolve_target};
use crate::segments::{Segment, SegmentInput};

pub mod chunker;
pub mod remote;

pub use chunker::chunk_text;

/// Texts longer than this many characters are chunked before translation.
pub const MAX_DIRECT_CHARS: usize = 512;
/// Generation length ceiling passed to every model call.
pub const MAX_GENERATION_LENGTH: usize = 1024;
/// Token joining segment texts for a combined batch call.
pub const BATCH_SEPARATOR: &str = " [SEP] ";
/// Default number of consecutive segments per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Failure of a single model call.
#[derive(Debug, thiserror::Error)]
pub enum ModelCallError {
    #[error("translation request failed: {0}")]
    Transport(String),
    #[error("translation endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected translation result format: {0}")]
    Malformed(String),
}

/// Contract implemented by translation model backends.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `text` from `source_tag` to `target_tag` in one call and
    /// returns the first result's translated string.
    async fn translate(
        &self,
        text: &str,
        source_tag: &str,
        target_tag: &str,
        max_length: usize,
    ) -> Result<String, ModelCallError>;
}

/// Builds the configured translation backend.
pub fn build_translator(cfg: &AppConfig) -> Result<Arc<dyn Translator>, AppError> {
    Ok(Arc::new(remote::HttpTranslator::new(cfg)?))
}

/// Why a combined batch call could not be used.
#[derive(Debug, thiserror::Error)]
enum BatchError {
    #[error("batch split mismatch: expected {expected} pieces, got {actual}")]
    SplitMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Translate(#[from] AppError),
}

/// Translation policy layered over a [`Translator`].
#[derive(Clone)]
pub struct TranslationService {
    model: Arc<dyn Translator>,
}

impl TranslationService {
    pub fn new(model: Arc<dyn Translator>) -> Self {
        Self { model }
    }

    /// Translates one text.
    ///
    /// Empty input returns an empty string without a model call. Unknown
    /// target codes fail; unknown source codes fall back to English. Texts over
    /// [`MAX_DIRECT_CHARS`] characters are chunked. A failed model call yields
    /// the original input unchanged.
    pub async fn translate_text(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<String, AppError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let target_tag = resolve_target(target_lang)?;
        let source_tag = resolve_source(source_lang);

        let clean = text.trim();
        if clean.chars().count() > MAX_DIRECT_CHARS {
            return Ok(self.translate_long_text(clean, source_tag, target_tag).await);
        }

        match self
            .model
            .translate(clean, source_tag, target_tag, MAX_GENERATION_LENGTH)
            .await
        {
            Ok(translated) => Ok(translated),
            Err(err) => {
                error!(error = %err, target = target_tag, "translation error");
                Ok(text.to_string())
            }
        }
    }

    /// Translates a long text chunk by chunk and joins the results with a
    /// space. A failed chunk contributes its untranslated text.
    pub async fn translate_long_text(
        &self,
        text: &str,
        source_tag: &str,
        target_tag: &str,
    ) -> String {
        let chunks = chunk_text(text);
        let mut translated = Vec::with_capacity(chunks.len());

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let result = self
                .model
                .translate(&chunk, source_tag, target_tag, MAX_GENERATION_LENGTH)
                .await;
            match result {
                Ok(out) => translated.push(out),
                Err(err) => {
                    error!(error = %err, chunk = idx, "chunk translation error");
                    translated.push(chunk);
                }
            }
        }

        translated.join(" ")
    }

    /// Translates each segment on its own.
    ///
    /// Segments missing a field are skipped with a warning, empty texts are
    /// dropped, and a segment whose translation fails is emitted unchanged.
    pub async fn translate_segments(
        &self,
        segments: &[SegmentInput],
        target_lang: &str,
        source_lang: &str,
    ) -> Vec<Segment> {
        let total = segments.len();
        let mut out = Vec::with_capacity(total);

        for (idx, raw) in segments.iter().enumerate() {
            let Some(segment) = raw.complete() else {
                warn!(segment = idx, "segment missing required fields, skipping");
                continue;
            };

            let original = segment.text.trim();
            if original.is_empty() {
                continue;
            }

            let result = self.translate_text(original, target_lang, source_lang).await;
            match result {
                Ok(translated) => out.push(segment.with_text(translated)),
                Err(err) => {
                    error!(error = %err, segment = idx, "error translating segment");
                    out.push(segment);
                }
            }

            if total > 10 && (idx + 1) % 10 == 0 {
                info!(done = idx + 1, total, "translated segments");
            }
        }

        info!(translated = out.len(), total, "segment translation finished");
        out
    }

    /// Translates segments in groups of `batch_size`, one model call per group.
    ///
    /// Each group's texts are joined with [`BATCH_SEPARATOR`] and the result is
    /// split back on it. When the piece count differs from the group size, or
    /// the combined call fails, the group is translated segment by segment
    /// instead, keeping the original text of any segment that still fails.
    pub async fn batch_translate_segments(
        &self,
        segments: &[SegmentInput],
        target_lang: &str,
        source_lang: &str,
        batch_size: usize,
    ) -> Vec<Segment> {
        let batch_size = batch_size.max(1);
        let batch_count = segments.len().div_ceil(batch_size);
        let mut out = Vec::with_capacity(segments.len());

        for (batch_idx, batch) in segments.chunks(batch_size).enumerate() {
            let items = batch
                .iter()
                .filter(|raw| !raw.trimmed_text().is_empty())
                .filter_map(|raw| {
                    let complete = raw.complete();
                    if complete.is_none() {
                        warn!(batch = batch_idx + 1, "segment missing required fields, skipping");
                    }
                    complete
                })
                .collect::<Vec<_>>();

            if items.is_empty() {
                continue;
            }

            match self.translate_batch(&items, target_lang, source_lang).await {
                Ok(translated) => out.extend(translated),
                Err(err) => {
                    warn!(
                        error = %err,
                        batch = batch_idx + 1,
                        "falling back to individual translation"
                    );
                    out.extend(
                        self.translate_individually(&items, target_lang, source_lang)
                            .await,
                    );
                }
            }

            info!(batch = batch_idx + 1, batches = batch_count, "processed batch");
        }

        out
    }

    async fn translate_batch(
        &self,
        items: &[Segment],
        target_lang: &str,
        source_lang: &str,
    ) -> Result<Vec<Segment>, BatchError> {
        let texts = items.iter().map(|seg| seg.text.trim()).collect::<Vec<_>>();
        if texts.iter().any(|text| text.contains(BATCH_SEPARATOR.trim())) {
            // TODO: switch to a separator that cannot occur in transcript text
            warn!("segment text contains the batch separator; split may misalign");
        }

        let combined = texts.join(BATCH_SEPARATOR);
        let translated = self
            .translate_text(&combined, target_lang, source_lang)
            .await?;

        let pieces = translated.split(BATCH_SEPARATOR).collect::<Vec<_>>();
        if pieces.len() != items.len() {
            return Err(BatchError::SplitMismatch {
                expected: items.len(),
                actual: pieces.len(),
            });
        }

        Ok(items
            .iter()
            .zip(pieces)
            .map(|(seg, piece)| seg.with_text(piece.trim()))
            .collect())
    }

    async fn translate_individually(
        &self,
        items: &[Segment],
        target_lang: &str,
        source_lang: &str,
    ) -> Vec<Segment> {
        let mut out = Vec::with_capacity(items.len());
        for seg in items {
            match self
                .translate_text(seg.text.trim(), target_lang, source_lang)
                .await
            {
                Ok(translated) => out.push(seg.with_text(translated)),
                Err(err) => {
                    error!(error = %err, "individual translation error");
                    out.push(seg.clone());
                }
            }
        }
        out
    }
}
