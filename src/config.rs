//! Configuration loading from environment variables.
//!
//! Values are validated early so startup fails fast with actionable errors.

use std::env;

use crate::error::AppError;
use crate::translate::DEFAULT_BATCH_SIZE;

pub const MAX_BATCH_SIZE: usize = 64;
pub const DEFAULT_TRANSLATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 1024;

const DEFAULT_TRANSLATION_URL: &str =
    "https://api-inference.huggingface.co/models/facebook/nllb-200-distilled-600M";

/// Runtime configuration for the HTTP server, media tool and model backends.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Optional bearer token required by all endpoints.
    pub api_key: Option<String>,
    /// Directory holding uploaded videos and every derived file.
    pub upload_dir: String,
    /// `ffmpeg` executable used for audio extraction and subtitle burn-in.
    pub ffmpeg_bin: String,
    /// `ffprobe` executable used for video inspection.
    pub ffprobe_bin: String,
    /// Path to a Whisper ggml model file on disk.
    pub whisper_model: String,
    /// Whether `whisper_model` came from explicit `WHISPER_MODEL`.
    pub whisper_model_explicit: bool,
    /// Enables startup download when the model file is missing.
    pub whisper_auto_download: bool,
    /// Hugging Face repository used for model download.
    pub whisper_hf_repo: String,
    /// Whisper model filename in the Hugging Face repository.
    pub whisper_hf_filename: String,
    /// Local cache directory for downloaded models.
    pub whisper_cache_dir: String,
    /// Requests GPU offload from whisper.cpp.
    pub whisper_use_gpu: bool,
    /// Optional Hugging Face token for model downloads and hosted translation.
    pub hf_token: Option<String>,
    /// Endpoint of the translation model.
    pub translation_url: String,
    /// Per-request timeout for translation calls.
    pub translation_timeout_secs: u64,
    /// Default segment batch size for batched translation.
    pub batch_size: usize,
    /// Request body limit in MiB, bounding video uploads.
    pub max_upload_mb: usize,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`)
    /// - `PORT` (default `8000`)
    /// - `API_KEY` (optional)
    /// - `UPLOAD_DIR` (default `data/uploads`)
    /// - `FFMPEG_BIN` / `FFPROBE_BIN` (default `ffmpeg` / `ffprobe`)
    /// - `WHISPER_MODEL` (optional explicit local model path)
    /// - `WHISPER_MODEL_SIZE` (default `base`, selects `ggml-<size>.bin`)
    /// - `WHISPER_HF_FILENAME` (overrides the size-derived filename)
    /// - `WHISPER_AUTO_DOWNLOAD` (default `true`)
    /// - `WHISPER_HF_REPO` (default `ggerganov/whisper.cpp`)
    /// - `WHISPER_CACHE_DIR` (default `$HOME/.cache/whispercpp/models`)
    /// - `WHISPER_USE_GPU` (default `false`)
    /// - `HF_TOKEN` (optional)
    /// - `TRANSLATION_URL` (default hosted `nllb-200-distilled-600M`)
    /// - `TRANSLATION_TIMEOUT_SECS` (default `120`, range `1..=3600`)
    /// - `TRANSLATION_BATCH_SIZE` (default `5`, range `1..=64`)
    /// - `MAX_UPLOAD_MB` (default `1024`, range `1..=10240`)
    pub fn from_env() -> Result<Self, AppError> {
        let host = env_str("HOST", "127.0.0.1");
        let port = env_u16("PORT", 8000)?;
        let whisper_auto_download = env_bool("WHISPER_AUTO_DOWNLOAD", true)?;
        let whisper_hf_repo = env_str("WHISPER_HF_REPO", "ggerganov/whisper.cpp");
        let whisper_hf_filename = env_opt("WHISPER_HF_FILENAME")
            .unwrap_or_else(|| model_filename(&env_str("WHISPER_MODEL_SIZE", "base")));
        let whisper_cache_dir = env_str("WHISPER_CACHE_DIR", &default_whisper_cache_dir());
        let whisper_model_explicit = env_opt("WHISPER_MODEL").is_some();
        let whisper_model = env_opt("WHISPER_MODEL")
            .unwrap_or_else(|| format!("{}/{}", whisper_cache_dir, whisper_hf_filename));

        let translation_timeout_secs = env_usize_bounded(
            "TRANSLATION_TIMEOUT_SECS",
            DEFAULT_TRANSLATION_TIMEOUT_SECS as usize,
            1,
            3600,
        )? as u64;
        let batch_size =
            env_usize_bounded("TRANSLATION_BATCH_SIZE", DEFAULT_BATCH_SIZE, 1, MAX_BATCH_SIZE)?;

        Ok(Self {
            host,
            port,
            api_key: env_opt("API_KEY"),
            upload_dir: env_str("UPLOAD_DIR", "data/uploads"),
            ffmpeg_bin: env_str("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: env_str("FFPROBE_BIN", "ffprobe"),
            whisper_model,
            whisper_model_explicit,
            whisper_auto_download,
            whisper_hf_repo,
            whisper_hf_filename,
            whisper_cache_dir,
            whisper_use_gpu: env_bool("WHISPER_USE_GPU", false)?,
            hf_token: env_opt("HF_TOKEN"),
            translation_url: env_str("TRANSLATION_URL", DEFAULT_TRANSLATION_URL),
            translation_timeout_secs,
            batch_size,
            max_upload_mb: env_usize_bounded("MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB, 1, 10_240)?,
        })
    }

    /// Request body limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Maps a whisper size name (`base`, `small`, `medium`, ...) to its ggml file.
fn model_filename(size: &str) -> String {
    format!("ggml-{}.bin", size.trim().to_ascii_lowercase())
}

fn default_whisper_cache_dir() -> String {
    format!(
        "{}/.cache/whispercpp/models",
        env::var("HOME").unwrap_or_else(|_| ".".to_string())
    )
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_bool(name, &raw)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_usize_bounded(
    name: &str,
    default: usize,
    min: usize,
    max: usize,
) -> Result<usize, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_usize_bounded(name, &raw, min, max)
}

fn parse_usize_bounded(name: &str, raw: &str, min: usize, max: usize) -> Result<usize, AppError> {
    let parsed = raw.trim().parse::<usize>().map_err(|_| {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        ))
    })?;
    if !(min..=max).contains(&parsed) {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected integer in range [{min}, {max}]"
        )));
    }
    Ok(parsed)
}


#[cfg(test)]
mod tests {
    use super::{model_filename, parse_bool, parse_usize_bounded};

    #[test]
    fn batch_size_accepts_in_range_values() {
        assert_eq!(
            parse_usize_bounded("TRANSLATION_BATCH_SIZE", "1", 1, 64).unwrap(),
            1
        );
        assert_eq!(
            parse_usize_bounded("TRANSLATION_BATCH_SIZE", " 64 ", 1, 64).unwrap(),
            64
        );
    }

    #[test]
    fn batch_size_rejects_bad_values() {
        assert!(parse_usize_bounded("TRANSLATION_BATCH_SIZE", "abc", 1, 64).is_err());
        assert!(parse_usize_bounded("TRANSLATION_BATCH_SIZE", "0", 1, 64).is_err());
        assert!(parse_usize_bounded("TRANSLATION_BATCH_SIZE", "65", 1, 64).is_err());
    }

    #[test]
    fn model_size_maps_to_ggml_file() {
        assert_eq!(model_filename("base"), "ggml-base.bin");
        assert_eq!(model_filename(" Medium "), "ggml-medium.bin");
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("WHISPER_USE_GPU", "On").unwrap());
        assert!(!parse_bool("WHISPER_USE_GPU", "0").unwrap());
        assert!(parse_bool("WHISPER_USE_GPU", "maybe").is_err());
    }
}
