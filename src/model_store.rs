//! Whisper model resolution with optional Hugging Face download.
//!
//! After [`ensure_model_ready`] returns `Ok`, `cfg.whisper_model` names a
//! non-empty local file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;

const LOCK_TIMEOUT: Duration = Duration::from_secs(120);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Makes sure the whisper model exists locally, fetching it when allowed.
///
/// Blocking; call from a blocking context.
pub fn ensure_model_ready(cfg: &mut AppConfig) -> Result<(), AppError> {
    if is_usable_model(Path::new(&cfg.whisper_model)) {
        return Ok(());
    }
    if !cfg.whisper_auto_download {
        return Err(AppError::internal(format!(
            "model file not found at {:?}; set WHISPER_MODEL or enable WHISPER_AUTO_DOWNLOAD",
            cfg.whisper_model
        )));
    }

    let target = download_target(cfg);
    if !is_usable_model(&target) {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|err| {
                AppError::internal(format!("failed to create model cache directory {dir:?}: {err}"))
            })?;
        }

        let _lock = DownloadLock::acquire(&target)?;
        // another process may have finished while we waited
        if !is_usable_model(&target) {
            download(cfg, &target)?;
        }
    }

    cfg.whisper_model = target.to_string_lossy().into_owned();
    Ok(())
}

fn is_usable_model(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

fn download_target(cfg: &AppConfig) -> PathBuf {
    if cfg.whisper_model_explicit {
        PathBuf::from(&cfg.whisper_model)
    } else {
        Path::new(&cfg.whisper_cache_dir).join(&cfg.whisper_hf_filename)
    }
}

fn model_url(repo: &str, filename: &str) -> String {
    format!(
        "https://huggingface.co/{}/resolve/main/{}",
        repo.trim_matches('/'),
        filename.trim_matches('/')
    )
}

fn download(cfg: &AppConfig, target: &Path) -> Result<(), AppError> {
    let url = model_url(&cfg.whisper_hf_repo, &cfg.whisper_hf_filename);
    info!(%url, target = %target.display(), "downloading whisper model");

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;
    let mut request = client.get(&url);
    if let Some(token) = cfg.hf_token.as_deref() {
        request = request.bearer_auth(token);
    }

    let mut response = request
        .send()
        .map_err(|err| AppError::internal(format!("failed to download model from {url}: {err}")))?;
    match response.status() {
        status if status.is_success() => {}
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(AppError::internal(format!(
                "Hugging Face refused {url} ({}); set HF_TOKEN",
                response.status()
            )));
        }
        StatusCode::NOT_FOUND => {
            return Err(AppError::internal(format!(
                "model not found at {url}; check WHISPER_HF_REPO and WHISPER_MODEL_SIZE"
            )));
        }
        status => {
            return Err(AppError::internal(format!(
                "model download from {url} failed with HTTP status {status}"
            )));
        }
    }

    let partial = target.with_extension("part");
    let written = write_partial(&mut response, &partial)
        .map_err(|err| AppError::internal(format!("failed writing model to {partial:?}: {err}")))?;
    if written == 0 {
        let _ = fs::remove_file(&partial);
        return Err(AppError::internal(format!(
            "downloaded empty model file from {url}"
        )));
    }

    fs::rename(&partial, target).map_err(|err| {
        AppError::internal(format!("failed to move model into place at {target:?}: {err}"))
    })?;
    info!(bytes = written, target = %target.display(), "whisper model ready");
    Ok(())
}

fn write_partial(source: &mut impl io::Read, partial: &Path) -> io::Result<u64> {
    let mut out = File::create(partial)?;
    let written = io::copy(source, &mut out)?;
    out.flush()?;
    Ok(written)
}

/// Exclusive lock file next to the model, removed on drop.
struct DownloadLock {
    path: PathBuf,
}

impl DownloadLock {
    fn path_for(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("model");
        target.with_file_name(format!("{name}.lock"))
    }

    fn acquire(target: &Path) -> Result<Self, AppError> {
        let path = Self::path_for(target);
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "pid={}", std::process::id());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(AppError::internal(format!(
                            "timed out waiting for model download lock {path:?}"
                        )));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(err) => {
                    return Err(AppError::internal(format!(
                        "failed to create model download lock {path:?}: {err}"
                    )));
                }
            }
        }
    }
}

impl Drop for DownloadLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn url_trims_slashes() {
        assert_eq!(
            model_url("/ggerganov/whisper.cpp/", "/ggml-base.bin/"),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin"
        );
    }

    #[test]
    fn lock_sits_next_to_model() {
        assert_eq!(
            DownloadLock::path_for(Path::new("/tmp/ggml-base.bin")),
            Path::new("/tmp/ggml-base.bin.lock")
        );
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ggml-base.bin");
        {
            let _lock = DownloadLock::acquire(&target).unwrap();
            assert!(DownloadLock::path_for(&target).exists());
        }
        assert!(!DownloadLock::path_for(&target).exists());
    }

    #[test]
    fn existing_model_needs_no_download() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("ggml-base.bin");
        std::fs::write(&model, b"ggml").unwrap();

        let mut cfg = crate::config::test_support::test_cfg(dir.path());
        cfg.whisper_model = model.to_string_lossy().into_owned();
        cfg.whisper_auto_download = false;

        ensure_model_ready(&mut cfg).unwrap();
        assert_eq!(Path::new(&cfg.whisper_model), model);
    }

    #[test]
    fn missing_model_without_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = crate::config::test_support::test_cfg(dir.path());
        cfg.whisper_model = dir.path().join("absent.bin").to_string_lossy().into_owned();
        cfg.whisper_auto_download = false;

        assert!(ensure_model_ready(&mut cfg).is_err());
    }
}
