//! `ffmpeg`/`ffprobe` subprocess wrappers.
//!
//! Every call waits for the tool to exit. A non-zero status becomes
//! [`AppError::Tool`] with the tool's stderr attached.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::storage::derived_path;

const SUBTITLE_STYLE: &str =
    "Alignment=2,FontSize=24,PrimaryColour=&H00ffffff,OutlineColour=&H00000000,Outline=2";

/// Basic facts about a video file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VideoInfo {
    pub duration: f64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// Handle on the external media tool binaries.
#[derive(Debug, Clone)]
pub struct MediaTool {
    ffmpeg: String,
    ffprobe: String,
}

impl MediaTool {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(cfg.ffmpeg_bin.clone(), cfg.ffprobe_bin.clone())
    }

    /// Extracts 16 kHz mono 16-bit PCM audio to `<out_dir>/<stem>.wav`.
    pub async fn extract_audio(&self, video: &Path, out_dir: &Path) -> Result<PathBuf, AppError> {
        tokio::fs::create_dir_all(out_dir).await.map_err(|err| {
            AppError::internal(format!("failed to create {out_dir:?}: {err}"))
        })?;
        let audio = out_dir.join(
            derived_path(video, ".wav")
                .file_name()
                .unwrap_or_else(|| OsStr::new("audio.wav")),
        );

        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
            .arg(&audio);
        run(cmd, &self.ffmpeg).await?;

        info!(video = %video.display(), audio = %audio.display(), "audio extracted");
        Ok(audio)
    }

    /// Renders `srt` into the frames of `video`, writing `output`.
    pub async fn burn_subtitles(
        &self,
        video: &Path,
        srt: &Path,
        output: &Path,
    ) -> Result<(), AppError> {
        if !video.is_file() {
            return Err(AppError::not_found(format!(
                "Video file not found: {}",
                video.display()
            )));
        }
        if !srt.is_file() {
            return Err(AppError::not_found(format!(
                "SRT file not found: {}",
                srt.display()
            )));
        }

        let filter = format!(
            "subtitles={}:force_style='{SUBTITLE_STYLE}'",
            escape_filter_path(srt)
        );
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.arg("-y")
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(&filter)
            .args(["-c:a", "copy", "-c:v", "libx264", "-preset", "medium", "-crf", "23"])
            .arg(output);

        info!(
            video = %video.display(),
            subtitles = %srt.display(),
            output = %output.display(),
            "burning subtitles"
        );
        run(cmd, &self.ffmpeg).await?;

        if !output.is_file() {
            return Err(AppError::tool(
                "subtitle burn failed",
                "output video file was not created",
            ));
        }
        info!(output = %output.display(), "subtitled video created");
        Ok(())
    }

    /// Reads duration, size and the first video stream's geometry.
    pub async fn probe(&self, video: &Path) -> Result<VideoInfo, AppError> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(video);
        let output = run(cmd, &self.ffprobe).await?;
        parse_probe(&output.stdout)
    }
}

async fn run(mut cmd: Command, program: &str) -> Result<Output, AppError> {
    let output = cmd
        .output()
        .await
        .map_err(|err| AppError::tool(format!("failed to run {program}"), err.to_string()))?;
    if !output.status.success() {
        return Err(AppError::tool(
            format!("{program} exited with {}", output.status),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output)
}

/// Escapes characters with meaning inside an ffmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

fn parse_probe(stdout: &[u8]) -> Result<VideoInfo, AppError> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|err| AppError::tool("unreadable ffprobe output", err.to_string()))?;

    let mut info = VideoInfo {
        duration: probe
            .format
            .duration
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
        size: probe
            .format
            .size
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
        codec: "unknown".to_string(),
        ..VideoInfo::default()
    };

    if let Some(stream) = probe
        .streams
        .into_iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
    {
        info.width = stream.width.unwrap_or_default();
        info.height = stream.height.unwrap_or_default();
        if let Some(codec) = stream.codec_name {
            info.codec = codec;
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_reads_first_video_stream() {
        let stdout = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
            ],
            "format": {"duration": "12.500000", "size": "1048576"}
        }"#;
        assert_eq!(
            parse_probe(stdout).unwrap(),
            VideoInfo {
                duration: 12.5,
                size: 1_048_576,
                width: 1280,
                height: 720,
                codec: "h264".to_string(),
            }
        );
    }

    #[test]
    fn probe_without_video_stream_uses_defaults() {
        let info = parse_probe(br#"{"streams": [], "format": {}}"#).unwrap();
        assert_eq!(info.codec, "unknown");
        assert_eq!(info.width, 0);
    }

    #[test]
    fn filter_path_escapes_colons() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\subs\\a.srt")),
            "C\\:\\\\subs\\\\a.srt"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MediaTool::new("definitely-not-ffmpeg-7f3a", "ffprobe");
        let err = tool
            .extract_audio(&dir.path().join("in.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tool { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MediaTool::new("false", "false");
        let err = tool
            .extract_audio(&dir.path().join("in.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tool { message, .. } if message.starts_with("false exited")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn burn_requires_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("in.mp4");
        let srt = dir.path().join("in.srt");
        std::fs::write(&video, b"video").unwrap();
        std::fs::write(&srt, b"1\n").unwrap();

        let tool = MediaTool::new("true", "true");
        let err = tool
            .burn_subtitles(&video, &srt, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tool { stderr, .. } if stderr.contains("not created")));
    }

    #[tokio::test]
    async fn burn_checks_inputs_first() {
        let dir = tempfile::tempdir().unwrap();
        let tool = MediaTool::new("true", "true");
        let err = tool
            .burn_subtitles(
                &dir.path().join("missing.mp4"),
                &dir.path().join("missing.srt"),
                &dir.path().join("out.mp4"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
