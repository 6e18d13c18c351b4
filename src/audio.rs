//! Decoding of extracted audio into model-ready samples.
//!
//! The media tool already produces 16 kHz mono PCM WAV; this module turns that
//! file into `f32` samples and still down-mixes or resamples if it did not.

use std::io::{Cursor, ErrorKind};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::AppError;

/// Sample rate expected by the transcription backend.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Reads a WAV file into 16 kHz mono samples in `[-1.0, 1.0]`.
pub fn decode_wav_file(path: &Path) -> Result<Vec<f32>, AppError> {
    let bytes = std::fs::read(path)
        .map_err(|err| AppError::internal(format!("failed to read audio {path:?}: {err}")))?;
    decode_wav_bytes(bytes)
}

/// Decodes in-memory WAV bytes into 16 kHz mono samples.
pub fn decode_wav_bytes(bytes: Vec<u8>) -> Result<Vec<f32>, AppError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| AppError::internal(format!("failed to open extracted audio: {err}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AppError::internal("no audio track in extracted audio"))?;
    if track.codec_params.codec == CODEC_TYPE_NULL {
        return Err(AppError::internal("extracted audio has no codec information"));
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| AppError::internal(format!("unsupported audio codec: {err}")))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(TARGET_SAMPLE_RATE);
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => {
                return Err(AppError::internal(format!(
                    "failed while reading audio stream: {err}"
                )));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => {
                return Err(AppError::internal(format!(
                    "failed to decode audio packet: {err}"
                )));
            }
        };

        sample_rate = decoded.spec().rate;
        let channels = decoded.spec().channels.count().max(1);
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        mono.extend(
            buffer
                .samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
        );
    }

    if mono.is_empty() {
        return Err(AppError::internal("extracted audio is empty"));
    }

    let mono = mono
        .into_iter()
        .map(|s| s.clamp(-1.0, 1.0))
        .collect::<Vec<_>>();
    Ok(resample_linear(&mono, sample_rate, TARGET_SAMPLE_RATE))
}

/// Resamples a mono signal via linear interpolation.
fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.len() < 2 {
        return input.to_vec();
    }

    let step = src_rate as f64 / dst_rate as f64;
    let out_len = ((input.len() as f64) / step).round().max(1.0) as usize;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = input[idx];
            let b = input[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Builds a 16-bit PCM WAV file.
    pub fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels * 2;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for sample in samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::wav_bytes;
    use super::*;

    #[test]
    fn decodes_mono_pcm() {
        let samples = decode_wav_bytes(wav_bytes(&[0, 16384, -16384], 16_000, 1)).unwrap();
        assert_eq!(samples.len(), 3);
        assert!((samples[1] - 0.5).abs() < 1e-3);
        assert!((samples[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn averages_stereo_frames() {
        let samples = decode_wav_bytes(wav_bytes(&[16384, 0, -16384, -16384], 16_000, 2)).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 1e-3);
        assert!((samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_wav_bytes(b"not audio at all".to_vec()).is_err());
    }

    #[test]
    fn resample_halves_length() {
        let input = (0..100).map(|i| i as f32 / 100.0).collect::<Vec<_>>();
        let out = resample_linear(&input, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        assert!((out[10] - input[20]).abs() < 1e-6);
    }
}
