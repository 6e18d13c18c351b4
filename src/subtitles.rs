//! SubRip rendering for timed segments.

use std::path::Path;

use tracing::{info, warn};

use crate::error::AppError;
use crate::segments::SegmentInput;

/// Formats seconds as `HH:MM:SS,mmm`, truncating sub-millisecond precision.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    };
    let hours = (seconds / 3600.0).floor() as u64;
    let minutes = ((seconds % 3600.0) / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let millis = ((seconds % 1.0) * 1000.0).floor() as u64;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Renders segments as SRT text.
///
/// Entry numbers follow input positions: a segment missing `start`, `end` or
/// `text` is skipped but still consumes its number.
pub fn render_srt(segments: &[SegmentInput]) -> String {
    render_entries(segments).0
}

/// Rendered SRT text plus the number of entries it holds.
fn render_entries(segments: &[SegmentInput]) -> (String, usize) {
    let mut out = String::new();
    let mut rendered = 0;
    for (idx, raw) in segments.iter().enumerate() {
        let number = idx + 1;
        let Some(seg) = raw.complete() else {
            warn!(segment = number, "segment missing required fields");
            continue;
        };

        out.push_str(&format!(
            "{number}\n{} --> {}\n{}\n\n",
            format_timestamp(seg.start),
            format_timestamp(seg.end),
            seg.text.trim()
        ));
        rendered += 1;
    }
    (out, rendered)
}

/// Writes segments to `path` as a UTF-8 SRT file and returns the number of
/// entries written.
pub async fn write_srt(segments: &[SegmentInput], path: &Path) -> Result<usize, AppError> {
    let (srt, entries) = render_entries(segments);
    tokio::fs::write(path, srt)
        .await
        .map_err(|err| AppError::internal(format!("error writing SRT file {path:?}: {err}")))?;
    info!(path = %path.display(), entries, "SRT file created");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::Segment;

    fn parse_timestamp(raw: &str) -> (u64, u64) {
        let (hms, millis) = raw.split_once(',').unwrap();
        let parts = hms
            .split(':')
            .map(|part| part.parse::<u64>().unwrap())
            .collect::<Vec<_>>();
        (
            parts[0] * 3600 + parts[1] * 60 + parts[2],
            millis.parse().unwrap(),
        )
    }

    fn sample() -> Vec<SegmentInput> {
        vec![
            Segment::new(0.0, 1.5, "Hi").into(),
            Segment::new(2.0, 3.25, "Bye").into(),
        ]
    }

    #[test]
    fn timestamps_are_zero_padded() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(3725.5), "01:02:05,500");
    }

    #[test]
    fn milliseconds_truncate() {
        assert_eq!(format_timestamp(1.9999), "00:00:01,999");
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(format_timestamp(-3.0), "00:00:00,000");
    }

    #[test]
    fn renders_entries() {
        assert_eq!(
            render_srt(&sample()),
            "1\n00:00:00,000 --> 00:00:01,500\nHi\n\n2\n00:00:02,000 --> 00:00:03,250\nBye\n\n"
        );
    }

    #[test]
    fn skipped_segment_keeps_its_number() {
        let segments = vec![
            Segment::new(0.0, 1.0, "first").into(),
            SegmentInput {
                start: Some(1.0),
                end: Some(2.0),
                text: None,
            },
            Segment::new(2.0, 3.0, " third ").into(),
        ];
        let srt = render_srt(&segments);
        assert!(srt.starts_with("1\n"));
        assert!(srt.contains("\n3\n00:00:02,000 --> 00:00:03,000\nthird\n\n"));
        assert!(!srt.contains("\n2\n"));
    }

    #[test]
    fn timestamps_round_trip_to_the_millisecond() {
        let segments = vec![
            Segment::new(61.25, 3599.5, "a").into(),
            Segment::new(7322.125, 7323.0, "b").into(),
        ];
        let srt = render_srt(&segments);
        let ranges = srt
            .lines()
            .filter(|line| line.contains(" --> "))
            .map(|line| line.split_once(" --> ").unwrap())
            .collect::<Vec<_>>();

        assert_eq!(parse_timestamp(ranges[0].0), (61, 250));
        assert_eq!(parse_timestamp(ranges[0].1), (3599, 500));
        assert_eq!(parse_timestamp(ranges[1].0), (7322, 125));
        assert_eq!(parse_timestamp(ranges[1].1), (7323, 0));
    }

    #[tokio::test]
    async fn rewriting_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");

        write_srt(&sample(), &path).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        write_srt(&sample(), &path).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn write_counts_only_rendered_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.srt");
        let segments = vec![
            Segment::new(0.0, 1.0, "kept").into(),
            SegmentInput {
                start: None,
                end: Some(2.0),
                text: Some("no start".to_string()),
            },
        ];

        assert_eq!(write_srt(&segments, &path).await.unwrap(), 1);
    }
}
