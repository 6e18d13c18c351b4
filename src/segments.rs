//! Timed transcript segments.

use serde::{Deserialize, Serialize};

/// Timed span of transcript text, offsets in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Copy of this segment with its timing kept and its text replaced.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self::new(self.start, self.end, text)
    }
}

/// Segment as received from a client, where any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentInput {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SegmentInput {
    /// Returns the segment when `start`, `end` and `text` are all present.
    pub fn complete(&self) -> Option<Segment> {
        match (self.start, self.end, self.text.as_ref()) {
            (Some(start), Some(end), Some(text)) => Some(Segment::new(start, end, text.clone())),
            _ => None,
        }
    }

    /// Trimmed text, empty when the field is missing.
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or_default()
    }
}

impl From<Segment> for SegmentInput {
    fn from(seg: Segment) -> Self {
        Self {
            start: Some(seg.start),
            end: Some(seg.end),
            text: Some(seg.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_incomplete() {
        let raw: SegmentInput = serde_json::from_str(r#"{"start": 1.0, "text": "hi"}"#).unwrap();
        assert!(raw.complete().is_none());
        assert_eq!(raw.trimmed_text(), "hi");
    }

    #[test]
    fn complete_segment_keeps_untrimmed_text() {
        let raw: SegmentInput =
            serde_json::from_str(r#"{"start": 0.5, "end": 1.0, "text": " hi "}"#).unwrap();
        assert_eq!(raw.complete(), Some(Segment::new(0.5, 1.0, " hi ")));
    }
}
