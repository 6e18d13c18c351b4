//! Sentence-boundary chunking for texts above the single-call input ceiling.

/// Delimiter used to split text into sentence fragments.
pub const SENTENCE_DELIMITER: &str = ". ";

/// Soft character budget for one accumulated chunk.
pub const CHUNK_SOFT_LIMIT: usize = 400;

/// Splits `text` into chunks aligned on `". "` boundaries.
///
/// Fragments are accumulated greedily while the buffer plus the next fragment
/// stays under [`CHUNK_SOFT_LIMIT`] characters; every fragment gets the
/// delimiter re-appended, so the last chunk carries a trailing `.` even when
/// the input did not. A single fragment longer than the budget becomes its own
/// chunk. Returned chunks are trimmed and in input order.
pub fn chunk_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in text.split(SENTENCE_DELIMITER) {
        let sentence_len = sentence.chars().count();
        if current_len + sentence_len < CHUNK_SOFT_LIMIT {
            current.push_str(sentence);
            current.push_str(SENTENCE_DELIMITER);
            current_len += sentence_len + SENTENCE_DELIMITER.len();
            continue;
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }
        current = format!("{sentence}{SENTENCE_DELIMITER}");
        current_len = sentence_len + SENTENCE_DELIMITER.len();
    }

    if !current.is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}
