//! Public language codes and their NLLB-200 model tags.

use tracing::warn;

use crate::error::AppError;

/// Model tag used when the requested source language is unknown.
pub const DEFAULT_SOURCE_TAG: &str = "eng_Latn";

/// Short public codes mapped to `facebook/nllb-200` language tags.
const LANGUAGE_TAGS: &[(&str, &str)] = &[
    ("en", "eng_Latn"),
    ("fr", "fra_Latn"),
    ("es", "spa_Latn"),
    ("de", "deu_Latn"),
    ("ar", "arb_Arab"),
    ("zh", "zho_Hans"),
    ("hi", "hin_Deva"),
    ("ru", "rus_Cyrl"),
    ("pt", "por_Latn"),
    ("ja", "jpn_Jpan"),
    ("ko", "kor_Hang"),
    ("tr", "tur_Latn"),
    ("it", "ita_Latn"),
    ("pl", "pol_Latn"),
    ("vi", "vie_Latn"),
    ("th", "tha_Thai"),
    ("uk", "ukr_Cyrl"),
    ("id", "ind_Latn"),
    ("ro", "ron_Latn"),
    ("fa", "pes_Arab"),
    ("nl", "nld_Latn"),
    ("bn", "ben_Beng"),
    ("sw", "swh_Latn"),
    ("he", "heb_Hebr"),
];

/// Returns every accepted short code in table order.
pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_TAGS.iter().map(|(code, _)| *code).collect()
}

fn lookup(code: &str) -> Option<&'static str> {
    let normalized = code.trim().to_ascii_lowercase();
    LANGUAGE_TAGS
        .iter()
        .find(|(short, _)| *short == normalized)
        .map(|(_, tag)| *tag)
}

/// Resolves a target code, failing hard when no model tag exists.
pub fn resolve_target(code: &str) -> Result<&'static str, AppError> {
    lookup(code).ok_or_else(|| AppError::unsupported_language(code))
}

/// Resolves a source code, degrading to English for unknown codes.
pub fn resolve_source(code: &str) -> &'static str {
    lookup(code).unwrap_or_else(|| {
        warn!(
            source_lang = code,
            "unsupported source language, defaulting to English"
        );
        DEFAULT_SOURCE_TAG
    })
}
