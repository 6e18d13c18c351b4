//! Remote NLLB backend speaking the Hugging Face inference payload format.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::translate::{ModelCallError, Translator};

#[derive(Debug, Serialize)]
struct TranslationPayload<'a> {
    inputs: &'a str,
    parameters: TranslationParameters<'a>,
}

#[derive(Debug, Serialize)]
struct TranslationParameters<'a> {
    src_lang: &'a str,
    tgt_lang: &'a str,
    max_length: usize,
}

/// Sends one translation per request to a hosted sequence-to-sequence model.
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTranslator {
    pub fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.translation_timeout_secs))
            .build()
            .map_err(|err| AppError::internal(format!("failed to create HTTP client: {err}")))?;

        Ok(Self {
            client,
            endpoint: cfg.translation_url.clone(),
            token: cfg.hf_token.clone(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        text: &str,
        source_tag: &str,
        target_tag: &str,
        max_length: usize,
    ) -> Result<String, ModelCallError> {
        let payload = TranslationPayload {
            inputs: text,
            parameters: TranslationParameters {
                src_lang: source_tag,
                tgt_lang: target_tag,
                max_length,
            },
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ModelCallError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelCallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| ModelCallError::Malformed(format!("invalid JSON body: {err}")))?;
        debug!(chars = text.chars().count(), source_tag, target_tag, "model call completed");

        first_translation(&body)
    }
}

/// Extracts `[0].translation_text` from a pipeline response.
fn first_translation(body: &Value) -> Result<String, ModelCallError> {
    body.as_array()
        .and_then(|items| items.first())
        .and_then(|item| item.get("translation_text"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| ModelCallError::Malformed(body.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_first_result() {
        let body = json!([
            {"translation_text": "Bonjour"},
            {"translation_text": "Salut"}
        ]);
        assert_eq!(first_translation(&body).unwrap(), "Bonjour");
    }

    #[test]
    fn empty_list_is_malformed() {
        assert!(matches!(
            first_translation(&json!([])),
            Err(ModelCallError::Malformed(_))
        ));
    }

    #[test]
    fn object_response_is_malformed() {
        let body = json!({"error": "Model is currently loading"});
        assert!(matches!(
            first_translation(&body),
            Err(ModelCallError::Malformed(_))
        ));
    }

    #[test]
    fn payload_matches_pipeline_parameters() {
        let payload = TranslationPayload {
            inputs: "Hello",
            parameters: TranslationParameters {
                src_lang: "eng_Latn",
                tgt_lang: "fra_Latn",
                max_length: 1024,
            },
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "inputs": "Hello",
                "parameters": {"src_lang": "eng_Latn", "tgt_lang": "fra_Latn", "max_length": 1024}
            })
        );
    }
}
