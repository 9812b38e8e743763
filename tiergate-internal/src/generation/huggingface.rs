use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::GenerationConfig;
use crate::error::{Error, ErrorDetails};
use crate::generation::{Artifact, ImageGenerator, TextGenerator};
use crate::transport::{MediaAttachment, MediaKind, MediaSource};
use crate::types::Feature;

#[derive(Debug, Deserialize)]
struct TextGenerationOutput {
    generated_text: String,
}

/// Hugging Face Inference API client bound to a single model.
#[derive(Debug)]
pub struct HuggingFaceBackend {
    http: Client,
    model_url: String,
    token: SecretString,
}

impl HuggingFaceBackend {
    pub fn new(config: &GenerationConfig, token: SecretString, model: &str) -> Self {
        let mut api_base = config.huggingface_api_base.to_string();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }
        Self {
            http: Client::new(),
            model_url: format!("{api_base}models/{model}"),
            token,
        }
    }

    async fn infer(&self, feature: Feature, prompt: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .http
            .post(&self.model_url)
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .json(&json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::Generation {
                    feature,
                    message: format!("Failed to send request to Hugging Face: {e}"),
                })
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            Error::new(ErrorDetails::Generation {
                feature,
                message: format!("Failed to read Hugging Face response: {e}"),
            })
        })?;

        if !status.is_success() {
            return Err(Error::new(ErrorDetails::Generation {
                feature,
                message: format!(
                    "Hugging Face returned error status {status}: {}",
                    String::from_utf8_lossy(&body)
                ),
            }));
        }
        Ok(body.to_vec())
    }
}

fn parse_text_output(body: &[u8]) -> Result<String, Error> {
    let outputs: Vec<TextGenerationOutput> = serde_json::from_slice(body).map_err(|e| {
        Error::new(ErrorDetails::Serialization {
            message: format!("Failed to parse Hugging Face text response: {e}"),
        })
    })?;
    outputs
        .into_iter()
        .next()
        .map(|output| output.generated_text)
        .ok_or_else(|| {
            Error::new(ErrorDetails::Generation {
                feature: Feature::Chat,
                message: "Hugging Face returned no generations".to_string(),
            })
        })
}

#[async_trait]
impl TextGenerator for HuggingFaceBackend {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        let body = self.infer(Feature::Chat, prompt).await?;
        parse_text_output(&body)
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        let data = self.infer(Feature::Image, prompt).await?;
        Ok(Artifact::Media(MediaAttachment {
            kind: MediaKind::Photo,
            source: MediaSource::Bytes {
                file_name: "image.png".to_string(),
                data,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_url() {
        let backend = HuggingFaceBackend::new(
            &GenerationConfig::default(),
            SecretString::from("hf_token"),
            "gpt2",
        );
        assert_eq!(
            backend.model_url,
            "https://api-inference.huggingface.co/models/gpt2"
        );
    }

    #[test]
    fn test_parse_text_output() {
        let text = parse_text_output(br#"[{"generated_text": "Hi there"}]"#).unwrap();
        assert_eq!(text, "Hi there");

        assert!(parse_text_output(b"[]").is_err());
        assert!(parse_text_output(br#"{"error": "loading"}"#).is_err());
    }
}
