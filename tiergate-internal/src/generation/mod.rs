pub mod huggingface;
pub mod placeholder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, ErrorDetails};
use crate::transport::{MediaAttachment, Photo};
use crate::types::Feature;

pub use huggingface::HuggingFaceBackend;
pub use placeholder::PlaceholderBackend;

/// Output of a generator: either text to show, or media to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Text(String),
    Media(MediaAttachment),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, Error>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error>;
}

#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error>;
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error>;
}

#[async_trait]
pub trait DocumentOcr: Send + Sync {
    async fn extract(&self, photo: &Photo) -> Result<String, Error>;
}

/// What the user handed over once the router accepted their request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Prompt(String),
    Photo(Photo),
}

/// One backend per feature, dispatched by [`Generators::run`].
#[derive(Clone)]
pub struct Generators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub music: Arc<dyn MusicGenerator>,
    pub video: Arc<dyn VideoGenerator>,
    pub ocr: Arc<dyn DocumentOcr>,
}

impl Generators {
    pub fn placeholder() -> Self {
        let backend = Arc::new(PlaceholderBackend);
        Self {
            text: backend.clone(),
            image: backend.clone(),
            music: backend.clone(),
            video: backend.clone(),
            ocr: backend,
        }
    }

    pub async fn run(&self, feature: Feature, request: &GenerationRequest) -> Result<Artifact, Error> {
        match (feature, request) {
            (Feature::Chat, GenerationRequest::Prompt(prompt)) => {
                self.text.generate(prompt).await.map(Artifact::Text)
            }
            (Feature::Image, GenerationRequest::Prompt(prompt)) => self.image.generate(prompt).await,
            (Feature::Music, GenerationRequest::Prompt(prompt)) => self.music.generate(prompt).await,
            (Feature::Video, GenerationRequest::Prompt(prompt)) => self.video.generate(prompt).await,
            (Feature::Document, GenerationRequest::Photo(photo)) => {
                self.ocr.extract(photo).await.map(Artifact::Text)
            }
            (feature, _) => Err(Error::new(ErrorDetails::Generation {
                feature,
                message: "request kind does not match the feature".to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_dispatches_by_feature() {
        let generators = Generators::placeholder();

        let chat = generators
            .run(Feature::Chat, &GenerationRequest::Prompt("hello".to_string()))
            .await
            .unwrap();
        assert!(matches!(chat, Artifact::Text(text) if text.contains("hello")));

        let photo = Photo {
            file_id: "file".to_string(),
            caption: None,
        };
        let ocr = generators
            .run(Feature::Document, &GenerationRequest::Photo(photo))
            .await
            .unwrap();
        assert!(matches!(ocr, Artifact::Text(_)));
    }

    #[tokio::test]
    async fn test_mismatched_request_is_an_error() {
        let generators = Generators::placeholder();
        let err = generators
            .run(Feature::Document, &GenerationRequest::Prompt("text".to_string()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("document"));
    }
}
