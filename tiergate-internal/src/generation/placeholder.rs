use async_trait::async_trait;

use crate::error::Error;
use crate::generation::{
    Artifact, DocumentOcr, ImageGenerator, MusicGenerator, TextGenerator, VideoGenerator,
};
use crate::transport::Photo;

/// Acknowledges every request without producing content.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderBackend;

fn acknowledge(what: &str, prompt: &str) -> String {
    format!("Request received: \"{prompt}\"\n\n{what} will be available in the full version of the bot.")
}

#[async_trait]
impl TextGenerator for PlaceholderBackend {
    async fn generate(&self, prompt: &str) -> Result<String, Error> {
        Ok(acknowledge("AI chat replies", prompt))
    }
}

#[async_trait]
impl ImageGenerator for PlaceholderBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        Ok(Artifact::Text(acknowledge("Image generation", prompt)))
    }
}

#[async_trait]
impl MusicGenerator for PlaceholderBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        Ok(Artifact::Text(acknowledge("Song generation", prompt)))
    }
}

#[async_trait]
impl VideoGenerator for PlaceholderBackend {
    async fn generate(&self, prompt: &str) -> Result<Artifact, Error> {
        Ok(Artifact::Text(acknowledge("Video generation", prompt)))
    }
}

#[async_trait]
impl DocumentOcr for PlaceholderBackend {
    async fn extract(&self, photo: &Photo) -> Result<String, Error> {
        let caption = photo.caption.as_deref().unwrap_or("document photo");
        Ok(acknowledge("Text recognition", caption))
    }
}
