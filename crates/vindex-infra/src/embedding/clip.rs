//! FastEmbed-based CLIP ViT-B/32 encoders.
//!
//! The image and text towers of one CLIP checkpoint map into the same
//! 512-dimensional space, so a text query can be compared against image
//! vectors directly. Both embedders load their ONNX model lazily in
//! `warm_up`, outside any inference timeout, and run it on tokio's blocking
//! pool.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use tokio::sync::OnceCell;

use vindex_core::embedding::{DEFAULT_BATCH_SIZE, Embedder};
use vindex_core::vector::distance::normalize;
use vindex_types::document::FieldValue;
use vindex_types::embedding::{EmbeddingSpace, Modality};
use vindex_types::error::EmbeddingError;

/// Name of the shared CLIP ViT-B/32 space.
pub const CLIP_SPACE_NAME: &str = "clip-vit-b-32";

/// Output dimension of both CLIP ViT-B/32 towers.
pub const CLIP_DIMENSION: usize = 512;

pub const CLIP_TEXT_MODEL: &str = "Qdrant/clip-ViT-B-32-text";
pub const CLIP_IMAGE_MODEL: &str = "Qdrant/clip-ViT-B-32-vision";

pub fn clip_space() -> EmbeddingSpace {
    EmbeddingSpace::new(CLIP_SPACE_NAME, CLIP_DIMENSION)
}

/// Model loading options shared by both towers.
#[derive(Debug, Clone)]
pub struct ClipOptions {
    /// Where model weights are cached. `None` uses fastembed's default.
    pub cache_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub show_download_progress: bool,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            cache_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            show_download_progress: false,
        }
    }
}

/// CLIP text tower. Accepts `Text` values.
pub struct ClipTextEmbedder {
    space: EmbeddingSpace,
    options: ClipOptions,
    model: OnceCell<Arc<Mutex<TextEmbedding>>>,
}

impl ClipTextEmbedder {
    pub fn new(options: ClipOptions) -> Self {
        Self {
            space: clip_space(),
            options,
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<Arc<Mutex<TextEmbedding>>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                let mut init = InitOptions::new(EmbeddingModel::ClipVitB32)
                    .with_show_download_progress(self.options.show_download_progress);
                if let Some(dir) = &self.options.cache_dir {
                    init = init.with_cache_dir(dir.clone());
                }

                tracing::info!(model = CLIP_TEXT_MODEL, "loading embedding model");
                let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(init))
                    .await
                    .map_err(|e| EmbeddingError::Inference(format!("model loader failed: {e}")))?
                    .map_err(|e| {
                        EmbeddingError::Inference(format!("failed to load {CLIP_TEXT_MODEL}: {e}"))
                    })?;
                Ok(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

impl Embedder for ClipTextEmbedder {
    type Input = String;
    type Output = Vec<f32>;

    fn model_name(&self) -> &str {
        CLIP_TEXT_MODEL
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn modality(&self) -> Modality {
        Modality::Text
    }

    fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    fn preprocess(&self, raw: &FieldValue) -> Result<String, EmbeddingError> {
        match raw {
            FieldValue::Text(text) => Ok(text.trim().to_string()),
            other => Err(EmbeddingError::UnsupportedInput {
                model: CLIP_TEXT_MODEL.to_string(),
                kind: other.kind(),
            }),
        }
    }

    async fn warm_up(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    async fn infer(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = self.model().await?;
        let batch_size = self.batch_size();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("text model lock poisoned".to_string()))?;
            model
                .embed(inputs, Some(batch_size))
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Inference(format!("inference task failed: {e}")))?
    }

    fn postprocess(&self, mut output: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        normalize(&mut output);
        Ok(output)
    }
}

/// CLIP image tower. Accepts `Blob` values holding encoded image bytes
/// (PNG, JPEG, ...).
pub struct ClipImageEmbedder {
    space: EmbeddingSpace,
    options: ClipOptions,
    model: OnceCell<Arc<Mutex<ImageEmbedding>>>,
}

impl ClipImageEmbedder {
    pub fn new(options: ClipOptions) -> Self {
        Self {
            space: clip_space(),
            options,
            model: OnceCell::new(),
        }
    }

    async fn model(&self) -> Result<Arc<Mutex<ImageEmbedding>>, EmbeddingError> {
        self.model
            .get_or_try_init(|| async {
                let mut init = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
                    .with_show_download_progress(self.options.show_download_progress);
                if let Some(dir) = &self.options.cache_dir {
                    init = init.with_cache_dir(dir.clone());
                }

                tracing::info!(model = CLIP_IMAGE_MODEL, "loading embedding model");
                let model = tokio::task::spawn_blocking(move || ImageEmbedding::try_new(init))
                    .await
                    .map_err(|e| EmbeddingError::Inference(format!("model loader failed: {e}")))?
                    .map_err(|e| {
                        EmbeddingError::Inference(format!("failed to load {CLIP_IMAGE_MODEL}: {e}"))
                    })?;
                Ok(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

impl Embedder for ClipImageEmbedder {
    type Input = Vec<u8>;
    type Output = Vec<f32>;

    fn model_name(&self) -> &str {
        CLIP_IMAGE_MODEL
    }

    fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    fn modality(&self) -> Modality {
        Modality::Image
    }

    fn batch_size(&self) -> usize {
        self.options.batch_size
    }

    fn preprocess(&self, raw: &FieldValue) -> Result<Vec<u8>, EmbeddingError> {
        match raw {
            FieldValue::Blob(bytes) if !bytes.is_empty() => Ok(bytes.clone()),
            FieldValue::Blob(_) => Err(EmbeddingError::Inference("empty image blob".to_string())),
            other => Err(EmbeddingError::UnsupportedInput {
                model: CLIP_IMAGE_MODEL.to_string(),
                kind: other.kind(),
            }),
        }
    }

    async fn warm_up(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    async fn infer(&self, inputs: Vec<Vec<u8>>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = self.model().await?;
        let batch_size = self.batch_size();

        tokio::task::spawn_blocking(move || {
            let images: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Inference("image model lock poisoned".to_string()))?;
            model
                .embed_bytes(&images, Some(batch_size))
                .map_err(|e| EmbeddingError::Inference(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Inference(format!("inference task failed: {e}")))?
    }

    fn postprocess(&self, mut output: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
        normalize(&mut output);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_towers_share_one_space() {
        let text = ClipTextEmbedder::new(ClipOptions::default());
        let image = ClipImageEmbedder::new(ClipOptions::default());

        assert_eq!(text.space(), image.space());
        assert_eq!(text.space().dimension, 512);
        assert_eq!(text.modality(), Modality::Text);
        assert_eq!(image.modality(), Modality::Image);
    }

    #[test]
    fn text_preprocess_accepts_only_text() {
        let text = ClipTextEmbedder::new(ClipOptions::default());

        assert_eq!(
            text.preprocess(&FieldValue::Text("  a dog  ".to_string()))
                .unwrap(),
            "a dog"
        );
        assert!(matches!(
            text.preprocess(&FieldValue::Blob(vec![1, 2, 3])),
            Err(EmbeddingError::UnsupportedInput { kind: "blob", .. })
        ));
    }

    #[test]
    fn image_preprocess_accepts_only_blobs() {
        let image = ClipImageEmbedder::new(ClipOptions::default());

        assert_eq!(
            image.preprocess(&FieldValue::Blob(vec![1, 2, 3])).unwrap(),
            vec![1, 2, 3]
        );
        assert!(image.preprocess(&FieldValue::Blob(Vec::new())).is_err());
        assert!(matches!(
            image.preprocess(&FieldValue::Text("a dog".to_string())),
            Err(EmbeddingError::UnsupportedInput { kind: "text", .. })
        ));
    }

    #[test]
    fn postprocess_normalizes() {
        let text = ClipTextEmbedder::new(ClipOptions::default());
        let v = text.postprocess(vec![3.0, 4.0]).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn batch_size_comes_from_options() {
        let options = ClipOptions {
            batch_size: 8,
            ..ClipOptions::default()
        };
        assert_eq!(ClipImageEmbedder::new(options).batch_size(), 8);
    }
}
