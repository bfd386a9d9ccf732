//! Face embedder via ONNX Runtime.
//!
//! Wraps the model under evaluation: decode an image file, resize to the
//! model's square input, normalise and run one forward pass. The output is
//! L2-normalised so squared distances fall in `[0, 4]`.

use crate::types::Embedding;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_INPUT_SIZE: u32 = 112;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5; // symmetric: maps [0, 255] onto [-1, 1]

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Anything that turns a face image into an embedding.
pub trait Embedder {
    fn embed(&mut self, image_path: &Path) -> Result<Embedding, RecognizerError>;
}

/// ONNX model taking a `1×3×S×S` float tensor and returning one embedding.
pub struct OnnxEmbedder {
    session: Session,
    input_size: u32,
    model_version: String,
}

impl OnnxEmbedder {
    /// Load the ONNX model from the given path.
    pub fn load(model_path: &Path, input_size: u32) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            input_size,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        let model_version = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            session,
            input_size,
            model_version,
        })
    }

    /// Resize an RGB image to `size × size` and lay it out as NCHW floats.
    fn preprocess(image: &RgbImage, size: u32) -> Array4<f32> {
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - PIXEL_MEAN) / PIXEL_STD;
            }
        }

        tensor
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&mut self, image_path: &Path) -> Result<Embedding, RecognizerError> {
        let image = image::open(image_path)
            .map_err(|source| RecognizerError::Image {
                path: image_path.to_path_buf(),
                source,
            })?
            .to_rgb8();

        let input = Self::preprocess(&image, self.input_size);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw_data.is_empty() {
            return Err(RecognizerError::InferenceFailed(format!(
                "empty embedding for {}",
                image_path.display()
            )));
        }

        let mut values = raw_data.to_vec();
        l2_normalize(&mut values);

        Ok(Embedding {
            values,
            model_version: Some(self.model_version.clone()),
        })
    }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
