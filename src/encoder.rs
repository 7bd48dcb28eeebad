//! Frozen image encoders for the recognition pipelines.
//!
//! An [`ImageEncoder`] wraps a pretrained convolutional backbone exported
//! to ONNX and run with tract (pure Rust, no system ONNX Runtime). Input
//! bytes are decoded, resized to the encoder's fixed square resolution,
//! mean-subtracted per channel, and fed through the frozen network; the
//! final activation is flattened into the embedding vector.
//!
//! Two independent instances exist at runtime (place, person), each with
//! its own weights and paired feature store, so the feature spaces never
//! mix. Extraction is deterministic for identical bytes and weights.

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

use crate::config::EncoderConfig;
use crate::error::{CoreError, CoreResult};

pub(crate) type OnnxPlan = TypedRunnableModel<TypedModel>;

/// Load an ONNX model file into a runnable tract plan.
pub(crate) fn load_plan(path: &Path) -> CoreResult<OnnxPlan> {
    load_typed(path)?
        .into_runnable()
        .map_err(|e| CoreError::Artifact(format!("build plan for {}: {}", path.display(), e)))
}

/// Load and optimize an ONNX model, keeping the typed graph available
/// for shape inspection before it is made runnable.
pub(crate) fn load_typed(path: &Path) -> CoreResult<TypedModel> {
    tract_onnx::onnx()
        .model_for_path(path)
        .map_err(|e| CoreError::Artifact(format!("load ONNX {}: {}", path.display(), e)))?
        .into_optimized()
        .map_err(|e| CoreError::Artifact(format!("optimize {}: {}", path.display(), e)))
}

/// Decode image bytes and resize to a square `size`×`size` RGB image.
/// Unreadable bytes are a `Decode` error, the one failure in the core
/// that is always the caller's to fix.
pub(crate) fn decode_rgb(bytes: &[u8], size: u32) -> CoreResult<RgbImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CoreError::Decode(e.to_string()))?
        .to_rgb8();
    Ok(image::imageops::resize(&img, size, size, FilterType::Triangle))
}

/// Lay an RGB image out as an NCHW float tensor with per-channel
/// mean subtraction.
pub(crate) fn to_nchw(img: &RgbImage, means: [f32; 3]) -> Array4<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut array = Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            array[[0, c, y as usize, x as usize]] = pixel[c] as f32 - means[c];
        }
    }
    array
}

/// A frozen pretrained encoder mapping an image to a fixed-length
/// embedding vector.
#[derive(Debug)]
pub struct ImageEncoder {
    plan: OnnxPlan,
    input_size: u32,
    dims: usize,
    channel_means: [f32; 3],
}

impl ImageEncoder {
    pub fn load(config: &EncoderConfig) -> CoreResult<Self> {
        Ok(Self {
            plan: load_plan(&config.model_path)?,
            input_size: config.input_size,
            dims: config.dims,
            channel_means: config.channel_means,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Extract the embedding for one image. Blocking; callers on the
    /// async runtime dispatch through `spawn_blocking`.
    pub fn extract(&self, image_bytes: &[u8]) -> CoreResult<Vec<f32>> {
        let img = decode_rgb(image_bytes, self.input_size)?;
        let tensor: Tensor = to_nchw(&img, self.channel_means).into();

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| CoreError::Encoder(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| CoreError::Encoder("model produced no output".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| CoreError::Encoder(e.to_string()))?;

        let vector: Vec<f32> = view.iter().copied().collect();
        if vector.len() != self.dims {
            return Err(CoreError::Encoder(format!(
                "flattened activation has {} dims, expected {}",
                vector.len(),
                self.dims
            )));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_rgb(b"definitely not an image", 224).unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn test_decode_resizes_to_square() {
        // 2x1 white PNG, smallest well-formed fixture
        let mut png = Vec::new();
        let img = RgbImage::from_pixel(2, 1, image::Rgb([255, 255, 255]));
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_rgb(&png, 8).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }

    #[test]
    fn test_nchw_layout_and_mean_subtraction() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgb([100, 50, 25]));
        let array = to_nchw(&img, [10.0, 20.0, 30.0]);

        assert_eq!(array.shape(), &[1, 3, 2, 2]);
        assert_eq!(array[[0, 0, 0, 0]], 90.0);
        assert_eq!(array[[0, 1, 0, 0]], 30.0);
        assert_eq!(array[[0, 2, 0, 0]], -5.0);
        // Untouched pixels are zero minus the mean.
        assert_eq!(array[[0, 0, 1, 1]], -10.0);
    }

    #[test]
    fn test_missing_model_is_artifact_error() {
        let config = EncoderConfig {
            model_path: "/nonexistent/encoder.onnx".into(),
            dims: 512,
            input_size: 224,
            channel_means: [0.0, 0.0, 0.0],
            sha256: None,
        };
        let err = ImageEncoder::load(&config).unwrap_err();
        assert!(matches!(err, CoreError::Artifact(_)));
    }
}
