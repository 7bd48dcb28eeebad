//! Multi-class symbol classifier for the hieroglyph translation pipeline.
//!
//! Each cropped symbol image is classified independently into exactly one
//! class from a fixed vocabulary. No confidence threshold is applied: the
//! top class is returned even under low confidence, a documented
//! limitation of the trained head rather than something to paper over.

use std::path::Path;
use tract_onnx::prelude::*;

use crate::config::ClassifierConfig;
use crate::encoder::{decode_rgb, load_typed, to_nchw, OnnxPlan};
use crate::error::{CoreError, CoreResult};

/// Trained multi-class head plus its label vocabulary. The label table
/// is a JSON array ordered by model output index.
pub struct SymbolClassifier {
    plan: OnnxPlan,
    labels: Vec<String>,
    input_size: u32,
}

impl SymbolClassifier {
    pub fn load(config: &ClassifierConfig) -> CoreResult<Self> {
        let labels = load_labels(&config.labels_path)?;

        let typed = load_typed(&config.model_path)?;
        // When the graph declares a static class count, it must agree
        // with the label table; catching the drift at startup beats a
        // garbage label at request time.
        if let Ok(fact) = typed.output_fact(0) {
            if let Some(shape) = fact.shape.as_concrete() {
                if let Some(&classes) = shape.last() {
                    if classes != labels.len() {
                        return Err(CoreError::Artifact(format!(
                            "model outputs {} classes but label table has {}",
                            classes,
                            labels.len()
                        )));
                    }
                }
            }
        }
        let plan = typed.into_runnable().map_err(|e| {
            CoreError::Artifact(format!("build plan for {}: {}", config.model_path.display(), e))
        })?;

        Ok(Self {
            plan,
            labels,
            input_size: config.input_size,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify one cropped symbol image: resize, scale pixels to
    /// `[0, 1]`, run the head, and decode the argmax through the label
    /// table. Blocking, like [`crate::encoder::ImageEncoder::extract`].
    pub fn classify(&self, image_bytes: &[u8]) -> CoreResult<String> {
        let img = decode_rgb(image_bytes, self.input_size)?;
        let mut array = to_nchw(&img, [0.0, 0.0, 0.0]);
        array.mapv_inplace(|v| v / 255.0);
        let tensor: Tensor = array.into();

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| CoreError::Classifier(e.to_string()))?;
        let output = outputs
            .first()
            .ok_or_else(|| CoreError::Classifier("model produced no output".into()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| CoreError::Classifier(e.to_string()))?;

        let probs: Vec<f32> = view.iter().copied().collect();
        let index = argmax(&probs)
            .ok_or_else(|| CoreError::Classifier("empty probability vector".into()))?;

        self.labels.get(index).cloned().ok_or_else(|| {
            CoreError::Classifier(format!(
                "predicted class {} outside label table of {}",
                index,
                self.labels.len()
            ))
        })
    }
}

fn load_labels(path: &Path) -> CoreResult<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CoreError::Artifact(format!("read label table {}: {}", path.display(), e)))?;
    let labels: Vec<String> = serde_json::from_str(&content)
        .map_err(|e| CoreError::Artifact(format!("parse label table {}: {}", path.display(), e)))?;
    if labels.is_empty() {
        return Err(CoreError::Artifact(format!(
            "label table {} is empty",
            path.display()
        )));
    }
    Ok(labels)
}

/// Index of the maximum entry; first index wins ties.
fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, top)) if v <= top => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_argmax_picks_top_class() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.9]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_argmax_tie_goes_first() {
        assert_eq!(argmax(&[0.4, 0.4, 0.2]), Some(0));
    }

    #[test]
    fn test_load_labels() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"["ankh", "eye_of_horus", "scarab"]"#)
            .unwrap();
        let labels = load_labels(file.path()).unwrap();
        assert_eq!(labels, vec!["ankh", "eye_of_horus", "scarab"]);
    }

    #[test]
    fn test_empty_label_table_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[]").unwrap();
        assert!(load_labels(file.path()).is_err());
    }

    #[test]
    fn test_unparseable_label_table_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"not\": \"a list\"}").unwrap();
        let err = load_labels(file.path()).unwrap_err();
        assert!(matches!(err, CoreError::Artifact(_)));
    }
}
