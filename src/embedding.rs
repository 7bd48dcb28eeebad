//! Text-query encoders for the place index.
//!
//! The itinerary pipeline encodes free-text queries with the same encoder
//! family that produced the index vectors. That pairing is a hard
//! invariant recorded in config — a mismatched encoder degrades
//! relevance silently, it never errors — so the provider choice lives
//! next to the index path it belongs to.
//!
//! Two implementations of [`TextEncoder`]:
//! - **[`RemoteTextEncoder`]** — calls an OpenAI-compatible embeddings
//!   endpoint. One attempt per query, no retry loop: retry policy
//!   belongs to the caller, not the core.
//! - **[`LocalTextEncoder`]** — pure-Rust sentence embedding: tract ONNX
//!   inference plus a HuggingFace tokenizer, mean-pooled and
//!   L2-normalized. No network dependency at query time.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tract_onnx::prelude::*;

use crate::config::EmbeddingConfig;
use crate::encoder::{load_plan, OnnxPlan};
use crate::error::{CoreError, CoreResult};

/// A text encoder paired with the pre-built place index.
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Model identifier, for the `artifacts` listing.
    fn model_name(&self) -> &str;
    /// Embedding dimensionality; must match the index vectors.
    fn dims(&self) -> usize;
    /// Encode one query into a dense vector.
    async fn encode(&self, text: &str) -> CoreResult<Vec<f32>>;
}

/// Instantiate the encoder named by the config. Missing credentials or
/// artifacts fail here, at startup, not on the first query.
pub fn create_text_encoder(config: &EmbeddingConfig) -> CoreResult<Box<dyn TextEncoder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(RemoteTextEncoder::new(config)?)),
        "local" => Ok(Box::new(LocalTextEncoder::new(config)?)),
        other => Err(CoreError::Artifact(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Remote provider ============

pub struct RemoteTextEncoder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    api_key: String,
}

impl RemoteTextEncoder {
    pub fn new(config: &EmbeddingConfig) -> CoreResult<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| CoreError::Artifact("embedding.model required".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| CoreError::Artifact("embedding.dims required".into()))?;
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CoreError::Artifact(format!("{} environment variable not set", config.api_key_env))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Artifact(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            dims,
            api_key,
        })
    }
}

#[async_trait]
impl TextEncoder for RemoteTextEncoder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn encode(&self, text: &str) -> CoreResult<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Encoder(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::Encoder(format!(
                "embeddings API returned {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Encoder(e.to_string()))?;
        let vector = parse_embedding_response(&json)?;
        if vector.len() != self.dims {
            return Err(CoreError::Encoder(format!(
                "embedding has {} dims, config declares {}",
                vector.len(),
                self.dims
            )));
        }
        Ok(vector)
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> CoreResult<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| CoreError::Encoder("malformed embeddings response".into()))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Local provider ============

pub struct LocalTextEncoder {
    plan: Arc<OnnxPlan>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    model_name: String,
    dims: usize,
    max_len: usize,
}

impl LocalTextEncoder {
    pub fn new(config: &EmbeddingConfig) -> CoreResult<Self> {
        let model_path = config
            .model_path
            .as_ref()
            .ok_or_else(|| CoreError::Artifact("embedding.model_path required".into()))?;
        let tokenizer_path = config
            .tokenizer_path
            .as_ref()
            .ok_or_else(|| CoreError::Artifact("embedding.tokenizer_path required".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| CoreError::Artifact("embedding.dims required".into()))?;

        let plan = load_plan(model_path)?;
        let tokenizer = load_tokenizer(tokenizer_path)?;

        Ok(Self {
            plan: Arc::new(plan),
            tokenizer: Arc::new(tokenizer),
            model_name: config
                .model
                .clone()
                .unwrap_or_else(|| "local-sentence-encoder".to_string()),
            dims,
            max_len: config.max_len,
        })
    }
}

fn load_tokenizer(path: &Path) -> CoreResult<tokenizers::Tokenizer> {
    tokenizers::Tokenizer::from_file(path)
        .map_err(|e| CoreError::Artifact(format!("load tokenizer {}: {}", path.display(), e)))
}

#[async_trait]
impl TextEncoder for LocalTextEncoder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn encode(&self, text: &str) -> CoreResult<Vec<f32>> {
        let plan = self.plan.clone();
        let tokenizer = self.tokenizer.clone();
        let text = text.to_string();
        let dims = self.dims;
        let max_len = self.max_len;

        tokio::task::spawn_blocking(move || run_local_encode(&plan, &tokenizer, &text, dims, max_len))
            .await
            .map_err(|e| CoreError::Encoder(format!("inference task failed: {}", e)))?
    }
}

fn run_local_encode(
    plan: &OnnxPlan,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
    dims: usize,
    max_len: usize,
) -> CoreResult<Vec<f32>> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| CoreError::Encoder(format!("tokenize: {}", e)))?;

    let ids = encoding.get_ids();
    let len = ids.len().clamp(1, max_len);

    let mut input_ids = vec![0i64; len];
    let mut attention_mask = vec![0i64; len];
    for (j, &id) in ids.iter().take(len).enumerate() {
        input_ids[j] = id as i64;
        attention_mask[j] = 1;
    }

    let input_ids = ndarray::Array2::from_shape_vec((1, len), input_ids)
        .map_err(|e| CoreError::Encoder(e.to_string()))?;
    let attention_mask = ndarray::Array2::from_shape_vec((1, len), attention_mask)
        .map_err(|e| CoreError::Encoder(e.to_string()))?;

    let input_ids_t: Tensor = input_ids.into();
    let attention_mask_t: Tensor = attention_mask.into();
    let result = plan
        .run(tvec!(input_ids_t.into(), attention_mask_t.into()))
        .map_err(|e| CoreError::Encoder(e.to_string()))?;

    let output = result
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::Encoder("no output tensor".into()))?;
    let view = output
        .to_array_view::<f32>()
        .map_err(|e| CoreError::Encoder(e.to_string()))?;

    // [1, dims] when the graph pools for us; [1, seq_len, dims] when it
    // exposes last_hidden_state and we mean-pool over tokens.
    let shape = view.shape();
    let pooled = if shape.len() == 2 {
        view.iter().copied().collect()
    } else if shape.len() == 3 {
        mean_pool(&view.iter().copied().collect::<Vec<f32>>(), shape[1], dims)
    } else {
        return Err(CoreError::Encoder(format!(
            "unexpected output shape: {:?}",
            shape
        )));
    };

    Ok(normalize_l2(pooled))
}

/// Average `seq_len` rows of `dims` entries each.
fn mean_pool(flat: &[f32], seq_len: usize, dims: usize) -> Vec<f32> {
    let mut sum = vec![0f32; dims];
    if seq_len == 0 {
        return sum;
    }
    for row in 0..seq_len {
        for (k, slot) in sum.iter_mut().enumerate() {
            *slot += flat[row * dims + k];
        }
    }
    for slot in &mut sum {
        *slot /= seq_len as f32;
    }
    sum
}

fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}
