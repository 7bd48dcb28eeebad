use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub stores: StoresConfig,
    pub encoders: EncodersConfig,
    pub classifier: ClassifierConfig,
    pub index: IndexConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoresConfig {
    pub place_snapshot: PathBuf,
    pub person_snapshot: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncodersConfig {
    pub place: EncoderConfig,
    pub person: EncoderConfig,
}

/// One frozen image encoder. `channel_means` is subtracted per RGB
/// channel before inference; `dims` must match the paired snapshot.
#[derive(Debug, Deserialize, Clone)]
pub struct EncoderConfig {
    pub model_path: PathBuf,
    pub dims: usize,
    #[serde(default = "default_encoder_input")]
    pub input_size: u32,
    #[serde(default = "default_channel_means")]
    pub channel_means: [f32; 3],
    #[serde(default)]
    pub sha256: Option<String>,
}

fn default_encoder_input() -> u32 {
    224
}

fn default_channel_means() -> [f32; 3] {
    [123.68, 116.779, 103.939]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    #[serde(default = "default_classifier_input")]
    pub input_size: u32,
    #[serde(default)]
    pub sha256: Option<String>,
}

fn default_classifier_input() -> u32 {
    128
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    pub embedding: EmbeddingConfig,
}

fn default_top_k() -> i64 {
    6
}

/// Text-query encoder for the place index. The provider/model pairing
/// must match whatever built the index — a mismatch degrades relevance
/// silently rather than erroring, so it is pinned here in config.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_len() -> usize {
    256
}

fn default_timeout_secs() -> u64 {
    30
}

/// OpenAI-compatible chat-completions endpoint used by all three
/// generation modes (free text, streaming, JSON).
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub model: String,
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_generation_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_memory_capacity() -> usize {
    crate::memory::DEFAULT_CAPACITY
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate encoders
    for (name, enc) in [
        ("encoders.place", &config.encoders.place),
        ("encoders.person", &config.encoders.person),
    ] {
        if enc.dims == 0 {
            anyhow::bail!("{}.dims must be > 0", name);
        }
        if enc.input_size == 0 {
            anyhow::bail!("{}.input_size must be > 0", name);
        }
    }

    if config.classifier.input_size == 0 {
        anyhow::bail!("classifier.input_size must be > 0");
    }

    // Validate index retrieval
    if config.index.top_k < 1 {
        anyhow::bail!("index.top_k must be >= 1");
    }

    // Validate the text encoder pairing
    match config.index.embedding.provider.as_str() {
        "openai" => {
            if config.index.embedding.model.is_none() {
                anyhow::bail!("index.embedding.model required for the openai provider");
            }
            if config.index.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!("index.embedding.dims must be > 0 for the openai provider");
            }
        }
        "local" => {
            if config.index.embedding.model_path.is_none()
                || config.index.embedding.tokenizer_path.is_none()
            {
                anyhow::bail!(
                    "index.embedding.model_path and tokenizer_path required for the local provider"
                );
            }
            if config.index.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!("index.embedding.dims must be > 0 for the local provider");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or local.",
            other
        ),
    }

    // Validate generation
    if config.generation.model.trim().is_empty() {
        anyhow::bail!("generation.model must be set");
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.max_tokens == 0 {
        anyhow::bail!("generation.max_tokens must be > 0");
    }

    if config.chat.memory_capacity == 0 {
        anyhow::bail!("chat.memory_capacity must be >= 1");
    }

    Ok(config)
}
