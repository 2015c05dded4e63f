//! Local sequence-to-sequence summarization.
//!
//! The backend drives any [`Seq2SeqModel`]. With the `local-model` feature a
//! Candle T5 model is loaded from the Hugging Face Hub; without it, or when
//! loading fails, the backend reports itself unavailable.

use super::{Availability, SummaryBackend, SummaryError, LOCAL_MODEL_NOTICE};
use crate::config::LocalModelConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Task prefix T5-style models expect for summarization
pub const TASK_PREFIX: &str = "summarize: ";

/// A text-to-text model with bounded greedy generation
pub trait Seq2SeqModel: Send + Sync {
    /// Generate between `min_length` and `max_length` tokens for `prompt`
    fn generate(&self, prompt: &str, min_length: usize, max_length: usize) -> Result<String, SummaryError>;
}

pub struct LocalSeq2SeqBackend {
    model: Option<Arc<dyn Seq2SeqModel>>,
    model_id: String,
    min_length: usize,
    max_length: usize,
}

impl LocalSeq2SeqBackend {
    pub fn new(model: Arc<dyn Seq2SeqModel>, config: &LocalModelConfig) -> Self {
        Self {
            model: Some(model),
            model_id: config.model_id.clone(),
            min_length: config.min_length,
            max_length: config.max_length,
        }
    }

    /// A backend with no model behind it
    pub fn unavailable(config: &LocalModelConfig) -> Self {
        Self {
            model: None,
            model_id: config.model_id.clone(),
            min_length: config.min_length,
            max_length: config.max_length,
        }
    }

    /// Load the configured model, falling back to an unavailable backend
    pub fn from_config(config: &LocalModelConfig) -> Self {
        match load_model(config) {
            Some(model) => Self::new(model, config),
            None => Self::unavailable(config),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(feature = "local-model")]
fn load_model(config: &LocalModelConfig) -> Option<Arc<dyn Seq2SeqModel>> {
    match t5::T5Summarizer::load(&config.model_id) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!("Failed to load local model {}: {}", config.model_id, e);
            None
        }
    }
}

#[cfg(not(feature = "local-model"))]
fn load_model(config: &LocalModelConfig) -> Option<Arc<dyn Seq2SeqModel>> {
    warn!(
        "Local model {} requested but the local-model feature is disabled",
        config.model_id
    );
    None
}

#[async_trait]
impl SummaryBackend for LocalSeq2SeqBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn availability(&self) -> Availability {
        if self.model.is_some() {
            Availability::Ready
        } else {
            Availability::Unavailable(LOCAL_MODEL_NOTICE.to_string())
        }
    }

    async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| SummaryError::Model("local model not loaded".to_string()))?;

        let prompt = format!("{TASK_PREFIX}{}", text.trim());
        let (min_length, max_length) = (self.min_length, self.max_length);
        debug!("Running {} on {} chars", self.model_id, prompt.len());

        tokio::task::spawn_blocking(move || model.generate(&prompt, min_length, max_length))
            .await
            .map_err(|e| SummaryError::Model(format!("generation task failed: {e}")))?
    }
}

#[cfg(feature = "local-model")]
mod t5 {
    use super::{Seq2SeqModel, SummaryError};
    use candle_core::{DType, Device, Tensor};
    use candle_nn::VarBuilder;
    use candle_transformers::models::t5::{Config, T5ForConditionalGeneration};
    use hf_hub::api::sync::Api;
    use hf_hub::{Repo, RepoType};
    use std::sync::Mutex;
    use std::time::Instant;
    use tokenizers::Tokenizer;
    use tracing::info;

    fn model_err(e: impl std::fmt::Display) -> SummaryError {
        SummaryError::Model(e.to_string())
    }

    /// T5 conditional generation on the CPU with greedy decoding
    pub struct T5Summarizer {
        model: Mutex<T5ForConditionalGeneration>,
        tokenizer: Tokenizer,
        config: Config,
        device: Device,
    }

    impl T5Summarizer {
        pub fn load(model_id: &str) -> Result<Self, SummaryError> {
            let start = Instant::now();
            info!("Loading local summarization model: {}", model_id);

            let api = Api::new().map_err(|e| model_err(format!("API init: {e}")))?;
            let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

            let config_path = repo
                .get("config.json")
                .map_err(|e| model_err(format!("config.json: {e}")))?;
            let tokenizer_path = repo
                .get("tokenizer.json")
                .map_err(|e| model_err(format!("tokenizer.json: {e}")))?;
            let weights_path = repo
                .get("model.safetensors")
                .map_err(|e| model_err(format!("model.safetensors: {e}")))?;

            let config_text = std::fs::read_to_string(&config_path).map_err(model_err)?;
            let mut config: Config = serde_json::from_str(&config_text).map_err(model_err)?;
            config.use_cache = true;

            let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(model_err)?;
            let device = Device::Cpu;

            #[allow(unsafe_code)]
            let vb = unsafe {
                VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                    .map_err(model_err)?
            };
            let model = T5ForConditionalGeneration::load(vb, &config).map_err(model_err)?;

            info!("Local model loaded in {:?}", start.elapsed());
            Ok(Self {
                model: Mutex::new(model),
                tokenizer,
                config,
                device,
            })
        }

        /// Index of the highest logit, skipping `banned`
        fn greedy_pick(logits: &Tensor, banned: Option<usize>) -> Result<u32, SummaryError> {
            let scores = logits
                .to_dtype(DType::F32)
                .and_then(|t| t.to_vec1::<f32>())
                .map_err(model_err)?;

            scores
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != banned)
                .max_by(|a, b| a.1.total_cmp(b.1))
                .and_then(|(index, _)| u32::try_from(index).ok())
                .ok_or_else(|| model_err("empty logits"))
        }
    }

    impl Seq2SeqModel for T5Summarizer {
        fn generate(
            &self,
            prompt: &str,
            min_length: usize,
            max_length: usize,
        ) -> Result<String, SummaryError> {
            let encoding = self.tokenizer.encode(prompt, true).map_err(model_err)?;
            let input_ids = Tensor::new(encoding.get_ids(), &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(model_err)?;

            let mut model = self
                .model
                .lock()
                .map_err(|_| model_err("model lock poisoned"))?;
            model.clear_kv_cache();

            let encoder_output = model.encode(&input_ids).map_err(model_err)?;
            let start_token = self
                .config
                .decoder_start_token_id
                .unwrap_or(self.config.pad_token_id);
            let start_token = u32::try_from(start_token).map_err(model_err)?;
            let eos_token = self.config.eos_token_id;

            let mut output: Vec<u32> = vec![start_token];
            while output.len() <= max_length {
                let last = output[output.len() - 1];
                let decoder_input = if output.len() == 1 {
                    Tensor::new(output.as_slice(), &self.device)
                } else {
                    Tensor::new(&[last], &self.device)
                }
                .and_then(|t| t.unsqueeze(0))
                .map_err(model_err)?;

                let logits = model
                    .decode(&decoder_input, &encoder_output)
                    .and_then(|t| t.squeeze(0))
                    .map_err(model_err)?;

                let generated = output.len() - 1;
                let banned = (generated < min_length).then_some(eos_token);
                let next = Self::greedy_pick(&logits, banned)?;
                if next as usize == eos_token {
                    break;
                }
                output.push(next);
            }
            model.clear_kv_cache();

            self.tokenizer
                .decode(&output[1..], true)
                .map_err(model_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<(String, usize, usize)>>,
    }

    impl Seq2SeqModel for Echo {
        fn generate(&self, prompt: &str, min_length: usize, max_length: usize) -> Result<String, SummaryError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((prompt.to_string(), min_length, max_length));
            }
            Ok(format!("{} palabras", prompt.split_whitespace().count()))
        }
    }

    #[tokio::test]
    async fn test_prompt_prefix_and_bounds() {
        let model = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let backend = LocalSeq2SeqBackend::new(model.clone(), &LocalModelConfig::default());

        assert_eq!(backend.availability(), Availability::Ready);
        let summary = backend.summarize("  The trial met its endpoint. \n").await.unwrap();
        assert_eq!(summary, "6 palabras");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0], ("summarize: The trial met its endpoint.".to_string(), 30, 100));
    }

    #[test]
    fn test_unavailable_backend_notice() {
        let backend = LocalSeq2SeqBackend::unavailable(&LocalModelConfig::default());
        assert_eq!(
            backend.availability(),
            Availability::Unavailable(LOCAL_MODEL_NOTICE.to_string())
        );
        assert_eq!(backend.model_id(), "t5-small");
    }

    #[cfg(not(feature = "local-model"))]
    #[test]
    fn test_from_config_without_feature_is_unavailable() {
        let backend = LocalSeq2SeqBackend::from_config(&LocalModelConfig::default());
        assert!(matches!(backend.availability(), Availability::Unavailable(_)));
    }
}
