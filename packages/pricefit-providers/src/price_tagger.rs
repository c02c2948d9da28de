use std::{collections::HashMap, fs, path::Path};

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;

use crate::{Error, Result};
use pricefit_config::PriceModelConfig;
use pricefit_domain::price::LabeledToken;

/// Token-classification head fields from a Hugging Face `config.json`.
#[derive(Debug, Deserialize)]
struct ClassifierHead {
	hidden_size: usize,
	id2label: HashMap<String, String>,
}

/// BERT token classifier that labels each word piece of a query. Runs on CPU, loaded once.
pub struct BertPriceTagger {
	model: BertModel,
	classifier: Linear,
	tokenizer: Tokenizer,
	device: Device,
	max_tokens: usize,
}
impl BertPriceTagger {
	pub fn load(cfg: &PriceModelConfig) -> Result<Self> {
		let dir = Path::new(&cfg.path);
		let tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
			.map_err(|err| Error::Tokenizer { message: err.to_string() })?;
		let raw = fs::read_to_string(dir.join("config.json"))?;
		let bert_cfg: BertConfig = serde_json::from_str(&raw)?;
		let head: ClassifierHead = serde_json::from_str(&raw)?;

		validate_labels(&head, &cfg.price_label_ids)?;

		let device = Device::Cpu;
		let tensors = candle_core::safetensors::load(dir.join("model.safetensors"), &device)?;
		let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
		// Falls back to the `bert.` prefix used by token-classification checkpoints.
		let model = BertModel::load(vb.clone(), &bert_cfg)?;
		let classifier =
			candle_nn::linear(head.hidden_size, head.id2label.len(), vb.pp("classifier"))?;

		tracing::info!(
			path = %dir.display(),
			labels = head.id2label.len(),
			"Price model loaded."
		);

		Ok(Self { model, classifier, tokenizer, device, max_tokens: cfg.max_tokens as usize })
	}

	/// Labels every non-special token of `text` with the arg-max class.
	pub fn tag(&self, text: &str) -> Result<Vec<LabeledToken>> {
		let encoding = self
			.tokenizer
			.encode(text, true)
			.map_err(|err| Error::Tokenizer { message: err.to_string() })?;
		let len = encoding.get_ids().len().min(self.max_tokens);

		if len == 0 {
			return Ok(Vec::new());
		}

		let input_ids = Tensor::new(&encoding.get_ids()[..len], &self.device)?.unsqueeze(0)?;
		let token_type_ids =
			Tensor::new(&encoding.get_type_ids()[..len], &self.device)?.unsqueeze(0)?;
		let attention_mask =
			Tensor::new(&encoding.get_attention_mask()[..len], &self.device)?.unsqueeze(0)?;
		let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
		let logits = self.classifier.forward(&hidden)?;
		let labels: Vec<u32> = logits.argmax(D::Minus1)?.squeeze(0)?.to_vec1()?;

		Ok(align_labels(
			&encoding.get_tokens()[..len],
			&encoding.get_special_tokens_mask()[..len],
			&labels,
		))
	}
}

fn validate_labels(head: &ClassifierHead, price_labels: &[u32]) -> Result<()> {
	if head.id2label.is_empty() {
		return Err(Error::InvalidConfig {
			message: "Price model config.json must define id2label.".to_string(),
		});
	}

	for label in price_labels {
		if *label as usize >= head.id2label.len() {
			return Err(Error::InvalidConfig {
				message: format!(
					"Price label {label} is outside the model's {} labels.",
					head.id2label.len()
				),
			});
		}
	}

	Ok(())
}

fn align_labels(tokens: &[String], special_mask: &[u32], labels: &[u32]) -> Vec<LabeledToken> {
	tokens
		.iter()
		.zip(special_mask)
		.zip(labels)
		.filter(|((_, special), _)| **special == 0)
		.map(|((token, _), label)| LabeledToken { token: token.clone(), label: *label })
		.collect()
}
