mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Boosts, ChatProviderConfig, Chunking, Config, EmbeddingProviderConfig, Expansion, Hyde, Index,
	Providers, Search, Vault,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.vault.root.trim().is_empty() {
		return Err(Error::Validation { message: "vault.root must be non-empty.".to_string() });
	}
	if cfg.chunking.max_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap >= cfg.chunking.max_chars {
		return Err(Error::Validation {
			message: "chunking.overlap must be less than chunking.max_chars.".to_string(),
		});
	}
	if !(1..=100).contains(&cfg.search.max_results) {
		return Err(Error::Validation {
			message: "search.max_results must be in the range 1-100.".to_string(),
		});
	}
	if !cfg.search.semantic_weight.is_finite()
		|| !(0.0..=1.0).contains(&cfg.search.semantic_weight)
	{
		return Err(Error::Validation {
			message: "search.semantic_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !(10..=1_000).contains(&cfg.search.candidate_limit) {
		return Err(Error::Validation {
			message: "search.candidate_limit must be in the range 10-1000.".to_string(),
		});
	}
	if !(1..=100).contains(&cfg.search.rrf_k) {
		return Err(Error::Validation {
			message: "search.rrf_k must be in the range 1-100.".to_string(),
		});
	}
	if cfg.search.scan_width == 0 {
		return Err(Error::Validation {
			message: "search.scan_width must be greater than zero.".to_string(),
		});
	}
	if cfg.search.expansion.max_queries == 0 {
		return Err(Error::Validation {
			message: "search.expansion.max_queries must be greater than zero.".to_string(),
		});
	}
	if cfg.search.expansion.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.expansion.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !cfg.boosts.folder_cap.is_finite() || cfg.boosts.folder_cap < 1.0 {
		return Err(Error::Validation {
			message: "boosts.folder_cap must be 1.0 or greater.".to_string(),
		});
	}
	if !cfg.boosts.graph_cap.is_finite() || cfg.boosts.graph_cap < 1.0 {
		return Err(Error::Validation {
			message: "boosts.graph_cap must be 1.0 or greater.".to_string(),
		});
	}
	if !cfg.boosts.graph_similarity_threshold.is_finite()
		|| !(0.0..=1.0).contains(&cfg.boosts.graph_similarity_threshold)
	{
		return Err(Error::Validation {
			message: "boosts.graph_similarity_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.index.path.trim().is_empty() {
		return Err(Error::Validation { message: "index.path must be non-empty.".to_string() });
	}
	if cfg.index.embed_batch_size == 0 {
		return Err(Error::Validation {
			message: "index.embed_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.index.insert_batch_size == 0 {
		return Err(Error::Validation {
			message: "index.insert_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if let Some(chat) = cfg.providers.chat.as_ref() {
		if chat.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.chat.api_key must be non-empty.".to_string(),
			});
		}
		if !chat.temperature.is_finite() || chat.temperature < 0.0 {
			return Err(Error::Validation {
				message: "providers.chat.temperature must be zero or greater.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	// A chat section with a blank api_base is treated as absent so the
	// expander falls back to heuristics instead of failing every call.
	if cfg
		.providers
		.chat
		.as_ref()
		.map(|chat| chat.api_base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.chat = None;
	}
}
