use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	#[serde(default)]
	index: Option<usize>,
	embedding: Vec<f32>,
}

/// Embed a batch of document texts, preserving input order. Providers may
/// return items out of order; the `index` field wins over array position.
pub async fn embed_documents(
	cfg: &sift_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let parsed: EmbeddingResponse =
		serde_json::from_value(res.error_for_status()?.json().await?).map_err(|err| {
			Error::InvalidResponse { message: format!("Malformed embedding response: {err}") }
		})?;

	if parsed.data.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response returned {} vectors for {} inputs.",
				parsed.data.len(),
				texts.len()
			),
		});
	}

	let mut indexed: Vec<(usize, Vec<f32>)> = parsed
		.data
		.into_iter()
		.enumerate()
		.map(|(position, item)| (item.index.unwrap_or(position), item.embedding))
		.collect();

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// Embed a single query text.
pub async fn embed_query(
	cfg: &sift_config::EmbeddingProviderConfig,
	text: &str,
) -> Result<Vec<f32>> {
	let mut vectors = embed_documents(cfg, std::slice::from_ref(&text.to_string())).await?;

	vectors.pop().ok_or_else(|| Error::InvalidResponse {
		message: "Embedding response contained no vectors.".to_string(),
	})
}
