use std::{collections::HashSet, time::Duration};

use serde_json::Value;

use sift_domain::{tags, terms};

use crate::ChatProvider;

const MAX_SALIENT_TERMS: usize = 8;
const MAX_QUERY_CHARS: usize = 1_000;

/// The expanded form of a raw query: recall queries for both engines, scoring
/// terms, and tag-derived recall terms.
#[derive(Clone, Debug)]
pub struct Expansion {
	pub queries: Vec<String>,
	pub salient_terms: Vec<String>,
	pub expanded_terms: Vec<String>,
	pub original_query: String,
	pub hyde: Option<String>,
}

impl Expansion {
	/// Terms for the keyword candidate scan: salient terms plus tag recall
	/// terms, falling back to the query itself.
	pub fn scan_terms(&self) -> Vec<String> {
		let mut out = Vec::new();
		let mut seen = HashSet::new();

		for term in self.salient_terms.iter().chain(self.expanded_terms.iter()) {
			if seen.insert(term.clone()) {
				out.push(term.clone());
			}
		}

		if out.is_empty() && !self.original_query.is_empty() {
			out.push(self.original_query.to_lowercase());
		}

		out
	}

	/// The recall list both engines receive: query variants plus tag terms.
	pub fn recall_queries(&self) -> Vec<String> {
		let mut out = self.queries.clone();
		let mut seen: HashSet<String> = out.iter().cloned().collect();

		for term in &self.expanded_terms {
			if seen.insert(term.clone()) {
				out.push(term.clone());
			}
		}

		out
	}

	/// Semantic query variants: the recall list plus the hypothetical answer
	/// passage when one was generated.
	pub fn semantic_variants(&self) -> Vec<String> {
		let mut out = self.recall_queries();

		if let Some(hyde) = &self.hyde {
			out.push(hyde.clone());
		}

		out
	}
}

#[derive(Debug, serde::Deserialize)]
struct ExpansionOutput {
	#[serde(default)]
	queries: Vec<String>,
	#[serde(default)]
	terms: Vec<String>,
}

/// Expand a raw query. Tag expansion always runs; the chat model contributes
/// paraphrases and salient terms when configured, bounded by a timeout with a
/// heuristic fallback. This function never fails.
pub async fn expand(
	cfg: &sift_config::Config,
	chat: Option<&dyn ChatProvider>,
	query: &str,
) -> Expansion {
	let original_query = terms::normalize_query(query, MAX_QUERY_CHARS);
	let expanded_terms = tags::expand_tags(&original_query);
	let fallback_terms =
		terms::salient_terms(&tags::strip_tag_markers(&original_query), MAX_SALIENT_TERMS);
	let mut expansion = Expansion {
		queries: vec![original_query.clone()],
		salient_terms: fallback_terms,
		expanded_terms,
		original_query: original_query.clone(),
		hyde: None,
	};

	if original_query.is_empty() {
		return expansion;
	}

	let (Some(chat), Some(chat_cfg)) = (chat, cfg.providers.chat.as_ref()) else {
		return expansion;
	};
	let timeout = Duration::from_millis(cfg.search.expansion.timeout_ms);

	if cfg.search.expansion.enabled {
		match tokio::time::timeout(
			timeout,
			chat.complete(
				chat_cfg,
				&expansion_messages(&original_query, cfg.search.expansion.max_queries),
			),
		)
		.await
		{
			Ok(Ok(raw)) => apply_expansion_output(&mut expansion, &raw, cfg.search.expansion.max_queries),
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Query expansion failed; using heuristic terms.");
			},
			Err(_) => {
				tracing::warn!(timeout_ms = cfg.search.expansion.timeout_ms, "Query expansion timed out.");
			},
		}
	}

	if cfg.search.hyde.enabled {
		match tokio::time::timeout(timeout, chat.complete(chat_cfg, &hyde_messages(&original_query)))
			.await
		{
			Ok(Ok(passage)) => {
				let passage = passage.trim();

				if !passage.is_empty() {
					expansion.hyde = Some(passage.to_string());
				}
			},
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Hypothetical passage generation failed.");
			},
			Err(_) => {
				tracing::warn!(
					timeout_ms = cfg.search.expansion.timeout_ms,
					"Hypothetical passage generation timed out."
				);
			},
		}
	}

	expansion
}

fn apply_expansion_output(expansion: &mut Expansion, raw: &str, max_queries: usize) {
	let parsed: ExpansionOutput = match serde_json::from_str(strip_code_fence(raw)) {
		Ok(parsed) => parsed,
		Err(err) => {
			tracing::warn!(error = %err, "Query expansion returned invalid JSON; using heuristic terms.");

			return;
		},
	};
	let mut queries = vec![expansion.original_query.clone()];
	let mut seen: HashSet<String> = queries.iter().map(|query| query.to_lowercase()).collect();

	for query in parsed.queries {
		let trimmed = query.trim();

		if trimmed.is_empty() || queries.len() > max_queries {
			continue;
		}
		if seen.insert(trimmed.to_lowercase()) {
			queries.push(trimmed.to_string());
		}
	}

	expansion.queries = queries;

	let mut salient = Vec::new();
	let mut seen_terms = HashSet::new();

	for term in parsed.terms {
		let trimmed = term.trim().to_lowercase();

		if trimmed.is_empty() || salient.len() >= MAX_SALIENT_TERMS {
			continue;
		}
		if seen_terms.insert(trimmed.clone()) {
			salient.push(trimmed);
		}
	}

	if !salient.is_empty() {
		expansion.salient_terms = salient;
	}
}

fn expansion_messages(query: &str, max_queries: usize) -> Vec<Value> {
	let system_prompt = "You are a query expansion engine for a note retrieval system. \
Output must be valid JSON only, matching {\"queries\": [\"string\"], \"terms\": [\"string\"]}. \
Generate short paraphrased query variations that preserve the original intent, and the most \
salient scoring terms. Do not add explanations or extra fields.";
	let user_prompt = format!(
		"Return at most {max_queries} paraphrased variations and at most {MAX_SALIENT_TERMS} \
salient terms for this query:\n{query}"
	);

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

fn hyde_messages(query: &str) -> Vec<Value> {
	let system_prompt = "You write a single short passage that could plausibly appear in a \
personal note answering the user's query. Output the passage only, no preamble.";

	vec![
		serde_json::json!({ "role": "system", "content": system_prompt }),
		serde_json::json!({ "role": "user", "content": query }),
	]
}

fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}
