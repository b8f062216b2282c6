pub mod boost;
pub mod expand;
pub mod fusion;
pub mod lexical;

use std::collections::HashSet;

use sift_storage::models::Chunk;

use crate::{Result, SiftService, search::lexical::LexicalIndex};

pub use expand::Expansion;
pub use fusion::FusionWeights;

/// Which search path produced a result. Matched exhaustively at fusion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Engine {
	Lexical,
	Semantic,
	Fused,
	Grep,
}

#[derive(Clone, Debug)]
pub struct RankedResult {
	pub id: String,
	pub score: f32,
	pub engine: Engine,
	pub explanation: Option<String>,
}

/// Whether semantic search is restricted to the shared candidate set or may
/// roam the whole persistent index. Scoped search keeps both engines on the
/// identical chunk universe; full-vault trades that for recall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemanticMode {
	CandidateScoped,
	FullVault,
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
	pub max_results: usize,
	pub semantic_weight: f32,
	pub candidate_limit: usize,
	pub rrf_k: u32,
	pub enable_semantic: bool,
	pub enable_lexical_boosts: bool,
	pub salient_terms: HashSet<String>,
	pub semantic_mode: SemanticMode,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			max_results: 30,
			semantic_weight: 0.6,
			candidate_limit: 500,
			rrf_k: 60,
			enable_semantic: true,
			enable_lexical_boosts: true,
			salient_terms: HashSet::new(),
			semantic_mode: SemanticMode::CandidateScoped,
		}
	}
}

impl SearchOptions {
	/// Options derived from configuration defaults.
	pub fn from_config(cfg: &sift_config::Config) -> Self {
		Self {
			max_results: cfg.search.max_results,
			semantic_weight: cfg.search.semantic_weight,
			candidate_limit: cfg.search.candidate_limit,
			rrf_k: cfg.search.rrf_k,
			..Self::default()
		}
	}

	/// Clamp every field into its documented range; out-of-range input is
	/// normalized, never rejected.
	pub fn clamped(mut self) -> Self {
		self.max_results = self.max_results.clamp(1, 100);
		self.semantic_weight = if self.semantic_weight.is_finite() {
			self.semantic_weight.clamp(0.0, 1.0)
		} else {
			0.6
		};
		self.candidate_limit = self.candidate_limit.clamp(10, 1_000);
		self.rrf_k = self.rrf_k.clamp(1, 100);

		self
	}
}

impl SiftService {
	/// The retrieval pipeline: expand, gather candidates, run the lexical and
	/// semantic engines concurrently over the same candidate universe, boost,
	/// fuse, normalize, and select a diverse top-K.
	///
	/// This call never fails; an unexpected pipeline error degrades to a
	/// plain keyword scan over the candidates.
	pub async fn retrieve(&self, query: &str, options: SearchOptions) -> Vec<RankedResult> {
		let options = options.clamped();
		let expansion =
			expand::expand(&self.cfg, self.providers.chat.as_deref(), query).await;

		if expansion.original_query.is_empty() {
			return Vec::new();
		}

		match self.retrieve_inner(&expansion, &options).await {
			Ok(results) => results,
			Err(err) => {
				tracing::error!(
					query = expansion.original_query,
					error = %err,
					"Retrieval pipeline failed; falling back to keyword scan."
				);

				self.grep_fallback(&expansion, &options).await
			},
		}
	}

	async fn retrieve_inner(
		&self,
		expansion: &Expansion,
		options: &SearchOptions,
	) -> Result<Vec<RankedResult>> {
		let candidates = self.gather_candidates(expansion, options).await;
		let chunks = self.chunks.get_chunks(&candidates).await;
		let salient = merged_salient_terms(expansion, options);
		let recall_queries = expansion.recall_queries();
		let semantic_variants = expansion.semantic_variants();
		let lexical_enabled = options.semantic_weight < 1.0 && !chunks.is_empty();
		let semantic_enabled = options.enable_semantic && options.semantic_weight > 0.0;
		let fetch = per_engine_limit(options.max_results);
		let candidate_set: HashSet<String> = candidates.iter().cloned().collect();
		let scoped = match options.semantic_mode {
			SemanticMode::CandidateScoped => Some(&candidate_set),
			SemanticMode::FullVault => None,
		};

		let mut lexical_index = LexicalIndex::new();

		if lexical_enabled {
			lexical_index.build_from_candidates(&chunks);
		}

		let (mut lexical_results, semantic_results) = tokio::join!(
			async {
				if !lexical_enabled {
					return Vec::new();
				}

				lexical_index.search(
					&recall_queries,
					fetch,
					&salient,
					&expansion.original_query,
				)
			},
			async {
				if !semantic_enabled {
					return Vec::new();
				}

				self.index
					.search(&semantic_variants, fetch, scoped)
					.await
					.into_iter()
					.map(|(id, score)| RankedResult {
						id,
						score,
						engine: Engine::Semantic,
						explanation: None,
					})
					.collect()
			},
		);

		// The ephemeral index is per-call state; nothing leaks across calls.
		lexical_index.clear();

		if options.enable_lexical_boosts && !lexical_results.is_empty() {
			boost::apply_folder_boost(&mut lexical_results, self.cfg.boosts.folder_cap);
			boost::apply_graph_boost(
				&mut lexical_results,
				self.vault.as_ref(),
				self.cfg.boosts.graph_similarity_threshold,
				self.cfg.boosts.graph_cap,
			)
			.await;
			fusion::sort_descending(&mut lexical_results);
		}

		let fused = self.fuse(lexical_results, semantic_results, options);

		Ok(fusion::select_diverse_top_k(fused, options.max_results))
	}

	fn fuse(
		&self,
		lexical: Vec<RankedResult>,
		semantic: Vec<RankedResult>,
		options: &SearchOptions,
	) -> Vec<RankedResult> {
		// Weight extremes and one-sided outcomes bypass fusion entirely, so
		// the surviving list keeps its engine tag and per-engine scores.
		if options.semantic_weight >= 1.0 || lexical.is_empty() {
			return semantic;
		}
		if options.semantic_weight <= 0.0 || !options.enable_semantic || semantic.is_empty() {
			return lexical;
		}

		let weights = FusionWeights {
			lexical: 1.0 - options.semantic_weight,
			semantic: options.semantic_weight,
		};
		let mut fused = fusion::weighted_rrf(&lexical, &semantic, weights, options.rrf_k);

		fusion::normalize_scores(&mut fused);

		fused
	}

	async fn gather_candidates(
		&self,
		expansion: &Expansion,
		options: &SearchOptions,
	) -> Vec<String> {
		let terms = expansion.scan_terms();
		let mut candidates = match self.vault.scan(&terms, self.cfg.search.scan_width).await {
			Ok(candidates) => candidates,
			Err(err) => {
				tracing::warn!(error = %err, "Candidate scan failed; proceeding without candidates.");

				Vec::new()
			},
		};

		candidates.truncate(options.candidate_limit);

		candidates
	}

	/// Last-resort retrieval: a plain keyword scan over the candidate chunks
	/// ranked by inverse match position.
	async fn grep_fallback(
		&self,
		expansion: &Expansion,
		options: &SearchOptions,
	) -> Vec<RankedResult> {
		let candidates = self.gather_candidates(expansion, options).await;
		let chunks = self.chunks.get_chunks(&candidates).await;
		let needle = expansion.original_query.to_lowercase();
		let terms = expansion.scan_terms();
		let mut results: Vec<RankedResult> = chunks
			.iter()
			.filter_map(|chunk| grep_score(chunk, &needle, &terms))
			.collect();

		fusion::sort_descending(&mut results);
		results.truncate(options.max_results);

		results
	}
}

fn grep_score(chunk: &Chunk, needle: &str, terms: &[String]) -> Option<RankedResult> {
	let content = chunk.content.to_lowercase();
	let position = content
		.find(needle)
		.or_else(|| terms.iter().filter_map(|term| content.find(term.as_str())).min())?;
	let score = 1.0 / (1.0 + position as f32);

	Some(RankedResult {
		id: chunk.id.clone(),
		score,
		engine: Engine::Grep,
		explanation: None,
	})
}

fn merged_salient_terms(expansion: &Expansion, options: &SearchOptions) -> HashSet<String> {
	let mut out: HashSet<String> =
		expansion.salient_terms.iter().map(|term| term.to_lowercase()).collect();

	out.extend(options.salient_terms.iter().map(|term| term.to_lowercase()));

	out
}

fn per_engine_limit(max_results: usize) -> usize {
	(max_results * 3).clamp(max_results, 100)
}
