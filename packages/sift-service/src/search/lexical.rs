use std::collections::HashSet;

use ahash::AHashMap;
use unicode_segmentation::UnicodeSegmentation;

use sift_storage::models::Chunk;

use crate::search::{Engine, RankedResult};

const SALIENT_TERM_WEIGHT: f32 = 1.5;
const PHRASE_MATCH_MULTIPLIER: f32 = 1.5;

struct IndexedChunk {
	id: String,
	content_lower: String,
	token_count: usize,
}

/// Ephemeral full-text index over one query's candidate chunks. Built per
/// retrieval, never persisted, and discarded afterwards, so memory stays
/// bounded by a single candidate set regardless of vault size.
#[derive(Default)]
pub struct LexicalIndex {
	chunks: Vec<IndexedChunk>,
	postings: AHashMap<String, Vec<(u32, u32)>>,
}

impl LexicalIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	/// Index the candidate chunks, returning how many were indexed. Insertion
	/// order is candidate order and doubles as the tie-break at search time.
	pub fn build_from_candidates(&mut self, chunks: &[Chunk]) -> usize {
		for chunk in chunks {
			let chunk_idx = self.chunks.len() as u32;
			let content_lower = chunk.content.to_lowercase();
			let mut counts: AHashMap<String, u32> = AHashMap::new();

			for token in tokenize(&chunk.content) {
				*counts.entry(token).or_insert(0) += 1;
			}
			// Title and heading tokens count toward the chunk as well.
			for token in tokenize(&chunk.title).chain(tokenize(&chunk.heading)) {
				*counts.entry(token).or_insert(0) += 1;
			}

			let token_count = counts.values().map(|count| *count as usize).sum();

			for (token, count) in counts {
				self.postings.entry(token).or_default().push((chunk_idx, count));
			}

			self.chunks.push(IndexedChunk { id: chunk.id.clone(), content_lower, token_count });
		}

		self.chunks.len()
	}

	/// Score the recall queries against the index. Salient terms weigh more,
	/// and an exact phrase match of the original query multiplies the score.
	/// Per-chunk scores are min-max normalized so they are comparable with
	/// the semantic engine's before fusion.
	pub fn search(
		&self,
		queries: &[String],
		limit: usize,
		salient_terms: &HashSet<String>,
		original_query: &str,
	) -> Vec<RankedResult> {
		if self.chunks.is_empty() || queries.is_empty() || limit == 0 {
			return Vec::new();
		}

		let total = self.chunks.len() as f32;
		let mut scores = vec![0.0_f32; self.chunks.len()];

		for query in queries {
			let mut query_scores = vec![0.0_f32; self.chunks.len()];

			for token in tokenize(query) {
				let Some(postings) = self.postings.get(&token) else {
					continue;
				};
				let idf = (1.0 + total / postings.len() as f32).ln();
				let weight =
					if salient_terms.contains(&token) { SALIENT_TERM_WEIGHT } else { 1.0 };

				for (chunk_idx, term_frequency) in postings {
					let chunk = &self.chunks[*chunk_idx as usize];
					let tf = *term_frequency as f32 / chunk.token_count.max(1) as f32;

					query_scores[*chunk_idx as usize] += tf * idf * weight;
				}
			}

			// A chunk's score is its best recall query, not the sum; near-
			// duplicate query variants must not inflate ranking.
			for (idx, query_score) in query_scores.into_iter().enumerate() {
				scores[idx] = scores[idx].max(query_score);
			}
		}

		let phrase = original_query.trim().to_lowercase();

		if phrase.len() > 2 {
			for (idx, chunk) in self.chunks.iter().enumerate() {
				if scores[idx] > 0.0 && chunk.content_lower.contains(&phrase) {
					scores[idx] *= PHRASE_MATCH_MULTIPLIER;
				}
			}
		}

		let mut hits: Vec<(usize, f32)> = scores
			.into_iter()
			.enumerate()
			.filter(|(_, score)| *score > 0.0)
			.collect();

		// Stable sort keeps candidate order as the tie-break.
		hits.sort_by(|(_, lhs), (_, rhs)| rhs.partial_cmp(lhs).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(limit);

		min_max_normalize(&mut hits);

		hits.into_iter()
			.map(|(idx, score)| RankedResult {
				id: self.chunks[idx].id.clone(),
				score,
				engine: Engine::Lexical,
				explanation: None,
			})
			.collect()
	}

	/// Drop the index. Called after every retrieval; nothing survives across
	/// calls.
	pub fn clear(&mut self) {
		self.chunks.clear();
		self.postings.clear();
	}
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
	text.unicode_words().map(|word| word.to_lowercase())
}

fn min_max_normalize(hits: &mut [(usize, f32)]) {
	if hits.is_empty() {
		return;
	}

	let mut min = f32::MAX;
	let mut max = f32::MIN;

	for (_, score) in hits.iter() {
		min = min.min(*score);
		max = max.max(*score);
	}

	let range = max - min;

	if range < 1e-6 {
		return;
	}

	for (_, score) in hits.iter_mut() {
		*score = (*score - min) / range;
	}
}
