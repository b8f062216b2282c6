use std::collections::{HashMap, VecDeque};

use sift_storage::models::chunk_id_path;

use crate::search::{Engine, RankedResult};

const SCORE_FLOOR: f32 = 0.02;
const SCORE_CEILING: f32 = 0.98;
const SCORE_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub struct FusionWeights {
	pub lexical: f32,
	pub semantic: f32,
}

/// Weighted reciprocal rank fusion. Each list contributes
/// `weight / (k + rank)` per chunk, summed by id; output is sorted
/// descending with ties broken by first appearance (lexical list first).
/// Callers short-circuit at weight 0 / 1; this is only invoked when both
/// paths contributed.
pub fn weighted_rrf(
	lexical: &[RankedResult],
	semantic: &[RankedResult],
	weights: FusionWeights,
	k: u32,
) -> Vec<RankedResult> {
	let mut order: Vec<String> = Vec::new();
	let mut fused: HashMap<String, (f32, Option<u32>, Option<u32>)> = HashMap::new();

	for (idx, result) in lexical.iter().enumerate() {
		let rank = idx as u32 + 1;
		let contribution = weights.lexical / (k + rank) as f32;
		let entry = fused.entry(result.id.clone()).or_insert_with(|| {
			order.push(result.id.clone());

			(0.0, None, None)
		});

		entry.0 += contribution;
		entry.1 = Some(rank);
	}

	for (idx, result) in semantic.iter().enumerate() {
		let rank = idx as u32 + 1;
		let contribution = weights.semantic / (k + rank) as f32;
		let entry = fused.entry(result.id.clone()).or_insert_with(|| {
			order.push(result.id.clone());

			(0.0, None, None)
		});

		entry.0 += contribution;
		entry.2 = Some(rank);
	}

	let mut out: Vec<RankedResult> = order
		.into_iter()
		.filter_map(|id| {
			let (score, lexical_rank, semantic_rank) = fused.remove(&id)?;
			let explanation = match (lexical_rank, semantic_rank) {
				(Some(lex), Some(sem)) => format!("lexical #{lex} + semantic #{sem}"),
				(Some(lex), None) => format!("lexical #{lex}"),
				(None, Some(sem)) => format!("semantic #{sem}"),
				(None, None) => String::new(),
			};

			Some(RankedResult { id, score, engine: Engine::Fused, explanation: Some(explanation) })
		})
		.collect();

	sort_descending(&mut out);

	out
}

/// Min-max normalize scores into `[0.02, 0.98]`; exact 0/1 would be misread
/// as certainty. Near-constant score sets are clamped instead of stretched.
pub fn normalize_scores(results: &mut [RankedResult]) {
	if results.is_empty() {
		return;
	}

	let mut min = f32::MAX;
	let mut max = f32::MIN;

	for result in results.iter() {
		min = min.min(result.score);
		max = max.max(result.score);
	}

	let range = max - min;

	if range < SCORE_EPSILON {
		for result in results.iter_mut() {
			result.score = result.score.clamp(SCORE_FLOOR, SCORE_CEILING);
		}

		return;
	}

	for result in results.iter_mut() {
		result.score = SCORE_FLOOR + (SCORE_CEILING - SCORE_FLOOR) * (result.score - min) / range;
	}
}

/// Diversity-aware truncation: round-robin by per-document rank so every
/// distinct document is represented before any document takes a second slot,
/// preserving global score order otherwise.
pub fn select_diverse_top_k(results: Vec<RankedResult>, limit: usize) -> Vec<RankedResult> {
	if results.len() <= limit {
		return results;
	}

	let order: Vec<String> = {
		let mut seen = std::collections::HashSet::new();

		results
			.iter()
			.map(|result| chunk_id_path(&result.id).to_string())
			.filter(|path| seen.insert(path.clone()))
			.collect()
	};
	let mut queues: HashMap<String, VecDeque<RankedResult>> = HashMap::new();

	for result in results {
		let path = chunk_id_path(&result.id).to_string();

		queues.entry(path).or_default().push_back(result);
	}

	let mut out = Vec::with_capacity(limit);

	while out.len() < limit {
		let mut progressed = false;

		for path in &order {
			let Some(queue) = queues.get_mut(path) else {
				continue;
			};
			let Some(result) = queue.pop_front() else {
				continue;
			};

			out.push(result);

			progressed = true;

			if out.len() == limit {
				break;
			}
		}

		if !progressed {
			break;
		}
	}

	out
}

pub fn sort_descending(results: &mut [RankedResult]) {
	results.sort_by(|lhs, rhs| {
		rhs.score.partial_cmp(&lhs.score).unwrap_or(std::cmp::Ordering::Equal)
	});
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(id: &str, score: f32, engine: Engine) -> RankedResult {
		RankedResult { id: id.to_string(), score, engine, explanation: None }
	}

	fn lexical(ids: &[&str]) -> Vec<RankedResult> {
		ids.iter()
			.enumerate()
			.map(|(idx, id)| result(id, 1.0 - idx as f32 * 0.1, Engine::Lexical))
			.collect()
	}

	fn semantic(ids: &[&str]) -> Vec<RankedResult> {
		ids.iter()
			.enumerate()
			.map(|(idx, id)| result(id, 1.0 - idx as f32 * 0.1, Engine::Semantic))
			.collect()
	}

	#[test]
	fn chunks_on_both_lists_outrank_single_source_chunks() {
		let fused = weighted_rrf(
			&lexical(&["a.md#0", "b.md#0"]),
			&semantic(&["a.md#0", "c.md#0"]),
			FusionWeights { lexical: 0.4, semantic: 0.6 },
			60,
		);

		assert_eq!(fused[0].id, "a.md#0");
		assert!(fused.iter().all(|result| result.engine == Engine::Fused));
	}

	#[test]
	fn rrf_is_monotonic_in_lexical_rank() {
		// Moving a chunk up the lexical list never lowers its fused rank.
		let weights = FusionWeights { lexical: 0.5, semantic: 0.5 };
		let semantic_list = semantic(&["x.md#0", "y.md#0", "z.md#0"]);
		let before = weighted_rrf(&lexical(&["y.md#0", "z.md#0", "x.md#0"]), &semantic_list, weights, 60);
		let after = weighted_rrf(&lexical(&["x.md#0", "y.md#0", "z.md#0"]), &semantic_list, weights, 60);
		let rank_of = |list: &[RankedResult], id: &str| {
			list.iter().position(|result| result.id == id).expect("id present")
		};

		assert!(rank_of(&after, "x.md#0") <= rank_of(&before, "x.md#0"));
	}

	#[test]
	fn normalize_clips_into_the_open_interval() {
		let mut results = vec![
			result("a.md#0", 10.0, Engine::Fused),
			result("b.md#0", 5.0, Engine::Fused),
			result("c.md#0", 0.0, Engine::Fused),
		];

		normalize_scores(&mut results);

		assert!((results[0].score - 0.98).abs() < 1e-5);
		assert!((results[2].score - 0.02).abs() < 1e-5);
		assert!(results[1].score > 0.02 && results[1].score < 0.98);
	}

	#[test]
	fn normalize_leaves_constant_scores_clamped() {
		let mut results =
			vec![result("a.md#0", 1.0, Engine::Fused), result("b.md#0", 1.0, Engine::Fused)];

		normalize_scores(&mut results);

		assert_eq!(results[0].score, 0.98);
		assert_eq!(results[1].score, 0.98);
	}

	#[test]
	fn diversity_guarantees_one_chunk_per_document_first() {
		let results = vec![
			result("a.md#0", 0.9, Engine::Fused),
			result("a.md#1", 0.8, Engine::Fused),
			result("a.md#2", 0.7, Engine::Fused),
			result("b.md#0", 0.6, Engine::Fused),
			result("c.md#0", 0.5, Engine::Fused),
		];
		let selected = select_diverse_top_k(results, 3);
		let paths: Vec<&str> = selected.iter().map(|result| chunk_id_path(&result.id)).collect();

		assert_eq!(paths, vec!["a.md", "b.md", "c.md"]);
	}

	#[test]
	fn diversity_fills_remaining_slots_in_score_order() {
		let results = vec![
			result("a.md#0", 0.9, Engine::Fused),
			result("a.md#1", 0.8, Engine::Fused),
			result("b.md#0", 0.7, Engine::Fused),
		];
		let selected = select_diverse_top_k(results, 3);
		let ids: Vec<&str> = selected.iter().map(|result| result.id.as_str()).collect();

		assert_eq!(ids, vec!["a.md#0", "b.md#0", "a.md#1"]);
	}

	#[test]
	fn diversity_is_a_plain_truncation_when_results_fit() {
		let results = vec![result("a.md#0", 0.9, Engine::Fused)];
		let selected = select_diverse_top_k(results.clone(), 5);

		assert_eq!(selected.len(), 1);
		assert_eq!(selected[0].id, results[0].id);
	}
}
