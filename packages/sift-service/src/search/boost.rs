use std::collections::{HashMap, HashSet};

use sift_domain::notepath;
use sift_storage::{models::chunk_id_path, vault::Vault};

use crate::search::RankedResult;

const FOLDER_MIN_HITS: usize = 3;
const FOLDER_BOOST_SLOPE: f32 = 0.1;
const GRAPH_BOOST_PER_LINK: f32 = 0.05;

/// Folder cohesion: a document whose parent folder holds at least two other
/// hit documents gets a multiplicative boost growing logarithmically with the
/// folder's hit count, capped.
pub fn apply_folder_boost(results: &mut [RankedResult], cap: f32) {
	let mut folder_documents: HashMap<&str, HashSet<&str>> = HashMap::new();

	for result in results.iter() {
		let path = chunk_id_path(&result.id);

		folder_documents.entry(notepath::parent_folder(path)).or_default().insert(path);
	}

	let multipliers: HashMap<String, f32> = folder_documents
		.into_iter()
		.filter(|(_, documents)| documents.len() >= FOLDER_MIN_HITS)
		.map(|(folder, documents)| {
			let multiplier =
				(1.0 + FOLDER_BOOST_SLOPE * (documents.len() as f32).ln()).min(cap);

			(folder.to_string(), multiplier)
		})
		.collect();

	if multipliers.is_empty() {
		return;
	}

	for result in results.iter_mut() {
		let folder = notepath::parent_folder(chunk_id_path(&result.id));

		if let Some(multiplier) = multipliers.get(folder) {
			result.score *= multiplier;
		}
	}
}

/// Link-graph cohesion: a result already above the similarity threshold that
/// is link-connected to other above-threshold results in the same set gets a
/// bounded boost. Rewards topical clusters, not link spam: low-scoring
/// results are never boosted, and vault errors degrade to no boost.
pub async fn apply_graph_boost(
	results: &mut [RankedResult],
	vault: &dyn Vault,
	threshold: f32,
	cap: f32,
) {
	// Pre-boost snapshot: boosts must not feed back into eligibility.
	let mut best_by_path: HashMap<&str, f32> = HashMap::new();

	for result in results.iter() {
		let entry = best_by_path.entry(chunk_id_path(&result.id)).or_insert(result.score);

		*entry = entry.max(result.score);
	}

	let eligible: HashSet<String> = best_by_path
		.iter()
		.filter(|(_, score)| **score > threshold)
		.map(|(path, _)| path.to_string())
		.collect();

	if eligible.len() < 2 {
		return;
	}

	let mut multipliers: HashMap<String, f32> = HashMap::new();

	for path in &eligible {
		let mut connected: HashSet<String> = HashSet::new();

		if let Ok(links) = vault.outgoing_links(path).await {
			connected.extend(links);
		}
		if let Ok(links) = vault.backlinks(path).await {
			connected.extend(links);
		}

		let cluster_links =
			connected.iter().filter(|link| *link != path && eligible.contains(*link)).count();

		if cluster_links > 0 {
			multipliers.insert(
				path.clone(),
				(1.0 + GRAPH_BOOST_PER_LINK * cluster_links as f32).min(cap),
			);
		}
	}

	for result in results.iter_mut() {
		if let Some(multiplier) = multipliers.get(chunk_id_path(&result.id)) {
			result.score *= multiplier;
		}
	}
}
