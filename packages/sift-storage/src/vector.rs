use std::cmp::Ordering;

/// Input to a batch insert.
#[derive(Clone, Debug)]
pub struct VectorEntry {
	pub id: String,
	pub path: String,
	pub vector: Vec<f32>,
}

struct StoredEntry {
	id: String,
	path: String,
	vector: Vec<f32>,
	norm: f32,
}

/// In-memory cosine-similarity store backing semantic search. Insertions
/// happen in caller-sized batches to bound peak allocation while loading a
/// large record file.
#[derive(Default)]
pub struct VectorIndex {
	entries: Vec<StoredEntry>,
}

impl VectorIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn insert_batch(&mut self, batch: Vec<VectorEntry>) {
		self.entries.reserve(batch.len());

		for entry in batch {
			let norm = norm(&entry.vector);

			if norm <= f32::EPSILON {
				tracing::warn!(id = %entry.id, "Skipping zero-norm embedding vector.");

				continue;
			}

			self.entries.push(StoredEntry {
				id: entry.id,
				path: entry.path,
				vector: entry.vector,
				norm,
			});
		}
	}

	pub fn remove_path(&mut self, path: &str) {
		self.entries.retain(|entry| entry.path != path);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Top-k entries by cosine similarity, descending, ties broken by
	/// insertion order.
	pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
		let query_norm = norm(query);

		if k == 0 || query_norm <= f32::EPSILON {
			return Vec::new();
		}

		let mut scored: Vec<(usize, f32)> = Vec::with_capacity(self.entries.len());

		for (idx, entry) in self.entries.iter().enumerate() {
			if entry.vector.len() != query.len() {
				continue;
			}

			let dot: f32 =
				entry.vector.iter().zip(query.iter()).map(|(lhs, rhs)| lhs * rhs).sum();

			scored.push((idx, dot / (entry.norm * query_norm)));
		}

		scored.sort_by(|(_, lhs), (_, rhs)| rhs.partial_cmp(lhs).unwrap_or(Ordering::Equal));
		scored.truncate(k);

		scored
			.into_iter()
			.map(|(idx, score)| (self.entries[idx].id.clone(), score))
			.collect()
	}
}

fn norm(vector: &[f32]) -> f32 {
	vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}
