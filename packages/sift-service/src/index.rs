use std::{
	cmp::Ordering,
	collections::{HashMap, HashSet},
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};

use tokio::sync::{Mutex, RwLock, watch};

use sift_storage::{
	models::{Chunk, ChunkRecord, DocumentMeta, chunk_id_path},
	records::RecordStore,
	vault::Vault,
	vector::{VectorEntry, VectorIndex},
};

use crate::{EmbeddingProvider, Error, Result, chunks::ChunkSource, ratelimit::RateLimiter};

const MIN_VARIANT_FANOUT: usize = 100;
const TOP_SCORES_PER_CHUNK: usize = 3;
const SCORE_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
	Unloaded,
	Loading,
	Empty,
	Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexStatus {
	Completed,
	Cancelled,
	Failed,
}

#[derive(Clone, Copy, Debug)]
pub struct IndexSummary {
	pub status: IndexStatus,
	pub chunks: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlState {
	Running,
	Paused,
	Cancelled,
}

/// Host-owned handle for pausing, resuming, and cancelling a running index
/// pass.
pub struct IndexController {
	tx: watch::Sender<ControlState>,
}

impl IndexController {
	pub fn new() -> (Self, IndexControl) {
		let (tx, rx) = watch::channel(ControlState::Running);

		(Self { tx }, IndexControl { rx: Some(rx) })
	}

	pub fn pause(&self) {
		let _ = self.tx.send(ControlState::Paused);
	}

	pub fn resume(&self) {
		let _ = self.tx.send(ControlState::Running);
	}

	pub fn cancel(&self) {
		let _ = self.tx.send(ControlState::Cancelled);
	}
}

/// Cooperative cancellation token threaded through long-running index calls
/// and checked between batches. A pause is an awaited channel change, not a
/// busy poll.
#[derive(Clone)]
pub struct IndexControl {
	rx: Option<watch::Receiver<ControlState>>,
}

impl IndexControl {
	/// A token that never pauses or cancels.
	pub fn unrestricted() -> Self {
		Self { rx: None }
	}

	/// Returns `false` when the pass was cancelled; blocks while paused.
	pub async fn checkpoint(&mut self) -> bool {
		let Some(rx) = self.rx.as_mut() else {
			return true;
		};

		loop {
			let state = *rx.borrow();

			match state {
				ControlState::Running => return true,
				ControlState::Cancelled => return false,
				ControlState::Paused => {
					// Controller dropped while paused: resume rather than hang.
					if rx.changed().await.is_err() {
						return true;
					}
				},
			}
		}
	}
}

/// Coarse progress notifications for a vault index pass.
pub trait ProgressSink
where
	Self: Send + Sync,
{
	fn on_progress(&self, completed: usize, total: usize);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
	fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// The persistent semantic index: chunk embeddings on disk as JSON lines, an
/// in-memory vector store for search, and the full/incremental re-index
/// operations. Explicitly constructed and owned by the host; one instance per
/// vault. Concurrent index passes are not supported and must be serialized by
/// the caller.
pub struct SemanticIndex {
	cfg: Arc<sift_config::Config>,
	vault: Arc<dyn Vault>,
	chunks: Arc<ChunkSource>,
	embedding: Arc<dyn EmbeddingProvider>,
	limiter: Arc<RateLimiter>,
	store: RecordStore,
	state: Mutex<IndexState>,
	vectors: RwLock<VectorIndex>,
}

impl SemanticIndex {
	pub fn new(
		cfg: Arc<sift_config::Config>,
		vault: Arc<dyn Vault>,
		chunks: Arc<ChunkSource>,
		embedding: Arc<dyn EmbeddingProvider>,
	) -> Self {
		let limiter = Arc::new(RateLimiter::new(cfg.index.requests_per_minute));
		let store = RecordStore::new(cfg.index.path.clone());

		Self {
			cfg,
			vault,
			chunks,
			embedding,
			limiter,
			store,
			state: Mutex::new(IndexState::Unloaded),
			vectors: RwLock::new(VectorIndex::new()),
		}
	}

	/// The shared embedding rate limiter; its ceiling can be retuned live.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	pub async fn state(&self) -> IndexState {
		*self.state.lock().await
	}

	pub async fn chunk_count(&self) -> usize {
		self.vectors.read().await.len()
	}

	pub async fn open(&self) {
		self.ensure_loaded().await;
	}

	pub async fn close(&self) {
		let mut state = self.state.lock().await;

		self.vectors.write().await.clear();

		*state = IndexState::Unloaded;
	}

	/// Load the persisted record set into the in-memory vector store, in
	/// fixed-size insert batches. A read failure reads as an empty index.
	pub async fn ensure_loaded(&self) {
		let mut state = self.state.lock().await;

		if matches!(*state, IndexState::Ready | IndexState::Empty) {
			return;
		}

		*state = IndexState::Loading;

		let mut records = self.store.load().await;
		let mut vectors = VectorIndex::new();

		while !records.is_empty() {
			let take = records.len().min(self.cfg.index.insert_batch_size);
			let batch: Vec<ChunkRecord> = records.drain(..take).collect();

			vectors.insert_batch(batch.into_iter().map(record_entry).collect());
		}

		let loaded = vectors.len();

		*self.vectors.write().await = vectors;
		*state = if loaded == 0 { IndexState::Empty } else { IndexState::Ready };

		tracing::debug!(chunks = loaded, "Semantic index loaded.");
	}

	/// Similarity search across the query variants. Each variant embedding
	/// passes through the rate limiter; per-chunk scores aggregate as the
	/// mean of the top hits across variants, min-max normalized. A `Some`
	/// candidate set restricts hits to those documents.
	pub async fn search(
		&self,
		variants: &[String],
		top_k: usize,
		candidates: Option<&HashSet<String>>,
	) -> Vec<(String, f32)> {
		self.ensure_loaded().await;

		if top_k == 0 || variants.is_empty() {
			return Vec::new();
		}

		let vectors = self.vectors.read().await;
		let total = vectors.len();

		if total == 0 {
			return Vec::new();
		}

		let fanout = total.min((top_k * 3).max(MIN_VARIANT_FANOUT));
		let dimensions = self.cfg.providers.embedding.dimensions;
		let mut order: Vec<String> = Vec::new();
		let mut scores: HashMap<String, Vec<f32>> = HashMap::new();

		for variant in variants {
			if variant.trim().is_empty() {
				continue;
			}

			self.limiter.acquire().await;

			let vector = match self
				.embedding
				.embed_query(&self.cfg.providers.embedding, variant)
				.await
			{
				Ok(vector) => vector,
				Err(err) => {
					tracing::warn!(error = %err, "Query embedding failed; skipping variant.");

					continue;
				},
			};

			if vector.len() != dimensions {
				tracing::warn!(
					got = vector.len(),
					expected = dimensions,
					"Query embedding dimension mismatch; skipping variant."
				);

				continue;
			}

			for (id, score) in vectors.search(&vector, fanout) {
				if let Some(candidates) = candidates
					&& !candidates.contains(chunk_id_path(&id))
				{
					continue;
				}
				if !scores.contains_key(&id) {
					order.push(id.clone());
				}

				scores.entry(id).or_default().push(score);
			}
		}

		let mut aggregated: Vec<(String, f32)> = order
			.into_iter()
			.map(|id| {
				let mut list = scores.remove(&id).unwrap_or_default();

				list.sort_by(|lhs, rhs| rhs.partial_cmp(lhs).unwrap_or(Ordering::Equal));
				list.truncate(TOP_SCORES_PER_CHUNK);

				let mean = list.iter().sum::<f32>() / list.len().max(1) as f32;

				(id, mean)
			})
			.collect();

		min_max_normalize(&mut aggregated);

		aggregated.sort_by(|(_, lhs), (_, rhs)| rhs.partial_cmp(lhs).unwrap_or(Ordering::Equal));
		aggregated.truncate(top_k);

		aggregated
	}

	/// Full rebuild: every eligible document is re-chunked and re-embedded.
	/// Each completed embedding batch is appended to the record file before
	/// the next begins, so a failed or cancelled pass leaves valid records.
	pub async fn index_vault(
		&self,
		control: &mut IndexControl,
		progress: &dyn ProgressSink,
	) -> IndexSummary {
		let documents = match self.vault.list_documents().await {
			Ok(documents) => documents,
			Err(err) => {
				tracing::error!(error = %err, "Vault listing failed; aborting full index.");

				return IndexSummary { status: IndexStatus::Failed, chunks: 0 };
			},
		};

		if let Err(err) = self.store.truncate().await {
			tracing::error!(error = %err, "Failed to truncate record store; aborting full index.");

			return IndexSummary { status: IndexStatus::Failed, chunks: 0 };
		}

		let total = documents.len();
		let mut new_vectors = VectorIndex::new();
		let mut indexed = 0_usize;
		let mut status = IndexStatus::Completed;

		progress.on_progress(0, total);

		'documents: for (done, document) in documents.iter().enumerate() {
			if !control.checkpoint().await {
				status = IndexStatus::Cancelled;

				break;
			}

			let chunks = self.chunks.get_chunks(std::slice::from_ref(&document.path)).await;

			for batch in chunks.chunks(self.cfg.index.embed_batch_size) {
				if !control.checkpoint().await {
					status = IndexStatus::Cancelled;

					break 'documents;
				}

				let records = match self.embed_chunk_batch(batch).await {
					Ok(records) => records,
					Err(err) => {
						tracing::error!(
							path = document.path,
							error = %err,
							"Embedding batch failed; aborting full index."
						);

						status = IndexStatus::Failed;

						break 'documents;
					},
				};

				if let Err(err) = self.store.append(&records).await {
					tracing::error!(
						path = document.path,
						error = %err,
						"Record append failed; aborting full index."
					);

					status = IndexStatus::Failed;

					break 'documents;
				}

				indexed += records.len();

				new_vectors.insert_batch(records.into_iter().map(record_entry).collect());
			}

			progress.on_progress(done + 1, total);
		}

		self.install(new_vectors).await;

		tracing::info!(status = ?status, chunks = indexed, "Full index pass finished.");

		IndexSummary { status, chunks: indexed }
	}

	/// Incremental rebuild: diff the vault against the persisted record set.
	/// New documents and documents with a newer mtime are re-embedded,
	/// vanished documents' records are dropped, everything else is kept
	/// verbatim with zero embedding calls. The merged set is written back
	/// whole (last-writer-wins).
	pub async fn index_vault_incremental(
		&self,
		control: &mut IndexControl,
		progress: &dyn ProgressSink,
	) -> IndexSummary {
		let documents = match self.vault.list_documents().await {
			Ok(documents) => documents,
			Err(err) => {
				tracing::error!(error = %err, "Vault listing failed; aborting incremental index.");

				return IndexSummary { status: IndexStatus::Failed, chunks: 0 };
			},
		};
		let existing = self.store.load().await;
		let prior_count = existing.len();
		let mut by_path: HashMap<String, Vec<ChunkRecord>> = HashMap::new();
		let mut recorded_mtime: HashMap<String, i64> = HashMap::new();

		for record in existing {
			let entry = recorded_mtime.entry(record.path.clone()).or_insert(record.mtime);

			*entry = (*entry).max(record.mtime);

			by_path.entry(record.path.clone()).or_default().push(record);
		}

		let current: HashSet<&str> = documents.iter().map(|document| document.path.as_str()).collect();
		let removed = by_path.keys().filter(|path| !current.contains(path.as_str())).count();
		let mut kept: Vec<ChunkRecord> = Vec::new();
		let mut to_embed: Vec<DocumentMeta> = Vec::new();

		for document in &documents {
			match recorded_mtime.get(&document.path) {
				Some(recorded) if document.mtime_ms <= *recorded => {
					kept.extend(by_path.remove(&document.path).unwrap_or_default());
				},
				_ => to_embed.push(document.clone()),
			}
		}

		if to_embed.is_empty() && removed == 0 {
			tracing::debug!(chunks = prior_count, "Incremental index found no changes.");

			return IndexSummary { status: IndexStatus::Completed, chunks: prior_count };
		}

		let total = to_embed.len();
		let mut new_records: Vec<ChunkRecord> = Vec::new();
		let mut status = IndexStatus::Completed;
		let mut unprocessed: Vec<&DocumentMeta> = Vec::new();

		progress.on_progress(0, total);

		'documents: for (done, document) in to_embed.iter().enumerate() {
			if !control.checkpoint().await {
				status = IndexStatus::Cancelled;
				unprocessed = to_embed.iter().skip(done).collect();

				break;
			}

			let chunks = self.chunks.get_chunks(std::slice::from_ref(&document.path)).await;

			for batch in chunks.chunks(self.cfg.index.embed_batch_size) {
				match self.embed_chunk_batch(batch).await {
					Ok(records) => new_records.extend(records),
					Err(err) => {
						tracing::error!(
							path = document.path,
							error = %err,
							"Embedding batch failed; aborting incremental index."
						);

						status = IndexStatus::Failed;

						break 'documents;
					},
				}
			}

			progress.on_progress(done + 1, total);
		}

		if status == IndexStatus::Failed {
			// The record file is untouched; the previous index stays valid.
			return IndexSummary { status, chunks: 0 };
		}

		// A cancelled pass keeps the stale records of documents it never
		// reached rather than dropping them.
		for document in unprocessed {
			kept.extend(by_path.remove(&document.path).unwrap_or_default());
		}

		kept.extend(new_records);

		if let Err(err) = self.store.replace_all(&kept).await {
			tracing::error!(error = %err, "Record write failed; aborting incremental index.");

			return IndexSummary { status: IndexStatus::Failed, chunks: 0 };
		}

		let merged_count = kept.len();
		let mut vectors = VectorIndex::new();
		let mut remaining = kept;

		while !remaining.is_empty() {
			let take = remaining.len().min(self.cfg.index.insert_batch_size);
			let batch: Vec<ChunkRecord> = remaining.drain(..take).collect();

			vectors.insert_batch(batch.into_iter().map(record_entry).collect());
		}

		self.install(vectors).await;

		tracing::info!(
			status = ?status,
			chunks = merged_count,
			re_embedded = total,
			removed,
			"Incremental index pass finished."
		);

		IndexSummary { status, chunks: merged_count }
	}

	/// Replace exactly one document's records. Returns the new chunk count
	/// for that document, `0` on failure (logged, never thrown).
	pub async fn reindex_document(&self, path: &str) -> usize {
		if !sift_domain::notepath::is_valid_note_path(path) {
			tracing::warn!(path, "Refusing to reindex an invalid note path.");

			return 0;
		}

		self.ensure_loaded().await;

		let mut others = self.store.load().await;

		others.retain(|record| record.path != path);

		let chunks = self.chunks.get_chunks(&[path.to_string()]).await;
		let mut new_records: Vec<ChunkRecord> = Vec::new();

		for batch in chunks.chunks(self.cfg.index.embed_batch_size) {
			match self.embed_chunk_batch(batch).await {
				Ok(records) => new_records.extend(records),
				Err(err) => {
					tracing::error!(path, error = %err, "Embedding failed; aborting reindex.");

					return 0;
				},
			}
		}

		let count = new_records.len();
		let entries: Vec<VectorEntry> = new_records.iter().cloned().map(record_entry).collect();

		others.extend(new_records);

		if let Err(err) = self.store.replace_all(&others).await {
			tracing::error!(path, error = %err, "Record write failed; aborting reindex.");

			return 0;
		}

		let mut vectors = self.vectors.write().await;

		vectors.remove_path(path);
		vectors.insert_batch(entries);

		count
	}

	async fn install(&self, vectors: VectorIndex) {
		let mut state = self.state.lock().await;
		let count = vectors.len();

		*self.vectors.write().await = vectors;
		*state = if count == 0 { IndexState::Empty } else { IndexState::Ready };
	}

	async fn embed_chunk_batch(&self, batch: &[Chunk]) -> Result<Vec<ChunkRecord>> {
		if batch.is_empty() {
			return Ok(Vec::new());
		}

		self.limiter.acquire().await;

		let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
		let embeddings =
			self.embedding.embed_documents(&self.cfg.providers.embedding, &texts).await?;

		if embeddings.len() != batch.len() {
			return Err(Error::Provider {
				message: "Embedding provider returned mismatched vector count.".to_string(),
			});
		}

		let dimensions = self.cfg.providers.embedding.dimensions;
		let now = now_ms();
		let mut records = Vec::with_capacity(batch.len());

		for (chunk, embedding) in batch.iter().zip(embeddings.into_iter()) {
			if embedding.len() != dimensions {
				return Err(Error::Provider {
					message: "Embedding vector dimension mismatch.".to_string(),
				});
			}

			records.push(ChunkRecord {
				id: chunk.id.clone(),
				path: chunk.path.clone(),
				title: chunk.title.clone(),
				mtime: chunk.mtime_ms,
				ctime: now,
				embedding,
			});
		}

		Ok(records)
	}
}

fn record_entry(record: ChunkRecord) -> VectorEntry {
	VectorEntry { id: record.id, path: record.path, vector: record.embedding }
}

fn min_max_normalize(scores: &mut [(String, f32)]) {
	if scores.is_empty() {
		return;
	}

	let mut min = f32::MAX;
	let mut max = f32::MIN;

	for (_, score) in scores.iter() {
		min = min.min(*score);
		max = max.max(*score);
	}

	let range = max - min;

	// A near-zero range would amplify noise into hard 0/1 scores.
	if range < SCORE_EPSILON {
		return;
	}

	for (_, score) in scores.iter_mut() {
		*score = (*score - min) / range;
	}
}

fn now_ms() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|duration| duration.as_millis() as i64)
		.unwrap_or(0)
}
