use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use sift_chunking::{ChunkingConfig, HeadingMark};
use sift_domain::notepath;
use sift_storage::{
	models::{Chunk, chunk_id},
	vault::Vault,
};

/// Per-call chunking options; cache entries are keyed by them alongside the
/// document path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkOptions {
	pub max_chars: usize,
	pub overlap: usize,
}

struct CachedDocument {
	mtime_ms: i64,
	bytes: usize,
	chunks: Vec<Chunk>,
}

struct Cache {
	map: HashMap<(String, ChunkOptions), CachedDocument>,
	bytes: usize,
}

/// Vault-aware chunk provider. Chunks are a pure function of document state;
/// the cache is invalidated by modification time and bounded by a byte
/// budget. The vault remains the source of truth. An over-budget document is
/// chunked and returned, just not retained.
pub struct ChunkSource {
	vault: Arc<dyn Vault>,
	defaults: ChunkOptions,
	max_cache_bytes: usize,
	cache: Mutex<Cache>,
}

impl ChunkSource {
	pub fn new(vault: Arc<dyn Vault>, cfg: &sift_config::Chunking) -> Self {
		Self {
			vault,
			defaults: ChunkOptions { max_chars: cfg.max_chars, overlap: cfg.overlap },
			max_cache_bytes: cfg.max_cache_bytes,
			cache: Mutex::new(Cache { map: HashMap::new(), bytes: 0 }),
		}
	}

	pub async fn get_chunks(&self, paths: &[String]) -> Vec<Chunk> {
		self.get_chunks_with(paths, self.defaults).await
	}

	pub async fn get_chunks_with(&self, paths: &[String], options: ChunkOptions) -> Vec<Chunk> {
		let mtimes = self.document_mtimes().await;
		let mut out = Vec::new();

		for path in paths {
			// Malformed paths are filtered, not errors.
			if !notepath::is_valid_note_path(path) {
				continue;
			}

			let mtime_ms = mtimes.get(path.as_str()).copied().unwrap_or(0);

			if let Some(chunks) = self.cached(path, options, mtime_ms) {
				out.extend(chunks);

				continue;
			}

			let chunks = self.chunk_document(path, options, mtime_ms).await;

			self.retain(path, options, mtime_ms, &chunks);

			out.extend(chunks);
		}

		out
	}

	/// Drop every cached document, e.g. under memory pressure.
	pub fn clear(&self) {
		let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());

		cache.map.clear();
		cache.bytes = 0;
	}

	/// Evict one document, e.g. after it was deleted from the vault.
	pub fn evict(&self, path: &str) {
		let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
		let keys: Vec<(String, ChunkOptions)> =
			cache.map.keys().filter(|(cached, _)| cached == path).cloned().collect();

		for key in keys {
			if let Some(entry) = cache.map.remove(&key) {
				cache.bytes = cache.bytes.saturating_sub(entry.bytes);
			}
		}
	}

	async fn document_mtimes(&self) -> HashMap<String, i64> {
		match self.vault.list_documents().await {
			Ok(documents) => {
				documents.into_iter().map(|document| (document.path, document.mtime_ms)).collect()
			},
			Err(err) => {
				tracing::warn!(error = %err, "Failed to list vault documents for chunking.");

				HashMap::new()
			},
		}
	}

	fn cached(&self, path: &str, options: ChunkOptions, mtime_ms: i64) -> Option<Vec<Chunk>> {
		let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());
		let key = (path.to_string(), options);
		let entry = cache.map.get(&key)?;

		if mtime_ms > entry.mtime_ms {
			if let Some(stale) = cache.map.remove(&key) {
				cache.bytes = cache.bytes.saturating_sub(stale.bytes);
			}

			return None;
		}

		Some(entry.chunks.clone())
	}

	async fn chunk_document(&self, path: &str, options: ChunkOptions, mtime_ms: i64) -> Vec<Chunk> {
		// Unreadable or empty documents yield no chunks, not an error.
		let text = match self.vault.read_document(path).await {
			Ok(text) => text,
			Err(err) => {
				tracing::debug!(path, error = %err, "Skipping unreadable document.");

				return Vec::new();
			},
		};
		let headings = match self.vault.headings(path).await {
			Ok(headings) => headings,
			Err(_) => Vec::new(),
		};
		let marks: Vec<HeadingMark> = headings
			.into_iter()
			.map(|heading| HeadingMark { offset: heading.offset, text: heading.text })
			.collect();
		let title = notepath::note_title(path).to_string();
		let cfg = ChunkingConfig { max_chars: options.max_chars, overlap: options.overlap };

		sift_chunking::split_note(&title, &text, &marks, &cfg)
			.into_iter()
			.map(|fragment| Chunk {
				id: chunk_id(path, fragment.chunk_index),
				path: path.to_string(),
				chunk_index: fragment.chunk_index,
				content: fragment.text,
				content_hash: fragment.content_hash,
				title: title.clone(),
				heading: fragment.heading,
				mtime_ms,
			})
			.collect()
	}

	fn retain(&self, path: &str, options: ChunkOptions, mtime_ms: i64, chunks: &[Chunk]) {
		if chunks.is_empty() {
			return;
		}

		let bytes: usize = chunks.iter().map(|chunk| chunk.content.len()).sum();
		let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());

		if cache.bytes + bytes > self.max_cache_bytes {
			tracing::debug!(path, bytes, "Chunk cache budget exceeded; serving uncached.");

			return;
		}

		cache.bytes += bytes;
		cache.map.insert(
			(path.to_string(), options),
			CachedDocument { mtime_ms, bytes, chunks: chunks.to_vec() },
		);
	}
}
