pub mod chunks;
pub mod index;
pub mod ratelimit;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use index::{
	IndexControl, IndexController, IndexState, IndexStatus, IndexSummary, NoopProgress,
	ProgressSink, SemanticIndex,
};
pub use search::{Engine, Expansion, RankedResult, SearchOptions, SemanticMode};

use std::sync::Arc;

use sift_config::{ChatProviderConfig, Config, EmbeddingProviderConfig};
use sift_storage::{BoxFuture, vault::Vault};

use crate::chunks::ChunkSource;

/// Embedding provider seam; the default implementation calls the configured
/// HTTP endpoint.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed_documents<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<Vec<f32>>>>;

	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>>;
}

/// Chat model seam, used only for query paraphrases and hypothetical answer
/// passages. Optional: without it the expander stays heuristic.
pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		messages: &'a [serde_json::Value],
	) -> BoxFuture<'a, sift_providers::Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Option<Arc<dyn ChatProvider>>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed_documents<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(sift_providers::embedding::embed_documents(cfg, texts))
	}

	fn embed_query<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>> {
		Box::pin(sift_providers::embedding::embed_query(cfg, text))
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		messages: &'a [serde_json::Value],
	) -> BoxFuture<'a, sift_providers::Result<String>> {
		Box::pin(sift_providers::chat::complete(cfg, messages))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Option<Arc<dyn ChatProvider>>) -> Self {
		Self { embedding, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), chat: Some(provider) }
	}
}

/// The retrieval engine for one vault: chunk cache, semantic index, and the
/// `retrieve` entry point. Explicitly constructed and dependency-injected;
/// the host owns its lifecycle through `open` and `close`.
pub struct SiftService {
	pub cfg: Arc<Config>,
	vault: Arc<dyn Vault>,
	providers: Providers,
	chunks: Arc<ChunkSource>,
	index: Arc<SemanticIndex>,
}

impl SiftService {
	pub fn new(cfg: Config, vault: Arc<dyn Vault>) -> Self {
		Self::with_providers(cfg, vault, Providers::default())
	}

	pub fn with_providers(cfg: Config, vault: Arc<dyn Vault>, providers: Providers) -> Self {
		let cfg = Arc::new(cfg);
		let chunks = Arc::new(ChunkSource::new(vault.clone(), &cfg.chunking));
		let index = Arc::new(SemanticIndex::new(
			cfg.clone(),
			vault.clone(),
			chunks.clone(),
			providers.embedding.clone(),
		));

		Self { cfg, vault, providers, chunks, index }
	}

	/// The semantic index manager: indexing entry points, rate limiter, and
	/// candidate-scoped search.
	pub fn index(&self) -> &Arc<SemanticIndex> {
		&self.index
	}

	/// The chunk cache. Owned here; the vault stays the source of truth.
	pub fn chunk_source(&self) -> &Arc<ChunkSource> {
		&self.chunks
	}

	pub async fn open(&self) {
		self.index.open().await;
	}

	pub async fn close(&self) {
		self.index.close().await;
		self.chunks.clear();
	}
}
