use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub vault: Vault,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub boosts: Boosts,
	pub index: Index,
	pub providers: Providers,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vault {
	pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunking {
	#[serde(default = "default_max_chars")]
	pub max_chars: usize,
	#[serde(default)]
	pub overlap: usize,
	/// Byte budget for the in-memory chunk cache. Documents whose chunks
	/// would push the cache past this are served uncached.
	#[serde(default = "default_max_cache_bytes")]
	pub max_cache_bytes: usize,
}

impl Default for Chunking {
	fn default() -> Self {
		Self { max_chars: default_max_chars(), overlap: 0, max_cache_bytes: default_max_cache_bytes() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	#[serde(default = "default_max_results")]
	pub max_results: usize,
	#[serde(default = "default_semantic_weight")]
	pub semantic_weight: f32,
	#[serde(default = "default_candidate_limit")]
	pub candidate_limit: usize,
	#[serde(default = "default_rrf_k")]
	pub rrf_k: u32,
	/// Per-term document cap for the keyword candidate scan.
	#[serde(default = "default_scan_width")]
	pub scan_width: usize,
	#[serde(default)]
	pub expansion: Expansion,
	#[serde(default)]
	pub hyde: Hyde,
}

impl Default for Search {
	fn default() -> Self {
		Self {
			max_results: default_max_results(),
			semantic_weight: default_semantic_weight(),
			candidate_limit: default_candidate_limit(),
			rrf_k: default_rrf_k(),
			scan_width: default_scan_width(),
			expansion: Expansion::default(),
			hyde: Hyde::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Expansion {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_max_queries")]
	pub max_queries: usize,
	#[serde(default = "default_expansion_timeout_ms")]
	pub timeout_ms: u64,
}

impl Default for Expansion {
	fn default() -> Self {
		Self {
			enabled: true,
			max_queries: default_max_queries(),
			timeout_ms: default_expansion_timeout_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hyde {
	#[serde(default)]
	pub enabled: bool,
}

impl Default for Hyde {
	fn default() -> Self {
		Self { enabled: false }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Boosts {
	#[serde(default = "default_folder_cap")]
	pub folder_cap: f32,
	#[serde(default = "default_graph_cap")]
	pub graph_cap: f32,
	#[serde(default = "default_graph_similarity_threshold")]
	pub graph_similarity_threshold: f32,
}

impl Default for Boosts {
	fn default() -> Self {
		Self {
			folder_cap: default_folder_cap(),
			graph_cap: default_graph_cap(),
			graph_similarity_threshold: default_graph_similarity_threshold(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Index {
	/// JSON-lines record file holding the persistent semantic index.
	pub path: String,
	#[serde(default = "default_embed_batch_size")]
	pub embed_batch_size: usize,
	#[serde(default = "default_insert_batch_size")]
	pub insert_batch_size: usize,
	/// Embedding request ceiling; 0 disables rate limiting.
	#[serde(default = "default_requests_per_minute")]
	pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: Option<ChatProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	pub model: String,
	pub dimensions: usize,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatProviderConfig {
	pub api_base: String,
	pub api_key: String,
	#[serde(default = "default_chat_path")]
	pub path: String,
	pub model: String,
	#[serde(default = "default_temperature")]
	pub temperature: f32,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_max_chars() -> usize {
	4_000
}

fn default_max_cache_bytes() -> usize {
	64 * 1024 * 1024
}

fn default_max_results() -> usize {
	30
}

fn default_semantic_weight() -> f32 {
	0.6
}

fn default_candidate_limit() -> usize {
	500
}

fn default_rrf_k() -> u32 {
	60
}

fn default_scan_width() -> usize {
	200
}

fn default_true() -> bool {
	true
}

fn default_max_queries() -> usize {
	3
}

fn default_expansion_timeout_ms() -> u64 {
	5_000
}

fn default_folder_cap() -> f32 {
	1.3
}

fn default_graph_cap() -> f32 {
	1.15
}

fn default_graph_similarity_threshold() -> f32 {
	0.55
}

fn default_embed_batch_size() -> usize {
	16
}

fn default_insert_batch_size() -> usize {
	1_000
}

fn default_requests_per_minute() -> u32 {
	60
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_chat_path() -> String {
	"/chat/completions".to_string()
}

fn default_temperature() -> f32 {
	0.1
}

fn default_provider_timeout_ms() -> u64 {
	30_000
}
