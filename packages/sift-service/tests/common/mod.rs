#![allow(dead_code)]

use std::{
	hash::{DefaultHasher, Hash, Hasher},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use sift_config::{ChatProviderConfig, Config, EmbeddingProviderConfig};
use sift_service::{ChatProvider, EmbeddingProvider, Providers, SiftService};
use sift_storage::BoxFuture;
use sift_testkit::TempVault;

pub const STUB_DIMENSIONS: usize = 32;

/// Deterministic bag-of-words embedding: tokens hash into buckets, so cosine
/// similarity tracks token overlap without any network.
pub struct StubEmbedding;

fn stub_vector(text: &str) -> Vec<f32> {
	let mut vector = vec![0.0_f32; STUB_DIMENSIONS];

	for token in text.split(|ch: char| !ch.is_alphanumeric()).filter(|token| !token.is_empty()) {
		let mut hasher = DefaultHasher::new();

		token.to_lowercase().hash(&mut hasher);

		vector[(hasher.finish() % STUB_DIMENSIONS as u64) as usize] += 1.0;
	}

	vector
}

impl EmbeddingProvider for StubEmbedding {
	fn embed_documents<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(texts.iter().map(|text| stub_vector(text)).collect()) })
	}

	fn embed_query<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>> {
		Box::pin(async move { Ok(stub_vector(text)) })
	}
}

/// Counts batch embedding calls on top of the stub, for zero-call assertions.
pub struct CountingEmbedding {
	pub calls: Arc<AtomicUsize>,
}

impl EmbeddingProvider for CountingEmbedding {
	fn embed_documents<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move { Ok(texts.iter().map(|text| stub_vector(text)).collect()) })
	}

	fn embed_query<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>> {
		Box::pin(async move { Ok(stub_vector(text)) })
	}
}

/// Always fails, for degradation tests.
pub struct FailingEmbedding;

impl EmbeddingProvider for FailingEmbedding {
	fn embed_documents<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, sift_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			Err(sift_providers::Error::InvalidResponse {
				message: "Stub embedding outage.".to_string(),
			})
		})
	}

	fn embed_query<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, sift_providers::Result<Vec<f32>>> {
		Box::pin(async move {
			Err(sift_providers::Error::InvalidResponse {
				message: "Stub embedding outage.".to_string(),
			})
		})
	}
}

/// Returns a fixed expansion payload.
pub struct StubChat {
	pub payload: String,
}

impl ChatProvider for StubChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a ChatProviderConfig,
		_messages: &'a [serde_json::Value],
	) -> BoxFuture<'a, sift_providers::Result<String>> {
		Box::pin(async move { Ok(self.payload.clone()) })
	}
}

/// Never answers inside any reasonable timeout.
pub struct SlowChat;

impl ChatProvider for SlowChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a ChatProviderConfig,
		_messages: &'a [serde_json::Value],
	) -> BoxFuture<'a, sift_providers::Result<String>> {
		Box::pin(async move {
			tokio::time::sleep(std::time::Duration::from_secs(600)).await;

			Ok(String::new())
		})
	}
}

pub fn test_config(vault: &TempVault) -> Config {
	let raw = format!(
		r#"
[vault]
root = "{root}"

[chunking]
max_chars = 400
overlap = 0

[search]
max_results = 10
semantic_weight = 0.6
candidate_limit = 100
rrf_k = 60

[index]
path = "{index}"
embed_batch_size = 16
requests_per_minute = 0

[providers.embedding]
api_base = "http://127.0.0.1:0"
api_key = "test-key"
model = "stub"
dimensions = {dimensions}
"#,
		root = vault.root().display(),
		index = vault.index_path().display(),
		dimensions = STUB_DIMENSIONS,
	);
	let cfg: Config = toml::from_str(&raw).expect("Failed to parse test config.");

	sift_config::validate(&cfg).expect("Test config must validate.");

	cfg
}

pub fn build_service(vault: &TempVault, embedding: Arc<dyn EmbeddingProvider>) -> SiftService {
	let cfg = test_config(vault);
	let providers = Providers::new(embedding, None);

	SiftService::with_providers(cfg, Arc::new(vault.vault()), providers)
}

pub fn build_service_with_chat(
	vault: &TempVault,
	embedding: Arc<dyn EmbeddingProvider>,
	chat: Arc<dyn ChatProvider>,
	timeout_ms: u64,
) -> SiftService {
	let mut cfg = test_config(vault);

	cfg.search.expansion.timeout_ms = timeout_ms;
	cfg.providers.chat = Some(ChatProviderConfig {
		api_base: "http://127.0.0.1:0".to_string(),
		api_key: "test-key".to_string(),
		path: "/chat/completions".to_string(),
		model: "stub".to_string(),
		temperature: 0.1,
		timeout_ms: 30_000,
		default_headers: serde_json::Map::new(),
	});

	SiftService::with_providers(cfg, Arc::new(vault.vault()), Providers::new(embedding, Some(chat)))
}
