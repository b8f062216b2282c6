use toml::Value;

use sift_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = r#"
[vault]
root = "/data/vault"

[chunking]
max_chars = 4000
overlap = 0

[search]
max_results = 30
semantic_weight = 0.6
candidate_limit = 500
rrf_k = 60

[boosts]
folder_cap = 1.3
graph_cap = 1.15
graph_similarity_threshold = 0.55

[index]
path = "/data/vault/.sift/index.jsonl"
embed_batch_size = 16
requests_per_minute = 60

[providers.embedding]
api_base = "https://api.example.com/v1"
api_key = "test-key"
model = "text-embedding-3-small"
dimensions = 1536

[providers.chat]
api_base = "https://api.example.com/v1"
api_key = "test-key"
model = "gpt-4o-mini"
"#;

fn sample_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::value::Table),
{
	let mut value: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn parse_and_validate(raw: &str) -> Result<(), Error> {
	let cfg: Config = toml::from_str(raw).expect("Failed to parse config.");

	sift_config::validate(&cfg)
}

#[test]
fn sample_config_validates() {
	parse_and_validate(SAMPLE_CONFIG_TOML).expect("Sample config must validate.");
}

#[test]
fn rejects_empty_vault_root() {
	let raw = sample_with(|root| {
		let vault = root.get_mut("vault").and_then(Value::as_table_mut).unwrap();

		vault.insert("root".to_string(), Value::String("  ".to_string()));
	});

	assert!(matches!(parse_and_validate(&raw), Err(Error::Validation { .. })));
}

#[test]
fn rejects_out_of_range_semantic_weight() {
	let raw = sample_with(|root| {
		let search = root.get_mut("search").and_then(Value::as_table_mut).unwrap();

		search.insert("semantic_weight".to_string(), Value::Float(1.5));
	});

	assert!(matches!(parse_and_validate(&raw), Err(Error::Validation { .. })));
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let raw = sample_with(|root| {
		let providers = root.get_mut("providers").and_then(Value::as_table_mut).unwrap();
		let embedding = providers.get_mut("embedding").and_then(Value::as_table_mut).unwrap();

		embedding.insert("dimensions".to_string(), Value::Integer(0));
	});

	assert!(matches!(parse_and_validate(&raw), Err(Error::Validation { .. })));
}

#[test]
fn rejects_overlap_at_or_above_max_chars() {
	let raw = sample_with(|root| {
		let chunking = root.get_mut("chunking").and_then(Value::as_table_mut).unwrap();

		chunking.insert("overlap".to_string(), Value::Integer(4_000));
	});

	assert!(matches!(parse_and_validate(&raw), Err(Error::Validation { .. })));
}

#[test]
fn rejects_candidate_limit_outside_bounds() {
	let raw = sample_with(|root| {
		let search = root.get_mut("search").and_then(Value::as_table_mut).unwrap();

		search.insert("candidate_limit".to_string(), Value::Integer(5));
	});

	assert!(matches!(parse_and_validate(&raw), Err(Error::Validation { .. })));
}

#[test]
fn minimal_config_parses_with_section_defaults() {
	let raw = r#"
[vault]
root = "/data/vault"

[index]
path = "/data/vault/.sift/index.jsonl"

[providers.embedding]
api_base = "https://api.example.com/v1"
api_key = "test-key"
model = "text-embedding-3-small"
dimensions = 1536
"#;
	let cfg: Config = toml::from_str(raw).expect("Failed to parse minimal config.");

	sift_config::validate(&cfg).expect("Minimal config must validate.");

	assert_eq!(cfg.chunking.max_chars, 4_000);
	assert_eq!(cfg.search.max_results, 30);
	assert!((cfg.boosts.folder_cap - 1.3).abs() < 1e-6);
	assert!(cfg.providers.chat.is_none());
}

#[test]
fn defaults_fill_optional_sections() {
	let cfg: Config = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse config.");

	assert_eq!(cfg.search.scan_width, 200);
	assert_eq!(cfg.search.expansion.max_queries, 3);
	assert_eq!(cfg.search.expansion.timeout_ms, 5_000);
	assert_eq!(cfg.index.insert_batch_size, 1_000);
	assert!(!cfg.search.hyde.enabled);
}
