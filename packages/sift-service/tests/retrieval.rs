mod common;

use std::sync::Arc;

use sift_service::{Engine, SearchOptions, SemanticMode};
use sift_storage::models::chunk_id_path;
use sift_testkit::TempVault;

use common::{
	FailingEmbedding, SlowChat, StubChat, StubEmbedding, build_service, build_service_with_chat,
};

fn seeded_vault() -> TempVault {
	let vault = TempVault::new().expect("Failed to create temp vault.");

	vault
		.note(
			"projects/retrieval.md",
			"# Retrieval engine\nHybrid retrieval fuses lexical and semantic scores.\nSee [[projects/ranking]] for the fusion details.",
		)
		.expect("Failed to write note.");
	vault
		.note(
			"projects/ranking.md",
			"# Ranking\nReciprocal rank fusion combines ranked retrieval lists.\nBack to [[projects/retrieval]].",
		)
		.expect("Failed to write note.");
	vault
		.note("garden.md", "# Garden\nCompost, seedlings, and watering schedules.")
		.expect("Failed to write note.");

	vault
}

#[tokio::test]
async fn retrieve_ranks_relevant_chunks_first() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(StubEmbedding));
	let mut control = sift_service::IndexControl::unrestricted();

	service.index().index_vault(&mut control, &sift_service::NoopProgress).await;

	let results = service.retrieve("hybrid retrieval scores", SearchOptions::default()).await;

	assert!(!results.is_empty());
	assert_eq!(chunk_id_path(&results[0].id), "projects/retrieval.md");
	assert!(results.iter().all(|result| result.engine == Engine::Fused));
	assert!(results.iter().all(|result| (0.02..=0.98).contains(&result.score)));
}

#[tokio::test]
async fn full_semantic_weight_returns_raw_semantic_results() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(StubEmbedding));
	let mut control = sift_service::IndexControl::unrestricted();

	service.index().index_vault(&mut control, &sift_service::NoopProgress).await;

	let options = SearchOptions { semantic_weight: 1.0, ..SearchOptions::default() };
	let results = service.retrieve("retrieval fusion", options).await;

	assert!(!results.is_empty());
	assert!(results.iter().all(|result| result.engine == Engine::Semantic));
}

#[tokio::test]
async fn zero_semantic_weight_returns_raw_lexical_results() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(StubEmbedding));

	let options = SearchOptions { semantic_weight: 0.0, ..SearchOptions::default() };
	let results = service.retrieve("retrieval fusion", options).await;

	assert!(!results.is_empty());
	assert!(results.iter().all(|result| result.engine == Engine::Lexical));
}

#[tokio::test]
async fn candidate_scoped_semantic_stays_inside_the_candidate_set() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(StubEmbedding));
	let mut control = sift_service::IndexControl::unrestricted();

	service.index().index_vault(&mut control, &sift_service::NoopProgress).await;

	// The note vanishes from the vault but its records stay in the index:
	// only full-vault search may still surface it.
	vault.remove("garden.md").expect("Failed to remove note.");

	let scoped = service
		.retrieve(
			"compost seedlings watering",
			SearchOptions { semantic_mode: SemanticMode::CandidateScoped, ..SearchOptions::default() },
		)
		.await;

	assert!(scoped.iter().all(|result| chunk_id_path(&result.id) != "garden.md"));

	let unrestricted = service
		.retrieve(
			"compost seedlings watering",
			SearchOptions { semantic_mode: SemanticMode::FullVault, ..SearchOptions::default() },
		)
		.await;

	assert!(unrestricted.iter().any(|result| chunk_id_path(&result.id) == "garden.md"));
}

#[tokio::test]
async fn hashtag_queries_reach_tagged_notes() {
	let vault = TempVault::new().expect("Failed to create temp vault.");

	vault
		.note("alpha-status.md", "#project/alpha weekly status and blockers")
		.expect("Failed to write note.");
	vault.note("noise.md", "unrelated meeting minutes").expect("Failed to write note.");

	let service = build_service(&vault, Arc::new(StubEmbedding));
	let results = service.retrieve("#Project/Alpha update", SearchOptions::default()).await;

	assert!(!results.is_empty());
	assert_eq!(chunk_id_path(&results[0].id), "alpha-status.md");
}

#[tokio::test]
async fn llm_paraphrases_extend_the_recall_queries() {
	let vault = TempVault::new().expect("Failed to create temp vault.");

	// Only the paraphrase's words appear in the note.
	vault
		.note("meetings/standup.md", "standup meeting notes and agenda items")
		.expect("Failed to write note.");

	let chat = StubChat {
		payload: r#"{"queries": ["standup meeting notes"], "terms": ["standup"]}"#.to_string(),
	};
	let service =
		build_service_with_chat(&vault, Arc::new(StubEmbedding), Arc::new(chat), 5_000);
	let results = service.retrieve("weekly sync", SearchOptions::default()).await;

	assert!(!results.is_empty());
	assert_eq!(chunk_id_path(&results[0].id), "meetings/standup.md");
}

#[tokio::test]
async fn slow_chat_model_falls_back_to_heuristic_expansion() {
	let vault = seeded_vault();
	let service =
		build_service_with_chat(&vault, Arc::new(StubEmbedding), Arc::new(SlowChat), 50);
	let results = service.retrieve("hybrid retrieval scores", SearchOptions::default()).await;

	assert!(!results.is_empty());
	assert_eq!(chunk_id_path(&results[0].id), "projects/retrieval.md");
}

#[tokio::test]
async fn broken_embedding_degrades_to_lexical_results() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(FailingEmbedding));

	let results = service.retrieve("retrieval fusion", SearchOptions::default()).await;

	assert!(!results.is_empty());
	assert!(results.iter().all(|result| result.engine == Engine::Lexical));
}

#[tokio::test]
async fn empty_queries_return_nothing() {
	let vault = seeded_vault();
	let service = build_service(&vault, Arc::new(StubEmbedding));

	assert!(service.retrieve("   ", SearchOptions::default()).await.is_empty());
}

#[tokio::test]
async fn diversity_spreads_results_across_documents() {
	let vault = TempVault::new().expect("Failed to create temp vault.");
	// Long notes split into several chunks each, all mentioning the query
	// term, so a pure score ordering would let one note dominate.
	let filler = "shared keyword sift appears here. ".repeat(8);

	for name in ["one.md", "two.md", "three.md"] {
		let text = format!("# A\n{filler}\n# B\n{filler}");

		vault.note(name, &text).expect("Failed to write note.");
	}

	let service = build_service(&vault, Arc::new(StubEmbedding));
	let options = SearchOptions { max_results: 3, semantic_weight: 0.0, ..SearchOptions::default() };
	let results = service.retrieve("shared keyword sift", options).await;

	assert_eq!(results.len(), 3);

	let distinct: std::collections::HashSet<&str> =
		results.iter().map(|result| chunk_id_path(&result.id)).collect();

	assert_eq!(distinct.len(), 3);
}
