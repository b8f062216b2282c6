use std::{path::PathBuf, sync::Arc};

use clap::{
	Parser, Subcommand,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use tracing_subscriber::EnvFilter;

use sift_service::{
	IndexControl, IndexController, IndexStatus, IndexSummary, ProgressSink, SearchOptions,
	SemanticMode, SiftService,
};
use sift_storage::vault::FsVault;

fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Red.on_default() | Effects::BOLD)
		.usage(AnsiColor::Red.on_default() | Effects::BOLD)
		.literal(AnsiColor::Blue.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab", styles = styles())]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE", default_value = "sift.toml")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Rebuild the semantic index from scratch.
	Index,
	/// Update the semantic index incrementally.
	Reindex,
	/// Run a hybrid retrieval query.
	Search {
		query: String,
		#[arg(long)]
		limit: Option<usize>,
		#[arg(long)]
		semantic_weight: Option<f32>,
		/// Let semantic search roam the whole index instead of the
		/// candidate set.
		#[arg(long)]
		full_vault: bool,
	},
	/// Show index state and chunk counts.
	Status,
}

struct LogProgress;

impl ProgressSink for LogProgress {
	fn on_progress(&self, completed: usize, total: usize) {
		tracing::info!(completed, total, "Indexing progress.");
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = sift_config::load(&args.config)?;

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let vault = Arc::new(FsVault::new(cfg.vault.root.clone()));
	let service = SiftService::new(cfg, vault);

	match args.command {
		Command::Index => {
			let mut control = cancel_on_ctrl_c();
			let summary = service.index().index_vault(&mut control, &LogProgress).await;

			report_summary("full index", summary);
		},
		Command::Reindex => {
			let mut control = cancel_on_ctrl_c();
			let summary =
				service.index().index_vault_incremental(&mut control, &LogProgress).await;

			report_summary("incremental index", summary);
		},
		Command::Search { query, limit, semantic_weight, full_vault } => {
			service.open().await;

			let mut options = SearchOptions::from_config(&service.cfg);

			if let Some(limit) = limit {
				options.max_results = limit;
			}
			if let Some(weight) = semantic_weight {
				options.semantic_weight = weight;
			}
			if full_vault {
				options.semantic_mode = SemanticMode::FullVault;
			}

			let results = service.retrieve(&query, options).await;

			if results.is_empty() {
				println!("No results.");
			}

			for (rank, result) in results.iter().enumerate() {
				println!(
					"{:>3}. {:.3}  [{}]  {}",
					rank + 1,
					result.score,
					engine_label(result.engine),
					result.id,
				);

				if let Some(explanation) = &result.explanation {
					println!("      {explanation}");
				}
			}
		},
		Command::Status => {
			service.open().await;

			println!("state:  {:?}", service.index().state().await);
			println!("chunks: {}", service.index().chunk_count().await);
			println!("rpm:    {}", service.index().limiter().rpm());
		},
	}

	Ok(())
}

fn cancel_on_ctrl_c() -> IndexControl {
	let (controller, control) = IndexController::new();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Cancellation requested; stopping after the current batch.");
			controller.cancel();
		}

		// Keep the controller alive so a paused pass is never orphaned.
		std::future::pending::<()>().await;
	});

	control
}

fn report_summary(label: &str, summary: IndexSummary) {
	match summary.status {
		IndexStatus::Completed => {
			println!("{label}: completed, {} chunks indexed", summary.chunks);
		},
		IndexStatus::Cancelled => {
			println!("{label}: cancelled, {} chunks indexed", summary.chunks);
		},
		IndexStatus::Failed => {
			println!("{label}: failed, see logs");
		},
	}
}

fn engine_label(engine: sift_service::Engine) -> &'static str {
	match engine {
		sift_service::Engine::Lexical => "lexical",
		sift_service::Engine::Semantic => "semantic",
		sift_service::Engine::Fused => "fused",
		sift_service::Engine::Grep => "grep",
	}
}
