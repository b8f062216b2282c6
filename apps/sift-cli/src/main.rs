use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = sift_cli::Args::parse();

	sift_cli::run(args).await
}
