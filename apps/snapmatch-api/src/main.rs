use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = snapmatch_api::Args::parse();

	snapmatch_api::run(args).await
}
