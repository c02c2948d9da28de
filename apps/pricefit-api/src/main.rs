use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pricefit_api::Args::parse();

	pricefit_api::run(args).await
}
