use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = pricefit_import::Args::parse();

	pricefit_import::run(args).await
}
