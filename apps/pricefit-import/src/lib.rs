use std::{fs::File, io::Read, path::PathBuf};

use clap::Parser;
use serde::Deserialize;

use pricefit_service::{AddProductRequest, RecommendService};

#[derive(Debug, Parser)]
#[command(
	version = pricefit_cli::VERSION,
	rename_all = "kebab",
	styles = pricefit_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Catalog CSV with `Description`, `Price`, `Category` and optional `Name` columns.
	#[arg(value_name = "CSV")]
	pub input: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
	#[serde(rename = "Name", default)]
	name: Option<String>,
	#[serde(rename = "Description")]
	description: String,
	#[serde(rename = "Price")]
	price: String,
	#[serde(rename = "Category", default)]
	category: Option<String>,
}

#[derive(Debug, Default)]
pub struct ParsedCatalog {
	pub products: Vec<AddProductRequest>,
	pub skipped: usize,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = pricefit_config::load(&args.config)?;

	pricefit_cli::init_tracing(&config.service.log_level);

	let parsed = read_catalog(File::open(&args.input)?)?;

	tracing::info!(
		path = %args.input.display(),
		rows = parsed.products.len(),
		skipped = parsed.skipped,
		"Catalog file parsed."
	);

	let service = RecommendService::connect(config).await?;
	let report = service.add_products(parsed.products).await?;

	tracing::info!(
		imported = report.imported,
		batches = report.batches,
		skipped = parsed.skipped,
		"Catalog import finished."
	);

	Ok(())
}

/// Rows whose price does not parse as a finite, non-negative number are skipped. A blank or
/// missing `Name` falls back to the description.
pub fn read_catalog<R>(reader: R) -> color_eyre::Result<ParsedCatalog>
where
	R: Read,
{
	let mut csv_reader = csv::Reader::from_reader(reader);
	let mut parsed = ParsedCatalog::default();

	for (line, record) in csv_reader.deserialize::<CatalogRow>().enumerate() {
		let row = record?;
		let description = row.description.trim().to_string();
		let price = row.price.trim().parse::<f64>().ok().filter(|p| p.is_finite() && *p >= 0.0);
		let Some(price) = price.filter(|_| !description.is_empty()) else {
			tracing::warn!(row = line + 1, price = %row.price, "Skipping catalog row.");

			parsed.skipped += 1;

			continue;
		};
		let name = row
			.name
			.map(|name| name.trim().to_string())
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| description.clone());

		let category = row.category;

		parsed.products.push(AddProductRequest { name, description, price, category });
	}

	Ok(parsed)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_rows_and_skips_bad_prices() {
		let data = "\
Description,Price,Category
Waterproof bluetooth speaker,59.99,Electronics
Broken lamp,n/a,Home
Garden hose,-4,Garden
Flexible garden hose,35,Garden
";
		let parsed = read_catalog(data.as_bytes()).expect("parse");

		assert_eq!(parsed.skipped, 2);
		assert_eq!(parsed.products.len(), 2);
		assert_eq!(parsed.products[0].name, "Waterproof bluetooth speaker");
		assert_eq!(parsed.products[0].price, 59.99);
		assert_eq!(parsed.products[1].category.as_deref(), Some("Garden"));
	}

	#[test]
	fn uses_name_column_when_present() {
		let data = "\
Name,Description,Price,Category
Speaker,Waterproof bluetooth speaker,59,Electronics
,Mechanical keyboard,99,Electronics
";
		let parsed = read_catalog(data.as_bytes()).expect("parse");

		assert_eq!(parsed.skipped, 0);
		assert_eq!(parsed.products[0].name, "Speaker");
		assert_eq!(parsed.products[1].name, "Mechanical keyboard");
	}

	#[test]
	fn missing_required_column_is_an_error() {
		let data = "Name,Price\nSpeaker,59\n";

		assert!(read_catalog(data.as_bytes()).is_err());
	}
}
