use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_LOG_LEVEL: &str = "info";

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default() | Effects::BOLD)
		.usage(AnsiColor::Green.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Yellow.on_default())
}

/// Installs the global fmt subscriber. An unparsable `log_level` directive falls back to `info`.
pub fn init_tracing(log_level: &str) {
	tracing_subscriber::fmt().with_env_filter(log_filter(log_level)).init();
}

fn log_filter(log_level: &str) -> EnvFilter {
	EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL))
}
