// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_maintenance_config::{ExporterConfig, LogFormat};
use tracing::Subscriber;
use tracing_subscriber::{
	fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const FALLBACK_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(level: &str) -> EnvFilter {
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(level))
		.unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Text subscriber used before the configuration is known.
pub fn bootstrap_subscriber<W>(filter: EnvFilter, make_writer: W) -> impl Subscriber + Send + Sync
where
	W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_file(true)
		.with_line_number(true)
		.with_writer(make_writer)
		.finish()
}

/// Run `f` with a stdout bootstrap subscriber as the thread default.
///
/// Config loading logs before [`init_tracing`] can be called.
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
	let subscriber = bootstrap_subscriber(env_filter(FALLBACK_FILTER), std::io::stdout);
	tracing::subscriber::with_default(subscriber, f)
}

/// Install the global subscriber in the configured format.
///
/// Every event carries its source file and line. Installing twice is reported on stderr and
/// otherwise ignored.
pub fn init_tracing(config: &ExporterConfig) {
	let (json, text) = match config.log_format {
		LogFormat::Json => (
			Some(
				tracing_subscriber::fmt::layer()
					.json()
					.with_file(true)
					.with_line_number(true),
			),
			None,
		),
		LogFormat::Text => (
			None,
			Some(
				tracing_subscriber::fmt::layer()
					.with_file(true)
					.with_line_number(true),
			),
		),
	};

	if let Err(e) = tracing_subscriber::registry()
		.with(env_filter(&config.log_level))
		.with(json)
		.with(text)
		.try_init()
	{
		eprintln!("failed to initialise logging: {e}");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_maintenance_config::{load_config_from_sources, DefaultsSource};
	use std::io;
	use std::sync::{Arc, Mutex};

	#[derive(Clone, Default)]
	struct Captured(Arc<Mutex<Vec<u8>>>);

	impl io::Write for Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	impl Captured {
		fn contents(&self) -> String {
			String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
		}
	}

	#[test]
	fn test_config_load_is_logged_before_init() {
		let captured = Captured::default();
		let writer = captured.clone();
		let subscriber = bootstrap_subscriber(EnvFilter::new("info"), move || writer.clone());

		let config = tracing::subscriber::with_default(subscriber, || {
			load_config_from_sources(vec![Box::new(DefaultsSource)])
		})
		.unwrap();

		let output = captured.contents();
		assert!(output.contains("Exporter configuration loaded"), "{output}");
		assert!(output.contains(&config.exporter.addr.to_string()), "{output}");
	}

	#[test]
	fn test_bootstrap_logging_returns_closure_value() {
		assert_eq!(with_bootstrap_logging(|| 42), 42);
	}

	#[test]
	fn test_invalid_level_falls_back() {
		// Must not panic on a malformed directive.
		let _ = env_filter("not a [valid filter");
	}

	#[test]
	fn test_init_twice_does_not_panic() {
		let config = ExporterConfig::default();
		init_tracing(&config);
		init_tracing(&config);
	}
}
