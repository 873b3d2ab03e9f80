// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the Loom maintenance window exporter.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Config file discovery across the standard locations
//! - Consistent environment variable naming (`LOOM_MAINTENANCE_*`)
//!
//! # Usage
//!
//! ```ignore
//! use loom_maintenance_config::load_config;
//!
//! let config = load_config(None)?;
//! println!("Exporter listening on {}", config.exporter.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::MaintenanceConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Fully resolved exporter configuration.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceConfig {
	pub exporter: ExporterConfig,
	pub windows: Vec<WindowConfig>,
}

/// Locations searched when no explicit config file is given, in order.
pub fn default_search_paths() -> Vec<PathBuf> {
	let mut paths = vec![PathBuf::from("/etc/loom-maintenance/config.toml")];
	if let Some(home) = dirs::home_dir() {
		paths.push(home.join(".loom-maintenance").join("config.toml"));
	}
	paths.push(PathBuf::from("config.toml"));
	paths
}

/// Resolve the config file to load.
///
/// An explicit path must exist. Otherwise the first existing entry of
/// `candidates` wins.
pub fn discover_config_file(
	explicit: Option<&Path>,
	candidates: &[PathBuf],
) -> Result<PathBuf, ConfigError> {
	if let Some(path) = explicit {
		if !path.exists() {
			return Err(ConfigError::FileNotFound(path.to_path_buf()));
		}
		return Ok(path.to_path_buf());
	}

	candidates
		.iter()
		.find(|p| p.is_file())
		.cloned()
		.ok_or_else(|| ConfigError::NotFound {
			searched: candidates.to_vec(),
		})
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_MAINTENANCE_*`)
/// 2. Config file (`config_path`, or the first of [`default_search_paths`])
/// 3. Built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<MaintenanceConfig, ConfigError> {
	let path = discover_config_file(config_path, &default_search_paths())?;
	info!(path = %path.display(), "Using config file");

	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<MaintenanceConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = MaintenanceConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: MaintenanceConfigLayer) -> Result<MaintenanceConfig, ConfigError> {
	let exporter = layer.exporter.unwrap_or_default().finalize()?;
	let windows = layer.windows.unwrap_or_default();

	info!(
		addr = %exporter.addr,
		timezone = %exporter.timezone,
		log_format = %exporter.log_format,
		execution = ?exporter.execution,
		expose_process_metrics = exporter.expose_process_metrics,
		windows = windows.len(),
		"Exporter configuration loaded"
	);

	Ok(MaintenanceConfig { exporter, windows })
}
