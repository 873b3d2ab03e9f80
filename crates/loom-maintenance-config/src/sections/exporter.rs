// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exporter configuration section.

use std::fmt;
use std::str::FromStr;

use chrono_tz::Tz;
use loom_maintenance_scheduler::{parse_timezone, ExecutionMode};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ADDR: &str = ":9099";
pub const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
	#[default]
	Text,
	Json,
}

impl FromStr for LogFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(LogFormat::Text),
			"json" => Ok(LogFormat::Json),
			_ => Err(ConfigError::InvalidValue {
				key: "log_format".to_string(),
				message: format!("unknown log format '{s}', expected 'text' or 'json'"),
			}),
		}
	}
}

impl fmt::Display for LogFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LogFormat::Text => write!(f, "text"),
			LogFormat::Json => write!(f, "json"),
		}
	}
}

fn parse_execution_mode(s: &str) -> Result<ExecutionMode, ConfigError> {
	match s.to_lowercase().as_str() {
		"concurrent" => Ok(ExecutionMode::Concurrent),
		"serial" => Ok(ExecutionMode::Serial),
		_ => Err(ConfigError::InvalidValue {
			key: "execution".to_string(),
			message: format!("unknown execution mode '{s}', expected 'concurrent' or 'serial'"),
		}),
	}
}

/// Exporter configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
	pub addr: String,
	pub timezone: Tz,
	pub log_format: LogFormat,
	pub log_level: String,
	pub expose_process_metrics: bool,
	pub execution: ExecutionMode,
}

impl ExporterConfig {
	/// Socket address string for binding. A bare `:port` binds every interface.
	pub fn socket_addr(&self) -> String {
		match self.addr.strip_prefix(':') {
			Some(port) => format!("0.0.0.0:{port}"),
			None => self.addr.clone(),
		}
	}
}

impl Default for ExporterConfig {
	fn default() -> Self {
		Self {
			addr: DEFAULT_ADDR.to_string(),
			timezone: Tz::UTC,
			log_format: LogFormat::Text,
			log_level: DEFAULT_LOG_LEVEL.to_string(),
			expose_process_metrics: false,
			execution: ExecutionMode::Concurrent,
		}
	}
}

/// Exporter configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExporterConfigLayer {
	pub addr: Option<String>,
	pub timezone: Option<String>,
	#[serde(alias = "logformat")]
	pub log_format: Option<String>,
	pub log_level: Option<String>,
	pub expose_process_metrics: Option<bool>,
	pub execution: Option<String>,
}

impl ExporterConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.addr.is_some() {
			self.addr = other.addr;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.log_format.is_some() {
			self.log_format = other.log_format;
		}
		if other.log_level.is_some() {
			self.log_level = other.log_level;
		}
		if other.expose_process_metrics.is_some() {
			self.expose_process_metrics = other.expose_process_metrics;
		}
		if other.execution.is_some() {
			self.execution = other.execution;
		}
	}

	pub fn finalize(self) -> Result<ExporterConfig, ConfigError> {
		let timezone_name = self.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
		let timezone =
			parse_timezone(&timezone_name).map_err(|_| ConfigError::InvalidTimezone(timezone_name))?;

		Ok(ExporterConfig {
			addr: self.addr.unwrap_or_else(|| DEFAULT_ADDR.to_string()),
			timezone,
			log_format: self
				.log_format
				.as_deref()
				.map(str::parse)
				.transpose()?
				.unwrap_or_default(),
			log_level: self
				.log_level
				.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
			expose_process_metrics: self.expose_process_metrics.unwrap_or(false),
			execution: self
				.execution
				.as_deref()
				.map(parse_execution_mode)
				.transpose()?
				.unwrap_or_default(),
		})
	}
}
