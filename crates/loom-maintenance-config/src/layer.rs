// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{ExporterConfigLayer, WindowConfig};

/// Partial configuration produced by one source, merged in precedence order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceConfigLayer {
	#[serde(alias = "config")]
	pub exporter: Option<ExporterConfigLayer>,
	pub windows: Option<Vec<WindowConfig>>,
}

impl MaintenanceConfigLayer {
	/// Merge `other` over `self`. Window lists are replaced, not concatenated.
	pub fn merge(&mut self, other: Self) {
		match (&mut self.exporter, other.exporter) {
			(Some(current), Some(overlay)) => current.merge(overlay),
			(current @ None, Some(overlay)) => *current = Some(overlay),
			(_, None) => {}
		}
		if other.windows.is_some() {
			self.windows = other.windows;
		}
	}
}
