// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Maintenance window entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One `[[windows]]` entry.
///
/// Fields are left unvalidated here: a malformed entry fails when its window is
/// constructed, which skips that window without rejecting the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
	pub name: String,
	pub duration: String,
	pub cron: String,
	pub labels: BTreeMap<String, String>,
}
