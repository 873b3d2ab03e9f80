// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Label sets and the metric identity rendered from them.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::{MaintenanceError, Result};

/// Base name of the gauge exposed for every maintenance window.
pub const METRIC_NAME: &str = "maintenance_active";

/// Reserved label holding the window name.
pub const NAME_LABEL: &str = "name";

/// Label key/value pairs, kept sorted by key so rendering is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		self.0.insert(key.into(), value.into())
	}

	/// Set the reserved `name` label, returning any value it replaced.
	pub fn inject_name(&mut self, name: &str) -> Option<String> {
		self.insert(NAME_LABEL, name)
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Check every key against the Prometheus label name grammar.
	pub fn validate(&self) -> Result<()> {
		match self.0.keys().find(|key| !is_valid_label_name(key)) {
			Some(key) => Err(MaintenanceError::InvalidLabelName(key.clone())),
			None => Ok(()),
		}
	}
}

impl From<BTreeMap<String, String>> for LabelSet {
	fn from(labels: BTreeMap<String, String>) -> Self {
		Self(labels)
	}
}

impl From<HashMap<String, String>> for LabelSet {
	fn from(labels: HashMap<String, String>) -> Self {
		Self(labels.into_iter().collect())
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, excluding the `__` prefix reserved for internal use.
pub fn is_valid_label_name(name: &str) -> bool {
	let mut chars = name.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	(first.is_ascii_alphabetic() || first == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
		&& !name.starts_with("__")
}

/// The externally visible gauge name, e.g. `maintenance_active{name="backup",team="db"}`.
///
/// Rendered once when a window is constructed and never recomputed, so the series does not
/// fragment across scrapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricIdentity {
	base: String,
	rendered: String,
}

impl MetricIdentity {
	pub fn new(base: &str, labels: &LabelSet) -> Self {
		Self {
			base: base.to_string(),
			rendered: render_metric_identity(base, labels),
		}
	}

	pub fn base(&self) -> &str {
		&self.base
	}

	pub fn as_str(&self) -> &str {
		&self.rendered
	}
}

impl fmt::Display for MetricIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.rendered)
	}
}

/// Render `base{k1="v1",k2="v2"}` with keys in sorted order.
pub fn render_metric_identity(base: &str, labels: &LabelSet) -> String {
	let pairs = labels
		.iter()
		.map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
		.collect::<Vec<_>>()
		.join(",");

	format!("{base}{{{pairs}}}")
}

fn escape_label_value(value: &str) -> Cow<'_, str> {
	if !value.contains(['\\', '"', '\n']) {
		return Cow::Borrowed(value);
	}

	let mut escaped = String::with_capacity(value.len() + 2);
	for c in value.chars() {
		match c {
			'\\' => escaped.push_str("\\\\"),
			'"' => escaped.push_str("\\\""),
			'\n' => escaped.push_str("\\n"),
			c => escaped.push(c),
		}
	}
	Cow::Owned(escaped)
}
