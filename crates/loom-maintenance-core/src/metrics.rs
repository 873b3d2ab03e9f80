// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, warn};

use crate::error::{MaintenanceError, Result};
use crate::labels::{LabelSet, MetricIdentity};

type Getter = Box<dyn Fn() -> f64 + Send + Sync>;

struct PullGauge {
	labels: Vec<(String, String)>,
	getter: Getter,
}

struct PullGaugeFamily {
	name: String,
	help: String,
	desc: Desc,
	gauges: RwLock<BTreeMap<MetricIdentity, PullGauge>>,
}

/// A gauge family whose values are produced by getters at gather time.
///
/// Unlike `prometheus::GaugeVec`, members may carry different label names, which is what
/// free-form per-window labels need.
#[derive(Clone)]
struct PullGaugeCollector {
	family: Arc<PullGaugeFamily>,
}

impl PullGaugeCollector {
	fn new(name: &str, help: &str) -> Result<Self> {
		let desc = Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())?;
		Ok(Self {
			family: Arc::new(PullGaugeFamily {
				name: name.to_string(),
				help: help.to_string(),
				desc,
				gauges: RwLock::new(BTreeMap::new()),
			}),
		})
	}
}

impl Collector for PullGaugeCollector {
	fn desc(&self) -> Vec<&Desc> {
		vec![&self.family.desc]
	}

	fn collect(&self) -> Vec<MetricFamily> {
		let gauges = self
			.family
			.gauges
			.read()
			.unwrap_or_else(PoisonError::into_inner);

		let mut family = MetricFamily::default();
		family.set_name(self.family.name.clone());
		family.set_help(self.family.help.clone());
		family.set_field_type(MetricType::GAUGE);

		for gauge in gauges.values() {
			let mut metric = proto::Metric::default();
			for (name, value) in &gauge.labels {
				let mut pair = proto::LabelPair::default();
				pair.set_name(name.clone());
				pair.set_value(value.clone());
				metric.mut_label().push(pair);
			}

			let mut value = proto::Gauge::default();
			value.set_value((gauge.getter)());
			metric.set_gauge(value);
			family.mut_metric().push(metric);
		}

		vec![family]
	}
}

/// Registry of pull gauges plus optional process metrics, encoded on every scrape.
pub struct MetricRegistry {
	registry: Registry,
	families: Mutex<HashMap<String, PullGaugeCollector>>,
}

impl MetricRegistry {
	pub fn new() -> Self {
		Self {
			registry: Registry::new(),
			families: Mutex::new(HashMap::new()),
		}
	}

	/// Register a gauge under `identity` whose value is read from `getter` at scrape time.
	///
	/// The first gauge registered for a base name creates its family with `help`.
	pub fn register_gauge<F>(
		&self,
		identity: &MetricIdentity,
		help: &str,
		labels: &LabelSet,
		getter: F,
	) -> Result<()>
	where
		F: Fn() -> f64 + Send + Sync + 'static,
	{
		let collector = self.family(identity.base(), help)?;
		let mut gauges = collector
			.family
			.gauges
			.write()
			.unwrap_or_else(PoisonError::into_inner);

		if gauges.contains_key(identity) {
			return Err(MaintenanceError::DuplicateMetric(identity.to_string()));
		}

		gauges.insert(
			identity.clone(),
			PullGauge {
				labels: labels
					.iter()
					.map(|(k, v)| (k.to_string(), v.to_string()))
					.collect(),
				getter: Box::new(getter),
			},
		);
		debug!(metric = %identity, "Registered gauge");
		Ok(())
	}

	/// Remove a gauge. Returns whether it was registered.
	pub fn unregister_gauge(&self, identity: &MetricIdentity) -> bool {
		let families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
		families
			.get(identity.base())
			.map(|collector| {
				collector
					.family
					.gauges
					.write()
					.unwrap_or_else(PoisonError::into_inner)
					.remove(identity)
					.is_some()
			})
			.unwrap_or(false)
	}

	pub fn contains(&self, identity: &MetricIdentity) -> bool {
		let families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
		families.get(identity.base()).is_some_and(|collector| {
			collector
				.family
				.gauges
				.read()
				.unwrap_or_else(PoisonError::into_inner)
				.contains_key(identity)
		})
	}

	pub fn gauge_count(&self) -> usize {
		let families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
		families
			.values()
			.map(|collector| {
				collector
					.family
					.gauges
					.read()
					.unwrap_or_else(PoisonError::into_inner)
					.len()
			})
			.sum()
	}

	/// Expose `process_*` metrics for the current process.
	#[cfg(target_os = "linux")]
	pub fn register_process_collector(&self) -> Result<()> {
		let collector = prometheus::process_collector::ProcessCollector::for_self();
		self.registry.register(Box::new(collector))?;
		debug!("Registered process collector");
		Ok(())
	}

	#[cfg(not(target_os = "linux"))]
	pub fn register_process_collector(&self) -> Result<()> {
		warn!("Process metrics are only supported on Linux, skipping");
		Ok(())
	}

	pub fn gather(&self) -> Vec<MetricFamily> {
		self.registry.gather()
	}

	/// Encode every registered metric in the Prometheus text exposition format.
	pub fn encode(&self) -> Result<String> {
		let encoder = TextEncoder::new();
		let metric_families = self.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer)?;
		Ok(String::from_utf8(buffer)?)
	}

	fn family(&self, name: &str, help: &str) -> Result<PullGaugeCollector> {
		let mut families = self.families.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(collector) = families.get(name) {
			if collector.family.help != help {
				warn!(metric = %name, "Gauge registered with differing help text, keeping the first");
			}
			return Ok(collector.clone());
		}

		let collector = PullGaugeCollector::new(name, help)?;
		self.registry.register(Box::new(collector.clone()))?;
		families.insert(name.to_string(), collector.clone());
		Ok(collector)
	}
}

impl Default for MetricRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};

	const HELP: &str = "Test gauge";

	fn identity(pairs: &[(&str, &str)]) -> (MetricIdentity, LabelSet) {
		let labels: LabelSet = pairs.iter().copied().collect();
		(MetricIdentity::new("test_gauge", &labels), labels)
	}

	#[test]
	fn test_empty_registry_encodes_nothing() {
		let registry = MetricRegistry::new();

		assert_eq!(registry.encode().unwrap(), "");
		assert_eq!(registry.gauge_count(), 0);
	}

	#[test]
	fn test_gauge_value_is_read_at_encode_time() {
		let registry = MetricRegistry::new();
		let flag = Arc::new(AtomicBool::new(false));
		let (id, labels) = identity(&[("name", "backup")]);

		let reader = Arc::clone(&flag);
		registry
			.register_gauge(&id, HELP, &labels, move || {
				if reader.load(Ordering::Acquire) {
					1.0
				} else {
					0.0
				}
			})
			.unwrap();

		let output = registry.encode().unwrap();
		assert!(output.contains("# TYPE test_gauge gauge"));
		assert!(output.contains("test_gauge{name=\"backup\"} 0\n"));

		flag.store(true, Ordering::Release);
		let output = registry.encode().unwrap();
		assert!(output.contains("test_gauge{name=\"backup\"} 1\n"));
	}

	#[test]
	fn test_gauges_with_different_label_names_share_a_family() {
		let registry = MetricRegistry::new();
		let (a, a_labels) = identity(&[("name", "a")]);
		let (b, b_labels) = identity(&[("name", "b"), ("team", "db")]);

		registry.register_gauge(&a, HELP, &a_labels, || 0.0).unwrap();
		registry.register_gauge(&b, HELP, &b_labels, || 1.0).unwrap();

		let output = registry.encode().unwrap();
		assert_eq!(output.matches("# TYPE test_gauge gauge").count(), 1);
		assert!(output.contains("test_gauge{name=\"a\"} 0\n"));
		assert!(output.contains("test_gauge{name=\"b\",team=\"db\"} 1\n"));
		assert_eq!(registry.gauge_count(), 2);
	}

	#[test]
	fn test_duplicate_identity_rejected() {
		let registry = MetricRegistry::new();
		let (id, labels) = identity(&[("name", "backup")]);
		registry.register_gauge(&id, HELP, &labels, || 0.0).unwrap();

		let result = registry.register_gauge(&id, HELP, &labels, || 1.0);

		assert!(matches!(result, Err(MaintenanceError::DuplicateMetric(_))));
		assert_eq!(registry.gauge_count(), 1);
	}

	#[test]
	fn test_unregister_gauge() {
		let registry = MetricRegistry::new();
		let (id, labels) = identity(&[("name", "backup")]);
		registry.register_gauge(&id, HELP, &labels, || 1.0).unwrap();

		assert!(registry.contains(&id));
		assert!(registry.unregister_gauge(&id));
		assert!(!registry.unregister_gauge(&id));
		assert!(!registry.contains(&id));
		assert!(!registry.encode().unwrap().contains("test_gauge{"));
	}

	#[test]
	fn test_label_values_are_escaped_in_exposition() {
		let registry = MetricRegistry::new();
		let (id, labels) = identity(&[("name", "quote\"d")]);
		registry.register_gauge(&id, HELP, &labels, || 0.0).unwrap();

		let output = registry.encode().unwrap();
		assert!(output.contains(r#"test_gauge{name="quote\"d"} 0"#));
	}

	#[cfg(target_os = "linux")]
	#[test]
	fn test_process_collector() {
		let registry = MetricRegistry::new();

		registry.register_process_collector().unwrap();

		assert!(registry.encode().unwrap().contains("process_"));
	}
}
