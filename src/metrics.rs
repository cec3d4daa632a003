//! Diagnostics counters
//!
//! Named, read-only counters exposed per writer/reader session. Counters are
//! not part of the persisted format.
//!
//! Every `Metrics` owns a private Prometheus registry (never the global one)
//! holding its counters under a name (e.g. `BufferedSink`), and may observe
//! child registries, so that a writer exposes its sink's counters as
//! `Writer.BufferedSink.ParallelZip`.

use std::collections::BTreeMap;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{AtlasError, Result};

#[derive(Debug, Clone)]
enum Handle {
    /// Monotonic totals (`nPageCommitted`, `szReadPayload`, ...)
    Counter(IntCounter),
    /// Values that are overwritten (`ParallelZip`)
    Gauge(IntGauge),
}

/// A single named counter
#[derive(Debug)]
pub struct Counter {
    name: String,
    unit: String,
    description: String,
    handle: Handle,
}

impl Counter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn inc(&self) {
        match &self.handle {
            Handle::Counter(c) => c.inc(),
            Handle::Gauge(g) => g.inc(),
        }
    }

    pub fn add(&self, delta: u64) {
        match &self.handle {
            Handle::Counter(c) => c.inc_by(delta),
            Handle::Gauge(g) => g.add(delta as i64),
        }
    }

    /// Overwrite the value; a monotonic counter is reset first
    pub fn set(&self, value: i64) {
        match &self.handle {
            Handle::Counter(c) => {
                c.reset();
                c.inc_by(value.max(0) as u64);
            }
            Handle::Gauge(g) => g.set(value),
        }
    }

    pub fn value(&self) -> i64 {
        match &self.handle {
            Handle::Counter(c) => c.get() as i64,
            Handle::Gauge(g) => g.get(),
        }
    }
}

/// Registry of named counters
///
/// Cloning a registry shares its counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    name: String,
    registry: Registry,
    counters: BTreeMap<String, Arc<Counter>>,
    children: Vec<Metrics>,
}

impl Metrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: Registry::new(),
            counters: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The Prometheus registry holding this level's counters
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a monotonic counter, or return the existing one with that name
    pub fn make_counter(
        &mut self,
        name: &str,
        unit: &str,
        description: &str,
    ) -> Result<Arc<Counter>> {
        if let Some(counter) = self.counters.get(name) {
            return Ok(counter.clone());
        }
        let counter = IntCounter::with_opts(opts(&self.name, name, unit, description))?;
        self.registry.register(Box::new(counter.clone()))?;
        Ok(self.insert(name, unit, description, Handle::Counter(counter)))
    }

    /// Register a counter whose value is set rather than accumulated
    pub fn make_gauge(&mut self, name: &str, unit: &str, description: &str) -> Result<Arc<Counter>> {
        if let Some(counter) = self.counters.get(name) {
            return Ok(counter.clone());
        }
        let gauge = IntGauge::with_opts(opts(&self.name, name, unit, description))?;
        self.registry.register(Box::new(gauge.clone()))?;
        Ok(self.insert(name, unit, description, Handle::Gauge(gauge)))
    }

    fn insert(&mut self, name: &str, unit: &str, description: &str, handle: Handle) -> Arc<Counter> {
        let counter = Arc::new(Counter {
            name: name.to_string(),
            unit: unit.to_string(),
            description: description.to_string(),
            handle,
        });
        self.counters.insert(name.to_string(), counter.clone());
        counter
    }

    /// Expose another registry's counters beneath this one
    pub fn observe(&mut self, child: &Metrics) {
        self.children.push(child.clone());
    }

    /// Look up a counter by its fully qualified, dot-separated name
    ///
    /// `"Writer.BufferedSink.ParallelZip"` resolves through this registry
    /// (`Writer`) into the observed `BufferedSink` registry.
    pub fn get_counter(&self, qualified: &str) -> Option<Arc<Counter>> {
        let rest = qualified.strip_prefix(self.name.as_str())?.strip_prefix('.')?;
        if let Some(counter) = self.counters.get(rest) {
            return Some(counter.clone());
        }
        self.children.iter().find_map(|child| child.get_counter(rest))
    }

    /// Flattened `(qualified name, value)` pairs, for printing
    pub fn snapshot(&self) -> Vec<(String, i64)> {
        let mut out = Vec::new();
        self.collect(&self.name, &mut out);
        out
    }

    fn collect(&self, prefix: &str, out: &mut Vec<(String, i64)>) {
        for (name, counter) in &self.counters {
            out.push((format!("{}.{}", prefix, name), counter.value()));
        }
        for child in &self.children {
            child.collect(&format!("{}.{}", prefix, child.name), out);
        }
    }

    /// Prometheus text exposition of this level and every observed level
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        let mut families = Vec::new();
        self.gather_into(&mut families);
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AtlasError::Metrics(e.to_string()))
    }

    fn gather_into(&self, out: &mut Vec<prometheus::proto::MetricFamily>) {
        out.extend(self.registry.gather());
        for child in &self.children {
            child.gather_into(out);
        }
    }
}

/// Counter options; the owning level is recorded as the `scope` label
fn opts(scope: &str, name: &str, unit: &str, description: &str) -> Opts {
    let opts = Opts::new(name, description).const_label("scope", scope);
    if unit.is_empty() {
        opts
    } else {
        opts.const_label("unit", unit)
    }
}
