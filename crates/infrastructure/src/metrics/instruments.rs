use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge holding an f64, stored as bits in an atomic.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Renders label names and values into the exposition body,
/// e.g. `server="8.8.8.8:53",hostname="example.com"`.
fn label_key(names: &'static [&'static str], values: &[&str]) -> String {
    debug_assert_eq!(names.len(), values.len());
    let mut key = String::with_capacity(32);
    for (i, (name, value)) in names.iter().zip(values).enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(name);
        key.push_str("=\"");
        key.push_str(value);
        key.push('"');
    }
    key
}

/// A family of counters distinguished by label values.
#[derive(Debug)]
pub struct CounterVec {
    label_names: &'static [&'static str],
    values: DashMap<String, u64>,
}

impl CounterVec {
    pub fn new(label_names: &'static [&'static str]) -> Self {
        Self {
            label_names,
            values: DashMap::new(),
        }
    }

    pub fn inc(&self, label_values: &[&str]) {
        self.add(label_values, 1);
    }

    pub fn add(&self, label_values: &[&str], delta: u64) {
        self.values
            .entry(label_key(self.label_names, label_values))
            .and_modify(|v| *v += delta)
            .or_insert(delta);
    }

    pub fn get(&self, label_values: &[&str]) -> u64 {
        self.values
            .get(&label_key(self.label_names, label_values))
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// All series, sorted by label key for stable exposition.
    pub fn series(&self) -> Vec<(String, u64)> {
        let mut rows: Vec<_> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

/// A family of gauges distinguished by label values.
#[derive(Debug)]
pub struct GaugeVec {
    label_names: &'static [&'static str],
    values: DashMap<String, f64>,
}

impl GaugeVec {
    pub fn new(label_names: &'static [&'static str]) -> Self {
        Self {
            label_names,
            values: DashMap::new(),
        }
    }

    pub fn set(&self, label_values: &[&str], value: f64) {
        self.values
            .insert(label_key(self.label_names, label_values), value);
    }

    pub fn get(&self, label_values: &[&str]) -> Option<f64> {
        self.values
            .get(&label_key(self.label_names, label_values))
            .map(|v| *v)
    }

    pub fn series(&self) -> Vec<(String, f64)> {
        let mut rows: Vec<_> = self
            .values
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}

#[derive(Debug, Clone)]
struct HistogramData {
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramData {
    fn new(buckets: usize) -> Self {
        Self {
            bucket_counts: vec![0; buckets],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, upper_bounds: &[f64], value: f64) {
        for (i, bound) in upper_bounds.iter().enumerate() {
            if value <= *bound {
                self.bucket_counts[i] += 1;
                break;
            }
        }
        self.sum += value;
        self.count += 1;
    }
}

/// A snapshot of one histogram series: per-bucket (non-cumulative) counts
/// paired with upper bounds, plus sum and count.
#[derive(Debug, Clone)]
pub struct HistogramSnapshot {
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

/// An unlabeled fixed-bucket histogram.
#[derive(Debug)]
pub struct Histogram {
    upper_bounds: &'static [f64],
    data: std::sync::Mutex<HistogramData>,
}

impl Histogram {
    pub fn new(upper_bounds: &'static [f64]) -> Self {
        Self {
            upper_bounds,
            data: std::sync::Mutex::new(HistogramData::new(upper_bounds.len())),
        }
    }

    pub fn observe(&self, value: f64) {
        if let Ok(mut data) = self.data.lock() {
            data.observe(self.upper_bounds, value);
        }
    }

    pub fn count(&self) -> u64 {
        self.data.lock().map(|d| d.count).unwrap_or(0)
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let data = match self.data.lock() {
            Ok(data) => data.clone(),
            Err(_) => HistogramData::new(self.upper_bounds.len()),
        };
        HistogramSnapshot {
            buckets: self
                .upper_bounds
                .iter()
                .copied()
                .zip(data.bucket_counts)
                .collect(),
            sum: data.sum,
            count: data.count,
        }
    }
}

/// A family of fixed-bucket histograms distinguished by label values.
#[derive(Debug)]
pub struct HistogramVec {
    label_names: &'static [&'static str],
    upper_bounds: &'static [f64],
    values: DashMap<String, HistogramData>,
}

impl HistogramVec {
    pub fn new(label_names: &'static [&'static str], upper_bounds: &'static [f64]) -> Self {
        Self {
            label_names,
            upper_bounds,
            values: DashMap::new(),
        }
    }

    pub fn observe(&self, label_values: &[&str], value: f64) {
        let mut entry = self
            .values
            .entry(label_key(self.label_names, label_values))
            .or_insert_with(|| HistogramData::new(self.upper_bounds.len()));
        entry.observe(self.upper_bounds, value);
    }

    pub fn count(&self, label_values: &[&str]) -> u64 {
        self.values
            .get(&label_key(self.label_names, label_values))
            .map(|d| d.count)
            .unwrap_or(0)
    }

    pub fn series(&self) -> Vec<(String, HistogramSnapshot)> {
        let mut rows: Vec<_> = self
            .values
            .iter()
            .map(|entry| {
                let data = entry.value().clone();
                (
                    entry.key().clone(),
                    HistogramSnapshot {
                        buckets: self
                            .upper_bounds
                            .iter()
                            .copied()
                            .zip(data.bucket_counts)
                            .collect(),
                        sum: data.sum,
                        count: data.count,
                    },
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }
}
