use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MonitorError, Result};
use crate::snapshot::HistogramSnapshot;

/// An `f64` stored as raw bits in an `AtomicU64`.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, delta: f64) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Monotonically non-decreasing value.
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: AtomicF64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicF64::new(0.0),
        }
    }

    pub fn increment(&self) {
        self.value.add(1.0);
    }

    /// Add `amount`. Negative or non-finite amounts are rejected and leave
    /// the counter untouched.
    pub fn add(&self, amount: f64) -> Result<()> {
        if !amount.is_finite() {
            return Err(MonitorError::NonFiniteValue {
                name: self.name.clone(),
                value: amount,
            });
        }
        if amount < 0.0 {
            return Err(MonitorError::NegativeIncrement {
                name: self.name.clone(),
                amount,
            });
        }
        self.value.add(amount);
        Ok(())
    }

    pub fn get(&self) -> f64 {
        self.value.load()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Last-set value that may move in either direction.
#[derive(Debug)]
pub struct Gauge {
    name: String,
    value: AtomicF64,
}

impl Gauge {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicF64::new(0.0),
        }
    }

    pub fn set(&self, val: f64) {
        self.value.store(val);
    }

    pub fn add(&self, delta: f64) {
        self.value.add(delta);
    }

    pub fn increment(&self) {
        self.value.add(1.0);
    }

    pub fn decrement(&self) {
        self.value.add(-1.0);
    }

    pub fn get(&self) -> f64 {
        self.value.load()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Fixed-bucket histogram.
///
/// Each observation lands in exactly one non-cumulative slot (the last slot
/// is `+Inf`). Slots and sum share one lock, so a snapshot always sees
/// `count` and `sum` from the same set of observations.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    bounds: Vec<f64>,
    state: Mutex<HistogramState>,
}

#[derive(Debug)]
struct HistogramState {
    slots: Vec<u64>,
    sum: f64,
}

impl Histogram {
    pub fn new(name: impl Into<String>, bounds: &[f64]) -> Result<Self> {
        let name = name.into();
        validate_buckets(&name, bounds)?;
        Ok(Self {
            name,
            bounds: bounds.to_vec(),
            state: Mutex::new(HistogramState {
                slots: vec![0; bounds.len() + 1],
                sum: 0.0,
            }),
        })
    }

    pub fn observe(&self, value: f64) {
        let idx = if value.is_nan() {
            self.bounds.len()
        } else {
            self.bounds.partition_point(|bound| *bound < value)
        };
        let mut state = self.state.lock();
        state.slots[idx] += 1;
        state.sum += value;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let (slots, sum) = {
            let state = self.state.lock();
            (state.slots.clone(), state.sum)
        };
        let mut cumulative = Vec::with_capacity(self.bounds.len());
        let mut running = 0u64;
        for slot in &slots[..self.bounds.len()] {
            running += slot;
            cumulative.push(running);
        }
        HistogramSnapshot {
            bounds: self.bounds.clone(),
            cumulative,
            sum,
            count: running + slots[self.bounds.len()],
        }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Bucket boundaries must be non-empty, finite and strictly increasing.
pub fn validate_buckets(name: &str, bounds: &[f64]) -> Result<()> {
    let invalid = |reason: &str| MonitorError::InvalidBuckets {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if bounds.is_empty() {
        return Err(invalid("no buckets"));
    }
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(invalid("bucket bounds must be finite"));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid("bucket bounds must be strictly increasing"));
    }
    Ok(())
}
