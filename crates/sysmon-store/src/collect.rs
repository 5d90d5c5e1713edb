//! Metric collection.
//!
//! A [`MetricRegistry`] maps metric names to [`MetricProvider`]s. A
//! collection pass reads the requested names once, stamps every reading
//! with the same instant and reports failures per name instead of
//! aborting the pass.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};
use crate::store::SampleStore;
use crate::timespec::Clock;
use crate::types::{Sample, SampleId};

/// Produces a current reading for one metric.
pub trait MetricProvider: Send + Sync {
    /// Takes a reading.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::MetricUnavailable`] if no reading can be taken.
    fn read(&self) -> Result<f64>;
}

/// A provider backed by a closure.
pub struct FnProvider<F>(F);

impl<F> FnProvider<F>
where
    F: Fn() -> Result<f64> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(read: F) -> Self {
        Self(read)
    }
}

impl<F> MetricProvider for FnProvider<F>
where
    F: Fn() -> Result<f64> + Send + Sync,
{
    fn read(&self) -> Result<f64> {
        (self.0)()
    }
}

impl<F> fmt::Debug for FnProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnProvider")
    }
}

/// Known metrics, in name order.
#[derive(Default, Clone)]
pub struct MetricRegistry {
    providers: BTreeMap<String, Arc<dyn MetricProvider>>,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl MetricRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, provider: impl MetricProvider + 'static) {
        self.providers.insert(name.into(), Arc::new(provider));
    }

    /// Looks up a provider.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::UnknownMetric`] listing the known names.
    pub fn get(&self, name: &str) -> Result<&dyn MetricProvider> {
        self.providers
            .get(name)
            .map(|provider| &**provider)
            .ok_or_else(|| MonitorError::UnknownMetric {
                name: name.to_string(),
                known: self.names().join(", "),
            })
    }

    /// Known metric names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Number of registered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Where a batch of readings was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Host identifier.
    pub host: String,
    /// Network address.
    pub address: String,
}

impl Origin {
    /// Creates an origin.
    #[must_use]
    pub fn new(host: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            address: address.into(),
        }
    }
}

/// Result of one collection pass.
#[derive(Debug, Default)]
pub struct Batch {
    /// Readings taken, in request order.
    pub samples: Vec<Sample>,
    /// Names that produced no reading, with the reason.
    pub failures: Vec<(String, MonitorError)>,
}

impl Batch {
    /// Returns true if no reading was taken.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reads each requested metric once, all stamped with the same instant.
///
/// Unknown and unavailable metrics land in [`Batch::failures`]; the
/// remaining names are still read.
pub fn collect_batch(
    registry: &MetricRegistry,
    names: &[String],
    origin: &Origin,
    clock: &dyn Clock,
) -> Batch {
    let timestamp = clock.now();
    let mut batch = Batch::default();

    for name in names {
        let reading = registry.get(name).and_then(|provider| {
            provider.read().map_err(|e| match e {
                MonitorError::MetricUnavailable { .. } => e,
                other => MonitorError::MetricUnavailable {
                    name: name.clone(),
                    reason: other.to_string(),
                },
            })
        });

        match reading {
            Ok(value) => {
                debug!(metric = %name, value, "collected reading");
                batch.samples.push(Sample::new(
                    timestamp,
                    origin.host.clone(),
                    origin.address.clone(),
                    name.clone(),
                    value,
                ));
            }
            Err(e) => {
                warn!(metric = %name, error = %e, "metric not collected");
                batch.failures.push((name.clone(), e));
            }
        }
    }

    batch
}

/// Persists the readings of a batch in one atomic write.
///
/// # Errors
///
/// Returns any error raised by the store.
pub fn record_batch(store: &dyn SampleStore, batch: &Batch) -> Result<Vec<SampleId>> {
    store.insert_batch(&batch.samples)
}
