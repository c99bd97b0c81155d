//! Sensor targets: observed hourly counts on a subset of edges.
//!
//! # Counts CSV format
//!
//! ```csv
//! link_id,hour,volume
//! l0,7,412
//! l0,8,530
//! l5,7,88
//! ```
//!
//! `hour` is `0..24`.  Any link with at least one row becomes a sensor edge;
//! its hours without a row count as observed zeros.  Repeated
//! `(link_id, hour)` rows accumulate.  Rows naming links that are not in the
//! network are skipped with a warning, since count files are routinely
//! collected against a larger network than the one being fitted.

use std::io::Read;
use std::path::Path;

use log::{debug, warn};
use ndarray::Array2;
use serde::Deserialize;

use tam_core::{EdgeId, Hour, HOURS_PER_DAY};
use tam_network::RoadNetwork;

use crate::{FitError, FitResult};

/// Per-edge, per-hour target flows plus the edges that were actually observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTarget {
    /// `(E, 24)`; rows outside `sensor_edges` are placeholders.
    values:       Array2<f32>,
    /// Ascending, no duplicates.
    sensor_edges: Vec<EdgeId>,
}

impl SensorTarget {
    /// Validate a dense `(E, 24)` target and its sensor edge subset.
    ///
    /// An empty sensor set is accepted here; fitting against it fails with
    /// [`FitError::NoObservedEdges`].
    pub fn new(values: Array2<f32>, mut sensor_edges: Vec<EdgeId>) -> FitResult<Self> {
        if values.ncols() != HOURS_PER_DAY {
            return Err(FitError::ShapeMismatch { what: "target hours", expected: HOURS_PER_DAY, got: values.ncols() });
        }
        sensor_edges.sort_unstable();
        sensor_edges.dedup();
        let edge_count = values.nrows();
        if let Some(e) = sensor_edges.iter().find(|e| e.index() >= edge_count) {
            return Err(FitError::InvalidEdgeIndex { edge: e.index(), edge_count });
        }
        for &e in &sensor_edges {
            if let Some(hour) = values.row(e.index()).iter().position(|v| !v.is_finite()) {
                return Err(FitError::NonFiniteTarget { edge: e.index(), hour });
            }
        }
        Ok(Self { values, sensor_edges })
    }

    /// Build from sparse `(edge, hour, count)` observations.  Every edge
    /// that appears at least once is a sensor edge.
    pub fn from_observations<I>(edge_count: usize, observations: I) -> FitResult<Self>
    where
        I: IntoIterator<Item = (EdgeId, Hour, f32)>,
    {
        let mut values = Array2::zeros((edge_count, HOURS_PER_DAY));
        let mut sensors = Vec::new();
        for (edge, hour, count) in observations {
            if edge.index() >= edge_count {
                return Err(FitError::InvalidEdgeIndex { edge: edge.index(), edge_count });
            }
            values[[edge.index(), hour.index()]] += count;
            sensors.push(edge);
        }
        Self::new(values, sensors)
    }

    pub fn edge_count(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn sensor_edges(&self) -> &[EdgeId] {
        &self.sensor_edges
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_edges.len()
    }

    pub fn is_observed(&self, edge: EdgeId) -> bool {
        self.sensor_edges.binary_search(&edge).is_ok()
    }

    #[inline]
    pub fn value(&self, edge: EdgeId, hour: Hour) -> f32 {
        self.values[[edge.index(), hour.index()]]
    }
}

// ── Counts loading ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CountRecord {
    link_id: String,
    hour:    usize,
    volume:  f32,
}

/// Load hourly link counts for `network`.
pub fn load_counts_csv(path: &Path, network: &RoadNetwork) -> FitResult<SensorTarget> {
    let file = std::fs::File::open(path)?;
    load_counts_reader(file, network)
}

/// Like [`load_counts_csv`] but accepts any `Read` source.
pub fn load_counts_reader<R: Read>(reader: R, network: &RoadNetwork) -> FitResult<SensorTarget> {
    let mut observations = Vec::new();
    let mut skipped = 0usize;
    for record in csv::Reader::from_reader(reader).deserialize() {
        let r: CountRecord = record?;
        let Some(edge) = network.edge_by_ext_id(&r.link_id) else {
            if skipped == 0 {
                warn!("counts reference link {:?} which is not in network {:?}; skipping", r.link_id, network.name);
            }
            skipped += 1;
            continue;
        };
        observations.push((edge, Hour::new(r.hour)?, r.volume));
    }
    if skipped > 1 {
        warn!("skipped {skipped} count rows for unknown links");
    }

    let target = SensorTarget::from_observations(network.edge_count(), observations)?;
    debug!("loaded counts: {} sensor edges of {}", target.sensor_count(), target.edge_count());
    Ok(target)
}
