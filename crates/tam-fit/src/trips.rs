//! Synthetic trips drawn from fitted flows.
//!
//! Every `(origin, destination, hour)` cell yields `round(W)` trips.  Each
//! trip leaves a uniformly chosen member node of the origin cluster for a
//! uniformly chosen member node of the destination cluster at a random minute
//! of the hour, and returns [`RETURN_AFTER_HOURS`] later at the same minute.

use tam_core::{ClusterId, Hour, NodeId, OdPair, SeededRng, HOURS_PER_DAY};
use tam_matrix::ClusterAssignment;

use crate::{FitError, FitResult, FittedFlows};

pub const RETURN_AFTER_HOURS: usize = 8;

/// Largest trip count a single `(origin, destination, hour)` cell may yield.
pub const MAX_TRIPS_PER_CELL: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    /// 1-based, in sampling order.
    pub id:                  u64,
    pub origin_cluster:      ClusterId,
    pub destination_cluster: ClusterId,
    pub origin_node:         NodeId,
    pub destination_node:    NodeId,
    pub hour:                Hour,
    pub minute:              u8,
}

impl Trip {
    pub fn return_hour(&self) -> Hour {
        self.hour.wrapping_add(RETURN_AFTER_HOURS)
    }

    /// `HH:MM:00`
    pub fn departure_time(&self) -> String {
        self.hour.clock_time(self.minute)
    }

    pub fn return_time(&self) -> String {
        self.return_hour().clock_time(self.minute)
    }
}

/// Trips drawn for one flow cell.  Negative and non-finite flows give none;
/// halves round away from zero.
#[inline]
pub fn trip_count(flow: f32) -> u64 {
    if flow.is_finite() && flow > 0.0 { flow.round() as u64 } else { 0 }
}

/// Sample trips for every cell of `flows`, in origin, destination, hour order.
///
/// Fails with [`FitError::TooManyTrips`] before drawing anything if a cell
/// rounds to more than [`MAX_TRIPS_PER_CELL`] trips.
pub fn sample_trips(
    flows:    &FittedFlows,
    clusters: &ClusterAssignment,
    rng:      &mut SeededRng,
) -> FitResult<Vec<Trip>> {
    let z = clusters.num_clusters();
    if flows.num_clusters != z {
        return Err(FitError::ShapeMismatch { what: "flow clusters", expected: z, got: flows.num_clusters });
    }
    if flows.w.dim() != (z * z, HOURS_PER_DAY) {
        return Err(FitError::ShapeMismatch { what: "flow rows", expected: z * z, got: flows.w.nrows() });
    }

    for ((row, h), &flow) in flows.w.indexed_iter() {
        if trip_count(flow) > MAX_TRIPS_PER_CELL {
            return Err(FitError::TooManyTrips {
                pair:  OdPair::from_column(row, z),
                hour:  Hour::new(h)?,
                flow,
                limit: MAX_TRIPS_PER_CELL,
            });
        }
    }

    let mut trips = Vec::new();
    for origin in clusters.clusters() {
        for destination in clusters.clusters() {
            let row = flows.w.row(origin.index() * z + destination.index());
            for (hour, &flow) in Hour::all().zip(row.iter()) {
                for _ in 0..trip_count(flow) {
                    // Clusters are never empty.
                    let (Some(&o), Some(&d)) =
                        (rng.choose(clusters.members(origin)), rng.choose(clusters.members(destination)))
                    else {
                        continue;
                    };
                    trips.push(Trip {
                        id:                  trips.len() as u64 + 1,
                        origin_cluster:      origin,
                        destination_cluster: destination,
                        origin_node:         o,
                        destination_node:    d,
                        hour,
                        minute:              rng.gen_range(0..60u8),
                    });
                }
            }
        }
    }
    Ok(trips)
}
