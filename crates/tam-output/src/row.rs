//! Plain data row types written by output backends, and their builders.

use ndarray::Array2;

use tam_fit::{FittedFlows, StepMetrics, Trip};
use tam_matrix::ClusterAssignment;
use tam_network::RoadNetwork;

use crate::{OutputError, OutputResult};

/// Loss and MAD at one logged step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRow {
    pub step: u64,
    pub loss: f32,
    pub mad:  f32,
}

impl From<&StepMetrics> for MetricRow {
    fn from(m: &StepMetrics) -> Self {
        Self { step: m.step, loss: m.loss, mad: m.mad }
    }
}

/// One `(origin, destination, hour)` cell of the fitted flows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdFlowRow {
    pub origin:      u32,
    pub destination: u32,
    pub hour:        u8,
    pub flow:        f32,
}

/// Predicted flow on one link in one hour.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkFlowRow {
    /// External link id.
    pub edge_id: String,
    pub hour:    u8,
    pub flow:    f32,
}

/// Cluster membership of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRow {
    pub cluster: u32,
    /// External node id.
    pub node_id: String,
}

/// One sampled trip with external node ids and clock times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripRow {
    pub trip_id:          u64,
    pub origin_node:      String,
    pub destination_node: String,
    /// `HH:MM:00`
    pub departure:        String,
    /// `HH:MM:00`
    pub return_time:      String,
}

// ── Row builders ──────────────────────────────────────────────────────────────

/// Every cell of `flows`, origin-major then hour.
pub fn od_rows(flows: &FittedFlows) -> Vec<OdFlowRow> {
    let od = flows.od();
    od.indexed_iter()
        .map(|((i, j, h), &flow)| OdFlowRow {
            origin:      i as u32,
            destination: j as u32,
            hour:        h as u8,
            flow,
        })
        .collect()
}

/// Link rows from an `(E, 24)` prediction.
pub fn link_rows(network: &RoadNetwork, predicted: &Array2<f32>) -> OutputResult<Vec<LinkFlowRow>> {
    if predicted.nrows() != network.edge_count() {
        return Err(OutputError::ShapeMismatch {
            what:     "predicted link flow rows",
            expected: network.edge_count(),
            got:      predicted.nrows(),
        });
    }
    Ok(predicted
        .indexed_iter()
        .map(|((e, h), &flow)| LinkFlowRow { edge_id: network.edge_ext_id[e].clone(), hour: h as u8, flow })
        .collect())
}

/// Members of every cluster, ascending cluster then node index.
pub fn cluster_rows(network: &RoadNetwork, clusters: &ClusterAssignment) -> Vec<ClusterRow> {
    clusters
        .clusters()
        .flat_map(|c| {
            clusters.members(c).iter().map(move |n| ClusterRow {
                cluster: c.0,
                node_id: network.node_ext_id[n.index()].clone(),
            })
        })
        .collect()
}

pub fn trip_rows(network: &RoadNetwork, trips: &[Trip]) -> Vec<TripRow> {
    trips
        .iter()
        .map(|t| TripRow {
            trip_id:          t.id,
            origin_node:      network.node_ext_id[t.origin_node.index()].clone(),
            destination_node: network.node_ext_id[t.destination_node.index()].clone(),
            departure:        t.departure_time(),
            return_time:      t.return_time(),
        })
        .collect()
}
