//! Built-in toy scenario: a small two-way grid split into four quadrant
//! clusters, with sensor counts generated from a known commuting pattern.

use anyhow::Result;
use ndarray::Array2;

use tam_core::{EdgeId, NodeId, Point2, HOURS_PER_DAY};
use tam_matrix::{ClusterAssignment, TrafficAssignmentMatrix};
use tam_network::{RoadNetwork, RoadNetworkBuilder};

pub const GRID_SIDE:     usize = 6;
pub const NUM_CLUSTERS:  usize = 4;
const BLOCK_LENGTH:      f64   = 250.0; // metres between intersections
const SENSOR_EVERY:      usize = 3;     // every third link carries a counter
const BASE_FLOW:         f32   = 4.0;

/// `GRID_SIDE × GRID_SIDE` grid with a link each way between neighbours.
pub fn build_network() -> Result<RoadNetwork> {
    let mut b = RoadNetworkBuilder::with_capacity(GRID_SIDE * GRID_SIDE, 4 * GRID_SIDE * (GRID_SIDE - 1));
    let node = |r: usize, c: usize| NodeId((r * GRID_SIDE + c) as u32);

    for r in 0..GRID_SIDE {
        for c in 0..GRID_SIDE {
            b.add_node(format!("n{r}_{c}"), Point2::new(c as f64 * BLOCK_LENGTH, r as f64 * BLOCK_LENGTH))?;
        }
    }

    let mut road = |from: NodeId, to: NodeId| -> Result<()> {
        let k = b.edge_count();
        b.add_link(format!("l{k}"), from, to, BLOCK_LENGTH)?;
        b.add_link(format!("l{}", k + 1), to, from, BLOCK_LENGTH)?;
        Ok(())
    };
    for r in 0..GRID_SIDE {
        for c in 0..GRID_SIDE {
            if c + 1 < GRID_SIDE {
                road(node(r, c), node(r, c + 1))?;
            }
            if r + 1 < GRID_SIDE {
                road(node(r, c), node(r + 1, c))?;
            }
        }
    }
    Ok(b.build("toy_grid"))
}

/// Quadrant labels: 0 = north-west, 1 = north-east, 2 = south-west, 3 = south-east.
pub fn quadrant_clusters(network: &RoadNetwork) -> Result<ClusterAssignment> {
    let half = GRID_SIDE / 2;
    let labels: Vec<u32> = (0..GRID_SIDE * GRID_SIDE)
        .map(|i| {
            let (r, c) = (i / GRID_SIDE, i % GRID_SIDE);
            (usize::from(r >= half) * 2 + usize::from(c >= half)) as u32
        })
        .collect();
    Ok(ClusterAssignment::from_labels(network, &labels, NUM_CLUSTERS)?)
}

/// Relative demand in hour `h`: a floor plus morning and evening peaks.
fn peak_profile(h: usize) -> f32 {
    let bump = |centre: f32| (-(h as f32 - centre).powi(2) / 4.0).exp();
    0.2 + 2.0 * bump(8.0) + 2.0 * bump(17.0)
}

/// The flows the toy counts are generated from, `(Z², 24)`.
pub fn ground_truth_flows() -> Array2<f32> {
    let mut w = Array2::zeros((NUM_CLUSTERS * NUM_CLUSTERS, HOURS_PER_DAY));
    for o in 0..NUM_CLUSTERS {
        for d in 0..NUM_CLUSTERS {
            if o == d {
                continue;
            }
            // Cluster 0 is the residential quadrant, cluster 3 the office park.
            let weight = match (o, d) {
                (0, 3) | (3, 0) => 3.0,
                _ => 1.0,
            };
            for h in 0..HOURS_PER_DAY {
                w[[o * NUM_CLUSTERS + d, h]] = BASE_FLOW * weight * peak_profile(h);
            }
        }
    }
    w
}

/// Counts on every `SENSOR_EVERY`-th link, produced by assigning the ground
/// truth through `tam`.
pub fn sensor_counts(tam: &TrafficAssignmentMatrix) -> Result<(Array2<f32>, Vec<EdgeId>)> {
    let values = tam.apply(ground_truth_flows().view())?;
    let sensors = (0..tam.edge_count()).step_by(SENSOR_EVERY).map(|e| EdgeId(e as u32)).collect();
    Ok((values, sensors))
}
