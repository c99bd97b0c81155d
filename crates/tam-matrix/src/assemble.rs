//! TAM assembly: one shortest-path tree per origin centroid, one column per
//! ordered cluster pair.
//!
//! # Work split
//!
//! ```text
//! for origin i in 0..Z            (parallel with the `parallel` feature)
//!   tree_i = search(centroid(i))
//!   for destination j in 0..Z
//!     column i·Z + j = edges of tree_i path to centroid(j)   (empty if i == j)
//! ```
//!
//! Each origin owns the contiguous column block `i·Z .. (i+1)·Z`, so workers
//! share nothing mutable.  Blocks are concatenated in origin order, which
//! makes the parallel and sequential builds identical.
//!
//! Destinations that the origin's tree does not reach leave their column
//! empty and are recorded in [`AssemblyReport::unreachable`]; a disconnected
//! network is a valid input.

use std::time::Instant;

use log::{debug, info, warn};

use tam_core::{ClusterId, EdgeId, OdPair};
use tam_network::{BreadthFirstSearch, CostPolicy, DijkstraSearch, PathSearch, RoadNetwork, SpatialError};

use crate::{ClusterAssignment, MatrixError, MatrixResult, TrafficAssignmentMatrix};

/// Diagnostics from one assembly run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub policy:      CostPolicy,
    /// Single-source searches run (one per cluster).
    pub searches:    usize,
    /// Total marked entries.
    pub nnz:         usize,
    /// Off-diagonal pairs whose destination centroid is unreachable, in
    /// column order.
    pub unreachable: Vec<OdPair>,
}

impl AssemblyReport {
    pub fn unreachable_count(&self) -> usize {
        self.unreachable.len()
    }
}

/// Assemble the TAM with the engine selected by `policy`.
pub fn assemble(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    policy:   CostPolicy,
) -> MatrixResult<(TrafficAssignmentMatrix, AssemblyReport)> {
    match policy {
        CostPolicy::Length => assemble_with(network, clusters, &DijkstraSearch),
        CostPolicy::Hops => assemble_with(network, clusters, &BreadthFirstSearch),
    }
}

/// Assemble the TAM with an explicit search engine.
pub fn assemble_with<S: PathSearch>(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    search:   &S,
) -> MatrixResult<(TrafficAssignmentMatrix, AssemblyReport)> {
    if clusters.node_count() != network.node_count() {
        return Err(MatrixError::ShapeMismatch {
            what:     "cluster assignment nodes",
            expected: network.node_count(),
            got:      clusters.node_count(),
        });
    }
    for &centroid in clusters.centroids() {
        network.check_node(centroid)?;
    }

    let z = clusters.num_clusters();
    let started = Instant::now();
    let blocks = origin_blocks(network, clusters, search)?;

    let mut columns = Vec::with_capacity(z * z);
    let mut unreachable = Vec::new();
    for block in blocks {
        columns.extend(block.columns);
        unreachable.extend(block.unreachable);
    }

    let tam = TrafficAssignmentMatrix::from_columns(network.edge_count(), z, columns)?;
    let report = AssemblyReport {
        policy: search.policy(),
        searches: z,
        nnz: tam.nnz(),
        unreachable,
    };

    info!(
        "assembled TAM for {:?}: {} edges x {} pairs, {} entries, {} searches in {:.2?}",
        network.name,
        tam.edge_count(),
        tam.num_columns(),
        report.nnz,
        report.searches,
        started.elapsed()
    );
    if report.unreachable_count() > 0 {
        warn!(
            "{} of {} cluster pairs are unreachable; their TAM columns are empty",
            report.unreachable_count(),
            z * (z - 1)
        );
    }
    Ok((tam, report))
}

/// Columns `i·Z .. (i+1)·Z` and the unreachable pairs among them.
#[derive(Debug, PartialEq)]
pub(crate) struct OriginBlock {
    pub(crate) columns:     Vec<Vec<EdgeId>>,
    pub(crate) unreachable: Vec<OdPair>,
}

/// Origin blocks in origin order, one search at a time.
pub(crate) fn sequential_origin_blocks<S: PathSearch>(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    search:   &S,
) -> MatrixResult<Vec<OriginBlock>> {
    clusters
        .clusters()
        .map(|origin| origin_block(network, clusters, search, origin))
        .collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn origin_blocks<S: PathSearch>(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    search:   &S,
) -> MatrixResult<Vec<OriginBlock>> {
    sequential_origin_blocks(network, clusters, search)
}

/// Origin blocks in origin order, one Rayon task per origin.  A single
/// cluster has nothing to split and runs inline.
#[cfg(feature = "parallel")]
pub(crate) fn origin_blocks<S: PathSearch>(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    search:   &S,
) -> MatrixResult<Vec<OriginBlock>> {
    use rayon::prelude::*;

    if clusters.num_clusters() < 2 {
        return sequential_origin_blocks(network, clusters, search);
    }
    (0..clusters.num_clusters() as u32)
        .into_par_iter()
        .map(|origin| origin_block(network, clusters, search, ClusterId(origin)))
        .collect()
}

fn origin_block<S: PathSearch>(
    network:  &RoadNetwork,
    clusters: &ClusterAssignment,
    search:   &S,
    origin:   ClusterId,
) -> MatrixResult<OriginBlock> {
    let tree = search.tree(network, clusters.centroid(origin))?;

    let mut block = OriginBlock {
        columns:     Vec::with_capacity(clusters.num_clusters()),
        unreachable: Vec::new(),
    };
    for destination in clusters.clusters() {
        let pair = OdPair::new(origin, destination);
        if pair.is_diagonal() {
            block.columns.push(Vec::new());
            continue;
        }
        match tree.path_edges(clusters.centroid(destination)) {
            Ok(edges) => block.columns.push(edges),
            Err(SpatialError::NoPathExists { from, to }) => {
                debug!("pair {pair}: no path from {from} to {to}");
                block.unreachable.push(pair);
                block.columns.push(Vec::new());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(block)
}
