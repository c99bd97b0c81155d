//! Cluster assignment: node → cluster, plus one centroid node per cluster.
//!
//! Clustering itself (k-means over node positions) happens upstream; this
//! module only validates and indexes its output.
//!
//! # Label CSV format
//!
//! ```csv
//! node_id,cluster
//! n0,0
//! n1,0
//! n2,1
//! ```
//!
//! Every network node must appear exactly once.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use tam_core::{ClusterId, NodeId, Point2};
use tam_network::RoadNetwork;

use crate::{MatrixError, MatrixResult};

/// Validated partition of the network's nodes into `Z` clusters.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAssignment {
    cluster_of:  Vec<ClusterId>,
    centroid_of: Vec<NodeId>,
    /// Members per cluster, ascending `NodeId`.
    members:     Vec<Vec<NodeId>>,
}

impl ClusterAssignment {
    /// Build from per-node labels, choosing each cluster's centroid as the
    /// network node nearest to the mean position of its members.
    ///
    /// The nearest node is searched over the whole network, not only over
    /// the cluster's members.
    pub fn from_labels(network: &RoadNetwork, labels: &[u32], num_clusters: usize) -> MatrixResult<Self> {
        let (cluster_of, members) = group(network, labels, num_clusters)?;

        let mut centroid_of = Vec::with_capacity(num_clusters);
        for (c, nodes) in members.iter().enumerate() {
            let mean = Point2::centroid(nodes.iter().map(|n| network.node_pos[n.index()]))
                .ok_or(MatrixError::EmptyCluster(ClusterId(c as u32)))?;
            // Non-empty cluster implies a non-empty network.
            let node = network
                .nearest_node(mean)
                .ok_or(MatrixError::EmptyCluster(ClusterId(c as u32)))?;
            centroid_of.push(node);
        }

        Ok(Self { cluster_of, centroid_of, members })
    }

    /// Build from per-node labels and explicitly chosen centroid nodes.
    /// `Z` is `centroids.len()`.
    pub fn with_centroids(network: &RoadNetwork, labels: &[u32], centroids: &[NodeId]) -> MatrixResult<Self> {
        let (cluster_of, members) = group(network, labels, centroids.len())?;
        for &node in centroids {
            network.check_node(node)?;
        }
        Ok(Self { cluster_of, centroid_of: centroids.to_vec(), members })
    }

    pub fn num_clusters(&self) -> usize {
        self.centroid_of.len()
    }

    pub fn node_count(&self) -> usize {
        self.cluster_of.len()
    }

    #[inline]
    pub fn cluster_of(&self, node: NodeId) -> ClusterId {
        self.cluster_of[node.index()]
    }

    #[inline]
    pub fn centroid(&self, cluster: ClusterId) -> NodeId {
        self.centroid_of[cluster.index()]
    }

    pub fn centroids(&self) -> &[NodeId] {
        &self.centroid_of
    }

    pub fn members(&self, cluster: ClusterId) -> &[NodeId] {
        &self.members[cluster.index()]
    }

    pub fn clusters(&self) -> impl Iterator<Item = ClusterId> {
        (0..self.num_clusters() as u32).map(ClusterId)
    }
}

fn group(
    network:      &RoadNetwork,
    labels:       &[u32],
    num_clusters: usize,
) -> MatrixResult<(Vec<ClusterId>, Vec<Vec<NodeId>>)> {
    if num_clusters == 0 {
        return Err(MatrixError::NoClusters);
    }
    if labels.len() != network.node_count() {
        return Err(MatrixError::ShapeMismatch {
            what:     "cluster labels",
            expected: network.node_count(),
            got:      labels.len(),
        });
    }

    let mut members = vec![Vec::new(); num_clusters];
    let mut cluster_of = Vec::with_capacity(labels.len());
    for (node, &label) in labels.iter().enumerate() {
        if label as usize >= num_clusters {
            return Err(MatrixError::LabelOutOfRange { node, label, num_clusters });
        }
        cluster_of.push(ClusterId(label));
        members[label as usize].push(NodeId(node as u32));
    }
    if let Some(c) = members.iter().position(Vec::is_empty) {
        return Err(MatrixError::EmptyCluster(ClusterId(c as u32)));
    }
    Ok((cluster_of, members))
}

// ── Label loading ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LabelRecord {
    node_id: String,
    cluster: u32,
}

/// Load per-node cluster labels, indexed by `NodeId`.
pub fn load_labels_csv(path: &Path, network: &RoadNetwork) -> MatrixResult<Vec<u32>> {
    let file = std::fs::File::open(path)?;
    load_labels_reader(file, network)
}

/// Like [`load_labels_csv`] but accepts any `Read` source.
pub fn load_labels_reader<R: Read>(reader: R, network: &RoadNetwork) -> MatrixResult<Vec<u32>> {
    let mut labels: Vec<Option<u32>> = vec![None; network.node_count()];
    for record in csv::Reader::from_reader(reader).deserialize() {
        let r: LabelRecord = record?;
        let node = network
            .node_by_ext_id(&r.node_id)
            .ok_or_else(|| MatrixError::UnknownNode(r.node_id.clone()))?;
        labels[node.index()] = Some(r.cluster);
    }
    labels
        .into_iter()
        .enumerate()
        .map(|(i, l)| l.ok_or_else(|| MatrixError::MissingLabel(network.node_ext_id[i].clone())))
        .collect()
}
