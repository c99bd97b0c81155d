//! Road network representation and builder.
//!
//! # Data layout
//!
//! Edges keep the index they were added with: `EdgeId(k)` is the k-th link
//! of the source network for the whole lifetime of the dataset, because that
//! index is also the row of the traffic assignment matrix and of the sensor
//! target.  Parallel links and self-loops are kept as distinct edges.
//!
//! Outgoing adjacency is a **Compressed Sparse Row** index over those stable
//! ids.  The outgoing edges of `NodeId n` are
//!
//! ```text
//! out_edges[ node_out_start[n] .. node_out_start[n+1] ]
//! ```
//!
//! and within one node they are sorted by ascending `EdgeId`, which fixes the
//! relaxation order of every search.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps a planar point to the nearest `NodeId`.  Used
//! to pick the representative node of each cluster.

use std::hash::{Hash, Hasher};

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::{FxHashMap, FxHasher};

use tam_core::{EdgeId, NodeId, Point2};

use crate::{SpatialError, SpatialResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct NodeEntry {
    point: [f64; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── RoadNetwork ───────────────────────────────────────────────────────────────

/// Directed road graph in CSR format plus a spatial index.
///
/// All array fields are `pub` for direct indexed access on hot paths.  Do not
/// construct directly; use [`RoadNetworkBuilder`], which validates indices
/// and weights.
#[derive(Debug)]
pub struct RoadNetwork {
    /// Identity of the source network (e.g. the input file stem).  Part of
    /// the TAM cache key.
    pub name: String,

    // ── Node data ─────────────────────────────────────────────────────────
    pub node_pos:    Vec<Point2>,
    /// External id of each node, for round-tripping to the source format.
    pub node_ext_id: Vec<String>,

    // ── CSR adjacency ─────────────────────────────────────────────────────
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,
    pub out_edges:      Vec<EdgeId>,

    // ── Edge data (indexed by EdgeId = insertion order) ───────────────────
    pub edge_from:   Vec<NodeId>,
    pub edge_to:     Vec<NodeId>,
    /// Link length.  Finite and non-negative by construction.
    pub edge_length: Vec<f64>,
    pub edge_ext_id: Vec<String>,

    node_lookup: FxHashMap<String, NodeId>,
    edge_lookup: FxHashMap<String, EdgeId>,
    spatial_idx: RTree<NodeEntry>,
}

impl RoadNetwork {
    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    /// Fail with [`SpatialError::InvalidNodeIndex`] unless `node` is in range.
    pub fn check_node(&self, node: NodeId) -> SpatialResult<()> {
        if node.index() < self.node_count() {
            Ok(())
        } else {
            Err(SpatialError::InvalidNodeIndex { node, node_count: self.node_count() })
        }
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// Outgoing edges of `node` in ascending `EdgeId` order.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> &[EdgeId] {
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        &self.out_edges[start..end]
    }

    #[inline]
    pub fn is_self_loop(&self, edge: EdgeId) -> bool {
        self.edge_from[edge.index()] == self.edge_to[edge.index()]
    }

    // ── External ids ──────────────────────────────────────────────────────

    pub fn node_by_ext_id(&self, id: &str) -> Option<NodeId> {
        self.node_lookup.get(id).copied()
    }

    pub fn edge_by_ext_id(&self, id: &str) -> Option<EdgeId> {
        self.edge_lookup.get(id).copied()
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// Nearest node to `pos`; `None` only for an empty network.
    pub fn nearest_node(&self, pos: Point2) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.x, pos.y])
            .map(|e| e.id)
    }

    // ── Identity ──────────────────────────────────────────────────────────

    /// Deterministic hash of the graph structure: node count, and every
    /// edge's endpoints and length bits, in edge order.
    ///
    /// Stored in TAM cache headers so that a cache written for a different
    /// version of a same-named network is rejected.
    pub fn fingerprint(&self) -> u64 {
        let mut h = FxHasher::default();
        self.node_count().hash(&mut h);
        self.edge_count().hash(&mut h);
        for e in 0..self.edge_count() {
            self.edge_from[e].0.hash(&mut h);
            self.edge_to[e].0.hash(&mut h);
            self.edge_length[e].to_bits().hash(&mut h);
        }
        h.finish()
    }
}

// ── RoadNetworkBuilder ────────────────────────────────────────────────────────

/// Construct a [`RoadNetwork`] incrementally, then call [`build`](Self::build).
///
/// Validation happens as links are added: an out-of-range endpoint or a
/// negative/non-finite length is rejected before any search can run.
///
/// # Example
///
/// ```
/// use tam_core::Point2;
/// use tam_network::RoadNetworkBuilder;
///
/// let mut b = RoadNetworkBuilder::new();
/// let a = b.add_node("a", Point2::new(0.0, 0.0)).unwrap();
/// let c = b.add_node("c", Point2::new(100.0, 0.0)).unwrap();
/// b.add_link("ac", a, c, 100.0).unwrap();
/// let net = b.build("demo");
/// assert_eq!(net.node_count(), 2);
/// assert_eq!(net.edge_count(), 1);
/// ```
#[derive(Default)]
pub struct RoadNetworkBuilder {
    node_pos:    Vec<Point2>,
    node_ext_id: Vec<String>,
    node_lookup: FxHashMap<String, NodeId>,

    edge_from:   Vec<NodeId>,
    edge_to:     Vec<NodeId>,
    edge_length: Vec<f64>,
    edge_ext_id: Vec<String>,
    edge_lookup: FxHashMap<String, EdgeId>,
}

impl RoadNetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate for bulk loading.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            node_pos:    Vec::with_capacity(nodes),
            node_ext_id: Vec::with_capacity(nodes),
            edge_from:   Vec::with_capacity(edges),
            edge_to:     Vec::with_capacity(edges),
            edge_length: Vec::with_capacity(edges),
            edge_ext_id: Vec::with_capacity(edges),
            ..Self::default()
        }
    }

    /// Add a node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, ext_id: impl Into<String>, pos: Point2) -> SpatialResult<NodeId> {
        let ext_id = ext_id.into();
        if !(pos.x.is_finite() && pos.y.is_finite()) {
            return Err(SpatialError::InvalidPosition { node: ext_id });
        }
        if self.node_lookup.contains_key(&ext_id) {
            return Err(SpatialError::DuplicateNode(ext_id));
        }
        let id = NodeId(self.node_pos.len() as u32);
        self.node_lookup.insert(ext_id.clone(), id);
        self.node_pos.push(pos);
        self.node_ext_id.push(ext_id);
        Ok(id)
    }

    /// Add a directed link and return its `EdgeId` (sequential from 0).
    pub fn add_link(
        &mut self,
        ext_id: impl Into<String>,
        from:   NodeId,
        to:     NodeId,
        length: f64,
    ) -> SpatialResult<EdgeId> {
        let ext_id = ext_id.into();
        let node_count = self.node_pos.len();
        for node in [from, to] {
            if node.index() >= node_count {
                return Err(SpatialError::InvalidNodeIndex { node, node_count });
            }
        }
        if !length.is_finite() || length < 0.0 {
            return Err(SpatialError::InvalidEdgeWeight { link: ext_id, weight: length });
        }
        if self.edge_lookup.contains_key(&ext_id) {
            return Err(SpatialError::DuplicateLink(ext_id));
        }
        let id = EdgeId(self.edge_from.len() as u32);
        self.edge_lookup.insert(ext_id.clone(), id);
        self.edge_from.push(from);
        self.edge_to.push(to);
        self.edge_length.push(length);
        self.edge_ext_id.push(ext_id);
        Ok(id)
    }

    /// Like [`add_link`](Self::add_link) with endpoints given by external id.
    pub fn add_link_by_ext_id(
        &mut self,
        ext_id: impl Into<String>,
        from:   &str,
        to:     &str,
        length: f64,
    ) -> SpatialResult<EdgeId> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        self.add_link(ext_id, from, to, length)
    }

    fn resolve(&self, ext_id: &str) -> SpatialResult<NodeId> {
        self.node_lookup
            .get(ext_id)
            .copied()
            .ok_or_else(|| SpatialError::UnknownNode(ext_id.to_owned()))
    }

    pub fn node_count(&self) -> usize { self.node_pos.len() }
    pub fn edge_count(&self) -> usize { self.edge_from.len() }

    /// Consume the builder and produce a [`RoadNetwork`] named `name`.
    ///
    /// O(N + E) for the CSR index (counting sort, stable in edge order) plus
    /// O(N log N) for the R-tree bulk load.
    pub fn build(self, name: impl Into<String>) -> RoadNetwork {
        let node_count = self.node_pos.len();
        let edge_count = self.edge_from.len();

        let mut node_out_start = vec![0u32; node_count + 1];
        for from in &self.edge_from {
            node_out_start[from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, edge_count);

        // Scatter in edge order so each node's slice stays sorted by EdgeId.
        let mut cursor: Vec<u32> = node_out_start[..node_count].to_vec();
        let mut out_edges = vec![EdgeId::INVALID; edge_count];
        for (e, from) in self.edge_from.iter().enumerate() {
            let slot = &mut cursor[from.index()];
            out_edges[*slot as usize] = EdgeId(e as u32);
            *slot += 1;
        }

        let entries: Vec<NodeEntry> = self
            .node_pos
            .iter()
            .enumerate()
            .map(|(i, pos)| NodeEntry { point: [pos.x, pos.y], id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        RoadNetwork {
            name: name.into(),
            node_pos: self.node_pos,
            node_ext_id: self.node_ext_id,
            node_out_start,
            out_edges,
            edge_from: self.edge_from,
            edge_to: self.edge_to,
            edge_length: self.edge_length,
            edge_ext_id: self.edge_ext_id,
            node_lookup: self.node_lookup,
            edge_lookup: self.edge_lookup,
            spatial_idx,
        }
    }
}
