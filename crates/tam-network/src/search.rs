//! Single-source shortest-path trees.
//!
//! # Why trees, not pair queries
//!
//! The assignment matrix needs the path between every ordered pair of
//! cluster centroids.  One single-source search per centroid yields a
//! predecessor tree from which all `Z` paths out of that centroid are read
//! off, so a full build costs `Z` searches instead of `Z²`.
//!
//! # Cost policies
//!
//! | Policy              | Engine               | Cost of an edge     |
//! |---------------------|----------------------|---------------------|
//! | `CostPolicy::Length`| [`DijkstraSearch`]   | link length         |
//! | `CostPolicy::Hops`  | [`BreadthFirstSearch`]| 1                  |
//!
//! # Determinism
//!
//! Out-edges are scanned in ascending `EdgeId`.  The Dijkstra frontier pops
//! by `(cost, NodeId)`; when a node that is not yet settled is reached again
//! at exactly its current cost, the lower `EdgeId` becomes its parent.  BFS
//! keeps the first discovery.  Self-loops are never relaxed.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use tam_core::{EdgeId, NodeId};

use crate::network::RoadNetwork;
use crate::{SpatialError, SpatialResult};

// ── CostPolicy ────────────────────────────────────────────────────────────────

/// Which edge cost a search minimises.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostPolicy {
    /// Sum of link lengths (Dijkstra).
    #[default]
    Length,
    /// Number of links (breadth-first search).
    Hops,
}

impl CostPolicy {
    /// Run the engine matching this policy.
    pub fn search(self, network: &RoadNetwork, source: NodeId) -> SpatialResult<ShortestPathTree> {
        match self {
            CostPolicy::Length => DijkstraSearch.tree(network, source),
            CostPolicy::Hops => BreadthFirstSearch.tree(network, source),
        }
    }

    /// Stable numeric tag, used in cache headers.
    pub fn tag(self) -> u8 {
        match self {
            CostPolicy::Length => 0,
            CostPolicy::Hops => 1,
        }
    }
}

// ── ShortestPathTree ──────────────────────────────────────────────────────────

/// Predecessor tree rooted at one source node.
///
/// Every node reachable from the source has a finite distance and, unless it
/// is the source, a `(parent node, parent edge)` entry.  Unreachable nodes
/// have neither.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    source:      NodeId,
    dist:        Vec<f64>,
    parent_node: Vec<NodeId>,
    parent_edge: Vec<EdgeId>,
}

impl ShortestPathTree {
    fn rooted_at(source: NodeId, node_count: usize) -> Self {
        let mut tree = Self {
            source,
            dist:        vec![f64::INFINITY; node_count],
            parent_node: vec![NodeId::INVALID; node_count],
            parent_edge: vec![EdgeId::INVALID; node_count],
        };
        tree.dist[source.index()] = 0.0;
        tree
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn node_count(&self) -> usize {
        self.dist.len()
    }

    /// Shortest-path cost from the source, `None` if unreachable or out of
    /// range.
    pub fn distance(&self, node: NodeId) -> Option<f64> {
        self.dist.get(node.index()).copied().filter(|d| d.is_finite())
    }

    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.distance(node).is_some()
    }

    /// Number of nodes reachable from the source, source included.
    pub fn reachable_count(&self) -> usize {
        self.dist.iter().filter(|d| d.is_finite()).count()
    }

    /// `(predecessor node, edge used)` for a reachable non-source node.
    pub fn parent(&self, node: NodeId) -> Option<(NodeId, EdgeId)> {
        let e = *self.parent_edge.get(node.index())?;
        e.is_valid().then(|| (self.parent_node[node.index()], e))
    }

    /// Append the edges of the tree path from the source to `target` onto
    /// `out`, in travel order.  `out` is cleared first.
    ///
    /// The source itself yields an empty path.
    pub fn path_edges_into(&self, target: NodeId, out: &mut Vec<EdgeId>) -> SpatialResult<()> {
        out.clear();
        if target.index() >= self.node_count() {
            return Err(SpatialError::InvalidNodeIndex { node: target, node_count: self.node_count() });
        }
        if !self.is_reachable(target) {
            return Err(SpatialError::NoPathExists { from: self.source, to: target });
        }
        let mut cur = target;
        while cur != self.source {
            let e = self.parent_edge[cur.index()];
            debug_assert!(e.is_valid(), "reachable node without parent");
            out.push(e);
            cur = self.parent_node[cur.index()];
        }
        out.reverse();
        Ok(())
    }

    /// Tree path from the source to `target`.
    pub fn path_edges(&self, target: NodeId) -> SpatialResult<Vec<EdgeId>> {
        let mut edges = Vec::new();
        self.path_edges_into(target, &mut edges)?;
        Ok(edges)
    }

    /// Extract a [`Route`] to `target`.
    pub fn route_to(&self, target: NodeId) -> SpatialResult<Route> {
        let edges = self.path_edges(target)?;
        Ok(Route { edges, cost: self.dist[target.index()] })
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// An ordered list of `EdgeId`s from source to destination and its cost.
#[derive(Debug, Clone)]
pub struct Route {
    pub edges: Vec<EdgeId>,
    /// Cost under the policy that produced the route.
    pub cost:  f64,
}

// ── PathSearch trait ──────────────────────────────────────────────────────────

/// A single-source shortest-path engine.
///
/// `Send + Sync` so one engine can be shared by the Rayon workers that build
/// the assignment matrix.
pub trait PathSearch: Send + Sync {
    fn policy(&self) -> CostPolicy;

    /// Build the shortest-path tree rooted at `source`.
    ///
    /// Fails with [`SpatialError::InvalidNodeIndex`] for an out-of-range
    /// source.
    fn tree(&self, network: &RoadNetwork, source: NodeId) -> SpatialResult<ShortestPathTree>;

    /// Single pair route; [`SpatialError::NoPathExists`] if disconnected.
    fn route(&self, network: &RoadNetwork, from: NodeId, to: NodeId) -> SpatialResult<Route> {
        network.check_node(to)?;
        self.tree(network, from)?.route_to(to)
    }
}

// ── DijkstraSearch ────────────────────────────────────────────────────────────

/// Dijkstra's algorithm over link lengths.
pub struct DijkstraSearch;

/// Frontier entry ordered so `BinaryHeap` (a max-heap) pops the smallest
/// `(cost, node)` first.
#[derive(Copy, Clone, PartialEq)]
struct Frontier {
    cost: f64,
    node: NodeId,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PathSearch for DijkstraSearch {
    fn policy(&self) -> CostPolicy {
        CostPolicy::Length
    }

    fn tree(&self, network: &RoadNetwork, source: NodeId) -> SpatialResult<ShortestPathTree> {
        network.check_node(source)?;

        let n = network.node_count();
        let mut tree = ShortestPathTree::rooted_at(source, n);
        let mut settled = vec![false; n];

        let mut heap = BinaryHeap::new();
        heap.push(Frontier { cost: 0.0, node: source });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if settled[node.index()] {
                continue;
            }
            settled[node.index()] = true;

            for &edge in network.out_edges(node) {
                let next = network.edge_to[edge.index()];
                if network.is_self_loop(edge) || settled[next.index()] {
                    continue;
                }
                let new_cost = cost + network.edge_length[edge.index()];
                let known = tree.dist[next.index()];

                if new_cost < known {
                    tree.dist[next.index()] = new_cost;
                    tree.parent_node[next.index()] = node;
                    tree.parent_edge[next.index()] = edge;
                    heap.push(Frontier { cost: new_cost, node: next });
                } else if new_cost == known && edge < tree.parent_edge[next.index()] {
                    tree.parent_node[next.index()] = node;
                    tree.parent_edge[next.index()] = edge;
                }
            }
        }

        Ok(tree)
    }
}

// ── BreadthFirstSearch ────────────────────────────────────────────────────────

/// Breadth-first search; every link costs one hop.
pub struct BreadthFirstSearch;

impl PathSearch for BreadthFirstSearch {
    fn policy(&self) -> CostPolicy {
        CostPolicy::Hops
    }

    fn tree(&self, network: &RoadNetwork, source: NodeId) -> SpatialResult<ShortestPathTree> {
        network.check_node(source)?;

        let mut tree = ShortestPathTree::rooted_at(source, network.node_count());
        let mut queue = VecDeque::new();
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            let hops = tree.dist[node.index()] + 1.0;
            for &edge in network.out_edges(node) {
                let next = network.edge_to[edge.index()];
                if tree.dist[next.index()].is_finite() {
                    continue;
                }
                tree.dist[next.index()] = hops;
                tree.parent_node[next.index()] = node;
                tree.parent_edge[next.index()] = edge;
                queue.push_back(next);
            }
        }

        Ok(tree)
    }
}
