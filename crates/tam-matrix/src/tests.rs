//! Unit tests for tam-matrix.

#[cfg(test)]
mod helpers {
    use tam_core::{NodeId, Point2};
    use tam_network::{RoadNetwork, RoadNetworkBuilder};

    use crate::ClusterAssignment;

    /// Directed square 0→1→2→3→0 (length 1 each) plus `extra` isolated
    /// nodes appended after node 3.
    pub fn square_with_isolated(extra: usize) -> RoadNetwork {
        let mut b = RoadNetworkBuilder::new();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (i, &(x, y)) in corners.iter().enumerate() {
            b.add_node(format!("n{i}"), Point2::new(x, y)).unwrap();
        }
        for k in 0..extra {
            b.add_node(format!("iso{k}"), Point2::new(5.0 + k as f64, 5.0)).unwrap();
        }
        for i in 0..4u32 {
            b.add_link(format!("l{i}"), NodeId(i), NodeId((i + 1) % 4), 1.0).unwrap();
        }
        b.build("toy4node")
    }

    /// Z = 2: clusters {0,1} and {2,3} with centroids 0 and 2.
    pub fn square_clusters(net: &RoadNetwork) -> ClusterAssignment {
        ClusterAssignment::with_centroids(net, &[0, 0, 1, 1], &[NodeId(0), NodeId(2)]).unwrap()
    }

    /// A 6×6 grid of two-way streets with varied lengths.
    pub fn grid() -> (RoadNetwork, ClusterAssignment) {
        let side = 6u32;
        let mut b = RoadNetworkBuilder::new();
        for r in 0..side {
            for c in 0..side {
                b.add_node(format!("g{r}_{c}"), Point2::new(c as f64 * 100.0, r as f64 * 100.0)).unwrap();
            }
        }
        let id = |r: u32, c: u32| NodeId(r * side + c);
        let mut k = 0;
        for r in 0..side {
            for c in 0..side {
                let len = 100.0 + ((r * 7 + c * 3) % 5) as f64 * 10.0;
                if c + 1 < side {
                    b.add_link(format!("e{k}"), id(r, c), id(r, c + 1), len).unwrap();
                    b.add_link(format!("e{}", k + 1), id(r, c + 1), id(r, c), len).unwrap();
                    k += 2;
                }
                if r + 1 < side {
                    b.add_link(format!("e{k}"), id(r, c), id(r + 1, c), len).unwrap();
                    b.add_link(format!("e{}", k + 1), id(r + 1, c), id(r, c), len).unwrap();
                    k += 2;
                }
            }
        }
        let net = b.build("grid6");
        // Quadrants → 4 clusters.
        let labels: Vec<u32> = (0..side * side)
            .map(|n| {
                let (r, c) = (n / side, n % side);
                (r / 3) * 2 + c / 3
            })
            .collect();
        let clusters = ClusterAssignment::from_labels(&net, &labels, 4).unwrap();
        (net, clusters)
    }

    pub fn dense_bits(tam: &crate::TrafficAssignmentMatrix) -> Vec<u32> {
        tam.to_dense().iter().map(|v| v.to_bits()).collect()
    }
}

// ── Cluster assignment ────────────────────────────────────────────────────────

#[cfg(test)]
mod cluster {
    use std::io::Cursor;

    use tam_core::{ClusterId, NodeId};

    use crate::{load_labels_reader, ClusterAssignment, MatrixError};

    #[test]
    fn members_and_centroids() {
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);
        assert_eq!(ca.num_clusters(), 2);
        assert_eq!(ca.cluster_of(NodeId(3)), ClusterId(1));
        assert_eq!(ca.members(ClusterId(0)), &[NodeId(0), NodeId(1)]);
        assert_eq!(ca.centroid(ClusterId(1)), NodeId(2));
    }

    #[test]
    fn centroid_is_nearest_node_to_mean() {
        let (net, ca) = super::helpers::grid();
        // Quadrant 0 spans x,y in {0,100,200}; mean (100,100) is node (1,1).
        assert_eq!(ca.centroid(ClusterId(0)), NodeId(7));
        for c in ca.clusters() {
            let centroid = ca.centroid(c);
            assert!(centroid.index() < net.node_count());
            assert_eq!(ca.cluster_of(centroid), c);
        }
    }

    #[test]
    fn rejects_bad_labels() {
        let net = super::helpers::square_with_isolated(0);
        assert!(matches!(
            ClusterAssignment::from_labels(&net, &[0, 0, 1], 2),
            Err(MatrixError::ShapeMismatch { expected: 4, got: 3, .. })
        ));
        assert!(matches!(
            ClusterAssignment::from_labels(&net, &[0, 0, 1, 5], 2),
            Err(MatrixError::LabelOutOfRange { node: 3, label: 5, .. })
        ));
        assert!(matches!(
            ClusterAssignment::from_labels(&net, &[0, 0, 0, 0], 2),
            Err(MatrixError::EmptyCluster(ClusterId(1)))
        ));
        assert!(matches!(ClusterAssignment::from_labels(&net, &[0, 0, 0, 0], 0), Err(MatrixError::NoClusters)));
    }

    #[test]
    fn rejects_out_of_range_centroid() {
        let net = super::helpers::square_with_isolated(0);
        let err = ClusterAssignment::with_centroids(&net, &[0, 0, 1, 1], &[NodeId(0), NodeId(40)]).unwrap_err();
        assert!(matches!(err, MatrixError::Spatial(tam_network::SpatialError::InvalidNodeIndex { .. })));
    }

    #[test]
    fn label_csv() {
        let net = super::helpers::square_with_isolated(0);
        let csv = "node_id,cluster\nn3,1\nn0,0\nn1,0\nn2,1\n";
        assert_eq!(load_labels_reader(Cursor::new(csv), &net).unwrap(), vec![0, 0, 1, 1]);

        let missing = "node_id,cluster\nn0,0\nn1,0\nn2,1\n";
        assert!(matches!(load_labels_reader(Cursor::new(missing), &net), Err(MatrixError::MissingLabel(id)) if id == "n3"));

        let unknown = "node_id,cluster\nzz,0\n";
        assert!(matches!(load_labels_reader(Cursor::new(unknown), &net), Err(MatrixError::UnknownNode(_))));
    }
}

// ── Matrix operator ───────────────────────────────────────────────────────────

#[cfg(test)]
mod matrix {
    use ndarray::Array2;

    use tam_core::{ClusterId, EdgeId, OdPair};

    use crate::{MatrixError, TrafficAssignmentMatrix};

    fn small() -> TrafficAssignmentMatrix {
        // E = 3, Z = 2: (0,1) uses e0,e1; (1,0) uses e1,e2.
        TrafficAssignmentMatrix::from_columns(
            3,
            2,
            vec![vec![], vec![EdgeId(1), EdgeId(0)], vec![EdgeId(2), EdgeId(1), EdgeId(2)], vec![]],
        )
        .unwrap()
    }

    #[test]
    fn columns_sorted_and_deduplicated() {
        let tam = small();
        assert_eq!(tam.column(1), &[EdgeId(0), EdgeId(1)]);
        assert_eq!(tam.column(2), &[EdgeId(1), EdgeId(2)]);
        assert_eq!(tam.nnz(), 4);
        assert_eq!(tam.shape(), (3, 4));
    }

    #[test]
    fn entry_lookup() {
        let tam = small();
        let p01 = OdPair::new(ClusterId(0), ClusterId(1));
        assert_eq!(tam.get(EdgeId(0), p01), 1.0);
        assert_eq!(tam.get(EdgeId(2), p01), 0.0);
    }

    #[test]
    fn validation() {
        assert!(matches!(
            TrafficAssignmentMatrix::from_columns(3, 2, vec![vec![]; 3]),
            Err(MatrixError::ShapeMismatch { expected: 4, got: 3, .. })
        ));
        assert!(matches!(
            TrafficAssignmentMatrix::from_columns(3, 2, vec![vec![], vec![EdgeId(3)], vec![], vec![]]),
            Err(MatrixError::EdgeOutOfRange { edge: 3, edge_count: 3 })
        ));
        assert!(matches!(
            TrafficAssignmentMatrix::from_columns(3, 2, vec![vec![EdgeId(0)], vec![], vec![], vec![]]),
            Err(MatrixError::DiagonalNotEmpty(0))
        ));
    }

    #[test]
    fn dense_layouts_agree() {
        let tam = small();
        let d2 = tam.to_dense();
        let d3 = tam.to_dense_3d();
        assert_eq!(d2.shape(), &[3, 4]);
        assert_eq!(d3.shape(), &[3, 2, 2]);
        for e in 0..3 {
            for i in 0..2 {
                for j in 0..2 {
                    assert_eq!(d2[[e, i * 2 + j]], d3[[e, i, j]]);
                }
            }
        }
        assert_eq!(d2.sum(), 4.0);
    }

    #[test]
    fn apply_matches_dense_product() {
        let tam = small();
        let w = Array2::from_shape_fn((4, 24), |(c, h)| (c * 24 + h) as f32 * 0.25);
        let sparse = tam.apply(w.view()).unwrap();
        let dense = tam.to_dense().dot(&w);
        assert_eq!(sparse.shape(), &[3, 24]);
        for (a, b) in sparse.iter().zip(dense.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn apply_transpose_matches_dense_product() {
        let tam = small();
        let g = Array2::from_shape_fn((3, 24), |(e, h)| e as f32 - h as f32 * 0.5);
        let sparse = tam.apply_transpose(g.view()).unwrap();
        let dense = tam.to_dense().t().dot(&g);
        assert_eq!(sparse.shape(), &[4, 24]);
        for (a, b) in sparse.iter().zip(dense.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn apply_shape_is_edges_by_hours() {
        for (e, z) in [(1usize, 1usize), (5, 3), (17, 4)] {
            let tam = TrafficAssignmentMatrix::from_columns(e, z, vec![vec![]; z * z]).unwrap();
            let w = Array2::<f32>::ones((z * z, 24));
            assert_eq!(tam.apply(w.view()).unwrap().dim(), (e, 24));
        }
    }

    #[test]
    fn apply_rejects_wrong_width() {
        let tam = small();
        let w = Array2::<f32>::zeros((3, 24));
        assert!(matches!(tam.apply(w.view()), Err(MatrixError::ShapeMismatch { .. })));
        let g = Array2::<f32>::zeros((4, 24));
        assert!(matches!(tam.apply_transpose(g.view()), Err(MatrixError::ShapeMismatch { .. })));
    }
}

// ── Assembly ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod assemble {
    use tam_core::{ClusterId, EdgeId, NodeId, OdPair};
    use tam_network::{CostPolicy, DijkstraSearch, PathSearch};

    use crate::{assemble, assemble_with, ClusterAssignment, MatrixError};

    fn pair(i: u32, j: u32) -> OdPair {
        OdPair::new(ClusterId(i), ClusterId(j))
    }

    #[test]
    fn square_marks_shorter_route() {
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);
        let (tam, report) = assemble(&net, &ca, CostPolicy::Length).unwrap();

        assert_eq!(tam.pair_edges(pair(0, 1)), &[EdgeId(0), EdgeId(1)]);
        assert_eq!(tam.pair_edges(pair(1, 0)), &[EdgeId(2), EdgeId(3)]);
        assert_eq!(report.unreachable_count(), 0);
        assert_eq!(report.searches, 2);
        assert_eq!(report.nnz, 4);
    }

    #[test]
    fn sequential_blocks_match_default_build() {
        use crate::assemble::{origin_blocks, sequential_origin_blocks};
        use tam_network::BreadthFirstSearch;

        let (net, ca) = super::helpers::grid();
        assert_eq!(
            sequential_origin_blocks(&net, &ca, &DijkstraSearch).unwrap(),
            origin_blocks(&net, &ca, &DijkstraSearch).unwrap()
        );
        assert_eq!(
            sequential_origin_blocks(&net, &ca, &BreadthFirstSearch).unwrap(),
            origin_blocks(&net, &ca, &BreadthFirstSearch).unwrap()
        );

        let net = super::helpers::square_with_isolated(1);
        let ca = ClusterAssignment::with_centroids(&net, &[0, 0, 1, 1, 2], &[NodeId(0), NodeId(2), NodeId(4)])
            .unwrap();
        let seq = sequential_origin_blocks(&net, &ca, &DijkstraSearch).unwrap();
        assert_eq!(seq, origin_blocks(&net, &ca, &DijkstraSearch).unwrap());
        let unreachable: Vec<OdPair> = seq.iter().flat_map(|b| b.unreachable.iter().copied()).collect();
        assert_eq!(unreachable, vec![pair(0, 2), pair(1, 2), pair(2, 0), pair(2, 1)]);
    }

    #[test]
    fn single_cluster_has_one_empty_column() {
        let net = super::helpers::square_with_isolated(0);
        let ca = ClusterAssignment::with_centroids(&net, &[0, 0, 0, 0], &[NodeId(0)]).unwrap();
        let (tam, report) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(tam.shape(), (4, 1));
        assert_eq!(tam.nnz(), 0);
        assert_eq!((report.searches, report.unreachable_count()), (1, 0));
    }

    #[test]
    fn isolated_cluster_leaves_columns_empty() {
        let net = super::helpers::square_with_isolated(1);
        let ca = ClusterAssignment::with_centroids(&net, &[0, 0, 1, 1, 2], &[NodeId(0), NodeId(2), NodeId(4)])
            .unwrap();
        let (tam, report) = assemble(&net, &ca, CostPolicy::Length).unwrap();

        let expected = vec![pair(0, 2), pair(1, 2), pair(2, 0), pair(2, 1)];
        assert_eq!(report.unreachable, expected);
        assert_eq!(report.unreachable_count(), 4);
        for p in expected {
            assert!(tam.pair_edges(p).is_empty());
        }
        assert_eq!(tam.pair_edges(pair(0, 1)), &[EdgeId(0), EdgeId(1)]);
    }

    #[test]
    fn each_unreachable_pair_counted_once() {
        // Two isolated nodes, each its own cluster.
        let net = super::helpers::square_with_isolated(2);
        let ca = ClusterAssignment::with_centroids(
            &net,
            &[0, 0, 1, 1, 2, 3],
            &[NodeId(0), NodeId(2), NodeId(4), NodeId(5)],
        )
        .unwrap();
        let (_, report) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        // Reachable pairs: (0,1) and (1,0) only.
        assert_eq!(report.unreachable_count(), 4 * 3 - 2);
        let mut sorted = report.unreachable.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), report.unreachable.len());
    }

    #[test]
    fn diagonal_columns_are_zero() {
        let (net, ca) = super::helpers::grid();
        let (tam, _) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        let dense = tam.to_dense_3d();
        for i in 0..ca.num_clusters() {
            for e in 0..net.edge_count() {
                assert_eq!(dense[[e, i, i]], 0.0);
            }
        }
    }

    #[test]
    fn columns_match_single_pair_routes() {
        let (net, ca) = super::helpers::grid();
        let (tam, report) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(report.unreachable_count(), 0);
        for i in ca.clusters() {
            for j in ca.clusters() {
                if i == j {
                    continue;
                }
                let mut route = DijkstraSearch.route(&net, ca.centroid(i), ca.centroid(j)).unwrap().edges;
                route.sort();
                assert_eq!(tam.pair_edges(OdPair::new(i, j)), route.as_slice());
            }
        }
    }

    #[test]
    fn rebuild_is_bit_identical() {
        let (net, ca) = super::helpers::grid();
        let (a, ra) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        let (b, rb) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(a, b);
        assert_eq!(ra, rb);
        assert_eq!(super::helpers::dense_bits(&a), super::helpers::dense_bits(&b));
    }

    #[test]
    fn policy_changes_paths() {
        let (net, ca) = super::helpers::grid();
        let (hops, report) = assemble_with(&net, &ca, &tam_network::BreadthFirstSearch).unwrap();
        assert_eq!(report.policy, CostPolicy::Hops);
        // Hop-count paths between quadrant centroids have Manhattan length.
        for i in ca.clusters() {
            for j in ca.clusters() {
                if i != j {
                    let (a, b) = (ca.centroid(i).0, ca.centroid(j).0);
                    let manhattan = (a / 6).abs_diff(b / 6) + (a % 6).abs_diff(b % 6);
                    assert_eq!(hops.pair_edges(OdPair::new(i, j)).len(), manhattan as usize);
                }
            }
        }
        assert_eq!(DijkstraSearch.policy(), CostPolicy::Length);
    }

    #[test]
    fn mismatched_assignment_rejected() {
        let net = super::helpers::square_with_isolated(0);
        let bigger = super::helpers::square_with_isolated(1);
        let ca = ClusterAssignment::with_centroids(&bigger, &[0, 0, 1, 1, 1], &[NodeId(0), NodeId(4)]).unwrap();
        assert!(matches!(assemble(&net, &ca, CostPolicy::Length), Err(MatrixError::ShapeMismatch { .. })));
    }
}

// ── Cache ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod cache {
    use tempfile::TempDir;

    use tam_network::CostPolicy;

    use crate::{assemble, load_tam, save_tam, CacheKey, CacheOutcome, MatrixError, TamCache};

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn file_name_from_network_and_z() {
        let cache = TamCache::new("/data/cache");
        assert_eq!(
            cache.path_for("toy4node", 2),
            std::path::PathBuf::from("/data/cache/toy4node_TAM_nclusters_2.bin")
        );
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tmp();
        let (net, ca) = super::helpers::grid();
        let (tam, _) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        let key = CacheKey::for_network(&net, ca.num_clusters(), CostPolicy::Length);
        let path = dir.path().join("grid.bin");

        save_tam(&path, &tam, &key).unwrap();
        let loaded = load_tam(&path, &key).unwrap();
        assert_eq!(loaded, tam);
    }

    #[test]
    fn persisted_toy_reloads_bitwise_in_fresh_cache() {
        let dir = tmp();
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);

        let first = TamCache::new(dir.path()).load_or_build(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(first.outcome, CacheOutcome::Miss);
        assert!(first.report.is_some());
        assert!(dir.path().join("toy4node_TAM_nclusters_2.bin").exists());

        // A new cache handle stands in for a new process: nothing in memory.
        let second = TamCache::new(dir.path()).load_or_build(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(second.outcome, CacheOutcome::Hit);
        assert!(second.report.is_none());
        assert_eq!(super::helpers::dense_bits(&first.tam), super::helpers::dense_bits(&second.tam));
    }

    #[test]
    fn corrupt_file_is_rebuilt() {
        let dir = tmp();
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);
        let cache = TamCache::new(dir.path());
        std::fs::write(cache.path_for("toy4node", 2), b"definitely not bincode").unwrap();

        let built = cache.load_or_build(&net, &ca, CostPolicy::Length).unwrap();
        assert!(matches!(built.outcome, CacheOutcome::Rebuilt { .. }));
        // The rebuilt file is now valid.
        let again = cache.load_or_build(&net, &ca, CostPolicy::Length).unwrap();
        assert_eq!(again.outcome, CacheOutcome::Hit);
        assert_eq!(again.tam, built.tam);
    }

    #[test]
    fn stale_shape_is_rebuilt() {
        let dir = tmp();
        let small = super::helpers::square_with_isolated(0);
        let grown = super::helpers::square_with_isolated(1); // same name, more nodes
        let ca_small = super::helpers::square_clusters(&small);
        let ca_grown = crate::ClusterAssignment::with_centroids(
            &grown,
            &[0, 0, 1, 1, 1],
            &[tam_core::NodeId(0), tam_core::NodeId(2)],
        )
        .unwrap();
        let cache = TamCache::new(dir.path());

        cache.load_or_build(&small, &ca_small, CostPolicy::Length).unwrap();
        let rebuilt = cache.load_or_build(&grown, &ca_grown, CostPolicy::Length).unwrap();
        assert!(matches!(rebuilt.outcome, CacheOutcome::Rebuilt { .. }));
    }

    #[test]
    fn policy_mismatch_is_stale() {
        let dir = tmp();
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);
        let (tam, _) = assemble(&net, &ca, CostPolicy::Length).unwrap();
        let path = dir.path().join("t.bin");
        save_tam(&path, &tam, &CacheKey::for_network(&net, 2, CostPolicy::Length)).unwrap();

        let err = load_tam(&path, &CacheKey::for_network(&net, 2, CostPolicy::Hops)).unwrap_err();
        assert!(matches!(err, MatrixError::StaleCache(_)));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tmp();
        let net = super::helpers::square_with_isolated(0);
        let ca = super::helpers::square_clusters(&net);
        TamCache::new(dir.path()).load_or_build(&net, &ca, CostPolicy::Length).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
