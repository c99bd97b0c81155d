//! Integration tests for tam-output.

#[cfg(test)]
mod helpers {
    use tam_core::{NodeId, Point2};
    use tam_matrix::ClusterAssignment;
    use tam_network::{RoadNetwork, RoadNetworkBuilder};

    pub fn read_rows(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut rdr = csv::Reader::from_path(path).unwrap();
        let headers = rdr.headers().unwrap().iter().map(str::to_owned).collect();
        let rows = rdr
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect())
            .collect();
        (headers, rows)
    }

    /// Directed square a→b→c→d→a, clusters {a,b} and {c,d}.
    pub fn square() -> (RoadNetwork, ClusterAssignment) {
        let mut b = RoadNetworkBuilder::new();
        for (id, (x, y)) in [("a", (0.0, 0.0)), ("b", (1.0, 0.0)), ("c", (1.0, 1.0)), ("d", (0.0, 1.0))] {
            b.add_node(id, Point2::new(x, y)).unwrap();
        }
        for i in 0..4u32 {
            b.add_link(format!("road{i}"), NodeId(i), NodeId((i + 1) % 4), 1.0).unwrap();
        }
        let net = b.build("square");
        let clusters = ClusterAssignment::with_centroids(&net, &[0, 0, 1, 1], &[NodeId(0), NodeId(2)]).unwrap();
        (net, clusters)
    }
}

#[cfg(test)]
mod csv_tests {
    use tempfile::TempDir;

    use crate::csv::CsvWriter;
    use crate::row::{ClusterRow, MetricRow, OdFlowRow};
    use crate::writer::OutputWriter;

    use super::helpers::read_rows;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn csv_files_created() {
        let dir = tmp();
        let _w = CsvWriter::new(dir.path()).unwrap();
        for name in ["fit_metrics.csv", "od_flows.csv", "link_flows.csv", "clusters.csv", "trips.csv"] {
            assert!(dir.path().join(name).exists(), "{name}");
        }
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tmp();
        let nested = dir.path().join("runs").join("first");
        CsvWriter::new(&nested).unwrap();
        assert!(nested.join("fit_metrics.csv").exists());
    }

    #[test]
    fn csv_headers_correct() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();

        let expected: [(&str, &[&str]); 5] = [
            ("fit_metrics.csv", &["step", "loss", "mad"]),
            ("od_flows.csv", &["origin", "destination", "hour", "flow"]),
            ("link_flows.csv", &["edge_id", "hour", "flow"]),
            ("clusters.csv", &["cluster", "node_id"]),
            ("trips.csv", &["trip_id", "origin_node", "destination_node", "departure", "return"]),
        ];
        for (file, headers) in expected {
            let (got, rows) = read_rows(&dir.path().join(file));
            assert_eq!(got, headers);
            assert!(rows.is_empty());
        }
    }

    #[test]
    fn rows_round_trip() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.write_metrics(&MetricRow { step: 100, loss: 0.5, mad: 0.25 }).unwrap();
        w.write_od_flows(&[OdFlowRow { origin: 1, destination: 0, hour: 17, flow: 3.5 }]).unwrap();
        w.write_clusters(&[ClusterRow { cluster: 2, node_id: "n9".into() }]).unwrap();
        w.finish().unwrap();

        let (_, metrics) = read_rows(&dir.path().join("fit_metrics.csv"));
        assert_eq!(metrics, vec![vec!["100", "0.5", "0.25"]]);
        let (_, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(od, vec![vec!["1", "0", "17", "3.5"]]);
        let (_, clusters) = read_rows(&dir.path().join("clusters.csv"));
        assert_eq!(clusters, vec![vec!["2", "n9"]]);
    }

    #[test]
    fn od_flows_hold_latest_snapshot() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        let row = |flow| OdFlowRow { origin: 0, destination: 1, hour: 8, flow };
        w.write_od_flows(&[row(1.0), row(2.0)]).unwrap();
        w.write_od_flows(&[row(5.0)]).unwrap();
        w.finish().unwrap();

        let (headers, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(headers, ["origin", "destination", "hour", "flow"]);
        assert_eq!(od, vec![vec!["0", "1", "8", "5"]]);
    }

    #[test]
    fn finish_can_repeat() {
        let dir = tmp();
        let mut w = CsvWriter::new(dir.path()).unwrap();
        w.finish().unwrap();
        w.write_metrics(&MetricRow { step: 1, loss: 1.0, mad: 1.0 }).unwrap();
        w.finish().unwrap();
        let (_, metrics) = read_rows(&dir.path().join("fit_metrics.csv"));
        assert_eq!(metrics.len(), 1);
    }
}

#[cfg(test)]
mod row_tests {
    use ndarray::Array2;

    use tam_core::{ClusterId, Hour, NodeId};
    use tam_fit::{FittedFlows, Trip};

    use crate::{cluster_rows, link_rows, od_rows, trip_rows, OutputError};

    #[test]
    fn od_rows_are_origin_major() {
        let mut w = Array2::zeros((4, 24));
        w[[1, 3]] = 2.0; // (0 → 1) at hour 3
        let flows = FittedFlows { num_clusters: 2, w, bias: None, loss: 0.0, mad: 0.0, step: 0 };
        let rows = od_rows(&flows);
        assert_eq!(rows.len(), 96);
        assert_eq!((rows[0].origin, rows[0].destination, rows[0].hour), (0, 0, 0));
        let hit = &rows[24 + 3];
        assert_eq!((hit.origin, hit.destination, hit.hour, hit.flow), (0, 1, 3, 2.0));
        assert_eq!(rows.iter().map(|r| r.flow).sum::<f32>(), 2.0);
    }

    #[test]
    fn link_rows_use_external_ids() {
        let (net, _) = super::helpers::square();
        let mut predicted = Array2::zeros((4, 24));
        predicted[[2, 8]] = 7.0;
        let rows = link_rows(&net, &predicted).unwrap();
        assert_eq!(rows.len(), 96);
        let hit = rows.iter().find(|r| r.flow > 0.0).unwrap();
        assert_eq!((hit.edge_id.as_str(), hit.hour), ("road2", 8));

        let wrong = Array2::zeros((3, 24));
        assert!(matches!(link_rows(&net, &wrong), Err(OutputError::ShapeMismatch { .. })));
    }

    #[test]
    fn cluster_rows_list_members() {
        let (net, clusters) = super::helpers::square();
        let rows = cluster_rows(&net, &clusters);
        let pairs: Vec<(u32, &str)> = rows.iter().map(|r| (r.cluster, r.node_id.as_str())).collect();
        assert_eq!(pairs, vec![(0, "a"), (0, "b"), (1, "c"), (1, "d")]);
    }

    #[test]
    fn trip_rows_format_clock_times() {
        let (net, _) = super::helpers::square();
        let trip = Trip {
            id:                  9,
            origin_cluster:      ClusterId(0),
            destination_cluster: ClusterId(1),
            origin_node:         NodeId(1),
            destination_node:    NodeId(3),
            hour:                Hour::new(18).unwrap(),
            minute:              5,
        };
        let rows = trip_rows(&net, &[trip]);
        assert_eq!(rows[0].trip_id, 9);
        assert_eq!(rows[0].origin_node, "b");
        assert_eq!(rows[0].destination_node, "d");
        assert_eq!(rows[0].departure, "18:05:00");
        assert_eq!(rows[0].return_time, "02:05:00");
    }
}

#[cfg(test)]
mod observer_tests {
    use ndarray::Array2;
    use tam_fit::{FitConfig, FitObserver, FittedFlows, FlowFitter, SensorTarget};
    use tam_matrix::assemble;
    use tam_network::CostPolicy;
    use tempfile::TempDir;

    use crate::row::{ClusterRow, LinkFlowRow, MetricRow, OdFlowRow, TripRow};
    use crate::{CsvWriter, FitOutputObserver, OutputError, OutputResult, OutputWriter};

    use super::helpers::read_rows;

    /// Fails every metrics write; counts the rest.
    #[derive(Default)]
    struct FailingWriter {
        od_batches: usize,
        finishes:   usize,
    }

    impl OutputWriter for FailingWriter {
        fn write_metrics(&mut self, row: &MetricRow) -> OutputResult<()> {
            Err(OutputError::Io(std::io::Error::other(format!("disk full at step {}", row.step))))
        }
        fn write_od_flows(&mut self, _rows: &[OdFlowRow]) -> OutputResult<()> {
            self.od_batches += 1;
            Ok(())
        }
        fn write_link_flows(&mut self, _rows: &[LinkFlowRow]) -> OutputResult<()> {
            Ok(())
        }
        fn write_clusters(&mut self, _rows: &[ClusterRow]) -> OutputResult<()> {
            Ok(())
        }
        fn write_trips(&mut self, _rows: &[TripRow]) -> OutputResult<()> {
            Ok(())
        }
        fn finish(&mut self) -> OutputResult<()> {
            self.finishes += 1;
            Ok(())
        }
    }

    fn target_for(edge_count: usize) -> SensorTarget {
        let mut values = ndarray::Array2::zeros((edge_count, 24));
        values[[0, 8]] = 10.0;
        values[[2, 17]] = 6.0;
        SensorTarget::new(values, vec![tam_core::EdgeId(0), tam_core::EdgeId(2)]).unwrap()
    }

    #[test]
    fn fit_run_writes_metrics_and_best_flows() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let (net, clusters) = super::helpers::square();
        let (tam, _) = assemble(&net, &clusters, CostPolicy::Length).unwrap();
        let target = target_for(net.edge_count());

        let cfg = FitConfig { steps: 20, log_interval: 5, learning_rate: 0.05, ..FitConfig::default() };
        let mut fitter = FlowFitter::new(&tam, &target, cfg).unwrap();
        let mut obs = FitOutputObserver::new(CsvWriter::new(dir.path()).unwrap());
        fitter.run(&mut obs);
        assert!(obs.take_error().is_none());

        let (_, metrics) = read_rows(&dir.path().join("fit_metrics.csv"));
        let steps: Vec<&str> = metrics.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(steps, vec!["0", "5", "10", "15"]);

        let (_, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(od.len(), 2 * 2 * 24);
        assert!(od.iter().all(|r| r[3].parse::<f32>().unwrap() >= 0.0));
    }

    fn flat_flows(value: f32, step: u64) -> FittedFlows {
        FittedFlows {
            num_clusters: 2,
            w:            Array2::from_elem((4, 24), value),
            bias:         None,
            loss:         0.0,
            mad:          0.0,
            step,
        }
    }

    #[test]
    fn checkpoint_writes_best_snapshot() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let mut obs = FitOutputObserver::new(CsvWriter::new(dir.path()).unwrap());

        obs.on_checkpoint(10, &flat_flows(3.0, 10));
        let (_, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(od.len(), 96);
        assert!(od.iter().all(|r| r[3] == "3"));

        obs.on_checkpoint(20, &flat_flows(1.5, 18));
        let (_, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(od.len(), 96);
        assert!(od.iter().all(|r| r[3] == "1.5"));
        assert!(obs.take_error().is_none());
    }

    #[test]
    fn checkpoints_and_fit_end_leave_one_snapshot() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let (net, clusters) = super::helpers::square();
        let (tam, _) = assemble(&net, &clusters, CostPolicy::Length).unwrap();
        let target = target_for(net.edge_count());

        let cfg = FitConfig { steps: 12, save_interval: 4, learning_rate: 0.05, ..FitConfig::default() };
        let mut fitter = FlowFitter::new(&tam, &target, cfg).unwrap();
        let mut obs = FitOutputObserver::new(CsvWriter::new(dir.path()).unwrap());
        fitter.run(&mut obs);
        assert!(obs.take_error().is_none());

        let best = fitter.into_best();
        let (_, od) = read_rows(&dir.path().join("od_flows.csv"));
        assert_eq!(od.len(), 2 * 2 * 24);
        let written: Vec<f32> = od.iter().map(|r| r[3].parse().unwrap()).collect();
        let expected: Vec<f32> = best.od().iter().copied().collect();
        assert_eq!(written, expected);
    }

    #[test]
    fn first_error_kept() {
        let (net, clusters) = super::helpers::square();
        let (tam, _) = assemble(&net, &clusters, CostPolicy::Length).unwrap();
        let target = target_for(net.edge_count());

        let cfg = FitConfig { steps: 10, log_interval: 2, ..FitConfig::default() };
        let mut obs = FitOutputObserver::new(FailingWriter::default());
        FlowFitter::new(&tam, &target, cfg).unwrap().run(&mut obs);

        let err = obs.take_error().unwrap();
        assert!(err.to_string().contains("step 0"), "{err}");
        assert!(obs.take_error().is_none());

        let writer = obs.into_writer();
        assert_eq!(writer.od_batches, 1);
        assert_eq!(writer.finishes, 1);
    }
}
