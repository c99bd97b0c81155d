//! CSV output backend.
//!
//! Creates five files in the configured output directory:
//! - `fit_metrics.csv`
//! - `od_flows.csv`
//! - `link_flows.csv`
//! - `clusters.csv`
//! - `trips.csv`
//!
//! `od_flows.csv` holds a single snapshot: every `write_od_flows` call
//! truncates it and rewrites the header.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{ClusterRow, LinkFlowRow, MetricRow, OdFlowRow, OutputResult, TripRow};

/// Writes fit output to five CSV files.
pub struct CsvWriter {
    od_path:    PathBuf,
    metrics:    Writer<File>,
    od_flows:   Writer<File>,
    link_flows: Writer<File>,
    clusters:   Writer<File>,
    trips:      Writer<File>,
}

impl CsvWriter {
    /// Create `dir` if needed, open the five CSV files and write the header
    /// rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut metrics = Writer::from_path(dir.join("fit_metrics.csv"))?;
        metrics.write_record(["step", "loss", "mad"])?;

        let od_path = dir.join("od_flows.csv");
        let od_flows = open_od_flows(&od_path)?;

        let mut link_flows = Writer::from_path(dir.join("link_flows.csv"))?;
        link_flows.write_record(["edge_id", "hour", "flow"])?;

        let mut clusters = Writer::from_path(dir.join("clusters.csv"))?;
        clusters.write_record(["cluster", "node_id"])?;

        let mut trips = Writer::from_path(dir.join("trips.csv"))?;
        trips.write_record(["trip_id", "origin_node", "destination_node", "departure", "return"])?;

        Ok(Self { od_path, metrics, od_flows, link_flows, clusters, trips })
    }
}

impl OutputWriter for CsvWriter {
    fn write_metrics(&mut self, row: &MetricRow) -> OutputResult<()> {
        self.metrics.write_record(&[row.step.to_string(), row.loss.to_string(), row.mad.to_string()])?;
        Ok(())
    }

    fn write_od_flows(&mut self, rows: &[OdFlowRow]) -> OutputResult<()> {
        self.od_flows.flush()?;
        self.od_flows = open_od_flows(&self.od_path)?;
        for row in rows {
            self.od_flows.write_record(&[
                row.origin.to_string(),
                row.destination.to_string(),
                row.hour.to_string(),
                row.flow.to_string(),
            ])?;
        }
        self.od_flows.flush()?;
        Ok(())
    }

    fn write_link_flows(&mut self, rows: &[LinkFlowRow]) -> OutputResult<()> {
        for row in rows {
            self.link_flows.write_record(&[row.edge_id.clone(), row.hour.to_string(), row.flow.to_string()])?;
        }
        Ok(())
    }

    fn write_clusters(&mut self, rows: &[ClusterRow]) -> OutputResult<()> {
        for row in rows {
            self.clusters.write_record(&[row.cluster.to_string(), row.node_id.clone()])?;
        }
        Ok(())
    }

    fn write_trips(&mut self, rows: &[TripRow]) -> OutputResult<()> {
        for row in rows {
            self.trips.write_record(&[
                row.trip_id.to_string(),
                row.origin_node.clone(),
                row.destination_node.clone(),
                row.departure.clone(),
                row.return_time.clone(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.metrics.flush()?;
        self.od_flows.flush()?;
        self.link_flows.flush()?;
        self.clusters.flush()?;
        self.trips.flush()?;
        Ok(())
    }
}

fn open_od_flows(path: &Path) -> OutputResult<Writer<File>> {
    let mut w = Writer::from_path(path)?;
    w.write_record(["origin", "destination", "hour", "flow"])?;
    Ok(w)
}
