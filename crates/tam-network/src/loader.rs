//! CSV network loader.
//!
//! # CSV format
//!
//! Two files.  Nodes:
//!
//! ```csv
//! id,x,y
//! n0,0.0,0.0
//! n1,100.0,0.0
//! ```
//!
//! Links (directed; row order defines `EdgeId`):
//!
//! ```csv
//! id,from,to,length
//! l0,n0,n1,100.0
//! l1,n1,n0,100.0
//! ```
//!
//! `from`/`to` reference node `id`s.  Parallel links are allowed as long as
//! their `id`s differ.

use std::io::Read;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use tam_core::Point2;

use crate::network::{RoadNetwork, RoadNetworkBuilder};
use crate::SpatialResult;

#[derive(Deserialize)]
struct NodeRecord {
    id: String,
    x:  f64,
    y:  f64,
}

#[derive(Deserialize)]
struct LinkRecord {
    id:     String,
    from:   String,
    to:     String,
    length: f64,
}

/// Load a network from `nodes` and `links` CSV files.
///
/// The network is named after the stem of the links file, which is what the
/// TAM cache keys on.
pub fn load_network_csv(nodes: &Path, links: &Path) -> SpatialResult<RoadNetwork> {
    let name = links
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "network".to_owned());
    let nodes_file = std::fs::File::open(nodes)?;
    let links_file = std::fs::File::open(links)?;
    load_network_readers(nodes_file, links_file, name)
}

/// Like [`load_network_csv`] but accepts any `Read` sources and an explicit
/// network name.
pub fn load_network_readers<N: Read, L: Read>(
    nodes: N,
    links: L,
    name:  impl Into<String>,
) -> SpatialResult<RoadNetwork> {
    let mut b = RoadNetworkBuilder::new();

    for record in csv::Reader::from_reader(nodes).deserialize() {
        let r: NodeRecord = record?;
        b.add_node(r.id, Point2::new(r.x, r.y))?;
    }
    for record in csv::Reader::from_reader(links).deserialize() {
        let r: LinkRecord = record?;
        b.add_link_by_ext_id(r.id, &r.from, &r.to, r.length)?;
    }

    let net = b.build(name);
    debug!(
        "loaded network {:?}: {} nodes, {} links",
        net.name,
        net.node_count(),
        net.edge_count()
    );
    Ok(net)
}
