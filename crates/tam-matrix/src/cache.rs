//! On-disk TAM cache.
//!
//! Building the TAM costs `Z` full shortest-path searches, so it is persisted
//! per (network, Z) and reused across fitting runs:
//!
//! ```text
//! <cache dir>/<network name>_TAM_nclusters_<Z>.bin
//! ```
//!
//! The file is `bincode`-encoded: a header carrying the [`CacheKey`] fields
//! followed by the CSC arrays.  A file whose header disagrees with the
//! current network (fingerprint, edge count, Z or cost policy), or that fails
//! to decode, is treated as a miss: a warning is logged and the TAM rebuilt.
//!
//! Writes go to a temporary file in the cache directory which is then
//! renamed over the target, so concurrent readers never observe a partially
//! written cache.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use tam_network::{CostPolicy, RoadNetwork};

use crate::assemble::{assemble, AssemblyReport};
use crate::{ClusterAssignment, MatrixError, MatrixResult, TrafficAssignmentMatrix};

const MAGIC: [u8; 8] = *b"TAMCACHE";
const FORMAT_VERSION: u32 = 1;

/// Everything a cached TAM must agree with to be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub network_name: String,
    pub fingerprint:  u64,
    pub edge_count:   usize,
    pub num_clusters: usize,
    pub policy:       CostPolicy,
}

impl CacheKey {
    pub fn for_network(network: &RoadNetwork, num_clusters: usize, policy: CostPolicy) -> Self {
        Self {
            network_name: network.name.clone(),
            fingerprint:  network.fingerprint(),
            edge_count:   network.edge_count(),
            num_clusters,
            policy,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TamFile {
    magic:        [u8; 8],
    version:      u32,
    network_name: String,
    fingerprint:  u64,
    edge_count:   u64,
    num_clusters: u64,
    policy:       u8,
    col_start:    Vec<u32>,
    rows:         Vec<u32>,
}

impl TamFile {
    fn check(&self, key: &CacheKey) -> MatrixResult<()> {
        let mismatch = if self.magic != MAGIC {
            Some("not a TAM cache file".to_owned())
        } else if self.version != FORMAT_VERSION {
            Some(format!("format version {} (expected {FORMAT_VERSION})", self.version))
        } else if self.fingerprint != key.fingerprint || self.network_name != key.network_name {
            Some(format!("built for a different network ({:?})", self.network_name))
        } else if self.edge_count != key.edge_count as u64 {
            Some(format!("{} edges (expected {})", self.edge_count, key.edge_count))
        } else if self.num_clusters != key.num_clusters as u64 {
            Some(format!("{} clusters (expected {})", self.num_clusters, key.num_clusters))
        } else if self.policy != key.policy.tag() {
            Some(format!("cost policy tag {} (expected {})", self.policy, key.policy.tag()))
        } else {
            None
        };
        match mismatch {
            Some(reason) => Err(MatrixError::StaleCache(reason)),
            None => Ok(()),
        }
    }
}

/// Persist `tam` at `path` atomically.
pub fn save_tam(path: &Path, tam: &TrafficAssignmentMatrix, key: &CacheKey) -> MatrixResult<()> {
    if tam.edge_count() != key.edge_count || tam.num_clusters() != key.num_clusters {
        return Err(MatrixError::ShapeMismatch {
            what:     "TAM edge count vs cache key",
            expected: key.edge_count,
            got:      tam.edge_count(),
        });
    }
    let file = TamFile {
        magic:        MAGIC,
        version:      FORMAT_VERSION,
        network_name: key.network_name.clone(),
        fingerprint:  key.fingerprint,
        edge_count:   key.edge_count as u64,
        num_clusters: key.num_clusters as u64,
        policy:       key.policy.tag(),
        col_start:    tam.raw_col_start().to_vec(),
        rows:         tam.raw_rows(),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = std::io::BufWriter::new(tmp.as_file_mut());
        bincode::serialize_into(&mut w, &file)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MatrixError::Io(e.error))?;
    Ok(())
}

/// Load a TAM from `path`, verifying it against `key`.
///
/// Fails with [`MatrixError::StaleCache`] on any header mismatch and
/// [`MatrixError::Encode`] on undecodable content.
pub fn load_tam(path: &Path, key: &CacheKey) -> MatrixResult<TrafficAssignmentMatrix> {
    let bytes = std::fs::read(path)?;
    let file: TamFile = bincode::deserialize(&bytes)?;
    file.check(key)?;
    TrafficAssignmentMatrix::from_raw(key.edge_count, key.num_clusters, file.col_start, file.rows)
}

// ── TamCache ──────────────────────────────────────────────────────────────────

/// How [`TamCache::load_or_build`] obtained its matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Loaded from an existing, matching file.
    Hit,
    /// No file existed; built and persisted.
    Miss,
    /// A file existed but was stale or unreadable; rebuilt and overwritten.
    Rebuilt { reason: String },
}

/// Result of [`TamCache::load_or_build`].
#[derive(Debug)]
pub struct CachedTam {
    pub tam:     TrafficAssignmentMatrix,
    pub outcome: CacheOutcome,
    /// Present only when the matrix was assembled in this call.
    pub report:  Option<AssemblyReport>,
}

/// Directory of persisted TAMs.
#[derive(Debug, Clone)]
pub struct TamCache {
    dir: PathBuf,
}

impl TamCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for a network name and cluster count.
    pub fn path_for(&self, network_name: &str, num_clusters: usize) -> PathBuf {
        self.dir.join(format!("{network_name}_TAM_nclusters_{num_clusters}.bin"))
    }

    /// Load the cached TAM for `(network, Z)`, or assemble and persist it.
    pub fn load_or_build(
        &self,
        network:  &RoadNetwork,
        clusters: &ClusterAssignment,
        policy:   CostPolicy,
    ) -> MatrixResult<CachedTam> {
        let key = CacheKey::for_network(network, clusters.num_clusters(), policy);
        let path = self.path_for(&network.name, clusters.num_clusters());

        let outcome = if path.exists() {
            match load_tam(&path, &key) {
                Ok(tam) => {
                    info!("loaded cached TAM from {}", path.display());
                    return Ok(CachedTam { tam, outcome: CacheOutcome::Hit, report: None });
                }
                Err(e) => {
                    warn!("ignoring TAM cache {}: {e}; rebuilding", path.display());
                    CacheOutcome::Rebuilt { reason: e.to_string() }
                }
            }
        } else {
            CacheOutcome::Miss
        };

        let (tam, report) = assemble(network, clusters, policy)?;
        save_tam(&path, &tam, &key)?;
        info!("wrote TAM cache {}", path.display());
        Ok(CachedTam { tam, outcome, report: Some(report) })
    }
}
