//! flowfit: fit hourly cluster-to-cluster flows to link sensor counts.
//!
//! With `--toy` (the default when no network is given) it runs on a 6 × 6
//! two-way grid split into four quadrants, with counts on every third link
//! generated from a known morning/evening commuting pattern.  Otherwise it
//! reads:
//!
//! - `--nodes`  `id,x,y`
//! - `--links`  `id,from,to,length` (file order defines edge indices)
//! - `--labels` `node_id,cluster`
//! - `--counts` `link_id,hour,volume`
//!
//! and writes `fit_metrics.csv`, `od_flows.csv`, `link_flows.csv`,
//! `clusters.csv`, `trips.csv`, `fit_config.json` and `log.txt` to `--output`.

mod logging;
mod toy;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use tam_core::SeededRng;
use tam_fit::{
    load_counts_csv, sample_trips, uncovered_sensor_edges, FitConfig, FlowFitter, LogObserver, SensorTarget,
};
use tam_matrix::{load_labels_csv, CacheOutcome, ClusterAssignment, TamCache};
use tam_network::{load_network_csv, CostPolicy, RoadNetwork};
use tam_output::{cluster_rows, link_rows, trip_rows, CsvWriter, FitOutputObserver, OutputWriter};

use logging::initialize_logging;

// ── Constants ─────────────────────────────────────────────────────────────────

const TRIP_RNG_STREAM: u64 = 1; // child stream of the fit seed used for trips

// ── Command line ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Dijkstra on link length.
    Length,
    /// Breadth-first search on link count.
    Hops,
}

impl From<PolicyArg> for CostPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Length => CostPolicy::Length,
            PolicyArg::Hops => CostPolicy::Hops,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Node CSV (`id,x,y`).
    #[arg(long, requires_all = ["links", "labels", "counts", "num_clusters"])]
    nodes: Option<PathBuf>,
    /// Link CSV (`id,from,to,length`).
    #[arg(long, requires = "nodes")]
    links: Option<PathBuf>,
    /// Cluster label CSV (`node_id,cluster`).
    #[arg(long, requires = "nodes")]
    labels: Option<PathBuf>,
    /// Sensor count CSV (`link_id,hour,volume`).
    #[arg(long, requires = "nodes")]
    counts: Option<PathBuf>,
    /// Number of clusters the labels refer to.
    #[arg(long, requires = "nodes")]
    num_clusters: Option<usize>,
    /// Run the built-in toy scenario.
    #[arg(long, conflicts_with = "nodes")]
    toy: bool,

    /// JSON fitting configuration; missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    steps: Option<u64>,
    #[arg(long)]
    learning_rate: Option<f32>,
    #[arg(long)]
    log_interval: Option<u64>,
    /// Rewrite `od_flows.csv` with the best flows every this many steps
    /// (0 disables).
    #[arg(long)]
    save_interval: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Fit a per-hour additive bias alongside the flows.
    #[arg(long)]
    use_bias: bool,

    #[arg(long, value_enum, default_value_t = PolicyArg::Length)]
    policy: PolicyArg,
    /// Output directory.
    #[arg(long, default_value = "output/flowfit")]
    output: PathBuf,
    /// TAM cache directory (default: `<output>/cache`).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Skip trip sampling.
    #[arg(long)]
    no_trips: bool,
    /// Log debug messages to the terminal too.
    #[arg(short, long)]
    verbose: bool,
}

// ── Inputs ────────────────────────────────────────────────────────────────────

enum Inputs {
    Files { nodes: PathBuf, links: PathBuf, labels: PathBuf, counts: PathBuf, num_clusters: usize },
    Toy,
}

impl Args {
    fn inputs(&self) -> Result<Inputs> {
        if self.toy {
            return Ok(Inputs::Toy);
        }
        match (&self.nodes, &self.links, &self.labels, &self.counts, self.num_clusters) {
            (None, ..) => Ok(Inputs::Toy),
            (Some(nodes), Some(links), Some(labels), Some(counts), Some(num_clusters)) => Ok(Inputs::Files {
                nodes: nodes.clone(),
                links: links.clone(),
                labels: labels.clone(),
                counts: counts.clone(),
                num_clusters,
            }),
            _ => bail!("--nodes needs --links, --labels, --counts and --num-clusters"),
        }
    }

    fn fit_config(&self) -> Result<FitConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
                serde_json::from_reader(file)
                    .with_context(|| format!("Failed to parse fit config {}", path.display()))?
            }
            None => FitConfig::default(),
        };
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(interval) = self.log_interval {
            config.log_interval = interval;
        }
        if let Some(interval) = self.save_interval {
            config.save_interval = interval;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.use_bias |= self.use_bias;
        config.validate()?;
        Ok(config)
    }
}

/// Network, clusters and (for file inputs) the sensor target.  The toy target
/// depends on the TAM and is generated after assembly.
fn load_inputs(inputs: &Inputs) -> Result<(RoadNetwork, ClusterAssignment, Option<SensorTarget>)> {
    match inputs {
        Inputs::Toy => {
            let network = toy::build_network()?;
            let clusters = toy::quadrant_clusters(&network)?;
            Ok((network, clusters, None))
        }
        Inputs::Files { nodes, links, labels, counts, num_clusters } => {
            let network = load_network_csv(nodes, links)
                .with_context(|| format!("Failed to load network {} / {}", nodes.display(), links.display()))?;
            let labels = load_labels_csv(labels, &network)
                .with_context(|| format!("Failed to load cluster labels {}", labels.display()))?;
            let clusters = ClusterAssignment::from_labels(&network, &labels, *num_clusters)?;
            let target = load_counts_csv(counts, &network)
                .with_context(|| format!("Failed to load sensor counts {}", counts.display()))?;
            Ok((network, clusters, Some(target)))
        }
    }
}

fn write_config(output: &Path, config: &FitConfig) -> Result<()> {
    let path = output.join("fit_config.json");
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), config)?;
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {}", args.output.display()))?;
    initialize_logging(&args.output, args.verbose)?;

    let inputs = args.inputs()?;
    let config = args.fit_config()?;
    let policy = CostPolicy::from(args.policy);
    let cache_dir = args.cache_dir.clone().unwrap_or_else(|| args.output.join("cache"));

    // 1. Network and clusters.
    let (network, clusters, target) = load_inputs(&inputs)?;
    info!(
        "network '{}': {} nodes, {} links, {} clusters",
        network.name,
        network.node_count(),
        network.edge_count(),
        clusters.num_clusters()
    );

    // 2. Traffic assignment matrix, from cache when it still matches.
    let t0 = Instant::now();
    let cached = TamCache::new(&cache_dir).load_or_build(&network, &clusters, policy)?;
    let tam = cached.tam;
    match &cached.outcome {
        CacheOutcome::Hit => info!("TAM loaded from cache"),
        CacheOutcome::Miss => info!("TAM assembled"),
        CacheOutcome::Rebuilt { reason } => warn!("TAM rebuilt, cache was unusable: {reason}"),
    }
    if let Some(report) = &cached.report {
        info!(
            "{} searches ({:?}), {} non-zeros, {} unreachable pairs",
            report.searches,
            report.policy,
            report.nnz,
            report.unreachable_count()
        );
    }
    info!("TAM {:?} ready in {:.3} s", tam.shape(), t0.elapsed().as_secs_f64());

    // 3. Sensor target.
    let target = match target {
        Some(target) => target,
        None => {
            let (values, sensors) = toy::sensor_counts(&tam)?;
            SensorTarget::new(values, sensors)?
        }
    };
    info!("{} sensor links", target.sensor_count());
    let uncovered = uncovered_sensor_edges(&tam, &target);
    if !uncovered.is_empty() {
        warn!("{} sensor links lie on no cluster-pair path and cannot be matched", uncovered.len());
    }

    // 4. Fit.
    write_config(&args.output, &config)?;
    let writer = CsvWriter::new(&args.output)?;
    let mut obs = (LogObserver, FitOutputObserver::new(writer));
    let t0 = Instant::now();
    let mut fitter = FlowFitter::new(&tam, &target, config.clone())?;
    let summary = fitter.run(&mut obs);
    let elapsed = t0.elapsed();

    let (_, mut out) = obs;
    if let Some(e) = out.take_error() {
        warn!("output error during fit: {e}");
    }

    // 5. Link flows, clusters and trips from the best flows.
    let best = fitter.into_best();
    let mut writer = out.into_writer();
    writer.write_link_flows(&link_rows(&network, &best.predict(&tam)?)?)?;
    writer.write_clusters(&cluster_rows(&network, &clusters))?;
    let trip_count = if args.no_trips {
        0
    } else {
        let mut rng = SeededRng::new(config.seed).child(TRIP_RNG_STREAM);
        let trips = sample_trips(&best, &clusters, &mut rng)?;
        writer.write_trips(&trip_rows(&network, &trips))?;
        trips.len()
    };
    writer.finish()?;

    // 6. Summary.
    println!();
    println!("Fit complete in {:.3} s ({} steps)", elapsed.as_secs_f64(), summary.steps_run);
    if let Some(last) = summary.last {
        println!("  final step {:>6}  loss {:>12.4}  mad {:>10.4}", last.step, last.loss, last.mad);
    }
    println!("  best  step {:>6}  loss {:>12.4}  mad {:>10.4}", best.step, best.loss, best.mad);
    println!("  total OD flow        : {:.1}", best.total());
    println!("  sampled trips        : {trip_count}");
    println!("  outputs              : {}", args.output.display());

    Ok(())
}
