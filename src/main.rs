use anyhow::Context;
use clap::{Parser, ValueEnum};
use regionjoin::pipeline::{self, PhaseEvent};
use regionjoin::{AmbiguityPolicy, Config, CoordinatePolicy, IndexBackend};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Packed overlap-minimizing R-tree (honors --fanout)
    Packed,
    /// rstar R*-tree bulk load
    Rstar,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Ambiguity {
    /// First containing region visited by the index wins
    First,
    /// Lowest region id among all containing regions wins
    LowestId,
}

/// Assign each point to the region that contains it.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON (or TOML with the `toml` feature) config file; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GeoJSON feature collection of regions
    #[arg(short, long)]
    regions: Option<PathBuf>,

    /// Delimited point file
    #[arg(short, long)]
    points: Option<PathBuf>,

    /// Output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Feature property holding the region name
    #[arg(long)]
    name_property: Option<String>,

    /// Zero-based column of the external key
    #[arg(long)]
    key_column: Option<usize>,

    /// Zero-based column of the x coordinate (longitude)
    #[arg(long)]
    x_column: Option<usize>,

    /// Zero-based column of the y coordinate (latitude)
    #[arg(long)]
    y_column: Option<usize>,

    /// Fail on unparsable coordinates instead of substituting 0.0
    #[arg(long)]
    strict_coordinates: bool,

    /// Worker threads (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum children per index node
    #[arg(long)]
    fanout: Option<usize>,

    #[arg(long, value_enum)]
    backend: Option<Backend>,

    #[arg(long, value_enum)]
    ambiguity: Option<Ambiguity>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_path(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(path) = self.regions {
            config.regions.path = path;
        }
        if let Some(path) = self.points {
            config.points.path = path;
        }
        if let Some(path) = self.output {
            config.output.path = path;
        }
        if let Some(property) = self.name_property {
            config.regions.name_property = property;
        }
        if let Some(column) = self.key_column {
            config.points.key_column = column;
        }
        if let Some(column) = self.x_column {
            config.points.x_column = column;
        }
        if let Some(column) = self.y_column {
            config.points.y_column = column;
        }
        if self.strict_coordinates {
            config.points.coordinate_policy = CoordinatePolicy::Strict;
        }
        if let Some(workers) = self.workers {
            config.join.workers = workers;
        }
        if let Some(fanout) = self.fanout {
            config.index.max_fanout = fanout;
        }
        if let Some(backend) = self.backend {
            config.index.backend = match backend {
                Backend::Packed => IndexBackend::Packed,
                Backend::Rstar => IndexBackend::RStar,
            };
        }
        if let Some(ambiguity) = self.ambiguity {
            config.join.ambiguity = match ambiguity {
                Ambiguity::First => AmbiguityPolicy::FirstVisited,
                Ambiguity::LowestId => AmbiguityPolicy::LowestId,
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regionjoin=info".into()),
        )
        .init();

    let config = Args::parse().into_config()?;
    info!(
        "Joining {} against {}",
        config.points.path.display(),
        config.regions.path.display()
    );

    let summary = pipeline::run(&config, |event| match event {
        PhaseEvent::Started(phase) => {
            print!("{}... ", phase);
            let _ = std::io::stdout().flush();
        }
        PhaseEvent::Finished(_, elapsed) => println!("{:.2} secs", elapsed.as_secs_f64()),
        PhaseEvent::Failed(..) => println!("failed"),
    })?;

    println!(
        "Total execution time... {:.2} secs",
        summary.elapsed.as_secs_f64()
    );
    info!(
        "{} of {} records matched, {} rows written",
        summary.join.matched, summary.records, summary.written
    );
    Ok(())
}
