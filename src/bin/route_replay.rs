use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use flate2::read::GzDecoder;
use route_tracker_rs::{GpxTrack, Outcome, RouteAccumulator, Sample, TrackerConfig};

#[derive(Parser, Debug)]
#[command(about = "Replay recorded GPS fixes through the route accumulator")]
struct Args {
    /// Path to a JSON array of samples (.json or .json.gz)
    #[arg(long)]
    input: PathBuf,

    /// Tracker config JSON; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Wall clock for the future-timestamp rule [ms since epoch]; system time when omitted
    #[arg(long)]
    now_ms: Option<i64>,

    /// Write the accepted path as GPX
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Print the full snapshot instead of the stats only
    #[arg(long, default_value_t = false)]
    full: bool,
}

fn load_samples(path: &Path) -> anyhow::Result<Vec<Sample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let samples = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let reader = BufReader::new(GzDecoder::new(file));
        serde_json::from_reader(reader)?
    } else {
        serde_json::from_reader(BufReader::new(file))?
    };
    Ok(samples)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::from_path(path)?,
        None => TrackerConfig::default(),
    };

    let samples = load_samples(&args.input)?;
    if samples.is_empty() {
        bail!("{} contains no samples", args.input.display());
    }
    log::info!("Replaying {} samples from {}", samples.len(), args.input.display());

    let mut accumulator = RouteAccumulator::new(config);
    let mut reanchors = 0usize;
    for sample in &samples {
        let outcome = match args.now_ms {
            Some(now_ms) => accumulator.add_coordinate_at(sample, now_ms),
            None => accumulator.add_coordinate(sample),
        };
        if outcome == Outcome::Reanchored {
            reanchors += 1;
        }
    }

    let snapshot = accumulator.snapshot();
    log::info!(
        "Accepted {}/{} fixes, {:.1} m, {} re-anchor(s)",
        snapshot.stats.accepted_count,
        snapshot.stats.raw_count,
        snapshot.total_distance,
        reanchors
    );

    if let Some(gpx_path) = &args.gpx {
        let name = args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "route".to_string());
        let xml = GpxTrack::from_path(&name, &snapshot.accepted_path).to_gpx_xml();
        fs::write(gpx_path, xml).with_context(|| format!("writing {}", gpx_path.display()))?;
        log::info!("GPX written to {}", gpx_path.display());
    }

    if args.full {
        println!("{}", snapshot.to_json()?);
    } else {
        println!("{}", serde_json::to_string_pretty(&snapshot.stats)?);
    }

    Ok(())
}
