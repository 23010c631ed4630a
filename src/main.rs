use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use catalog_reconcile::models::ArtistRecord;
use catalog_reconcile::pipeline::{run_batch, PipelineProfile};
use catalog_reconcile::progress;
use catalog_reconcile::sources::{
    JsonCatalogSource, JsonPlayCountSource, JsonTrackFetcher, SqliteSink,
};

#[derive(Parser)]
#[command(name = "catalog-reconcile")]
#[command(about = "Reconcile per-artist catalogs with scraped play counts into one canonical SQLite catalog")]
struct Args {
    /// Directory with artists.json and per-artist subdirectories
    /// (tracks.json, counts.json, optional backfill.json)
    data_dir: PathBuf,

    /// Output SQLite database
    output: PathBuf,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Threshold profile: "standard" (20s grouping, override 45) or
    /// "legacy" (1.7s grouping, override 20)
    #[arg(long, default_value = "standard")]
    profile: String,

    /// Filter by artist names (comma-separated, case-insensitive)
    #[arg(long)]
    artists: Option<String>,

    /// Write aggregated batch stats to this JSON file
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Hide progress bars for tail-friendly output
    #[arg(long)]
    log_only: bool,
}

fn load_artists(data_dir: &std::path::Path) -> Result<Vec<ArtistRecord>> {
    let path = data_dir.join("artists.json");
    let bytes = std::fs::read(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let artists: Vec<ArtistRecord> =
        serde_json::from_slice(&bytes).with_context(|| format!("malformed {}", path.display()))?;
    Ok(artists)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    progress::set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let profile = PipelineProfile::named(&args.profile)
        .with_context(|| format!("unknown profile '{}' (expected standard|legacy)", args.profile))?;

    // The output must never point back into the input tree.
    if args.output.starts_with(&args.data_dir) {
        bail!(
            "output database {} must not live inside the data directory",
            args.output.display()
        );
    }
    if args.output.exists() {
        std::fs::remove_file(&args.output)
            .context("Failed to remove existing output file")?;
    }

    let start = Instant::now();

    let mut artists = load_artists(&args.data_dir)?;
    println!("Loaded {} artists from {:?}", artists.len(), args.data_dir);
    if let Some(filter) = &args.artists {
        let wanted: Vec<String> = filter.split(',').map(|a| a.trim().to_lowercase()).collect();
        artists.retain(|a| wanted.iter().any(|w| a.name.to_lowercase().contains(w)));
        println!("Filtering to {} artists matching {:?}", artists.len(), wanted);
    }

    let catalog = JsonCatalogSource::new(&args.data_dir);
    let play_counts = JsonPlayCountSource::new(&args.data_dir);
    let fetcher = JsonTrackFetcher::new(&args.data_dir);

    println!("Creating output database: {:?}", args.output);
    let mut sink = SqliteSink::create(&args.output)?;

    let report = run_batch(&artists, &catalog, &play_counts, &fetcher, profile, &mut sink)?;

    let elapsed = start.elapsed();
    println!("\n{:=<60}", "");
    println!("Reconciliation complete!");
    println!("  Artists: {} ({} failed)", report.processed, report.failed.len());
    println!("  Tracks: {} in, {} out", report.stats.tracks_in, report.stats.tracks_out);
    println!(
        "  Groups: {} ({:.1}% with a scraped count)",
        report.stats.groups,
        report.stats.match_rate()
    );
    println!(
        "  Backfilled: {} tracks, {} gaps dropped",
        report.stats.backfilled_tracks, report.stats.unresolved_gaps
    );
    println!("  Overrides fired: {}", report.stats.overrides_fired);
    println!("  Elapsed: {}", progress::format_duration(elapsed));
    println!("{:=<60}", "");

    for (artist_id, reason) in &report.failed {
        eprintln!("FAILED {artist_id}: {reason}");
    }

    report.stats.log_phase("batch");
    if let Some(path) = &args.stats {
        report.stats.write_to_file(path)?;
        println!("Wrote stats to {:?}", path);
    }

    Ok(())
}
