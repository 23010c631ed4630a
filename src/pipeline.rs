//! Per-artist pipeline and the fail-soft batch runner.
//!
//! Each artist is an independent unit: catalog + counts in, reconciled and
//! scored tracks out. Artists run in parallel on the rayon pool; finished
//! results stream over a channel to a single writer thread so the sink sees
//! one artist at a time. A failing artist is reported and skipped; the batch
//! continues.

use crossbeam_channel::bounded;
use log::error;
use rayon::prelude::*;

use crate::cluster::Clusterer;
use crate::errors::CatalogError;
use crate::models::{ArtistRecord, RawTrack, ReconcileStats};
use crate::normalize::TitleNormalizer;
use crate::progress::create_progress_bar;
use crate::reconcile::reconcile;
use crate::score::{resolve_track_popularity, score_from_followers, score_from_streams};
use crate::sources::{CatalogSink, CatalogSource, PlayCountSource, TrackFetcher};

/// In-flight artist results buffered between workers and the sink writer.
const ARTIST_CHANNEL_BOUND: usize = 32;

// ============================================================================
// Profiles
// ============================================================================

/// A named threshold pair. Two incompatible generations of the pipeline are
/// in circulation; each is preserved as its own profile and they never mix
/// within one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineProfile {
    /// Duration proximity for variant clustering.
    pub grouping_threshold_ms: u64,
    /// How far the API popularity must exceed the stream-derived score
    /// before it overrides it.
    pub override_threshold: i32,
}

impl PipelineProfile {
    /// Current production settings: wide duration window, conservative
    /// override.
    pub fn standard() -> Self {
        Self {
            grouping_threshold_ms: 20_000,
            override_threshold: 45,
        }
    }

    /// First-generation settings: tight duration window, eager override.
    pub fn legacy() -> Self {
        Self {
            grouping_threshold_ms: 1_700,
            override_threshold: 20,
        }
    }

    pub fn named(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "legacy" => Some(Self::legacy()),
            _ => None,
        }
    }
}

// ============================================================================
// Per-artist pipeline
// ============================================================================

/// One artist's fully processed output.
pub struct ArtistResult {
    pub artist: ArtistRecord,
    pub tracks: Vec<RawTrack>,
    pub stats: ReconcileStats,
}

/// Run the full pipeline for one artist: reconcile the catalog against the
/// scraped counts, resolve every track's popularity, and derive the artist's
/// own popularity from followers.
pub fn run_artist(
    artist: &ArtistRecord,
    catalog: &dyn CatalogSource,
    counts: &dyn PlayCountSource,
    fetcher: &dyn TrackFetcher,
    profile: PipelineProfile,
) -> Result<ArtistResult, CatalogError> {
    let clusterer = Clusterer::new(TitleNormalizer::default(), profile.grouping_threshold_ms);

    let raw = catalog.artist_tracks(&artist.artist_id)?;
    let scraped = counts.artist_counts(&artist.artist_id)?;

    let outcome = reconcile(&artist.artist_id, raw, &scraped, fetcher, &clusterer)?;
    let mut stats = outcome.stats;
    let mut tracks = outcome.tracks;

    for track in tracks.iter_mut() {
        let play_count = track.play_count.unwrap_or(0);
        let resolved =
            resolve_track_popularity(play_count, track.api_popularity, profile.override_threshold);
        if play_count > 0 && resolved != score_from_streams(play_count) {
            stats.overrides_fired += 1;
        }
        track.popularity = Some(resolved);
    }

    let mut artist = artist.clone();
    artist.popularity = Some(score_from_followers(artist.followers.unwrap_or(0)));

    Ok(ArtistResult {
        artist,
        tracks,
        stats,
    })
}

// ============================================================================
// Batch runner
// ============================================================================

/// Outcome of a batch run: how many artists were persisted, which failed and
/// why, and the aggregated counters.
pub struct ArtistBatchReport {
    pub processed: usize,
    pub failed: Vec<(String, String)>,
    pub stats: ReconcileStats,
}

/// Process a batch of artists in parallel, fail-soft per artist.
///
/// Workers run on the rayon pool; completed [`ArtistResult`]s stream to a
/// dedicated writer thread that owns the sink. A sink error is fatal for the
/// batch; an artist error only removes that artist.
pub fn run_batch<S: CatalogSink + Send>(
    artists: &[ArtistRecord],
    catalog: &(dyn CatalogSource + Sync),
    counts: &(dyn PlayCountSource + Sync),
    fetcher: &(dyn TrackFetcher + Sync),
    profile: PipelineProfile,
    sink: &mut S,
) -> Result<ArtistBatchReport, CatalogError> {
    let pb = create_progress_bar(artists.len() as u64, "Reconciling artists");
    let (tx, rx) = bounded::<ArtistResult>(ARTIST_CHANNEL_BOUND);

    let (failed, write_result) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || -> Result<(usize, ReconcileStats), CatalogError> {
            let mut persisted = 0usize;
            let mut aggregate = ReconcileStats::default();
            for result in rx.iter() {
                sink.persist_artist(&result.artist, &result.tracks, &result.stats)?;
                aggregate.absorb(&result.stats);
                persisted += 1;
            }
            Ok((persisted, aggregate))
        });

        let failed: Vec<(String, String)> = artists
            .par_iter()
            .filter_map(|artist| {
                let outcome = run_artist(artist, catalog, counts, fetcher, profile);
                pb.inc(1);
                match outcome {
                    Ok(result) => {
                        // Send only fails when the writer hung up on a sink
                        // error; the error itself surfaces via join below.
                        let _ = tx.send(result);
                        None
                    }
                    Err(e) => {
                        error!("artist {}: {e}", artist.artist_id);
                        Some((artist.artist_id.clone(), e.to_string()))
                    }
                }
            })
            .collect();

        drop(tx);
        (failed, writer.join().expect("sink writer panicked"))
    });

    let (processed, stats) = write_result?;
    pb.finish_with_message(format!(
        "Reconciled {} artists ({} failed)",
        processed,
        failed.len()
    ));

    Ok(ArtistBatchReport {
        processed,
        failed,
        stats,
    })
}
