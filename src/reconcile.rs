//! Cross-source reconciliation: scraped play counts onto canonical groups.
//!
//! The play-count source tracks one entry per song; the catalog carries every
//! re-release. Reconciliation matches each scraped count to a group,
//! broadcasts it to all sibling variants, detects catalog gaps (counts for
//! tracks the catalog never fetched), backfills them once through the
//! injected fetch collaborator, and zero-fills whatever remains.

use std::time::Instant;

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::cluster::Clusterer;
use crate::errors::CatalogError;
use crate::models::{PlayCounts, RawTrack, ReconcileStats, SongGroup};
use crate::sources::TrackFetcher;

/// Upper bound on ids per backfill fetch call (metadata API page size).
pub const FETCH_BATCH_SIZE: usize = 50;

/// Result of reconciling one artist: the enlarged track vector (every track
/// has `play_count` populated), the final grouping, and the counters.
pub struct ReconcileOutcome {
    pub tracks: Vec<RawTrack>,
    pub groups: Vec<SongGroup>,
    pub stats: ReconcileStats,
}

/// Reconcile one artist's catalog against its scraped play counts.
///
/// Runs to a fixed point with at most one backfill round: cluster, match,
/// detect gaps, fetch, re-cluster, re-match. Ids still unresolved after the
/// round are dropped with a warning rather than retried.
pub fn reconcile(
    artist_id: &str,
    mut tracks: Vec<RawTrack>,
    counts: &PlayCounts,
    fetcher: &dyn TrackFetcher,
    clusterer: &Clusterer,
) -> Result<ReconcileOutcome, CatalogError> {
    let start = Instant::now();
    let mut stats = ReconcileStats {
        tracks_in: tracks.len(),
        ..Default::default()
    };

    let mut groups = clusterer.cluster(&tracks);
    broadcast_counts(&mut tracks, &mut groups, counts);

    let missing = missing_ids(&tracks, counts);
    stats.missing_ids = missing.len();

    if !missing.is_empty() {
        let fetched = fetch_in_batches(fetcher, artist_id, &missing)?;
        stats.backfilled_tracks = fetched.len();
        info!(
            "artist {artist_id}: backfilled {} of {} missing tracks",
            fetched.len(),
            missing.len()
        );

        tracks.extend(fetched);
        groups = clusterer.cluster(&tracks);
        broadcast_counts(&mut tracks, &mut groups, counts);

        // Single round only: whatever is still unmatched is a logged gap.
        let unresolved = missing_ids(&tracks, counts);
        for id in &unresolved {
            warn!("artist {artist_id}: play count for {id} has no catalog entry after backfill; dropping");
        }
        stats.unresolved_gaps = unresolved.len();
    }

    for track in tracks.iter_mut() {
        if track.play_count.is_none() {
            track.play_count = Some(0);
            stats.zero_filled += 1;
        }
    }

    stats.tracks_out = tracks.len();
    stats.groups = groups.len();
    stats.groups_with_count = groups.iter().filter(|g| g.play_count.is_some()).count();
    stats.elapsed_seconds = start.elapsed().as_secs_f64();

    Ok(ReconcileOutcome {
        tracks,
        groups,
        stats,
    })
}

/// For each group, the first member present in the scraped counts decides
/// the group's count; it is broadcast to every member. All variants share one
/// count because the external source tracks a song once regardless of
/// re-release.
fn broadcast_counts(tracks: &mut [RawTrack], groups: &mut [SongGroup], counts: &PlayCounts) {
    for group in groups.iter_mut() {
        let resolved = group
            .members
            .iter()
            .find_map(|&m| counts.get(tracks[m].track_id.as_str()).copied());

        group.play_count = resolved;
        if let Some(count) = resolved {
            for &m in &group.members {
                tracks[m].play_count = Some(count);
            }
        }
    }
}

/// Scraped ids absent from every catalog entry, sorted for deterministic
/// fetch order.
fn missing_ids(tracks: &[RawTrack], counts: &PlayCounts) -> Vec<String> {
    let known: FxHashSet<&str> = tracks.iter().map(|t| t.track_id.as_str()).collect();
    let mut missing: Vec<String> = counts
        .keys()
        .filter(|id| !known.contains(id.as_str()))
        .cloned()
        .collect();
    missing.sort();
    missing
}

fn fetch_in_batches(
    fetcher: &dyn TrackFetcher,
    artist_id: &str,
    ids: &[String],
) -> Result<Vec<RawTrack>, CatalogError> {
    let mut fetched = Vec::new();
    for chunk in ids.chunks(FETCH_BATCH_SIZE) {
        fetched.extend(fetcher.fetch_tracks(artist_id, chunk)?);
    }
    Ok(fetched)
}
