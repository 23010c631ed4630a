//! Core data models for catalog reconciliation.
//!
//! This module contains the track/artist records flowing through the
//! pipeline, the group types produced by clustering, and the per-artist
//! reconciliation statistics.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::CatalogError;

// ============================================================================
// Type Aliases
// ============================================================================

/// Scraped play counts keyed by source track id.
pub type PlayCounts = FxHashMap<String, u64>;

// ============================================================================
// Track & Artist Records
// ============================================================================

/// One catalog entry for an artist. Immutable once fetched except for
/// `play_count` (attached by the reconciler) and `popularity` (attached by
/// the scorer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawTrack {
    pub track_id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub album: String,
    pub release_date: Option<String>,
    pub isrc: Option<String>,
    pub api_popularity: Option<i32>,
    #[serde(default)]
    pub play_count: Option<u64>,
    #[serde(default)]
    pub popularity: Option<i32>,
}

/// Permissive input shape for catalog JSON. Upstream feeds drop fields
/// without notice, so everything is optional here and validated once, at the
/// boundary, into a [`RawTrack`].
#[derive(Clone, Debug, Deserialize)]
pub struct RawTrackRecord {
    pub track_id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub album: String,
    pub release_date: Option<String>,
    pub isrc: Option<String>,
    pub api_popularity: Option<i32>,
    pub play_count: Option<u64>,
}

impl RawTrackRecord {
    /// Validate into a [`RawTrack`]. A missing required field fails this one
    /// track, never the artist.
    pub fn into_track(self) -> Result<RawTrack, CatalogError> {
        let track_id = self.track_id.ok_or_else(|| CatalogError::TrackShape {
            track_id: "<unknown>".to_string(),
            field: "track_id",
        })?;
        let title = self.title.ok_or_else(|| CatalogError::TrackShape {
            track_id: track_id.clone(),
            field: "title",
        })?;
        let duration_ms = self.duration_ms.ok_or_else(|| CatalogError::TrackShape {
            track_id: track_id.clone(),
            field: "duration_ms",
        })?;

        Ok(RawTrack {
            track_id,
            title,
            artists: self.artists,
            duration_ms,
            album: self.album,
            release_date: self.release_date,
            isrc: self.isrc,
            api_popularity: self.api_popularity,
            play_count: self.play_count,
            popularity: None,
        })
    }
}

/// Artist-level record. `popularity` is derived from `followers` by the
/// scorer, overwriting whatever the input carried.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub followers: Option<u64>,
    pub monthly_listeners: Option<u64>,
    #[serde(default)]
    pub popularity: Option<i32>,
}

// ============================================================================
// Canonical Groups
// ============================================================================

/// Identifies one canonical song group: a normalized title plus a 1-based
/// variant index for when duration clusters under the same title diverge.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct GroupKey {
    pub title: String,
    pub variant: u32,
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.variant == 1 {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{}_variant{}", self.title, self.variant)
        }
    }
}

/// One canonical song group. `members` are indices into the artist's track
/// vector, in discovery order. Invariant: every member's duration is within
/// the clustering threshold of at least one other member (chain clustering).
#[derive(Clone, Debug)]
pub struct SongGroup {
    pub key: GroupKey,
    pub members: Vec<usize>,
    /// Play count resolved for the whole group, once reconciled.
    pub play_count: Option<u64>,
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-artist reconciliation counters, aggregated batch-wide by the runner.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReconcileStats {
    pub tracks_in: usize,
    pub tracks_out: usize,
    pub groups: usize,
    pub groups_with_count: usize,
    pub missing_ids: usize,
    pub backfilled_tracks: usize,
    pub unresolved_gaps: usize,
    pub zero_filled: usize,
    pub overrides_fired: usize,
    pub elapsed_seconds: f64,
}

impl ReconcileStats {
    /// Share of groups that matched a scraped play count, as a percentage.
    pub fn match_rate(&self) -> f64 {
        if self.groups == 0 {
            0.0
        } else {
            100.0 * self.groups_with_count as f64 / self.groups as f64
        }
    }

    /// Fold another artist's counters into this batch aggregate.
    pub fn absorb(&mut self, other: &ReconcileStats) {
        self.tracks_in += other.tracks_in;
        self.tracks_out += other.tracks_out;
        self.groups += other.groups;
        self.groups_with_count += other.groups_with_count;
        self.missing_ids += other.missing_ids;
        self.backfilled_tracks += other.backfilled_tracks;
        self.unresolved_gaps += other.unresolved_gaps;
        self.zero_filled += other.zero_filled;
        self.overrides_fired += other.overrides_fired;
        self.elapsed_seconds += other.elapsed_seconds;
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
