//! Error taxonomy for the reconciliation core.
//!
//! Shape errors are per-track, collaborator failures are per-artist. The
//! batch runner treats the former as skippable and the latter as fail-soft:
//! the artist is reported and the batch continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A raw record is missing a field the core cannot work without.
    #[error("track {track_id}: missing required field `{field}`")]
    TrackShape {
        track_id: String,
        field: &'static str,
    },

    /// The catalog or play-count source failed for one artist.
    #[error("source failed for artist {artist_id}: {reason}")]
    Source { artist_id: String, reason: String },

    /// The backfill fetch collaborator failed. No internal retries; the
    /// caller owns backoff policy.
    #[error("backfill fetch failed for artist {artist_id}: {reason}")]
    Backfill { artist_id: String, reason: String },

    #[error("sink error: {0}")]
    Sink(#[from] rusqlite::Error),

    #[error("malformed input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
