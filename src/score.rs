//! Popularity scoring: anchor-table interpolation plus anomaly override.
//!
//! Heterogeneous popularity signals (external play counts, the metadata
//! API's self-reported 0-100 popularity, artist follower counts) are mapped
//! onto a single 0-100 scale. A score comes from exactly one signal; streams
//! and API popularity are never blended.

// ============================================================================
// Anchor Tables
// ============================================================================

/// (total play count, score) anchors. Fixed domain constants, monotonically
/// increasing in both columns.
const STREAM_ANCHORS: &[(u64, i32)] = &[
    (0, 0),
    (25_000_000, 38),
    (50_000_000, 53),
    (100_000_000, 61),
    (150_000_000, 68),
    (250_000_000, 75),
    (500_000_000, 84),
    (1_000_000_000, 95),
    (2_000_000_000, 100),
];

/// (follower count, score) anchors for artist-level popularity.
const FOLLOWER_ANCHORS: &[(u64, i32)] = &[
    (0, 0),
    (1_000, 10),
    (50_000, 25),
    (250_000, 40),
    (1_000_000, 59),
    (5_000_000, 75),
    (10_000_000, 85),
    (15_000_000, 90),
    (25_000_000, 95),
    (50_000_000, 100),
];

/// Clamp to the anchor range, interpolate linearly between the bracketing
/// anchors, round to nearest.
fn interpolate(anchors: &[(u64, i32)], raw: u64) -> i32 {
    let (min_raw, min_score) = anchors[0];
    let (max_raw, max_score) = anchors[anchors.len() - 1];

    if raw <= min_raw {
        return min_score;
    }
    if raw >= max_raw {
        return max_score;
    }

    for pair in anchors.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if raw <= x1 {
            let t = (raw - x0) as f64 / (x1 - x0) as f64;
            return (y0 as f64 + t * (y1 - y0) as f64).round() as i32;
        }
    }

    max_score
}

/// Score a track from its total external play count.
pub fn score_from_streams(play_count: u64) -> i32 {
    interpolate(STREAM_ANCHORS, play_count)
}

/// Score an artist from its follower count.
pub fn score_from_followers(followers: u64) -> i32 {
    interpolate(FOLLOWER_ANCHORS, followers)
}

// ============================================================================
// API Popularity Adjustment
// ============================================================================

/// Additive correction for the API's self-reported 0-100 popularity, keyed
/// by raw-value bucket. The metric skews high in the low-eligible region and
/// low at the top; the correction pulls both ends toward the stream-derived
/// scale. Clamped to [0, 100] after adjustment.
pub fn adjust_api_popularity(raw: i32) -> i32 {
    let adjustment = match raw {
        46..=50 => -10,
        41..=45 => -9,
        36..=40 => -8,
        31..=35 => -7,
        26..=30 => -6,
        21..=25 => -5,
        16..=20 => -4,
        11..=15 => -3,
        6..=10 => -2,
        1..=5 => -1,
        63..=70 => 4,
        71..=100 => 7,
        _ => 0,
    };
    (raw + adjustment).clamp(0, 100)
}

// ============================================================================
// Track Resolution
// ============================================================================

/// Resolve one track's popularity from its two signals, in this order:
///
/// 1. play_count > 0: interpolate the stream anchors.
/// 2. Anomaly override: when the API reports popularity more than
///    `override_threshold` above the stream-derived score, the stream signal
///    is considered stale (e.g. a recent viral track with little accumulated
///    count history) and the API value wins outright.
/// 3. play_count == 0: fall back to the adjusted API popularity.
pub fn resolve_track_popularity(
    play_count: u64,
    api_popularity: Option<i32>,
    override_threshold: i32,
) -> i32 {
    let api = api_popularity.unwrap_or(0);

    if play_count > 0 {
        let score = score_from_streams(play_count);
        if api > score + override_threshold {
            api.clamp(0, 100)
        } else {
            score
        }
    } else {
        adjust_api_popularity(api)
    }
}
