//! Collaborator seams: catalog input, scraped play counts, backfill fetch,
//! and the persistence sink.
//!
//! The core consumes and produces in-memory structures only; these traits
//! are where the scraping/HTTP/storage implementations plug in. Shipped here
//! are local implementations sufficient to run the pipeline end-to-end:
//! JSON files in, SQLite out.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use rusqlite::{params, Connection};
use rustc_hash::FxHashSet;

use crate::errors::CatalogError;
use crate::models::{ArtistRecord, PlayCounts, RawTrack, RawTrackRecord, ReconcileStats};

// ============================================================================
// Traits
// ============================================================================

/// Returns an artist's raw catalog. Any subset of optional fields may be
/// absent on first fetch.
pub trait CatalogSource {
    fn artist_tracks(&self, artist_id: &str) -> Result<Vec<RawTrack>, CatalogError>;
}

/// Returns an artist's scraped play counts (may be empty).
pub trait PlayCountSource {
    fn artist_counts(&self, artist_id: &str) -> Result<PlayCounts, CatalogError>;
}

/// Fetches full track records for ids the catalog is missing. Must tolerate
/// partial results: ids that resolve to nothing are simply absent from the
/// returned sequence. Retry/backoff belongs to the implementation, not the
/// core.
pub trait TrackFetcher {
    fn fetch_tracks(&self, artist_id: &str, ids: &[String]) -> Result<Vec<RawTrack>, CatalogError>;
}

/// Accepts the final annotated catalog for one artist.
pub trait CatalogSink {
    fn persist_artist(
        &mut self,
        artist: &ArtistRecord,
        tracks: &[RawTrack],
        stats: &ReconcileStats,
    ) -> Result<(), CatalogError>;
}

// ============================================================================
// JSON-file sources
// ============================================================================

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Reads `<root>/<artist_id>/tracks.json`: a JSON array of track records.
/// Records failing shape validation are logged and skipped; the artist's
/// remaining tracks survive.
pub struct JsonCatalogSource {
    root: PathBuf,
}

impl JsonCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CatalogSource for JsonCatalogSource {
    fn artist_tracks(&self, artist_id: &str) -> Result<Vec<RawTrack>, CatalogError> {
        let path = self.root.join(artist_id).join("tracks.json");
        let records: Vec<RawTrackRecord> =
            read_json(&path).map_err(|e| CatalogError::Source {
                artist_id: artist_id.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;

        let mut tracks = Vec::with_capacity(records.len());
        for record in records {
            match record.into_track() {
                Ok(track) => tracks.push(track),
                Err(e) => warn!("artist {artist_id}: skipping malformed record: {e}"),
            }
        }
        Ok(tracks)
    }
}

/// Reads `<root>/<artist_id>/counts.json`: a JSON object of track id to
/// total play count.
pub struct JsonPlayCountSource {
    root: PathBuf,
}

impl JsonPlayCountSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PlayCountSource for JsonPlayCountSource {
    fn artist_counts(&self, artist_id: &str) -> Result<PlayCounts, CatalogError> {
        let path = self.root.join(artist_id).join("counts.json");
        read_json(&path).map_err(|e| CatalogError::Source {
            artist_id: artist_id.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

/// Reads `<root>/<artist_id>/backfill.json`: a JSON array of full track
/// records, filtered down to the requested ids. A missing file means the
/// source has nothing for this artist; that is a partial result, not an
/// error.
pub struct JsonTrackFetcher {
    root: PathBuf,
}

impl JsonTrackFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TrackFetcher for JsonTrackFetcher {
    fn fetch_tracks(&self, artist_id: &str, ids: &[String]) -> Result<Vec<RawTrack>, CatalogError> {
        let path = self.root.join(artist_id).join("backfill.json");
        if !path.exists() {
            debug!("artist {artist_id}: no backfill file at {}", path.display());
            return Ok(Vec::new());
        }

        let records: Vec<RawTrackRecord> =
            read_json(&path).map_err(|e| CatalogError::Backfill {
                artist_id: artist_id.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;

        let wanted: FxHashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut tracks = Vec::new();
        for record in records {
            match record.into_track() {
                Ok(track) if wanted.contains(track.track_id.as_str()) => tracks.push(track),
                Ok(_) => {}
                Err(e) => warn!("artist {artist_id}: skipping malformed backfill record: {e}"),
            }
        }
        Ok(tracks)
    }
}

// ============================================================================
// SQLite sink
// ============================================================================

/// Rows per transaction when persisting an artist's catalog.
const WRITE_BATCH_SIZE: usize = 10_000;

/// Persists reconciled catalogs into a SQLite database: one `artists` table
/// and one `tracks` table with the resolved play count and popularity.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Create (or recreate) the output database at `path`.
    pub fn create(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;

             CREATE TABLE IF NOT EXISTS artists (
                 artist_id         TEXT PRIMARY KEY,
                 name              TEXT NOT NULL,
                 followers         INTEGER,
                 monthly_listeners INTEGER,
                 popularity        INTEGER NOT NULL
             );

             CREATE TABLE IF NOT EXISTS tracks (
                 track_id     TEXT PRIMARY KEY,
                 artist_id    TEXT NOT NULL,
                 title        TEXT NOT NULL,
                 artists      TEXT NOT NULL,
                 album        TEXT,
                 release_date TEXT,
                 isrc         TEXT,
                 duration_ms  INTEGER NOT NULL,
                 play_count   INTEGER NOT NULL,
                 popularity   INTEGER NOT NULL
             );",
        )?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection (tests and tooling).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl CatalogSink for SqliteSink {
    fn persist_artist(
        &mut self,
        artist: &ArtistRecord,
        tracks: &[RawTrack],
        _stats: &ReconcileStats,
    ) -> Result<(), CatalogError> {
        for chunk in tracks.chunks(WRITE_BATCH_SIZE) {
            let tx = self.conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR REPLACE INTO tracks
                     (track_id, artist_id, title, artists, album, release_date,
                      isrc, duration_ms, play_count, popularity)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )?;
                for track in chunk {
                    let artists_json = serde_json::to_string(&track.artists)?;
                    stmt.execute(params![
                        track.track_id,
                        artist.artist_id,
                        track.title,
                        artists_json,
                        track.album,
                        track.release_date,
                        track.isrc,
                        track.duration_ms as i64,
                        track.play_count.unwrap_or(0) as i64,
                        track.popularity.unwrap_or(0),
                    ])?;
                }
            }
            tx.commit()?;
        }

        self.conn.execute(
            "INSERT OR REPLACE INTO artists
             (artist_id, name, followers, monthly_listeners, popularity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                artist.artist_id,
                artist.name,
                artist.followers.map(|f| f as i64),
                artist.monthly_listeners.map(|m| m as i64),
                artist.popularity.unwrap_or(0),
            ],
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn track(id: &str, title: &str, duration_ms: u64) -> RawTrack {
        RawTrack {
            track_id: id.to_string(),
            title: title.to_string(),
            artists: vec!["Artist".to_string()],
            duration_ms,
            album: "Album".to_string(),
            release_date: Some("2001-05-01".to_string()),
            isrc: None,
            api_popularity: Some(40),
            play_count: Some(1_000),
            popularity: Some(12),
        }
    }

    #[test]
    fn catalog_source_skips_malformed_records() {
        let dir = tempfile::tempdir().unwrap();
        let artist_dir = dir.path().join("ar1");
        fs::create_dir_all(&artist_dir).unwrap();
        fs::write(
            artist_dir.join("tracks.json"),
            r#"[
                {"track_id": "t1", "title": "Song", "duration_ms": 200000},
                {"track_id": "t2", "title": "No Duration"},
                {"title": "No Id", "duration_ms": 1000}
            ]"#,
        )
        .unwrap();

        let source = JsonCatalogSource::new(dir.path());
        let tracks = source.artist_tracks("ar1").unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, "t1");
    }

    #[test]
    fn catalog_source_errors_on_missing_artist() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonCatalogSource::new(dir.path());
        assert!(source.artist_tracks("nope").is_err());
    }

    #[test]
    fn count_source_reads_map() {
        let dir = tempfile::tempdir().unwrap();
        let artist_dir = dir.path().join("ar1");
        fs::create_dir_all(&artist_dir).unwrap();
        fs::write(artist_dir.join("counts.json"), r#"{"t1": 12345, "t2": 0}"#).unwrap();

        let source = JsonPlayCountSource::new(dir.path());
        let counts = source.artist_counts("ar1").unwrap();
        assert_eq!(counts.get("t1"), Some(&12_345));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn fetcher_filters_to_requested_ids_and_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let artist_dir = dir.path().join("ar1");
        fs::create_dir_all(&artist_dir).unwrap();
        fs::write(
            artist_dir.join("backfill.json"),
            r#"[
                {"track_id": "t9", "title": "Found", "duration_ms": 180000},
                {"track_id": "t8", "title": "Not Asked For", "duration_ms": 180000}
            ]"#,
        )
        .unwrap();

        let fetcher = JsonTrackFetcher::new(dir.path());
        let got = fetcher
            .fetch_tracks("ar1", &["t9".to_string(), "t7".to_string()])
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].track_id, "t9");

        // No backfill file: partial result, not an error.
        let empty = fetcher.fetch_tracks("ar2", &["x".to_string()]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn sqlite_sink_round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.sqlite3");
        let mut sink = SqliteSink::create(&db_path).unwrap();

        let artist = ArtistRecord {
            artist_id: "ar1".to_string(),
            name: "The Band".to_string(),
            followers: Some(2_000_000),
            monthly_listeners: Some(5_000_000),
            popularity: Some(64),
        };
        let tracks = vec![track("t1", "Song", 200_000), track("t2", "Other", 300_000)];
        let stats = ReconcileStats::default();
        sink.persist_artist(&artist, &tracks, &stats).unwrap();

        let conn = sink.connection();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks WHERE artist_id = 'ar1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);

        let (play_count, popularity): (i64, i32) = conn
            .query_row(
                "SELECT play_count, popularity FROM tracks WHERE track_id = 't1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(play_count, 1_000);
        assert_eq!(popularity, 12);

        let artist_pop: i32 = conn
            .query_row("SELECT popularity FROM artists WHERE artist_id = 'ar1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(artist_pop, 64);
    }
}
