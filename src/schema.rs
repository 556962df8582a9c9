//! Table definitions, connection opening and database optimization.

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

use crate::models::Song;
use crate::progress::create_spinner;

pub const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS artists (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        mbid TEXT,
        origin TEXT,
        last_updated TEXT
    );

    CREATE TABLE IF NOT EXISTS albums (
        id INTEGER PRIMARY KEY,
        artist_id INTEGER REFERENCES artists(id),
        name TEXT NOT NULL,
        year INTEGER,
        mbid TEXT,
        folder_path TEXT,
        total_tracks INTEGER,
        last_updated TEXT
    );

    CREATE TABLE IF NOT EXISTS songs (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT,
        album TEXT,
        album_id INTEGER,
        track_number INTEGER,
        file_path TEXT,
        bitrate INTEGER,
        duration REAL,
        mbid TEXT,
        last_updated TEXT
    );

    CREATE TABLE IF NOT EXISTS scrobbled_songs (
        id INTEGER PRIMARY KEY,
        artist_name TEXT NOT NULL,
        album_name TEXT,
        title TEXT NOT NULL,
        scrobble_timestamps TEXT NOT NULL DEFAULT '[]',
        artist_id INTEGER,
        album_id INTEGER,
        song_id INTEGER
    );
";

/// Whether song `s` belongs to album `al` (whose artist is joined as `ar`).
/// `album_id` wins when set; legacy rows only carry the album and artist names.
pub const SONG_IN_ALBUM: &str = "(s.album_id = al.id
     OR (s.album_id IS NULL
         AND LOWER(s.album) = LOWER(al.name)
         AND LOWER(s.artist) = LOWER(ar.name)))";

/// Prefix every column of a `COLUMNS` list with a table alias.
pub fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lookup indexes. Case-insensitive name lookups use `LOWER(...)` expression indexes.
pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_artists_name ON artists (LOWER(name))",
    "CREATE INDEX IF NOT EXISTS idx_artists_mbid ON artists (mbid)",
    "CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums (artist_id)",
    "CREATE INDEX IF NOT EXISTS idx_albums_name ON albums (LOWER(name))",
    "CREATE INDEX IF NOT EXISTS idx_albums_mbid ON albums (mbid)",
    "CREATE INDEX IF NOT EXISTS idx_songs_title ON songs (LOWER(title))",
    "CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs (LOWER(artist))",
    "CREATE INDEX IF NOT EXISTS idx_songs_album ON songs (LOWER(album))",
    "CREATE INDEX IF NOT EXISTS idx_songs_album_id ON songs (album_id)",
    "CREATE INDEX IF NOT EXISTS idx_songs_file_path ON songs (file_path)",
    "CREATE INDEX IF NOT EXISTS idx_songs_mbid ON songs (mbid)",
    "CREATE INDEX IF NOT EXISTS idx_scrobbled_song ON scrobbled_songs (song_id)",
];

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)
        .context("Failed to create tables")?;
    Ok(())
}

/// Open an existing database read-write. Never creates a new file.
pub fn open_existing(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        bail!("Database not found: {}", path.display());
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA temp_store = MEMORY;")?;
    Ok(conn)
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    for sql in INDEXES {
        debug!(sql, "creating index");
        conn.execute(sql, [])?;
    }
    Ok(())
}

/// Create (or recreate) the `songs_fts` table and fill it from `songs`.
pub fn build_fts_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS songs_fts;
         CREATE VIRTUAL TABLE songs_fts USING fts5(
             title, artist, album,
             content='songs',
             content_rowid='id',
             tokenize='unicode61 remove_diacritics 2'
         );
         INSERT INTO songs_fts(songs_fts) VALUES('rebuild');",
    )
    .context("Failed to build full-text index")?;
    Ok(())
}

/// Indexes, full-text table, then ANALYZE and VACUUM.
pub fn optimize_database(conn: &Connection) -> Result<()> {
    let spinner = create_spinner("Phase 1: Creating indexes");
    create_indexes(conn)?;
    spinner.finish_with_message(format!("Phase 1: {} indexes ready", INDEXES.len()));

    let spinner = create_spinner("Phase 2: Building FTS index");
    build_fts_index(conn)?;
    spinner.finish_with_message("Phase 2: FTS index built");

    let spinner = create_spinner("Phase 3: Optimizing database");
    conn.execute_batch("ANALYZE; VACUUM;")?;
    spinner.finish_with_message("Phase 3: Database optimized");
    Ok(())
}

/// Full-text search over songs. Requires [`build_fts_index`] to have run.
pub fn search_songs(conn: &Connection, query: &str, limit: usize) -> Result<Vec<Song>> {
    let sql = format!(
        "SELECT {} FROM songs_fts fts
         JOIN songs s ON fts.rowid = s.id
         WHERE songs_fts MATCH ?1
         ORDER BY rank
         LIMIT ?2",
        qualified(Song::COLUMNS, "s")
    );
    let mut stmt = conn.prepare(&sql)?;
    let songs = stmt
        .query_map(rusqlite::params![query, limit as i64], Song::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(songs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_schema_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();
        create_indexes(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.db");
        let err = open_existing(&missing).unwrap_err();
        assert!(err.to_string().contains("Database not found"));
        assert!(!missing.exists());
    }

    #[test]
    fn test_fts_search() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO songs (id, title, artist, album) VALUES
                (1, 'Paranoid Android', 'Radiohead', 'OK Computer'),
                (2, 'Karma Police', 'Radiohead', 'OK Computer'),
                (3, 'Héroe de leyenda', 'Héroes del Silencio', 'Senderos');",
        )
        .unwrap();
        build_fts_index(&conn).unwrap();

        let hits = search_songs(&conn, "android", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        let hits = search_songs(&conn, "heroes", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 3);
    }
}
