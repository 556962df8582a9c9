//! Fallback records for listened tracks that have no `songs` row yet.
//!
//! Each row keeps the names as reported plus a JSON array of play timestamps.
//! Linking fills the weak `artist_id`/`album_id`/`song_id` keys once the
//! library catches up.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::models::{LinkStats, ScrobbledSong};
use crate::progress::Progress;
use crate::resolver::Resolver;

/// Parse the `scrobble_timestamps` JSON array.
pub fn scrobble_timestamps(row: &ScrobbledSong) -> Result<Vec<i64>> {
    serde_json::from_str(&row.scrobble_timestamps)
        .with_context(|| format!("Invalid scrobble timestamps on row {}", row.id))
}

/// Record one play. Appends to the row with the same artist/album/title
/// (case-insensitive) or inserts a new one. Returns the row id.
pub fn record_scrobble(
    conn: &Connection,
    artist: &str,
    album: Option<&str>,
    title: &str,
    timestamp: i64,
) -> Result<i64> {
    let sql = format!(
        "SELECT {} FROM scrobbled_songs
         WHERE LOWER(artist_name) = LOWER(?1)
           AND LOWER(title) = LOWER(?2)
           AND LOWER(COALESCE(album_name, '')) = LOWER(COALESCE(?3, ''))
         ORDER BY id LIMIT 1",
        ScrobbledSong::COLUMNS
    );
    let existing = conn
        .query_row(&sql, params![artist, title, album], ScrobbledSong::from_row)
        .optional()?;

    match existing {
        Some(row) => {
            let mut timestamps = scrobble_timestamps(&row)?;
            if !timestamps.contains(&timestamp) {
                timestamps.push(timestamp);
                timestamps.sort_unstable();
            }
            conn.execute(
                "UPDATE scrobbled_songs SET scrobble_timestamps = ?1 WHERE id = ?2",
                params![serde_json::to_string(&timestamps)?, row.id],
            )?;
            Ok(row.id)
        }
        None => {
            conn.execute(
                "INSERT INTO scrobbled_songs (artist_name, album_name, title, scrobble_timestamps)
                 VALUES (?1, ?2, ?3, ?4)",
                params![artist, album, title, serde_json::to_string(&[timestamp])?],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

fn unlinked(conn: &Connection) -> Result<Vec<ScrobbledSong>> {
    let sql = format!(
        "SELECT {} FROM scrobbled_songs
         WHERE artist_id IS NULL OR album_id IS NULL OR song_id IS NULL
         ORDER BY id",
        ScrobbledSong::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], ScrobbledSong::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Resolve every partially linked row and fill in the keys that are missing.
/// Keys that are already set are left alone. With `dry_run` nothing is written.
pub fn link_scrobbled_songs(conn: &Connection, resolver: &mut Resolver, dry_run: bool) -> Result<LinkStats> {
    let rows = unlinked(conn)?;
    let total = rows.len() as u64;
    let mut progress = Progress::new("link", "Linking scrobbles", total, 500);
    let mut stats = LinkStats::default();

    for row in &rows {
        stats.examined += 1;

        let artist_id = match row.artist_id {
            Some(id) => Some(id),
            None => resolver.lookup_artist(&row.artist_name, None)?.map(|(id, _)| id),
        };
        let album_id = match (row.album_id, row.album_name.as_deref()) {
            (Some(id), _) => Some(id),
            (None, Some(album)) => resolver.lookup_album(album, artist_id, None)?.map(|(id, _)| id),
            (None, None) => None,
        };
        let song_id = match row.song_id {
            Some(id) => Some(id),
            None => resolver
                .lookup_song(&row.title, Some(row.artist_name.as_str()), row.album_name.as_deref(), None)?
                .map(|(id, _)| id),
        };

        let new_artist = row.artist_id.is_none() && artist_id.is_some();
        let new_album = row.album_id.is_none() && album_id.is_some();
        let new_song = row.song_id.is_none() && song_id.is_some();
        stats.artists_linked += new_artist as usize;
        stats.albums_linked += new_album as usize;
        stats.songs_linked += new_song as usize;
        if song_id.is_none() {
            stats.unresolved += 1;
        }

        if (new_artist || new_album || new_song) && !dry_run {
            conn.execute(
                "UPDATE scrobbled_songs SET artist_id = ?1, album_id = ?2, song_id = ?3 WHERE id = ?4",
                params![artist_id, album_id, song_id, row.id],
            )?;
        }
        debug!(id = row.id, ?artist_id, ?album_id, ?song_id, "scrobble resolved");

        progress.inc();
    }

    progress.finish();
    Ok(stats)
}
