//! Artist / album / song lookups against the library database.
//!
//! Every lookup runs the same ladder:
//! 1. exact case-insensitive name, narrowed by whatever context is known
//! 2. exact MusicBrainz id, when one is supplied
//! 3. fuzzy scoring over a candidate set scoped by the same context
//!
//! The resolver only reads. Callers decide what to write.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use tracing::{debug, info};

use crate::cache::{LookupCache, LookupKey, LookupScope};
use crate::config::MatchConfig;
use crate::models::{Album, Artist, Song};
use crate::normalize::normalize;
use crate::scoring::find_best_match_with;

pub struct Resolver<'c> {
    conn: &'c Connection,
    config: MatchConfig,
    cache: LookupCache,
}

fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, f)?.collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}

/// Matching by mbid is the only step that can land on a differently named row.
fn note_rename(kind: &str, query: &str, matched: &str) {
    if normalize(query) != normalize(matched) {
        info!(kind, query, matched, "mbid match under a different name (rename or alias?)");
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl<'c> Resolver<'c> {
    pub fn new(conn: &'c Connection, config: MatchConfig, cache: LookupCache) -> Self {
        Self { conn, config, cache }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// Drop memoised results, e.g. after the caller changed the tables.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn into_cache(self) -> LookupCache {
        self.cache
    }

    // ------------------------------------------------------------------------
    // Artists
    // ------------------------------------------------------------------------

    pub fn lookup_artist(&mut self, name: &str, mbid: Option<&str>) -> Result<Option<(i64, Artist)>> {
        let mbid = non_empty(mbid);
        let key = LookupKey::new(name, mbid, LookupScope::Unscoped);
        if let Some(cached) = self.cache.artists.get(&key) {
            debug!(name, "artist lookup served from cache");
            return Ok(cached.map(|a| (a.id, a)));
        }
        let found = self.find_artist(name, mbid)?;
        self.cache.artists.insert(key, found.clone());
        Ok(found.map(|a| (a.id, a)))
    }

    fn find_artist(&self, name: &str, mbid: Option<&str>) -> Result<Option<Artist>> {
        let exact = format!(
            "SELECT {} FROM artists WHERE LOWER(name) = LOWER(?1) ORDER BY id LIMIT 1",
            Artist::COLUMNS
        );
        if let Some(artist) = self
            .conn
            .query_row(&exact, [name.trim()], Artist::from_row)
            .optional()?
        {
            return Ok(Some(artist));
        }

        if let Some(mbid) = mbid {
            let by_mbid = format!(
                "SELECT {} FROM artists WHERE mbid = ?1 ORDER BY id LIMIT 1",
                Artist::COLUMNS
            );
            if let Some(artist) = self.conn.query_row(&by_mbid, [mbid], Artist::from_row).optional()? {
                note_rename("artist", name, &artist.name);
                return Ok(Some(artist));
            }
        }

        let threshold = self.config.artist_threshold;
        if threshold >= 1.0 {
            return Ok(None);
        }

        let sql = format!("SELECT {} FROM artists ORDER BY id", Artist::COLUMNS);
        let candidates = query_all(self.conn, &sql, [], Artist::from_row)?;
        debug!(name, candidates = candidates.len(), "fuzzy artist lookup");
        Ok(find_best_match_with(
            name,
            candidates.into_iter().map(|a| (a.name.clone(), a)),
            threshold,
            &self.config,
        )
        .map(|(artist, score)| {
            debug!(name, matched = %artist.name, score, "fuzzy artist match");
            artist
        }))
    }

    // ------------------------------------------------------------------------
    // Albums
    // ------------------------------------------------------------------------

    pub fn lookup_album(
        &mut self,
        name: &str,
        artist_id: Option<i64>,
        mbid: Option<&str>,
    ) -> Result<Option<(i64, Album)>> {
        let mbid = non_empty(mbid);
        let scope = artist_id.map_or(LookupScope::Unscoped, LookupScope::Artist);
        let key = LookupKey::new(name, mbid, scope);
        if let Some(cached) = self.cache.albums.get(&key) {
            debug!(name, "album lookup served from cache");
            return Ok(cached.map(|a| (a.id, a)));
        }
        let found = self.find_album(name, artist_id, mbid)?;
        self.cache.albums.insert(key, found.clone());
        Ok(found.map(|a| (a.id, a)))
    }

    fn find_album(&self, name: &str, artist_id: Option<i64>, mbid: Option<&str>) -> Result<Option<Album>> {
        let exact = format!(
            "SELECT {} FROM albums
             WHERE LOWER(name) = LOWER(?1) AND (?2 IS NULL OR artist_id = ?2)
             ORDER BY id LIMIT 1",
            Album::COLUMNS
        );
        if let Some(album) = self
            .conn
            .query_row(&exact, params![name.trim(), artist_id], Album::from_row)
            .optional()?
        {
            return Ok(Some(album));
        }

        if let Some(mbid) = mbid {
            let by_mbid = format!(
                "SELECT {} FROM albums WHERE mbid = ?1 ORDER BY id LIMIT 1",
                Album::COLUMNS
            );
            if let Some(album) = self.conn.query_row(&by_mbid, [mbid], Album::from_row).optional()? {
                note_rename("album", name, &album.name);
                return Ok(Some(album));
            }
        }

        let threshold = self.config.album_threshold;
        if threshold >= 1.0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM albums WHERE (?1 IS NULL OR artist_id = ?1) ORDER BY id",
            Album::COLUMNS
        );
        let candidates = query_all(self.conn, &sql, params![artist_id], Album::from_row)?;
        debug!(name, candidates = candidates.len(), "fuzzy album lookup");
        Ok(find_best_match_with(
            name,
            candidates.into_iter().map(|a| (a.name.clone(), a)),
            threshold,
            &self.config,
        )
        .map(|(album, score)| {
            debug!(name, matched = %album.name, score, "fuzzy album match");
            album
        }))
    }

    // ------------------------------------------------------------------------
    // Songs
    // ------------------------------------------------------------------------

    pub fn lookup_song(
        &mut self,
        title: &str,
        artist: Option<&str>,
        album: Option<&str>,
        mbid: Option<&str>,
    ) -> Result<Option<(i64, Song)>> {
        let artist = non_empty(artist);
        let album = non_empty(album);
        let mbid = non_empty(mbid);
        let key = LookupKey::new(title, mbid, LookupScope::names(artist, album));
        if let Some(cached) = self.cache.songs.get(&key) {
            debug!(title, "song lookup served from cache");
            return Ok(cached.map(|s| (s.id, s)));
        }
        let found = self.find_song(title, artist, album, mbid)?;
        self.cache.songs.insert(key, found.clone());
        Ok(found.map(|s| (s.id, s)))
    }

    fn find_song(
        &self,
        title: &str,
        artist: Option<&str>,
        album: Option<&str>,
        mbid: Option<&str>,
    ) -> Result<Option<Song>> {
        let exact = format!(
            "SELECT {} FROM songs
             WHERE LOWER(title) = LOWER(?1)
               AND (?2 IS NULL OR LOWER(artist) = LOWER(?2))
               AND (?3 IS NULL OR LOWER(album) = LOWER(?3))
             ORDER BY id LIMIT 1",
            Song::COLUMNS
        );
        if let Some(song) = self
            .conn
            .query_row(&exact, params![title.trim(), artist, album], Song::from_row)
            .optional()?
        {
            return Ok(Some(song));
        }

        if let Some(mbid) = mbid {
            let by_mbid = format!(
                "SELECT {} FROM songs WHERE mbid = ?1 ORDER BY id LIMIT 1",
                Song::COLUMNS
            );
            if let Some(song) = self.conn.query_row(&by_mbid, [mbid], Song::from_row).optional()? {
                note_rename("song", title, &song.title);
                return Ok(Some(song));
            }
        }

        let threshold = self.config.song_threshold;
        if threshold >= 1.0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM songs
             WHERE (?1 IS NULL OR LOWER(artist) = LOWER(?1))
               AND (?2 IS NULL OR LOWER(album) = LOWER(?2))
             ORDER BY id",
            Song::COLUMNS
        );
        let candidates = query_all(self.conn, &sql, params![artist, album], Song::from_row)?;
        debug!(title, candidates = candidates.len(), "fuzzy song lookup");
        Ok(find_best_match_with(
            title,
            candidates.into_iter().map(|s| (s.title.clone(), s)),
            threshold,
            &self.config,
        )
        .map(|(song, score)| {
            debug!(title, matched = %song.title, score, "fuzzy song match");
            song
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_schema;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO artists (id, name, mbid) VALUES
                (1, 'Radiohead', 'a74b1b7f-71a5-4011-9441-d0b5e4122711'),
                (2, 'Metallica', NULL),
                (3, 'Queen', NULL);
             INSERT INTO albums (id, artist_id, name, year) VALUES
                (10, 1, 'OK Computer', 1997),
                (11, 2, 'Greatest Hits', NULL),
                (12, 3, 'Greatest Hits', 1981),
                (13, 1, 'Kid A', 2000);
             INSERT INTO songs (id, title, artist, album, album_id, file_path, mbid) VALUES
                (100, 'Paranoid Android', 'Radiohead', 'OK Computer', 10, '/m/pa.flac', NULL),
                (101, 'Karma Police', 'Radiohead', 'OK Computer', 10, '/m/kp.flac', 'song-mbid-1'),
                (102, 'Bohemian Rhapsody', 'Queen', 'Greatest Hits', 12, '/m/br.flac', NULL),
                (103, 'Karma Police', 'Cover Band', 'Tributes', NULL, '/m/kp2.flac', NULL);",
        )
        .unwrap();
        conn
    }

    fn resolver(conn: &Connection) -> Resolver<'_> {
        Resolver::new(conn, MatchConfig::default(), LookupCache::new())
    }

    #[test]
    fn test_artist_exact_case_insensitive() {
        let conn = seeded();
        let mut r = resolver(&conn);
        let (id, artist) = r.lookup_artist("RADIOHEAD", None).unwrap().unwrap();
        assert_eq!(id, 1);
        assert_eq!(artist.name, "Radiohead");
    }

    #[test]
    fn test_artist_by_mbid_when_name_differs() {
        let conn = seeded();
        let mut r = resolver(&conn);
        let found = r
            .lookup_artist("On A Friday", Some("a74b1b7f-71a5-4011-9441-d0b5e4122711"))
            .unwrap();
        assert_eq!(found.map(|(id, _)| id), Some(1));
    }

    #[test]
    fn test_artist_fuzzy_fallback() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert_eq!(r.lookup_artist("Metalica", None).unwrap().map(|(id, _)| id), Some(2));
        assert_eq!(r.lookup_artist("Queen feat. David Bowie", None).unwrap().map(|(id, _)| id), Some(3));
        assert_eq!(r.lookup_artist("Nobody Known", None).unwrap(), None);
    }

    #[test]
    fn test_threshold_one_disables_fuzzy() {
        let conn = seeded();
        let config = MatchConfig {
            artist_threshold: 1.0,
            ..MatchConfig::default()
        };
        let mut r = Resolver::new(&conn, config, LookupCache::new());
        assert_eq!(r.lookup_artist("Metalica", None).unwrap(), None);
        assert!(r.lookup_artist("metallica", None).unwrap().is_some());
    }

    #[test]
    fn test_album_narrowed_by_artist() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert_eq!(r.lookup_album("greatest hits", Some(3), None).unwrap().map(|(id, _)| id), Some(12));
        assert_eq!(r.lookup_album("greatest hits", Some(2), None).unwrap().map(|(id, _)| id), Some(11));
        assert_eq!(r.lookup_album("greatest hits", None, None).unwrap().map(|(id, _)| id), Some(11));
    }

    #[test]
    fn test_album_fuzzy_scoped_to_artist() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert_eq!(r.lookup_album("OK Computer!", Some(1), None).unwrap().map(|(id, _)| id), Some(10));
        assert_eq!(r.lookup_album("OK Computr", Some(1), None).unwrap().map(|(id, _)| id), Some(10));
        // Same typo, wrong artist scope: no candidates close enough
        assert_eq!(r.lookup_album("OK Computr", Some(3), None).unwrap(), None);
    }

    #[test]
    fn test_song_exact_with_context() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert_eq!(
            r.lookup_song("karma police", Some("Cover Band"), None, None).unwrap().map(|(id, _)| id),
            Some(103)
        );
        assert_eq!(
            r.lookup_song("karma police", Some("radiohead"), Some("ok computer"), None)
                .unwrap()
                .map(|(id, _)| id),
            Some(101)
        );
    }

    #[test]
    fn test_song_by_mbid() {
        let conn = seeded();
        let mut r = resolver(&conn);
        let found = r
            .lookup_song("Karma Police (Live)", Some("Someone Else"), None, Some("song-mbid-1"))
            .unwrap();
        assert_eq!(found.map(|(id, _)| id), Some(101));
    }

    #[test]
    fn test_song_fuzzy_scoped_by_artist() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert_eq!(
            r.lookup_song("Paranoid Androyd", Some("Radiohead"), None, None).unwrap().map(|(id, _)| id),
            Some(100)
        );
        assert_eq!(r.lookup_song("Paranoid Androyd", Some("Queen"), None, None).unwrap(), None);
    }

    #[test]
    fn test_song_cache_keeps_artist_and_album_apart() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO songs (id, title, artist, album) VALUES (200, 'Interlude', 'Radiohead|OK Computer', NULL)",
            [],
        )
        .unwrap();
        let mut r = resolver(&conn);
        assert_eq!(
            r.lookup_song("Interlude", Some("Radiohead|OK Computer"), None, None)
                .unwrap()
                .map(|(id, _)| id),
            Some(200)
        );
        assert_eq!(
            r.lookup_song("Interlude", Some("Radiohead"), Some("OK Computer|"), None).unwrap(),
            None
        );
        assert_eq!(r.cache().hits(), 0);
    }

    #[test]
    fn test_cache_serves_repeat_lookups() {
        let conn = seeded();
        let mut r = resolver(&conn);
        assert!(r.lookup_artist("Queen", None).unwrap().is_some());
        conn.execute("DELETE FROM artists WHERE id = 3", []).unwrap();

        // Stale until the caller clears the cache
        assert!(r.lookup_artist("Queen", None).unwrap().is_some());
        assert_eq!(r.cache().hits(), 1);

        r.clear_cache();
        assert_eq!(r.lookup_artist("Queen", None).unwrap(), None);
    }
}
