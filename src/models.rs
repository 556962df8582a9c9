//! Core data models for the music database tools.
//!
//! Every query maps its rows into one of these records right away, so the
//! rest of the code never indexes into raw SQL tuples.

use rusqlite::Row;
use serde::Serialize;

// ============================================================================
// Table Records
// ============================================================================

/// Row of the `artists` table
#[derive(Clone, Debug, PartialEq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub mbid: Option<String>,
    pub origin: Option<String>,
    pub last_updated: Option<String>,
}

impl Artist {
    pub const COLUMNS: &'static str = "id, name, mbid, origin, last_updated";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            mbid: row.get(2)?,
            origin: row.get(3)?,
            last_updated: row.get(4)?,
        })
    }
}

/// Row of the `albums` table
#[derive(Clone, Debug, PartialEq)]
pub struct Album {
    pub id: i64,
    pub artist_id: Option<i64>,
    pub name: String,
    pub year: Option<i64>,
    pub mbid: Option<String>,
    pub folder_path: Option<String>,
    pub total_tracks: Option<i64>,
    pub last_updated: Option<String>,
}

impl Album {
    pub const COLUMNS: &'static str =
        "id, artist_id, name, year, mbid, folder_path, total_tracks, last_updated";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            artist_id: row.get(1)?,
            name: row.get(2)?,
            year: row.get(3)?,
            mbid: row.get(4)?,
            folder_path: row.get(5)?,
            total_tracks: row.get(6)?,
            last_updated: row.get(7)?,
        })
    }
}

/// Row of the `songs` table.
/// `artist` and `album` are denormalized names; `album_id` is a weak pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_id: Option<i64>,
    pub track_number: Option<i64>,
    pub file_path: Option<String>,
    pub bitrate: Option<i64>,
    pub duration: Option<f64>,
    pub mbid: Option<String>,
    pub last_updated: Option<String>,
}

impl Song {
    pub const COLUMNS: &'static str = "id, title, artist, album, album_id, track_number, file_path, bitrate, duration, mbid, last_updated";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            album: row.get(3)?,
            album_id: row.get(4)?,
            track_number: row.get(5)?,
            file_path: row.get(6)?,
            bitrate: row.get(7)?,
            duration: row.get(8)?,
            mbid: row.get(9)?,
            last_updated: row.get(10)?,
        })
    }
}

/// Fallback record for a listened track with no matching `songs` row.
/// `scrobble_timestamps` is the raw JSON array of unix timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrobbledSong {
    pub id: i64,
    pub artist_name: String,
    pub album_name: Option<String>,
    pub title: String,
    pub scrobble_timestamps: String,
    pub artist_id: Option<i64>,
    pub album_id: Option<i64>,
    pub song_id: Option<i64>,
}

impl ScrobbledSong {
    pub const COLUMNS: &'static str =
        "id, artist_name, album_name, title, scrobble_timestamps, artist_id, album_id, song_id";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            artist_name: row.get(1)?,
            album_name: row.get(2)?,
            title: row.get(3)?,
            scrobble_timestamps: row.get(4)?,
            artist_id: row.get(5)?,
            album_id: row.get(6)?,
            song_id: row.get(7)?,
        })
    }

    pub fn is_linked(&self) -> bool {
        self.artist_id.is_some() && self.album_id.is_some() && self.song_id.is_some()
    }
}

// ============================================================================
// Duplicate Groups
// ============================================================================

/// Which table a duplicate group lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Artist,
    Album,
    Song,
}

impl EntityKind {
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Song => "songs",
        }
    }
}

/// How the members of a duplicate group were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuplicateKind {
    /// Songs pointing at the same file on disk
    SongSamePath,
    /// Songs with identical (title, artist, album)
    SongSameMetadata,
    /// Artists with an identical name
    ArtistSameName,
    /// Albums with identical (name, artist name)
    AlbumExact,
    /// Albums whose names match once edition/disc/year tags are removed
    AlbumNormalized,
    /// Albums whose folders share the same trailing component
    AlbumSameFolder,
}

impl DuplicateKind {
    pub fn entity(self) -> EntityKind {
        match self {
            DuplicateKind::SongSamePath | DuplicateKind::SongSameMetadata => EntityKind::Song,
            DuplicateKind::ArtistSameName => EntityKind::Artist,
            DuplicateKind::AlbumExact
            | DuplicateKind::AlbumNormalized
            | DuplicateKind::AlbumSameFolder => EntityKind::Album,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DuplicateKind::SongSamePath => "songs sharing a file path",
            DuplicateKind::SongSameMetadata => "songs with the same title/artist/album",
            DuplicateKind::ArtistSameName => "artists with the same name",
            DuplicateKind::AlbumExact => "albums with the same name and artist",
            DuplicateKind::AlbumNormalized => "albums with equivalent names",
            DuplicateKind::AlbumSameFolder => "albums in equivalent folders",
        }
    }
}

/// One row of a duplicate group, with the fields shown side by side.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupMember {
    pub id: i64,
    pub label: String,
    pub bitrate: Option<i64>,
    /// File path for songs, folder path for albums
    pub path: Option<String>,
    pub track_count: Option<i64>,
    pub last_updated: Option<String>,
}

/// Rows that appear to describe the same entity, ordered by id.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateGroup {
    pub kind: DuplicateKind,
    pub key: String,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    pub fn ids(&self) -> Vec<i64> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one interactive dedup session.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub groups_seen: usize,
    pub kept_one: usize,
    pub kept_all: usize,
    pub skipped: usize,
    pub merged: usize,
    pub rows_deleted: usize,
    pub files_deleted: usize,
    pub errors: usize,
}

impl SessionStats {
    /// Log stats to stderr in JSON format
    pub fn log_summary(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:dedup]\n{}", json);
        }
    }
}

/// Counters for a scrobble linking pass.
#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct LinkStats {
    pub examined: usize,
    pub artists_linked: usize,
    pub albums_linked: usize,
    pub songs_linked: usize,
    pub unresolved: usize,
}

impl LinkStats {
    pub fn log_summary(&self) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:scrobbles]\n{}", json);
        }
    }
}
