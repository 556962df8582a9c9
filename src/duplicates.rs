//! Duplicate set scanning.
//!
//! Each scan reads the rows it needs once, groups them in memory by a key and
//! keeps the groups with two or more members. Members are ordered by id and
//! groups by their lowest id.

use anyhow::Result;
use clap::ValueEnum;
use rusqlite::Connection;
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;
use std::path::Path;

use crate::models::{DuplicateGroup, DuplicateKind, GroupMember};
use crate::normalize::{normalize, normalize_album_name};
use crate::schema::SONG_IN_ALBUM;

/// Which tables a scan covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanScope {
    Songs,
    Artists,
    Albums,
    All,
}

impl ScanScope {
    fn includes(self, other: ScanScope) -> bool {
        self == ScanScope::All || self == other
    }
}

/// Group `(key, item)` pairs, preserving first-seen key order, dropping singletons.
pub fn group_by_key<K, T, I>(items: I) -> Vec<(K, Vec<T>)>
where
    K: Hash + Eq + Clone,
    I: IntoIterator<Item = (K, T)>,
{
    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for (key, item) in items {
        match index.get(&key) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }
    groups.retain(|(_, members)| members.len() > 1);
    groups
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("?")
}

/// Trailing component of a folder path, e.g. "/music/Artist/Album (2009)" → "Album (2009)"
pub fn folder_name(path: &str) -> Option<&str> {
    Path::new(path.trim_end_matches(['/', '\\']))
        .file_name()
        .and_then(|n| n.to_str())
}

// ============================================================================
// Songs
// ============================================================================

struct SongRow {
    title: String,
    artist: Option<String>,
    album: Option<String>,
    member: GroupMember,
}

fn read_songs(conn: &Connection) -> Result<Vec<SongRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, artist, album, file_path, bitrate, last_updated
         FROM songs ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let title: String = row.get(1)?;
            let artist: Option<String> = row.get(2)?;
            let album: Option<String> = row.get(3)?;
            let label = format!("{} - {} - {}", title, display(&artist), display(&album));
            Ok(SongRow {
                title,
                artist,
                album,
                member: GroupMember {
                    id: row.get(0)?,
                    label,
                    bitrate: row.get(5)?,
                    path: row.get(4)?,
                    track_count: None,
                    last_updated: row.get(6)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Songs whose rows point at the same file on disk.
pub fn scan_songs_by_path(conn: &Connection) -> Result<Vec<DuplicateGroup>> {
    let songs = read_songs(conn)?;
    let groups = group_by_key(
        songs
            .into_iter()
            .filter_map(|s| s.member.path.clone().map(|p| (p, s.member))),
    );
    Ok(groups
        .into_iter()
        .map(|(key, members)| DuplicateGroup {
            kind: DuplicateKind::SongSamePath,
            key,
            members,
        })
        .collect())
}

/// Songs with identical (title, artist, album).
pub fn scan_songs_by_metadata(conn: &Connection) -> Result<Vec<DuplicateGroup>> {
    let songs = read_songs(conn)?;
    let groups = group_by_key(
        songs
            .into_iter()
            .map(|s| ((s.title, s.artist, s.album), s.member)),
    );
    Ok(groups
        .into_iter()
        .map(|((title, artist, album), members)| DuplicateGroup {
            kind: DuplicateKind::SongSameMetadata,
            key: format!("{} / {} / {}", title, display(&artist), display(&album)),
            members,
        })
        .collect())
}

// ============================================================================
// Artists
// ============================================================================

/// Artists sharing an exact name. `track_count` holds the number of albums.
pub fn scan_artists(conn: &Connection) -> Result<Vec<DuplicateGroup>> {
    let mut stmt = conn.prepare(
        "SELECT ar.id, ar.name, ar.mbid, ar.origin, ar.last_updated,
                (SELECT COUNT(*) FROM albums al WHERE al.artist_id = ar.id)
         FROM artists ar ORDER BY ar.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let mbid: Option<String> = row.get(2)?;
            let origin: Option<String> = row.get(3)?;
            Ok((
                name.clone(),
                GroupMember {
                    id: row.get(0)?,
                    label: format!("{} [mbid: {}, origin: {}]", name, display(&mbid), display(&origin)),
                    bitrate: None,
                    path: None,
                    track_count: row.get(5)?,
                    last_updated: row.get(4)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(group_by_key(rows)
        .into_iter()
        .map(|(key, members)| DuplicateGroup {
            kind: DuplicateKind::ArtistSameName,
            key,
            members,
        })
        .collect())
}

// ============================================================================
// Albums
// ============================================================================

struct AlbumRow {
    name: String,
    artist_name: Option<String>,
    folder_path: Option<String>,
    member: GroupMember,
}

fn read_albums(conn: &Connection) -> Result<Vec<AlbumRow>> {
    let sql = format!(
        "SELECT al.id, al.name, ar.name, al.year, al.folder_path, al.last_updated,
                (SELECT COUNT(*) FROM songs s WHERE {in_album}),
                (SELECT MAX(s.bitrate) FROM songs s WHERE {in_album})
         FROM albums al
         LEFT JOIN artists ar ON ar.id = al.artist_id
         ORDER BY al.id",
        in_album = SONG_IN_ALBUM
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let artist_name: Option<String> = row.get(2)?;
            let year: Option<i64> = row.get(3)?;
            let folder_path: Option<String> = row.get(4)?;
            let label = match year {
                Some(year) => format!("{} - {} ({})", display(&artist_name), name, year),
                None => format!("{} - {}", display(&artist_name), name),
            };
            Ok(AlbumRow {
                name,
                artist_name,
                folder_path: folder_path.clone(),
                member: GroupMember {
                    id: row.get(0)?,
                    label,
                    bitrate: row.get(7)?,
                    path: folder_path,
                    track_count: row.get(6)?,
                    last_updated: row.get(5)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Albums with identical (album name, artist name).
pub fn scan_albums_exact(conn: &Connection) -> Result<Vec<DuplicateGroup>> {
    let albums = read_albums(conn)?;
    Ok(group_by_key(
        albums
            .into_iter()
            .map(|a| ((a.name, a.artist_name), a.member)),
    )
    .into_iter()
    .map(|((name, artist), members)| DuplicateGroup {
        kind: DuplicateKind::AlbumExact,
        key: format!("{} - {}", display(&artist), name),
        members,
    })
    .collect())
}

/// Albums that only match once names are normalized, or whose folders share
/// a normalized trailing component. Groups whose id set was already reported
/// (in `known` or by an earlier pass here) are dropped.
pub fn scan_albums_normalized(conn: &Connection, known: &[DuplicateGroup]) -> Result<Vec<DuplicateGroup>> {
    let albums = read_albums(conn)?;
    let mut seen: FxHashSet<Vec<i64>> = known.iter().map(|g| g.ids()).collect();
    let mut result = Vec::new();

    let by_name = group_by_key(albums.iter().filter_map(|a| {
        let name_key = normalize_album_name(&a.name);
        if name_key.is_empty() {
            return None;
        }
        let artist_key = normalize(a.artist_name.as_deref().unwrap_or(""));
        Some(((artist_key, name_key), a.member.clone()))
    }));
    let by_folder = group_by_key(albums.iter().filter_map(|a| {
        let folder_key = normalize_album_name(folder_name(a.folder_path.as_deref()?)?);
        if folder_key.is_empty() {
            return None;
        }
        let artist_key = normalize(a.artist_name.as_deref().unwrap_or(""));
        Some(((artist_key, folder_key), a.member.clone()))
    }));

    let passes = [
        (DuplicateKind::AlbumNormalized, by_name),
        (DuplicateKind::AlbumSameFolder, by_folder),
    ];
    for (kind, groups) in passes {
        for ((artist_key, name_key), members) in groups {
            let group = DuplicateGroup {
                kind,
                key: format!("{} - {}", artist_key, name_key),
                members,
            };
            if seen.insert(group.ids()) {
                result.push(group);
            }
        }
    }
    Ok(result)
}

// ============================================================================
// All
// ============================================================================

/// Run every scan in `scope`: songs by path, songs by metadata, artists,
/// exact albums, then normalized albums.
pub fn scan_all(conn: &Connection, scope: ScanScope) -> Result<Vec<DuplicateGroup>> {
    let mut groups = Vec::new();
    if scope.includes(ScanScope::Songs) {
        groups.extend(scan_songs_by_path(conn)?);
        groups.extend(scan_songs_by_metadata(conn)?);
    }
    if scope.includes(ScanScope::Artists) {
        groups.extend(scan_artists(conn)?);
    }
    if scope.includes(ScanScope::Albums) {
        let exact = scan_albums_exact(conn)?;
        let normalized = scan_albums_normalized(conn, &exact)?;
        groups.extend(exact);
        groups.extend(normalized);
    }
    Ok(groups)
}
