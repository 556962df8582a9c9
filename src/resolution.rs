//! Duplicate resolution policy and the SQL that applies it.
//!
//! Decisions (`parse_action`, `choose_master_album`, `plan_album_merge`) are
//! pure. `apply_action` runs one group's mutation in its own transaction: it
//! commits on success and rolls back when any statement fails.

use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use tracing::info;

use crate::models::{Album, DuplicateGroup, EntityKind, Song};
use crate::normalize::normalize;
use crate::schema::{qualified, SONG_IN_ALBUM};

// ============================================================================
// Actions
// ============================================================================

/// What to do with one duplicate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep the member at this 0-based index, delete the rest
    KeepOne(usize),
    KeepAll,
    Skip,
    /// Fold every album of the group into a master album (albums only)
    Merge,
}

/// Parse the answer to the per-group prompt.
/// Accepts a 1-based index, `A` (keep all), `M` (merge, when allowed) and an
/// empty line (skip). Anything else is `None` and should be asked again.
pub fn parse_action(input: &str, group_len: usize, allow_merge: bool) -> Option<Action> {
    let input = input.trim();
    if input.is_empty() {
        return Some(Action::Skip);
    }
    if input.eq_ignore_ascii_case("a") {
        return Some(Action::KeepAll);
    }
    if input.eq_ignore_ascii_case("m") {
        return allow_merge.then_some(Action::Merge);
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=group_len).contains(&n) => Some(Action::KeepOne(n - 1)),
        _ => None,
    }
}

/// Parse a yes/no answer. `S`/`Si`/`Y`/`Yes` are yes, `N`/`No` is no.
pub fn parse_confirmation(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "s" | "si" | "sí" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Album Merge Planning
// ============================================================================

/// Index of the album carrying the most information.
/// Order: has year, has mbid, has total_tracks, latest `last_updated`; then lowest id.
pub fn choose_master_album(albums: &[Album]) -> Option<usize> {
    albums
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            let key = |x: &Album| {
                (
                    x.year.is_some(),
                    x.mbid.is_some(),
                    x.total_tracks.is_some(),
                    x.last_updated.clone(),
                )
            };
            key(a).cmp(&key(b)).then_with(|| b.id.cmp(&a.id))
        })
        .map(|(idx, _)| idx)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub master_id: i64,
    pub master_name: String,
    /// Surviving songs, all repointed at the master album
    pub keep_song_ids: Vec<i64>,
    /// (deleted song, the song that replaces it)
    pub replaced_songs: Vec<(i64, i64)>,
    pub delete_album_ids: Vec<i64>,
}

/// Plan the merge of `albums` with their `songs`.
/// Per (normalized title, track number) the highest bitrate wins; ties prefer
/// a song already on the master album, then the lowest id.
pub fn plan_album_merge(albums: &[Album], songs: &[Song]) -> Option<MergePlan> {
    let master = &albums[choose_master_album(albums)?];

    let mut order: Vec<(String, Option<i64>)> = Vec::new();
    let mut slots: FxHashMap<(String, Option<i64>), Vec<&Song>> = FxHashMap::default();
    for song in songs {
        let key = (normalize(&song.title), song.track_number);
        slots
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(song);
    }

    let mut keep_song_ids = Vec::new();
    let mut replaced_songs = Vec::new();
    for key in &order {
        let candidates = &slots[key];
        let Some(winner) = candidates.iter().max_by_key(|s| {
            (
                s.bitrate.unwrap_or(0),
                s.album_id == Some(master.id),
                Reverse(s.id),
            )
        }) else {
            continue;
        };
        keep_song_ids.push(winner.id);
        replaced_songs.extend(
            candidates
                .iter()
                .filter(|s| s.id != winner.id)
                .map(|s| (s.id, winner.id)),
        );
    }
    keep_song_ids.sort_unstable();
    replaced_songs.sort_unstable();

    Some(MergePlan {
        master_id: master.id,
        master_name: master.name.clone(),
        keep_song_ids,
        replaced_songs,
        delete_album_ids: albums.iter().map(|a| a.id).filter(|&id| id != master.id).collect(),
    })
}

// ============================================================================
// Loading
// ============================================================================

pub fn load_albums(conn: &Connection, ids: &[i64]) -> Result<Vec<Album>> {
    let sql = format!("SELECT {} FROM albums WHERE id = ?1", Album::COLUMNS);
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut albums = Vec::with_capacity(ids.len());
    for id in ids {
        albums.push(stmt.query_row([id], Album::from_row)?);
    }
    Ok(albums)
}

/// Songs of the given albums, linked by `album_id` or, for legacy rows, by
/// album and artist name. Each song is returned once, under the first album
/// that claims it, with `album_id` set to that album.
pub fn load_album_songs(conn: &Connection, album_ids: &[i64]) -> Result<Vec<Song>> {
    let sql = format!(
        "SELECT {} FROM songs s
         JOIN albums al ON al.id = ?1
         LEFT JOIN artists ar ON ar.id = al.artist_id
         WHERE {}
         ORDER BY s.id",
        qualified(Song::COLUMNS, "s"),
        SONG_IN_ALBUM
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let mut seen: FxHashSet<i64> = FxHashSet::default();
    let mut songs = Vec::new();
    for &id in album_ids {
        let rows = stmt
            .query_map([id], Song::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for mut song in rows {
            if seen.insert(song.id) {
                song.album_id = Some(id);
                songs.push(song);
            }
        }
    }
    Ok(songs)
}

// ============================================================================
// Applying
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub rows_deleted: usize,
    /// Files no longer referenced by any song row after the deletion
    pub orphaned_files: Vec<String>,
}

/// Delete `delete_ids` in favour of `keep_id`, repointing their children first.
pub fn keep_one(conn: &Connection, kind: EntityKind, keep_id: i64, delete_ids: &[i64]) -> Result<Outcome> {
    let mut outcome = Outcome::default();
    match kind {
        EntityKind::Artist => {
            for id in delete_ids {
                conn.execute("UPDATE albums SET artist_id = ?1 WHERE artist_id = ?2", params![keep_id, id])?;
                conn.execute(
                    "UPDATE scrobbled_songs SET artist_id = ?1 WHERE artist_id = ?2",
                    params![keep_id, id],
                )?;
                outcome.rows_deleted += conn.execute("DELETE FROM artists WHERE id = ?1", [id])?;
            }
        }
        EntityKind::Album => {
            let kept_name: String = conn.query_row("SELECT name FROM albums WHERE id = ?1", [keep_id], |r| r.get(0))?;
            for id in delete_ids {
                for song in load_album_songs(conn, &[*id])? {
                    conn.execute(
                        "UPDATE songs SET album_id = ?1, album = ?2 WHERE id = ?3",
                        params![keep_id, kept_name, song.id],
                    )?;
                }
                conn.execute(
                    "UPDATE scrobbled_songs SET album_id = ?1 WHERE album_id = ?2",
                    params![keep_id, id],
                )?;
                outcome.rows_deleted += conn.execute("DELETE FROM albums WHERE id = ?1", [id])?;
            }
        }
        EntityKind::Song => {
            let mut paths: Vec<String> = Vec::new();
            for id in delete_ids {
                let path: Option<String> =
                    conn.query_row("SELECT file_path FROM songs WHERE id = ?1", [id], |r| r.get(0))?;
                if let Some(path) = path {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
                conn.execute(
                    "UPDATE scrobbled_songs SET song_id = ?1 WHERE song_id = ?2",
                    params![keep_id, id],
                )?;
                outcome.rows_deleted += conn.execute("DELETE FROM songs WHERE id = ?1", [id])?;
            }
            for path in paths {
                let users: i64 =
                    conn.query_row("SELECT COUNT(*) FROM songs WHERE file_path = ?1", [&path], |r| r.get(0))?;
                if users == 0 {
                    outcome.orphaned_files.push(path);
                }
            }
        }
    }
    Ok(outcome)
}

/// Execute a merge plan: drop replaced songs, repoint survivors, drop losing albums.
pub fn apply_merge(conn: &Connection, plan: &MergePlan) -> Result<Outcome> {
    let mut outcome = Outcome::default();
    for (deleted, winner) in &plan.replaced_songs {
        conn.execute(
            "UPDATE scrobbled_songs SET song_id = ?1 WHERE song_id = ?2",
            params![winner, deleted],
        )?;
        outcome.rows_deleted += conn.execute("DELETE FROM songs WHERE id = ?1", [deleted])?;
    }
    for id in &plan.keep_song_ids {
        conn.execute(
            "UPDATE songs SET album_id = ?1, album = ?2 WHERE id = ?3",
            params![plan.master_id, plan.master_name, id],
        )?;
    }
    for id in &plan.delete_album_ids {
        conn.execute(
            "UPDATE scrobbled_songs SET album_id = ?1 WHERE album_id = ?2",
            params![plan.master_id, id],
        )?;
        outcome.rows_deleted += conn.execute("DELETE FROM albums WHERE id = ?1", [id])?;
    }
    info!(
        master = plan.master_id,
        songs_kept = plan.keep_song_ids.len(),
        songs_deleted = plan.replaced_songs.len(),
        albums_deleted = plan.delete_album_ids.len(),
        "albums merged"
    );
    Ok(outcome)
}

/// Apply `action` to `group` inside a single transaction.
pub fn apply_action(conn: &mut Connection, group: &DuplicateGroup, action: Action) -> Result<Outcome> {
    let ids = group.ids();
    match action {
        Action::Skip | Action::KeepAll => Ok(Outcome::default()),
        Action::KeepOne(idx) => {
            let Some(&keep_id) = ids.get(idx) else {
                bail!("index {} out of range for a group of {}", idx + 1, ids.len());
            };
            let losers: Vec<i64> = ids.iter().copied().filter(|&id| id != keep_id).collect();
            let tx = conn.transaction()?;
            let outcome = keep_one(&tx, group.kind.entity(), keep_id, &losers)?;
            tx.commit()?;
            Ok(outcome)
        }
        Action::Merge => {
            if group.kind.entity() != EntityKind::Album {
                bail!("merge is only available for album groups");
            }
            let tx = conn.transaction()?;
            let albums = load_albums(&tx, &ids)?;
            let songs = load_album_songs(&tx, &ids)?;
            let Some(plan) = plan_album_merge(&albums, &songs) else {
                bail!("nothing to merge");
            };
            let outcome = apply_merge(&tx, &plan)?;
            tx.commit()?;
            Ok(outcome)
        }
    }
}
