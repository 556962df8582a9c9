//! Memoised resolver lookups.
//!
//! A `LookupCache` is built once per run and handed to the resolver. Misses
//! are cached too, so repeated unknown names do not re-run fuzzy scans.
//! Callers that write to the database must `clear` it afterwards.

use rustc_hash::FxHashMap;

use crate::models::{Album, Artist, Song};

/// What a lookup was narrowed by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum LookupScope {
    #[default]
    Unscoped,
    /// Album lookups within one artist
    Artist(i64),
    /// Song lookups within the given artist and album names
    Names {
        artist: Option<String>,
        album: Option<String>,
    },
}

impl LookupScope {
    pub fn names(artist: Option<&str>, album: Option<&str>) -> Self {
        LookupScope::Names {
            artist: artist.map(str::to_string),
            album: album.map(str::to_string),
        }
    }
}

/// Everything a lookup result depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub name: String,
    pub mbid: Option<String>,
    pub scope: LookupScope,
}

impl LookupKey {
    pub fn new(name: &str, mbid: Option<&str>, scope: LookupScope) -> Self {
        Self {
            name: name.trim().to_string(),
            mbid: mbid.map(str::to_string),
            scope,
        }
    }
}

#[derive(Debug)]
pub struct Memo<V> {
    entries: FxHashMap<LookupKey, Option<V>>,
    hits: usize,
    misses: usize,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<V: Clone> Memo<V> {
    /// Outer `None` means "not cached"; inner `None` is a cached miss.
    pub fn get(&mut self, key: &LookupKey) -> Option<Option<V>> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: LookupKey, value: Option<V>) {
        self.entries.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

#[derive(Debug, Default)]
pub struct LookupCache {
    pub artists: Memo<Artist>,
    pub albums: Memo<Album>,
    pub songs: Memo<Song>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.artists.clear();
        self.albums.clear();
        self.songs.clear();
    }

    pub fn hits(&self) -> usize {
        self.artists.hits() + self.albums.hits() + self.songs.hits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(id: i64) -> Artist {
        Artist {
            id,
            name: "Radiohead".to_string(),
            mbid: None,
            origin: None,
            last_updated: None,
        }
    }

    #[test]
    fn test_memo_distinguishes_miss_from_uncached() {
        let mut cache = LookupCache::new();
        let key = LookupKey::new("Radiohead", None, LookupScope::Unscoped);
        assert_eq!(cache.artists.get(&key), None);

        cache.artists.insert(key.clone(), None);
        assert_eq!(cache.artists.get(&key), Some(None));

        cache.artists.insert(key.clone(), Some(artist(3)));
        assert_eq!(cache.artists.get(&key), Some(Some(artist(3))));
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.artists.misses(), 1);
    }

    #[test]
    fn test_key_includes_scope() {
        let mut cache = LookupCache::new();
        cache
            .artists
            .insert(LookupKey::new(" Radiohead ", None, LookupScope::Artist(1)), Some(artist(1)));
        assert_eq!(
            cache.artists.get(&LookupKey::new("Radiohead", None, LookupScope::Artist(1))),
            Some(Some(artist(1)))
        );
        assert_eq!(cache.artists.get(&LookupKey::new("Radiohead", None, LookupScope::Artist(2))), None);
    }

    #[test]
    fn test_name_scopes_do_not_collide() {
        let a = LookupKey::new("Song", None, LookupScope::names(Some("a|b"), None));
        let b = LookupKey::new("Song", None, LookupScope::names(Some("a"), Some("b|")));
        assert_ne!(a, b);
        assert_ne!(
            LookupScope::names(Some("x"), None),
            LookupScope::names(None, Some("x"))
        );
    }

    #[test]
    fn test_clear() {
        let mut cache = LookupCache::new();
        cache.songs.insert(LookupKey::new("x", None, LookupScope::Unscoped), None);
        assert_eq!(cache.songs.len(), 1);
        cache.clear();
        assert!(cache.songs.is_empty());
    }
}
