use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use protosense_parse::ProtoFile;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::trace;

/// Hashes the full text of a document.
pub fn content_hash(text: &str) -> u64 {
    let mut hasher = FxHasher::default();
    text.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
struct Entry {
    hash: u64,
    ast: Arc<ProtoFile>,
}

/// Parsed files keyed by document URI and content hash.
///
/// An entry is replaced when the same URI is inserted with new content and removed on
/// [`invalidate`](ParseCache::invalidate). Nothing is evicted otherwise.
#[derive(Debug, Default)]
pub struct ParseCache {
    entries: FxHashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

impl ParseCache {
    pub fn new() -> Self {
        ParseCache::default()
    }

    /// Returns the cached tree for `uri` if it was parsed from text with the given hash.
    pub fn get(&mut self, uri: &str, hash: u64) -> Option<Arc<ProtoFile>> {
        match self.entries.get(uri) {
            Some(entry) if entry.hash == hash => {
                self.hits += 1;
                trace!(uri, "parse cache hit");
                Some(entry.ast.clone())
            }
            _ => {
                self.misses += 1;
                trace!(uri, "parse cache miss");
                None
            }
        }
    }

    pub fn insert(&mut self, uri: impl Into<String>, hash: u64, ast: Arc<ProtoFile>) {
        self.entries.insert(uri.into(), Entry { hash, ast });
    }

    /// Removes the entry for `uri`, returning whether there was one.
    pub fn invalidate(&mut self, uri: &str) -> bool {
        self.entries.remove(uri).is_some()
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

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
