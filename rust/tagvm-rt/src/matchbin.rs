//! Approximate tag matching and the lazily rebuilt module dispatch index.

use crate::modules::Module;
use tagvm_core::Tag;

/// External approximate-matching contract.
///
/// The index stores `(key, tag, value)` entries and answers ranked best-`n`
/// queries. Ranking semantics belong to the implementation; the execution
/// core only relies on an exact tag ranking first.
pub trait TagMatcher {
    fn clear(&mut self);
    /// Insert or replace the entry stored under `key`.
    fn set(&mut self, key: usize, tag: Tag, value: usize);
    /// Values of the best `n` entries for `tag`, best first.
    fn query(&self, tag: Tag, n: usize) -> Vec<usize>;
}

/// Default matcher: entries ranked by ascending Hamming distance to the
/// query tag, ties broken by insertion order.
#[derive(Debug, Default)]
pub struct RankedHammingMatcher {
    entries: Vec<(usize, Tag, usize)>,
}

impl RankedHammingMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TagMatcher for RankedHammingMatcher {
    fn clear(&mut self) {
        self.entries.clear();
    }

    fn set(&mut self, key: usize, tag: Tag, value: usize) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _, _)| *k == key) {
            *entry = (key, tag, value);
        } else {
            self.entries.push((key, tag, value));
        }
    }

    fn query(&self, tag: Tag, n: usize) -> Vec<usize> {
        let mut ranked: Vec<(u32, usize)> = self
            .entries
            .iter()
            .map(|(_, entry_tag, value)| (entry_tag.hamming(tag), *value))
            .collect();
        // stable sort keeps insertion order among equal distances
        ranked.sort_by_key(|(dist, _)| *dist);
        ranked.into_iter().take(n).map(|(_, value)| value).collect()
    }
}

/// Cache of `(module id, module tag)` entries over a [`TagMatcher`].
///
/// Marked dirty whenever the module table changes; the next resolve clears
/// and reinserts every module before answering. Resolving requires `&mut`
/// precisely because of that hidden rebuild.
pub struct TagIndex {
    matcher: Box<dyn TagMatcher>,
    dirty: bool,
}

impl TagIndex {
    pub fn new(matcher: Box<dyn TagMatcher>) -> Self {
        Self {
            matcher,
            dirty: true,
        }
    }

    pub fn ranked_hamming() -> Self {
        Self::new(Box::new(RankedHammingMatcher::new()))
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Best-`n` module ids for `tag`, rebuilding the matcher first if the
    /// module table changed. Empty table resolves to an empty sequence.
    pub fn resolve(&mut self, modules: &[Module], tag: Tag, n: usize) -> Vec<usize> {
        if self.dirty {
            self.matcher.clear();
            for module in modules {
                self.matcher.set(module.id, module.tag, module.id);
            }
            self.dirty = false;
        }
        self.matcher.query(tag, n)
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::ranked_hamming()
    }
}
