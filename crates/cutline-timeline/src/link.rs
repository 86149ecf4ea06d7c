//! Links between clips in different tracks.
//!
//! Links live in a registry keyed by clip handle instead of inside the
//! clips, so replacing a clip never leaves a stale back-reference behind.
//! The replace engine keeps the registry consistent through
//! [`LinkChange`] records, which makes every link edit reversible.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::clip::{Clip, ClipId};

/// Symmetric clip-to-clip association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<[ClipId; 2]>", into = "Vec<[ClipId; 2]>")]
pub struct LinkRegistry {
    partners: BTreeMap<ClipId, ClipId>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The clip linked to `id`.
    pub fn partner(&self, id: ClipId) -> Option<ClipId> {
        self.partners.get(&id).copied()
    }

    pub fn is_linked(&self, id: ClipId) -> bool {
        self.partners.contains_key(&id)
    }

    /// Every link once, lower handle first.
    pub fn pairs(&self) -> impl Iterator<Item = (ClipId, ClipId)> + '_ {
        self.partners
            .iter()
            .filter(|(a, b)| a < b)
            .map(|(a, b)| (*a, *b))
    }

    /// Every directed entry; each link appears twice.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (ClipId, ClipId)> + '_ {
        self.partners.iter().map(|(a, b)| (*a, *b))
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.pairs().count()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// Changes that link `a` and `b`, dropping their current partners.
    pub(crate) fn link_changes(&self, a: ClipId, b: ClipId) -> Vec<LinkChange> {
        let mut changes = Vec::new();
        for id in [a, b] {
            if let Some(old) = self.partner(id) {
                if old != a && old != b {
                    changes.push(LinkChange::new(old, Some(id), None));
                }
            }
        }
        changes.push(LinkChange::new(a, self.partner(a), Some(b)));
        changes.push(LinkChange::new(b, self.partner(b), Some(a)));
        changes
    }

    /// Changes that unlink `id` from its partner.
    pub(crate) fn unlink_changes(&self, id: ClipId) -> Vec<LinkChange> {
        match self.partner(id) {
            Some(partner) => vec![
                LinkChange::new(id, Some(partner), None),
                LinkChange::new(partner, Some(id), None),
            ],
            None => Vec::new(),
        }
    }

    /// Set one direction of a link.
    pub(crate) fn set(&mut self, id: ClipId, partner: Option<ClipId>) {
        match partner {
            Some(partner) => {
                self.partners.insert(id, partner);
            }
            None => {
                self.partners.remove(&id);
            }
        }
    }

    pub(crate) fn apply(&mut self, change: &LinkChange) {
        self.set(change.clip, change.after);
    }
}

impl From<Vec<[ClipId; 2]>> for LinkRegistry {
    fn from(pairs: Vec<[ClipId; 2]>) -> Self {
        let mut registry = Self::new();
        for [a, b] in pairs {
            registry.set(a, Some(b));
            registry.set(b, Some(a));
        }
        registry
    }
}

impl From<LinkRegistry> for Vec<[ClipId; 2]> {
    fn from(registry: LinkRegistry) -> Self {
        registry.pairs().map(|(a, b)| [a, b]).collect()
    }
}

/// One directed registry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkChange {
    pub clip: ClipId,
    pub before: Option<ClipId>,
    pub after: Option<ClipId>,
}

impl LinkChange {
    pub fn new(clip: ClipId, before: Option<ClipId>, after: Option<ClipId>) -> Self {
        Self {
            clip,
            before,
            after,
        }
    }

    pub fn inverted(&self) -> Self {
        Self {
            clip: self.clip,
            before: self.after,
            after: self.before,
        }
    }
}

// ── Replacement bookkeeping ─────────────────────────────────────

/// Which clips replaced which during one edit.
///
/// Replacements always carry fresh handles, so the relation is acyclic and
/// expansion terminates.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReplacementMap {
    map: BTreeMap<ClipId, Vec<ClipId>>,
    replacements: BTreeSet<ClipId>,
}

impl ReplacementMap {
    pub fn record(&mut self, original: ClipId, replacements: &[ClipId]) {
        debug_assert!(!self.map.contains_key(&original), "{original} replaced twice");
        self.replacements.extend(replacements.iter().copied());
        self.map.insert(original, replacements.to_vec());
    }

    pub fn contains(&self, original: ClipId) -> bool {
        self.map.contains_key(&original)
    }

    pub fn originals(&self) -> Vec<ClipId> {
        self.map.keys().copied().collect()
    }

    /// The clips currently standing in for `id` (itself if never replaced).
    pub fn latest(&self, id: ClipId) -> Vec<ClipId> {
        match self.map.get(&id) {
            Some(replacements) => replacements
                .iter()
                .flat_map(|replacement| self.latest(*replacement))
                .collect(),
            None => vec![id],
        }
    }

    /// Final replacements of every clip that was present before the edit.
    pub fn expand(&self) -> BTreeMap<ClipId, Vec<ClipId>> {
        self.map
            .keys()
            .filter(|original| !self.replacements.contains(original))
            .map(|original| (*original, self.latest(*original)))
            .collect()
    }
}

/// Pair the linkable clips of two replacement runs in order.
///
/// Clips are paired only when their lengths match; a mismatch leaves both
/// unlinked, since linked clips must always be equally long.
pub(crate) fn pair_replacements(left: &[&Clip], right: &[&Clip]) -> Vec<(ClipId, ClipId)> {
    let left = left.iter().filter(|clip| clip.is_linkable());
    let right = right.iter().filter(|clip| clip.is_linkable());
    left.zip(right)
        .filter(|(a, b)| a.length() == b.length())
        .map(|(a, b)| (a.id, b.id))
        .collect()
}
