//! Bidirectional relationship table.
//!
//! Maps a forward relationship type to the type written in the opposite
//! direction. Symmetric entries map a type to itself (`MEMBER_OF`);
//! asymmetric entries name a different inverse (`REPORTS_TO` → `MANAGES`).
//! The registry also acts as the allow-list of relationship type names.
//!
//! A registry is immutable once built. Share it with `Arc` and pass it to
//! the relationship upsert; tests substitute their own.

use std::collections::{BTreeSet, HashMap};

/// Whether a forward type mirrors onto itself or onto a different type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorKind {
    Symmetric,
    Asymmetric,
}

/// Forward → mirror pairs of the organizational graph, by layer.
const STANDARD_MIRRORS: &[(&str, &str)] = &[
    // people & teams
    ("MEMBER_OF", "MEMBER_OF"),
    ("REPORTS_TO", "MANAGES"),
    ("MANAGES", "MANAGED_BY"),
    ("MAPS_TO", "MAPS_TO"),
    // initiatives, epics, issues
    ("PART_OF", "CONTAINS"),
    ("ASSIGNED_TO", "ASSIGNED_TO"),
    ("REPORTED_BY", "REPORTED_BY"),
    ("TEAM", "TEAM"),
    ("IN_SPRINT", "CONTAINS"),
    ("BLOCKS", "BLOCKED_BY"),
    ("DEPENDS_ON", "DEPENDENCY_OF"),
    ("RELATES_TO", "RELATES_TO"),
    // repositories & branches
    ("COLLABORATOR", "COLLABORATOR"),
    ("BRANCH_OF", "BRANCH_OF"),
    // commits & files
    ("AUTHORED_BY", "AUTHORED_BY"),
    ("MODIFIES", "MODIFIED_BY"),
    ("REFERENCES", "REFERENCED_BY"),
    // pull requests
    ("INCLUDES", "INCLUDED_IN"),
    ("TARGETS", "TARGETED_BY"),
    ("CREATED_BY", "CREATED"),
    ("REVIEWED_BY", "REVIEWED"),
    ("REQUESTED_REVIEWER", "REVIEW_REQUESTED_BY"),
    ("MERGED_BY", "MERGED"),
];

/// Known types that are written in one direction only.
const STANDARD_ONE_WAY: &[&str] = &[
    // pull request -> head branch
    "FROM",
];

#[derive(Debug, Clone, Default)]
pub struct MirrorRegistry {
    mirrors: HashMap<String, String>,
    one_way: BTreeSet<String>,
}

impl MirrorRegistry {
    /// A registry with no mirrors and no known types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full table used by the organizational graph loaders.
    pub fn standard() -> Self {
        let mut registry = Self::from_pairs(STANDARD_MIRRORS.iter().copied());
        registry.one_way.extend(STANDARD_ONE_WAY.iter().map(|s| s.to_string()));
        registry
    }

    /// Build from `(forward, mirror)` pairs. A repeated forward type keeps
    /// the last mirror given.
    pub fn from_pairs<F, M>(pairs: impl IntoIterator<Item = (F, M)>) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Self {
            mirrors: pairs.into_iter().map(|(f, m)| (f.into(), m.into())).collect(),
            one_way: BTreeSet::new(),
        }
    }

    /// Allow-list additional one-way types.
    pub fn with_one_way(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.one_way.extend(types.into_iter().map(Into::into));
        self
    }

    /// Mirror type for `rel_type`, or `None` when it is one-way.
    pub fn mirror_of(&self, rel_type: &str) -> Option<&str> {
        self.mirrors.get(rel_type).map(String::as_str)
    }

    pub fn kind(&self, rel_type: &str) -> Option<MirrorKind> {
        self.mirror_of(rel_type).map(|m| {
            if m == rel_type { MirrorKind::Symmetric } else { MirrorKind::Asymmetric }
        })
    }

    pub fn is_bidirectional(&self, rel_type: &str) -> bool {
        self.mirrors.contains_key(rel_type)
    }

    /// Whether `rel_type` may be written at all: a forward type, a mirror
    /// type, or a registered one-way type.
    pub fn is_known(&self, rel_type: &str) -> bool {
        self.mirrors.contains_key(rel_type)
            || self.one_way.contains(rel_type)
            || self.mirrors.values().any(|m| m == rel_type)
    }

    /// Every allow-listed type name, sorted.
    pub fn known_types(&self) -> Vec<&str> {
        let mut types: BTreeSet<&str> = self.one_way.iter().map(String::as_str).collect();
        for (forward, mirror) in &self.mirrors {
            types.insert(forward.as_str());
            types.insert(mirror.as_str());
        }
        types.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_and_asymmetric() {
        let r = MirrorRegistry::standard();
        assert_eq!(r.mirror_of("MEMBER_OF"), Some("MEMBER_OF"));
        assert_eq!(r.kind("MEMBER_OF"), Some(MirrorKind::Symmetric));
        assert_eq!(r.mirror_of("REPORTS_TO"), Some("MANAGES"));
        assert_eq!(r.kind("PART_OF"), Some(MirrorKind::Asymmetric));
        assert_eq!(r.mirror_of("PART_OF"), Some("CONTAINS"));
    }

    #[test]
    fn test_lookup_miss_is_not_an_error() {
        let r = MirrorRegistry::standard();
        assert_eq!(r.mirror_of("FROM"), None);
        assert!(r.is_known("FROM"));
        assert!(!r.is_bidirectional("FROM"));
    }

    #[test]
    fn test_mirror_types_are_known() {
        let r = MirrorRegistry::standard();
        assert!(r.is_known("CONTAINS"));
        assert!(r.is_known("MANAGED_BY"));
        assert!(r.is_known("REVIEW_REQUESTED_BY"));
        assert!(!r.is_known("KNOWS"));
    }

    #[test]
    fn test_manages_has_its_own_mirror() {
        // REPORTS_TO mirrors to MANAGES, which is itself a forward type.
        let r = MirrorRegistry::standard();
        assert_eq!(r.mirror_of("MANAGES"), Some("MANAGED_BY"));
    }

    #[test]
    fn test_standard_size() {
        let r = MirrorRegistry::standard();
        assert_eq!(r.len(), 23);
        let known = r.known_types();
        assert!(known.windows(2).all(|w| w[0] < w[1]));
        assert!(known.contains(&"MERGED"));
    }

    #[test]
    fn test_substitute_registry() {
        let r = MirrorRegistry::from_pairs([("KNOWS", "KNOWS")]).with_one_way(["LIKES"]);
        assert_eq!(r.kind("KNOWS"), Some(MirrorKind::Symmetric));
        assert!(r.is_known("LIKES"));
        assert!(!r.is_known("MEMBER_OF"));
    }
}
