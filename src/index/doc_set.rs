//! Document reference sets with a "complete" sentinel.
//!
//! Presence filtering intersects and unions sets of document references.
//! The universe of documents never needs materialising: a dedicated
//! [`DocSet::Complete`] variant contains everything and short-circuits
//! the set operations.

use ahash::AHashSet;

#[derive(Debug, Clone)]
pub(crate) enum DocSet {
    /// Contains every document reference.
    Complete,
    Elements(AHashSet<String>),
}

impl DocSet {
    pub(crate) fn empty() -> DocSet {
        DocSet::Elements(AHashSet::new())
    }

    pub(crate) fn from_refs<I, S>(refs: I) -> DocSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DocSet::Elements(refs.into_iter().map(Into::into).collect())
    }

    pub(crate) fn contains(&self, doc_ref: &str) -> bool {
        match self {
            DocSet::Complete => true,
            DocSet::Elements(elements) => elements.contains(doc_ref),
        }
    }

    pub(crate) fn intersect(&self, other: &DocSet) -> DocSet {
        match (self, other) {
            (DocSet::Complete, _) => other.clone(),
            (_, DocSet::Complete) => self.clone(),
            (DocSet::Elements(a), DocSet::Elements(b)) => {
                let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
                DocSet::Elements(
                    small
                        .iter()
                        .filter(|element| large.contains(*element))
                        .cloned()
                        .collect(),
                )
            }
        }
    }

    pub(crate) fn union(&self, other: &DocSet) -> DocSet {
        match (self, other) {
            (DocSet::Complete, _) | (_, DocSet::Complete) => DocSet::Complete,
            (DocSet::Elements(a), DocSet::Elements(b)) => {
                DocSet::Elements(a.union(b).cloned().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_contains_everything() {
        assert!(DocSet::Complete.contains("anything"));
        assert!(!DocSet::empty().contains("anything"));
    }

    #[test]
    fn test_complete_intersect_is_identity() {
        let docs = DocSet::from_refs(["a", "b"]);
        assert!(DocSet::Complete.intersect(&docs).contains("a"));
        assert!(!DocSet::Complete.intersect(&docs).contains("c"));
        assert!(docs.intersect(&DocSet::Complete).contains("b"));
    }

    #[test]
    fn test_complete_union_absorbs() {
        let docs = DocSet::from_refs(["a"]);
        assert!(DocSet::Complete.union(&docs).contains("z"));
        assert!(docs.union(&DocSet::Complete).contains("z"));
    }

    #[test]
    fn test_element_set_operations() {
        let ab = DocSet::from_refs(["a", "b"]);
        let bc = DocSet::from_refs(["b", "c"]);

        let intersection = ab.intersect(&bc);
        assert!(intersection.contains("b"));
        assert!(!intersection.contains("a"));
        assert!(!intersection.contains("c"));

        let union = ab.union(&bc);
        for doc_ref in ["a", "b", "c"] {
            assert!(union.contains(doc_ref));
        }
    }

    #[test]
    fn test_empty_set_short_circuits() {
        let docs = DocSet::from_refs(["a"]);
        assert!(!DocSet::empty().intersect(&docs).contains("a"));
        assert!(DocSet::empty().union(&docs).contains("a"));
    }
}
