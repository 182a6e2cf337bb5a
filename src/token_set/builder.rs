//! Incremental construction of minimised vocabulary automata.

use ahash::AHashMap;

use super::{NodeId, ROOT, TokenSet};
use crate::error::{LunariaError, Result};

struct UncheckedNode {
    parent: NodeId,
    label: char,
    child: NodeId,
}

/// Builds a minimised [`TokenSet`] from words inserted in
/// lexicographic order.
///
/// The builder keeps a stack of frontier nodes that have not yet been
/// checked against previously minimised subtrees. Inserting a word pops
/// the stack down to the common prefix with the previous word, merging
/// each popped node with an existing structurally-equivalent node where
/// one exists. Children are always minimised before their parents, which
/// keeps canonical keys stable.
pub struct TokenSetBuilder {
    set: TokenSet,
    previous_word: String,
    unchecked: Vec<UncheckedNode>,
    minimized: AHashMap<String, NodeId>,
}

impl Default for TokenSetBuilder {
    fn default() -> Self {
        TokenSetBuilder::new()
    }
}

impl TokenSetBuilder {
    pub fn new() -> Self {
        TokenSetBuilder {
            set: TokenSet::new(),
            previous_word: String::new(),
            unchecked: Vec::new(),
            minimized: AHashMap::new(),
        }
    }

    /// Insert the next word. Words must arrive in ascending order.
    pub fn insert(&mut self, word: &str) -> Result<()> {
        if word < self.previous_word.as_str() {
            return Err(LunariaError::build(format!(
                "out of order word insertion: {word:?} after {:?}",
                self.previous_word
            )));
        }

        let common_prefix = word
            .chars()
            .zip(self.previous_word.chars())
            .take_while(|(a, b)| a == b)
            .count();

        self.minimize(common_prefix);

        let mut node = self
            .unchecked
            .last()
            .map(|unchecked| unchecked.child)
            .unwrap_or(ROOT);

        for label in word.chars().skip(common_prefix) {
            let child = self.set.alloc(false);
            self.set.nodes[node as usize].edges.insert(label, child);
            self.unchecked.push(UncheckedNode {
                parent: node,
                label,
                child,
            });
            node = child;
        }

        self.set.nodes[node as usize].is_final = true;
        self.previous_word = word.to_string();
        Ok(())
    }

    /// Minimise the remaining frontier and return the finished automaton.
    pub fn finish(mut self) -> TokenSet {
        self.minimize(0);
        self.set
    }

    /// Pop frontier entries down to `down_to`, sharing each popped node
    /// with an already-minimised structural twin where possible.
    fn minimize(&mut self, down_to: usize) {
        while self.unchecked.len() > down_to {
            let Some(unchecked) = self.unchecked.pop() else {
                break;
            };
            let key = self.set.node_key(unchecked.child);

            if let Some(&twin) = self.minimized.get(&key) {
                self.set.nodes[unchecked.parent as usize]
                    .edges
                    .insert(unchecked.label, twin);
            } else {
                self.set.nodes[unchecked.child as usize].key = Some(key.clone());
                self.minimized.insert(key, unchecked.child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_accepts_nothing() {
        let set = TokenSetBuilder::new().finish();
        assert!(set.to_array().is_empty());
    }

    #[test]
    fn test_single_word() {
        let mut builder = TokenSetBuilder::new();
        builder.insert("cat").unwrap();
        assert_eq!(builder.finish().to_array(), vec!["cat"]);
    }

    #[test]
    fn test_out_of_order_insertion_fails() {
        let mut builder = TokenSetBuilder::new();
        builder.insert("zebra").unwrap();
        assert!(builder.insert("aardvark").is_err());
    }

    #[test]
    fn test_shared_prefixes_extend_existing_chain() {
        let mut builder = TokenSetBuilder::new();
        builder.insert("cat").unwrap();
        builder.insert("catalog").unwrap();
        let set = builder.finish();
        let mut words = set.to_array();
        words.sort();
        assert_eq!(words, vec!["cat", "catalog"]);
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let mut builder = TokenSetBuilder::new();
        builder.insert("cat").unwrap();
        builder.insert("cat").unwrap();
        assert_eq!(builder.finish().to_array(), vec!["cat"]);
    }
}
