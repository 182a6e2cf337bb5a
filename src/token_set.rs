//! Minimised token-set automata.
//!
//! A [`TokenSet`] is a deterministic finite-state automaton over single
//! character edge labels. It plays two roles: the corpus vocabulary
//! (built from the sorted term list and minimised so words sharing a
//! suffix share a subtree), and a query-term matcher (built from a
//! literal, wildcard, or fuzzy pattern). Intersecting a pattern automaton
//! with the corpus automaton yields exactly the indexed terms the pattern
//! matches.
//!
//! Nodes live in an arena and refer to each other by index, which makes
//! the wildcard self-loop (`*` edge pointing back at its own node) an
//! ordinary edge rather than an ownership cycle.

pub mod builder;

use std::collections::BTreeMap;

use crate::query::Clause;

pub use builder::TokenSetBuilder;

/// Identifies a node within its owning automaton's arena.
pub(crate) type NodeId = u32;

pub(crate) const ROOT: NodeId = 0;

/// The wildcard edge label: consumes any character.
const WILDCARD: char = '*';

#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub(crate) is_final: bool,
    /// Edge label to child node id, ordered by label.
    pub(crate) edges: BTreeMap<char, NodeId>,
    /// Canonical key, frozen during minimisation.
    pub(crate) key: Option<String>,
}

/// A minimised automaton over character labels.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub(crate) nodes: Vec<Node>,
}

impl Default for TokenSet {
    fn default() -> Self {
        TokenSet::new()
    }
}

impl TokenSet {
    /// An automaton accepting nothing, with only a root node.
    pub fn new() -> Self {
        TokenSet {
            nodes: vec![Node::default()],
        }
    }

    /// Build from a lexicographically sorted vocabulary.
    ///
    /// Fails with a build error if the input is out of order.
    pub fn from_array<S: AsRef<str>>(words: &[S]) -> crate::error::Result<TokenSet> {
        let mut builder = TokenSetBuilder::new();
        for word in words {
            builder.insert(word.as_ref())?;
        }
        Ok(builder.finish())
    }

    /// Build from a literal pattern, where `*` matches any run of
    /// characters (including the empty run).
    ///
    /// The automaton is a single chain of nodes; each `*` becomes a
    /// self-loop on the current node.
    pub fn from_string(pattern: &str) -> TokenSet {
        let mut set = TokenSet::new();
        let mut node = ROOT;
        let chars: Vec<char> = pattern.chars().collect();

        for (i, &ch) in chars.iter().enumerate() {
            let is_final = i == chars.len() - 1;
            if ch == WILDCARD {
                set.nodes[node as usize].edges.insert(WILDCARD, node);
                set.nodes[node as usize].is_final = is_final;
            } else {
                let next = set.alloc(is_final);
                set.nodes[node as usize].edges.insert(ch, next);
                node = next;
            }
        }

        set
    }

    /// Build an automaton accepting every string within `edit_distance`
    /// edits of `term`, where insertion, deletion, substitution and
    /// transposition each cost one edit.
    ///
    /// Construction cost grows steeply with the edit distance; callers
    /// should keep it small (at most 3).
    pub fn from_fuzzy_string(term: &str, edit_distance: u32) -> TokenSet {
        struct Frame {
            node: NodeId,
            edits_remaining: u32,
            suffix: Vec<char>,
        }

        let mut set = TokenSet::new();
        let mut stack = vec![Frame {
            node: ROOT,
            edits_remaining: edit_distance,
            suffix: term.chars().collect(),
        }];

        while let Some(frame) = stack.pop() {
            // Consume one character without spending an edit.
            if !frame.suffix.is_empty() {
                let ch = frame.suffix[0];
                let no_edit = set.edge_or_alloc(frame.node, ch);
                if frame.suffix.len() == 1 {
                    set.nodes[no_edit as usize].is_final = true;
                }
                stack.push(Frame {
                    node: no_edit,
                    edits_remaining: frame.edits_remaining,
                    suffix: frame.suffix[1..].to_vec(),
                });
            }

            if frame.edits_remaining == 0 {
                continue;
            }

            // Insertion: accept an extra character here.
            let insertion = set.edge_or_alloc(frame.node, WILDCARD);
            if frame.suffix.is_empty() {
                set.nodes[insertion as usize].is_final = true;
            }
            stack.push(Frame {
                node: insertion,
                edits_remaining: frame.edits_remaining - 1,
                suffix: frame.suffix.clone(),
            });

            // Deletion: skip one pattern character without descending.
            if frame.suffix.len() > 1 {
                stack.push(Frame {
                    node: frame.node,
                    edits_remaining: frame.edits_remaining - 1,
                    suffix: frame.suffix[1..].to_vec(),
                });
            }
            if frame.suffix.len() == 1 {
                set.nodes[frame.node as usize].is_final = true;
            }

            // Substitution: accept any character in place of the next one.
            if !frame.suffix.is_empty() {
                let substitution = set.edge_or_alloc(frame.node, WILDCARD);
                if frame.suffix.len() == 1 {
                    set.nodes[substitution as usize].is_final = true;
                }
                stack.push(Frame {
                    node: substitution,
                    edits_remaining: frame.edits_remaining - 1,
                    suffix: frame.suffix[1..].to_vec(),
                });
            }

            // Transposition: swap the next two pattern characters.
            if frame.suffix.len() > 1 {
                let first = frame.suffix[0];
                let second = frame.suffix[1];
                let transpose = set.edge_or_alloc(frame.node, second);
                let mut rest = vec![first];
                rest.extend_from_slice(&frame.suffix[2..]);
                stack.push(Frame {
                    node: transpose,
                    edits_remaining: frame.edits_remaining - 1,
                    suffix: rest,
                });
            }
        }

        set
    }

    /// Build the automaton for a query clause: fuzzy when the clause
    /// carries an edit distance, literal-with-wildcards otherwise.
    pub fn from_clause(clause: &Clause) -> TokenSet {
        if clause.edit_distance > 0 {
            TokenSet::from_fuzzy_string(&clause.term, clause.edit_distance)
        } else {
            TokenSet::from_string(&clause.term)
        }
    }

    /// Enumerate every accepted string.
    ///
    /// Must only be called on finite automata; an automaton containing a
    /// wildcard self-loop accepts infinitely many strings. Intersection
    /// results are always finite when the corpus side has no wildcards.
    pub fn to_array(&self) -> Vec<String> {
        let mut words = Vec::new();
        let mut stack = vec![(String::new(), ROOT)];

        while let Some((prefix, node)) = stack.pop() {
            let node = &self.nodes[node as usize];
            if node.is_final {
                words.push(prefix.clone());
            }
            for (&label, &child) in &node.edges {
                let mut word = prefix.clone();
                word.push(label);
                stack.push((word, child));
            }
        }

        words
    }

    /// Intersect this (query-side, possibly wildcarded) automaton with a
    /// corpus automaton, producing an automaton accepting strings accepted
    /// by both.
    ///
    /// The result is finite as long as `corpus` has no wildcard
    /// self-loops, which holds for vocabularies built by
    /// [`TokenSetBuilder`].
    pub fn intersect(&self, corpus: &TokenSet) -> TokenSet {
        struct Frame {
            query: NodeId,
            corpus: NodeId,
            output: NodeId,
        }

        let mut output = TokenSet::new();
        let mut stack = vec![Frame {
            query: ROOT,
            corpus: ROOT,
            output: ROOT,
        }];

        while let Some(frame) = stack.pop() {
            let query_edges: Vec<(char, NodeId)> = self.nodes[frame.query as usize]
                .edges
                .iter()
                .map(|(&label, &child)| (label, child))
                .collect();

            for (query_label, query_child) in query_edges {
                let corpus_edges: Vec<(char, NodeId)> = corpus.nodes[frame.corpus as usize]
                    .edges
                    .iter()
                    .map(|(&label, &child)| (label, child))
                    .collect();

                for (corpus_label, corpus_child) in corpus_edges {
                    if corpus_label != query_label && query_label != WILDCARD {
                        continue;
                    }

                    let pair_is_final = self.nodes[query_child as usize].is_final
                        && corpus.nodes[corpus_child as usize].is_final;

                    let next = match output.nodes[frame.output as usize]
                        .edges
                        .get(&corpus_label)
                    {
                        Some(&existing) => {
                            output.nodes[existing as usize].is_final |= pair_is_final;
                            existing
                        }
                        None => {
                            let created = output.alloc(pair_is_final);
                            output.nodes[frame.output as usize]
                                .edges
                                .insert(corpus_label, created);
                            created
                        }
                    };

                    stack.push(Frame {
                        query: query_child,
                        corpus: corpus_child,
                        output: next,
                    });
                }
            }
        }

        output
    }

    /// The canonical key of a node: its finality bit followed by each
    /// `(label, child id)` pair in label order.
    ///
    /// Only stable once every child has been minimised, which the builder
    /// guarantees by minimising bottom-up.
    pub(crate) fn node_key(&self, id: NodeId) -> String {
        let node = &self.nodes[id as usize];
        if let Some(key) = &node.key {
            return key.clone();
        }

        let mut key = String::new();
        key.push(if node.is_final { '1' } else { '0' });
        for (&label, &child) in &node.edges {
            key.push(label);
            key.push_str(&child.to_string());
        }
        key
    }

    pub(crate) fn alloc(&mut self, is_final: bool) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            is_final,
            edges: BTreeMap::new(),
            key: None,
        });
        id
    }

    /// Follow the edge under `label` from `node`, creating a fresh target
    /// node when the edge does not exist yet.
    fn edge_or_alloc(&mut self, node: NodeId, label: char) -> NodeId {
        if let Some(&existing) = self.nodes[node as usize].edges.get(&label) {
            return existing;
        }
        let created = self.alloc(false);
        self.nodes[node as usize].edges.insert(label, created);
        created
    }
}
