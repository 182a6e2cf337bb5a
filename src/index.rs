//! The immutable search index and its query executor.
//!
//! An [`Index`] is produced by an [`IndexBuilder`](builder::IndexBuilder)
//! and is read-only from then on: queries allocate transient state only,
//! so a built index can be shared freely across threads.

pub mod builder;
mod doc_set;
pub mod posting;

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::analysis::pipeline::Pipeline;
use crate::analysis::token::TokenMetadata;
use crate::error::Result;
use crate::match_data::MatchData;
use crate::query::{parser, Presence, Query};
use crate::token_set::{TokenSet, TokenSetBuilder};
use crate::vector::SparseVector;
use doc_set::DocSet;
use posting::{FieldRef, Posting};

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matching document's reference.
    pub doc_ref: String,
    /// BM25 cosine similarity, summed across fields.
    pub score: f64,
    /// Which terms matched where.
    pub match_data: MatchData,
}

/// An immutable inverted index over a document collection.
#[derive(Debug)]
pub struct Index {
    inverted_index: BTreeMap<String, Posting>,
    field_vectors: AHashMap<String, SparseVector>,
    token_set: TokenSet,
    fields: Vec<String>,
    pipeline: Pipeline,
}

impl Index {
    pub(crate) fn from_parts(
        inverted_index: BTreeMap<String, Posting>,
        field_vectors: AHashMap<String, SparseVector>,
        token_set: TokenSet,
        fields: Vec<String>,
        pipeline: Pipeline,
    ) -> Self {
        Index {
            inverted_index,
            field_vectors,
            token_set,
            fields,
            pipeline,
        }
    }

    /// The indexed field names, in definition order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Search with the compact query syntax.
    ///
    /// Equivalent to parsing `query_string` into clauses via
    /// [`Index::query`].
    pub fn search(&self, query_string: &str) -> Result<Vec<SearchResult>> {
        self.query(|query| parser::parse(query_string, query))
    }

    /// Run a programmatically built query.
    ///
    /// The callback receives a fresh [`Query`] scoped to this index's
    /// fields and adds clauses to it.
    pub fn query<F>(&self, build: F) -> Result<Vec<SearchResult>>
    where
        F: FnOnce(&mut Query) -> Result<()>,
    {
        let mut query = Query::new(self.fields.clone());
        build(&mut query)?;
        self.execute(&query)
    }

    fn execute(&self, query: &Query) -> Result<Vec<SearchResult>> {
        let mut matching_fields: AHashMap<String, MatchData> = AHashMap::new();
        let mut term_field_cache: AHashSet<(String, String)> = AHashSet::new();
        let mut required_matches: AHashMap<&str, DocSet> = AHashMap::new();
        let mut prohibited_matches: AHashMap<&str, DocSet> = AHashMap::new();

        // One query vector per field: clauses targeting a field
        // accumulate their boosts at the matched terms' coordinates.
        let mut query_vectors: AHashMap<&str, SparseVector> = self
            .fields
            .iter()
            .map(|field| (field.as_str(), SparseVector::new()))
            .collect();

        for clause in query.clauses() {
            let clause_fields: &[String] = clause
                .fields
                .as_deref()
                .unwrap_or_else(|| query.all_fields());

            // Expand the clause term through the search pipeline, unless
            // the clause opts out (wildcard terms must stay verbatim).
            let terms: Vec<String> = if clause.use_pipeline {
                let mut metadata = TokenMetadata::new();
                metadata.insert("fields".to_string(), serde_json::json!(clause_fields));
                self.pipeline.run_string(&clause.term, metadata)
            } else {
                vec![clause.term.clone()]
            };

            let mut clause_matches = DocSet::empty();

            for term in &terms {
                let mut expanded_clause = clause.clone();
                expanded_clause.term = term.clone();
                let term_set = TokenSet::from_clause(&expanded_clause);
                let expanded_terms = term_set.intersect(&self.token_set).to_array();

                if expanded_terms.is_empty() && clause.presence == Presence::Required {
                    // A required term with no matches can never be
                    // satisfied: mark every targeted field as matching
                    // nothing and stop expanding this clause.
                    for field in clause_fields {
                        required_matches.insert(field.as_str(), DocSet::empty());
                    }
                    break;
                }

                for expanded_term in &expanded_terms {
                    let Some(posting) = self.inverted_index.get(expanded_term) else {
                        continue;
                    };
                    let term_index = posting.term_index;

                    for field in clause_fields {
                        let Some(field_posting) = posting.fields.get(field) else {
                            continue;
                        };
                        let matching_docs =
                            DocSet::from_refs(field_posting.keys().map(String::as_str));

                        if clause.presence == Presence::Required {
                            clause_matches = clause_matches.union(&matching_docs);
                            required_matches
                                .entry(field.as_str())
                                .or_insert(DocSet::Complete);
                        }

                        if clause.presence == Presence::Prohibited {
                            let prohibited = prohibited_matches
                                .entry(field.as_str())
                                .or_insert_with(DocSet::empty);
                            *prohibited = prohibited.union(&matching_docs);
                            // Prohibited terms only filter; they never
                            // contribute to scoring or match data.
                            continue;
                        }

                        if let Some(vector) = query_vectors.get_mut(field.as_str()) {
                            vector.upsert(term_index, clause.boost, |a, b| Ok(a + b))?;
                        }

                        // The same (term, field) pair may come up again
                        // via another clause; the vector above must
                        // accumulate but match data must not duplicate.
                        let cache_key = (expanded_term.clone(), field.clone());
                        if term_field_cache.contains(&cache_key) {
                            continue;
                        }

                        for (doc_ref, metadata) in field_posting {
                            let field_ref = FieldRef::new(doc_ref.clone(), field.clone());
                            matching_fields
                                .entry(field_ref.to_string())
                                .and_modify(|existing| {
                                    existing.add(expanded_term, field, metadata);
                                })
                                .or_insert_with(|| {
                                    MatchData::with(expanded_term, field, metadata)
                                });
                        }
                        term_field_cache.insert(cache_key);
                    }
                }
            }

            if clause.presence == Presence::Required {
                for field in clause_fields {
                    let required = required_matches
                        .entry(field.as_str())
                        .or_insert_with(DocSet::empty);
                    *required = required.intersect(&clause_matches);
                }
            }
        }

        // Fold the per-field sets into corpus-wide filters.
        let mut all_required = DocSet::Complete;
        let mut all_prohibited = DocSet::empty();
        for field in &self.fields {
            if let Some(required) = required_matches.get(field.as_str()) {
                all_required = all_required.intersect(required);
            }
            if let Some(prohibited) = prohibited_matches.get(field.as_str()) {
                all_prohibited = all_prohibited.union(prohibited);
            }
        }

        let mut matching_field_refs: Vec<String> = matching_fields.keys().cloned().collect();

        if query.is_negated() {
            // A fully negated query matches everything that is not
            // excluded, with a score of 0.
            matching_field_refs = self.field_vectors.keys().cloned().collect();
            for field_ref in &matching_field_refs {
                matching_fields.insert(field_ref.clone(), MatchData::new());
            }
        }

        let mut results: Vec<SearchResult> = Vec::new();
        let mut result_slots: AHashMap<String, usize> = AHashMap::new();

        for field_ref_str in matching_field_refs {
            let field_ref: FieldRef = field_ref_str.parse()?;

            if !all_required.contains(field_ref.doc_ref()) {
                continue;
            }
            if all_prohibited.contains(field_ref.doc_ref()) {
                continue;
            }

            let Some(field_vector) = self.field_vectors.get(&field_ref_str) else {
                continue;
            };
            let score = query_vectors
                .get(field_ref.field_name())
                .map(|query_vector| query_vector.similarity(field_vector))
                .unwrap_or(0.0);

            let match_data = matching_fields.remove(&field_ref_str).unwrap_or_default();

            match result_slots.get(field_ref.doc_ref()) {
                Some(&slot) => {
                    results[slot].score += score;
                    results[slot].match_data.combine(&match_data);
                }
                None => {
                    result_slots.insert(field_ref.doc_ref().to_string(), results.len());
                    results.push(SearchResult {
                        doc_ref: field_ref.doc_ref().to_string(),
                        score,
                        match_data,
                    });
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_ref.cmp(&b.doc_ref))
        });

        Ok(results)
    }

    /// Project the index into its portable serialised form.
    pub fn to_serialized(&self) -> SerializedIndex {
        let mut field_vectors: Vec<(String, SparseVector)> = self
            .field_vectors
            .iter()
            .map(|(field_ref, vector)| (field_ref.clone(), vector.clone()))
            .collect();
        field_vectors.sort_by(|a, b| a.0.cmp(&b.0));

        SerializedIndex {
            version: crate::VERSION.to_string(),
            fields: self.fields.clone(),
            field_vectors,
            inverted_index: self
                .inverted_index
                .iter()
                .map(|(term, posting)| (term.clone(), posting.clone()))
                .collect(),
            pipeline: self.pipeline.save(),
        }
    }

    /// Rebuild an index from its serialised form.
    ///
    /// The inverted index must be listed in lexicographic term order:
    /// the token-set builder consumes it as a sorted vocabulary. Every
    /// pipeline label must have a registered function. A version
    /// mismatch is reported but tolerated.
    pub fn load(serialized: SerializedIndex) -> Result<Index> {
        if serialized.version != crate::VERSION {
            warn!(
                serialized = %serialized.version,
                runtime = crate::VERSION,
                "version mismatch when loading serialised index"
            );
        }

        let mut token_set_builder = TokenSetBuilder::new();
        let mut inverted_index = BTreeMap::new();
        for (term, posting) in serialized.inverted_index {
            token_set_builder.insert(&term)?;
            inverted_index.insert(term, posting);
        }

        let field_vectors: AHashMap<String, SparseVector> = serialized
            .field_vectors
            .into_iter()
            .map(|(field_ref, vector)| {
                // Freeze the magnitude cache so concurrent queries never
                // race to fill it.
                vector.magnitude();
                (field_ref, vector)
            })
            .collect();

        let pipeline = Pipeline::load(&serialized.pipeline)?;

        Ok(Index::from_parts(
            inverted_index,
            field_vectors,
            token_set_builder.finish(),
            serialized.fields,
            pipeline,
        ))
    }
}

impl Serialize for Index {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_serialized().serialize(serializer)
    }
}

/// The portable, versioned projection of an [`Index`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedIndex {
    pub version: String,
    pub fields: Vec<String>,
    pub field_vectors: Vec<(String, SparseVector)>,
    /// `(term, posting)` pairs in lexicographic term order.
    pub inverted_index: Vec<(String, Posting)>,
    pub pipeline: Vec<String>,
}
