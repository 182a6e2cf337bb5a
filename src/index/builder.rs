//! Index construction.
//!
//! An [`IndexBuilder`] accumulates documents field by field: each field
//! value is tokenised, run through the index pipeline, and folded into
//! the inverted index, per-field term frequencies and field lengths.
//! [`IndexBuilder::build`] then computes the BM25 field vectors and the
//! corpus token set, and freezes everything into an immutable
//! [`Index`].

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde_json::Value;

use super::posting::{FieldRef, Posting};
use super::Index;
use crate::analysis::pipeline::Pipeline;
use crate::analysis::token::TokenMetadata;
use crate::analysis::tokenizer::{self, tokenize};
use crate::error::{LunariaError, Result};
use crate::vector::SparseVector;

/// Extracts a field value from a document. The default is direct
/// attribute access under the field's name.
pub type Extractor = dyn Fn(&Value) -> Option<Value> + Send + Sync;

/// Per-field configuration.
#[derive(Clone, Default)]
pub struct FieldAttributes {
    /// Score multiplier for matches in this field.
    pub boost: Option<f64>,
    /// Custom extraction of the field value from a document.
    pub extractor: Option<Arc<Extractor>>,
}

impl std::fmt::Debug for FieldAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAttributes")
            .field("boost", &self.boost)
            .field("extractor", &self.extractor.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

struct FieldDefinition {
    name: String,
    attributes: FieldAttributes,
}

/// Builds an [`Index`] from documents.
pub struct IndexBuilder {
    ref_field: String,
    fields: Vec<FieldDefinition>,
    inverted_index: BTreeMap<String, Posting>,
    field_term_frequencies: AHashMap<FieldRef, AHashMap<String, usize>>,
    field_lengths: AHashMap<FieldRef, usize>,
    pipeline: Pipeline,
    search_pipeline: Pipeline,
    document_count: usize,
    doc_boosts: AHashMap<String, f64>,
    b: f64,
    k1: f64,
    term_index: u32,
    metadata_whitelist: Vec<String>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        IndexBuilder::new()
    }
}

impl IndexBuilder {
    /// A builder with empty pipelines. Most callers want
    /// [`crate::builder`], which wires the default analysis pipeline.
    pub fn new() -> Self {
        IndexBuilder {
            ref_field: "id".to_string(),
            fields: Vec::new(),
            inverted_index: BTreeMap::new(),
            field_term_frequencies: AHashMap::new(),
            field_lengths: AHashMap::new(),
            pipeline: Pipeline::new(),
            search_pipeline: Pipeline::new(),
            document_count: 0,
            doc_boosts: AHashMap::new(),
            b: 0.75,
            k1: 1.2,
            term_index: 0,
            metadata_whitelist: Vec::new(),
        }
    }

    /// Set the name of the document field holding the unique reference.
    ///
    /// Fails once documents have been added: postings already key on the
    /// old reference.
    pub fn reference(&mut self, name: &str) -> Result<&mut Self> {
        if self.document_count > 0 {
            return Err(LunariaError::config(
                "the reference field cannot change once documents have been added",
            ));
        }
        self.ref_field = name.to_string();
        Ok(self)
    }

    /// Register a field to index with default attributes.
    pub fn field(&mut self, name: &str) -> Result<&mut Self> {
        self.field_with(name, FieldAttributes::default())
    }

    /// Register a field to index. Field names must not contain `/`,
    /// which is reserved as the field-ref separator. Re-registering a
    /// name replaces its attributes.
    pub fn field_with(&mut self, name: &str, attributes: FieldAttributes) -> Result<&mut Self> {
        if name.contains('/') {
            return Err(LunariaError::config(format!(
                "field name {name:?} must not contain '/'"
            )));
        }

        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(existing) => existing.attributes = attributes,
            None => self.fields.push(FieldDefinition {
                name: name.to_string(),
                attributes,
            }),
        }
        Ok(self)
    }

    /// Set the field-length normalisation parameter, clamped to [0, 1].
    pub fn b(&mut self, b: f64) -> &mut Self {
        self.b = b.clamp(0.0, 1.0);
        self
    }

    /// Set the term-frequency saturation parameter.
    pub fn k1(&mut self, k1: f64) -> &mut Self {
        self.k1 = k1;
        self
    }

    /// Token metadata keys to record into postings (e.g. `position`).
    pub fn metadata_whitelist<S: Into<String>, I: IntoIterator<Item = S>>(
        &mut self,
        keys: I,
    ) -> &mut Self {
        self.metadata_whitelist = keys.into_iter().map(Into::into).collect();
        self
    }

    /// The pipeline run over field values at indexing time.
    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    /// The pipeline run over query terms at search time.
    pub fn search_pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.search_pipeline
    }

    /// Apply a configuration plugin to this builder.
    pub fn use_plugin<F: FnOnce(&mut IndexBuilder)>(&mut self, plugin: F) -> &mut Self {
        plugin(self);
        self
    }

    /// Add a document with the default boost.
    pub fn add(&mut self, document: &Value) -> Result<()> {
        self.add_with_boost(document, 1.0)
    }

    /// Add a document, multiplying all its scores by `boost`.
    ///
    /// The document must carry the reference field; its stringified
    /// value must be unique across the corpus.
    pub fn add_with_boost(&mut self, document: &Value, boost: f64) -> Result<()> {
        let doc_ref = document
            .get(&self.ref_field)
            .map(tokenizer::as_string)
            .ok_or_else(|| {
                LunariaError::config(format!(
                    "document is missing the reference field {:?}",
                    self.ref_field
                ))
            })?;

        self.doc_boosts.insert(doc_ref.clone(), boost);
        self.document_count += 1;

        for field_index in 0..self.fields.len() {
            let field_name = self.fields[field_index].name.clone();
            let extracted = match &self.fields[field_index].attributes.extractor {
                Some(extractor) => extractor(document),
                None => document.get(&field_name).cloned(),
            };

            let mut metadata = TokenMetadata::new();
            metadata.insert("fields".to_string(), serde_json::json!([field_name]));
            let tokens = tokenize(extracted.as_ref(), &metadata);
            let terms = self.pipeline.run(tokens);

            let field_ref = FieldRef::new(doc_ref.clone(), field_name.clone());
            self.field_lengths.insert(field_ref.clone(), terms.len());
            self.field_term_frequencies
                .insert(field_ref.clone(), AHashMap::new());

            for token in &terms {
                let term = token.as_str().to_string();

                if let Some(frequencies) = self.field_term_frequencies.get_mut(&field_ref) {
                    *frequencies.entry(term.clone()).or_insert(0) += 1;
                }

                if !self.inverted_index.contains_key(&term) {
                    // First sighting of the term anywhere in the corpus:
                    // allocate its coordinate and a slot for every field.
                    let mut fields = BTreeMap::new();
                    for field in &self.fields {
                        fields.insert(field.name.clone(), BTreeMap::new());
                    }
                    self.inverted_index.insert(
                        term.clone(),
                        Posting {
                            term_index: self.term_index,
                            fields,
                        },
                    );
                    self.term_index += 1;
                }

                if let Some(posting) = self.inverted_index.get_mut(&term) {
                    let field_postings = posting.fields.entry(field_name.clone()).or_default();
                    let term_metadata = field_postings.entry(doc_ref.clone()).or_default();

                    for key in &self.metadata_whitelist {
                        if let Some(value) = token.metadata().get(key) {
                            term_metadata
                                .entry(key.clone())
                                .or_default()
                                .push(value.clone());
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Finalise the index: compute BM25 field vectors over the
    /// accumulated postings, build the corpus token set from the sorted
    /// vocabulary, and freeze the result.
    pub fn build(mut self) -> Result<Index> {
        let average_field_lengths = self.calculate_average_field_lengths();
        let field_vectors = self.create_field_vectors(&average_field_lengths)?;
        let token_set = crate::token_set::TokenSet::from_array(
            &self.inverted_index.keys().cloned().collect::<Vec<_>>(),
        )?;

        Ok(Index::from_parts(
            self.inverted_index,
            field_vectors,
            token_set,
            self.fields.iter().map(|field| field.name.clone()).collect(),
            std::mem::take(&mut self.search_pipeline),
        ))
    }

    /// Mean field length per field name, over every (document, field)
    /// pair seen for that field.
    fn calculate_average_field_lengths(&self) -> AHashMap<String, f64> {
        let mut totals: AHashMap<String, (usize, usize)> = AHashMap::new();
        for (field_ref, length) in &self.field_lengths {
            let (sum, count) = totals
                .entry(field_ref.field_name().to_string())
                .or_insert((0, 0));
            *sum += length;
            *count += 1;
        }

        totals
            .into_iter()
            .map(|(field_name, (sum, count))| (field_name, sum as f64 / count as f64))
            .collect()
    }

    /// One sparse BM25 vector per (document, field) pair, in the shared
    /// term-index coordinate space. Scores are rounded to three
    /// decimals.
    fn create_field_vectors(
        &self,
        average_field_lengths: &AHashMap<String, f64>,
    ) -> Result<AHashMap<String, SparseVector>> {
        let mut field_vectors = AHashMap::with_capacity(self.field_term_frequencies.len());
        let mut idf_cache: AHashMap<&str, f64> = AHashMap::new();

        for (field_ref, frequencies) in &self.field_term_frequencies {
            let field_name = field_ref.field_name();
            let field_boost = self
                .fields
                .iter()
                .find(|field| field.name == field_name)
                .and_then(|field| field.attributes.boost)
                .unwrap_or(1.0);
            let doc_boost = self
                .doc_boosts
                .get(field_ref.doc_ref())
                .copied()
                .unwrap_or(1.0);
            let field_length = self.field_lengths[field_ref] as f64;
            let average_field_length =
                average_field_lengths.get(field_name).copied().unwrap_or(0.0);

            let mut vector = SparseVector::new();
            for (term, &tf) in frequencies {
                let posting = &self.inverted_index[term];
                let idf = *idf_cache
                    .entry(term.as_str())
                    .or_insert_with(|| Self::idf(posting, self.document_count));

                let tf = tf as f64;
                let mut score = idf * ((self.k1 + 1.0) * tf)
                    / (self.k1
                        * (1.0 - self.b + self.b * (field_length / average_field_length))
                        + tf);
                score *= field_boost;
                score *= doc_boost;
                let score_with_precision = (score * 1000.0).round() / 1000.0;

                // Terms within one field vector are unique, so a plain
                // insert cannot collide.
                vector.insert(posting.term_index, score_with_precision)?;
            }

            vector.magnitude();
            field_vectors.insert(field_ref.to_string(), vector);
        }

        Ok(field_vectors)
    }

    /// Inverse document frequency of a term, counting every
    /// (field, document) pair in its posting.
    fn idf(posting: &Posting, document_count: usize) -> f64 {
        let documents_with_term: usize = posting
            .fields
            .values()
            .map(|field_postings| field_postings.len())
            .sum();
        let x = (document_count as f64 - documents_with_term as f64 + 0.5)
            / (documents_with_term as f64 + 0.5);
        (1.0 + x.abs()).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder_with_fields() -> IndexBuilder {
        let mut builder = IndexBuilder::new();
        builder.field("title").unwrap();
        builder.field("body").unwrap();
        builder
    }

    #[test]
    fn test_field_name_must_not_contain_separator() {
        let mut builder = IndexBuilder::new();
        assert!(builder.field("foo/bar").is_err());
        assert!(builder.field("foo").is_ok());
    }

    #[test]
    fn test_reference_cannot_change_after_adding() {
        let mut builder = builder_with_fields();
        builder.add(&json!({"id": "1", "title": "hello"})).unwrap();
        assert!(builder.reference("other").is_err());
    }

    #[test]
    fn test_missing_reference_field_is_an_error() {
        let mut builder = builder_with_fields();
        assert!(builder.add(&json!({"title": "no id here"})).is_err());
    }

    #[test]
    fn test_b_is_clamped() {
        let mut builder = IndexBuilder::new();
        builder.b(-1.0);
        assert_eq!(builder.b, 0.0);
        builder.b(1.5);
        assert_eq!(builder.b, 1.0);
        builder.b(0.5);
        assert_eq!(builder.b, 0.5);
    }

    #[test]
    fn test_term_indexes_are_distinct_and_stable() {
        let mut builder = builder_with_fields();
        builder
            .add(&json!({"id": "1", "title": "alpha beta", "body": "beta gamma"}))
            .unwrap();
        builder
            .add(&json!({"id": "2", "title": "gamma", "body": "alpha"}))
            .unwrap();

        let mut seen = std::collections::HashSet::new();
        for posting in builder.inverted_index.values() {
            assert!(seen.insert(posting.term_index), "term indexes collide");
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_missing_field_value_still_records_an_empty_field() {
        let mut builder = builder_with_fields();
        builder.add(&json!({"id": "1", "title": "only a title"})).unwrap();
        let index = builder.build().unwrap();

        // One vector per (document, field) pair, even for the absent
        // body: negated queries must surface this document once.
        let serialized = index.to_serialized();
        let refs: Vec<&str> = serialized
            .field_vectors
            .iter()
            .map(|(field_ref, _)| field_ref.as_str())
            .collect();
        assert_eq!(refs, vec!["body/1", "title/1"]);
    }

    #[test]
    fn test_extractor_overrides_attribute_access() {
        let mut builder = IndexBuilder::new();
        builder
            .field_with(
                "name",
                FieldAttributes {
                    boost: None,
                    extractor: Some(Arc::new(|document: &Value| {
                        document.get("nested").and_then(|n| n.get("name")).cloned()
                    })),
                },
            )
            .unwrap();
        builder
            .add(&json!({"id": "1", "nested": {"name": "tucked away"}}))
            .unwrap();
        let index = builder.build().unwrap();

        assert_eq!(index.search("tucked").unwrap().len(), 1);
    }

    #[test]
    fn test_field_boost_outranks_unboosted_field() {
        let mut builder = IndexBuilder::new();
        builder
            .field_with(
                "title",
                FieldAttributes {
                    boost: Some(10.0),
                    extractor: None,
                },
            )
            .unwrap();
        builder.field("body").unwrap();
        builder
            .add(&json!({"id": "title-hit", "title": "needle", "body": "straw"}))
            .unwrap();
        builder
            .add(&json!({"id": "body-hit", "title": "straw", "body": "needle"}))
            .unwrap();
        let index = builder.build().unwrap();

        let results = index.search("needle").unwrap();
        assert_eq!(results[0].doc_ref, "title-hit");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_document_boost_outranks_unboosted_document() {
        let mut builder = builder_with_fields();
        builder
            .add(&json!({"id": "plain", "title": "needle"}))
            .unwrap();
        builder
            .add_with_boost(&json!({"id": "boosted", "title": "needle"}), 5.0)
            .unwrap();
        let index = builder.build().unwrap();

        let results = index.search("needle").unwrap();
        assert_eq!(results[0].doc_ref, "boosted");
    }

    #[test]
    fn test_scores_are_rounded_to_three_decimals() {
        let mut builder = builder_with_fields();
        builder
            .add(&json!({"id": "1", "title": "one two three four five"}))
            .unwrap();
        let index = builder.build().unwrap();

        for (_, vector) in index.to_serialized().field_vectors {
            for &(_, value) in vector.iter() {
                assert_eq!((value * 1000.0).round() / 1000.0, value);
            }
        }
    }

    #[test]
    fn test_identical_builds_serialise_identically() {
        let build = || {
            let mut builder = builder_with_fields();
            builder
                .add(&json!({"id": "1", "title": "alpha beta", "body": "gamma"}))
                .unwrap();
            builder
                .add(&json!({"id": "2", "title": "beta", "body": "alpha delta"}))
                .unwrap();
            builder.build().unwrap()
        };

        let first = serde_json::to_string(&build()).unwrap();
        let second = serde_json::to_string(&build()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_add_order_does_not_affect_ranking() {
        let docs = [
            json!({"id": "1", "title": "alpha beta", "body": "gamma gamma"}),
            json!({"id": "2", "title": "beta", "body": "alpha delta"}),
            json!({"id": "3", "title": "delta", "body": "beta"}),
        ];

        let mut forwards = builder_with_fields();
        for doc in &docs {
            forwards.add(doc).unwrap();
        }
        let mut backwards = builder_with_fields();
        for doc in docs.iter().rev() {
            backwards.add(doc).unwrap();
        }

        let a = forwards.build().unwrap();
        let b = backwards.build().unwrap();
        for query in ["alpha", "beta", "gamma", "delta", "alpha beta"] {
            let left = a.search(query).unwrap();
            let right = b.search(query).unwrap();
            assert_eq!(left.len(), right.len(), "query {query:?}");
            for (x, y) in left.iter().zip(right.iter()) {
                assert_eq!(x.doc_ref, y.doc_ref, "query {query:?}");
                assert!((x.score - y.score).abs() < 1e-9, "query {query:?}");
            }
        }
    }
}
