//! Token transformation pipelines.
//!
//! A [`Pipeline`] is an ordered stack of [`PipelineFunction`]s. Running a
//! batch applies each function to every current token in turn; a function
//! may pass a token through, rewrite it, expand it into several tokens, or
//! drop it by returning nothing. The collected outputs of one function
//! feed the next.
//!
//! Functions are registered process-wide under a label so that a
//! serialised index can name its pipeline and be reloaded later.

use std::sync::{Arc, LazyLock};

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::warn;

use super::token::{Token, TokenMetadata};
use super::token_filter::stem::Stemmer;
use super::token_filter::stop::StopWordFilter;
use super::token_filter::trim::Trimmer;
use crate::error::{LunariaError, Result};

/// A single stage of a pipeline.
///
/// `run` receives the token, its position in the current batch, and the
/// whole batch; it returns the replacement tokens (empty to drop, one to
/// pass or rewrite, several to expand).
pub trait PipelineFunction: Send + Sync {
    /// The label this function serialises under.
    fn label(&self) -> &str;

    fn run(&self, token: Token, index: usize, batch: &[Token]) -> Vec<Token>;
}

static REGISTRY: LazyLock<RwLock<AHashMap<String, Arc<dyn PipelineFunction>>>> =
    LazyLock::new(|| {
        let mut registry: AHashMap<String, Arc<dyn PipelineFunction>> = AHashMap::new();
        for function in [
            Arc::new(Trimmer) as Arc<dyn PipelineFunction>,
            Arc::new(StopWordFilter),
            Arc::new(Stemmer::default()),
        ] {
            registry.insert(function.label().to_string(), function);
        }
        RwLock::new(registry)
    });

/// An ordered stack of pipeline functions.
#[derive(Clone, Default)]
pub struct Pipeline {
    stack: Vec<Arc<dyn PipelineFunction>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stack", &self.save()).finish()
    }
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Pipeline::default()
    }

    /// Register a function process-wide under its label, making it
    /// available to [`Pipeline::load`]. Re-registering a label overwrites
    /// the previous function with a warning.
    pub fn register_function(function: Arc<dyn PipelineFunction>) {
        let label = function.label().to_string();
        let mut registry = REGISTRY.write();
        if registry.contains_key(&label) {
            warn!(%label, "overwriting existing registered pipeline function");
        }
        registry.insert(label, function);
    }

    /// Look up a registered function by label.
    pub fn registered_function(label: &str) -> Option<Arc<dyn PipelineFunction>> {
        REGISTRY.read().get(label).cloned()
    }

    /// Rebuild a pipeline from serialised labels. Fails if any label has
    /// no registered function.
    pub fn load(labels: &[String]) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new();
        for label in labels {
            let function = Pipeline::registered_function(label).ok_or_else(|| {
                LunariaError::pipeline(format!("cannot load unregistered function: {label}"))
            })?;
            pipeline.stack.push(function);
        }
        Ok(pipeline)
    }

    /// Append a function to the pipeline.
    pub fn add(&mut self, function: Arc<dyn PipelineFunction>) -> &mut Self {
        self.warn_if_not_registered(&function);
        self.stack.push(function);
        self
    }

    /// Insert `function` immediately before the stage labelled
    /// `existing_label`.
    pub fn insert_before(
        &mut self,
        existing_label: &str,
        function: Arc<dyn PipelineFunction>,
    ) -> Result<&mut Self> {
        let position = self.position_of(existing_label)?;
        self.warn_if_not_registered(&function);
        self.stack.insert(position, function);
        Ok(self)
    }

    /// Insert `function` immediately after the stage labelled
    /// `existing_label`.
    pub fn insert_after(
        &mut self,
        existing_label: &str,
        function: Arc<dyn PipelineFunction>,
    ) -> Result<&mut Self> {
        let position = self.position_of(existing_label)?;
        self.warn_if_not_registered(&function);
        self.stack.insert(position + 1, function);
        Ok(self)
    }

    /// Remove the stage labelled `label`, if present.
    pub fn remove(&mut self, label: &str) -> &mut Self {
        self.stack.retain(|function| function.label() != label);
        self
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run a batch of tokens through every stage in order.
    pub fn run(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut batch = tokens;
        for function in &self.stack {
            let mut next = Vec::with_capacity(batch.len());
            for index in 0..batch.len() {
                let token = batch[index].clone();
                next.extend(function.run(token, index, &batch));
            }
            batch = next;
        }
        batch
    }

    /// Run a single string through the pipeline, returning the resulting
    /// term strings. Used to expand query terms.
    pub fn run_string(&self, term: &str, metadata: TokenMetadata) -> Vec<String> {
        let token = Token::new(term, metadata);
        self.run(vec![token])
            .into_iter()
            .map(|token| token.as_str().to_string())
            .collect()
    }

    /// The ordered labels of this pipeline, for serialisation.
    pub fn save(&self) -> Vec<String> {
        self.stack
            .iter()
            .map(|function| function.label().to_string())
            .collect()
    }

    fn position_of(&self, label: &str) -> Result<usize> {
        self.stack
            .iter()
            .position(|function| function.label() == label)
            .ok_or_else(|| {
                LunariaError::pipeline(format!("cannot find existing function: {label}"))
            })
    }

    fn warn_if_not_registered(&self, function: &Arc<dyn PipelineFunction>) {
        if Pipeline::registered_function(function.label()).is_none() {
            warn!(
                label = function.label(),
                "function is not registered, serialisation may not work"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upcase;

    impl PipelineFunction for Upcase {
        fn label(&self) -> &str {
            "testUpcase"
        }

        fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
            vec![token.update(|term, _| term.to_uppercase())]
        }
    }

    struct DropShort;

    impl PipelineFunction for DropShort {
        fn label(&self) -> &str {
            "testDropShort"
        }

        fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
            if token.as_str().len() < 3 {
                Vec::new()
            } else {
                vec![token]
            }
        }
    }

    struct Split;

    impl PipelineFunction for Split {
        fn label(&self) -> &str {
            "testSplit"
        }

        fn run(&self, token: Token, _index: usize, _batch: &[Token]) -> Vec<Token> {
            let halves: Vec<Token> = token
                .as_str()
                .split('_')
                .map(|part| Token::new(part, token.metadata().clone()))
                .collect();
            halves
        }
    }

    fn batch(terms: &[&str]) -> Vec<Token> {
        terms
            .iter()
            .map(|term| Token::new(*term, TokenMetadata::new()))
            .collect()
    }

    fn terms(tokens: &[Token]) -> Vec<String> {
        tokens.iter().map(|t| t.as_str().to_string()).collect()
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(DropShort)).add(Arc::new(Upcase));
        let output = pipeline.run(batch(&["be", "concise"]));
        assert_eq!(terms(&output), vec!["CONCISE"]);
    }

    #[test]
    fn test_expansion_feeds_later_stages() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(Split)).add(Arc::new(Upcase));
        let output = pipeline.run(batch(&["foo_bar"]));
        assert_eq!(terms(&output), vec!["FOO", "BAR"]);
    }

    #[test]
    fn test_dropped_tokens_never_reach_downstream_stages() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(DropShort)).add(Arc::new(Split));
        let output = pipeline.run(batch(&["ab", "cd_ef"]));
        assert_eq!(terms(&output), vec!["cd", "ef"]);
    }

    #[test]
    fn test_run_string() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(Upcase));
        assert_eq!(
            pipeline.run_string("hello", TokenMetadata::new()),
            vec!["HELLO"]
        );
    }

    #[test]
    fn test_save_lists_labels_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(Split)).add(Arc::new(Upcase));
        assert_eq!(pipeline.save(), vec!["testSplit", "testUpcase"]);
    }

    #[test]
    fn test_load_requires_registration() {
        assert!(Pipeline::load(&["noSuchFunction".to_string()]).is_err());

        Pipeline::register_function(Arc::new(Upcase));
        let pipeline = Pipeline::load(&["testUpcase".to_string()]).unwrap();
        assert_eq!(pipeline.save(), vec!["testUpcase"]);
    }

    #[test]
    fn test_default_functions_are_pre_registered() {
        for label in ["trimmer", "stopWordFilter", "stemmer"] {
            assert!(Pipeline::registered_function(label).is_some(), "{label}");
        }
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(Upcase));
        pipeline.insert_before("testUpcase", Arc::new(DropShort)).unwrap();
        pipeline.insert_after("testDropShort", Arc::new(Split)).unwrap();
        assert_eq!(
            pipeline.save(),
            vec!["testDropShort", "testSplit", "testUpcase"]
        );
        assert!(pipeline.insert_before("missing", Arc::new(Split)).is_err());
    }

    #[test]
    fn test_remove() {
        let mut pipeline = Pipeline::new();
        pipeline.add(Arc::new(Upcase)).add(Arc::new(DropShort));
        pipeline.remove("testUpcase");
        assert_eq!(pipeline.save(), vec!["testDropShort"]);
    }
}
