//! Retrieval orchestration.
//!
//! A [`Pipeline`] is built once from a [`PipelineConfig`] and a set of
//! [`Collaborators`]. Each call runs
//! `search → [term match] → assemble → [answer]` and keeps no state
//! between calls.

use std::sync::Arc;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{info, warn};

use similarity_core::backend::{
    AnswerGenerator, EmbeddingProvider, KeywordStore, RelationalStore, VectorIndex,
};
use similarity_core::prompt::{ContextAssembler, DEFAULT_INTRODUCTION, DEFAULT_TOKEN_BUDGET};
use similarity_core::search::{
    HybridSearch, RelationalSearch, SearchBackend, VectorSearch, RELATIONAL_TOP_N,
};
use similarity_core::{Error, Fragment, Result, Strategy};

use crate::config::Config;
use crate::db;
use crate::elastic::ElasticClient;
use crate::embedding::create_provider;
use crate::generation::OpenAiChat;
use crate::qdrant::QdrantClient;
use crate::sqlite_store::SqliteStore;
use crate::term_match::TermMatcher;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `None` selects no backend: retrieval returns nothing.
    pub strategy: Option<Strategy>,
    pub enable_term_match: bool,
    pub top_n: i64,
    pub token_budget: usize,
    pub scope: String,
    pub introduction: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: None,
            enable_term_match: false,
            top_n: RELATIONAL_TOP_N,
            token_budget: DEFAULT_TOKEN_BUDGET,
            scope: String::new(),
            introduction: DEFAULT_INTRODUCTION.to_string(),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        let retrieval = &config.retrieval;
        Self {
            strategy: retrieval.strategy(),
            enable_term_match: retrieval.enable_term_match,
            top_n: retrieval.top_n,
            token_budget: retrieval.token_budget,
            scope: retrieval.scope.clone(),
            introduction: retrieval.introduction.clone(),
        }
    }
}

/// External services a pipeline may draw on. Only the ones the selected
/// strategy needs have to be present.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub vector_index: Option<Arc<dyn VectorIndex>>,
    pub relational: Option<Arc<dyn RelationalStore>>,
    pub keyword: Option<Arc<dyn KeywordStore>>,
    pub generator: Option<Arc<dyn AnswerGenerator>>,
}

/// Result of a full question-answering pass.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub fragments: Vec<Fragment>,
}

pub struct Pipeline {
    backend: Option<Box<dyn SearchBackend>>,
    term_matcher: Option<TermMatcher>,
    assembler: ContextAssembler,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl Pipeline {
    /// Select the backend for `config.strategy` and wire it to its
    /// collaborators. Fails if a required collaborator is missing.
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> anyhow::Result<Self> {
        let Collaborators {
            embedder,
            vector_index,
            relational,
            keyword,
            generator,
        } = collaborators;

        let backend = match config.strategy {
            None => None,
            Some(strategy) => {
                let Some(embedder) = embedder else {
                    bail!("strategy '{}' requires an embedding provider", strategy);
                };
                let backend: Box<dyn SearchBackend> = match strategy {
                    Strategy::Vector => {
                        let Some(index) = vector_index.clone() else {
                            bail!("strategy 'vector' requires a vector index");
                        };
                        Box::new(VectorSearch::new(embedder, index))
                    }
                    Strategy::Relational => {
                        let Some(store) = relational else {
                            bail!("strategy 'relational' requires a relational store");
                        };
                        Box::new(
                            RelationalSearch::new(embedder, store, config.scope.clone())
                                .with_top_n(config.top_n),
                        )
                    }
                    Strategy::Hybrid => {
                        let Some(store) = keyword else {
                            bail!("strategy 'hybrid' requires a keyword store");
                        };
                        Box::new(HybridSearch::new(embedder, store))
                    }
                };
                Some(backend)
            }
        };

        let term_matcher = if config.enable_term_match {
            match (config.strategy, vector_index) {
                (Some(Strategy::Vector), Some(index)) => Some(TermMatcher::new(index)),
                _ => bail!("term matching requires strategy 'vector'"),
            }
        } else {
            None
        };

        Ok(Self {
            backend,
            term_matcher,
            assembler: ContextAssembler::new(config.token_budget)
                .with_introduction(config.introduction),
            generator,
        })
    }

    /// Build the production pipeline for `config`. The chat client is only
    /// created when `with_generator` is set, so retrieval-only commands do
    /// not need generation settings.
    pub async fn from_config(config: &Config, with_generator: bool) -> anyhow::Result<Self> {
        let pipeline_config = PipelineConfig::from(config);
        let mut collaborators = Collaborators::default();

        if pipeline_config.strategy.is_some() {
            collaborators.embedder = Some(create_provider(&config.embedding)?);
        }

        match pipeline_config.strategy {
            Some(Strategy::Vector) => {
                let qdrant = config
                    .qdrant
                    .as_ref()
                    .context("strategy 'vector' requires a [qdrant] section")?;
                let index: Arc<dyn VectorIndex> = Arc::new(QdrantClient::new(qdrant)?);
                collaborators.vector_index = Some(index);
            }
            Some(Strategy::Relational) => {
                let pool = db::connect(config).await?;
                let store: Arc<dyn RelationalStore> = Arc::new(SqliteStore::new(pool));
                collaborators.relational = Some(store);
            }
            Some(Strategy::Hybrid) => {
                let elastic = config
                    .elasticsearch
                    .as_ref()
                    .context("strategy 'hybrid' requires an [elasticsearch] section")?;
                let store: Arc<dyn KeywordStore> = Arc::new(ElasticClient::new(elastic)?);
                collaborators.keyword = Some(store);
            }
            None => {}
        }

        if with_generator {
            let generator: Arc<dyn AnswerGenerator> =
                Arc::new(OpenAiChat::from_config(&config.generation)?);
            collaborators.generator = Some(generator);
        }

        Self::new(pipeline_config, collaborators)
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.backend.as_ref().map(|b| b.strategy())
    }

    /// Ranked fragments for `query`, plus exact-term hits when enabled.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Fragment>> {
        let Some(backend) = &self.backend else {
            warn!("no retrieval strategy selected; returning no fragments");
            return Ok(Vec::new());
        };

        info!(strategy = %backend.strategy(), "searching");
        let mut fragments = backend.search(query).await?;

        if let Some(matcher) = &self.term_matcher {
            matcher.augment(query, &mut fragments).await?;
        }

        info!(fragments = fragments.len(), "retrieval finished");
        Ok(fragments)
    }

    /// Retrieve and pack the fragments into a budgeted prompt.
    pub async fn prompt(&self, query: &str) -> Result<String> {
        let fragments = self.retrieve(query).await?;
        Ok(self.assembler.assemble(query, &fragments))
    }

    /// Full pass: retrieve, assemble, and ask the generator.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let fragments = self.retrieve(query).await?;
        let prompt = self.assembler.assemble(query, &fragments);

        let Some(generator) = &self.generator else {
            return Err(Error::generation("no answer generator configured"));
        };
        let answer = generator
            .complete(&prompt)
            .await
            .map_err(Error::generation)?;

        Ok(Answer {
            question: query.to_string(),
            answer,
            fragments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use similarity_core::store::memory::{InMemoryStore, StaticEmbedder};
    use similarity_core::FragmentId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGenerator {
        fail: bool,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnswerGenerator for RecordingGenerator {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("model overloaded");
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Rp 150.000.000".to_string())
        }
    }

    fn embedder() -> Arc<StaticEmbedder> {
        Arc::new(
            StaticEmbedder::new(2)
                .with("Honda B1207KDZ", vec![0.0, 1.0])
                .with("harga Toyota", vec![1.0, 0.0]),
        )
    }

    fn store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new("lelang");
        store.insert("p-1", "lelang", "plat nomor B1207KDZ", vec![1.0, 0.0]);
        store.insert("p-2", "lelang", "merk Honda", vec![0.0, 1.0]);
        store.insert("p-3", "lelang", "merk Honda Jazz", vec![0.1, 0.9]);
        store.insert("p-4", "lelang", "merk Honda Beat", vec![0.2, 0.8]);
        Arc::new(store)
    }

    fn config(strategy: Option<Strategy>) -> PipelineConfig {
        PipelineConfig {
            strategy,
            scope: "lelang".to_string(),
            ..PipelineConfig::default()
        }
    }

    fn collaborators(generator: Arc<RecordingGenerator>) -> Collaborators {
        let store = store();
        Collaborators {
            embedder: Some(embedder()),
            vector_index: Some(store.clone()),
            relational: Some(store.clone()),
            keyword: Some(store),
            generator: Some(generator),
        }
    }

    #[tokio::test]
    async fn test_unset_strategy_returns_nothing() {
        let pipeline = Pipeline::new(config(None), Collaborators::default()).unwrap();

        assert_eq!(pipeline.strategy(), None);
        assert!(pipeline.retrieve("harga Toyota").await.unwrap().is_empty());
        assert_eq!(pipeline.prompt("harga Toyota").await.unwrap(), "harga Toyota");
    }

    #[tokio::test]
    async fn test_relational_prompt_contains_best_fragment_first() {
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline =
            Pipeline::new(config(Some(Strategy::Relational)), collaborators(generator)).unwrap();

        let prompt = pipeline.prompt("harga Toyota").await.unwrap();

        assert!(prompt.starts_with(DEFAULT_INTRODUCTION));
        assert!(prompt.ends_with("\n\nQuestion: harga Toyota"));
        let first = prompt.find("plat nomor B1207KDZ").unwrap();
        let later = prompt.find("merk Honda Beat").unwrap();
        assert!(first < later);
    }

    #[tokio::test]
    async fn test_vector_with_term_match_appends_unscored_hits() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut cfg = config(Some(Strategy::Vector));
        cfg.enable_term_match = true;
        let pipeline = Pipeline::new(cfg, collaborators(generator)).unwrap();

        let fragments = pipeline.retrieve("Honda B1207KDZ").await.unwrap();

        let ids: Vec<FragmentId> = fragments.iter().map(|f| f.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                FragmentId::from("p-2"),
                FragmentId::from("p-3"),
                FragmentId::from("p-4"),
                FragmentId::from("p-1"),
            ]
        );
        assert!(fragments[..3].iter().all(|f| f.score.is_some()));
        assert!(fragments[3].score.is_none());
    }

    #[tokio::test]
    async fn test_answer_sends_assembled_prompt() {
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = Pipeline::new(
            config(Some(Strategy::Hybrid)),
            collaborators(generator.clone()),
        )
        .unwrap();

        let answer = pipeline.answer("harga Toyota").await.unwrap();

        assert_eq!(answer.question, "harga Toyota");
        assert_eq!(answer.answer, "Rp 150.000.000");
        assert!(!answer.fragments.is_empty());
        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].ends_with("Question: harga Toyota"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported() {
        let generator = Arc::new(RecordingGenerator {
            fail: true,
            ..RecordingGenerator::default()
        });
        let pipeline = Pipeline::new(
            config(Some(Strategy::Relational)),
            collaborators(generator.clone()),
        )
        .unwrap();

        let err = pipeline.answer("harga Toyota").await.unwrap_err();

        assert!(matches!(err, Error::Generation { .. }));
        assert_eq!(err.stage(), "generation");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_failure_stops_before_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = Pipeline::new(
            config(Some(Strategy::Relational)),
            collaborators(generator.clone()),
        )
        .unwrap();

        let err = pipeline.answer("an unknown question").await.unwrap_err();

        assert!(matches!(err, Error::Embedding { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_collaborator_is_rejected() {
        let result = Pipeline::new(
            config(Some(Strategy::Hybrid)),
            Collaborators {
                embedder: Some(embedder()),
                ..Collaborators::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_term_match_requires_vector_strategy() {
        let generator = Arc::new(RecordingGenerator::default());
        let mut cfg = config(Some(Strategy::Relational));
        cfg.enable_term_match = true;
        assert!(Pipeline::new(cfg, collaborators(generator)).is_err());
    }
}
