//! Recommendation entry points
//!
//! `QueryRecommender` owns the read-only pieces (configuration, corpus,
//! embedding model) and is stateless between calls. The session lives with
//! the caller: the matrix from `initial_recommendation` and a growing
//! `ContextDict` are passed back into `next_recommendation` each round.

use crate::embedder::{HashedNgramEmbedder, TextEmbedder};
use crate::miner::{column_support, ComboMiner};
use crate::options::{OptionContexts, OptionRecommender};
use crate::ranker::ContextRanker;
use crate::similarity::SimilarityEngine;
use crate::topic::{DatabaseMatch, TopicMatcher};
use queryrec_core::{
    AggOp, AggregateHints, BinaryRelevanceMatrix, ContextDict, FrequentCombo, RecommendError,
    RecommendParams, RecommenderConfig, Result, SuggestionResult,
};
use queryrec_corpus::{CorpusError, SchemaCorpus};
use queryrec_sql::SqlParserExtractor;
use std::sync::Arc;

/// Failure to assemble a recommender from configuration
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Recommend(#[from] RecommendError),
}

/// Result of the first round of a session
#[derive(Debug, Clone)]
pub struct Recommendation {
    /// Matrix to pass into every `next_recommendation` call of the session
    pub matrix: BinaryRelevanceMatrix,

    /// Suggestions for the first SELECT
    pub result: SuggestionResult,
}

/// Suggests the next SELECT columns, GROUP BY and aggregates
#[derive(Debug, Clone)]
pub struct QueryRecommender {
    config: RecommenderConfig,
    corpus: Arc<SchemaCorpus>,
    similarity: SimilarityEngine,
}

impl QueryRecommender {
    /// Assemble from an already-loaded corpus and embedding model
    pub fn new(
        config: RecommenderConfig,
        corpus: Arc<SchemaCorpus>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            corpus,
            similarity: SimilarityEngine::new(embedder),
        })
    }

    /// Load the corpus named by `config` and use the built-in embedder
    pub fn from_config(config: RecommenderConfig) -> std::result::Result<Self, BuildError> {
        config.validate()?;

        let extractor = SqlParserExtractor::new(config.dialect);
        let corpus = SchemaCorpus::load(&config.corpus_paths(), &extractor)?;
        let embedder = HashedNgramEmbedder::from_config(&config.embedding);

        Ok(Self::new(config, Arc::new(corpus), Arc::new(embedder))?)
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn corpus(&self) -> &SchemaCorpus {
        &self.corpus
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    /// Topic search with the configured thresholds
    pub fn search(&self, topic: &str, target_columns: &[String]) -> Result<BinaryRelevanceMatrix> {
        let thresholds = &self.config.thresholds;
        TopicMatcher::new(&self.corpus, &self.similarity).search_sim_dbs(
            topic,
            target_columns,
            thresholds.topic_sim,
            thresholds.item_sim,
        )
    }

    /// Topic search that also returns the matched databases
    ///
    /// Database names are embedded once; the matrix is built from the same
    /// matches.
    pub fn search_with_matches(
        &self,
        topic: &str,
        target_columns: &[String],
    ) -> Result<(Vec<DatabaseMatch>, BinaryRelevanceMatrix)> {
        let thresholds = &self.config.thresholds;
        let matcher = TopicMatcher::new(&self.corpus, &self.similarity);
        let matches = matcher.match_databases(topic, thresholds.topic_sim)?;
        let matrix = matcher.relevance_matrix(&matches, target_columns, thresholds.item_sim)?;
        Ok((matches, matrix))
    }

    /// First round: search the corpus for the topic and mine the initial
    /// column groups
    ///
    /// Fails with `NoMatch` when no reference query is relevant to the topic.
    pub fn initial_recommendation(
        &self,
        topic: &str,
        target_columns: &[String],
        params: &RecommendParams,
    ) -> Result<Recommendation> {
        self.initial_recommendation_with_hints(topic, target_columns, &ContextDict::default(), params)
    }

    /// First round that already applies session GROUP BY and aggregate hints
    ///
    /// The selection history of `hints` plays no part here; the whole matrix
    /// is mined.
    pub fn initial_recommendation_with_hints(
        &self,
        topic: &str,
        target_columns: &[String],
        hints: &ContextDict,
        params: &RecommendParams,
    ) -> Result<Recommendation> {
        params.validate()?;

        let matrix = self.search(topic, target_columns)?;
        if matrix.is_empty() {
            return Err(RecommendError::NoMatch {
                topic: topic.to_string(),
            });
        }

        let result = self.first_round(&matrix, hints, params)?;
        Ok(Recommendation { matrix, result })
    }

    /// Later rounds: re-rank against the selection history and mine again
    ///
    /// A context without any selection runs the first-round mining on
    /// `matrix` instead.
    pub fn next_recommendation(
        &self,
        matrix: &BinaryRelevanceMatrix,
        context: &ContextDict,
        params: &RecommendParams,
    ) -> Result<SuggestionResult> {
        params.validate()?;

        if matrix.is_empty() {
            return Err(RecommendError::InsufficientData(
                "relevance matrix has zero rows".to_string(),
            ));
        }

        if context.is_initial() {
            return self.first_round(matrix, context, params);
        }
        self.refine(matrix, context, params)
    }

    fn first_round(
        &self,
        matrix: &BinaryRelevanceMatrix,
        context: &ContextDict,
        params: &RecommendParams,
    ) -> Result<SuggestionResult> {
        let support = params.min_support.unwrap_or(self.config.thresholds.item_sim);
        let miner = ComboMiner::new(support)?;

        let combos = miner.mine(matrix, &[])?;
        let combos = miner.pad_with_singletons(matrix, combos, params.top_n);
        let select: Vec<Vec<String>> = combos.into_iter().map(|c| c.items).collect();

        tracing::info!(
            rows = matrix.n_rows(),
            support,
            combos = select.len(),
            "initial recommendation"
        );

        self.annotate(matrix, select, context)
    }

    fn refine(
        &self,
        matrix: &BinaryRelevanceMatrix,
        context: &ContextDict,
        params: &RecommendParams,
    ) -> Result<SuggestionResult> {
        let ranker = ContextRanker::new(&self.similarity, &self.config.thresholds);
        let narrowing = ranker.rank_and_narrow(matrix, &context.select, params.top_n)?;

        let history = context.history_columns();
        let miner = ComboMiner::new(narrowing.min_support)?;
        let combos = miner.mine(&narrowing.matrix, &history)?;

        let mut select = strip_history(combos, &history);
        if select.len() < params.top_n {
            for ranked in &narrowing.ranked {
                if !select.iter().flatten().any(|c| c == &ranked.column) {
                    select.push(vec![ranked.column.clone()]);
                }
            }
        }

        tracing::info!(
            steps = context.select.len(),
            support = narrowing.min_support,
            ranked = narrowing.ranked.len(),
            combos = select.len(),
            "refined recommendation"
        );

        self.annotate(matrix, select, context)
    }

    fn annotate(
        &self,
        matrix: &BinaryRelevanceMatrix,
        select: Vec<Vec<String>>,
        context: &ContextDict,
    ) -> Result<SuggestionResult> {
        let contexts = OptionContexts {
            groupby: context.groupby_columns(),
            agg: pooled_agg_hints(context),
        };

        let recommender = OptionRecommender::new(&self.corpus, &self.similarity, &self.config.thresholds);
        let (groupby, agg) = recommender.suggest_options(matrix, &select, &contexts)?;

        let mut result = SuggestionResult::default();
        for ((columns, groupby), agg) in select.into_iter().zip(groupby).zip(agg) {
            result.push(columns, groupby, agg);
        }
        Ok(result)
    }

    /// Support of each suggested group on `matrix`, for display
    pub fn supports(matrix: &BinaryRelevanceMatrix, result: &SuggestionResult) -> Vec<f32> {
        result
            .select
            .iter()
            .map(|group| match group.as_slice() {
                [single] => column_support(matrix, single),
                _ if matrix.is_empty() => 0.0,
                _ => matrix.rows_matching_all(group).len() as f32 / matrix.n_rows() as f32,
            })
            .collect()
    }
}

/// Remove history columns from each combo, dropping combos left empty and
/// repeats
fn strip_history(combos: Vec<FrequentCombo>, history: &[String]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::new();
    for combo in combos {
        let items: Vec<String> = combo
            .items
            .into_iter()
            .filter(|c| !history.contains(c))
            .collect();
        if !items.is_empty() && !out.contains(&items) {
            out.push(items);
        }
    }
    out
}

fn pooled_agg_hints(context: &ContextDict) -> AggregateHints {
    AggOp::ALL
        .iter()
        .map(|&op| (op, context.agg_operands(op)))
        .filter(|(_, operands)| !operands.is_empty())
        .collect()
}
