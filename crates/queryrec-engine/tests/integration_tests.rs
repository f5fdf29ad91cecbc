//! End-to-end recommendation sessions over the Spider fixture corpus

use pretty_assertions::assert_eq;
use queryrec_core::{
    AggOp, AggregateHints, BinaryRelevanceMatrix, ContextDict, RecommendError, RecommendParams,
    RecommenderConfig, Thresholds,
};
use queryrec_corpus::SchemaCorpus;
use queryrec_engine::{ComboMiner, HashedNgramEmbedder, QueryRecommender, TextEmbedder, TopicMatcher};
use queryrec_sql::SqlParserExtractor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const TOPIC: &str = "employee hire evaluation";

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn targets() -> Vec<String> {
    cols(&[
        "shop: name",
        "shop: location",
        "shop: district",
        "employee: name",
        "employee: city",
    ])
}

fn config(thresholds: Thresholds) -> RecommenderConfig {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/spider-mini");
    let mut config = RecommenderConfig::default();
    config.corpus.schema_path = root.join("tables.json");
    config.corpus.query_path = root.join("train.json");
    config.thresholds = thresholds;
    config
}

/// Cells only turn on for exact label matches
fn exact_thresholds() -> Thresholds {
    Thresholds {
        item_sim: 0.95,
        groupby: 0.9,
        agg: 0.9,
        ..Thresholds::default()
    }
}

fn recommender(thresholds: Thresholds) -> QueryRecommender {
    QueryRecommender::from_config(config(thresholds)).unwrap()
}

#[test]
fn topic_finds_database_by_its_own_name() {
    let rec = recommender(Thresholds::default());
    let matcher = TopicMatcher::new(rec.corpus(), rec.similarity());

    let matches = matcher.match_databases(TOPIC, 0.4).unwrap();
    assert!(matches.iter().any(|m| m.db_id == "employee_hire_evaluation"));
    assert!(matches.iter().all(|m| m.db_id != "pets_1"));
}

#[test]
fn relevance_matrix_from_topic() {
    let rec = recommender(exact_thresholds());
    let matrix = rec.search(TOPIC, &targets()).unwrap();

    assert_eq!(matrix.n_rows(), 14);
    assert_eq!(matrix.databases(), &cols(&["employee_hire_evaluation"])[..]);
    // 3, 3, 3, 2, 2 on-cells; ties keep target order
    assert_eq!(
        matrix.columns(),
        &cols(&["shop: name", "shop: district", "employee: name", "shop: location", "employee: city"])[..]
    );
}

#[test]
fn initial_recommendation_mines_maximal_groups() {
    let rec = recommender(exact_thresholds());
    let params = RecommendParams::default().with_min_support(0.05);

    let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

    assert_eq!(
        first.result.select,
        vec![
            cols(&["shop: name", "shop: district", "shop: location"]),
            cols(&["employee: name"]),
            cols(&["employee: city"]),
        ]
    );
    assert_eq!(first.result.groupby.len(), 3);
    assert_eq!(first.result.agg.len(), 3);

    // Only the city queries group, and they group by city
    assert!(first.result.groupby[0].is_empty());
    assert!(first.result.groupby[1].is_empty());
    assert_eq!(first.result.groupby[2], cols(&["employee: city"]));
    assert!(first.result.agg.iter().all(AggregateHints::is_empty));

    let supports = QueryRecommender::supports(&first.matrix, &first.result);
    assert!((supports[1] - 3.0 / 14.0).abs() < 1e-6);
}

#[test]
fn initial_recommendation_pads_to_top_n() {
    let rec = recommender(exact_thresholds());

    // Nothing reaches 25% support, so every group is a padded singleton
    let params = RecommendParams::default().with_min_support(0.25);
    let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();
    assert_eq!(
        first.result.select,
        vec![cols(&["shop: name"]), cols(&["shop: district"]), cols(&["employee: name"])]
    );

    // Fewer columns than top_n
    let first = rec
        .initial_recommendation(TOPIC, &cols(&["shop: location", "employee: city"]), &params)
        .unwrap();
    assert_eq!(first.result.len(), 2);
}

#[test]
fn refinement_never_resuggests_history() {
    for thresholds in [Thresholds::default(), exact_thresholds()] {
        let rec = recommender(thresholds);
        let params = RecommendParams::default().with_min_support(0.05);
        let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

        let mut context = ContextDict::new();
        context.push_selection(cols(&["shop: name"]));
        let second = rec.next_recommendation(&first.matrix, &context, &params).unwrap();
        assert!(!second.is_empty());
        assert!(second.select.iter().flatten().all(|c| c != "shop: name"));

        context.push_selection(cols(&["shop: name", "shop: district"]));
        let third = rec.next_recommendation(&first.matrix, &context, &params).unwrap();
        for column in third.select.iter().flatten() {
            assert_ne!(column, "shop: name");
            assert_ne!(column, "shop: district");
        }
        assert_eq!(third.select.len(), third.groupby.len());
        assert_eq!(third.select.len(), third.agg.len());
    }
}

#[test]
fn session_hints_flow_into_suggestions() {
    let rec = recommender(exact_thresholds());
    let params = RecommendParams::default().with_min_support(0.05);
    let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

    let mut context = ContextDict::new();
    context.push_selection(cols(&["shop: name"]));
    context.groupby.push(cols(&["shop: manager name"]));
    context.agg.push(AggregateHints::from([(AggOp::Count, cols(&["employee: city"]))]));

    // Rank every remaining column so "employee: city" is offered
    let next = rec
        .next_recommendation(&first.matrix, &context, &params.with_top_n(4))
        .unwrap();
    assert!(next.select.contains(&cols(&["employee: city"])));
    for ((select, groupby), agg) in next.select.iter().zip(&next.groupby).zip(&next.agg) {
        let matched = !first.matrix.rows_matching_all(select).is_empty();
        if matched {
            assert!(groupby.contains(&"shop: manager name".to_string()));
        }
        if matched && select.contains(&"employee: city".to_string()) {
            assert!(agg[&AggOp::Count].contains(&"employee: city".to_string()));
        }
    }
}

#[test]
fn empty_history_context_runs_first_round() {
    let rec = recommender(exact_thresholds());
    let params = RecommendParams::default().with_min_support(0.05);
    let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

    let again = rec
        .next_recommendation(&first.matrix, &ContextDict::new(), &params)
        .unwrap();
    assert_eq!(again, first.result);
}

#[test]
fn unknown_topic_is_no_match() {
    let rec = recommender(Thresholds::default());
    let err = rec
        .initial_recommendation("zzqx", &targets(), &RecommendParams::default())
        .unwrap_err();
    assert!(err.is_no_match());
}

#[test]
fn error_taxonomy() {
    let rec = recommender(Thresholds::default());

    let err = rec
        .initial_recommendation(TOPIC, &[], &RecommendParams::default())
        .unwrap_err();
    assert!(matches!(err, RecommendError::EmptyInput(_)));

    let empty = rec.search("zzqx", &targets()).unwrap();
    let err = rec
        .next_recommendation(&empty, &ContextDict::new(), &RecommendParams::default())
        .unwrap_err();
    assert!(matches!(err, RecommendError::InsufficientData(_)));

    let err = ComboMiner::new(0.0).unwrap_err();
    assert!(matches!(err, RecommendError::Configuration(_)));

    let mut bad = config(Thresholds::default());
    bad.thresholds.alpha = 1.5;
    assert!(QueryRecommender::from_config(bad).is_err());
}

#[test]
fn groupby_hints_apply_from_the_first_round() {
    let rec = recommender(exact_thresholds());
    let params = RecommendParams::default().with_min_support(0.05);

    let mut hints = ContextDict::new();
    hints.groupby.push(cols(&["shop: manager name"]));

    let first = rec
        .initial_recommendation_with_hints(TOPIC, &targets(), &hints, &params)
        .unwrap();
    let plain = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

    assert_eq!(first.result.select, plain.result.select);
    for groupby in &first.result.groupby {
        assert!(groupby.contains(&"shop: manager name".to_string()));
    }
}

#[test]
fn matrix_survives_a_json_round_trip_between_rounds() {
    let rec = recommender(exact_thresholds());
    let params = RecommendParams::default().with_min_support(0.05);
    let first = rec.initial_recommendation(TOPIC, &targets(), &params).unwrap();

    let json = serde_json::to_string(&first.matrix).unwrap();
    let held: BinaryRelevanceMatrix = serde_json::from_str(&json).unwrap();

    let mut context = ContextDict::new();
    context.push_selection(cols(&["shop: name"]));
    assert_eq!(
        rec.next_recommendation(&held, &context, &params).unwrap(),
        rec.next_recommendation(&first.matrix, &context, &params).unwrap()
    );

    // A ragged payload never reaches the engine
    let ragged = r#"{"columns":["shop: name","shop: district"],"rows":[[true]],"row_sources":[0]}"#;
    assert!(serde_json::from_str::<BinaryRelevanceMatrix>(ragged).is_err());
}

/// Counts how often the full list of database names is embedded
struct CountingEmbedder {
    inner: HashedNgramEmbedder,
    names: Vec<String>,
    name_batches: AtomicUsize,
}

impl TextEmbedder for CountingEmbedder {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        if texts == self.names.as_slice() {
            self.name_batches.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.embed(texts)
    }
}

#[test]
fn search_with_matches_embeds_database_names_once() {
    let config = config(exact_thresholds());
    let corpus = SchemaCorpus::load(&config.corpus_paths(), &SqlParserExtractor::new(config.dialect)).unwrap();
    let embedder = Arc::new(CountingEmbedder {
        inner: HashedNgramEmbedder::default(),
        names: corpus.normalized_names().to_vec(),
        name_batches: AtomicUsize::new(0),
    });
    let rec = QueryRecommender::new(config, Arc::new(corpus), embedder.clone()).unwrap();

    let (matches, matrix) = rec.search_with_matches(TOPIC, &targets()).unwrap();

    assert_eq!(embedder.name_batches.load(Ordering::SeqCst), 1);
    assert!(matches.iter().any(|m| m.db_id == "employee_hire_evaluation"));
    assert_eq!(matrix, rec.search(TOPIC, &targets()).unwrap());
}
