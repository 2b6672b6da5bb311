//! Recommendation Flow Integration Tests
//!
//! Purpose: Exercise the full lifecycle against an in-memory store:
//! train all three engines, serve personalized / similar / contextual
//! recommendations, persist and reload bundles, evaluate on a holdout.
//!
//! Test Coverage:
//! 1. Registry training populates every engine slot
//! 2. Served recommendations exclude already-seen content
//! 3. Seasonal and neighborhood context shifts hybrid rankings
//! 4. Cold-start users receive the popularity ranking
//! 5. Save/load round-trips serve identical results
//!
//! Run: cargo test --test recommendation_flow_test

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use recommender_core::config::EngineConfig;
use recommender_core::engines::hybrid::seasonal_tags_for;
use recommender_core::engines::{
    CollaborativeFilteringEngine, ContentSimilarityEngine, HybridBlender,
};
use recommender_core::eval::TestRecord;
use recommender_core::models::{
    ContentItem, ContentKind, ContentMetadata, GeoLocation, Interaction, InteractionKind,
    ScoreSource, Season,
};
use recommender_core::store::MemoryStore;
use recommender_core::{Approach, CfMode, EngineKind, ModelRegistry, RecommendError};

/// Route engine logs through the test harness when RUST_LOG asks for them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

fn item(
    id: &str,
    kind: ContentKind,
    tags: Vec<&str>,
    categories: Vec<&str>,
    neighborhood: Option<&str>,
    metadata: ContentMetadata,
) -> ContentItem {
    ContentItem {
        content_id: id.to_string(),
        title: format!("Item {}", id),
        description: format!("Description for {}", id),
        kind,
        categories: categories.into_iter().map(String::from).collect(),
        tags: tags.into_iter().map(String::from).collect(),
        location: neighborhood.map(|name| GeoLocation {
            latitude: 43.65,
            longitude: -79.40,
            neighborhood: Some(name.to_string()),
        }),
        metadata,
    }
}

fn interaction(user: &str, content: &str, kind: InteractionKind, minutes_ago: i64) -> Interaction {
    Interaction {
        user_id: user.to_string(),
        content_id: content.to_string(),
        kind,
        timestamp: Utc::now() - Duration::minutes(minutes_ago),
        session_id: None,
    }
}

fn summer_event_metadata() -> ContentMetadata {
    // a mid-July date derives ["summer", "summer-festival"]
    let mid_july = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    ContentMetadata {
        seasonal_relevance: Some(Season::Summer),
        seasonal_tags: seasonal_tags_for(mid_july),
        popularity_hint: None,
    }
}

/// A small Toronto catalog with two patio twins, a summer festival, a
/// gallery, a brunch spot, and a winter rink.
fn toronto_store() -> MemoryStore {
    let items = vec![
        item(
            "patio-queen",
            ContentKind::Place,
            vec!["summer", "patio"],
            vec!["restaurant"],
            Some("Queen West"),
            ContentMetadata::default(),
        ),
        item(
            "patio-annex",
            ContentKind::Place,
            vec!["summer", "patio"],
            vec!["restaurant"],
            Some("Annex"),
            ContentMetadata::default(),
        ),
        item(
            "brunch-king",
            ContentKind::Place,
            vec!["brunch"],
            vec!["restaurant"],
            Some("King West"),
            ContentMetadata::default(),
        ),
        item(
            "jazz-fest",
            ContentKind::Event,
            vec!["music", "summer"],
            vec!["festival"],
            Some("Downtown"),
            summer_event_metadata(),
        ),
        item(
            "gallery-ossington",
            ContentKind::Place,
            vec!["art"],
            vec!["gallery"],
            Some("Ossington"),
            ContentMetadata::default(),
        ),
        item(
            "skate-harbourfront",
            ContentKind::Place,
            vec!["winter", "skating"],
            vec!["attraction"],
            Some("Harbourfront"),
            ContentMetadata {
                seasonal_relevance: Some(Season::Winter),
                seasonal_tags: Vec::new(),
                popularity_hint: None,
            },
        ),
    ];

    let interactions = vec![
        interaction("alice", "patio-queen", InteractionKind::Save, 90),
        interaction("alice", "brunch-king", InteractionKind::Click, 80),
        interaction("alice", "gallery-ossington", InteractionKind::View, 70),
        interaction("bob", "jazz-fest", InteractionKind::Save, 60),
        interaction("bob", "patio-queen", InteractionKind::View, 50),
        interaction("bob", "brunch-king", InteractionKind::Click, 40),
        interaction("carol", "gallery-ossington", InteractionKind::Save, 30),
        interaction("carol", "jazz-fest", InteractionKind::Click, 20),
        interaction("dave", "patio-annex", InteractionKind::View, 15),
        interaction("dave", "skate-harbourfront", InteractionKind::View, 10),
    ];

    let store = MemoryStore::with_data(items, interactions);
    store.insert_text_features("patio-queen", vec![1.0, 0.0, 0.0]);
    store.insert_text_features("patio-annex", vec![1.0, 0.0, 0.0]);
    store.insert_text_features("brunch-king", vec![0.9, 0.1, 0.0]);
    store.insert_text_features("jazz-fest", vec![0.0, 0.2, 1.0]);
    store.insert_text_features("gallery-ossington", vec![0.0, 1.0, 0.0]);
    store.insert_text_features("skate-harbourfront", vec![0.3, 0.3, 0.3]);
    store
}

#[tokio::test]
async fn test_full_lifecycle_trains_and_serves_every_engine() {
    init_tracing();
    let store = Arc::new(toronto_store());
    let registry = ModelRegistry::new(store.clone(), EngineConfig::default());

    let summaries = registry.train_all().await.expect("training should succeed");
    assert_eq!(summaries.len(), 3);
    for kind in [EngineKind::Collaborative, EngineKind::Content, EngineKind::Hybrid] {
        assert!(registry.is_trained(kind).await, "{} should be trained", kind);
    }

    let alice_seen: HashSet<&str> =
        ["patio-queen", "brunch-king", "gallery-ossington"].into_iter().collect();

    for kind in [EngineKind::Collaborative, EngineKind::Content, EngineKind::Hybrid] {
        let recs = registry
            .recommend_for_user(kind, "alice", 5)
            .await
            .expect("recommend should succeed");
        assert!(!recs.is_empty(), "{} should recommend something", kind);
        for rec in &recs {
            assert!(
                !alice_seen.contains(rec.content_id.as_str()),
                "{} must not resurface seen item {}",
                kind,
                rec.content_id
            );
        }
    }

    let similar = registry
        .recommend_similar(EngineKind::Content, "patio-queen", 5)
        .await
        .expect("similar lookup should succeed");
    assert!(!similar.is_empty());
    assert_eq!(similar[0].content_id, "patio-annex");
    assert_eq!(similar[0].approach, Approach::ContentSimilarity);

    // every served batch above landed in the audit log
    let logs = store.recommendation_logs().await;
    assert_eq!(logs.len(), 3);
}

#[tokio::test]
async fn test_summer_event_outranks_identical_untagged_event() {
    init_tracing();
    // two events with identical interaction patterns and identical
    // features; only one declares summer relevance
    let items = vec![
        item(
            "fest-plain",
            ContentKind::Event,
            vec!["festival"],
            vec!["music"],
            None,
            ContentMetadata::default(),
        ),
        item(
            "fest-summer",
            ContentKind::Event,
            vec!["festival"],
            vec!["music"],
            None,
            summer_event_metadata(),
        ),
        item(
            "s1",
            ContentKind::Post,
            vec!["festival"],
            vec!["music"],
            None,
            ContentMetadata::default(),
        ),
    ];
    let interactions = vec![
        interaction("u1", "s1", InteractionKind::Save, 60),
        interaction("u1", "s1", InteractionKind::View, 50),
        interaction("u2", "s1", InteractionKind::Save, 40),
        interaction("u2", "fest-summer", InteractionKind::Save, 30),
        interaction("u3", "s1", InteractionKind::Save, 20),
        interaction("u3", "fest-plain", InteractionKind::Save, 10),
    ];
    let config = EngineConfig::default();
    let collaborative = CollaborativeFilteringEngine::new(config.collaborative.clone())
        .train(&interactions)
        .expect("collaborative training");
    let content = ContentSimilarityEngine::new(config.content.clone())
        .train(&items, &interactions, &HashMap::new(), &HashMap::new())
        .expect("content training");

    let hybrid = HybridBlender::new(config.hybrid)
        .blend(
            Some(Arc::new(collaborative)),
            Some(Arc::new(content)),
            &items,
            &interactions,
            HashMap::new(),
        )
        .expect("blending");

    let recs = hybrid
        .recommend_for_user_in_season("u1", 10, Season::Summer)
        .unwrap();

    let summer = recs.iter().find(|r| r.content_id == "fest-summer").unwrap();
    let plain = recs.iter().find(|r| r.content_id == "fest-plain").unwrap();

    assert!(summer.score > plain.score);
    // relevance boost 0.2 plus the 0.2 * 1.5 event tag boost
    assert!((summer.score - plain.score - 0.5).abs() < 1e-9);
    assert_eq!(recs[0].content_id, "fest-summer");
}

#[tokio::test]
async fn test_neighborhood_preference_ranks_local_twin_first() {
    init_tracing();
    // identical espresso bars, one in the Annex the user frequents
    let items = vec![
        item(
            "roaster-annex-1",
            ContentKind::Place,
            vec!["coffee"],
            vec!["cafe"],
            Some("Annex"),
            ContentMetadata::default(),
        ),
        item(
            "roaster-annex-2",
            ContentKind::Place,
            vec!["coffee"],
            vec!["cafe"],
            Some("Annex"),
            ContentMetadata::default(),
        ),
        item(
            "espresso-annex",
            ContentKind::Place,
            vec!["coffee", "espresso"],
            vec!["cafe"],
            Some("Annex"),
            ContentMetadata::default(),
        ),
        item(
            "espresso-junction",
            ContentKind::Place,
            vec!["coffee", "espresso"],
            vec!["cafe"],
            Some("Junction"),
            ContentMetadata::default(),
        ),
    ];
    let interactions = vec![
        interaction("local", "roaster-annex-1", InteractionKind::Save, 30),
        interaction("local", "roaster-annex-2", InteractionKind::Save, 20),
    ];

    let config = EngineConfig::default();
    let collaborative = CollaborativeFilteringEngine::new(config.collaborative.clone())
        .train(&interactions)
        .expect("collaborative training");
    let content = ContentSimilarityEngine::new(config.content.clone())
        .train(&items, &interactions, &HashMap::new(), &HashMap::new())
        .expect("content training");

    let hybrid = HybridBlender::new(config.hybrid)
        .blend(
            Some(Arc::new(collaborative)),
            Some(Arc::new(content)),
            &items,
            &interactions,
            HashMap::new(),
        )
        .expect("blending");

    let recs = hybrid
        .recommend_for_user_in_season("local", 10, Season::Winter)
        .unwrap();

    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].content_id, "espresso-annex");
    assert_eq!(recs[1].content_id, "espresso-junction");

    // both twins score cos = 2/sqrt(6) in the category space; the Annex
    // one adds neighborhood affinity in the content arm and the hybrid
    // neighborhood boost on top
    let cosine_term = 2.0 / 6.0_f64.sqrt() * 0.2;
    let junction_expected = cosine_term * 0.4;
    let annex_expected = (cosine_term + 0.3) * 0.4 + 0.3;
    assert!((recs[1].score - junction_expected).abs() < 1e-9);
    assert!((recs[0].score - annex_expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_cold_start_user_receives_popularity_ranking() {
    init_tracing();
    let items = vec![
        item("m1", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("m2", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("m3", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("m4", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
    ];
    let interactions = vec![
        interaction("u1", "m1", InteractionKind::Save, 60),
        interaction("u1", "m2", InteractionKind::View, 50),
        interaction("u2", "m2", InteractionKind::Save, 40),
        interaction("u2", "m1", InteractionKind::Click, 30),
        interaction("u3", "m2", InteractionKind::Share, 20),
        interaction("u3", "m3", InteractionKind::View, 10),
    ];
    let store = Arc::new(MemoryStore::with_data(items, interactions));
    let registry = ModelRegistry::new(store, EngineConfig::default());
    registry.train_all().await.unwrap();

    let recs = registry
        .recommend_for_user(EngineKind::Hybrid, "stranger", 10)
        .await
        .unwrap();

    // m2 was touched three times, m1 twice, m3 once; m4 never
    let ids: Vec<&str> = recs.iter().map(|r| r.content_id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m1", "m3"]);
    for rec in &recs {
        assert_eq!(
            rec.sources,
            vec![ScoreSource::Collaborative, ScoreSource::Content]
        );
    }
}

#[tokio::test]
async fn test_contextual_query_filters_by_season_and_neighborhood() {
    init_tracing();
    let store = Arc::new(toronto_store());
    let registry = ModelRegistry::new(store, EngineConfig::default());
    registry.train_all().await.unwrap();

    let recs = registry
        .recommend_contextual(None, Some("Queen West"), Some(Season::Summer), 10)
        .await
        .unwrap();

    // only the Queen West patio carries a summer tag in that neighborhood
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].content_id, "patio-queen");
    assert_eq!(recs[0].approach, Approach::Contextual);
    // base 1.0 + season tag 0.3 + neighborhood match 0.5
    assert!((recs[0].score - 1.8).abs() < 1e-9);

    let winter = registry
        .recommend_contextual(None, None, Some(Season::Winter), 10)
        .await
        .unwrap();
    let winter_ids: Vec<&str> = winter.iter().map(|r| r.content_id.as_str()).collect();
    assert_eq!(winter_ids, vec!["skate-harbourfront"]);
}

#[tokio::test]
async fn test_save_load_roundtrip_preserves_contextual_results() -> anyhow::Result<()> {
    init_tracing();
    let dir = std::env::temp_dir().join(format!("recommender-flow-{}", uuid::Uuid::new_v4()));

    let store = Arc::new(toronto_store());
    let registry = ModelRegistry::new(store.clone(), EngineConfig::default());
    registry.train_all().await?;

    let before = registry
        .recommend_contextual(None, Some("Queen West"), Some(Season::Summer), 10)
        .await?;
    registry.save(&dir).await?;

    let restored = ModelRegistry::new(store, EngineConfig::default());
    restored.load(&dir).await?;
    let after = restored
        .recommend_contextual(None, Some("Queen West"), Some(Season::Summer), 10)
        .await?;

    assert_eq!(before.len(), after.len());
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.content_id, b.content_id);
        assert!((a.score - b.score).abs() < 1e-12);
        assert_eq!(a.approach, b.approach);
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[tokio::test]
async fn test_matrix_mode_trains_and_serves_through_registry() {
    init_tracing();
    let mut config = EngineConfig::default();
    config.collaborative.mode = CfMode::Matrix;
    config.collaborative.n_factors = 2;

    // both users rank ma above mb above their third item, so the two
    // share latent structure and ma/mb end up close in factor space
    let items = vec![
        item("ma", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("mb", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("mc", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
        item("md", ContentKind::Post, vec![], vec!["misc"], None, ContentMetadata::default()),
    ];
    let interactions = vec![
        interaction("u1", "ma", InteractionKind::Share, 60),
        interaction("u1", "mb", InteractionKind::Save, 50),
        interaction("u1", "mc", InteractionKind::View, 40),
        interaction("u2", "ma", InteractionKind::Save, 30),
        interaction("u2", "mb", InteractionKind::Click, 20),
        interaction("u2", "md", InteractionKind::View, 10),
    ];
    let store = Arc::new(MemoryStore::with_data(items, interactions));

    let registry = ModelRegistry::new(store, config);
    registry.train(EngineKind::Collaborative).await.unwrap();

    let recs = registry
        .recommend_for_user(EngineKind::Collaborative, "u1", 5)
        .await
        .unwrap();
    assert!(!recs.is_empty());
    assert!(recs.iter().all(|r| r.approach == Approach::MatrixFactorization));
    // md is the only item u1 has not touched
    assert_eq!(recs[0].content_id, "md");

    let similar = registry
        .recommend_similar(EngineKind::Collaborative, "ma", 5)
        .await
        .unwrap();
    assert!(!similar.is_empty());
    assert!(similar.iter().all(|r| r.approach == Approach::LatentSimilarity));
    assert!(similar.iter().any(|r| r.content_id == "mb"));
}

#[tokio::test]
async fn test_user_mode_similar_items_surface_unsupported() {
    init_tracing();
    let mut config = EngineConfig::default();
    config.collaborative.mode = CfMode::User;

    let store = Arc::new(toronto_store());
    let registry = ModelRegistry::new(store, config);
    registry.train(EngineKind::Collaborative).await.unwrap();

    let result = registry
        .recommend_similar(EngineKind::Collaborative, "patio-queen", 5)
        .await;
    assert!(matches!(result, Err(RecommendError::Unsupported(_))));
}

#[tokio::test]
async fn test_holdout_evaluation_reports_bounded_metrics() {
    init_tracing();
    let store = Arc::new(toronto_store());
    let mut config = EngineConfig::default();
    config.evaluation.seed = Some(42);
    let registry = ModelRegistry::new(store, config);

    let report = registry.evaluate(EngineKind::Hybrid).await.unwrap();

    assert!(report.num_test_users > 0);
    assert!((0.0..=1.0).contains(&report.hit_rate));
    assert!((0.0..=1.0).contains(&report.mean_reciprocal_rank));
    assert!(report.mean_reciprocal_rank <= report.hit_rate + 1e-9);
}

#[tokio::test]
async fn test_supplied_test_set_scores_live_models() {
    init_tracing();
    let store = Arc::new(toronto_store());
    let registry = ModelRegistry::new(store, EngineConfig::default());
    registry.train_all().await.unwrap();

    // alice never touched the Annex patio; the patio twins co-occur
    // through bob so it is reachable from her history
    let records = vec![TestRecord::new("alice", "patio-annex")];
    let report = registry
        .evaluate_with(EngineKind::Hybrid, &records)
        .await
        .unwrap();

    assert_eq!(report.num_test_users, 1);
    assert_eq!(report.hit_rate, 1.0);
    assert!(report.mean_reciprocal_rank > 0.0);
}
