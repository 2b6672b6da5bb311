//! Store Degradation Tests
//!
//! Purpose: Pin down registry behavior when the backing stores fail:
//! training must surface read errors without poisoning serving slots,
//! and a broken audit log must never fail a serve.
//!
//! Test Coverage:
//! 1. A failing interaction read fails training and leaves the slot empty
//! 2. Any failing feature read fails content training
//! 3. Serving succeeds even when the recommendation log write fails
//!
//! Run: cargo test --test store_failure_test

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use recommender_core::config::EngineConfig;
use recommender_core::error::Result;
use recommender_core::models::{
    ContentItem, Interaction, InteractionKind, LocationRecord, RecommendationLog,
};
use recommender_core::store::{ContentStore, InteractionStore, UserStore};
use recommender_core::{EngineKind, ModelRegistry, RecommendError};

mock! {
    pub Store {}

    #[async_trait]
    impl ContentStore for Store {
        async fn list_items(&self) -> Result<Vec<ContentItem>>;
        async fn text_features(&self) -> Result<HashMap<String, Vec<f32>>>;
        async fn location_features(&self) -> Result<HashMap<String, LocationRecord>>;
    }

    #[async_trait]
    impl InteractionStore for Store {
        async fn list_interactions(&self) -> Result<Vec<Interaction>>;
        async fn log_recommendation(&self, log: RecommendationLog) -> Result<()>;
    }

    #[async_trait]
    impl UserStore for Store {
        async fn all_neighborhood_preferences(&self) -> Result<HashMap<String, Vec<String>>>;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_test_writer()
        .try_init();
}

fn offline(what: &str) -> RecommendError {
    RecommendError::Internal(format!("{} store offline", what))
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

/// Two users with one shared item, enough to link c1 to c3 through c2.
fn small_corpus() -> Vec<Interaction> {
    vec![
        interaction("u1", "c1", InteractionKind::Save, 30),
        interaction("u1", "c2", InteractionKind::View, 20),
        interaction("u2", "c2", InteractionKind::Save, 25),
        interaction("u2", "c3", InteractionKind::Save, 15),
    ]
}

#[tokio::test]
async fn test_failed_interaction_read_fails_training_and_keeps_slot_empty() {
    init_tracing();
    let mut store = MockStore::new();
    store
        .expect_list_interactions()
        .returning(|| Err(offline("interaction")));

    let registry = ModelRegistry::new(Arc::new(store), EngineConfig::default());
    let result = registry.train(EngineKind::Collaborative).await;

    assert!(matches!(result, Err(RecommendError::Internal(_))));
    assert!(!registry.is_trained(EngineKind::Collaborative).await);
}

#[tokio::test]
async fn test_any_failed_feature_read_fails_content_training() {
    init_tracing();
    let mut store = MockStore::new();
    store.expect_list_items().returning(|| Ok(Vec::new()));
    store
        .expect_list_interactions()
        .returning(|| Ok(small_corpus()));
    store
        .expect_text_features()
        .returning(|| Err(offline("feature")));
    store
        .expect_location_features()
        .returning(|| Ok(HashMap::new()));

    let registry = ModelRegistry::new(Arc::new(store), EngineConfig::default());
    let result = registry.train(EngineKind::Content).await;

    assert!(matches!(result, Err(RecommendError::Internal(_))));
    assert!(!registry.is_trained(EngineKind::Content).await);
}

#[tokio::test]
async fn test_failing_audit_log_never_fails_serving() {
    init_tracing();
    let mut store = MockStore::new();
    store
        .expect_list_interactions()
        .returning(|| Ok(small_corpus()));
    store
        .expect_log_recommendation()
        .returning(|_| Err(offline("audit")));

    let registry = ModelRegistry::new(Arc::new(store), EngineConfig::default());
    registry
        .train(EngineKind::Collaborative)
        .await
        .expect("corpus is trainable");

    // u1 has seen c1 and c2; c3 is reachable through the shared item c2
    let recs = registry
        .recommend_for_user(EngineKind::Collaborative, "u1", 5)
        .await
        .expect("a failed log write must not fail the serve");
    assert!(!recs.is_empty());
    assert_eq!(recs[0].content_id, "c3");
}
