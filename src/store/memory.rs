use crate::error::Result;
use crate::models::{ContentItem, Interaction, LocationRecord, RecommendationLog};
use crate::store::{ContentStore, InteractionStore, UserStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory store backing all three store traits. Catalog and feature maps
/// use DashMap; the append-only interaction and audit logs keep insertion
/// order behind an async RwLock.
#[derive(Default)]
pub struct MemoryStore {
    items: DashMap<String, ContentItem>,
    interactions: RwLock<Vec<Interaction>>,
    text_features: DashMap<String, Vec<f32>>,
    location_features: DashMap<String, LocationRecord>,
    neighborhood_preferences: DashMap<String, Vec<String>>,
    recommendation_logs: RwLock<Vec<RecommendationLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store in one call, keeping the interaction order as given.
    pub fn with_data(items: Vec<ContentItem>, interactions: Vec<Interaction>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert_item(item);
        }
        Self {
            interactions: RwLock::new(interactions),
            ..store
        }
    }

    pub fn insert_item(&self, item: ContentItem) {
        self.items.insert(item.content_id.clone(), item);
    }

    pub async fn add_interaction(&self, interaction: Interaction) {
        self.interactions.write().await.push(interaction);
    }

    pub fn insert_text_features(&self, content_id: impl Into<String>, features: Vec<f32>) {
        self.text_features.insert(content_id.into(), features);
    }

    pub fn insert_location_record(&self, content_id: impl Into<String>, record: LocationRecord) {
        self.location_features.insert(content_id.into(), record);
    }

    pub fn set_neighborhood_preferences(
        &self,
        user_id: impl Into<String>,
        neighborhoods: Vec<String>,
    ) {
        self.neighborhood_preferences
            .insert(user_id.into(), neighborhoods);
    }

    /// Snapshot of the audit log, for inspection in tests.
    pub async fn recommendation_logs(&self) -> Vec<RecommendationLog> {
        self.recommendation_logs.read().await.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_items(&self) -> Result<Vec<ContentItem>> {
        Ok(self.items.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn text_features(&self) -> Result<HashMap<String, Vec<f32>>> {
        Ok(self
            .text_features
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn location_features(&self) -> Result<HashMap<String, LocationRecord>> {
        Ok(self
            .location_features
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn list_interactions(&self) -> Result<Vec<Interaction>> {
        Ok(self.interactions.read().await.clone())
    }

    async fn log_recommendation(&self, log: RecommendationLog) -> Result<()> {
        self.recommendation_logs.write().await.push(log);
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn all_neighborhood_preferences(&self) -> Result<HashMap<String, Vec<String>>> {
        Ok(self
            .neighborhood_preferences
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Approach, ContentKind, InteractionKind};
    use chrono::Utc;

    fn create_test_item(id: &str) -> ContentItem {
        ContentItem {
            content_id: id.to_string(),
            title: format!("Item {}", id),
            description: String::new(),
            kind: ContentKind::Post,
            categories: vec![],
            tags: vec![],
            location: None,
            metadata: Default::default(),
        }
    }

    fn create_test_interaction(user: &str, content: &str, kind: InteractionKind) -> Interaction {
        Interaction {
            user_id: user.to_string(),
            content_id: content.to_string(),
            kind,
            timestamp: Utc::now(),
            session_id: None,
        }
    }

    #[tokio::test]
    async fn test_interaction_order_preserved() {
        let store = MemoryStore::new();
        store
            .add_interaction(create_test_interaction("u1", "c1", InteractionKind::View))
            .await;
        store
            .add_interaction(create_test_interaction("u1", "c2", InteractionKind::Save))
            .await;
        store
            .add_interaction(create_test_interaction("u2", "c1", InteractionKind::Click))
            .await;

        let all = store.list_interactions().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content_id, "c1");
        assert_eq!(all[1].content_id, "c2");
    }

    #[tokio::test]
    async fn test_seeded_items_are_listed() {
        let store = MemoryStore::with_data(vec![create_test_item("c1")], vec![]);

        let items = store.list_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content_id, "c1");
    }

    #[tokio::test]
    async fn test_recommendation_log_appends() {
        let store = MemoryStore::new();
        store
            .log_recommendation(RecommendationLog::new(
                "u1",
                vec!["c1".to_string()],
                Approach::Hybrid,
            ))
            .await
            .unwrap();

        let logs = store.recommendation_logs().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].user_id, "u1");
        assert_eq!(logs[0].source, Approach::Hybrid);
    }

    #[tokio::test]
    async fn test_neighborhood_preferences() {
        let store = MemoryStore::new();
        store.set_neighborhood_preferences("u1", vec!["Kensington Market".to_string()]);

        let prefs = store.all_neighborhood_preferences().await.unwrap();
        assert_eq!(
            prefs.get("u1"),
            Some(&vec!["Kensington Market".to_string()])
        );
        assert!(!prefs.contains_key("u2"));
    }
}
