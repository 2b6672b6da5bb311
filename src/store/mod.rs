// ============================================
// Store Traits
// ============================================
//
// The engines consume interaction, catalog, and user records through these
// seams. Production deployments back them with real databases; MemoryStore
// serves tests and embedded use.

mod memory;

use crate::error::Result;
use crate::models::{ContentItem, Interaction, LocationRecord, RecommendationLog};
use async_trait::async_trait;
use std::collections::HashMap;

pub use memory::MemoryStore;

/// Catalog access: content items plus optional precomputed feature vectors.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_items(&self) -> Result<Vec<ContentItem>>;

    /// Precomputed text feature vectors keyed by content_id. May be empty.
    async fn text_features(&self) -> Result<HashMap<String, Vec<f32>>>;

    /// Precomputed location records keyed by content_id. May be empty; the
    /// content engine derives records from raw item coordinates then.
    async fn location_features(&self) -> Result<HashMap<String, LocationRecord>>;
}

/// Interaction history plus the served-recommendation audit log.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn list_interactions(&self) -> Result<Vec<Interaction>>;

    async fn log_recommendation(&self, log: RecommendationLog) -> Result<()>;
}

/// Explicit per-user preference records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn all_neighborhood_preferences(&self) -> Result<HashMap<String, Vec<String>>>;
}
