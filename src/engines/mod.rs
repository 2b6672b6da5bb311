// ============================================
// Recommendation Engines - Module Root
// ============================================
//
// Three engines share one lifecycle:
// 1. Collaborative Filtering (item/user similarity or latent factors)
// 2. Content Similarity (feature blend + user profiles)
// 3. Hybrid Blending (weighted merge + contextual boosts)
//
// Trainers read the stores and produce immutable trained models; trained
// models are pure in-memory scorers behind the Recommender trait and are
// persisted through the Persistable trait.

pub mod collaborative;
pub mod content;
pub mod hybrid;

use crate::error::Result;
use crate::models::{Approach, EngineKind, Interaction, Recommendation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub use collaborative::{CfMode, CollaborativeFilteringEngine, CollaborativeModel};
pub use content::{ContentModel, ContentSimilarityEngine, UserProfile};
pub use hybrid::{HybridBlender, HybridModel};

/// Shared serving contract for trained models. Implementations are immutable
/// snapshots; scoring never mutates shared state.
pub trait Recommender: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Ranked recommendations for a user. Unknown users degrade to the
    /// model's popularity fallback; never an error.
    fn recommend_for_user(&self, user_id: &str, n: usize) -> Result<Vec<Recommendation>>;

    /// Ranked items similar to the given one. Unknown content yields an
    /// empty list; modes without item similarity surface Unsupported.
    fn recommend_similar(&self, content_id: &str, n: usize) -> Result<Vec<Recommendation>>;
}

/// One-file JSON persistence for trained bundles. Callers treat a missing
/// file as absent; read and parse failures surface as errors.
pub trait Persistable: Serialize + DeserializeOwned {
    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let model = serde_json::from_slice(&data)?;
        Ok(model)
    }
}

/// Count interactions per item and rank count descending, content_id
/// ascending. Every model snapshots this at train time so cold-start
/// fallbacks never consult live stores.
pub fn popularity_ranking(interactions: &[Interaction]) -> Vec<(String, u64)> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for interaction in interactions {
        *counts.entry(interaction.content_id.clone()).or_insert(0) += 1;
    }

    let mut ranking: Vec<(String, u64)> = counts.into_iter().collect();
    ranking.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranking
}

/// Top-n popularity recommendations; scores are raw interaction counts.
pub fn popular_items(ranking: &[(String, u64)], n: usize) -> Vec<Recommendation> {
    ranking
        .iter()
        .take(n)
        .map(|(content_id, count)| {
            Recommendation::new(content_id.clone(), *count as f64, Approach::Popularity)
        })
        .collect()
}
