// ============================================
// Content Similarity Engine
// ============================================
//
// Scores items by what they are rather than who touched them: text
// vectors, category one-hots, and location proximity blend into one
// similarity structure, and per-user taste profiles rank unseen items
// against it. Serving degrades profile -> recent-item propagation ->
// popularity, so a response always comes back.

mod features;
mod profile;

pub use features::{
    blended_similarity_rows, build_feature_set, profile_space_vectors, FeatureSet, ProfileSpace,
};
pub use profile::UserProfile;

use crate::config::ContentConfig;
use crate::engines::{popularity_ranking, Persistable, Recommender};
use crate::error::{RecommendError, Result};
use crate::models::{
    Approach, ContentItem, EngineKind, Interaction, LocationRecord, Recommendation,
};
use crate::utils::{cosine_similarity_f32, take_top};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Training parameters frozen into the model for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentParams {
    pub text_weight: f64,
    pub category_weight: f64,
    pub location_weight: f64,
    pub max_neighbors: usize,
    pub recent_items: usize,
}

impl From<&ContentConfig> for ContentParams {
    fn from(config: &ContentConfig) -> Self {
        Self {
            text_weight: config.text_weight,
            category_weight: config.category_weight,
            location_weight: config.location_weight,
            max_neighbors: config.max_neighbors,
            recent_items: config.recent_items,
        }
    }
}

/// Immutable trained content model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentModel {
    pub profile_space: Option<ProfileSpace>,
    /// Per-item vectors in the profile space; empty when no space exists.
    pub item_vectors: HashMap<String, Vec<f32>>,
    /// Neighborhood per item, for items that have one.
    pub item_neighborhoods: HashMap<String, String>,
    /// Blended similarity rows, strongest neighbors first.
    pub similarity: HashMap<String, Vec<(String, f64)>>,
    pub profiles: HashMap<String, UserProfile>,
    /// Every item a user interacted with, for exclusion.
    pub user_seen: HashMap<String, Vec<String>>,
    /// Most recent interactions first, capped, repeats kept.
    pub user_recent: HashMap<String, Vec<String>>,
    pub popularity: Vec<(String, u64)>,
    pub params: ContentParams,
    pub trained_at: DateTime<Utc>,
}

impl Persistable for ContentModel {}

pub struct ContentSimilarityEngine {
    config: ContentConfig,
}

impl ContentSimilarityEngine {
    pub fn new(config: ContentConfig) -> Self {
        Self { config }
    }

    pub fn train(
        &self,
        items: &[ContentItem],
        interactions: &[Interaction],
        text_features: &HashMap<String, Vec<f32>>,
        location_records: &HashMap<String, LocationRecord>,
    ) -> Result<ContentModel> {
        if items.is_empty() {
            return Err(RecommendError::EmptyCorpus(
                "no content items to index".to_string(),
            ));
        }

        info!(
            items = items.len(),
            interactions = interactions.len(),
            "Training content similarity model"
        );

        let features = build_feature_set(items, text_features, location_records, &self.config);
        let similarity = blended_similarity_rows(&features, &self.config);
        let (profile_space, item_vectors) = profile_space_vectors(&features);
        let profiles = profile::build_profiles(
            interactions,
            &item_vectors,
            profile_space,
            &features.locations,
        );

        let item_neighborhoods: HashMap<String, String> = features
            .locations
            .iter()
            .filter_map(|(id, record)| {
                record
                    .neighborhood
                    .as_ref()
                    .map(|hood| (id.clone(), hood.clone()))
            })
            .collect();

        let model = ContentModel {
            profile_space,
            item_vectors,
            item_neighborhoods,
            similarity,
            profiles,
            user_seen: seen_by_user(interactions),
            user_recent: recent_by_user(interactions, self.config.recent_items),
            popularity: popularity_ranking(interactions),
            params: ContentParams::from(&self.config),
            trained_at: Utc::now(),
        };
        info!(
            items = model.similarity.len(),
            profiles = model.profiles.len(),
            "Content similarity model trained"
        );
        Ok(model)
    }
}

impl ContentModel {
    fn popularity_fallback(&self, exclude: &HashSet<&str>, n: usize) -> Vec<Recommendation> {
        self.popularity
            .iter()
            .filter(|(id, _)| !exclude.contains(id.as_str()))
            .take(n)
            .map(|(id, count)| Recommendation::new(id.clone(), *count as f64, Approach::Popularity))
            .collect()
    }

    /// Score every unseen item against the profile: cosine in the profile
    /// space times that space's weight, plus neighborhood affinity times
    /// the location weight. Only positive totals survive.
    fn score_against_profile(
        &self,
        profile: &UserProfile,
        seen: &HashSet<&str>,
    ) -> Vec<(String, f64)> {
        let mut scores: HashMap<String, f64> = HashMap::new();

        if let (Some(vector), Some(space)) = (profile.vector.as_deref(), self.profile_space) {
            let weight = match space {
                ProfileSpace::Text => self.params.text_weight,
                ProfileSpace::Category => self.params.category_weight,
            };
            for (content_id, item_vector) in &self.item_vectors {
                if seen.contains(content_id.as_str()) {
                    continue;
                }
                let similarity = cosine_similarity_f32(vector, item_vector);
                if similarity != 0.0 {
                    *scores.entry(content_id.clone()).or_insert(0.0) += similarity * weight;
                }
            }
        }

        if !profile.neighborhoods.is_empty() {
            for (content_id, neighborhood) in &self.item_neighborhoods {
                if seen.contains(content_id.as_str()) {
                    continue;
                }
                if let Some(affinity) = profile.neighborhoods.get(neighborhood) {
                    *scores.entry(content_id.clone()).or_insert(0.0) +=
                        affinity * self.params.location_weight;
                }
            }
        }

        scores.retain(|_, score| *score > 0.0);
        scores.into_iter().collect()
    }

    /// Accumulate similarity rows of the seed items over unseen candidates.
    fn propagate_from_items(&self, seeds: &[String], seen: &HashSet<&str>) -> Vec<(String, f64)> {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for seed in seeds {
            if let Some(neighbors) = self.similarity.get(seed) {
                for (candidate, similarity) in neighbors {
                    if seen.contains(candidate.as_str()) {
                        continue;
                    }
                    *scores.entry(candidate.clone()).or_insert(0.0) += similarity;
                }
            }
        }
        scores.into_iter().collect()
    }
}

impl Recommender for ContentModel {
    fn kind(&self) -> EngineKind {
        EngineKind::Content
    }

    fn recommend_for_user(&self, user_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        let seen: HashSet<&str> = self
            .user_seen
            .get(user_id)
            .map(|items| items.iter().map(String::as_str).collect())
            .unwrap_or_default();

        if let Some(profile) = self.profiles.get(user_id) {
            let scores = self.score_against_profile(profile, &seen);
            if !scores.is_empty() {
                return Ok(take_top(scores, n)
                    .into_iter()
                    .map(|(id, score)| Recommendation::new(id, score, Approach::UserProfile))
                    .collect());
            }
        }

        if let Some(recent) = self.user_recent.get(user_id) {
            let scores = self.propagate_from_items(recent, &seen);
            if !scores.is_empty() {
                return Ok(take_top(scores, n)
                    .into_iter()
                    .map(|(id, score)| Recommendation::new(id, score, Approach::ContentSimilarity))
                    .collect());
            }
        }

        warn!(user_id = %user_id, "No content signals for user, serving popular items");
        Ok(self.popularity_fallback(&seen, n))
    }

    fn recommend_similar(&self, content_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        match self.similarity.get(content_id) {
            Some(neighbors) => Ok(neighbors
                .iter()
                .take(n)
                .map(|(id, similarity)| {
                    Recommendation::new(id.clone(), *similarity, Approach::ContentSimilarity)
                })
                .collect()),
            None => {
                warn!(content_id = %content_id, "Content unseen at training time, no similar items");
                Ok(Vec::new())
            }
        }
    }
}

fn seen_by_user(interactions: &[Interaction]) -> HashMap<String, Vec<String>> {
    let mut seen: HashMap<String, Vec<String>> = HashMap::new();
    for interaction in interactions {
        seen.entry(interaction.user_id.clone())
            .or_default()
            .push(interaction.content_id.clone());
    }
    for items in seen.values_mut() {
        items.sort();
        items.dedup();
    }
    seen
}

fn recent_by_user(interactions: &[Interaction], limit: usize) -> HashMap<String, Vec<String>> {
    let mut by_user: HashMap<String, Vec<&Interaction>> = HashMap::new();
    for interaction in interactions {
        by_user
            .entry(interaction.user_id.clone())
            .or_default()
            .push(interaction);
    }

    by_user
        .into_iter()
        .map(|(user, mut history)| {
            history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let recent: Vec<String> = history
                .iter()
                .take(limit)
                .map(|i| i.content_id.clone())
                .collect();
            (user, recent)
        })
        .collect()
}
