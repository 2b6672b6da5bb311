// ============================================
// Collaborative Filtering Engine
// ============================================
//
// Learns from the user-item interaction matrix alone; content features
// never enter here. Three interchangeable modes:
// - item: item-item cosine neighborhoods over matrix columns
// - user: user-user cosine neighborhoods over matrix rows
// - matrix: truncated SVD latent factors over the mean-centered matrix
//
// Training produces an immutable CollaborativeModel that carries its own
// popularity ranking, so serving never goes back to the stores.

mod matrix;
mod svd;

pub use matrix::InteractionMatrix;

use crate::config::CollaborativeConfig;
use crate::engines::{popularity_ranking, Persistable, Recommender};
use crate::error::{RecommendError, Result};
use crate::models::{Approach, EngineKind, Interaction, Recommendation};
use crate::utils::take_top;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

const SVD_SEED: u64 = 42;

/// Similarity mode the engine trains with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CfMode {
    Item,
    User,
    Matrix,
}

impl CfMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfMode::Item => "item",
            CfMode::User => "user",
            CfMode::Matrix => "matrix",
        }
    }
}

impl fmt::Display for CfMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CfMode {
    type Err = RecommendError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "item" => Ok(CfMode::Item),
            "user" => Ok(CfMode::User),
            "matrix" => Ok(CfMode::Matrix),
            other => Err(RecommendError::Invalid(format!(
                "unknown collaborative mode: {}",
                other
            ))),
        }
    }
}

/// Training parameters frozen into the model for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeParams {
    pub min_interactions: usize,
    pub n_factors: usize,
    pub max_neighbors: usize,
}

impl From<&CollaborativeConfig> for CollaborativeParams {
    fn from(config: &CollaborativeConfig) -> Self {
        Self {
            min_interactions: config.min_interactions,
            n_factors: config.n_factors,
            max_neighbors: config.max_neighbors,
        }
    }
}

/// Latent factor matrices for matrix mode. Singular values are folded
/// into the user factors, so a prediction is dot(user, item) plus the
/// user's training-time mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentFactors {
    pub user_factors: HashMap<String, Vec<f64>>,
    pub item_factors: HashMap<String, Vec<f64>>,
    pub user_means: HashMap<String, f64>,
    pub n_factors: usize,
}

/// Immutable trained collaborative model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeModel {
    pub mode: CfMode,
    /// Per-item neighbor lists, strongest first (item and matrix modes).
    pub item_similarity: HashMap<String, Vec<(String, f64)>>,
    /// Per-user neighbor lists, strongest first (user mode).
    pub user_similarity: HashMap<String, Vec<(String, f64)>>,
    /// Aggregated interaction weight per user, item-id order.
    pub user_items: HashMap<String, Vec<(String, f64)>>,
    pub factors: Option<LatentFactors>,
    /// Interaction counts over the full corpus, most popular first.
    pub popularity: Vec<(String, u64)>,
    pub params: CollaborativeParams,
    pub trained_at: DateTime<Utc>,
}

impl Persistable for CollaborativeModel {}

pub struct CollaborativeFilteringEngine {
    config: CollaborativeConfig,
}

impl CollaborativeFilteringEngine {
    pub fn new(config: CollaborativeConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, interactions: &[Interaction]) -> Result<CollaborativeModel> {
        if interactions.is_empty() {
            return Err(RecommendError::EmptyCorpus(
                "no interactions to train on".to_string(),
            ));
        }

        let retained = filter_sparse_users(interactions, self.config.min_interactions);
        if retained.is_empty() {
            return Err(RecommendError::EmptyCorpus(format!(
                "no user reached {} interactions",
                self.config.min_interactions
            )));
        }

        let mut matrix = InteractionMatrix::from_interactions(&retained);
        info!(
            mode = %self.config.mode,
            users = matrix.n_users(),
            items = matrix.n_items(),
            interactions = retained.len(),
            "Training collaborative filtering model"
        );

        let user_items = matrix.user_item_weights();
        let popularity = popularity_ranking(interactions);

        let mut item_similarity = HashMap::new();
        let mut user_similarity = HashMap::new();
        let mut factors = None;

        match self.config.mode {
            CfMode::Item => {
                item_similarity = matrix::row_similarity_map(
                    matrix.values.t(),
                    &matrix.items,
                    self.config.max_neighbors,
                );
            }
            CfMode::User => {
                user_similarity = matrix::row_similarity_map(
                    matrix.values.view(),
                    &matrix.users,
                    self.config.max_neighbors,
                );
            }
            CfMode::Matrix => {
                let user_means = matrix.center_rows();
                let k = self
                    .config
                    .n_factors
                    .min(matrix.n_users())
                    .min(matrix.n_items());
                let decomposition = svd::truncated_svd(&matrix.values, k, SVD_SEED);

                let mut user_factors = HashMap::with_capacity(matrix.n_users());
                for (row, user) in matrix.users.iter().enumerate() {
                    let vector: Vec<f64> = (0..k)
                        .map(|j| decomposition.u[[row, j]] * decomposition.sigma[j])
                        .collect();
                    user_factors.insert(user.clone(), vector);
                }

                let mut item_factors = HashMap::with_capacity(matrix.n_items());
                for (row, item) in matrix.items.iter().enumerate() {
                    let vector: Vec<f64> = (0..k).map(|j| decomposition.v[[row, j]]).collect();
                    item_factors.insert(item.clone(), vector);
                }

                item_similarity = matrix::row_similarity_map(
                    decomposition.v.view(),
                    &matrix.items,
                    self.config.max_neighbors,
                );
                factors = Some(LatentFactors {
                    user_factors,
                    item_factors,
                    user_means,
                    n_factors: k,
                });
            }
        }

        let model = CollaborativeModel {
            mode: self.config.mode,
            item_similarity,
            user_similarity,
            user_items,
            factors,
            popularity,
            params: CollaborativeParams::from(&self.config),
            trained_at: Utc::now(),
        };
        info!(
            mode = %model.mode,
            users = model.user_items.len(),
            popular_items = model.popularity.len(),
            "Collaborative filtering model trained"
        );
        Ok(model)
    }
}

impl CollaborativeModel {
    pub fn knows_user(&self, user_id: &str) -> bool {
        self.user_items.contains_key(user_id)
    }

    fn popularity_fallback(&self, exclude: &HashSet<&str>, n: usize) -> Vec<Recommendation> {
        self.popularity
            .iter()
            .filter(|(id, _)| !exclude.contains(id.as_str()))
            .take(n)
            .map(|(id, count)| Recommendation::new(id.clone(), *count as f64, Approach::Popularity))
            .collect()
    }
}

impl Recommender for CollaborativeModel {
    fn kind(&self) -> EngineKind {
        EngineKind::Collaborative
    }

    fn recommend_for_user(&self, user_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        let Some(owned) = self.user_items.get(user_id) else {
            warn!(user_id = %user_id, "User unseen at training time, serving popular items");
            return Ok(self.popularity_fallback(&HashSet::new(), n));
        };

        let seen: HashSet<&str> = owned.iter().map(|(id, _)| id.as_str()).collect();
        let mut scores: HashMap<String, f64> = HashMap::new();

        match self.mode {
            CfMode::Item => {
                for (item, weight) in owned {
                    if let Some(neighbors) = self.item_similarity.get(item) {
                        for (candidate, similarity) in neighbors {
                            if seen.contains(candidate.as_str()) {
                                continue;
                            }
                            *scores.entry(candidate.clone()).or_insert(0.0) +=
                                similarity * weight;
                        }
                    }
                }
            }
            CfMode::User => {
                if let Some(neighbors) = self.user_similarity.get(user_id) {
                    // per-candidate weighted average over the similar users
                    // who touched it
                    let mut sums: HashMap<String, (f64, f64)> = HashMap::new();
                    for (other, similarity) in neighbors {
                        if let Some(their_items) = self.user_items.get(other) {
                            for (candidate, weight) in their_items {
                                if seen.contains(candidate.as_str()) {
                                    continue;
                                }
                                let entry = sums.entry(candidate.clone()).or_insert((0.0, 0.0));
                                entry.0 += similarity * weight;
                                entry.1 += similarity;
                            }
                        }
                    }
                    for (candidate, (weighted, total)) in sums {
                        if total > 0.0 {
                            scores.insert(candidate, weighted / total);
                        }
                    }
                }
            }
            CfMode::Matrix => {
                let factors = self.factors.as_ref().ok_or_else(|| {
                    RecommendError::Internal(
                        "matrix mode model is missing latent factors".to_string(),
                    )
                })?;
                if let Some(user_vector) = factors.user_factors.get(user_id) {
                    let mean = factors.user_means.get(user_id).copied().unwrap_or(0.0);
                    for (candidate, item_vector) in &factors.item_factors {
                        if seen.contains(candidate.as_str()) {
                            continue;
                        }
                        let predicted = dot(user_vector, item_vector) + mean;
                        if predicted > 0.0 {
                            scores.insert(candidate.clone(), predicted);
                        }
                    }
                }
            }
        }

        if scores.is_empty() {
            warn!(
                user_id = %user_id,
                mode = %self.mode,
                "No collaborative candidates, serving popular items"
            );
            return Ok(self.popularity_fallback(&seen, n));
        }

        let approach = match self.mode {
            CfMode::Item => Approach::ItemCf,
            CfMode::User => Approach::UserCf,
            CfMode::Matrix => Approach::MatrixFactorization,
        };
        let ranked = take_top(scores.into_iter().collect(), n);
        Ok(ranked
            .into_iter()
            .map(|(content_id, score)| Recommendation::new(content_id, score, approach))
            .collect())
    }

    fn recommend_similar(&self, content_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        if self.mode == CfMode::User {
            return Err(RecommendError::Unsupported(
                "user mode keeps no item similarity; train with item or matrix mode".to_string(),
            ));
        }

        let approach = match self.mode {
            CfMode::Item => Approach::ItemSimilarity,
            _ => Approach::LatentSimilarity,
        };
        match self.item_similarity.get(content_id) {
            Some(neighbors) => Ok(neighbors
                .iter()
                .take(n)
                .map(|(id, similarity)| Recommendation::new(id.clone(), *similarity, approach))
                .collect()),
            None => {
                warn!(content_id = %content_id, "Content unseen at training time, no similar items");
                Ok(Vec::new())
            }
        }
    }
}

/// Drop users whose raw interaction count is below the threshold. The
/// count is over records, not distinct items, matching how activity is
/// measured at ingestion.
fn filter_sparse_users(interactions: &[Interaction], min_interactions: usize) -> Vec<Interaction> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for interaction in interactions {
        *counts.entry(interaction.user_id.as_str()).or_insert(0) += 1;
    }

    interactions
        .iter()
        .filter(|interaction| {
            counts
                .get(interaction.user_id.as_str())
                .copied()
                .unwrap_or(0)
                >= min_interactions
        })
        .cloned()
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
