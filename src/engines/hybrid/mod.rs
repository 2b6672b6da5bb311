// ============================================
// Hybrid Blending Engine
// ============================================
//
// Merges the collaborative and content arms into one ranking: each arm
// contributes its candidates scaled by its blend weight, then city
// context boosts (season, neighborhood, popularity) adjust the merged
// scores. A failing arm is logged and skipped, never fatal. The
// contextual path filters the catalog by season and neighborhood and
// seeds scores for candidates the per-user blend missed.

pub mod context;

pub use context::{neighborhood_slug, seasonal_tags_for};

use crate::config::HybridConfig;
use crate::engines::{
    popularity_ranking, CollaborativeModel, ContentModel, Persistable, Recommender,
};
use crate::error::{RecommendError, Result};
use crate::models::neighborhoods::nearest_neighborhood;
use crate::models::{
    Approach, ContentItem, ContentKind, EngineKind, Interaction, Recommendation, ScoreSource,
    Season,
};
use crate::utils::take_top;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Blend and boost parameters frozen into the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridParams {
    pub collaborative_weight: f64,
    pub content_weight: f64,
    pub seasonal_boost: f64,
    pub event_boost_factor: f64,
    pub neighborhood_boost: f64,
    pub popularity_boost: f64,
    pub preference_threshold: f64,
    pub contextual_filter_limit: usize,
    pub contextual_base_score: f64,
    pub contextual_match_boost: f64,
    pub contextual_season_boost: f64,
    pub contextual_neighborhood_boost: f64,
}

impl From<&HybridConfig> for HybridParams {
    fn from(config: &HybridConfig) -> Self {
        Self {
            collaborative_weight: config.collaborative_weight,
            content_weight: config.content_weight,
            seasonal_boost: config.seasonal_boost,
            event_boost_factor: config.event_boost_factor,
            neighborhood_boost: config.neighborhood_boost,
            popularity_boost: config.popularity_boost,
            preference_threshold: config.preference_threshold,
            contextual_filter_limit: config.contextual_filter_limit,
            contextual_base_score: config.contextual_base_score,
            contextual_match_boost: config.contextual_match_boost,
            contextual_season_boost: config.contextual_season_boost,
            contextual_neighborhood_boost: config.contextual_neighborhood_boost,
        }
    }
}

/// What the boost pass needs to know about one catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemContext {
    pub neighborhood: Option<String>,
    pub tags: Vec<String>,
    pub is_event: bool,
    pub seasonal_relevance: Option<Season>,
    pub seasonal_tags: Vec<String>,
    pub interactions: u64,
}

/// Catalog snapshot the blended model serves from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub items: HashMap<String, ItemContext>,
    pub popularity: Vec<(String, u64)>,
}

/// The serializable part of a hybrid model. The two sub-models persist
/// as their own bundles and are re-attached on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridBundle {
    pub catalog: CatalogIndex,
    pub user_neighborhoods: HashMap<String, Vec<String>>,
    pub params: HybridParams,
    pub trained_at: DateTime<Utc>,
}

impl Persistable for HybridBundle {}

/// Immutable blended model over the two trained arms.
#[derive(Debug, Clone)]
pub struct HybridModel {
    pub collaborative: Option<Arc<CollaborativeModel>>,
    pub content: Option<Arc<ContentModel>>,
    pub catalog: CatalogIndex,
    pub user_neighborhoods: HashMap<String, Vec<String>>,
    pub params: HybridParams,
    pub trained_at: DateTime<Utc>,
}

pub struct HybridBlender {
    config: HybridConfig,
}

impl HybridBlender {
    pub fn new(config: HybridConfig) -> Self {
        Self { config }
    }

    /// Assemble a hybrid model from the trained arms and a catalog
    /// snapshot. At least one arm must be present.
    pub fn blend(
        &self,
        collaborative: Option<Arc<CollaborativeModel>>,
        content: Option<Arc<ContentModel>>,
        items: &[ContentItem],
        interactions: &[Interaction],
        user_neighborhoods: HashMap<String, Vec<String>>,
    ) -> Result<HybridModel> {
        self.config.validate()?;
        if collaborative.is_none() && content.is_none() {
            return Err(RecommendError::Invalid(
                "hybrid blending needs at least one trained engine".to_string(),
            ));
        }

        let popularity = popularity_ranking(interactions);
        let counts: HashMap<&str, u64> = popularity
            .iter()
            .map(|(id, count)| (id.as_str(), *count))
            .collect();

        let catalog_items: HashMap<String, ItemContext> = items
            .iter()
            .map(|item| {
                // items with coordinates but no declared neighborhood are
                // labelled with the nearest canonical centre
                let context = ItemContext {
                    neighborhood: item.location.as_ref().map(|location| {
                        location.neighborhood.clone().unwrap_or_else(|| {
                            nearest_neighborhood(location.latitude, location.longitude)
                                .name
                                .to_string()
                        })
                    }),
                    tags: item.tags.clone(),
                    is_event: matches!(item.kind, ContentKind::Event),
                    seasonal_relevance: item.metadata.seasonal_relevance,
                    seasonal_tags: item.metadata.seasonal_tags.clone(),
                    interactions: counts.get(item.content_id.as_str()).copied().unwrap_or(0),
                };
                (item.content_id.clone(), context)
            })
            .collect();

        info!(
            items = catalog_items.len(),
            has_collaborative = collaborative.is_some(),
            has_content = content.is_some(),
            "Blended hybrid model"
        );

        Ok(HybridModel {
            collaborative,
            content,
            catalog: CatalogIndex {
                items: catalog_items,
                popularity,
            },
            user_neighborhoods,
            params: HybridParams::from(&self.config),
            trained_at: Utc::now(),
        })
    }
}

impl HybridModel {
    pub fn from_parts(
        bundle: HybridBundle,
        collaborative: Option<Arc<CollaborativeModel>>,
        content: Option<Arc<ContentModel>>,
    ) -> Self {
        Self {
            collaborative,
            content,
            catalog: bundle.catalog,
            user_neighborhoods: bundle.user_neighborhoods,
            params: bundle.params,
            trained_at: bundle.trained_at,
        }
    }

    pub fn bundle(&self) -> HybridBundle {
        HybridBundle {
            catalog: self.catalog.clone(),
            user_neighborhoods: self.user_neighborhoods.clone(),
            params: self.params.clone(),
            trained_at: self.trained_at,
        }
    }

    /// The per-user blend with an explicit season, so callers (and tests)
    /// are not pinned to the wall clock.
    pub fn recommend_for_user_in_season(
        &self,
        user_id: &str,
        n: usize,
        season: Season,
    ) -> Result<Vec<Recommendation>> {
        let mut merged: HashMap<String, (f64, Vec<ScoreSource>)> = HashMap::new();

        if self.params.collaborative_weight > 0.0 {
            if let Some(model) = &self.collaborative {
                match model.recommend_for_user(user_id, n * 2) {
                    Ok(recommendations) => merge_arm(
                        &mut merged,
                        recommendations,
                        self.params.collaborative_weight,
                        ScoreSource::Collaborative,
                    ),
                    Err(error) => {
                        warn!(user_id = %user_id, error = %error, "Collaborative arm failed, continuing without it")
                    }
                }
            }
        }

        if self.params.content_weight > 0.0 {
            if let Some(model) = &self.content {
                match model.recommend_for_user(user_id, n * 2) {
                    Ok(recommendations) => merge_arm(
                        &mut merged,
                        recommendations,
                        self.params.content_weight,
                        ScoreSource::Content,
                    ),
                    Err(error) => {
                        warn!(user_id = %user_id, error = %error, "Content arm failed, continuing without it")
                    }
                }
            }
        }

        if merged.is_empty() {
            info!(user_id = %user_id, "No candidates from component engines, serving popular items");
            for (content_id, count) in self.catalog.popularity.iter().take(n) {
                merged.insert(
                    content_id.clone(),
                    (*count as f64, vec![ScoreSource::Popularity]),
                );
            }
        }

        self.apply_boosts(&mut merged, user_id, season);
        Ok(ranked(merged, n, Approach::Hybrid))
    }

    /// Season and neighborhood aware catalog query. Candidates matching
    /// the filters either boost an already-recommended item or enter with
    /// a seeded score reflecting how many filters they match.
    pub fn contextual_recommendations(
        &self,
        user_id: Option<&str>,
        neighborhood: Option<&str>,
        season: Option<Season>,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        let season = season.unwrap_or_else(Season::current);

        let mut merged: HashMap<String, (f64, Vec<ScoreSource>)> = HashMap::new();
        if let Some(user) = user_id {
            for recommendation in self.recommend_for_user_in_season(user, n * 2, season)? {
                merged.insert(
                    recommendation.content_id,
                    (recommendation.score, recommendation.sources),
                );
            }
        }

        for content_id in self.contextual_candidates(neighborhood, season) {
            if let Some(entry) = merged.get_mut(&content_id) {
                entry.0 += self.params.contextual_match_boost;
                continue;
            }

            let Some(item) = self.catalog.items.get(&content_id) else {
                continue;
            };
            let mut score = self.params.contextual_base_score;
            if item.tags.iter().any(|tag| tag == season.label()) {
                score += self.params.contextual_season_boost;
            }
            if let Some(hood) = neighborhood {
                if item.neighborhood.as_deref() == Some(hood) {
                    score += self.params.contextual_neighborhood_boost;
                }
            }
            merged.insert(content_id, (score, vec![ScoreSource::Contextual]));
        }

        Ok(ranked(merged, n, Approach::Contextual))
    }

    /// Catalog ids matching the season filter and, when given, the
    /// neighborhood filter (either the item's neighborhood or its slug
    /// tag). Ids come back sorted and capped so the query is stable.
    fn contextual_candidates(&self, neighborhood: Option<&str>, season: Season) -> Vec<String> {
        let slug = neighborhood.map(neighborhood_slug);

        let mut ids: Vec<String> = self
            .catalog
            .items
            .iter()
            .filter(|(_, item)| {
                let seasonal = item.tags.iter().any(|tag| tag == season.label())
                    || (item.is_event
                        && item.seasonal_tags.iter().any(|tag| tag == season.label()));
                if !seasonal {
                    return false;
                }
                match (neighborhood, &slug) {
                    (Some(hood), Some(slug)) => {
                        item.neighborhood.as_deref() == Some(hood)
                            || item.tags.iter().any(|tag| tag == slug)
                    }
                    _ => true,
                }
            })
            .map(|(content_id, _)| content_id.clone())
            .collect();

        ids.sort();
        ids.truncate(self.params.contextual_filter_limit);
        ids
    }

    /// Neighborhoods the user demonstrably cares about: profile fractions
    /// above the preference threshold, or the user's explicit preference
    /// record when the profile offers nothing.
    fn preferred_neighborhoods(&self, user_id: &str) -> HashSet<String> {
        let mut neighborhoods = HashSet::new();

        if let Some(content) = &self.content {
            if let Some(profile) = content.profiles.get(user_id) {
                for (neighborhood, affinity) in &profile.neighborhoods {
                    if *affinity > self.params.preference_threshold {
                        neighborhoods.insert(neighborhood.clone());
                    }
                }
            }
        }

        if neighborhoods.is_empty() {
            if let Some(explicit) = self.user_neighborhoods.get(user_id) {
                neighborhoods.extend(explicit.iter().cloned());
            }
        }

        neighborhoods
    }

    fn apply_boosts(
        &self,
        merged: &mut HashMap<String, (f64, Vec<ScoreSource>)>,
        user_id: &str,
        season: Season,
    ) {
        let neighborhoods = self.preferred_neighborhoods(user_id);

        for (content_id, (score, _)) in merged.iter_mut() {
            let Some(item) = self.catalog.items.get(content_id) else {
                continue;
            };

            if item.seasonal_relevance == Some(season) {
                *score += self.params.seasonal_boost;
            }
            // events with a matching seasonal tag get the stronger boost
            // on top of any declared relevance
            if item.is_event && item.seasonal_tags.iter().any(|tag| tag == season.label()) {
                *score += self.params.seasonal_boost * self.params.event_boost_factor;
            }

            if !neighborhoods.is_empty() {
                if let Some(neighborhood) = &item.neighborhood {
                    if neighborhoods.contains(neighborhood) {
                        *score += self.params.neighborhood_boost;
                    }
                }
            }

            if item.interactions > 0 {
                *score += (item.interactions as f64).ln_1p() / 10.0 * self.params.popularity_boost;
            }
        }
    }
}

impl Recommender for HybridModel {
    fn kind(&self) -> EngineKind {
        EngineKind::Hybrid
    }

    fn recommend_for_user(&self, user_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        self.recommend_for_user_in_season(user_id, n, Season::current())
    }

    /// Content similarity first; the collaborative arm only answers when
    /// no content arm exists, and its unsupported modes degrade to empty.
    fn recommend_similar(&self, content_id: &str, n: usize) -> Result<Vec<Recommendation>> {
        if let Some(content) = &self.content {
            return content.recommend_similar(content_id, n);
        }
        if let Some(collaborative) = &self.collaborative {
            return match collaborative.recommend_similar(content_id, n) {
                Ok(recommendations) => Ok(recommendations),
                Err(error) => {
                    warn!(content_id = %content_id, error = %error, "Collaborative similar-items lookup failed");
                    Ok(Vec::new())
                }
            };
        }
        Ok(Vec::new())
    }
}

fn merge_arm(
    merged: &mut HashMap<String, (f64, Vec<ScoreSource>)>,
    recommendations: Vec<Recommendation>,
    weight: f64,
    source: ScoreSource,
) {
    for recommendation in recommendations {
        let entry = merged
            .entry(recommendation.content_id)
            .or_insert_with(|| (0.0, Vec::new()));
        entry.0 += recommendation.score * weight;
        entry.1.push(source);
    }
}

fn ranked(
    merged: HashMap<String, (f64, Vec<ScoreSource>)>,
    n: usize,
    approach: Approach,
) -> Vec<Recommendation> {
    let scored: Vec<(String, f64)> = merged
        .iter()
        .map(|(content_id, (score, _))| (content_id.clone(), *score))
        .collect();

    take_top(scored, n)
        .into_iter()
        .map(|(content_id, score)| {
            let sources = merged
                .get(&content_id)
                .map(|(_, sources)| sources.clone())
                .unwrap_or_default();
            Recommendation {
                content_id,
                score,
                approach,
                sources,
            }
        })
        .collect()
}
