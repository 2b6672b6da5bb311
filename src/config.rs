use crate::engines::collaborative::CfMode;
use serde::Deserialize;
use std::env;

/// Engine configuration. Every algorithm constant lives here; `from_env`
/// overrides defaults from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub collaborative: CollaborativeConfig,
    pub content: ContentConfig,
    pub hybrid: HybridConfig,
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollaborativeConfig {
    pub mode: CfMode,
    /// Users with fewer raw interaction records are left to the popularity
    /// fallback.
    pub min_interactions: usize,
    pub n_factors: usize,
    /// Similarity rows are truncated to this many neighbors at train time.
    pub max_neighbors: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub text_weight: f64,
    pub category_weight: f64,
    pub location_weight: f64,
    /// Decay scale for coordinate distance (degrees): exp(-distance/scale).
    pub location_scale: f64,
    /// Extra similarity for items sharing a neighborhood, applied before
    /// the location weight.
    pub neighborhood_bonus: f64,
    pub city_center_latitude: f64,
    pub city_center_longitude: f64,
    pub max_neighbors: usize,
    /// How many most-recent items feed the no-profile fallback.
    pub recent_items: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridConfig {
    pub collaborative_weight: f64,
    pub content_weight: f64,
    pub seasonal_boost: f64,
    /// Multiplier on `seasonal_boost` for events with a matching seasonal
    /// tag.
    pub event_boost_factor: f64,
    pub neighborhood_boost: f64,
    pub popularity_boost: f64,
    /// Minimum profile neighborhood weight to count as a preference.
    pub preference_threshold: f64,
    pub contextual_filter_limit: usize,
    pub contextual_base_score: f64,
    /// Added when a contextual candidate already appears in the
    /// personalized base.
    pub contextual_match_boost: f64,
    pub contextual_season_boost: f64,
    pub contextual_neighborhood_boost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    pub holdout_fraction: f64,
    pub top_k: usize,
    /// Fixed RNG seed for reproducible splits; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            mode: CfMode::Item,
            min_interactions: 2,
            n_factors: 20,
            max_neighbors: 100,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            text_weight: 0.5,
            category_weight: 0.2,
            location_weight: 0.3,
            location_scale: 0.05,
            neighborhood_bonus: 0.1,
            city_center_latitude: 43.6532,
            city_center_longitude: -79.3832,
            max_neighbors: 50,
            recent_items: 10,
        }
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            collaborative_weight: 0.6,
            content_weight: 0.4,
            seasonal_boost: 0.2,
            event_boost_factor: 1.5,
            neighborhood_boost: 0.3,
            popularity_boost: 0.1,
            preference_threshold: 0.1,
            contextual_filter_limit: 100,
            contextual_base_score: 1.0,
            contextual_match_boost: 0.5,
            contextual_season_boost: 0.3,
            contextual_neighborhood_boost: 0.5,
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.2,
            top_k: 10,
            seed: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collaborative: CollaborativeConfig::default(),
            content: ContentConfig::default(),
            hybrid: HybridConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

impl HybridConfig {
    /// Blend weights must sum to 1.0 (within tolerance).
    pub fn validate(&self) -> crate::error::Result<()> {
        let sum = self.collaborative_weight + self.content_weight;
        if (sum - 1.0).abs() > 0.01 {
            return Err(crate::error::RecommendError::Invalid(format!(
                "Blend weights must sum to 1.0 (got {})",
                sum
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        EngineConfig {
            collaborative: CollaborativeConfig {
                mode: env::var("CF_MODE")
                    .unwrap_or_else(|_| "item".to_string())
                    .parse()
                    .expect("CF_MODE must be one of item, user, matrix"),
                min_interactions: env::var("CF_MIN_INTERACTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("CF_MIN_INTERACTIONS must be a valid usize"),
                n_factors: env::var("CF_N_FACTORS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("CF_N_FACTORS must be a valid usize"),
                max_neighbors: env::var("CF_MAX_NEIGHBORS")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .expect("CF_MAX_NEIGHBORS must be a valid usize"),
            },
            content: ContentConfig {
                text_weight: env::var("CONTENT_TEXT_WEIGHT")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()
                    .expect("CONTENT_TEXT_WEIGHT must be a valid f64"),
                category_weight: env::var("CONTENT_CATEGORY_WEIGHT")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("CONTENT_CATEGORY_WEIGHT must be a valid f64"),
                location_weight: env::var("CONTENT_LOCATION_WEIGHT")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("CONTENT_LOCATION_WEIGHT must be a valid f64"),
                location_scale: env::var("CONTENT_LOCATION_SCALE")
                    .unwrap_or_else(|_| "0.05".to_string())
                    .parse()
                    .expect("CONTENT_LOCATION_SCALE must be a valid f64"),
                neighborhood_bonus: env::var("CONTENT_NEIGHBORHOOD_BONUS")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .expect("CONTENT_NEIGHBORHOOD_BONUS must be a valid f64"),
                city_center_latitude: env::var("CITY_CENTER_LATITUDE")
                    .unwrap_or_else(|_| "43.6532".to_string())
                    .parse()
                    .expect("CITY_CENTER_LATITUDE must be a valid f64"),
                city_center_longitude: env::var("CITY_CENTER_LONGITUDE")
                    .unwrap_or_else(|_| "-79.3832".to_string())
                    .parse()
                    .expect("CITY_CENTER_LONGITUDE must be a valid f64"),
                max_neighbors: env::var("CONTENT_MAX_NEIGHBORS")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .expect("CONTENT_MAX_NEIGHBORS must be a valid usize"),
                recent_items: env::var("CONTENT_RECENT_ITEMS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("CONTENT_RECENT_ITEMS must be a valid usize"),
            },
            hybrid: HybridConfig {
                collaborative_weight: env::var("HYBRID_CF_WEIGHT")
                    .unwrap_or_else(|_| "0.6".to_string())
                    .parse()
                    .expect("HYBRID_CF_WEIGHT must be a valid f64"),
                content_weight: env::var("HYBRID_CONTENT_WEIGHT")
                    .unwrap_or_else(|_| "0.4".to_string())
                    .parse()
                    .expect("HYBRID_CONTENT_WEIGHT must be a valid f64"),
                seasonal_boost: env::var("HYBRID_SEASONAL_BOOST")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("HYBRID_SEASONAL_BOOST must be a valid f64"),
                event_boost_factor: env::var("HYBRID_EVENT_BOOST_FACTOR")
                    .unwrap_or_else(|_| "1.5".to_string())
                    .parse()
                    .expect("HYBRID_EVENT_BOOST_FACTOR must be a valid f64"),
                neighborhood_boost: env::var("HYBRID_NEIGHBORHOOD_BOOST")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("HYBRID_NEIGHBORHOOD_BOOST must be a valid f64"),
                popularity_boost: env::var("HYBRID_POPULARITY_BOOST")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .expect("HYBRID_POPULARITY_BOOST must be a valid f64"),
                preference_threshold: env::var("HYBRID_PREFERENCE_THRESHOLD")
                    .unwrap_or_else(|_| "0.1".to_string())
                    .parse()
                    .expect("HYBRID_PREFERENCE_THRESHOLD must be a valid f64"),
                contextual_filter_limit: env::var("HYBRID_CONTEXTUAL_FILTER_LIMIT")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .expect("HYBRID_CONTEXTUAL_FILTER_LIMIT must be a valid usize"),
                contextual_base_score: env::var("HYBRID_CONTEXTUAL_BASE_SCORE")
                    .unwrap_or_else(|_| "1.0".to_string())
                    .parse()
                    .expect("HYBRID_CONTEXTUAL_BASE_SCORE must be a valid f64"),
                contextual_match_boost: env::var("HYBRID_CONTEXTUAL_MATCH_BOOST")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()
                    .expect("HYBRID_CONTEXTUAL_MATCH_BOOST must be a valid f64"),
                contextual_season_boost: env::var("HYBRID_CONTEXTUAL_SEASON_BOOST")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("HYBRID_CONTEXTUAL_SEASON_BOOST must be a valid f64"),
                contextual_neighborhood_boost: env::var("HYBRID_CONTEXTUAL_NEIGHBORHOOD_BOOST")
                    .unwrap_or_else(|_| "0.5".to_string())
                    .parse()
                    .expect("HYBRID_CONTEXTUAL_NEIGHBORHOOD_BOOST must be a valid f64"),
            },
            evaluation: EvaluationConfig {
                holdout_fraction: env::var("EVAL_HOLDOUT_FRACTION")
                    .unwrap_or_else(|_| "0.2".to_string())
                    .parse()
                    .expect("EVAL_HOLDOUT_FRACTION must be a valid f64"),
                top_k: env::var("EVAL_TOP_K")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .expect("EVAL_TOP_K must be a valid usize"),
                seed: env::var("EVAL_SEED")
                    .ok()
                    .map(|v| v.parse().expect("EVAL_SEED must be a valid u64")),
            },
        }
    }
}
