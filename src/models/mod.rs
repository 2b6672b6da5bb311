pub mod neighborhoods;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recorded user action against a content item. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub content_id: String,
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
}

/// Interaction types with their fixed engagement weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Click,
    Save,
    Share,
}

impl InteractionKind {
    /// Engagement weight: view=1.0, click=2.0, save=3.0, share=4.0
    pub fn weight(&self) -> f64 {
        match self {
            InteractionKind::View => 1.0,
            InteractionKind::Click => 2.0,
            InteractionKind::Save => 3.0,
            InteractionKind::Share => 4.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Click => "click",
            InteractionKind::Save => "save",
            InteractionKind::Share => "share",
        }
    }
}

/// A recommendable catalog unit. Read-only to the engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub content_id: String,
    pub title: String,
    pub description: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub metadata: ContentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Post,
    Event,
    Place,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub neighborhood: Option<String>,
}

/// Upstream enrichment metadata consumed by the contextual boosts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// Declared single-season relevance, e.g. a patio listing tagged summer.
    pub seasonal_relevance: Option<Season>,
    /// Multi-tag seasonal windows for events (season labels plus special
    /// periods such as "holiday" or "canada-day").
    #[serde(default)]
    pub seasonal_tags: Vec<String>,
    /// Optional upstream popularity hint; the engines derive popularity from
    /// interactions and keep this for collaborators.
    pub popularity_hint: Option<f64>,
}

/// Precomputed location record for a content item, keyed by content_id in
/// the content store. Derived from raw coordinates when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub neighborhood: Option<String>,
    pub distance_to_center: f64,
}

/// Calendar season, derived from the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Month → season: spring Mar–May, summer Jun–Aug, fall Sep–Nov,
    /// winter Dec–Feb.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn current() -> Self {
        Season::from_month(Utc::now().month())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The engines the registry can train and serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Collaborative,
    Content,
    Hybrid,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Collaborative => "collaborative",
            EngineKind::Content => "content",
            EngineKind::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a recommendation score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    ItemCf,
    UserCf,
    MatrixFactorization,
    Popularity,
    UserProfile,
    ItemSimilarity,
    ContentSimilarity,
    LatentSimilarity,
    Hybrid,
    Contextual,
}

impl Approach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::ItemCf => "item_cf",
            Approach::UserCf => "user_cf",
            Approach::MatrixFactorization => "matrix_factorization",
            Approach::Popularity => "popularity",
            Approach::UserProfile => "user_profile",
            Approach::ItemSimilarity => "item_similarity",
            Approach::ContentSimilarity => "content_similarity",
            Approach::LatentSimilarity => "latent_similarity",
            Approach::Hybrid => "hybrid",
            Approach::Contextual => "contextual",
        }
    }
}

/// Which engines contributed to a blended score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Collaborative,
    Content,
    Popularity,
    Contextual,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Collaborative => "collaborative",
            ScoreSource::Content => "content",
            ScoreSource::Popularity => "popularity",
            ScoreSource::Contextual => "contextual",
        }
    }
}

/// A scored recommendation returned to collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub content_id: String,
    pub score: f64,
    pub approach: Approach,
    /// Contributing engines; empty for single-engine results.
    #[serde(default)]
    pub sources: Vec<ScoreSource>,
}

impl Recommendation {
    pub fn new(content_id: impl Into<String>, score: f64, approach: Approach) -> Self {
        Self {
            content_id: content_id.into(),
            score,
            approach,
            sources: Vec::new(),
        }
    }
}

/// Audit record appended to the interaction store for each served
/// recommendation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationLog {
    pub id: Uuid,
    pub user_id: String,
    pub content_ids: Vec<String>,
    pub source: Approach,
    pub timestamp: DateTime<Utc>,
}

impl RecommendationLog {
    pub fn new(user_id: impl Into<String>, content_ids: Vec<String>, source: Approach) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            content_ids,
            source,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_weights() {
        assert_eq!(InteractionKind::View.weight(), 1.0);
        assert_eq!(InteractionKind::Click.weight(), 2.0);
        assert_eq!(InteractionKind::Save.weight(), 3.0);
        assert_eq!(InteractionKind::Share.weight(), 4.0);
    }

    #[test]
    fn test_season_from_month() {
        assert_eq!(Season::from_month(3), Season::Spring);
        assert_eq!(Season::from_month(5), Season::Spring);
        assert_eq!(Season::from_month(7), Season::Summer);
        assert_eq!(Season::from_month(10), Season::Fall);
        assert_eq!(Season::from_month(12), Season::Winter);
        assert_eq!(Season::from_month(1), Season::Winter);
    }

    #[test]
    fn test_season_serde_roundtrip() {
        let json = serde_json::to_string(&Season::Summer).unwrap();
        assert_eq!(json, "\"summer\"");
        let parsed: Season = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Season::Summer);
    }
}
