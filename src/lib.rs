//! Recommender Core
//!
//! City-content recommendation engines for Toronto: collaborative
//! filtering (item/user similarity or latent factors), content
//! similarity (text, category, and location features), and a hybrid
//! blend with seasonal, neighborhood, and popularity context.
//!
//! Training reads the store traits and produces immutable model
//! snapshots; `ModelRegistry` owns those snapshots and the
//! train/save/load/evaluate lifecycle around them.

pub mod config;
pub mod engines;
pub mod error;
pub mod eval;
pub mod models;
pub mod registry;
pub mod store;
pub mod utils;

pub use config::EngineConfig;
pub use error::{RecommendError, Result};
pub use registry::{ModelRegistry, TrainingSummary};

pub use engines::{
    CfMode, CollaborativeFilteringEngine, CollaborativeModel, ContentModel,
    ContentSimilarityEngine, HybridBlender, HybridModel, Persistable, Recommender,
};

pub use models::{
    Approach, ContentItem, ContentKind, EngineKind, Interaction, InteractionKind, Recommendation,
    ScoreSource, Season,
};
