// ============================================
// Model Registry
// ============================================
//
// Owns one trained-model slot per engine and the lifecycle around them:
// train against the stores, serve from immutable Arc snapshots, persist
// one JSON bundle per engine, evaluate on a held-out split. Retraining
// builds the full model first and swaps the slot afterwards, so readers
// always see either the prior bundle or the complete new one. A single
// async mutex serializes training; serving never takes it.

use crate::config::EngineConfig;
use crate::engines::hybrid::HybridBundle;
use crate::engines::{
    CollaborativeFilteringEngine, CollaborativeModel, ContentModel, ContentSimilarityEngine,
    HybridBlender, HybridModel, Persistable, Recommender,
};
use crate::error::{RecommendError, Result};
use crate::eval::{evaluate_against, holdout_split, EvaluationReport, TestRecord};
use crate::models::{EngineKind, Recommendation, RecommendationLog, Season};
use crate::store::{ContentStore, InteractionStore, UserStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

const COLLABORATIVE_BUNDLE: &str = "collaborative.json";
const CONTENT_BUNDLE: &str = "content.json";
const HYBRID_BUNDLE: &str = "hybrid.json";

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub engine: EngineKind,
    pub interactions: usize,
    pub items: usize,
    pub duration_ms: u64,
    pub trained_at: DateTime<Utc>,
}

/// Trained-model slots over one backing store. `S` is typically a single
/// struct implementing all three store traits.
pub struct ModelRegistry<S> {
    store: Arc<S>,
    config: EngineConfig,
    collaborative: RwLock<Option<Arc<CollaborativeModel>>>,
    content: RwLock<Option<Arc<ContentModel>>>,
    hybrid: RwLock<Option<Arc<HybridModel>>>,
    training: Mutex<()>,
}

impl<S> ModelRegistry<S>
where
    S: ContentStore + InteractionStore + UserStore,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            collaborative: RwLock::new(None),
            content: RwLock::new(None),
            hybrid: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub async fn is_trained(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::Collaborative => self.collaborative.read().await.is_some(),
            EngineKind::Content => self.content.read().await.is_some(),
            EngineKind::Hybrid => self.hybrid.read().await.is_some(),
        }
    }

    /// Retrain one engine. Training failures leave the prior bundle in
    /// force.
    pub async fn train(&self, kind: EngineKind) -> Result<TrainingSummary> {
        let _guard = self.training.lock().await;
        match kind {
            EngineKind::Collaborative => self.train_collaborative().await,
            EngineKind::Content => self.train_content().await,
            EngineKind::Hybrid => self.train_hybrid().await,
        }
    }

    /// Retrain everything, collaborative and content first so the hybrid
    /// blend sees fresh arms.
    pub async fn train_all(&self) -> Result<Vec<TrainingSummary>> {
        let _guard = self.training.lock().await;
        let mut summaries = Vec::with_capacity(3);
        summaries.push(self.train_collaborative().await?);
        summaries.push(self.train_content().await?);
        summaries.push(self.train_hybrid().await?);
        Ok(summaries)
    }

    async fn train_collaborative(&self) -> Result<TrainingSummary> {
        let started = Instant::now();
        let interactions = self.store.list_interactions().await?;

        let engine = CollaborativeFilteringEngine::new(self.config.collaborative.clone());
        let model = engine.train(&interactions)?;
        let items = model.popularity.len();
        *self.collaborative.write().await = Some(Arc::new(model));

        Ok(self.summarize(EngineKind::Collaborative, interactions.len(), items, started))
    }

    async fn train_content(&self) -> Result<TrainingSummary> {
        let started = Instant::now();
        let (items, interactions, text_features, location_features) = tokio::try_join!(
            self.store.list_items(),
            self.store.list_interactions(),
            self.store.text_features(),
            self.store.location_features(),
        )?;

        let engine = ContentSimilarityEngine::new(self.config.content.clone());
        let model = engine.train(&items, &interactions, &text_features, &location_features)?;
        *self.content.write().await = Some(Arc::new(model));

        Ok(self.summarize(EngineKind::Content, interactions.len(), items.len(), started))
    }

    /// The hybrid blend wants both arms but works with one; an arm whose
    /// training fails is logged and left out, matching how serving treats
    /// a failing arm.
    async fn train_hybrid(&self) -> Result<TrainingSummary> {
        let started = Instant::now();

        if self.collaborative.read().await.is_none() {
            if let Err(error) = self.train_collaborative().await {
                warn!(error = %error, "Collaborative arm unavailable for hybrid blend");
            }
        }
        if self.content.read().await.is_none() {
            if let Err(error) = self.train_content().await {
                warn!(error = %error, "Content arm unavailable for hybrid blend");
            }
        }

        let collaborative = self.collaborative.read().await.clone();
        let content = self.content.read().await.clone();
        let (items, interactions, preferences) = tokio::try_join!(
            self.store.list_items(),
            self.store.list_interactions(),
            self.store.all_neighborhood_preferences(),
        )?;

        let blender = HybridBlender::new(self.config.hybrid.clone());
        let model = blender.blend(collaborative, content, &items, &interactions, preferences)?;
        *self.hybrid.write().await = Some(Arc::new(model));

        Ok(self.summarize(EngineKind::Hybrid, interactions.len(), items.len(), started))
    }

    fn summarize(
        &self,
        engine: EngineKind,
        interactions: usize,
        items: usize,
        started: Instant,
    ) -> TrainingSummary {
        let summary = TrainingSummary {
            engine,
            interactions,
            items,
            duration_ms: started.elapsed().as_millis() as u64,
            trained_at: Utc::now(),
        };
        info!(
            engine = %summary.engine,
            interactions = summary.interactions,
            items = summary.items,
            duration_ms = summary.duration_ms,
            "Engine trained"
        );
        summary
    }

    pub async fn recommend_for_user(
        &self,
        kind: EngineKind,
        user_id: &str,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        let recommendations = match kind {
            EngineKind::Collaborative => self
                .collaborative_model()
                .await?
                .recommend_for_user(user_id, n)?,
            EngineKind::Content => self.content_model().await?.recommend_for_user(user_id, n)?,
            EngineKind::Hybrid => self.hybrid_model().await?.recommend_for_user(user_id, n)?,
        };
        self.log_served(user_id, &recommendations).await;
        Ok(recommendations)
    }

    pub async fn recommend_similar(
        &self,
        kind: EngineKind,
        content_id: &str,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        match kind {
            EngineKind::Collaborative => self
                .collaborative_model()
                .await?
                .recommend_similar(content_id, n),
            EngineKind::Content => self.content_model().await?.recommend_similar(content_id, n),
            EngineKind::Hybrid => self.hybrid_model().await?.recommend_similar(content_id, n),
        }
    }

    /// Season and neighborhood aware query against the hybrid model.
    pub async fn recommend_contextual(
        &self,
        user_id: Option<&str>,
        neighborhood: Option<&str>,
        season: Option<Season>,
        n: usize,
    ) -> Result<Vec<Recommendation>> {
        let model = self.hybrid_model().await?;
        let recommendations = model.contextual_recommendations(user_id, neighborhood, season, n)?;
        if let Some(user) = user_id {
            self.log_served(user, &recommendations).await;
        }
        Ok(recommendations)
    }

    /// Split the interaction log, train a throwaway model on the retained
    /// part, and measure how the hidden targets rank.
    pub async fn evaluate(&self, kind: EngineKind) -> Result<EvaluationReport> {
        let interactions = self.store.list_interactions().await?;
        let split = holdout_split(&interactions, &self.config.evaluation);
        let top_k = self.config.evaluation.top_k;

        match kind {
            EngineKind::Collaborative => {
                let engine = CollaborativeFilteringEngine::new(self.config.collaborative.clone());
                let model = engine.train(&split.retained)?;
                Ok(evaluate_against(&model, &split.test_records, top_k))
            }
            EngineKind::Content => {
                let (items, text_features, location_features) = tokio::try_join!(
                    self.store.list_items(),
                    self.store.text_features(),
                    self.store.location_features(),
                )?;
                let engine = ContentSimilarityEngine::new(self.config.content.clone());
                let model =
                    engine.train(&items, &split.retained, &text_features, &location_features)?;
                Ok(evaluate_against(&model, &split.test_records, top_k))
            }
            EngineKind::Hybrid => {
                let collaborative =
                    match CollaborativeFilteringEngine::new(self.config.collaborative.clone())
                        .train(&split.retained)
                    {
                        Ok(model) => Some(Arc::new(model)),
                        Err(error) => {
                            warn!(error = %error, "Collaborative arm unavailable for evaluation");
                            None
                        }
                    };

                let (items, text_features, location_features) = tokio::try_join!(
                    self.store.list_items(),
                    self.store.text_features(),
                    self.store.location_features(),
                )?;
                let content = match ContentSimilarityEngine::new(self.config.content.clone())
                    .train(&items, &split.retained, &text_features, &location_features)
                {
                    Ok(model) => Some(Arc::new(model)),
                    Err(error) => {
                        warn!(error = %error, "Content arm unavailable for evaluation");
                        None
                    }
                };

                let preferences = self.store.all_neighborhood_preferences().await?;
                let blender = HybridBlender::new(self.config.hybrid.clone());
                let model =
                    blender.blend(collaborative, content, &items, &split.retained, preferences)?;
                Ok(evaluate_against(&model, &split.test_records, top_k))
            }
        }
    }

    /// Score the live bundle against a supplied held-out set, no split.
    pub async fn evaluate_with(
        &self,
        kind: EngineKind,
        test_records: &[TestRecord],
    ) -> Result<EvaluationReport> {
        let top_k = self.config.evaluation.top_k;
        match kind {
            EngineKind::Collaborative => Ok(evaluate_against(
                self.collaborative_model().await?.as_ref(),
                test_records,
                top_k,
            )),
            EngineKind::Content => Ok(evaluate_against(
                self.content_model().await?.as_ref(),
                test_records,
                top_k,
            )),
            EngineKind::Hybrid => Ok(evaluate_against(
                self.hybrid_model().await?.as_ref(),
                test_records,
                top_k,
            )),
        }
    }

    /// Persist every trained bundle into `dir`, one JSON document each.
    pub async fn save(&self, dir: &Path) -> Result<()> {
        if let Some(model) = self.collaborative.read().await.clone() {
            model.save(&dir.join(COLLABORATIVE_BUNDLE))?;
            info!(engine = %EngineKind::Collaborative, "Saved model bundle");
        }
        if let Some(model) = self.content.read().await.clone() {
            model.save(&dir.join(CONTENT_BUNDLE))?;
            info!(engine = %EngineKind::Content, "Saved model bundle");
        }
        if let Some(model) = self.hybrid.read().await.clone() {
            model.bundle().save(&dir.join(HYBRID_BUNDLE))?;
            info!(engine = %EngineKind::Hybrid, "Saved model bundle");
        }
        Ok(())
    }

    /// Load whichever bundles exist in `dir`, swapping each slot only
    /// once its bundle parsed completely. The hybrid bundle re-attaches
    /// the arms loaded in the same pass (or already live).
    pub async fn load(&self, dir: &Path) -> Result<()> {
        let collaborative_path = dir.join(COLLABORATIVE_BUNDLE);
        if collaborative_path.exists() {
            let model = CollaborativeModel::load(&collaborative_path)?;
            *self.collaborative.write().await = Some(Arc::new(model));
            info!(engine = %EngineKind::Collaborative, "Loaded model bundle");
        }

        let content_path = dir.join(CONTENT_BUNDLE);
        if content_path.exists() {
            let model = ContentModel::load(&content_path)?;
            *self.content.write().await = Some(Arc::new(model));
            info!(engine = %EngineKind::Content, "Loaded model bundle");
        }

        let hybrid_path = dir.join(HYBRID_BUNDLE);
        if hybrid_path.exists() {
            let bundle = HybridBundle::load(&hybrid_path)?;
            let collaborative = self.collaborative.read().await.clone();
            let content = self.content.read().await.clone();
            if collaborative.is_none() && content.is_none() {
                warn!("Hybrid bundle loaded without either arm, serving catalog popularity only");
            }
            *self.hybrid.write().await =
                Some(Arc::new(HybridModel::from_parts(bundle, collaborative, content)));
            info!(engine = %EngineKind::Hybrid, "Loaded model bundle");
        }

        Ok(())
    }

    async fn collaborative_model(&self) -> Result<Arc<CollaborativeModel>> {
        self.collaborative
            .read()
            .await
            .clone()
            .ok_or(RecommendError::NotTrained(EngineKind::Collaborative))
    }

    async fn content_model(&self) -> Result<Arc<ContentModel>> {
        self.content
            .read()
            .await
            .clone()
            .ok_or(RecommendError::NotTrained(EngineKind::Content))
    }

    async fn hybrid_model(&self) -> Result<Arc<HybridModel>> {
        self.hybrid
            .read()
            .await
            .clone()
            .ok_or(RecommendError::NotTrained(EngineKind::Hybrid))
    }

    async fn log_served(&self, user_id: &str, recommendations: &[Recommendation]) {
        let Some(first) = recommendations.first() else {
            return;
        };
        let content_ids = recommendations
            .iter()
            .map(|r| r.content_id.clone())
            .collect();
        let log = RecommendationLog::new(user_id, content_ids, first.approach);
        if let Err(error) = self.store.log_recommendation(log).await {
            warn!(user_id = %user_id, error = %error, "Failed to record served recommendations");
        }
    }
}
