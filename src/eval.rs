// ============================================
// Offline Evaluation
// ============================================
//
// Hit Rate and Mean Reciprocal Rank over a held-out target per test
// user. The split hides a random fraction of the interaction log; the
// caller trains a throwaway model on the retained part so the hidden
// targets are genuinely unseen, then scores it here. A supplied test
// set skips the split and scores the live model as-is.

use crate::config::EvaluationConfig;
use crate::engines::Recommender;
use crate::models::Interaction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// One held-out ground-truth item for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub user_id: String,
    pub content_id: String,
}

impl TestRecord {
    pub fn new(user_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content_id: content_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub hit_rate: f64,
    pub mean_reciprocal_rank: f64,
    pub num_test_users: usize,
}

/// Interactions to retrain on, and the targets hidden from them.
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    pub retained: Vec<Interaction>,
    pub test_records: Vec<TestRecord>,
}

/// Hide `holdout_fraction` of the interactions at random and reduce the
/// hidden part to one target per user, their most recent hidden
/// interaction. A configured seed makes the split reproducible.
pub fn holdout_split(interactions: &[Interaction], config: &EvaluationConfig) -> HoldoutSplit {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut indices: Vec<usize> = (0..interactions.len()).collect();
    indices.shuffle(&mut rng);

    let n_test = (interactions.len() as f64 * config.holdout_fraction) as usize;
    let held_out: Vec<&Interaction> = indices[..n_test]
        .iter()
        .map(|&index| &interactions[index])
        .collect();

    let mut retained: Vec<Interaction> = indices[n_test..]
        .iter()
        .map(|&index| interactions[index].clone())
        .collect();
    // restore corpus order so recency logic in training is unaffected
    retained.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut latest: HashMap<&str, &Interaction> = HashMap::new();
    for interaction in held_out {
        latest
            .entry(interaction.user_id.as_str())
            .and_modify(|current| {
                if interaction.timestamp > current.timestamp {
                    *current = interaction;
                }
            })
            .or_insert(interaction);
    }

    let mut test_records: Vec<TestRecord> = latest
        .into_values()
        .map(|interaction| TestRecord::new(&interaction.user_id, &interaction.content_id))
        .collect();
    test_records.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    info!(
        retained = retained.len(),
        test_users = test_records.len(),
        "Built evaluation holdout"
    );

    HoldoutSplit {
        retained,
        test_records,
    }
}

/// Ask the model for top-k per test user and measure whether (and how
/// highly) each hidden target ranks. Users the model fails on are
/// skipped, not counted.
pub fn evaluate_against(
    model: &dyn Recommender,
    test_records: &[TestRecord],
    top_k: usize,
) -> EvaluationReport {
    let mut evaluated = 0usize;
    let mut hits = 0usize;
    let mut reciprocal_sum = 0.0;

    for record in test_records {
        let recommendations = match model.recommend_for_user(&record.user_id, top_k) {
            Ok(recommendations) => recommendations,
            Err(error) => {
                warn!(user_id = %record.user_id, error = %error, "Skipping user during evaluation");
                continue;
            }
        };
        evaluated += 1;

        if let Some(position) = recommendations
            .iter()
            .position(|r| r.content_id == record.content_id)
        {
            hits += 1;
            reciprocal_sum += 1.0 / (position + 1) as f64;
        }
    }

    let (hit_rate, mean_reciprocal_rank) = if evaluated > 0 {
        (
            hits as f64 / evaluated as f64,
            reciprocal_sum / evaluated as f64,
        )
    } else {
        (0.0, 0.0)
    };

    let report = EvaluationReport {
        hit_rate,
        mean_reciprocal_rank,
        num_test_users: evaluated,
    };
    info!(
        engine = %model.kind(),
        hit_rate = report.hit_rate,
        mean_reciprocal_rank = report.mean_reciprocal_rank,
        num_test_users = report.num_test_users,
        "Evaluation complete"
    );
    report
}
