// ============================================
// User Taste Profiles
// ============================================

use crate::engines::content::features::ProfileSpace;
use crate::models::{Interaction, LocationRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// A user's aggregate taste, built from their interaction history at
/// training time. The vector is an interaction-weighted average of item
/// vectors in the profile space; neighborhood affinities are weight
/// fractions that sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub vector: Option<Vec<f32>>,
    pub neighborhoods: HashMap<String, f64>,
    pub interaction_count: usize,
}

/// Build a profile for every user with at least one interaction. A user
/// only gets a profile when there is a feature space to average in or a
/// neighborhood signal to keep; otherwise they fall through to the
/// propagation and popularity paths at serving time.
pub fn build_profiles(
    interactions: &[Interaction],
    item_vectors: &HashMap<String, Vec<f32>>,
    profile_space: Option<ProfileSpace>,
    locations: &HashMap<String, LocationRecord>,
) -> HashMap<String, UserProfile> {
    let mut by_user: HashMap<&str, Vec<&Interaction>> = HashMap::new();
    for interaction in interactions {
        by_user
            .entry(interaction.user_id.as_str())
            .or_default()
            .push(interaction);
    }

    let dimension = item_vectors.values().next().map(|v| v.len()).unwrap_or(0);

    let mut profiles = HashMap::new();
    for (user_id, history) in by_user {
        let vector = if profile_space.is_some() {
            Some(weighted_average(&history, item_vectors, dimension))
        } else {
            None
        };
        let neighborhoods = neighborhood_fractions(&history, locations);

        if vector.is_some() || !neighborhoods.is_empty() {
            profiles.insert(
                user_id.to_string(),
                UserProfile {
                    vector,
                    neighborhoods,
                    interaction_count: history.len(),
                },
            );
        }
    }

    info!(profiles = profiles.len(), "Built user taste profiles");
    profiles
}

fn weighted_average(
    history: &[&Interaction],
    item_vectors: &HashMap<String, Vec<f32>>,
    dimension: usize,
) -> Vec<f32> {
    let mut accumulated = vec![0.0_f32; dimension];
    let mut total_weight = 0.0_f32;

    for interaction in history {
        if let Some(item_vector) = item_vectors.get(&interaction.content_id) {
            let weight = interaction.kind.weight() as f32;
            for (slot, value) in accumulated.iter_mut().zip(item_vector.iter()) {
                *slot += value * weight;
            }
            total_weight += weight;
        }
    }

    if total_weight > 0.0 {
        for slot in accumulated.iter_mut() {
            *slot /= total_weight;
        }
    }
    accumulated
}

fn neighborhood_fractions(
    history: &[&Interaction],
    locations: &HashMap<String, LocationRecord>,
) -> HashMap<String, f64> {
    let mut fractions: HashMap<String, f64> = HashMap::new();
    let mut total_weight = 0.0;

    for interaction in history {
        if let Some(record) = locations.get(&interaction.content_id) {
            if let Some(neighborhood) = &record.neighborhood {
                let weight = interaction.kind.weight();
                *fractions.entry(neighborhood.clone()).or_insert(0.0) += weight;
                total_weight += weight;
            }
        }
    }

    if total_weight > 0.0 {
        for value in fractions.values_mut() {
            *value /= total_weight;
        }
    }
    fractions
}
