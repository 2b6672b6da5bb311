// ============================================
// Content Feature Spaces
// ============================================
//
// Builds the per-item feature matrices the content engine blends:
// - text: precomputed embedding vectors from the feature store
// - category: binary one-hot over the corpus tag and category vocabulary
// - location: coordinates and neighborhood, folded in pairwise
//
// Rows follow item-id order so the same corpus always produces the same
// matrices.

use crate::config::ContentConfig;
use crate::models::{ContentItem, LocationRecord};
use crate::utils::{cosine_similarity_matrix, rank_descending};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Which feature space user profile vectors live in. Text wins when
/// usable text vectors exist, otherwise profiles fall back to the
/// category space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSpace {
    Text,
    Category,
}

/// Feature matrices for the corpus, rows in item-id order.
pub struct FeatureSet {
    pub items: Vec<String>,
    pub text: Option<Array2<f64>>,
    pub category: Array2<f64>,
    /// Column labels for the category matrix: distinct tags first, then
    /// distinct categories, each block sorted.
    pub vocabulary: Vec<String>,
    pub locations: HashMap<String, LocationRecord>,
}

pub fn build_feature_set(
    items: &[ContentItem],
    text_features: &HashMap<String, Vec<f32>>,
    location_records: &HashMap<String, LocationRecord>,
    config: &ContentConfig,
) -> FeatureSet {
    let mut sorted: Vec<&ContentItem> = items.iter().collect();
    sorted.sort_by(|a, b| a.content_id.cmp(&b.content_id));
    let ids: Vec<String> = sorted.iter().map(|item| item.content_id.clone()).collect();

    let text = build_text_matrix(&ids, text_features);
    let (category, vocabulary) = build_category_matrix(&sorted);
    let locations = build_locations(&sorted, location_records, config);

    info!(
        items = ids.len(),
        has_text = text.is_some(),
        vocabulary = vocabulary.len(),
        located = locations.len(),
        "Built content feature set"
    );

    FeatureSet {
        items: ids,
        text,
        category,
        vocabulary,
        locations,
    }
}

fn build_text_matrix(
    ids: &[String],
    text_features: &HashMap<String, Vec<f32>>,
) -> Option<Array2<f64>> {
    if text_features.is_empty() {
        return None;
    }

    let dimension = text_features.values().map(|v| v.len()).max().unwrap_or(0);
    if dimension == 0 {
        return None;
    }

    let mut matrix = Array2::zeros((ids.len(), dimension));
    let mut any_signal = false;
    for (row, id) in ids.iter().enumerate() {
        if let Some(vector) = text_features.get(id) {
            for (col, value) in vector.iter().enumerate().take(dimension) {
                matrix[[row, col]] = *value as f64;
                if *value != 0.0 {
                    any_signal = true;
                }
            }
        }
    }

    if any_signal {
        Some(matrix)
    } else {
        info!("Text vectors are all zero, relying on category and location signals");
        None
    }
}

fn build_category_matrix(items: &[&ContentItem]) -> (Array2<f64>, Vec<String>) {
    let mut tags: Vec<String> = items
        .iter()
        .flat_map(|item| item.tags.iter().cloned())
        .collect();
    tags.sort();
    tags.dedup();

    let mut categories: Vec<String> = items
        .iter()
        .flat_map(|item| item.categories.iter().cloned())
        .collect();
    categories.sort();
    categories.dedup();

    let tag_offset: HashMap<&str, usize> = tags
        .iter()
        .enumerate()
        .map(|(col, tag)| (tag.as_str(), col))
        .collect();
    let category_offset: HashMap<&str, usize> = categories
        .iter()
        .enumerate()
        .map(|(col, category)| (category.as_str(), col + tags.len()))
        .collect();

    let mut vocabulary = tags.clone();
    vocabulary.extend(categories.iter().cloned());

    let mut matrix = Array2::zeros((items.len(), vocabulary.len()));
    for (row, item) in items.iter().enumerate() {
        for tag in &item.tags {
            if let Some(&col) = tag_offset.get(tag.as_str()) {
                matrix[[row, col]] = 1.0;
            }
        }
        for category in &item.categories {
            if let Some(&col) = category_offset.get(category.as_str()) {
                matrix[[row, col]] = 1.0;
            }
        }
    }

    (matrix, vocabulary)
}

/// Prefer records from the feature store; derive from raw item locations
/// when the store has none.
fn build_locations(
    items: &[&ContentItem],
    location_records: &HashMap<String, LocationRecord>,
    config: &ContentConfig,
) -> HashMap<String, LocationRecord> {
    if !location_records.is_empty() {
        return location_records.clone();
    }

    let mut derived = HashMap::new();
    for item in items {
        if let Some(location) = &item.location {
            let distance_to_center = ((location.latitude - config.city_center_latitude).powi(2)
                + (location.longitude - config.city_center_longitude).powi(2))
            .sqrt();
            derived.insert(
                item.content_id.clone(),
                LocationRecord {
                    latitude: location.latitude,
                    longitude: location.longitude,
                    neighborhood: location.neighborhood.clone(),
                    distance_to_center,
                },
            );
        }
    }
    derived
}

/// Weighted blend of the three similarity signals, normalized per row by
/// the row maximum (the self-pair included) and truncated to each item's
/// strongest neighbors.
pub fn blended_similarity_rows(
    features: &FeatureSet,
    config: &ContentConfig,
) -> HashMap<String, Vec<(String, f64)>> {
    let n = features.items.len();
    let mut blended = Array2::<f64>::zeros((n, n));

    if let Some(text) = &features.text {
        blended.scaled_add(config.text_weight, &cosine_similarity_matrix(text.view()));
    }
    if !features.vocabulary.is_empty() {
        blended.scaled_add(
            config.category_weight,
            &cosine_similarity_matrix(features.category.view()),
        );
    }

    for i in 0..n {
        let Some(here) = features.locations.get(&features.items[i]) else {
            continue;
        };
        for j in 0..n {
            let Some(there) = features.locations.get(&features.items[j]) else {
                continue;
            };
            let distance = ((here.latitude - there.latitude).powi(2)
                + (here.longitude - there.longitude).powi(2))
            .sqrt();
            blended[[i, j]] += (-distance / config.location_scale).exp() * config.location_weight;

            if let (Some(a), Some(b)) = (&here.neighborhood, &there.neighborhood) {
                if a == b {
                    blended[[i, j]] += config.neighborhood_bonus * config.location_weight;
                }
            }
        }
    }

    for mut row in blended.rows_mut() {
        let max = row.iter().cloned().fold(0.0, f64::max);
        if max > 0.0 {
            row.mapv_inplace(|v| v / max);
        }
    }

    let mut rows = HashMap::with_capacity(n);
    for (i, id) in features.items.iter().enumerate() {
        let mut neighbors: Vec<(String, f64)> = Vec::new();
        for (j, other) in features.items.iter().enumerate() {
            if i == j {
                continue;
            }
            let similarity = blended[[i, j]];
            if similarity > 0.0 {
                neighbors.push((other.clone(), similarity));
            }
        }
        rank_descending(&mut neighbors);
        neighbors.truncate(config.max_neighbors);
        rows.insert(id.clone(), neighbors);
    }
    rows
}

/// Per-item vectors in the space user profiles are built in.
pub fn profile_space_vectors(
    features: &FeatureSet,
) -> (Option<ProfileSpace>, HashMap<String, Vec<f32>>) {
    if let Some(text) = &features.text {
        let mut vectors = HashMap::with_capacity(features.items.len());
        for (row, id) in features.items.iter().enumerate() {
            let vector: Vec<f32> = text.row(row).iter().map(|v| *v as f32).collect();
            vectors.insert(id.clone(), vector);
        }
        return (Some(ProfileSpace::Text), vectors);
    }

    if !features.vocabulary.is_empty() {
        let mut vectors = HashMap::with_capacity(features.items.len());
        for (row, id) in features.items.iter().enumerate() {
            let vector: Vec<f32> = features.category.row(row).iter().map(|v| *v as f32).collect();
            vectors.insert(id.clone(), vector);
        }
        return (Some(ProfileSpace::Category), vectors);
    }

    (None, HashMap::new())
}
