// ============================================
// User-Item Interaction Matrix
// ============================================

use crate::models::Interaction;
use crate::utils::{cosine_similarity_matrix, rank_descending};
use ndarray::{Array2, ArrayView2};
use std::collections::HashMap;

/// Dense user-item weight matrix. Users and items are sorted by id so a
/// rebuild from the same interactions is cell-for-cell identical.
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    pub users: Vec<String>,
    pub items: Vec<String>,
    pub user_pos: HashMap<String, usize>,
    pub item_pos: HashMap<String, usize>,
    pub values: Array2<f64>,
}

impl InteractionMatrix {
    /// Aggregate interaction weights per (user, item) cell. Repeat
    /// interactions with the same item accumulate.
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut users: Vec<String> = interactions.iter().map(|i| i.user_id.clone()).collect();
        users.sort();
        users.dedup();

        let mut items: Vec<String> = interactions.iter().map(|i| i.content_id.clone()).collect();
        items.sort();
        items.dedup();

        let user_pos: HashMap<String, usize> = users
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();
        let item_pos: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.clone(), pos))
            .collect();

        let mut values = Array2::zeros((users.len(), items.len()));
        for interaction in interactions {
            let row = user_pos[&interaction.user_id];
            let col = item_pos[&interaction.content_id];
            values[[row, col]] += interaction.kind.weight();
        }

        Self {
            users,
            items,
            user_pos,
            item_pos,
            values,
        }
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_items(&self) -> usize {
        self.items.len()
    }

    /// Per-user (item, weight) lists in item-id order, positive cells only.
    pub fn user_item_weights(&self) -> HashMap<String, Vec<(String, f64)>> {
        let mut weights = HashMap::with_capacity(self.users.len());
        for (row, user) in self.users.iter().enumerate() {
            let mut owned = Vec::new();
            for (col, item) in self.items.iter().enumerate() {
                let value = self.values[[row, col]];
                if value > 0.0 {
                    owned.push((item.clone(), value));
                }
            }
            weights.insert(user.clone(), owned);
        }
        weights
    }

    /// Subtract each user's mean weight from that user's rated cells.
    /// The mean is taken over positive cells only and unrated cells stay
    /// zero, so sparsity is preserved. Returns the per-user means.
    pub fn center_rows(&mut self) -> HashMap<String, f64> {
        let mut means = HashMap::with_capacity(self.users.len());
        for (row, user) in self.users.iter().enumerate() {
            let mut sum = 0.0;
            let mut rated = 0usize;
            for col in 0..self.items.len() {
                let value = self.values[[row, col]];
                if value > 0.0 {
                    sum += value;
                    rated += 1;
                }
            }
            let mean = if rated > 0 { sum / rated as f64 } else { 0.0 };
            for col in 0..self.items.len() {
                if self.values[[row, col]] > 0.0 {
                    self.values[[row, col]] -= mean;
                }
            }
            means.insert(user.clone(), mean);
        }
        means
    }
}

/// Cosine similarity between the rows of `matrix`, keyed by `labels`.
/// Self-pairs are skipped, non-positive similarities dropped, and each
/// neighbor list is ranked strongest-first (id ascending on ties) and
/// truncated to `max_neighbors`.
pub fn row_similarity_map(
    matrix: ArrayView2<'_, f64>,
    labels: &[String],
    max_neighbors: usize,
) -> HashMap<String, Vec<(String, f64)>> {
    let similarities = cosine_similarity_matrix(matrix);

    let mut map = HashMap::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        let mut neighbors: Vec<(String, f64)> = Vec::new();
        for (j, other) in labels.iter().enumerate() {
            if i == j {
                continue;
            }
            let similarity = similarities[[i, j]];
            if similarity > 0.0 {
                neighbors.push((other.clone(), similarity));
            }
        }
        rank_descending(&mut neighbors);
        neighbors.truncate(max_neighbors);
        map.insert(label.clone(), neighbors);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionKind;
    use chrono::Utc;

    fn create_test_interaction(user: &str, content: &str, kind: InteractionKind) -> Interaction {
        Interaction {
            user_id: user.to_string(),
            content_id: content.to_string(),
            kind,
            timestamp: Utc::now(),
            session_id: None,
        }
    }

    #[test]
    fn test_matrix_aggregates_repeat_interactions() {
        let interactions = vec![
            create_test_interaction("u1", "c1", InteractionKind::View),
            create_test_interaction("u1", "c1", InteractionKind::Save),
            create_test_interaction("u2", "c2", InteractionKind::Click),
        ];

        let matrix = InteractionMatrix::from_interactions(&interactions);

        assert_eq!(matrix.users, vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(matrix.items, vec!["c1".to_string(), "c2".to_string()]);
        // view 1.0 + save 3.0
        assert_eq!(matrix.values[[0, 0]], 4.0);
        assert_eq!(matrix.values[[1, 1]], 2.0);
        assert_eq!(matrix.values[[0, 1]], 0.0);
    }

    #[test]
    fn test_center_rows_uses_rated_cells_only() {
        let interactions = vec![
            create_test_interaction("u1", "c1", InteractionKind::Share),
            create_test_interaction("u1", "c2", InteractionKind::Click),
            create_test_interaction("u2", "c3", InteractionKind::View),
        ];

        let mut matrix = InteractionMatrix::from_interactions(&interactions);
        let means = matrix.center_rows();

        // u1 rated 4.0 and 2.0, mean 3.0 over the two rated cells
        assert_eq!(means["u1"], 3.0);
        assert_eq!(matrix.values[[0, 0]], 1.0);
        assert_eq!(matrix.values[[0, 1]], -1.0);
        // unrated cell untouched
        assert_eq!(matrix.values[[0, 2]], 0.0);
        assert_eq!(means["u2"], 1.0);
    }

    #[test]
    fn test_row_similarity_identical_rows() {
        let values =
            Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 2.0, 4.0, -1.0, 0.5]).unwrap();
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let map = row_similarity_map(values.view(), &labels, 10);

        // a and b are parallel
        assert_eq!(map["a"][0].0, "b");
        assert!((map["a"][0].1 - 1.0).abs() < 1e-9);
        // c points away from a, dropped by the positive filter
        assert!(map["a"].iter().all(|(id, _)| id != "c"));
    }

    #[test]
    fn test_row_similarity_truncates_neighbors() {
        let values = Array2::from_elem((4, 2), 1.0);
        let labels = vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ];

        let map = row_similarity_map(values.view(), &labels, 2);

        assert_eq!(map["a"].len(), 2);
        // equal similarity resolves by id
        assert_eq!(map["a"][0].0, "b");
        assert_eq!(map["a"][1].0, "c");
    }
}
