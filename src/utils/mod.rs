// Shared math and ranking helpers.

use ndarray::{Array2, ArrayView2};

/// Cosine similarity between two f32 feature vectors, widened to f64.
///
/// Formula: cos(A, B) = (A · B) / (||A|| × ||B||)
pub fn cosine_similarity_f32(vec_a: &[f32], vec_b: &[f32]) -> f64 {
    if vec_a.len() != vec_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vec_a.iter().zip(vec_b.iter()).map(|(a, b)| a * b).sum();
    let norm_a: f32 = vec_a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = vec_b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot_product / (norm_a * norm_b)) as f64
    }
}

/// Pairwise cosine similarity between the rows of a matrix. Zero rows
/// stay zero rather than producing NaN.
pub fn cosine_similarity_matrix(matrix: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut normalized = matrix.to_owned();
    for mut row in normalized.rows_mut() {
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    normalized.dot(&normalized.t())
}

/// Sort scored entries by score descending with content_id ascending as the
/// tie-break, so every ranking in the crate is deterministic.
pub fn rank_descending(entries: &mut Vec<(String, f64)>) {
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

/// Rank and keep the top n entries.
pub fn take_top(mut entries: Vec<(String, f64)>, n: usize) -> Vec<(String, f64)> {
    rank_descending(&mut entries);
    entries.truncate(n);
    entries
}
