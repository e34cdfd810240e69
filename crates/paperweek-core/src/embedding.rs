//! Vector utilities for embedding similarity.
//!
//! Concrete embedding providers (Ollama, OpenAI, Gemini) live in the
//! `paperweek` app crate; this module only does the math.

/// Dot product of two equal-length vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length.
///
/// A zero (or near-zero) vector is returned unchanged, so it scores `0.0`
/// against everything.
///
/// ```rust
/// use paperweek_core::embedding::l2_normalize;
///
/// let v = l2_normalize(&[3.0, 4.0]);
/// assert!((v[0] - 0.6).abs() < 1e-6);
/// assert!((v[1] - 0.8).abs() < 1e-6);
/// ```
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = l2_norm(v);
    if norm < f32::EPSILON {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        dot(&l2_normalize(a), &l2_normalize(b))
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        assert!((cosine(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_dot_matches_formula() {
        let a = [1.0, 2.0, 2.0];
        let b = [4.0, 0.0, 3.0];
        let expected = dot(&a, &b) / (l2_norm(&a) * l2_norm(&b));
        assert!((cosine(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_dot_empty_and_mismatched() {
        assert_eq!(dot(&[], &[]), 0.0);
        assert_eq!(dot(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
