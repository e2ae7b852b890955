use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(vec: Vec<f32>) -> Self {
        Self(vec)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|x| x.is_finite())
    }

    /// Zero when the dimensions differ or either vector has zero norm.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }

        let dot_product: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![2.0, 0.0]);
        let c = Embedding::new(vec![0.0, 3.0]);

        assert!((a.cosine_similarity(&b) - 1.0).abs() < 1e-6);
        assert!(a.cosine_similarity(&c).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        let zero = Embedding::new(vec![0.0, 0.0]);
        let a = Embedding::new(vec![1.0, 0.0]);
        let short = Embedding::new(vec![1.0]);

        assert_eq!(a.cosine_similarity(&zero), 0.0);
        assert_eq!(a.cosine_similarity(&short), 0.0);
    }

    #[test]
    fn test_is_finite() {
        assert!(Embedding::new(vec![0.5, -1.0]).is_finite());
        assert!(!Embedding::new(vec![f32::NAN]).is_finite());
        assert!(!Embedding::new(vec![f32::INFINITY]).is_finite());
    }
}
