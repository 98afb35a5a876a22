use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ReferenceError {
    #[error("reference embedding is empty")]
    Empty,
    #[error("reference embedding contains non-finite values")]
    NonFinite,
    #[error("reference embedding has zero norm")]
    ZeroNorm,
}

/// The reference face vector with its norm computed once.
///
/// Immutable after construction; shared read-only by every comparison in
/// a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEmbedding {
    vector: Vec<f32>,
    norm: f64,
}

impl ReferenceEmbedding {
    pub fn new(vector: Vec<f32>) -> Result<Self, ReferenceError> {
        if vector.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(ReferenceError::NonFinite);
        }
        let norm = l2_norm(&vector);
        if norm == 0.0 {
            return Err(ReferenceError::ZeroNorm);
        }
        Ok(Self { vector, norm })
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Cosine distance to `candidate`, reusing the cached reference norm.
    ///
    /// `None` when the candidate has zero norm or a different dimension.
    pub fn distance_to(&self, candidate: &[f32]) -> Option<f64> {
        if candidate.len() != self.vector.len() {
            return None;
        }
        let candidate_norm = l2_norm(candidate);
        if candidate_norm == 0.0 || !candidate_norm.is_finite() {
            return None;
        }
        Some(1.0 - dot(&self.vector, candidate) / (self.norm * candidate_norm))
    }
}

/// `1 - dot(a, b) / (|a| * |b|)` computed in `f64`.
///
/// `None` for mismatched lengths, empty input or a zero-norm operand.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let norms = l2_norm(a) * l2_norm(b);
    if norms == 0.0 || !norms.is_finite() {
        return None;
    }
    Some(1.0 - dot(a, b) / norms)
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt()
}
