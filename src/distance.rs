//! Built-in distance functions for dense float vectors.
//!
//! These back the stock [`VectorSpace`](crate::space::VectorSpace). Custom
//! spaces implement [`Space`](crate::space::Space) directly and may use any
//! distance, metric or not.

/// Supported distance metrics for the built-in vector space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance: sqrt(sum((a[i] - b[i])^2))
    Euclidean,
    /// Squared Euclidean distance: sum((a[i] - b[i])^2)
    /// Faster than Euclidean when only relative ordering matters.
    EuclideanSquared,
    /// Cosine distance: 1 - cosine_similarity(a, b)
    /// Range [0, 2] where 0 means identical direction.
    Cosine,
    /// Negative dot product: -dot(a, b)
    /// Negated so that smaller means closer. Not a metric.
    DotProduct,
    /// Manhattan (L1) distance: sum(|a[i] - b[i]|)
    /// Also known as taxicab distance or city block distance.
    Manhattan,
}

impl DistanceMetric {
    /// Compute the distance between two vectors using this metric.
    ///
    /// # Panics
    /// Panics if the vectors have different dimensions.
    #[inline]
    pub fn compute(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => euclidean_distance(a, b),
            DistanceMetric::EuclideanSquared => euclidean_distance_squared(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::DotProduct => -dot_product(a, b),
            DistanceMetric::Manhattan => manhattan_distance(a, b),
        }
    }

    /// Whether this metric satisfies the metric axioms (symmetry, triangle
    /// inequality). Indices that rely on triangle-inequality pruning are only
    /// exact over metrics for which this returns `true`.
    #[inline]
    pub fn is_metric(&self) -> bool {
        matches!(self, DistanceMetric::Euclidean | DistanceMetric::Manhattan)
    }
}

/// Compute the Euclidean (L2) distance between two vectors.
///
/// Returns sqrt(sum((a[i] - b[i])^2))
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Compute the squared Euclidean distance between two vectors.
///
/// Returns sum((a[i] - b[i])^2)
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Compute the dot product of two vectors.
///
/// Returns sum(a[i] * b[i])
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute the cosine distance between two vectors.
///
/// Returns 1 - dot(a, b) / (||a|| * ||b||). Zero-norm inputs get distance 1.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    let dot = dot_product(a, b);
    let norm_a = dot_product(a, a).sqrt();
    let norm_b = dot_product(b, b).sqrt();

    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

/// Compute the Manhattan (L1) distance between two vectors.
///
/// Returns sum(|a[i] - b[i]|)
#[inline]
pub fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vector dimensions must match");

    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}
