//! Distance functions for exact search.

/// Squared Euclidean distance between two equal-length vectors.
///
/// Callers validate dimensions; extra components of the longer slice are ignored.
#[inline]
#[must_use]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Position of the first NaN or infinite component, if any.
///
/// Distances are only totally ordered when every component is finite.
#[must_use]
pub fn non_finite_component(vector: &[f32]) -> Option<usize> {
    vector.iter().position(|value| !value.is_finite())
}
