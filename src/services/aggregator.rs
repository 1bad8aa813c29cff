//! Aggregator service for merging per-month payloads

use crate::types::Combine;

/// Aggregator for folding month payloads into one aggregate
pub struct Aggregator;

impl Aggregator {
    /// Merge payloads in the given order, seeding from the first.
    ///
    /// Returns `None` for an empty slice. The slice does not need to be sorted
    /// by month; the result is the same for any ordering.
    pub fn merge<T: Combine + Clone>(payloads: &[T]) -> Option<T> {
        let (first, rest) = payloads.split_first()?;
        let mut out = first.clone();
        for payload in rest {
            out.combine(payload);
        }
        Some(out)
    }

    /// Like [`Aggregator::merge`], but an empty slice yields the identity.
    pub fn merge_or_identity<T: Combine + Clone>(payloads: &[T]) -> T {
        Self::merge(payloads).unwrap_or_else(T::identity)
    }
}
