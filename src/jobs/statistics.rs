use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;

/// Per-job tile counters, reported as deltas by workers and folded together
/// with [`merge`](Self::merge). The default value is the merge identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheJobStatistics {
    tiles_created: u64,
    tiles_skipped: u64,
    tiles_failed: u64,
}

impl CacheJobStatistics {
    pub const fn new(tiles_created: u64, tiles_skipped: u64, tiles_failed: u64) -> Self {
        Self {
            tiles_created,
            tiles_skipped,
            tiles_failed,
        }
    }

    pub const fn created(tiles: u64) -> Self {
        Self::new(tiles, 0, 0)
    }

    pub const fn skipped(tiles: u64) -> Self {
        Self::new(0, tiles, 0)
    }

    pub const fn failed(tiles: u64) -> Self {
        Self::new(0, 0, tiles)
    }

    pub fn tiles_created(&self) -> u64 {
        self.tiles_created
    }

    pub fn tiles_skipped(&self) -> u64 {
        self.tiles_skipped
    }

    pub fn tiles_failed(&self) -> u64 {
        self.tiles_failed
    }

    pub fn tiles_processed(&self) -> u64 {
        self.tiles_created
            .saturating_add(self.tiles_skipped)
            .saturating_add(self.tiles_failed)
    }

    /// Pointwise sum. Associative and commutative, so partial results can be
    /// folded in any order or grouping.
    #[must_use]
    pub fn merge(&self, other: &CacheJobStatistics) -> CacheJobStatistics {
        Self {
            tiles_created: self.tiles_created.saturating_add(other.tiles_created),
            tiles_skipped: self.tiles_skipped.saturating_add(other.tiles_skipped),
            tiles_failed: self.tiles_failed.saturating_add(other.tiles_failed),
        }
    }
}

impl Add for CacheJobStatistics {
    type Output = CacheJobStatistics;

    fn add(self, rhs: CacheJobStatistics) -> CacheJobStatistics {
        self.merge(&rhs)
    }
}

impl Sum for CacheJobStatistics {
    fn sum<I: Iterator<Item = CacheJobStatistics>>(iter: I) -> Self {
        iter.fold(CacheJobStatistics::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_merge_adds_pointwise() {
        let a = CacheJobStatistics::new(1, 2, 3);
        let b = CacheJobStatistics::new(10, 20, 30);
        assert_eq!(a.merge(&b), CacheJobStatistics::new(11, 22, 33));
        assert_eq!(a.merge(&CacheJobStatistics::default()), a);
        assert_eq!(a.merge(&b).tiles_processed(), 66);
    }

    #[test]
    fn test_sum_of_deltas() {
        let total: CacheJobStatistics = [
            CacheJobStatistics::created(4),
            CacheJobStatistics::skipped(2),
            CacheJobStatistics::failed(1),
            CacheJobStatistics::created(4),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, CacheJobStatistics::new(8, 2, 1));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(CacheJobStatistics::new(1, 2, 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tilesCreated": 1, "tilesSkipped": 2, "tilesFailed": 3})
        );
    }

    fn stats() -> impl Strategy<Value = CacheJobStatistics> {
        (any::<u64>(), any::<u64>(), any::<u64>())
            .prop_map(|(c, s, f)| CacheJobStatistics::new(c >> 2, s >> 2, f >> 2))
    }

    proptest! {
        #[test]
        fn prop_merge_is_associative_and_commutative(a in stats(), b in stats(), c in stats()) {
            prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
            prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&c).merge(&b));
            prop_assert_eq!(a.merge(&b), b.merge(&a));
        }
    }
}
