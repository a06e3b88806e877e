// src/tokenizer/pair.rs

use rustc_hash::FxHashMap as HashMap;

/// Ordered pair of adjacent symbol ids.
pub type Pair = (u32, u32);

/// Adjacent pair frequencies over one or many symbol sequences.
///
/// Counting slides a window of width 2 over the sequence as it stands, so the
/// overlapping `A A A` contributes two `(A, A)` occurrences. Merging, on the other
/// hand, skips ahead after each match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PairStatistics {
    counts: HashMap<Pair, u64>,
}

impl PairStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `symbols` once per `weight`. Sequences shorter than 2 add nothing.
    pub fn add_sequence(&mut self, symbols: &[u32], weight: u64) {
        if weight == 0 {
            return;
        }
        for window in symbols.windows(2) {
            *self.counts.entry((window[0], window[1])).or_insert(0) += weight;
        }
    }

    pub fn get(&self, pair: &Pair) -> u64 {
        self.counts.get(pair).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Pair, &u64)> {
        self.counts.iter()
    }

    /// The pair with the strictly highest count. Ties go to the smallest
    /// `(left, right)`, which keeps the choice independent of map iteration order
    /// and of how the corpus was split into units.
    pub fn most_frequent(&self) -> Option<(Pair, u64)> {
        self.most_frequent_where(|_| true)
    }

    /// Same as [`most_frequent`](Self::most_frequent), restricted to pairs accepted
    /// by `eligible`.
    pub fn most_frequent_where<F>(&self, eligible: F) -> Option<(Pair, u64)>
    where
        F: Fn(&Pair) -> bool,
    {
        self.counts
            .iter()
            .filter(|(pair, _)| eligible(pair))
            .map(|(&pair, &count)| (pair, count))
            .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then_with(|| pb.cmp(pa)))
    }
}

/// Pair counts of a single sequence.
pub fn count_pairs(symbols: &[u32]) -> PairStatistics {
    let mut stats = PairStatistics::new();
    stats.add_sequence(symbols, 1);
    stats
}

/// Pair counts of a weighted collection: each unit's counts are multiplied by its
/// frequency before summing.
pub fn count_weighted<'a, I>(units: I) -> PairStatistics
where
    I: IntoIterator<Item = (&'a [u32], u64)>,
{
    let mut stats = PairStatistics::new();
    for (symbols, weight) in units {
        stats.add_sequence(symbols, weight);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_occurrences_are_all_counted() {
        let stats = count_pairs(&[1, 1, 1]);
        assert_eq!(stats.get(&(1, 1)), 2);
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn short_sequences_contribute_nothing() {
        assert!(count_pairs(&[]).is_empty());
        assert!(count_pairs(&[7]).is_empty());
    }

    #[test]
    fn weighted_counts_match_repeated_scan() {
        let a: &[u32] = &[1, 2, 3, 1, 2];
        let b: &[u32] = &[2, 3];
        let weighted = count_weighted(vec![(a, 3), (b, 2)]);

        let mut repeated = PairStatistics::new();
        for _ in 0..3 {
            repeated.add_sequence(a, 1);
        }
        for _ in 0..2 {
            repeated.add_sequence(b, 1);
        }
        assert_eq!(weighted, repeated);
        assert_eq!(weighted.get(&(1, 2)), 6);
        assert_eq!(weighted.get(&(2, 3)), 5);
    }

    #[test]
    fn ties_break_towards_smallest_pair() {
        let stats = count_pairs(&[5, 6, 9, 1, 2]);
        assert_eq!(stats.most_frequent(), Some(((1, 2), 1)));

        let stats = count_pairs(&[256, 97, 98, 100, 256, 97, 98, 97, 99]);
        assert_eq!(stats.get(&(256, 97)), 2);
        assert_eq!(stats.most_frequent(), Some(((97, 98), 2)));
    }

    #[test]
    fn eligibility_filter_is_respected() {
        let stats = count_pairs(&[0, 1, 0, 1, 2, 3]);
        let best = stats.most_frequent_where(|&(a, b)| a != 0 && b != 0);
        assert_eq!(best, Some(((1, 2), 1)));
    }
}
