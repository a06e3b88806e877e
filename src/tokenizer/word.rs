// src/tokenizer/word.rs

use crate::tokenizer::pair::Pair;

/// Rewrites every non-overlapping occurrence of `pair` into `new_id`.
///
/// The scan is greedy left to right: on a match it emits `new_id` and skips both
/// consumed positions, so `A A A` with `(A, A)` becomes `[new_id, A]`. Training and
/// encoding both go through this function.
pub fn merge_pair(symbols: &[u32], pair: Pair, new_id: u32) -> Vec<u32> {
    scan(symbols, pair, new_id, |_, _| {})
}

/// Calls `on_merge(previous, next)` for every merge site, where `previous` is the
/// last symbol already emitted (possibly an earlier `new_id`) and `next` is the
/// untouched symbol following the matched pair.
fn scan<F>(symbols: &[u32], (a, b): Pair, new_id: u32, mut on_merge: F) -> Vec<u32>
where
    F: FnMut(Option<u32>, Option<u32>),
{
    let mut out = Vec::with_capacity(symbols.len());
    let mut i = 0;
    while i < symbols.len() {
        if i + 1 < symbols.len() && symbols[i] == a && symbols[i + 1] == b {
            on_merge(out.last().copied(), symbols.get(i + 2).copied());
            out.push(new_id);
            i += 2;
        } else {
            out.push(symbols[i]);
            i += 1;
        }
    }
    out
}

/// One training unit, stored as the ids of its current symbols.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Word {
    symbols: Vec<u32>,
}

impl Word {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, symbol: u32) {
        self.symbols.push(symbol);
    }

    pub fn get_symbols(&self) -> &[u32] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Merges `(a, b)` into `new_id` and returns the pair count deltas for this
    /// single occurrence of the word, so the caller can update global counts
    /// without rescanning.
    pub fn merge(&mut self, a: u32, b: u32, new_id: u32) -> Vec<(Pair, i64)> {
        let mut changes = Vec::new();
        let merged = scan(&self.symbols, (a, b), new_id, |previous, next| {
            changes.push(((a, b), -1));
            if let Some(previous) = previous {
                changes.push(((previous, a), -1));
                changes.push(((previous, new_id), 1));
            }
            if let Some(next) = next {
                changes.push(((b, next), -1));
                changes.push(((new_id, next), 1));
            }
        });
        self.symbols = merged;
        changes
    }
}

impl From<Vec<u32>> for Word {
    fn from(symbols: Vec<u32>) -> Self {
        Self { symbols }
    }
}
