// src/tokenizer/bpe_trainer.rs
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log::{debug, info, warn};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};

use crate::tokenizer::added_vocabulary::{AddedToken, UNK_TOKEN};
use crate::tokenizer::model::{AlphabetMode, BpeModel, Symbol};
use crate::tokenizer::pair::Pair;
use crate::tokenizer::pre_tokenizer::{clean_corpus, Segmentation};
use crate::tokenizer::progress::{ProgressBar, ProgressStyle};
use crate::tokenizer::word::Word;
use crate::tokenizer::{Error, Result, Trainer, BPE};

pub const DEFAULT_END_SYMBOL: &str = "</w>";

#[derive(Debug, PartialEq, Eq)]
struct Merge {
    pair: Pair,
    count: u64,
}

impl PartialOrd for Merge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Merge {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest count first; on equal counts the smallest pair sits on top.
        self.count
            .cmp(&other.count)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

/// What to do when training ends before `vocab_size` is reached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backfill {
    /// Return the smaller vocabulary and report the shortfall.
    #[default]
    Report,
    /// Pad with `<extra_N>` placeholders after the merges.
    Placeholders,
}

/// Why the merge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    VocabSizeReached,
    /// No adjacent pair is left to merge (includes the empty corpus).
    NoPairs,
    /// The best remaining pair occurs less often than the frequency floor.
    BelowMinFrequency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingReport {
    pub stop_reason: StopReason,
    pub merges: usize,
    /// Ids missing from the requested `vocab_size` once merging stopped, whether or
    /// not they were padded with placeholders afterwards.
    pub shortfall: usize,
    pub placeholders: usize,
}

#[must_use]
#[derive(Debug, Clone)]
pub struct TrainingOutput {
    pub model: BpeModel,
    pub report: TrainingReport,
}

struct Config {
    vocab_size: usize,
    alphabet_mode: AlphabetMode,
    min_frequency: u64,
    special_tokens: Vec<String>,
    add_boundary_marker: bool,
    end_symbol: String,
    limit_alphabet: Option<usize>,
    segmentation: Segmentation,
    clean_corpus: bool,
    max_units: Option<usize>,
    backfill: Backfill,
    show_progress: bool,
}

pub struct BpeTrainerBuilder {
    config: Config,
}

impl Default for BpeTrainerBuilder {
    fn default() -> Self {
        Self {
            config: Config {
                vocab_size: 512,
                alphabet_mode: AlphabetMode::Byte,
                min_frequency: 2,
                special_tokens: vec![],
                add_boundary_marker: false,
                end_symbol: DEFAULT_END_SYMBOL.to_string(),
                limit_alphabet: None,
                segmentation: Segmentation::Corpus,
                clean_corpus: false,
                max_units: None,
                backfill: Backfill::Report,
                show_progress: false,
            },
        }
    }
}

impl BpeTrainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target number of ids, base symbols and special tokens included.
    #[must_use]
    pub fn vocab_size(mut self, size: usize) -> Self {
        self.config.vocab_size = size;
        self
    }

    #[must_use]
    pub fn alphabet_mode(mut self, mode: AlphabetMode) -> Self {
        self.config.alphabet_mode = mode;
        self
    }

    /// Pairs seen fewer times stop the loop. Values below 2 are raised to 2.
    #[must_use]
    pub fn min_frequency(mut self, frequency: u64) -> Self {
        self.config.min_frequency = frequency;
        self
    }

    #[must_use]
    pub fn special_tokens(mut self, tokens: Vec<String>) -> Self {
        self.config.special_tokens = tokens;
        self
    }

    #[must_use]
    pub fn add_boundary_marker(mut self, add: bool) -> Self {
        self.config.add_boundary_marker = add;
        self
    }

    #[must_use]
    pub fn end_symbol(mut self, symbol: String) -> Self {
        self.config.end_symbol = symbol;
        self
    }

    /// Keep only the `limit` most frequent characters in character mode.
    #[must_use]
    pub fn limit_alphabet(mut self, limit: usize) -> Self {
        self.config.limit_alphabet = Some(limit);
        self
    }

    #[must_use]
    pub fn segmentation(mut self, segmentation: Segmentation) -> Self {
        self.config.segmentation = segmentation;
        self
    }

    #[must_use]
    pub fn clean_corpus(mut self, clean: bool) -> Self {
        self.config.clean_corpus = clean;
        self
    }

    #[must_use]
    pub fn max_units(mut self, max_units: usize) -> Self {
        self.config.max_units = Some(max_units);
        self
    }

    #[must_use]
    pub fn backfill(mut self, backfill: Backfill) -> Self {
        self.config.backfill = backfill;
        self
    }

    #[must_use]
    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn build(self) -> BpeTrainer {
        BpeTrainer {
            vocab_size: self.config.vocab_size,
            alphabet_mode: self.config.alphabet_mode,
            min_frequency: self.config.min_frequency,
            special_tokens: self.config.special_tokens,
            add_boundary_marker: self.config.add_boundary_marker,
            end_symbol: self.config.end_symbol,
            limit_alphabet: self.config.limit_alphabet,
            segmentation: self.config.segmentation,
            clean_corpus: self.config.clean_corpus,
            max_units: self.config.max_units,
            backfill: self.config.backfill,
            show_progress: self.config.show_progress,
            words: HashMap::default(),
        }
    }
}

/// Greedy BPE trainer.
///
/// The configuration half is serde (de)serializable so it can be kept in a JSON
/// file; the fed unit counts are not.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BpeTrainer {
    pub vocab_size: usize,
    pub alphabet_mode: AlphabetMode,
    pub min_frequency: u64,
    pub special_tokens: Vec<String>,
    pub add_boundary_marker: bool,
    pub end_symbol: String,
    pub limit_alphabet: Option<usize>,
    pub segmentation: Segmentation,
    pub clean_corpus: bool,
    pub max_units: Option<usize>,
    pub backfill: Backfill,
    pub show_progress: bool,

    #[serde(skip)]
    words: HashMap<String, u64>,
}

impl Default for BpeTrainer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BpeTrainer {
    pub fn new(min_frequency: u64, vocab_size: usize) -> Self {
        Self {
            min_frequency,
            vocab_size,
            ..Default::default()
        }
    }

    pub fn builder() -> BpeTrainerBuilder {
        BpeTrainerBuilder::new()
    }

    /// Distinct units fed so far, with their occurrence counts.
    pub fn words(&self) -> &HashMap<String, u64> {
        &self.words
    }

    /// Cleans (if enabled), segments and feeds a whole corpus.
    pub fn feed_text(&mut self, corpus: &str) -> Result<()> {
        let cleaned;
        let text = if self.clean_corpus {
            cleaned = clean_corpus(corpus);
            cleaned.as_str()
        } else {
            corpus
        };
        let units = self.segmentation.split(text, self.max_units);
        info!("feeding {} units ({:?} segmentation)", units.len(), self.segmentation);
        self.feed(units.into_iter(), |unit| Ok(vec![unit.to_string()]))
    }

    /// Frequency floor actually applied: a pair seen once never compresses anything.
    pub fn effective_min_frequency(&self) -> u64 {
        self.min_frequency.max(2)
    }

    fn special_symbols(&self) -> Vec<String> {
        let mut specials = self.special_tokens.clone();
        if self.alphabet_mode == AlphabetMode::Character && !specials.iter().any(|s| s == UNK_TOKEN) {
            specials.push(UNK_TOKEN.to_string());
        }
        specials
    }

    /// Checks everything that does not depend on the corpus.
    pub fn validate(&self) -> Result<()> {
        let specials = self.special_symbols();
        let mut seen = HashSet::default();
        for token in &specials {
            if token.chars().count() < 2 {
                return Err(Error::Config(format!(
                    "special token {token:?} must be at least two characters long"
                )));
            }
            if !seen.insert(token.as_str()) {
                return Err(Error::Config(format!("special token {token:?} is listed twice")));
            }
        }
        if self.add_boundary_marker {
            if self.end_symbol.chars().count() < 2 {
                return Err(Error::Config(format!(
                    "end symbol {:?} must be at least two characters long",
                    self.end_symbol
                )));
            }
            if seen.contains(self.end_symbol.as_str()) {
                return Err(Error::Config(format!(
                    "end symbol {:?} is also a special token",
                    self.end_symbol
                )));
            }
        }
        if self.alphabet_mode == AlphabetMode::Byte {
            let base = specials.len() + 256 + usize::from(self.add_boundary_marker);
            self.check_vocab_size(base)?;
        }
        Ok(())
    }

    fn check_vocab_size(&self, base_len: usize) -> Result<()> {
        if self.vocab_size < base_len {
            return Err(Error::Config(format!(
                "vocab_size {} is smaller than the {} mandatory base symbols and special tokens",
                self.vocab_size, base_len
            )));
        }
        Ok(())
    }

    fn setup_progress(&self) -> Option<ProgressBar> {
        if self.show_progress {
            let p = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {msg:<30!} {wide_bar} {pos:>9!}/{len:<9!}")
            {
                p.set_style(style);
            }
            Some(p)
        } else {
            None
        }
    }

    fn finalize_progress(&self, p: &Option<ProgressBar>, final_len: usize) {
        if let Some(p) = p {
            p.set_length(final_len as u64);
            p.finish();
        }
    }

    fn update_progress(&self, p: &Option<ProgressBar>, len: usize, message: &'static str) {
        if let Some(p) = p {
            p.set_message(message);
            p.set_length(len as u64);
            p.reset();
        }
    }

    /// Base table: special tokens, the alphabet, then the end marker.
    fn compute_alphabet(&self, wc: &HashMap<String, u64>) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .special_symbols()
            .into_iter()
            .map(Symbol::Special)
            .collect();

        match self.alphabet_mode {
            AlphabetMode::Byte => symbols.extend((0..=255u8).map(Symbol::Byte)),
            AlphabetMode::Character => {
                let mut char_counts: HashMap<char, u64> = HashMap::default();
                for (word, count) in wc {
                    for c in word.chars() {
                        *char_counts.entry(c).or_insert(0) += *count;
                    }
                }

                let mut kept: Vec<(char, u64)> = char_counts.into_iter().collect();
                if let Some(limit) = self.limit_alphabet {
                    if kept.len() > limit {
                        kept.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                        let dropped = kept.len() - limit;
                        kept.truncate(limit);
                        info!("alphabet limited to {limit} characters, {dropped} mapped to {UNK_TOKEN}");
                    }
                }
                kept.sort_unstable_by_key(|&(c, _)| c);
                symbols.extend(kept.into_iter().map(|(c, _)| Symbol::Char(c)));
            }
        }

        if self.add_boundary_marker {
            symbols.push(Symbol::EndMarker(self.end_symbol.clone()));
        }
        symbols
    }

    fn tokenize_words(
        &self,
        wc: &HashMap<String, u64>,
        base: &BpeModel,
        p: &Option<ProgressBar>,
    ) -> (Vec<Word>, Vec<u64>) {
        let mut entries: Vec<(&String, &u64)> = wc.iter().collect();
        entries.sort_unstable();

        let mut words: Vec<Word> = Vec::with_capacity(entries.len());
        let mut counts: Vec<u64> = Vec::with_capacity(entries.len());
        let mut unknown = 0;

        for (word_str, count) in entries {
            let (ids, unk) = base.decompose(word_str);
            unknown += unk as u64 * count;
            words.push(Word::from(ids));
            counts.push(*count);

            if let Some(p) = p {
                p.inc(1);
            }
        }
        if unknown > 0 {
            debug!("{unknown} character occurrences fall outside the alphabet");
        }
        (words, counts)
    }

    fn count_pairs(
        &self,
        words: &[Word],
        counts: &[u64],
        p: &Option<ProgressBar>,
    ) -> (HashMap<Pair, i64>, HashMap<Pair, HashSet<usize>>) {
        let mut pair_counts: HashMap<Pair, i64> = HashMap::default();
        let mut where_to_update: HashMap<Pair, HashSet<usize>> = HashMap::default();

        for (i, word) in words.iter().enumerate() {
            for window in word.get_symbols().windows(2) {
                let cur_pair: Pair = (window[0], window[1]);
                *pair_counts.entry(cur_pair).or_insert(0) += counts[i] as i64;
                where_to_update.entry(cur_pair).or_default().insert(i);
            }

            if let Some(p) = p {
                p.inc(1);
            }
        }
        (pair_counts, where_to_update)
    }

    fn placeholders_for(&self, symbols: &[Symbol], missing: usize) -> Vec<String> {
        let taken: HashSet<String> = symbols
            .iter()
            .filter_map(|s| match s {
                Symbol::Special(c) | Symbol::EndMarker(c) => Some(c.clone()),
                _ => None,
            })
            .collect();
        (0..)
            .map(AddedToken::placeholder)
            .map(|token| token.content)
            .filter(|content| !taken.contains(content))
            .take(missing)
            .collect()
    }

    /// Runs the merge loop over `word_counts` (unit -> occurrences).
    pub fn do_train(&self, word_counts: &HashMap<String, u64>) -> Result<TrainingOutput> {
        self.validate()?;
        let progress = self.setup_progress();

        let symbols = self.compute_alphabet(word_counts);
        let base_len = symbols.len();
        self.check_vocab_size(base_len)?;
        let base = BpeModel::new(self.alphabet_mode, symbols.clone(), vec![], vec![])?;
        info!(
            "training {:?} BPE over {} distinct units: {} base ids, target vocab_size {}",
            self.alphabet_mode,
            word_counts.len(),
            base_len,
            self.vocab_size
        );

        self.update_progress(&progress, word_counts.len(), "Tokenize units");
        let (mut words, counts) = self.tokenize_words(word_counts, &base, &progress);
        self.finalize_progress(&progress, words.len());

        self.update_progress(&progress, words.len(), "Count pairs");
        let (mut pair_counts, mut where_to_update) = self.count_pairs(&words, &counts, &progress);
        self.finalize_progress(&progress, words.len());

        let floor = self.effective_min_frequency() as i64;
        let eligible = |pair: &Pair| !base.is_special_id(pair.0) && !base.is_special_id(pair.1);

        let mut queue = BinaryHeap::with_capacity(pair_counts.len());
        for (&pair, &count) in pair_counts.iter() {
            if count >= floor && eligible(&pair) {
                queue.push(Merge {
                    pair,
                    count: count as u64,
                });
            }
        }
        self.update_progress(&progress, self.vocab_size, "Compute merges");

        let mut merges: Vec<Pair> = vec![];
        let stop_reason = loop {
            if base_len + merges.len() >= self.vocab_size {
                break StopReason::VocabSizeReached;
            }
            let Some(top) = queue.pop() else {
                let any_left = pair_counts
                    .iter()
                    .any(|(pair, &count)| count > 0 && eligible(pair));
                break if any_left {
                    StopReason::BelowMinFrequency
                } else {
                    StopReason::NoPairs
                };
            };

            // Stale entry: the count moved since it was queued and a fresher one exists.
            let current_pair_count = pair_counts.get(&top.pair).copied().unwrap_or(0);
            if current_pair_count <= 0 || top.count != current_pair_count as u64 {
                continue;
            }

            let new_token_id = (base_len + merges.len()) as u32;
            merges.push(top.pair);
            debug!(
                "merge #{}: {:?} -> {} (count {})",
                merges.len() - 1,
                top.pair,
                new_token_id,
                top.count
            );

            let mut words_to_process: Vec<usize> = where_to_update
                .remove(&top.pair)
                .map(|indices| indices.into_iter().collect())
                .unwrap_or_default();
            words_to_process.sort_unstable();

            let mut pairs_to_re_evaluate: HashSet<Pair> = HashSet::default();
            for i in words_to_process {
                let changes = words[i].merge(top.pair.0, top.pair.1, new_token_id);
                for (pair, change) in changes {
                    let count_change = change * counts[i] as i64;
                    match pair_counts.entry(pair) {
                        std::collections::hash_map::Entry::Occupied(mut occ) => {
                            *occ.get_mut() += count_change;
                            if *occ.get() <= 0 {
                                occ.remove();
                            }
                        }
                        std::collections::hash_map::Entry::Vacant(vac) => {
                            if count_change > 0 {
                                vac.insert(count_change);
                            }
                        }
                    }
                    pairs_to_re_evaluate.insert(pair);
                    // Indices are only ever added; a stale index costs one no-op merge.
                    if change > 0 {
                        where_to_update.entry(pair).or_default().insert(i);
                    }
                }
            }

            for pair in pairs_to_re_evaluate {
                if let Some(&count) = pair_counts.get(&pair) {
                    if count >= floor && eligible(&pair) {
                        queue.push(Merge {
                            pair,
                            count: count as u64,
                        });
                    }
                }
            }

            if let Some(p) = &progress {
                p.set_position((base_len + merges.len()) as u64);
            }
        };
        self.finalize_progress(&progress, base_len + merges.len());

        let learned = base_len + merges.len();
        let shortfall = self.vocab_size.saturating_sub(learned);
        let placeholders = match self.backfill {
            Backfill::Placeholders if shortfall > 0 => self.placeholders_for(&symbols, shortfall),
            _ => vec![],
        };
        if shortfall > 0 {
            match self.backfill {
                Backfill::Report => warn!(
                    "training stopped early ({stop_reason:?}) after {} merges; vocabulary has {learned} ids, {shortfall} short of {}",
                    merges.len(),
                    self.vocab_size
                ),
                Backfill::Placeholders => warn!(
                    "training stopped early ({stop_reason:?}) after {} merges; padded with {} placeholders",
                    merges.len(),
                    placeholders.len()
                ),
            }
        }
        info!(
            "training finished: {} merges, {} ids ({stop_reason:?})",
            merges.len(),
            learned + placeholders.len()
        );

        let report = TrainingReport {
            stop_reason,
            merges: merges.len(),
            shortfall,
            placeholders: placeholders.len(),
        };
        let model = BpeModel::new(self.alphabet_mode, symbols, merges, placeholders)?;
        Ok(TrainingOutput { model, report })
    }
}

impl Trainer for BpeTrainer {
    type Model = BPE;

    fn train(&self, model: &mut Self::Model) -> Result<TrainingReport> {
        let output = self.do_train(&self.words)?;
        *model = BPE::new(output.model);
        Ok(output.report)
    }

    fn should_show_progress(&self) -> bool {
        self.show_progress
    }

    fn feed<I, S, F>(&mut self, iterator: I, process: F) -> Result<()>
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Result<Vec<String>>,
    {
        for sequence in iterator {
            for word in process(sequence.as_ref())? {
                *self.words.entry(word).or_insert(0) += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::added_vocabulary::PAD_TOKEN;
    use crate::tokenizer::pair::count_weighted;
    use crate::tokenizer::word::merge_pair;

    fn train_text(trainer: &BpeTrainer, text: &str) -> TrainingOutput {
        let mut trainer = trainer.clone();
        trainer.feed_text(text).unwrap();
        trainer.do_train(trainer.words()).unwrap()
    }

    // Full rescan after every merge; the incremental loop must agree with it.
    fn reference_merges(trainer: &BpeTrainer, text: &str) -> Vec<Pair> {
        let mut fed = trainer.clone();
        fed.feed_text(text).unwrap();
        let output = fed.do_train(fed.words()).unwrap();
        let base = &output.model;

        let mut units: Vec<(Vec<u32>, u64)> = fed
            .words()
            .iter()
            .map(|(w, &c)| (base.decompose(w).0, c))
            .collect();
        let floor = trainer.effective_min_frequency();
        let mut merges = vec![];
        while base.base_len() + merges.len() < trainer.vocab_size {
            let stats = count_weighted(units.iter().map(|(s, c)| (s.as_slice(), *c)));
            let best = stats
                .most_frequent_where(|p| !base.is_special_id(p.0) && !base.is_special_id(p.1));
            let Some((pair, count)) = best else { break };
            if count < floor {
                break;
            }
            let new_id = (base.base_len() + merges.len()) as u32;
            for (symbols, _) in units.iter_mut() {
                *symbols = merge_pair(symbols, pair, new_id);
            }
            merges.push(pair);
        }
        merges
    }

    #[test]
    fn canonical_example() {
        let trainer = BpeTrainer::builder().vocab_size(256 + 3).build();
        let output = train_text(&trainer, "aaabdaaabac");
        assert_eq!(output.model.merges(), &[(97, 97), (97, 98), (256, 257)]);
        assert_eq!(output.model.vocab_size(), 259);
        assert_eq!(output.report.stop_reason, StopReason::VocabSizeReached);
        assert_eq!(output.report.shortfall, 0);
        assert_eq!(output.model.expansion(258), Some(&b"aaab"[..]));
    }

    #[test]
    fn singleton_pairs_end_training() {
        let trainer = BpeTrainer::builder().vocab_size(300).min_frequency(1).build();
        let output = train_text(&trainer, "aaabdaaabac");
        // after the three merges above only count-1 pairs remain
        assert_eq!(output.model.merges().len(), 3);
        assert_eq!(output.report.stop_reason, StopReason::BelowMinFrequency);
        assert_eq!(output.report.shortfall, 300 - 259);
        assert_eq!(output.model.vocab_size(), 259);
    }

    #[test]
    fn empty_corpus_yields_base_model() {
        let trainer = BpeTrainer::builder()
            .vocab_size(300)
            .special_tokens(vec![PAD_TOKEN.into(), UNK_TOKEN.into()])
            .build();
        let output = train_text(&trainer, "");
        assert_eq!(output.report.stop_reason, StopReason::NoPairs);
        assert_eq!(output.model.vocab_size(), 258);
        assert_eq!(output.model.special_tokens(), vec![PAD_TOKEN, UNK_TOKEN]);
        assert_eq!(output.model.byte_id(0), Some(2));
    }

    #[test]
    fn vocab_size_below_alphabet_is_a_config_error() {
        let trainer = BpeTrainer::builder()
            .vocab_size(256)
            .special_tokens(vec![PAD_TOKEN.into()])
            .build();
        let err = trainer.do_train(&HashMap::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let trainer = BpeTrainer::builder()
            .alphabet_mode(AlphabetMode::Character)
            .vocab_size(3)
            .build();
        assert!(matches!(
            train_text_err(&trainer, "abcdef"),
            Error::Config(_)
        ));
    }

    fn train_text_err(trainer: &BpeTrainer, text: &str) -> Error {
        let mut trainer = trainer.clone();
        trainer.feed_text(text).unwrap();
        trainer.do_train(trainer.words()).unwrap_err()
    }

    #[test]
    fn invalid_special_tokens_are_rejected() {
        let dup = BpeTrainer::builder()
            .special_tokens(vec![PAD_TOKEN.into(), PAD_TOKEN.into()])
            .build();
        assert!(matches!(dup.validate(), Err(Error::Config(_))));

        let marker = BpeTrainer::builder()
            .special_tokens(vec![PAD_TOKEN.into()])
            .add_boundary_marker(true)
            .end_symbol(PAD_TOKEN.into())
            .build();
        assert!(matches!(marker.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn placeholders_fill_the_gap() {
        let trainer = BpeTrainer::builder()
            .vocab_size(265)
            .backfill(Backfill::Placeholders)
            .build();
        let output = train_text(&trainer, "aaabdaaabac");
        assert_eq!(output.report.merges, 3);
        assert_eq!(output.report.shortfall, 6);
        assert_eq!(output.report.placeholders, 6);
        assert_eq!(output.model.vocab_size(), 265);
        assert_eq!(output.model.placeholders()[0], "<extra_0>");
        assert_eq!(output.model.token_to_id("<extra_0>"), Some(259));
    }

    #[test]
    fn character_mode_limits_alphabet_and_reserves_unk() {
        let trainer = BpeTrainer::builder()
            .alphabet_mode(AlphabetMode::Character)
            .special_tokens(vec![PAD_TOKEN.into()])
            .limit_alphabet(2)
            .vocab_size(10)
            .build();
        let output = train_text(&trainer, "aaaabbbcc");
        let model = &output.model;
        assert_eq!(model.special_tokens(), vec![PAD_TOKEN, UNK_TOKEN]);
        assert_eq!(model.char_id('a'), Some(2));
        assert_eq!(model.char_id('b'), Some(3));
        assert_eq!(model.char_id('c'), None);
        // no merge may touch <unk>
        for &(l, r) in model.merges() {
            assert!(!model.is_special_id(l) && !model.is_special_id(r));
        }
    }

    #[test]
    fn boundary_marker_is_merged_per_unit() {
        let trainer = BpeTrainer::builder()
            .alphabet_mode(AlphabetMode::Character)
            .segmentation(Segmentation::Lines)
            .add_boundary_marker(true)
            .vocab_size(20)
            .build();
        let output = train_text(&trainer, "ab\nab\nab\n");
        let model = &output.model;
        let marker = model.end_marker_id().unwrap();
        assert!(model.merges().iter().any(|&(_, r)| r == marker));
        assert_eq!(model.id_to_token(model.vocab_size() as u32 - 1), Some("ab</w>"));
    }

    #[test]
    fn incremental_counts_match_full_rescan() {
        let corpora = [
            "aaabdaaabac",
            "the cat sat on the mat with the hat",
            "aaaaaaaaaaaaaaaaab abababababab aaaa",
            "低头思故乡，举头望明月。明月几时有？",
            "line one\nline two\nline one\n\nline three",
        ];
        let trainers = [
            BpeTrainer::builder().vocab_size(300).build(),
            BpeTrainer::builder()
                .vocab_size(330)
                .segmentation(Segmentation::Lines)
                .add_boundary_marker(true)
                .build(),
            BpeTrainer::builder()
                .alphabet_mode(AlphabetMode::Character)
                .limit_alphabet(6)
                .vocab_size(40)
                .build(),
        ];
        for trainer in &trainers {
            for corpus in corpora {
                let output = train_text(trainer, corpus);
                assert_eq!(
                    output.model.merges(),
                    reference_merges(trainer, corpus).as_slice(),
                    "diverged on {corpus:?}"
                );
            }
        }
    }

    #[test]
    fn training_is_deterministic() {
        let trainer = BpeTrainer::builder()
            .vocab_size(290)
            .segmentation(Segmentation::Lines)
            .build();
        let text = "to be or not to be\nthat is the question\nto be\n";
        let first = train_text(&trainer, text);
        let second = train_text(&trainer, text);
        assert_eq!(first.model, second.model);
        assert_eq!(first.report, second.report);
    }

    #[test]
    fn config_round_trips_through_json() {
        let trainer = BpeTrainer::builder()
            .vocab_size(1000)
            .alphabet_mode(AlphabetMode::Character)
            .special_tokens(vec![PAD_TOKEN.into(), UNK_TOKEN.into()])
            .segmentation(Segmentation::Lines)
            .build();
        let json = serde_json::to_string(&trainer).unwrap();
        let back: BpeTrainer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trainer);

        let partial: BpeTrainer =
            serde_json::from_str(r#"{"vocab_size": 300, "alphabet_mode": "character"}"#).unwrap();
        assert_eq!(partial.vocab_size, 300);
        assert_eq!(partial.min_frequency, 2);
        assert_eq!(partial.alphabet_mode, AlphabetMode::Character);
    }
}
