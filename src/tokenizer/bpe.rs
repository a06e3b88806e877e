// src/tokenizer/bpe.rs

use log::{debug, warn};

use crate::tokenizer::model::{AlphabetMode, BpeModel, Symbol};
use crate::tokenizer::pair::Pair;
use crate::tokenizer::word::merge_pair;
use crate::tokenizer::Model;

/// Position of a merge rule in the learned order; lower merges first.
pub type Rank = u32;

const REPLACEMENT: &[u8] = "\u{FFFD}".as_bytes();

/// Decoded text plus the number of ids that were not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeReport {
    pub text: String,
    pub unknown_ids: usize,
}

/// Encoder/decoder over a trained [`BpeModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BPE {
    model: BpeModel,
    skip_special_tokens: bool,
}

impl BPE {
    pub fn new(model: BpeModel) -> Self {
        Self {
            model,
            skip_special_tokens: false,
        }
    }

    /// Drop special tokens (`<pad>`, `<unk>`, ...) instead of writing their content
    /// when decoding.
    #[must_use]
    pub fn skip_special_tokens(mut self, skip: bool) -> Self {
        self.skip_special_tokens = skip;
        self
    }

    pub fn model(&self) -> &BpeModel {
        &self.model
    }

    pub fn into_model(self) -> BpeModel {
        self.model
    }

    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encode_with_report(text).0
    }

    /// Encodes `text` as one unit and also returns how many characters were
    /// replaced by `<unk>`.
    pub fn encode_with_report(&self, text: &str) -> (Vec<u32>, usize) {
        let (mut ids, unknown) = self.model.decompose(text);
        if unknown > 0 {
            debug!("{unknown} characters mapped to <unk> while encoding");
        }

        while ids.len() >= 2 {
            let best: Option<(Rank, Pair, u32)> = ids
                .windows(2)
                .filter_map(|w| {
                    let pair = (w[0], w[1]);
                    self.model
                        .merge_rank(&pair)
                        .map(|(rank, new_id)| (rank, pair, new_id))
                })
                .min_by_key(|&(rank, _, _)| rank);

            let Some((_, pair, new_id)) = best else {
                break;
            };
            ids = merge_pair(&ids, pair, new_id);
        }
        (ids, unknown)
    }

    pub fn decode(&self, ids: &[u32]) -> String {
        self.decode_with_report(ids).text
    }

    pub fn decode_with_report(&self, ids: &[u32]) -> DecodeReport {
        let (bytes, unknown_ids) = self.collect_bytes(ids);
        if unknown_ids > 0 {
            warn!(
                "{unknown_ids} ids outside the vocabulary of {} were decoded as unknown",
                self.model.vocab_size()
            );
        }
        DecodeReport {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            unknown_ids,
        }
    }

    /// Raw concatenated expansions, before UTF-8 interpretation.
    pub fn decode_bytes(&self, ids: &[u32]) -> Vec<u8> {
        self.collect_bytes(ids).0
    }

    fn collect_bytes(&self, ids: &[u32]) -> (Vec<u8>, usize) {
        let mut ret = Vec::with_capacity(ids.len() * 2);
        let mut unknown = 0;
        for &id in ids {
            if self.skip_special_tokens && self.model.is_special_id(id) {
                continue;
            }
            match self.model.expansion(id) {
                Some(bytes) => ret.extend_from_slice(bytes),
                None => {
                    unknown += 1;
                    if self.skip_special_tokens {
                        continue;
                    }
                    let fallback = self
                        .model
                        .unk_id()
                        .and_then(|unk| self.model.expansion(unk))
                        .unwrap_or(REPLACEMENT);
                    ret.extend_from_slice(fallback);
                }
            }
        }
        (ret, unknown)
    }
}

impl Model for BPE {
    fn tokenize(&self, text: &str) -> Vec<u32> {
        self.encode(text)
    }

    fn decode_bytes(&self, ids: &[u32]) -> Vec<u8> {
        self.decode_bytes(ids)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.model.id_to_token(id).map(String::from)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.model.token_to_id(token)
    }

    fn get_vocab_size(&self) -> usize {
        self.model.vocab_size()
    }
}

// --- Default Implementation for BPE ---
impl Default for BPE {
    /// Plain byte tokenizer: 256 byte ids and no merges.
    fn default() -> Self {
        let symbols = (0..=255u8).map(Symbol::Byte).collect();
        let model = BpeModel::new(AlphabetMode::Byte, symbols, vec![], vec![])
            .unwrap_or_else(|e| panic!("Failed to create default BPE: {}", e));
        BPE::new(model)
    }
}
