// src/tokenizer/model.rs

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::tokenizer::added_vocabulary::{AddedToken, AddedVocabulary};
use crate::tokenizer::format::SerializedModel;
use crate::tokenizer::pair::Pair;
use crate::tokenizer::pre_tokenizer::byte_to_key;
use crate::tokenizer::{Error, Result};

/// What a base symbol is made of before any merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphabetMode {
    /// All 256 byte values, always present.
    #[default]
    Byte,
    /// The characters observed in the training corpus, possibly truncated to the
    /// most frequent ones. Anything else becomes `<unk>`.
    Character,
}

/// One entry of the base table, i.e. every id below [`BpeModel::base_len`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Special(String),
    Byte(u8),
    Char(char),
    /// Appended to every unit; expands to nothing so decoding drops it.
    EndMarker(String),
}

impl Symbol {
    fn expansion(&self) -> Vec<u8> {
        match self {
            Symbol::Special(content) => content.as_bytes().to_vec(),
            Symbol::Byte(b) => vec![*b],
            Symbol::Char(c) => c.to_string().into_bytes(),
            Symbol::EndMarker(_) => Vec::new(),
        }
    }

    fn key(&self) -> String {
        match self {
            Symbol::Special(content) | Symbol::EndMarker(content) => content.clone(),
            Symbol::Byte(b) => byte_to_key(*b),
            Symbol::Char(c) => c.to_string(),
        }
    }
}

// Reserved tokens share the JSON key space with single-char alphabet keys.
fn is_multi_char(content: &str) -> bool {
    content.chars().nth(1).is_some()
}

/// The immutable artifact produced by training: base symbols, merges in the order
/// they were learned and optional placeholders, plus the lookups derived from them.
///
/// Ids are laid out as `[specials][alphabet][end marker][merges][placeholders]`.
/// Merge `i` creates id `base_len + i` and may only reference smaller ids, so
/// expansions can be built once in increasing id order.
#[derive(Debug, Clone)]
pub struct BpeModel {
    alphabet: AlphabetMode,
    symbols: Vec<Symbol>,
    merges: Vec<Pair>,
    placeholders: Vec<String>,

    added: AddedVocabulary,
    end_marker: Option<u32>,
    byte_ids: HashMap<u8, u32>,
    char_ids: HashMap<char, u32>,
    ranks: HashMap<Pair, (u32, u32)>,
    expansions: Vec<Vec<u8>>,
    tokens: Vec<String>,
    token_ids: HashMap<String, u32>,
}

impl BpeModel {
    /// Validates the layout and builds every derived lookup.
    pub fn new(
        alphabet: AlphabetMode,
        symbols: Vec<Symbol>,
        merges: Vec<Pair>,
        placeholders: Vec<String>,
    ) -> Result<Self> {
        let mut added = AddedVocabulary::new();
        let mut end_marker = None;
        let mut byte_ids = HashMap::default();
        let mut char_ids = HashMap::default();

        // 0 = specials, 1 = alphabet, 2 = end marker
        let mut section = 0;
        for (id, symbol) in symbols.iter().enumerate() {
            let id = id as u32;
            let rank = match symbol {
                Symbol::Special(_) => 0,
                Symbol::Byte(_) | Symbol::Char(_) => 1,
                Symbol::EndMarker(_) => 2,
            };
            if rank < section || (rank == 2 && end_marker.is_some()) {
                return Err(Error::ModelLoad(format!(
                    "symbol {:?} at id {id} is out of place; expected specials, then the alphabet, then at most one end marker",
                    symbol.key()
                )));
            }
            section = rank;

            let fresh = match symbol {
                Symbol::Special(content) => {
                    is_multi_char(content)
                        && added.add(AddedToken::from(content.as_str(), true), id)
                }
                Symbol::Byte(b) => {
                    alphabet == AlphabetMode::Byte && byte_ids.insert(*b, id).is_none()
                }
                Symbol::Char(c) => {
                    alphabet == AlphabetMode::Character && char_ids.insert(*c, id).is_none()
                }
                Symbol::EndMarker(content) => {
                    end_marker = Some(id);
                    is_multi_char(content) && added.token_to_id(content).is_none()
                }
            };
            if !fresh {
                return Err(Error::ModelLoad(format!(
                    "symbol {:?} at id {id} is too short, duplicated or does not belong to a {alphabet:?} alphabet",
                    symbol.key()
                )));
            }
        }

        match alphabet {
            AlphabetMode::Byte if byte_ids.len() != 256 => {
                return Err(Error::ModelLoad(format!(
                    "byte alphabet must cover all 256 bytes, found {}",
                    byte_ids.len()
                )));
            }
            AlphabetMode::Character if added.unk_id().is_none() => {
                return Err(Error::ModelLoad(
                    "character alphabet requires an <unk> special token".into(),
                ));
            }
            _ => {}
        }

        let base_len = symbols.len() as u32;
        let mut expansions: Vec<Vec<u8>> = symbols.iter().map(Symbol::expansion).collect();
        let mut tokens: Vec<String> = symbols.iter().map(Symbol::key).collect();
        let mut ranks = HashMap::default();
        ranks.reserve(merges.len());

        for (rank, &(left, right)) in merges.iter().enumerate() {
            let new_id = base_len + rank as u32;
            if left >= new_id || right >= new_id {
                return Err(Error::ModelLoad(format!(
                    "merge #{rank} ({left}, {right}) references an id not created before {new_id}"
                )));
            }
            if added.is_special_id(left) || added.is_special_id(right) {
                return Err(Error::ModelLoad(format!(
                    "merge #{rank} ({left}, {right}) involves a special token"
                )));
            }
            if ranks.insert((left, right), (rank as u32, new_id)).is_some() {
                return Err(Error::ModelLoad(format!(
                    "merge #{rank} ({left}, {right}) is listed twice"
                )));
            }
            let mut expansion = expansions[left as usize].clone();
            expansion.extend_from_slice(&expansions[right as usize]);
            expansions.push(expansion);
            tokens.push(format!("{}{}", tokens[left as usize], tokens[right as usize]));
        }

        for (i, content) in placeholders.iter().enumerate() {
            let id = base_len + (merges.len() + i) as u32;
            let clashes_with_marker = end_marker.is_some_and(|m| tokens[m as usize] == *content);
            if clashes_with_marker
                || !is_multi_char(content)
                || !added.add(AddedToken::from(content.as_str(), false), id)
            {
                return Err(Error::ModelLoad(format!(
                    "placeholder {content:?} collides with another token"
                )));
            }
            expansions.push(content.as_bytes().to_vec());
            tokens.push(content.clone());
        }

        // Different merge paths can spell the same token; the lowest id wins.
        let mut token_ids = HashMap::default();
        for (id, token) in tokens.iter().enumerate() {
            token_ids.entry(token.clone()).or_insert(id as u32);
        }

        debug!(
            "built model: {} base symbols, {} merges, {} placeholders",
            base_len,
            merges.len(),
            placeholders.len()
        );

        Ok(Self {
            alphabet,
            symbols,
            merges,
            placeholders,
            added,
            end_marker,
            byte_ids,
            char_ids,
            ranks,
            expansions,
            tokens,
            token_ids,
        })
    }

    pub fn alphabet(&self) -> AlphabetMode {
        self.alphabet
    }

    /// Total number of ids, merges and placeholders included.
    pub fn vocab_size(&self) -> usize {
        self.expansions.len()
    }

    /// Number of ids that exist before the first merge.
    pub fn base_len(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Merge rules in the order they were learned; index 0 has the highest priority.
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// `(rank, new id)` of the merge rule for `pair`, if one was learned.
    pub fn merge_rank(&self, pair: &Pair) -> Option<(u32, u32)> {
        self.ranks.get(pair).copied()
    }

    /// Full byte expansion of `id`, or `None` when `id` is out of range.
    pub fn expansion(&self, id: u32) -> Option<&[u8]> {
        self.expansions.get(id as usize).map(Vec::as_slice)
    }

    /// Printable form of `id`: byte symbols use the byte-level visible mapping.
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_ids.get(token).copied()
    }

    pub fn byte_id(&self, byte: u8) -> Option<u32> {
        self.byte_ids.get(&byte).copied()
    }

    pub fn char_id(&self, c: char) -> Option<u32> {
        self.char_ids.get(&c).copied()
    }

    /// Base symbol ids of `text` followed by the end marker, if the model has one
    /// and `text` is not empty.
    /// Characters outside a character alphabet become `<unk>`; the second value
    /// counts them.
    pub fn decompose(&self, text: &str) -> (Vec<u32>, usize) {
        let mut ids = Vec::with_capacity(text.len() + 1);
        let mut unknown = 0;
        match self.alphabet {
            AlphabetMode::Byte => {
                ids.extend(text.bytes().filter_map(|b| self.byte_id(b)));
            }
            AlphabetMode::Character => {
                for c in text.chars() {
                    match self.char_id(c) {
                        Some(id) => ids.push(id),
                        None => {
                            unknown += 1;
                            ids.extend(self.unk_id());
                        }
                    }
                }
            }
        }
        if !text.is_empty() {
            ids.extend(self.end_marker);
        }
        (ids, unknown)
    }

    pub fn unk_id(&self) -> Option<u32> {
        self.added.unk_id()
    }

    pub fn end_marker_id(&self) -> Option<u32> {
        self.end_marker
    }

    pub fn end_symbol(&self) -> Option<&str> {
        self.end_marker.and_then(|id| match &self.symbols[id as usize] {
            Symbol::EndMarker(content) => Some(content.as_str()),
            _ => None,
        })
    }

    pub fn is_special_id(&self, id: u32) -> bool {
        self.added.is_special_id(id)
    }

    pub fn added_vocabulary(&self) -> &AddedVocabulary {
        &self.added
    }

    /// Special tokens in id order.
    pub fn special_tokens(&self) -> Vec<&str> {
        self.symbols
            .iter()
            .filter_map(|s| match s {
                Symbol::Special(content) => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every id with its printable token, in id order.
    pub fn get_vocab(&self) -> Vec<(u32, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, t)| (id as u32, t.as_str()))
            .collect()
    }

    pub fn to_serialized(&self) -> SerializedModel {
        let mut vocab: Vec<(String, u32)> = self
            .symbols
            .iter()
            .enumerate()
            .map(|(id, s)| (s.key(), id as u32))
            .collect();
        let first_placeholder = self.base_len() + self.merges.len();
        vocab.extend(
            self.placeholders
                .iter()
                .enumerate()
                .map(|(i, p)| (p.clone(), (first_placeholder + i) as u32)),
        );

        SerializedModel {
            vocab_size: self.vocab_size(),
            alphabet: self.alphabet,
            vocab,
            merges: self.merges.clone(),
            special_tokens: self.special_tokens().into_iter().map(String::from).collect(),
            end_symbol: self.end_symbol().map(String::from),
            placeholders: self.placeholders.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_serialized())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let serialized: SerializedModel = serde_json::from_str(json)
            .map_err(|e| Error::ModelLoad(format!("invalid model JSON: {e}")))?;
        Self::try_from(serialized)
    }

    /// Writes the model as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.to_serialized())?;
        writer.flush().map_err(|e| Error::io(path, e))?;
        info!(
            "saved model with {} ids ({} merges) to {}",
            self.vocab_size(),
            self.merges.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let serialized: SerializedModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::try_from(serialized)?;
        info!(
            "loaded model with {} ids ({} merges) from {}",
            model.vocab_size(),
            model.merges.len(),
            path.display()
        );
        Ok(model)
    }
}

impl PartialEq for BpeModel {
    fn eq(&self, other: &Self) -> bool {
        // everything else is derived from these four
        self.alphabet == other.alphabet
            && self.symbols == other.symbols
            && self.merges == other.merges
            && self.placeholders == other.placeholders
    }
}

impl Eq for BpeModel {}
