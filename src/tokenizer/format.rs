//! On-disk layout of a trained model.
//!
//! ```json
//! {
//!   "vocab_size": 259,
//!   "alphabet": "byte",
//!   "vocab": { "Ā": 0, "ā": 1, ... },
//!   "merges": [[97, 97], [97, 98], [256, 257]],
//!   "special_tokens": [],
//!   "end_symbol": null
//! }
//! ```
//!
//! `vocab` only lists ids that merges cannot rebuild: special tokens, the base
//! alphabet, the end marker and placeholders. The position of a rule in `merges`
//! is its priority and is kept as is.

use std::fmt;

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::tokenizer::model::{AlphabetMode, BpeModel, Symbol};
use crate::tokenizer::pair::Pair;
use crate::tokenizer::pre_tokenizer::key_to_byte;
use crate::tokenizer::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedModel {
    pub vocab_size: usize,
    #[serde(default)]
    pub alphabet: AlphabetMode,
    #[serde(serialize_with = "serialize_vocab", deserialize_with = "deserialize_vocab")]
    pub vocab: Vec<(String, u32)>,
    pub merges: Vec<Pair>,
    #[serde(default)]
    pub special_tokens: Vec<String>,
    #[serde(default)]
    pub end_symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placeholders: Vec<String>,
}

// Written in id order so the file reads like the id layout.
fn serialize_vocab<S>(vocab: &[(String, u32)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut ordered: Vec<&(String, u32)> = vocab.iter().collect();
    ordered.sort_by_key(|(_, id)| *id);
    let mut map = serializer.serialize_map(Some(ordered.len()))?;
    for (token, id) in ordered {
        map.serialize_entry(token, id)?;
    }
    map.end()
}

fn deserialize_vocab<'de, D>(deserializer: D) -> Result<Vec<(String, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct VocabVisitor;

    impl<'de> Visitor<'de> for VocabVisitor {
        type Value = Vec<(String, u32)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of token to id")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            // Entries are kept as read so duplicated keys can be reported later.
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((token, id)) = access.next_entry::<String, u32>()? {
                entries.push((token, id));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(VocabVisitor)
}

impl TryFrom<SerializedModel> for BpeModel {
    type Error = Error;

    fn try_from(serialized: SerializedModel) -> Result<Self, Self::Error> {
        let SerializedModel {
            vocab_size,
            alphabet,
            vocab,
            merges,
            special_tokens,
            end_symbol,
            placeholders,
        } = serialized;

        let mut by_id: HashMap<u32, &str> = HashMap::default();
        let mut keys: HashSet<&str> = HashSet::default();
        for (token, id) in &vocab {
            if !keys.insert(token.as_str()) {
                return Err(Error::ModelLoad(format!("token {token:?} appears twice in vocab")));
            }
            if by_id.insert(*id, token.as_str()).is_some() {
                return Err(Error::ModelLoad(format!("id {id} is assigned twice in vocab")));
            }
        }

        for required in special_tokens.iter().chain(end_symbol.iter()).chain(placeholders.iter()) {
            if !keys.contains(required.as_str()) {
                return Err(Error::ModelLoad(format!("{required:?} is declared but missing from vocab")));
            }
        }

        let placeholder_set: HashSet<&str> = placeholders.iter().map(String::as_str).collect();
        let base_len = vocab.len().checked_sub(placeholders.len()).ok_or_else(|| {
            Error::ModelLoad("more placeholders declared than vocab entries".into())
        })?;
        let expected = base_len + merges.len() + placeholders.len();
        if vocab_size != expected {
            return Err(Error::ModelLoad(format!(
                "vocab_size is {vocab_size} but vocab and merges describe {expected} ids"
            )));
        }

        let special_set: HashSet<&str> = special_tokens.iter().map(String::as_str).collect();
        let mut symbols = Vec::with_capacity(base_len);
        for id in 0..base_len as u32 {
            let token = by_id.get(&id).copied().ok_or_else(|| {
                Error::ModelLoad(format!("base ids must be contiguous from 0, id {id} is missing"))
            })?;
            if placeholder_set.contains(token) {
                return Err(Error::ModelLoad(format!(
                    "placeholder {token:?} sits among the base ids at {id}"
                )));
            }
            let symbol = if special_set.contains(token) {
                Symbol::Special(token.to_string())
            } else if end_symbol.as_deref() == Some(token) {
                Symbol::EndMarker(token.to_string())
            } else {
                match alphabet {
                    AlphabetMode::Byte => key_to_byte(token).map(Symbol::Byte),
                    AlphabetMode::Character => {
                        let mut chars = token.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => Some(Symbol::Char(c)),
                            _ => None,
                        }
                    }
                }
                .ok_or_else(|| {
                    Error::ModelLoad(format!("{token:?} is not a valid {alphabet:?} alphabet symbol"))
                })?
            };
            symbols.push(symbol);
        }

        let first_placeholder = base_len + merges.len();
        for (i, placeholder) in placeholders.iter().enumerate() {
            let expected_id = (first_placeholder + i) as u32;
            if by_id.get(&expected_id).copied() != Some(placeholder.as_str()) {
                return Err(Error::ModelLoad(format!(
                    "placeholder {placeholder:?} must have id {expected_id}"
                )));
            }
        }

        BpeModel::new(alphabet, symbols, merges, placeholders)
    }
}
