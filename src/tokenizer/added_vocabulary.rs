// src/tokenizer/added_vocabulary.rs

use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";

/// A token that lives outside merge learning.
///
/// Special tokens (`<pad>`, `<unk>`, ...) are reserved at the lowest ids and are
/// never part of a merge. Placeholders are the `<extra_N>` entries used to pad a
/// vocabulary that stopped short of its target size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AddedToken {
    /// The content of the added token
    pub content: String,
    /// `true` for reserved special tokens, `false` for backfill placeholders
    pub special: bool,
}

impl AddedToken {
    pub fn from<S: Into<String>>(content: S, special: bool) -> Self {
        Self {
            content: content.into(),
            special,
        }
    }

    pub fn placeholder(index: usize) -> Self {
        Self::from(format!("<extra_{index}>"), false)
    }
}

/// Id lookup for every [`AddedToken`] of a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedVocabulary {
    /// Contains the mapping from String (token content) to ID.
    added_tokens_map: HashMap<String, u32>,
    /// Contains the mapping from ID to AddedToken for all the added tokens.
    added_tokens_map_r: HashMap<u32, AddedToken>,
}

impl AddedVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.added_tokens_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.added_tokens_map.is_empty()
    }

    /// Registers `token` under `id`. Returns `false` if the content or the id is
    /// already taken, leaving the vocabulary unchanged.
    pub fn add(&mut self, token: AddedToken, id: u32) -> bool {
        if self.added_tokens_map.contains_key(&token.content)
            || self.added_tokens_map_r.contains_key(&id)
        {
            return false;
        }
        self.added_tokens_map.insert(token.content.clone(), id);
        self.added_tokens_map_r.insert(id, token);
        true
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.added_tokens_map.get(token).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&AddedToken> {
        self.added_tokens_map_r.get(&id)
    }

    pub fn is_special_id(&self, id: u32) -> bool {
        self.added_tokens_map_r
            .get(&id)
            .is_some_and(|token| token.special)
    }

    pub fn is_special_token(&self, token: &str) -> bool {
        self.token_to_id(token).is_some_and(|id| self.is_special_id(id))
    }

    /// Id of the `<unk>` special token, if the model reserved one.
    pub fn unk_id(&self) -> Option<u32> {
        self.token_to_id(UNK_TOKEN)
            .filter(|&id| self.is_special_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates() {
        let mut added = AddedVocabulary::new();
        assert!(added.add(AddedToken::from(PAD_TOKEN, true), 0));
        assert!(!added.add(AddedToken::from(PAD_TOKEN, true), 1));
        assert!(!added.add(AddedToken::from(UNK_TOKEN, true), 0));
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn unk_lookup_requires_a_special_token() {
        let mut added = AddedVocabulary::new();
        assert_eq!(added.unk_id(), None);
        added.add(AddedToken::from(PAD_TOKEN, true), 0);
        added.add(AddedToken::from(UNK_TOKEN, true), 1);
        added.add(AddedToken::placeholder(0), 40);
        assert_eq!(added.unk_id(), Some(1));
        assert!(added.is_special_id(0));
        assert!(!added.is_special_id(40));
        assert_eq!(added.id_to_token(40).map(|t| t.content.as_str()), Some("<extra_0>"));
        assert!(added.is_special_token(UNK_TOKEN));
        assert!(!added.is_special_token("<extra_0>"));
    }
}
