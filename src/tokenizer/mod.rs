// src/tokenizer/mod.rs

pub mod added_vocabulary;
pub mod bpe;
pub mod bpe_trainer;
pub mod format;
pub mod model;
pub mod pair;
pub mod pre_tokenizer;
pub mod progress;
pub mod result;
pub mod word;

pub use added_vocabulary::{AddedToken, AddedVocabulary};
pub use bpe::{DecodeReport, Rank, BPE};
pub use bpe_trainer::{
    Backfill, BpeTrainer, BpeTrainerBuilder, StopReason, TrainingOutput, TrainingReport,
};
pub use format::SerializedModel;
pub use model::{AlphabetMode, BpeModel, Symbol};
pub use pair::{Pair, PairStatistics};
pub use pre_tokenizer::Segmentation;
pub use result::{Error, Result};
pub use word::Word;

/// What every tokenizer model can do once trained.
pub trait Model: Send + Sync + Default {
    /// Tokenizes the given input string.
    fn tokenize(&self, text: &str) -> Vec<u32>;

    /// Concatenated byte expansions of `ids`.
    fn decode_bytes(&self, ids: &[u32]) -> Vec<u8>;

    fn id_to_token(&self, id: u32) -> Option<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    /// Returns the vocabulary size of the model.
    fn get_vocab_size(&self) -> usize;
}

/// A trait defining the behavior of a tokenizer Trainer.
pub trait Trainer: Send + Sync {
    /// The type of Model this trainer can produce.
    type Model: Model;

    /// Trains on everything fed so far and replaces `model` with the result.
    fn train(&self, model: &mut Self::Model) -> Result<TrainingReport>;

    /// Feeds data to the trainer.
    /// `process` turns each sequence into the units the trainer counts.
    fn feed<I, S, F>(&mut self, iterator: I, process: F) -> Result<()>
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Result<Vec<String>>;

    /// Indicates whether training progress should be displayed.
    fn should_show_progress(&self) -> bool;
}

/// Trains a model on `corpus` with the configuration in `trainer`.
pub fn train(corpus: &str, trainer: &BpeTrainer) -> Result<TrainingOutput> {
    let mut trainer = trainer.clone();
    trainer.feed_text(corpus)?;
    trainer.do_train(trainer.words())
}
