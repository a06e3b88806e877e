//! Byte Pair Encoding: learn merge rules from a corpus, persist them as JSON and
//! use them to encode text into ids and back.
//!
//! ```
//! use bpe_subword::{train, BpeTrainer, BPE};
//!
//! let trainer = BpeTrainer::builder().vocab_size(259).build();
//! let output = train("aaabdaaabac", &trainer).unwrap();
//! let bpe = BPE::new(output.model);
//! assert_eq!(bpe.encode("aaabdaaabac"), vec![258, 100, 258, 97, 99]);
//! assert_eq!(bpe.decode(&[258, 100, 258, 97, 99]), "aaabdaaabac");
//! ```

pub mod tokenizer;

pub use tokenizer::{
    train, AlphabetMode, Backfill, BpeModel, BpeTrainer, BpeTrainerBuilder, DecodeReport, Error,
    Model, Result, Segmentation, StopReason, Trainer, TrainingOutput, TrainingReport, BPE,
};
