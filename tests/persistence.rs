use std::io::Write;

use bpe_subword::tokenizer::SerializedModel;
use bpe_subword::{train, AlphabetMode, Backfill, BpeModel, BpeTrainer, Error, BPE};
use tempfile::NamedTempFile;

fn fixture_model() -> BpeModel {
    let trainer = BpeTrainer::builder().vocab_size(259).build();
    train("aaabdaaabac", &trainer).unwrap().model
}

#[test]
fn save_and_load_preserve_the_model() {
    let model = fixture_model();
    let file = NamedTempFile::new().unwrap();
    model.save(file.path()).unwrap();

    let loaded = BpeModel::load(file.path()).unwrap();
    assert_eq!(loaded, model);
    assert_eq!(loaded.merges(), &[(97, 97), (97, 98), (256, 257)]);
    assert_eq!(
        BPE::new(loaded).encode("aaabdaaabac"),
        vec![258, 100, 258, 97, 99]
    );
}

#[test]
fn character_model_with_placeholders_survives_reload() {
    let trainer = BpeTrainer::builder()
        .alphabet_mode(AlphabetMode::Character)
        .special_tokens(vec!["<pad>".into(), "<unk>".into(), "<s>".into()])
        .add_boundary_marker(true)
        .backfill(Backfill::Placeholders)
        .vocab_size(40)
        .build();
    let output = train("low lower lowest\nnewer wider\n", &trainer).unwrap();
    assert!(output.report.placeholders > 0);
    assert_eq!(output.model.vocab_size(), 40);

    let file = NamedTempFile::new().unwrap();
    output.model.save(file.path()).unwrap();
    let loaded = BpeModel::load(file.path()).unwrap();

    assert_eq!(loaded, output.model);
    assert_eq!(loaded.special_tokens(), vec!["<pad>", "<unk>", "<s>"]);
    assert_eq!(loaded.end_symbol(), Some("</w>"));
    assert_eq!(loaded.placeholders(), output.model.placeholders());

    let before = BPE::new(output.model);
    let after = BPE::new(loaded);
    for text in ["lowest", "newer wider", "zebra"] {
        assert_eq!(after.encode(text), before.encode(text));
    }
}

#[test]
fn json_keeps_merge_order() {
    let model = fixture_model();
    let json = model.to_json().unwrap();
    let serialized: SerializedModel = serde_json::from_str(&json).unwrap();
    assert_eq!(serialized.vocab_size, 259);
    assert_eq!(serialized.merges, vec![(97, 97), (97, 98), (256, 257)]);
    assert_eq!(serialized.vocab.len(), 256);
    assert!(serialized.special_tokens.is_empty());
    assert_eq!(serialized.end_symbol, None);
}

#[test]
fn swapping_merge_priority_changes_encoding() {
    let model = fixture_model();
    let mut serialized = model.to_serialized();
    // ab before aa; the third rule is renumbered to keep spelling "aaab"
    serialized.merges = vec![(97, 98), (97, 97), (257, 256)];
    let swapped = BpeModel::try_from(serialized).unwrap();

    let original = BPE::new(model);
    let swapped = BPE::new(swapped);
    assert_eq!(original.encode("aab"), vec![256, 98]);
    assert_eq!(swapped.encode("aab"), vec![97, 256]);
    assert_eq!(swapped.decode(&swapped.encode("aab")), "aab");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BpeModel::load(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
}

#[test]
fn malformed_files_are_load_errors() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{\"vocab_size\": 3, \"vocab\": ").unwrap();
    file.flush().unwrap();
    assert!(matches!(
        BpeModel::load(file.path()).unwrap_err(),
        Error::ModelLoad(_)
    ));

    let json = fixture_model()
        .to_json()
        .unwrap()
        .replace("\"vocab_size\": 259", "\"vocab_size\": 260");
    assert!(matches!(
        BpeModel::from_json(&json).unwrap_err(),
        Error::ModelLoad(_)
    ));
}

#[test]
fn unknown_alphabet_key_is_rejected() {
    let json = fixture_model().to_json().unwrap().replace("\"a\": 97", "\"aa\": 97");
    let err = BpeModel::from_json(&json).unwrap_err();
    assert!(matches!(err, Error::ModelLoad(msg) if msg.contains("alphabet")));
}
