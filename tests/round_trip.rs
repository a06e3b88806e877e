use std::sync::LazyLock;

use bpe_subword::{train, AlphabetMode, BpeTrainer, Segmentation, BPE};
use proptest::prelude::*;

const CORPUS: &str = "the quick brown fox jumps over the lazy dog\n\
    the dog barks and the fox runs away\n\
    über naïve café, 東京 and 北京 are cities\n\
    aaaa bbbb abab baba the the the\n";

static BYTE_BPE: LazyLock<BPE> = LazyLock::new(|| {
    let trainer = BpeTrainer::builder()
        .vocab_size(256 + 60)
        .segmentation(Segmentation::Lines)
        .build();
    BPE::new(train(CORPUS, &trainer).unwrap().model)
});

static CHAR_BPE: LazyLock<BPE> = LazyLock::new(|| {
    let trainer = BpeTrainer::builder()
        .alphabet_mode(AlphabetMode::Character)
        .special_tokens(vec!["<pad>".into(), "<unk>".into()])
        .add_boundary_marker(true)
        .vocab_size(80)
        .build();
    BPE::new(train(CORPUS, &trainer).unwrap().model)
});

fn alphabet_text() -> impl Strategy<Value = String> {
    let chars = vec!['t', 'h', 'e', ' ', 'a', 'b', 'o', 'x', 'ü', '東', '\n'];
    proptest::collection::vec(proptest::sample::select(chars), 0..48)
        .prop_map(|chars| chars.into_iter().collect())
}

#[test]
fn trained_models_learn_merges() {
    assert!(!BYTE_BPE.model().merges().is_empty());
    assert!(!CHAR_BPE.model().merges().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn byte_mode_round_trips_any_text(text in any::<String>()) {
        let ids = BYTE_BPE.encode(&text);
        prop_assert_eq!(BYTE_BPE.decode(&ids), text);
    }

    #[test]
    fn character_mode_round_trips_alphabet_text(text in alphabet_text()) {
        let (ids, unknown) = CHAR_BPE.encode_with_report(&text);
        prop_assert_eq!(unknown, 0);
        prop_assert_eq!(CHAR_BPE.decode(&ids), text);
    }

    #[test]
    fn encoding_never_grows_the_sequence(text in ".{0,64}") {
        let model = BYTE_BPE.model();
        let (base, _) = model.decompose(&text);
        let ids = BYTE_BPE.encode(&text);
        prop_assert!(ids.len() <= base.len());

        let any_rule = base.windows(2).any(|w| model.merge_rank(&(w[0], w[1])).is_some());
        prop_assert_eq!(ids.len() < base.len(), any_rule);
    }

    #[test]
    fn decode_then_encode_is_stable(text in ".{0,64}") {
        let ids = BYTE_BPE.encode(&text);
        let again = BYTE_BPE.encode(&BYTE_BPE.decode(&ids));
        prop_assert_eq!(again, ids);
    }

    #[test]
    fn decoding_arbitrary_ids_never_panics(ids in proptest::collection::vec(0u32..2000, 0..32)) {
        let report = CHAR_BPE.decode_with_report(&ids);
        let vocab = CHAR_BPE.model().vocab_size() as u32;
        let expected = ids.iter().filter(|&&id| id >= vocab).count();
        prop_assert_eq!(report.unknown_ids, expected);
    }
}
