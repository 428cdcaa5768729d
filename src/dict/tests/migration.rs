use std::collections::HashMap;

use tempfile::tempdir;

use crate::dict::{Dictionary, BIGRAM_COUNT_QUERY, UNIGRAM_COUNT_QUERY};
use crate::header::FormatVersion;
use crate::ngram::NgramContext;
use crate::probability::NOT_A_PROBABILITY;
use crate::trie::{ShortcutTarget, WordFlags};

use super::*;

/// Build the richest dictionary one version can hold: unigrams, a bigram,
/// a beginning-of-sentence bigram, a shortcut, flags, and (where the
/// format allows) a trigram.
fn build_fixture(dict: &mut Dictionary) {
    add_unigram(dict, "aaa", 100);
    add_unigram(dict, "bbb", 100);
    add_bigram(dict, "aaa", "bbb", 150);
    dict.add_unigram_entry(
        "ccc",
        100,
        Some(ShortcutTarget {
            target: "xxx".to_string(),
            probability: 10,
        }),
        WordFlags::default(),
        None,
    );
    dict.add_unigram_entry(
        "ddd",
        100,
        None,
        WordFlags {
            is_not_a_word: true,
            is_possibly_offensive: true,
            ..WordFlags::default()
        },
        None,
    );
    dict.add_ngram_entry(
        &NgramContext::beginning_of_sentence(),
        "aaa",
        150,
        None,
    );
    if dict
        .format_version()
        .is_some_and(FormatVersion::supports_trigrams)
    {
        add_trigram(dict, "aaa", "bbb", "ccc", 180);
    }
}

fn check_fixture(dict: &Dictionary) {
    assert_eq!(dict.frequency("aaa"), 100);
    assert_eq!(dict.frequency("bbb"), 100);
    assert!(is_valid_bigram(dict, "aaa", "bbb"));
    assert_eq!(bigram_probability(dict, "aaa", "bbb"), 150);
    assert_eq!(
        dict.ngram_probability(&NgramContext::beginning_of_sentence(), "aaa"),
        150
    );
    let property = dict.word_property("ccc", false);
    assert_eq!(property.shortcuts.len(), 1);
    assert_eq!(property.shortcuts[0].word, "xxx");
    let property = dict.word_property("ddd", false);
    assert!(property.flags.is_not_a_word);
    assert!(property.flags.is_possibly_offensive);
}

#[test]
fn test_migration_preserves_content() {
    for from in ALL_VERSIONS {
        for to in ALL_VERSIONS {
            let dir = tempdir().unwrap();
            let mut dict = empty_dict(&dir, from);
            build_fixture(&mut dict);
            assert_eq!(dict.format_version(), Some(from));

            dict.migrate_to(to).unwrap();
            assert!(dict.is_valid());
            assert_eq!(dict.format_version(), Some(to));
            check_fixture(&dict);

            if from.supports_trigrams() && to.supports_trigrams() {
                assert_eq!(trigram_probability(&dict, "aaa", "bbb", "ccc"), 180);
            } else {
                assert_eq!(
                    trigram_probability(&dict, "aaa", "bbb", "ccc"),
                    NOT_A_PROBABILITY
                );
            }
        }
    }
}

#[test]
fn test_migration_is_persistent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.lxdt");
    let mut dict = empty_dict(&dir, FormatVersion::V402);
    build_fixture(&mut dict);
    dict.migrate_to(FormatVersion::V4Dev).unwrap();
    dict.close();

    let dict = Dictionary::open(&path).unwrap();
    assert_eq!(dict.format_version(), Some(FormatVersion::V4Dev));
    check_fixture(&dict);
}

#[test]
fn test_downgrade_drops_trigrams_only() {
    let dir = tempdir().unwrap();
    let mut dict = empty_dict(&dir, FormatVersion::V403);
    build_fixture(&mut dict);
    assert_eq!(trigram_probability(&dict, "aaa", "bbb", "ccc"), 180);

    dict.migrate_to(FormatVersion::V402).unwrap();
    assert_eq!(
        trigram_probability(&dict, "aaa", "bbb", "ccc"),
        NOT_A_PROBABILITY
    );
    check_fixture(&dict);

    // Upgrading back does not resurrect them.
    dict.migrate_to(FormatVersion::V403).unwrap();
    assert_eq!(
        trigram_probability(&dict, "aaa", "bbb", "ccc"),
        NOT_A_PROBABILITY
    );
    assert!(add_trigram(&mut dict, "aaa", "bbb", "ccc", 180));
}

#[test]
fn test_upgrade_enables_trigrams() {
    let dir = tempdir().unwrap();
    let mut dict = empty_dict(&dir, FormatVersion::V402);
    add_unigram(&mut dict, "aaa", 100);
    add_unigram(&mut dict, "bbb", 100);
    add_unigram(&mut dict, "ccc", 100);
    assert!(!add_trigram(&mut dict, "aaa", "bbb", "ccc", 180));

    dict.migrate_to(FormatVersion::V403).unwrap();
    assert!(add_trigram(&mut dict, "aaa", "bbb", "ccc", 180));
    assert_eq!(trigram_probability(&dict, "aaa", "bbb", "ccc"), 180);
}

#[test]
fn test_large_migration() {
    let dir = tempdir().unwrap();
    let mut dict = empty_dict(&dir, FormatVersion::V403);

    let mut unigram_probabilities: HashMap<String, u8> = HashMap::new();
    let mut bigram_probabilities: HashMap<(String, String), u8> = HashMap::new();
    for i in 0..300u32 {
        let word = format!("w{i:03}");
        let probability = (i % 255) as u8;
        add_unigram(&mut dict, &word, probability);
        unigram_probabilities.insert(word, probability);
    }
    for i in 0..300u32 {
        let word0 = format!("w{:03}", i);
        let word1 = format!("w{:03}", (i * 7 + 1) % 300);
        let probability = ((i * 3) % 200) as u8 + 1;
        if word0 != word1 && add_bigram(&mut dict, &word0, &word1, probability) {
            bigram_probabilities.insert((word0, word1), probability);
        }
    }

    dict.migrate_to(FormatVersion::V4Dev).unwrap();

    for (word, &probability) in &unigram_probabilities {
        assert_eq!(dict.frequency(word), probability as i32);
    }
    for ((word0, word1), &probability) in &bigram_probabilities {
        assert_eq!(bigram_probability(&dict, word0, word1), probability as i32);
        assert!(is_valid_bigram(&dict, word0, word1));
    }
    assert_eq!(
        dict.stat(UNIGRAM_COUNT_QUERY),
        unigram_probabilities.len().to_string()
    );
    assert_eq!(
        dict.stat(BIGRAM_COUNT_QUERY),
        // The beginning-of-sentence entry is absent here; plain bigrams only.
        bigram_probabilities.len().to_string()
    );
}
