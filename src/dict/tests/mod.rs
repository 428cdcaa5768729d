mod migration;

use tempfile::TempDir;

use crate::header::FormatVersion;
use crate::ngram::NgramContext;
use crate::trie::WordFlags;

use super::Dictionary;

const ALL_VERSIONS: [FormatVersion; 3] = [
    FormatVersion::V402,
    FormatVersion::V403,
    FormatVersion::V4Dev,
];

fn no_attrs() -> Vec<(String, String)> {
    Vec::new()
}

fn empty_dict(dir: &TempDir, version: FormatVersion) -> Dictionary {
    Dictionary::create(dir.path().join("test.lxdt"), version, "en", no_attrs()).unwrap()
}

fn add_unigram(dict: &mut Dictionary, word: &str, probability: u8) -> bool {
    dict.add_unigram_entry(word, probability, None, WordFlags::default(), None)
}

fn add_bigram(dict: &mut Dictionary, word0: &str, word1: &str, probability: u8) -> bool {
    dict.add_ngram_entry(&NgramContext::of_prev_word(word0), word1, probability, None)
}

/// `word0` then `word1` precede `word2`, oldest first.
fn add_trigram(
    dict: &mut Dictionary,
    word0: &str,
    word1: &str,
    word2: &str,
    probability: u8,
) -> bool {
    dict.add_ngram_entry(
        &NgramContext::of_prev_words(word1, word0),
        word2,
        probability,
        None,
    )
}

fn bigram_probability(dict: &Dictionary, word0: &str, word1: &str) -> i32 {
    dict.ngram_probability(&NgramContext::of_prev_word(word0), word1)
}

fn is_valid_bigram(dict: &Dictionary, word0: &str, word1: &str) -> bool {
    dict.is_valid_ngram(&NgramContext::of_prev_word(word0), word1)
}

fn trigram_probability(dict: &Dictionary, word0: &str, word1: &str, word2: &str) -> i32 {
    dict.ngram_probability(&NgramContext::of_prev_words(word1, word0), word2)
}
