//! N-gram contexts and the association index.
//!
//! Entries are keyed by word identity (terminal ids), never ownership:
//! evicting a word drops every association that references it, and the
//! compaction pass remaps ids when the trie arena is rebuilt.

use std::collections::HashMap;

use crate::probability::{ProbabilityEntry, NOT_A_PROBABILITY};
use crate::trie::TermId;

/// Context of 0–2 preceding words for an n-gram association.
///
/// Constructors take words most-recent-first, the order lookups naturally
/// produce; two-word contexts are stored oldest-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NgramContext {
    kind: ContextKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ContextKind {
    /// Sentence-initial marker: a distinct zero-word context, not a word.
    BeginningOfSentence,
    /// 1..=2 preceding words, oldest first.
    Words(Vec<String>),
}

impl NgramContext {
    pub fn beginning_of_sentence() -> Self {
        Self {
            kind: ContextKind::BeginningOfSentence,
        }
    }

    /// Bigram context: the single word preceding the target.
    pub fn of_prev_word(prev: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Words(vec![prev.into()]),
        }
    }

    /// Trigram context: `prev` is the most recent word, `prev2` the one
    /// before it.
    pub fn of_prev_words(prev: impl Into<String>, prev2: impl Into<String>) -> Self {
        Self {
            kind: ContextKind::Words(vec![prev2.into(), prev.into()]),
        }
    }

    pub fn is_beginning_of_sentence(&self) -> bool {
        matches!(self.kind, ContextKind::BeginningOfSentence)
    }

    /// Number of context words; 0 for the beginning-of-sentence marker.
    pub fn word_count(&self) -> usize {
        match &self.kind {
            ContextKind::BeginningOfSentence => 0,
            ContextKind::Words(words) => words.len(),
        }
    }

    pub(crate) fn words_oldest_first(&self) -> &[String] {
        match &self.kind {
            ContextKind::BeginningOfSentence => &[],
            ContextKind::Words(words) => words,
        }
    }
}

/// Most recent context slot an association hangs off: the sentence-start
/// marker or a stored word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum CtxHead {
    BeginningOfSentence,
    Word(TermId),
}

/// Remainder of an association key under one head: the older context word
/// (trigrams only) and the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct AssocKey {
    pub(crate) older: Option<TermId>,
    pub(crate) target: TermId,
}

pub(crate) struct NgramIndex {
    assoc: HashMap<CtxHead, HashMap<AssocKey, ProbabilityEntry>>,
    bigram_count: usize,
    trigram_count: usize,
}

impl NgramIndex {
    pub(crate) fn new() -> Self {
        Self {
            assoc: HashMap::new(),
            bigram_count: 0,
            trigram_count: 0,
        }
    }

    /// Idempotent on (head, key): re-adding updates the probability.
    pub(crate) fn add_or_update(
        &mut self,
        head: CtxHead,
        key: AssocKey,
        probability: u8,
        timestamp: Option<u64>,
    ) {
        let bucket = self.assoc.entry(head).or_default();
        match bucket.get_mut(&key) {
            Some(entry) => entry.update(probability, timestamp),
            None => {
                let entry = match timestamp {
                    Some(ts) => ProbabilityEntry::with_timestamp(probability, ts),
                    None => ProbabilityEntry::new(probability),
                };
                bucket.insert(key, entry);
                self.bump(key, 1);
            }
        }
    }

    /// Replace-or-create with a fully formed entry (image rebuild path).
    pub(crate) fn insert_entry(&mut self, head: CtxHead, key: AssocKey, entry: ProbabilityEntry) {
        let bucket = self.assoc.entry(head).or_default();
        if bucket.insert(key, entry).is_none() {
            self.bump(key, 1);
        }
    }

    pub(crate) fn probability(&self, head: CtxHead, key: AssocKey) -> i32 {
        self.assoc
            .get(&head)
            .and_then(|bucket| bucket.get(&key))
            .map_or(NOT_A_PROBABILITY, |e| e.probability as i32)
    }

    pub(crate) fn remove(&mut self, head: CtxHead, key: AssocKey) -> bool {
        let Some(bucket) = self.assoc.get_mut(&head) else {
            return false;
        };
        let removed = bucket.remove(&key).is_some();
        if removed {
            self.bump(key, -1);
            if bucket.is_empty() {
                self.assoc.remove(&head);
            }
        }
        removed
    }

    /// Drop every association referencing `tid` as context or target.
    pub(crate) fn drop_word(&mut self, tid: TermId) {
        if let Some(bucket) = self.assoc.remove(&CtxHead::Word(tid)) {
            for key in bucket.keys() {
                self.bump(*key, -1);
            }
        }
        let mut dropped: Vec<AssocKey> = Vec::new();
        self.assoc.retain(|_, bucket| {
            bucket.retain(|key, _| {
                let keep = key.older != Some(tid) && key.target != tid;
                if !keep {
                    dropped.push(*key);
                }
                keep
            });
            !bucket.is_empty()
        });
        for key in dropped {
            self.bump(key, -1);
        }
    }

    /// Rebuild the index through a terminal-id map after compaction,
    /// dropping entries whose endpoints did not survive.
    pub(crate) fn remap(&mut self, map: &HashMap<TermId, TermId>) {
        let old = std::mem::replace(self, Self::new());
        for (head, key, entry) in old.iter() {
            let head = match head {
                CtxHead::BeginningOfSentence => CtxHead::BeginningOfSentence,
                CtxHead::Word(id) => match map.get(&id) {
                    Some(&new_id) => CtxHead::Word(new_id),
                    None => continue,
                },
            };
            let older = match key.older {
                None => None,
                Some(id) => match map.get(&id) {
                    Some(&new_id) => Some(new_id),
                    None => continue,
                },
            };
            let Some(&target) = map.get(&key.target) else {
                continue;
            };
            self.insert_entry(head, AssocKey { older, target }, *entry);
        }
    }

    pub(crate) fn entries_for_head(
        &self,
        head: CtxHead,
    ) -> impl Iterator<Item = (AssocKey, &ProbabilityEntry)> {
        self.assoc
            .get(&head)
            .into_iter()
            .flatten()
            .map(|(key, entry)| (*key, entry))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (CtxHead, AssocKey, &ProbabilityEntry)> {
        self.assoc.iter().flat_map(|(head, bucket)| {
            bucket.iter().map(move |(key, entry)| (*head, *key, entry))
        })
    }

    /// Live entries with a zero- or one-word context (the capacity-counted
    /// kind; the beginning-of-sentence marker counts here too).
    pub(crate) fn bigram_count(&self) -> usize {
        self.bigram_count
    }

    pub(crate) fn trigram_count(&self) -> usize {
        self.trigram_count
    }

    fn bump(&mut self, key: AssocKey, delta: isize) {
        let counter = if key.older.is_some() {
            &mut self.trigram_count
        } else {
            &mut self.bigram_count
        };
        *counter = counter.checked_add_signed(delta).unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TermId = 0;
    const B: TermId = 1;
    const C: TermId = 2;

    fn bigram(target: TermId) -> AssocKey {
        AssocKey {
            older: None,
            target,
        }
    }

    #[test]
    fn test_add_and_query() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::Word(A), bigram(B), 150, None);
        assert_eq!(idx.probability(CtxHead::Word(A), bigram(B)), 150);
        assert_eq!(idx.probability(CtxHead::Word(B), bigram(A)), NOT_A_PROBABILITY);
        assert_eq!(idx.bigram_count(), 1);
    }

    #[test]
    fn test_readd_updates_in_place() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::Word(A), bigram(B), 150, None);
        idx.add_or_update(CtxHead::Word(A), bigram(B), 200, None);
        assert_eq!(idx.probability(CtxHead::Word(A), bigram(B)), 200);
        assert_eq!(idx.bigram_count(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::Word(A), bigram(B), 150, None);
        assert!(idx.remove(CtxHead::Word(A), bigram(B)));
        assert!(!idx.remove(CtxHead::Word(A), bigram(B)));
        assert_eq!(idx.probability(CtxHead::Word(A), bigram(B)), NOT_A_PROBABILITY);
        assert_eq!(idx.bigram_count(), 0);
    }

    #[test]
    fn test_trigram_counts_separately() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(
            CtxHead::Word(B),
            AssocKey {
                older: Some(A),
                target: C,
            },
            100,
            None,
        );
        assert_eq!(idx.bigram_count(), 0);
        assert_eq!(idx.trigram_count(), 1);
    }

    #[test]
    fn test_drop_word_removes_all_references() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::Word(A), bigram(B), 10, None);
        idx.add_or_update(CtxHead::Word(B), bigram(C), 20, None);
        idx.add_or_update(
            CtxHead::Word(C),
            AssocKey {
                older: Some(B),
                target: A,
            },
            30,
            None,
        );
        idx.drop_word(B);
        assert_eq!(idx.probability(CtxHead::Word(A), bigram(B)), NOT_A_PROBABILITY);
        assert_eq!(idx.probability(CtxHead::Word(B), bigram(C)), NOT_A_PROBABILITY);
        assert_eq!(idx.bigram_count(), 0);
        assert_eq!(idx.trigram_count(), 0);
    }

    #[test]
    fn test_bos_counts_as_bigram() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::BeginningOfSentence, bigram(A), 200, None);
        assert_eq!(idx.bigram_count(), 1);
        assert_eq!(
            idx.probability(CtxHead::BeginningOfSentence, bigram(A)),
            200
        );
    }

    #[test]
    fn test_remap_drops_dead_endpoints() {
        let mut idx = NgramIndex::new();
        idx.add_or_update(CtxHead::Word(A), bigram(B), 10, None);
        idx.add_or_update(CtxHead::Word(B), bigram(C), 20, None);
        let map: std::collections::HashMap<TermId, TermId> =
            [(A, 5), (B, 6)].into_iter().collect();
        idx.remap(&map);
        assert_eq!(idx.probability(CtxHead::Word(5), bigram(6)), 10);
        // B→C dropped: C has no mapping
        assert_eq!(idx.bigram_count(), 1);
    }

    #[test]
    fn test_context_ordering() {
        let ctx = NgramContext::of_prev_words("recent", "older");
        assert_eq!(ctx.words_oldest_first(), ["older", "recent"]);
        assert_eq!(ctx.word_count(), 2);
        assert!(NgramContext::beginning_of_sentence().is_beginning_of_sentence());
        assert_eq!(NgramContext::beginning_of_sentence().word_count(), 0);
    }
}
