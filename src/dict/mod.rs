//! Dictionary sessions: open/create, point mutations, flush, GC, migration.
//!
//! One session owns one dictionary instance. The engine is single-writer
//! and does no locking of its own; callers serialize access externally,
//! and opening the same file from two sessions at once is unsupported.
//! Mutations are in-memory until `flush`/`flush_with_gc`; closing without
//! flushing discards them. The write path always builds the full image in
//! memory and replaces the file atomically, so a process killed mid-flush
//! leaves the previous on-disk state intact.

mod codec;
mod gc;
#[cfg(test)]
mod tests;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::header::{DictionaryHeader, FormatVersion};
use crate::ngram::{AssocKey, CtxHead, NgramContext, NgramIndex};
use crate::probability::{ProbabilityEntry, NOT_A_PROBABILITY};
use crate::settings::settings;
use crate::trie::{cursor, ShortcutTarget, TermId, TrieStore, WordFlags};

/// Stat query name for the live unigram count.
pub const UNIGRAM_COUNT_QUERY: &str = "UNIGRAM_COUNT";
/// Stat query name for the live bigram count.
pub const BIGRAM_COUNT_QUERY: &str = "BIGRAM_COUNT";

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected LXDT)")]
    InvalidMagic,

    #[error("unsupported format version tag: {0}")]
    UnsupportedVersion(u16),

    #[error("body checksum mismatch")]
    ChecksumMismatch,

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("dictionary session is closed")]
    Closed,
}

/// Word/probability pair used for shortcut targets and n-gram targets in
/// read models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedString {
    pub word: String,
    pub probability: i32,
}

#[derive(Debug, Clone)]
pub struct NgramProperty {
    pub context: NgramContext,
    pub target: String,
    pub probability: i32,
}

/// Read-model snapshot of one stored word: probability, flags, shortcuts,
/// and the associations whose most recent context word it is.
///
/// Queries for absent words return the explicitly-invalid marker from
/// [`WordProperty::invalid`] rather than an optional result.
#[derive(Debug, Clone)]
pub struct WordProperty {
    pub word: String,
    pub probability: i32,
    pub timestamp: Option<u64>,
    pub flags: WordFlags,
    pub shortcuts: Vec<WeightedString>,
    pub ngrams: Vec<NgramProperty>,
    valid: bool,
}

impl WordProperty {
    pub(crate) fn invalid() -> Self {
        Self {
            word: String::new(),
            probability: NOT_A_PROBABILITY,
            timestamp: None,
            flags: WordFlags::default(),
            shortcuts: Vec::new(),
            ngrams: Vec::new(),
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn has_ngrams(&self) -> bool {
        !self.ngrams.is_empty()
    }

    pub fn has_shortcuts(&self) -> bool {
        !self.shortcuts.is_empty()
    }
}

struct DictState {
    header: DictionaryHeader,
    trie: TrieStore,
    ngrams: NgramIndex,
    mutations_since_gc: u64,
    gc_has_run: bool,
}

impl DictState {
    fn empty(header: DictionaryHeader) -> Self {
        Self {
            header,
            trie: TrieStore::new(),
            ngrams: NgramIndex::new(),
            mutations_since_gc: 0,
            gc_has_run: false,
        }
    }

    fn from_image(header: DictionaryHeader, image: &codec::DictImage) -> Self {
        let mut trie = TrieStore::new();
        for u in &image.unigrams {
            let entry = ProbabilityEntry {
                probability: u.probability,
                historical: u.historical,
            };
            let flags = WordFlags {
                is_beginning_of_sentence: u.is_beginning_of_sentence,
                is_not_a_word: u.is_not_a_word,
                is_possibly_offensive: u.is_possibly_offensive,
            };
            let shortcuts = u
                .shortcuts
                .iter()
                .map(|s| ShortcutTarget {
                    target: s.target.clone(),
                    probability: s.probability,
                })
                .collect();
            trie.insert_entry(&u.word, entry, flags, shortcuts);
        }

        let mut ngrams = NgramIndex::new();
        for n in &image.ngrams {
            if n.context_words.len() == 2 && !header.version.supports_trigrams() {
                continue;
            }
            let Some((head, older)) = resolve_record_context(&trie, n) else {
                continue;
            };
            let Some(target) = trie.find_term(&n.target) else {
                continue;
            };
            ngrams.insert_entry(
                head,
                AssocKey { older, target },
                ProbabilityEntry {
                    probability: n.probability,
                    historical: n.historical,
                },
            );
        }

        Self {
            header,
            trie,
            ngrams,
            mutations_since_gc: 0,
            gc_has_run: false,
        }
    }

    fn over_capacity(&self) -> bool {
        self.trie.live_count() >= self.header.max_unigram_count()
            || self.ngrams.bigram_count() >= self.header.max_bigram_count()
    }
}

fn resolve_record_context(
    trie: &TrieStore,
    record: &codec::NgramRecord,
) -> Option<(CtxHead, Option<TermId>)> {
    if record.is_beginning_of_sentence {
        return Some((CtxHead::BeginningOfSentence, None));
    }
    match record.context_words.as_slice() {
        [recent] => Some((CtxHead::Word(trie.find_term(recent)?), None)),
        [older, recent] => Some((
            CtxHead::Word(trie.find_term(recent)?),
            Some(trie.find_term(older)?),
        )),
        _ => None,
    }
}

/// A mutable, probability-ranked word dictionary backed by one file.
pub struct Dictionary {
    path: PathBuf,
    state: Option<DictState>,
}

impl Dictionary {
    /// Create an empty dictionary file at `path` and open a session on it.
    pub fn create(
        path: impl Into<PathBuf>,
        version: FormatVersion,
        locale: &str,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, DictError> {
        let mut dict = Self::create_in_memory(path, version, locale, attributes);
        dict.flush()?;
        Ok(dict)
    }

    /// Create an empty session that only touches `path` on the first flush.
    pub fn create_in_memory(
        path: impl Into<PathBuf>,
        version: FormatVersion,
        locale: &str,
        attributes: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let header = DictionaryHeader::new(version, locale, attributes);
        Self {
            path: path.into(),
            state: Some(DictState::empty(header)),
        }
    }

    /// Open an existing dictionary file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DictError> {
        let path = path.into();
        let file = fs::File::open(&path)?;
        // SAFETY: the file is opened read-only and the mapping is immutable.
        // The Mmap is dropped after decoding completes below.
        let mmap = unsafe { Mmap::map(&file)? };
        let (version, image) = codec::decode(&mmap)?;
        let header = DictionaryHeader::new(version, image.locale.clone(), image.attributes.clone());
        let state = DictState::from_image(header, &image);
        Ok(Self {
            path,
            state: Some(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False once the session is closed.
    pub fn is_valid(&self) -> bool {
        self.state.is_some()
    }

    pub fn format_version(&self) -> Option<FormatVersion> {
        self.state.as_ref().map(|st| st.header.version)
    }

    pub fn locale(&self) -> Option<&str> {
        self.state.as_ref().map(|st| st.header.locale.as_str())
    }

    /// Add a word or update it in place. Too-long words are rejected as a
    /// no-op; a too-long shortcut target is dropped while the unigram
    /// update still applies. Returns `false` when rejected or closed.
    pub fn add_unigram_entry(
        &mut self,
        word: &str,
        probability: u8,
        shortcut: Option<ShortcutTarget>,
        flags: WordFlags,
        timestamp: Option<u64>,
    ) -> bool {
        let Some(st) = self.state.as_mut() else {
            return false;
        };
        let added = st.trie.add_or_update(word, probability, shortcut, flags, timestamp);
        if added {
            st.mutations_since_gc += 1;
        }
        added
    }

    /// Probability of `word`, or [`NOT_A_PROBABILITY`] when unknown.
    pub fn frequency(&self, word: &str) -> i32 {
        match self.state.as_ref() {
            Some(st) => st.trie.frequency(word),
            None => NOT_A_PROBABILITY,
        }
    }

    /// Maximum probability among stored keys that fold to the same base
    /// letters as `word` (case and `'`/`-` insensitive, spaces significant).
    pub fn max_frequency_of_exact_matches(&self, word: &str) -> i32 {
        match self.state.as_ref() {
            Some(st) => st.trie.max_frequency_of_exact_matches(word),
            None => NOT_A_PROBABILITY,
        }
    }

    /// Add an n-gram association or update its probability in place.
    ///
    /// No-op `false` unless the target and every context word resolve to
    /// stored words (the beginning-of-sentence marker aside), or when the
    /// format version does not store two-word contexts.
    pub fn add_ngram_entry(
        &mut self,
        context: &NgramContext,
        target: &str,
        probability: u8,
        timestamp: Option<u64>,
    ) -> bool {
        let Some(st) = self.state.as_mut() else {
            return false;
        };
        if context.word_count() == 2 && !st.header.version.supports_trigrams() {
            return false;
        }
        let Some((head, older)) = resolve_context(&st.trie, context) else {
            return false;
        };
        let Some(target) = st.trie.find_term(target) else {
            return false;
        };
        st.ngrams
            .add_or_update(head, AssocKey { older, target }, probability, timestamp);
        st.mutations_since_gc += 1;
        true
    }

    /// Tombstone a word and drop every association referencing it. The
    /// slot itself is reclaimed by the next compaction.
    pub fn remove_unigram_entry(&mut self, word: &str) -> bool {
        let Some(st) = self.state.as_mut() else {
            return false;
        };
        let Some(tid) = st.trie.find_term(word) else {
            return false;
        };
        st.ngrams.drop_word(tid);
        st.trie.remove_term(tid);
        st.mutations_since_gc += 1;
        true
    }

    /// Remove an n-gram association. Removing an absent entry is a
    /// harmless no-op returning `false`.
    pub fn remove_ngram_entry(&mut self, context: &NgramContext, target: &str) -> bool {
        let Some(st) = self.state.as_mut() else {
            return false;
        };
        let Some((head, key)) = resolve_ngram(st, context, target) else {
            return false;
        };
        let removed = st.ngrams.remove(head, key);
        if removed {
            st.mutations_since_gc += 1;
        }
        removed
    }

    pub fn is_valid_ngram(&self, context: &NgramContext, target: &str) -> bool {
        self.ngram_probability(context, target) != NOT_A_PROBABILITY
    }

    pub fn ngram_probability(&self, context: &NgramContext, target: &str) -> i32 {
        let Some(st) = self.state.as_ref() else {
            return NOT_A_PROBABILITY;
        };
        match resolve_ngram(st, context, target) {
            Some((head, key)) => st.ngrams.probability(head, key),
            None => NOT_A_PROBABILITY,
        }
    }

    /// Snapshot of one stored word, or the explicitly-invalid marker when
    /// absent. With `is_beginning_of_sentence` set, the snapshot describes
    /// the sentence-start marker and its outgoing associations instead of
    /// a stored word.
    pub fn word_property(&self, word: &str, is_beginning_of_sentence: bool) -> WordProperty {
        let Some(st) = self.state.as_ref() else {
            return WordProperty::invalid();
        };
        if is_beginning_of_sentence {
            let ngrams = collect_ngrams(st, CtxHead::BeginningOfSentence, |_| {
                NgramContext::beginning_of_sentence()
            });
            return WordProperty {
                word: String::new(),
                probability: NOT_A_PROBABILITY,
                timestamp: None,
                flags: WordFlags {
                    is_beginning_of_sentence: true,
                    ..WordFlags::default()
                },
                shortcuts: Vec::new(),
                ngrams,
                valid: true,
            };
        }
        match st.trie.find_term(word) {
            Some(tid) => build_word_property(st, tid),
            None => WordProperty::invalid(),
        }
    }

    /// Token-based iteration over all live words. Token 0 starts; a
    /// returned token of 0 signals the end of the sequence.
    pub fn next_word_property(&self, token: u32) -> (WordProperty, u32) {
        let Some(st) = self.state.as_ref() else {
            return (WordProperty::invalid(), 0);
        };
        match cursor::next_live(&st.trie, token) {
            Some((tid, next)) => (build_word_property(st, tid), next),
            None => (WordProperty::invalid(), 0),
        }
    }

    /// Whether a compaction pass is due: live counts at the configured
    /// maximums, or enough tombstones to matter. With
    /// `respect_blocking_window`, stays false for a while right after a
    /// compaction.
    pub fn needs_gc(&self, respect_blocking_window: bool) -> bool {
        let Some(st) = self.state.as_ref() else {
            return false;
        };
        if respect_blocking_window
            && st.gc_has_run
            && st.mutations_since_gc < settings().gc.blocking_window_mutations
        {
            return false;
        }
        st.over_capacity()
            || st.trie.dead_fraction() >= settings().gc.fragmentation_threshold
    }

    /// String-encoded engine statistics ([`UNIGRAM_COUNT_QUERY`],
    /// [`BIGRAM_COUNT_QUERY`]); empty string for unknown queries or a
    /// closed session.
    pub fn stat(&self, query: &str) -> String {
        let Some(st) = self.state.as_ref() else {
            return String::new();
        };
        match query {
            UNIGRAM_COUNT_QUERY => st.trie.live_count().to_string(),
            BIGRAM_COUNT_QUERY => st.ngrams.bigram_count().to_string(),
            _ => String::new(),
        }
    }

    /// Persist the current live state in place (atomic replace).
    pub fn flush(&mut self) -> Result<(), DictError> {
        let st = self.state.as_ref().ok_or(DictError::Closed)?;
        let image = build_image(st, st.header.version);
        let bytes = codec::encode(st.header.version, &image)?;
        write_atomic(&self.path, &bytes)?;
        debug!(bytes = bytes.len(), "flushed dictionary");
        Ok(())
    }

    /// Compact (reclaiming tombstones and enforcing capacity limits), then
    /// persist.
    pub fn flush_with_gc(&mut self) -> Result<(), DictError> {
        {
            let st = self.state.as_mut().ok_or(DictError::Closed)?;
            gc::compact(st);
        }
        self.flush()
    }

    /// Rewrite the dictionary at `target` version, preserving every entry
    /// the target encoding can hold. Two-word contexts are dropped when the
    /// target lacks trigram support. On error the previous in-memory and
    /// on-disk state are left intact.
    pub fn migrate_to(&mut self, target: FormatVersion) -> Result<(), DictError> {
        let st = self.state.as_ref().ok_or(DictError::Closed)?;
        let from = st.header.version;
        let image = build_image(st, target);
        let bytes = codec::encode(target, &image)?;
        let mut header = st.header.clone();
        header.version = target;
        let new_state = DictState::from_image(header, &image);
        write_atomic(&self.path, &bytes)?;
        self.state = Some(new_state);
        debug!(from = from.tag(), to = target.tag(), "migrated dictionary");
        Ok(())
    }

    /// Release all resources. Every subsequent operation reports invalid.
    pub fn close(&mut self) {
        self.state = None;
    }
}

fn resolve_context(
    trie: &TrieStore,
    context: &NgramContext,
) -> Option<(CtxHead, Option<TermId>)> {
    if context.is_beginning_of_sentence() {
        return Some((CtxHead::BeginningOfSentence, None));
    }
    match context.words_oldest_first() {
        [recent] => Some((CtxHead::Word(trie.find_term(recent)?), None)),
        [older, recent] => Some((
            CtxHead::Word(trie.find_term(recent)?),
            Some(trie.find_term(older)?),
        )),
        _ => None,
    }
}

fn resolve_ngram(
    st: &DictState,
    context: &NgramContext,
    target: &str,
) -> Option<(CtxHead, AssocKey)> {
    let (head, older) = resolve_context(&st.trie, context)?;
    let target = st.trie.find_term(target)?;
    Some((head, AssocKey { older, target }))
}

fn build_word_property(st: &DictState, tid: TermId) -> WordProperty {
    let t = st.trie.term(tid);
    let word = t.word.clone();
    let ngrams = collect_ngrams(st, CtxHead::Word(tid), |older| match older {
        Some(older_tid) => {
            NgramContext::of_prev_words(word.as_str(), st.trie.term(older_tid).word.as_str())
        }
        None => NgramContext::of_prev_word(word.as_str()),
    });
    WordProperty {
        probability: t.entry.probability as i32,
        timestamp: t.entry.timestamp(),
        flags: t.flags,
        shortcuts: t
            .shortcuts
            .iter()
            .map(|s| WeightedString {
                word: s.target.clone(),
                probability: s.probability as i32,
            })
            .collect(),
        ngrams,
        valid: true,
        word,
    }
}

fn collect_ngrams(
    st: &DictState,
    head: CtxHead,
    make_context: impl Fn(Option<TermId>) -> NgramContext,
) -> Vec<NgramProperty> {
    st.ngrams
        .entries_for_head(head)
        .map(|(key, entry)| NgramProperty {
            context: make_context(key.older),
            target: st.trie.term(key.target).word.clone(),
            probability: entry.probability as i32,
        })
        .collect()
}

fn build_image(st: &DictState, target: FormatVersion) -> codec::DictImage {
    let unigrams = st
        .trie
        .live_terms_in_traversal_order()
        .into_iter()
        .map(|tid| {
            let t = st.trie.term(tid);
            codec::UnigramRecord {
                word: t.word.clone(),
                probability: t.entry.probability,
                historical: t.entry.historical,
                is_beginning_of_sentence: t.flags.is_beginning_of_sentence,
                is_not_a_word: t.flags.is_not_a_word,
                is_possibly_offensive: t.flags.is_possibly_offensive,
                shortcuts: t
                    .shortcuts
                    .iter()
                    .map(|s| codec::ShortcutRecord {
                        target: s.target.clone(),
                        probability: s.probability,
                    })
                    .collect(),
            }
        })
        .collect();

    let mut ngrams: Vec<codec::NgramRecord> = st
        .ngrams
        .iter()
        .filter(|(_, key, _)| key.older.is_none() || target.supports_trigrams())
        .map(|(head, key, entry)| {
            let mut context_words = Vec::new();
            if let Some(older) = key.older {
                context_words.push(st.trie.term(older).word.clone());
            }
            if let CtxHead::Word(recent) = head {
                context_words.push(st.trie.term(recent).word.clone());
            }
            codec::NgramRecord {
                is_beginning_of_sentence: matches!(head, CtxHead::BeginningOfSentence),
                context_words,
                target: st.trie.term(key.target).word.clone(),
                probability: entry.probability,
                historical: entry.historical,
            }
        })
        .collect();
    // Stable file bytes regardless of hash-map iteration order.
    ngrams.sort_by(|a, b| {
        (&a.context_words, &a.target, a.is_beginning_of_sentence).cmp(&(
            &b.context_words,
            &b.target,
            b.is_beginning_of_sentence,
        ))
    });

    codec::DictImage {
        locale: st.header.locale.clone(),
        attributes: st
            .header
            .attributes()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        unigrams,
        ngrams,
    }
}

/// Write to `path.tmp` then rename, so a crash mid-write never clobbers the
/// previous image.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
