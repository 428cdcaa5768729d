//! Capacity accounting and the compacting rewrite.
//!
//! Compaction rebuilds the node and terminal arenas in traversal order,
//! reclaiming tombstones left by eviction, then remaps the n-gram index
//! onto the fresh terminal ids. When live counts exceed the header's
//! configured maximums it first evicts lowest-probability entries
//! (probability ascending, then terminal-id order) until back under budget.

use std::collections::HashMap;

use tracing::{debug, debug_span};

use super::DictState;
use crate::ngram::{AssocKey, CtxHead};
use crate::trie::{TermId, TrieStore};

pub(super) fn compact(st: &mut DictState) {
    let _span = debug_span!("compact").entered();
    let evicted_unigrams = evict_unigrams(st);
    let evicted_bigrams = evict_bigrams(st);
    rebuild(st);
    st.mutations_since_gc = 0;
    st.gc_has_run = true;
    debug!(
        evicted_unigrams,
        evicted_bigrams,
        live_unigrams = st.trie.live_count(),
        live_bigrams = st.ngrams.bigram_count(),
        live_trigrams = st.ngrams.trigram_count(),
        "compacted dictionary"
    );
}

fn evict_unigrams(st: &mut DictState) -> usize {
    let max = st.header.max_unigram_count();
    let live = st.trie.live_count();
    if live <= max {
        return 0;
    }
    let mut candidates: Vec<(u8, TermId)> = st
        .trie
        .live_terms_in_traversal_order()
        .into_iter()
        .map(|tid| (st.trie.term(tid).entry.probability, tid))
        .collect();
    candidates.sort_unstable();
    let excess = live - max;
    for &(_, tid) in candidates.iter().take(excess) {
        st.ngrams.drop_word(tid);
        st.trie.remove_term(tid);
    }
    excess
}

fn evict_bigrams(st: &mut DictState) -> usize {
    let max = st.header.max_bigram_count();
    let count = st.ngrams.bigram_count();
    if count <= max {
        return 0;
    }
    let mut candidates: Vec<(u8, CtxHead, AssocKey)> = st
        .ngrams
        .iter()
        .filter(|(_, key, _)| key.older.is_none())
        .map(|(head, key, entry)| (entry.probability, head, key))
        .collect();
    candidates.sort_unstable();
    let excess = count - max;
    for &(_, head, key) in candidates.iter().take(excess) {
        st.ngrams.remove(head, key);
    }
    excess
}

/// Rebuild both arenas in traversal order and remap n-gram endpoints.
/// Referentially transparent for every surviving entry.
fn rebuild(st: &mut DictState) {
    let order = st.trie.live_terms_in_traversal_order();
    let mut fresh = TrieStore::new();
    let mut remap: HashMap<TermId, TermId> = HashMap::with_capacity(order.len());
    for old in order {
        let t = st.trie.term(old);
        if let Some(new) = fresh.insert_entry(&t.word, t.entry, t.flags, t.shortcuts.clone()) {
            remap.insert(old, new);
        }
    }
    st.ngrams.remap(&remap);
    st.trie = fresh;
}
