//! Arena trie over code-point sequences: the unigram word store.
//!
//! Nodes live in a `Vec` and refer to each other by index, so structural
//! edits (edge split, terminal promotion, child insertion) are index
//! reassignment rather than pointer surgery. Terminal records live in a
//! second arena; eviction tombstones them in place and compaction rebuilds
//! both arenas (`dict::gc`).

pub(crate) mod cursor;

use std::collections::HashMap;

use crate::probability::{ProbabilityEntry, NOT_A_PROBABILITY};
use crate::unicode;

pub(crate) type NodeId = usize;
pub(crate) type TermId = usize;

const ROOT: NodeId = 0;

/// Per-word flags stored alongside the probability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordFlags {
    pub is_beginning_of_sentence: bool,
    pub is_not_a_word: bool,
    pub is_possibly_offensive: bool,
}

/// Alternate-spelling target attached to a stored word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutTarget {
    pub target: String,
    pub probability: u8,
}

#[derive(Debug, Clone)]
pub(crate) struct TerminalEntry {
    pub(crate) word: String,
    pub(crate) entry: ProbabilityEntry,
    pub(crate) flags: WordFlags,
    pub(crate) shortcuts: Vec<ShortcutTarget>,
    /// Tombstone left by eviction; reclaimed on compaction.
    pub(crate) deleted: bool,
}

#[derive(Debug)]
struct TrieNode {
    /// Compressed edge label leading into this node. Empty only at the root.
    label: Vec<char>,
    /// Sorted by the first code point of each child's label.
    children: Vec<NodeId>,
    term: Option<TermId>,
}

impl TrieNode {
    fn new(label: Vec<char>) -> Self {
        Self {
            label,
            children: Vec::new(),
            term: None,
        }
    }
}

pub struct TrieStore {
    nodes: Vec<TrieNode>,
    terminals: Vec<TerminalEntry>,
    dead_terminals: usize,
    /// Folded key → live terminal ids, for the exact-match query.
    exact: HashMap<String, Vec<TermId>>,
}

impl Default for TrieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieStore {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new(Vec::new())],
            terminals: Vec::new(),
            dead_terminals: 0,
            exact: HashMap::new(),
        }
    }

    /// Add a word or update it in place.
    ///
    /// Returns `false` (leaving the store untouched) when `word` exceeds
    /// [`unicode::MAX_WORD_LENGTH`]. A too-long shortcut target is dropped
    /// while the unigram update still applies. Re-adding an existing word
    /// overwrites probability and flags and upserts the shortcut by target
    /// identity.
    pub fn add_or_update(
        &mut self,
        word: &str,
        probability: u8,
        shortcut: Option<ShortcutTarget>,
        flags: WordFlags,
        timestamp: Option<u64>,
    ) -> bool {
        if !unicode::is_valid_word(word) {
            return false;
        }
        let shortcut = shortcut.filter(|s| unicode::is_valid_word(&s.target));

        let cps: Vec<char> = word.chars().collect();
        let node = self.ensure_node(&cps);
        match self.nodes[node].term {
            Some(tid) if !self.terminals[tid].deleted => {
                let t = &mut self.terminals[tid];
                t.entry.update(probability, timestamp);
                t.flags = flags;
                if let Some(s) = shortcut {
                    upsert_shortcut(&mut t.shortcuts, s);
                }
            }
            Some(tid) => {
                // Re-adding an evicted word revives its tombstoned slot.
                let t = &mut self.terminals[tid];
                t.entry = make_entry(probability, timestamp);
                t.flags = flags;
                t.shortcuts = shortcut.into_iter().collect();
                t.deleted = false;
                self.dead_terminals -= 1;
                self.exact
                    .entry(unicode::fold_for_exact_match(word))
                    .or_default()
                    .push(tid);
            }
            None => {
                let tid = self.terminals.len();
                self.terminals.push(TerminalEntry {
                    word: word.to_string(),
                    entry: make_entry(probability, timestamp),
                    flags,
                    shortcuts: shortcut.into_iter().collect(),
                    deleted: false,
                });
                self.nodes[node].term = Some(tid);
                self.exact
                    .entry(unicode::fold_for_exact_match(word))
                    .or_default()
                    .push(tid);
            }
        }
        true
    }

    /// Insert a whole terminal record, replacing any existing one for the
    /// same word. Used when rebuilding from a file image or a compaction
    /// pass. Returns `None` for words that cannot be stored.
    pub(crate) fn insert_entry(
        &mut self,
        word: &str,
        entry: ProbabilityEntry,
        flags: WordFlags,
        shortcuts: Vec<ShortcutTarget>,
    ) -> Option<TermId> {
        if !unicode::is_valid_word(word) {
            return None;
        }
        let cps: Vec<char> = word.chars().collect();
        let node = self.ensure_node(&cps);
        let tid = match self.nodes[node].term {
            Some(tid) => {
                if self.terminals[tid].deleted {
                    self.dead_terminals -= 1;
                    self.exact
                        .entry(unicode::fold_for_exact_match(word))
                        .or_default()
                        .push(tid);
                }
                tid
            }
            None => {
                let tid = self.terminals.len();
                self.terminals.push(TerminalEntry {
                    word: word.to_string(),
                    entry,
                    flags,
                    shortcuts,
                    deleted: false,
                });
                self.nodes[node].term = Some(tid);
                self.exact
                    .entry(unicode::fold_for_exact_match(word))
                    .or_default()
                    .push(tid);
                return Some(tid);
            }
        };
        let t = &mut self.terminals[tid];
        t.entry = entry;
        t.flags = flags;
        t.shortcuts = shortcuts;
        t.deleted = false;
        Some(tid)
    }

    pub fn frequency(&self, word: &str) -> i32 {
        match self.find_term(word) {
            Some(tid) => self.terminals[tid].entry.probability as i32,
            None => NOT_A_PROBABILITY,
        }
    }

    /// Maximum probability over all live words whose folded key equals the
    /// query's. Spaces are significant; `'` and `-` and case are not.
    pub fn max_frequency_of_exact_matches(&self, word: &str) -> i32 {
        let folded = unicode::fold_for_exact_match(word);
        self.exact
            .get(&folded)
            .into_iter()
            .flatten()
            .filter(|&&tid| !self.terminals[tid].deleted)
            .map(|&tid| self.terminals[tid].entry.probability as i32)
            .max()
            .unwrap_or(NOT_A_PROBABILITY)
    }

    /// Live terminal for `word`, if any.
    pub(crate) fn find_term(&self, word: &str) -> Option<TermId> {
        let cps: Vec<char> = word.chars().collect();
        let node = self.locate_node(&cps)?;
        let tid = self.nodes[node].term?;
        (!self.terminals[tid].deleted).then_some(tid)
    }

    pub(crate) fn term(&self, tid: TermId) -> &TerminalEntry {
        &self.terminals[tid]
    }

    pub(crate) fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    /// Tombstone a terminal. The trie node stays in place until compaction.
    pub(crate) fn remove_term(&mut self, tid: TermId) -> bool {
        if self.terminals[tid].deleted {
            return false;
        }
        let folded = unicode::fold_for_exact_match(&self.terminals[tid].word);
        self.terminals[tid].deleted = true;
        self.dead_terminals += 1;
        if let Some(ids) = self.exact.get_mut(&folded) {
            ids.retain(|&id| id != tid);
            if ids.is_empty() {
                self.exact.remove(&folded);
            }
        }
        true
    }

    pub(crate) fn live_count(&self) -> usize {
        self.terminals.len() - self.dead_terminals
    }

    pub(crate) fn dead_fraction(&self) -> f64 {
        if self.terminals.is_empty() {
            0.0
        } else {
            self.dead_terminals as f64 / self.terminals.len() as f64
        }
    }

    /// Live terminal ids in pre-order trie traversal (shorter words before
    /// their extensions, children in code-point order).
    pub(crate) fn live_terms_in_traversal_order(&self) -> Vec<TermId> {
        let mut out = Vec::with_capacity(self.live_count());
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if let Some(tid) = node.term {
                if !self.terminals[tid].deleted {
                    out.push(tid);
                }
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Walk the trie without mutating it.
    fn locate_node(&self, word: &[char]) -> Option<NodeId> {
        let mut node = ROOT;
        let mut i = 0;
        while i < word.len() {
            let child = self.child_with_first(node, word[i])?;
            let label = &self.nodes[child].label;
            if word.len() - i < label.len() || word[i..i + label.len()] != label[..] {
                return None;
            }
            i += label.len();
            node = child;
        }
        Some(node)
    }

    /// Walk the trie, creating and splitting nodes as needed, and return the
    /// node whose path spells `word`.
    fn ensure_node(&mut self, word: &[char]) -> NodeId {
        let mut node = ROOT;
        let mut i = 0;
        while i < word.len() {
            match self.child_with_first(node, word[i]) {
                None => {
                    let leaf = self.push_node(word[i..].to_vec());
                    self.link_child(node, leaf);
                    return leaf;
                }
                Some(child) => {
                    let common = common_prefix_len(&self.nodes[child].label, &word[i..]);
                    if common == self.nodes[child].label.len() {
                        node = child;
                        i += common;
                    } else {
                        let branch = self.split_edge(node, child, common);
                        if i + common == word.len() {
                            return branch;
                        }
                        let leaf = self.push_node(word[i + common..].to_vec());
                        self.link_child(branch, leaf);
                        return leaf;
                    }
                }
            }
        }
        node
    }

    /// Split `child`'s edge after `common` code points. The new branch node
    /// takes the shared prefix and adopts `child`, which keeps the
    /// remainder. Descendants and terminal ids are untouched.
    fn split_edge(&mut self, parent: NodeId, child: NodeId, common: usize) -> NodeId {
        let suffix = self.nodes[child].label.split_off(common);
        let prefix = std::mem::replace(&mut self.nodes[child].label, suffix);
        let branch = self.push_node(prefix);
        self.nodes[branch].children.push(child);
        let pos = self.nodes[parent]
            .children
            .iter()
            .position(|&c| c == child)
            .expect("split child is linked to its parent");
        self.nodes[parent].children[pos] = branch;
        branch
    }

    fn push_node(&mut self, label: Vec<char>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TrieNode::new(label));
        id
    }

    fn child_with_first(&self, node: NodeId, c: char) -> Option<NodeId> {
        let children = &self.nodes[node].children;
        children
            .binary_search_by(|&id| self.nodes[id].label[0].cmp(&c))
            .ok()
            .map(|i| children[i])
    }

    fn link_child(&mut self, parent: NodeId, child: NodeId) {
        let c = self.nodes[child].label[0];
        let idx = self.nodes[parent]
            .children
            .binary_search_by(|&id| self.nodes[id].label[0].cmp(&c))
            .unwrap_err();
        self.nodes[parent].children.insert(idx, child);
    }
}

fn make_entry(probability: u8, timestamp: Option<u64>) -> ProbabilityEntry {
    match timestamp {
        Some(ts) => ProbabilityEntry::with_timestamp(probability, ts),
        None => ProbabilityEntry::new(probability),
    }
}

fn upsert_shortcut(shortcuts: &mut Vec<ShortcutTarget>, shortcut: ShortcutTarget) {
    match shortcuts.iter_mut().find(|s| s.target == shortcut.target) {
        Some(existing) => existing.probability = shortcut.probability,
        None => shortcuts.push(shortcut),
    }
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
