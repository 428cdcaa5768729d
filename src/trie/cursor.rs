//! Resumable token cursor over the terminal arena.
//!
//! Tokens encode arena offsets: token 0 starts a scan, and each step returns
//! the offset to resume from, or 0 when no live terminal remains. Callers
//! can drop a cursor at any point and restart later with the token alone.

use super::{TermId, TrieStore};

pub(crate) fn next_live(store: &TrieStore, token: u32) -> Option<(TermId, u32)> {
    let mut i = token as usize;
    while i < store.terminal_count() {
        if !store.term(i).deleted {
            let mut j = i + 1;
            while j < store.terminal_count() && store.term(j).deleted {
                j += 1;
            }
            let next = if j < store.terminal_count() { j as u32 } else { 0 };
            return Some((i, next));
        }
        i += 1;
    }
    None
}
