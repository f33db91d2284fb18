//! Reference memo table of one source document.
//!
//! Maps source references to the destination references allocated for them.
//! Each entry moves through a small state machine:
//!
//! ```text
//!            reserve            mark_copied
//!   (none) ─────────▶ Pending ──────────────▶ Copied
//!                        │
//!                        │ discard
//!                        ▼
//!                    Discarded ──reserve──▶ Pending (same destination)
//! ```
//!
//! `Pending` entries are destination numbers handed out before the copy has
//! started: page placeholders, and the object currently being resolved.
//! `Copied` is set before descending into the object's children so that
//! cycles terminate. `Discarded` marks an object that copied to null; it is
//! never written, and a later copy of the same source object reuses its
//! number.

use crate::object::ObjectRef;
use std::collections::HashMap;

/// Copy state of one source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// Destination allocated, contents not copied (yet)
    Pending,
    /// Copy started or finished; the destination reference is final
    Copied,
    /// Copy produced null; the destination was never written
    Discarded,
}

/// One memo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoEntry {
    /// Reference in the destination document
    pub destination: ObjectRef,
    /// Copy state
    pub state: MemoState,
}

/// Source reference → destination reference for one source document.
#[derive(Debug, Default, Clone)]
pub struct MemoTable {
    entries: HashMap<ObjectRef, MemoEntry>,
}

impl MemoTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for a source reference.
    pub fn get(&self, source: ObjectRef) -> Option<MemoEntry> {
        self.entries.get(&source).copied()
    }

    /// Destination of a source reference that was not discarded.
    pub fn destination(&self, source: ObjectRef) -> Option<ObjectRef> {
        self.get(source)
            .filter(|e| e.state != MemoState::Discarded)
            .map(|e| e.destination)
    }

    /// Get or allocate the destination for `source`, leaving it `Pending` unless already copied.
    ///
    /// `allocate` runs only when the source has never been seen.
    pub fn reserve(&mut self, source: ObjectRef, allocate: impl FnOnce() -> ObjectRef) -> ObjectRef {
        match self.entries.get_mut(&source) {
            Some(entry) => {
                if entry.state == MemoState::Discarded {
                    entry.state = MemoState::Pending;
                }
                entry.destination
            },
            None => {
                let destination = allocate();
                self.entries.insert(
                    source,
                    MemoEntry {
                        destination,
                        state: MemoState::Pending,
                    },
                );
                destination
            },
        }
    }

    /// Record that the copy of `source` has started.
    pub fn mark_copied(&mut self, source: ObjectRef) {
        if let Some(entry) = self.entries.get_mut(&source) {
            entry.state = MemoState::Copied;
        }
    }

    /// Record that `source` copied to null.
    pub fn discard(&mut self, source: ObjectRef) {
        if let Some(entry) = self.entries.get_mut(&source) {
            entry.state = MemoState::Discarded;
        }
    }

    /// Map `source` to an existing destination object without copying it.
    pub fn insert_copied(&mut self, source: ObjectRef, destination: ObjectRef) {
        self.entries.insert(
            source,
            MemoEntry {
                destination,
                state: MemoState::Copied,
            },
        );
    }

    /// Entries that were allocated but never copied.
    pub fn pending(&self) -> impl Iterator<Item = (ObjectRef, ObjectRef)> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.state == MemoState::Pending)
            .map(|(s, e)| (*s, e.destination))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(id: u32) -> ObjectRef {
        ObjectRef::new(id, 0)
    }

    #[test]
    fn test_reserve_allocates_once() {
        let mut memo = MemoTable::new();
        let mut next = 100;
        let mut alloc = || {
            next += 1;
            r(next)
        };
        let first = memo.reserve(r(5), &mut alloc);
        let second = memo.reserve(r(5), &mut alloc);
        assert_eq!(first, second);
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.get(r(5)).unwrap().state, MemoState::Pending);
    }

    #[test]
    fn test_pending_to_copied() {
        let mut memo = MemoTable::new();
        memo.reserve(r(1), || r(10));
        memo.mark_copied(r(1));
        assert_eq!(memo.get(r(1)).unwrap().state, MemoState::Copied);
        assert_eq!(memo.destination(r(1)), Some(r(10)));
        assert_eq!(memo.pending().count(), 0);
    }

    #[test]
    fn test_discarded_reuses_destination() {
        let mut memo = MemoTable::new();
        memo.reserve(r(1), || r(10));
        memo.mark_copied(r(1));
        memo.discard(r(1));
        assert_eq!(memo.destination(r(1)), None);

        let again = memo.reserve(r(1), || panic!("must not allocate twice"));
        assert_eq!(again, r(10));
        assert_eq!(memo.get(r(1)).unwrap().state, MemoState::Pending);
    }

    #[test]
    fn test_generation_is_part_of_the_key() {
        let mut memo = MemoTable::new();
        memo.reserve(ObjectRef::new(1, 0), || r(10));
        memo.reserve(ObjectRef::new(1, 1), || r(11));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn test_insert_copied() {
        let mut memo = MemoTable::new();
        memo.insert_copied(r(3), r(30));
        assert_eq!(memo.get(r(3)).unwrap().state, MemoState::Copied);
        assert_eq!(memo.reserve(r(3), || r(99)), r(30));
    }
}
