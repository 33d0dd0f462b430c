//! refview: write-through views over list and hash-map storage, yielding
//! in-place element references during iteration instead of copies.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let application code mutate container elements through references
//!   into the container's own storage, with every aliasing hazard of that
//!   idea either prevented by the borrow checker or detected at the access.
//! - Layers:
//!   - SlotHashMap<K, V, S>: hash map whose slot table is explicit API:
//!     position-stable slots, a visible tombstone scheme, a free list, a
//!     "find slot index for key" operation, and a generation counter that
//!     revisions the structure.
//!   - ListView<T>: snapshot window over a `Vec<T>` (base pointer, capacity,
//!     length captured at construction); indexed access and a restartable
//!     cursor yield `&mut T` bounded by the captured length, refusing stale
//!     storage instead of touching it.
//!   - MapView<K, V, S> / MapCursor: keyed write-through access (the one
//!     library error, `KeyNotFound`) and slot-order iteration skipping
//!     tombstones, with an explicit NotStarted/Active/Exhausted/Invalidated
//!     cursor state machine.
//!   - EntryMut<'a, K, V>: the reference-pair primitive (shared key ref,
//!     mutable value ref), alive for exactly one cursor step.
//!
//! Constraints
//! - Single-threaded: views and cursors are `!Send`/`!Sync` (marker types or
//!   captured raw pointers); the containers themselves carry no locks.
//! - Views own nothing and hold no borrows: they are index/snapshot handles,
//!   so the source container stays free to mutate between view operations.
//! - Every access re-validates against the live container: snapshot identity
//!   for the list, generation match for the map.
//!
//! Why this split?
//! - The cursors are *lending*: each step reborrows the container, so a
//!   yielded reference provably dies before the next step and the transient
//!   pair rule is a compile-time fact, not a comment.
//! - Structural mutation mid-pass is detected (generation mismatch parks the
//!   cursor in an invalidated state) rather than undefined; a restarted pass
//!   reads the current layout and therefore observes external insertions.
//!
//! Ordering
//! - List iteration is storage order. Map iteration is slot order, which is
//!   not guaranteed stable across structural changes.
//!
//! Notes and non-goals
//! - Not a general-purpose container library; `SlotHashMap` exists to make
//!   the slot table a supported surface.
//! - No thread safety, persistence, or I/O. The demo program's console
//!   output is the only observable interface.
//! - Keys are read-only everywhere; only values are handed out mutably.

pub mod list_view;
pub mod map_view;
pub mod slot_map;
mod view_proptest;

pub use list_view::{ListCursor, ListView};
pub use map_view::{EntryMut, KeyNotFound, MapCursor, MapView};
pub use slot_map::{SlotHashMap, SlotIndex};

use core::hash::{BuildHasher, Hash};

/// Construction entry point for by-reference access: `container.view()`.
pub trait Viewable {
    type View;

    fn view(&self) -> Self::View;
}

impl<T> Viewable for Vec<T> {
    type View = ListView<T>;

    fn view(&self) -> ListView<T> {
        ListView::new(self)
    }
}

impl<K, V, S> Viewable for SlotHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    type View = MapView<K, V, S>;

    fn view(&self) -> MapView<K, V, S> {
        MapView::new(self)
    }
}
