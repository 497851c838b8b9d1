//! rc-dict: a thread-safe string dictionary that stores each distinct string
//! once and hands out shared, reference-counted views of it.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let many unrelated subsystems intern names, namespaces and text
//!   so that equal strings share storage and compare by identity.
//! - Layers:
//!   - HashTable<T, E>: structural layer. Chained buckets over one flat
//!     slot array, free-list slot reuse, power-of-two enlarge/shrink with a
//!     full rehash. Hashes are supplied by the caller and cached per record.
//!   - Dictionary<S>: specializes the payload to `{string, refcount}`, owns
//!     the hasher, and serializes all table access behind one mutex.
//!
//! Constraints
//! - `HashTable` is not synchronized; it is only reachable through the
//!   dictionary's `parking_lot::Mutex`.
//! - Hashing happens before the lock is taken; only table traffic is
//!   serialized.
//! - Every live slot is on exactly one bucket chain, every free slot on the
//!   free list; `HashTable::validate` checks this.
//! - Insert and remove results never depend on whether the follow-up resize
//!   succeeded. A failed resize leaves the table valid at its old size.
//!
//! Reference counting
//! - Holders of an interned string are scattered across the caller's data
//!   structures, so counting is an explicit protocol: each `insert` or
//!   `insert_zero_copy` counts one holder and must be matched by one
//!   `remove` of the same content.
//! - `Dictionary::clean` (and `Drop`) audits the protocol: anything still
//!   present is logged as a leak and released.
//! - Stored strings are `Arc<str>`, so a caller that breaks the protocol can
//!   only leak or double-release logically; it can never read freed memory.
//!
//! Equality modes
//! - `ValueEq` is told whether it compares during a lookup or during a
//!   resize relocation. The dictionary treats both the same; the split is
//!   kept for payloads whose relocation check can be cheaper.
//!
//! Notes and non-goals
//! - No persistence, eviction, weak handles or ordering among entries.
//! - `Interned` is not `Clone`; a second holder inserts again.

mod builder;
mod dictionary;
mod error;
pub mod hash_table;
mod hash_table_proptest;

// Public surface
pub use builder::DictionaryBuilder;
pub use dictionary::{Dictionary, Interned, DICT_INITIAL_SIZE};
pub use error::DictError;
pub use hash_table::{EqMode, HashTable, Inserted, ResizePolicy, TableError, TableStats, ValueEq};
