//! Dictionary: thread-safe, reference-counted string interning over
//! `HashTable`.
//!
//! Every distinct string is stored once. Each successful insert counts one
//! logical holder and must be balanced by exactly one `remove` of the same
//! content; the record is released when the count reaches zero. Holders are
//! not tracked automatically because they are spread across unrelated
//! owners, so the protocol is manual and `clean` audits it at teardown.

use crate::builder::DictionaryBuilder;
use crate::error::DictError;
use crate::hash_table::{EqMode, HashTable, Inserted, TableStats, ValueEq};
use core::fmt;
use core::hash::{BuildHasher, Hash, Hasher};
use core::ops::Deref;
use hashbrown::hash_map::DefaultHashBuilder;
use parking_lot::Mutex;
use std::sync::Arc;

/// Starting number of buckets for a session dictionary.
pub const DICT_INITIAL_SIZE: usize = 1024;

// Longest string content written to debug/warn logs.
const LOG_PREVIEW_CHARS: usize = 64;

#[derive(Debug)]
pub(crate) struct DictRecord {
    value: Arc<str>,
    refcount: u32,
}

/// Content equality for lookups: records against records, or against a
/// borrowed `str` probe.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct DictEq;

impl ValueEq<DictRecord> for DictEq {
    fn equal(&self, probe: &DictRecord, stored: &DictRecord, _mode: EqMode) -> bool {
        probe.value == stored.value
    }
}

impl ValueEq<DictRecord, str> for DictEq {
    fn equal(&self, probe: &str, stored: &DictRecord, _mode: EqMode) -> bool {
        *stored.value == *probe
    }
}

// Comparator for rehash placement. Interned strings never change, so both
// modes reduce to content equality.
struct DictResizeEq;

impl ValueEq<DictRecord> for DictResizeEq {
    fn equal(&self, probe: &DictRecord, stored: &DictRecord, mode: EqMode) -> bool {
        match mode {
            EqMode::Resize => probe.value == stored.value,
            EqMode::Lookup => <DictEq as ValueEq<DictRecord>>::equal(&DictEq, probe, stored, mode),
        }
    }
}

/// A string stored in a [`Dictionary`].
///
/// Handles are compared and hashed by identity: two handles are equal iff
/// they share the dictionary's storage. Not `Clone`; a second holder obtains
/// its own handle through another insert.
pub struct Interned(Arc<str>);

impl Interned {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address of the shared storage.
    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    pub fn ptr_eq(&self, other: &Interned) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Interned {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Interned {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Interned").field(&&*self.0).finish()
    }
}

impl fmt::Display for Interned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for Interned {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Interned {}

impl Hash for Interned {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.as_ptr() as usize).hash(state);
    }
}

// Log-friendly view of string content, cut at a char boundary.
struct Preview<'a>(&'a str);

impl fmt::Display for Preview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.char_indices().nth(LOG_PREVIEW_CHARS) {
            Some((cut, _)) => write!(f, "{}...", &self.0[..cut]),
            None => f.write_str(self.0),
        }
    }
}

// `len == 0` means "up to the first NUL, or all of it".
fn content(value: &str, len: usize) -> Result<&str, DictError> {
    if len == 0 {
        return Ok(value.find('\0').map_or(value, |end| &value[..end]));
    }
    value.get(..len).ok_or(DictError::InvalidArgument(
        "length exceeds the string or splits a character",
    ))
}

/// Thread-safe string dictionary.
///
/// # Examples
///
/// ```rust
/// use rc_dict::Dictionary;
///
/// let dict = Dictionary::new().unwrap();
/// let a = dict.insert("eth0", 0).unwrap();
/// let b = dict.insert("eth0-and-more", 4).unwrap();
/// assert!(a.ptr_eq(&b));
/// assert_eq!(dict.refcount("eth0"), Some(2));
///
/// dict.remove(&a).unwrap();
/// dict.remove(&b).unwrap();
/// assert!(dict.is_empty());
/// assert_eq!(dict.clean(), 0);
/// ```
pub struct Dictionary<S = DefaultHashBuilder> {
    hasher: S,
    table: Mutex<HashTable<DictRecord, DictEq>>,
}

impl Dictionary {
    /// Create a session dictionary: [`DICT_INITIAL_SIZE`] buckets, grow-only.
    pub fn new() -> Result<Self, DictError> {
        DictionaryBuilder::new().build()
    }

    pub fn builder() -> DictionaryBuilder {
        DictionaryBuilder::new()
    }
}

impl<S> Dictionary<S> {
    pub(crate) fn from_parts(hasher: S, table: Mutex<HashTable<DictRecord, DictEq>>) -> Self {
        Self { hasher, table }
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    pub fn stats(&self) -> TableStats {
        self.table.lock().stats()
    }

    /// Session teardown. Every string still present is reported as a leak
    /// and released. Returns the number of leaked strings.
    pub fn clean(mut self) -> usize {
        // `Drop` still runs afterwards but finds an empty table.
        self.release_all()
    }

    fn release_all(&mut self) -> usize {
        let leaked = self.table.get_mut().drain();
        for record in &leaked {
            log::warn!(
                "string \"{}\" not freed from the dictionary, refcount {}",
                Preview(&record.value),
                record.refcount
            );
        }
        leaked.len()
    }
}

impl<S> Dictionary<S>
where
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Result<Self, DictError> {
        DictionaryBuilder::new().build_with_hasher(hasher)
    }

    fn hash(&self, value: &str) -> u32 {
        let h = self.hasher.hash_one(value.as_bytes());
        (h ^ (h >> 32)) as u32
    }

    /// Intern `len` bytes of `value` (all of it up to any NUL when `len` is
    /// zero). Returns the shared copy and counts one holder.
    pub fn insert(&self, value: &str, len: usize) -> Result<Interned, DictError> {
        let value = content(value, len)?;
        log::debug!("inserting \"{}\"", Preview(value));
        self.insert_shared(Arc::from(value))
    }

    /// Intern a string the caller already allocated. When the content is
    /// new, `value` itself becomes the stored string; when it is a
    /// duplicate, `value` is released and the stored string is returned.
    pub fn insert_zero_copy(&self, value: Arc<str>) -> Result<Interned, DictError> {
        let value = match value.find('\0') {
            Some(end) => Arc::from(&value[..end]),
            None => value,
        };
        log::debug!("inserting \"{}\"", Preview(&value));
        self.insert_shared(value)
    }

    fn insert_shared(&self, value: Arc<str>) -> Result<Interned, DictError> {
        let hash = self.hash(&value);
        let record = DictRecord { value, refcount: 1 };

        let mut table = self.table.lock();
        match table.insert_with_resize_cb(record, hash, &DictResizeEq)? {
            Inserted::New(stored) => Ok(Interned(Arc::clone(&stored.value))),
            Inserted::Existing { stored, rejected } => {
                let Some(refcount) = stored.refcount.checked_add(1) else {
                    log::error!(
                        "refcount overflow for \"{}\" in the dictionary",
                        Preview(&stored.value)
                    );
                    return Err(DictError::Internal);
                };
                stored.refcount = refcount;
                drop(rejected);
                Ok(Interned(Arc::clone(&stored.value)))
            }
        }
    }

    /// Release one holder of `value`. The string is dropped from the
    /// dictionary when its last holder is released.
    pub fn remove(&self, value: &str) -> Result<(), DictError> {
        log::debug!("removing \"{}\"", Preview(value));
        let hash = self.hash(value);

        let mut table = self.table.lock();
        let Some(record) = table.find_mut(value, hash) else {
            log::error!("value \"{}\" was not found in the dictionary", Preview(value));
            return Err(DictError::NotFound);
        };
        if record.refcount == 0 {
            log::error!("live dictionary record \"{}\" has refcount 0", Preview(value));
            return Err(DictError::Internal);
        }
        record.refcount -= 1;
        if record.refcount > 0 {
            return Ok(());
        }

        match table.remove_with_resize_cb(value, hash, &DictResizeEq)? {
            Some(_released) => Ok(()),
            None => {
                log::error!("record \"{}\" vanished from the dictionary", Preview(value));
                Err(DictError::Internal)
            }
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.refcount(value).is_some()
    }

    /// Number of outstanding holders of `value`, if present.
    pub fn refcount(&self, value: &str) -> Option<u32> {
        let hash = self.hash(value);
        self.table.lock().find(value, hash).map(|r| r.refcount)
    }
}

impl<S> Drop for Dictionary<S> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<S> fmt::Debug for Dictionary<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("stats", &self.stats())
            .finish()
    }
}
