use crate::dictionary::{DictEq, Dictionary, DICT_INITIAL_SIZE};
use crate::error::DictError;
use crate::hash_table::{HashTable, ResizePolicy, TableError};
use core::hash::BuildHasher;
use hashbrown::hash_map::DefaultHashBuilder;
use parking_lot::Mutex;

/// Builds a [`Dictionary`] with non-default sizing.
///
/// # Examples
///
/// ```rust
/// use rc_dict::{DictionaryBuilder, ResizePolicy};
///
/// let dict = DictionaryBuilder::new()
///     .initial_capacity(64)
///     .resize_policy(ResizePolicy::GrowAndShrink)
///     .build()
///     .unwrap();
///
/// let s = dict.insert("eth0", 0).unwrap();
/// assert_eq!(&*s, "eth0");
/// dict.remove(&s).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct DictionaryBuilder {
    initial_capacity: usize,
    resize_policy: ResizePolicy,
}

impl Default for DictionaryBuilder {
    fn default() -> Self {
        Self {
            initial_capacity: DICT_INITIAL_SIZE,
            resize_policy: ResizePolicy::Grow,
        }
    }
}

impl DictionaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting number of buckets; rounded up to a power of two.
    pub fn initial_capacity(self, capacity: usize) -> Self {
        Self {
            initial_capacity: capacity,
            ..self
        }
    }

    pub fn resize_policy(self, policy: ResizePolicy) -> Self {
        Self {
            resize_policy: policy,
            ..self
        }
    }

    pub fn build(self) -> Result<Dictionary, DictError> {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Build with a caller-chosen content hasher. The hasher must be
    /// deterministic for the lifetime of the dictionary.
    pub fn build_with_hasher<S>(self, hasher: S) -> Result<Dictionary<S>, DictError>
    where
        S: BuildHasher,
    {
        if self.initial_capacity == 0 {
            return Err(DictError::InvalidArgument("initial capacity must be non-zero"));
        }
        let table = match HashTable::new(self.initial_capacity, DictEq, self.resize_policy) {
            Ok(table) => table,
            Err(TableError::CapacityOverflow) => {
                return Err(DictError::InvalidArgument("initial capacity is too large"))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Dictionary::from_parts(hasher, Mutex::new(table)))
    }
}
