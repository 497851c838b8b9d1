//! HashTable: chained open hash table over a flat slot array, with free-list
//! slot reuse and power-of-two enlarge/shrink.
//!
//! Hashes are supplied by the caller and cached per record; the table never
//! hashes payloads itself. Value equality is a pluggable [`ValueEq`] that is
//! told whether it runs for an ordinary lookup or for a resize-time
//! relocation.

use core::mem;
use std::collections::TryReserveError;

/// Index that points to nothing.
pub const NO_RECORD: u32 = u32::MAX;

/// Never shrink below this many buckets.
pub const MIN_SIZE: u32 = 8;

/// Enlarge (double) once the table is at least this percent full.
pub const ENLARGE_PERCENTAGE: u32 = 75;

/// Shrinking is only enabled after the table was at least this percent full.
pub const FIRST_SHRINK_PERCENTAGE: u32 = 50;

/// Shrink (halve) once the table is less than this percent full.
pub const SHRINK_PERCENTAGE: u32 = 25;

const HUNDRED_PERCENTAGE: u64 = 100;

// Largest power of two below NO_RECORD.
const MAX_SIZE: u32 = 1 << 31;

/// Call site of a [`ValueEq`] comparison.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EqMode {
    /// Comparing a caller-supplied probe against a stored record.
    Lookup,
    /// Comparing a record being relocated by a resize against a record
    /// already placed in its new bucket.
    Resize,
}

/// Value equality used by [`HashTable`].
///
/// `Q` is the probe type; it defaults to the payload itself but may be a
/// borrowed form (a `str` for string payloads). Implementations must describe
/// the same equivalence in both [`EqMode`]s for payloads that do not change
/// after insertion.
pub trait ValueEq<T, Q: ?Sized = T> {
    fn equal(&self, probe: &Q, stored: &T, mode: EqMode) -> bool;
}

/// When the table is allowed to change its size.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ResizePolicy {
    Disabled,
    #[default]
    Grow,
    GrowAndShrink,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("out of memory while allocating hash table storage")]
    OutOfMemory,
    #[error("hash table size does not fit the record index space")]
    CapacityOverflow,
    #[error("hash table is full and resizing is disabled")]
    Full,
    #[error("hash table is corrupted: {0}")]
    Corrupted(&'static str),
}

impl From<TryReserveError> for TableError {
    fn from(_: TryReserveError) -> Self {
        TableError::OutOfMemory
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct Bucket {
    first: u32,
    last: u32,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        first: NO_RECORD,
        last: NO_RECORD,
    };
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { hash: u32, next: u32, value: T },
    Free { next: u32 },
}

impl<T> Slot<T> {
    fn next(&self) -> u32 {
        match self {
            Slot::Occupied { next, .. } | Slot::Free { next } => *next,
        }
    }

    fn set_next(&mut self, n: u32) {
        match self {
            Slot::Occupied { next, .. } | Slot::Free { next } => *next = n,
        }
    }
}

/// Outcome of a successful insert.
#[derive(Debug)]
pub enum Inserted<'a, T> {
    /// The record was stored.
    New(&'a mut T),
    /// An equal record already exists; storage was not touched and the
    /// caller's record is handed back.
    Existing { stored: &'a mut T, rejected: T },
}

/// Occupancy snapshot returned by [`HashTable::stats`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TableStats {
    pub size: u32,
    pub used: u32,
    pub occupied_buckets: u32,
    pub longest_chain: u32,
}

pub struct HashTable<T, E> {
    buckets: Vec<Bucket>,
    slots: Vec<Slot<T>>,
    size: u32,
    used: u32,
    first_free: u32,
    eq: E,
    policy: ResizePolicy,
    shrink_armed: bool,
}

// Placement computed before any record moves, so an abandoned resize leaves
// the table untouched.
struct ResizePlan<T> {
    size: u32,
    buckets: Vec<Bucket>,
    slots: Vec<Slot<T>>,
    // order[new] = old slot index; next[new] = new chain link.
    order: Vec<u32>,
    next: Vec<u32>,
}

fn table_size(requested: usize) -> Result<u32, TableError> {
    let n = requested
        .max(MIN_SIZE as usize)
        .checked_next_power_of_two()
        .ok_or(TableError::CapacityOverflow)?;
    match u32::try_from(n) {
        Ok(n) if n <= MAX_SIZE => Ok(n),
        _ => Err(TableError::CapacityOverflow),
    }
}

fn alloc_storage<T>(size: u32) -> Result<(Vec<Bucket>, Vec<Slot<T>>), TableError> {
    let mut buckets = Vec::new();
    buckets.try_reserve_exact(size as usize)?;
    buckets.resize(size as usize, Bucket::EMPTY);
    let mut slots = Vec::new();
    slots.try_reserve_exact(size as usize)?;
    Ok((buckets, slots))
}

// Append free slots `from..to`, chained in ascending order.
fn push_free_run<T>(slots: &mut Vec<Slot<T>>, from: u32, to: u32) {
    for i in from..to {
        let next = if i + 1 < to { i + 1 } else { NO_RECORD };
        slots.push(Slot::Free { next });
    }
}

/// Iterator over live payloads in `HashTable`, in slot order.
pub struct Iter<'a, T> {
    it: core::slice::Iter<'a, Slot<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.find_map(|s| match s {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        })
    }
}

impl<T, E> HashTable<T, E> {
    /// Create an empty table. `initial_size` is rounded up to a power of two
    /// and never below [`MIN_SIZE`].
    pub fn new(initial_size: usize, eq: E, policy: ResizePolicy) -> Result<Self, TableError> {
        let size = table_size(initial_size)?;
        let (buckets, mut slots) = alloc_storage(size)?;
        push_free_run(&mut slots, 0, size);
        Ok(Self {
            buckets,
            slots,
            size,
            used: 0,
            first_free: 0,
            eq,
            policy,
            shrink_armed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.used as usize
    }
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Current number of buckets (and slots).
    pub fn capacity(&self) -> usize {
        self.size as usize
    }

    pub fn policy(&self) -> ResizePolicy {
        self.policy
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            it: self.slots.iter(),
        }
    }

    /// Remove every live record and hand them back. The table keeps its
    /// current size.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.used as usize);
        let size = self.size;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let i = i as u32;
            let next = if i + 1 < size { i + 1 } else { NO_RECORD };
            if let Slot::Occupied { value, .. } = mem::replace(slot, Slot::Free { next }) {
                out.push(value);
            }
        }
        self.buckets.fill(Bucket::EMPTY);
        self.used = 0;
        self.first_free = 0;
        out
    }

    pub fn stats(&self) -> TableStats {
        let mut occupied_buckets = 0;
        let mut longest_chain = 0;
        for bucket in &self.buckets {
            if bucket.first == NO_RECORD {
                continue;
            }
            occupied_buckets += 1;
            let mut len = 0;
            let mut idx = bucket.first;
            // Bounded by size so a corrupt cycle cannot hang diagnostics.
            while idx != NO_RECORD && len <= self.size {
                len += 1;
                idx = self.slots.get(idx as usize).map_or(NO_RECORD, Slot::next);
            }
            longest_chain = longest_chain.max(len);
        }
        TableStats {
            size: self.size,
            used: self.used,
            occupied_buckets,
            longest_chain,
        }
    }

    /// Walk every chain and the free list and check the structural
    /// invariants: power-of-two size, correct bucket placement, matching
    /// tails, `used` accounting, and that chains and the free list partition
    /// all slots.
    pub fn validate(&self) -> Result<(), TableError> {
        if !self.size.is_power_of_two() || self.size < MIN_SIZE {
            return Err(TableError::Corrupted("size is not a power of two above the floor"));
        }
        if self.buckets.len() != self.size as usize || self.slots.len() != self.size as usize {
            return Err(TableError::Corrupted("storage length does not match size"));
        }
        let mask = self.size - 1;
        let mut seen = vec![false; self.size as usize];
        let mut live = 0u32;
        for (b_idx, bucket) in self.buckets.iter().enumerate() {
            let mut prev = NO_RECORD;
            let mut idx = bucket.first;
            while idx != NO_RECORD {
                let Some(Slot::Occupied { hash, next, .. }) = self.slots.get(idx as usize) else {
                    return Err(TableError::Corrupted("bucket chain reaches a free or missing slot"));
                };
                if mem::replace(&mut seen[idx as usize], true) {
                    return Err(TableError::Corrupted("slot linked more than once"));
                }
                if (hash & mask) as usize != b_idx {
                    return Err(TableError::Corrupted("record placed in the wrong bucket"));
                }
                live += 1;
                prev = idx;
                idx = *next;
            }
            if bucket.last != prev {
                return Err(TableError::Corrupted("bucket tail does not match chain end"));
            }
        }
        if live != self.used {
            return Err(TableError::Corrupted("used count does not match live records"));
        }
        let mut free = 0u32;
        let mut idx = self.first_free;
        while idx != NO_RECORD {
            let Some(Slot::Free { next }) = self.slots.get(idx as usize) else {
                return Err(TableError::Corrupted("free list reaches an occupied or missing slot"));
            };
            if mem::replace(&mut seen[idx as usize], true) {
                return Err(TableError::Corrupted("slot linked more than once"));
            }
            free += 1;
            idx = *next;
        }
        if live + free != self.size {
            return Err(TableError::Corrupted("slots are not partitioned between chains and free list"));
        }
        Ok(())
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        (hash & (self.size - 1)) as usize
    }

    fn value_at_mut(&mut self, idx: u32) -> Result<&mut T, TableError> {
        match self.slots.get_mut(idx as usize) {
            Some(Slot::Occupied { value, .. }) => Ok(value),
            _ => Err(TableError::Corrupted("record index does not name a live slot")),
        }
    }

    fn load_at_least(&self, percentage: u32) -> bool {
        self.used as u64 * HUNDRED_PERCENTAGE >= self.size as u64 * percentage as u64
    }

    fn wants_grow(&self) -> bool {
        self.policy != ResizePolicy::Disabled
            && self.size < MAX_SIZE
            && self.load_at_least(ENLARGE_PERCENTAGE)
    }

    fn wants_shrink(&self) -> bool {
        self.policy == ResizePolicy::GrowAndShrink
            && self.shrink_armed
            && self.size > MIN_SIZE
            && !self.load_at_least(SHRINK_PERCENTAGE)
    }

    /// Find the record equal to `probe` in the chain of `hash`. Returns
    /// `(predecessor, index)`; the predecessor is [`NO_RECORD`] for the chain
    /// head.
    fn locate<Q>(&self, probe: &Q, hash: u32) -> Result<Option<(u32, u32)>, TableError>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
    {
        let mut prev = NO_RECORD;
        let mut idx = self.buckets[self.bucket_of(hash)].first;
        while idx != NO_RECORD {
            let Some(Slot::Occupied {
                hash: stored_hash,
                next,
                value,
            }) = self.slots.get(idx as usize)
            else {
                return Err(TableError::Corrupted("bucket chain reaches a free or missing slot"));
            };
            if *stored_hash == hash && self.eq.equal(probe, value, EqMode::Lookup) {
                return Ok(Some((prev, idx)));
            }
            prev = idx;
            idx = *next;
        }
        Ok(None)
    }

    pub fn find<Q>(&self, probe: &Q, hash: u32) -> Option<&T>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
    {
        let (_, idx) = self.locate(probe, hash).ok()??;
        match self.slots.get(idx as usize) {
            Some(Slot::Occupied { value, .. }) => Some(value),
            _ => None,
        }
    }

    pub fn find_mut<Q>(&mut self, probe: &Q, hash: u32) -> Option<&mut T>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
    {
        let (_, idx) = self.locate(probe, hash).ok()??;
        self.value_at_mut(idx).ok()
    }
}

impl<T, E> HashTable<T, E>
where
    E: ValueEq<T>,
{
    /// Insert `value` under `hash`, using the table's own comparator for any
    /// resize this insert triggers.
    pub fn insert(&mut self, value: T, hash: u32) -> Result<Inserted<'_, T>, TableError> {
        self.insert_impl(value, hash, None::<&E>)
    }

    /// Insert `value` under `hash`; `resize_eq` governs placement if the
    /// insert triggers an enlarge.
    pub fn insert_with_resize_cb<R>(
        &mut self,
        value: T,
        hash: u32,
        resize_eq: &R,
    ) -> Result<Inserted<'_, T>, TableError>
    where
        R: ValueEq<T>,
    {
        self.insert_impl(value, hash, Some(resize_eq))
    }

    /// Remove the record equal to `probe`. `Ok(None)` means not found.
    pub fn remove<Q>(&mut self, probe: &Q, hash: u32) -> Result<Option<T>, TableError>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
    {
        self.remove_impl(probe, hash, None::<&E>)
    }

    pub fn remove_with_resize_cb<Q, R>(
        &mut self,
        probe: &Q,
        hash: u32,
        resize_eq: &R,
    ) -> Result<Option<T>, TableError>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
        R: ValueEq<T>,
    {
        self.remove_impl(probe, hash, Some(resize_eq))
    }

    fn insert_impl<R>(
        &mut self,
        value: T,
        hash: u32,
        resize_eq: Option<&R>,
    ) -> Result<Inserted<'_, T>, TableError>
    where
        R: ValueEq<T>,
    {
        if let Some((_, idx)) = self.locate(&value, hash)? {
            let stored = self.value_at_mut(idx)?;
            return Ok(Inserted::Existing {
                stored,
                rejected: value,
            });
        }

        if self.first_free == NO_RECORD {
            // Only reachable with growth disabled or after a failed enlarge.
            if self.policy == ResizePolicy::Disabled || self.size >= MAX_SIZE {
                return Err(TableError::Full);
            }
            self.resize(self.size * 2, resize_eq, NO_RECORD)?;
        }

        let idx = self.first_free;
        let Some(Slot::Free { next: free_next }) = self.slots.get(idx as usize) else {
            return Err(TableError::Corrupted("free list reaches an occupied or missing slot"));
        };
        self.first_free = *free_next;
        self.slots[idx as usize] = Slot::Occupied {
            hash,
            next: NO_RECORD,
            value,
        };

        let bucket = self.bucket_of(hash);
        let last = self.buckets[bucket].last;
        if last == NO_RECORD {
            self.buckets[bucket].first = idx;
        } else {
            self.slots[last as usize].set_next(idx);
        }
        self.buckets[bucket].last = idx;
        self.used += 1;

        if self.load_at_least(FIRST_SHRINK_PERCENTAGE) {
            self.shrink_armed = true;
        }

        // The insert is complete; a failed enlarge only costs load factor.
        let mut idx = idx;
        if self.wants_grow() {
            match self.resize(self.size * 2, resize_eq, idx) {
                Ok(moved) => idx = moved,
                Err(e) => log::warn!("hash table enlarge to {} abandoned: {e}", self.size * 2),
            }
        }
        Ok(Inserted::New(self.value_at_mut(idx)?))
    }

    fn remove_impl<Q, R>(
        &mut self,
        probe: &Q,
        hash: u32,
        resize_eq: Option<&R>,
    ) -> Result<Option<T>, TableError>
    where
        Q: ?Sized,
        E: ValueEq<T, Q>,
        R: ValueEq<T>,
    {
        let Some((prev, idx)) = self.locate(probe, hash)? else {
            return Ok(None);
        };

        let bucket = self.bucket_of(hash);
        let next = self.slots[idx as usize].next();
        if prev == NO_RECORD {
            self.buckets[bucket].first = next;
        } else {
            self.slots[prev as usize].set_next(next);
        }
        if self.buckets[bucket].last == idx {
            self.buckets[bucket].last = prev;
        }

        let slot = mem::replace(
            &mut self.slots[idx as usize],
            Slot::Free {
                next: self.first_free,
            },
        );
        self.first_free = idx;
        self.used -= 1;
        let Slot::Occupied { value, .. } = slot else {
            return Err(TableError::Corrupted("located record is not live"));
        };

        if self.wants_shrink() {
            let target = (self.size / 2).max(MIN_SIZE);
            if let Err(e) = self.resize(target, resize_eq, NO_RECORD) {
                log::warn!("hash table shrink to {target} abandoned: {e}");
            }
        }
        Ok(Some(value))
    }

    /// Rehash into `new_size` buckets. Returns the new index of the record
    /// at `track` (or [`NO_RECORD`]). On error nothing has changed.
    fn resize<R>(&mut self, new_size: u32, resize_eq: Option<&R>, track: u32) -> Result<u32, TableError>
    where
        R: ValueEq<T>,
    {
        let plan = match resize_eq {
            Some(cb) => self.plan_resize(new_size, cb)?,
            None => self.plan_resize(new_size, &self.eq)?,
        };
        log::trace!("resizing hash table from {} to {} buckets", self.size, new_size);
        Ok(self.apply_resize(plan, track))
    }

    fn plan_resize<R>(&self, new_size: u32, resize_eq: &R) -> Result<ResizePlan<T>, TableError>
    where
        R: ValueEq<T>,
    {
        if new_size < self.used || !new_size.is_power_of_two() {
            return Err(TableError::CapacityOverflow);
        }
        let (mut buckets, slots) = alloc_storage::<T>(new_size)?;
        let mut order: Vec<u32> = Vec::new();
        order.try_reserve_exact(self.used as usize)?;
        let mut next: Vec<u32> = Vec::new();
        next.try_reserve_exact(self.used as usize)?;

        let mask = new_size - 1;
        for bucket in &self.buckets {
            let mut old = bucket.first;
            while old != NO_RECORD {
                let Some(Slot::Occupied {
                    hash,
                    next: old_next,
                    value,
                }) = self.slots.get(old as usize)
                else {
                    return Err(TableError::Corrupted("bucket chain reaches a free or missing slot"));
                };
                if order.len() as u32 == self.used {
                    return Err(TableError::Corrupted("more live records than used count"));
                }

                let target = &mut buckets[(hash & mask) as usize];
                let mut cur = target.first;
                while cur != NO_RECORD {
                    if let Slot::Occupied {
                        hash: placed_hash,
                        value: placed,
                        ..
                    } = &self.slots[order[cur as usize] as usize]
                    {
                        if placed_hash == hash && resize_eq.equal(value, placed, EqMode::Resize) {
                            return Err(TableError::Corrupted("duplicate record found while rehashing"));
                        }
                    }
                    cur = next[cur as usize];
                }

                let new_idx = order.len() as u32;
                if target.last == NO_RECORD {
                    target.first = new_idx;
                } else {
                    next[target.last as usize] = new_idx;
                }
                target.last = new_idx;
                order.push(old);
                next.push(NO_RECORD);
                old = *old_next;
            }
        }
        if order.len() as u32 != self.used {
            return Err(TableError::Corrupted("fewer live records than used count"));
        }
        Ok(ResizePlan {
            size: new_size,
            buckets,
            slots,
            order,
            next,
        })
    }

    fn apply_resize(&mut self, plan: ResizePlan<T>, track: u32) -> u32 {
        let ResizePlan {
            size,
            buckets,
            mut slots,
            order,
            next,
        } = plan;
        let mut tracked = NO_RECORD;
        for (new_idx, (&old, &link)) in order.iter().zip(&next).enumerate() {
            let taken = mem::replace(&mut self.slots[old as usize], Slot::Free { next: NO_RECORD });
            if let Slot::Occupied { hash, value, .. } = taken {
                slots.push(Slot::Occupied {
                    hash,
                    next: link,
                    value,
                });
            }
            if old == track {
                tracked = new_idx as u32;
            }
        }
        let used = slots.len() as u32;
        push_free_run(&mut slots, used, size);
        self.first_free = if used < size { used } else { NO_RECORD };
        self.buckets = buckets;
        self.slots = slots;
        self.size = size;
        tracked
    }
}
