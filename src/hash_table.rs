//! Open-addressing hash table over caller-supplied storage.
//!
//! Collisions are resolved with linear probing. Deletion never leaves
//! tombstones: instead the entries that follow the vacated bucket in its
//! cluster are shifted backwards so that every live entry stays reachable
//! from its home bucket without crossing an empty bucket.
//!
//! # Invariants
//! - `status[i] == Filled` iff `keys[i]` and `values[i]` are initialized.
//! - For every filled bucket `i`, probing from `home(keys[i])` reaches `i`
//!   before any empty bucket.
//! - `populated` equals the number of filled buckets.

use core::fmt::Debug;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::error::Error;
use crate::error::Result;
use crate::hasher::KeyHasher;

/// State of a single bucket. The discriminants are the on-wire status byte.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketStatus {
    /// The bucket holds no entry.
    #[default]
    Empty = 0,
    /// The bucket holds a live entry.
    Filled = 1,
    /// Reserved for tombstones. Never produced by this table.
    Deleted = 2,
}

impl BucketStatus {
    #[inline(always)]
    fn is_filled(self) -> bool {
        self == BucketStatus::Filled
    }
}

/// Returns `true` if `x` lies in the circular range `(lo, hi]`.
///
/// `lo` and `hi` are bucket indices and the range runs forward (wrapping
/// past the last bucket) from just after `lo` up to and including `hi`.
#[inline(always)]
fn in_cyclic_range(x: usize, lo: usize, hi: usize) -> bool {
    if lo <= hi {
        lo < x && x <= hi
    } else {
        x > lo || x <= hi
    }
}

/// A fixed-capacity hash table using linear probing and backward-shift
/// deletion.
///
/// The table borrows three parallel buffers from the caller: keys, values
/// and one [`BucketStatus`] per bucket. Its capacity is the length of the
/// key buffer and never changes. Hashing and key equality come from a
/// [`KeyHasher`] supplied at construction.
///
/// Dropping the table drops the live keys and values; the buffers
/// themselves stay with the caller.
///
/// ## Example
///
/// ```rust
/// use fixed_containers::Error;
/// use fixed_containers::StrKeys;
/// use fixed_containers::TableStorage;
///
/// let mut storage = TableStorage::<&str, i32, 128>::new();
/// let mut table = storage.table(StrKeys).unwrap();
///
/// table.insert("john", 0).unwrap();
/// *table.search_ref(&"john").unwrap() += 1;
/// assert_eq!(table.search(&"john"), Ok(&1));
/// assert_eq!(table.search(&"jack"), Err(Error::Underflow));
/// ```
pub struct HashTable<'a, K, V, H> {
    keys: &'a mut [MaybeUninit<K>],
    values: &'a mut [MaybeUninit<V>],
    status: &'a mut [BucketStatus],

    populated: usize,
    hasher: H,
}

/// A hash table that stores keys only.
pub type HashSet<'a, K, H> = HashTable<'a, K, (), H>;

impl<'a, K, V, H> HashTable<'a, K, V, H>
where
    H: KeyHasher<K>,
{
    /// Creates an empty table over the supplied buffers.
    ///
    /// The capacity is `keys.len()`. Every status entry is reset to
    /// [`BucketStatus::Empty`]; previous contents of the key and value
    /// buffers are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::NullPointer`] if `keys` is empty.
    /// - [`Error::BadStructure`] if `values` or `status` is shorter than
    ///   `keys`. Longer buffers are accepted; the excess is unused.
    pub fn new(
        keys: &'a mut [MaybeUninit<K>],
        values: &'a mut [MaybeUninit<V>],
        status: &'a mut [BucketStatus],
        hasher: H,
    ) -> Result<Self> {
        let capacity = keys.len();
        if capacity == 0 {
            warn_event!("hash table created without key storage");
            return Err(Error::NullPointer);
        }
        if values.len() < capacity || status.len() < capacity {
            warn_event!(
                capacity,
                values = values.len(),
                status = status.len(),
                "hash table buffers shorter than key buffer"
            );
            return Err(Error::BadStructure);
        }

        let (values, _) = values.split_at_mut(capacity);
        let (status, _) = status.split_at_mut(capacity);
        status.fill(BucketStatus::Empty);

        Ok(Self {
            keys,
            values,
            status,
            populated: 0,
            hasher,
        })
    }

    /// Returns the bucket at which probing for `key` starts.
    #[inline]
    pub fn home_bucket(&self, key: &K) -> usize {
        (self.hasher.hash_key(key) % self.capacity() as u64) as usize
    }

    #[inline(always)]
    fn next_bucket(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity() { 0 } else { next }
    }

    /// Returns the key stored in bucket `index`.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds and the bucket must be filled.
    #[inline(always)]
    unsafe fn key_at(&self, index: usize) -> &K {
        debug_assert!(self.status[index].is_filled());
        // SAFETY: Caller guarantees the bucket is filled, so the key is
        // initialized.
        unsafe { self.keys.get_unchecked(index).assume_init_ref() }
    }

    /// Probes for `key` and returns the index of its bucket.
    fn find_index(&self, key: &K) -> Option<usize> {
        let start = self.home_bucket(key);
        let mut index = start;
        loop {
            if !self.status[index].is_filled() {
                return None;
            }

            // SAFETY: `index` is in bounds and the bucket is filled.
            if self.hasher.keys_equal(key, unsafe { self.key_at(index) }) {
                return Some(index);
            }

            index = self.next_bucket(index);
            if index == start {
                return None;
            }
        }
    }

    /// Inserts `key` with `value`.
    ///
    /// Probing starts at the key's home bucket and the entry lands in the
    /// first empty bucket found.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKey`] if an equal key is met while probing.
    /// - [`Error::Overflow`] if probing wraps back to the home bucket, which
    ///   means the table is full.
    ///
    /// On error the table is unchanged and `key`/`value` are dropped.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let start = self.home_bucket(&key);
        let mut index = start;
        loop {
            if !self.status[index].is_filled() {
                break;
            }

            // SAFETY: `index` is in bounds and the bucket is filled.
            if self.hasher.keys_equal(&key, unsafe { self.key_at(index) }) {
                trace_event!(bucket = index, "hash table insert found duplicate key");
                return Err(Error::DuplicateKey);
            }

            index = self.next_bucket(index);
            if index == start {
                trace_event!(capacity = self.capacity(), "hash table insert overflow");
                return Err(Error::Overflow);
            }
        }

        self.keys[index].write(key);
        self.values[index].write(value);
        self.status[index] = BucketStatus::Filled;
        self.populated += 1;
        Ok(())
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// # Errors
    ///
    /// [`Error::Underflow`] if the key is absent.
    pub fn search(&self, key: &K) -> Result<&V> {
        let index = self.find_index(key).ok_or(Error::Underflow)?;
        // SAFETY: `find_index` only returns filled buckets.
        Ok(unsafe { self.values.get_unchecked(index).assume_init_ref() })
    }

    /// Returns a mutable reference to the value stored for `key`, for
    /// in-place updates.
    ///
    /// The reference borrows the table, so it cannot outlive the next
    /// structural change.
    ///
    /// # Errors
    ///
    /// [`Error::Underflow`] if the key is absent.
    pub fn search_ref(&mut self, key: &K) -> Result<&mut V> {
        let index = self.find_index(key).ok_or(Error::Underflow)?;
        // SAFETY: `find_index` only returns filled buckets.
        Ok(unsafe { self.values.get_unchecked_mut(index).assume_init_mut() })
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find_index(key).is_some()
    }

    /// Removes `key` and returns the stored key and value.
    ///
    /// The vacated bucket is refilled by shifting later members of its
    /// cluster backwards: each following entry whose home bucket is not in
    /// the circular range `(vacated, entry]` moves into the vacated bucket,
    /// which then becomes the entry's old bucket. The scan stops at the first
    /// empty bucket or after a full lap. This keeps every surviving entry
    /// reachable without tombstones, at the cost of a scan over the rest of
    /// the cluster.
    ///
    /// # Errors
    ///
    /// [`Error::Underflow`] if the key is absent.
    pub fn delete(&mut self, key: &K) -> Result<(K, V)> {
        let Some(found) = self.find_index(key) else {
            trace_event!("hash table delete of absent key");
            return Err(Error::Underflow);
        };

        // SAFETY: `found` is a filled bucket. Marking it empty straight
        // after the reads hands ownership of the entry to the caller.
        let removed = unsafe {
            (
                self.keys[found].assume_init_read(),
                self.values[found].assume_init_read(),
            )
        };
        self.status[found] = BucketStatus::Empty;
        self.populated -= 1;

        // `vacant` is always empty while the hasher runs, so a panicking
        // hasher cannot leave an uninitialized bucket marked as filled.
        let mut vacant = found;
        let mut candidate = found;
        loop {
            candidate = self.next_bucket(candidate);
            if candidate == found || !self.status[candidate].is_filled() {
                break;
            }

            // SAFETY: `candidate` is a filled bucket.
            let home = self.home_bucket(unsafe { self.key_at(candidate) });
            if in_cyclic_range(home, vacant, candidate) {
                continue;
            }

            // SAFETY: `candidate` is filled and `vacant` is empty; after the
            // move their statuses are swapped to match.
            unsafe {
                let key = self.keys[candidate].assume_init_read();
                let value = self.values[candidate].assume_init_read();
                self.keys[vacant].write(key);
                self.values[vacant].write(value);
            }
            self.status[vacant] = BucketStatus::Filled;
            self.status[candidate] = BucketStatus::Empty;
            vacant = candidate;
        }

        Ok(removed)
    }
}

impl<'a, K, H> HashTable<'a, K, (), H>
where
    H: KeyHasher<K>,
{
    /// Creates an empty key-only table. No value buffer is needed.
    ///
    /// # Errors
    ///
    /// Same as [`HashTable::new`].
    pub fn new_set(
        keys: &'a mut [MaybeUninit<K>],
        status: &'a mut [BucketStatus],
        hasher: H,
    ) -> Result<Self> {
        // SAFETY: `MaybeUninit<()>` is zero-sized, so a dangling, aligned,
        // non-null pointer is valid for any number of elements and no memory
        // is ever read or written through it.
        let values: &'a mut [MaybeUninit<()>] = unsafe {
            core::slice::from_raw_parts_mut(NonNull::dangling().as_ptr(), keys.len())
        };
        Self::new(keys, values, status, hasher)
    }
}

impl<K, V, H> HashTable<'_, K, V, H> {
    /// Returns the number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Returns the number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the key strategy this table was built with.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns the status of bucket `index`, or `None` if out of range.
    pub fn bucket_status(&self, index: usize) -> Option<BucketStatus> {
        self.status.get(index).copied()
    }

    /// Drops every entry. The capacity is unchanged.
    pub fn clear(&mut self) {
        for (index, status) in self.status.iter_mut().enumerate() {
            if status.is_filled() {
                *status = BucketStatus::Empty;
                // SAFETY: The bucket was filled and is now marked empty, so
                // the entry is dropped exactly once.
                unsafe {
                    self.keys[index].assume_init_drop();
                    self.values[index].assume_init_drop();
                }
            }
        }
        self.populated = 0;
    }

    /// Returns an iterator over `(key, value)` pairs in bucket order.
    ///
    /// Bucket order depends on the hash and on insertion history; it is not
    /// meaningful to callers.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            keys: &*self.keys,
            values: &*self.values,
            status: &*self.status,
            index: 0,
            remaining: self.populated,
        }
    }

    /// Returns an iterator over `(key, mutable value)` pairs in bucket order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            keys: self.keys.iter(),
            values: self.values.iter_mut(),
            status: self.status.iter(),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over the stored keys in bucket order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<K, V, H> Drop for HashTable<'_, K, V, H> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<K>() || core::mem::needs_drop::<V>() {
            self.clear();
        }
    }
}

impl<K: Debug, V: Debug, H> Debug for HashTable<'_, K, V, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct Entries<'t, 'a, K, V, H>(&'t HashTable<'a, K, V, H>);

        impl<K: Debug, V: Debug, H> Debug for Entries<'_, '_, K, V, H> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_map().entries(self.0.iter()).finish()
            }
        }

        f.debug_struct("HashTable")
            .field("populated", &self.populated)
            .field("capacity", &self.capacity())
            .field("entries", &Entries(self))
            .finish()
    }
}

/// Iterator over the entries of a [`HashTable`].
pub struct Iter<'t, K, V> {
    keys: &'t [MaybeUninit<K>],
    values: &'t [MaybeUninit<V>],
    status: &'t [BucketStatus],
    index: usize,
    remaining: usize,
}

impl<'t, K, V> Iterator for Iter<'t, K, V> {
    type Item = (&'t K, &'t V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.index < self.status.len() {
            let index = self.index;
            self.index += 1;
            if self.status[index].is_filled() {
                self.remaining -= 1;
                // SAFETY: The bucket is filled, so key and value are
                // initialized, and the shared borrow keeps them alive.
                return Some(unsafe {
                    (
                        self.keys[index].assume_init_ref(),
                        self.values[index].assume_init_ref(),
                    )
                });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Mutable iterator over the entries of a [`HashTable`].
pub struct IterMut<'t, K, V> {
    keys: core::slice::Iter<'t, MaybeUninit<K>>,
    values: core::slice::IterMut<'t, MaybeUninit<V>>,
    status: core::slice::Iter<'t, BucketStatus>,
    remaining: usize,
}

impl<'t, K, V> Iterator for IterMut<'t, K, V> {
    type Item = (&'t K, &'t mut V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            let status = self.status.next()?;
            let key = self.keys.next()?;
            let value = self.values.next()?;
            if status.is_filled() {
                self.remaining -= 1;
                // SAFETY: The bucket is filled, so key and value are
                // initialized; each bucket is yielded at most once.
                return Some(unsafe { (key.assume_init_ref(), value.assume_init_mut()) });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// Owned backing storage for a [`HashTable`] with `N` buckets.
///
/// Place it in a `static` cell, on the stack, or inside another struct, then
/// borrow a table from it with [`TableStorage::table`].
pub struct TableStorage<K, V, const N: usize> {
    keys: [MaybeUninit<K>; N],
    values: [MaybeUninit<V>; N],
    status: [BucketStatus; N],
}

impl<K, V, const N: usize> TableStorage<K, V, N> {
    /// Creates empty storage.
    pub const fn new() -> Self {
        Self {
            keys: [const { MaybeUninit::uninit() }; N],
            values: [const { MaybeUninit::uninit() }; N],
            status: [BucketStatus::Empty; N],
        }
    }

    /// Returns an empty table borrowing this storage.
    ///
    /// # Errors
    ///
    /// [`Error::NullPointer`] if `N` is zero.
    pub fn table<H: KeyHasher<K>>(&mut self, hasher: H) -> Result<HashTable<'_, K, V, H>> {
        HashTable::new(&mut self.keys, &mut self.values, &mut self.status, hasher)
    }
}

impl<K, V, const N: usize> Default for TableStorage<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned backing storage for a [`HashSet`] with `N` buckets.
pub struct SetStorage<K, const N: usize> {
    keys: [MaybeUninit<K>; N],
    status: [BucketStatus; N],
}

impl<K, const N: usize> SetStorage<K, N> {
    /// Creates empty storage.
    pub const fn new() -> Self {
        Self {
            keys: [const { MaybeUninit::uninit() }; N],
            status: [BucketStatus::Empty; N],
        }
    }

    /// Returns an empty set borrowing this storage.
    ///
    /// # Errors
    ///
    /// [`Error::NullPointer`] if `N` is zero.
    pub fn set<H: KeyHasher<K>>(&mut self, hasher: H) -> Result<HashSet<'_, K, H>> {
        HashTable::new_set(&mut self.keys, &mut self.status, hasher)
    }
}

impl<K, const N: usize> Default for SetStorage<K, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe statistics for a [`HashTable`].
///
/// Available with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries in the table
    pub populated: usize,
    /// Number of buckets
    pub capacity: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f64,
    /// Largest distance of any entry from its home bucket
    pub max_displacement: usize,
    /// Mean distance of entries from their home buckets
    pub mean_displacement: f64,
    /// Length of the longest run of consecutive filled buckets
    pub longest_cluster: usize,
    /// Bytes of caller storage used by keys, values and statuses
    pub total_bytes: usize,
}

#[cfg(feature = "stats")]
impl DebugStats {
    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Probe Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Displacement: max {}, mean {:.3}",
            self.max_displacement, self.mean_displacement
        );
        println!("Longest cluster: {} buckets", self.longest_cluster);
        println!("Storage: {} bytes", self.total_bytes);
    }
}

#[cfg(feature = "stats")]
impl<K, V, H> HashTable<'_, K, V, H>
where
    H: KeyHasher<K>,
{
    fn displacement(&self, index: usize) -> usize {
        // SAFETY: Callers only pass filled buckets.
        let home = self.home_bucket(unsafe { self.key_at(index) });
        (index + self.capacity() - home) % self.capacity()
    }

    /// Computes a histogram of probe lengths.
    ///
    /// Entry `d` of the result counts the entries stored `d` buckets past
    /// their home bucket, so a lookup of such an entry inspects `d + 1`
    /// buckets. The result is empty for an empty table.
    pub fn probe_histogram(&self) -> alloc::vec::Vec<usize> {
        let mut hist = alloc::vec::Vec::new();
        for index in 0..self.capacity() {
            if !self.status[index].is_filled() {
                continue;
            }
            let d = self.displacement(index);
            if hist.len() <= d {
                hist.resize(d + 1, 0);
            }
            hist[d] += 1;
        }
        hist
    }

    /// Returns probe and utilization statistics.
    pub fn debug_stats(&self) -> DebugStats {
        let mut max_displacement = 0;
        let mut total_displacement = 0;
        for index in 0..self.capacity() {
            if self.status[index].is_filled() {
                let d = self.displacement(index);
                max_displacement = max_displacement.max(d);
                total_displacement += d;
            }
        }

        let longest_cluster = match self.status.iter().position(|s| !s.is_filled()) {
            None => self.capacity(),
            Some(empty) => {
                let mut longest = 0;
                let mut run = 0;
                for step in 1..=self.capacity() {
                    if self.status[(empty + step) % self.capacity()].is_filled() {
                        run += 1;
                        longest = longest.max(run);
                    } else {
                        run = 0;
                    }
                }
                longest
            }
        };

        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            load_factor: self.populated as f64 / self.capacity() as f64,
            max_displacement,
            mean_displacement: if self.populated == 0 {
                0.0
            } else {
                total_displacement as f64 / self.populated as f64
            },
            longest_cluster,
            total_bytes: self.capacity()
                * (core::mem::size_of::<K>()
                    + core::mem::size_of::<V>()
                    + core::mem::size_of::<BucketStatus>()),
        }
    }

    /// Pretty-prints the probe-length histogram as a horizontal bar chart.
    #[cfg(feature = "std")]
    pub fn print_probe_histogram(&self) {
        let hist = self.probe_histogram();
        let max = hist.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        println!("probe histogram ({} entries):", self.populated);
        for (d, &count) in hist.iter().enumerate() {
            let width = (count * max_bar).div_ceil(max);
            println!("{:>3} | {} ({})", d, "█".repeat(width), count);
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use core::hash::BuildHasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::hasher::BuildHasherKeys;
    use crate::hasher::FnKeys;
    use crate::hasher::StrKeys;
    use crate::hasher::UnsignedKeys;

    #[derive(Clone, Default)]
    struct SipBuilder;

    impl BuildHasher for SipBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(0x0123, 0x4567)
        }
    }

    /// Every filled bucket must be reachable from its home bucket without
    /// crossing an empty one.
    fn assert_probe_chains<K: Debug, V, H: KeyHasher<K>>(table: &HashTable<'_, K, V, H>) {
        let mut filled = 0;
        for index in 0..table.capacity() {
            if !table.status[index].is_filled() {
                continue;
            }
            filled += 1;
            let key = unsafe { table.key_at(index) };
            let mut probe = table.home_bucket(key);
            while probe != index {
                assert!(
                    table.status[probe].is_filled(),
                    "{key:?} in bucket {index} unreachable: bucket {probe} is empty"
                );
                probe = table.next_bucket(probe);
            }
        }
        assert_eq!(filled, table.len());
    }

    fn filled_buckets<K, V, H>(table: &HashTable<'_, K, V, H>) -> usize {
        table.status.iter().filter(|s| s.is_filled()).count()
    }

    #[test]
    fn init_sets_capacity_and_clears_status() {
        let mut keys = [const { MaybeUninit::<&str>::uninit() }; 128];
        let mut values = [const { MaybeUninit::<i32>::uninit() }; 128];
        let mut status = [BucketStatus::Filled; 128];

        let table = HashTable::new(&mut keys, &mut values, &mut status, StrKeys).unwrap();
        assert_eq!(table.capacity(), 128);
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert!((0..128).all(|i| table.bucket_status(i) == Some(BucketStatus::Empty)));
        assert_eq!(table.bucket_status(128), None);
    }

    #[test]
    fn init_rejects_bad_buffers() {
        let mut values = [const { MaybeUninit::<u32>::uninit() }; 4];
        let mut status = [BucketStatus::Empty; 4];
        let mut no_keys: [MaybeUninit<u32>; 0] = [];
        let empty = HashTable::new(&mut no_keys, &mut values, &mut status, UnsignedKeys);
        assert_eq!(empty.err(), Some(Error::NullPointer));

        let mut keys = [const { MaybeUninit::<u32>::uninit() }; 8];
        let short_values =
            HashTable::<u32, u32, _>::new(&mut keys, &mut values, &mut status, UnsignedKeys);
        assert_eq!(short_values.err(), Some(Error::BadStructure));

        let mut keys = [const { MaybeUninit::<u32>::uninit() }; 4];
        let mut long_values = [const { MaybeUninit::<u32>::uninit() }; 8];
        let mut short_status = [BucketStatus::Empty; 3];
        let result = HashTable::<u32, u32, _>::new(
            &mut keys,
            &mut long_values,
            &mut short_status,
            UnsignedKeys,
        );
        assert_eq!(result.err(), Some(Error::BadStructure));
    }

    #[test]
    fn insert_then_update_in_place() {
        let mut storage = TableStorage::<&str, i32, 128>::new();
        let mut table = storage.table(StrKeys).unwrap();

        assert_eq!(table.insert("john", 0), Ok(()));

        let value = table.search_ref(&"john").unwrap();
        *value += 1;

        assert_eq!(table.search(&"john"), Ok(&1));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn search_missing_entry() {
        let mut storage = TableStorage::<&str, i32, 128>::new();
        let mut table = storage.table(StrKeys).unwrap();
        table.insert("john", 0).unwrap();
        table.insert("jill", 0).unwrap();

        assert_eq!(table.search(&"jack"), Err(Error::Underflow));
        assert_eq!(table.search_ref(&"jack"), Err(Error::Underflow));
        assert!(!table.contains_key(&"jack"));
        assert_eq!(table.delete(&"jack"), Err(Error::Underflow));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_insert_leaves_value() {
        let mut storage = TableStorage::<u32, &str, 16>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        table.insert(7, "first").unwrap();
        assert_eq!(table.insert(7, "second"), Err(Error::DuplicateKey));
        assert_eq!(table.search(&7), Ok(&"first"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn overflow_when_full() {
        let mut storage = TableStorage::<u32, u32, 8>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        for k in 0..8 {
            table.insert(k * 3, k).unwrap();
        }
        assert_eq!(table.insert(100, 0), Err(Error::Overflow));
        assert_eq!(table.len(), 8);

        // A present key is still reported as a duplicate on a full table.
        assert_eq!(table.insert(9, 0), Err(Error::DuplicateKey));

        // Lookups of absent keys terminate after one lap.
        assert_eq!(table.search(&1000), Err(Error::Underflow));
        for k in 0..8 {
            assert_eq!(table.search(&(k * 3)), Ok(&k));
        }
        assert_probe_chains(&table);
    }

    #[test]
    fn delete_from_clustered_run() {
        let mut storage = TableStorage::<u32, u32, 64>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();

        // Twenty keys sharing home bucket 5 form one contiguous run.
        let keys: alloc::vec::Vec<u32> = (0..20).map(|k| k * 64 + 5).collect();
        for (i, &k) in keys.iter().enumerate() {
            table.insert(k, i as u32).unwrap();
        }
        assert!((5..25).all(|b| table.status[b].is_filled()));

        assert_eq!(table.delete(&keys[2]), Ok((keys[2], 2)));
        assert_eq!(table.len(), 19);
        assert_eq!(table.search(&keys[2]), Err(Error::Underflow));
        for (i, &k) in keys.iter().enumerate().filter(|&(i, _)| i != 2) {
            assert_eq!(table.search(&k), Ok(&(i as u32)), "key {k} lost");
        }
        assert_eq!(table.status[24], BucketStatus::Empty);
        assert_probe_chains(&table);
    }

    #[test]
    fn delete_shifts_across_wraparound() {
        let mut storage = TableStorage::<u32, char, 16>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();

        table.insert(14, 'a').unwrap(); // bucket 14
        table.insert(30, 'b').unwrap(); // home 14, bucket 15
        table.insert(46, 'c').unwrap(); // home 14, bucket 0
        table.insert(15, 'd').unwrap(); // home 15, bucket 1

        table.delete(&14).unwrap();

        let at = |t: &HashTable<'_, u32, char, UnsignedKeys>, b: usize| unsafe { *t.key_at(b) };
        assert_eq!(at(&table, 14), 30);
        assert_eq!(at(&table, 15), 46);
        assert_eq!(at(&table, 0), 15);
        assert_eq!(table.status[1], BucketStatus::Empty);
        assert_eq!(table.search(&15), Ok(&'d'));
        assert_eq!(table.search(&46), Ok(&'c'));
        assert_probe_chains(&table);
    }

    #[test]
    fn delete_leaves_entries_at_their_home() {
        let mut storage = TableStorage::<u32, (), 16>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();

        table.insert(3, ()).unwrap(); // bucket 3
        table.insert(4, ()).unwrap(); // bucket 4, at home
        table.insert(19, ()).unwrap(); // home 3, bucket 5

        table.delete(&3).unwrap();

        let at = |t: &HashTable<'_, u32, (), UnsignedKeys>, b: usize| unsafe { *t.key_at(b) };
        assert_eq!(at(&table, 3), 19);
        assert_eq!(at(&table, 4), 4);
        assert_eq!(table.status[5], BucketStatus::Empty);
        assert_probe_chains(&table);
    }

    #[test]
    fn delete_from_full_table() {
        let mut storage = TableStorage::<u32, u32, 8>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        // Everything collides on bucket 6 and wraps around the end.
        for k in 0..8 {
            table.insert(6 + 8 * k, k).unwrap();
        }

        table.delete(&(6 + 8 * 3)).unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(filled_buckets(&table), 7);
        for k in (0..8).filter(|&k| k != 3) {
            assert_eq!(table.search(&(6 + 8 * k)), Ok(&k));
        }
        assert_probe_chains(&table);

        table.insert(1, 99).unwrap();
        assert_eq!(table.search(&1), Ok(&99));
        assert_eq!(table.insert(2, 0), Err(Error::Overflow));
        assert_probe_chains(&table);
    }

    #[test]
    fn delete_everything_in_random_order() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut storage = TableStorage::<u32, u32, 97>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();

        let mut live: alloc::vec::Vec<u32> = alloc::vec::Vec::new();
        while live.len() < 90 {
            let k = rng.random_range(0..1000);
            if table.insert(k, k * 2).is_ok() {
                live.push(k);
            }
        }

        while !live.is_empty() {
            let victim = live.swap_remove(rng.random_range(0..live.len()));
            assert_eq!(table.delete(&victim), Ok((victim, victim * 2)));
            for k in &live {
                assert_eq!(table.search(k), Ok(&(k * 2)));
            }
            assert_probe_chains(&table);
        }
        assert!(table.is_empty());
        assert_eq!(filled_buckets(&table), 0);
    }

    #[test]
    fn golden_model_fuzz() {
        const NUMEL: usize = 1024;
        const KEY_RANGE: usize = 4000;

        let mut rng = SmallRng::seed_from_u64(0);
        let mut storage = TableStorage::<u32, i32, NUMEL>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();

        let mut golden = alloc::vec![None::<i32>; KEY_RANGE];
        let mut numel = 0usize;

        for _ in 0..100_000 {
            let action = rng.random_range(0..100);
            let key = rng.random_range(0..KEY_RANGE as u32);
            let value: i32 = rng.random();
            let slot = &mut golden[key as usize];

            if action < 10 {
                if numel < NUMEL {
                    let result = table.insert(key, value);
                    if slot.is_some() {
                        assert_eq!(result, Err(Error::DuplicateKey));
                    } else {
                        assert_eq!(result, Ok(()));
                        *slot = Some(value);
                        numel += 1;
                    }
                }
            } else if action < 30 {
                let result = table.delete(&key);
                match slot.take() {
                    Some(expected) => {
                        assert_eq!(result, Ok((key, expected)));
                        numel -= 1;
                    }
                    None => assert_eq!(result, Err(Error::Underflow)),
                }
            } else if action < 60 {
                match slot {
                    Some(expected) => assert_eq!(table.search(&key), Ok(&*expected)),
                    None => assert_eq!(table.search(&key), Err(Error::Underflow)),
                }
            } else {
                match (table.search_ref(&key), slot) {
                    (Ok(value), Some(expected)) => {
                        assert_eq!(*value, *expected);
                        *value = value.wrapping_add(1);
                        *expected = expected.wrapping_add(1);
                    }
                    (Err(e), None) => assert_eq!(e, Error::Underflow),
                    (found, expected) => panic!("search_ref {found:?}, model {expected:?}"),
                }
            }

            assert_eq!(filled_buckets(&table), numel);
            assert_eq!(table.len(), numel);
        }

        for key in 0..KEY_RANGE as u32 {
            match golden[key as usize] {
                Some(expected) => assert_eq!(table.search(&key), Ok(&expected)),
                None => assert_eq!(table.search(&key), Err(Error::Underflow)),
            }
        }
        assert_probe_chains(&table);
    }

    #[test]
    fn keyed_hasher_fuzz() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut storage = TableStorage::<u64, u64, 251>::new();
        let mut table = storage.table(BuildHasherKeys::new(SipBuilder)).unwrap();
        let mut model = std::collections::HashMap::new();

        for _ in 0..20_000 {
            let key = rng.random_range(0..600u64);
            if rng.random_bool(0.55) {
                let result = table.insert(key, key ^ 0xFF);
                if model.contains_key(&key) {
                    assert_eq!(result, Err(Error::DuplicateKey));
                } else if model.len() == table.capacity() {
                    assert_eq!(result, Err(Error::Overflow));
                } else {
                    assert_eq!(result, Ok(()));
                    model.insert(key, key ^ 0xFF);
                }
            } else {
                let result = table.delete(&key).map(|(_, v)| v);
                assert_eq!(result.ok(), model.remove(&key));
            }
            assert_eq!(table.len(), model.len());
        }

        assert_probe_chains(&table);
        let mut seen: alloc::vec::Vec<_> = table.iter().map(|(k, v)| (*k, *v)).collect();
        let mut expected: alloc::vec::Vec<_> = model.into_iter().collect();
        seen.sort_unstable();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn function_pair_strategy() {
        // Everything hashes to one bucket, so the table degrades to a scan.
        let keys = FnKeys::new(|_: &u8| 0, |a: &u8, b: &u8| a == b);
        let mut storage = TableStorage::<u8, u8, 10>::new();
        let mut table = storage.table(keys).unwrap();
        for k in 0..10 {
            table.insert(k, k + 100).unwrap();
        }
        assert_eq!(table.insert(10, 0), Err(Error::Overflow));
        for k in (0..10).step_by(3) {
            table.delete(&k).unwrap();
        }
        for k in 0..10 {
            let expected = if k % 3 == 0 { Err(Error::Underflow) } else { Ok(&(k + 100)) };
            assert_eq!(table.search(&k), expected);
        }
        assert_probe_chains(&table);
    }

    #[test]
    fn key_only_set() {
        let mut storage = SetStorage::<u32, 32>::new();
        let mut set = storage.set(UnsignedKeys).unwrap();
        assert_eq!(set.capacity(), 32);

        for k in [1, 33, 65, 2] {
            set.insert(k, ()).unwrap();
        }
        assert_eq!(set.insert(33, ()), Err(Error::DuplicateKey));
        assert!(set.contains_key(&65));
        set.delete(&1).unwrap();
        assert!(!set.contains_key(&1));
        assert!(set.contains_key(&33));
        assert!(set.contains_key(&65));
        assert_eq!(set.len(), 3);
        assert_probe_chains(&set);
    }

    #[test]
    fn iterators_visit_each_entry_once() {
        let mut storage = TableStorage::<u32, u32, 32>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        for k in [5, 37, 6, 31, 63] {
            table.insert(k, 0).unwrap();
        }

        assert_eq!(table.iter().len(), 5);
        for (k, v) in table.iter_mut() {
            *v = k * 10;
        }
        let mut pairs: alloc::vec::Vec<_> = table.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.sort_unstable();
        assert_eq!(pairs, [(5, 50), (6, 60), (31, 310), (37, 370), (63, 630)]);

        let mut keys: alloc::vec::Vec<u32> = table.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, [5, 6, 31, 37, 63]);
    }

    #[test]
    fn clear_and_drop_release_entries() {
        struct Counted<'c>(&'c Cell<usize>);

        impl Drop for Counted<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Cell::new(0);
        let mut storage = TableStorage::<u32, Counted<'_>, 16>::new();
        {
            let mut table = storage.table(UnsignedKeys).unwrap();
            for k in 0..4 {
                table.insert(k, Counted(&drops)).unwrap();
            }
            assert!(table.insert(0, Counted(&drops)).is_err());
            assert_eq!(drops.get(), 1);

            drop(table.delete(&2).unwrap());
            assert_eq!(drops.get(), 2);

            table.clear();
            assert_eq!(drops.get(), 5);
            assert!(table.is_empty());

            for k in 0..3 {
                table.insert(k, Counted(&drops)).unwrap();
            }
        }
        assert_eq!(drops.get(), 8);
    }

    #[test]
    fn debug_output() {
        let mut storage = TableStorage::<u32, u32, 4>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        table.insert(1, 2).unwrap();
        let text = alloc::format!("{table:?}");
        assert!(text.contains("populated: 1"), "{text}");
        assert!(text.contains("{1: 2}"), "{text}");
    }

    #[test]
    fn cyclic_range() {
        assert!(in_cyclic_range(4, 3, 5));
        assert!(in_cyclic_range(5, 3, 5));
        assert!(!in_cyclic_range(3, 3, 5));
        assert!(!in_cyclic_range(6, 3, 5));

        // Wrapped: (14, 1] covers 15, 0, 1.
        assert!(in_cyclic_range(15, 14, 1));
        assert!(in_cyclic_range(0, 14, 1));
        assert!(in_cyclic_range(1, 14, 1));
        assert!(!in_cyclic_range(14, 14, 1));
        assert!(!in_cyclic_range(2, 14, 1));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn probe_statistics() {
        let mut storage = TableStorage::<u32, u32, 16>::new();
        let mut table = storage.table(UnsignedKeys).unwrap();
        assert!(table.probe_histogram().is_empty());

        for k in [0, 16, 32, 5] {
            table.insert(k, 0).unwrap();
        }
        assert_eq!(table.probe_histogram(), [2, 1, 1]);

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 4);
        assert_eq!(stats.capacity, 16);
        assert_eq!(stats.max_displacement, 2);
        assert_eq!(stats.longest_cluster, 3);
        assert!((stats.mean_displacement - 0.75).abs() < 1e-9);
        assert!((stats.load_factor - 0.25).abs() < 1e-9);
    }
}
