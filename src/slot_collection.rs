//! Fixed-capacity unordered store with slot recycling.
//!
//! A [`SlotCollection`] keeps live slot indices in two structures at once: a
//! FIFO free list (a [`RingBuffer`] of indices) for O(1) allocation and an
//! occupancy bitmap for iteration in index order. Every index is in exactly
//! one of the two.

use core::fmt::Debug;
use core::mem::MaybeUninit;

use crate::error::Error;
use crate::error::Result;
use crate::ring_buffer::RingBuffer;

/// Width of one occupancy bitmap word.
pub const BITMAP_WORD_BITS: usize = u32::BITS as usize;

/// Number of bitmap words needed to track `capacity` slots.
pub const fn bitmap_len(capacity: usize) -> usize {
    capacity.div_ceil(BITMAP_WORD_BITS)
}

/// Number of ring buffer slots needed for the free list of `capacity` slots.
///
/// One more than `capacity`, since a ring buffer leaves one slot unused.
pub const fn free_list_len(capacity: usize) -> usize {
    capacity + 1
}

#[inline(always)]
fn word_and_mask(index: usize) -> (usize, u32) {
    (index / BITMAP_WORD_BITS, 1 << (index % BITMAP_WORD_BITS))
}

/// Finds the first set bit at or after `start`, skipping whole zero words.
fn next_occupied(occupied: &[u32], start: usize, capacity: usize) -> Option<usize> {
    let mut index = start;
    while index < capacity {
        let word = index / BITMAP_WORD_BITS;
        let bits = occupied[word] >> (index % BITMAP_WORD_BITS);
        if bits == 0 {
            index = (word + 1) * BITMAP_WORD_BITS;
            continue;
        }
        let found = index + bits.trailing_zeros() as usize;
        return (found < capacity).then_some(found);
    }
    None
}

/// Position of an element inside a [`SlotCollection`].
///
/// A cursor stays valid while the slot it addresses is occupied. The
/// supported way to delete while iterating is: read the element, remove it,
/// then [`advance`](SlotCollection::advance) the same cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    index: usize,
}

impl Cursor {
    /// The slot index this cursor addresses.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A fixed-capacity unordered container that hands out and reclaims slots.
///
/// ## Example
///
/// ```rust
/// use core::mem::MaybeUninit;
///
/// use fixed_containers::SlotCollection;
/// use fixed_containers::slot_collection::bitmap_len;
/// use fixed_containers::slot_collection::free_list_len;
///
/// let mut elements = [const { MaybeUninit::<u32>::uninit() }; 8];
/// let mut free = [const { MaybeUninit::<usize>::uninit() }; free_list_len(8)];
/// let mut bitmap = [0u32; bitmap_len(8)];
/// let mut slots = SlotCollection::new(&mut elements, &mut free, &mut bitmap).unwrap();
///
/// let a = slots.add(10).unwrap();
/// let b = slots.add(20).unwrap();
/// assert_eq!(slots.remove(a), Ok(10));
/// assert_eq!(slots.get(b), Ok(&20));
/// assert_eq!(slots.len(), 1);
/// ```
pub struct SlotCollection<'a, T> {
    elements: &'a mut [MaybeUninit<T>],
    free_slots: RingBuffer<'a, usize>,
    occupied: &'a mut [u32],
}

impl<'a, T> SlotCollection<'a, T> {
    /// Builds a collection from a caller-populated free list.
    ///
    /// `free_slots` must have a usable capacity of exactly `elements.len()`
    /// and hold every index `0..elements.len()` in increasing order. The
    /// first `bitmap_len(elements.len())` words of `bitmap` must be zero.
    ///
    /// # Errors
    ///
    /// - [`Error::NullPointer`] if `elements` or `bitmap` is empty.
    /// - [`Error::BadStructure`] if the free list or the bitmap does not
    ///   match the description above.
    pub fn from_parts(
        elements: &'a mut [MaybeUninit<T>],
        free_slots: RingBuffer<'a, usize>,
        bitmap: &'a mut [u32],
    ) -> Result<Self> {
        let capacity = elements.len();
        if capacity == 0 || bitmap.is_empty() {
            warn_event!("slot collection created without element or bitmap storage");
            return Err(Error::NullPointer);
        }

        if free_slots.capacity() != capacity {
            warn_event!(
                capacity,
                free_list_capacity = free_slots.capacity(),
                "slot collection free list has wrong capacity"
            );
            return Err(Error::BadStructure);
        }
        if free_slots.len() != capacity || !free_slots.iter().copied().eq(0..capacity) {
            warn_event!("slot collection free list does not hold every index in order");
            return Err(Error::BadStructure);
        }

        let words = bitmap_len(capacity);
        if bitmap.len() < words {
            warn_event!(
                capacity,
                words = bitmap.len(),
                "slot collection bitmap too short"
            );
            return Err(Error::BadStructure);
        }
        let (occupied, _) = bitmap.split_at_mut(words);
        if occupied.iter().any(|&w| w != 0) {
            warn_event!("slot collection bitmap is not zeroed");
            return Err(Error::BadStructure);
        }

        Ok(Self {
            elements,
            free_slots,
            occupied,
        })
    }

    /// Builds an empty collection, zeroing `bitmap` and filling the free list
    /// in `free_slot_space` itself.
    ///
    /// `free_slot_space` needs at least [`free_list_len`]`(elements.len())`
    /// slots and `bitmap` at least [`bitmap_len`]`(elements.len())` words.
    ///
    /// # Errors
    ///
    /// - [`Error::NullPointer`] if `elements` or `bitmap` is empty.
    /// - [`Error::BadStructure`] if `free_slot_space` or `bitmap` is too
    ///   short.
    pub fn new(
        elements: &'a mut [MaybeUninit<T>],
        free_slot_space: &'a mut [MaybeUninit<usize>],
        bitmap: &'a mut [u32],
    ) -> Result<Self> {
        let capacity = elements.len();
        if capacity == 0 || bitmap.is_empty() {
            warn_event!("slot collection created without element or bitmap storage");
            return Err(Error::NullPointer);
        }
        if free_slot_space.len() < free_list_len(capacity) || bitmap.len() < bitmap_len(capacity) {
            warn_event!(
                capacity,
                free_list = free_slot_space.len(),
                words = bitmap.len(),
                "slot collection storage too short"
            );
            return Err(Error::BadStructure);
        }

        let (free_slot_space, _) = free_slot_space.split_at_mut(free_list_len(capacity));
        let mut free_slots = RingBuffer::new(free_slot_space);
        for index in 0..capacity {
            free_slots.push(index)?;
        }
        bitmap[..bitmap_len(capacity)].fill(0);

        Self::from_parts(elements, free_slots, bitmap)
    }

    /// Maximum number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.elements.len()
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.capacity() - self.free_slots.len()
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if every slot is occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_slots.is_empty()
    }

    /// Returns `true` if slot `index` holds a live element.
    #[inline]
    pub fn is_occupied(&self, index: usize) -> bool {
        if index >= self.capacity() {
            return false;
        }
        let (word, mask) = word_and_mask(index);
        self.occupied[word] & mask != 0
    }

    /// Stores `item` in a free slot and returns a cursor to it.
    ///
    /// Slots are recycled in the order they were freed.
    ///
    /// # Errors
    ///
    /// - [`Error::Overflow`] if every slot is occupied. `item` is dropped.
    /// - [`Error::Unknown`] if the free list handed out a slot that is
    ///   marked occupied.
    pub fn add(&mut self, item: T) -> Result<Cursor> {
        let Ok(index) = self.free_slots.pop() else {
            trace_event!(capacity = self.capacity(), "slot collection add overflow");
            return Err(Error::Overflow);
        };

        if index >= self.capacity() || self.is_occupied(index) {
            error_event!(index, "slot collection free list returned a live slot");
            return Err(Error::Unknown);
        }

        self.elements[index].write(item);
        let (word, mask) = word_and_mask(index);
        self.occupied[word] |= mask;
        Ok(Cursor { index })
    }

    /// Returns a cursor at the lowest occupied slot.
    ///
    /// # Errors
    ///
    /// [`Error::Underflow`] if the collection is empty.
    pub fn first(&self) -> Result<Cursor> {
        next_occupied(&*self.occupied, 0, self.capacity())
            .map(|index| Cursor { index })
            .ok_or(Error::Underflow)
    }

    /// Moves `cursor` to the next occupied slot with a higher index.
    ///
    /// The slot the cursor currently addresses does not need to be occupied,
    /// so advancing after [`remove`](Self::remove) works.
    ///
    /// # Errors
    ///
    /// [`Error::Underflow`] if there is no later occupied slot. The cursor is
    /// left where it was.
    pub fn advance(&self, cursor: &mut Cursor) -> Result<()> {
        let index =
            next_occupied(&*self.occupied, cursor.index + 1, self.capacity()).ok_or(Error::Underflow)?;
        cursor.index = index;
        Ok(())
    }

    /// Returns a cursor for slot `index` if it is occupied.
    ///
    /// # Errors
    ///
    /// [`Error::BadStructure`] if the slot is free or out of range.
    pub fn cursor_at(&self, index: usize) -> Result<Cursor> {
        if self.is_occupied(index) {
            Ok(Cursor { index })
        } else {
            Err(Error::BadStructure)
        }
    }

    /// Returns the element at `cursor`.
    ///
    /// # Errors
    ///
    /// [`Error::BadStructure`] if the cursor does not address a live slot.
    pub fn get(&self, cursor: Cursor) -> Result<&T> {
        if !self.is_occupied(cursor.index) {
            return Err(Error::BadStructure);
        }
        // SAFETY: The occupancy bit is set, so the element is initialized.
        Ok(unsafe { self.elements[cursor.index].assume_init_ref() })
    }

    /// Returns the element at `cursor` mutably.
    ///
    /// # Errors
    ///
    /// [`Error::BadStructure`] if the cursor does not address a live slot.
    pub fn get_mut(&mut self, cursor: Cursor) -> Result<&mut T> {
        if !self.is_occupied(cursor.index) {
            return Err(Error::BadStructure);
        }
        // SAFETY: The occupancy bit is set, so the element is initialized.
        Ok(unsafe { self.elements[cursor.index].assume_init_mut() })
    }

    /// Removes the element at `cursor` and returns it. The cursor is not
    /// moved.
    ///
    /// # Errors
    ///
    /// [`Error::Unknown`] if the slot is already free (a double free) or the
    /// free list cannot take the index back. Nothing is changed in the
    /// double-free case.
    pub fn remove(&mut self, cursor: Cursor) -> Result<T> {
        let index = cursor.index;
        if !self.is_occupied(index) {
            error_event!(index, "slot collection double free");
            return Err(Error::Unknown);
        }

        if self.free_slots.push(index).is_err() {
            error_event!(index, "slot collection free list is full while a slot is live");
            return Err(Error::Unknown);
        }

        let (word, mask) = word_and_mask(index);
        self.occupied[word] &= !mask;
        // SAFETY: The bit was set, so the element is initialized; clearing it
        // hands ownership to the caller.
        Ok(unsafe { self.elements[index].assume_init_read() })
    }

    /// Returns an iterator over `(cursor, element)` pairs in increasing slot
    /// order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            elements: &*self.elements,
            occupied: &*self.occupied,
            next: 0,
            remaining: self.len(),
        }
    }

    /// Drops every element and returns all slots to the free list in index
    /// order.
    pub fn clear(&mut self) {
        self.drop_live();
        self.occupied.fill(0);
        self.free_slots.clear();
        for index in 0..self.capacity() {
            let pushed = self.free_slots.push(index);
            debug_assert!(pushed.is_ok());
        }
    }

    fn drop_live(&mut self) {
        if !core::mem::needs_drop::<T>() {
            return;
        }
        let mut next = 0;
        while let Some(index) = next_occupied(&*self.occupied, next, self.capacity()) {
            // SAFETY: The bit is set, so the element is initialized. Callers
            // clear the bitmap (or discard it) afterwards.
            unsafe { self.elements[index].assume_init_drop() };
            next = index + 1;
        }
    }
}

impl<T: Copy> SlotCollection<'_, T> {
    /// Returns a copy of the element at `cursor`.
    ///
    /// # Errors
    ///
    /// [`Error::BadStructure`] if the cursor does not address a live slot.
    pub fn get_copied(&self, cursor: Cursor) -> Result<T> {
        self.get(cursor).copied()
    }
}

impl<T> Drop for SlotCollection<'_, T> {
    fn drop(&mut self) {
        self.drop_live();
    }
}

impl<T: Debug> Debug for SlotCollection<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct Live<'s, T>(Iter<'s, T>);

        impl<T: Debug> Debug for Live<'_, T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_map()
                    .entries(self.0.clone().map(|(c, v)| (c.index, v)))
                    .finish()
            }
        }

        f.debug_struct("SlotCollection")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("slots", &Live(self.iter()))
            .finish()
    }
}

/// Iterator over the live elements of a [`SlotCollection`].
pub struct Iter<'s, T> {
    elements: &'s [MaybeUninit<T>],
    occupied: &'s [u32],
    next: usize,
    remaining: usize,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements,
            occupied: self.occupied,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'s, T> Iterator for Iter<'s, T> {
    type Item = (Cursor, &'s T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = next_occupied(&*self.occupied, self.next, self.elements.len())?;
        self.next = index + 1;
        self.remaining = self.remaining.saturating_sub(1);
        // SAFETY: The bit is set, so the element is initialized, and the
        // shared borrow keeps it that way.
        Some((Cursor { index }, unsafe { self.elements[index].assume_init_ref() }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
