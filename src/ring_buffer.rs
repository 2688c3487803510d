use core::fmt::Debug;
use core::mem::MaybeUninit;

use crate::error::Error;
use crate::error::Result;

/// A fixed-capacity FIFO queue over caller-supplied storage.
///
/// Items are written at the head and read from the tail. Indices wrap modulo
/// the number of storage slots, and one slot is always left unused so that
/// `head == tail` unambiguously means "empty". A buffer over `N` slots
/// therefore holds at most `N - 1` items.
///
/// # Examples
///
/// ```rust
/// use core::mem::MaybeUninit;
///
/// use fixed_containers::Error;
/// use fixed_containers::RingBuffer;
///
/// let mut space = [const { MaybeUninit::<u8>::uninit() }; 4];
/// let mut ring = RingBuffer::new(&mut space);
/// assert_eq!(ring.capacity(), 3);
///
/// ring.push_many(&[1, 2, 3]).unwrap();
/// assert_eq!(ring.push(4), Err(Error::Overflow));
/// assert_eq!(ring.pop(), Ok(1));
/// ```
pub struct RingBuffer<'a, T> {
    slots: &'a mut [MaybeUninit<T>],
    head: usize,
    tail: usize,
}

impl<'a, T> RingBuffer<'a, T> {
    /// Creates an empty ring buffer over `slots`.
    ///
    /// Any previous contents of `slots` are ignored (and never dropped).
    pub fn new(slots: &'a mut [MaybeUninit<T>]) -> Self {
        Self {
            slots,
            head: 0,
            tail: 0,
        }
    }

    /// Number of storage slots, including the reserved one.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Maximum number of items the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    /// Number of items currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.head + self.slots.len() - self.tail
        }
    }

    /// Returns `true` if no items are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Returns `true` if a push would overflow.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Number of free item slots.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    fn wrap(&self, index: usize) -> usize {
        if index >= self.slots.len() {
            index - self.slots.len()
        } else {
            index
        }
    }

    /// Pushes `item` at the head.
    ///
    /// Fails with [`Error::Overflow`] if the buffer is full; `item` is dropped
    /// in that case and the buffer is unchanged.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            trace_event!(capacity = self.capacity(), "ring buffer push overflow");
            return Err(Error::Overflow);
        }

        self.slots[self.head].write(item);
        self.head = self.wrap(self.head + 1);
        Ok(())
    }

    /// Removes and returns the item at the tail.
    ///
    /// Fails with [`Error::Underflow`] if the buffer is empty.
    pub fn pop(&mut self) -> Result<T> {
        if self.is_empty() {
            return Err(Error::Underflow);
        }

        // SAFETY: The buffer is non-empty, so the slot at `tail` holds an
        // initialized item. Advancing `tail` right after the read transfers
        // ownership out and ensures it is never read again.
        let item = unsafe { self.slots[self.tail].assume_init_read() };
        self.tail = self.wrap(self.tail + 1);
        Ok(item)
    }

    /// Returns a reference to the item at the tail without removing it.
    ///
    /// Fails with [`Error::Underflow`] if the buffer is empty.
    pub fn peek(&self) -> Result<&T> {
        if self.is_empty() {
            return Err(Error::Underflow);
        }

        // SAFETY: The buffer is non-empty, so the slot at `tail` is
        // initialized.
        Ok(unsafe { self.slots[self.tail].assume_init_ref() })
    }

    /// Drops the item at the tail.
    ///
    /// Fails with [`Error::Underflow`] if the buffer is empty.
    pub fn dispose(&mut self) -> Result<()> {
        self.dispose_many(1)
    }

    /// Drops the `count` oldest items.
    ///
    /// Fails with [`Error::Underflow`], leaving the buffer unchanged, if fewer
    /// than `count` items are queued.
    pub fn dispose_many(&mut self, count: usize) -> Result<()> {
        if self.len() < count {
            return Err(Error::Underflow);
        }

        self.drop_oldest(count);
        Ok(())
    }

    /// Drops every queued item.
    pub fn clear(&mut self) {
        self.drop_oldest(self.len());
        self.head = 0;
        self.tail = 0;
    }

    /// Drops the `count` oldest items. `count` must not exceed `len()`.
    fn drop_oldest(&mut self, count: usize) {
        debug_assert!(count <= self.len());
        for _ in 0..count {
            let tail = self.tail;
            self.tail = self.wrap(self.tail + 1);
            // SAFETY: `tail` was inside the queued range, so it is
            // initialized, and the range no longer covers it.
            unsafe { self.slots[tail].assume_init_drop() };
        }
    }

    /// Returns an iterator over the queued items, oldest first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: &*self.slots,
            index: self.tail,
            remaining: self.len(),
        }
    }
}

impl<T: Copy> RingBuffer<'_, T> {
    /// Pushes every item of `items` at the head, in order.
    ///
    /// All-or-nothing: fails with [`Error::Overflow`] and leaves the buffer
    /// unchanged if there is not room for all of them.
    pub fn push_many(&mut self, items: &[T]) -> Result<()> {
        if items.len() > self.remaining() {
            trace_event!(
                requested = items.len(),
                remaining = self.remaining(),
                "ring buffer batch push overflow"
            );
            return Err(Error::Overflow);
        }

        let first = items.len().min(self.slots.len() - self.head);
        let (front, back) = items.split_at(first);
        for (slot, item) in self.slots[self.head..self.head + first]
            .iter_mut()
            .zip(front)
        {
            slot.write(*item);
        }
        for (slot, item) in self.slots[..back.len()].iter_mut().zip(back) {
            slot.write(*item);
        }

        self.head = self.wrap(self.head + items.len());
        Ok(())
    }

    /// Copies the `out.len()` oldest items into `out` without removing them.
    ///
    /// Fails with [`Error::Underflow`], leaving `out` untouched, if fewer
    /// items are queued.
    pub fn peek_many(&self, out: &mut [T]) -> Result<()> {
        if out.len() > self.len() {
            return Err(Error::Underflow);
        }

        for (dst, src) in out.iter_mut().zip(self.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    /// Removes the `out.len()` oldest items into `out`.
    ///
    /// All-or-nothing: fails with [`Error::Underflow`] and leaves both the
    /// buffer and `out` unchanged if fewer items are queued.
    pub fn pop_many(&mut self, out: &mut [T]) -> Result<()> {
        self.peek_many(out)?;
        self.tail = self.wrap(self.tail + out.len());
        Ok(())
    }
}

impl<T> Drop for RingBuffer<'_, T> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<T>() {
            self.clear();
        }
    }
}

impl<T: Debug> Debug for RingBuffer<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the items of a [`RingBuffer`], oldest first.
pub struct Iter<'a, T> {
    slots: &'a [MaybeUninit<T>],
    index: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        // SAFETY: The iterator only walks the `remaining` slots starting at
        // the buffer's tail, all of which are initialized, and the shared
        // borrow of the buffer keeps them that way.
        let item = unsafe { self.slots[self.index].assume_init_ref() };
        self.index += 1;
        if self.index == self.slots.len() {
            self.index = 0;
        }
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Owned storage for a [`RingBuffer`] of `N` slots (`N - 1` items).
///
/// ```rust
/// use fixed_containers::RingStorage;
///
/// let mut storage = RingStorage::<u32, 8>::new();
/// let mut ring = storage.ring();
/// ring.push(5).unwrap();
/// assert_eq!(ring.capacity(), 7);
/// ```
pub struct RingStorage<T, const N: usize> {
    slots: [MaybeUninit<T>; N],
}

impl<T, const N: usize> RingStorage<T, N> {
    /// Creates uninitialized storage.
    pub const fn new() -> Self {
        Self {
            slots: [const { MaybeUninit::uninit() }; N],
        }
    }

    /// Returns an empty ring buffer borrowing this storage.
    pub fn ring(&mut self) -> RingBuffer<'_, T> {
        RingBuffer::new(&mut self.slots)
    }
}

impl<T, const N: usize> Default for RingStorage<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
