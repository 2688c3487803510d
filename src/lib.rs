#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(any(test, feature = "stats"))]
extern crate alloc;

#[cfg(all(test, not(feature = "std")))]
extern crate std;

#[macro_use]
mod trace;

/// The error type shared by every container.
pub mod error;

/// Hash and equality strategies for [`HashTable`] keys.
///
/// This module provides the [`KeyHasher`] trait along with courtesy
/// strategies for unsigned integers and strings, and an adapter for any
/// [`core::hash::BuildHasher`].
pub mod hasher;

pub mod hash_table;

/// A fixed-capacity FIFO queue over caller-supplied storage.
pub mod ring_buffer;

pub mod slot_collection;

pub use error::Error;
pub use error::Result;
pub use hash_table::BucketStatus;
#[cfg(feature = "stats")]
pub use hash_table::DebugStats;
pub use hash_table::HashSet;
pub use hash_table::HashTable;
pub use hash_table::SetStorage;
pub use hash_table::TableStorage;
pub use hasher::BuildHasherKeys;
pub use hasher::FnKeys;
pub use hasher::KeyHasher;
pub use hasher::StrKeys;
pub use hasher::UnsignedKeys;
pub use ring_buffer::RingBuffer;
pub use ring_buffer::RingStorage;
pub use slot_collection::Cursor;
pub use slot_collection::SlotCollection;
