use thiserror::Error;

/// Errors returned by every container in this crate.
///
/// The taxonomy is closed: each operation documents which of these it can
/// produce. Success is `Ok(..)`. With the exception of [`Error::Unknown`], a
/// failed operation leaves the container exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// The operation needs an element or entry that is not present.
    ///
    /// Returned by pops on an empty ring buffer, searches and deletes of
    /// absent keys, and iteration past the last occupied slot.
    #[error("no such element")]
    Underflow,

    /// The operation needs capacity that is not available.
    #[error("container is full")]
    Overflow,

    /// A hash table insert found the key already present.
    #[error("key already present")]
    DuplicateKey,

    /// A supplied auxiliary structure does not satisfy the preconditions
    /// required at construction, or a cursor does not address a live slot.
    #[error("supplied structure does not match expectations")]
    BadStructure,

    /// A required backing buffer was not supplied (it has zero length).
    #[error("required buffer is missing")]
    NullPointer,

    /// An internal invariant was violated, e.g. a slot was freed twice.
    ///
    /// This indicates corruption. Callers should treat it as fatal; the
    /// container's state is not guaranteed to be consistent afterwards.
    #[error("internal invariant violated")]
    Unknown,
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
