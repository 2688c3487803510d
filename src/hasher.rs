use core::cmp::Ordering;
use core::ffi::CStr;
use core::hash::BuildHasher;
use core::hash::Hash;

/// Hash and equality strategy for the keys of a [`HashTable`].
///
/// The strategy is fixed when the table is built and must behave the same
/// for the whole life of the table: if `keys_equal(a, b)` then
/// `hash_key(a) == hash_key(b)`.
///
/// Implementations are resolved statically, so a table built with a
/// zero-sized strategy such as [`UnsignedKeys`] carries no per-call
/// indirection.
///
/// [`HashTable`]: crate::HashTable
pub trait KeyHasher<K: ?Sized> {
    /// Returns the hash of `key`. Only the value modulo the table capacity
    /// is used to pick a home bucket.
    fn hash_key(&self, key: &K) -> u64;

    /// Returns `true` if `a` and `b` are the same key.
    fn keys_equal(&self, a: &K, b: &K) -> bool;
}

impl<K: ?Sized, T: KeyHasher<K> + ?Sized> KeyHasher<K> for &T {
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        (**self).hash_key(key)
    }

    #[inline]
    fn keys_equal(&self, a: &K, b: &K) -> bool {
        (**self).keys_equal(a, b)
    }
}

/// Identity hash for a `u32` key.
#[inline]
pub const fn u32_hash(key: u32) -> u32 {
    key
}

/// Numeric comparison of two `u32` keys.
#[inline]
pub fn u32_cmp(a: u32, b: u32) -> Ordering {
    a.cmp(&b)
}

/// Truncates `bytes` at its first NUL byte, if any.
#[inline]
fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

/// sdbm string hash over the bytes of `bytes` up to the first NUL.
///
/// Computes `h = c + (h << 6) + (h << 16) - h` for each byte with wrapping
/// `u32` arithmetic, starting from zero. Each byte is read as a signed
/// `i8`, so bytes at or above `0x80` contribute a negative `c`.
pub fn str_hash(bytes: &[u8]) -> u32 {
    until_nul(bytes).iter().fold(0u32, |hash, &c| {
        (c as i8 as u32)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}

/// Lexicographic byte comparison of two strings, each ending at its first
/// NUL byte (or at the end of the slice).
pub fn str_cmp(a: &[u8], b: &[u8]) -> Ordering {
    until_nul(a).cmp(until_nul(b))
}

/// Courtesy strategy for unsigned integer keys: identity hash and numeric
/// equality.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsignedKeys;

macro_rules! impl_unsigned_keys {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyHasher<$ty> for UnsignedKeys {
                #[inline]
                fn hash_key(&self, key: &$ty) -> u64 {
                    *key as u64
                }

                #[inline]
                fn keys_equal(&self, a: &$ty, b: &$ty) -> bool {
                    a.cmp(b) == Ordering::Equal
                }
            }
        )*
    };
}

impl_unsigned_keys!(u8, u16, u32, u64, usize);

/// Courtesy strategy for string keys: sdbm hash ([`str_hash`]) and
/// lexicographic comparison ([`str_cmp`]).
///
/// Strings are compared as C strings would be, so anything after an embedded
/// NUL byte is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrKeys;

impl<'k> KeyHasher<&'k str> for StrKeys {
    #[inline]
    fn hash_key(&self, key: &&'k str) -> u64 {
        str_hash(key.as_bytes()) as u64
    }

    #[inline]
    fn keys_equal(&self, a: &&'k str, b: &&'k str) -> bool {
        str_cmp(a.as_bytes(), b.as_bytes()) == Ordering::Equal
    }
}

impl<'k> KeyHasher<&'k CStr> for StrKeys {
    #[inline]
    fn hash_key(&self, key: &&'k CStr) -> u64 {
        str_hash(key.to_bytes()) as u64
    }

    #[inline]
    fn keys_equal(&self, a: &&'k CStr, b: &&'k CStr) -> bool {
        str_cmp(a.to_bytes(), b.to_bytes()) == Ordering::Equal
    }
}

/// Strategy built from a pair of plain functions or closures.
///
/// ```rust
/// use fixed_containers::FnKeys;
/// use fixed_containers::KeyHasher;
///
/// let keys = FnKeys::new(|k: &u16| (*k as u64) >> 2, |a: &u16, b: &u16| a == b);
/// assert_eq!(keys.hash_key(&8), 2);
/// assert!(keys.keys_equal(&3, &3));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnKeys<F, G> {
    hash_fn: F,
    eq_fn: G,
}

impl<F, G> FnKeys<F, G> {
    /// Wraps a hash function and an equality function.
    pub const fn new(hash_fn: F, eq_fn: G) -> Self {
        Self { hash_fn, eq_fn }
    }
}

impl<K: ?Sized, F, G> KeyHasher<K> for FnKeys<F, G>
where
    F: Fn(&K) -> u64,
    G: Fn(&K, &K) -> bool,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        (self.hash_fn)(key)
    }

    #[inline]
    fn keys_equal(&self, a: &K, b: &K) -> bool {
        (self.eq_fn)(a, b)
    }
}

/// Adapts any [`BuildHasher`] to [`KeyHasher`] for keys that implement
/// `Hash + Eq`.
#[derive(Debug, Default, Clone)]
pub struct BuildHasherKeys<S> {
    hash_builder: S,
}

impl<S> BuildHasherKeys<S> {
    /// Wraps `hash_builder`.
    pub const fn new(hash_builder: S) -> Self {
        Self { hash_builder }
    }

    /// Returns the wrapped hash builder.
    pub fn hash_builder(&self) -> &S {
        &self.hash_builder
    }
}

impl<K, S> KeyHasher<K> for BuildHasherKeys<S>
where
    K: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash_key(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn keys_equal(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hash builder used by [`default_key_hasher`].
        pub type DefaultHashBuilder = foldhash::fast::FixedState;

        /// Seed for the default hash builder. Fixed so that bucket placement is
        /// reproducible on targets without an entropy source.
        const DEFAULT_SEED: u64 = 0x5ae0_c11b_2024_0001;

        /// Returns the default hash builder.
        pub fn default_hash_builder() -> DefaultHashBuilder {
            foldhash::fast::FixedState::with_seed(DEFAULT_SEED)
        }
    } else if #[cfg(feature = "std")] {
        /// The hash builder used by [`default_key_hasher`].
        pub type DefaultHashBuilder = std::hash::RandomState;

        /// Returns the default hash builder.
        pub fn default_hash_builder() -> DefaultHashBuilder {
            std::hash::RandomState::new()
        }
    }
}

/// Returns a [`KeyHasher`] for any `Hash + Eq` key, backed by
/// [`DefaultHashBuilder`].
#[cfg(any(feature = "foldhash", feature = "std"))]
pub fn default_key_hasher() -> BuildHasherKeys<DefaultHashBuilder> {
    BuildHasherKeys::new(default_hash_builder())
}
