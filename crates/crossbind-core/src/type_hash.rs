//! Deterministic hash-based type identity.
//!
//! Every type that can cross the boundary is identified by a [`TypeHash`]
//! computed from its name. Composite shapes (sequences, mappings, callable
//! signatures) derive their hash from the hashes of their parts, so a
//! descriptor can refer to another one before it is registered.
//!
//! # Examples
//!
//! ```
//! use crossbind_core::TypeHash;
//!
//! let int_hash = TypeHash::from_name("int32");
//! assert_eq!(int_hash, TypeHash::from_name("int32"));
//!
//! let list_of_int = TypeHash::from_sequence(int_hash);
//! assert_ne!(list_of_int, int_hash);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
///
/// Keep types, functions and composite shapes apart even when they share a
/// name.
pub mod hash_constants {
    /// Separator constant used when folding component hashes.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for named type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for function and overload hashes.
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for sequence shapes.
    pub const SEQUENCE: u64 = 0x7d3c8b4a92e15f6d;

    /// Domain marker for mapping shapes.
    pub const MAPPING: u64 = 0x3e9f5d2a8c7b1403;

    /// Domain marker for callable shapes.
    pub const CALLABLE: u64 = 0x9a7f3d5e2b8c4601;

    /// Parameter position mixing constants.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a type or a function signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a function hash from its name and parameter type hashes.
    ///
    /// Parameter order matters: `(int32, string)` and `(string, int32)` hash
    /// differently.
    #[inline]
    pub fn from_function(name: &str, param_hashes: &[TypeHash]) -> Self {
        let seed = hash_constants::FUNCTION ^ xxh64(name.as_bytes(), 0);
        Self::fold(seed, param_hashes)
    }

    /// Hash of a homogeneous sequence of `element`.
    #[inline]
    pub fn from_sequence(element: TypeHash) -> Self {
        Self::fold(hash_constants::SEQUENCE, &[element])
    }

    /// Hash of a mapping from `key` to `value`.
    #[inline]
    pub fn from_mapping(key: TypeHash, value: TypeHash) -> Self {
        Self::fold(hash_constants::MAPPING, &[key, value])
    }

    /// Hash of a callable shape with the given parameters and return type.
    #[inline]
    pub fn from_callable(params: &[TypeHash], ret: TypeHash) -> Self {
        Self::fold(hash_constants::CALLABLE ^ ret.0, params)
    }

    fn fold(seed: u64, parts: &[TypeHash]) -> Self {
        let mut hash = seed;
        for (i, part) in parts.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            // wrapping_mul keeps the fold order-sensitive
            hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ part.0);
        }
        TypeHash(hash)
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_hash_determinism() {
        assert_eq!(TypeHash::from_name("int32"), TypeHash::from_name("int32"));
        assert_eq!(TypeHash::from_name("Widget"), TypeHash::from_name("Widget"));
    }

    #[test]
    fn type_hash_uniqueness() {
        let int_hash = TypeHash::from_name("int32");
        let float_hash = TypeHash::from_name("double");
        let text_hash = TypeHash::from_name("string");
        assert_ne!(int_hash, float_hash);
        assert_ne!(int_hash, text_hash);
        assert_ne!(float_hash, text_hash);
    }

    #[test]
    fn function_hash_param_order_matters() {
        let a = TypeHash::from_name("int32");
        let b = TypeHash::from_name("string");
        assert_ne!(
            TypeHash::from_function("f", &[a, b]),
            TypeHash::from_function("f", &[b, a])
        );
    }

    #[test]
    fn function_hash_differs_from_type_hash() {
        assert_ne!(TypeHash::from_function("Widget", &[]), TypeHash::from_name("Widget"));
    }

    #[test]
    fn composite_hashes_are_distinct() {
        let a = TypeHash::from_name("int32");
        let b = TypeHash::from_name("string");
        assert_ne!(TypeHash::from_sequence(a), TypeHash::from_sequence(b));
        assert_ne!(TypeHash::from_mapping(a, b), TypeHash::from_mapping(b, a));
        assert_ne!(TypeHash::from_callable(&[a], b), TypeHash::from_callable(&[b], a));
        assert_ne!(TypeHash::from_sequence(a), TypeHash::from_callable(&[a], TypeHash::EMPTY));
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(!TypeHash::from_name("int32").is_empty());
    }

    #[test]
    fn debug_format_is_hex() {
        let s = format!("{:?}", TypeHash(0xff));
        assert_eq!(s, "TypeHash(0x00000000000000ff)");
    }
}
