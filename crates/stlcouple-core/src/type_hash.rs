//! Deterministic hash-based identity for foreign types.
//!
//! [`TypeHash`] is a 64-bit hash computed from a canonical type name. Container
//! instantiations combine the hash of their template with the hashes of their
//! element types, so `std::map<int, double>` and `std::map<double, int>` get
//! distinct identities without consulting any registry.
//!
//! # Examples
//!
//! ```
//! use stlcouple_core::TypeHash;
//!
//! let vector = TypeHash::from_name("std::vector");
//! let int = TypeHash::from_name("int");
//! let vector_int = TypeHash::from_template_instance(vector, &[int]);
//! assert_eq!(vector_int, TypeHash::from_template_instance(vector, &[int]));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Separator constant used when folding type arguments.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Argument position mixing constants.
    /// Each position gets its own constant so argument order matters.
    pub const ARG_MARKERS: [u64; 8] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
    ];
}

/// A deterministic 64-bit hash identifying a foreign type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a canonical type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Create a template instance hash from the template hash and argument hashes.
    ///
    /// Argument order matters.
    #[inline]
    pub fn from_template_instance(template: TypeHash, args: &[TypeHash]) -> Self {
        let mut hash = template.0;
        for (i, arg) in args.iter().enumerate() {
            let marker = hash_constants::ARG_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::ARG_MARKERS[0].wrapping_add(i as u64));
            hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ arg.0);
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
    fn name_hash_is_deterministic() {
        assert_eq!(TypeHash::from_name("long"), TypeHash::from_name("long"));
        assert_ne!(TypeHash::from_name("long"), TypeHash::from_name("double"));
    }

    #[test]
    fn template_argument_order_matters() {
        let map = TypeHash::from_name("std::map");
        let int = TypeHash::from_name("int");
        let double = TypeHash::from_name("double");

        let a = TypeHash::from_template_instance(map, &[int, double]);
        let b = TypeHash::from_template_instance(map, &[double, int]);
        assert_ne!(a, b);
    }

    #[test]
    fn template_instance_differs_from_template() {
        let vector = TypeHash::from_name("std::vector");
        let int = TypeHash::from_name("int");
        assert_ne!(vector, TypeHash::from_template_instance(vector, &[int]));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(format!("{}", TypeHash(0xff)), "0x00000000000000ff");
        assert!(TypeHash::EMPTY.is_empty());
    }
}
