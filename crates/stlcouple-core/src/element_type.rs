//! Canonical element types and host scalar kinds.
//!
//! A container descriptor names its element types with foreign spellings
//! (`unsigned int`, `std::string`, `long long`). Host values only know a handful
//! of scalar kinds. This module holds both vocabularies and the single table
//! that maps between them.

use std::fmt;
use std::sync::Arc;

use crate::TypeHash;

/// Foreign scalar element types a container can be instantiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    String,
}

impl ScalarType {
    /// Every scalar type, in declaration order.
    pub const ALL: [ScalarType; 15] = [
        ScalarType::Bool,
        ScalarType::Char,
        ScalarType::SChar,
        ScalarType::UChar,
        ScalarType::Short,
        ScalarType::UShort,
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Long,
        ScalarType::ULong,
        ScalarType::LongLong,
        ScalarType::ULongLong,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::String,
    ];

    /// Canonical foreign spelling.
    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Char => "char",
            ScalarType::SChar => "signed char",
            ScalarType::UChar => "unsigned char",
            ScalarType::Short => "short",
            ScalarType::UShort => "unsigned short",
            ScalarType::Int => "int",
            ScalarType::UInt => "unsigned int",
            ScalarType::Long => "long",
            ScalarType::ULong => "unsigned long",
            ScalarType::LongLong => "long long",
            ScalarType::ULongLong => "unsigned long long",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::String => "std::string",
        }
    }

    /// Get the TypeHash for this scalar type.
    pub fn type_hash(self) -> TypeHash {
        TypeHash::from_name(self.name())
    }

    /// Whether values of this type are stored as signed integers.
    pub const fn is_signed_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Short | ScalarType::Int | ScalarType::Long | ScalarType::LongLong
        )
    }

    /// Whether values of this type are stored as unsigned integers.
    pub const fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            ScalarType::UShort | ScalarType::UInt | ScalarType::ULong | ScalarType::ULongLong
        )
    }

    pub const fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, ScalarType::Float | ScalarType::Double)
    }

    pub const fn is_character(self) -> bool {
        matches!(self, ScalarType::Char | ScalarType::SChar | ScalarType::UChar)
    }

    /// Inclusive value range for integer types, as `i128` so unsigned 64-bit fits.
    pub const fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            ScalarType::Short => Some((i16::MIN as i128, i16::MAX as i128)),
            ScalarType::UShort => Some((0, u16::MAX as i128)),
            ScalarType::Int => Some((i32::MIN as i128, i32::MAX as i128)),
            ScalarType::UInt => Some((0, u32::MAX as i128)),
            ScalarType::Long | ScalarType::LongLong => Some((i64::MIN as i128, i64::MAX as i128)),
            ScalarType::ULong | ScalarType::ULongLong => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// Look up a foreign spelling, including fixed-width and qualified aliases.
    pub fn from_foreign_name(name: &str) -> Option<ScalarType> {
        let name = name.trim();
        FOREIGN_SPELLINGS
            .iter()
            .find(|(spelling, _)| *spelling == name)
            .map(|(_, scalar)| *scalar)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Foreign spellings accepted for each scalar type.
const FOREIGN_SPELLINGS: &[(&str, ScalarType)] = &[
    ("bool", ScalarType::Bool),
    ("char", ScalarType::Char),
    ("signed char", ScalarType::SChar),
    ("unsigned char", ScalarType::UChar),
    ("short", ScalarType::Short),
    ("short int", ScalarType::Short),
    ("int16_t", ScalarType::Short),
    ("unsigned short", ScalarType::UShort),
    ("unsigned short int", ScalarType::UShort),
    ("uint16_t", ScalarType::UShort),
    ("int", ScalarType::Int),
    ("signed int", ScalarType::Int),
    ("int32_t", ScalarType::Int),
    ("unsigned", ScalarType::UInt),
    ("unsigned int", ScalarType::UInt),
    ("uint32_t", ScalarType::UInt),
    ("long", ScalarType::Long),
    ("long int", ScalarType::Long),
    ("int64_t", ScalarType::Long),
    ("unsigned long", ScalarType::ULong),
    ("unsigned long int", ScalarType::ULong),
    ("uint64_t", ScalarType::ULong),
    ("size_t", ScalarType::ULong),
    ("std::size_t", ScalarType::ULong),
    ("long long", ScalarType::LongLong),
    ("long long int", ScalarType::LongLong),
    ("unsigned long long", ScalarType::ULongLong),
    ("unsigned long long int", ScalarType::ULongLong),
    ("float", ScalarType::Float),
    ("double", ScalarType::Double),
    ("std::string", ScalarType::String),
    ("string", ScalarType::String),
    ("std::basic_string<char>", ScalarType::String),
];

/// Scalar kinds a host value can have, plus the collection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostType {
    None,
    Bool,
    Int,
    Float,
    Str,
    Complex,
    Sequence,
    Set,
    Mapping,
    Tuple,
    Foreign,
}

impl HostType {
    /// Host types that can appear as container elements and carry a weight row.
    pub const SCALARS: [HostType; 6] = [
        HostType::Bool,
        HostType::Int,
        HostType::Float,
        HostType::Str,
        HostType::Complex,
        HostType::Foreign,
    ];

    /// The foreign scalar type that a host value of this kind maps onto exactly.
    pub const fn canonical(self) -> Option<ScalarType> {
        match self {
            HostType::Bool => Some(ScalarType::Bool),
            HostType::Int => Some(ScalarType::Long),
            HostType::Float => Some(ScalarType::Double),
            HostType::Str => Some(ScalarType::String),
            HostType::None
            | HostType::Complex
            | HostType::Sequence
            | HostType::Set
            | HostType::Mapping
            | HostType::Tuple
            | HostType::Foreign => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HostType::None => "None",
            HostType::Bool => "bool",
            HostType::Int => "int",
            HostType::Float => "float",
            HostType::Str => "str",
            HostType::Complex => "complex",
            HostType::Sequence => "list",
            HostType::Set => "set",
            HostType::Mapping => "dict",
            HostType::Tuple => "tuple",
            HostType::Foreign => "foreign instance",
        }
    }

    /// Parse a host-language type name (`int`, `float`, `str`, ...).
    pub fn from_host_name(name: &str) -> Option<HostType> {
        match name.trim() {
            "bool" => Some(HostType::Bool),
            "int" => Some(HostType::Int),
            "float" => Some(HostType::Float),
            "str" => Some(HostType::Str),
            "complex" => Some(HostType::Complex),
            _ => None,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A canonical container element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementType {
    /// A foreign scalar.
    Scalar(ScalarType),
    /// Any other foreign type, by its display name (another container, a class).
    Named(Arc<str>),
    /// Could not be determined; handled generically.
    Unknown,
}

impl ElementType {
    /// Canonicalize a foreign type name.
    ///
    /// Foreign spellings go through the scalar alias table. Anything else
    /// passes through unchanged as [`ElementType::Named`].
    pub fn canonicalize(name: &str) -> ElementType {
        let name = name.trim();
        if name.is_empty() {
            return ElementType::Unknown;
        }
        match ScalarType::from_foreign_name(name) {
            Some(scalar) => ElementType::Scalar(scalar),
            None => ElementType::Named(Arc::from(name)),
        }
    }

    /// The element type a host scalar kind maps onto, if any.
    pub fn from_host(host: HostType) -> ElementType {
        match host.canonical() {
            Some(scalar) => ElementType::Scalar(scalar),
            None => ElementType::Unknown,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ElementType::Scalar(scalar) => scalar.name(),
            ElementType::Named(name) => name,
            ElementType::Unknown => "?",
        }
    }

    pub fn type_hash(&self) -> TypeHash {
        match self {
            ElementType::Scalar(scalar) => scalar.type_hash(),
            ElementType::Named(name) => TypeHash::from_name(name),
            ElementType::Unknown => TypeHash::EMPTY,
        }
    }

    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            ElementType::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ElementType::Unknown)
    }
}

impl From<ScalarType> for ElementType {
    fn from(scalar: ScalarType) -> Self {
        ElementType::Scalar(scalar)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_is_total_over_host_scalars() {
        for host in HostType::SCALARS {
            match host {
                HostType::Complex | HostType::Foreign => assert!(host.canonical().is_none()),
                _ => assert!(host.canonical().is_some(), "{host} has no canonical type"),
            }
        }
    }

    #[test]
    fn every_scalar_name_round_trips() {
        for scalar in ScalarType::ALL {
            assert_eq!(ScalarType::from_foreign_name(scalar.name()), Some(scalar));
        }
    }

    #[test]
    fn foreign_aliases_collapse() {
        assert_eq!(ElementType::canonicalize("int32_t"), ElementType::Scalar(ScalarType::Int));
        assert_eq!(
            ElementType::canonicalize(" unsigned long long int "),
            ElementType::Scalar(ScalarType::ULongLong)
        );
        assert_eq!(ElementType::from_host(HostType::Float), ElementType::Scalar(ScalarType::Double));
        assert_eq!(ElementType::canonicalize("std::string"), ElementType::Scalar(ScalarType::String));
    }

    #[test]
    fn unmapped_names_pass_through() {
        assert_eq!(
            ElementType::canonicalize("Point"),
            ElementType::Named(Arc::from("Point"))
        );
        assert_eq!(ElementType::canonicalize("  "), ElementType::Unknown);
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(ScalarType::UShort.integer_range(), Some((0, 65535)));
        assert_eq!(ScalarType::Double.integer_range(), None);
        assert!(ScalarType::ULongLong.is_unsigned_integer());
        assert!(!ScalarType::Char.is_integer());
    }
}
