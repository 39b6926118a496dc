//! Built-in single-value conversions.
//!
//! [`BuiltinScalars`] is the default [`ScalarConversions`] collaborator. Its
//! ranking follows the usual numeric conversion ladder:
//!
//! | Host → foreign | Weight |
//! |---|---|
//! | canonical match (`int`→`long`, `float`→`double`, `str`→`std::string`, `bool`→`bool`) | exact |
//! | same family, other width (`int`→`short`, `float`→`float`, `str`→`char`) | epsilon |
//! | widening across families (`int`→`long long`, `int`→`double`, `bool`→integer) | promotion |
//! | anything into an unknown element type | user-defined |
//! | everything else | impossible |
//!
//! Conversions into fixed-width integers are range checked.

use std::sync::Arc;

use ordered_float::OrderedFloat;

use stlcouple_core::{
    ConversionWeight, ElementType, ForeignHeap, ForeignValue, HostType, HostValue, ScalarConversionError,
    ScalarType,
};
use stlcouple_registry::ScalarConversions;

/// Default scalar conversion rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinScalars;

impl BuiltinScalars {
    pub fn new() -> Self {
        Self
    }

    /// Shared instance, ready to hand to a coupler.
    pub fn shared() -> Arc<dyn ScalarConversions> {
        Arc::new(Self)
    }
}

impl ScalarConversions for BuiltinScalars {
    fn weigh(&self, source: HostType, target: &ElementType) -> ConversionWeight {
        match target {
            ElementType::Scalar(scalar) => weigh_scalar(source, *scalar),
            ElementType::Named(_) => match source {
                HostType::Foreign => ConversionWeight::ZERO,
                _ => ConversionWeight::INFINITE,
            },
            ElementType::Unknown => match source {
                HostType::Bool | HostType::Int | HostType::Float | HostType::Str | HostType::Foreign => {
                    ConversionWeight::USER_DEFINED
                }
                _ => ConversionWeight::INFINITE,
            },
        }
    }

    fn to_foreign(
        &self,
        value: &HostValue,
        target: &ElementType,
        heap: &ForeignHeap,
    ) -> Result<ForeignValue, ScalarConversionError> {
        match target {
            ElementType::Scalar(scalar) => scalar_to_foreign(value, *scalar),
            ElementType::Named(name) => match value {
                HostValue::None => Ok(ForeignValue::Null),
                HostValue::Foreign(handle) => {
                    let instance = heap
                        .get(*handle)
                        .ok_or(ScalarConversionError::StaleInstance { index: handle.index })?;
                    if *instance.type_name == **name {
                        Ok(ForeignValue::Instance(*handle))
                    } else {
                        Err(mismatch(name, &instance.type_name))
                    }
                }
                other => Err(mismatch(name, other.host_type().name())),
            },
            ElementType::Unknown => match value {
                HostValue::None => Ok(ForeignValue::Null),
                HostValue::Bool(b) => Ok(ForeignValue::Bool(*b)),
                HostValue::Int(i) => Ok(ForeignValue::Int(*i)),
                HostValue::Float(f) => Ok(ForeignValue::Float(*f)),
                HostValue::Str(s) => Ok(ForeignValue::Str(s.clone())),
                HostValue::Foreign(handle) => Ok(ForeignValue::Instance(*handle)),
                other => Err(mismatch("scalar", other.host_type().name())),
            },
        }
    }

    fn to_host(&self, value: &ForeignValue, _source: &ElementType) -> Result<HostValue, ScalarConversionError> {
        foreign_to_host(value)
    }
}

fn weigh_scalar(source: HostType, target: ScalarType) -> ConversionWeight {
    if source.canonical() == Some(target) {
        return ConversionWeight::ZERO;
    }
    match source {
        HostType::Bool if target.is_integer() || target.is_floating() => ConversionWeight::PROMOTION,
        HostType::Int => match target {
            ScalarType::LongLong | ScalarType::ULongLong => ConversionWeight::PROMOTION,
            t if t.is_integer() => ConversionWeight::EPSILON,
            t if t.is_floating() => ConversionWeight::PROMOTION,
            _ => ConversionWeight::INFINITE,
        },
        HostType::Float if target == ScalarType::Float => ConversionWeight::EPSILON,
        HostType::Str if target.is_character() => ConversionWeight::EPSILON,
        _ => ConversionWeight::INFINITE,
    }
}

pub(crate) fn foreign_to_host(value: &ForeignValue) -> Result<HostValue, ScalarConversionError> {
    Ok(match value {
        ForeignValue::Null => HostValue::None,
        ForeignValue::Bool(b) => HostValue::Bool(*b),
        ForeignValue::Int(i) => HostValue::Int(*i),
        ForeignValue::UInt(u) => HostValue::Int(i64::try_from(*u).map_err(|_| {
            ScalarConversionError::IntegerOverflow {
                value: i128::from(*u),
                target_type: "int",
            }
        })?),
        ForeignValue::Char(c) => HostValue::Str(Arc::from(char::from(*c).to_string())),
        ForeignValue::Float(f) => HostValue::Float(*f),
        ForeignValue::Str(s) => HostValue::Str(s.clone()),
        ForeignValue::Instance(handle) => HostValue::Foreign(*handle),
    })
}

pub(crate) fn scalar_to_foreign(value: &HostValue, target: ScalarType) -> Result<ForeignValue, ScalarConversionError> {
    match (value, target) {
        (HostValue::Bool(b), ScalarType::Bool) => Ok(ForeignValue::Bool(*b)),
        (HostValue::Bool(b), t) if t.is_integer() => integer_to_foreign(i128::from(*b), t),
        (HostValue::Bool(b), t) if t.is_floating() => Ok(ForeignValue::Float(OrderedFloat(f64::from(u8::from(*b))))),
        (HostValue::Int(i), t) if t.is_integer() => integer_to_foreign(i128::from(*i), t),
        (HostValue::Int(i), t) if t.is_floating() => float_to_foreign(*i as f64, t),
        (HostValue::Float(f), t) if t.is_floating() => float_to_foreign(f.0, t),
        (HostValue::Str(s), ScalarType::String) => Ok(ForeignValue::Str(s.clone())),
        (HostValue::Str(s), t) if t.is_character() => match s.as_bytes() {
            [byte] => Ok(ForeignValue::Char(*byte)),
            bytes => Err(ScalarConversionError::CharLength { length: bytes.len() }),
        },
        (other, t) => Err(mismatch(t.name(), other.host_type().name())),
    }
}

fn integer_to_foreign(value: i128, target: ScalarType) -> Result<ForeignValue, ScalarConversionError> {
    let overflow = || ScalarConversionError::IntegerOverflow {
        value,
        target_type: target.name(),
    };
    let (min, max) = target.integer_range().ok_or_else(overflow)?;
    if value < min || value > max {
        return Err(overflow());
    }
    if target.is_unsigned_integer() {
        u64::try_from(value).map(ForeignValue::UInt).map_err(|_| overflow())
    } else {
        i64::try_from(value).map(ForeignValue::Int).map_err(|_| overflow())
    }
}

fn float_to_foreign(value: f64, target: ScalarType) -> Result<ForeignValue, ScalarConversionError> {
    if target == ScalarType::Float {
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            return Err(ScalarConversionError::FloatConversion {
                value,
                target_type: target.name(),
            });
        }
        return Ok(ForeignValue::Float(OrderedFloat(f64::from(value as f32))));
    }
    Ok(ForeignValue::Float(OrderedFloat(value)))
}

fn mismatch(expected: &str, actual: &str) -> ScalarConversionError {
    ScalarConversionError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
