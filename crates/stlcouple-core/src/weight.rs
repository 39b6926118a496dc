//! Conversion weights for ranking candidate conversions.
//!
//! A [`ConversionWeight`] counts how far a conversion is from an exact match
//! along four independent axes. Weights add component-wise, so the weight of a
//! container conversion is built from the weights of its element conversions,
//! and compare lexicographically with the most significant axis first. Lower
//! is better.
//!
//! Significance, from most to least:
//!
//! 1. `user_defined`: conversions that go through a registered, non-builtin path
//! 2. `upcast`: derived-to-base steps for named types
//! 3. `promotion`: widening between numeric families, and container selection
//! 4. `epsilon`: representation changes within the same family
//!
//! # Example
//!
//! ```
//! use stlcouple_core::ConversionWeight;
//!
//! let exact = ConversionWeight::ZERO + ConversionWeight::CONTAINER_PENALTY;
//! let promoted = ConversionWeight::PROMOTION + ConversionWeight::CONTAINER_PENALTY;
//! assert!(exact < promoted);
//! assert!(promoted < ConversionWeight::USER_DEFINED);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Component value used by [`ConversionWeight::INFINITE`].
const SATURATED: u32 = u32::MAX;

/// An ordered, summable conversion cost.
///
/// Written and constructed as `(epsilon, promotion, upcast, user_defined)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConversionWeight {
    pub epsilon: u32,
    pub promotion: u32,
    pub upcast: u32,
    pub user_defined: u32,
}

impl ConversionWeight {
    /// Exact match.
    pub const ZERO: ConversionWeight = ConversionWeight::new(0, 0, 0, 0);

    /// Same-family representation change (`long` to `int`, `double` to `float`).
    pub const EPSILON: ConversionWeight = ConversionWeight::new(1, 0, 0, 0);

    /// Cross-family widening (`int` to `double`, `bool` to `long`).
    pub const PROMOTION: ConversionWeight = ConversionWeight::new(0, 1, 0, 0);

    /// Derived-to-base conversion of a named type.
    pub const UPCAST: ConversionWeight = ConversionWeight::new(0, 0, 1, 0);

    /// One registered, non-builtin conversion step.
    pub const USER_DEFINED: ConversionWeight = ConversionWeight::new(0, 0, 0, 1);

    /// Fixed penalty added once to every whole-container conversion.
    pub const CONTAINER_PENALTY: ConversionWeight = ConversionWeight::new(0, 1, 0, 0);

    /// No conversion exists.
    pub const INFINITE: ConversionWeight =
        ConversionWeight::new(SATURATED, SATURATED, SATURATED, SATURATED);

    pub const fn new(epsilon: u32, promotion: u32, upcast: u32, user_defined: u32) -> Self {
        Self {
            epsilon,
            promotion,
            upcast,
            user_defined,
        }
    }

    /// A conversion chain is possible while it uses at most one user-defined step.
    pub const fn is_possible(&self) -> bool {
        self.user_defined < 2
    }

    pub const fn is_exact(&self) -> bool {
        self.epsilon == 0 && self.promotion == 0 && self.upcast == 0 && self.user_defined == 0
    }

    /// Components as a tuple in construction order.
    pub const fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.epsilon, self.promotion, self.upcast, self.user_defined)
    }

    /// Components in significance order, for comparison.
    const fn significance(&self) -> (u32, u32, u32, u32) {
        (self.user_defined, self.upcast, self.promotion, self.epsilon)
    }
}

impl Ord for ConversionWeight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significance().cmp(&other.significance())
    }
}

impl PartialOrd for ConversionWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for ConversionWeight {
    type Output = ConversionWeight;

    fn add(self, rhs: Self) -> Self::Output {
        ConversionWeight {
            epsilon: self.epsilon.saturating_add(rhs.epsilon),
            promotion: self.promotion.saturating_add(rhs.promotion),
            upcast: self.upcast.saturating_add(rhs.upcast),
            user_defined: self.user_defined.saturating_add(rhs.user_defined),
        }
    }
}

impl AddAssign for ConversionWeight {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for ConversionWeight {
    fn sum<I: Iterator<Item = ConversionWeight>>(iter: I) -> Self {
        iter.fold(ConversionWeight::ZERO, Add::add)
    }
}

impl fmt::Debug for ConversionWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversionWeight{self}")
    }
}

impl fmt::Display for ConversionWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_possible() {
            return write!(f, "(impossible)");
        }
        write!(
            f,
            "({}, {}, {}, {})",
            self.epsilon, self.promotion, self.upcast, self.user_defined
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_defined_dominates_everything() {
        let many_promotions = ConversionWeight::new(9, 9, 9, 0);
        assert!(many_promotions < ConversionWeight::USER_DEFINED);
    }

    #[test]
    fn upcast_outranks_promotion_and_epsilon() {
        assert!(ConversionWeight::new(5, 5, 0, 0) < ConversionWeight::UPCAST);
        assert!(ConversionWeight::PROMOTION < ConversionWeight::UPCAST);
        assert!(ConversionWeight::new(9, 0, 0, 0) < ConversionWeight::PROMOTION);
    }

    #[test]
    fn addition_is_component_wise() {
        let sum = ConversionWeight::new(1, 2, 3, 0) + ConversionWeight::new(1, 0, 0, 1);
        assert_eq!(sum.as_tuple(), (2, 2, 3, 1));
    }

    #[test]
    fn infinite_saturates() {
        let sum = ConversionWeight::INFINITE + ConversionWeight::PROMOTION;
        assert_eq!(sum, ConversionWeight::INFINITE);
        assert!(!sum.is_possible());
        assert!(ConversionWeight::USER_DEFINED.is_possible());
    }

    #[test]
    fn sum_starts_at_zero() {
        let total: ConversionWeight = std::iter::empty().sum();
        assert!(total.is_exact());

        let total: ConversionWeight = [ConversionWeight::PROMOTION, ConversionWeight::EPSILON]
            .into_iter()
            .sum();
        assert_eq!(total.as_tuple(), (1, 1, 0, 0));
    }

    #[test]
    fn display() {
        assert_eq!(ConversionWeight::CONTAINER_PENALTY.to_string(), "(0, 1, 0, 0)");
        assert_eq!(ConversionWeight::INFINITE.to_string(), "(impossible)");
    }
}
