//! Primitive element types storable in the collections.
//!
//! Every scalar type reserves one value as its *null* sentinel, which the
//! collections use to mark absence (an unwritten slot, a missing map entry).
//! The null value can never be stored, so the usable domain of each type is
//! one value smaller than its raw range. Fixed multi-maps reserve one more
//! value, the *list terminator*.

use std::fmt;
use std::hash::Hash;

use crate::value::SizedValue;

/// A fixed-width primitive stored unboxed in the collections.
pub trait Scalar: Copy + PartialEq + Eq + Hash + Ord + fmt::Debug + SizedValue {
    /// The reserved value denoting "absent".
    const NULL: Self;

    /// The reserved value ending a value list in a fixed multi-map. It is
    /// distinct from [`NULL`](Scalar::NULL).
    const TERMINATOR: Self;

    /// Returns `true` if the value is the null sentinel.
    #[inline]
    fn is_null(self) -> bool {
        self == Self::NULL
    }
}

macro_rules! impl_scalar {
    ($ty:ty, $null:expr, $terminator:expr) => {
        impl Scalar for $ty {
            const NULL: Self = $null;
            const TERMINATOR: Self = $terminator;
        }
    };
}

impl_scalar!(i8, i8::MIN, i8::MAX);
impl_scalar!(i16, i16::MIN, i16::MAX);
impl_scalar!(i32, i32::MIN, i32::MAX);
impl_scalar!(i64, i64::MIN, i64::MAX);
impl_scalar!(u16, 0, u16::MAX);
impl_scalar!(char, '\0', char::MAX);

/// Panics if `value` is the null sentinel of its type.
#[inline]
pub(crate) fn assert_not_null<T: Scalar>(value: T) {
    if value.is_null() {
        null_stored();
    }
}

#[cold]
#[inline(never)]
pub(crate) fn null_stored() -> ! {
    panic!("null value cannot be stored")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_terminator_are_distinct() {
        fn check<T: Scalar>() {
            assert_ne!(T::NULL, T::TERMINATOR);
            assert!(T::NULL.is_null());
            assert!(!T::TERMINATOR.is_null());
        }

        check::<i8>();
        check::<i16>();
        check::<i32>();
        check::<i64>();
        check::<u16>();
        check::<char>();
    }

    #[test]
    #[should_panic(expected = "null value cannot be stored")]
    fn null_is_rejected() {
        assert_not_null(i32::MIN);
    }
}
