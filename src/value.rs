use std::convert::TryInto;
use std::io;
use std::mem;

use thiserror::Error;

/// A trait that specifies how an element type is serialized and deserialized
/// when a collection crosses the [serialization
/// boundary](crate#serialization).
pub trait Value: Sized {
    /// Serializes self into a vector of bytes `buf`.
    fn to_bytes(&self, buf: &mut Vec<u8>);

    /// Deserializes a value from bytes.
    ///
    /// The bytes usually come from [`Value::to_bytes`](self::Value::to_bytes),
    /// but they might have been read from a corrupted source, so malformed
    /// input is reported instead of trusted.
    fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// A trait that is implemented for types whose byte representation has fixed
/// size.
pub trait SizedValue: Value {
    /// Returns the size of the byte representation for any value of the type.
    ///
    /// The default implementation is using [`std::mem::size_of<T>`] function.
    fn size() -> usize {
        mem::size_of::<Self>()
    }
}

/// An error produced when bytes cannot be decoded back into a collection or
/// its elements.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before the announced amount of bytes.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    Truncated {
        /// Number of bytes that were required.
        needed: usize,
        /// Number of bytes that were left.
        available: usize,
    },
    /// A fixed-size value got a byte slice of a different length.
    #[error("invalid value length: expected {expected} bytes, got {actual}")]
    Length {
        /// Length required by the type.
        expected: usize,
        /// Length of the given slice.
        actual: usize,
    },
    /// A string was not valid UTF-8.
    #[error("invalid utf-8 in string value")]
    Utf8,
    /// A `char` value was not a valid Unicode scalar value.
    #[error("invalid char value {0:#x}")]
    Char(u32),
    /// An enumeration tag had an unknown value.
    #[error("invalid {what} tag {tag}")]
    Tag {
        /// Name of the decoded enumeration.
        what: &'static str,
        /// The unknown tag.
        tag: u8,
    },
    /// The decoded parts do not form a consistent collection.
    #[error("inconsistent data: {0}")]
    Inconsistent(&'static str),
}

impl From<DecodeError> for io::Error {
    fn from(err: DecodeError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

fn exact<const N: usize>(bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::Length {
        expected: N,
        actual: bytes.len(),
    })
}

mod impls {
    use super::*;

    impl Value for String {
        fn to_bytes(&self, buf: &mut Vec<u8>) {
            buf.extend_from_slice(self.as_bytes());
        }

        fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
            String::from_utf8(bytes.to_owned()).map_err(|_| DecodeError::Utf8)
        }
    }

    impl Value for char {
        fn to_bytes(&self, buf: &mut Vec<u8>) {
            buf.extend_from_slice(&(*self as u32).to_le_bytes());
        }

        fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
            let code = u32::from_le_bytes(exact(bytes)?);
            std::char::from_u32(code).ok_or(DecodeError::Char(code))
        }
    }

    impl SizedValue for char {
        fn size() -> usize {
            4
        }
    }

    impl Value for bool {
        fn to_bytes(&self, buf: &mut Vec<u8>) {
            buf.push(*self as u8);
        }

        fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
            match exact::<1>(bytes)?[0] {
                0 => Ok(false),
                1 => Ok(true),
                tag => Err(DecodeError::Tag { what: "bool", tag }),
            }
        }
    }

    impl SizedValue for bool {}

    macro_rules! impl_number {
        ($num_ty:ty) => {
            impl Value for $num_ty {
                fn to_bytes(&self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                    Ok(Self::from_le_bytes(exact(bytes)?))
                }
            }

            impl SizedValue for $num_ty {}
        };
    }

    impl_number!(i8);
    impl_number!(i16);
    impl_number!(i32);
    impl_number!(i64);

    impl_number!(u8);
    impl_number!(u16);
    impl_number!(u32);
    impl_number!(u64);
}
