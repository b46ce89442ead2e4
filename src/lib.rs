//! Collections of unboxed scalar values, for building indices over large
//! amounts of small data.
//!
//! Available collections:
//!
//! * [`DynamicArray`](crate::DynamicArray), a growable array with read-only
//!   zero-copy [sub-arrays](crate::SubArray)
//! * [`SplitArray`](crate::SplitArray), a logical array sharded into
//!   fixed-size children allocated on first write
//! * [`ScalarMap`](crate::ScalarMap), an open-addressing hash map that can be
//!   frozen into a sorted array
//! * [`FixedMultiMap`](crate::FixedMultiMap) and
//!   [`PackedMultiMap`](crate::PackedMultiMap), write-once maps from a key to
//!   a list of values, stored back-to-back in one shared array
//! * [`PackedArray`](crate::PackedArray), an array of integers stored with a
//!   fixed number of bits each
//!
//! Dual-licensed under MIT and [UNLICENSE](https://unlicense.org/).
//!
//! # Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! scalaria = "0.1"
//! ```
//!
//! Every collection follows the same lifecycle: construct it with
//! [`Settings`](crate::Settings), initialize it (which allocates the first
//! buffers), mutate and query it, optionally compress it and optionally
//! serialize it.
//!
//! ```
//! use scalaria::{DynamicArray, Scalar, Settings, SplitArray};
//!
//! let mut array = DynamicArray::<i64>::new(Settings::new("ids").initial_capacity(8));
//! array.initialize();
//! array.add(42);
//! assert_eq!(array.get(0), 42);
//!
//! let mut sparse = SplitArray::<i32>::new(Settings::new("sparse"), 100);
//! sparse.set(250, 7);
//! assert_eq!(sparse.allocated_children(), 1);
//! assert!(sparse.get(10).is_null());
//! ```
//!
//! # Null values
//!
//! Values are plain scalars, never `Option`s. Each [scalar
//! type](crate::Scalar) reserves one value as its *null*: it is what unwritten
//! slots and missing keys read as, and it can never be stored. A second
//! reserved value, the *terminator*, ends lists in the
//! [`FixedMultiMap`](crate::FixedMultiMap).
//!
//! | Type  | Null       | Terminator  |
//! |-------|------------|-------------|
//! | `i8`, `i16`, `i32`, `i64` | `MIN` | `MAX` |
//! | `u16` | `0`        | `u16::MAX`  |
//! | `char`| `'\0'`     | `char::MAX` |
//!
//! Storing a null value is a contract violation and panics.
//!
//! # Compression
//!
//! [`ScalarCollection::compress`](crate::ScalarCollection::compress) either
//! shrinks the buffers to fit ([`Compression::Resize`](crate::Compression))
//! or converts the collection into its compact immutable form
//! ([`Compression::Freeze`](crate::Compression)). Freezing is one way. A
//! frozen map answers lookups with binary search over its sorted keys, and any
//! mutation of a frozen collection panics.
//!
//! # Serialization
//!
//! Collections do not depend on any serialization framework. The
//! [`Persist`](crate::raw::Persist) trait writes a collection as a sequence of
//! raw buffers to anything implementing
//! [`RawWrite`](crate::raw::RawWrite) and reads it back from anything
//! implementing [`RawRead`](crate::raw::RawRead).
//!
//! ```
//! use scalaria::raw::{Persist, SliceReader};
//! use scalaria::{ScalarMap, Settings};
//!
//! let mut map = ScalarMap::<u16, i32>::new(Settings::new("scores"));
//! map.put(7, 100);
//!
//! let mut bytes = Vec::new();
//! map.write_to(&mut bytes).unwrap();
//!
//! let mut restored = ScalarMap::<u16, i32>::new(Settings::new("scores"));
//! restored.read_from(&mut SliceReader::new(&bytes)).unwrap();
//! assert_eq!(restored, map);
//! ```
//!
//! Keys and values are encoded by the [`Value`](crate::Value) trait, in
//! little-endian byte order:
//!
//! ```no_run
//! # use scalaria::DecodeError;
//! pub trait Value: Sized {
//!     fn to_bytes(&self, buf: &mut Vec<u8>);
//!     fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError>;
//! }
//! ```
//!
//! Malformed input is reported as an I/O error of kind `InvalidData`, never as
//! a panic. For data larger than memory,
//! [`SpillFile`](crate::raw::SpillFile) stores the buffers in a
//! memory-mapped temporary file.
//!
//! # Errors
//!
//! Caller misuse, like reading past the end of an array, mutating a frozen
//! collection or putting a list twice for the same multi-map key, panics.
//!
//! The only recoverable failure is a write exceeding the maximum capacity
//! from the settings. Such methods come in two variants: *checked* (prefixed
//! with `try_`) returning a [`CapacityError`](crate::CapacityError), and
//! *faithful* (like [`DynamicArray::add`](crate::DynamicArray::add)) returning
//! `false` or panicking, as documented.

#![doc(html_root_url = "https://docs.rs/scalaria/0.1.0")]
#![deny(missing_docs)]

pub mod array;
mod collection;
pub mod map;
pub mod multimap;
pub mod packed;
pub mod raw;
mod scalar;
pub mod split;
mod value;

pub use collection::{
    grow_doubling, CapacityError, Compressed, Compression, CompressionState, GrowthPolicy,
    ScalarCollection, Settings, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAXIMUM_CAPACITY,
};
pub use scalar::Scalar;
pub use value::{DecodeError, SizedValue, Value};

pub use array::{DynamicArray, SubArray};
pub use map::{MapKey, OpenTable, ScalarMap, Slot, SortedTable};
pub use multimap::{FixedMultiMap, PackedMultiMap};
pub use packed::{ConfigError, Overflow, PackedArray, PackedError};
pub use split::SplitArray;
