//! A growable array of unsigned integers stored with a fixed number of bits
//! each.
//!
//! Values are packed back-to-back into 64-bit words, least significant bits
//! first, so an element may straddle two words. The null value is `0`.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::array::out_of_bounds;
use crate::collection::{
    frozen, CapacityError, Compressed, Compression, CompressionState, ScalarCollection, Settings,
};
use crate::raw::{self, Persist, RawRead, RawWrite};
use crate::value::DecodeError;

const WORD_BITS: usize = 64;

/// What happens when a value does not fit in the bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// The write is refused with [`PackedError::Overflow`](self::PackedError).
    Fail,
    /// The value is clamped to the largest value of the width.
    Saturate,
    /// All elements are repacked with a width large enough for the value.
    Widen,
}

impl Overflow {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Overflow::Fail => 0,
            Overflow::Saturate => 1,
            Overflow::Widen => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Overflow::Fail),
            1 => Ok(Overflow::Saturate),
            2 => Ok(Overflow::Widen),
            tag => Err(DecodeError::Tag {
                what: "overflow policy",
                tag,
            }),
        }
    }
}

/// Invalid configuration of a packed collection, detected at construction.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The bit width is zero or larger than 64.
    #[error("bit width {0} is not between 1 and 64")]
    Width(u32),
    /// The list terminator is the null value.
    #[error("list terminator cannot be the null value")]
    NullTerminator,
    /// The list terminator needs more bits than configured.
    #[error("list terminator {terminator} does not fit in {width} bits")]
    TerminatorWidth {
        /// Configured terminator.
        terminator: u64,
        /// Configured width.
        width: u32,
    },
    /// The list terminator equals the value that overflowing values saturate
    /// to.
    #[error("list terminator {0} collides with saturated values")]
    SaturatedTerminator(u64),
}

/// A refused write to a [`PackedArray`](self::PackedArray).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PackedError {
    /// The array would exceed its maximum capacity.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// The value does not fit and the overflow policy is
    /// [`Overflow::Fail`](self::Overflow).
    #[error("value {value} does not fit in {width} bits")]
    Overflow {
        /// Value being written.
        value: u64,
        /// Current width.
        width: u32,
    },
}

/// Returns the largest value representable with given bit width.
pub fn max_value(width: u32) -> u64 {
    if width as usize >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn bits_needed(value: u64) -> u32 {
    std::cmp::max(64 - value.leading_zeros(), 1)
}

fn words_for(capacity: usize, width: u32) -> usize {
    (capacity * width as usize + WORD_BITS - 1) / WORD_BITS
}

/// A growable array of unsigned integers with a fixed bit width.
///
/// # Examples
///
/// ```
/// use scalaria::{Overflow, PackedArray, Settings};
///
/// let mut array = PackedArray::new(Settings::new("flags"), 3, Overflow::Saturate).unwrap();
///
/// assert!(array.add(5));
/// assert!(array.add(100));
/// assert_eq!(array.get(0), 5);
/// assert_eq!(array.get(1), 7);
/// ```
#[derive(Clone)]
pub struct PackedArray {
    settings: Settings,
    words: Vec<u64>,
    width: u32,
    overflow: Overflow,
    capacity: usize,
    len: usize,
    state: CompressionState,
}

impl PackedArray {
    /// Constructs a new, empty array storing `width` bits per element.
    pub fn new(settings: Settings, width: u32, overflow: Overflow) -> Result<Self, ConfigError> {
        if width == 0 || width as usize > WORD_BITS {
            return Err(ConfigError::Width(width));
        }

        Ok(Self {
            settings,
            words: Vec::new(),
            width,
            overflow,
            capacity: 0,
            len: 0,
            state: CompressionState::Mutable,
        })
    }

    /// Allocates the first buffer, sized to the initial capacity.
    pub fn initialize(&mut self) {
        if self.capacity == 0 {
            self.reallocate(self.settings.initial());
        }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the array contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of elements the array can hold without growing.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current bit width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the overflow policy.
    pub fn overflow(&self) -> Overflow {
        self.overflow
    }

    /// Returns the element at given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn get(&self, index: usize) -> u64 {
        if index >= self.len {
            out_of_bounds();
        }

        self.read(index)
    }

    /// Returns the element at given index, or `0` if the index is out of
    /// bounds.
    pub fn safe_get(&self, index: usize) -> u64 {
        if index < self.len {
            self.read(index)
        } else {
            0
        }
    }

    /// Appends a value. Returns `false` if the write was refused.
    pub fn add(&mut self, value: u64) -> bool {
        self.try_add(value).is_ok()
    }

    /// Appends a value.
    pub fn try_add(&mut self, value: u64) -> Result<(), PackedError> {
        self.try_set(self.len, value)
    }

    /// Writes a value at given index, extending the array if needed.
    ///
    /// # Panics
    ///
    /// Panics if the write is refused. Use [`try_set`](Self::try_set) if this
    /// is unacceptable.
    pub fn set(&mut self, index: usize, value: u64) {
        if let Err(err) = self.try_set(index, value) {
            panic!("{}", err);
        }
    }

    /// Writes a value at given index, extending the array if needed.
    pub fn try_set(&mut self, index: usize, value: u64) -> Result<(), PackedError> {
        if self.state == CompressionState::Frozen {
            frozen();
        }

        let value = self.fit(value)?;
        let required = self.settings.required_for(index)?;

        if index >= self.capacity {
            let capacity = self.settings.plan_growth(self.capacity, required)?;
            self.reallocate(capacity);
        }

        self.write(index, value);
        self.len = std::cmp::max(self.len, required);
        Ok(())
    }

    /// Removes elements past `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        while self.len > len {
            self.len -= 1;
            self.write(self.len, 0);
        }
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len).map(move |index| self.read(index))
    }

    /// Returns the elements as a vector.
    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }

    fn fit(&mut self, value: u64) -> Result<u64, PackedError> {
        let max = max_value(self.width);
        if value <= max {
            return Ok(value);
        }

        match self.overflow {
            Overflow::Fail => {
                tracing::warn!(
                    name = %self.settings.name(),
                    value,
                    width = self.width,
                    "value does not fit"
                );
                Err(PackedError::Overflow {
                    value,
                    width: self.width,
                })
            }
            Overflow::Saturate => Ok(max),
            Overflow::Widen => {
                self.repack(bits_needed(value));
                Ok(value)
            }
        }
    }

    fn repack(&mut self, width: u32) {
        tracing::debug!(name = %self.settings.name(), from = self.width, to = width, "widening");

        let values = self.to_vec();
        self.width = width;
        self.words = vec![0; words_for(self.capacity, width)];
        for (index, value) in values.into_iter().enumerate() {
            self.write(index, value);
        }
    }

    fn reallocate(&mut self, capacity: usize) {
        if capacity != self.capacity {
            tracing::debug!(
                name = %self.settings.name(),
                from = self.capacity,
                to = capacity,
                "reallocating packed array"
            );
        }

        self.words.resize(words_for(capacity, self.width), 0);
        self.capacity = capacity;
    }

    fn read(&self, index: usize) -> u64 {
        let bit = index * self.width as usize;
        let (word, shift) = (bit / WORD_BITS, bit % WORD_BITS);
        let mask = max_value(self.width);

        let mut value = self.words[word] >> shift;
        if shift + self.width as usize > WORD_BITS {
            value |= self.words[word + 1] << (WORD_BITS - shift);
        }

        value & mask
    }

    fn write(&mut self, index: usize, value: u64) {
        let bit = index * self.width as usize;
        let (word, shift) = (bit / WORD_BITS, bit % WORD_BITS);
        let mask = max_value(self.width);

        self.words[word] &= !(mask << shift);
        self.words[word] |= value << shift;

        if shift + self.width as usize > WORD_BITS {
            let spilled = WORD_BITS - shift;
            self.words[word + 1] &= !(mask >> spilled);
            self.words[word + 1] |= value >> spilled;
        }
    }
}

impl ScalarCollection for PackedArray {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn compression_state(&self) -> CompressionState {
        self.state
    }

    fn compress(&mut self, method: Compression) -> Compressed {
        if self.state == CompressionState::Frozen {
            return Compressed::Unchanged;
        }

        let resized = self.capacity != self.len;
        if resized {
            self.reallocate(self.len);
            self.words.shrink_to_fit();
        }

        match method {
            Compression::Resize if resized => Compressed::Resized,
            Compression::Resize => Compressed::Unchanged,
            Compression::Freeze => {
                self.state = CompressionState::Frozen;
                Compressed::Frozen
            }
        }
    }
}

/// Writes the width and overflow policy before the element count and the
/// words.
impl Persist for PackedArray {
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        raw::write_u8(sink, self.width as u8)?;
        raw::write_u8(sink, self.overflow.tag())?;
        raw::write_usize(sink, self.len)?;
        raw::write_sized(sink, &self.words[..words_for(self.len, self.width)])
    }

    fn read_from<R: RawRead>(&mut self, source: &mut R) -> io::Result<()> {
        let width = raw::read_u8(source)? as u32;
        let overflow = Overflow::from_tag(raw::read_u8(source)?)?;
        let len = raw::read_usize(source)?;
        let words = raw::read_sized::<_, u64>(source)?;

        if width == 0 || width as usize > WORD_BITS {
            return Err(DecodeError::Inconsistent("bit width out of range").into());
        }

        if words.len() != words_for(len, width) {
            return Err(DecodeError::Inconsistent("word count does not match length").into());
        }

        self.width = width;
        self.overflow = overflow;
        self.words = words;
        self.len = len;
        self.capacity = len;
        self.state = CompressionState::Mutable;

        // Bits past the last element must be clear for later writes.
        self.truncate_bits();
        Ok(())
    }
}

impl PackedArray {
    fn truncate_bits(&mut self) {
        let used = self.len * self.width as usize;
        if let Some(last) = self.words.last_mut() {
            let rest = used % WORD_BITS;
            if rest != 0 {
                *last &= (1u64 << rest) - 1;
            }
        }
    }
}

/// Arrays are equal if they hold the same elements, regardless of width.
impl PartialEq for PackedArray {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for PackedArray {}

impl fmt::Debug for PackedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedArray")
            .field("name", &self.settings.name())
            .field("width", &self.width)
            .field("values", &self.to_vec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::raw::SliceReader;

    fn new_array(width: u32, overflow: Overflow) -> PackedArray {
        let mut array =
            PackedArray::new(Settings::new("test").initial_capacity(4), width, overflow).unwrap();
        array.initialize();
        array
    }

    #[test]
    fn values_straddle_words() {
        let mut array = new_array(7, Overflow::Fail);
        for value in 0..100 {
            assert!(array.add(value));
        }

        // 7 bits do not divide 64, so some elements span two words.
        for value in 0..100 {
            assert_eq!(array.get(value as usize), value);
        }
        assert!(array.capacity() >= 100);
    }

    #[test]
    fn overwriting_clears_old_bits() {
        let mut array = new_array(5, Overflow::Fail);
        for _ in 0..30 {
            array.add(31);
        }
        array.set(12, 0);
        array.set(13, 10);

        assert_eq!(array.get(11), 31);
        assert_eq!(array.get(12), 0);
        assert_eq!(array.get(13), 10);
        assert_eq!(array.get(14), 31);
    }

    #[test]
    fn full_width() {
        let mut array = new_array(64, Overflow::Fail);
        array.add(u64::MAX);
        array.add(1);
        assert_eq!(array.to_vec(), vec![u64::MAX, 1]);
    }

    #[test]
    fn overflow_policies() {
        let mut fail = new_array(4, Overflow::Fail);
        assert_eq!(
            fail.try_add(16),
            Err(PackedError::Overflow {
                value: 16,
                width: 4
            })
        );
        assert!(fail.is_empty());

        let mut saturate = new_array(4, Overflow::Saturate);
        saturate.add(16);
        assert_eq!(saturate.get(0), 15);

        let mut widen = new_array(4, Overflow::Widen);
        widen.add(3);
        widen.add(1000);
        assert_eq!(widen.width(), 10);
        assert_eq!(widen.to_vec(), vec![3, 1000]);
    }

    #[test]
    fn invalid_width() {
        assert_eq!(
            PackedArray::new(Settings::new("test"), 0, Overflow::Fail).unwrap_err(),
            ConfigError::Width(0)
        );
        assert!(PackedArray::new(Settings::new("test"), 65, Overflow::Fail).is_err());
    }

    #[test]
    fn maximum_capacity() {
        let mut array = PackedArray::new(
            Settings::new("test").maximum_capacity(2),
            8,
            Overflow::Fail,
        )
        .unwrap();

        assert!(array.add(1));
        assert!(array.add(2));
        assert!(!array.add(3));
        assert!(matches!(array.try_add(3), Err(PackedError::Capacity(_))));
    }

    #[test]
    fn set_at_last_index_is_refused() {
        let mut array = new_array(8, Overflow::Fail);
        assert!(matches!(
            array.try_set(usize::MAX, 1),
            Err(PackedError::Capacity(CapacityError {
                requested: usize::MAX,
                ..
            }))
        ));
        assert_eq!(array.len(), 0);
    }

    #[test]
    fn safe_get_and_bounds() {
        let mut array = new_array(3, Overflow::Fail);
        array.set(5, 2);
        assert_eq!(array.len(), 6);
        assert_eq!(array.get(4), 0);
        assert_eq!(array.safe_get(6), 0);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn get_out_of_bounds() {
        let array = new_array(3, Overflow::Fail);
        array.get(0);
    }

    #[test]
    fn compress() {
        let mut array = new_array(9, Overflow::Fail);
        for value in 0..20 {
            array.add(value);
        }

        assert_eq!(array.compress(Compression::Resize), Compressed::Resized);
        assert_eq!(array.capacity(), 20);
        assert_eq!(array.compress(Compression::Resize), Compressed::Unchanged);
        assert_eq!(array.compress(Compression::Freeze), Compressed::Frozen);
        assert_eq!(array.to_vec(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    #[should_panic(expected = "collection is frozen")]
    fn set_after_freeze() {
        let mut array = new_array(9, Overflow::Fail);
        array.add(1);
        array.compress(Compression::Freeze);
        array.add(2);
    }

    #[test]
    fn serialization() {
        let mut array = new_array(13, Overflow::Widen);
        for value in 0..50 {
            array.add(value * 100);
        }

        let mut bytes = Vec::new();
        array.write_to(&mut bytes).unwrap();

        let mut restored = new_array(1, Overflow::Fail);
        restored.read_from(&mut SliceReader::new(&bytes)).unwrap();

        assert_eq!(restored, array);
        assert_eq!(restored.width(), 13);
        assert_eq!(restored.overflow(), Overflow::Widen);

        restored.add(1);
        assert_eq!(restored.get(50), 1);
    }

    proptest! {
        #[test]
        fn random(width in 1u32..=64, values in proptest::collection::vec(any::<u64>(), 1..200)) {
            let mut array = new_array(width, Overflow::Saturate);
            let max = max_value(width);

            for value in values.iter() {
                prop_assert!(array.add(*value));
            }

            let expected = values.iter().map(|value| std::cmp::min(*value, max)).collect::<Vec<_>>();
            prop_assert_eq!(array.to_vec(), expected);
        }
    }
}
