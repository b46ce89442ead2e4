//! A growable array of one scalar type, with read-only zero-copy views.
//!
//! # Examples
//!
//! See [`DynamicArray`](self::DynamicArray) for examples.

use std::fmt;
use std::io;
use std::slice;

use crate::collection::{
    frozen, CapacityError, Compressed, Compression, CompressionState, ScalarCollection, Settings,
};
use crate::raw::{self, Persist, RawRead, RawWrite};
use crate::scalar::{assert_not_null, Scalar};
use crate::value::DecodeError;

/// A growable array of one [scalar](crate::Scalar) type.
///
/// Elements are appended at the write cursor with [`add`](Self::add), or
/// written at any index with [`set`](Self::set), which extends the array when
/// the index is past its end. Slots that were skipped over read as the
/// [null value](crate::Scalar::NULL) of the type.
///
/// # Examples
///
/// ```
/// use scalaria::{DynamicArray, Scalar, Settings};
///
/// let mut array = DynamicArray::<i32>::new(Settings::new("ids").initial_capacity(4));
/// array.initialize();
///
/// assert!(array.add(10));
/// assert!(array.add(20));
/// array.set(4, 50);
///
/// assert_eq!(array.len(), 5);
/// assert_eq!(array.get(1), 20);
/// assert!(array.get(2).is_null());
/// assert!(array.safe_get(100).is_null());
///
/// let view = array.sub_array(0, 2);
/// assert_eq!(view.to_vec(), vec![10, 20]);
/// ```
#[derive(Clone)]
pub struct DynamicArray<T> {
    settings: Settings,
    // Always as long as the capacity; unwritten slots hold the null value.
    data: Vec<T>,
    offset: usize,
    size: usize,
    cursor: usize,
    sub_array: bool,
    state: CompressionState,
}

impl<T: Scalar> DynamicArray<T> {
    /// Constructs a new, empty array. No buffer is allocated until
    /// [`initialize`](Self::initialize) or the first write.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            data: Vec::new(),
            offset: 0,
            size: 0,
            cursor: 0,
            sub_array: false,
            state: CompressionState::Mutable,
        }
    }

    /// Constructs a new, empty array with given name and default settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Settings::new(name))
    }

    /// Allocates the first buffer, sized to the initial capacity.
    pub fn initialize(&mut self) {
        if self.data.is_empty() {
            self.data = vec![T::NULL; self.settings.initial()];
            tracing::debug!(
                name = %self.settings.name(),
                capacity = self.data.len(),
                "initialized array"
            );
        }
    }

    /// Returns the settings the array was constructed with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the number of elements in the array.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the array contains no elements.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the number of elements the array can hold without growing.
    ///
    /// A read-only sub-array can never grow, so its capacity is its length.
    pub fn capacity(&self) -> usize {
        if self.sub_array {
            self.size
        } else {
            self.data.len()
        }
    }

    /// Returns the index where the next [`add`](Self::add) lands.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns `true` if the array is a read-only view restored from a
    /// serialized [`SubArray`](self::SubArray).
    pub fn is_sub_array(&self) -> bool {
        self.sub_array
    }

    /// Appends a value at the cursor, growing the buffer if needed.
    ///
    /// Returns `false` if the growth was refused because it would exceed the
    /// maximum capacity. In that case, the array is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `value` is the null value, or if the array is frozen or
    /// read-only.
    pub fn add(&mut self, value: T) -> bool {
        self.try_add(value).is_ok()
    }

    /// Appends a value at the cursor, growing the buffer if needed.
    ///
    /// This is [`add`](Self::add) reporting the refusal as an error.
    pub fn try_add(&mut self, value: T) -> Result<(), CapacityError> {
        self.try_set(self.cursor, value)
    }

    /// Appends all values, or none of them if they do not fit.
    ///
    /// Returns `false` if the growth was refused.
    pub fn extend_from_slice(&mut self, values: &[T]) -> bool {
        self.assert_writable();
        values.iter().copied().for_each(assert_not_null);

        if self.ensure_capacity(self.cursor + values.len()).is_err() {
            return false;
        }

        for value in values {
            self.data[self.cursor] = *value;
            self.cursor += 1;
        }
        self.size = self.cursor;
        true
    }

    /// Returns the element at given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`. Use [`safe_get`](Self::safe_get) when the
    /// bounds cannot be guaranteed.
    pub fn get(&self, index: usize) -> T {
        if index >= self.size {
            out_of_bounds();
        }

        self.data[self.offset + index]
    }

    /// Returns the element at given index, or the null value if the index is
    /// out of bounds.
    pub fn safe_get(&self, index: usize) -> T {
        if index < self.size {
            self.data[self.offset + index]
        } else {
            T::NULL
        }
    }

    /// Writes a value at given index, growing the buffer if needed. If the
    /// index is past the end, the length and the cursor advance to
    /// `index + 1` and the skipped slots hold the null value.
    ///
    /// # Panics
    ///
    /// Panics if the growth was refused because it would exceed the maximum
    /// capacity. Use [`try_set`](Self::try_set) if this is unacceptable.
    ///
    /// Also panics if `value` is the null value, or if the array is frozen or
    /// read-only.
    pub fn set(&mut self, index: usize, value: T) {
        if let Err(err) = self.try_set(index, value) {
            panic!("{}", err);
        }
    }

    /// Writes a value at given index, growing the buffer if needed.
    ///
    /// This is [`set`](Self::set) reporting the refusal as an error.
    pub fn try_set(&mut self, index: usize, value: T) -> Result<(), CapacityError> {
        self.assert_writable();
        assert_not_null(value);

        let required = self.settings.required_for(index)?;
        self.ensure_capacity(required)?;
        self.data[index] = value;

        if required > self.size {
            self.size = required;
            self.cursor = self.size;
        }

        Ok(())
    }

    /// Returns a read-only view of `len` elements starting at `start`, sharing
    /// this array's buffer.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn sub_array(&self, start: usize, len: usize) -> SubArray<'_, T> {
        match start.checked_add(len) {
            Some(end) if end <= self.size => {}
            _ => out_of_bounds(),
        }

        SubArray {
            data: &self.data,
            offset: self.offset + start,
            len,
        }
    }

    /// Shrinks the buffer to the length of the array and returns a copy of
    /// the elements.
    pub fn as_array(&mut self) -> Vec<T> {
        self.compress(Compression::Resize);
        self.to_vec()
    }

    /// Returns a copy of the elements.
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Returns the elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data[self.offset..self.offset + self.size]
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.as_slice().iter(),
        }
    }

    /// Removes all elements, keeping the allocated buffer.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Shortens the array to `len` elements. Removed slots hold the null
    /// value again.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.assert_writable();

        if len < self.size {
            for slot in &mut self.data[len..self.size] {
                *slot = T::NULL;
            }
            self.size = len;
            self.cursor = len;
        }
    }

    fn ensure_capacity(&mut self, required: usize) -> Result<(), CapacityError> {
        let current = self.data.len();
        if required <= current {
            return Ok(());
        }

        let required = if current == 0 {
            std::cmp::max(required, self.settings.initial())
        } else {
            required
        };

        let capacity = self.settings.plan_growth(current, required)?;
        self.data.resize(capacity, T::NULL);

        tracing::debug!(
            name = %self.settings.name(),
            from = current,
            to = capacity,
            "grew array"
        );

        Ok(())
    }

    fn assert_writable(&self) {
        if self.sub_array {
            read_only();
        }

        if self.state == CompressionState::Frozen {
            frozen();
        }
    }
}

impl<T: Scalar> ScalarCollection for DynamicArray<T> {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn len(&self) -> usize {
        self.size
    }

    fn capacity(&self) -> usize {
        DynamicArray::capacity(self)
    }

    fn compression_state(&self) -> CompressionState {
        self.state
    }

    /// Resizing shrinks the buffer to exactly the length of the array.
    /// Freezing resizes and then rejects any further mutation. Read-only
    /// sub-arrays are never compressed.
    fn compress(&mut self, method: Compression) -> Compressed {
        if self.sub_array {
            return Compressed::Unchanged;
        }

        let resized = if self.data.len() > self.size {
            tracing::debug!(
                name = %self.settings.name(),
                from = self.data.len(),
                to = self.size,
                "resized array"
            );
            self.data.truncate(self.size);
            self.data.shrink_to_fit();
            true
        } else {
            false
        };

        match method {
            Compression::Freeze if self.state == CompressionState::Mutable => {
                self.state = CompressionState::Frozen;
                tracing::debug!(name = %self.settings.name(), "froze array");
                Compressed::Frozen
            }
            _ if resized => Compressed::Resized,
            _ => Compressed::Unchanged,
        }
    }
}

/// Writes, in order, the sub-array flag, the full backing buffer (including
/// the slack past the length), the offset and the cursor.
impl<T: Scalar> Persist for DynamicArray<T> {
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        write_parts(sink, self.sub_array, &self.data, self.offset, self.cursor)
    }

    fn read_from<R: RawRead>(&mut self, source: &mut R) -> io::Result<()> {
        let sub_array = raw::read_bool(source)?;
        let data = raw::read_sized::<_, T>(source)?;
        let offset = raw::read_usize(source)?;
        let cursor = raw::read_usize(source)?;

        if offset.checked_add(cursor).map_or(true, |end| end > data.len()) {
            return Err(DecodeError::Inconsistent("array range exceeds its buffer").into());
        }

        if !sub_array && offset != 0 {
            return Err(DecodeError::Inconsistent("owned array with an offset").into());
        }

        self.data = data;
        self.offset = offset;
        self.size = cursor;
        self.cursor = cursor;
        self.sub_array = sub_array;
        self.state = CompressionState::Mutable;

        Ok(())
    }
}

fn write_parts<W: RawWrite, T: Scalar>(
    sink: &mut W,
    sub_array: bool,
    data: &[T],
    offset: usize,
    cursor: usize,
) -> io::Result<()> {
    raw::write_bool(sink, sub_array)?;
    raw::write_sized(sink, data)?;
    raw::write_usize(sink, offset)?;
    raw::write_usize(sink, cursor)
}

impl<T: Scalar> PartialEq for DynamicArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Scalar> Eq for DynamicArray<T> {}

impl<'a, T: Scalar> PartialEq<SubArray<'a, T>> for DynamicArray<T> {
    fn eq(&self, other: &SubArray<'a, T>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Scalar> fmt::Debug for DynamicArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicArray")
            .field("name", &self.settings.name())
            .field("values", &self.as_slice())
            .finish()
    }
}

/// A read-only view into a [`DynamicArray`](self::DynamicArray).
///
/// The view shares the buffer of the array it was taken from, so the array
/// must outlive it and cannot be modified while the view exists.
///
/// This struct is created by the [`sub_array`](self::DynamicArray::sub_array)
/// method on [`DynamicArray`](self::DynamicArray).
#[derive(Clone, Copy)]
pub struct SubArray<'a, T> {
    data: &'a [T],
    offset: usize,
    len: usize,
}

impl<'a, T: Scalar> SubArray<'a, T> {
    /// Returns the number of elements in the view.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the position of the view in the shared buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the element at given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn get(&self, index: usize) -> T {
        if index >= self.len {
            out_of_bounds();
        }

        self.data[self.offset + index]
    }

    /// Returns the element at given index, or the null value if the index is
    /// out of bounds.
    pub fn safe_get(&self, index: usize) -> T {
        if index < self.len {
            self.data[self.offset + index]
        } else {
            T::NULL
        }
    }

    /// Returns a narrower view into the same buffer.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn sub_array(&self, start: usize, len: usize) -> SubArray<'a, T> {
        match start.checked_add(len) {
            Some(end) if end <= self.len => {}
            _ => out_of_bounds(),
        }

        SubArray {
            data: self.data,
            offset: self.offset + start,
            len,
        }
    }

    /// Returns the elements as a slice.
    pub fn as_slice(&self) -> &'a [T] {
        &self.data[self.offset..self.offset + self.len]
    }

    /// Returns a copy of the elements.
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> Iter<'a, T> {
        Iter {
            inner: self.as_slice().iter(),
        }
    }

    /// Writes the view in the layout of [`DynamicArray`](self::DynamicArray)
    /// with the sub-array flag set. The whole shared buffer is written, so
    /// that reading it back restores the same offset.
    pub fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        write_parts(sink, true, self.data, self.offset, self.len)
    }
}

impl<'a, T: Scalar> PartialEq for SubArray<'a, T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<'a, T: Scalar> PartialEq<DynamicArray<T>> for SubArray<'a, T> {
    fn eq(&self, other: &DynamicArray<T>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<'a, T: Scalar> fmt::Debug for SubArray<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubArray({:?})", self.as_slice())
    }
}

/// An iterator over the elements of a [`DynamicArray`](self::DynamicArray) or
/// a [`SubArray`](self::SubArray).
pub struct Iter<'a, T> {
    inner: slice::Iter<'a, T>,
}

impl<'a, T: Copy> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, T: Copy> ExactSizeIterator for Iter<'a, T> {}

#[cold]
#[inline(never)]
pub(crate) fn out_of_bounds() -> ! {
    panic!("index out of bounds")
}

#[cold]
#[inline(never)]
fn read_only() -> ! {
    panic!("sub-array is read-only")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::SliceReader;
    use proptest::prelude::*;

    fn should_panic<F: FnOnce() -> R + std::panic::UnwindSafe, R: std::fmt::Debug>(
        body: F,
        message: &str,
    ) {
        let result = std::panic::catch_unwind(body).map_err(|m| m.downcast::<&str>().unwrap());

        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), Box::new(message));
    }

    fn new_array(initial: usize) -> DynamicArray<i32> {
        let mut array = DynamicArray::new(Settings::new("test").initial_capacity(initial));
        array.initialize();
        array
    }

    fn from_values(values: &[i32]) -> DynamicArray<i32> {
        let mut array = new_array(2);
        assert!(array.extend_from_slice(values));
        array
    }

    #[test]
    fn basic() {
        let mut array = new_array(2);
        assert_eq!(array.capacity(), 2);

        assert!(array.add(1));
        assert!(array.add(2));
        assert!(array.add(3));

        assert_eq!(array.len(), 3);
        assert_eq!(array.cursor(), 3);
        assert!(array.capacity() >= 3);
        assert_eq!(array.get(0), 1);
        assert_eq!(array.get(2), 3);

        array.set(1, 20);
        assert_eq!(array.get(1), 20);
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn set_extends_with_null_holes() {
        let mut array = new_array(2);
        array.set(5, 7);

        assert_eq!(array.len(), 6);
        assert_eq!(array.cursor(), 6);
        assert_eq!(array.get(5), 7);
        assert!(array.get(3).is_null());

        assert!(array.add(8));
        assert_eq!(array.get(6), 8);
    }

    #[test]
    fn uninitialized_array_allocates_on_first_write() {
        let mut array = DynamicArray::<i64>::new(Settings::new("lazy").initial_capacity(8));
        assert_eq!(array.capacity(), 0);

        assert!(array.add(1));
        assert_eq!(array.capacity(), 8);
    }

    #[test]
    fn safe_get_out_of_range() {
        let array = from_values(&[1, 2]);
        assert_eq!(array.safe_get(1), 2);
        assert_eq!(array.safe_get(2), i32::NULL);
        assert_eq!(array.safe_get(usize::MAX), i32::NULL);
    }

    #[test]
    fn add_refused_over_maximum() {
        let mut array = DynamicArray::<i16>::new(
            Settings::new("bounded")
                .initial_capacity(2)
                .maximum_capacity(3),
        );
        array.initialize();

        assert!(array.add(1));
        assert!(array.add(2));
        assert!(array.add(3));
        assert!(!array.add(4));
        assert_eq!(array.len(), 3);
        assert_eq!(
            array.try_set(10, 5),
            Err(CapacityError {
                requested: 11,
                maximum: 3
            })
        );
        assert!(!array.extend_from_slice(&[4]));
        assert_eq!(array.to_vec(), vec![1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "capacity of 11 exceeds the maximum of 3")]
    fn set_panics_over_maximum() {
        let mut array = DynamicArray::<i16>::new(Settings::new("bounded").maximum_capacity(3));
        array.set(10, 5);
    }

    #[test]
    fn set_at_last_index_is_refused() {
        let mut array = DynamicArray::<i16>::new(Settings::new("bounded").maximum_capacity(10));
        assert_eq!(
            array.try_set(usize::MAX, 5),
            Err(CapacityError {
                requested: usize::MAX,
                maximum: 10,
            })
        );
        assert!(array.is_empty());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn sub_array_range_overflow() {
        let array = from_values(&[1, 2, 3]);
        array.sub_array(1, usize::MAX);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn nested_sub_array_range_overflow() {
        let array = from_values(&[1, 2, 3]);
        array.sub_array(0, 3).sub_array(2, usize::MAX - 1);
    }

    #[test]
    fn contract_violations() {
        should_panic(
            || {
                let array = from_values(&[1]);
                array.get(1)
            },
            "index out of bounds",
        );

        should_panic(
            || {
                let mut array = new_array(2);
                array.add(i32::MIN)
            },
            "null value cannot be stored",
        );

        should_panic(
            || {
                let array = from_values(&[1, 2]);
                array.sub_array(1, 2).len()
            },
            "index out of bounds",
        );

        should_panic(
            || {
                let mut array = from_values(&[1, 2]);
                array.compress(Compression::Freeze);
                array.add(3)
            },
            "collection is frozen",
        );
    }

    #[test]
    fn sub_array_shares_storage() {
        let mut array = from_values(&[10, 20, 30, 40, 50]);
        array.set(2, 33);

        let view = array.sub_array(1, 3);
        assert_eq!(view.to_vec(), vec![20, 33, 40]);
        assert_eq!(view.offset(), 1);
        assert_eq!(view.get(0), 20);
        assert!(view.safe_get(3).is_null());

        let nested = view.sub_array(1, 2);
        assert_eq!(nested.to_vec(), vec![33, 40]);
        assert_eq!(nested.offset(), 2);
        assert_eq!(nested.sub_array(0, 0).len(), 0);
    }

    #[test]
    fn restored_sub_array_is_read_only() {
        let array = from_values(&[10, 20, 30, 40, 50]);
        let mut bytes = Vec::new();
        array.sub_array(1, 3).write_to(&mut bytes).unwrap();

        let mut restored = DynamicArray::<i32>::named("view");
        restored.read_from(&mut SliceReader::new(&bytes)).unwrap();

        assert!(restored.is_sub_array());
        assert_eq!(restored.to_vec(), vec![20, 30, 40]);
        assert_eq!(restored.sub_array(1, 1).to_vec(), vec![30]);
        assert_eq!(restored.compress(Compression::Resize), Compressed::Unchanged);

        should_panic(
            move || {
                let mut restored = restored;
                restored.set(0, 1)
            },
            "sub-array is read-only",
        );

        assert_eq!(array.to_vec(), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn equality_ignores_capacity() {
        let mut a = new_array(2);
        let mut b = new_array(64);

        for value in &[3, 1, 2] {
            a.add(*value);
            b.add(*value);
        }

        assert_ne!(a.capacity(), b.capacity());
        assert_eq!(a, b);
        assert_eq!(a.sub_array(0, 3), b);

        b.set(1, 5);
        assert_ne!(a, b);
    }

    #[test]
    fn resize_is_idempotent() {
        let mut array = new_array(16);
        array.extend_from_slice(&[1, 2, 3]);

        assert_eq!(array.compress(Compression::Resize), Compressed::Resized);
        let capacity = array.capacity();
        let contents = array.as_array();

        assert_eq!(array.compress(Compression::Resize), Compressed::Unchanged);
        assert_eq!(array.capacity(), capacity);
        assert_eq!(array.as_array(), contents);
        assert_eq!(contents, vec![1, 2, 3]);
    }

    #[test]
    fn as_array_compacts() {
        let mut array = new_array(32);
        array.extend_from_slice(&[4, 5]);

        assert_eq!(array.as_array(), vec![4, 5]);
        assert_eq!(array.capacity(), 2);

        // Still writable after resizing.
        assert!(array.add(6));
        assert_eq!(array.to_vec(), vec![4, 5, 6]);
    }

    #[test]
    fn freeze_is_one_way() {
        let mut array = from_values(&[1, 2]);
        assert_eq!(array.compress(Compression::Freeze), Compressed::Frozen);
        assert_eq!(array.compression_state(), CompressionState::Frozen);
        assert_eq!(array.compress(Compression::Freeze), Compressed::Unchanged);
        assert_eq!(array.get(1), 2);
    }

    #[test]
    fn clear_keeps_buffer() {
        let mut array = from_values(&[1, 2, 3]);
        let capacity = array.capacity();
        array.clear();

        assert!(array.is_empty());
        assert_eq!(array.capacity(), capacity);
        array.set(1, 9);
        assert!(array.get(0).is_null());
    }

    #[test]
    fn serialization_writes_full_buffer() {
        let mut array = new_array(8);
        array.extend_from_slice(&[1, 2, 3]);

        let mut bytes = Vec::new();
        array.write_to(&mut bytes).unwrap();

        let mut restored = DynamicArray::<i32>::named("restored");
        restored.read_from(&mut SliceReader::new(&bytes)).unwrap();
        assert_eq!(restored, array);
        assert_eq!(restored.capacity(), 8);
        assert_eq!(restored.cursor(), 3);
        assert!(restored.add(4));

        array.compress(Compression::Resize);
        let mut compact = Vec::new();
        array.write_to(&mut compact).unwrap();
        assert!(compact.len() < bytes.len());
    }

    #[test]
    fn inconsistent_input_is_rejected() {
        let mut bytes = Vec::new();
        write_parts(&mut bytes, false, &[1i32, 2], 0, 3).unwrap();

        let mut restored = DynamicArray::<i32>::named("broken");
        let err = restored
            .read_from(&mut SliceReader::new(&bytes))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn char_array() {
        let mut array = DynamicArray::<char>::named("chars");
        for c in "bonjour".chars() {
            array.add(c);
        }

        assert_eq!(array.iter().collect::<String>(), "bonjour");
        assert_eq!(array.safe_get(7), '\0');
    }

    #[derive(Debug, Clone)]
    enum Action {
        Add(i32),
        Set((usize, i32)),
        Get(usize),
        SafeGet(usize),
        Resize,
    }

    fn test_random(actions: impl Iterator<Item = Action>) {
        let mut our_array = new_array(1);
        let mut model = Vec::<i32>::new();

        for action in actions {
            match action {
                Action::Add(value) => {
                    assert!(our_array.add(value));
                    model.push(value);
                }
                Action::Set((index, value)) => {
                    our_array.set(index, value);
                    if index >= model.len() {
                        model.resize(index + 1, i32::NULL);
                    }
                    model[index] = value;
                }
                Action::Get(index) => {
                    if index < model.len() {
                        assert_eq!(our_array.get(index), model[index]);
                    }
                }
                Action::SafeGet(index) => {
                    assert_eq!(
                        our_array.safe_get(index),
                        model.get(index).copied().unwrap_or(i32::NULL)
                    );
                }
                Action::Resize => {
                    our_array.compress(Compression::Resize);
                    assert_eq!(our_array.capacity(), model.len());
                }
            }
        }

        assert_eq!(our_array.len(), model.len());
        assert_eq!(our_array.to_vec(), model);
    }

    fn limit_index(index: usize) -> usize {
        // Indices past the end are interesting too, but not too far.
        index % 60
    }

    fn value_strategy() -> impl Strategy<Value = i32> {
        any::<i32>().prop_filter("null value", |value| *value != i32::NULL)
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            value_strategy().prop_map(Action::Add),
            (any::<usize>().prop_map(limit_index), value_strategy()).prop_map(Action::Set),
            any::<usize>().prop_map(limit_index).prop_map(Action::Get),
            any::<usize>().prop_map(limit_index).prop_map(Action::SafeGet),
            Just(Action::Resize),
        ]
    }

    proptest! {
        #[test]
        fn random(actions in proptest::collection::vec(action_strategy(), 1..500)) {
            test_random(actions.into_iter());
        }

        #[test]
        fn append_then_get(values in proptest::collection::vec(value_strategy(), 0..200)) {
            let mut array = new_array(1);
            for value in values.iter() {
                prop_assert!(array.add(*value));
            }

            prop_assert_eq!(array.len(), values.len());
            for (index, value) in values.iter().enumerate() {
                prop_assert_eq!(array.get(index), *value);
            }
        }
    }
}
