//! A logically flat array physically split into lazily allocated children.
//!
//! # Examples
//!
//! See [`SplitArray`](self::SplitArray) for examples.

use std::fmt;
use std::io;

use crate::array::{out_of_bounds, DynamicArray};
use crate::collection::{
    frozen, CapacityError, Compressed, Compression, CompressionState, ScalarCollection, Settings,
};
use crate::raw::{self, Persist, RawRead, RawWrite};
use crate::scalar::{assert_not_null, Scalar};
use crate::value::DecodeError;

/// An array of [`DynamicArray`](crate::DynamicArray) children, each covering
/// `child_size` consecutive indices.
///
/// A child is allocated only when an index it covers is written, so memory
/// follows the sparsity of writes. Reading from an unallocated child yields
/// the [null value](crate::Scalar::NULL) without allocating.
///
/// The [`Settings`](crate::Settings) of a split array configure its children:
/// the initial capacity is the one every child starts with. The maximum
/// capacity bounds the logical length of the whole array, while each child
/// never holds more than `child_size` elements.
///
/// # Examples
///
/// ```
/// use scalaria::{Scalar, Settings, SplitArray};
///
/// let mut array = SplitArray::<i64>::new(Settings::new("offsets"), 100);
/// array.set(250, 7);
///
/// assert_eq!(array.get(250), 7);
/// assert!(array.get(10).is_null());
/// assert_eq!(array.len(), 251);
/// assert_eq!(array.allocated_children(), 1);
/// ```
pub struct SplitArray<T> {
    settings: Settings,
    child_size: usize,
    children: Vec<Option<DynamicArray<T>>>,
    size: usize,
    state: CompressionState,
}

impl<T: Scalar> SplitArray<T> {
    /// Constructs a new, empty split array with children of `child_size`
    /// elements.
    ///
    /// # Panics
    ///
    /// Panics if `child_size` is zero.
    pub fn new(settings: Settings, child_size: usize) -> Self {
        assert!(child_size > 0, "child size must be positive");

        Self {
            settings,
            child_size,
            children: Vec::new(),
            size: 0,
            state: CompressionState::Mutable,
        }
    }

    /// Allocates the array of child slots. No child is allocated.
    pub fn initialize(&mut self) {
        if self.children.is_empty() {
            self.children.push(None);
        }
    }

    /// Returns the number of elements covered by one child.
    pub fn child_size(&self) -> usize {
        self.child_size
    }

    /// Returns the logical length, one past the highest written index.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the sum of capacities of the allocated children.
    /// Unallocated children contribute nothing.
    pub fn capacity(&self) -> usize {
        self.children
            .iter()
            .flatten()
            .map(|child| child.capacity())
            .sum()
    }

    /// Returns the number of allocated children.
    pub fn allocated_children(&self) -> usize {
        self.children.iter().flatten().count()
    }

    /// Returns the capacity of the child at given child index, zero when it
    /// is not allocated.
    pub fn child_capacity(&self, child: usize) -> usize {
        self.child(child).map_or(0, |child| child.capacity())
    }

    /// Returns the element at given index. Indices within the length that
    /// were never written yield the null value.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn get(&self, index: usize) -> T {
        if index >= self.size {
            out_of_bounds();
        }

        self.safe_get(index)
    }

    /// Returns the element at given index, or the null value if the index is
    /// out of bounds or its child is not allocated.
    pub fn safe_get(&self, index: usize) -> T {
        let (child, offset) = self.locate(index);
        self.child(child)
            .map_or(T::NULL, |child| child.safe_get(offset))
    }

    /// Writes a value at given index, allocating its child if needed.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the maximum capacity. Use
    /// [`try_set`](Self::try_set) if this is unacceptable.
    ///
    /// Also panics if `value` is the null value, or if the array is frozen.
    pub fn set(&mut self, index: usize, value: T) {
        if let Err(err) = self.try_set(index, value) {
            panic!("{}", err);
        }
    }

    /// Writes a value at given index, allocating its child if needed.
    ///
    /// This is [`set`](Self::set) reporting the refusal as an error.
    pub fn try_set(&mut self, index: usize, value: T) -> Result<(), CapacityError> {
        if self.state == CompressionState::Frozen {
            frozen();
        }
        assert_not_null(value);

        let required = self.settings.required_for(index)?;
        if required > self.settings.maximum() {
            tracing::warn!(
                name = %self.settings.name(),
                index,
                maximum = self.settings.maximum(),
                "write past maximum capacity refused"
            );
            return Err(CapacityError {
                requested: required,
                maximum: self.settings.maximum(),
            });
        }

        let (child, offset) = self.locate(index);
        self.child_or_allocate(child).try_set(offset, value)?;

        if required > self.size {
            self.size = required;
        }

        Ok(())
    }

    /// Appends a value past the last written index.
    ///
    /// Returns `false` if the array reached its maximum capacity.
    pub fn add(&mut self, value: T) -> bool {
        self.try_set(self.size, value).is_ok()
    }

    /// Returns an iterator over all elements up to the length, yielding the
    /// null value for holes.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            array: self,
            current: 0,
        }
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.child_size, index % self.child_size)
    }

    fn child(&self, child: usize) -> Option<&DynamicArray<T>> {
        self.children.get(child).and_then(Option::as_ref)
    }

    fn child_or_allocate(&mut self, child: usize) -> &mut DynamicArray<T> {
        if child >= self.children.len() {
            let mut slots = std::cmp::max(self.children.len(), 1);
            while child >= slots {
                slots *= 2;
            }

            tracing::debug!(
                name = %self.settings.name(),
                from = self.children.len(),
                to = slots,
                "grew child slots"
            );
            self.children.resize_with(slots, || None);
        }

        let settings = &self.settings;
        let child_size = self.child_size;

        self.children[child].get_or_insert_with(|| {
            tracing::debug!(name = %settings.name(), child, "allocated child");
            let mut array = DynamicArray::new(child_settings(settings, child_size, child));
            array.initialize();
            array
        })
    }
}

fn child_settings(settings: &Settings, child_size: usize, child: usize) -> Settings {
    settings
        .with_name(format!("{}[{}]", settings.name(), child))
        .initial_capacity(std::cmp::min(settings.initial(), child_size))
        .maximum_capacity(child_size)
}

impl<T: Scalar> ScalarCollection for SplitArray<T> {
    fn name(&self) -> &str {
        self.settings.name()
    }

    fn len(&self) -> usize {
        self.size
    }

    fn capacity(&self) -> usize {
        SplitArray::capacity(self)
    }

    fn compression_state(&self) -> CompressionState {
        self.state
    }

    /// Compresses every allocated child with the same method.
    fn compress(&mut self, method: Compression) -> Compressed {
        let outcome = self
            .children
            .iter_mut()
            .flatten()
            .map(|child| child.compress(method))
            .fold(Compressed::Unchanged, Compressed::merge);

        if method == Compression::Freeze && self.state == CompressionState::Mutable {
            self.state = CompressionState::Frozen;
            tracing::debug!(name = %self.settings.name(), "froze split array");
            return Compressed::Frozen;
        }

        outcome
    }
}

/// Writes the child size, the length and the number of child slots, then
/// for every slot a presence flag followed by the child itself.
impl<T: Scalar> Persist for SplitArray<T> {
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        raw::write_usize(sink, self.child_size)?;
        raw::write_usize(sink, self.size)?;
        raw::write_usize(sink, self.children.len())?;

        for slot in &self.children {
            raw::write_bool(sink, slot.is_some())?;
            if let Some(child) = slot {
                child.write_to(sink)?;
            }
        }

        Ok(())
    }

    fn read_from<R: RawRead>(&mut self, source: &mut R) -> io::Result<()> {
        let child_size = raw::read_usize(source)?;
        let size = raw::read_usize(source)?;
        let slots = raw::read_usize(source)?;

        if child_size == 0 {
            return Err(DecodeError::Inconsistent("zero child size").into());
        }

        let mut children = Vec::new();
        for child in 0..slots {
            if raw::read_bool(source)? {
                let mut array = DynamicArray::new(child_settings(&self.settings, child_size, child));
                array.read_from(source)?;

                if array.len() > child_size || child * child_size + array.len() > size {
                    return Err(DecodeError::Inconsistent("child exceeds its range").into());
                }

                children.push(Some(array));
            } else {
                children.push(None);
            }
        }

        self.child_size = child_size;
        self.size = size;
        self.children = children;
        self.state = CompressionState::Mutable;

        Ok(())
    }
}

impl<T: Scalar> PartialEq for SplitArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.iter().eq(other.iter())
    }
}

impl<T: Scalar> fmt::Debug for SplitArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitArray")
            .field("name", &self.settings.name())
            .field("child_size", &self.child_size)
            .field("len", &self.size)
            .field("allocated_children", &self.allocated_children())
            .finish()
    }
}

/// An iterator over the elements of a [`SplitArray`](self::SplitArray).
///
/// This struct is created by the [`iter`](self::SplitArray::iter) method on
/// [`SplitArray`](self::SplitArray).
pub struct Iter<'a, T> {
    array: &'a SplitArray<T>,
    current: usize,
}

impl<'a, T: Scalar> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == self.array.len() {
            None
        } else {
            let current = self.current;
            self.current += 1;
            Some(self.array.safe_get(current))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.array.len() - self.current;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::SliceReader;
    use proptest::prelude::*;

    fn new_split(child_size: usize) -> SplitArray<i32> {
        let mut array = SplitArray::new(Settings::new("test").initial_capacity(4), child_size);
        array.initialize();
        array
    }

    #[test]
    fn sparse_write_allocates_one_child() {
        let mut array = new_split(100);
        array.set(250, 7);

        assert_eq!(array.get(250), 7);
        assert_eq!(array.get(10), i32::NULL);
        assert_eq!(array.allocated_children(), 1);
        assert_eq!(array.child_capacity(1), 0);
        assert_eq!(array.child_capacity(3), 0);
        assert!(array.child_capacity(2) > 0);
        assert_eq!(array.capacity(), array.child_capacity(2));
    }

    #[test]
    fn safe_get_never_allocates() {
        let array = new_split(10);
        assert!(array.safe_get(5).is_null());
        assert!(array.safe_get(1_000_000).is_null());
        assert_eq!(array.allocated_children(), 0);
        assert_eq!(array.capacity(), 0);
    }

    #[test]
    fn child_slots_double() {
        let mut array = new_split(4);
        array.set(0, 1);
        array.set(17, 2);

        assert_eq!(array.allocated_children(), 2);
        assert_eq!(array.len(), 18);
        assert!(array.get(16).is_null());
        assert_eq!(array.get(17), 2);
    }

    #[test]
    fn add_appends_across_children() {
        let mut array = new_split(3);
        for value in 1..=7 {
            assert!(array.add(value));
        }

        assert_eq!(array.allocated_children(), 3);
        assert_eq!(array.iter().collect::<Vec<_>>(), (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn maximum_capacity_bounds_length() {
        let mut array = SplitArray::<i8>::new(Settings::new("small").maximum_capacity(5), 2);
        for value in 0..5 {
            assert!(array.add(value));
        }

        assert!(!array.add(5));
        assert_eq!(
            array.try_set(9, 1),
            Err(CapacityError {
                requested: 10,
                maximum: 5
            })
        );
    }

    #[test]
    fn set_at_last_index_is_refused() {
        let mut array =
            SplitArray::<i8>::new(Settings::new("unbounded").maximum_capacity(usize::MAX), 4);
        assert_eq!(
            array.try_set(usize::MAX, 1),
            Err(CapacityError {
                requested: usize::MAX,
                maximum: usize::MAX
            })
        );
        assert_eq!(array.allocated_children(), 0);
        assert!(array.is_empty());
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn get_past_length() {
        let mut array = new_split(10);
        array.set(3, 1);
        array.get(4);
    }

    #[test]
    fn compression_skips_unallocated_children() {
        let mut array = new_split(100);
        array.set(5, 1);
        array.set(450, 2);

        assert_eq!(array.compress(Compression::Resize), Compressed::Resized);
        assert_eq!(array.child_capacity(0), 6);
        assert_eq!(array.child_capacity(4), 51);
        assert_eq!(array.compress(Compression::Resize), Compressed::Unchanged);

        assert_eq!(array.compress(Compression::Freeze), Compressed::Frozen);
        assert_eq!(array.compression_state(), CompressionState::Frozen);
        assert_eq!(array.get(450), 2);
    }

    #[test]
    #[should_panic(expected = "collection is frozen")]
    fn frozen_rejects_writes() {
        let mut array = new_split(10);
        array.set(1, 1);
        array.compress(Compression::Freeze);
        array.set(2, 2);
    }

    #[test]
    fn serialization_keeps_holes() {
        let mut array = new_split(10);
        array.set(3, 1);
        array.set(42, 2);

        let mut bytes = Vec::new();
        array.write_to(&mut bytes).unwrap();

        let mut restored = SplitArray::<i32>::new(Settings::new("restored"), 1);
        restored.read_from(&mut SliceReader::new(&bytes)).unwrap();

        assert_eq!(restored, array);
        assert_eq!(restored.child_size(), 10);
        assert_eq!(restored.allocated_children(), 2);
        assert!(restored.get(20).is_null());
    }

    proptest! {
        #[test]
        fn behaves_like_flat_array(
            writes in proptest::collection::vec((0usize..500, 1i32..1000), 1..100),
            child_size in 1usize..64,
        ) {
            let mut array = new_split(child_size);
            let mut model = Vec::new();

            for (index, value) in writes {
                array.set(index, value);
                if index >= model.len() {
                    model.resize(index + 1, i32::NULL);
                }
                model[index] = value;
            }

            prop_assert_eq!(array.len(), model.len());
            prop_assert_eq!(array.iter().collect::<Vec<_>>(), model.clone());

            let touched = (0..model.len())
                .filter(|index| !model[*index].is_null())
                .map(|index| index / child_size)
                .collect::<std::collections::BTreeSet<_>>();
            prop_assert_eq!(array.allocated_children(), touched.len());
        }
    }
}
