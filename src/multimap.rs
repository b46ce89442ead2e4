//! Write-once multi-maps storing every value list back-to-back in one shared
//! array.
//!
//! A multi-map keeps a [`ScalarMap`](crate::ScalarMap) from each key to the
//! offset of its list in the shared values array. Every list is followed by a
//! terminator value, so the list ends are not stored anywhere else. Offset 0
//! is never handed out: the first slot of the values array holds a
//! placeholder.
//!
//! Each key may be given its list exactly once. Putting a list for a key that
//! is already mapped is a contract violation and panics.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::io;

use crate::array::DynamicArray;
use crate::collection::{
    frozen, CapacityError, Compressed, Compression, CompressionState, ScalarCollection, Settings,
};
use crate::map::{DefaultHashBuilder, MapKey, ScalarMap};
use crate::packed::{max_value, ConfigError, Overflow, PackedArray, PackedError};
use crate::raw::{self, Persist, RawRead, RawWrite};
use crate::scalar::{assert_not_null, null_stored, Scalar};
use crate::value::DecodeError;

const RESERVED_SLOTS: usize = 1;

fn part_settings(settings: &Settings, part: &str) -> Settings {
    settings.with_name(format!("{}.{}", settings.name(), part))
}

#[cold]
#[inline(never)]
fn already_mapped() -> ! {
    panic!("key is already mapped")
}

#[cold]
#[inline(never)]
fn terminator_stored() -> ! {
    panic!("list terminator cannot be stored")
}

/// A write-once multi-map from keys to lists of [scalar](crate::Scalar)
/// values.
///
/// Lists are terminated by [`Scalar::TERMINATOR`](crate::Scalar::TERMINATOR),
/// so neither it nor the null value can be stored in a list.
///
/// # Examples
///
/// ```
/// use scalaria::{FixedMultiMap, Settings};
///
/// let mut postings = FixedMultiMap::<String, i32>::new(Settings::new("postings"));
/// postings.initialize();
///
/// postings.put_all("rust".to_string(), &[1, 4, 9]).unwrap();
/// postings.put_all("go".to_string(), &[2]).unwrap();
///
/// assert_eq!(postings.get("rust"), Some(vec![1, 4, 9]));
/// assert_eq!(postings.get("zig"), None);
/// assert_eq!(postings.len(), 2);
/// assert_eq!(postings.value_count(), 4);
/// ```
pub struct FixedMultiMap<K, V, R = DefaultHashBuilder> {
    indexes: ScalarMap<K, i64, R>,
    values: DynamicArray<V>,
}

impl<K, V, R> FixedMultiMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    /// Constructs a new, empty multi-map.
    ///
    /// The settings size both the index map and the values array.
    pub fn new(settings: Settings) -> Self {
        Self {
            indexes: ScalarMap::new(part_settings(&settings, "indexes")),
            values: DynamicArray::new(part_settings(&settings, "values")),
        }
    }

    /// Allocates the first buffers.
    pub fn initialize(&mut self) {
        self.indexes.initialize();
        self.values.initialize();
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns `true` if no key is mapped.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Returns the total number of stored values over all lists.
    pub fn value_count(&self) -> usize {
        self.values
            .len()
            .saturating_sub(RESERVED_SLOTS + self.indexes.len())
    }

    /// Returns `true` if the multi-map was frozen.
    pub fn is_frozen(&self) -> bool {
        self.indexes.is_frozen()
    }

    /// Maps a key to a list of values.
    ///
    /// Nothing is stored if the capacity is exceeded.
    ///
    /// # Panics
    ///
    /// Panics if the key is already mapped, if the multi-map is frozen, or if
    /// `values` contains the null value or the terminator.
    pub fn put_all(&mut self, key: K, values: &[V]) -> Result<(), CapacityError> {
        if self.is_frozen() {
            frozen();
        }

        if self.indexes.contains_key::<K>(&key) {
            already_mapped();
        }

        for value in values {
            assert_not_null(*value);
            if *value == V::TERMINATOR {
                terminator_stored();
            }
        }

        if self.values.is_empty() {
            self.values.try_add(V::TERMINATOR)?;
        }

        let start = self.values.len();
        let appended = self.values.extend_from_slice(values) && self.values.add(V::TERMINATOR);

        let result = if appended {
            self.indexes.try_put(key, start as i64).map(|_| ())
        } else {
            Err(CapacityError {
                requested: start + values.len() + 1,
                maximum: self.values.settings().maximum(),
            })
        };

        if result.is_err() {
            self.values.truncate(start);
        }

        result
    }

    /// Returns the list of given key, or `None` if the key is not mapped.
    pub fn get<Q>(&self, key: &Q) -> Option<Vec<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.indexes.find(key).map(|offset| self.list_at(offset))
    }

    /// Returns `true` if the key is mapped.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.indexes.contains_key(key)
    }

    /// Returns an iterator over the keys and their lists.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Vec<V>)> + '_ {
        self.indexes
            .iter()
            .map(move |(key, offset)| (key, self.list_at(offset)))
    }

    fn list_at(&self, offset: i64) -> Vec<V> {
        self.values.as_slice()[offset as usize..]
            .iter()
            .copied()
            .take_while(|value| *value != V::TERMINATOR)
            .collect()
    }
}

impl<K, V, R> ScalarCollection for FixedMultiMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    fn name(&self) -> &str {
        self.indexes.name()
    }

    fn len(&self) -> usize {
        self.indexes.len()
    }

    /// The capacity of the values array.
    fn capacity(&self) -> usize {
        self.values.capacity()
    }

    fn compression_state(&self) -> CompressionState {
        self.indexes.compression_state()
    }

    fn compress(&mut self, method: Compression) -> Compressed {
        if self.is_frozen() {
            return Compressed::Unchanged;
        }

        match method {
            Compression::Resize => self.values.compress(method),
            _ => {
                self.indexes.compress(method);
                self.values.compress(method);
                Compressed::Mixed
            }
        }
    }
}

/// Writes the index map and then the values array.
impl<K, V, R> Persist for FixedMultiMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        self.indexes.write_to(sink)?;
        self.values.write_to(sink)
    }

    fn read_from<R2: RawRead>(&mut self, source: &mut R2) -> io::Result<()> {
        self.indexes.read_from(source)?;
        self.values.read_from(source)?;

        let len = self.values.len();
        let valid = (len == 0 || self.values.get(len - 1) == V::TERMINATOR)
            && self
                .indexes
                .values()
                .all(|offset| offset >= RESERVED_SLOTS as i64 && (offset as usize) < len);

        if !valid {
            return Err(DecodeError::Inconsistent("list offset out of range").into());
        }

        Ok(())
    }
}

/// Multi-maps are equal if they map the same keys to the same lists.
impl<K, V, R> PartialEq for FixedMultiMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, list)| other.get::<K>(key).as_ref() == Some(&list))
    }
}

impl<K, V, R> fmt::Debug for FixedMultiMap<K, V, R>
where
    K: MapKey + fmt::Debug,
    V: Scalar,
    R: BuildHasher + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// A write-once multi-map whose values are stored in a
/// [`PackedArray`](crate::PackedArray).
///
/// The list terminator is configured explicitly, because a narrow width has
/// no spare maximum value to reserve. It is validated on construction: it
/// must not be the null value `0`, must fit in the width, and must differ from
/// the value that overflowing values saturate to.
///
/// # Examples
///
/// ```
/// use scalaria::{Overflow, PackedMultiMap, Settings};
///
/// let mut ranks = PackedMultiMap::<i32>::new(Settings::new("ranks"), 4, Overflow::Fail, 15).unwrap();
///
/// ranks.put_all(7, &[1, 2, 3]).unwrap();
/// assert_eq!(ranks.get(&7), Some(vec![1, 2, 3]));
/// assert!(ranks.put_all(8, &[16]).is_err());
/// ```
pub struct PackedMultiMap<K, R = DefaultHashBuilder> {
    indexes: ScalarMap<K, i64, R>,
    values: PackedArray,
    terminator: u64,
}

fn validate(width: u32, overflow: Overflow, terminator: u64) -> Result<(), ConfigError> {
    if width == 0 || width > 64 {
        return Err(ConfigError::Width(width));
    }

    if terminator == 0 {
        return Err(ConfigError::NullTerminator);
    }

    if terminator > max_value(width) {
        return Err(ConfigError::TerminatorWidth { terminator, width });
    }

    if overflow == Overflow::Saturate && terminator == max_value(width) {
        return Err(ConfigError::SaturatedTerminator(terminator));
    }

    Ok(())
}

impl<K, R> PackedMultiMap<K, R>
where
    K: MapKey,
    R: BuildHasher + Default,
{
    /// Constructs a new, empty multi-map storing `width` bits per value.
    pub fn new(
        settings: Settings,
        width: u32,
        overflow: Overflow,
        terminator: u64,
    ) -> Result<Self, ConfigError> {
        validate(width, overflow, terminator)?;

        Ok(Self {
            indexes: ScalarMap::new(part_settings(&settings, "indexes")),
            values: PackedArray::new(part_settings(&settings, "values"), width, overflow)?,
            terminator,
        })
    }

    /// Allocates the first buffers.
    pub fn initialize(&mut self) {
        self.indexes.initialize();
        self.values.initialize();
    }

    /// Returns the configured list terminator.
    pub fn terminator(&self) -> u64 {
        self.terminator
    }

    /// Returns the current bit width of the values.
    pub fn width(&self) -> u32 {
        self.values.width()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Returns `true` if no key is mapped.
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Returns the total number of stored values over all lists.
    pub fn value_count(&self) -> usize {
        self.values
            .len()
            .saturating_sub(RESERVED_SLOTS + self.indexes.len())
    }

    /// Returns `true` if the multi-map was frozen.
    pub fn is_frozen(&self) -> bool {
        self.indexes.is_frozen()
    }

    /// Maps a key to a list of values.
    ///
    /// Nothing is stored if the write is refused by the capacity or the
    /// overflow policy.
    ///
    /// # Panics
    ///
    /// Panics if the key is already mapped, if the multi-map is frozen, or if
    /// `values` contains `0` or the terminator.
    pub fn put_all(&mut self, key: K, values: &[u64]) -> Result<(), PackedError> {
        if self.is_frozen() {
            frozen();
        }

        if self.indexes.contains_key::<K>(&key) {
            already_mapped();
        }

        for value in values {
            if *value == 0 {
                null_stored();
            }
            if *value == self.terminator {
                terminator_stored();
            }
        }

        if self.values.is_empty() {
            self.values.try_add(self.terminator)?;
        }

        let start = self.values.len();
        let result = self.append(values).and_then(|_| {
            self.indexes
                .try_put(key, start as i64)
                .map(|_| ())
                .map_err(PackedError::from)
        });

        if result.is_err() {
            self.values.truncate(start);
        }

        result
    }

    fn append(&mut self, values: &[u64]) -> Result<(), PackedError> {
        for value in values {
            self.values.try_add(*value)?;
        }
        self.values.try_add(self.terminator)
    }

    /// Returns the list of given key, or `None` if the key is not mapped.
    pub fn get<Q>(&self, key: &Q) -> Option<Vec<u64>>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.indexes.find(key).map(|offset| self.list_at(offset))
    }

    /// Returns `true` if the key is mapped.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        self.indexes.contains_key(key)
    }

    /// Returns an iterator over the keys and their lists.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Vec<u64>)> + '_ {
        self.indexes
            .iter()
            .map(move |(key, offset)| (key, self.list_at(offset)))
    }

    fn list_at(&self, offset: i64) -> Vec<u64> {
        (offset as usize..self.values.len())
            .map(|index| self.values.get(index))
            .take_while(|value| *value != self.terminator)
            .collect()
    }
}

impl<K, R> ScalarCollection for PackedMultiMap<K, R>
where
    K: MapKey,
    R: BuildHasher + Default,
{
    fn name(&self) -> &str {
        self.indexes.name()
    }

    fn len(&self) -> usize {
        self.indexes.len()
    }

    /// The capacity of the values array.
    fn capacity(&self) -> usize {
        self.values.capacity()
    }

    fn compression_state(&self) -> CompressionState {
        self.indexes.compression_state()
    }

    fn compress(&mut self, method: Compression) -> Compressed {
        if self.is_frozen() {
            return Compressed::Unchanged;
        }

        match method {
            Compression::Resize => self.values.compress(method),
            _ => {
                self.indexes.compress(method);
                self.values.compress(method);
                Compressed::Mixed
            }
        }
    }
}

/// Writes the width, overflow policy and terminator, then the index map and
/// the values array.
impl<K, R> Persist for PackedMultiMap<K, R>
where
    K: MapKey,
    R: BuildHasher + Default,
{
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        raw::write_u8(sink, self.values.width() as u8)?;
        raw::write_u8(sink, self.values.overflow().tag())?;
        raw::write_sized(sink, &[self.terminator])?;
        self.indexes.write_to(sink)?;
        self.values.write_to(sink)
    }

    fn read_from<R2: RawRead>(&mut self, source: &mut R2) -> io::Result<()> {
        let width = raw::read_u8(source)? as u32;
        let overflow = Overflow::from_tag(raw::read_u8(source)?)?;
        let terminator = match raw::read_sized::<_, u64>(source)?.as_slice() {
            [terminator] => *terminator,
            _ => return Err(DecodeError::Inconsistent("missing list terminator").into()),
        };

        validate(width, overflow, terminator)
            .map_err(|_| DecodeError::Inconsistent("invalid packed configuration"))?;

        self.terminator = terminator;
        self.indexes.read_from(source)?;
        self.values.read_from(source)?;

        if self.values.width() != width || self.values.overflow() != overflow {
            return Err(DecodeError::Inconsistent("packed configuration mismatch").into());
        }

        let len = self.values.len();
        let valid = (len == 0 || self.values.get(len - 1) == terminator)
            && self
                .indexes
                .values()
                .all(|offset| offset >= RESERVED_SLOTS as i64 && (offset as usize) < len);

        if !valid {
            return Err(DecodeError::Inconsistent("list offset out of range").into());
        }

        Ok(())
    }
}

impl<K, R> PartialEq for PackedMultiMap<K, R>
where
    K: MapKey,
    R: BuildHasher + Default,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, list)| other.get::<K>(key).as_ref() == Some(&list))
    }
}

impl<K, R> fmt::Debug for PackedMultiMap<K, R>
where
    K: MapKey + fmt::Debug,
    R: BuildHasher + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
