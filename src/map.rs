//! A hash map from scalar or string keys to scalar values, in simple textbook
//! implementation with linear probing, that can be frozen into a sorted array.
//!
//! The map starts as an [`OpenTable`](self::OpenTable). Deleting an entry
//! leaves a tombstone so that probe sequences stay valid. Freezing rebuilds
//! the live entries once into a [`SortedTable`](self::SortedTable): two dense
//! arrays sorted by key, searched with binary search, without any way to
//! mutate them. There is no way back.
//!
//! # Examples
//!
//! See [`ScalarMap`](self::ScalarMap) for examples.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use std::io;
use std::mem;
use std::slice;

use crate::collection::{
    frozen, CapacityError, Compressed, Compression, CompressionState, ScalarCollection, Settings,
};
use crate::raw::{self, Persist, RawRead, RawWrite};
use crate::scalar::{assert_not_null, Scalar};
use crate::value::{DecodeError, Value};

const LOAD_FACTOR_THRESHOLD: f32 = 0.75;
const MIN_SLOTS: usize = 2;

/// Hashing used by default. It is deterministic, so a table restored from its
/// serialized form probes exactly as the original.
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

/// A type usable as a map key.
///
/// Implemented for every type satisfying the bounds, which covers all
/// [scalars](crate::Scalar) and `String`.
pub trait MapKey: Clone + Eq + Hash + Ord + Value {}

impl<K: Clone + Eq + Hash + Ord + Value> MapKey for K {}

/// A slot of an [`OpenTable`](self::OpenTable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<K> {
    /// Never used since the last rehash. Ends a probe sequence.
    Empty,
    /// Used by an entry that was removed. Probe sequences continue past it.
    Tombstone,
    /// Holds a live entry with this key.
    Occupied(K),
}

impl<K> Slot<K> {
    fn tag(&self) -> u8 {
        match self {
            Slot::Empty => 0,
            Slot::Tombstone => 1,
            Slot::Occupied(_) => 2,
        }
    }
}

enum Probe {
    Found(usize),
    Vacant(usize),
}

/// The mutable representation of a [`ScalarMap`](self::ScalarMap): parallel
/// arrays of slots and values with linear probing.
///
/// Every mutating operation lives on this type, so holding a `&mut
/// OpenTable` is a proof that the map is not frozen.
pub struct OpenTable<K, V, R = DefaultHashBuilder> {
    settings: Settings,
    slots: Vec<Slot<K>>,
    values: Vec<V>,
    len: usize,
    tombstones: usize,
    hash_builder: R,
}

impl<K, V, R> OpenTable<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
    /// Constructs a new, empty table with given hash builder. No slots are
    /// allocated until [`initialize`](Self::initialize) or the first insert.
    ///
    /// The settings bound the number of slots.
    pub fn with_hasher(settings: Settings, hash_builder: R) -> Self {
        Self {
            settings,
            slots: Vec::new(),
            values: Vec::new(),
            len: 0,
            tombstones: 0,
            hash_builder,
        }
    }

    /// Allocates the initial slots.
    pub fn initialize(&mut self) {
        if self.slots.is_empty() {
            let slots = std::cmp::max(self.settings.initial(), MIN_SLOTS);
            let slots = std::cmp::min(slots, self.settings.maximum());
            if slots > 0 {
                self.rehash(slots);
            }
        }
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of tombstones left by removals.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Returns the slot at given position.
    pub fn slot(&self, index: usize) -> &Slot<K> {
        &self.slots[index]
    }

    /// Inserts a key-value pair.
    ///
    /// Returns `true` if the key was not present and a new entry was created,
    /// `false` if only the value of an existing entry was overwritten.
    ///
    /// # Panics
    ///
    /// Panics if the table would need more slots than the maximum capacity.
    /// Use [`try_put`](Self::try_put) if this is unacceptable.
    ///
    /// Also panics if `value` is the null value.
    pub fn put(&mut self, key: K, value: V) -> bool {
        match self.try_put(key, value) {
            Ok(new) => new,
            Err(err) => panic!("{}", err),
        }
    }

    /// Inserts a key-value pair.
    ///
    /// This is [`put`](Self::put) reporting the refusal as an error.
    pub fn try_put(&mut self, key: K, value: V) -> Result<bool, CapacityError> {
        assert_not_null(value);

        if let Probe::Found(index) = self.probe(&key) {
            self.values[index] = value;
            return Ok(false);
        }

        self.grow_maybe()?;

        match self.probe(&key) {
            Probe::Found(_) => unreachable!("key appeared during growth"),
            Probe::Vacant(index) => {
                if self.slots[index] == Slot::Tombstone {
                    self.tombstones -= 1;
                }

                self.slots[index] = Slot::Occupied(key);
                self.values[index] = value;
                self.len += 1;
                Ok(true)
            }
        }
    }

    /// Returns the value for given key, or the null value if the key is not
    /// present.
    pub fn get<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.probe(key) {
            Probe::Found(index) => self.values[index],
            Probe::Vacant(_) => V::NULL,
        }
    }

    /// Returns `true` if the table contains given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        matches!(self.probe(key), Probe::Found(_))
    }

    /// Removes a key, leaving a tombstone in its slot.
    ///
    /// Returns `true` if the key was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.probe(key) {
            Probe::Found(index) => {
                self.slots[index] = Slot::Tombstone;
                self.values[index] = V::NULL;
                self.len -= 1;
                self.tombstones += 1;
                true
            }
            Probe::Vacant(_) => false,
        }
    }

    /// Returns an iterator over the entries in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: IterInner::Open(self.slots.iter().zip(self.values.iter())),
        }
    }

    /// Rebuilds the table with as few slots as the live entries need under
    /// the load factor, dropping all tombstones.
    ///
    /// Returns `true` if the table changed.
    pub fn resize(&mut self) -> bool {
        let target = slots_for(self.len);
        if target < self.slots.len() || self.tombstones > 0 {
            tracing::debug!(
                name = %self.settings.name(),
                from = self.slots.len(),
                to = target,
                tombstones = self.tombstones,
                "resized table"
            );
            self.rehash(target);
            true
        } else {
            false
        }
    }

    /// Converts the table into its sorted, immutable representation.
    pub fn freeze(self) -> SortedTable<K, V> {
        let mut entries = self
            .slots
            .into_iter()
            .zip(self.values.into_iter())
            .filter_map(|(slot, value)| match slot {
                Slot::Occupied(key) => Some((key, value)),
                _ => None,
            })
            .collect::<Vec<_>>();

        entries.sort_unstable_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

        tracing::debug!(name = %self.settings.name(), len = entries.len(), "froze table");

        let (keys, values) = entries.into_iter().unzip();
        SortedTable {
            settings: self.settings,
            keys,
            values,
        }
    }

    fn grow_maybe(&mut self) -> Result<(), CapacityError> {
        let load_factor = (self.len + self.tombstones + 1) as f32 / (self.slots.len() as f32);

        if self.slots.is_empty() || load_factor > LOAD_FACTOR_THRESHOLD {
            let needed = slots_for(self.len + 1);
            let current = self.slots.len();

            let slots = if current == 0 {
                self.settings
                    .plan_growth(0, std::cmp::max(needed, self.settings.initial()))?
            } else if needed <= current {
                // The entries fit, only the tombstones have to go.
                current
            } else {
                self.settings.plan_growth(current, needed)?
            };

            tracing::debug!(
                name = %self.settings.name(),
                from = current,
                to = slots,
                tombstones = self.tombstones,
                "rehashing table"
            );
            self.rehash(slots);
        }

        Ok(())
    }

    fn rehash(&mut self, slots: usize) {
        let old_slots = mem::replace(&mut self.slots, vec![Slot::Empty; slots]);
        let old_values = mem::replace(&mut self.values, vec![V::NULL; slots]);
        self.len = 0;
        self.tombstones = 0;

        for (slot, value) in old_slots.into_iter().zip(old_values.into_iter()) {
            if let Slot::Occupied(key) = slot {
                match self.probe(&key) {
                    Probe::Vacant(index) => {
                        self.slots[index] = Slot::Occupied(key);
                        self.values[index] = value;
                        self.len += 1;
                    }
                    Probe::Found(_) => unreachable!("duplicate key in table"),
                }
            }
        }
    }

    fn probe<Q>(&self, key: &Q) -> Probe
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let len = self.slots.len();
        if len == 0 {
            return Probe::Vacant(0);
        }

        let mut index = (self.make_hash(key) % len as u64) as usize;
        let mut first_tombstone = None;

        // The load factor guarantees an empty slot, so the loop terminates.
        loop {
            match &self.slots[index] {
                Slot::Empty => return Probe::Vacant(first_tombstone.unwrap_or(index)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied(occupied) => {
                    if occupied.borrow() == key {
                        return Probe::Found(index);
                    }
                }
            }

            // Linear probing.
            index = (index + 1) % len;
        }
    }

    fn make_hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        let mut state = self.hash_builder.build_hasher();
        key.hash(&mut state);
        state.finish()
    }
}

impl<K, V, R> OpenTable<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    /// Constructs a new, empty table.
    pub fn new(settings: Settings) -> Self {
        Self::with_hasher(settings, R::default())
    }
}

/// The fewest slots holding `entries` within the load factor threshold.
/// Matches the check in `grow_maybe`, and always leaves an empty slot.
fn slots_for(entries: usize) -> usize {
    std::cmp::max((entries * 4 + 2) / 3, MIN_SLOTS)
}

/// The frozen representation of a [`ScalarMap`](self::ScalarMap): keys in
/// ascending order and their values, without any empty slots.
pub struct SortedTable<K, V> {
    settings: Settings,
    keys: Vec<K>,
    values: Vec<V>,
}

impl<K, V> SortedTable<K, V>
where
    K: MapKey,
    V: Scalar,
{
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the value for given key, or the null value if the key is not
    /// present.
    pub fn get<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.search(key) {
            Ok(index) => self.values[index],
            Err(_) => V::NULL,
        }
    }

    /// Returns `true` if the table contains given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.search(key).is_ok()
    }

    /// Returns the keys in ascending order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Returns the values in the order of their keys.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Returns an iterator over the entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: IterInner::Sorted(self.keys.iter().zip(self.values.iter())),
        }
    }

    fn search<Q>(&self, key: &Q) -> Result<usize, usize>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.keys.binary_search_by(|probe| probe.borrow().cmp(key))
    }
}

enum Table<K, V, R> {
    Mutable(OpenTable<K, V, R>),
    Frozen(SortedTable<K, V>),
}

/// A hash map from keys to [scalar](crate::Scalar) values.
///
/// Absence is signalled by the null value of the value type:
/// [`get`](Self::get) returns it for missing keys and it can never be stored.
/// [`find`](Self::find) offers the same lookup as an `Option`.
///
/// The map is mutable until it is frozen, either with
/// [`freeze`](Self::freeze) or with [`Compression::Freeze`](crate::Compression).
/// Mutating a frozen map is a contract violation and panics. Code that wants
/// the guarantee at compile time can mutate through
/// [`as_open_mut`](Self::as_open_mut).
///
/// # Examples
///
/// ```
/// use scalaria::{Scalar, ScalarMap, Settings};
///
/// let mut ratings = ScalarMap::<String, i32>::new(Settings::new("ratings"));
/// ratings.initialize();
///
/// assert!(ratings.put("1984".to_string(), 419));
/// assert!(ratings.put("On the Road".to_string(), 362));
/// assert!(!ratings.put("1984".to_string(), 420));
///
/// assert!(ratings.remove("On the Road"));
/// assert!(ratings.get("On the Road").is_null());
///
/// ratings.freeze();
/// assert_eq!(ratings.get("1984"), 420);
/// assert_eq!(ratings.find("The Witcher"), None);
/// ```
pub struct ScalarMap<K, V, R = DefaultHashBuilder> {
    table: Table<K, V, R>,
}

impl<K, V, R> ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    /// Constructs a new, empty map.
    pub fn new(settings: Settings) -> Self {
        Self::with_hasher(settings, R::default())
    }

    /// Constructs a new, empty map with given name and default settings.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Settings::new(name))
    }
}

impl<K, V, R> ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
    /// Constructs a new, empty map with given hash builder.
    pub fn with_hasher(settings: Settings, hash_builder: R) -> Self {
        Self {
            table: Table::Mutable(OpenTable::with_hasher(settings, hash_builder)),
        }
    }

    /// Allocates the initial slots.
    pub fn initialize(&mut self) {
        if let Table::Mutable(table) = &mut self.table {
            table.initialize();
        }
    }

    /// Returns the settings the map was constructed with.
    pub fn settings(&self) -> &Settings {
        match &self.table {
            Table::Mutable(table) => &table.settings,
            Table::Frozen(table) => &table.settings,
        }
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        match &self.table {
            Table::Mutable(table) => table.len(),
            Table::Frozen(table) => table.len(),
        }
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the map was frozen.
    pub fn is_frozen(&self) -> bool {
        matches!(self.table, Table::Frozen(_))
    }

    /// Returns the mutable table, or `None` if the map is frozen.
    pub fn as_open_mut(&mut self) -> Option<&mut OpenTable<K, V, R>> {
        match &mut self.table {
            Table::Mutable(table) => Some(table),
            Table::Frozen(_) => None,
        }
    }

    /// Returns the mutable table, or `None` if the map is frozen.
    pub fn as_open(&self) -> Option<&OpenTable<K, V, R>> {
        match &self.table {
            Table::Mutable(table) => Some(table),
            Table::Frozen(_) => None,
        }
    }

    /// Returns the sorted table, or `None` if the map is not frozen.
    pub fn as_sorted(&self) -> Option<&SortedTable<K, V>> {
        match &self.table {
            Table::Mutable(_) => None,
            Table::Frozen(table) => Some(table),
        }
    }

    /// Inserts a key-value pair.
    ///
    /// Returns `true` if the key was not present and a new entry was created,
    /// `false` if only the value of an existing entry was overwritten.
    ///
    /// # Panics
    ///
    /// Panics if the map is frozen, if `value` is the null value, or if the
    /// table would need more slots than the maximum capacity. Use
    /// [`try_put`](Self::try_put) if the last one is unacceptable.
    pub fn put(&mut self, key: K, value: V) -> bool {
        self.open_mut().put(key, value)
    }

    /// Inserts a key-value pair.
    ///
    /// This is [`put`](Self::put) reporting the capacity refusal as an error.
    pub fn try_put(&mut self, key: K, value: V) -> Result<bool, CapacityError> {
        self.open_mut().try_put(key, value)
    }

    /// Returns the value for given key, or the null value if the key is not
    /// present.
    ///
    /// Probes the hash table while mutable, searches the sorted keys once
    /// frozen.
    pub fn get<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        match &self.table {
            Table::Mutable(table) => table.get(key),
            Table::Frozen(table) => table.get(key),
        }
    }

    /// Returns the value for given key, or `None` if the key is not present.
    pub fn find<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        let value = self.get(key);
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }

    /// Returns `true` if the map contains given key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Ord + ?Sized,
    {
        match &self.table {
            Table::Mutable(table) => table.contains_key(key),
            Table::Frozen(table) => table.contains_key(key),
        }
    }

    /// Removes a key from the map.
    ///
    /// Returns `true` if the key was present.
    ///
    /// # Panics
    ///
    /// Panics if the map is frozen.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.open_mut().remove(key)
    }

    /// Freezes the map. Does nothing if it is already frozen.
    pub fn freeze(&mut self) {
        if let Table::Mutable(_) = self.table {
            let placeholder = Table::Frozen(SortedTable {
                settings: self.settings().clone(),
                keys: Vec::new(),
                values: Vec::new(),
            });

            if let Table::Mutable(table) = mem::replace(&mut self.table, placeholder) {
                self.table = Table::Frozen(table.freeze());
            }
        }
    }

    /// Returns an iterator over the entries, in arbitrary order while mutable
    /// and in ascending key order once frozen.
    pub fn iter(&self) -> Iter<'_, K, V> {
        match &self.table {
            Table::Mutable(table) => table.iter(),
            Table::Frozen(table) => table.iter(),
        }
    }

    /// Returns an iterator over the keys, in the order of
    /// [`iter`](Self::iter).
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values, in the order of
    /// [`iter`](Self::iter).
    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    fn open_mut(&mut self) -> &mut OpenTable<K, V, R> {
        match &mut self.table {
            Table::Mutable(table) => table,
            Table::Frozen(_) => frozen(),
        }
    }
}

impl<K, V, R> ScalarCollection for ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
    fn name(&self) -> &str {
        self.settings().name()
    }

    fn len(&self) -> usize {
        ScalarMap::len(self)
    }

    /// The number of slots while mutable, the number of entries once frozen.
    fn capacity(&self) -> usize {
        match &self.table {
            Table::Mutable(table) => table.slots(),
            Table::Frozen(table) => table.len(),
        }
    }

    fn compression_state(&self) -> CompressionState {
        match self.table {
            Table::Mutable(_) => CompressionState::Mutable,
            Table::Frozen(_) => CompressionState::Frozen,
        }
    }

    fn compress(&mut self, method: Compression) -> Compressed {
        if self.is_frozen() {
            return Compressed::Unchanged;
        }

        match method {
            Compression::Resize => match self.as_open_mut() {
                Some(table) => {
                    if table.resize() {
                        Compressed::Resized
                    } else {
                        Compressed::Unchanged
                    }
                }
                None => Compressed::Unchanged,
            },
            Compression::Freeze => {
                self.freeze();
                Compressed::Frozen
            }
        }
    }
}

const STATE_MUTABLE: u8 = 0;
const STATE_FROZEN: u8 = 1;

/// Writes the state first. A mutable map then writes the slot tags, the keys
/// of occupied slots and the values of all slots. A frozen map writes its
/// sorted keys and their values.
impl<K, V, R> Persist for ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher + Default,
{
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()> {
        match &self.table {
            Table::Mutable(table) => {
                raw::write_u8(sink, STATE_MUTABLE)?;
                sink.write_raw_buffer(&table.slots.iter().map(Slot::tag).collect::<Vec<_>>())?;
                raw::write_unsized(
                    sink,
                    table.slots.iter().filter_map(|slot| match slot {
                        Slot::Occupied(key) => Some(key),
                        _ => None,
                    }),
                )?;
                raw::write_sized(sink, &table.values)
            }
            Table::Frozen(table) => {
                raw::write_u8(sink, STATE_FROZEN)?;
                raw::write_unsized(sink, &table.keys)?;
                raw::write_sized(sink, &table.values)
            }
        }
    }

    fn read_from<R2: RawRead>(&mut self, source: &mut R2) -> io::Result<()> {
        let settings = self.settings().clone();

        match raw::read_u8(source)? {
            STATE_MUTABLE => {
                let tags = source.read_raw_buffer()?;
                let mut keys = raw::read_unsized::<_, K>(source)?.into_iter();
                let values = raw::read_sized::<_, V>(source)?;

                if tags.len() != values.len() {
                    return Err(DecodeError::Inconsistent("slot and value counts differ").into());
                }

                let mut table = OpenTable::new(settings);
                let mut slots = Vec::with_capacity(tags.len());

                for (tag, value) in tags.iter().zip(values.iter()) {
                    let slot = match tag {
                        0 => Slot::Empty,
                        1 => {
                            table.tombstones += 1;
                            Slot::Tombstone
                        }
                        2 => {
                            let key = keys.next().ok_or(DecodeError::Inconsistent(
                                "fewer keys than occupied slots",
                            ))?;
                            if value.is_null() {
                                return Err(DecodeError::Inconsistent("null value stored").into());
                            }
                            table.len += 1;
                            Slot::Occupied(key)
                        }
                        tag => return Err(DecodeError::Tag { what: "slot", tag: *tag }.into()),
                    };
                    slots.push(slot);
                }

                if keys.next().is_some() {
                    return Err(DecodeError::Inconsistent("more keys than occupied slots").into());
                }

                if !slots.is_empty() && !slots.contains(&Slot::Empty) {
                    return Err(DecodeError::Inconsistent("table has no empty slot").into());
                }

                table.slots = slots;
                table.values = values;
                self.table = Table::Mutable(table);
            }
            STATE_FROZEN => {
                let keys = raw::read_unsized::<_, K>(source)?;
                let values = raw::read_sized::<_, V>(source)?;

                if keys.len() != values.len() {
                    return Err(DecodeError::Inconsistent("key and value counts differ").into());
                }

                if keys.windows(2).any(|pair| pair[0] >= pair[1]) {
                    return Err(DecodeError::Inconsistent("frozen keys are not sorted").into());
                }

                self.table = Table::Frozen(SortedTable {
                    settings,
                    keys,
                    values,
                });
            }
            tag => return Err(DecodeError::Tag { what: "state", tag }.into()),
        }

        Ok(())
    }
}

/// Two maps are equal if they hold the same entries, regardless of their
/// representation or table size.
impl<K, V, R> PartialEq for ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get::<K>(key) == value)
    }
}

impl<K, V, R> Eq for ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
}

/// Consistent with equality: the hash does not depend on the order of
/// entries.
impl<K, V, R> Hash for ScalarMap<K, V, R>
where
    K: MapKey,
    V: Scalar,
    R: BuildHasher,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        let sum = self.iter().fold(0u64, |sum, (key, value)| {
            let mut entry = DefaultHasher::new();
            key.hash(&mut entry);
            value.hash(&mut entry);
            sum.wrapping_add(entry.finish())
        });

        self.len().hash(state);
        sum.hash(state);
    }
}

impl<K, V, R> fmt::Debug for ScalarMap<K, V, R>
where
    K: MapKey + fmt::Debug,
    V: Scalar,
    R: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// An iterator over the entries of a [`ScalarMap`](self::ScalarMap),
/// [`OpenTable`](self::OpenTable) or [`SortedTable`](self::SortedTable).
pub struct Iter<'a, K, V> {
    inner: IterInner<'a, K, V>,
}

enum IterInner<'a, K, V> {
    Open(std::iter::Zip<slice::Iter<'a, Slot<K>>, slice::Iter<'a, V>>),
    Sorted(std::iter::Zip<slice::Iter<'a, K>, slice::Iter<'a, V>>),
}

impl<'a, K, V: Copy> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, V);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Open(inner) => inner.find_map(|(slot, value)| match slot {
                Slot::Occupied(key) => Some((key, *value)),
                _ => None,
            }),
            IterInner::Sorted(inner) => inner.next().map(|(key, value)| (key, *value)),
        }
    }
}
