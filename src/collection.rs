//! The contract shared by every collection in the crate: naming and sizing
//! settings, the growth policy, and compression.

use std::fmt;

use thiserror::Error;

/// Capacity allocated by [`initialize`](crate::DynamicArray::initialize) when
/// settings do not say otherwise.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Upper bound on capacity when settings do not say otherwise.
pub const DEFAULT_MAXIMUM_CAPACITY: usize = isize::MAX as usize;

/// A growth policy. Given the current capacity and the capacity required by a
/// pending write, returns the capacity to allocate.
///
/// The returned value is only a proposal: the collection never allocates less
/// than required nor more than its maximum capacity.
pub type GrowthPolicy = fn(current: usize, required: usize) -> usize;

/// The default [`GrowthPolicy`](self::GrowthPolicy), doubling the capacity.
pub fn grow_doubling(current: usize, required: usize) -> usize {
    std::cmp::max(required, current.saturating_mul(2))
}

/// Name and sizing configuration of a collection.
///
/// # Examples
///
/// ```
/// use scalaria::Settings;
///
/// let settings = Settings::new("postings")
///     .initial_capacity(64)
///     .maximum_capacity(1 << 20);
/// assert_eq!(settings.name(), "postings");
/// ```
#[derive(Clone)]
pub struct Settings {
    name: String,
    initial_capacity: usize,
    maximum_capacity: usize,
    growth: GrowthPolicy,
}

impl Settings {
    /// Creates settings with given name and default sizing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            maximum_capacity: DEFAULT_MAXIMUM_CAPACITY,
            growth: grow_doubling,
        }
    }

    /// Sets the capacity allocated when the collection is initialized.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the capacity the collection must never exceed.
    pub fn maximum_capacity(mut self, capacity: usize) -> Self {
        self.maximum_capacity = capacity;
        self
    }

    /// Replaces the growth policy.
    pub fn growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    /// Returns the name of the collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the capacity allocated on initialization, never above the
    /// maximum.
    pub fn initial(&self) -> usize {
        std::cmp::min(self.initial_capacity, self.maximum_capacity)
    }

    /// Returns the maximum capacity.
    pub fn maximum(&self) -> usize {
        self.maximum_capacity
    }

    pub(crate) fn with_name(&self, name: String) -> Self {
        Self {
            name,
            ..self.clone()
        }
    }

    /// Computes the capacity to grow to so that `required` elements fit.
    pub(crate) fn plan_growth(
        &self,
        current: usize,
        required: usize,
    ) -> Result<usize, CapacityError> {
        if required > self.maximum_capacity {
            tracing::warn!(
                name = %self.name,
                required,
                maximum = self.maximum_capacity,
                "growth refused"
            );
            return Err(CapacityError {
                requested: required,
                maximum: self.maximum_capacity,
            });
        }

        let proposed = (self.growth)(current, required);
        Ok(std::cmp::min(
            std::cmp::max(proposed, required),
            self.maximum_capacity,
        ))
    }

    /// Capacity needed for a write at `index`.
    pub(crate) fn required_for(&self, index: usize) -> Result<usize, CapacityError> {
        index.checked_add(1).ok_or(CapacityError {
            requested: usize::MAX,
            maximum: self.maximum_capacity,
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("initial_capacity", &self.initial_capacity)
            .field("maximum_capacity", &self.maximum_capacity)
            .finish()
    }
}

/// The only recoverable failure of the collections: a write needed more
/// capacity than the maximum allows.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("capacity of {requested} exceeds the maximum of {maximum}")]
pub struct CapacityError {
    /// Capacity the write required.
    pub requested: usize,
    /// Configured maximum capacity.
    pub maximum: usize,
}

/// Whether a collection still accepts mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionState {
    /// The initial state.
    Mutable,
    /// Terminal state reached by [`Compression::Freeze`](self::Compression).
    /// No mutating operation is legal anymore.
    Frozen,
}

/// A compression method requested from a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Shrink buffers to fit the current contents.
    Resize,
    /// Convert into the compact immutable representation. One way.
    Freeze,
}

/// What a [`compress`](self::ScalarCollection::compress) call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressed {
    /// Nothing changed.
    Unchanged,
    /// Buffers were shrunk.
    Resized,
    /// The collection was frozen.
    Frozen,
    /// Parts of a composite collection were compressed independently with
    /// different outcomes.
    Mixed,
}

impl Compressed {
    /// Combines outcomes of two independently compressed parts.
    pub fn merge(self, other: Compressed) -> Compressed {
        match (self, other) {
            (a, b) if a == b => a,
            (Compressed::Unchanged, b) => b,
            (a, Compressed::Unchanged) => a,
            _ => Compressed::Mixed,
        }
    }
}

/// Common surface of all scalar collections.
pub trait ScalarCollection {
    /// Returns the name given in [`Settings`](self::Settings).
    fn name(&self) -> &str;

    /// Returns the number of logically present elements or entries.
    fn len(&self) -> usize;

    /// Returns `true` if the collection holds nothing.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of elements the collection can hold without
    /// growing.
    fn capacity(&self) -> usize;

    /// Returns the current compression state.
    fn compression_state(&self) -> CompressionState;

    /// Compresses the collection with given method.
    fn compress(&mut self, method: Compression) -> Compressed;
}

#[cold]
#[inline(never)]
pub(crate) fn frozen() -> ! {
    panic!("collection is frozen")
}
