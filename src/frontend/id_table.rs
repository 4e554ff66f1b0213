//! Per-scope symbol storage
//!
//! Open addressing with double hashing over a fixed ladder of prime
//! bucket counts. The table grows to the next rung whenever it is more
//! than 66% full at insertion time.

use std::fmt;

use thiserror::Error;

/// Bucket counts, smallest first
pub const SIZE_CLASSES: [usize; 9] = [37, 67, 127, 257, 509, 1019, 2039, 4073, 7919];

const MAX_LOAD: f64 = 0.66;

/// Insertion failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdTableError {
    #[error("duplicate key '{0}'")]
    Duplicate(String),

    #[error("symbol table exhausted at {} entries", SIZE_CLASSES[SIZE_CLASSES.len() - 1])]
    Exhausted,
}

fn rolling_hash(key: &str, multiplier: usize, modulus: usize) -> usize {
    key.bytes()
        .fold(0, |acc, byte| (multiplier * acc + byte as usize) % modulus)
}

/// Home bucket of `key`
fn home(key: &str, buckets: usize) -> usize {
    rolling_hash(key, 31, buckets)
}

/// Secondary hash step for `key`, always in `1..buckets` so every bucket is reachable
fn step(key: &str, buckets: usize) -> usize {
    rolling_hash(key, 17, buckets - 1) + 1
}

#[derive(Debug, Clone)]
struct Entry<V> {
    key: String,
    value: V,
}

/// Open-addressing hash table keyed by identifier
#[derive(Debug, Clone)]
pub struct IdTable<V> {
    size_class: usize,
    used: usize,
    buckets: Vec<Option<Entry<V>>>,
}

impl<V> IdTable<V> {
    pub fn new() -> Self {
        Self::with_size_class(0)
    }

    fn with_size_class(size_class: usize) -> Self {
        Self {
            size_class,
            used: 0,
            buckets: std::iter::repeat_with(|| None)
                .take(SIZE_CLASSES[size_class])
                .collect(),
        }
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.used
    }

    /// Current bucket count
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn is_full(&self) -> bool {
        self.used as f64 / self.capacity() as f64 > MAX_LOAD
    }

    /// Bucket holding `key`, or the empty bucket where it would go
    fn slot(&self, key: &str) -> usize {
        let buckets = self.capacity();
        let step = step(key, buckets);
        let mut index = home(key, buckets);

        while let Some(entry) = &self.buckets[index] {
            if entry.key == key {
                break;
            }
            index = (index + step) % buckets;
        }
        index
    }

    /// Insert a new key; existing keys are never overwritten
    pub fn insert(&mut self, key: &str, value: V) -> Result<(), IdTableError> {
        if self.buckets[self.slot(key)].is_some() {
            return Err(IdTableError::Duplicate(key.to_string()));
        }

        if self.is_full() {
            self.grow()?;
        }

        let index = self.slot(key);
        self.buckets[index] = Some(Entry {
            key: key.to_string(),
            value,
        });
        self.used += 1;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.buckets[self.slot(key)].as_ref().map(|entry| &entry.value)
    }

    /// Move every entry into the next size class
    fn grow(&mut self) -> Result<(), IdTableError> {
        if self.size_class + 1 == SIZE_CLASSES.len() {
            return Err(IdTableError::Exhausted);
        }

        let mut bigger = Self::with_size_class(self.size_class + 1);
        log::trace!(
            "growing id table from {} to {} buckets ({} entries)",
            self.capacity(),
            bigger.capacity(),
            self.used
        );

        for entry in self.buckets.drain(..).flatten() {
            let index = bigger.slot(&entry.key);
            bigger.buckets[index] = Some(entry);
            bigger.used += 1;
        }

        *self = bigger;
        Ok(())
    }

    /// Iterate over entries in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets
            .iter()
            .flatten()
            .map(|entry| (entry.key.as_str(), &entry.value))
    }
}

impl<V> Default for IdTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Display> fmt::Display for IdTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "size: {} (class {})", self.capacity(), self.size_class)?;
        writeln!(
            f,
            "used: {} ({:.2}%)",
            self.used,
            100.0 * self.used as f64 / self.capacity() as f64
        )?;
        for (key, value) in self.iter() {
            writeln!(f, "  {}: {}", key, value)?;
        }
        Ok(())
    }
}
