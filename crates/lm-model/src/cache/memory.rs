use tracing::trace;

use crate::cache::config::ValueAlignment;
use crate::error::{ModelError, Result};

/// Fixed-capacity FIFO of (key, token) entries for the neural cache.
///
/// Storage is two flat arenas indexed by a wrap-around head:
///   keys:   [capacity, batch, key_dim]
///   tokens: [capacity, batch]
///
/// Logical entry 0 is always the oldest. Once `capacity` entries are held,
/// each insert evicts the oldest one in O(1) by advancing the head.
/// A stored token id stands for the one-hot row of that token.
#[derive(Debug, Clone)]
pub struct CacheMemory {
    capacity: usize,
    batch_size: usize,
    key_dim: usize,
    vocab_size: usize,
    keys: Vec<f32>,
    tokens: Vec<u32>,
    /// Physical slot of logical entry 0.
    head: usize,
    /// Number of valid entries.
    len: usize,
    /// Entries evicted since allocation.
    evictions: u64,
}

/// Result of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// Logical index the entry was written at.
    pub index: usize,
    /// Whether the oldest entry was evicted to make room.
    pub evicted: bool,
}

/// A stored key paired with the tokens it votes for, one per batch element.
#[derive(Debug, Clone, Copy)]
pub struct CachePair<'a> {
    /// [batch, key_dim]
    pub key: &'a [f32],
    /// [batch]
    pub tokens: &'a [u32],
}

impl CacheMemory {
    /// Allocate zero-filled buffers.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; `CacheConfig::validate` rejects that first.
    pub fn new(capacity: usize, batch_size: usize, key_dim: usize, vocab_size: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be > 0");
        CacheMemory {
            capacity,
            batch_size,
            key_dim,
            vocab_size,
            keys: vec![0.0; capacity * batch_size * key_dim],
            tokens: vec![0; capacity * batch_size],
            head: 0,
            len: 0,
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn key_dim(&self) -> usize {
        self.key_dim
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Slot the next insert lands in, saturating at `capacity - 1` once the
    /// buffer is full.
    pub fn pointer(&self) -> usize {
        self.len.min(self.capacity - 1)
    }

    fn physical(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity
    }

    /// Append an entry, evicting the oldest one if the buffer is full.
    ///
    /// - `key`: [batch, key_dim] features of the current step
    /// - `tokens`: [batch] token ids consumed at the current step
    ///
    /// Inputs are validated before anything is written.
    pub fn insert(&mut self, key: &[f32], tokens: &[u32]) -> Result<Insertion> {
        if key.len() != self.batch_size * self.key_dim {
            return Err(ModelError::ShapeMismatch {
                what: "cache key",
                expected: self.batch_size * self.key_dim,
                got: key.len(),
            });
        }
        if tokens.len() != self.batch_size {
            return Err(ModelError::ShapeMismatch {
                what: "cache batch",
                expected: self.batch_size,
                got: tokens.len(),
            });
        }
        if let Some(&token) = tokens.iter().find(|&&t| t as usize >= self.vocab_size) {
            return Err(ModelError::TokenOutOfRange {
                token,
                vocab_size: self.vocab_size,
            });
        }

        let evicted = self.is_full();
        if evicted {
            self.head = (self.head + 1) % self.capacity;
            self.len -= 1;
            self.evictions += 1;
            trace!(evictions = self.evictions, "cache full, evicted oldest entry");
        }

        let slot = self.physical(self.len);
        let key_block = self.batch_size * self.key_dim;
        self.keys[slot * key_block..(slot + 1) * key_block].copy_from_slice(key);
        self.tokens[slot * self.batch_size..(slot + 1) * self.batch_size].copy_from_slice(tokens);

        let index = self.len;
        self.len += 1;
        Ok(Insertion { index, evicted })
    }

    /// Key block of logical entry `index` (0 = oldest).
    pub fn key(&self, index: usize) -> Option<&[f32]> {
        if index >= self.len {
            return None;
        }
        let block = self.batch_size * self.key_dim;
        let slot = self.physical(index);
        Some(&self.keys[slot * block..(slot + 1) * block])
    }

    /// Tokens of logical entry `index` (0 = oldest).
    pub fn tokens(&self, index: usize) -> Option<&[u32]> {
        if index >= self.len {
            return None;
        }
        let slot = self.physical(index);
        Some(&self.tokens[slot * self.batch_size..(slot + 1) * self.batch_size])
    }

    /// Retrieval pairs for a query made by the newest entry.
    ///
    /// Keys are every entry older than the newest one, `[0, len - 1)`. Each
    /// key is paired with the tokens at `alignment.value_index(key)`; with
    /// the default alignment that is the token which followed the key's
    /// context. Empty when fewer than two entries are held.
    pub fn read_all(&self, alignment: ValueAlignment) -> Vec<CachePair<'_>> {
        let history = self.len.saturating_sub(1);
        (0..history)
            .filter_map(|i| {
                let key = self.key(i)?;
                let tokens = self.tokens(alignment.value_index(i))?;
                Some(CachePair { key, tokens })
            })
            .collect()
    }

    /// Drop all entries and reallocate for a new batch size.
    pub fn reset(&mut self, batch_size: usize) {
        *self = CacheMemory::new(self.capacity, batch_size, self.key_dim, self.vocab_size);
    }
}
