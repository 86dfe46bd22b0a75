//! Experience replay buffer

use rand::Rng;
use serde::{Deserialize, Serialize};

use paddle_rl_core::{RLError, Result, Transition};

/// Fixed-capacity ring buffer of transitions with uniform sampling
///
/// Below capacity, inserts append. At capacity, each insert overwrites the
/// oldest resident transition, so eviction is strictly first-in first-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayBuffer {
    /// Slot storage, `slots.len() <= capacity`
    slots: Vec<Transition>,
    /// Maximum capacity
    capacity: usize,
    /// Next slot to write once the buffer is full
    position: usize,
    /// Transitions ever inserted
    inserted: u64,
}

impl ReplayBuffer {
    /// Create a new replay buffer
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RLError::Config(
                "replay buffer capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            slots: Vec::with_capacity(capacity.min(1 << 16)),
            capacity,
            position: 0,
            inserted: 0,
        })
    }

    /// Add a transition, evicting the oldest one when full
    pub fn push(&mut self, transition: Transition) {
        if self.slots.len() < self.capacity {
            self.slots.push(transition);
        } else {
            self.slots[self.position] = transition;
        }
        self.position = (self.position + 1) % self.capacity;
        self.inserted += 1;
    }

    /// Sample `batch_size` distinct transitions uniformly at random
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<&Transition>> {
        if self.slots.len() < batch_size {
            return Err(RLError::InsufficientData {
                requested: batch_size,
                available: self.slots.len(),
            });
        }

        let indices = rand::seq::index::sample(rng, self.slots.len(), batch_size);
        Ok(indices.iter().map(|i| &self.slots[i]).collect())
    }

    /// Get the current size of the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Check if every slot is occupied
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Maximum number of resident transitions
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of transitions inserted over the buffer's lifetime
    #[must_use]
    pub fn total_inserted(&self) -> u64 {
        self.inserted
    }

    /// Resident transitions, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        let split = if self.is_full() { self.position } else { 0 };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.slots.clear();
        self.position = 0;
    }

    /// Check the invariants of a deserialized buffer
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 || self.slots.len() > self.capacity || self.position >= self.capacity {
            return Err(RLError::Checkpoint(format!(
                "inconsistent replay buffer: {} slots, capacity {}, cursor {}",
                self.slots.len(),
                self.capacity,
                self.position
            )));
        }
        if !self.is_full() && self.position != self.slots.len() % self.capacity {
            return Err(RLError::Checkpoint(
                "replay buffer cursor does not follow its length".to_string(),
            ));
        }
        Ok(())
    }
}
