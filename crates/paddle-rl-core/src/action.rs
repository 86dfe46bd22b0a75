//! Discrete actions and the discrete action space

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Index of a discrete action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscreteAction(pub usize);

impl DiscreteAction {
    /// Get the action index
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for DiscreteAction {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Discrete action space `[0, n)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteSpace {
    /// Number of discrete actions
    pub n: usize,
}

impl DiscreteSpace {
    /// Create a new discrete action space
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    /// Sample a uniformly random action
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DiscreteAction {
        DiscreteAction(rng.gen_range(0..self.n))
    }

    /// Check if an action is valid within this space
    #[must_use]
    pub fn contains(&self, action: DiscreteAction) -> bool {
        action.0 < self.n
    }

    /// Validate an action, failing with [`crate::RLError::InvalidAction`]
    pub fn check(&self, action: DiscreteAction) -> crate::Result<DiscreteAction> {
        if self.contains(action) {
            Ok(action)
        } else {
            Err(crate::RLError::InvalidAction {
                action: action.0,
                num_actions: self.n,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_sample_stays_in_space() {
        let space = DiscreteSpace::new(3);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(space.contains(space.sample(&mut rng)));
        }
    }

    #[test]
    fn test_check_rejects_out_of_range() {
        let space = DiscreteSpace::new(3);
        assert!(space.check(DiscreteAction(2)).is_ok());
        let err = space.check(DiscreteAction(3)).unwrap_err();
        assert!(matches!(
            err,
            crate::RLError::InvalidAction { action: 3, num_actions: 3 }
        ));
    }
}
