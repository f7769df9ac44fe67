use crate::domain::ports::RandomSource;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Thread-local RNG rolls and v4 UUID tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn roll_percent(&self) -> u8 {
        rand::thread_rng().gen_range(1..=100)
    }

    fn token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Always returns the same roll; tokens are a counter.
///
/// A roll of 1 approves every simulated charge, a roll of 100 declines on
/// every gateway that has a non-zero decline rate.
#[derive(Debug)]
pub struct FixedRandom {
    roll: u8,
    counter: AtomicU64,
}

impl FixedRandom {
    pub fn new(roll: u8) -> Self {
        Self {
            roll: roll.clamp(1, 100),
            counter: AtomicU64::new(0),
        }
    }

    pub fn approving() -> Self {
        Self::new(1)
    }

    pub fn declining() -> Self {
        Self::new(100)
    }
}

impl RandomSource for FixedRandom {
    fn roll_percent(&self) -> u8 {
        self.roll
    }

    fn token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{n:08x}")
    }
}
