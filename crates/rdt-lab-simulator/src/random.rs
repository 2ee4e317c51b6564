//! Uniform random sources.
//!
//! Every random decision in the simulation (loss, delay, corruption, arrival
//! gaps) goes through a [`UniformSource`], so a run is fully determined by the
//! source it is given.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use crate::error::SimError;

/// Number of draws taken by the start-up uniformity check.
pub const SANITY_DRAWS: u32 = 1000;

pub trait UniformSource {
    /// Next value, uniform on `[0, 1]`.
    fn next_uniform(&mut self) -> f64;
}

/// Draw `draws` values and fail if their mean falls outside `[0.25, 0.75]`.
///
/// The draws are consumed from the source.
pub fn check_uniformity(source: &mut dyn UniformSource, draws: u32) -> Result<f64, SimError> {
    let sum: f64 = (0..draws).map(|_| source.next_uniform()).sum();
    let mean = sum / draws as f64;
    if !(0.25..=0.75).contains(&mean) {
        return Err(SimError::RandomSourceNotUniform { draws, mean });
    }
    Ok(mean)
}

/// Seeded pseudo-random source backed by [`StdRng`].
#[derive(Debug, Clone)]
pub struct SeededUniform {
    rng: StdRng,
}

impl SeededUniform {
    /// Seed the generator and run the uniformity check on it before handing it out.
    pub fn new(seed: u64) -> Result<Self, SimError> {
        let mut source = Self::unchecked(seed);
        check_uniformity(&mut source, SANITY_DRAWS)?;
        Ok(source)
    }

    pub fn unchecked(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl UniformSource for SeededUniform {
    fn next_uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Replays a fixed list of draws, then repeats `fallback` forever.
#[derive(Debug, Clone)]
pub struct ScriptedUniform {
    script: VecDeque<f64>,
    fallback: f64,
    drawn: usize,
}

impl ScriptedUniform {
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback,
            drawn: 0,
        }
    }

    /// Always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(std::iter::empty(), value)
    }

    /// How many values have been handed out so far.
    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl UniformSource for ScriptedUniform {
    fn next_uniform(&mut self) -> f64 {
        self.drawn += 1;
        self.script.pop_front().unwrap_or(self.fallback)
    }
}
