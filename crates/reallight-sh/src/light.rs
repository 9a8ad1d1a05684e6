//! Turning estimated coefficients into scene lights.

use std::collections::VecDeque;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::sh::ShCoeffs;

/// Rec. 709 luminance weights.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Below this squared length the linear band is treated as uniform ambient light.
const MIN_L1_LENGTH_SQ: f32 = 1e-6;

/// A single directional light approximating the brightest part of the environment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MainLight {
    /// Unit vector pointing towards where the light comes from.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// Luminance weighted direction of the linear (l = 1) band.
pub fn dominant_direction(sh: &ShCoeffs) -> Option<Vec3> {
    let c = &sh.coeffs;
    // Bases 1, 2, 3 are proportional to y, z, x.
    let axis = |k: usize| Vec3::from_array(c[k]).dot(LUMA_WEIGHTS);
    let dir = Vec3::new(axis(3), axis(1), axis(2));

    if dir.length_squared() > MIN_L1_LENGTH_SQ {
        Some(dir.normalize())
    } else {
        None
    }
}

pub fn extract_main_light(sh: &ShCoeffs, intensity_multiplier: f32) -> Option<MainLight> {
    let direction = dominant_direction(sh)?;
    let color = sh.evaluate(direction).max(Vec3::ZERO);
    Some(MainLight {
        direction,
        color,
        intensity: color.max_element() * intensity_multiplier,
    })
}

/// Sliding window average over the most recent estimates.
///
/// Starts filled with `window` copies of a seed, so early estimates are pulled
/// towards it instead of jumping straight to the first value.
#[derive(Clone, Debug)]
pub struct ShHistory {
    window: usize,
    entries: VecDeque<ShCoeffs>,
}

impl ShHistory {
    pub const DEFAULT_SEED: f32 = 0.5;

    pub fn new(window: usize) -> Self {
        Self::with_seed(window, ShCoeffs::splat(Self::DEFAULT_SEED))
    }

    pub fn with_seed(window: usize, seed: ShCoeffs) -> Self {
        let window = window.max(1);
        Self {
            window,
            entries: std::iter::repeat_n(seed, window).collect(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn push(&mut self, sh: ShCoeffs) {
        self.entries.push_back(sh);
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }

    pub fn average(&self) -> ShCoeffs {
        let sum = self
            .entries
            .iter()
            .fold(ShCoeffs::ZERO, |acc, &sh| acc + sh);
        sum * (1.0 / self.entries.len() as f32)
    }

    /// Push a new estimate and return the smoothed result.
    pub fn smooth(&mut self, sh: ShCoeffs) -> ShCoeffs {
        self.push(sh);
        self.average()
    }
}
