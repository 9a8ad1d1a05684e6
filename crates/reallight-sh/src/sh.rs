use std::ops::{Add, AddAssign, Mul};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{NUM_BASES, NUM_CHANNELS, NUM_COEFFS};

/// Normalization of the real SH basis functions for l = 0, 1, 2.
pub const SH_BASIS_CONSTANTS: [f32; NUM_BASES] = [
    0.282095, 0.488603, 0.488603, 0.488603, 1.092548, 1.092548, 0.315392, 1.092548, 0.546274,
];

/// Per basis scale applied to the projected integral.
///
/// This is the basis normalization times the clamped cosine convolution factor
/// of each band (1, 2/3, 1/4), so reconstructing with [`sh_polynomials`] gives
/// diffuse irradiance divided by pi.
pub const PROJECTION_SCALE: [f32; NUM_BASES] = [
    0.282095,
    0.488603 * 2.0 / 3.0,
    0.488603 * 2.0 / 3.0,
    0.488603 * 2.0 / 3.0,
    1.092548 / 4.0,
    1.092548 / 4.0,
    0.315392 / 4.0,
    1.092548 / 4.0,
    0.546274 / 4.0,
];

/// Evaluate the 9 real SH basis functions at a unit direction.
pub fn sh_basis(dir: Vec3) -> [f32; NUM_BASES] {
    let poly = sh_polynomials(dir);
    std::array::from_fn(|k| SH_BASIS_CONSTANTS[k] * poly[k])
}

/// The unnormalized polynomial part of each basis function.
pub fn sh_polynomials(dir: Vec3) -> [f32; NUM_BASES] {
    let Vec3 { x, y, z } = dir;
    [
        1.0,
        y,
        z,
        x,
        x * y,
        y * z,
        3.0 * z * z - 1.0,
        x * z,
        x * x - y * y,
    ]
}

/// 9 SH coefficients for each of the 3 color channels.
///
/// Stored basis-major so the flat layout is `basis * 3 + channel`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShCoeffs {
    pub coeffs: [[f32; NUM_CHANNELS]; NUM_BASES],
}

impl ShCoeffs {
    pub const ZERO: Self = Self {
        coeffs: [[0.0; NUM_CHANNELS]; NUM_BASES],
    };

    pub fn splat(value: f32) -> Self {
        Self {
            coeffs: [[value; NUM_CHANNELS]; NUM_BASES],
        }
    }

    /// Read 27 values in `basis * 3 + channel` order. Returns `None` for any other length.
    pub fn from_flat(values: &[f32]) -> Option<Self> {
        if values.len() != NUM_COEFFS {
            return None;
        }
        let mut coeffs = [[0.0; NUM_CHANNELS]; NUM_BASES];
        for (row, chunk) in coeffs.iter_mut().zip(values.chunks_exact(NUM_CHANNELS)) {
            row.copy_from_slice(chunk);
        }
        Some(Self { coeffs })
    }

    pub fn to_flat(&self) -> [f32; NUM_COEFFS] {
        std::array::from_fn(|i| self.coeffs[i / NUM_CHANNELS][i % NUM_CHANNELS])
    }

    /// The constant (ambient) term for each channel.
    pub fn dc(&self) -> Vec3 {
        Vec3::from_array(self.coeffs[0])
    }

    /// All 9 coefficients of a single channel.
    pub fn channel(&self, channel: usize) -> [f32; NUM_BASES] {
        std::array::from_fn(|k| self.coeffs[k][channel])
    }

    /// Reconstruct the lighting arriving at a surface facing `normal`.
    pub fn evaluate(&self, normal: Vec3) -> Vec3 {
        let poly = sh_polynomials(normal.normalize_or_zero());
        self.coeffs
            .iter()
            .zip(poly)
            .fold(Vec3::ZERO, |acc, (row, p)| acc + Vec3::from_array(*row) * p)
    }
}

impl Add for ShCoeffs {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for ShCoeffs {
    fn add_assign(&mut self, rhs: Self) {
        for (row, rhs_row) in self.coeffs.iter_mut().zip(rhs.coeffs) {
            for (c, r) in row.iter_mut().zip(rhs_row) {
                *c += r;
            }
        }
    }
}

impl Mul<f32> for ShCoeffs {
    type Output = Self;

    fn mul(mut self, rhs: f32) -> Self {
        for c in self.coeffs.as_flattened_mut() {
            *c *= rhs;
        }
        self
    }
}

/// Mean squared error over all 27 values.
pub fn mse(pred: &ShCoeffs, target: &ShCoeffs) -> f32 {
    let sum: f32 = pred
        .to_flat()
        .iter()
        .zip(target.to_flat())
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    sum / NUM_COEFFS as f32
}

/// Coefficients for a batch of cubemaps. Logically a `[batch, 27, 1]` tensor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShBatch {
    pub samples: Vec<ShCoeffs>,
}

impl ShBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.samples.len(), NUM_COEFFS, 1]
    }

    /// Row-major data of the `[batch, 27, 1]` tensor.
    pub fn to_flat(&self) -> Vec<f32> {
        self.samples.iter().flat_map(|s| s.to_flat()).collect()
    }

    /// Mean squared error over the whole batch. `None` if the batch sizes differ or
    /// the batches are empty.
    pub fn mse(&self, target: &Self) -> Option<f32> {
        if self.len() != target.len() || self.is_empty() {
            return None;
        }
        let total: f32 = self
            .samples
            .iter()
            .zip(&target.samples)
            .map(|(p, t)| mse(p, t))
            .sum();
        Some(total / self.len() as f32)
    }
}

impl FromIterator<ShCoeffs> for ShBatch {
    fn from_iter<T: IntoIterator<Item = ShCoeffs>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn basis_at_up() {
        let b = sh_basis(Vec3::Y);
        assert_approx_eq!(b[0], 0.282095);
        assert_approx_eq!(b[1], 0.488603);
        assert_approx_eq!(b[2], 0.0);
        assert_approx_eq!(b[3], 0.0);
        assert_approx_eq!(b[6], -0.315392);
        assert_approx_eq!(b[8], -0.546274);
    }

    #[test]
    fn basis_at_diagonal() {
        let d = Vec3::ONE.normalize();
        let b = sh_basis(d);
        let third = 1.0 / 3.0;
        assert_approx_eq!(b[4], 1.092548 * third, 1e-6);
        assert_approx_eq!(b[5], 1.092548 * third, 1e-6);
        assert_approx_eq!(b[6], 0.0, 1e-6);
        assert_approx_eq!(b[7], 1.092548 * third, 1e-6);
        assert_approx_eq!(b[8], 0.0, 1e-6);
    }

    #[test]
    fn flat_layout_is_basis_major() {
        let mut sh = ShCoeffs::ZERO;
        sh.coeffs[2][1] = 5.0;
        let flat = sh.to_flat();
        assert_eq!(flat[2 * 3 + 1], 5.0);
        assert_eq!(ShCoeffs::from_flat(&flat), Some(sh));
        assert_eq!(ShCoeffs::from_flat(&flat[..26]), None);
    }

    #[test]
    fn channel_view() {
        let flat: Vec<f32> = (0..27).map(|i| i as f32).collect();
        let sh = ShCoeffs::from_flat(&flat).expect("27 values");
        assert_eq!(sh.channel(2), [2.0, 5.0, 8.0, 11.0, 14.0, 17.0, 20.0, 23.0, 26.0]);
        assert_eq!(sh.dc(), Vec3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn evaluate_dc_only_is_view_independent() {
        let mut sh = ShCoeffs::ZERO;
        sh.coeffs[0] = [0.5, 0.2, 0.8];
        for dir in [Vec3::X, Vec3::NEG_Y, Vec3::new(0.3, -0.2, 0.9)] {
            let rgb = sh.evaluate(dir);
            assert_approx_eq!(rgb.x, 0.5);
            assert_approx_eq!(rgb.y, 0.2);
            assert_approx_eq!(rgb.z, 0.8);
        }
    }

    #[test]
    fn arithmetic() {
        let a = ShCoeffs::splat(1.0);
        let b = ShCoeffs::splat(2.0);
        assert_eq!((a + b) * 0.5, ShCoeffs::splat(1.5));
    }

    #[test]
    fn mse_of_known_offset() {
        let a = ShCoeffs::splat(1.0);
        let b = ShCoeffs::splat(1.5);
        assert_approx_eq!(mse(&a, &b), 0.25);
        assert_approx_eq!(mse(&a, &a), 0.0);

        let pred: ShBatch = [a, a].into_iter().collect();
        let target: ShBatch = [a, b].into_iter().collect();
        assert_approx_eq!(pred.mse(&target).expect("same size"), 0.125);
        assert_eq!(pred.mse(&ShBatch::default()), None);
        assert_eq!(ShBatch::default().mse(&ShBatch::default()), None);
    }

    #[test]
    fn batch_shape() {
        let batch: ShBatch = (0..4).map(|_| ShCoeffs::ZERO).collect();
        assert_eq!(batch.shape(), [4, 27, 1]);
        assert_eq!(batch.to_flat().len(), 4 * 27);
    }
}
