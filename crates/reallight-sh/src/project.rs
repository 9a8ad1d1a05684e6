use std::sync::{Arc, LazyLock};

use rayon::prelude::*;

use crate::{
    NUM_BASES, NUM_CHANNELS, NUM_FACES,
    cubemap::{Cubemap, CubemapError, Face},
    sh::{PROJECTION_SCALE, ShBatch, ShCoeffs},
    tables::{ProjectionTables, TableCache},
};

type Accumulator = [[f64; NUM_CHANNELS]; NUM_BASES];

/// Projects cubemaps onto the degree 2 SH basis.
///
/// Holds a cache of per resolution tables, so reuse one projector across calls.
#[derive(Debug, Default)]
pub struct ShProjector {
    cache: TableCache,
}

static DEFAULT_PROJECTOR: LazyLock<ShProjector> = LazyLock::new(ShProjector::new);

/// Project a batch with a process wide projector.
pub fn project_cubemaps(cubemaps: &[Cubemap]) -> ShBatch {
    DEFAULT_PROJECTOR.project_batch(cubemaps)
}

impl ShProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self, width: u32, height: u32) -> Result<Arc<ProjectionTables>, CubemapError> {
        self.cache.get(width, height)
    }

    pub fn project(&self, cubemap: &Cubemap) -> ShCoeffs {
        // Cubemap constructors reject empty resolutions, the only way building tables fails.
        let Ok(tables) = self.cache.get(cubemap.width(), cubemap.height()) else {
            unreachable!("Cubemap with an empty resolution");
        };
        project_planar(&tables, cubemap.data())
    }

    /// Project every cubemap in the batch. Output order matches input order.
    pub fn project_batch(&self, cubemaps: &[Cubemap]) -> ShBatch {
        let _span = tracing::trace_span!("project_batch", batch = cubemaps.len()).entered();
        ShBatch {
            samples: cubemaps.par_iter().map(|c| self.project(c)).collect(),
        }
    }

    /// Project a `[batch, faces, channels, height, width]` array.
    ///
    /// The shape is checked before any work is done.
    pub fn project_raw(&self, shape: [usize; 5], data: &[f32]) -> Result<ShBatch, CubemapError> {
        let [batch, faces, channels, height, width] = shape;
        if faces != NUM_FACES || channels != NUM_CHANNELS {
            return Err(CubemapError::BatchShape(shape.to_vec()));
        }
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(CubemapError::BatchShape(shape.to_vec()));
        };
        if w == 0 || h == 0 {
            return Err(CubemapError::EmptyResolution {
                width: w,
                height: h,
            });
        }
        let sample_len = NUM_FACES * NUM_CHANNELS * width * height;
        if data.len() != batch * sample_len {
            return Err(CubemapError::DataLength {
                expected: batch * sample_len,
                found: data.len(),
            });
        }

        let tables = self.cache.get(w, h)?;
        let _span = tracing::trace_span!("project_raw", batch, width, height).entered();
        let samples: Vec<_> = data
            .par_chunks_exact(sample_len)
            .map(|sample| project_planar(&tables, sample))
            .collect();
        Ok(ShBatch { samples })
    }
}

/// Weighted sum of one face into a 9x3 accumulator.
fn accumulate_face(tables: &ProjectionTables, face: Face, face_data: &[f32]) -> Accumulator {
    let plane = tables.pixels_per_face();
    let weighted_basis = tables.weighted_basis(face);
    let mut acc = [[0.0; NUM_CHANNELS]; NUM_BASES];

    for c in 0..NUM_CHANNELS {
        let colors = &face_data[c * plane..][..plane];
        for (wb, &color) in weighted_basis.iter().zip(colors) {
            let color = color as f64;
            for k in 0..NUM_BASES {
                acc[k][c] += wb[k] as f64 * color;
            }
        }
    }
    acc
}

/// Project one sample stored as (face, channel, row, column).
fn project_planar(tables: &ProjectionTables, data: &[f32]) -> ShCoeffs {
    let _span = tracing::trace_span!("project_planar").entered();
    let face_len = NUM_CHANNELS * tables.pixels_per_face();

    // Faces are independent, partials are merged in face order so results don't
    // depend on scheduling.
    let partials: Vec<Accumulator> = Face::ALL
        .par_iter()
        .map(|&face| accumulate_face(tables, face, &data[face.index() * face_len..][..face_len]))
        .collect();

    let mut total = [[0.0f64; NUM_CHANNELS]; NUM_BASES];
    for partial in &partials {
        for (row, part_row) in total.iter_mut().zip(partial) {
            for (t, p) in row.iter_mut().zip(part_row) {
                *t += p;
            }
        }
    }

    let norm = tables.normalization();
    let mut coeffs = [[0.0f32; NUM_CHANNELS]; NUM_BASES];
    for k in 0..NUM_BASES {
        let scale = norm * PROJECTION_SCALE[k] as f64;
        for c in 0..NUM_CHANNELS {
            coeffs[k][c] = (total[k][c] * scale) as f32;
        }
    }
    ShCoeffs { coeffs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn constant_white_recovers_dc() {
        let projector = ShProjector::new();
        let sh = projector.project(&Cubemap::filled(16, 16, [1.0; 3]).expect("valid cubemap"));
        for c in 0..3 {
            assert_approx_eq!(sh.coeffs[0][c], 1.0, 1e-3);
        }
    }

    #[test]
    fn raw_rejects_bad_shapes() {
        let projector = ShProjector::new();
        assert_eq!(
            projector.project_raw([1, 5, 3, 2, 2], &[0.0; 60]),
            Err(CubemapError::BatchShape(vec![1, 5, 3, 2, 2]))
        );
        assert_eq!(
            projector.project_raw([1, 6, 4, 2, 2], &[0.0; 96]),
            Err(CubemapError::BatchShape(vec![1, 6, 4, 2, 2]))
        );
        assert_eq!(
            projector.project_raw([1, 6, 3, 0, 2], &[]),
            Err(CubemapError::EmptyResolution {
                width: 2,
                height: 0
            })
        );
        assert_eq!(
            projector.project_raw([2, 6, 3, 2, 2], &[0.0; 72]),
            Err(CubemapError::DataLength {
                expected: 144,
                found: 72
            })
        );
    }

    #[test]
    fn raw_matches_per_cubemap() {
        let projector = ShProjector::new();
        let a = Cubemap::from_direction_fn(4, 4, |d| [d.x, d.y, d.z]).expect("valid cubemap");
        let b = Cubemap::filled(4, 4, [0.1, 0.2, 0.3]).expect("valid cubemap");
        let mut data = a.data().to_vec();
        data.extend_from_slice(b.data());

        let batch = projector.project_raw([2, 6, 3, 4, 4], &data).expect("valid shape");
        assert_eq!(batch.samples, vec![projector.project(&a), projector.project(&b)]);
    }

    #[test]
    fn empty_batch() {
        let batch = project_cubemaps(&[]);
        assert_eq!(batch.shape(), [0, 27, 1]);
    }
}
