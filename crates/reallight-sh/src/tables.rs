//! Per resolution lookup tables for cubemap projection.
//!
//! Everything here depends only on the face resolution, never on pixel
//! contents, so tables are built once and shared.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

use glam::Vec3;
use hashbrown::HashMap;

use crate::{
    NUM_BASES, NUM_FACES,
    cubemap::{CubemapError, Face},
    sh::sh_basis,
};

/// Pixel center coordinates mapped to the open interval (-1, 1).
pub fn face_coordinates(n: u32) -> Vec<f32> {
    (0..n)
        .map(|i| ((i as f32 + 0.5) / n as f32) * 2.0 - 1.0)
        .collect()
}

/// Unit direction through every pixel center of a face, row-major.
///
/// Column `j` selects `u` and row `i` selects `v`.
pub fn direction_map(face: Face, width: u32, height: u32) -> Vec<Vec3> {
    let us = face_coordinates(width);
    let vs = face_coordinates(height);
    vs.iter()
        .flat_map(|&v| us.iter().map(move |&u| face.raw_direction(u, v).normalize()))
        .collect()
}

/// Solid angle weight of every pixel, row-major. Identical for all 6 faces.
pub fn solid_angle_map(width: u32, height: u32) -> Vec<f32> {
    let us = face_coordinates(width);
    let vs = face_coordinates(height);
    vs.iter()
        .flat_map(|&v| {
            us.iter().map(move |&u| {
                let s = 1.0 + u * u + v * v;
                4.0 / (s.sqrt() * s)
            })
        })
        .collect()
}

/// Precomputed projection data for one face resolution.
#[derive(Debug)]
pub struct ProjectionTables {
    pixels_per_face: usize,
    total_solid_angle: f64,
    weighted_basis: Vec<[f32; NUM_BASES]>,
}

impl ProjectionTables {
    pub fn new(width: u32, height: u32) -> Result<Self, CubemapError> {
        if width == 0 || height == 0 {
            return Err(CubemapError::EmptyResolution { width, height });
        }
        let _span = tracing::trace_span!("ProjectionTables::new", width, height).entered();

        let solid_angle = solid_angle_map(width, height);
        let total_solid_angle =
            solid_angle.iter().map(|&w| w as f64).sum::<f64>() * NUM_FACES as f64;

        let weighted_basis = Face::ALL
            .into_iter()
            .flat_map(|face| {
                direction_map(face, width, height)
                    .into_iter()
                    .zip(&solid_angle)
                    .map(|(dir, &w)| sh_basis(dir).map(|b| b * w))
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(Self {
            pixels_per_face: solid_angle.len(),
            total_solid_angle,
            weighted_basis,
        })
    }

    pub fn pixels_per_face(&self) -> usize {
        self.pixels_per_face
    }

    /// Discretized solid angle of the whole sphere, 6 times the per face sum.
    pub fn total_solid_angle(&self) -> f64 {
        self.total_solid_angle
    }

    /// Factor turning the weighted pixel sum into an integral over the sphere's 4pi steradians.
    pub fn normalization(&self) -> f64 {
        4.0 * PI / self.total_solid_angle
    }

    /// SH basis times pixel solid angle, for every pixel of one face.
    pub fn weighted_basis(&self, face: Face) -> &[[f32; NUM_BASES]] {
        let n = self.pixels_per_face();
        &self.weighted_basis[face.index() * n..][..n]
    }
}

/// Thread safe cache of [`ProjectionTables`] keyed by `(width, height)`.
#[derive(Debug, Default)]
pub struct TableCache {
    tables: Mutex<HashMap<(u32, u32), Arc<ProjectionTables>>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, width: u32, height: u32) -> Result<Arc<ProjectionTables>, CubemapError> {
        if let Some(tables) = self.lock().get(&(width, height)) {
            return Ok(tables.clone());
        }

        // Build outside the lock, other resolutions shouldn't have to wait.
        let built = Arc::new(ProjectionTables::new(width, height)?);
        log::debug!("Built projection tables for {width}x{height} faces");

        let mut tables = self.lock();
        Ok(tables.entry((width, height)).or_insert(built).clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(u32, u32), Arc<ProjectionTables>>> {
        // Entries are immutable once inserted, so a poisoned map is still consistent.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn coordinates_are_pixel_centers() {
        assert_eq!(face_coordinates(1), vec![0.0]);
        assert_eq!(face_coordinates(2), vec![-0.5, 0.5]);
        assert_eq!(face_coordinates(4), vec![-0.75, -0.25, 0.25, 0.75]);
    }

    #[test]
    fn directions_are_unit_length() {
        for face in Face::ALL {
            for dir in direction_map(face, 5, 3) {
                assert_approx_eq!(dir.length(), 1.0, 1e-6);
            }
        }
    }

    #[test]
    fn xy_indexing() {
        // 2 columns, 1 row: u changes along the row, v is fixed.
        let dirs = direction_map(Face::PosZ, 2, 1);
        assert_eq!(dirs.len(), 2);
        assert!(dirs[0].x < 0.0 && dirs[1].x > 0.0);
        assert_approx_eq!(dirs[0].y, 0.0);

        // 1 column, 2 rows: first row has v < 0, which points up on the front face.
        let dirs = direction_map(Face::PosZ, 1, 2);
        assert!(dirs[0].y > 0.0 && dirs[1].y < 0.0);
        assert_approx_eq!(dirs[0].x, 0.0);
    }

    #[test]
    fn solid_angle_center_pixel() {
        let sa = solid_angle_map(1, 1);
        assert_approx_eq!(sa[0], 4.0);
        // Pixels further from the center cover less of the sphere.
        let sa = solid_angle_map(4, 4);
        assert!(sa[0] < sa[5]);
    }

    #[test]
    fn total_solid_angle_approaches_sphere() {
        // Per pixel weights leave out the 1/n^2 of the pixel area.
        let n = 128;
        let tables = ProjectionTables::new(n, n).expect("valid resolution");
        let area = tables.total_solid_angle() / (n as f64 * n as f64);
        assert_approx_eq!(area, 4.0 * PI, 5e-3);
    }

    #[test]
    fn cache_shares_tables() {
        let cache = TableCache::new();
        let a = cache.get(8, 8).expect("valid resolution");
        let b = cache.get(8, 8).expect("valid resolution");
        assert!(Arc::ptr_eq(&a, &b));
        let _ = cache.get(8, 4).expect("valid resolution");
        assert_eq!(cache.len(), 2);
        assert!(cache.get(0, 8).is_err());
        assert_eq!(cache.len(), 2);
    }
}
