//! Degree-2 spherical harmonic lighting from cubemap environment captures.
//!
//! The core of this crate is [`ShProjector`], which integrates a 6-face cubemap
//! against the first 9 real SH basis functions and returns 9 coefficients per
//! color channel. These are the regression targets a light estimation model is
//! trained against, so the layout of [`ShCoeffs`] (basis-major, 27 values) is a
//! contract with that model's output layer.

pub mod burn_glue;
pub mod cubemap;
pub mod light;
pub mod project;
pub mod sh;
pub mod tables;


pub use cubemap::{Cubemap, CubemapError, Face, PlanarImage};
pub use light::{MainLight, ShHistory, dominant_direction, extract_main_light};
pub use project::{ShProjector, project_cubemaps};
pub use sh::{ShBatch, ShCoeffs};

/// Number of faces in a cubemap.
pub const NUM_FACES: usize = 6;
/// Number of color channels per face.
pub const NUM_CHANNELS: usize = 3;
/// Number of SH basis functions up to and including degree 2.
pub const NUM_BASES: usize = 9;
/// Flattened number of values per sample, `NUM_BASES * NUM_CHANNELS`.
pub const NUM_COEFFS: usize = NUM_BASES * NUM_CHANNELS;
