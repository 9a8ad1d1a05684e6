use glam::Vec3;
use thiserror::Error;

use crate::{NUM_CHANNELS, NUM_FACES, tables::face_coordinates};

/// Cubemap face, in the order faces are stored in a [`Cubemap`].
///
/// This is a right handed convention with +Y up. The order is fixed: datasets
/// must hand out faces in exactly this order, nothing in the pixel data can
/// tell faces apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Face {
    PosY,
    PosZ,
    PosX,
    NegZ,
    NegX,
    NegY,
}

impl Face {
    pub const ALL: [Self; NUM_FACES] = [
        Self::PosY,
        Self::PosZ,
        Self::PosX,
        Self::NegZ,
        Self::NegX,
        Self::NegY,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::PosY => 0,
            Self::PosZ => 1,
            Self::PosX => 2,
            Self::NegZ => 3,
            Self::NegX => 4,
            Self::NegY => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PosY => "+Y",
            Self::PosZ => "+Z",
            Self::PosX => "+X",
            Self::NegZ => "-Z",
            Self::NegX => "-X",
            Self::NegY => "-Y",
        }
    }

    /// Unnormalized direction through face local coordinates `u, v` in `[-1, 1]`.
    ///
    /// One component always has magnitude 1, so the length is never below 1.
    pub fn raw_direction(self, u: f32, v: f32) -> Vec3 {
        match self {
            Self::PosY => Vec3::new(u, 1.0, v),
            Self::PosZ => Vec3::new(u, -v, 1.0),
            Self::PosX => Vec3::new(1.0, -v, -u),
            Self::NegZ => Vec3::new(-u, -v, -1.0),
            Self::NegX => Vec3::new(-1.0, -v, u),
            Self::NegY => Vec3::new(u, -1.0, -v),
        }
    }
}

impl std::fmt::Display for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CubemapError {
    #[error("Cubemap must have {NUM_FACES} faces, got {0}")]
    FaceCount(usize),

    #[error("Cubemap faces must have {NUM_CHANNELS} channels, face {face} has {channels}")]
    ChannelCount { face: Face, channels: usize },

    #[error("Face {face} is {found:?} but face +Y is {expected:?} (width, height)")]
    FaceSizeMismatch {
        face: Face,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Images need at least one channel")]
    NoChannels,

    #[error("Expected {expected} values, got {found}")]
    DataLength { expected: usize, found: usize },

    #[error("Resolution must be positive, got {width}x{height}")]
    EmptyResolution { width: u32, height: u32 },

    #[error("Expected a [batch, 6, 3, height, width] array, got shape {0:?}")]
    BatchShape(Vec<usize>),
}

/// A planar float image, stored as (channel, row, column).
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<f32>,
}

impl PlanarImage {
    pub fn new(
        width: u32,
        height: u32,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self, CubemapError> {
        if channels == 0 {
            return Err(CubemapError::NoChannels);
        }
        let expected = channels * width as usize * height as usize;
        if data.len() != expected {
            return Err(CubemapError::DataLength {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Build from interleaved (row, column, channel) pixels, as image decoders return them.
    pub fn from_interleaved(
        width: u32,
        height: u32,
        channels: usize,
        pixels: &[f32],
    ) -> Result<Self, CubemapError> {
        if channels == 0 {
            return Err(CubemapError::NoChannels);
        }
        let plane = width as usize * height as usize;
        let expected = plane * channels;
        if pixels.len() != expected {
            return Err(CubemapError::DataLength {
                expected,
                found: pixels.len(),
            });
        }
        let mut data = vec![0.0; expected];
        for (p, px) in pixels.chunks_exact(channels).enumerate() {
            for (c, &value) in px.iter().enumerate() {
                data[c * plane + p] = value;
            }
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// A single cubemap sample: 6 faces of 3 channel `height x width` pixels.
///
/// Stored contiguously as (face, channel, row, column).
#[derive(Clone, Debug, PartialEq)]
pub struct Cubemap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

fn check_resolution(width: u32, height: u32) -> Result<(), CubemapError> {
    if width == 0 || height == 0 {
        return Err(CubemapError::EmptyResolution { width, height });
    }
    Ok(())
}

impl Cubemap {
    pub fn from_planar(width: u32, height: u32, data: Vec<f32>) -> Result<Self, CubemapError> {
        check_resolution(width, height)?;
        let expected = Self::len_for(width, height);
        if data.len() != expected {
            return Err(CubemapError::DataLength {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Assemble a cubemap from 6 faces given in [`Face::ALL`] order.
    pub fn from_faces(faces: Vec<PlanarImage>) -> Result<Self, CubemapError> {
        if faces.len() != NUM_FACES {
            return Err(CubemapError::FaceCount(faces.len()));
        }
        let (width, height) = (faces[0].width, faces[0].height);

        for (face, img) in Face::ALL.into_iter().zip(&faces) {
            if img.channels != NUM_CHANNELS {
                return Err(CubemapError::ChannelCount {
                    face,
                    channels: img.channels,
                });
            }
            if (img.width, img.height) != (width, height) {
                return Err(CubemapError::FaceSizeMismatch {
                    face,
                    expected: (width, height),
                    found: (img.width, img.height),
                });
            }
        }
        check_resolution(width, height)?;

        let mut data = Vec::with_capacity(Self::len_for(width, height));
        for img in faces {
            data.extend(img.data);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Every pixel of every face set to `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> Result<Self, CubemapError> {
        Self::from_direction_fn(width, height, |_| rgb)
    }

    /// Color every pixel by a function of the unit direction through its center.
    pub fn from_direction_fn(
        width: u32,
        height: u32,
        f: impl Fn(Vec3) -> [f32; 3],
    ) -> Result<Self, CubemapError> {
        check_resolution(width, height)?;
        let us = face_coordinates(width);
        let vs = face_coordinates(height);
        let plane = width as usize * height as usize;

        let mut data = vec![0.0; Self::len_for(width, height)];
        for face in Face::ALL {
            let face_data = &mut data[face.index() * NUM_CHANNELS * plane..][..NUM_CHANNELS * plane];
            for (i, &v) in vs.iter().enumerate() {
                for (j, &u) in us.iter().enumerate() {
                    let rgb = f(face.raw_direction(u, v).normalize());
                    let p = i * width as usize + j;
                    for (c, value) in rgb.into_iter().enumerate() {
                        face_data[c * plane + p] = value;
                    }
                }
            }
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    fn len_for(width: u32, height: u32) -> usize {
        NUM_FACES * NUM_CHANNELS * width as usize * height as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// All channels of one face, as (channel, row, column).
    pub fn face_data(&self, face: Face) -> &[f32] {
        let len = NUM_CHANNELS * self.width as usize * self.height as usize;
        &self.data[face.index() * len..][..len]
    }

    pub fn face_data_mut(&mut self, face: Face) -> &mut [f32] {
        let len = NUM_CHANNELS * self.width as usize * self.height as usize;
        &mut self.data[face.index() * len..][..len]
    }

    /// Split back into the 6 faces, in [`Face::ALL`] order.
    pub fn into_faces(self) -> Vec<PlanarImage> {
        let len = NUM_CHANNELS * self.width as usize * self.height as usize;
        self.data
            .chunks_exact(len)
            .map(|chunk| PlanarImage {
                width: self.width,
                height: self.height,
                channels: NUM_CHANNELS,
                data: chunk.to_vec(),
            })
            .collect()
    }
}
