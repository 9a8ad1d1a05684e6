//! Paired photograph / skybox dataset in the Matterport layout.
//!
//! ```text
//! <root>/<room>/undistorted_color_images/<id>_i<x>_<y>.jpg
//! <root>/<room>/matterport_skybox_images/<id>_skybox<k>_sami.jpg   k = 0..5
//! ```
//!
//! Skybox face `k` is stored in [`Face::ALL`] order, which is what the
//! projection assumes.

pub mod config;
mod image_io;

use std::path::{Path, PathBuf};

use reallight_sh::{Cubemap, CubemapError, Face, PlanarImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::LoadDatasetConfig;
pub use image_io::{clamp_img_to_max_size, image_to_planar, load_planar_image};

pub const COLOR_IMAGES: &str = "undistorted_color_images";
pub const SKYBOX_IMAGES: &str = "matterport_skybox_images";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error reading {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid skybox for {id}")]
    Cubemap {
        id: String,
        #[source]
        source: CubemapError,
    },

    #[error("No samples found under {0:?}")]
    NoSamples(PathBuf),
}

/// One photograph and its skybox capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub room: String,
    pub image_id: String,
    pub x: String,
    pub y: String,
}

/// Split `<id>_i<x>_<y>.jpg` into its parts.
pub fn parse_color_image_name(name: &str) -> Option<(&str, &str, &str)> {
    let stem = name.strip_suffix(".jpg")?;
    let (rest, y) = stem.rsplit_once('_')?;
    let (id, x) = rest.rsplit_once("_i")?;
    if id.is_empty() || x.is_empty() || y.is_empty() {
        return None;
    }
    Some((id, x, y))
}

impl SampleEntry {
    /// Stable key, used to match predictions to samples.
    pub fn key(&self) -> String {
        format!("{}/{}_i{}_{}", self.room, self.image_id, self.x, self.y)
    }

    pub fn color_image_path(&self, root: &Path) -> PathBuf {
        root.join(&self.room).join(COLOR_IMAGES).join(format!(
            "{}_i{}_{}.jpg",
            self.image_id, self.x, self.y
        ))
    }

    pub fn skybox_face_path(&self, root: &Path, face: Face) -> PathBuf {
        root.join(&self.room).join(SKYBOX_IMAGES).join(format!(
            "{}_skybox{}_sami.jpg",
            self.image_id,
            face.index()
        ))
    }

    pub async fn load_skybox(&self, root: &Path, max_resolution: u32) -> Result<Cubemap, DatasetError> {
        let mut faces = Vec::with_capacity(Face::ALL.len());
        for face in Face::ALL {
            let path = self.skybox_face_path(root, face);
            faces.push(load_planar_image(&path, max_resolution).await?);
        }
        Cubemap::from_faces(faces).map_err(|source| DatasetError::Cubemap {
            id: self.key(),
            source,
        })
    }

    pub async fn load_photo(&self, root: &Path, max_resolution: u32) -> Result<PlanarImage, DatasetError> {
        load_planar_image(&self.color_image_path(root), max_resolution).await
    }
}

#[derive(Clone, Debug)]
pub struct Dataset {
    pub root: PathBuf,
    pub samples: Vec<SampleEntry>,
}

async fn sorted_dir_names(path: &Path) -> Result<Vec<(String, bool)>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_owned(),
        source,
    };
    let mut entries = tokio::fs::read_dir(path).await.map_err(io_err)?;
    let mut names = vec![];
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let is_dir = entry.file_type().await.map_err(io_err)?.is_dir();
        if let Ok(name) = entry.file_name().into_string() {
            names.push((name, is_dir));
        }
    }
    names.sort();
    Ok(names)
}

impl Dataset {
    /// Find every photograph under `root`, sorted by room then file name.
    pub async fn scan(root: &Path, config: &LoadDatasetConfig) -> Result<Self, DatasetError> {
        let mut samples = vec![];
        for (room, is_dir) in sorted_dir_names(root).await? {
            let color_dir = root.join(&room).join(COLOR_IMAGES);
            if !is_dir || !tokio::fs::try_exists(&color_dir).await.unwrap_or(false) {
                continue;
            }
            for (name, _) in sorted_dir_names(&color_dir).await? {
                match parse_color_image_name(&name) {
                    Some((image_id, x, y)) => samples.push(SampleEntry {
                        room: room.clone(),
                        image_id: image_id.to_owned(),
                        x: x.to_owned(),
                        y: y.to_owned(),
                    }),
                    None => log::debug!("Skipping {name} in {room}, not a color image"),
                }
            }
        }

        let subsample = config.subsample.unwrap_or(1).max(1);
        let samples: Vec<_> = samples
            .into_iter()
            .step_by(subsample)
            .take(config.max_samples.unwrap_or(usize::MAX))
            .collect();

        if samples.is_empty() {
            return Err(DatasetError::NoSamples(root.to_owned()));
        }
        log::info!("Found {} samples in {root:?}", samples.len());

        Ok(Self {
            root: root.to_owned(),
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub async fn load_skyboxes(
        &self,
        samples: &[SampleEntry],
        max_resolution: u32,
    ) -> Result<Vec<Cubemap>, DatasetError> {
        let mut cubemaps = Vec::with_capacity(samples.len());
        for sample in samples {
            cubemaps.push(sample.load_skybox(&self.root, max_resolution).await?);
        }
        Ok(cubemaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::{Rgb, RgbImage};
    use reallight_sh::ShProjector;

    #[test]
    fn parses_color_names() {
        assert_eq!(
            parse_color_image_name("0f37bd0737e349de_i1_2.jpg"),
            Some(("0f37bd0737e349de", "1", "2"))
        );
        assert_eq!(
            parse_color_image_name("a_b_i0_5.jpg"),
            Some(("a_b", "0", "5"))
        );
        assert_eq!(parse_color_image_name("abc_d1_2.png"), None);
        assert_eq!(parse_color_image_name("abc_d1_2.jpg"), None);
        assert_eq!(parse_color_image_name("_i1_2.jpg"), None);
    }

    #[test]
    fn paths_follow_layout() {
        let sample = SampleEntry {
            room: "room".to_owned(),
            image_id: "abc".to_owned(),
            x: "1".to_owned(),
            y: "2".to_owned(),
        };
        let root = Path::new("/data");
        assert_eq!(
            sample.color_image_path(root),
            Path::new("/data/room/undistorted_color_images/abc_i1_2.jpg")
        );
        assert_eq!(
            sample.skybox_face_path(root, Face::NegY),
            Path::new("/data/room/matterport_skybox_images/abc_skybox5_sami.jpg")
        );
        assert_eq!(sample.key(), "room/abc_i1_2");
    }

    fn write_sample(root: &Path, room: &str, id: &str, color: [u8; 3]) {
        let color_dir = root.join(room).join(COLOR_IMAGES);
        let sky_dir = root.join(room).join(SKYBOX_IMAGES);
        std::fs::create_dir_all(&color_dir).expect("create dir");
        std::fs::create_dir_all(&sky_dir).expect("create dir");

        RgbImage::from_pixel(8, 6, Rgb(color))
            .save(color_dir.join(format!("{id}_i0_1.jpg")))
            .expect("write photo");
        for k in 0..6 {
            RgbImage::from_pixel(16, 16, Rgb(color))
                .save(sky_dir.join(format!("{id}_skybox{k}_sami.jpg")))
                .expect("write face");
        }
    }

    #[tokio::test]
    async fn scans_and_loads_skyboxes() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_sample(dir.path(), "room_b", "bbb", [255, 255, 255]);
        write_sample(dir.path(), "room_a", "aaa", [0, 0, 0]);
        std::fs::write(dir.path().join("README.txt"), "not a room").expect("write file");

        let dataset = Dataset::scan(dir.path(), &LoadDatasetConfig::default())
            .await
            .expect("scan dataset");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.samples[0].room, "room_a");
        assert_eq!(dataset.samples[1].image_id, "bbb");

        let cubemaps = dataset
            .load_skyboxes(&dataset.samples, u32::MAX)
            .await
            .expect("load skyboxes");
        assert_eq!((cubemaps[1].width(), cubemaps[1].height()), (16, 16));

        let sh = ShProjector::new().project_batch(&cubemaps);
        assert_approx_eq!(sh.samples[0].coeffs[0][0], 0.0, 1e-2);
        assert_approx_eq!(sh.samples[1].coeffs[0][0], 1.0, 1e-2);

        let photo = dataset.samples[0]
            .load_photo(dir.path(), u32::MAX)
            .await
            .expect("load photo");
        assert_eq!((photo.width(), photo.height(), photo.channels()), (8, 6, 3));
    }

    #[tokio::test]
    async fn scan_limits() {
        let dir = tempfile::tempdir().expect("temp dir");
        for id in ["a", "b", "c", "d", "e"] {
            write_sample(dir.path(), "room", id, [128, 128, 128]);
        }
        let config = LoadDatasetConfig {
            subsample: Some(2),
            max_samples: Some(2),
            ..Default::default()
        };
        let dataset = Dataset::scan(dir.path(), &config).await.expect("scan dataset");
        let ids: Vec<_> = dataset.samples.iter().map(|s| s.image_id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn empty_root_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = Dataset::scan(dir.path(), &LoadDatasetConfig::default()).await;
        assert!(matches!(result, Err(DatasetError::NoSamples(_))));
    }

    #[tokio::test]
    async fn missing_face_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_sample(dir.path(), "room", "abc", [10, 20, 30]);
        std::fs::remove_file(
            dir.path()
                .join("room")
                .join(SKYBOX_IMAGES)
                .join("abc_skybox3_sami.jpg"),
        )
        .expect("remove face");

        let dataset = Dataset::scan(dir.path(), &LoadDatasetConfig::default())
            .await
            .expect("scan dataset");
        let result = dataset.samples[0].load_skybox(dir.path(), u32::MAX).await;
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }
}
