use std::path::Path;

use image::DynamicImage;
use reallight_sh::{CubemapError, NUM_CHANNELS, PlanarImage};

use crate::DatasetError;

pub fn clamp_img_to_max_size(image: DynamicImage, max_size: u32) -> DynamicImage {
    if image.width() <= max_size && image.height() <= max_size {
        return image;
    }

    let aspect_ratio = image.width() as f32 / image.height() as f32;
    let (new_width, new_height) = if image.width() > image.height() {
        (max_size, (max_size as f32 / aspect_ratio) as u32)
    } else {
        ((max_size as f32 * aspect_ratio) as u32, max_size)
    };
    image.resize_exact(
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Lanczos3,
    )
}

/// RGB in [0, 1], planar. Alpha is dropped, grayscale is expanded.
pub fn image_to_planar(image: &DynamicImage) -> Result<PlanarImage, CubemapError> {
    let _span = tracing::trace_span!("image_to_planar").entered();
    let rgb = image.to_rgb32f();
    PlanarImage::from_interleaved(rgb.width(), rgb.height(), NUM_CHANNELS, rgb.as_raw())
}

pub async fn load_planar_image(path: &Path, max_resolution: u32) -> Result<PlanarImage, DatasetError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| DatasetError::Io {
        path: path.to_owned(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| DatasetError::Decode {
        path: path.to_owned(),
        source,
    })?;
    let image = clamp_img_to_max_size(image, max_resolution);
    image_to_planar(&image).map_err(|source| DatasetError::Cubemap {
        id: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn clamps_keeping_aspect() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let clamped = clamp_img_to_max_size(img, 100);
        assert_eq!((clamped.width(), clamped.height()), (100, 50));

        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        let same = clamp_img_to_max_size(img, u32::MAX);
        assert_eq!((same.width(), same.height()), (64, 64));
    }

    #[test]
    fn converts_to_unit_range_planes() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 51]));
        img.put_pixel(1, 0, Rgb([0, 255, 102]));
        let planar = image_to_planar(&DynamicImage::ImageRgb8(img)).expect("valid image");

        assert_eq!(planar.channels(), 3);
        let d = planar.data();
        assert_approx_eq!(d[0], 1.0);
        assert_approx_eq!(d[1], 0.0);
        assert_approx_eq!(d[2], 0.0);
        assert_approx_eq!(d[3], 1.0);
        assert_approx_eq!(d[4], 0.2);
        assert_approx_eq!(d[5], 0.4);
    }

    #[test]
    fn drops_alpha() {
        let img = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 0]));
        let planar = image_to_planar(&DynamicImage::ImageRgba8(img)).expect("valid image");
        assert_eq!(planar.data().len(), 27);
    }
}
