//! Projection as burn tensor ops, for computing training targets on the
//! training device.

use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::{
    NUM_BASES, NUM_CHANNELS, NUM_COEFFS, NUM_FACES,
    cubemap::{CubemapError, Face},
    project::ShProjector,
    sh::PROJECTION_SCALE,
};

/// Project a `[batch, 6, 3, height, width]` tensor to `[batch, 27, 1]` coefficients.
///
/// Produces the same values as [`ShProjector::project_raw`] up to f32 summation
/// order.
pub fn project_tensor<B: Backend>(
    projector: &ShProjector,
    cubemap: Tensor<B, 5>,
) -> Result<Tensor<B, 3>, CubemapError> {
    let dims = cubemap.dims();
    let [batch, faces, channels, height, width] = dims;
    if faces != NUM_FACES || channels != NUM_CHANNELS {
        return Err(CubemapError::BatchShape(dims.to_vec()));
    }
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(CubemapError::BatchShape(dims.to_vec()));
    };
    let tables = projector.tables(w, h)?;
    let device = cubemap.device();
    let pixels = width * height;

    let weighted: Vec<f32> = Face::ALL
        .iter()
        .flat_map(|&face| tables.weighted_basis(face).iter().flatten().copied())
        .collect();
    let weighted = Tensor::<B, 3>::from_data(
        TensorData::new(weighted, [NUM_FACES, pixels, NUM_BASES]),
        &device,
    )
    .unsqueeze_dim::<4>(0)
    .repeat_dim(0, batch);

    let colors = cubemap.reshape([batch, NUM_FACES, NUM_CHANNELS, pixels]);

    // [B, 6, 3, 9] summed over faces.
    let per_face = colors.matmul(weighted);
    let coeffs = per_face
        .sum_dim(1)
        .reshape([batch, NUM_CHANNELS, NUM_BASES])
        .swap_dims(1, 2);

    let norm = tables.normalization();
    let scale = PROJECTION_SCALE.map(|s| (s as f64 * norm) as f32);
    let scale = Tensor::<B, 1>::from_floats(scale, &device).reshape([1, NUM_BASES, 1]);

    Ok((coeffs * scale).reshape([batch, NUM_COEFFS, 1]))
}

/// Mean squared error between predicted and target `[batch, 27, 1]` coefficients.
pub fn sh_mse_loss<B: Backend>(pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
    (pred - target).powf_scalar(2.0).mean()
}
