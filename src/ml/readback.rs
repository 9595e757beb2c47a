// Device → host copies used wherever decoded ids or latent
// codes leave the tensor world.

use anyhow::Result;
use burn::prelude::*;

/// `[rows, cols]` int tensor → one `Vec<u32>` per row.
pub fn id_rows<B: Backend>(ids: Tensor<B, 2, Int>) -> Result<Vec<Vec<u32>>> {
    let [rows, cols] = ids.dims();
    let flat = ids
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow::anyhow!("Cannot read ids back from device: {e:?}"))?;
    Ok((0..rows)
        .map(|r| flat[r * cols..(r + 1) * cols].iter().map(|&v| v.max(0) as u32).collect())
        .collect())
}

/// `[rows, cols]` float tensor → one `Vec<f32>` per row.
pub fn float_rows<B: Backend>(values: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [rows, cols] = values.dims();
    let flat = values
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read values back from device: {e:?}"))?;
    Ok(flat.chunks(cols.max(1)).take(rows).map(<[f32]>::to_vec).collect())
}

/// Scalar value of a one-element tensor.
pub fn scalar<B: Backend>(value: Tensor<B, 1>) -> f64 {
    value.into_scalar().elem::<f64>()
}
