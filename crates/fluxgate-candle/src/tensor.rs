use candle_core::{Device, Tensor};
use fluxgate_core::{FeatureVector, Predictions};

/// Packs equally sized rows into a `[rows, width]` f32 tensor.
pub fn rows_to_tensor(rows: &[FeatureVector], device: &Device) -> candle_core::Result<Tensor> {
    let width = rows.first().map(FeatureVector::len).unwrap_or(0);
    let data: Vec<f32> = rows
        .iter()
        .flat_map(|row| row.values().iter().map(|&v| v as f32))
        .collect();
    Tensor::from_vec(data, (rows.len(), width), device)
}

pub fn tensor_to_predictions(tensor: &Tensor) -> candle_core::Result<Predictions> {
    let rows = tensor
        .to_vec2::<f32>()?
        .into_iter()
        .map(|row| row.into_iter().map(f64::from).collect())
        .collect();
    Ok(Predictions::new(rows))
}
