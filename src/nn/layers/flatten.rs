use crate::nn::Module;
use crate::tensor::{Tensor, TensorOps};

/// Flattens the input tensor into a 2D tensor (batch_size, remaining_features).
///
/// Assumes the first dimension is the batch dimension and flattens all
/// subsequent dimensions: (B, D1, D2, ...) -> (B, D1 * D2 * ...).
pub struct Flatten;

impl Module for Flatten {
    fn forward(&self, x: &Tensor) -> Tensor {
        let shape = x.borrow().shape.clone();
        if shape.len() < 2 {
            return x.clone();
        }
        let batch_size = shape[0];
        let flattened_size: usize = shape[1..].iter().product();
        x.reshape(&[batch_size, flattened_size])
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}
