use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

// ===== MOVEMENT OPS =====
// Reshape and permute move data between layouts without changing values,
// so their gradients are the inverse movement applied to the output grad.

/// Gradient for reshape: reshape the gradient back to the input shape.
struct ReshapeGradFn {
    input_shape: Vec<usize>,
}

impl GradFn for ReshapeGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        vec![Some(RawTensor::new(
            out_grad.data.clone(),
            &self.input_shape,
            false,
        ))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(ReshapeGradFn {
            input_shape: self.input_shape.clone(),
        })
    }
}

/// Gradient for permute: permute by the inverse axis order.
struct PermuteGradFn {
    input_shape: Vec<usize>,
    axes: Vec<usize>,
}

impl GradFn for PermuteGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let mut inverse = vec![0; self.axes.len()];
        for (i, &ax) in self.axes.iter().enumerate() {
            inverse[ax] = i;
        }
        let out_shape: Vec<usize> = self.axes.iter().map(|&ax| self.input_shape[ax]).collect();
        let data = permute_data(&out_grad.data, &out_shape, &inverse);
        vec![Some(RawTensor::new(data, &self.input_shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(PermuteGradFn {
            input_shape: self.input_shape.clone(),
            axes: self.axes.clone(),
        })
    }
}

/// Reorder `data` (shape `shape`) so axis `axes[d]` of the input becomes
/// axis `d` of the output.
fn permute_data(data: &[f32], shape: &[usize], axes: &[usize]) -> Vec<f32> {
    let out_shape: Vec<usize> = axes.iter().map(|&ax| shape[ax]).collect();
    let in_strides = RawTensor::compute_strides(shape);
    let out_size: usize = out_shape.iter().product();
    let mut result = Vec::with_capacity(out_size);

    for i in 0..out_size {
        let mut rem = i;
        let mut in_idx = 0;
        for (d, &dim_sz) in out_shape.iter().enumerate().rev() {
            let coord = rem % dim_sz;
            rem /= dim_sz;
            in_idx += coord * in_strides[axes[d]];
        }
        result.push(data[in_idx]);
    }
    result
}

impl RawTensor {
    /// Reshape to a new shape with the same number of elements.
    ///
    /// # Panics
    /// Panics if the element counts differ.
    pub fn reshape(self_t: &Tensor, new_shape: &[usize]) -> Tensor {
        let (data, shape, req_grad) = {
            let s = self_t.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };
        assert_eq!(
            data.len(),
            new_shape.iter().product::<usize>(),
            "Cannot reshape {:?} to {:?}",
            shape,
            new_shape
        );

        let out = Self::new(data, new_shape, req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(ReshapeGradFn { input_shape: shape }));
        }
        out
    }

    /// Permute axes, e.g. [B, OH, OW, O] -> [B, O, OH, OW] with axes [0, 3, 1, 2].
    pub fn permute(self_t: &Tensor, axes: &[usize]) -> Tensor {
        let (data, shape, req_grad) = {
            let s = self_t.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };
        assert_eq!(axes.len(), shape.len(), "Permute axes must cover all dims");

        let out_shape: Vec<usize> = axes.iter().map(|&ax| shape[ax]).collect();
        let result = permute_data(&data, &shape, axes);

        let out = Self::new(result, &out_shape, req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(PermuteGradFn {
                input_shape: shape,
                axes: axes.to_vec(),
            }));
        }
        out
    }

    /// Transpose a 2D tensor
    pub fn transpose(self_t: &Tensor) -> Tensor {
        assert_eq!(
            self_t.borrow().shape.len(),
            2,
            "transpose expects a 2D tensor"
        );
        Self::permute(self_t, &[1, 0])
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn reshape_roundtrips_gradient() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], true);
        let y = x.reshape(&[3, 2]);
        y.sum().backward();
        assert_eq!(x.grad().unwrap(), vec![1.0; 6]);
        assert_eq!(x.borrow().shape, vec![2, 3]);
    }

    #[test]
    fn permute_moves_channels_first() {
        // [1, 2, 2, 3] (BHWC) -> [1, 3, 2, 2] (BCHW)
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let x = RawTensor::new(data, &[1, 2, 2, 3], false);
        let y = x.permute(&[0, 3, 1, 2]);
        assert_eq!(y.borrow().shape, vec![1, 3, 2, 2]);
        // channel 0 of the output gathers every third element
        assert_eq!(y.borrow().data[0..4], [0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn transpose_2d() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], false);
        let y = x.transpose();
        assert_eq!(y.borrow().shape, vec![3, 2]);
        assert_eq!(y.borrow().data, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
