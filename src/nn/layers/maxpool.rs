use crate::autograd::GradFn;
use crate::nn::Module;
use crate::tensor::{RawTensor, Tensor};

/// 2D max pooling over NCHW input.
///
/// Output spatial size: (H - kernel) / stride + 1. The backward pass routes
/// each output gradient solely to the pixel that won the max.
pub struct MaxPool2d {
    kernel: usize,
    stride: usize,
}

impl MaxPool2d {
    pub fn new(kernel: usize, stride: usize) -> Self {
        MaxPool2d { kernel, stride }
    }
}

struct MaxPool2dGradFn {
    input_shape: Vec<usize>,
    // linear index into the input for each output element
    max_indices: Vec<usize>,
}

impl GradFn for MaxPool2dGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let size: usize = self.input_shape.iter().product();
        let mut grad = vec![0.0; size];
        for (out_idx, &in_idx) in self.max_indices.iter().enumerate() {
            grad[in_idx] += out_grad.data[out_idx];
        }
        vec![Some(RawTensor::new(grad, &self.input_shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(MaxPool2dGradFn {
            input_shape: self.input_shape.clone(),
            max_indices: self.max_indices.clone(),
        })
    }
}

impl Module for MaxPool2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let (data, shape, req_grad) = {
            let s = x.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };
        assert_eq!(shape.len(), 4, "MaxPool2d expects NCHW input");
        let (batch, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let oh = (h - self.kernel) / self.stride + 1;
        let ow = (w - self.kernel) / self.stride + 1;

        let mut result = Vec::with_capacity(batch * c * oh * ow);
        let mut max_indices = Vec::with_capacity(batch * c * oh * ow);

        for b in 0..batch {
            for ch in 0..c {
                let plane = (b * c + ch) * h * w;
                for out_y in 0..oh {
                    for out_x in 0..ow {
                        let mut best = f32::NEG_INFINITY;
                        let mut best_idx = 0;
                        for ki in 0..self.kernel {
                            for kj in 0..self.kernel {
                                let in_y = out_y * self.stride + ki;
                                let in_x = out_x * self.stride + kj;
                                let idx = plane + in_y * w + in_x;
                                if data[idx] > best {
                                    best = data[idx];
                                    best_idx = idx;
                                }
                            }
                        }
                        result.push(best);
                        max_indices.push(best_idx);
                    }
                }
            }
        }

        let out = RawTensor::new(result, &[batch, c, oh, ow], req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![x.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(MaxPool2dGradFn {
                input_shape: shape,
                max_indices,
            }));
        }
        out
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::TensorOps;

    #[test]
    fn pools_2x2_windows() {
        let data = vec![
            1.0, 2.0, 5.0, 6.0, //
            3.0, 4.0, 7.0, 8.0, //
            9.0, 1.0, 2.0, 3.0, //
            0.0, 5.0, 4.0, 1.0,
        ];
        let x = RawTensor::new(data, &[1, 1, 4, 4], false);
        let pool = MaxPool2d::new(2, 2);
        let y = pool.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 1, 2, 2]);
        assert_eq!(y.borrow().data, vec![4.0, 8.0, 9.0, 4.0]);
    }

    #[test]
    fn gradient_goes_to_max_only() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let x = RawTensor::new(data, &[1, 1, 2, 2], true);
        let pool = MaxPool2d::new(2, 2);
        let y = pool.forward(&x);
        y.sum().backward();
        assert_eq!(x.grad().unwrap(), vec![0.0, 0.0, 0.0, 1.0]);
    }
}
