use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

/// Gradient for full-tensor sum: the scalar gradient broadcasts to every
/// input element.
struct SumGradFn {
    input_shape: Vec<usize>,
}

impl GradFn for SumGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let size: usize = self.input_shape.iter().product();
        let g = out_grad.data[0];
        vec![Some(RawTensor::new(vec![g; size], &self.input_shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(SumGradFn {
            input_shape: self.input_shape.clone(),
        })
    }
}

/// Gradient for full-tensor mean: scalar gradient divided by element count.
struct MeanGradFn {
    input_shape: Vec<usize>,
}

impl GradFn for MeanGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let size: usize = self.input_shape.iter().product();
        let g = out_grad.data[0] / size as f32;
        vec![Some(RawTensor::new(vec![g; size], &self.input_shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(MeanGradFn {
            input_shape: self.input_shape.clone(),
        })
    }
}

impl RawTensor {
    /// Sum all elements down to a scalar of shape [1]
    pub fn sum(self_t: &Tensor) -> Tensor {
        let (total, shape, req_grad) = {
            let s = self_t.borrow();
            (s.data.iter().sum(), s.shape.clone(), s.requires_grad)
        };
        let out = Self::new(vec![total], &[1], req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(SumGradFn { input_shape: shape }));
        }
        out
    }

    /// Mean of all elements down to a scalar of shape [1]
    pub fn mean(self_t: &Tensor) -> Tensor {
        let (total, len, shape, req_grad) = {
            let s = self_t.borrow();
            (
                s.data.iter().sum::<f32>(),
                s.data.len(),
                s.shape.clone(),
                s.requires_grad,
            )
        };
        let out = Self::new(vec![total / len as f32], &[1], req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(MeanGradFn { input_shape: shape }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn mean_gradient_is_uniform() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[4], true);
        let m = x.mean();
        assert_eq!(m.borrow().data, vec![2.5]);
        m.backward();
        assert_eq!(x.grad().unwrap(), vec![0.25, 0.25, 0.25, 0.25]);
    }
}
