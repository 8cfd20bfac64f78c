use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

/// Unary operations: one input, one output, element-wise.
#[derive(Clone, Copy)]
pub enum UnaryOp {
    Neg,  // -x
    Exp,  // e^x
    Log,  // ln(x)
    Relu, // max(x, 0)
}

/// Gradient function for unary operations; keeps a copy of the input
/// values since the local derivative depends on them.
struct UnaryGradFn {
    op: UnaryOp,
    input: Vec<f32>,
    shape: Vec<usize>,
}

impl GradFn for UnaryGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let grad: Vec<f32> = out_grad
            .data
            .iter()
            .zip(self.input.iter())
            .map(|(&g, &x)| match self.op {
                UnaryOp::Neg => -g,
                UnaryOp::Exp => g * x.exp(),
                UnaryOp::Log => g / x,
                UnaryOp::Relu => {
                    if x > 0.0 {
                        g
                    } else {
                        0.0
                    }
                }
            })
            .collect();
        vec![Some(RawTensor::new(grad, &self.shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(UnaryGradFn {
            op: self.op,
            input: self.input.clone(),
            shape: self.shape.clone(),
        })
    }
}

impl RawTensor {
    fn unary_op(self_t: &Tensor, op: UnaryOp) -> Tensor {
        let (data, shape, req_grad) = {
            let s = self_t.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };

        let result: Vec<f32> = data
            .iter()
            .map(|&x| match op {
                UnaryOp::Neg => -x,
                UnaryOp::Exp => x.exp(),
                UnaryOp::Log => x.ln(),
                UnaryOp::Relu => x.max(0.0),
            })
            .collect();

        let out = Self::new(result, &shape, req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(UnaryGradFn {
                op,
                input: data,
                shape,
            }));
        }
        out
    }

    pub fn neg(self_t: &Tensor) -> Tensor {
        Self::unary_op(self_t, UnaryOp::Neg)
    }
    pub fn exp(self_t: &Tensor) -> Tensor {
        Self::unary_op(self_t, UnaryOp::Exp)
    }
    pub fn log(self_t: &Tensor) -> Tensor {
        Self::unary_op(self_t, UnaryOp::Log)
    }
    pub fn relu(self_t: &Tensor) -> Tensor {
        Self::unary_op(self_t, UnaryOp::Relu)
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn relu_zeroes_negatives_and_masks_gradient() {
        let x = RawTensor::new(vec![-1.0, 0.5, 2.0], &[3], true);
        let y = x.relu();
        assert_eq!(y.borrow().data, vec![0.0, 0.5, 2.0]);
        y.sum().backward();
        assert_eq!(x.grad().unwrap(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn exp_gradient_is_exp() {
        let x = RawTensor::new(vec![0.0, 1.0], &[2], true);
        let y = x.exp();
        y.sum().backward();
        let g = x.grad().unwrap();
        assert!((g[0] - 1.0).abs() < 1e-6);
        assert!((g[1] - std::f32::consts::E).abs() < 1e-5);
    }
}
