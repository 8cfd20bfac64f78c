use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

/// Binary operations: two inputs, one output.
///
/// Broadcasting is automatically handled for compatible shapes
/// (NumPy-style, right-aligned, size-1 dimensions stretch).
#[derive(Clone, Copy)]
pub enum BinaryOp {
    Add, // x + y
    Sub, // x - y
    Mul, // x * y (element-wise)
    Div, // x / y (element-wise)
}

/// Broadcast two shapes together.
///
/// # Panics
/// Panics if the shapes are incompatible.
pub(crate) fn broadcast_shapes(a: &[usize], b: &[usize]) -> Vec<usize> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0; ndim];
    for i in 0..ndim {
        let da = if i < ndim - a.len() {
            1
        } else {
            a[i - (ndim - a.len())]
        };
        let db = if i < ndim - b.len() {
            1
        } else {
            b[i - (ndim - b.len())]
        };
        assert!(
            da == db || da == 1 || db == 1,
            "Cannot broadcast shapes {a:?} and {b:?}"
        );
        out[i] = da.max(db);
    }
    out
}

/// Materialize `data` (with shape `shape`) at the broadcast resolution
/// `out_shape`, repeating along stretched dimensions.
pub(crate) fn expand_to(data: &[f32], shape: &[usize], out_shape: &[usize]) -> Vec<f32> {
    if shape == out_shape {
        return data.to_vec();
    }
    let out_size: usize = out_shape.iter().product();
    let in_strides = RawTensor::compute_strides(shape);
    let offset = out_shape.len() - shape.len();
    let mut result = Vec::with_capacity(out_size);

    for i in 0..out_size {
        // Output linear index -> coordinates
        let mut rem = i;
        let mut in_idx = 0;
        for (d, &dim_sz) in out_shape.iter().enumerate().rev() {
            let coord = rem % dim_sz;
            rem /= dim_sz;
            if d >= offset {
                let in_d = d - offset;
                let in_coord = if shape[in_d] == 1 { 0 } else { coord };
                in_idx += in_coord * in_strides[in_d];
            }
        }
        result.push(data[in_idx]);
    }
    result
}

/// Sum a gradient at broadcast resolution `from` back down to `to`.
///
/// Each stretched dimension contributed the same input element to many
/// output elements, so those output gradients are accumulated.
pub(crate) fn reduce_to_shape(grad: &[f32], from: &[usize], to: &[usize]) -> Vec<f32> {
    if from == to {
        return grad.to_vec();
    }
    let to_size: usize = to.iter().product();
    let to_strides = RawTensor::compute_strides(to);
    let offset = from.len() - to.len();
    let mut result = vec![0.0; to_size];

    for (i, &g) in grad.iter().enumerate() {
        let mut rem = i;
        let mut to_idx = 0;
        for (d, &dim_sz) in from.iter().enumerate().rev() {
            let coord = rem % dim_sz;
            rem /= dim_sz;
            if d >= offset {
                let to_d = d - offset;
                let to_coord = if to[to_d] == 1 { 0 } else { coord };
                to_idx += to_coord * to_strides[to_d];
            }
        }
        result[to_idx] += g;
    }
    result
}

/// Gradient function for binary operations.
///
/// Stores both inputs materialized at the broadcast resolution; the
/// per-element local gradients are multiplied by the output gradient and
/// then reduced back to each parent's original shape.
struct BinaryGradFn {
    op: BinaryOp,
    a: Vec<f32>,
    b: Vec<f32>,
    out_shape: Vec<usize>,
    shape_a: Vec<usize>,
    shape_b: Vec<usize>,
    req_a: bool,
    req_b: bool,
}

impl GradFn for BinaryGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let g = &out_grad.data;
        let n = g.len();

        let grad_a = if self.req_a {
            let mut da = vec![0.0; n];
            for i in 0..n {
                da[i] = match self.op {
                    BinaryOp::Add | BinaryOp::Sub => g[i],
                    BinaryOp::Mul => g[i] * self.b[i],
                    BinaryOp::Div => g[i] / self.b[i],
                };
            }
            let reduced = reduce_to_shape(&da, &self.out_shape, &self.shape_a);
            Some(RawTensor::new(reduced, &self.shape_a, false))
        } else {
            None
        };

        let grad_b = if self.req_b {
            let mut db = vec![0.0; n];
            for i in 0..n {
                db[i] = match self.op {
                    BinaryOp::Add => g[i],
                    BinaryOp::Sub => -g[i],
                    BinaryOp::Mul => g[i] * self.a[i],
                    BinaryOp::Div => -g[i] * self.a[i] / (self.b[i] * self.b[i]),
                };
            }
            let reduced = reduce_to_shape(&db, &self.out_shape, &self.shape_b);
            Some(RawTensor::new(reduced, &self.shape_b, false))
        } else {
            None
        };

        vec![grad_a, grad_b]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(BinaryGradFn {
            op: self.op,
            a: self.a.clone(),
            b: self.b.clone(),
            out_shape: self.out_shape.clone(),
            shape_a: self.shape_a.clone(),
            shape_b: self.shape_b.clone(),
            req_a: self.req_a,
            req_b: self.req_b,
        })
    }
}

impl RawTensor {
    fn binary_op(self_t: &Tensor, other: &Tensor, op: BinaryOp) -> Tensor {
        let (data_a, shape_a, req_a) = {
            let a = self_t.borrow();
            (a.data.clone(), a.shape.clone(), a.requires_grad)
        };
        let (data_b, shape_b, req_b) = {
            let b = other.borrow();
            (b.data.clone(), b.shape.clone(), b.requires_grad)
        };

        let out_shape = broadcast_shapes(&shape_a, &shape_b);
        let ea = expand_to(&data_a, &shape_a, &out_shape);
        let eb = expand_to(&data_b, &shape_b, &out_shape);

        let result: Vec<f32> = ea
            .iter()
            .zip(eb.iter())
            .map(|(&x, &y)| match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
            })
            .collect();

        let out = Self::new(result, &out_shape, req_a || req_b);
        if req_a || req_b {
            out.borrow_mut().parents = vec![self_t.clone(), other.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(BinaryGradFn {
                op,
                a: ea,
                b: eb,
                out_shape,
                shape_a,
                shape_b,
                req_a,
                req_b,
            }));
        }
        out
    }

    pub fn add(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Add)
    }
    pub fn sub(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Sub)
    }
    pub fn elem_mul(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Mul)
    }
    pub fn div(self_t: &Tensor, other: &Tensor) -> Tensor {
        Self::binary_op(self_t, other, BinaryOp::Div)
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn add_broadcasts_bias_over_batch() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], false);
        let b = RawTensor::new(vec![10.0, 20.0], &[2], false);
        let y = x.add(&b);
        assert_eq!(y.borrow().shape, vec![2, 2]);
        assert_eq!(y.borrow().data, vec![11.0, 22.0, 13.0, 24.0]);
    }

    #[test]
    fn broadcast_gradient_sums_over_stretched_dims() {
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], true);
        let b = RawTensor::new(vec![10.0, 20.0], &[2], true);
        let y = x.add(&b);
        let loss = y.sum();
        loss.backward();

        assert_eq!(x.grad().unwrap(), vec![1.0, 1.0, 1.0, 1.0]);
        // bias received gradient from both rows
        assert_eq!(b.grad().unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn mul_gradient_is_other_operand() {
        let x = RawTensor::new(vec![2.0, 3.0], &[2], true);
        let y = RawTensor::new(vec![5.0, 7.0], &[2], true);
        let z = x.elem_mul(&y);
        z.sum().backward();
        assert_eq!(x.grad().unwrap(), vec![5.0, 7.0]);
        assert_eq!(y.grad().unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn sub_keepdim_broadcast_used_by_softmax() {
        // [2,3] - [2,1], the shape pairing softmax relies on
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], false);
        let m = RawTensor::new(vec![3.0, 6.0], &[2, 1], false);
        let y = x.sub(&m);
        assert_eq!(y.borrow().data, vec![-2.0, -1.0, 0.0, -2.0, -1.0, 0.0]);
    }
}
