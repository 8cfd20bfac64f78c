use crate::autograd::GradFn;
use crate::tensor::{RawTensor, Tensor};

// ===== MATRIX MULTIPLICATION =====

impl RawTensor {
    /// Transpose a 2D matrix stored row-major.
    ///
    /// For shape [m, n], produces shape [n, m].
    pub(crate) fn transpose_2d(data: &[f32], shape: &[usize]) -> Vec<f32> {
        assert_eq!(shape.len(), 2, "Transpose expects 2D shape");
        let (m, n) = (shape[0], shape[1]);
        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                result[j * m + i] = data[i * n + j];
            }
        }
        result
    }

    /// Raw matrix multiplication: (m,k) @ (k,n) -> (m,n)
    ///
    /// Naive O(mnk) with the inner loop over the contiguous dimension.
    pub fn matmul_raw(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        let mut result = vec![0.0; m * n];
        for i in 0..m {
            for p in 0..k {
                let a_ip = a[i * k + p];
                if a_ip == 0.0 {
                    continue;
                }
                let b_row = &b[p * n..(p + 1) * n];
                let out_row = &mut result[i * n..(i + 1) * n];
                for j in 0..n {
                    out_row[j] += a_ip * b_row[j];
                }
            }
        }
        result
    }

    /// Matrix multiplication: (m,k) @ (k,n) -> (m,n)
    pub fn matmul(self_t: &Tensor, other: &Tensor) -> Tensor {
        let (data_a, shape_a, req_a) = {
            let s = self_t.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };
        let (data_b, shape_b, req_b) = {
            let o = other.borrow();
            (o.data.clone(), o.shape.clone(), o.requires_grad)
        };

        assert_eq!(shape_a.len(), 2, "matmul expects 2D tensors");
        assert_eq!(shape_b.len(), 2, "matmul expects 2D tensors");
        let (m, k) = (shape_a[0], shape_a[1]);
        let (k2, n) = (shape_b[0], shape_b[1]);
        assert_eq!(
            k, k2,
            "Matmul dimension mismatch: ({m},{k}) @ ({k2},{n})"
        );

        let result = Self::matmul_raw(&data_a, &data_b, m, k, n);
        let out = Self::new(result, &[m, n], req_a || req_b);

        if req_a || req_b {
            out.borrow_mut().parents = vec![self_t.clone(), other.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(MatMulGradFn {
                a: data_a,
                b: data_b,
                m,
                k,
                n,
                req_a,
                req_b,
            }));
        }
        out
    }
}

/// Gradient for matmul C = A @ B:
///   dA = dC @ B^T
///   dB = A^T @ dC
struct MatMulGradFn {
    a: Vec<f32>,
    b: Vec<f32>,
    m: usize,
    k: usize,
    n: usize,
    req_a: bool,
    req_b: bool,
}

impl GradFn for MatMulGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let g = &out_grad.data;

        let grad_a = if self.req_a {
            let b_t = RawTensor::transpose_2d(&self.b, &[self.k, self.n]);
            let da = RawTensor::matmul_raw(g, &b_t, self.m, self.n, self.k);
            Some(RawTensor::new(da, &[self.m, self.k], false))
        } else {
            None
        };

        let grad_b = if self.req_b {
            let a_t = RawTensor::transpose_2d(&self.a, &[self.m, self.k]);
            let db = RawTensor::matmul_raw(&a_t, g, self.k, self.m, self.n);
            Some(RawTensor::new(db, &[self.k, self.n], false))
        } else {
            None
        };

        vec![grad_a, grad_b]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(MatMulGradFn {
            a: self.a.clone(),
            b: self.b.clone(),
            m: self.m,
            k: self.k,
            n: self.n,
            req_a: self.req_a,
            req_b: self.req_b,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn matmul_2x2() {
        let a = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], false);
        let b = RawTensor::new(vec![5.0, 6.0, 7.0, 8.0], &[2, 2], false);
        let c = a.matmul(&b);
        assert_eq!(c.borrow().data, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn matmul_gradients() {
        // C = A @ B, loss = sum(C): dA = ones @ B^T, dB = A^T @ ones
        let a = RawTensor::new(vec![1.0, 2.0], &[1, 2], true);
        let b = RawTensor::new(vec![3.0, 4.0, 5.0, 6.0], &[2, 2], true);
        let c = a.matmul(&b);
        c.sum().backward();
        assert_eq!(a.grad().unwrap(), vec![7.0, 11.0]);
        assert_eq!(b.grad().unwrap(), vec![1.0, 1.0, 2.0, 2.0]);
    }
}
