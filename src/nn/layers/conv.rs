use crate::autograd::GradFn;
use crate::nn::Module;
use crate::tensor::{RawTensor, Tensor, TensorOps};

/// 2D convolution over NCHW input, implemented as im2col + matmul.
///
/// Weight layout: [out_channels, in_channels, kernel, kernel].
/// Output spatial size: (H + 2*padding - kernel) / stride + 1.
pub struct Conv2d {
    pub weight: Tensor,
    pub bias: Option<Tensor>,
    in_ch: usize,
    out_ch: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    pub fn new(
        in_ch: usize,
        out_ch: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        use_bias: bool,
    ) -> Self {
        let w = RawTensor::kaiming_normal(&[out_ch, in_ch, kernel, kernel]);
        w.borrow_mut().requires_grad = true;
        let b = if use_bias {
            let b = RawTensor::zeros(&[out_ch]);
            b.borrow_mut().requires_grad = true;
            Some(b)
        } else {
            None
        };
        Conv2d {
            weight: w,
            bias: b,
            in_ch,
            out_ch,
            kernel,
            stride,
            padding,
        }
    }
}

impl Module for Conv2d {
    fn forward(&self, x: &Tensor) -> Tensor {
        let shape = x.borrow().shape.clone();
        assert_eq!(shape.len(), 4, "Conv2d expects NCHW input");
        let (batch, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        assert_eq!(c, self.in_ch, "Conv2d channel mismatch");

        let oh = (h + 2 * self.padding - self.kernel) / self.stride + 1;
        let ow = (w + 2 * self.padding - self.kernel) / self.stride + 1;

        // (B, C, H, W) -> (B*OH*OW, C*K*K), one row per receptive field
        let cols = RawTensor::im2col(x, self.kernel, self.stride, self.padding);
        // (O, C, K, K) -> (C*K*K, O)
        let ckk = self.in_ch * self.kernel * self.kernel;
        let w2d = self.weight.reshape(&[self.out_ch, ckk]).transpose();
        // (B*OH*OW, C*K*K) @ (C*K*K, O) -> (B*OH*OW, O)
        let mut out = cols.matmul(&w2d);
        if let Some(b) = &self.bias {
            out = out.add(b);
        }
        // rows are ordered (b, oh, ow), so reshape to BHWC then move channels first
        out.reshape(&[batch, oh, ow, self.out_ch])
            .permute(&[0, 3, 1, 2])
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut p = vec![self.weight.clone()];
        if let Some(ref b) = self.bias {
            p.push(b.clone());
        }
        p
    }
}

// ===== IM2COL =====

/// Gradient for im2col: scatter-add each column element back to its source
/// pixel (col2im). Padding positions contributed zeros and receive nothing.
struct Im2ColGradFn {
    input_shape: Vec<usize>,
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl GradFn for Im2ColGradFn {
    fn backward(&self, out_grad: &RawTensor, _parents: &[Tensor]) -> Vec<Option<Tensor>> {
        let (batch, c, h, w) = (
            self.input_shape[0],
            self.input_shape[1],
            self.input_shape[2],
            self.input_shape[3],
        );
        let k = self.kernel;
        let oh = (h + 2 * self.padding - k) / self.stride + 1;
        let ow = (w + 2 * self.padding - k) / self.stride + 1;
        let row_len = c * k * k;

        let mut grad = vec![0.0; batch * c * h * w];
        for b in 0..batch {
            for out_y in 0..oh {
                for out_x in 0..ow {
                    let row = ((b * oh) + out_y) * ow + out_x;
                    for ch in 0..c {
                        for ki in 0..k {
                            let in_y = out_y * self.stride + ki;
                            if in_y < self.padding || in_y - self.padding >= h {
                                continue;
                            }
                            for kj in 0..k {
                                let in_x = out_x * self.stride + kj;
                                if in_x < self.padding || in_x - self.padding >= w {
                                    continue;
                                }
                                let col = (ch * k + ki) * k + kj;
                                let src = row * row_len + col;
                                let dst = ((b * c + ch) * h + (in_y - self.padding)) * w
                                    + (in_x - self.padding);
                                grad[dst] += out_grad.data[src];
                            }
                        }
                    }
                }
            }
        }
        vec![Some(RawTensor::new(grad, &self.input_shape, false))]
    }

    fn clone_box(&self) -> Box<dyn GradFn> {
        Box::new(Im2ColGradFn {
            input_shape: self.input_shape.clone(),
            kernel: self.kernel,
            stride: self.stride,
            padding: self.padding,
        })
    }
}

impl RawTensor {
    /// Unfold (B, C, H, W) into a (B*OH*OW, C*K*K) matrix where each row is
    /// one flattened receptive field. Out-of-bounds positions (from padding)
    /// are zero.
    pub fn im2col(self_t: &Tensor, kernel: usize, stride: usize, padding: usize) -> Tensor {
        let (data, shape, req_grad) = {
            let s = self_t.borrow();
            (s.data.clone(), s.shape.clone(), s.requires_grad)
        };
        assert_eq!(shape.len(), 4, "im2col expects NCHW input");
        let (batch, c, h, w) = (shape[0], shape[1], shape[2], shape[3]);
        let oh = (h + 2 * padding - kernel) / stride + 1;
        let ow = (w + 2 * padding - kernel) / stride + 1;
        let row_len = c * kernel * kernel;

        let mut result = vec![0.0; batch * oh * ow * row_len];
        for b in 0..batch {
            for out_y in 0..oh {
                for out_x in 0..ow {
                    let row = ((b * oh) + out_y) * ow + out_x;
                    for ch in 0..c {
                        for ki in 0..kernel {
                            let in_y = out_y * stride + ki;
                            if in_y < padding || in_y - padding >= h {
                                continue;
                            }
                            for kj in 0..kernel {
                                let in_x = out_x * stride + kj;
                                if in_x < padding || in_x - padding >= w {
                                    continue;
                                }
                                let col = (ch * kernel + ki) * kernel + kj;
                                let src = ((b * c + ch) * h + (in_y - padding)) * w
                                    + (in_x - padding);
                                result[row * row_len + col] = data[src];
                            }
                        }
                    }
                }
            }
        }

        let out = Self::new(result, &[batch * oh * ow, row_len], req_grad);
        if req_grad {
            out.borrow_mut().parents = vec![self_t.clone()];
            out.borrow_mut().grad_fn = Some(Box::new(Im2ColGradFn {
                input_shape: shape,
                kernel,
                stride,
                padding,
            }));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_shape_with_padding() {
        // (2, 1, 8, 8) through Conv2d(1 -> 4, k=3, s=1, p=1) keeps 8x8
        let conv = Conv2d::new(1, 4, 3, 1, 1, true);
        let x = RawTensor::randn(&[2, 1, 8, 8]);
        let y = conv.forward(&x);
        assert_eq!(y.borrow().shape, vec![2, 4, 8, 8]);
    }

    #[test]
    fn identity_kernel_reproduces_input() {
        // 1x1 kernel with weight 1 and no bias is the identity map
        let conv = Conv2d::new(1, 1, 1, 1, 0, false);
        conv.weight.borrow_mut().data = vec![1.0];
        let x = RawTensor::new(vec![1.0, 2.0, 3.0, 4.0], &[1, 1, 2, 2], false);
        let y = conv.forward(&x);
        assert_eq!(y.borrow().shape, vec![1, 1, 2, 2]);
        assert_eq!(y.borrow().data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn im2col_extracts_receptive_fields() {
        // 3x3 image, k=2, s=1, p=0 -> 4 rows of 4 elements
        let data: Vec<f32> = (1..=9).map(|v| v as f32).collect();
        let x = RawTensor::new(data, &[1, 1, 3, 3], false);
        let cols = RawTensor::im2col(&x, 2, 1, 0);
        assert_eq!(cols.borrow().shape, vec![4, 4]);
        assert_eq!(cols.borrow().data[0..4], [1.0, 2.0, 4.0, 5.0]);
        assert_eq!(cols.borrow().data[12..16], [5.0, 6.0, 8.0, 9.0]);
    }

    #[test]
    fn gradients_reach_kernel_and_input() {
        let conv = Conv2d::new(1, 2, 3, 1, 1, true);
        let x = RawTensor::randn(&[1, 1, 5, 5]);
        x.borrow_mut().requires_grad = true;
        let y = conv.forward(&x);
        y.sum().backward();
        assert_eq!(conv.weight.grad().unwrap().len(), 2 * 1 * 3 * 3);
        assert_eq!(x.grad().unwrap().len(), 25);
    }

    #[test]
    fn parameter_count() {
        let conv = Conv2d::new(3, 8, 3, 1, 1, true);
        assert_eq!(conv.num_trainable_params(), 8 * 3 * 3 * 3 + 8);
    }
}
