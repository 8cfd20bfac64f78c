use crate::tensor::Tensor;

/// Adam optimizer with bias-corrected first and second moments.
///
/// The harness seeds `lr` from each configuration's `learning_rate` key and
/// leaves the remaining hyperparameters at their conventional defaults.
pub struct Adam {
    params: Vec<Tensor>,
    lr: f32,
    betas: (f32, f32),
    eps: f32,
    m: Vec<Vec<f32>>, // 1st moment
    v: Vec<Vec<f32>>, // 2nd moment
    t: usize,         // timestep
}

impl Adam {
    #[must_use]
    pub fn new(params: Vec<Tensor>, lr: f32, betas: (f32, f32), eps: f32) -> Self {
        let m = params
            .iter()
            .map(|p| vec![0.0; p.borrow().data.len()])
            .collect();
        let v = params
            .iter()
            .map(|p| vec![0.0; p.borrow().data.len()])
            .collect();
        Adam {
            params,
            lr,
            betas,
            eps,
            m,
            v,
            t: 0,
        }
    }

    /// Adam with the conventional defaults: betas (0.9, 0.999), eps 1e-8.
    #[must_use]
    pub fn with_lr(params: Vec<Tensor>, lr: f32) -> Self {
        Self::new(params, lr, (0.9, 0.999), 1e-8)
    }

    pub fn zero_grad(&self) {
        for param in &self.params {
            param.borrow_mut().grad = None;
        }
    }

    #[allow(clippy::needless_range_loop)]
    pub fn step(&mut self) {
        self.t += 1;

        let m_hat_scale = 1.0 / (1.0 - self.betas.0.powi(self.t as i32));
        let v_hat_scale = 1.0 / (1.0 - self.betas.1.powi(self.t as i32));

        for i in 0..self.params.len() {
            let mut p = self.params[i].borrow_mut();

            // Parameters that didn't participate in this step keep their state
            let grad = match &p.grad {
                Some(g) => g.clone(),
                None => continue,
            };

            let m = &mut self.m[i];
            let v = &mut self.v[i];
            for j in 0..grad.len() {
                m[j] = self.betas.0 * m[j] + (1.0 - self.betas.0) * grad[j];
                v[j] = self.betas.1 * v[j] + (1.0 - self.betas.1) * grad[j].powi(2);
            }

            for j in 0..p.data.len() {
                let m_hat = m[j] * m_hat_scale;
                let v_hat = v[j] * v_hat_scale;
                p.data[j] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{RawTensor, TensorOps};

    #[test]
    fn first_step_moves_by_lr() {
        // With bias correction, the very first Adam step is ~lr * sign(grad)
        let p = RawTensor::new(vec![1.0], &[1], true);
        p.borrow_mut().grad = Some(vec![0.5]);
        let mut opt = Adam::with_lr(vec![p.clone()], 0.1);
        opt.step();
        let val = p.borrow().data[0];
        assert!((val - 0.9).abs() < 1e-4);
    }

    #[test]
    fn converges_on_quadratic() {
        // Minimize (x - 3)^2
        let x = RawTensor::new(vec![0.0], &[1], true);
        let target = RawTensor::new(vec![3.0], &[1], false);
        let mut opt = Adam::with_lr(vec![x.clone()], 0.1);
        for _ in 0..500 {
            opt.zero_grad();
            let loss = RawTensor::mse_loss(&x, &target);
            loss.backward();
            opt.step();
        }
        let val = x.borrow().data[0];
        assert!((val - 3.0).abs() < 0.05, "x = {val}");
    }

    #[test]
    fn zero_grad_clears_gradients() {
        let p = RawTensor::new(vec![1.0], &[1], true);
        p.borrow_mut().grad = Some(vec![0.5]);
        let opt = Adam::with_lr(vec![p.clone()], 0.1);
        opt.zero_grad();
        assert!(p.borrow().grad.is_none());
    }
}
