use crate::tensor::Tensor;

pub mod layers;
pub mod optim;

pub use layers::{Conv2d, Flatten, Linear, MaxPool2d, ReLU, Sequential};
pub use optim::Adam;

pub trait Module {
    fn forward(&self, x: &Tensor) -> Tensor;
    fn parameters(&self) -> Vec<Tensor>;

    fn zero_grad(&mut self) {
        for p in self.parameters() {
            p.borrow_mut().grad = None;
        }
    }

    /// Switch between training and evaluation modes.
    /// Only layers with mode-dependent behavior override this.
    fn train(&mut self, _mode: bool) {}
    fn eval(&mut self) {
        self.train(false);
    }

    /// Total element count over all parameters that participate in gradient
    /// updates. This is the `num_params` column of the result table.
    fn num_trainable_params(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.borrow().requires_grad)
            .map(|p| p.borrow().data.len())
            .sum()
    }
}
