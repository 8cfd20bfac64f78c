use crate::nn::Module;
use crate::tensor::Tensor;

/// Chain of layers applied in order. The four model architectures in this
/// harness are all built as `Sequential` stacks by the model factory.
pub struct Sequential {
    layers: Vec<Box<dyn Module>>,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Module>>) -> Self {
        Sequential { layers }
    }
}

impl Module for Sequential {
    fn forward(&self, x: &Tensor) -> Tensor {
        let mut current = x.clone();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        current
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.layers.iter().flat_map(|l| l.parameters()).collect()
    }

    fn train(&mut self, mode: bool) {
        for layer in &mut self.layers {
            layer.train(mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Linear, ReLU};
    use crate::tensor::RawTensor;

    #[test]
    fn stacks_layers_in_order() {
        let model = Sequential::new(vec![
            Box::new(Linear::new(4, 8, true)),
            Box::new(ReLU),
            Box::new(Linear::new(8, 2, true)),
        ]);
        let x = RawTensor::ones(&[3, 4]);
        let y = model.forward(&x);
        assert_eq!(y.borrow().shape, vec![3, 2]);
        assert_eq!(model.num_trainable_params(), (4 * 8 + 8) + (8 * 2 + 2));
    }
}
