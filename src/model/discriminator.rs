use burn::{
    module::Module,
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::model::layers::DiscBlock;

/// Scores images `[batch, 1, 28, 28]` with one real/fake logit per image.
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    disc_layer_1: DiscBlock<B>,
    disc_layer_2: DiscBlock<B>,
    out_layer: Linear<B>,
}
impl<B: Backend> Discriminator<B> {
    /// Returns raw logits, the loss applies the sigmoid.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let output = self.disc_layer_1.forward(input);
        let output = self.disc_layer_2.forward(output);

        let output = output.flatten(1, 3);

        self.out_layer.forward(output)
    }
}

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    /// Channel count of the first downsampling stage, doubled in the second.
    #[config(default = 64)]
    pub feature_maps: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
}
impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        // 28x28 to 14x14 to 7x7
        let disc_layer_1 = DiscBlock::new([1, self.feature_maps], self.dropout, device);
        let disc_layer_2 = DiscBlock::new(
            [self.feature_maps, self.feature_maps * 2],
            self.dropout,
            device,
        );

        let out_layer = LinearConfig::new(self.feature_maps * 2 * 7 * 7, 1).init(device);

        Discriminator {
            disc_layer_1,
            disc_layer_2,
            out_layer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::Device;

    #[test]
    fn scores_one_logit_per_image() {
        let device = Device::<MyBackend>::default();
        let discriminator = DiscriminatorConfig::new()
            .with_feature_maps(8)
            .init::<MyBackend>(&device);

        let images = Tensor::zeros([5, 1, 28, 28], &device);
        let logits = discriminator.forward(images);

        assert_eq!(logits.dims(), [5, 1]);
    }
}
