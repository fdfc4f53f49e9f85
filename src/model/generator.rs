use burn::{
    module::Module,
    nn::{
        conv::{ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, Linear, LinearConfig,
    },
    prelude::*,
};

use crate::model::layers::UpBlock;

/// Maps latent noise `[batch, latent_dim]` to images `[batch, 1, 28, 28]`
/// with values in `[-1, 1]`.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    project: Linear<B>,
    project_bn: BatchNorm<B, 0>,
    up_layer_1: UpBlock<B>,
    up_layer_2: UpBlock<B>,
    out_layer: ConvTranspose2d<B>,
    lrelu: LeakyRelu,
    feature_maps: usize,
}
impl<B: Backend> Generator<B> {
    pub fn forward(&self, noise: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch_size, _] = noise.dims();

        let output = self.project.forward(noise);
        let output = self.project_bn.forward(output);
        let output = self.lrelu.forward(output);

        // [B, 4 * fm * 7 * 7] to [B, 4 * fm, 7, 7]
        let output = output.reshape([batch_size, self.feature_maps * 4, 7, 7]);

        let output = self.up_layer_1.forward(output);
        let output = self.up_layer_2.forward(output);
        let out = self.out_layer.forward(output);

        burn::tensor::activation::tanh(out)
    }
}

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    /// Size of the latent noise vectors.
    #[config(default = 100)]
    pub latent_dim: usize,
    /// Channel count of the last upsampling stage; earlier stages use
    /// multiples of it.
    #[config(default = 64)]
    pub feature_maps: usize,
}
impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let projected = self.feature_maps * 4 * 7 * 7;

        let project = LinearConfig::new(self.latent_dim, projected)
            .with_bias(false)
            .init(device);
        let project_bn = BatchNormConfig::new(projected)
            .with_momentum(0.8)
            .init::<B, 0>(device);

        // 7x7 stays at stride 1, then two stride 2 stages reach 28x28
        let up_layer_1 = UpBlock::new([self.feature_maps * 4, self.feature_maps * 2], 1, device);
        let up_layer_2 = UpBlock::new([self.feature_maps * 2, self.feature_maps], 2, device);

        let out_layer = ConvTranspose2dConfig::new([self.feature_maps, 1], [5, 5])
            .with_stride([2, 2])
            .with_padding([2, 2])
            .with_padding_out([1, 1])
            .with_bias(false)
            .init(device);
        let lrelu = LeakyReluConfig::new().with_negative_slope(0.2).init();

        Generator {
            project,
            project_bn,
            up_layer_1,
            up_layer_2,
            out_layer,
            lrelu,
            feature_maps: self.feature_maps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::{cast::ToElement, Device, Distribution};

    #[test]
    fn generates_mnist_shaped_images() {
        let device = Device::<MyBackend>::default();
        let generator = GeneratorConfig::new()
            .with_latent_dim(16)
            .with_feature_maps(8)
            .init::<MyBackend>(&device);

        let noise = Tensor::random([4, 16], Distribution::Normal(0.0, 1.0), &device);
        let images = generator.forward(noise);

        assert_eq!(images.dims(), [4, 1, 28, 28]);
    }

    #[test]
    fn output_stays_in_tanh_range() {
        let device = Device::<MyBackend>::default();
        let generator = GeneratorConfig::new()
            .with_latent_dim(16)
            .with_feature_maps(8)
            .init::<MyBackend>(&device);

        let noise = Tensor::random([2, 16], Distribution::Normal(0.0, 1.0), &device);
        let images = generator.forward(noise);

        let max = images.clone().max().into_scalar().to_f32();
        let min = images.min().into_scalar().to_f32();
        assert!(max <= 1.0);
        assert!(min >= -1.0);
    }
}
