pub mod discriminator;
pub mod generator;
mod layers;

use burn::{module::Module, prelude::*};

use crate::model::{
    discriminator::{Discriminator, DiscriminatorConfig},
    generator::{Generator, GeneratorConfig},
};

/// The adversarial pair. The two networks are optimized separately, the
/// wrapper only groups them and their configs.
#[derive(Module, Debug)]
pub struct Dcgan<B: Backend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
}

#[derive(Config, Debug)]
pub struct DcganConfig {
    pub generator: GeneratorConfig,
    pub discriminator: DiscriminatorConfig,
}
impl DcganConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Dcgan<B> {
        let generator = self.generator.init(device);
        let discriminator = self.discriminator.init(device);

        Dcgan {
            generator,
            discriminator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::{Device, Distribution};

    #[test]
    fn generator_output_feeds_the_discriminator() {
        let device = Device::<MyBackend>::default();
        let config = DcganConfig::new(
            GeneratorConfig::new().with_latent_dim(16).with_feature_maps(8),
            DiscriminatorConfig::new().with_feature_maps(8),
        );
        let model = config.init::<MyBackend>(&device);

        let noise = Tensor::random([3, 16], Distribution::Normal(0.0, 1.0), &device);
        let images = model.generator.forward(noise);
        let logits = model.discriminator.forward(images);

        assert_eq!(logits.dims(), [3, 1]);
    }
}
