use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, LeakyRelu, LeakyReluConfig,
        PaddingConfig2d,
    },
    prelude::*,
};

/// Transposed convolution block of the generator: upsampling conv without
/// bias, batch norm, leaky ReLU.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    conv: ConvTranspose2d<B>,
    bn: BatchNorm<B, 2>,
    lrelu: LeakyRelu,
}
impl<B: Backend> UpBlock<B> {
    pub fn new(channels: [usize; 2], stride: usize, device: &B::Device) -> Self {
        // kernel 5 with padding 2; at stride 2 an output padding of 1 lands
        // the feature map on exactly double the input size
        let conv = ConvTranspose2dConfig::new(channels, [5, 5])
            .with_stride([stride, stride])
            .with_padding([2, 2])
            .with_padding_out([stride - 1, stride - 1])
            .with_bias(false)
            .init(device);
        let bn = BatchNormConfig::new(channels[1])
            .with_momentum(0.8)
            .init(device);
        let lrelu = LeakyReluConfig::new().with_negative_slope(0.2).init();

        Self { conv, bn, lrelu }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = self.bn.forward(output);
        self.lrelu.forward(output)
    }
}

/// Strided convolution block of the discriminator: downsampling conv, leaky
/// ReLU, dropout. No batch norm on the critic side.
#[derive(Module, Debug)]
pub struct DiscBlock<B: Backend> {
    conv: Conv2d<B>,
    lrelu: LeakyRelu,
    dropout: Dropout,
}
impl<B: Backend> DiscBlock<B> {
    pub fn new(channels: [usize; 2], dropout: f64, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new(channels, [5, 5])
            .with_padding(PaddingConfig2d::Explicit(2, 2))
            .with_stride([2, 2])
            .init(device);
        let lrelu = LeakyReluConfig::new().with_negative_slope(0.2).init();
        let dropout = DropoutConfig::new(dropout).init();

        Self {
            conv,
            lrelu,
            dropout,
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.conv.forward(input);
        let output = self.lrelu.forward(output);
        self.dropout.forward(output)
    }
}
