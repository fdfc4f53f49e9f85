use burn::{
    data::{dataloader::batcher::Batcher, dataset::vision::MnistItem},
    prelude::*,
};

// ////////////////////////////////////////////////////////////////////////////
// Batch
// ////////////////////////////////////////////////////////////////////////////
#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// Images shaped `[batch_size, 1, 28, 28]`, scaled to `[-1, 1]`.
    pub images: Tensor<B, 4>,
    pub size: usize,
}

// ////////////////////////////////////////////////////////////////////////////
// Batcher
// ////////////////////////////////////////////////////////////////////////////
#[derive(Clone, Debug, Default)]
pub struct MnistBatcher {}

impl MnistBatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let size = items.len();

        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, device))
            .map(|tensor| tensor.reshape([1, 1, 28, 28]))
            // pixels arrive in 0..255, the generator's tanh output lives in [-1, 1]
            .map(|tensor| ((tensor / 255) - 0.5) * 2)
            .collect::<Vec<_>>();

        let images = Tensor::cat(images, 0);

        MnistBatch { images, size }
    }
}
