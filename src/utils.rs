use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use burn::prelude::*;
use image::{
    buffer::ConvertBuffer,
    codecs::gif::{GifEncoder, Repeat},
    Delay, Frame, ImageResult, Rgb32FImage, RgbImage,
};
use walkdir::WalkDir;

/// Maps generator output `[B, C, H, W]` in tanh range to an image tensor
/// `[B, H, W, C]` in `0.0-1.0`.
pub fn to_image_tensor<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 4> {
    // [B, C, H, W] to [B, H, C, W] to [B, H, W, C]
    let images = images.swap_dims(1, 2).swap_dims(2, 3);
    ((images + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Saves a batch of images `[B, H, W, C]` as a single grid image, `nrow`
/// images per row. Cells past the end of the batch stay black.
pub fn save_image<B: Backend, Q: AsRef<Path>>(
    images: Tensor<B, 4>,
    nrow: u32,
    path: Q,
) -> ImageResult<()> {
    let batch = images.dims()[0] as u32;
    let height = images.dims()[1] as u32;
    let width = images.dims()[2] as u32;
    let ncol = batch.div_ceil(nrow);

    // Supports both 1 and 3 channels image
    let channels = match images.dims()[3] {
        1 => 3,
        3 => 1,
        _ => panic!("Wrong channels number"),
    };

    let mut imgbuf = RgbImage::new(nrow * width, ncol * height);
    // Write images into a nrow*ncol grid layout
    for idx in 0..batch {
        let (col, row) = (idx % nrow, idx / nrow);
        let image: Tensor<B, 3> = images
            .clone()
            .slice([idx as usize..idx as usize + 1])
            .squeeze(0);
        // The Rgb32 should be in range 0.0-1.0
        let image = image.into_data().iter::<f32>().collect::<Vec<f32>>();
        let image = image
            .into_iter()
            .flat_map(|n| std::iter::repeat_n(n, channels))
            .collect();

        let image = Rgb32FImage::from_vec(width, height, image).unwrap();
        let image: RgbImage = image.convert();
        for (x, y, pixel) in image.enumerate_pixels() {
            imgbuf.put_pixel(col * width + x, row * height + y, *pixel);
        }
    }
    imgbuf.save(path)
}

/// Collects the per-epoch sample grids under `artifact_dir` (sorted by file
/// name, so zero-padded epoch numbers play back in order) and stitches them
/// into a looping GIF.
pub fn write_gif(artifact_dir: &str, output: impl AsRef<Path>, frame_delay_ms: u32) -> Result<()> {
    let mut frames = Vec::new();
    for entry in WalkDir::new(artifact_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        let path = entry.path();
        if let Some(ext) = path.extension() {
            let name = entry.file_name().to_string_lossy().to_string();
            if matches!(ext.to_str(), Some("png")) && name.starts_with("image-") {
                frames.push(path.to_path_buf());
            }
        }
    }
    if frames.is_empty() {
        anyhow::bail!("no 'image-*.png' sample grids found under '{artifact_dir}'");
    }

    let output = output.as_ref();
    let file = File::create(output)
        .with_context(|| format!("failed to create '{}'", output.display()))?;
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite)?;

    for path in &frames {
        let image = image::open(path)
            .with_context(|| format!("failed to read frame '{}'", path.display()))?
            .to_rgba8();
        let frame = Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(frame_delay_ms, 1));
        encoder.encode_frame(frame)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::Device;

    #[test]
    fn converts_tanh_output_to_image_layout() {
        let device = Device::<MyBackend>::default();

        let images = Tensor::<MyBackend, 4>::ones([2, 1, 4, 4], &device);
        let converted = to_image_tensor(images);

        assert_eq!(converted.dims(), [2, 4, 4, 1]);
        let values = converted.into_data().iter::<f32>().collect::<Vec<_>>();
        assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-6));

        let images = Tensor::<MyBackend, 4>::ones([2, 1, 4, 4], &device) * -1.0;
        let values = to_image_tensor(images)
            .into_data()
            .iter::<f32>()
            .collect::<Vec<_>>();
        assert!(values.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn saves_a_grid_of_grayscale_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let device = Device::<MyBackend>::default();

        let images = Tensor::<MyBackend, 4>::ones([4, 8, 8, 1], &device);
        save_image::<MyBackend, _>(images, 2, &path).unwrap();

        assert_eq!(image::image_dimensions(&path).unwrap(), (16, 16));
    }

    #[test]
    fn pads_the_grid_when_the_batch_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.png");
        let device = Device::<MyBackend>::default();

        // 3 images on a 2-wide grid still yields 2 rows
        let images = Tensor::<MyBackend, 4>::ones([3, 8, 8, 1], &device);
        save_image::<MyBackend, _>(images, 2, &path).unwrap();

        assert_eq!(image::image_dimensions(&path).unwrap(), (16, 16));
    }

    #[test]
    fn stitches_sample_grids_into_a_gif() {
        let dir = tempfile::tempdir().unwrap();
        let artifact_dir = dir.path().to_str().unwrap().to_string();

        for epoch in 1..=2 {
            let frame = RgbImage::new(4, 4);
            frame
                .save(dir.path().join(format!("image-{epoch:04}.png")))
                .unwrap();
        }
        // unrelated files are ignored
        RgbImage::new(4, 4).save(dir.path().join("other.png")).unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let output = dir.path().join("dcgan.gif");
        write_gif(&artifact_dir, &output, 100).unwrap();

        assert!(output.metadata().unwrap().len() > 0);
    }

    #[test]
    fn gif_without_frames_fails() {
        let dir = tempfile::tempdir().unwrap();
        let artifact_dir = dir.path().to_str().unwrap().to_string();

        assert!(write_gif(&artifact_dir, dir.path().join("dcgan.gif"), 100).is_err());
    }
}
