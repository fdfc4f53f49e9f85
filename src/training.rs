use std::{fs, sync::Arc};

use anyhow::{Context, Result};
use burn::{
    config::Config,
    data::dataloader::DataLoader,
    module::AutodiffModule,
    nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        cast::ToElement,
        Distribution, Int, Tensor,
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::{
    checkpoint::CheckpointManager,
    data::MnistBatch,
    metrics::GanMetrics,
    model::{discriminator::Discriminator, generator::Generator, DcganConfig},
    utils::{save_image, to_image_tensor},
};

// ////////////////////////////////////////////////////////////////////////////
// Helpers
// ////////////////////////////////////////////////////////////////////////////
#[derive(Clone, Debug)]
pub struct DiscOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
    /// Fraction of real images scored real.
    pub real_acc: f32,
    /// Fraction of generated images scored fake.
    pub fake_acc: f32,
}
#[derive(Clone, Debug)]
pub struct GenOutput<B: Backend> {
    pub loss: Tensor<B, 1>,
}

fn calc_disc_loss<B: AutodiffBackend>(
    batch: &MnistBatch<B>,
    noise: Tensor<B, 2>,
    generator: &Generator<B>,
    discriminator: &Discriminator<B>,
    bce: &BinaryCrossEntropyLoss<B>,
) -> DiscOutput<B> {
    // detached so this step only updates the discriminator
    let fake_imgs = generator.forward(noise).detach();

    let fake_out = discriminator.forward(fake_imgs);
    let fake_targets = Tensor::<B, 2, Int>::zeros([batch.size, 1], &fake_out.device());
    let fake_loss = bce.forward(fake_out.clone(), fake_targets);

    let real_out = discriminator.forward(batch.images.clone());
    let real_targets = Tensor::<B, 2, Int>::ones([batch.size, 1], &real_out.device());
    let real_loss = bce.forward(real_out.clone(), real_targets);

    // a logit >= 0 is a sigmoid score >= 0.5
    let real_acc = real_out
        .greater_equal_elem(0.0)
        .float()
        .mean()
        .into_scalar()
        .to_f32();
    let fake_acc = fake_out
        .lower_elem(0.0)
        .float()
        .mean()
        .into_scalar()
        .to_f32();

    DiscOutput {
        loss: fake_loss + real_loss,
        real_acc,
        fake_acc,
    }
}

fn calc_gen_loss<B: AutodiffBackend>(
    batch_size: usize,
    noise: Tensor<B, 2>,
    generator: &Generator<B>,
    discriminator: &Discriminator<B>,
    bce: &BinaryCrossEntropyLoss<B>,
) -> GenOutput<B> {
    let generated = generator.forward(noise);

    let out = discriminator.forward(generated);
    let targets = Tensor::<B, 2, Int>::ones([batch_size, 1], &out.device());
    let loss = bce.forward(out, targets);

    GenOutput { loss }
}

/// Renders the evaluation grid for one epoch into `image-{epoch:04}.png`.
/// Callers hand in an inference-mode generator (`.valid()` during training)
/// so batch norm uses running statistics.
pub fn save_samples<B: Backend>(
    generator: &Generator<B>,
    eval_noise: Tensor<B, 2>,
    artifact_dir: &str,
    epoch: usize,
) -> Result<()> {
    let images = to_image_tensor(generator.forward(eval_noise));
    let path = format!("{artifact_dir}/image-{epoch:04}.png");
    // 4 per row, so the default 16 samples make a square grid
    save_image::<B, _>(images, 4, &path)
        .with_context(|| format!("failed to write the sample grid '{path}'"))?;
    Ok(())
}

/// Health checks logged after each epoch, smoothed over `window` epochs.
fn health_warnings(metrics: &GanMetrics, window: usize) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if metrics.check_mode_collapse(window) {
        warnings.push("possible mode collapse, consider lowering the discriminator learning rate");
    }
    if !metrics.is_balanced(window) {
        warnings.push("discriminator accuracy is out of balance, one network is winning outright");
    }
    warnings
}

// Create the directory to save the config, checkpoints and samples
fn create_artifact_dir(artifact_dir: &str) {
    // Remove existing artifacts
    fs::remove_dir_all(artifact_dir).ok();
    fs::create_dir_all(artifact_dir).ok();
}

/// Restores the latest checkpoint pair plus the recorded history. Any
/// missing or unreadable piece short of the metrics file is an error, which
/// `train` treats as "start fresh".
fn restore_session<B: AutodiffBackend>(
    checkpointer: &CheckpointManager,
    config: &TrainingConfig,
    metrics_path: &str,
    device: &B::Device,
) -> Result<(Generator<B>, Discriminator<B>, GanMetrics, usize)> {
    let epoch = checkpointer.latest_epoch()?;
    let generator = checkpointer.load_generator(&config.model.generator, device)?;
    let discriminator = checkpointer.load_discriminator(&config.model.discriminator, device)?;
    let metrics = GanMetrics::load_csv(metrics_path).unwrap_or_default();

    Ok((generator, discriminator, metrics, epoch + 1))
}

// ////////////////////////////////////////////////////////////////////////////
// Training
// ////////////////////////////////////////////////////////////////////////////
#[derive(Config)]
pub struct TrainingConfig {
    pub model: DcganConfig,
    pub optimizer: AdamConfig,

    #[config(default = 50)]
    pub num_epochs: usize,
    #[config(default = 256)]
    pub batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 1e-4)]
    pub gen_lr: f64,
    #[config(default = 1e-4)]
    pub disc_lr: f64,
    /// Render the evaluation grid every this many epochs, 0 disables it.
    #[config(default = 1)]
    pub sample_interval: usize,
    /// Save both records every this many epochs, 0 keeps only the final pair.
    #[config(default = 15)]
    pub checkpoint_interval: usize,
    /// Number of images in the evaluation grid.
    #[config(default = 16)]
    pub num_samples: usize,
    /// Label smoothing factor for the BCE targets, e.g. 0.1.
    pub label_smoothing: Option<f32>,
}

pub fn train<B: AutodiffBackend>(
    artifact_dir: &str,
    config: TrainingConfig,
    dataloader_train: Arc<dyn DataLoader<B, MnistBatch<B>>>,
    device: &B::Device,
    should_continue: bool,
) -> Result<GanMetrics> {
    if !should_continue {
        create_artifact_dir(artifact_dir);
    }
    let checkpointer = CheckpointManager::new(artifact_dir);
    let metrics_path = format!("{artifact_dir}/metrics.csv");

    config
        .save(format!("{artifact_dir}/config.json"))
        .with_context(|| format!("failed to save the training config to '{artifact_dir}'"))?;

    B::seed(config.seed);

    let mut generator = config.model.generator.init::<B>(device);
    let mut discriminator = config.model.discriminator.init::<B>(device);

    let mut gen_optimizer = config.optimizer.init();
    let mut disc_optimizer = config.optimizer.init();

    // Continue where you left off?
    let mut metrics = GanMetrics::new();
    let mut start_epoch = 1;
    if should_continue {
        match restore_session(&checkpointer, &config, &metrics_path, device) {
            Ok((gen, disc, saved, epoch)) => {
                info!("continuing from the epoch {} checkpoint", epoch - 1);
                generator = gen;
                discriminator = disc;
                metrics = saved;
                start_epoch = epoch;
            }
            Err(err) => {
                info!("unable to load saved model files ({err}), starting a new session");
            }
        }
    }

    let bce = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .with_smoothing(config.label_smoothing)
        .init(device);

    // Fixed latent points, drawn once right after seeding, so successive
    // epoch grids show the same digits sharpen over training
    let eval_noise = Tensor::<B, 2>::random(
        [config.num_samples, config.model.generator.latent_dim],
        Distribution::Normal(0.0, 1.0),
        device,
    );

    let num_batches = dataloader_train.num_items().div_ceil(config.batch_size);

    for epoch in start_epoch..=config.num_epochs {
        let mut d_loss = 0.0;
        let mut g_loss = 0.0;
        let mut real_acc = 0.0;
        let mut fake_acc = 0.0;
        let mut batches = 0usize;

        let bar = ProgressBar::new(num_batches as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{bar:40}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_prefix(format!("epoch {epoch:3}/{:3}", config.num_epochs));

        for batch in dataloader_train.iter() {
            // one noise draw per batch, shared by both steps
            let noise = Tensor::<B, 2>::random(
                [batch.size, config.model.generator.latent_dim],
                Distribution::Normal(0.0, 1.0),
                device,
            );

            let disc_out =
                calc_disc_loss(&batch, noise.clone(), &generator, &discriminator, &bce);
            let disc_loss = disc_out.loss.clone().into_scalar().to_f32();
            let grads = disc_out.loss.backward();
            let grads = GradientsParams::from_grads(grads, &discriminator);
            discriminator = disc_optimizer.step(config.disc_lr, discriminator, grads);

            // train the generator against the freshly updated discriminator
            let gen_out = calc_gen_loss(batch.size, noise, &generator, &discriminator, &bce);
            let gen_loss = gen_out.loss.clone().into_scalar().to_f32();
            let grads = gen_out.loss.backward();
            let grads = GradientsParams::from_grads(grads, &generator);
            generator = gen_optimizer.step(config.gen_lr, generator, grads);

            d_loss += disc_loss as f64;
            g_loss += gen_loss as f64;
            real_acc += disc_out.real_acc as f64;
            fake_acc += disc_out.fake_acc as f64;
            batches += 1;

            bar.set_message(format!("D loss: {disc_loss:+.5}, G loss: {gen_loss:+.5}"));
            bar.inc(1);
        }
        bar.finish_and_clear();

        let n = batches.max(1) as f64;
        let d_loss = d_loss / n;
        let g_loss = g_loss / n;
        let real_acc = real_acc / n;
        let fake_acc = fake_acc / n;
        metrics.record_epoch(g_loss, d_loss, real_acc, fake_acc);

        info!(
            "[Epoch: {:3}/{:3}][D loss: {:+.5}, G loss: {:+.5}][D acc real: {:3.0}%, fake: {:3.0}%]",
            epoch,
            config.num_epochs,
            d_loss,
            g_loss,
            real_acc * 100.0,
            fake_acc * 100.0
        );
        for warning in health_warnings(&metrics, 10) {
            warn!("{warning}");
        }

        if config.sample_interval > 0 && epoch % config.sample_interval == 0 {
            save_samples(
                &generator.valid(),
                eval_noise.clone().inner(),
                artifact_dir,
                epoch,
            )?;
        }
        if config.checkpoint_interval > 0 && epoch % config.checkpoint_interval == 0 {
            checkpointer.save(&generator, &discriminator, epoch)?;
            metrics.save_csv(&metrics_path)?;
        }
    }

    // the final records land on disk regardless of the checkpoint cadence,
    // unless a resumed run was already past the end and trained nothing
    if start_epoch <= config.num_epochs {
        checkpointer.save(&generator, &discriminator, config.num_epochs)?;
        metrics.save_csv(&metrics_path)?;
    }

    Ok(metrics)
}
