use anyhow::{Context, Result};
use burn::{
    config::Config,
    data::{dataloader::DataLoaderBuilder, dataset::vision::MnistDataset},
    optim::AdamConfig,
    tensor::{Device, Distribution, Tensor},
};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dcgan_mnist::{
    checkpoint::CheckpointManager,
    data::MnistBatcher,
    model::{discriminator::DiscriminatorConfig, generator::GeneratorConfig, DcganConfig},
    training::{train, TrainingConfig},
    utils::{save_image, to_image_tensor, write_gif},
    MyAutodiffBackend, MyBackend,
};

#[derive(Parser)]
#[command(name = "dcgan-mnist")]
#[command(about = "Train a DCGAN on MNIST and sample handwritten digits")]
struct Cli {
    /// Directory for the config, checkpoints, sample grids and metrics
    #[arg(long, default_value = "artifacts")]
    artifact_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the generator/discriminator pair
    Train {
        #[arg(short, long, default_value_t = 50)]
        epochs: usize,
        #[arg(short, long, default_value_t = 256)]
        batch_size: usize,
        #[arg(long, default_value_t = 100)]
        latent_dim: usize,
        #[arg(long, default_value_t = 1e-4)]
        gen_lr: f64,
        #[arg(long, default_value_t = 1e-4)]
        disc_lr: f64,
        /// Save both records every N epochs
        #[arg(long, default_value_t = 15)]
        checkpoint_every: usize,
        /// Render the evaluation grid every N epochs
        #[arg(long, default_value_t = 1)]
        sample_every: usize,
        /// Label smoothing factor for the BCE targets, e.g. 0.1
        #[arg(long)]
        label_smoothing: Option<f32>,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Continue from the latest checkpoint in the artifact directory
        #[arg(long)]
        resume: bool,
    },
    /// Sample a grid of digits from the latest generator checkpoint
    Generate {
        /// Number of images to sample
        #[arg(short, long, default_value_t = 16)]
        num_samples: usize,
        /// Images per grid row
        #[arg(long, default_value_t = 4)]
        nrow: u32,
        /// Output PNG path
        #[arg(short, long, default_value = "generated.png")]
        output: String,
    },
    /// Assemble the per-epoch sample grids into an animated GIF
    Gif {
        /// Output GIF path
        #[arg(short, long, default_value = "dcgan.gif")]
        output: String,
        /// Frame delay in milliseconds
        #[arg(long, default_value_t = 100)]
        delay_ms: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            epochs,
            batch_size,
            latent_dim,
            gen_lr,
            disc_lr,
            checkpoint_every,
            sample_every,
            label_smoothing,
            seed,
            resume,
        } => {
            let device = Device::<MyAutodiffBackend>::default();

            let model = DcganConfig::new(
                GeneratorConfig::new().with_latent_dim(latent_dim),
                DiscriminatorConfig::new(),
            );
            // both optimizers share these hyperparameters
            let config = TrainingConfig::new(model, AdamConfig::new().with_beta_1(0.5))
                .with_num_epochs(epochs)
                .with_batch_size(batch_size)
                .with_gen_lr(gen_lr)
                .with_disc_lr(disc_lr)
                .with_checkpoint_interval(checkpoint_every)
                .with_sample_interval(sample_every)
                .with_label_smoothing(label_smoothing)
                .with_seed(seed);

            let dataloader_train = DataLoaderBuilder::new(MnistBatcher::new())
                .batch_size(config.batch_size)
                .shuffle(config.seed)
                .num_workers(config.num_workers)
                .build(MnistDataset::train());

            info!(
                "training for {} epochs into '{}'",
                config.num_epochs, cli.artifact_dir
            );
            let metrics = train::<MyAutodiffBackend>(
                &cli.artifact_dir,
                config,
                dataloader_train,
                &device,
                resume,
            )?;
            info!(
                "done, final D loss: {:+.5}, G loss: {:+.5}",
                metrics.latest_disc_loss().unwrap_or(0.0),
                metrics.latest_gen_loss().unwrap_or(0.0)
            );
        }

        Commands::Generate {
            num_samples,
            nrow,
            output,
        } => {
            let device = Device::<MyBackend>::default();

            let config = TrainingConfig::load(format!("{}/config.json", cli.artifact_dir))
                .map_err(|err| {
                    anyhow::anyhow!(
                        "cannot load '{}/config.json' ({err}), has training run here?",
                        cli.artifact_dir
                    )
                })?;
            let checkpointer = CheckpointManager::new(cli.artifact_dir.as_str());
            let generator =
                checkpointer.load_generator::<MyBackend>(&config.model.generator, &device)?;

            let noise = Tensor::<MyBackend, 2>::random(
                [num_samples, config.model.generator.latent_dim],
                Distribution::Normal(0.0, 1.0),
                &device,
            );
            let images = to_image_tensor(generator.forward(noise));
            save_image::<MyBackend, _>(images, nrow, &output)
                .with_context(|| format!("failed to write '{output}'"))?;
            info!("wrote {num_samples} generated digits to '{output}'");
        }

        Commands::Gif { output, delay_ms } => {
            write_gif(&cli.artifact_dir, &output, delay_ms)?;
            info!("wrote the animation to '{output}'");
        }
    }

    Ok(())
}
