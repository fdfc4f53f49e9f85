//! Saving and restoring the generator/discriminator pair.
//!
//! Records are written with burn's `CompactRecorder` next to a small
//! `latest_epoch.json` marker, so a later run (or the `generate` command)
//! can find the most recent pair without scanning filenames.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{module::Module, prelude::*, record::CompactRecorder};

use crate::model::{
    discriminator::{Discriminator, DiscriminatorConfig},
    generator::{Generator, GeneratorConfig},
};

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        // creation failures surface on the first save
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes both records for `epoch` and bumps the latest-epoch marker.
    pub fn save<B: Backend>(
        &self,
        generator: &Generator<B>,
        discriminator: &Discriminator<B>,
        epoch: usize,
    ) -> Result<()> {
        let recorder = CompactRecorder::new();

        generator
            .clone()
            .save_file(self.generator_path(epoch), &recorder)
            .with_context(|| format!("failed to save the generator record for epoch {epoch}"))?;
        discriminator
            .clone()
            .save_file(self.discriminator_path(epoch), &recorder)
            .with_context(|| {
                format!("failed to save the discriminator record for epoch {epoch}")
            })?;

        let marker = self.dir.join(LATEST_EPOCH_FILE);
        fs::write(&marker, serde_json::to_string(&epoch)?)
            .with_context(|| format!("failed to write '{}'", marker.display()))?;

        Ok(())
    }

    /// The epoch of the most recent checkpoint, if any run saved one here.
    pub fn latest_epoch(&self) -> Result<usize> {
        let marker = self.dir.join(LATEST_EPOCH_FILE);
        let contents = fs::read_to_string(&marker).with_context(|| {
            format!(
                "cannot read '{}', has training saved a checkpoint yet?",
                marker.display()
            )
        })?;
        let epoch = serde_json::from_str(&contents)
            .with_context(|| format!("'{}' is not a valid epoch marker", marker.display()))?;

        Ok(epoch)
    }

    pub fn load_generator<B: Backend>(
        &self,
        config: &GeneratorConfig,
        device: &B::Device,
    ) -> Result<Generator<B>> {
        let epoch = self.latest_epoch()?;
        let path = self.generator_path(epoch);
        config
            .init::<B>(device)
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| format!("cannot load the generator record '{}'", path.display()))
    }

    pub fn load_discriminator<B: Backend>(
        &self,
        config: &DiscriminatorConfig,
        device: &B::Device,
    ) -> Result<Discriminator<B>> {
        let epoch = self.latest_epoch()?;
        let path = self.discriminator_path(epoch);
        config
            .init::<B>(device)
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .with_context(|| format!("cannot load the discriminator record '{}'", path.display()))
    }

    fn generator_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("generator-{epoch:04}"))
    }

    fn discriminator_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("discriminator-{epoch:04}"))
    }
}
