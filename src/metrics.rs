//! Per-epoch training history: losses, discriminator accuracies and a couple
//! of health heuristics over them.

use std::path::Path;

use anyhow::{Context, Result};

#[derive(Clone, Debug, Default)]
pub struct GanMetrics {
    pub gen_losses: Vec<f64>,
    pub disc_losses: Vec<f64>,
    pub disc_real_acc: Vec<f64>,
    pub disc_fake_acc: Vec<f64>,
}

impl GanMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_epoch(&mut self, gen_loss: f64, disc_loss: f64, real_acc: f64, fake_acc: f64) {
        self.gen_losses.push(gen_loss);
        self.disc_losses.push(disc_loss);
        self.disc_real_acc.push(real_acc);
        self.disc_fake_acc.push(fake_acc);
    }

    pub fn num_epochs(&self) -> usize {
        self.gen_losses.len()
    }

    pub fn latest_gen_loss(&self) -> Option<f64> {
        self.gen_losses.last().copied()
    }

    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Moving average of the generator loss over the last `window` epochs.
    pub fn gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.gen_losses, window)
    }

    /// Moving average of the discriminator loss over the last `window` epochs.
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.disc_losses, window)
    }

    /// Heuristic collapse signal: the discriminator wins outright while the
    /// generator loss keeps climbing. Needs at least `window` recorded epochs.
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }
        self.disc_loss_ma(window) < 0.1 && self.gen_loss_ma(window) > 3.0
    }

    /// A healthy discriminator is neither fooled all the time nor perfect.
    pub fn is_balanced(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return true;
        }
        let real = moving_average(&self.disc_real_acc, window);
        let fake = moving_average(&self.disc_fake_acc, window);
        (0.4..=0.9).contains(&real) && (0.4..=0.9).contains(&fake)
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;

        writer.write_record(["epoch", "gen_loss", "disc_loss", "disc_real_acc", "disc_fake_acc"])?;
        for epoch in 0..self.num_epochs() {
            writer.write_record([
                (epoch + 1).to_string(),
                self.gen_losses[epoch].to_string(),
                self.disc_losses[epoch].to_string(),
                self.disc_real_acc[epoch].to_string(),
                self.disc_fake_acc[epoch].to_string(),
            ])?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?;

        let mut metrics = Self::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| {
                record
                    .get(idx)
                    .with_context(|| format!("metrics row is missing column {idx}"))
            };
            metrics.record_epoch(
                field(1)?.parse()?,
                field(2)?.parse()?,
                field(3)?.parse()?,
                field(4)?.parse()?,
            );
        }

        Ok(metrics)
    }
}

fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() || window == 0 {
        return 0.0;
    }
    let tail = &values[values.len().saturating_sub(window)..];
    tail.iter().sum::<f64>() / tail.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_epochs_in_order() {
        let mut metrics = GanMetrics::new();
        metrics.record_epoch(1.5, 0.7, 0.8, 0.9);
        metrics.record_epoch(1.2, 0.8, 0.7, 0.8);

        assert_eq!(metrics.num_epochs(), 2);
        assert_eq!(metrics.latest_gen_loss(), Some(1.2));
        assert_eq!(metrics.latest_disc_loss(), Some(0.8));
    }

    #[test]
    fn moving_average_uses_the_tail() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((moving_average(&values, 2) - 3.5).abs() < 1e-9);
        // window larger than history falls back to the full mean
        assert!((moving_average(&values, 10) - 2.5).abs() < 1e-9);
        assert_eq!(moving_average(&[], 3), 0.0);
    }

    #[test]
    fn detects_a_collapsing_run() {
        let mut metrics = GanMetrics::new();
        for _ in 0..5 {
            metrics.record_epoch(5.0, 0.01, 1.0, 1.0);
        }
        assert!(metrics.check_mode_collapse(5));
        assert!(!metrics.is_balanced(5));
    }

    #[test]
    fn healthy_run_is_not_flagged() {
        let mut metrics = GanMetrics::new();
        for _ in 0..5 {
            metrics.record_epoch(1.3, 0.9, 0.7, 0.6);
        }
        assert!(!metrics.check_mode_collapse(5));
        assert!(metrics.is_balanced(5));
    }

    #[test]
    fn csv_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let mut metrics = GanMetrics::new();
        metrics.record_epoch(1.5, 0.7, 0.8, 0.9);
        metrics.record_epoch(1.2, 0.8, 0.7, 0.8);
        metrics.save_csv(&path).unwrap();

        let loaded = GanMetrics::load_csv(&path).unwrap();
        assert_eq!(loaded.num_epochs(), 2);
        assert_eq!(loaded.gen_losses, metrics.gen_losses);
        assert_eq!(loaded.disc_fake_acc, metrics.disc_fake_acc);
    }

    #[test]
    fn loading_a_missing_file_fails() {
        assert!(GanMetrics::load_csv("/nonexistent/metrics.csv").is_err());
    }

    #[test]
    fn short_rows_are_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();

        // a hand-edited file that lost its accuracy columns entirely
        let truncated_file = dir.path().join("truncated.csv");
        std::fs::write(&truncated_file, "epoch,gen_loss\n1,1.5\n2,1.2\n").unwrap();
        assert!(GanMetrics::load_csv(&truncated_file).is_err());

        // a single row shorter than the header
        let ragged_file = dir.path().join("ragged.csv");
        std::fs::write(
            &ragged_file,
            "epoch,gen_loss,disc_loss,disc_real_acc,disc_fake_acc\n1,1.5,0.7\n",
        )
        .unwrap();
        assert!(GanMetrics::load_csv(&ragged_file).is_err());
    }
}
