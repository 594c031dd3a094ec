//! Sample input generator.
//!
//! Drops small text files into a directory at a fixed pace so the service has
//! something to chew on. Each file is named after its sequence number and size,
//! e.g. `00042-(17 chars).txt`, and holds that many `a` characters.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Notify;
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_MIN_CHARS: usize = 1;
pub const DEFAULT_MAX_CHARS: usize = 100;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct SampleGenerator {
    dir: PathBuf,
    chars: RangeInclusive<usize>,
    interval: Duration,
    counter: u64,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub chars: usize,
}

impl SampleGenerator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            chars: DEFAULT_MIN_CHARS..=DEFAULT_MAX_CHARS,
            interval: DEFAULT_INTERVAL,
            counter: 0,
        }
    }

    pub fn chars(mut self, min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "min chars ({min}) must not exceed max chars ({max})"
            )));
        }
        self.chars = min..=max;
        Ok(self)
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the next file.
    pub async fn write_one(&mut self, rng: &mut impl Rng) -> Result<Sample> {
        let chars = rng.random_range(self.chars.clone());
        let name = format!("{:05}-({chars} chars).txt", self.counter);
        self.counter += 1;

        let path = self.dir.join(name);
        tokio::fs::write(&path, "a".repeat(chars)).await?;
        Ok(Sample { path, chars })
    }

    /// Write files every `interval` until `shutdown` is notified or `limit`
    /// files have been written. Returns how many were written.
    pub async fn run(&mut self, shutdown: Arc<Notify>, limit: Option<u64>) -> Result<u64> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut rng = StdRng::from_os_rng();
        let mut written = 0u64;

        loop {
            if limit.is_some_and(|max| written >= max) {
                break;
            }
            let sample = self.write_one(&mut rng).await?;
            written += 1;
            info!(file = %sample.path.display(), chars = sample.chars, "file added");

            tokio::select! {
                _ = shutdown.notified() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn files_are_numbered_and_sized() {
        let dir = tempfile::tempdir().unwrap();
        let mut generator = SampleGenerator::new(dir.path()).chars(3, 9).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let first = generator.write_one(&mut rng).await.unwrap();
        let second = generator.write_one(&mut rng).await.unwrap();

        assert!((3..=9).contains(&first.chars));
        assert_eq!(
            first.path.file_name().unwrap().to_str().unwrap(),
            format!("00000-({} chars).txt", first.chars)
        );
        assert!(second.path.to_str().unwrap().contains("00001-("));

        let content = std::fs::read_to_string(&first.path).unwrap();
        assert_eq!(content, "a".repeat(first.chars));
    }

    #[tokio::test]
    async fn run_stops_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested");
        let mut generator = SampleGenerator::new(&target).interval(Duration::from_millis(1));

        let written = generator.run(Arc::new(Notify::new()), Some(3)).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 3);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(SampleGenerator::new("x").chars(5, 2).is_err());
    }
}
