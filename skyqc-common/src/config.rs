//! Analysis engine configuration
//!
//! Every tuning constant of the site-analysis engine lives here with its
//! compiled default. Values resolve in priority order:
//! 1. Environment variable (`SKYQC_*`, highest priority)
//! 2. TOML config file (`~/.config/skyqc/config.toml`, or `/etc/skyqc/config.toml` on Linux)
//! 3. Compiled default
//!
//! The defaults are the empirically tuned values from field use (IQR
//! multiplier 4.0, minimum viable pool of 5); override rather than edit.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Site-analysis engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bytes of each image header fetched for GPS extraction.
    /// GPS EXIF sits in the first ~8 KiB; 32 KiB leaves headroom for
    /// XMP packets without paying for the whole image.
    pub prefix_read_bytes: usize,
    /// Minimum live sessions for a pool to be worth using; below this the
    /// scheduler degrades to sequential extraction.
    pub min_pool_size: usize,
    /// Lower bound on the parallel worker count.
    pub min_workers: usize,
    /// Upper bound on the parallel worker count.
    pub max_workers: usize,
    /// One worker is scheduled per this many images (before clamping).
    pub images_per_worker: usize,
    /// Folders with fewer images than this are processed sequentially.
    pub parallel_threshold: usize,
    /// IQR multiplier for outlier bounds. 4.0 is tuned for geographic
    /// clustering, much wider than the classic 1.5.
    pub iqr_multiplier: f64,
    /// Per-image task timeout, seconds.
    pub task_timeout_secs: u64,
    /// Whole-batch timeout per folder, seconds.
    pub batch_timeout_secs: u64,
    /// Bounded wait for borrowing a pooled session, seconds.
    pub borrow_timeout_secs: u64,
    /// Remote I/O timeout per call, seconds.
    pub io_timeout_secs: u64,
    /// Inactivity expiry for registered connections, seconds.
    pub session_expiry_secs: u64,
    /// Folder-name keywords excluded from the outlier statistical sample
    /// (their points are still classified against the computed bounds).
    pub excluded_folder_keywords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            prefix_read_bytes: 32 * 1024,
            min_pool_size: 5,
            min_workers: 10,
            max_workers: 50,
            images_per_worker: 5,
            parallel_threshold: 5,
            iqr_multiplier: 4.0,
            task_timeout_secs: 30,
            batch_timeout_secs: 300,
            borrow_timeout_secs: 60,
            io_timeout_secs: 30,
            session_expiry_secs: 4 * 60 * 60,
            excluded_folder_keywords: vec!["civil".to_string(), "road".to_string()],
        }
    }
}

impl AnalysisConfig {
    /// Load configuration: TOML file (if present) overlaid with environment
    /// variables.
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                let config: AnalysisConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            None => AnalysisConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKYQC_*` environment variable overrides in place.
    pub fn apply_env_overrides(&mut self) {
        override_from_env("SKYQC_PREFIX_READ_BYTES", &mut self.prefix_read_bytes);
        override_from_env("SKYQC_MIN_POOL_SIZE", &mut self.min_pool_size);
        override_from_env("SKYQC_MIN_WORKERS", &mut self.min_workers);
        override_from_env("SKYQC_MAX_WORKERS", &mut self.max_workers);
        override_from_env("SKYQC_IMAGES_PER_WORKER", &mut self.images_per_worker);
        override_from_env("SKYQC_PARALLEL_THRESHOLD", &mut self.parallel_threshold);
        override_from_env("SKYQC_IQR_MULTIPLIER", &mut self.iqr_multiplier);
        override_from_env("SKYQC_TASK_TIMEOUT_SECS", &mut self.task_timeout_secs);
        override_from_env("SKYQC_BATCH_TIMEOUT_SECS", &mut self.batch_timeout_secs);
        override_from_env("SKYQC_BORROW_TIMEOUT_SECS", &mut self.borrow_timeout_secs);
        override_from_env("SKYQC_IO_TIMEOUT_SECS", &mut self.io_timeout_secs);
        override_from_env("SKYQC_SESSION_EXPIRY_SECS", &mut self.session_expiry_secs);
        if let Ok(keywords) = std::env::var("SKYQC_EXCLUDED_FOLDER_KEYWORDS") {
            self.excluded_folder_keywords = keywords
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }

    fn validate(&self) -> Result<()> {
        if self.min_workers == 0 || self.max_workers < self.min_workers {
            return Err(Error::Config(format!(
                "worker bounds invalid: min {} max {}",
                self.min_workers, self.max_workers
            )));
        }
        if self.images_per_worker == 0 {
            return Err(Error::Config("images_per_worker must be non-zero".to_string()));
        }
        if self.iqr_multiplier <= 0.0 {
            return Err(Error::Config("iqr_multiplier must be positive".to_string()));
        }
        Ok(())
    }

    /// Worker count for a batch: one per `images_per_worker` images,
    /// clamped to the configured bounds.
    pub fn worker_count(&self, image_count: usize) -> usize {
        (image_count / self.images_per_worker).clamp(self.min_workers, self.max_workers)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn borrow_timeout(&self) -> Duration {
        Duration::from_secs(self.borrow_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    pub fn session_expiry(&self) -> Duration {
        Duration::from_secs(self.session_expiry_secs)
    }

    /// Case-insensitive keyword match against the exclusion list.
    pub fn is_excluded_folder(&self, folder_name: &str) -> bool {
        let lower = folder_name.to_lowercase();
        self.excluded_folder_keywords
            .iter()
            .any(|k| lower.contains(k.as_str()))
    }
}

fn override_from_env<T: FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!("Ignoring unparseable {}={:?}", name, raw),
        }
    }
}

/// Locate the config file for the platform, if one exists.
fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("skyqc").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }
    if cfg!(target_os = "linux") {
        let system = PathBuf::from("/etc/skyqc/config.toml");
        if system.exists() {
            return Some(system);
        }
    }
    None
}
