//! Per-folder analysis
//!
//! Lists one remote folder, filters to the image allow-list, picks the
//! extraction strategy by volume, and assembles the folder statistics.
//! Any failure is captured into the returned [`FolderAnalysis`] instead of
//! propagating, so one bad folder never aborts the site.

use std::sync::Arc;

use skyqc_common::AnalysisConfig;

use crate::models::{FolderAnalysis, ImageDescriptor};
use crate::services::extraction_scheduler::ExtractionScheduler;
use crate::services::file_service;
use crate::services::session_pool::PoolKey;
use crate::transport::{RemoteSession, SessionFactory, TransportError};

/// Image extensions the analyzer considers, matched case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "dng"];

/// Display colors by folder-name keyword, in priority order; first match
/// wins.
pub const FOLDER_COLORS: [(&str, &str); 7] = [
    ("orbit", "#ff4136"),    // red
    ("scan", "#2ecc40"),     // green
    ("center", "#0074d9"),   // blue
    ("downlook", "#ffdc00"), // yellow
    ("uplook", "#b10dc9"),   // purple
    ("civil", "#ff851b"),    // orange
    ("road", "#39cccc"),     // teal
];

pub const DEFAULT_COLOR: &str = "#aaaaaa";

/// Display color for a folder, by case-insensitive keyword substring.
pub fn folder_color(folder_name: &str) -> &'static str {
    let lower = folder_name.to_lowercase();
    FOLDER_COLORS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

/// Whether a file name carries one of the image extensions.
pub fn is_image_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

pub struct FolderAnalyzer {
    config: Arc<AnalysisConfig>,
    scheduler: ExtractionScheduler,
}

impl FolderAnalyzer {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self {
            scheduler: ExtractionScheduler::new(Arc::clone(&config)),
            config,
        }
    }

    /// Analyze one folder. Never fails: errors come back as a flagged
    /// [`FolderAnalysis`] with zero counts.
    pub async fn analyze(
        &self,
        caller: &dyn RemoteSession,
        factory: &dyn SessionFactory,
        key: &PoolKey,
        folder_path: &str,
        folder_name: &str,
    ) -> FolderAnalysis {
        match self
            .try_analyze(caller, factory, key, folder_path, folder_name)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::error!("Error analyzing folder {}: {}", folder_name, e);
                FolderAnalysis::failed(folder_name, folder_path, folder_color(folder_name), e.to_string())
            }
        }
    }

    async fn try_analyze(
        &self,
        caller: &dyn RemoteSession,
        factory: &dyn SessionFactory,
        key: &PoolKey,
        folder_path: &str,
        folder_name: &str,
    ) -> Result<FolderAnalysis, TransportError> {
        let entries = file_service::list_directory(caller, folder_path).await?;

        let images: Vec<ImageDescriptor> = entries
            .iter()
            .filter(|e| e.is_file() && is_image_file(&e.name))
            .map(|e| ImageDescriptor {
                name: e.name.clone(),
                remote_path: file_service::join_path(folder_path, &e.name),
                size_bytes: e.size,
            })
            .collect();

        // Size totals cover every file in the folder, not just images.
        let total_size_bytes: u64 = entries.iter().filter(|e| e.is_file()).map(|e| e.size).sum();

        let outcome = if images.len() >= self.config.parallel_threshold {
            self.scheduler
                .run(caller, factory, key.clone(), folder_name, &images)
                .await
        } else {
            self.scheduler.sequential(caller, folder_name, &images).await
        };

        tracing::info!(
            "Extracted {}/{} GPS points from {} ({} failures)",
            outcome.points.len(),
            images.len(),
            folder_name,
            outcome.failures
        );

        Ok(FolderAnalysis {
            folder_name: folder_name.to_string(),
            folder_path: folder_path.to_string(),
            image_count: images.len(),
            total_size_bytes,
            color: folder_color(folder_name).to_string(),
            points: outcome.points,
            failed: false,
            error: None,
        })
    }
}
