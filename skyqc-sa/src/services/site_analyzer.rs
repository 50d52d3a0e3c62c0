//! Whole-site analysis
//!
//! Walks the immediate subfolders of a site directory, analyzes each one
//! in turn, and merges the results into a [`SiteAnalysis`] whose totals
//! are exact sums over the per-folder results. Folder failures are
//! isolated; only a failure to list the site directory itself is fatal.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use skyqc_common::AnalysisConfig;

use crate::models::{SiteAnalysis, SiteInfo};
use crate::services::file_service;
use crate::services::folder_analyzer::FolderAnalyzer;
use crate::services::session_pool::{self, PoolKey};
use crate::transport::{RemoteSession, SessionFactory, TransportError};

static SITE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{8,10})").expect("valid regex"));

/// Pull pilot name and site id out of a site path. The pilot is the
/// component after a `homes` directory; the site id is the first 8-10
/// digit run anywhere in the path. Both degrade gracefully when the path
/// does not follow the upload layout.
pub fn parse_site_path(path: &str) -> SiteInfo {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();

    let pilot_name = components
        .iter()
        .position(|c| *c == "homes")
        .and_then(|i| components.get(i + 1))
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let site_id = SITE_ID
        .captures(path)
        .map(|c| c[1].to_string())
        .or_else(|| components.last().map(|c| c.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    SiteInfo {
        pilot_name,
        site_id,
        full_path: path.to_string(),
    }
}

pub struct SiteAnalyzer {
    folder_analyzer: FolderAnalyzer,
}

impl SiteAnalyzer {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self {
            folder_analyzer: FolderAnalyzer::new(config),
        }
    }

    /// Analyze every immediate subfolder of `site_path` and merge the
    /// results. Fails only when the site directory itself cannot be
    /// listed. Pooled sessions are scoped to one analysis: whatever the
    /// walk parked in the cache is released before returning, on the
    /// error path too.
    pub async fn analyze(
        &self,
        caller: &dyn RemoteSession,
        factory: &dyn SessionFactory,
        key: &PoolKey,
        site_path: &str,
    ) -> Result<SiteAnalysis, TransportError> {
        let result = self.walk_site(caller, factory, key, site_path).await;
        session_pool::cleanup_for_session(&key.session_id);
        result
    }

    async fn walk_site(
        &self,
        caller: &dyn RemoteSession,
        factory: &dyn SessionFactory,
        key: &PoolKey,
        site_path: &str,
    ) -> Result<SiteAnalysis, TransportError> {
        let site_info = parse_site_path(site_path);
        tracing::info!(
            "Analyzing site {} (pilot {}) at {}",
            site_info.site_id,
            site_info.pilot_name,
            site_path
        );

        let entries = file_service::list_directory(caller, site_path).await?;
        let subfolders: Vec<String> = entries
            .iter()
            .filter(|e| e.is_directory())
            .map(|e| e.name.clone())
            .collect();
        tracing::info!("Found {} folders in site {}", subfolders.len(), site_info.site_id);

        let mut analysis = SiteAnalysis {
            site_info,
            folders: Default::default(),
            total_images: 0,
            total_size_bytes: 0,
            points: Vec::new(),
        };

        for folder_name in subfolders {
            let folder_path = file_service::join_path(site_path, &folder_name);
            let folder = self
                .folder_analyzer
                .analyze(caller, factory, key, &folder_path, &folder_name)
                .await;

            analysis.total_images += folder.image_count;
            analysis.total_size_bytes += folder.total_size_bytes;
            analysis.points.extend(folder.points.iter().cloned());
            analysis.folders.insert(folder_name, folder);
        }

        tracing::info!(
            "Site {} complete: {} images, {} GPS points across {} folders",
            analysis.site_info.site_id,
            analysis.total_images,
            analysis.points.len(),
            analysis.folders.len()
        );
        Ok(analysis)
    }
}
