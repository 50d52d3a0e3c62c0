//! Analysis services
//!
//! - `connection_service`: registry of live remote connections
//! - `session_pool`: bounded pool of extra sessions for parallel extraction
//! - `file_service`: listing, stat, and bounded prefix reads
//! - `gps_extractor`: GPS fix decoding from image header bytes
//! - `extraction_scheduler`: bounded-parallel extraction over a pool
//! - `folder_analyzer`: per-folder listing, filtering, extraction
//! - `site_analyzer`: whole-site walk and aggregation
//! - `outlier_classifier`: IQR inlier/outlier tagging
//! - `flight_path`: render payload assembly

pub mod connection_service;
pub mod extraction_scheduler;
pub mod file_service;
pub mod flight_path;
pub mod folder_analyzer;
pub mod gps_extractor;
pub mod outlier_classifier;
pub mod session_pool;
pub mod site_analyzer;

pub use connection_service::{ActiveConnection, ConnectionService};
pub use extraction_scheduler::{BatchOutcome, ExtractionScheduler};
pub use folder_analyzer::FolderAnalyzer;
pub use site_analyzer::SiteAnalyzer;
