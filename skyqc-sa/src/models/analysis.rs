//! Site analysis data model
//!
//! Everything here is built by a single owning flow (folder analysis, then
//! site aggregation) and only published once complete; none of these types
//! are mutated after assembly.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A decoded geographic position attributed to one image.
///
/// Altitude is above ground level in feet, preferring the drone
/// relative-altitude tag over GPS altitude. Latitude is in [-90, 90] and
/// longitude in [-180, 180] after hemisphere-reference sign correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_agl_ft: f64,
    pub timestamp: Option<NaiveDateTime>,
}

/// A [`GpsFix`] attributed to its folder and file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpsPoint {
    pub folder: String,
    pub filename: String,
    pub filepath: String,
    #[serde(flatten)]
    pub fix: GpsFix,
}

/// One image file discovered by a directory listing, consumed once per
/// extraction task.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub name: String,
    pub remote_path: String,
    pub size_bytes: u64,
}

/// Per-folder analysis result, immutable after assembly.
#[derive(Debug, Clone, Serialize)]
pub struct FolderAnalysis {
    pub folder_name: String,
    pub folder_path: String,
    pub image_count: usize,
    pub total_size_bytes: u64,
    pub color: String,
    pub points: Vec<GpsPoint>,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FolderAnalysis {
    /// A folder whose listing or extraction failed: zero counts, flagged,
    /// with the error detail captured. Keeps the failure scoped to this
    /// folder.
    pub fn failed(folder_name: &str, folder_path: &str, color: &str, error: String) -> Self {
        Self {
            folder_name: folder_name.to_string(),
            folder_path: folder_path.to_string(),
            image_count: 0,
            total_size_bytes: 0,
            color: color.to_string(),
            points: Vec::new(),
            failed: true,
            error: Some(error),
        }
    }

    pub fn gps_count(&self) -> usize {
        self.points.len()
    }
}

/// Pilot and site identity parsed from the site path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteInfo {
    pub pilot_name: String,
    pub site_id: String,
    pub full_path: String,
}

/// Whole-site analysis: per-folder results plus merged totals.
///
/// Invariants: `total_images` and `total_size_bytes` are the sums over
/// `folders`, and `points` is the union of all folder point sets.
#[derive(Debug, Clone, Serialize)]
pub struct SiteAnalysis {
    pub site_info: SiteInfo,
    pub folders: BTreeMap<String, FolderAnalysis>,
    pub total_images: usize,
    pub total_size_bytes: u64,
    pub points: Vec<GpsPoint>,
}

/// Inlier/outlier tag for a classified point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointClass {
    Inlier,
    Outlier,
}

/// A point tagged with its classification.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedPoint {
    #[serde(flatten)]
    pub point: GpsPoint,
    pub class: PointClass,
}

/// IQR-derived latitude/longitude bounds. Bounds are inclusive: a point
/// exactly on a bound is an inlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub lat_low: f64,
    pub lat_high: f64,
    pub lon_low: f64,
    pub lon_high: f64,
}

impl GeoBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_low..=self.lat_high).contains(&latitude)
            && (self.lon_low..=self.lon_high).contains(&longitude)
    }
}

/// Visualization bounding volume derived from the inlier set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRanges {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Ground-plane reference: lowest inlier altitude minus 20 ft.
    pub alt_floor_ft: f64,
    /// At least 100 ft so a flat site still renders with headroom.
    pub alt_ceiling_ft: f64,
}

/// Result of outlier classification over a merged point set.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// None when the statistical sample was empty (every point is then an
    /// inlier).
    pub bounds: Option<GeoBounds>,
    pub points: Vec<ClassifiedPoint>,
    /// None when there are no inliers to bound.
    pub axis: Option<AxisRanges>,
}

impl Classification {
    pub fn inliers(&self) -> impl Iterator<Item = &ClassifiedPoint> {
        self.points
            .iter()
            .filter(|p| p.class == PointClass::Inlier)
    }

    pub fn outliers(&self) -> impl Iterator<Item = &ClassifiedPoint> {
        self.points
            .iter()
            .filter(|p| p.class == PointClass::Outlier)
    }

    pub fn inlier_count(&self) -> usize {
        self.inliers().count()
    }

    pub fn outlier_count(&self) -> usize {
        self.outliers().count()
    }
}
