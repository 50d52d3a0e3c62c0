//! Flight path render payload
//!
//! Turns a classified site into the JSON payload the viewer plots: one
//! trace per folder holding its inlier points, a single trace collecting
//! the plotted outliers, and the axis ranges framing the scene. Folders
//! on the exclusion list (civil, road) are not rendered at all.
//! Altitudes on traces are the raw extracted values; only the axis
//! computation clamps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use skyqc_common::human_size::format_size;
use skyqc_common::AnalysisConfig;

use crate::models::{AxisRanges, Classification, PointClass, SiteAnalysis, SiteInfo};

const OUTLIER_COLOR: &str = "#000000";

/// One plotted trace: parallel coordinate arrays plus per-point hover
/// labels.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub name: String,
    pub color: String,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub alts_ft: Vec<f64>,
    pub labels: Vec<String>,
}

impl Trace {
    fn new(name: String, color: String) -> Self {
        Self {
            name,
            color,
            lats: Vec::new(),
            lons: Vec::new(),
            alts_ft: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn push(&mut self, lat: f64, lon: f64, alt_ft: f64, label: String) {
        self.lats.push(lat);
        self.lons.push(lon);
        self.alts_ft.push(alt_ft);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lats.is_empty()
    }
}

/// The complete payload for one site render.
#[derive(Debug, Clone, Serialize)]
pub struct FlightPathPayload {
    pub site_info: SiteInfo,
    pub traces: Vec<Trace>,
    pub axis: Option<AxisRanges>,
    pub total_images: usize,
    pub total_size: String,
    /// Plotted points (excluded folders do not count).
    pub point_count: usize,
    /// Plotted outliers.
    pub outlier_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Build the render payload from an analyzed site and its classification.
/// Excluded folders (civil, road) are omitted entirely; every other
/// folder gets a trace even with no inlier points (failed folders
/// included) so the legend stays complete.
pub fn build(
    site: &SiteAnalysis,
    classification: &Classification,
    config: &AnalysisConfig,
) -> FlightPathPayload {
    let mut traces: Vec<Trace> = Vec::new();
    let mut trace_index: HashMap<&str, usize> = HashMap::new();
    for folder in site.folders.values() {
        if config.is_excluded_folder(&folder.folder_name) {
            continue;
        }
        trace_index.insert(folder.folder_name.as_str(), traces.len());
        traces.push(Trace::new(
            format!(
                "{} ({} - {} files)",
                folder.folder_name,
                format_size(folder.total_size_bytes),
                folder.image_count
            ),
            folder.color.clone(),
        ));
    }
    let mut outliers = Trace::new(String::new(), OUTLIER_COLOR.to_string());

    let mut point_count = 0usize;
    for classified in &classification.points {
        let point = &classified.point;
        let index = match trace_index.get(point.folder.as_str()) {
            Some(index) => *index,
            None => continue,
        };
        let fix = &point.fix;
        let label = format!("{} ({:.0} ft)", point.filename, fix.altitude_agl_ft);
        point_count += 1;
        match classified.class {
            PointClass::Inlier => {
                traces[index].push(fix.latitude, fix.longitude, fix.altitude_agl_ft, label)
            }
            PointClass::Outlier => outliers.push(
                fix.latitude,
                fix.longitude,
                fix.altitude_agl_ft,
                format!("{}/{}", point.folder, label),
            ),
        }
    }

    let outlier_count = outliers.len();
    if outlier_count > 0 {
        outliers.name = format!("Outliers ({})", outlier_count);
        traces.push(outliers);
    }

    FlightPathPayload {
        site_info: site.site_info.clone(),
        traces,
        axis: classification.axis,
        total_images: site.total_images,
        total_size: format_size(site.total_size_bytes),
        point_count,
        outlier_count,
        generated_at: Utc::now(),
    }
}
