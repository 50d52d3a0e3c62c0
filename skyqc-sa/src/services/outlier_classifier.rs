//! IQR outlier classification
//!
//! Tags every merged site point as inlier or outlier using an
//! interquartile-range fence over latitude and longitude. The statistical
//! sample deliberately skips points from excluded folders (civil, road by
//! default) whose flight lines legitimately wander far from the structure;
//! their points are still classified against the fence, just not allowed
//! to widen it.

use skyqc_common::AnalysisConfig;

use crate::models::{
    AxisRanges, Classification, ClassifiedPoint, GeoBounds, GpsPoint, PointClass,
};

/// Headroom subtracted below the lowest inlier to place the ground plane.
const GROUND_MARGIN_FT: f64 = 20.0;

/// Minimum ceiling so a flat site still renders with vertical headroom.
const MIN_CEILING_FT: f64 = 100.0;

/// Classify a merged point set. With an empty sample (all points in
/// excluded folders, or no points at all) every point is an inlier and no
/// bounds are produced.
pub fn classify(points: &[GpsPoint], config: &AnalysisConfig) -> Classification {
    let sample: Vec<&GpsPoint> = points
        .iter()
        .filter(|p| !config.is_excluded_folder(&p.folder))
        .collect();

    let bounds = geo_bounds(&sample, config.iqr_multiplier);

    let classified: Vec<ClassifiedPoint> = points
        .iter()
        .map(|point| {
            let class = match &bounds {
                Some(b) if !b.contains(point.fix.latitude, point.fix.longitude) => {
                    PointClass::Outlier
                }
                _ => PointClass::Inlier,
            };
            ClassifiedPoint {
                point: point.clone(),
                class,
            }
        })
        .collect();

    let axis = axis_ranges(&classified, config);

    let outliers = classified
        .iter()
        .filter(|p| p.class == PointClass::Outlier)
        .count();
    tracing::info!(
        "Classified {} points: {} inliers, {} outliers (sample {})",
        classified.len(),
        classified.len() - outliers,
        outliers,
        sample.len()
    );

    Classification {
        bounds,
        points: classified,
        axis,
    }
}

/// IQR fence over the sample, or `None` for an empty sample.
fn geo_bounds(sample: &[&GpsPoint], multiplier: f64) -> Option<GeoBounds> {
    if sample.is_empty() {
        return None;
    }
    let mut lats: Vec<f64> = sample.iter().map(|p| p.fix.latitude).collect();
    let mut lons: Vec<f64> = sample.iter().map(|p| p.fix.longitude).collect();
    lats.sort_by(|a, b| a.total_cmp(b));
    lons.sort_by(|a, b| a.total_cmp(b));

    let (lat_low, lat_high) = fence(&lats, multiplier);
    let (lon_low, lon_high) = fence(&lons, multiplier);
    Some(GeoBounds {
        lat_low,
        lat_high,
        lon_low,
        lon_high,
    })
}

/// Q1/Q3 fence for one sorted axis.
fn fence(sorted: &[f64], multiplier: f64) -> (f64, f64) {
    let q1 = percentile(sorted, 25.0);
    let q3 = percentile(sorted, 75.0);
    let iqr = q3 - q1;
    (q1 - multiplier * iqr, q3 + multiplier * iqr)
}

/// Percentile with linear interpolation between adjacent ranks, matching
/// the conventional `rank = q/100 * (n-1)` definition. Input must be
/// sorted and non-empty.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Visualization bounding volume over the plotted inliers (excluded
/// folders never render, so they do not frame the scene either), with
/// altitudes clamped to ground level so a negative reading cannot sink
/// the floor. `None` when there are no such inliers.
fn axis_ranges(points: &[ClassifiedPoint], config: &AnalysisConfig) -> Option<AxisRanges> {
    let mut inliers = points
        .iter()
        .filter(|p| p.class == PointClass::Inlier && !config.is_excluded_folder(&p.point.folder));
    let first = inliers.next()?;

    let mut lat_min = first.point.fix.latitude;
    let mut lat_max = lat_min;
    let mut lon_min = first.point.fix.longitude;
    let mut lon_max = lon_min;
    let mut alt_min = first.point.fix.altitude_agl_ft.max(0.0);
    let mut alt_max = alt_min;

    for p in inliers {
        let fix = &p.point.fix;
        lat_min = lat_min.min(fix.latitude);
        lat_max = lat_max.max(fix.latitude);
        lon_min = lon_min.min(fix.longitude);
        lon_max = lon_max.max(fix.longitude);
        let alt = fix.altitude_agl_ft.max(0.0);
        alt_min = alt_min.min(alt);
        alt_max = alt_max.max(alt);
    }

    Some(AxisRanges {
        lat_min,
        lat_max,
        lon_min,
        lon_max,
        alt_floor_ft: alt_min - GROUND_MARGIN_FT,
        alt_ceiling_ft: alt_max.max(MIN_CEILING_FT),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GpsFix;

    fn point(folder: &str, lat: f64, lon: f64, alt: f64) -> GpsPoint {
        GpsPoint {
            folder: folder.to_string(),
            filename: "img.jpg".to_string(),
            filepath: format!("/site/{}/img.jpg", folder),
            fix: GpsFix {
                latitude: lat,
                longitude: lon,
                altitude_agl_ft: alt,
                timestamp: None,
            },
        }
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&data, 25.0) - 1.75).abs() < 1e-12);
        assert!((percentile(&data, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&data, 75.0) - 3.25).abs() < 1e-12);
        assert_eq!(percentile(&[42.0], 75.0), 42.0);
    }

    #[test]
    fn test_far_point_is_outlier() {
        let mut points: Vec<GpsPoint> = (0..100)
            .map(|i| {
                point(
                    "Orbit_1",
                    37.0 + (i as f64) * 1e-5,
                    -122.0 + (i as f64) * 1e-5,
                    150.0,
                )
            })
            .collect();
        points.push(point("Orbit_1", 45.0, -100.0, 150.0));

        let result = classify(&points, &config());
        assert_eq!(result.outlier_count(), 1);
        assert_eq!(result.inlier_count(), 100);
        let outlier = result.outliers().next().unwrap();
        assert_eq!(outlier.point.fix.latitude, 45.0);
    }

    #[test]
    fn test_identical_points_all_inliers() {
        let points: Vec<GpsPoint> =
            (0..10).map(|_| point("scan", 37.0, -122.0, 80.0)).collect();
        let result = classify(&points, &config());
        assert_eq!(result.outlier_count(), 0);
        let bounds = result.bounds.unwrap();
        assert!(bounds.contains(37.0, -122.0));
    }

    #[test]
    fn test_excluded_folders_do_not_widen_fence() {
        let mut points: Vec<GpsPoint> = (0..50)
            .map(|i| point("Orbit_1", 37.0 + (i as f64) * 1e-5, -122.0, 150.0))
            .collect();
        // A distant civil run must not pull the fence toward itself.
        points.push(point("Civil_Survey", 37.5, -122.0, 40.0));

        let result = classify(&points, &config());
        let civil = result
            .points
            .iter()
            .find(|p| p.point.folder == "Civil_Survey")
            .unwrap();
        assert_eq!(civil.class, PointClass::Outlier);
    }

    #[test]
    fn test_only_excluded_folders_means_no_bounds() {
        let points = vec![
            point("civil", 37.0, -122.0, 40.0),
            point("road_north", 37.1, -122.1, 35.0),
        ];
        let result = classify(&points, &config());
        assert!(result.bounds.is_none());
        assert_eq!(result.outlier_count(), 0);
        assert_eq!(result.inlier_count(), 2);
        // Excluded folders never render, so nothing frames the scene.
        assert!(result.axis.is_none());
    }

    #[test]
    fn test_empty_input() {
        let result = classify(&[], &config());
        assert!(result.bounds.is_none());
        assert!(result.axis.is_none());
        assert!(result.points.is_empty());
    }

    #[test]
    fn test_axis_ranges_floor_and_ceiling() {
        let points = vec![
            point("Orbit_1", 37.0, -122.0, 50.0),
            point("Orbit_1", 37.001, -122.001, -5.0),
        ];
        let result = classify(&points, &config());
        let axis = result.axis.unwrap();
        // Negative altitude clamps to 0 before the margin is applied.
        assert_eq!(axis.alt_floor_ft, -20.0);
        assert_eq!(axis.alt_ceiling_ft, 100.0);
        assert_eq!(axis.lat_min, 37.0);
        assert_eq!(axis.lat_max, 37.001);
    }

    #[test]
    fn test_axis_ceiling_above_minimum() {
        let points = vec![
            point("Orbit_1", 37.0, -122.0, 250.0),
            point("Orbit_1", 37.0, -122.0, 180.0),
        ];
        let result = classify(&points, &config());
        let axis = result.axis.unwrap();
        assert_eq!(axis.alt_floor_ft, 160.0);
        assert_eq!(axis.alt_ceiling_ft, 250.0);
    }
}
