//! GPS fix extraction from image header bytes
//!
//! Consumes the first tens of kilobytes of an image and returns a
//! best-effort [`GpsFix`]. Coordinates are mandatory: both the
//! degree/minute/second triples and both hemisphere references must be
//! present or there is no fix. Altitude is best-effort — the drone
//! relative-altitude XMP tag wins over GPS altitude, and a missing
//! altitude defaults to 0 rather than discarding the coordinates.
//!
//! Malformed or truncated metadata is never an error, just "no fix".

use std::io::Cursor;

use chrono::NaiveDateTime;
use exif::{In, Tag, Value};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::models::GpsFix;

const METERS_TO_FEET: f64 = 3.28084;

// DJI writes relative altitude into the XMP packet, either as an XML
// attribute or as an element. The packet sits in the header prefix, so a
// byte scan is enough; no XMP parser needed.
static RELATIVE_ALT_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"drone-dji:RelativeAltitude\s*=\s*"([-+]?[0-9]+(?:\.[0-9]+)?)""#)
        .expect("valid regex")
});
static RELATIVE_ALT_ELEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<drone-dji:RelativeAltitude>\s*([-+]?[0-9]+(?:\.[0-9]+)?)\s*</drone-dji:RelativeAltitude>"#,
    )
    .expect("valid regex")
});

/// Extract a GPS fix from raw header bytes, or `None` when the header has
/// no usable coordinates.
pub fn extract(header: &[u8]) -> Option<GpsFix> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(header))
        .ok()?;

    let latitude = coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'N')?;
    let longitude = coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'E')?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }

    let altitude_agl_ft = relative_altitude_feet(header)
        .or_else(|| gps_altitude_feet(&exif))
        .unwrap_or(0.0);

    Some(GpsFix {
        latitude,
        longitude,
        altitude_agl_ft,
        timestamp: capture_timestamp(&exif),
    })
}

/// Decode one coordinate axis: rational DMS triple plus hemisphere
/// reference, sign-flipped away from the positive hemisphere (`N`/`E`).
fn coordinate(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag, positive: char) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let triple = match &field.value {
        Value::Rational(v) if v.len() >= 3 => v,
        _ => return None,
    };
    let degrees =
        triple[0].to_f64() + triple[1].to_f64() / 60.0 + triple[2].to_f64() / 3600.0;
    if !degrees.is_finite() {
        return None;
    }

    let reference = ascii_field(exif, ref_tag)?;
    let sign = if reference.trim().starts_with(positive) {
        1.0
    } else {
        -1.0
    };
    Some(sign * degrees)
}

fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Drone relative altitude from the XMP packet, converted meters → feet.
fn relative_altitude_feet(header: &[u8]) -> Option<f64> {
    let captures = RELATIVE_ALT_ATTR
        .captures(header)
        .or_else(|| RELATIVE_ALT_ELEM.captures(header))?;
    let raw = std::str::from_utf8(captures.get(1)?.as_bytes()).ok()?;
    let meters: f64 = raw.parse().ok()?;
    Some(meters * METERS_TO_FEET)
}

/// Standard GPS altitude (meters above sea level in practice; the original
/// tool treated it as the AGL fallback and ignored the below-sea-level
/// reference, preserved here).
fn gps_altitude_feet(exif: &exif::Exif) -> Option<f64> {
    let field = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;
    let meters = match &field.value {
        Value::Rational(v) => v.first()?.to_f64(),
        _ => return None,
    };
    if !meters.is_finite() {
        return None;
    }
    Some(meters * METERS_TO_FEET)
}

fn capture_timestamp(exif: &exif::Exif) -> Option<NaiveDateTime> {
    let raw = ascii_field(exif, Tag::DateTimeOriginal)?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_yield_no_fix() {
        assert_eq!(extract(b"not an image at all"), None);
        assert_eq!(extract(&[]), None);
    }

    #[test]
    fn test_truncated_jpeg_yields_no_fix() {
        // SOI marker only
        assert_eq!(extract(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn test_relative_altitude_attribute_scan() {
        let xmp = br#"<rdf:Description drone-dji:RelativeAltitude="+57.30"/>"#;
        let feet = relative_altitude_feet(xmp).unwrap();
        assert!((feet - 57.30 * METERS_TO_FEET).abs() < 1e-9);
    }

    #[test]
    fn test_relative_altitude_element_scan() {
        let xmp = b"<drone-dji:RelativeAltitude>-3.5</drone-dji:RelativeAltitude>";
        let feet = relative_altitude_feet(xmp).unwrap();
        assert!((feet + 3.5 * METERS_TO_FEET).abs() < 1e-9);
    }

    #[test]
    fn test_relative_altitude_absent() {
        assert_eq!(relative_altitude_feet(b"<x:xmpmeta/>"), None);
    }
}
