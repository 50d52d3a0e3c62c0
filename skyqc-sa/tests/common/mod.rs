//! Shared test fixtures: a minimal JPEG writer that embeds real Exif GPS
//! tags (and optionally a DJI XMP packet), plus site-tree builders and
//! transport stubs.

#![allow(dead_code)]

use std::path::Path;

use async_trait::async_trait;
use skyqc_sa::transport::{RemoteSession, SessionFactory, TransportError};

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

const TAG_GPS_IFD: u16 = 0x8825;
const TAG_LAT_REF: u16 = 0x0001;
const TAG_LAT: u16 = 0x0002;
const TAG_LON_REF: u16 = 0x0003;
const TAG_LON: u16 = 0x0004;
const TAG_ALTITUDE: u16 = 0x0006;

struct IfdEntry {
    tag: u16,
    kind: u16,
    count: u32,
    payload: Vec<u8>,
}

/// Degrees/minutes/seconds rationals for an absolute coordinate value.
fn dms(value: f64) -> [(u32, u32); 3] {
    let total = value.abs();
    let d = total.floor();
    let m = ((total - d) * 60.0).floor();
    let s = (total - d) * 3600.0 - m * 60.0;
    [
        (d as u32, 1),
        (m as u32, 1),
        ((s * 10_000.0).round() as u32, 10_000),
    ]
}

fn rational_bytes(pairs: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pairs.len() * 8);
    for (n, d) in pairs {
        out.extend_from_slice(&n.to_le_bytes());
        out.extend_from_slice(&d.to_le_bytes());
    }
    out
}

/// Builds JPEG bytes carrying whatever GPS metadata the test asks for.
#[derive(Default)]
pub struct JpegBuilder {
    lat: Option<f64>,
    lat_ref: Option<u8>,
    lon: Option<f64>,
    lon_ref: Option<u8>,
    gps_altitude_m: Option<f64>,
    xmp_relative_altitude_m: Option<f64>,
}

impl JpegBuilder {
    /// Full coordinate pair; hemisphere references follow the signs.
    pub fn coords(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lat_ref: Some(if lat >= 0.0 { b'N' } else { b'S' }),
            lon: Some(lon),
            lon_ref: Some(if lon >= 0.0 { b'E' } else { b'W' }),
            ..Default::default()
        }
    }

    pub fn without_lat_ref(mut self) -> Self {
        self.lat_ref = None;
        self
    }

    pub fn without_coords(mut self) -> Self {
        self.lat = None;
        self.lat_ref = None;
        self.lon = None;
        self.lon_ref = None;
        self
    }

    pub fn gps_altitude(mut self, meters: f64) -> Self {
        self.gps_altitude_m = Some(meters);
        self
    }

    pub fn relative_altitude(mut self, meters: f64) -> Self {
        self.xmp_relative_altitude_m = Some(meters);
        self
    }

    fn gps_entries(&self) -> Vec<IfdEntry> {
        let mut entries = Vec::new();
        if let Some(r) = self.lat_ref {
            entries.push(IfdEntry {
                tag: TAG_LAT_REF,
                kind: TYPE_ASCII,
                count: 2,
                payload: vec![r, 0],
            });
        }
        if let Some(lat) = self.lat {
            entries.push(IfdEntry {
                tag: TAG_LAT,
                kind: TYPE_RATIONAL,
                count: 3,
                payload: rational_bytes(&dms(lat)),
            });
        }
        if let Some(r) = self.lon_ref {
            entries.push(IfdEntry {
                tag: TAG_LON_REF,
                kind: TYPE_ASCII,
                count: 2,
                payload: vec![r, 0],
            });
        }
        if let Some(lon) = self.lon {
            entries.push(IfdEntry {
                tag: TAG_LON,
                kind: TYPE_RATIONAL,
                count: 3,
                payload: rational_bytes(&dms(lon)),
            });
        }
        if let Some(meters) = self.gps_altitude_m {
            entries.push(IfdEntry {
                tag: TAG_ALTITUDE,
                kind: TYPE_RATIONAL,
                count: 1,
                payload: rational_bytes(&[((meters * 1000.0).round() as u32, 1000)]),
            });
        }
        entries
    }

    /// Little-endian TIFF body: IFD0 holding only the GPS sub-IFD pointer,
    /// then the GPS IFD, then out-of-line values.
    fn tiff(&self) -> Vec<u8> {
        let entries = self.gps_entries();

        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());

        // IFD0: one entry (GPS IFD pointer), at offset 8
        let gps_ifd_offset: u32 = 8 + 2 + 12 + 4;
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&TAG_GPS_IFD.to_le_bytes());
        tiff.extend_from_slice(&TYPE_LONG.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&gps_ifd_offset.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());

        // GPS IFD
        tiff.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        let mut data_offset = gps_ifd_offset + 2 + entries.len() as u32 * 12 + 4;
        let mut data = Vec::new();
        for entry in &entries {
            tiff.extend_from_slice(&entry.tag.to_le_bytes());
            tiff.extend_from_slice(&entry.kind.to_le_bytes());
            tiff.extend_from_slice(&entry.count.to_le_bytes());
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                tiff.extend_from_slice(&inline);
            } else {
                tiff.extend_from_slice(&data_offset.to_le_bytes());
                data_offset += entry.payload.len() as u32;
                data.extend_from_slice(&entry.payload);
            }
        }
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&data);
        tiff
    }

    pub fn build(&self) -> Vec<u8> {
        let mut jpeg = vec![0xFF, 0xD8];

        let mut exif_segment = Vec::from(&b"Exif\0\0"[..]);
        exif_segment.extend_from_slice(&self.tiff());
        push_app1(&mut jpeg, &exif_segment);

        if let Some(meters) = self.xmp_relative_altitude_m {
            let packet = format!(
                concat!(
                    r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF>"#,
                    r#"<rdf:Description drone-dji:RelativeAltitude="{:+.2}"/>"#,
                    r#"</rdf:RDF></x:xmpmeta>"#
                ),
                meters
            );
            let mut xmp_segment = Vec::from(&b"http://ns.adobe.com/xap/1.0/\0"[..]);
            xmp_segment.extend_from_slice(packet.as_bytes());
            push_app1(&mut jpeg, &xmp_segment);
        }

        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }
}

fn push_app1(jpeg: &mut Vec<u8>, segment: &[u8]) {
    jpeg.extend_from_slice(&[0xFF, 0xE1]);
    jpeg.extend_from_slice(&((segment.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(segment);
}

/// Write `count` images into `folder`, spread over a small coordinate
/// cluster around (`lat`, `lon`) at `alt_m` meters relative altitude.
pub async fn write_image_cluster(
    folder: &Path,
    count: usize,
    lat: f64,
    lon: f64,
    alt_m: f64,
) {
    tokio::fs::create_dir_all(folder).await.unwrap();
    for i in 0..count {
        let jitter = i as f64 * 1e-5;
        let bytes = JpegBuilder::coords(lat + jitter, lon + jitter)
            .relative_altitude(alt_m)
            .build();
        tokio::fs::write(folder.join(format!("IMG_{:04}.JPG", i)), bytes)
            .await
            .unwrap();
    }
}

/// A factory whose sessions never open; forces the sequential fallback.
pub struct FailingFactory;

#[async_trait]
impl SessionFactory for FailingFactory {
    async fn open_session(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        Err(TransportError::ConnectionClosed(
            "connection refused".to_string(),
        ))
    }
}
