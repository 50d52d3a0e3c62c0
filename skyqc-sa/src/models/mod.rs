//! Data model for site analysis

pub mod analysis;
pub mod connection;

pub use analysis::{
    AxisRanges, Classification, ClassifiedPoint, FolderAnalysis, GeoBounds, GpsFix, GpsPoint,
    ImageDescriptor, PointClass, SiteAnalysis, SiteInfo,
};
pub use connection::{ConnectionInfo, ConnectionType};
