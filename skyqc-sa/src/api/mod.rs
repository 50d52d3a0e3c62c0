//! HTTP API
//!
//! - `health`: service health and uptime
//! - `sessions`: connect/list/disconnect remote sessions
//! - `sites`: browse directories and run site analysis

pub mod health;
pub mod sessions;
pub mod sites;

pub use health::health_routes;
pub use sessions::session_routes;
pub use sites::site_routes;
