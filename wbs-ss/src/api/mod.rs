//! HTTP API handlers for wbs-ss

pub mod health;
pub mod ocr;
pub mod scans;
pub mod sessions;

pub use health::health_routes;
pub use ocr::ocr_routes;
pub use scans::scan_routes;
pub use sessions::session_routes;
