//! Risk scoring and regulatory compliance analytics.
//!
//! Pure computation modules (`dime`, `residual`, `category_resolver`,
//! `sector_aggregator`, `outlier_detector`, `compliance_tracker`) take
//! validated records and return fresh values. `store` and `fetch` load those
//! records from a SQLite snapshot; `engine` wires the two halves together.

pub mod category_resolver;
pub mod compliance_tracker;
pub mod config;
pub mod dime;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod outlier_detector;
pub mod residual;
pub mod sector_aggregator;
pub mod severity;
pub mod store;
pub mod types;
