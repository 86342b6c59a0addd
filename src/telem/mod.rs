//! Telemetry primitives
//!
//! - **time**: `TimeStamp`, `TimeSpan`, `TimeRange`, `Rate`
//! - **data_type**: scalar types and the `Sample` trait for native values
//! - **series**: typed sample buffers

pub mod data_type;
pub mod series;
pub mod time;

pub use data_type::{DataType, Sample};
pub use series::Series;
pub use time::{Rate, TimeRange, TimeSpan, TimeStamp};
