//! Clock synchronization checks
//!
//! - **skew**: `ClockSkewCalculator`, midpoint-based skew estimation
//! - **connectivity**: `ConnectivityChecker`, samples a node and warns on skew

pub mod connectivity;
pub mod skew;

pub use connectivity::{ClusterInfo, ConnectivityChecker, ConnectivityReport};
pub use skew::{Clock, ClockSkewCalculator};
