//! Client-side write validation
//!
//! Both validators run before a write reaches the network:
//!
//! ```text
//! series → ScalarTypeValidator → ContiguityValidator → split → encode
//! ```

pub mod contiguity;
pub mod scalar;

pub use contiguity::{ContiguityConfig, ContiguityValidator, HighWaterMarks};
pub use scalar::ScalarTypeValidator;
