//! Sample buffer type and shape checks

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::telem::Series;

/// Checks that a series matches its channel's declared type and is rank 1
///
/// Stops at the first failing check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarTypeValidator;

impl ScalarTypeValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, channel: &Channel, series: &Series) -> Result<()> {
        if series.data_type() != channel.data_type {
            return Err(Error::validation(format!(
                "invalid data type for channel {}: expected {}, got {}",
                channel.key,
                channel.data_type,
                series.data_type()
            )));
        }
        if series.rank() != 1 {
            return Err(Error::validation(format!(
                "series for channel {} must be one-dimensional, got rank {}",
                channel.key,
                series.rank()
            )));
        }
        Ok(())
    }
}
