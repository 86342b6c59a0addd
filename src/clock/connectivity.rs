//! Cluster connectivity and clock check

use super::skew::ClockSkewCalculator;
use crate::config::ClockConfig;
use crate::error::Result;
use crate::telem::{TimeSpan, TimeStamp};
use async_trait::async_trait;

/// Read-only view of a cluster node used for health checks
#[async_trait]
pub trait ClusterInfo: Send + Sync {
    fn address(&self) -> &str;

    /// Current time on the node
    async fn node_time(&self) -> Result<TimeStamp>;
}

/// Outcome of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub address: String,
    pub skew: TimeSpan,
    pub samples: u32,
    pub threshold: TimeSpan,
    pub exceeded: bool,
}

/// Measures clock skew against a node and warns when it is too large
#[derive(Debug, Clone)]
pub struct ConnectivityChecker {
    threshold: TimeSpan,
    samples: u32,
}

impl ConnectivityChecker {
    pub fn new(threshold: TimeSpan, samples: u32) -> Self {
        Self {
            threshold,
            samples: samples.max(1),
        }
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::new(TimeSpan::from_millis(config.skew_threshold_ms as i64), config.samples)
    }

    /// Check the node using the system clock
    pub async fn check(&self, info: &dyn ClusterInfo) -> Result<ConnectivityReport> {
        self.check_with(info, ClockSkewCalculator::new()).await
    }

    /// Check the node, accumulating into `calculator`
    pub async fn check_with(
        &self,
        info: &dyn ClusterInfo,
        mut calculator: ClockSkewCalculator,
    ) -> Result<ConnectivityReport> {
        for _ in 0..self.samples {
            calculator.start();
            let remote = info.node_time().await?;
            calculator.end(remote)?;
        }

        let skew = calculator.skew();
        let exceeded = calculator.exceeds(self.threshold);
        if exceeded {
            tracing::warn!(
                address = info.address(),
                skew = %skew,
                threshold = %self.threshold,
                "measured clock skew exceeds threshold"
            );
        } else {
            tracing::debug!(address = info.address(), skew = %skew, "clock skew within threshold");
        }

        Ok(ConnectivityReport {
            address: info.address().to_string(),
            skew,
            samples: calculator.samples(),
            threshold: self.threshold,
            exceeded,
        })
    }
}
