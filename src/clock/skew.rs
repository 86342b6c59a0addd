//! Clock skew estimation
//!
//! Each measurement brackets a remote time reading between two local
//! readings. The local midpoint of the bracket is compared with the remote
//! midpoint; the skew is the mean difference over all measurements.

use crate::error::{Error, Result};
use crate::telem::{TimeSpan, TimeStamp};

/// Source of local time
pub type Clock = Box<dyn Fn() -> TimeStamp + Send + Sync>;

/// Accumulates skew samples between the local clock and a remote node
pub struct ClockSkewCalculator {
    now: Clock,
    local_start: Option<TimeStamp>,
    sum: i128,
    count: u32,
}

impl Default for ClockSkewCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSkewCalculator {
    /// Calculator reading the system clock
    pub fn new() -> Self {
        Self::with_clock(Box::new(TimeStamp::now))
    }

    pub fn with_clock(now: Clock) -> Self {
        Self {
            now,
            local_start: None,
            sum: 0,
            count: 0,
        }
    }

    /// Mark the local start of a measurement
    pub fn start(&mut self) {
        self.local_start = Some((self.now)());
    }

    /// Close the open measurement against the remote midpoint, returning the sample
    pub fn end(&mut self, remote_midpoint: TimeStamp) -> Result<TimeSpan> {
        let local_start = self
            .local_start
            .take()
            .ok_or_else(|| Error::unexpected("clock skew measurement ended before it was started"))?;
        let local_end = (self.now)();
        let local_mid = local_start + TimeSpan((local_end - local_start).0.div_euclid(2));
        let sample = local_mid - remote_midpoint;
        self.sum += i128::from(sample.0);
        self.count += 1;
        Ok(sample)
    }

    /// Mean of all samples, truncated toward zero
    pub fn skew(&self) -> TimeSpan {
        if self.count == 0 {
            return TimeSpan::ZERO;
        }
        TimeSpan((self.sum / i128::from(self.count)) as i64)
    }

    /// Whether the magnitude of the skew is above `threshold`
    pub fn exceeds(&self, threshold: TimeSpan) -> bool {
        self.skew().abs() > threshold
    }

    pub fn samples(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    fn manual() -> (ClockSkewCalculator, Arc<AtomicI64>) {
        let time = Arc::new(AtomicI64::new(0));
        let source = time.clone();
        let calc = ClockSkewCalculator::with_clock(Box::new(move || {
            TimeStamp(source.load(Ordering::SeqCst))
        }));
        (calc, time)
    }

    #[test]
    fn test_single_sample() {
        let (mut calc, time) = manual();
        time.store(100, Ordering::SeqCst);
        calc.start();
        time.store(200, Ordering::SeqCst);
        assert_eq!(calc.end(TimeStamp(140)).unwrap(), TimeSpan(10));
        assert_eq!(calc.skew(), TimeSpan(10));
        assert!(calc.exceeds(TimeSpan(5)));
        assert!(!calc.exceeds(TimeSpan(10)));
    }

    #[test]
    fn test_midpoint_rounds_to_earlier_instant() {
        let (mut calc, time) = manual();
        time.store(100, Ordering::SeqCst);
        calc.start();
        time.store(101, Ordering::SeqCst);
        assert_eq!(calc.end(TimeStamp(0)).unwrap(), TimeSpan(100));

        // local clock stepped backwards during the measurement
        time.store(101, Ordering::SeqCst);
        calc.start();
        time.store(100, Ordering::SeqCst);
        assert_eq!(calc.end(TimeStamp(0)).unwrap(), TimeSpan(100));
    }

    #[test]
    fn test_opposite_samples_cancel() {
        let (mut calc, time) = manual();
        for remote in [140, 160] {
            time.store(100, Ordering::SeqCst);
            calc.start();
            time.store(200, Ordering::SeqCst);
            calc.end(TimeStamp(remote)).unwrap();
        }
        assert_eq!(calc.samples(), 2);
        assert_eq!(calc.skew(), TimeSpan::ZERO);
    }

    #[test]
    fn test_mean_truncates_toward_zero() {
        let (mut calc, _) = manual();
        for remote in [1, 2] {
            calc.start();
            calc.end(TimeStamp(remote)).unwrap();
        }
        // samples of -1 and -2
        assert_eq!(calc.skew(), TimeSpan(-1));
    }

    #[test]
    fn test_no_samples_is_zero() {
        let (calc, _) = manual();
        assert_eq!(calc.skew(), TimeSpan::ZERO);
        assert!(!calc.exceeds(TimeSpan::ZERO));
    }

    #[test]
    fn test_end_without_start() {
        let (mut calc, _) = manual();
        assert!(matches!(calc.end(TimeStamp(1)), Err(Error::Unexpected(_))));

        calc.start();
        calc.end(TimeStamp(0)).unwrap();
        assert!(calc.end(TimeStamp(0)).is_err());
    }
}
