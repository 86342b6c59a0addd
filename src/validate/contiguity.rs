//! Temporal ordering checks against a per-channel high-water mark
//!
//! The high-water mark (HWM) of a channel is the end of the last segment
//! accepted for it. The table is owned by one writer session and is only
//! mutated after a segment has passed every check.

use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::telem::TimeStamp;
use serde::Deserialize;
use std::collections::HashMap;

/// Policy flags for the contiguity validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct ContiguityConfig {
    /// Treat a missing high-water mark as pass-through instead of an error
    #[serde(default)]
    pub allow_no_high_water_mark: bool,
    /// Skip the start-before-HWM check
    #[serde(default)]
    pub allow_overlap: bool,
    /// Skip the start-must-equal-HWM check
    #[serde(default)]
    pub allow_gap: bool,
}

impl ContiguityConfig {
    /// Strict ordering, but the first segment of a channel seeds its mark
    pub fn seeding() -> Self {
        Self {
            allow_no_high_water_mark: true,
            ..Self::default()
        }
    }
}

/// End of the last accepted segment, per channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighWaterMarks {
    marks: HashMap<ChannelKey, TimeStamp>,
}

impl HighWaterMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ChannelKey) -> Option<TimeStamp> {
        self.marks.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    fn set(&mut self, key: ChannelKey, stamp: TimeStamp) {
        self.marks.insert(key, stamp);
    }
}

/// Enforces ordering, gap and overlap policy per channel
#[derive(Debug, Clone, Default)]
pub struct ContiguityValidator {
    config: ContiguityConfig,
    marks: HighWaterMarks,
}

impl ContiguityValidator {
    pub fn new(config: ContiguityConfig) -> Self {
        Self {
            config,
            marks: HighWaterMarks::new(),
        }
    }

    pub fn config(&self) -> ContiguityConfig {
        self.config
    }

    /// Current high-water mark for a channel
    pub fn high_water_mark(&self, key: ChannelKey) -> Option<TimeStamp> {
        self.marks.get(key)
    }

    /// Copy of the whole table
    pub fn snapshot(&self) -> HighWaterMarks {
        self.marks.clone()
    }

    /// Set a channel's mark directly, e.g. from the last committed end on the server
    pub fn seed(&mut self, key: ChannelKey, stamp: TimeStamp) {
        self.marks.set(key, stamp);
    }

    /// Validate one segment and advance its channel's mark
    pub fn validate(&mut self, segment: &Segment) -> Result<()> {
        self.check(self.marks.get(segment.key), segment)?;
        self.marks.set(segment.key, segment.end);
        Ok(())
    }

    /// Validate a sequence of segments as one unit
    ///
    /// Each segment is checked against the marks left by the ones before it.
    /// Marks are only written if every segment passes.
    pub fn validate_batch(&mut self, segments: &[Segment]) -> Result<()> {
        let mut staged: HashMap<ChannelKey, TimeStamp> = HashMap::new();
        for segment in segments {
            let mark = staged
                .get(&segment.key)
                .copied()
                .or_else(|| self.marks.get(segment.key));
            self.check(mark, segment)?;
            staged.insert(segment.key, segment.end);
        }
        for (key, end) in staged {
            self.marks.set(key, end);
        }
        Ok(())
    }

    fn check(&self, mark: Option<TimeStamp>, segment: &Segment) -> Result<()> {
        let Some(mark) = mark else {
            if self.config.allow_no_high_water_mark {
                return Ok(());
            }
            return Err(Error::unexpected(format!(
                "no high water mark for channel {}",
                segment.key
            )));
        };

        if segment.start < mark && !self.config.allow_overlap {
            tracing::debug!(
                channel = segment.key,
                start = segment.start.0,
                hwm = mark.0,
                "rejected overlapping segment"
            );
            return Err(Error::contiguity(format!(
                "next segment start precedes previous segment end for channel {} ({} < {})",
                segment.key, segment.start.0, mark.0
            )));
        }
        if segment.start != mark && !self.config.allow_gap {
            tracing::debug!(
                channel = segment.key,
                start = segment.start.0,
                hwm = mark.0,
                "rejected non-contiguous segment"
            );
            return Err(Error::contiguity(format!(
                "next segment start must equal previous segment end for channel {} ({} != {})",
                segment.key, segment.start.0, mark.0
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Stamps;
    use crate::telem::{Series, TimeSpan};
    use proptest::prelude::*;

    const UNIT: Stamps<'static> = Stamps::Rate(TimeSpan(1));

    fn segment(key: ChannelKey, start: i64, samples: usize) -> Segment {
        Segment::new(key, TimeStamp(start), Series::new(vec![0i64; samples]), &UNIT)
    }

    fn strict() -> ContiguityValidator {
        ContiguityValidator::new(ContiguityConfig::default())
    }

    #[test]
    fn test_missing_mark_is_unexpected_when_required() {
        let mut v = strict();
        let err = v.validate(&segment(1, 0, 5)).unwrap_err();
        assert!(matches!(err, Error::Unexpected(_)));
        assert!(v.snapshot().is_empty());
    }

    #[test]
    fn test_first_segment_seeds_mark() {
        let mut v = ContiguityValidator::new(ContiguityConfig::seeding());
        v.validate(&segment(1, 100, 5)).unwrap();
        assert_eq!(v.high_water_mark(1), Some(TimeStamp(105)));
    }

    #[test]
    fn test_contiguous_segments_pass() {
        let mut v = strict();
        v.seed(1, TimeStamp(0));
        v.validate(&segment(1, 0, 10)).unwrap();
        v.validate(&segment(1, 10, 10)).unwrap();
        assert_eq!(v.high_water_mark(1), Some(TimeStamp(20)));
    }

    #[test]
    fn test_overlap_rejected_and_mark_untouched() {
        let mut v = strict();
        v.seed(1, TimeStamp(50));
        let before = v.snapshot();
        let err = v.validate(&segment(1, 40, 5)).unwrap_err();
        assert!(matches!(err, Error::Contiguity(ref m) if m.contains("precedes")));
        assert_eq!(v.snapshot(), before);
    }

    #[test]
    fn test_gap_rejected() {
        let mut v = strict();
        v.seed(1, TimeStamp(50));
        let err = v.validate(&segment(1, 60, 5)).unwrap_err();
        assert!(matches!(err, Error::Contiguity(ref m) if m.contains("must equal")));
        assert_eq!(v.high_water_mark(1), Some(TimeStamp(50)));
    }

    #[test]
    fn test_allow_gap_still_rejects_overlap() {
        let mut v = ContiguityValidator::new(ContiguityConfig {
            allow_gap: true,
            ..ContiguityConfig::default()
        });
        v.seed(1, TimeStamp(50));
        v.validate(&segment(1, 70, 5)).unwrap();
        assert!(v.validate(&segment(1, 60, 5)).is_err());
    }

    #[test]
    fn test_allow_overlap_still_requires_equal_start() {
        let mut v = ContiguityValidator::new(ContiguityConfig {
            allow_overlap: true,
            ..ContiguityConfig::default()
        });
        v.seed(1, TimeStamp(50));
        // start < hwm also differs from hwm, so the gap check rejects it
        assert!(v.validate(&segment(1, 40, 5)).is_err());
        v.validate(&segment(1, 50, 5)).unwrap();
    }

    #[test]
    fn test_all_flags_accept_anything() {
        let mut v = ContiguityValidator::new(ContiguityConfig {
            allow_no_high_water_mark: true,
            allow_overlap: true,
            allow_gap: true,
        });
        v.validate(&segment(1, 100, 1)).unwrap();
        v.validate(&segment(1, 0, 1)).unwrap();
        assert_eq!(v.high_water_mark(1), Some(TimeStamp(1)));
    }

    #[test]
    fn test_channels_are_independent() {
        let mut v = ContiguityValidator::new(ContiguityConfig::seeding());
        v.validate(&segment(1, 0, 10)).unwrap();
        v.validate(&segment(2, 500, 10)).unwrap();
        assert!(v.validate(&segment(2, 10, 1)).is_err());
        v.validate(&segment(1, 10, 1)).unwrap();
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let mut v = ContiguityValidator::new(ContiguityConfig::seeding());
        v.validate(&segment(1, 0, 10)).unwrap();
        let before = v.snapshot();

        let batch = vec![segment(1, 10, 5), segment(2, 0, 5), segment(1, 16, 5)];
        assert!(v.validate_batch(&batch).is_err());
        assert_eq!(v.snapshot(), before);

        let batch = vec![segment(1, 10, 5), segment(2, 0, 5), segment(1, 15, 5)];
        v.validate_batch(&batch).unwrap();
        assert_eq!(v.high_water_mark(1), Some(TimeStamp(20)));
        assert_eq!(v.high_water_mark(2), Some(TimeStamp(5)));
    }

    #[test]
    fn test_thousand_segments_then_one_unit_overlap() {
        let mut v = ContiguityValidator::new(ContiguityConfig::seeding());
        for i in 0..1000 {
            v.validate(&segment(9, i, 1)).unwrap();
        }
        assert_eq!(v.high_water_mark(9), Some(TimeStamp(1000)));

        let err = v.validate(&segment(9, 999, 1)).unwrap_err();
        assert!(matches!(err, Error::Contiguity(_)));
        assert_eq!(v.high_water_mark(9), Some(TimeStamp(1000)));
    }

    proptest! {
        #[test]
        fn prop_strict_chain_accepts_iff_contiguous(
            specs in prop::collection::vec((-3i64..=3, 1usize..20), 1..40),
        ) {
            let mut v = strict();
            let first = segment(1, 0, specs[0].1);
            v.seed(1, TimeStamp(0));
            v.validate(&first).unwrap();

            let mut expected_mark = first.end;
            for (shift, len) in specs.iter().skip(1) {
                let seg = segment(1, expected_mark.0 + shift, *len);
                let before = v.snapshot();
                let result = v.validate(&seg);
                if *shift == 0 {
                    prop_assert!(result.is_ok());
                    expected_mark = seg.end;
                } else {
                    prop_assert!(matches!(result, Err(Error::Contiguity(_))));
                    prop_assert_eq!(v.snapshot(), before);
                }
                prop_assert_eq!(v.high_water_mark(1), Some(expected_mark));
            }
        }
    }
}
