//! Segments: contiguous runs of samples for one channel
//!
//! A segment's end is never stored by the caller; it is derived from the
//! start and the channel's timing. Rate-based channels advance by a fixed
//! period per sample. Indexed channels take their bounds from explicit
//! timestamps, with the last sample closing the segment one nanosecond later.

use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::telem::{Series, TimeRange, TimeSpan, TimeStamp};
use serde::{Deserialize, Serialize};

/// Maps sample offsets within one write onto time
#[derive(Debug, Clone, Copy)]
pub enum Stamps<'a> {
    /// Fixed period between samples
    Rate(TimeSpan),
    /// One timestamp per sample, strictly increasing
    Explicit(&'a [TimeStamp]),
}

impl<'a> Stamps<'a> {
    /// Check explicit stamps against the write's start and sample count
    pub fn check(&self, start: TimeStamp, count: usize) -> Result<()> {
        let Stamps::Explicit(stamps) = self else {
            return Ok(());
        };
        if stamps.len() != count {
            return Err(Error::validation(format!(
                "index holds {} timestamps but series has {} samples",
                stamps.len(),
                count
            )));
        }
        if let Some(first) = stamps.first() {
            if *first < start {
                return Err(Error::validation(format!(
                    "first timestamp {} precedes segment start {}",
                    first.0, start.0
                )));
            }
        }
        if stamps.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::validation("index timestamps must be strictly increasing"));
        }
        Ok(())
    }

    /// Time at which sample `offset` begins; `offset == 0` maps to `start`
    fn at(&self, start: TimeStamp, offset: usize, count: usize) -> TimeStamp {
        match self {
            Stamps::Rate(period) => start + *period * offset as i64,
            Stamps::Explicit(_) if offset == 0 => start,
            Stamps::Explicit(stamps) if offset < count => stamps[offset],
            Stamps::Explicit(stamps) => stamps
                .last()
                .map(|last| *last + TimeSpan::NANOSECOND)
                .unwrap_or(start),
        }
    }
}

/// Time extent of a segment, as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentBounds {
    pub key: ChannelKey,
    pub range: TimeRange,
}

/// A contiguous, immutable run of samples for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub key: ChannelKey,
    pub start: TimeStamp,
    pub end: TimeStamp,
    pub series: Series,
}

impl Segment {
    /// Build a segment whose end is derived from `stamps`
    pub fn new(key: ChannelKey, start: TimeStamp, series: Series, stamps: &Stamps) -> Self {
        let count = series.len();
        let end = stamps.at(start, count, count);
        Self {
            key,
            start,
            end,
            series,
        }
    }

    /// Build a segment with known bounds (e.g. decoded from the wire)
    pub fn with_bounds(bounds: SegmentBounds, series: Series) -> Self {
        Self {
            key: bounds.key,
            start: bounds.range.start,
            end: bounds.range.end,
            series,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::unchecked(self.start, self.end.max(self.start))
    }

    pub fn bounds(&self) -> SegmentBounds {
        SegmentBounds {
            key: self.key,
            range: self.range(),
        }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Split into consecutive sub-segments of at most `max_samples` samples
    ///
    /// Boundaries fall on sample offsets only, and every sub-segment's end is
    /// exactly the next one's start.
    pub fn split(self, stamps: &Stamps, max_samples: usize) -> Result<Vec<Segment>> {
        if max_samples == 0 {
            return Err(Error::validation(
                "payload limit is smaller than a single sample",
            ));
        }
        let count = self.series.len();
        if count <= max_samples {
            return Ok(vec![self]);
        }

        let mut parts = Vec::with_capacity(count.div_ceil(max_samples));
        let mut offset = 0;
        while offset < count {
            let upper = (offset + max_samples).min(count);
            parts.push(Segment {
                key: self.key,
                start: stamps.at(self.start, offset, count),
                end: stamps.at(self.start, upper, count),
                series: self.series.slice(offset..upper),
            });
            offset = upper;
        }
        Ok(parts)
    }
}
