//! Committed segment storage for the loopback cluster

use crate::channel::{Channel, ChannelCache, ChannelKey, ChannelRetriever, Timing};
use crate::error::{Error, Result};
use crate::segment::Segment;
use crate::telem::{TimeRange, TimeSpan, TimeStamp};
use std::collections::HashMap;

/// How sample offsets inside a stored segment map onto time
enum Spacing {
    Period(TimeSpan),
    Stamps(Vec<TimeStamp>),
    /// Timestamps unknown; the segment can only be served whole
    Opaque,
}

/// Channel definitions plus committed, time-ordered segments per channel
#[derive(Debug, Default)]
pub(crate) struct Store {
    pub channels: ChannelCache,
    segments: HashMap<ChannelKey, Vec<Segment>>,
}

impl Store {
    pub fn create_channel(&mut self, channel: Channel) -> Result<()> {
        self.channels.insert(channel)
    }

    pub fn segments(&self, key: ChannelKey) -> &[Segment] {
        self.segments.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// End of the last committed segment of a channel
    pub fn high_water_mark(&self, key: ChannelKey) -> Option<TimeStamp> {
        self.segments(key).iter().map(|s| s.end).max()
    }

    /// Make `pending` visible, rejecting the whole batch on any overlap
    pub fn commit(&mut self, pending: Vec<Segment>) -> Result<()> {
        let mut staged: HashMap<ChannelKey, Vec<Segment>> = HashMap::new();
        for segment in pending {
            if segment.is_empty() {
                continue;
            }
            let existing = staged
                .entry(segment.key)
                .or_insert_with(|| self.segments(segment.key).to_vec());
            if let Some(clash) = existing
                .iter()
                .find(|s| s.range().overlaps(&segment.range()))
            {
                return Err(Error::contiguity(format!(
                    "commit overlaps committed data for channel {}: {} and {}",
                    segment.key,
                    segment.range(),
                    clash.range()
                )));
            }
            existing.push(segment);
        }
        for (key, mut segments) in staged {
            segments.sort_by_key(|s| s.start);
            self.segments.insert(key, segments);
        }
        Ok(())
    }

    /// Committed data of `key` clipped to `range`, in time order
    pub fn read(&self, key: ChannelKey, range: TimeRange) -> Result<Vec<Segment>> {
        let channel = self.channels.retrieve(key)?;
        let timing = channel.timing()?;
        let mut out = Vec::new();
        for segment in self.segments(key) {
            if !segment.range().overlaps(&range) {
                continue;
            }
            let spacing = self.spacing(timing, segment);
            if let Some(slice) = clip(segment, &spacing, range) {
                out.push(slice);
            }
        }
        Ok(out)
    }

    fn spacing(&self, timing: Timing, segment: &Segment) -> Spacing {
        let stamps = match timing {
            Timing::Rate(period) => return Spacing::Period(period),
            Timing::SelfIndexed => segment.series.values::<TimeStamp>().ok(),
            Timing::IndexedBy(index) => self
                .segments(index)
                .iter()
                .find(|s| s.start == segment.start && s.len() == segment.len())
                .and_then(|s| s.series.values::<TimeStamp>().ok()),
        };
        stamps.map(Spacing::Stamps).unwrap_or(Spacing::Opaque)
    }
}

/// Samples of `segment` whose timestamps fall in `range`
fn clip(segment: &Segment, spacing: &Spacing, range: TimeRange) -> Option<Segment> {
    let count = segment.len();
    let (lo, hi, start, end) = match spacing {
        Spacing::Opaque => return Some(segment.clone()),
        Spacing::Period(period) => {
            let p = period.0.max(1);
            let offset = |stamp: TimeStamp| -> usize {
                if stamp <= segment.start {
                    return 0;
                }
                let delta = (stamp - segment.start).0;
                let idx = delta / p + i64::from(delta % p != 0);
                (idx.max(0) as usize).min(count)
            };
            let lo = offset(range.start);
            let hi = if range.end >= segment.end {
                count
            } else {
                offset(range.end)
            };
            let at = |i: usize| {
                if i == count {
                    segment.end
                } else {
                    segment.start + *period * i as i64
                }
            };
            (lo, hi, at(lo), at(hi))
        }
        Spacing::Stamps(stamps) => {
            let lo = stamps.partition_point(|s| *s < range.start);
            let hi = stamps.partition_point(|s| *s < range.end);
            let start = if lo == 0 && range.start <= segment.start {
                segment.start
            } else {
                stamps.get(lo).copied().unwrap_or(segment.end)
            };
            let end = stamps.get(hi).copied().unwrap_or(segment.end);
            (lo, hi, start, end)
        }
    };
    if lo >= hi {
        return None;
    }
    if lo == 0 && hi == count {
        return Some(segment.clone());
    }
    Some(Segment {
        key: segment.key,
        start,
        end,
        series: segment.series.slice(lo..hi),
    })
}
