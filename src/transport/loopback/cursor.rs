//! Server-side iterator cursor
//!
//! The cursor keeps a view `[start, end)` inside the bounds it was opened
//! with. Span commands slide the view; auto-span commands slide it to the
//! next or previous segment boundary; seeks collapse it to an instant.

use super::store::Store;
use crate::channel::ChannelKey;
use crate::error::{Error, Result};
use crate::iterator::Command;
use crate::segment::Segment;
use crate::telem::{TimeRange, TimeSpan, TimeStamp};

pub(crate) struct Cursor {
    keys: Vec<ChannelKey>,
    bounds: TimeRange,
    view: TimeRange,
    valid: bool,
}

impl Cursor {
    /// Open a cursor; the flag reports whether `bounds` holds any data
    pub fn open(store: &Store, keys: Vec<ChannelKey>, bounds: TimeRange) -> Result<(Self, bool)> {
        if keys.is_empty() {
            return Err(Error::validation("iterator must be opened on at least one channel"));
        }
        for key in &keys {
            if store.channels.get(*key).is_none() {
                return Err(Error::validation(format!("channel {} not found", key)));
            }
        }
        let cursor = Self {
            keys,
            bounds,
            view: instant(bounds.start),
            valid: false,
        };
        let has_data = cursor.slices(store, bounds)?.iter().any(|s| !s.is_empty());
        Ok((cursor, has_data))
    }

    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Execute a positional command, returning the segments now in view
    pub fn exec(&mut self, store: &Store, command: &Command) -> Result<(Vec<Segment>, bool)> {
        command.validate()?;
        let (segments, ok) = match command {
            Command::First => self.edge(store, true)?,
            Command::Last => self.edge(store, false)?,
            Command::Next { span } if span.is_zero() => self.next_segment(store)?,
            Command::Prev { span } if span.is_zero() => self.prev_segment(store)?,
            Command::Next { span } | Command::NextSpan { span } => self.forward(store, *span)?,
            Command::Prev { span } | Command::PrevSpan { span } => self.backward(store, *span)?,
            Command::NextRange { range } => match range.intersection(&self.bounds) {
                Some(view) => self.show(store, view)?,
                None => {
                    self.view = instant(self.bounds.clamp(range.start));
                    (Vec::new(), false)
                }
            },
            Command::SeekFirst => self.seek(store, self.bounds.start, |_| true)?,
            Command::SeekLast => self.seek(store, self.bounds.end, |_| true)?,
            Command::SeekLt { stamp } => {
                let at = self.bounds.clamp(*stamp);
                self.seek(store, at, |s| s.start < at)?
            }
            Command::SeekGe { stamp } => {
                let at = self.bounds.clamp(*stamp);
                self.seek(store, at, |s| s.end > at)?
            }
            Command::Open { .. } | Command::Valid | Command::Close => {
                return Err(Error::unexpected(format!(
                    "{} is not a positional command",
                    command.kind()
                )))
            }
        };
        self.valid = ok;
        Ok((segments, ok))
    }

    /// Data of every channel inside `range`, grouped per channel
    fn slices(&self, store: &Store, range: TimeRange) -> Result<Vec<Segment>> {
        let mut out = Vec::new();
        for key in &self.keys {
            out.extend(store.read(*key, range)?);
        }
        Ok(out)
    }

    fn show(&mut self, store: &Store, view: TimeRange) -> Result<(Vec<Segment>, bool)> {
        self.view = view;
        let segments = self.slices(store, view)?;
        let ok = !segments.is_empty();
        Ok((segments, ok))
    }

    fn edge(&mut self, store: &Store, first: bool) -> Result<(Vec<Segment>, bool)> {
        let mut picked = Vec::new();
        for key in &self.keys {
            let data = store.read(*key, self.bounds)?;
            let segment = if first { data.into_iter().next() } else { data.into_iter().last() };
            picked.extend(segment);
        }
        let start = picked.iter().map(|s| s.start).min();
        let end = picked.iter().map(|s| s.end).max();
        self.view = match (start, end) {
            (Some(start), Some(end)) => TimeRange::unchecked(start, end),
            _ => instant(if first { self.bounds.start } else { self.bounds.end }),
        };
        let ok = !picked.is_empty();
        Ok((picked, ok))
    }

    fn forward(&mut self, store: &Store, span: TimeSpan) -> Result<(Vec<Segment>, bool)> {
        let start = self.view.end;
        if start >= self.bounds.end {
            self.view = instant(self.bounds.end);
            return Ok((Vec::new(), false));
        }
        let end = (start + span).min(self.bounds.end);
        self.show(store, TimeRange::unchecked(start, end))
    }

    fn backward(&mut self, store: &Store, span: TimeSpan) -> Result<(Vec<Segment>, bool)> {
        let end = self.view.start;
        if end <= self.bounds.start {
            self.view = instant(self.bounds.start);
            return Ok((Vec::new(), false));
        }
        let start = (end - span).max(self.bounds.start);
        self.show(store, TimeRange::unchecked(start, end))
    }

    fn next_segment(&mut self, store: &Store) -> Result<(Vec<Segment>, bool)> {
        let from = self.view.end;
        let ahead = TimeRange::unchecked(from, self.bounds.end.max(from));
        let end = self
            .slices(store, ahead)?
            .iter()
            .filter(|s| s.end > from)
            .map(|s| s.end)
            .min();
        match end {
            Some(end) => self.show(store, TimeRange::unchecked(from, end)),
            None => {
                self.view = instant(self.bounds.end);
                Ok((Vec::new(), false))
            }
        }
    }

    fn prev_segment(&mut self, store: &Store) -> Result<(Vec<Segment>, bool)> {
        let to = self.view.start;
        let behind = TimeRange::unchecked(self.bounds.start.min(to), to);
        let start = self
            .slices(store, behind)?
            .iter()
            .filter(|s| s.start < to)
            .map(|s| s.start)
            .max();
        match start {
            Some(start) => self.show(store, TimeRange::unchecked(start, to)),
            None => {
                self.view = instant(self.bounds.start);
                Ok((Vec::new(), false))
            }
        }
    }

    fn seek(
        &mut self,
        store: &Store,
        at: TimeStamp,
        found: impl Fn(&Segment) -> bool,
    ) -> Result<(Vec<Segment>, bool)> {
        self.view = instant(at);
        let ok = self.slices(store, self.bounds)?.iter().any(found);
        Ok((Vec::new(), ok))
    }
}

fn instant(at: TimeStamp) -> TimeRange {
    TimeRange::unchecked(at, at)
}
