//! Per-minute aggregation of raw measurements and positions.
use std::collections::VecDeque;

use log::{debug, warn};

use crate::message::{Message, NavHpPosLlh, RxmRawx};

mod window;

pub use window::{ClosedWindow, WindowState};

/// Default bound of the pending position buffer: one hour at 1 Hz.
pub const DEFAULT_MAX_PENDING: usize = 3600;

/// Outbound data streams
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Raw measurements
    Raw,
    /// High precision positions
    Position,
}

impl Stream {
    /// Collector endpoint (and queue file suffix).
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Raw => "rawgps",
            Self::Position => "posgps",
        }
    }
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// A window released by the [Aggregator].
#[derive(Debug, Clone, PartialEq)]
pub enum Closed {
    Raw(ClosedWindow<RxmRawx>),
    Position(ClosedWindow<NavHpPosLlh>),
}

impl Closed {
    pub fn stream(&self) -> Stream {
        match self {
            Self::Raw(_) => Stream::Raw,
            Self::Position(_) => Stream::Position,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Raw(window) => window.batch.len(),
            Self::Position(window) => window.batch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Progress of a raw measurement within its UTC minute.
pub fn raw_progress(rawx: &RxmRawx) -> f64 {
    (rawx.rcv_tow - rawx.leap_s as f64).rem_euclid(60.0)
}

/// Progress of a position within its UTC minute.
pub fn position_progress(pos: &NavHpPosLlh, leap_seconds: i8) -> f64 {
    (pos.itow as f64 / 1000.0 - leap_seconds as f64).rem_euclid(60.0)
}

/// [Aggregator] groups messages into per-minute windows, one per [Stream].
///
/// Positions only carry a GPS time of week: their UTC minute is only known
/// once a raw measurement reported the leap second offset. Until then they
/// are buffered, oldest first, within `max_pending` entries.
pub struct Aggregator {
    raw: WindowState<RxmRawx>,
    position: WindowState<NavHpPosLlh>,
    pending: VecDeque<NavHpPosLlh>,
    max_pending: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl Aggregator {
    /// Builds new [Aggregator]
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending,
            raw: Default::default(),
            position: Default::default(),
            pending: VecDeque::with_capacity(max_pending.min(DEFAULT_MAX_PENDING)),
        }
    }

    /// Number of positions waiting for the leap second offset.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn raw_window(&self) -> &WindowState<RxmRawx> {
        &self.raw
    }

    pub fn position_window(&self) -> &WindowState<NavHpPosLlh> {
        &self.position
    }

    /// Aggregates one message. Returns the windows it closed, in closing order.
    /// Messages other than raw measurements and positions are ignored.
    pub fn consume(&mut self, message: Message) -> Vec<Closed> {
        match message {
            Message::RawMeasurement(rawx) => self.consume_raw(rawx),
            Message::HighPrecisionPosition(pos) => self.consume_position(pos).into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn consume_raw(&mut self, rawx: RxmRawx) -> Vec<Closed> {
        let mut closed = Vec::new();

        let (week, leap_seconds) = (rawx.week, rawx.leap_s);
        let metric = raw_progress(&rawx);

        if let Some(window) = self.raw.push(rawx, metric, Some(week), Some(leap_seconds)) {
            closed.push(Closed::Raw(window));
        }

        self.position.observe(Some(week), Some(leap_seconds));

        if !self.pending.is_empty() {
            debug!(
                "leap seconds known ({}), replaying {} pending positions",
                leap_seconds,
                self.pending.len()
            );

            while let Some(pos) = self.pending.pop_front() {
                closed.extend(self.consume_position(pos));
            }
        }

        closed
    }

    fn consume_position(&mut self, pos: NavHpPosLlh) -> Option<Closed> {
        let Some(leap_seconds) = self.position.leap_seconds() else {
            if self.pending.len() >= self.max_pending {
                warn!(
                    "leap seconds still unknown: dropping oldest of {} pending positions",
                    self.pending.len()
                );
                self.pending.pop_front();
            }
            if self.max_pending > 0 {
                self.pending.push_back(pos);
            }
            return None;
        };

        let metric = position_progress(&pos, leap_seconds);

        self.position
            .push(pos, metric, None, None)
            .map(Closed::Position)
    }

    /// Releases both open windows, used once the input is exhausted.
    pub fn flush(&mut self) -> Vec<Closed> {
        if !self.pending.is_empty() {
            warn!(
                "leap seconds never known: {} positions discarded",
                self.pending.len()
            );
            self.pending.clear();
        }

        let raw = self.raw.flush().map(Closed::Raw);
        let position = self.position.flush().map(Closed::Position);

        raw.into_iter().chain(position).collect()
    }
}
