// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::time::Duration;

/// A reading of a monotonic millisecond counter.
///
/// The counter wraps at `u32::MAX`, so ticks must only be compared via
/// [`elapsed_since`], which remains correct across the wrap.
///
/// [`elapsed_since`]: Tick::elapsed_since
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Tick(u32);

impl Tick {
    pub const fn from_millis(ms: u32) -> Self {
        Tick(ms)
    }

    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    /// The number of milliseconds from `earlier` to this tick.
    pub const fn elapsed_since(&self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// The tick `period` after this one.
    pub fn wrapping_add(self, period: Duration) -> Tick {
        Tick(self.0.wrapping_add(to_millis(period)))
    }
}

/// A source of monotonic ticks.
///
/// Reading the clock must not block as it is read from edge handlers.
pub trait Clock: Send + Sync {
    fn ticks(&self) -> Tick;
}

/// A software debounce filter for edge events.
///
/// An event is accepted only if at least the minimum gap has elapsed since
/// the previously accepted event. The first event is always accepted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Window {
    last_accepted: Option<Tick>,
    min_gap: u32,
}

impl Window {
    /// A window requiring `min_gap` between accepted events.
    ///
    /// The gap is truncated to whole milliseconds.
    pub fn new(min_gap: Duration) -> Self {
        Window {
            last_accepted: None,
            min_gap: to_millis(min_gap),
        }
    }

    /// Returns true and records `now` if the event at `now` is accepted.
    ///
    /// Rejected events leave the window unchanged.
    pub fn accept(&mut self, now: Tick) -> bool {
        if let Some(last) = self.last_accepted {
            if now.elapsed_since(last) < self.min_gap {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }

    /// The tick of the most recently accepted event.
    pub fn last_accepted(&self) -> Option<Tick> {
        self.last_accepted
    }

    /// The minimum gap between accepted events, in milliseconds.
    pub fn min_gap(&self) -> u32 {
        self.min_gap
    }
}

// saturates rather than wraps periods beyond the tick range
fn to_millis(period: Duration) -> u32 {
    u32::try_from(period.as_millis()).unwrap_or(u32::MAX)
}
