// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::debounce::{Tick, Window};
use crate::line::{LineHandle, Offset, Value};
use crate::{Error, Platform, Result};
use log::{error, info, trace};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of an edge presented to the [`Toggler`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    /// The edge was accepted and the output now has the contained level.
    Toggled(Value),

    /// The edge arrived within the debounce window and was discarded.
    Suppressed,

    /// The edge was accepted but the output could not be written.
    ///
    /// The cached level is left unchanged.
    Failed,

    /// The driver has been torn down so the edge was ignored.
    Ignored,
}

// The state shared between the edge handler and the device.
struct State {
    level: Value,
    window: Window,
    live: bool,
}

/// The toggle controller.
///
/// Holds the cached output level and the debounce window, and applies edge
/// events and forced levels to the output line.
///
/// All mutations occur within a spinning critical section that performs no
/// allocation and never sleeps, so it is safe to enter from an edge handler.
/// Reads go directly to the line and bypass the critical section.
pub struct Toggler<P: Platform + ?Sized> {
    platform: Arc<P>,
    output: LineHandle,
    offset: Offset,
    state: spin::Mutex<State>,
}

impl<P: Platform + ?Sized> Toggler<P> {
    /// Create a controller for an output line already driven to `initial`.
    pub fn new(
        platform: Arc<P>,
        output: LineHandle,
        offset: Offset,
        initial: Value,
        min_gap: Duration,
    ) -> Self {
        Toggler {
            platform,
            output,
            offset,
            state: spin::Mutex::new(State {
                level: initial,
                window: Window::new(min_gap),
                live: true,
            }),
        }
    }

    /// Apply an edge event.
    ///
    /// If the edge falls outside the debounce window then the output level
    /// is flipped and written to the line.
    pub fn on_edge(&self) -> Edge {
        let edge = self.apply_edge();
        match edge {
            Edge::Toggled(level) => {
                info!(
                    "Interrupt occurred: GPIO {} = {}",
                    self.offset,
                    u8::from(level)
                )
            }
            Edge::Suppressed => trace!("GPIO {} edge suppressed by debounce", self.offset),
            Edge::Failed => error!("GPIO {} toggle not written", self.offset),
            Edge::Ignored => trace!("GPIO {} edge ignored after teardown", self.offset),
        }
        edge
    }

    fn apply_edge(&self) -> Edge {
        let mut state = self.state.lock();
        if !state.live {
            return Edge::Ignored;
        }
        let now = self.platform.ticks();
        if !state.window.accept(now) {
            return Edge::Suppressed;
        }
        let level = state.level.not();
        if self.platform.set_value(self.output, level).is_err() {
            return Edge::Failed;
        }
        state.level = level;
        Edge::Toggled(level)
    }

    /// Force the output to `value`.
    ///
    /// The debounce window is unaffected.
    pub fn force(&self, value: Value) -> Result<()> {
        let mut state = self.state.lock();
        if !state.live {
            return Err(Error::NotActive);
        }
        self.platform.set_value(self.output, value)?;
        state.level = value;
        Ok(())
    }

    /// The instantaneous level of the output line.
    ///
    /// This is read from the line, not the cache, so reflects changes made
    /// outside the driver.
    pub fn level(&self) -> Result<Value> {
        if !self.is_live() {
            return Err(Error::NotActive);
        }
        self.platform.value(self.output)
    }

    /// The level most recently written by the controller.
    pub fn cached_level(&self) -> Value {
        self.state.lock().level
    }

    /// The tick of the most recently accepted edge.
    pub fn last_accepted(&self) -> Option<Tick> {
        self.state.lock().window.last_accepted()
    }

    /// The offset of the output line.
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Returns false once the driver has been torn down.
    pub fn is_live(&self) -> bool {
        self.state.lock().live
    }

    // Stop accepting edges and writes.
    //
    // Any edge or write in progress completes before this returns.
    pub(crate) fn shutdown(&self) {
        self.state.lock().live = false;
    }
}

impl<P: Platform + ?Sized> fmt::Debug for Toggler<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toggler")
            .field("offset", &self.offset)
            .field("output", &self.output)
            .finish()
    }
}
