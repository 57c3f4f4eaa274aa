// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The simulator models a single chip with a fixed number of lines.
//!
//! Input lines are driven by a simulated external pull, and changes to the
//! pull raise edges on the lines, which call any bound handlers on the
//! calling thread.
//! The clock is manual, and only advances when told to.
//!
//! Faults can be injected via the [`Bank`] to exercise error paths:
//! lines may be hogged by another consumer, may lack an interrupt, may have
//! their interrupt registration refused, or may not support debounce.
//!
//! For simple tests that only require a chip with a number of lines the
//! [`simpleton`] provides a simplified constructor.

use crate::debounce::{Clock, Tick};
use crate::irq::{EdgeDetection, EdgeIrq, Handler, InterruptId};
use crate::line::{Direction, Gpio, LineHandle, Offset, Value};
use crate::{Error, Result};
use log::{debug, warn};
use nohash_hasher::{IntMap, IntSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Build a basic sim with `num_lines` lines and no faults.
pub fn simpleton(num_lines: u32) -> Arc<Sim> {
    Sim::new(&Bank::new(num_lines, "simpleton"))
}

/// The physical level of a line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Level {
    /// The line is physically low.
    #[default]
    Low,

    /// The line is physically high.
    High,
}

impl From<Level> for Value {
    fn from(l: Level) -> Value {
        match l {
            Level::Low => Value::Inactive,
            Level::High => Value::Active,
        }
    }
}

impl From<Value> for Level {
    fn from(v: Value) -> Level {
        match v {
            Value::Inactive => Level::Low,
            Value::Active => Level::High,
        }
    }
}

/// The configuration for a simulated chip.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Bank {
    /// The number of lines simulated by this bank.
    pub num_lines: u32,

    /// The label of the chip.
    pub label: String,

    /// Lines that appear to be already in use by some other consumer.
    pub hogs: IntMap<Offset, String>,

    /// Lines that cannot be mapped to an interrupt.
    pub no_irq: IntSet<Offset>,

    /// Lines for which interrupt registration is refused.
    pub refused_irq: IntSet<Offset>,

    /// Lines that do not support debounce.
    pub no_debounce: IntSet<Offset>,
}

impl Bank {
    /// Basic constructor.
    pub fn new<N: Into<String>>(num_lines: u32, label: N) -> Bank {
        Bank {
            num_lines,
            label: label.into(),
            ..Default::default()
        }
    }

    /// Add a hog on a line on the chip.
    pub fn hog<N: Into<String>>(&mut self, offset: Offset, name: N) -> &mut Self {
        self.hogs.insert(offset, name.into());
        self
    }

    /// Unhog a line on the chip.
    pub fn unhog(&mut self, offset: Offset) -> &mut Self {
        self.hogs.remove(&offset);
        self
    }

    /// Remove the interrupt from a line.
    pub fn without_irq(&mut self, offset: Offset) -> &mut Self {
        self.no_irq.insert(offset);
        self
    }

    /// Refuse interrupt registrations for a line.
    pub fn refuse_irq(&mut self, offset: Offset) -> &mut Self {
        self.refused_irq.insert(offset);
        self
    }

    /// Remove debounce support from a line.
    pub fn without_debounce(&mut self, offset: Offset) -> &mut Self {
        self.no_debounce.insert(offset);
        self
    }
}

#[derive(Debug, Default)]
struct SimLine {
    consumer: Option<String>,
    handle: Option<LineHandle>,
    direction: Option<Direction>,
    pull: Level,
    value: Value,
    debounce: Option<Duration>,
    writes: usize,
    releases: usize,
}

impl SimLine {
    fn level(&self) -> Level {
        match self.direction {
            Some(Direction::Output) => self.value.into(),
            _ => self.pull,
        }
    }
}

struct Registration {
    offset: Offset,
    edge: EdgeDetection,
    handler: Handler,
}

/// A live simulated chip.
///
/// Each line has its own lock, and a handle identifies its line without a
/// shared lookup, so writing one line never waits on operations on others.
pub struct Sim {
    cfg: Bank,
    lines: Vec<spin::Mutex<SimLine>>,
    irqs: Mutex<IntMap<InterruptId, Registration>>,
    ticks: AtomicU32,
    next_id: AtomicU32,
}

impl Sim {
    /// Create a simulator from the bank configuration.
    pub fn new(bank: &Bank) -> Arc<Sim> {
        let lines = (0..bank.num_lines)
            .map(|offset| {
                spin::Mutex::new(SimLine {
                    consumer: bank.hogs.get(&offset).cloned(),
                    ..Default::default()
                })
            })
            .collect();
        Arc::new(Sim {
            cfg: bank.clone(),
            lines,
            irqs: Mutex::new(IntMap::default()),
            ticks: AtomicU32::new(0),
            next_id: AtomicU32::new(1),
        })
    }

    /// The configuration of the simulated chip.
    pub fn config(&self) -> &Bank {
        &self.cfg
    }

    fn line(&self, offset: Offset) -> Result<spin::MutexGuard<'_, SimLine>> {
        self.lines
            .get(offset as usize)
            .map(|line| line.lock())
            .ok_or(Error::InvalidLine(offset))
    }

    // the line a handle was issued for, if the handle is still current
    fn claimed(
        &self,
        handle: LineHandle,
    ) -> Result<(Offset, spin::MutexGuard<'_, SimLine>)> {
        let offset = handle
            .id()
            .checked_rem(self.cfg.num_lines)
            .ok_or(Error::InvalidHandle(handle.id()))?;
        let line = self.line(offset)?;
        if line.handle != Some(handle) {
            return Err(Error::InvalidHandle(handle.id()));
        }
        Ok((offset, line))
    }

    // encodes the offset so the line can be found from the handle alone
    fn new_handle(&self, offset: Offset) -> LineHandle {
        let n = self.cfg.num_lines;
        LineHandle::new((self.next_id() % (u32::MAX / n)) * n + offset)
    }

    fn irqs(&self) -> MutexGuard<'_, IntMap<InterruptId, Registration>> {
        self.irqs.lock().expect("failed to acquire lock on irqs")
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Pull a line to simulate the line being externally driven.
    ///
    /// If the line is an input and the level changes then the handlers
    /// bound to the corresponding edge are called before this returns.
    pub fn set_pull(&self, offset: Offset, pull: Level) -> Result<()> {
        let edge = {
            let mut line = self.line(offset)?;
            let prev = line.pull;
            line.pull = pull;
            match (line.direction, prev, pull) {
                (Some(Direction::Input), Level::Low, Level::High) => {
                    Some(EdgeDetection::RisingEdge)
                }
                (Some(Direction::Input), Level::High, Level::Low) => {
                    Some(EdgeDetection::FallingEdge)
                }
                _ => None,
            }
        };
        if let Some(edge) = edge {
            self.fire(offset, edge);
        }
        Ok(())
    }

    fn fire(&self, offset: Offset, edge: EdgeDetection) {
        // held across the calls so unbind waits for them to complete
        let irqs = self.irqs();
        for reg in irqs
            .values()
            .filter(|reg| reg.offset == offset && reg.edge == edge)
        {
            (reg.handler)();
        }
    }

    /// Pull a line up to simulate the line being externally driven high.
    pub fn pullup(&self, offset: Offset) -> Result<()> {
        self.set_pull(offset, Level::High)
    }

    /// Pull a line down to simulate the line being externally driven low.
    pub fn pulldown(&self, offset: Offset) -> Result<()> {
        self.set_pull(offset, Level::Low)
    }

    /// Toggle the pull on a line.
    pub fn toggle(&self, offset: Offset) -> Result<Level> {
        let value = match self.get_pull(offset)? {
            Level::High => Level::Low,
            Level::Low => Level::High,
        };
        self.set_pull(offset, value)?;
        Ok(value)
    }

    /// Pull a line down and then up, producing a single rising edge.
    pub fn pulse(&self, offset: Offset) -> Result<()> {
        self.pulldown(offset)?;
        self.pullup(offset)
    }

    /// Get the current state of the simulated external pull on a line.
    pub fn get_pull(&self, offset: Offset) -> Result<Level> {
        Ok(self.line(offset)?.pull)
    }

    /// Get the current physical level of a line.
    ///
    /// For outputs this is the driven value, otherwise the pull.
    pub fn get_level(&self, offset: Offset) -> Result<Level> {
        Ok(self.line(offset)?.level())
    }

    /// Set the simulated clock.
    pub fn set_ticks(&self, ticks: Tick) {
        self.ticks.store(ticks.as_millis(), Ordering::SeqCst);
    }

    /// Advance the simulated clock.
    pub fn advance(&self, period: Duration) {
        let now = Clock::ticks(self);
        self.set_ticks(now.wrapping_add(period));
    }

    /// Returns true if the line is claimed by any consumer.
    pub fn is_claimed(&self, offset: Offset) -> bool {
        self.consumer(offset).is_some()
    }

    /// The consumer of the line, if claimed.
    pub fn consumer(&self, offset: Offset) -> Option<String> {
        self.line(offset)
            .ok()
            .and_then(|line| line.consumer.clone())
    }

    /// The configured direction of the line, if claimed and configured.
    pub fn direction(&self, offset: Offset) -> Option<Direction> {
        self.line(offset).ok().and_then(|line| line.direction)
    }

    /// The debounce period applied to the line, if any.
    pub fn debounce(&self, offset: Offset) -> Option<Duration> {
        self.line(offset).ok().and_then(|line| line.debounce)
    }

    /// The number of values written to the line.
    pub fn writes(&self, offset: Offset) -> usize {
        self.line(offset).map(|line| line.writes).unwrap_or(0)
    }

    /// The number of times the line has been released.
    pub fn releases(&self, offset: Offset) -> usize {
        self.line(offset).map(|line| line.releases).unwrap_or(0)
    }

    /// The number of handlers bound to the line.
    pub fn bindings(&self, offset: Offset) -> usize {
        self.irqs()
            .values()
            .filter(|reg| reg.offset == offset)
            .count()
    }
}

impl fmt::Debug for Sim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sim")
            .field("label", &self.cfg.label)
            .field("num_lines", &self.cfg.num_lines)
            .finish()
    }
}

impl Gpio for Sim {
    fn is_valid(&self, offset: Offset) -> bool {
        offset < self.cfg.num_lines
    }

    fn claim(&self, offset: Offset, consumer: &str) -> Result<LineHandle> {
        let mut line = self.line(offset)?;
        if line.consumer.is_some() {
            return Err(Error::Busy(offset));
        }
        let handle = self.new_handle(offset);
        line.consumer = Some(consumer.into());
        line.handle = Some(handle);
        line.direction = None;
        Ok(handle)
    }

    fn as_input(&self, handle: LineHandle) -> Result<()> {
        let (_, mut line) = self.claimed(handle)?;
        line.direction = Some(Direction::Input);
        Ok(())
    }

    fn as_output(&self, handle: LineHandle, value: Value) -> Result<()> {
        let (_, mut line) = self.claimed(handle)?;
        line.direction = Some(Direction::Output);
        line.value = value;
        Ok(())
    }

    fn set_debounce(&self, handle: LineHandle, period: Duration) -> Result<()> {
        let (offset, mut line) = self.claimed(handle)?;
        if self.cfg.no_debounce.contains(&offset) {
            return Err(Error::DebounceUnsupported(offset));
        }
        line.debounce = Some(period);
        Ok(())
    }

    fn value(&self, handle: LineHandle) -> Result<Value> {
        let (_, line) = self.claimed(handle)?;
        Ok(line.level().into())
    }

    fn set_value(&self, handle: LineHandle, value: Value) -> Result<()> {
        let (offset, mut line) = self.claimed(handle)?;
        if line.direction != Some(Direction::Output) {
            return Err(Error::RequiresOutputMode(offset));
        }
        line.value = value;
        line.writes += 1;
        Ok(())
    }

    fn release(&self, handle: LineHandle) {
        let Ok((_, mut line)) = self.claimed(handle) else {
            warn!("release of unclaimed handle {}", handle);
            return;
        };
        line.consumer = None;
        line.handle = None;
        line.direction = None;
        line.debounce = None;
        line.releases += 1;
    }
}

impl EdgeIrq for Sim {
    fn bind(
        &self,
        handle: LineHandle,
        edge: EdgeDetection,
        handler: Handler,
    ) -> Result<InterruptId> {
        let offset = {
            let (offset, line) = self.claimed(handle)?;
            if line.direction != Some(Direction::Input) {
                return Err(Error::RequiresInputMode(offset));
            }
            offset
        };
        if self.cfg.no_irq.contains(&offset) {
            return Err(Error::NoInterrupt(offset));
        }
        if self.cfg.refused_irq.contains(&offset) {
            return Err(Error::InterruptRefused(
                offset,
                "resource temporarily unavailable".into(),
            ));
        }
        let id = InterruptId::new(self.next_id());
        self.irqs().insert(
            id,
            Registration {
                offset,
                edge,
                handler,
            },
        );
        debug!("sim bound GPIO {} to interrupt {}", offset, id);
        Ok(id)
    }

    fn unbind(&self, id: InterruptId) {
        if self.irqs().remove(&id).is_none() {
            warn!("unbind of unknown interrupt {}", id);
        }
    }
}

impl Clock for Sim {
    fn ticks(&self) -> Tick {
        Tick::from_millis(self.ticks.load(Ordering::SeqCst))
    }
}
