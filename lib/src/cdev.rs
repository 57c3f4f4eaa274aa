// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::debounce::{Clock, Tick};
use crate::irq::{EdgeDetection, EdgeIrq, Handler, InterruptId};
use crate::line::{Direction, Gpio, LineHandle, Offset, Value};
use crate::{Error, Result};
use gpiocdev::chip::Chip;
use gpiocdev::line::EdgeKind;
use gpiocdev::request::Request;
use log::{debug, error, warn};
use nohash_hasher::IntMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// How often a watcher checks if it has been asked to stop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Claimed {
    handle: LineHandle,
    direction: Option<Direction>,
    req: Arc<Request>,
}

struct Watcher {
    handle: LineHandle,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// A platform backed by a GPIO chip via the Linux GPIO character device.
///
/// Each claimed line is held in its own request, in a slot locked
/// independently of the other lines.
/// Handles encode their offset so a write only locks the slot of the line
/// written.
/// Edges are detected by a watcher thread per bound line, which calls the
/// handler directly.
pub struct Cdev {
    chip: PathBuf,
    num_lines: u32,
    epoch: Instant,
    next_id: AtomicU32,
    lines: Vec<spin::Mutex<Option<Claimed>>>,
    watchers: Mutex<IntMap<InterruptId, Watcher>>,
}

impl Cdev {
    /// Open the chip at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Cdev>> {
        let chip = Chip::from_path(path.as_ref())?;
        let info = chip.info()?;
        debug!(
            "opened {} ({}) with {} lines",
            info.name, info.label, info.num_lines
        );
        Ok(Arc::new(Cdev {
            chip: chip.path().to_path_buf(),
            num_lines: info.num_lines,
            epoch: Instant::now(),
            next_id: AtomicU32::new(1),
            lines: (0..info.num_lines)
                .map(|_| spin::Mutex::new(None))
                .collect(),
            watchers: Mutex::new(IntMap::default()),
        }))
    }

    /// The path of the chip.
    pub fn path(&self) -> &Path {
        &self.chip
    }

    /// The number of lines on the chip.
    pub fn num_lines(&self) -> u32 {
        self.num_lines
    }

    fn slot(
        &self,
        handle: LineHandle,
    ) -> Result<(Offset, spin::MutexGuard<'_, Option<Claimed>>)> {
        let offset = handle
            .id()
            .checked_rem(self.num_lines)
            .ok_or(Error::InvalidHandle(handle.id()))?;
        let slot = self
            .lines
            .get(offset as usize)
            .ok_or(Error::InvalidHandle(handle.id()))?
            .lock();
        Ok((offset, slot))
    }

    // the claim a handle was issued for, if the handle is still current
    fn with_claim<T, F>(&self, handle: LineHandle, f: F) -> Result<T>
    where
        F: FnOnce(Offset, &mut Claimed) -> Result<T>,
    {
        let (offset, mut slot) = self.slot(handle)?;
        match slot.as_mut() {
            Some(c) if c.handle == handle => f(offset, c),
            _ => Err(Error::InvalidHandle(handle.id())),
        }
    }

    fn new_handle(&self, offset: Offset) -> LineHandle {
        let n = self.num_lines;
        let serial = self.next_id.fetch_add(1, Ordering::Relaxed);
        LineHandle::new((serial % (u32::MAX / n)) * n + offset)
    }

    fn watchers(&self) -> MutexGuard<'_, IntMap<InterruptId, Watcher>> {
        self.watchers
            .lock()
            .expect("failed to acquire lock on watchers")
    }

    fn claimed(&self, handle: LineHandle) -> Result<(Offset, Arc<Request>)> {
        self.with_claim(handle, |offset, c| Ok((offset, c.req.clone())))
    }

    fn set_direction(&self, handle: LineHandle, direction: Direction) {
        _ = self.with_claim(handle, |_, c| {
            c.direction = Some(direction);
            Ok(())
        });
    }
}

impl fmt::Debug for Cdev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cdev")
            .field("chip", &self.chip)
            .field("num_lines", &self.num_lines)
            .finish()
    }
}

impl Drop for Cdev {
    fn drop(&mut self) {
        let watchers: Vec<InterruptId> = self.watchers().keys().copied().collect();
        for id in watchers {
            self.unbind(id);
        }
    }
}

impl From<Value> for gpiocdev::line::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Inactive => gpiocdev::line::Value::Inactive,
            Value::Active => gpiocdev::line::Value::Active,
        }
    }
}

impl From<gpiocdev::line::Value> for Value {
    fn from(v: gpiocdev::line::Value) -> Self {
        match v {
            gpiocdev::line::Value::Inactive => Value::Inactive,
            gpiocdev::line::Value::Active => Value::Active,
        }
    }
}

impl From<EdgeDetection> for gpiocdev::line::EdgeDetection {
    fn from(edge: EdgeDetection) -> Self {
        match edge {
            EdgeDetection::RisingEdge => gpiocdev::line::EdgeDetection::RisingEdge,
            EdgeDetection::FallingEdge => gpiocdev::line::EdgeDetection::FallingEdge,
        }
    }
}

impl Gpio for Cdev {
    fn is_valid(&self, offset: Offset) -> bool {
        offset < self.num_lines
    }

    fn claim(&self, offset: Offset, consumer: &str) -> Result<LineHandle> {
        if !self.is_valid(offset) {
            return Err(Error::InvalidLine(offset));
        }
        let chip = Chip::from_path(&self.chip)?;
        if chip.line_info(offset)?.used {
            return Err(Error::Busy(offset));
        }
        let req = Request::builder()
            .on_chip(&self.chip)
            .with_consumer(consumer)
            .with_line(offset)
            .as_is()
            .request()?;
        let handle = self.new_handle(offset);
        let (_, mut slot) = self.slot(handle)?;
        if slot.is_some() {
            return Err(Error::Busy(offset));
        }
        *slot = Some(Claimed {
            handle,
            direction: None,
            req: Arc::new(req),
        });
        Ok(handle)
    }

    fn as_input(&self, handle: LineHandle) -> Result<()> {
        let (offset, req) = self.claimed(handle)?;
        let mut cfg = req.config();
        cfg.with_line(offset).as_input();
        req.reconfigure(&cfg)?;
        self.set_direction(handle, Direction::Input);
        Ok(())
    }

    fn as_output(&self, handle: LineHandle, value: Value) -> Result<()> {
        let (offset, req) = self.claimed(handle)?;
        let mut cfg = req.config();
        cfg.with_line(offset).as_output(value.into());
        req.reconfigure(&cfg)?;
        self.set_direction(handle, Direction::Output);
        Ok(())
    }

    fn set_debounce(&self, handle: LineHandle, period: Duration) -> Result<()> {
        let (offset, req) = self.claimed(handle)?;
        let mut cfg = req.config();
        cfg.with_line(offset).with_debounce_period(period);
        req.reconfigure(&cfg).map_err(|e| {
            debug!("GPIO {} debounce: {}", offset, e);
            Error::DebounceUnsupported(offset)
        })
    }

    fn value(&self, handle: LineHandle) -> Result<Value> {
        let (offset, req) = self.claimed(handle)?;
        Ok(req.value(offset)?.into())
    }

    fn set_value(&self, handle: LineHandle, value: Value) -> Result<()> {
        let (offset, req) = self.with_claim(handle, |offset, c| {
            if c.direction != Some(Direction::Output) {
                return Err(Error::RequiresOutputMode(offset));
            }
            Ok((offset, c.req.clone()))
        })?;
        req.set_value(offset, value.into())?;
        Ok(())
    }

    fn release(&self, handle: LineHandle) {
        // the request is released when the last reference is dropped
        let claim = self.slot(handle).ok().and_then(|(_, mut slot)| {
            let current = matches!(slot.as_ref(), Some(c) if c.handle == handle);
            current.then(|| slot.take()).flatten()
        });
        if claim.is_none() {
            warn!("release of unclaimed handle {}", handle);
        }
    }
}

impl EdgeIrq for Cdev {
    fn bind(
        &self,
        handle: LineHandle,
        edge: EdgeDetection,
        handler: Handler,
    ) -> Result<InterruptId> {
        let (offset, req, direction) =
            self.with_claim(handle, |offset, c| Ok((offset, c.req.clone(), c.direction)))?;
        if direction != Some(Direction::Input) {
            return Err(Error::RequiresInputMode(offset));
        }
        let mut cfg = req.config();
        cfg.with_line(offset)
            .with_edge_detection(gpiocdev::line::EdgeDetection::from(edge));
        req.reconfigure(&cfg)
            .map_err(|e| Error::InterruptRefused(offset, e.to_string()))?;

        let id = InterruptId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name(format!("gpio{}-irq", offset))
                .spawn(move || watch(req, offset, edge, handler, stop))
                .map_err(|e| Error::InterruptRefused(offset, e.to_string()))?
        };
        self.watchers().insert(
            id,
            Watcher {
                handle,
                stop,
                thread,
            },
        );
        Ok(id)
    }

    fn unbind(&self, id: InterruptId) {
        let Some(w) = self.watchers().remove(&id) else {
            warn!("unbind of unknown interrupt {}", id);
            return;
        };
        w.stop.store(true, Ordering::SeqCst);
        if w.thread.join().is_err() {
            error!("interrupt {} watcher panicked", id);
        }
        if let Ok((offset, req)) = self.claimed(w.handle) {
            let mut cfg = req.config();
            cfg.with_line(offset).with_edge_detection(None);
            if let Err(e) = req.reconfigure(&cfg) {
                warn!("GPIO {} disable edge detection: {}", offset, e);
            }
        }
    }
}

impl Clock for Cdev {
    fn ticks(&self) -> Tick {
        // truncation provides the wrapping of the tick counter
        Tick::from_millis(self.epoch.elapsed().as_millis() as u32)
    }
}

fn watch(
    req: Arc<Request>,
    offset: Offset,
    edge: EdgeDetection,
    handler: Handler,
    stop: Arc<AtomicBool>,
) {
    let kind = match edge {
        EdgeDetection::RisingEdge => EdgeKind::Rising,
        EdgeDetection::FallingEdge => EdgeKind::Falling,
    };
    while !stop.load(Ordering::SeqCst) {
        match req.wait_edge_event(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => match req.read_edge_event() {
                Ok(evt) if evt.kind == kind => handler(),
                Ok(_) => {}
                Err(e) => {
                    error!("GPIO {} read edge event: {}", offset, e);
                    return;
                }
            },
            Err(e) => {
                error!("GPIO {} wait edge event: {}", offset, e);
                return;
            }
        }
    }
}
