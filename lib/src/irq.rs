// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::{Direction, Gpio, Line, LineHandle, Offset};
use crate::{Error, Result};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// The edges that trigger an interrupt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeDetection {
    /// Triggered by the line transitioning from inactive to active.
    RisingEdge,

    /// Triggered by the line transitioning from active to inactive.
    FallingEdge,
}

/// The identifier of a registered interrupt handler.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InterruptId(u32);

impl InterruptId {
    pub const fn new(id: u32) -> Self {
        InterruptId(id)
    }

    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl nohash_hasher::IsEnabled for InterruptId {}

impl fmt::Display for InterruptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A handler called once for each qualifying edge.
///
/// Handlers run asynchronously to the rest of the driver and must not block.
pub type Handler = Box<dyn Fn() + Send + Sync>;

/// The interrupt services a platform provides to the driver.
pub trait EdgeIrq: Send + Sync {
    /// Register `handler` to be called on `edge` transitions of the line.
    ///
    /// Fails if the line cannot be mapped to an interrupt or if the
    /// registration is refused.
    fn bind(
        &self,
        handle: LineHandle,
        edge: EdgeDetection,
        handler: Handler,
    ) -> Result<InterruptId>;

    /// Deregister a handler.
    ///
    /// Once this returns the handler will not be called again, and any call
    /// in progress has completed.
    fn unbind(&self, id: InterruptId);
}

/// A registered edge handler.
///
/// The handler is deregistered when the [`Binding`] is dropped, which must
/// happen before the input [`Line`] is released.
pub struct Binding<P: EdgeIrq + ?Sized> {
    irq: Arc<P>,
    id: InterruptId,
    offset: Offset,
}

impl<P: Gpio + EdgeIrq + ?Sized> Binding<P> {
    /// Register `handler` for edges on an input line.
    pub fn bind(
        line: &Line<P>,
        irq: &Arc<P>,
        edge: EdgeDetection,
        handler: Handler,
    ) -> Result<Self> {
        if line.direction() != Some(Direction::Input) {
            return Err(Error::RequiresInputMode(line.offset()));
        }
        let id = irq.bind(line.handle(), edge, handler)?;
        debug!("GPIO {} interrupt number = {}", line.offset(), id);
        Ok(Binding {
            irq: irq.clone(),
            id,
            offset: line.offset(),
        })
    }
}

impl<P: EdgeIrq + ?Sized> Binding<P> {
    /// The identifier issued by the platform for this binding.
    pub fn id(&self) -> InterruptId {
        self.id
    }

    /// The offset of the bound input line.
    pub fn offset(&self) -> Offset {
        self.offset
    }
}

impl<P: EdgeIrq + ?Sized> fmt::Debug for Binding<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<P: EdgeIrq + ?Sized> Drop for Binding<P> {
    fn drop(&mut self) {
        self.irq.unbind(self.id);
        debug!("GPIO {} interrupt {} freed", self.offset, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Value;
    use crate::sim::{self, Bank, Sim};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (
            count,
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn rising_edges() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 3, "test").unwrap();
        l.as_input().unwrap();
        let (count, handler) = counter();
        let b = Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap();
        assert_eq!(b.offset(), 3);
        assert_eq!(s.bindings(3), 1);

        s.pullup(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // falling edge ignored
        s.pulldown(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        // no edge if level unchanged
        s.pulldown(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        s.pulse(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn falling_edges() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 3, "test").unwrap();
        l.as_input().unwrap();
        let (count, handler) = counter();
        let _b = Binding::bind(&l, &s, EdgeDetection::FallingEdge, handler).unwrap();

        s.pullup(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        s.pulldown(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unbind_on_drop() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 3, "test").unwrap();
        l.as_input().unwrap();
        let (count, handler) = counter();
        let b = Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap();
        s.pulse(3).unwrap();
        drop(b);
        assert_eq!(s.bindings(3), 0);
        s.pulse(3).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn requires_input() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 3, "test").unwrap();
        let (_, handler) = counter();
        assert_eq!(
            Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap_err(),
            Error::RequiresInputMode(3)
        );
        l.as_output(Value::Inactive).unwrap();
        let (_, handler) = counter();
        assert_eq!(
            Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap_err(),
            Error::RequiresInputMode(3)
        );
    }

    #[test]
    fn no_interrupt() {
        let s = Sim::new(Bank::new(8, "no irq").without_irq(3));
        let mut l = Line::claim(&s, 3, "test").unwrap();
        l.as_input().unwrap();
        let (_, handler) = counter();
        assert_eq!(
            Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap_err(),
            Error::NoInterrupt(3)
        );
    }

    #[test]
    fn refused() {
        let s = Sim::new(Bank::new(8, "refused").refuse_irq(3));
        let mut l = Line::claim(&s, 3, "test").unwrap();
        l.as_input().unwrap();
        let (_, handler) = counter();
        assert!(matches!(
            Binding::bind(&l, &s, EdgeDetection::RisingEdge, handler).unwrap_err(),
            Error::InterruptRefused(3, _)
        ));
        assert_eq!(s.bindings(3), 0);
    }
}
