// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{Error, Result};
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An identifier for a line on the platform.
pub type Offset = u32;

/// The logical level of a line.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Value {
    /// The line is inactive.
    #[default]
    Inactive,
    /// The line is active.
    Active,
}

impl Value {
    pub fn not(&self) -> Value {
        match self {
            Value::Active => Value::Inactive,
            Value::Inactive => Value::Active,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Value::Active => "active",
            Value::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

impl From<Value> for bool {
    fn from(l: Value) -> bool {
        match l {
            Value::Inactive => false,
            Value::Active => true,
        }
    }
}

impl From<Value> for u8 {
    fn from(l: Value) -> u8 {
        match l {
            Value::Inactive => 0,
            Value::Active => 1,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        match b {
            false => Value::Inactive,
            true => Value::Active,
        }
    }
}

/// The direction of a line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// The line is an input.
    Input,

    /// The line is an output.
    Output,
}

/// A reference to a line claimed from a [`Gpio`].
///
/// Handles are issued by [`Gpio::claim`] and remain valid until passed to
/// [`Gpio::release`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LineHandle(u32);

impl LineHandle {
    /// Wrap a platform specific handle identifier.
    pub const fn new(id: u32) -> Self {
        LineHandle(id)
    }

    /// The platform specific handle identifier.
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl nohash_hasher::IsEnabled for LineHandle {}

impl fmt::Display for LineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The line services a platform provides to the driver.
///
/// A line must pass [`is_valid`] before it is claimed, and must be claimed
/// before any other operation is applied to it.
///
/// [`set_value`] may be called from an edge handler, so must not block,
/// nor wait on locks held while other lines are claimed or configured.
///
/// [`is_valid`]: Gpio::is_valid
/// [`set_value`]: Gpio::set_value
pub trait Gpio: Send + Sync {
    /// Returns true if the platform recognises the line as usable.
    fn is_valid(&self, offset: Offset) -> bool;

    /// Reserve exclusive use of the line.
    ///
    /// Fails if the line is invalid or is already claimed.
    fn claim(&self, offset: Offset, consumer: &str) -> Result<LineHandle>;

    /// Configure the line as an input.
    fn as_input(&self, handle: LineHandle) -> Result<()>;

    /// Configure the line as an output driven to `value`.
    fn as_output(&self, handle: LineHandle, value: Value) -> Result<()>;

    /// Request hardware debouncing of an input line.
    ///
    /// This is best effort - callers treat failure as non-fatal.
    fn set_debounce(&self, handle: LineHandle, period: Duration) -> Result<()>;

    /// The instantaneous logical level of the line.
    fn value(&self, handle: LineHandle) -> Result<Value>;

    /// Set the logical level of an output line.
    fn set_value(&self, handle: LineHandle, value: Value) -> Result<()>;

    /// Return the line to the platform.
    ///
    /// Releasing an unknown handle has no effect.
    fn release(&self, handle: LineHandle);
}

/// A claimed line.
///
/// The line is released when the [`Line`] is dropped, so each successful
/// claim is paired with exactly one release.
pub struct Line<G: Gpio + ?Sized> {
    gpio: Arc<G>,
    handle: LineHandle,
    offset: Offset,
    direction: Option<Direction>,
}

impl<G: Gpio + ?Sized> Line<G> {
    /// Validate and claim a line.
    pub fn claim(gpio: &Arc<G>, offset: Offset, consumer: &str) -> Result<Self> {
        if !gpio.is_valid(offset) {
            return Err(Error::InvalidLine(offset));
        }
        let handle = gpio.claim(offset, consumer)?;
        debug!("GPIO {} claimed as '{}' (handle {})", offset, consumer, handle);
        Ok(Line {
            gpio: gpio.clone(),
            handle,
            offset,
            direction: None,
        })
    }

    /// Configure the line as an input.
    pub fn as_input(&mut self) -> Result<()> {
        self.gpio.as_input(self.handle)?;
        self.direction = Some(Direction::Input);
        debug!("GPIO {} is an input", self.offset);
        Ok(())
    }

    /// Configure the line as an output driven to `value`.
    pub fn as_output(&mut self, value: Value) -> Result<()> {
        self.gpio.as_output(self.handle, value)?;
        self.direction = Some(Direction::Output);
        debug!("GPIO {} is an output, initially {}", self.offset, value);
        Ok(())
    }

    /// Request hardware debouncing of the line.
    pub fn set_debounce(&self, period: Duration) -> Result<()> {
        self.gpio.set_debounce(self.handle, period)
    }

    /// The instantaneous logical level of the line.
    pub fn value(&self) -> Result<Value> {
        self.gpio.value(self.handle)
    }

    /// Set the logical level of the line.
    pub fn set_value(&self, value: Value) -> Result<()> {
        self.gpio.set_value(self.handle, value)
    }

    /// The handle issued by the platform for this line.
    pub fn handle(&self) -> LineHandle {
        self.handle
    }

    /// The offset of the line.
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// The direction the line has been configured to, if any.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }
}

impl<G: Gpio + ?Sized> fmt::Debug for Line<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("offset", &self.offset)
            .field("handle", &self.handle)
            .field("direction", &self.direction)
            .finish()
    }
}

impl<G: Gpio + ?Sized> Drop for Line<G> {
    fn drop(&mut self) {
        self.gpio.release(self.handle);
        debug!("GPIO {} released", self.offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, Bank, Level, Sim};

    #[test]
    fn value_not() {
        assert_eq!(Value::Active.not(), Value::Inactive);
        assert_eq!(Value::Inactive.not(), Value::Active);
    }

    #[test]
    fn value_conversions() {
        assert_eq!(u8::from(Value::Active), 1);
        assert_eq!(u8::from(Value::Inactive), 0);
        assert!(bool::from(Value::Active));
        assert_eq!(Value::from(false), Value::Inactive);
        assert_eq!(Value::default(), Value::Inactive);
        assert_eq!(Value::Active.to_string(), "active");
    }

    #[test]
    fn claim_invalid() {
        let s = sim::simpleton(8);
        assert_eq!(
            Line::claim(&s, 8, "test").unwrap_err(),
            Error::InvalidLine(8)
        );
        assert!(!s.is_claimed(8));
    }

    #[test]
    fn claim_busy() {
        let s = Sim::new(Bank::new(8, "busy").hog(3, "other"));
        assert_eq!(Line::claim(&s, 3, "test").unwrap_err(), Error::Busy(3));
        assert_eq!(s.consumer(3).as_deref(), Some("other"));
    }

    #[test]
    fn claim_twice() {
        let s = sim::simpleton(8);
        let _l = Line::claim(&s, 2, "first").unwrap();
        assert_eq!(Line::claim(&s, 2, "second").unwrap_err(), Error::Busy(2));
        assert_eq!(s.consumer(2).as_deref(), Some("first"));
    }

    #[test]
    fn release_on_drop() {
        let s = sim::simpleton(8);
        let l = Line::claim(&s, 5, "test").unwrap();
        assert!(s.is_claimed(5));
        assert_eq!(l.offset(), 5);
        assert_eq!(l.direction(), None);
        drop(l);
        assert!(!s.is_claimed(5));
        assert_eq!(s.releases(5), 1);

        // and can be reclaimed
        let _l = Line::claim(&s, 5, "again").unwrap();
        assert!(s.is_claimed(5));
    }

    #[test]
    fn output() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 4, "test").unwrap();
        l.as_output(Value::Active).unwrap();
        assert_eq!(l.direction(), Some(Direction::Output));
        assert_eq!(s.get_level(4).unwrap(), Level::High);
        l.set_value(Value::Inactive).unwrap();
        assert_eq!(s.get_level(4).unwrap(), Level::Low);
        assert_eq!(l.value().unwrap(), Value::Inactive);
    }

    #[test]
    fn input() {
        let s = sim::simpleton(8);
        let mut l = Line::claim(&s, 1, "test").unwrap();
        l.as_input().unwrap();
        assert_eq!(l.direction(), Some(Direction::Input));
        assert_eq!(l.value().unwrap(), Value::Inactive);
        s.pullup(1).unwrap();
        assert_eq!(l.value().unwrap(), Value::Active);
        assert_eq!(
            l.set_value(Value::Active).unwrap_err(),
            Error::RequiresOutputMode(1)
        );
    }

    #[test]
    fn debounce() {
        let s = Sim::new(Bank::new(8, "debounce").without_debounce(2));
        let mut l = Line::claim(&s, 1, "test").unwrap();
        l.as_input().unwrap();
        l.set_debounce(Duration::from_millis(200)).unwrap();
        assert_eq!(s.debounce(1), Some(Duration::from_millis(200)));

        let mut l = Line::claim(&s, 2, "test").unwrap();
        l.as_input().unwrap();
        assert_eq!(
            l.set_debounce(Duration::from_millis(200)).unwrap_err(),
            Error::DebounceUnsupported(2)
        );
        assert_eq!(s.debounce(2), None);
    }
}
