// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A driver that exposes a single GPIO output line as a byte oriented
//! device, and optionally toggles that line on each debounced rising edge
//! of a separate input line.
//!
//! The driver is built from three layers:
//!
//!  - the [`line`] module claims and drives individual lines,
//!  - the [`irq`] module binds a handler to edges on an input line,
//!  - the [`toggle`] module holds the shared output state that both the edge
//!    handler and the [`device`] surface mutate.
//!
//! The [`driver`] module ties these together, acquiring the lines and the
//! interrupt on [`start`] and releasing them, in reverse, on [`stop`].
//!
//! The hardware is reached through the [`Platform`] traits.
//! The [`sim`] module provides an in-process simulator, and, with the
//! `cdev` feature, the [`cdev`] module drives real lines through the Linux
//! GPIO character device.
//!
//! ```
//! # fn example() -> gpiotoggle::Result<()> {
//! use gpiotoggle::driver::{Config, Driver};
//! use gpiotoggle::sim::{self, Level};
//! use std::time::Duration;
//!
//! let s = sim::simpleton(64);
//! let driver = Driver::start(s.clone(), &Config::default())?;
//!
//! // a button press on the input line toggles the output line
//! s.pullup(48)?;
//! assert_eq!(s.get_level(60)?, Level::High);
//!
//! // and the output can be forced through the device
//! let dev = driver.device().open()?;
//! dev.write(b"0")?;
//! let mut buf = [0; 1];
//! dev.read(&mut buf)?;
//! assert_eq!(buf[0], 0);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! [`start`]: driver::Driver::start
//! [`stop`]: driver::Driver::stop

use line::Offset;

/// Types and traits for claiming and driving GPIO lines.
pub mod line;

/// Types and traits for binding handlers to edges on input lines.
pub mod irq;

/// Monotonic ticks and the debounce window.
pub mod debounce;

/// The shared output state and the edge handler that toggles it.
pub mod toggle;

/// The byte oriented device surface.
pub mod device;

/// Activation and teardown of the driver.
pub mod driver;

/// An in-process GPIO simulator.
pub mod sim;

/// A platform backed by the Linux GPIO character device.
#[cfg(feature = "cdev")]
pub mod cdev;

pub use debounce::Clock;
pub use irq::EdgeIrq;
pub use line::Gpio;

/// The complete set of services the driver requires from a platform.
pub trait Platform: Gpio + EdgeIrq + Clock + 'static {}

impl<T> Platform for T where T: Gpio + EdgeIrq + Clock + 'static {}

/// Errors returned by [`gpiotoggle`] functions.
///
/// [`gpiotoggle`]: crate
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The platform does not recognise the line.
    #[error("GPIO {0} is not valid")]
    InvalidLine(Offset),

    /// The line is already claimed.
    #[error("GPIO {0} is busy")]
    Busy(Offset),

    /// The handle does not refer to a claimed line.
    #[error("line handle {0} is not claimed")]
    InvalidHandle(u32),

    /// Edge detection requires the line to be an input.
    #[error("GPIO {0} must be in input mode")]
    RequiresInputMode(Offset),

    /// Setting a value requires the line to be an output.
    #[error("GPIO {0} must be in output mode")]
    RequiresOutputMode(Offset),

    /// The platform cannot map the line to an interrupt.
    #[error("GPIO {0} has no interrupt")]
    NoInterrupt(Offset),

    /// The platform refused to register the interrupt handler.
    #[error("cannot register interrupt for GPIO {0}: {1}")]
    InterruptRefused(Offset, String),

    /// The platform cannot debounce the line.
    #[error("GPIO {0} does not support debounce")]
    DebounceUnsupported(Offset),

    /// The first byte written to the device is not a known command.
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),

    /// The driver has been torn down.
    #[error("driver is not active")]
    NotActive,

    /// An error returned from an underlying gpiocdev call.
    #[cfg(feature = "cdev")]
    #[error("gpiocdev returned: {0}")]
    Cdev(#[source] gpiocdev::Error),
}

impl Error {
    /// Returns true for errors that are fatal to driver activation.
    pub fn is_setup(&self) -> bool {
        match self {
            Error::InvalidLine(_)
            | Error::Busy(_)
            | Error::RequiresInputMode(_)
            | Error::NoInterrupt(_)
            | Error::InterruptRefused(_, _) => true,
            #[cfg(feature = "cdev")]
            Error::Cdev(_) => true,
            _ => false,
        }
    }
}

#[cfg(feature = "cdev")]
impl From<gpiocdev::Error> for Error {
    fn from(err: gpiocdev::Error) -> Self {
        Self::Cdev(err)
    }
}

/// The result for [`gpiotoggle`] functions.
///
/// [`gpiotoggle`]: crate
pub type Result<T> = std::result::Result<T, Error>;
