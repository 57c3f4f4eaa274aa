// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::Value;
use crate::toggle::Toggler;
use crate::{Error, Platform, Result};
use log::{error, info};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A command written to the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    /// Drive the output inactive - ASCII '0'.
    Low,

    /// Drive the output active - ASCII '1'.
    High,
}

impl Command {
    /// Decode the command byte.
    pub fn parse(byte: u8) -> Result<Command> {
        match byte {
            b'0' => Ok(Command::Low),
            b'1' => Ok(Command::High),
            _ => Err(Error::UnknownCommand(byte)),
        }
    }

    /// The level the command drives the output to.
    pub fn value(&self) -> Value {
        match self {
            Command::Low => Value::Inactive,
            Command::High => Value::Active,
        }
    }
}

/// The byte oriented device node for the output line.
///
/// Any number of [`Session`]s may be open at once.
pub struct Device<P: Platform + ?Sized> {
    toggler: Arc<Toggler<P>>,
    sessions: Arc<AtomicUsize>,
}

impl<P: Platform + ?Sized> Device<P> {
    pub(crate) fn new(toggler: Arc<Toggler<P>>) -> Self {
        Device {
            toggler,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open a session on the device.
    ///
    /// Fails once the driver has been torn down.
    pub fn open(&self) -> Result<Session<P>> {
        if !self.toggler.is_live() {
            return Err(Error::NotActive);
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        info!("Device File Opened");
        Ok(Session {
            toggler: self.toggler.clone(),
            sessions: self.sessions.clone(),
        })
    }

    /// The number of currently open sessions.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl<P: Platform + ?Sized> Clone for Device<P> {
    fn clone(&self) -> Self {
        Device {
            toggler: self.toggler.clone(),
            sessions: self.sessions.clone(),
        }
    }
}

impl<P: Platform + ?Sized> fmt::Debug for Device<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("offset", &self.toggler.offset())
            .field("sessions", &self.sessions())
            .finish()
    }
}

/// An open session on the [`Device`].
///
/// The session is closed when dropped.
pub struct Session<P: Platform + ?Sized> {
    toggler: Arc<Toggler<P>>,
    sessions: Arc<AtomicUsize>,
}

impl<P: Platform + ?Sized> Session<P> {
    /// Read the current level of the output line into `buf`.
    ///
    /// The level is written as a raw 0 or 1, not ASCII.
    ///
    /// Always reports one byte read. If `buf` is too small to hold it the
    /// failure is logged and the read otherwise proceeds.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let level = u8::from(self.toggler.level()?);
        match buf.first_mut() {
            Some(b) => *b = level,
            None => error!("ERROR: Not all bytes have been copied to user"),
        }
        info!("Read function: GPIO {} = {}", self.toggler.offset(), level);
        Ok(1)
    }

    /// Apply the command in the first byte of `buf`.
    ///
    /// An ASCII '1' forces the output active, and an ASCII '0' forces it
    /// inactive. Anything else is logged and otherwise ignored.
    ///
    /// Reports the whole of `buf` as written, whether the command is
    /// recognised or not.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let Some(&byte) = buf.first() else {
            error!("ERROR: Not all the bytes have been copied from user");
            return Ok(0);
        };
        info!(
            "Write Function: GPIO {} Set = {}",
            self.toggler.offset(),
            byte.escape_ascii()
        );
        match Command::parse(byte) {
            Ok(cmd) => self.toggler.force(cmd.value())?,
            Err(e) => error!("{}: Please set 1 or 0", e),
        }
        Ok(buf.len())
    }

    /// Close the session.
    pub fn close(self) {}
}

impl<P: Platform + ?Sized> fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("offset", &self.toggler.offset())
            .finish()
    }
}

impl<P: Platform + ?Sized> Drop for Session<P> {
    fn drop(&mut self) {
        self.sessions.fetch_sub(1, Ordering::SeqCst);
        info!("Device File Closed");
    }
}
