// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::device::Device;
use crate::irq::{Binding, EdgeDetection, Handler};
use crate::line::{Line, Offset, Value};
use crate::toggle::Toggler;
use crate::{Platform, Result};
use log::{debug, info, warn};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The configuration applied when the driver is started.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// The line driven by the driver.
    pub output: Offset,

    /// The line whose rising edges toggle the output.
    ///
    /// If `None` then the output is only controlled via the device.
    pub input: Option<Offset>,

    /// The debounce period for the input line.
    ///
    /// This is requested from the hardware, and is also the minimum gap
    /// between edges accepted by the driver.
    pub debounce_period: Duration,

    /// The prefix of the consumer labels applied to claimed lines.
    pub consumer: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: 60,
            input: Some(48),
            debounce_period: Duration::from_millis(200),
            consumer: "gpiotoggle".into(),
        }
    }
}

impl Config {
    /// Set the output line.
    pub fn with_output(&mut self, offset: Offset) -> &mut Self {
        self.output = offset;
        self
    }

    /// Set the input line.
    pub fn with_input(&mut self, offset: Offset) -> &mut Self {
        self.input = Some(offset);
        self
    }

    /// Remove the input line, leaving only the output under device control.
    pub fn without_input(&mut self) -> &mut Self {
        self.input = None;
        self
    }

    /// Set the debounce period for the input line.
    pub fn with_debounce_period(&mut self, period: Duration) -> &mut Self {
        self.debounce_period = period;
        self
    }

    /// Set the prefix of the consumer labels.
    pub fn with_consumer<N: Into<String>>(&mut self, consumer: N) -> &mut Self {
        self.consumer = consumer.into();
        self
    }

    fn output_consumer(&self) -> String {
        format!("{}-out", self.consumer)
    }

    fn input_consumer(&self) -> String {
        format!("{}-in", self.consumer)
    }
}

/// The lifecycle of a driver.
///
/// Transitions are strictly forward.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum State {
    /// Nothing acquired.
    Uninitialized,

    /// Lines claimed and configured, and the interrupt bound.
    Initialized,

    /// Serving the device and accepting edges.
    Active,

    /// Releasing resources.
    Teardown,

    /// Everything released.
    Terminated,
}

/// An activated driver.
///
/// Owns the claimed lines and the interrupt binding, and releases them in
/// reverse order of acquisition when [`stopped`] or dropped.
///
/// [`stopped`]: Driver::stop
pub struct Driver<P: Platform> {
    // fields are dropped in declaration order, which is the teardown order
    binding: Option<Binding<P>>,
    toggler: Arc<Toggler<P>>,
    input: Option<Line<P>>,
    output: Option<Line<P>>,
    device: Device<P>,
    state: State,
}

impl<P: Platform> Driver<P> {
    /// Acquire and configure the lines and bind the edge interrupt.
    ///
    /// If any step fails then everything acquired so far is released, in
    /// reverse order, before the error is returned.
    /// The debounce period is applied to the input line on a best effort
    /// basis - failure is logged but is not fatal.
    pub fn start(platform: Arc<P>, config: &Config) -> Result<Self> {
        let mut state = State::Uninitialized;

        let mut output = Line::claim(&platform, config.output, &config.output_consumer())?;
        output.as_output(Value::Inactive)?;

        let input = match config.input {
            Some(offset) => Some(Self::setup_input(&platform, offset, config)?),
            None => None,
        };

        let toggler = Arc::new(Toggler::new(
            platform.clone(),
            output.handle(),
            output.offset(),
            Value::Inactive,
            config.debounce_period,
        ));

        let binding = match &input {
            Some(line) => Some(Binding::bind(
                line,
                &platform,
                EdgeDetection::RisingEdge,
                edge_handler(&toggler),
            )?),
            None => None,
        };
        transition(&mut state, State::Initialized);

        let device = Device::new(toggler.clone());
        transition(&mut state, State::Active);
        info!("Device Driver Insert... Done");

        Ok(Driver {
            binding,
            toggler,
            input,
            output: Some(output),
            device,
            state,
        })
    }

    fn setup_input(platform: &Arc<P>, offset: Offset, config: &Config) -> Result<Line<P>> {
        let mut input = Line::claim(platform, offset, &config.input_consumer())?;
        input.as_input()?;
        if let Err(e) = input.set_debounce(config.debounce_period) {
            warn!("ERROR: set_debounce - {}: {}", offset, e);
        }
        Ok(input)
    }

    /// Tear the driver down.
    ///
    /// The interrupt is unbound first, so no edge is handled once this
    /// returns. Then the input and output lines are released.
    ///
    /// Subsequent calls have no effect.
    pub fn stop(&mut self) {
        if self.state >= State::Teardown {
            return;
        }
        transition(&mut self.state, State::Teardown);
        drop(self.binding.take());
        self.toggler.shutdown();
        drop(self.input.take());
        drop(self.output.take());
        transition(&mut self.state, State::Terminated);
        info!("Device Driver Exit");
    }

    /// The device node for the output line.
    pub fn device(&self) -> Device<P> {
        self.device.clone()
    }

    /// The toggle controller.
    pub fn controller(&self) -> Arc<Toggler<P>> {
        self.toggler.clone()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The offset of the input line, if any.
    pub fn input(&self) -> Option<Offset> {
        self.input.as_ref().map(Line::offset)
    }

    /// The offset of the output line, if not yet released.
    pub fn output(&self) -> Option<Offset> {
        self.output.as_ref().map(Line::offset)
    }
}

impl<P: Platform> fmt::Debug for Driver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("state", &self.state)
            .field("output", &self.output)
            .field("input", &self.input)
            .field("binding", &self.binding)
            .finish()
    }
}

impl<P: Platform> Drop for Driver<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn transition(state: &mut State, next: State) {
    debug!("driver state {:?} -> {:?}", state, next);
    *state = next;
}

// The handler holds a weak reference so the platform's handler table does
// not keep the controller alive.
fn edge_handler<P: Platform>(toggler: &Arc<Toggler<P>>) -> Handler {
    let toggler = Arc::downgrade(toggler);
    Box::new(move || {
        if let Some(t) = toggler.upgrade() {
            t.on_edge();
        }
    })
}
