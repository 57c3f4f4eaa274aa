// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::session;
use anyhow::{Context, Result};
use clap::Parser;
use daemonize::Daemonize;
use gpiotoggle::cdev::Cdev;
use gpiotoggle::driver::{Config, Driver};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// common helper functions

pub fn chip_path_from_id(id: &str) -> PathBuf {
    if id.chars().all(char::is_numeric) {
        // from number
        return format!("/dev/gpiochip{id}").into();
    }
    if !id.chars().any(|x| x == '/') {
        // from name
        let mut p: PathBuf = "/dev".into();
        p.push(id);
        return p;
    }
    // from raw path
    id.into()
}

pub fn open_chip(id: &str) -> Result<Arc<Cdev>> {
    let path = chip_path_from_id(id);
    Cdev::open(&path).with_context(|| format!("cannot open GPIO chip '{}'", path.display()))
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("'{0}' unknown units - use 's', 'ms' or 'us'.")]
    Units(String),
    #[error("'{0}' must start with a digit")]
    NoDigits(String),
    #[error("'{0}' {1}")]
    ParseDigits(String, std::num::ParseIntError),
    #[error("'{0}' is too large")]
    Overflow(String),
}

pub fn parse_duration(s: &str) -> std::result::Result<Duration, ParseDurationError> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let t = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(0) => return Err(ParseDurationError::NoDigits(s.into())),
        Some(n) => {
            let (num, units) = s.split_at(n);
            let t = num
                .parse::<u64>()
                .map_err(|e| ParseDurationError::ParseDigits(num.into(), e))?;
            let scale = match units {
                "us" => 1000,
                "ms" => 1000000,
                "s" => 1000000000,
                _ => return Err(ParseDurationError::Units(s.into())),
            };
            t.checked_mul(scale)
        }
        None => s
            .parse::<u64>()
            .map_err(|e| ParseDurationError::ParseDigits(s.into(), e))?
            .checked_mul(1000000),
    }
    .ok_or_else(|| ParseDurationError::Overflow(s.into()))?;
    Ok(Duration::from_nanos(t))
}

pub fn emit_error(verbose: bool, e: &anyhow::Error) {
    eprintln!("{}", format_error(verbose, e));
}

pub fn format_error(verbose: bool, e: &anyhow::Error) -> String {
    if verbose {
        format!("{e:#}")
    } else {
        format!("{e}")
    }
}

// common command line parser options

#[derive(Debug, Parser)]
/// Options to control the selection of the chip and the labelling of lines.
pub struct ChipOpts {
    /// The chip containing the lines
    ///
    /// The chip may be identified by number, name, or path.
    /// e.g. the following all select the same chip:
    ///     --chip 0
    ///     --chip gpiochip0
    ///     --chip /dev/gpiochip0
    #[arg(short, long, value_name = "chip", default_value = "0", verbatim_doc_comment)]
    pub chip: String,

    /// The prefix of the consumer labels applied to the requested lines.
    ///
    /// The output is labelled "<consumer>-out" and the input "<consumer>-in".
    #[arg(long, name = "consumer", default_value = "gpiotoggle")]
    pub consumer: String,
}

impl ChipOpts {
    // mutate the config to match the configuration
    pub fn apply(&self, config: &mut Config) {
        config.with_consumer(self.consumer.as_str());
    }
}

#[derive(Debug, Parser)]
/// Options to control how the driver runs once started.
pub struct RunOpts {
    /// Start the driver then wait for commands at an interactive prompt.
    ///
    /// Use the "help" command at the interactive prompt to get help for
    /// the supported commands.
    #[arg(short, long, group = "terminal")]
    pub interactive: bool,

    /// Detach from the controlling terminal before starting the driver.
    #[arg(short = 'z', long, group = "terminal")]
    pub daemonize: bool,
}

/// Start the driver on the chip and serve until exit.
///
/// Without --interactive this only returns on error, as the driver runs
/// until the process is killed.
pub fn serve(chip: &ChipOpts, run: &RunOpts, config: &Config) -> Result<()> {
    // before any threads are spawned, as they don't survive the fork
    if run.daemonize {
        Daemonize::new().start()?;
    }
    let cdev = open_chip(&chip.chip)?;
    let mut driver = Driver::start(cdev, config)
        .with_context(|| format!("unable to start driver on chip '{}'", chip.chip))?;
    if run.interactive {
        session::interact(&driver)?;
        driver.stop();
        return Ok(());
    }
    info!("serving GPIO {} until killed", config.output);
    loop {
        thread::park();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_path() {
        assert_eq!(chip_path_from_id("0"), PathBuf::from("/dev/gpiochip0"));
        assert_eq!(chip_path_from_id("gpiochip3"), PathBuf::from("/dev/gpiochip3"));
        assert_eq!(
            chip_path_from_id("/dev/gpiochip1"),
            PathBuf::from("/dev/gpiochip1")
        );
    }

    #[test]
    fn parse_duration() {
        use super::parse_duration;
        assert_eq!(
            parse_duration("0").expect("duration should be valid"),
            Duration::ZERO
        );
        assert_eq!(
            parse_duration("200").expect("duration should be valid"),
            Duration::from_millis(200)
        );
        assert_eq!(
            parse_duration("2s").expect("duration should be valid"),
            Duration::from_secs(2)
        );
        assert_eq!(
            parse_duration("20ms").expect("duration should be valid"),
            Duration::from_millis(20)
        );
        assert_eq!(
            parse_duration("500us").expect("duration should be valid"),
            Duration::from_micros(500)
        );
        assert_eq!(
            parse_duration("ms").unwrap_err(),
            ParseDurationError::NoDigits("ms".into())
        );
        assert_eq!(
            parse_duration("5min").unwrap_err(),
            ParseDurationError::Units("5min".into())
        );
        // parses as a u64, but not once scaled to nanoseconds
        assert_eq!(
            parse_duration("20000000000s").unwrap_err(),
            ParseDurationError::Overflow("20000000000s".into())
        );
        assert_eq!(
            parse_duration("20000000000000").unwrap_err(),
            ParseDurationError::Overflow("20000000000000".into())
        );
        assert_eq!(
            parse_duration("18446744073709551us").expect("duration should be valid"),
            Duration::from_micros(18446744073709551)
        );
    }

    #[test]
    fn format_error() {
        let e = anyhow::anyhow!("GPIO 60 is busy").context("unable to start driver");
        assert_eq!(super::format_error(false, &e), "unable to start driver");
        assert_eq!(
            super::format_error(true, &e),
            "unable to start driver: GPIO 60 is busy"
        );
    }
}
