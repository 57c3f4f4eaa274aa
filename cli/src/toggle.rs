// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{self, ChipOpts, RunOpts};
use anyhow::Result;
use clap::Parser;
use gpiotoggle::driver::Config;
use gpiotoggle::line::Offset;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(alias("t"))]
pub struct Opts {
    /// The offset of the output line to toggle.
    #[arg(name = "output", default_value_t = 60)]
    output: Offset,

    /// The offset of the input line whose rising edges toggle the output.
    #[arg(name = "input", default_value_t = 48)]
    input: Offset,

    /// The debounce period applied to the input line.
    ///
    /// Rising edges closer than this to the last accepted edge are discarded.
    /// The period is taken as milliseconds unless otherwise specified.
    #[arg(short = 'p', long, name = "period", default_value = "200ms", value_parser = common::parse_duration)]
    debounce_period: Duration,

    #[command(flatten)]
    chip_opts: ChipOpts,

    #[command(flatten)]
    run_opts: RunOpts,
}

impl Opts {
    fn config(&self) -> Config {
        let mut config = Config::default();
        config
            .with_output(self.output)
            .with_input(self.input)
            .with_debounce_period(self.debounce_period);
        self.chip_opts.apply(&mut config);
        config
    }
}

pub fn cmd(opts: &Opts) -> Result<()> {
    common::serve(&opts.chip_opts, &opts.run_opts, &opts.config())
}
