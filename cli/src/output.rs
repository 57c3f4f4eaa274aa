// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{self, ChipOpts, RunOpts};
use anyhow::Result;
use clap::Parser;
use gpiotoggle::driver::Config;
use gpiotoggle::line::Offset;

#[derive(Debug, Parser)]
#[command(alias("o"))]
pub struct Opts {
    /// The offset of the output line.
    #[arg(name = "output", default_value_t = 60)]
    output: Offset,

    #[command(flatten)]
    chip_opts: ChipOpts,

    #[command(flatten)]
    run_opts: RunOpts,
}

impl Opts {
    fn config(&self) -> Config {
        let mut config = Config::default();
        config.with_output(self.output).without_input();
        self.chip_opts.apply(&mut config);
        config
    }
}

pub fn cmd(opts: &Opts) -> Result<()> {
    common::serve(&opts.chip_opts, &opts.run_opts, &opts.config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config() {
        let opts = Opts::try_parse_from(["output", "5", "-c", "/dev/gpiochip2"])
            .expect("options should parse");
        assert_eq!(opts.chip_opts.chip, "/dev/gpiochip2");
        let config = opts.config();
        assert_eq!(config.output, 5);
        assert_eq!(config.input, None);
        assert_eq!(config.consumer, "gpiotoggle");
    }
}
