// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A command line tool that toggles a GPIO output line on the rising edges
//! of an input line.

use clap::Parser;
use log::LevelFilter;
use std::process::ExitCode;

mod common;
mod output;
mod session;
mod toggle;

fn main() -> ExitCode {
    match Opts::try_parse() {
        Ok(opt) => {
            init_logging(opt.verbose);
            let res = match opt.cmd {
                Command::Toggle(cfg) => toggle::cmd(&cfg),
                Command::Output(cfg) => output::cmd(&cfg),
            };
            return match res {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    common::emit_error(opt.verbose, &e);
                    ExitCode::FAILURE
                }
            };
        }
        Err(e) => eprintln!("{e}"),
    }
    ExitCode::FAILURE
}

// RUST_LOG, if set, overrides the level selected by the verbose flag.
fn init_logging(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();
}

#[derive(Parser)]
#[command(
    name = "gpiotoggle",
    about = "A utility to toggle a GPIO output line from the edges of an input line.",
    version,
    propagate_version = true
)]
struct Opts {
    /// Provide more detailed log and error messages.
    #[arg(short = 'v', long, global = true, display_order = 800)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
enum Command {
    /// Toggle an output line on each debounced rising edge of an input line.
    Toggle(toggle::Opts),

    /// Drive an output line, controlled only by the interactive session.
    Output(output::Opts),
}
