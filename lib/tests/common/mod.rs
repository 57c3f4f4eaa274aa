// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use gpiotoggle::debounce::Tick;
use gpiotoggle::driver::{Config, Driver};
use gpiotoggle::sim::{self, Sim};
use std::sync::Arc;

pub const OUTPUT: u32 = 60;
pub const INPUT: u32 = 48;

// enough lines to cover the default config
pub const NUM_LINES: u32 = 64;

pub fn started() -> (Arc<Sim>, Driver<Sim>) {
    let s = sim::simpleton(NUM_LINES);
    let d = Driver::start(s.clone(), &Config::default()).expect("driver should start");
    (s, d)
}

pub fn started_output_only() -> (Arc<Sim>, Driver<Sim>) {
    let s = sim::simpleton(NUM_LINES);
    let mut cfg = Config::default();
    cfg.without_input();
    let d = Driver::start(s.clone(), &cfg).expect("driver should start");
    (s, d)
}

// a single rising edge on the input at `ms` since boot
pub fn press_at(s: &Sim, ms: u32) {
    s.set_ticks(Tick::from_millis(ms));
    s.pulse(INPUT).expect("input should be valid");
}
