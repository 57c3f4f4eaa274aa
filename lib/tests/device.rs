// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod common;

use common::{INPUT, OUTPUT};
use gpiotoggle::sim::Level;

#[test]
fn write_then_read() {
    let (s, d) = common::started_output_only();
    let f = d.device().open().unwrap();
    let mut buf = [0xff; 1];

    assert_eq!(f.write(b"1").unwrap(), 1);
    assert_eq!(s.get_level(OUTPUT).unwrap(), Level::High);
    assert_eq!(f.read(&mut buf).unwrap(), 1);
    assert_eq!(buf, [1]);

    assert_eq!(f.write(b"0").unwrap(), 1);
    assert_eq!(s.get_level(OUTPUT).unwrap(), Level::Low);
    assert_eq!(f.read(&mut buf).unwrap(), 1);
    assert_eq!(buf, [0]);

    // unknown command leaves the output as is
    assert_eq!(f.write(b"z").unwrap(), 1);
    assert_eq!(s.get_level(OUTPUT).unwrap(), Level::Low);
    assert_eq!(f.read(&mut buf).unwrap(), 1);
    assert_eq!(buf, [0]);
    assert_eq!(s.writes(OUTPUT), 2);
}

#[test]
fn read_follows_edges() {
    let (s, d) = common::started();
    let f = d.device().open().unwrap();
    let mut buf = [0; 1];

    f.read(&mut buf).unwrap();
    assert_eq!(buf, [0]);
    common::press_at(&s, 0);
    f.read(&mut buf).unwrap();
    assert_eq!(buf, [1]);
    common::press_at(&s, 500);
    f.read(&mut buf).unwrap();
    assert_eq!(buf, [0]);
}

#[test]
fn read_is_raw() {
    let (_s, d) = common::started_output_only();
    let f = d.device().open().unwrap();
    let mut buf = [b'x'; 3];

    f.write(b"1").unwrap();
    assert_eq!(f.read(&mut buf).unwrap(), 1);
    assert_eq!(&buf, &[1, b'x', b'x']);
}

#[test]
fn write_line() {
    let (s, d) = common::started_output_only();
    let f = d.device().open().unwrap();

    // as written by echo
    assert_eq!(f.write(b"1\n").unwrap(), 2);
    assert_eq!(s.get_level(OUTPUT).unwrap(), Level::High);
    assert_eq!(f.write(b"0\n").unwrap(), 2);
    assert_eq!(s.get_level(OUTPUT).unwrap(), Level::Low);
}

#[test]
fn sessions() {
    let (s, d) = common::started();
    let dev = d.device();
    let f1 = dev.open().unwrap();
    let f2 = d.device().open().unwrap();
    assert_eq!(dev.sessions(), 2);

    f1.write(b"1").unwrap();
    let mut buf = [0; 1];
    f2.read(&mut buf).unwrap();
    assert_eq!(buf, [1]);

    common::press_at(&s, 0);
    f1.read(&mut buf).unwrap();
    assert_eq!(buf, [0]);

    f1.close();
    f2.close();
    assert_eq!(dev.sessions(), 0);
    assert!(s.is_claimed(INPUT));
}

#[test]
fn concurrent_writes_and_edges() {
    let (s, d) = common::started();
    let dev = d.device();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let dev = dev.clone();
            scope.spawn(move || {
                let f = dev.open().unwrap();
                for i in 0..100 {
                    let cmd = if i % 2 == 0 { b"1" } else { b"0" };
                    assert_eq!(f.write(cmd).unwrap(), 1);
                }
            });
        }
        for ms in 0..100 {
            common::press_at(&s, ms * 250);
        }
    });
    assert_eq!(dev.sessions(), 0);

    // the cache and the line agree once everything has settled
    let level = d.controller().cached_level();
    assert_eq!(Level::from(level), s.get_level(OUTPUT).unwrap());
}
