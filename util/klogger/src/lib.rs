// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! `log` backend for the simulated kernel.
//!
//! A record from a context of a simulated machine is printed as
//! `[secs.micros cpu:ctx target:line] message`, with the machine's uptime. A
//! record from any other host thread is printed as
//! `[secs.micros host target:line] message`. Output goes through
//! [`LoggerAdapter`] and never reaches the machine console.

#![no_std]

use core::{
    fmt::{self, Write},
    str::FromStr,
    time::Duration,
};

use crate_interface::call_interface;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// The machine context a record was emitted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    /// Simulated processor.
    pub cpu: usize,
    /// Context running on it.
    pub context: u64,
}

/// Hooks the logger needs from the machine layer.
#[crate_interface::def_interface]
pub trait LoggerAdapter {
    /// Writes a formatted piece of a record.
    fn write_str(s: &str);
    /// Time stamp of a record.
    fn now() -> Duration;
    /// The machine context of the caller, `None` on a plain host thread.
    fn origin() -> Option<Origin>;
}

const GREY: u8 = 37;

fn level_color(level: Level) -> u8 {
    match level {
        Level::Error => 31,
        Level::Warn => 33,
        Level::Info => 32,
        Level::Debug => 36,
        Level::Trace => 90,
    }
}

struct Colored<T>(u8, T);

impl<T: fmt::Display> fmt::Display for Colored<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\u{1B}[{}m{}\u{1B}[m", self.0, self.1)
    }
}

struct Stamp(Duration, Option<Origin>);

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3}.{:06} ", self.0.as_secs(), self.0.subsec_micros())?;
        match self.1 {
            Some(origin) => write!(f, "{}:{}", origin.cpu, origin.context),
            None => f.write_str("host"),
        }
    }
}

struct Sink;

impl Write for Sink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        call_interface!(LoggerAdapter::write_str, s);
        Ok(())
    }
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let stamp = Stamp(
            call_interface!(LoggerAdapter::now),
            call_interface!(LoggerAdapter::origin),
        );
        print_record(format_args!(
            "{} {}\n",
            Colored(
                GREY,
                format_args!("[{stamp} {}:{}]", record.target(), record.line().unwrap_or(0))
            ),
            Colored(level_color(record.level()), record.args())
        ));
    }

    fn flush(&self) {}
}

/// Writes one record so that records of different contexts never interleave.
fn print_record(args: fmt::Arguments) {
    static LOCK: spin::Mutex<()> = spin::Mutex::new(());

    let _guard = LOCK.lock();
    // The sink itself never fails.
    let _ = Sink.write_fmt(args);
}

/// Installs the logger with level `Warn`.
///
/// Later calls keep the installed logger and its level.
pub fn init_klogger() {
    if log::set_logger(&KernelLogger).is_ok() {
        log::set_max_level(LevelFilter::Warn);
    }
}

/// Sets the maximum level from its name; unknown names turn logging off.
pub fn set_log_level(level: &str) {
    log::set_max_level(LevelFilter::from_str(level).unwrap_or(LevelFilter::Off));
}
