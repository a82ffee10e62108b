// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Runtime library of X-kernel.
//!
//! Boots a simulated machine into the process core:
//!
//! 1. the boot context sets the log level, runs phase-1 initialization and
//!    starts the init process;
//! 2. init runs every service hook once, in registration order;
//! 3. init creates `testcase_main`, hands the processor to it and, once it has
//!    terminated, joins it and halts the machine with its exit status.

#[macro_use]
extern crate log;

use std::sync::Arc;

use kprocess::{StartArg, StartFunc, join, spork, temp_switch_to};
use simcpu::{MIN_STACK, Machine, console, halt};

/// Priority `testcase_main` is created with.
pub const TESTCASE_PRIORITY: i32 = 3;

/// Name `testcase_main` is created with.
pub const TESTCASE_NAME: &str = "testcase_main";

/// A service hook, run by init before any user process exists.
pub type ServiceHook = fn();

/// What to run on the simulated machine.
pub struct BootConfig {
    testcase_main: StartFunc,
    arg: StartArg,
    services: Vec<(&'static str, ServiceHook)>,
    log_level: Option<String>,
}

impl BootConfig {
    /// Boots into `testcase_main`, with no services and an empty argument.
    pub fn new(testcase_main: StartFunc) -> Self {
        Self {
            testcase_main,
            arg: StartArg::none(),
            services: Vec::new(),
            log_level: None,
        }
    }

    /// Argument handed to `testcase_main`.
    pub fn arg(mut self, arg: StartArg) -> Self {
        self.arg = arg;
        self
    }

    /// Adds a service hook. Hooks run in the order they were added.
    pub fn service(mut self, name: &'static str, hook: ServiceHook) -> Self {
        self.services.push((name, hook));
        self
    }

    /// Log level to set at boot, by name (`"off"`, `"error"`, ... `"trace"`).
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Boot sequence of the machine. Runs on the boot context and never returns.
pub fn boot(config: BootConfig) -> ! {
    if let Some(level) = &config.log_level {
        klogger::set_log_level(level);
    }
    info!(
        "booting with {} service(s), log level {:?}",
        config.services.len(),
        log::max_level()
    );
    kprocess::init(init_main, StartArg::new(config));
    kprocess::start_processes()
}

/// Creates a machine, boots `config` on it and returns the halt status.
pub fn run(config: BootConfig) -> i32 {
    run_on(&Machine::new(), config)
}

/// Boots `config` on `machine` and returns the halt status.
///
/// Keep the machine to inspect its console afterwards.
pub fn run_on(machine: &Arc<Machine>, config: BootConfig) -> i32 {
    klogger::init_klogger();
    machine.run(move || boot(config))
}

fn init_main(arg: StartArg) -> i32 {
    let Some(config) = arg.get::<BootConfig>() else {
        console!("ERROR: init started without a boot configuration\n");
        halt(1);
    };

    for (name, hook) in &config.services {
        debug!("starting service {name}");
        hook();
    }

    let pid = match spork(
        Some(TESTCASE_NAME),
        Some(config.testcase_main),
        config.arg.clone(),
        MIN_STACK,
        TESTCASE_PRIORITY,
    ) {
        Ok(pid) => pid,
        Err(err) => {
            console!("ERROR: spork() of {TESTCASE_NAME} failed: {err} ({})\n", err.code());
            halt(1);
        }
    };

    console!(
        "Phase 1A TEMPORARY HACK: init() manually switching to testcase_main() after using spork() to create it.\n"
    );
    temp_switch_to(pid);

    let mut status = 0;
    if let Err(err) = join(Some(&mut status)) {
        console!("ERROR: init could not join {TESTCASE_NAME}: {err} ({})\n", err.code());
        halt(1);
    }
    console!("Phase 1A: testcase_main() returned, simulation will now halt.\n");
    halt(status)
}
