// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! The simulated machine: one processor, its console and its halt latch.

use std::{
    any::Any,
    cell::RefCell,
    panic,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    context::{Baton, ContextHandle, HOST_STACK_RESERVE, Turn, spawn_context},
    psr::Psr,
};

/// Host stack of the boot context.
const BOOT_STACK: usize = 256 * 1024;

/// Unwind payload used to retire a context thread without running the panic hook.
pub(crate) struct Retired;

enum Outcome {
    Halted(i32),
    Panicked(Box<dyn Any + Send>),
}

/// The processor a host thread is currently acting as.
#[derive(Clone)]
pub(crate) struct Cpu {
    pub machine: Arc<Machine>,
    pub context_id: u64,
}

thread_local! {
    static CURRENT: RefCell<Option<Cpu>> = const { RefCell::new(None) };
}

pub(crate) fn set_current(cpu: Option<Cpu>) {
    // May own the last reference to a machine; dropped outside the borrow.
    let prev = CURRENT.with(|c| c.replace(cpu));
    drop(prev);
}

/// Returns the processor of the calling thread, if it is one.
pub(crate) fn try_current() -> Option<Cpu> {
    CURRENT
        .try_with(|c| c.try_borrow().ok().and_then(|cpu| cpu.clone()))
        .ok()
        .flatten()
}

pub(crate) fn with_current<R>(f: impl FnOnce(&Machine) -> R) -> R {
    f(&current_machine())
}

/// Returns the machine the calling context runs on.
///
/// # Panics
///
/// Panics when called from a thread that is not a context of any machine.
pub fn current_machine() -> Arc<Machine> {
    match try_current() {
        Some(cpu) => cpu.machine,
        None => panic!("not running on a simulated machine"),
    }
}

/// Returns this machine's instance of `T`, creating it with `init` on first use.
///
/// Every machine owns a separate instance, which makes `T` behave like
/// process-wide kernel state that is still isolated between machines.
/// `init` must not call `cpu_local` itself.
pub fn cpu_local<T: Any + Send + Sync>(init: impl FnOnce() -> T) -> Arc<T> {
    current_machine().local(init)
}

/// Stops the machine with exit `code`. Never returns.
///
/// Every context of the machine is retired and [`Machine::run`] returns
/// `code` to its host caller.
pub fn halt(code: i32) -> ! {
    let machine = current_machine();
    info!("machine halted with status {code}");
    machine.finish(Outcome::Halted(code));
    drop(machine);
    retire_current()
}

/// Unwinds the calling context thread to its top frame.
pub(crate) fn retire_current() -> ! {
    panic::resume_unwind(Box::new(Retired))
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A simulated uniprocessor.
pub struct Machine {
    pub(crate) psr: AtomicU32,
    console: spin::Mutex<String>,
    echo: AtomicBool,
    boot_time: Instant,
    started: AtomicBool,
    halted: AtomicBool,
    outcome: Mutex<Option<Outcome>>,
    finished: Condvar,
    batons: Mutex<Vec<Weak<Baton>>>,
    locals: Mutex<Vec<Arc<dyn Any + Send + Sync>>>,
    next_context_id: AtomicU64,
}

impl Machine {
    /// Creates a powered-off machine.
    pub fn new() -> Arc<Machine> {
        Arc::new(Machine {
            psr: AtomicU32::new(Psr::RESET.bits()),
            console: spin::Mutex::new(String::new()),
            echo: AtomicBool::new(false),
            boot_time: Instant::now(),
            started: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            outcome: Mutex::new(None),
            finished: Condvar::new(),
            batons: Mutex::new(Vec::new()),
            locals: Mutex::new(Vec::new()),
            next_context_id: AtomicU64::new(0),
        })
    }

    /// Powers the machine on and runs `boot` on its first context.
    ///
    /// The boot context starts in kernel mode with interrupts disabled.
    /// Returns the status passed to [`halt`], or 0 if `boot` returns. A panic
    /// on any context stops the machine and is resumed on the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the machine has already been run, or if the host refuses to
    /// create the boot thread.
    pub fn run<F>(self: &Arc<Self>, boot: F) -> i32
    where
        F: FnOnce() + Send + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            panic!("a machine can only be run once");
        }
        self.psr.store(Psr::RESET.bits(), Ordering::SeqCst);

        let handle = self.new_handle(Turn::Run);
        let machine = self.clone();
        let body = move || {
            boot();
            machine.finish(Outcome::Halted(0));
        };
        let host_stack = BOOT_STACK + HOST_STACK_RESERVE;
        if let Err(err) = spawn_context(self.clone(), handle, host_stack, body) {
            panic!("failed to spawn the boot context: {err}");
        }

        let mut outcome = lock(&self.outcome);
        while outcome.is_none() {
            outcome = self
                .finished
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match outcome.take() {
            Some(Outcome::Halted(code)) => code,
            Some(Outcome::Panicked(payload)) => {
                drop(outcome);
                panic::resume_unwind(payload)
            }
            None => unreachable!(),
        }
    }

    /// Returns everything written to the console so far.
    pub fn console_output(&self) -> String {
        self.console.lock().clone()
    }

    /// Mirrors console output to the host's stdout when `echo` is set.
    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::Relaxed);
    }

    /// Returns `true` once the machine has stopped.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Time since the machine was created.
    pub fn uptime(&self) -> Duration {
        self.boot_time.elapsed()
    }

    pub(crate) fn write_console(&self, args: core::fmt::Arguments) {
        use core::fmt::Write;

        let mut console = self.console.lock();
        let start = console.len();
        let _ = console.write_fmt(args);
        if self.echo.load(Ordering::Relaxed) {
            print!("{}", &console[start..]);
        }
    }

    /// Allocates a context id and its baton, registered for retirement on halt.
    pub(crate) fn new_handle(&self, turn: Turn) -> ContextHandle {
        let id = self.next_context_id.fetch_add(1, Ordering::Relaxed);
        let baton = Arc::new(Baton::new(turn));
        let mut batons = lock(&self.batons);
        batons.retain(|b| b.strong_count() > 0);
        batons.push(Arc::downgrade(&baton));
        drop(batons);
        if self.is_halted() {
            baton.retire();
        }
        ContextHandle::new(id, baton)
    }

    pub(crate) fn report_panic(&self, payload: Box<dyn Any + Send>) {
        self.finish(Outcome::Panicked(payload));
    }

    fn finish(&self, outcome: Outcome) {
        let mut slot = lock(&self.outcome);
        if !self.halted.swap(true, Ordering::SeqCst) {
            *slot = Some(outcome);
        }
        drop(slot);

        let batons = core::mem::take(&mut *lock(&self.batons));
        for baton in batons.iter().filter_map(Weak::upgrade) {
            baton.retire();
        }
        self.finished.notify_all();
    }

    fn local<T: Any + Send + Sync>(&self, init: impl FnOnce() -> T) -> Arc<T> {
        let mut locals = lock(&self.locals);
        for local in locals.iter() {
            if let Ok(value) = local.clone().downcast::<T>() {
                return value;
            }
        }
        let value = Arc::new(init());
        locals.push(value.clone());
        value
    }
}
