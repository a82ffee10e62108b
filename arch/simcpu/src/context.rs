// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Execution contexts and the processor handoff primitive.
//!
//! A context is a host thread plus a baton. The processor belongs to the one
//! context whose baton reads [`Turn::Run`]; every other context thread sleeps
//! on its own baton. [`switch`] is the only place that moves the processor:
//! it parks the outgoing baton *before* granting the incoming one, so a
//! context that is switched back to immediately can never be missed.
//!
//! Retiring a baton (on halt, or when its [`Context`] is dropped) wakes the
//! sleeping thread, which unwinds to its top frame and exits. Dropping a
//! [`Context`] waits for that unwinding to finish, so the frames of a retired
//! context never run alongside the context that holds the processor.

use core::fmt;
use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use crate::{
    MIN_STACK,
    machine::{Cpu, Machine, Retired, current_machine, retire_current, set_current, try_current},
};

/// Host frames are larger than the simulated program's; every context thread
/// gets this much stack on top of the size it asked for.
pub(crate) const HOST_STACK_RESERVE: usize = 256 * 1024;

/// Host stack backing a context that asked for `stack_size` bytes.
fn host_stack_size(stack_size: usize) -> Option<usize> {
    stack_size
        .checked_add(HOST_STACK_RESERVE)
        .filter(|&size| size <= isize::MAX as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Turn {
    Wait,
    Run,
    Retire,
}

pub(crate) struct Baton {
    turn: Mutex<Turn>,
    wake: Condvar,
}

impl Baton {
    pub fn new(turn: Turn) -> Self {
        Self {
            turn: Mutex::new(turn),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Turn> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, turn: Turn) {
        let mut cur = self.lock();
        if *cur != Turn::Retire {
            *cur = turn;
        }
        self.wake.notify_all();
    }

    fn grant(&self) {
        self.set(Turn::Run);
    }

    fn park(&self) {
        self.set(Turn::Wait);
    }

    pub fn retire(&self) {
        *self.lock() = Turn::Retire;
        self.wake.notify_all();
    }

    /// Sleeps until the processor is handed to this baton.
    fn wait_turn(&self) {
        let mut turn = self.lock();
        loop {
            match *turn {
                Turn::Run => return,
                Turn::Retire => {
                    drop(turn);
                    retire_current();
                }
                Turn::Wait => {
                    turn = self.wake.wait(turn).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

/// A non-owning reference to a context, used to switch to and from it.
#[derive(Clone)]
pub struct ContextHandle {
    id: u64,
    baton: Arc<Baton>,
}

impl ContextHandle {
    pub(crate) fn new(id: u64, baton: Arc<Baton>) -> Self {
        Self { id, baton }
    }

    /// Machine-unique id of the context.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextHandle").field(&self.id).finish()
    }
}

/// Errors returned by [`Context::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The requested stack is smaller than [`MIN_STACK`].
    StackTooSmall(usize),
    /// The requested stack cannot be backed by a host thread.
    StackTooLarge(usize),
    /// The host could not create the backing thread.
    Spawn(io::ErrorKind),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::StackTooSmall(size) => {
                write!(f, "stack of {size} bytes is below the minimum of {MIN_STACK}")
            }
            ContextError::StackTooLarge(size) => {
                write!(f, "stack of {size} bytes is too large for the host")
            }
            ContextError::Spawn(kind) => write!(f, "cannot create context thread: {kind}"),
        }
    }
}

/// An execution context with its own stack, owned by whoever created it.
///
/// The context starts executing `entry` the first time it is switched to.
/// Dropping it releases the stack: a context that was suspended is retired
/// and never resumes.
pub struct Context {
    handle: ContextHandle,
    stack_size: usize,
    thread: Option<JoinHandle<()>>,
}

impl Context {
    /// Creates a suspended context on the current machine.
    pub fn new(stack_size: usize, entry: fn() -> !) -> Result<Context, ContextError> {
        if stack_size < MIN_STACK {
            return Err(ContextError::StackTooSmall(stack_size));
        }
        let Some(host_stack) = host_stack_size(stack_size) else {
            return Err(ContextError::StackTooLarge(stack_size));
        };
        let machine = current_machine();
        let handle = machine.new_handle(Turn::Wait);
        let body = move || {
            entry();
        };
        let thread = spawn_context(machine, handle.clone(), host_stack, body)
            .map_err(|err| ContextError::Spawn(err.kind()))?;
        debug!("context {} created, stack {stack_size:#x}", handle.id);
        Ok(Context {
            handle,
            stack_size,
            thread: Some(thread),
        })
    }

    /// Returns a handle for switching to this context.
    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    /// Machine-unique id of the context.
    pub fn id(&self) -> u64 {
        self.handle.id
    }

    /// Stack size the context was created with.
    pub fn stack_size(&self) -> usize {
        self.stack_size
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        trace!("context {} released", self.handle.id);
        self.handle.baton.retire();
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The last machine reference may go away on this very context.
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            error!("context {} thread died outside its unwind guard", self.handle.id);
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.handle.id)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

/// Hands the processor from `old` to `new`.
///
/// `old` must be the context the caller is running on. The call returns when
/// some context later switches back to `old`. Switching to the running context
/// returns immediately.
pub fn switch(old: &ContextHandle, new: &ContextHandle) {
    if old.id == new.id {
        return;
    }
    trace!("context switch {} -> {}", old.id, new.id);
    old.baton.park();
    new.baton.grant();
    old.baton.wait_turn();
}

/// Hands the processor to `new` and abandons the calling context for good.
///
/// Used for the very first handoff, when there is no context to save.
pub fn launch(new: &ContextHandle) -> ! {
    trace!("context launch -> {}", new.id);
    new.baton.grant();
    retire_current()
}

/// Spawns the host thread backing a context, with `host_stack` bytes of stack.
///
/// The thread sleeps until its baton is granted, then runs `body`. It exits
/// when the body returns or when the context is retired. A panic in the body
/// stops the machine and is handed over to [`Machine::run`].
pub(crate) fn spawn_context<F>(
    machine: Arc<Machine>,
    handle: ContextHandle,
    host_stack: usize,
    body: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let name = match try_current() {
        Some(parent) => format!("ctx-{}<-{}", handle.id, parent.context_id),
        None => format!("ctx-{}", handle.id),
    };
    thread::Builder::new()
        .name(name)
        .stack_size(host_stack)
        .spawn(move || {
            set_current(Some(Cpu {
                machine: machine.clone(),
                context_id: handle.id,
            }));
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                handle.baton.wait_turn();
                body();
            }));
            if let Err(payload) = result {
                if !is_retired(&*payload) {
                    machine.report_panic(payload);
                }
            }
            set_current(None);
        })
}

fn is_retired(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Retired>()
}
