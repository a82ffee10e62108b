// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::*;

#[derive(Default)]
struct Board {
    contexts: Mutex<Vec<Context>>,
    trail: Mutex<Vec<&'static str>>,
}

fn board() -> Arc<Board> {
    cpu_local(Board::default)
}

impl Board {
    fn handle(&self, idx: usize) -> ContextHandle {
        self.contexts.lock().unwrap()[idx].handle()
    }

    fn push(&self, mark: &'static str) {
        self.trail.lock().unwrap().push(mark);
    }
}

fn ping() -> ! {
    let b = board();
    b.push("ping 1");
    switch(&b.handle(0), &b.handle(1));
    b.push("ping 2");
    let trail = b.trail.lock().unwrap().join(", ");
    console!("{trail}\n");
    halt(3)
}

fn pong() -> ! {
    let b = board();
    b.push("pong");
    switch(&b.handle(1), &b.handle(0));
    unreachable!()
}

struct Mark(&'static str);

impl Drop for Mark {
    fn drop(&mut self) {
        board().push(self.0);
    }
}

fn dropper() -> ! {
    let b = board();
    b.push("dropper");
    switch(&b.handle(0), &b.handle(1));
    let holder = b.contexts.lock().unwrap().pop().unwrap();
    drop(holder);
    b.push("dropped");
    let trail = b.trail.lock().unwrap().join(", ");
    console!("{trail}\n");
    halt(0)
}

fn holder() -> ! {
    let b = board();
    let _mark = Mark("holder unwound");
    b.push("holder");
    switch(&b.handle(1), &b.handle(0));
    unreachable!()
}

#[test]
fn boot_returning_stops_with_zero() {
    let m = Machine::new();
    assert_eq!(m.run(|| console!("hello\n")), 0);
    assert_eq!(m.console_output(), "hello\n");
    assert!(m.is_halted());
}

#[test]
fn halt_code_reaches_host() {
    let m = Machine::new();
    let code = m.run(|| {
        consoleln!("halting");
        halt(42);
    });
    assert_eq!(code, 42);
    assert_eq!(m.console_output(), "halting\n");
}

#[test]
fn psr_resets_to_kernel_mode_with_interrupts_off() {
    let m = Machine::new();
    let code = m.run(|| {
        assert_eq!(Psr::read(), Psr::CURRENT_MODE);
        assert!(Psr::in_kernel_mode());
        psr_set((Psr::CURRENT_MODE | Psr::CURRENT_INT).bits());
        assert_eq!(psr_get(), 0x3);
        psr_set(0);
        assert!(!Psr::in_kernel_mode());
    });
    assert_eq!(code, 0);
}

#[test]
fn invalid_psr_write_halts() {
    let m = Machine::new();
    let code = m.run(|| {
        psr_set(0x10);
        console!("not reached\n");
    });
    assert_eq!(code, 1);
    assert!(m.console_output().starts_with("ERROR: invalid PSR value 0x10"));
}

#[test]
fn contexts_hand_the_processor_back_and_forth() {
    let m = Machine::new();
    let code = m.run(|| {
        let b = board();
        for entry in [ping as fn() -> !, pong] {
            let ctx = Context::new(MIN_STACK, entry).unwrap();
            b.contexts.lock().unwrap().push(ctx);
        }
        launch(&b.handle(0));
    });
    assert_eq!(code, 3);
    assert_eq!(m.console_output(), "ping 1, pong, ping 2\n");
}

#[test]
fn dropping_a_context_waits_for_its_frames() {
    let m = Machine::new();
    let code = m.run(|| {
        let b = board();
        for entry in [dropper as fn() -> !, holder] {
            let ctx = Context::new(MIN_STACK, entry).unwrap();
            b.contexts.lock().unwrap().push(ctx);
        }
        launch(&b.handle(0));
    });
    assert_eq!(code, 0);
    assert_eq!(
        m.console_output(),
        "dropper, holder, holder unwound, dropped\n"
    );
}

#[test]
fn stack_size_is_checked() {
    let m = Machine::new();
    m.run(|| {
        let err = Context::new(MIN_STACK - 1, ping).unwrap_err();
        assert_eq!(err, ContextError::StackTooSmall(MIN_STACK - 1));

        let err = Context::new(usize::MAX, ping).unwrap_err();
        assert_eq!(err, ContextError::StackTooLarge(usize::MAX));
        assert_eq!(
            err.to_string(),
            format!("stack of {} bytes is too large for the host", usize::MAX)
        );

        let ctx = Context::new(MIN_STACK, ping).unwrap();
        assert_eq!(ctx.stack_size(), MIN_STACK);
        assert_ne!(ctx.id(), 0);
    });
}

#[test]
#[should_panic(expected = "boom")]
fn context_panic_is_resumed_on_host() {
    let m = Machine::new();
    m.run(|| panic!("boom"));
}

#[test]
fn machine_locals_are_isolated() {
    static RUNS: AtomicUsize = AtomicUsize::new(0);

    for _ in 0..2 {
        let m = Machine::new();
        m.run(|| {
            let counter = cpu_local(|| AtomicUsize::new(0));
            counter.fetch_add(1, Ordering::SeqCst);
            let again = cpu_local(|| AtomicUsize::new(100));
            assert_eq!(again.load(Ordering::SeqCst), 1);
            RUNS.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(RUNS.load(Ordering::SeqCst), 2);
}

#[test]
fn log_records_carry_their_origin() {
    use crate_interface::call_interface;
    use klogger::Origin;

    assert_eq!(call_interface!(klogger::LoggerAdapter::origin), None);

    let m = Machine::new();
    m.run(|| {
        let origin = call_interface!(klogger::LoggerAdapter::origin);
        assert_eq!(origin, Some(Origin { cpu: 0, context: 0 }));

        let ctx = Context::new(MIN_STACK, ping).unwrap();
        assert_eq!(ctx.id(), 1);
    });
}
