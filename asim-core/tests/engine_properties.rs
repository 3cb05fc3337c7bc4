//! Behavioural properties of the execution engine

use std::time::Duration;

use asim_core::prelude::*;

fn engine_with(width: BitWidth) -> Engine {
    Engine::with_config(
        EngineConfig::default()
            .with_memory_size(128)
            .with_bit_width(width)
            .with_run_interval(Duration::ZERO)
            .with_max_steps(100_000)
            .with_event_history(32),
    )
}

fn run(source: &str) -> Engine {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program(source).unwrap();
    engine.run().unwrap();
    engine
}

#[test]
fn test_mov_literal_above_max_saturates() {
    for width in [BitWidth::W8, BitWidth::W16, BitWidth::W32] {
        let mut engine = engine_with(width);
        engine.load_program("MOV r0, 0x1FFFFFFFF").unwrap();
        engine.run().unwrap();
        assert_eq!(engine.register(Register::R0), width.max_value(), "{width}");
    }
}

#[test]
fn test_add_then_sub_restores_destination() {
    for (dest, src) in [(0u32, 0u32), (7, 250), (255, 1), (4_000_000_000, 999_999_999)] {
        let engine = run(&format!("MOV r0, {dest}\nMOV r1, {src}\nADD r0, r1\nSUB r0, r1"));
        assert_eq!(engine.register(Register::R0), dest);
    }

    let mut narrow = engine_with(BitWidth::W8);
    narrow.load_program("MOV r0, 200\nADD r0, 100\nSUB r0, 100").unwrap();
    narrow.run().unwrap();
    assert_eq!(narrow.register(Register::R0), 200);
}

#[test]
fn test_push_pop_roundtrip() {
    let engine = run("PUSH 1234\nPOP r5");
    assert_eq!(engine.register(Register::R5), 1234);
    assert_eq!(engine.register(Register::Sp), 127);
}

#[test]
fn test_div_by_zero_leaves_destination() {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program("MOV r0, 10\nDIV r0, 0\nMOV r0, 1").unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.source, VmError::DivisionByZero);
    assert_eq!(err.line, 2);
    assert_eq!(engine.register(Register::R0), 10);
    assert_eq!(engine.status(), EngineState::Stopped(StopReason::Error));
}

#[test]
fn test_unknown_label_does_not_advance() {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program("INC r0\nJMP nowhere\nINC r0").unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.source, VmError::UnknownLabel("nowhere".into()));
    assert_eq!(engine.cursor(), 1);
    assert_eq!(engine.register(Register::R0), 1);
}

#[test]
fn test_vector_add_and_atomic_divide() {
    let mut engine = engine_with(BitWidth::W32);
    let source = "\
        MOV [0], 1\nMOV [1], 2\nMOV [2], 3\nMOV [3], 4\n\
        MOV [4], 4\nMOV [5], 3\nMOV [6], 2\nMOV [7], 1\n\
        VLOAD v1, [0]\nVLOAD v2, [4]\nVADD v0, v1, v2\n\
        MOV [6], 0\nVLOAD v3, [4]\nVDIV v0, v1, v3";
    engine.load_program(source).unwrap();
    let err = engine.run().unwrap_err();
    assert_eq!(err.source, VmError::DivisionByZero);
    assert_eq!(engine.vectors()[0], [5.0, 5.0, 5.0, 5.0]);
}

#[test]
fn test_call_ret_returns_after_call() {
    let engine = run("\
        CALL sub\n\
        MOV r1, 1\n\
        JMP done\n\
    sub:\n\
        MOV r0, 42\n\
        RET\n\
    done:\n\
    END");
    assert_eq!(engine.register(Register::R0), 42);
    assert_eq!(engine.register(Register::R1), 1);
    assert_eq!(engine.register(Register::Sp), 127);
    assert_eq!(engine.status(), EngineState::Stopped(StopReason::Success));
}

#[test]
fn test_blank_program_leaves_state() {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program("MOV r3, 8\nMOV [9], 3").unwrap();
    engine.run().unwrap();
    let before = engine.snapshot();

    for blank in ["", "   ", "\n\n\t", "; just a comment"] {
        engine.load_program(blank).unwrap();
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.status(), EngineState::Stopped(StopReason::Success));
    }
}

#[test]
fn test_breakpoint_halts_before_line_then_steps_it() {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program("MOV r0, 1\n\nMOV r0, 2\nMOV r0, 3").unwrap();
    let breakpoints = Breakpoints::new();
    breakpoints.add(2);
    engine.set_breakpoint_hook(breakpoints.hook());

    assert_eq!(engine.run().unwrap(), RunOutcome::Breakpoint { line: 3 });
    assert_eq!(engine.register(Register::R0), 1);

    assert!(engine.step().unwrap());
    assert_eq!(engine.register(Register::R0), 2);
    assert_eq!(breakpoints.hit_count(2), Some(1));

    assert_eq!(engine.run().unwrap(), RunOutcome::Completed);
    assert_eq!(engine.register(Register::R0), 3);
}

#[test]
fn test_duplicate_label_rejects_load() {
    let mut engine = engine_with(BitWidth::W32);
    let err = engine.load_program("a:\nINC r0\na:\nEND").unwrap_err();
    assert_eq!(err, VmError::DuplicateLabel { label: "a".into(), line: 3 });
    assert_eq!(engine.status(), EngineState::Idle);
}

#[test]
fn test_stop_handle_from_another_thread() {
    let mut engine = engine_with(BitWidth::W32);
    engine.load_program("spin:\nINC r0\nJMP spin").unwrap();
    let handle = engine.stop_handle();

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(5));
        handle.stop();
    });
    let outcome = engine.run_with_interval(Duration::from_millis(1)).unwrap();
    stopper.join().unwrap();

    assert_eq!(outcome, RunOutcome::Stopped);
    assert_eq!(engine.status(), EngineState::Paused);
    assert!(engine.step().unwrap());
}

#[test]
fn test_errors_are_reported_on_the_output_channel() {
    let mut engine = engine_with(BitWidth::W32);
    let errors = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = errors.clone();
    engine.subscribe(EventFilter::Severity(Severity::Error), move |event| {
        if let Event::Output { text, line, .. } = event {
            sink.lock().unwrap().push((text.clone(), *line));
        }
    });

    engine.load_program("MOV [127], 7\nRET").unwrap();
    assert!(engine.step().unwrap());
    engine.step().unwrap_err();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], ("Line 2: Invalid return address: 7".to_string(), Some(2)));
}
