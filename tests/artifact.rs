use monkey::bytecode::compile::Compiler;
use monkey::bytecode::op::{Op, make};
use monkey::bytecode::verify::{VerifyError, verify};
use monkey::lang::node::{Expression as E, Statement as S};
use monkey::runtime::{Globals, RuntimeError, Vm, VmConfig};
use monkey::{Bytecode, Program, Value};

fn compile(statements: Vec<S>) -> Bytecode {
    let mut compiler = Compiler::new();
    compiler.compile(&Program::new(statements)).unwrap();
    compiler.bytecode()
}

#[test]
fn artifact_survives_bytes_and_still_runs() {
    let bytecode = compile(vec![
        S::let_("x", E::int(20)),
        S::expr(E::if_(
            E::infix(E::ident("x"), ">", E::int(10)),
            vec![S::expr(E::infix(E::ident("x"), "*", E::int(2)))],
            Some(vec![S::expr(E::int(0))]),
        )),
    ]);

    let restored = Bytecode::from_bytes(&bytecode.to_bytes().unwrap()).unwrap();
    assert_eq!(restored, bytecode);
    assert_eq!(verify(&restored), Ok(()));

    let mut vm = Vm::new(restored);
    vm.run().unwrap();
    assert_eq!(vm.last_popped(), Some(&Value::Integer(40)));
}

#[test]
fn compiled_programs_verify() {
    let bytecode = compile(vec![
        S::let_("a", E::if_(E::bool(true), vec![], None)),
        S::expr(E::prefix(
            "!",
            E::if_(
                E::ident("a"),
                vec![S::let_("b", E::int(1))],
                Some(vec![S::expr(E::int(2))]),
            ),
        )),
    ]);
    assert_eq!(verify(&bytecode), Ok(()));
}

#[test]
fn verify_rejects_jump_into_an_operand() {
    let bytecode = Bytecode::new(
        vec![
            make(Op::Jump, &[4]),
            make(Op::Constant, &[0]),
            make(Op::Pop, &[]),
        ]
        .into_iter()
        .collect(),
        vec![Value::Integer(1)],
    );

    assert_eq!(
        verify(&bytecode),
        Err(VerifyError::BadJumpTarget {
            offset: 0,
            target: 4
        })
    );
}

#[test]
fn looping_artifact_is_rejected_before_it_runs() {
    let looping = Bytecode::new(vec![make(Op::Jump, &[0])].into_iter().collect(), vec![]);
    let restored = Bytecode::from_bytes(&looping.to_bytes().unwrap()).unwrap();

    assert_eq!(
        verify(&restored),
        Err(VerifyError::BackwardJump {
            offset: 0,
            target: 0
        })
    );
}

#[test]
fn step_limit_stops_an_unverified_loop() {
    let looping = Bytecode::new(vec![make(Op::Jump, &[0])].into_iter().collect(), vec![]);
    let mut globals = Globals::new();
    let config = VmConfig {
        max_steps: Some(1_000),
        ..Default::default()
    };

    assert_eq!(
        Vm::with_config(looping, &mut globals, config).run(),
        Err(RuntimeError::StepLimitExceeded { limit: 1_000 })
    );
}

#[test]
fn artifact_round_trips_through_a_file() {
    let bytecode = compile(vec![S::expr(E::infix(E::int(6), "*", E::int(7)))]);
    let path = std::env::temp_dir().join(format!("monkey-artifact-{}.mkb", std::process::id()));

    bytecode.write_to(&path).unwrap();
    let restored = Bytecode::read_from(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(restored, bytecode);
}
