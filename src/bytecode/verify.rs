use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::bytecode::{
    Bytecode,
    op::{DecodeError, Decoded, Op},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("at offset {offset}: {source}")]
    Decode {
        offset: usize,
        #[source]
        source: DecodeError,
    },

    #[error("constant index {index} at offset {offset} is out of range ({len} constants)")]
    ConstantOutOfRange {
        offset: usize,
        index: usize,
        len: usize,
    },

    #[error("jump at offset {offset} targets {target}, which is not an instruction boundary")]
    BadJumpTarget { offset: usize, target: usize },

    #[error("jump at offset {offset} goes back to {target}; only forward jumps are allowed")]
    BackwardJump { offset: usize, target: usize },

    #[error("stack underflow at offset {offset}: {op} needs {needed} value(s), {height} available")]
    StackUnderflow {
        offset: usize,
        op: &'static str,
        needed: i64,
        height: i64,
    },

    #[error("stack height at offset {offset} is {found} on one path and {expected} on another")]
    StackMismatch {
        offset: usize,
        expected: i64,
        found: i64,
    },
}

/// Returns (pops, pushes) for an op.
fn effect(op: Op) -> (i64, i64) {
    use Op::*;
    match op {
        Constant | True | False | Null | GetGlobal => (0, 1),

        Pop | SetGlobal => (1, 0),

        Add | Sub | Mul | Div => (2, 1),
        Neg | Not => (1, 1),

        Eq | Ne | Gt => (2, 1),

        JumpIfFalsy => (1, 0),
        Jump => (0, 0),
    }
}

/// Check an artifact before running it.
///
/// Every byte must decode and constant operands must index the pool. Jumps
/// must go forward and land on an instruction boundary (or the end of the
/// stream), so every run terminates. The stack height must never go negative
/// and must agree wherever two paths meet.
pub fn verify(bytecode: &Bytecode) -> Result<(), VerifyError> {
    let decoded = decode_all(bytecode)?;
    let end = bytecode.instructions.len();

    for (&offset, ins) in &decoded {
        match ins.op {
            Op::Constant => {
                let index = ins.operands[0];
                if index >= bytecode.constants.len() {
                    return Err(VerifyError::ConstantOutOfRange {
                        offset,
                        index,
                        len: bytecode.constants.len(),
                    });
                }
            }
            Op::Jump | Op::JumpIfFalsy => {
                let target = ins.operands[0];
                if target <= offset {
                    return Err(VerifyError::BackwardJump { offset, target });
                }
                if target != end && !decoded.contains_key(&target) {
                    return Err(VerifyError::BadJumpTarget { offset, target });
                }
            }
            _ => {}
        }
    }

    check_stack(&decoded, end)
}

fn decode_all(bytecode: &Bytecode) -> Result<BTreeMap<usize, Decoded>, VerifyError> {
    let mut decoded = BTreeMap::new();
    let mut offset = 0;

    for item in bytecode.instructions.iter() {
        let (at, ins) = item.map_err(|source| VerifyError::Decode { offset, source })?;
        offset = at + ins.width;
        decoded.insert(at, ins);
    }

    Ok(decoded)
}

/// Follow both edges of every branch, tracking stack height per offset.
fn check_stack(decoded: &BTreeMap<usize, Decoded>, end: usize) -> Result<(), VerifyError> {
    let mut heights: HashMap<usize, i64> = HashMap::new();
    let mut pending: Vec<(usize, i64)> = vec![(0, 0)];

    while let Some((offset, height)) = pending.pop() {
        if offset == end {
            continue;
        }

        match heights.get(&offset) {
            Some(&expected) if expected == height => continue,
            Some(&expected) => {
                return Err(VerifyError::StackMismatch {
                    offset,
                    expected,
                    found: height,
                });
            }
            None => {
                heights.insert(offset, height);
            }
        }

        // Offsets only come from decoded instructions or checked jump targets.
        let Some(ins) = decoded.get(&offset) else {
            continue;
        };

        let (pops, pushes) = effect(ins.op);
        if height < pops {
            return Err(VerifyError::StackUnderflow {
                offset,
                op: ins.op.name(),
                needed: pops,
                height,
            });
        }
        let next = height - pops + pushes;
        let fallthrough = offset + ins.width;

        match ins.op {
            Op::Jump => pending.push((ins.operands[0], next)),
            Op::JumpIfFalsy => {
                pending.push((ins.operands[0], next));
                pending.push((fallthrough, next));
            }
            _ => pending.push((fallthrough, next)),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Instructions;
    use crate::bytecode::op::make;
    use crate::lang::value::Value;

    fn bytecode(instructions: Vec<Vec<u8>>, constants: Vec<Value>) -> Bytecode {
        Bytecode::new(instructions.into_iter().collect(), constants)
    }

    #[test]
    fn test_simple_ops() {
        let bc = bytecode(
            vec![
                make(Op::Constant, &[0]),
                make(Op::Constant, &[1]),
                make(Op::Add, &[]),
                make(Op::Pop, &[]),
            ],
            vec![Value::Integer(1), Value::Integer(2)],
        );
        assert_eq!(verify(&bc), Ok(()));
    }

    #[test]
    fn test_empty_stream() {
        assert_eq!(verify(&Bytecode::default()), Ok(()));
    }

    #[test]
    fn test_underflow() {
        let bc = bytecode(vec![make(Op::True, &[]), make(Op::Add, &[])], vec![]);
        assert_eq!(
            verify(&bc),
            Err(VerifyError::StackUnderflow {
                offset: 1,
                op: "ADD",
                needed: 2,
                height: 1,
            })
        );
    }

    #[test]
    fn test_if_else_pattern() {
        let bc = bytecode(
            vec![
                make(Op::True, &[]),
                make(Op::JumpIfFalsy, &[10]),
                make(Op::Constant, &[0]),
                make(Op::Jump, &[11]),
                make(Op::Null, &[]),
                make(Op::Pop, &[]),
            ],
            vec![Value::Integer(10)],
        );
        assert_eq!(verify(&bc), Ok(()));
    }

    #[test]
    fn test_unbalanced_branches() {
        // consequence pushes two values, alternative pushes one
        let bc = bytecode(
            vec![
                make(Op::True, &[]),
                make(Op::JumpIfFalsy, &[9]),
                make(Op::True, &[]),
                make(Op::True, &[]),
                make(Op::Jump, &[10]),
                make(Op::Null, &[]),
                make(Op::Pop, &[]),
            ],
            vec![],
        );
        assert_eq!(
            verify(&bc),
            Err(VerifyError::StackMismatch {
                offset: 10,
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_jump_into_operand() {
        let bc = bytecode(
            vec![make(Op::Jump, &[4]), make(Op::Constant, &[0])],
            vec![Value::Integer(1)],
        );
        assert_eq!(
            verify(&bc),
            Err(VerifyError::BadJumpTarget {
                offset: 0,
                target: 4
            })
        );
    }

    #[test]
    fn test_jump_to_end_is_fine() {
        let bc = bytecode(vec![make(Op::Jump, &[3])], vec![]);
        assert_eq!(verify(&bc), Ok(()));
    }

    #[test]
    fn test_constant_out_of_range() {
        let bc = bytecode(vec![make(Op::Constant, &[1])], vec![Value::Integer(1)]);
        assert_eq!(
            verify(&bc),
            Err(VerifyError::ConstantOutOfRange {
                offset: 0,
                index: 1,
                len: 1
            })
        );
    }

    #[test]
    fn test_bad_opcode() {
        let bc = Bytecode::new(
            Instructions::from(vec![Op::True as u8, 0xFF]),
            vec![],
        );
        assert_eq!(
            verify(&bc),
            Err(VerifyError::Decode {
                offset: 1,
                source: DecodeError::UnknownOpcode(0xFF)
            })
        );
    }

    #[test]
    fn test_backward_jump() {
        let bc = bytecode(vec![make(Op::Jump, &[0])], vec![]);
        assert_eq!(
            verify(&bc),
            Err(VerifyError::BackwardJump {
                offset: 0,
                target: 0
            })
        );

        let bc = bytecode(
            vec![
                make(Op::True, &[]),
                make(Op::JumpIfFalsy, &[0]),
                make(Op::Null, &[]),
                make(Op::Pop, &[]),
            ],
            vec![],
        );
        assert_eq!(
            verify(&bc),
            Err(VerifyError::BackwardJump {
                offset: 1,
                target: 0
            })
        );
    }
}
