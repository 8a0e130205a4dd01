use std::ops::{Deref, DerefMut};

use log::{debug, trace};

use crate::bytecode::{Bytecode, Instructions, Op};
use crate::lang::value::Value;
use crate::runtime::runtime_error::{RuntimeError, unsupported_operands};

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub stack_size: usize,
    /// Instructions executed before a run is aborted; `None` means no limit.
    pub max_steps: Option<usize>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            stack_size: STACK_SIZE,
            max_steps: None,
        }
    }
}

/// Global variable storage, addressed by symbol index.
///
/// Lives as long as a REPL session and is lent to every VM run, so values
/// set by one input are visible to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Globals {
    slots: Vec<Option<Value>>,
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}

impl Globals {
    pub fn new() -> Self {
        Self::with_size(GLOBALS_SIZE)
    }

    pub fn with_size(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    /// Value in a slot, `None` if the slot is empty or out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn load(&self, index: usize) -> Result<&Value, RuntimeError> {
        match self.slots.get(index) {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(RuntimeError::UninitializedGlobal { index }),
            None => Err(RuntimeError::GlobalOutOfRange {
                index,
                capacity: self.slots.len(),
            }),
        }
    }

    fn store(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        let capacity = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(RuntimeError::GlobalOutOfRange { index, capacity })?;
        *slot = Some(value);
        Ok(())
    }
}

enum GlobalSlots<'g> {
    Owned(Globals),
    Shared(&'g mut Globals),
}

impl Deref for GlobalSlots<'_> {
    type Target = Globals;

    fn deref(&self) -> &Globals {
        match self {
            GlobalSlots::Owned(globals) => globals,
            GlobalSlots::Shared(globals) => globals,
        }
    }
}

impl DerefMut for GlobalSlots<'_> {
    fn deref_mut(&mut self) -> &mut Globals {
        match self {
            GlobalSlots::Owned(globals) => globals,
            GlobalSlots::Shared(globals) => globals,
        }
    }
}

pub struct Vm<'g> {
    constants: Vec<Value>,
    instructions: Instructions,

    stack: Vec<Value>,
    globals: GlobalSlots<'g>,
    config: VmConfig,

    /// Value most recently discarded by `POP`, kept for the REPL
    last_popped: Option<Value>,
}

impl Vm<'static> {
    /// A VM with its own, fresh global store.
    pub fn new(bytecode: Bytecode) -> Self {
        Self::build(bytecode, GlobalSlots::Owned(Globals::new()), VmConfig::default())
    }
}

impl<'g> Vm<'g> {
    /// A VM that reads and writes a global store owned by the caller.
    pub fn with_globals(bytecode: Bytecode, globals: &'g mut Globals) -> Self {
        Self::with_config(bytecode, globals, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, globals: &'g mut Globals, config: VmConfig) -> Self {
        Self::build(bytecode, GlobalSlots::Shared(globals), config)
    }

    fn build(bytecode: Bytecode, globals: GlobalSlots<'g>, config: VmConfig) -> Self {
        Self {
            constants: bytecode.constants,
            instructions: bytecode.instructions,
            stack: Vec::with_capacity(config.stack_size),
            globals,
            config,
            last_popped: None,
        }
    }

    /// The value most recently removed by `POP`, if any.
    pub fn last_popped(&self) -> Option<&Value> {
        self.last_popped.as_ref()
    }

    pub fn into_last_popped(self) -> Option<Value> {
        self.last_popped
    }

    pub fn stack_top(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    // Execution

    /// Run the instruction stream to its end. Stops at the first error;
    /// global writes made before the error are kept.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        let len = self.instructions.len();
        let mut ip: usize = 0;
        let mut steps: usize = 0;

        while ip < len {
            let byte = self.instructions.as_bytes()[ip];
            let op = Op::try_from(byte)
                .map_err(|_| RuntimeError::UnknownOpcode { byte, offset: ip })?;

            trace!("{:04} {:<12} depth={}", ip, op.name(), self.stack.len());
            steps += 1;
            if let Some(max) = self.config.max_steps {
                if steps > max {
                    return Err(RuntimeError::StepLimitExceeded { limit: max });
                }
            }

            match op {
                // Literals
                Op::Constant => {
                    let index = self.read_operand(op, ip)?;
                    let value = self.constants.get(index).cloned().ok_or(
                        RuntimeError::ConstantOutOfRange {
                            index,
                            len: self.constants.len(),
                        },
                    )?;
                    self.push(value)?;
                }
                Op::True => self.push(Value::Boolean(true))?,
                Op::False => self.push(Value::Boolean(false))?,
                Op::Null => self.push(Value::Null)?,

                // Stack operations
                Op::Pop => {
                    let value = self.pop()?;
                    self.last_popped = Some(value);
                }

                // Arithmetic
                Op::Add | Op::Sub | Op::Mul | Op::Div => self.execute_arithmetic(op)?,
                Op::Neg => {
                    let value = self.pop()?;
                    let result = match value {
                        Value::Integer(n) => n
                            .checked_neg()
                            .ok_or(RuntimeError::IntegerOverflow { op: op.name() })?,
                        other => {
                            return Err(RuntimeError::UnsupportedOperand {
                                op: op.name(),
                                operand: other.type_name(),
                            });
                        }
                    };
                    self.push(Value::Integer(result))?;
                }

                // Logic
                Op::Not => {
                    let value = self.pop()?;
                    self.push(Value::Boolean(!value.is_truthy()))?;
                }

                // Comparison
                Op::Eq | Op::Ne | Op::Gt => self.execute_comparison(op)?,

                // Jump instructions
                Op::Jump => {
                    ip = self.jump_target(op, ip)?;
                    continue;
                }
                Op::JumpIfFalsy => {
                    let target = self.jump_target(op, ip)?;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        ip = target;
                        continue;
                    }
                }

                // Globals
                Op::SetGlobal => {
                    let index = self.read_operand(op, ip)?;
                    let value = self.pop()?;
                    self.globals.store(index, value)?;
                }
                Op::GetGlobal => {
                    let index = self.read_operand(op, ip)?;
                    let value = self.globals.load(index)?.clone();
                    self.push(value)?;
                }
            }

            ip += op.width();
        }

        debug!(
            "run finished after {} instruction(s), stack depth {}",
            steps,
            self.stack.len()
        );
        Ok(())
    }

    fn read_operand(&self, op: Op, ip: usize) -> Result<usize, RuntimeError> {
        self.instructions
            .read_u16(ip + 1)
            .map(usize::from)
            .ok_or(RuntimeError::TruncatedInstruction {
                op: op.name(),
                offset: ip,
            })
    }

    fn jump_target(&self, op: Op, ip: usize) -> Result<usize, RuntimeError> {
        let target = self.read_operand(op, ip)?;
        if target > self.instructions.len() {
            return Err(RuntimeError::JumpOutOfBounds {
                target,
                len: self.instructions.len(),
            });
        }
        Ok(target)
    }

    fn execute_arithmetic(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let (Value::Integer(a), Value::Integer(b)) = (&left, &right) else {
            return Err(unsupported_operands(
                op.name(),
                left.type_name(),
                right.type_name(),
            ));
        };

        let result = match op {
            Op::Add => a.checked_add(*b),
            Op::Sub => a.checked_sub(*b),
            Op::Mul => a.checked_mul(*b),
            Op::Div => {
                if *b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.checked_div(*b)
            }
            other => unreachable!("{} is not an arithmetic op", other),
        };

        let result = result.ok_or(RuntimeError::IntegerOverflow { op: op.name() })?;
        self.push(Value::Integer(result))
    }

    fn execute_comparison(&mut self, op: Op) -> Result<(), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;

        let result = match op {
            // equality includes the type tag: 1 == true is false
            Op::Eq => left == right,
            Op::Ne => left != right,
            Op::Gt => match (&left, &right) {
                (Value::Integer(a), Value::Integer(b)) => a > b,
                _ => {
                    return Err(unsupported_operands(
                        op.name(),
                        left.type_name(),
                        right.type_name(),
                    ));
                }
            },
            other => unreachable!("{} is not a comparison op", other),
        };

        self.push(Value::Boolean(result))
    }

    // Stack operations

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.stack_size {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }
}
