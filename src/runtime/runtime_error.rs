use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    #[error("execution step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize },

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unsupported types for {op}: {left} and {right}")]
    UnsupportedOperands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("unsupported type for {op}: {operand}")]
    UnsupportedOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {op}")]
    IntegerOverflow { op: &'static str },

    #[error("unknown opcode {byte:#04x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },

    #[error("truncated {op} instruction at offset {offset}")]
    TruncatedInstruction { op: &'static str, offset: usize },

    #[error("constant index {index} out of range ({len} constants)")]
    ConstantOutOfRange { index: usize, len: usize },

    #[error("global slot {index} out of range ({capacity} slots)")]
    GlobalOutOfRange { index: usize, capacity: usize },

    #[error("global slot {index} read before it was set")]
    UninitializedGlobal { index: usize },

    #[error("jump target {target} out of range ({len} bytes)")]
    JumpOutOfBounds { target: usize, len: usize },
}

pub fn unsupported_operands(op: &'static str, left: &'static str, right: &'static str) -> RuntimeError {
    RuntimeError::UnsupportedOperands { op, left, right }
}
