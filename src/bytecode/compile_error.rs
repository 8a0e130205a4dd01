use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A prefix or infix operator the compiler has no opcode for
    #[error("unknown operator {0}")]
    UnknownOperator(String),

    /// An identifier that was never bound with `let`
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    /// A constant index, global slot or jump target past the 2-byte range
    #[error("operand {operand} of {op} exceeds the maximum of {max}")]
    OperandOverflow {
        op: &'static str,
        operand: usize,
        max: usize,
    },

    /// Internal compiler error (shouldn't happen in normal use)
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompileError {
    pub fn unknown_operator(operator: &str) -> Self {
        CompileError::UnknownOperator(operator.to_string())
    }

    pub fn undefined_variable(name: &str) -> Self {
        CompileError::UndefinedVariable(name.to_string())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CompileError::Internal(msg.into())
    }

    /// A one-line suggestion shown under the error in the REPL.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            CompileError::UnknownOperator(_) => {
                Some("supported operators are prefix `-` `!` and infix `+ - * / < > == !=`")
            }
            CompileError::UndefinedVariable(_) => {
                Some("bind the name with `let` in this or an earlier input before using it")
            }
            CompileError::OperandOverflow { .. } => {
                Some("the program needs more constants, globals or code than one stream can address")
            }
            CompileError::Internal(_) => None,
        }
    }
}
