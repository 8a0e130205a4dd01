use serde::{Deserialize, Serialize};

/// Runtime value in the Monkey language.
///
/// Values are the only data that can exist on the VM operand stack, in the
/// constant pool, or in a global slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    /// Boolean value.
    Boolean(bool),

    /// The null value, produced by a conditional without a taken branch.
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
        }
    }

    /// Only `null` and `false` are falsy. Zero is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }
}

impl std::fmt::Display for Value {
    /// Format a value the way the REPL shows results.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}
