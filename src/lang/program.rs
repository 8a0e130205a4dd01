use serde::{Deserialize, Serialize};

use super::node::Statement;

/// A complete syntax tree, as handed over by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements, executed in order.
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}
