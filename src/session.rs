use log::debug;
use thiserror::Error;

use crate::bytecode::Bytecode;
use crate::bytecode::compile::Compiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::symbol_table::SymbolTable;
use crate::lang::program::Program;
use crate::lang::value::Value;
use crate::runtime::{Globals, RuntimeError, Vm, VmConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// State that outlives a single input: names, constants and global values.
///
/// Each input is compiled against the names and constants of every earlier
/// input, so constant indices and global slots keep their meaning.
#[derive(Debug, Default)]
pub struct Session {
    symbol_table: SymbolTable,
    constants: Vec<Value>,
    globals: Globals,
    config: VmConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: VmConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Compile one input. On failure the session is left as it was.
    pub fn compile(&mut self, program: &Program) -> Result<Bytecode, CompileError> {
        // Copies cost O(session size) per input. The symbol table cannot be
        // rolled back by truncation since a rebinding overwrites the old entry.
        let mut compiler = Compiler::with_state(self.symbol_table.clone(), self.constants.clone());
        compiler.compile(program)?;

        let (bytecode, symbol_table) = compiler.into_parts();
        self.symbol_table = symbol_table;
        self.constants = bytecode.constants.clone();
        Ok(bytecode)
    }

    /// Run against the session's globals. Writes made before a failure stay.
    pub fn run(&mut self, bytecode: Bytecode) -> Result<Option<Value>, RuntimeError> {
        let mut vm = Vm::with_config(bytecode, &mut self.globals, self.config.clone());
        vm.run()?;
        Ok(vm.into_last_popped())
    }

    pub fn eval(&mut self, program: &Program) -> Result<Option<Value>, SessionError> {
        let bytecode = self.compile(program)?;
        debug!(
            "session: {} byte(s), {} constant(s), {} name(s)",
            bytecode.instructions.len(),
            self.constants.len(),
            self.symbol_table.len()
        );
        Ok(self.run(bytecode)?)
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::node::{Expression as E, Statement as S};

    fn program(statements: Vec<S>) -> Program {
        Program::new(statements)
    }

    #[test]
    fn test_names_carry_across_inputs() {
        let mut session = Session::new();

        let first = session.eval(&program(vec![S::let_("a", E::int(1))]));
        assert_eq!(first, Ok(None));

        let second = session.eval(&program(vec![S::expr(E::infix(
            E::ident("a"),
            "+",
            E::int(2),
        ))]));
        assert_eq!(second, Ok(Some(Value::Integer(3))));
    }

    #[test]
    fn test_constants_accumulate() {
        let mut session = Session::new();
        session.eval(&program(vec![S::expr(E::int(1))])).unwrap();
        let bytecode = session.compile(&program(vec![S::expr(E::int(2))])).unwrap();

        assert_eq!(session.constants(), &[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(bytecode.constants.len(), 2);
    }

    #[test]
    fn test_failed_compile_changes_nothing() {
        let mut session = Session::new();
        session.eval(&program(vec![S::let_("a", E::int(1))])).unwrap();

        let err = session
            .eval(&program(vec![
                S::let_("b", E::int(2)),
                S::expr(E::ident("nope")),
            ]))
            .unwrap_err();

        assert_eq!(
            err,
            SessionError::Compile(CompileError::undefined_variable("nope"))
        );
        assert_eq!(session.symbol_table().len(), 1);
        assert!(session.symbol_table().resolve("b").is_none());
        assert_eq!(session.constants(), &[Value::Integer(1)]);
    }

    #[test]
    fn test_runtime_error_is_wrapped() {
        let mut session = Session::new();
        let err = session
            .eval(&program(vec![S::expr(E::infix(E::int(1), "/", E::int(0)))]))
            .unwrap_err();

        assert_eq!(err, SessionError::Runtime(RuntimeError::DivisionByZero));
        assert_eq!(err.to_string(), "runtime error: division by zero");
    }

    #[test]
    fn test_small_stack_limit() {
        let mut session = Session::with_config(VmConfig {
            stack_size: 1,
            ..Default::default()
        });
        let err = session
            .eval(&program(vec![S::expr(E::infix(E::int(1), "+", E::int(2)))]))
            .unwrap_err();

        assert_eq!(
            err,
            SessionError::Runtime(RuntimeError::StackOverflow { limit: 1 })
        );
    }
}
