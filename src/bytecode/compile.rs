use log::debug;

use crate::{
    bytecode::{
        Bytecode, Instructions,
        compile_error::CompileError,
        op::{MAX_OPERAND, Op, make},
        symbol_table::SymbolTable,
    },
    lang::{
        node::{BlockStatement, Expression, Statement},
        program::Program,
        value::Value,
    },
};

/// Operand written into a forward jump until its target is known.
const JUMP_PLACEHOLDER: usize = MAX_OPERAND;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

pub struct Compiler {
    /// Output instruction stream
    instructions: Instructions,

    /// Constant pool (carried over from earlier inputs in a session)
    constants: Vec<Value>,

    /// The two most recently emitted instructions, so a trailing `POP` can
    /// be retracted
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,

    /// Global name -> slot bindings
    symbol_table: SymbolTable,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_state(SymbolTable::new(), Vec::new())
    }

    /// Continue from the symbol table and constant pool of earlier cycles.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Self {
            instructions: Instructions::new(),
            constants,
            last_instruction: None,
            previous_instruction: None,
            symbol_table,
        }
    }

    /// Compile a whole program. The first error aborts the compile.
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        let constants_before = self.constants.len();

        for statement in &program.statements {
            self.compile_statement(statement)?;
        }

        debug!(
            "compiled {} statement(s): {} bytes, {} new constant(s), {} global(s)",
            program.statements.len(),
            self.instructions.len(),
            self.constants.len() - constants_before,
            self.symbol_table.len()
        );
        Ok(())
    }

    /// Snapshot of the current instructions and constants.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode::new(self.instructions.clone(), self.constants.clone())
    }

    /// Hand the compiled artifact and the updated symbol table back to the
    /// caller, without copying.
    pub fn into_parts(self) -> (Bytecode, SymbolTable) {
        (
            Bytecode::new(self.instructions, self.constants),
            self.symbol_table,
        )
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(Op::Pop, &[])?;
            }

            Statement::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(name);
                self.emit(Op::SetGlobal, &[symbol.index])?;
            }

            Statement::Block(block) => self.compile_block(block)?,
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Integer(n) => {
                let idx = self.add_constant(Value::Integer(*n));
                self.emit(Op::Constant, &[idx])?;
            }

            Expression::Boolean(true) => {
                self.emit(Op::True, &[])?;
            }
            Expression::Boolean(false) => {
                self.emit(Op::False, &[])?;
            }

            Expression::Identifier(name) => {
                let index = self
                    .symbol_table
                    .resolve(name)
                    .map(|symbol| symbol.index)
                    .ok_or_else(|| CompileError::undefined_variable(name))?;
                self.emit(Op::GetGlobal, &[index])?;
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;
                let op = match operator.as_str() {
                    "-" => Op::Neg,
                    "!" => Op::Not,
                    _ => return Err(CompileError::unknown_operator(operator)),
                };
                self.emit(op, &[])?;
            }

            Expression::Infix {
                left,
                operator,
                right,
            } => self.compile_infix(left, operator, right)?,

            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
        }

        Ok(())
    }

    fn compile_infix(
        &mut self,
        left: &Expression,
        operator: &str,
        right: &Expression,
    ) -> Result<(), CompileError> {
        // `a < b` is `b > a`: swap the operands and reuse GT
        if operator == "<" {
            self.compile_expression(right)?;
            self.compile_expression(left)?;
            self.emit(Op::Gt, &[])?;
            return Ok(());
        }

        self.compile_expression(left)?;
        self.compile_expression(right)?;

        let op = match operator {
            "+" => Op::Add,
            "-" => Op::Sub,
            "*" => Op::Mul,
            "/" => Op::Div,
            ">" => Op::Gt,
            "==" => Op::Eq,
            "!=" => Op::Ne,
            _ => return Err(CompileError::unknown_operator(operator)),
        };
        self.emit(op, &[])?;

        Ok(())
    }

    /// Generated layout:
    /// ```text
    ///   <condition>
    ///   JUMP_FALSY  else          ; patched once <consequence> is emitted
    ///   <consequence>             ; trailing POP retracted
    ///   JUMP        end           ; patched once <alternative> is emitted
    /// else:
    ///   <alternative> | NULL
    /// end:
    /// ```
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;

        let jump_if_falsy_pos = self.emit(Op::JumpIfFalsy, &[JUMP_PLACEHOLDER])?;

        self.compile_branch(consequence)?;

        let jump_pos = self.emit(Op::Jump, &[JUMP_PLACEHOLDER])?;

        let after_consequence = self.instructions.len();
        self.change_operand(jump_if_falsy_pos, after_consequence)?;

        match alternative {
            None => {
                self.emit(Op::Null, &[])?;
            }
            Some(block) => self.compile_branch(block)?,
        }

        let after_alternative = self.instructions.len();
        self.change_operand(jump_pos, after_alternative)?;

        Ok(())
    }

    /// Compile one arm of a conditional so that it leaves exactly one value:
    /// the trailing POP of its last expression statement is retracted, and
    /// an arm that ends without one (empty, or ending in `let`) yields null.
    fn compile_branch(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        self.compile_block(block)?;

        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        } else {
            self.emit(Op::Null, &[])?;
        }

        Ok(())
    }

    // =========================================================================
    // Emission and backpatching
    // =========================================================================

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Append an instruction and return the offset it starts at.
    fn emit(&mut self, op: Op, operands: &[usize]) -> Result<usize, CompileError> {
        check_operands(op, operands)?;

        let position = self.instructions.push(&make(op, operands));
        self.set_last_instruction(op, position);

        Ok(position)
    }

    fn set_last_instruction(&mut self, op: Op, position: usize) {
        self.previous_instruction = self.last_instruction;
        self.last_instruction = Some(EmittedInstruction { op, position });
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.last_instruction.is_some_and(|last| last.op == op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.last_instruction {
            self.instructions.truncate(last.position);
            self.last_instruction = self.previous_instruction.take();
        }
    }

    /// Re-encode the instruction at `position` with a new operand, in place.
    fn change_operand(&mut self, position: usize, operand: usize) -> Result<(), CompileError> {
        let byte = *self
            .instructions
            .as_bytes()
            .get(position)
            .ok_or_else(|| CompileError::internal(format!("no instruction at {}", position)))?;
        let op = Op::try_from(byte).map_err(|e| CompileError::internal(e.to_string()))?;

        check_operands(op, &[operand])?;
        self.instructions.patch(position, &make(op, &[operand]));

        Ok(())
    }
}

fn check_operands(op: Op, operands: &[usize]) -> Result<(), CompileError> {
    match operands.iter().find(|&&operand| operand > MAX_OPERAND) {
        Some(&operand) => Err(CompileError::OperandOverflow {
            op: op.name(),
            operand,
            max: MAX_OPERAND,
        }),
        None => Ok(()),
    }
}
