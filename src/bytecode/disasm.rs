use crate::bytecode::{Bytecode, Instructions, op::Op};

/// Print disassembly of a bytecode program
pub fn print_bc(bc: &Bytecode) {
    print!("{}", disassemble(bc));
}

/// Render a bytecode program: constant pool, then the instruction listing
/// with jump targets marked.
pub fn disassemble(bc: &Bytecode) -> String {
    Listing(bc).to_string()
}

struct Listing<'a>(&'a Bytecode);

impl std::fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bc = self.0;

        writeln!(f, "════════════════════════════════════════")?;
        writeln!(f, " constants ({})", bc.constants.len())?;
        writeln!(f, "════════════════════════════════════════")?;
        for (i, value) in bc.constants.iter().enumerate() {
            writeln!(f, "  [{}] {}", i, value)?;
        }
        writeln!(f)?;

        writeln!(f, "════════════════════════════════════════")?;
        writeln!(f, " main")?;
        writeln!(f, " {} bytes", bc.instructions.len())?;
        writeln!(f, "════════════════════════════════════════")?;
        disassemble_instructions(f, bc)
    }
}

fn disassemble_instructions(f: &mut std::fmt::Formatter<'_>, bc: &Bytecode) -> std::fmt::Result {
    let jump_targets = collect_jump_targets(&bc.instructions);

    for item in bc.instructions.iter() {
        let (offset, ins) = match item {
            Ok(decoded) => decoded,
            Err(e) => return writeln!(f, "      !! {}", e),
        };

        let is_target = jump_targets.contains(&offset);
        if is_target {
            writeln!(f, "      ┌──────────────────────────────────")?;
        }

        let marker = if is_target { "► " } else { "  " };
        let name = ins.op.name();

        match ins.op {
            Op::Constant => {
                let idx = ins.operands[0];
                let value = bc
                    .constants
                    .get(idx)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "<missing>".to_string());
                writeln!(f, "{:04} {}{:<12}{:<6}; {}", offset, marker, name, idx, value)?;
            }
            Op::Jump | Op::JumpIfFalsy => {
                writeln!(
                    f,
                    "{:04} {}{:<12}(→ {:04})",
                    offset, marker, name, ins.operands[0]
                )?;
            }
            Op::SetGlobal | Op::GetGlobal => {
                writeln!(f, "{:04} {}{:<12}{}", offset, marker, name, ins.operands[0])?;
            }
            _ => writeln!(f, "{:04} {}{}", offset, marker, name)?,
        }
    }

    // a jump to the very end has no instruction to mark
    if jump_targets.contains(&bc.instructions.len()) {
        writeln!(f, "      ┌──────────────────────────────────")?;
        writeln!(f, "{:04} ► <end>", bc.instructions.len())?;
    }

    Ok(())
}

fn collect_jump_targets(instructions: &Instructions) -> Vec<usize> {
    let mut targets = Vec::new();

    for (_, ins) in instructions.iter().flatten() {
        if ins.op.is_jump() && !targets.contains(&ins.operands[0]) {
            targets.push(ins.operands[0]);
        }
    }

    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::compile::Compiler;
    use crate::lang::node::{Expression as E, Statement as S};
    use crate::lang::program::Program;

    fn compile(statements: Vec<S>) -> Bytecode {
        let mut compiler = Compiler::new();
        compiler.compile(&Program::new(statements)).unwrap();
        compiler.bytecode()
    }

    #[test]
    fn test_constants_are_listed() {
        let text = disassemble(&compile(vec![S::expr(E::infix(
            E::int(7),
            "+",
            E::int(35),
        ))]));

        assert!(text.contains(" constants (2)"));
        assert!(text.contains("  [0] 7"));
        assert!(text.contains("  [1] 35"));
        assert!(text.contains("0000   CONSTANT    0     ; 7"));
        assert!(text.contains("0006   ADD"));
    }

    #[test]
    fn test_jump_targets_are_marked() {
        let text = disassemble(&compile(vec![S::expr(E::if_(
            E::bool(true),
            vec![S::expr(E::int(10))],
            None,
        ))]));

        assert!(text.contains("0001   JUMP_FALSY  (→ 0010)"));
        assert!(text.contains("0007   JUMP        (→ 0011)"));
        assert!(text.contains("0010 ► NULL"));
        assert!(text.contains("0011 ► POP"));
    }

    #[test]
    fn test_jump_to_end_is_marked() {
        let text = disassemble(&compile(vec![S::let_(
            "x",
            E::if_(E::bool(false), vec![S::expr(E::int(1))], None),
        )]));

        assert!(!text.contains("<end>"));

        let bc = Bytecode::new(
            vec![crate::bytecode::op::make(Op::Jump, &[3])]
                .into_iter()
                .collect(),
            vec![],
        );
        assert!(disassemble(&bc).contains("0003 ► <end>"));
    }
}
