use thiserror::Error;

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// Bytecode opcodes.
///
/// Every instruction is one opcode byte followed by the operands listed in
/// [`Op::definition`]. Operands are unsigned and big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    // literals
    /// Push a constant pool entry.
    /// Operands: `idx:u16`
    Constant = 0,
    True,
    False,
    Null,

    // stack ops
    /// Discard the top of stack, remembering it as the last popped value.
    Pop,

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Neg,

    // logic
    Not,

    // comparison
    Eq,
    Ne,
    /// The only ordering opcode; `a < b` is compiled as `b > a`.
    Gt,

    // ==========================================================================
    // Control flow. Targets are absolute byte offsets into the stream.
    // ==========================================================================
    /// Pop the condition, jump if it is `null` or `false`.
    /// Operands: `target:u16`
    JumpIfFalsy,

    /// Unconditional jump.
    /// Operands: `target:u16`
    Jump,

    // globals
    /// Pop a value into a global slot.
    /// Operands: `slot:u16`
    SetGlobal,

    /// Push the value held in a global slot.
    /// Operands: `slot:u16`
    GetGlobal,
}

/// Human name and operand layout of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

/// Largest value a 2-byte operand can carry.
pub const MAX_OPERAND: usize = u16::MAX as usize;

impl Op {
    /// All opcodes, indexed by their byte value.
    pub const ALL: [Op; 18] = [
        Op::Constant,
        Op::True,
        Op::False,
        Op::Null,
        Op::Pop,
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Neg,
        Op::Not,
        Op::Eq,
        Op::Ne,
        Op::Gt,
        Op::JumpIfFalsy,
        Op::Jump,
        Op::SetGlobal,
        Op::GetGlobal,
    ];

    pub fn definition(self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            Op::Constant => ("CONSTANT", &[2]),
            Op::True => ("TRUE", &[]),
            Op::False => ("FALSE", &[]),
            Op::Null => ("NULL", &[]),
            Op::Pop => ("POP", &[]),
            Op::Add => ("ADD", &[]),
            Op::Sub => ("SUB", &[]),
            Op::Mul => ("MUL", &[]),
            Op::Div => ("DIV", &[]),
            Op::Neg => ("NEG", &[]),
            Op::Not => ("NOT", &[]),
            Op::Eq => ("EQ", &[]),
            Op::Ne => ("NE", &[]),
            Op::Gt => ("GT", &[]),
            Op::JumpIfFalsy => ("JUMP_FALSY", &[2]),
            Op::Jump => ("JUMP", &[2]),
            Op::SetGlobal => ("SET_GLOBAL", &[2]),
            Op::GetGlobal => ("GET_GLOBAL", &[2]),
        };
        Definition {
            name,
            operand_widths,
        }
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    /// Encoded size in bytes, opcode included.
    pub fn width(self) -> usize {
        1 + self.definition().operand_widths.iter().sum::<usize>()
    }

    pub fn is_jump(self) -> bool {
        matches!(self, Op::Jump | Op::JumpIfFalsy)
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Op {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Op::ALL
            .get(byte as usize)
            .copied()
            .ok_or(DecodeError::UnknownOpcode(byte))
    }
}

/// Look up the definition of a raw opcode byte.
pub fn lookup(byte: u8) -> Result<Definition, DecodeError> {
    Op::try_from(byte).map(Op::definition)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("truncated {op} instruction at offset {offset}")]
    Truncated { op: &'static str, offset: usize },
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub op: Op,
    pub operands: Vec<usize>,
    /// Bytes consumed, opcode included.
    pub width: usize,
}

/// Encode one instruction.
///
/// # Panics
///
/// Panics when the operand count does not match the opcode or an operand
/// does not fit its field. Both are compiler bugs; the compiler range-checks
/// operands before encoding.
pub fn make(op: Op, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    assert_eq!(
        operands.len(),
        def.operand_widths.len(),
        "{} takes {} operand(s), got {}",
        def.name,
        def.operand_widths.len(),
        operands.len()
    );

    let mut ins = Vec::with_capacity(op.width());
    ins.push(op as u8);

    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            2 => {
                let Ok(operand) = u16::try_from(operand) else {
                    panic!("operand {} does not fit in {}", operand, def.name);
                };
                ins.extend_from_slice(&operand.to_be_bytes());
            }
            other => panic!("unsupported operand width {}", other),
        }
    }

    ins
}

/// Read the operands that follow an opcode. `bytes` starts right after the
/// opcode byte. Returns the operands and the number of bytes read, or `None`
/// if the slice is too short.
pub fn read_operands(def: &Definition, bytes: &[u8]) -> Option<(Vec<usize>, usize)> {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;

    for &width in def.operand_widths {
        let operand = match width {
            2 => read_u16(bytes, offset)? as usize,
            _ => return None,
        };
        operands.push(operand);
        offset += width;
    }

    Some((operands, offset))
}

/// Decode the instruction starting at `offset`.
pub fn decode(bytes: &[u8], offset: usize) -> Result<Decoded, DecodeError> {
    let byte = *bytes.get(offset).ok_or(DecodeError::Truncated {
        op: "<end>",
        offset,
    })?;
    let op = Op::try_from(byte)?;
    let def = op.definition();

    let (operands, read) =
        read_operands(&def, &bytes[offset + 1..]).ok_or(DecodeError::Truncated {
            op: def.name,
            offset,
        })?;

    Ok(Decoded {
        op,
        operands,
        width: 1 + read,
    })
}

#[inline]
pub fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let hi = *bytes.get(offset)?;
    let lo = *bytes.get(offset + 1)?;
    Some(u16::from_be_bytes([hi, lo]))
}
