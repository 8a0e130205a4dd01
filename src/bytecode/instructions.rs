use serde::{Deserialize, Serialize};

use crate::bytecode::op::{self, DecodeError, Decoded};

/// An encoded instruction stream.
///
/// Grows by appending whole instructions. Earlier instructions can only be
/// changed through [`Instructions::patch`] (same length, in place) or dropped
/// from the end with [`Instructions::truncate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Append an encoded instruction, returning the offset it starts at.
    pub fn push(&mut self, ins: &[u8]) -> usize {
        let pos = self.0.len();
        self.0.extend_from_slice(ins);
        pos
    }

    /// Overwrite bytes starting at `pos` with `ins`.
    ///
    /// # Panics
    ///
    /// Panics if the write would run past the end of the stream.
    pub fn patch(&mut self, pos: usize, ins: &[u8]) {
        assert!(
            pos + ins.len() <= self.0.len(),
            "patch at {} of {} bytes overruns stream of {} bytes",
            pos,
            ins.len(),
            self.0.len()
        );
        self.0[pos..pos + ins.len()].copy_from_slice(ins);
    }

    /// Drop everything from `pos` onwards.
    pub fn truncate(&mut self, pos: usize) {
        self.0.truncate(pos);
    }

    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        op::read_u16(&self.0, offset)
    }

    pub fn decode_at(&self, offset: usize) -> Result<Decoded, DecodeError> {
        op::decode(&self.0, offset)
    }

    /// Iterate over `(offset, instruction)` pairs. Stops after the first
    /// decode error.
    pub fn iter(&self) -> InstructionIter<'_> {
        InstructionIter {
            bytes: &self.0,
            pos: 0,
            failed: false,
        }
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

pub struct InstructionIter<'a> {
    bytes: &'a [u8],
    pos: usize,
    failed: bool,
}

impl Iterator for InstructionIter<'_> {
    type Item = Result<(usize, Decoded), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.bytes.len() {
            return None;
        }

        let offset = self.pos;
        match op::decode(self.bytes, offset) {
            Ok(decoded) => {
                self.pos += decoded.width;
                Some(Ok((offset, decoded)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl std::fmt::Display for Instructions {
    /// One line per instruction: `0003 CONSTANT    1`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for item in self.iter() {
            match item {
                Ok((offset, decoded)) => {
                    writeln!(f, "{}", format_instruction(offset, &decoded))?;
                }
                Err(e) => writeln!(f, "ERROR: {}", e)?,
            }
        }
        Ok(())
    }
}

pub(crate) fn format_instruction(offset: usize, decoded: &Decoded) -> String {
    if decoded.operands.is_empty() {
        return format!("{:04} {}", offset, decoded.op.name());
    }

    let operands: Vec<String> = decoded.operands.iter().map(|o| o.to_string()).collect();
    format!("{:04} {:<12}{}", offset, decoded.op.name(), operands.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::op::{Op, make};

    #[test]
    fn test_display() {
        let instructions: Instructions = vec![
            make(Op::Constant, &[1]),
            make(Op::Constant, &[2]),
            make(Op::Add, &[]),
            make(Op::Constant, &[65535]),
            make(Op::Pop, &[]),
        ]
        .into_iter()
        .collect();

        let expected = "\
0000 CONSTANT    1
0003 CONSTANT    2
0006 ADD
0007 CONSTANT    65535
0010 POP
";
        assert_eq!(instructions.to_string(), expected);
    }

    #[test]
    fn test_display_stops_at_bad_byte() {
        let instructions = Instructions::from(vec![Op::True as u8, 0xFE, Op::Pop as u8]);

        let expected = "\
0000 TRUE
ERROR: unknown opcode 0xfe
";
        assert_eq!(instructions.to_string(), expected);
    }

    #[test]
    fn test_push_returns_start_offset() {
        let mut instructions = Instructions::new();
        assert_eq!(instructions.push(&make(Op::True, &[])), 0);
        assert_eq!(instructions.push(&make(Op::Jump, &[0])), 1);
        assert_eq!(instructions.push(&make(Op::Pop, &[])), 4);
        assert_eq!(instructions.len(), 5);
    }

    #[test]
    fn test_patch_in_place() {
        let mut instructions = Instructions::new();
        instructions.push(&make(Op::True, &[]));
        let pos = instructions.push(&make(Op::JumpIfFalsy, &[0xFFFF]));
        instructions.push(&make(Op::Null, &[]));

        instructions.patch(pos, &make(Op::JumpIfFalsy, &[5]));

        assert_eq!(instructions.len(), 5);
        assert_eq!(instructions.read_u16(pos + 1), Some(5));
        assert_eq!(instructions.decode_at(4).unwrap().op, Op::Null);
    }

    #[test]
    #[should_panic(expected = "overruns stream")]
    fn test_patch_past_end_panics() {
        let mut instructions = Instructions::new();
        instructions.push(&make(Op::Pop, &[]));
        instructions.patch(0, &make(Op::Jump, &[3]));
    }

    #[test]
    fn test_truncate() {
        let mut instructions = Instructions::new();
        instructions.push(&make(Op::True, &[]));
        let pos = instructions.push(&make(Op::Pop, &[]));
        instructions.truncate(pos);
        assert_eq!(instructions.as_bytes(), &[Op::True as u8]);
    }
}
