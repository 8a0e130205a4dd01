pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod instructions;
pub mod ir;
pub mod op;
pub mod symbol_table;
pub mod verify;

pub use instructions::Instructions;
pub use ir::{ArtifactError, Bytecode};
pub use op::Op;
