//! Bytecode compiler and stack VM for a subset of the Monkey language.
//!
//! A syntax tree ([`lang::program::Program`]) is compiled into a flat
//! instruction stream plus a constant pool ([`bytecode::Bytecode`]), which
//! the [`runtime::Vm`] executes. A [`session::Session`] carries names,
//! constants and globals from one input to the next.

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod runtime;
pub mod session;

pub use bytecode::Bytecode;
pub use lang::program::Program;
pub use lang::value::Value;
pub use session::{Session, SessionError};
