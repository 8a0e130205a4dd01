//! # Monkey syntax tree and values
//!
//! The syntax tree is produced by an external parser and consumed by the
//! bytecode compiler. Values are what the VM computes with.
//!
//! ## Documentation conventions
//!
//! - Stack effects are written as `( before -- after )`.

pub mod node;
pub mod program;
pub mod value;
