pub mod repl;
pub mod tree;
