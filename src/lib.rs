pub mod ast;
pub mod parser;
pub mod span;
mod stack;
pub mod tokenizer;
pub mod tree_walk_interpreter;
