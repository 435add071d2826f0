//! Formula front end: tokenizer, parser and keyword resolution

pub mod operators;
pub mod parser;
pub mod tokenizer;

pub use parser::{Expr, ExprKind, Program};
pub use tokenizer::{Token, TokenKind};
