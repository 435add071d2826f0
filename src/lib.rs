//! FormatScript - formula text ↔ canonical operator tree
//!
//! This library translates human-authored FormatScript formulas into the
//! JSON operator tree stored by column-formatting documents, and renders
//! such trees back into minimally parenthesized formula text.
//!
//! # Features
//!
//! - `IF`, `SWITCH`, `CONCATENATE`, `AND`, `OR` plus arithmetic and comparison operators
//! - Field references (`@currentField.title`, `@me`, `@now`, `@window.innerWidth`)
//! - Position-aware diagnostics, accumulated across the whole formula
//! - `SWITCH`/`IF` chains re-collapse when rendered
//!
//! # Example
//!
//! ```
//! use formatscript::{render, translate};
//!
//! let translation = translate(r#"IF(@currentField > 10, "big", "small")"#);
//! assert!(translation.is_ok());
//!
//! let tree = translation.into_result()?;
//! assert_eq!(
//!     tree.to_json()?,
//!     r#"{"operator":"?","operands":[{"operator":">","operands":["@currentField",10]},"big","small"]}"#
//! );
//! assert_eq!(render(&tree), r#"IF(@currentField > 10, "big", "small")"#);
//! # Ok::<(), formatscript::FormatScriptError>(())
//! ```

pub mod cli;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod transpile;
pub mod types;

// Re-export commonly used types
pub use diagnostics::{Diagnostic, DiagnosticKind, Location, Position};
pub use error::{FormatScriptError, FormatScriptResult};
pub use transpile::{
    render, render_json, translate, FormulaTranslator, ReverseFormulaTranslator, Translation,
};
pub use types::{FieldRef, Node, Operation, Operator, Value};
