//! Translation between formula text and the canonical operator tree

pub mod formula_translator;
pub mod reverse_formula_translator;

pub use formula_translator::{FormulaTranslator, Translation};
pub use reverse_formula_translator::ReverseFormulaTranslator;

use crate::error::FormatScriptResult;
use crate::types::Node;

/// Translate formula text with the default translator
pub fn translate(formula: &str) -> Translation {
    FormulaTranslator::new().translate(formula)
}

/// Render a canonical tree as formula text
pub fn render(node: &Node) -> String {
    ReverseFormulaTranslator::new().render(node)
}

/// Render a canonical tree given as JSON text
pub fn render_json(json: &str) -> FormatScriptResult<String> {
    ReverseFormulaTranslator::new().render_json(json)
}
