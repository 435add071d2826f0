//! Formula translation from FormatScript text to the canonical operator tree

use crate::core::operators::{self, Resolved, Spelling};
use crate::core::parser::{self, Expr, ExprKind, Literal};
use crate::core::tokenizer;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::error::{FormatScriptError, FormatScriptResult};
use crate::types::{FieldRef, Node, Operator};
use serde::Serialize;
use tracing::{debug, trace};

/// Outcome of translating one formula
///
/// Any diagnostic makes the tree unusable; a partial tree may still be
/// present to help debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree: Option<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Translation {
    fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            tree: None,
            diagnostics: vec![diagnostic],
        }
    }

    /// True when a tree was produced without any diagnostics
    pub fn is_ok(&self) -> bool {
        self.tree.is_some() && self.diagnostics.is_empty()
    }

    /// The tree, or every diagnostic as an error
    pub fn into_result(self) -> FormatScriptResult<Node> {
        match self.tree {
            Some(tree) if self.diagnostics.is_empty() => Ok(tree),
            _ => Err(FormatScriptError::Translation(self.diagnostics)),
        }
    }
}

/// Translates FormatScript formulas to canonical operator trees
#[derive(Debug, Clone)]
pub struct FormulaTranslator {
    max_depth: usize,
}

impl Default for FormulaTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaTranslator {
    pub fn new() -> Self {
        Self {
            max_depth: parser::MAX_DEPTH,
        }
    }

    /// Limit how deep an expression may nest before translation reports an internal error
    ///
    /// Parsed formulas never exceed `parser::MAX_DEPTH`, so only a lower limit has any effect.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Translate formula text
    ///
    /// Example:
    /// - Input: `IF(@currentField > 10, "big", "small")`
    /// - Output: `{"operator":"?","operands":[{"operator":">","operands":["@currentField",10]},"big","small"]}`
    pub fn translate(&self, formula: &str) -> Translation {
        debug!(len = formula.len(), "translating formula");

        let tokens = match tokenizer::tokenize(formula) {
            Ok(tokens) => tokens,
            Err(e) => return Translation::failed(Diagnostic::syntax(e.message, e.location)),
        };

        let program = match parser::parse(tokens) {
            Ok(program) => program,
            Err(e) => return Translation::failed(Diagnostic::syntax(e.message, e.location)),
        };

        if let Some(second) = program.statements.get(1) {
            return Translation::failed(Diagnostic::multiple_top_level(second.location));
        }

        let mut diagnostics = Diagnostics::new();
        let tree = program
            .statements
            .first()
            .and_then(|expr| self.translate_expr(expr, 0, &mut diagnostics));

        debug!(
            ok = diagnostics.is_empty(),
            diagnostics = diagnostics.len(),
            nodes = tree.as_ref().map_or(0, Node::size),
            "formula translated"
        );

        Translation {
            tree,
            diagnostics: diagnostics.into_vec(),
        }
    }

    /// Translate one AST node, pushing problems into `diagnostics`
    fn translate_expr(
        &self,
        expr: &Expr,
        depth: usize,
        diagnostics: &mut Diagnostics,
    ) -> Option<Node> {
        if depth >= self.max_depth {
            // Sibling subtrees can cross the limit too; one report is enough
            if !diagnostics.contains_kind(DiagnosticKind::Internal) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::Internal,
                        format!("Expression is nested more than {} levels deep", self.max_depth),
                    )
                    .at(expr.location),
                );
            }
            return None;
        }

        match &expr.kind {
            ExprKind::Call { callee, args } => self.translate_call(expr, callee, args, depth, diagnostics),

            ExprKind::Binary { op, left, right } => {
                let operator = match operators::resolve(op) {
                    Some(resolved) => resolved.operator,
                    None => {
                        diagnostics.push(Diagnostic::unknown_operator(op, expr.location));
                        return None;
                    }
                };
                let operands = self.translate_all([&**left, &**right], depth, diagnostics);
                Some(Node::operation(operator, operands))
            }

            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let operands = self.translate_all(
                    [&**test, &**consequent, &**alternate],
                    depth,
                    diagnostics,
                );
                Some(Node::operation(Operator::Ternary, operands))
            }

            ExprKind::Identifier(name) => match FieldRef::identifier(name) {
                Some(field) => Some(Node::field(field)),
                None => {
                    diagnostics.push(Diagnostic::unknown_identifier(name, expr.location));
                    None
                }
            },

            ExprKind::Member { object, property } => {
                let object_name = match &object.kind {
                    ExprKind::Identifier(name) => name,
                    _ => {
                        diagnostics.push(Diagnostic::unsupported_syntax(object.location));
                        return None;
                    }
                };
                if !FieldRef::has_members(object_name) {
                    diagnostics.push(Diagnostic::unknown_identifier(object_name, object.location));
                    return None;
                }
                match FieldRef::member(object_name, property) {
                    Some(field) => Some(Node::field(field)),
                    None => {
                        diagnostics.push(Diagnostic::unknown_property(property, expr.location));
                        None
                    }
                }
            }

            ExprKind::Literal(literal) => Some(match literal {
                Literal::Number(n) => Node::number(*n),
                Literal::Text(s) => Node::text(s.clone()),
                Literal::Boolean(b) => Node::boolean(*b),
            }),

            ExprKind::Unary { .. } => {
                diagnostics.push(Diagnostic::unsupported_syntax(expr.location));
                None
            }
        }
    }

    fn translate_call(
        &self,
        expr: &Expr,
        callee: &Expr,
        args: &[Expr],
        depth: usize,
        diagnostics: &mut Diagnostics,
    ) -> Option<Node> {
        let name = match &callee.kind {
            ExprKind::Identifier(name) => name,
            _ => {
                diagnostics.push(Diagnostic::unsupported_syntax(callee.location));
                return None;
            }
        };

        let resolved = match operators::resolve(name) {
            Some(resolved) => resolved,
            None => {
                diagnostics.push(Diagnostic::unknown_function(name, callee.location));
                return None;
            }
        };

        let arity = resolved.call_arity();
        if !arity.contains(args.len()) {
            diagnostics.push(
                Diagnostic::new(DiagnosticKind::Arity, format!("{} expects {}", name, arity))
                    .at(expr.location),
            );
            return None;
        }

        let before = diagnostics.len();
        let operands = self.translate_all(args, depth, diagnostics);

        // Desugaring needs every argument in place; otherwise keep a flat partial node
        if diagnostics.len() > before {
            return Some(Node::operation(resolved.operator, operands));
        }

        trace!(name = %name, spelling = ?resolved.spelling, args = operands.len(), "building call");
        Some(build_call(resolved, operands))
    }

    /// Translate siblings independently so each one can report its own problems
    fn translate_all<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e Expr>,
        depth: usize,
        diagnostics: &mut Diagnostics,
    ) -> Vec<Node> {
        exprs
            .into_iter()
            .filter_map(|e| self.translate_expr(e, depth + 1, diagnostics))
            .collect()
    }
}

/// Build the canonical node for a validated call
fn build_call(resolved: Resolved, operands: Vec<Node>) -> Node {
    match resolved.spelling {
        Spelling::Switch => desugar_switch(operands),
        Spelling::If => desugar_if(operands),
        Spelling::Plain => Node::operation(resolved.operator, operands),
    }
}

/// Split a trailing unpaired argument off as the default branch (`""` when absent)
fn split_default(mut args: Vec<Node>) -> (Vec<Node>, Node) {
    let default = if args.len() % 2 == 1 { args.pop() } else { None };
    (args, default.unwrap_or_else(|| Node::text("")))
}

/// Fold `(test, result)` pairs into a right-nested ternary chain ending in `default`
fn chain(pairs: Vec<Node>, default: Node, test: impl Fn(Node) -> Node) -> Node {
    let mut tests = Vec::with_capacity(pairs.len() / 2);
    let mut iter = pairs.into_iter();
    while let (Some(t), Some(r)) = (iter.next(), iter.next()) {
        tests.push((t, r));
    }

    tests
        .into_iter()
        .rev()
        .fold(default, |alternate, (t, result)| {
            Node::operation(Operator::Ternary, vec![test(t), result, alternate])
        })
}

/// `SWITCH(x, c1, r1, c2, r2, d)` → `x == c1 ? r1 : (x == c2 ? r2 : d)`
fn desugar_switch(mut args: Vec<Node>) -> Node {
    let pivot = args.remove(0);
    let (pairs, default) = split_default(args);
    chain(pairs, default, |case| {
        Node::operation(Operator::Equal, vec![pivot.clone(), case])
    })
}

/// `IF(c1, a1, c2, a2, e)` → `c1 ? a1 : (c2 ? a2 : e)`
fn desugar_if(args: Vec<Node>) -> Node {
    let (pairs, default) = split_default(args);
    chain(pairs, default, |condition| condition)
}
