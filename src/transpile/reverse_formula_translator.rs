//! Reverse formula translation - canonical operator tree → FormatScript text
//!
//! Rendering never fails. Operations with too few operands render as empty
//! text and surplus operands are dropped.

use crate::error::FormatScriptResult;
use crate::types::{Node, Operation, Operator, Value};
use std::fmt::Write;
use tracing::{debug, trace};

/// Renders canonical operator trees as formula text
#[derive(Debug, Clone, Default)]
pub struct ReverseFormulaTranslator {
    /// Prefix output with `=` (the tokenizer skips it on the way back in)
    leading_equals: bool,
}

impl ReverseFormulaTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leading_equals(mut self, leading_equals: bool) -> Self {
        self.leading_equals = leading_equals;
        self
    }

    /// Render a tree as formula text
    ///
    /// Example:
    /// - Input: `{"operator":"*","operands":[{"operator":"+","operands":[1,2]},3]}`
    /// - Output: `(1 + 2) * 3`
    pub fn render(&self, node: &Node) -> String {
        let text = render_node(node);
        debug!(nodes = node.size(), len = text.len(), "tree rendered");
        if self.leading_equals {
            format!("={}", text)
        } else {
            text
        }
    }

    /// Parse canonical JSON and render it
    pub fn render_json(&self, json: &str) -> FormatScriptResult<String> {
        let node = Node::from_json(json)?;
        Ok(self.render(&node))
    }
}

fn render_node(node: &Node) -> String {
    match node {
        Node::Value(value) => render_value(value),
        Node::Operation(op) => render_operation(op),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Text(s) => quote(s),
        Value::Number(n) => render_number(*n),
        Value::Boolean(b) => b.to_string(),
        Value::Field(field) => field.as_str().to_string(),
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Double-quote a string, escaping what the tokenizer would otherwise misread
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() && (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Operands clipped to the operator's bounds, or `None` when there are too few
fn bounded(op: &Operation) -> Option<&[Node]> {
    let arity = op.operator.arity();
    if op.operands.len() < arity.min {
        trace!(operator = %op.operator, count = op.operands.len(), "too few operands");
        return None;
    }
    let len = arity
        .max
        .map_or(op.operands.len(), |max| op.operands.len().min(max));
    Some(&op.operands[..len])
}

fn render_operation(op: &Operation) -> String {
    let Some(operands) = bounded(op) else {
        return String::new();
    };

    match op.operator {
        Operator::Ternary => render_ternary(operands),
        // A flat `a + b + c` would read back left-nested, so variadic sums stay calls
        operator if operator.is_inline() && operands.len() <= 2 => {
            render_inline(operator, operands)
        }
        operator => render_call(operator.call_name(), operands.iter().map(render_node)),
    }
}

fn render_call(name: &str, args: impl Iterator<Item = String>) -> String {
    format!("{}({})", name, args.collect::<Vec<_>>().join(", "))
}

fn render_inline(parent: Operator, operands: &[Node]) -> String {
    let separator = format!(" {} ", parent.symbol());
    operands
        .iter()
        .enumerate()
        .map(|(index, child)| {
            let text = render_node(child);
            if !text.is_empty() && needs_parens(parent, child, index) {
                format!("({})", text)
            } else {
                text
            }
        })
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Whether an inline child must be parenthesized under an inline parent
///
/// Same-operator chains stay flat only in the leading position, so
/// left-nested `a + b + c` reads naturally while `a - (b - c)` keeps its grouping.
fn needs_parens(parent: Operator, child: &Node, index: usize) -> bool {
    let Some(child) = child.as_operation() else {
        return false;
    };
    if !child.operator.is_inline() {
        return false;
    }
    matches!(
        child.operator,
        Operator::Divide
            | Operator::LessThan
            | Operator::LessOrEqual
            | Operator::GreaterThan
            | Operator::GreaterOrEqual
    ) || child.operator != parent
        || index > 0
}

/// The `(pivot, case)` pair of a two-operand equality test
fn switch_test(node: &Node) -> Option<(&Node, &Node)> {
    match node.as_operator(Operator::Equal)?.operands.as_slice() {
        [pivot, case] => Some((pivot, case)),
        _ => None,
    }
}

/// A ternary that can be folded into its parent's argument list
fn chained_ternary(node: &Node) -> Option<&[Node]> {
    let op = node.as_operator(Operator::Ternary)?;
    bounded(op)
}

fn render_ternary(operands: &[Node]) -> String {
    match switch_test(&operands[0]) {
        Some((pivot, _)) => render_switch(pivot, operands),
        None => render_if(operands),
    }
}

/// `?(==(x, c1), r1, ?(==(x, c2), r2, d))` → `SWITCH(x, c1, r1, c2, r2, d)`
fn render_switch(pivot: &Node, operands: &[Node]) -> String {
    let mut args = vec![render_node(pivot)];
    let mut current = operands;

    let default = loop {
        // Every link in the chain has passed `switch_test`
        if let Some((_, case)) = switch_test(&current[0]) {
            args.push(render_node(case));
        }
        args.push(render_node(&current[1]));

        let Some(alternate) = current.get(2) else {
            break None;
        };
        match chained_ternary(alternate) {
            Some(next) if switch_test(&next[0]).is_some_and(|(p, _)| p == pivot) => {
                current = next;
            }
            _ => break Some(alternate),
        }
    };

    push_default(&mut args, default);
    render_call("SWITCH", args.into_iter())
}

/// `?(c1, r1, ?(c2, r2, e))` → `IF(c1, r1, c2, r2, e)`
fn render_if(operands: &[Node]) -> String {
    let mut args = Vec::new();
    let mut current = operands;

    let default = loop {
        args.push(render_node(&current[0]));
        args.push(render_node(&current[1]));

        let Some(alternate) = current.get(2) else {
            break None;
        };
        match chained_ternary(alternate) {
            Some(next) => current = next,
            None => break Some(alternate),
        }
    };

    push_default(&mut args, default);
    render_call("IF", args.into_iter())
}

/// Append a trailing default unless it is absent, `""` or renders to nothing
fn push_default(args: &mut Vec<String>, default: Option<&Node>) {
    if let Some(node) = default.filter(|n| !n.is_empty_text()) {
        let text = render_node(node);
        if !text.is_empty() {
            args.push(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldRef;

    fn render(node: &Node) -> String {
        ReverseFormulaTranslator::new().render(node)
    }

    fn op(operator: Operator, operands: Vec<Node>) -> Node {
        Node::operation(operator, operands)
    }

    fn n(v: f64) -> Node {
        Node::number(v)
    }

    #[test]
    fn test_leaves() {
        assert_eq!(render(&n(3.0)), "3");
        assert_eq!(render(&n(-0.25)), "-0.25");
        assert_eq!(render(&Node::boolean(true)), "true");
        assert_eq!(render(&Node::field(FieldRef::CurrentFieldTitle)), "@currentField.title");
        assert_eq!(render(&Node::text("say \"hi\"\n")), r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_text_that_looks_like_a_field_stays_quoted() {
        assert_eq!(render(&Node::text("@me")), "\"@me\"");
    }

    #[test]
    fn test_mixed_precedence_keeps_parens() {
        let tree = op(Operator::Multiply, vec![op(Operator::Add, vec![n(1.0), n(2.0)]), n(3.0)]);
        assert_eq!(render(&tree), "(1 + 2) * 3");
    }

    #[test]
    fn test_left_nested_chain_is_flat() {
        let tree = op(Operator::Add, vec![op(Operator::Add, vec![n(1.0), n(2.0)]), n(3.0)]);
        assert_eq!(render(&tree), "1 + 2 + 3");
    }

    #[test]
    fn test_right_nested_subtraction_keeps_parens() {
        let tree = op(Operator::Subtract, vec![n(1.0), op(Operator::Subtract, vec![n(2.0), n(3.0)])]);
        assert_eq!(render(&tree), "1 - (2 - 3)");
    }

    #[test]
    fn test_variadic_sum_renders_as_call() {
        let tree = op(Operator::Add, vec![Node::text("a"), Node::field(FieldRef::Me), n(1.0)]);
        assert_eq!(render(&tree), r#"CONCATENATE("a", @me, 1)"#);
    }

    #[test]
    fn test_division_always_wrapped() {
        let tree = op(Operator::Divide, vec![op(Operator::Divide, vec![n(1.0), n(2.0)]), n(3.0)]);
        assert_eq!(render(&tree), "(1 / 2) / 3");
    }

    #[test]
    fn test_call_style_operators() {
        let tree = op(
            Operator::And,
            vec![
                op(Operator::GreaterThan, vec![Node::field(FieldRef::CurrentField), n(1.0)]),
                op(Operator::ToString, vec![Node::field(FieldRef::Now)]),
            ],
        );
        assert_eq!(render(&tree), "AND(@currentField > 1, TOSTRING(@now))");
    }

    #[test]
    fn test_if_chain_collapses() {
        let tree = op(
            Operator::Ternary,
            vec![
                Node::boolean(true),
                n(1.0),
                op(Operator::Ternary, vec![Node::boolean(false), n(2.0), n(3.0)]),
            ],
        );
        assert_eq!(render(&tree), "IF(true, 1, false, 2, 3)");
    }

    #[test]
    fn test_empty_default_omitted() {
        let tree = op(Operator::Ternary, vec![Node::boolean(true), n(1.0), Node::text("")]);
        assert_eq!(render(&tree), "IF(true, 1)");
    }

    #[test]
    fn test_switch_chain_collapses() {
        let x = || Node::field(FieldRef::Me);
        let eq = |case: &str| op(Operator::Equal, vec![x(), Node::text(case)]);
        let tree = op(
            Operator::Ternary,
            vec![
                eq("1"),
                Node::text("a"),
                op(Operator::Ternary, vec![eq("2"), Node::text("b"), Node::text("c")]),
            ],
        );
        assert_eq!(render(&tree), r#"SWITCH(@me, "1", "a", "2", "b", "c")"#);
    }

    #[test]
    fn test_switch_with_different_pivot_nests() {
        let eq = |field, case| op(Operator::Equal, vec![Node::field(field), n(case)]);
        let tree = op(
            Operator::Ternary,
            vec![
                eq(FieldRef::Me, 1.0),
                n(10.0),
                op(Operator::Ternary, vec![eq(FieldRef::Now, 2.0), n(20.0), Node::text("")]),
            ],
        );
        assert_eq!(render(&tree), "SWITCH(@me, 1, 10, SWITCH(@now, 2, 20))");
    }

    #[test]
    fn test_too_few_operands_renders_empty() {
        assert_eq!(render(&op(Operator::Subtract, vec![n(1.0)])), "");
        let tree = op(Operator::Add, vec![n(1.0), op(Operator::Divide, vec![])]);
        assert_eq!(render(&tree), "1 + ");
    }

    #[test]
    fn test_extra_operands_dropped() {
        assert_eq!(render(&op(Operator::Cosine, vec![n(0.0), n(1.0)])), "COS(0)");
        let tree = op(Operator::Ternary, vec![Node::boolean(true), n(1.0), n(2.0), n(3.0)]);
        assert_eq!(render(&tree), "IF(true, 1, 2)");
    }

    #[test]
    fn test_leading_equals() {
        let translator = ReverseFormulaTranslator::new().with_leading_equals(true);
        assert_eq!(translator.render(&n(1.0)), "=1");
    }

    #[test]
    fn test_render_json() {
        let translator = ReverseFormulaTranslator::new();
        let text = translator
            .render_json(r#"{"operator":"||","operands":["@currentField",false]}"#)
            .unwrap();
        assert_eq!(text, "OR(@currentField, false)");
        assert!(translator.render_json("{").is_err());
    }
}
