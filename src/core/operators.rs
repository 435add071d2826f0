//! Surface keyword → canonical operator resolution
//!
//! `IF` and `SWITCH` both resolve to the ternary operator but accept
//! different argument counts, so the spelling travels with the operator.

use crate::types::{Arity, Operator};

/// How a ternary was spelled; irrelevant for every other operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spelling {
    /// `SWITCH(value, case, result, ..., default?)`
    Switch,
    /// `IF(cond, then, ..., else?)` or the `?:` operator
    If,
    Plain,
}

/// A keyword resolved to its operator, remembering the spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub operator: Operator,
    pub spelling: Spelling,
}

impl Resolved {
    fn plain(operator: Operator) -> Self {
        Self {
            operator,
            spelling: Spelling::Plain,
        }
    }

    /// Argument bounds when written as a function call
    pub fn call_arity(&self) -> Arity {
        match self.spelling {
            Spelling::Switch => Arity::at_least(3),
            Spelling::If => Arity::at_least(2),
            Spelling::Plain => self.operator.arity(),
        }
    }
}

/// Resolve a function name or operator token, case-insensitively
pub fn resolve(keyword: &str) -> Option<Resolved> {
    let resolved = match keyword.to_lowercase().as_str() {
        "concatenate" | "concat" | "&" | "+" => Resolved::plain(Operator::Add),
        "and" | "&&" => Resolved::plain(Operator::And),
        "or" | "||" => Resolved::plain(Operator::Or),
        "switch" => Resolved {
            operator: Operator::Ternary,
            spelling: Spelling::Switch,
        },
        "if" | "?" => Resolved {
            operator: Operator::Ternary,
            spelling: Spelling::If,
        },
        "tostring" => Resolved::plain(Operator::ToString),
        "number" => Resolved::plain(Operator::ToNumber),
        "date" => Resolved::plain(Operator::ToDate),
        "tolocalestring" => Resolved::plain(Operator::ToLocaleString),
        "tolocaledatestring" => Resolved::plain(Operator::ToLocaleDateString),
        "tolocaletimestring" => Resolved::plain(Operator::ToLocaleTimeString),
        "-" => Resolved::plain(Operator::Subtract),
        "/" => Resolved::plain(Operator::Divide),
        "*" => Resolved::plain(Operator::Multiply),
        "<" => Resolved::plain(Operator::LessThan),
        "<=" => Resolved::plain(Operator::LessOrEqual),
        ">" => Resolved::plain(Operator::GreaterThan),
        ">=" => Resolved::plain(Operator::GreaterOrEqual),
        "==" => Resolved::plain(Operator::Equal),
        "!=" => Resolved::plain(Operator::NotEqual),
        "cos" => Resolved::plain(Operator::Cosine),
        "sin" => Resolved::plain(Operator::Sine),
        _ => return None,
    };
    Some(resolved)
}
