//! Formula parser
//!
//! Converts a sequence of tokens into a generic expression AST.
//! Uses recursive descent parsing with JavaScript operator precedence,
//! lowest first:
//!
//! ```text
//! conditional  ?:            (right-associative)
//! logical or   ||
//! logical and  &&
//! bitwise or   |
//! bitwise and  &
//! equality     == != === !==
//! relational   < <= > >=
//! additive     + -
//! multiplicat. * / %
//! unary        - + !
//! postfix      call(...), member.access
//! ```

use super::tokenizer::{Token, TokenKind};
use crate::diagnostics::{Location, Position};

/// Deepest syntactic nesting accepted: parentheses, argument lists,
/// unary operands and conditional branches each count one level
pub const MAX_NESTING: usize = 128;

/// Tallest expression tree accepted, counting every operator, call and
/// member access on the path from the root to a leaf
pub const MAX_DEPTH: usize = 256;

/// Literal value as written in the formula
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    Boolean(bool),
}

/// Kind of an expression node
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// Bare identifier or `@` field root (`IF`, `@currentField`)
    Identifier(String),
    /// Member access: object.property
    Member {
        object: Box<Expr>,
        property: String,
    },
    /// Function call: callee(arg1, arg2, ...)
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// Binary operation: left op right
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: -expr, !expr
    Unary { op: String, operand: Box<Expr> },
    /// Conditional: test ? consequent : alternate
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

/// Abstract Syntax Tree node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
    height: usize,
}

impl Expr {
    fn new(kind: ExprKind, location: Location) -> Self {
        let height = 1 + kind.child_height();
        Self {
            kind,
            location,
            height,
        }
    }

    /// Number of nodes on the longest path from here down to a leaf
    pub fn height(&self) -> usize {
        self.height
    }
}

impl ExprKind {
    fn child_height(&self) -> usize {
        match self {
            ExprKind::Literal(_) | ExprKind::Identifier(_) => 0,
            ExprKind::Member { object, .. } => object.height,
            ExprKind::Call { callee, args } => args
                .iter()
                .map(Expr::height)
                .fold(callee.height, usize::max),
            ExprKind::Binary { left, right, .. } => left.height.max(right.height),
            ExprKind::Unary { operand, .. } => operand.height,
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => test.height.max(consequent.height).max(alternate.height),
        }
    }
}

/// Parsed formula text: one expression per statement
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Expr>,
}

/// Error during parsing
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at {}: {}",
            self.location.start, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Parser for formula tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    /// Create a new parser for the given tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Parse the tokens into statements
    ///
    /// Statements are separated by `;` or, as in JavaScript, by a line break
    /// where the next token cannot continue the current expression.
    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();

        loop {
            while self.match_token(&TokenKind::Semicolon) {}
            if self.is_at_end() {
                break;
            }

            statements.push(self.expression()?);

            if self.is_at_end() || self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            if !self.starts_new_line() {
                let token = &self.tokens[self.position];
                return Err(ParseError::new(
                    format!("Unexpected token: {}", describe(&token.kind)),
                    token.location,
                ));
            }
        }

        if statements.is_empty() {
            return Err(ParseError::new("Empty expression", self.end_location()));
        }

        Ok(Program { statements })
    }

    /// Check if we've consumed all tokens
    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Peek at the current token
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    /// Advance to the next token and return it
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Check if current token matches and consume it
    fn match_token(&mut self, expected: &TokenKind) -> bool {
        if self.peek_kind() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consume any of the given operators
    fn match_any_operator(&mut self, ops: &[&str]) -> Option<String> {
        if let Some(TokenKind::Operator(s)) = self.peek_kind() {
            if ops.contains(&s.as_str()) {
                let op = s.clone();
                self.position += 1;
                return Some(op);
            }
        }
        None
    }

    /// Consume `expected` or fail with `message` at the current token
    fn expect(&mut self, expected: &TokenKind, message: &str) -> Result<Location, ParseError> {
        match self.peek() {
            Some(token) if &token.kind == expected => {
                let location = token.location;
                self.position += 1;
                Ok(location)
            }
            Some(token) => Err(ParseError::new(
                format!("{}, found {}", message, describe(&token.kind)),
                token.location,
            )),
            None => Err(ParseError::new(
                format!("{}, found end of formula", message),
                self.end_location(),
            )),
        }
    }

    /// Zero-width location just past the last token
    fn end_location(&self) -> Location {
        let end = self
            .tokens
            .last()
            .map(|t| t.location.end)
            .unwrap_or_else(Position::default);
        Location::new(end, end)
    }

    /// Whether the current token sits on a later line than the previous one
    fn starts_new_line(&self) -> bool {
        match (self.position.checked_sub(1), self.peek()) {
            (Some(prev), Some(current)) => {
                current.location.start.line > self.tokens[prev].location.end.line
            }
            _ => false,
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                format!("Formula is nested more than {} levels deep", MAX_NESTING),
                self.here(),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Build a composite node, rejecting trees taller than `MAX_DEPTH`
    ///
    /// `at` locates the token that made the tree too tall.
    fn build(
        &self,
        kind: ExprKind,
        location: Location,
        at: Location,
    ) -> Result<Expr, ParseError> {
        let expr = Expr::new(kind, location);
        if expr.height > MAX_DEPTH {
            return Err(ParseError::new(
                format!("Expression is nested more than {} operators deep", MAX_DEPTH),
                at,
            ));
        }
        Ok(expr)
    }

    /// Location of the current token, or the end of the formula
    fn here(&self) -> Location {
        self.peek()
            .map(|t| t.location)
            .unwrap_or_else(|| self.end_location())
    }

    /// Expression: conditional
    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.conditional()
    }

    /// Conditional: logical_or ( "?" expression ":" expression )?
    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.logical_or()?;

        let question = self.here();
        if !self.match_token(&TokenKind::Question) {
            return Ok(test);
        }

        let consequent = self.nested(Self::expression)?;
        self.expect(&TokenKind::Colon, "Expected ':' in conditional expression")?;
        let alternate = self.nested(Self::expression)?;

        let location = test.location.to(alternate.location);
        self.build(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            location,
            question,
        )
    }

    /// Left-associative binary level: next ( op next )*
    fn binary_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;

        loop {
            let at = self.here();
            let op = match self.match_any_operator(ops) {
                Some(op) => op,
                None => break,
            };
            let right = next(self)?;
            let location = left.location.to(right.location);
            left = self.build(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                location,
                at,
            )?;
        }

        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["||"], Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["&&"], Self::bitwise_or)
    }

    fn bitwise_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["|"], Self::bitwise_and)
    }

    fn bitwise_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["&"], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["==", "!=", "===", "!=="], Self::relational)
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["<", "<=", ">", ">="], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    /// Unary: ( "-" | "+" | "!" ) unary | postfix
    ///
    /// A minus directly in front of a number literal folds into a negative literal.
    fn unary(&mut self) -> Result<Expr, ParseError> {
        let start = match self.peek() {
            Some(token) => token.location,
            None => return self.postfix(),
        };

        let op = match self.match_any_operator(&["-", "+", "!"]) {
            Some(op) => op,
            None => return self.postfix(),
        };

        let operand = self.nested(Self::unary)?;
        let location = start.to(operand.location);

        if op == "-" {
            if let ExprKind::Literal(Literal::Number(n)) = operand.kind {
                return Ok(Expr::new(ExprKind::Literal(Literal::Number(-n)), location));
            }
        }

        self.build(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            location,
            start,
        )
    }

    /// Postfix: primary ( "(" arguments? ")" | "." IDENTIFIER )*
    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;

        loop {
            let at = self.here();
            if self.match_token(&TokenKind::OpenParen) {
                let args = self.nested(Self::arguments)?;
                let close = self.expect(
                    &TokenKind::CloseParen,
                    "Expected ')' after function arguments",
                )?;
                let location = expr.location.to(close);
                expr = self.build(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    location,
                    at,
                )?;
            } else if self.match_token(&TokenKind::Dot) {
                let (property, property_location) = match self.advance() {
                    Some(Token {
                        kind: TokenKind::Identifier(name),
                        location,
                    }) => (name, location),
                    Some(token) => {
                        return Err(ParseError::new(
                            format!(
                                "Expected property name after '.', found {}",
                                describe(&token.kind)
                            ),
                            token.location,
                        ));
                    }
                    None => {
                        return Err(ParseError::new(
                            "Expected property name after '.', found end of formula",
                            self.end_location(),
                        ));
                    }
                };
                let location = expr.location.to(property_location);
                expr = self.build(
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                    },
                    location,
                    property_location,
                )?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Arguments: ( expr ( "," expr )* )?
    fn arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();

        if self.peek_kind() == Some(&TokenKind::CloseParen) {
            return Ok(args);
        }

        args.push(self.expression()?);
        while self.match_token(&TokenKind::Comma) {
            args.push(self.expression()?);
        }

        Ok(args)
    }

    /// Primary: NUMBER | STRING | BOOLEAN | IDENTIFIER | FIELD | "(" expr ")"
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = match self.advance() {
            Some(token) => token,
            None => {
                return Err(ParseError::new(
                    "Unexpected end of formula",
                    self.end_location(),
                ));
            }
        };

        let kind = match token.kind {
            TokenKind::Number(n) => ExprKind::Literal(Literal::Number(n)),
            TokenKind::Text(s) => ExprKind::Literal(Literal::Text(s)),
            TokenKind::Boolean(b) => ExprKind::Literal(Literal::Boolean(b)),
            TokenKind::Identifier(name) | TokenKind::Field(name) => ExprKind::Identifier(name),
            TokenKind::OpenParen => {
                let inner = self.nested(Self::expression)?;
                let close = self.expect(&TokenKind::CloseParen, "Expected ')' after expression")?;
                // Keep the parentheses in the reported span
                return Ok(Expr {
                    location: token.location.to(close),
                    ..inner
                });
            }
            other => {
                return Err(ParseError::new(
                    format!("Unexpected token: {}", describe(&other)),
                    token.location,
                ));
            }
        };

        Ok(Expr::new(kind, token.location))
    }
}

/// Human-readable token description for error messages
fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number {}", n),
        TokenKind::Text(s) => format!("string \"{}\"", s),
        TokenKind::Boolean(b) => format!("{}", b),
        TokenKind::Identifier(name) => format!("identifier '{}'", name),
        TokenKind::Field(name) => format!("'{}'", name),
        TokenKind::Operator(op) => format!("'{}'", op),
        TokenKind::OpenParen => "'('".to_string(),
        TokenKind::CloseParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Dot => "'.'".to_string(),
        TokenKind::Question => "'?'".to_string(),
        TokenKind::Colon => "':'".to_string(),
        TokenKind::Semicolon => "';'".to_string(),
    }
}

/// Convenience function to parse tokens into statements
pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::tokenize;

    /// Helper to parse a single-statement formula and drop locations
    fn parse_formula(formula: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(formula).map_err(|e| ParseError::new(e.message, e.location))?;
        let mut program = parse(tokens)?;
        assert_eq!(program.statements.len(), 1, "expected one statement");
        Ok(program.statements.remove(0))
    }

    /// Strip locations so tests can compare shapes
    fn shape(expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(Literal::Number(n)) => format!("{}", n),
            ExprKind::Literal(Literal::Text(s)) => format!("{:?}", s),
            ExprKind::Literal(Literal::Boolean(b)) => format!("{}", b),
            ExprKind::Identifier(name) => name.clone(),
            ExprKind::Member { object, property } => format!("{}.{}", shape(object), property),
            ExprKind::Call { callee, args } => format!(
                "{}({})",
                shape(callee),
                args.iter().map(shape).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::Binary { op, left, right } => {
                format!("({} {} {})", shape(left), op, shape(right))
            }
            ExprKind::Unary { op, operand } => format!("({}{})", op, shape(operand)),
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => format!(
                "({} ? {} : {})",
                shape(test),
                shape(consequent),
                shape(alternate)
            ),
        }
    }

    fn parse_shape(formula: &str) -> String {
        shape(&parse_formula(formula).unwrap())
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_shape("42"), "42");
        assert_eq!(parse_shape("\"hello\""), "\"hello\"");
        assert_eq!(parse_shape("true"), "true");
    }

    #[test]
    fn test_parse_negative_number_folds() {
        let expr = parse_formula("-42").unwrap();
        assert_eq!(expr.kind, ExprKind::Literal(Literal::Number(-42.0)));
        assert_eq!(expr.location.start, Position::new(1, 0));
        assert_eq!(expr.location.end, Position::new(1, 3));
    }

    #[test]
    fn test_parse_unary_on_identifier_is_kept() {
        assert_eq!(parse_shape("-@currentField"), "(-@currentField)");
        assert_eq!(parse_shape("!true"), "(!true)");
    }

    #[test]
    fn test_parse_operator_precedence_mul_over_add() {
        assert_eq!(parse_shape("a + b * c"), "(a + (b * c))");
    }

    #[test]
    fn test_parse_parentheses() {
        assert_eq!(parse_shape("(a + b) * c"), "((a + b) * c)");
    }

    #[test]
    fn test_parse_left_associative_chain() {
        assert_eq!(parse_shape("a + b + c"), "((a + b) + c)");
        assert_eq!(parse_shape("a - b - c"), "((a - b) - c)");
    }

    #[test]
    fn test_parse_comparison_below_arithmetic() {
        assert_eq!(parse_shape("a + 1 > b * 2"), "((a + 1) > (b * 2))");
        assert_eq!(parse_shape("a < b == c"), "((a < b) == c)");
    }

    #[test]
    fn test_parse_logical_precedence() {
        assert_eq!(parse_shape("a || b && c"), "(a || (b && c))");
        assert_eq!(parse_shape("a == 1 && b != 2"), "((a == 1) && (b != 2))");
    }

    #[test]
    fn test_parse_ampersand_between_equality_and_and() {
        assert_eq!(parse_shape("a & b == c"), "(a & (b == c))");
        assert_eq!(parse_shape("a & b && c"), "((a & b) && c)");
    }

    #[test]
    fn test_parse_conditional_right_associative() {
        assert_eq!(parse_shape("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
        assert_eq!(parse_shape("a > 1 ? \"x\" : \"y\""), "((a > 1) ? \"x\" : \"y\")");
    }

    #[test]
    fn test_parse_function_calls() {
        assert_eq!(parse_shape("NOW()"), "NOW()");
        assert_eq!(parse_shape("IF(x > 10, \"yes\", \"no\")"), "IF((x > 10), \"yes\", \"no\")");
        assert_eq!(parse_shape("AND(OR(a, b), c)"), "AND(OR(a, b), c)");
    }

    #[test]
    fn test_parse_member_access() {
        assert_eq!(parse_shape("@currentField.title"), "@currentField.title");
        assert_eq!(parse_shape("@window.innerWidth / 2"), "(@window.innerWidth / 2)");
    }

    #[test]
    fn test_parse_call_location_spans_arguments() {
        let expr = parse_formula("COS( 1 )").unwrap();
        assert_eq!(expr.location.start, Position::new(1, 0));
        assert_eq!(expr.location.end, Position::new(1, 8));
    }

    #[test]
    fn test_parse_multiple_statements() {
        let tokens = tokenize("IF(true,1,2); IF(false,3,4)").unwrap();
        let program = parse(tokens).unwrap();
        assert_eq!(program.statements.len(), 2);
        assert_eq!(program.statements[1].location.start, Position::new(1, 14));
    }

    #[test]
    fn test_parse_newline_separates_statements() {
        let tokens = tokenize("1 + 2\n3").unwrap();
        assert_eq!(parse(tokens).unwrap().statements.len(), 2);
    }

    #[test]
    fn test_parse_newline_inside_expression() {
        let tokens = tokenize("1 +\n2").unwrap();
        assert_eq!(parse(tokens).unwrap().statements.len(), 1);
    }

    #[test]
    fn test_parse_trailing_semicolon() {
        let tokens = tokenize("1;").unwrap();
        assert_eq!(parse(tokens).unwrap().statements.len(), 1);
    }

    #[test]
    fn test_parse_error_empty() {
        let err = parse(tokenize("").unwrap()).unwrap_err();
        assert_eq!(err.message, "Empty expression");
        assert!(parse(tokenize(" ; ").unwrap()).is_err());
    }

    #[test]
    fn test_parse_error_missing_close_paren() {
        let err = parse_formula("IF(a, b").unwrap_err();
        assert!(err.message.contains("')'"));
    }

    #[test]
    fn test_parse_error_missing_colon() {
        let err = parse_formula("a ? b").unwrap_err();
        assert!(err.message.contains("':'"));
    }

    #[test]
    fn test_parse_error_same_line_garbage() {
        let err = parse_formula("1 2").unwrap_err();
        assert!(err.message.contains("Unexpected token"));
        assert_eq!(err.location.start, Position::new(1, 2));
    }

    #[test]
    fn test_parse_error_dangling_dot() {
        let err = parse_formula("@currentField.").unwrap_err();
        assert!(err.message.contains("property name"));
    }

    #[test]
    fn test_parse_error_too_deep() {
        let formula = format!("{}1{}", "(".repeat(MAX_NESTING + 10), ")".repeat(MAX_NESTING + 10));
        let err = parse_formula(&formula).unwrap_err();
        assert!(err.message.contains("nested"));
    }

    #[test]
    fn test_parse_each_call_is_one_nesting_level() {
        let deepest = format!("{}1{}", "COS(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(parse_formula(&deepest).unwrap().height(), MAX_NESTING + 1);

        let too_deep = format!("{}1{}", "COS(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        let err = parse_formula(&too_deep).unwrap_err();
        assert!(err.message.contains("nested more than 128 levels"));
    }

    #[test]
    fn test_parse_long_chain_stops_at_depth_bound() {
        let formula = vec!["1"; 200_000].join("+");
        let err = parse_formula(&formula).unwrap_err();
        assert!(err.message.contains("operators deep"), "{}", err.message);
        // The `+` that would make the tree too tall
        assert_eq!(err.location.start, Position::new(1, (2 * MAX_DEPTH - 1) as u32));
    }

    #[test]
    fn test_parse_height_counts_operators() {
        assert_eq!(parse_formula("1").unwrap().height(), 1);
        assert_eq!(parse_formula("(((1)))").unwrap().height(), 1);
        assert_eq!(parse_formula("1 + 2 * 3").unwrap().height(), 3);
        assert_eq!(parse_formula("@currentField.title").unwrap().height(), 2);
        assert_eq!(parse_formula("a ? b : c ? d : e").unwrap().height(), 3);
    }
}
