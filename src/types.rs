use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

//==============================================================================
// Operators
//==============================================================================

/// Canonical operator of the column-formatting schema
///
/// The serde names are the exact strings the schema stores in `"operator"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "?")]
    Ternary,
    #[serde(rename = "toString()")]
    ToString,
    #[serde(rename = "Number()")]
    ToNumber,
    #[serde(rename = "Date()")]
    ToDate,
    #[serde(rename = "toLocaleString()")]
    ToLocaleString,
    #[serde(rename = "toLocaleDateString()")]
    ToLocaleDateString,
    #[serde(rename = "toLocaleTimeString()")]
    ToLocaleTimeString,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "cos")]
    Cosine,
    #[serde(rename = "sin")]
    Sine,
}

impl Operator {
    pub const ALL: [Operator; 21] = [
        Operator::Add,
        Operator::And,
        Operator::Or,
        Operator::Ternary,
        Operator::ToString,
        Operator::ToNumber,
        Operator::ToDate,
        Operator::ToLocaleString,
        Operator::ToLocaleDateString,
        Operator::ToLocaleTimeString,
        Operator::Subtract,
        Operator::Divide,
        Operator::Multiply,
        Operator::LessThan,
        Operator::LessOrEqual,
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::Equal,
        Operator::NotEqual,
        Operator::Cosine,
        Operator::Sine,
    ];

    /// The string stored in the canonical tree
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Ternary => "?",
            Operator::ToString => "toString()",
            Operator::ToNumber => "Number()",
            Operator::ToDate => "Date()",
            Operator::ToLocaleString => "toLocaleString()",
            Operator::ToLocaleDateString => "toLocaleDateString()",
            Operator::ToLocaleTimeString => "toLocaleTimeString()",
            Operator::Subtract => "-",
            Operator::Divide => "/",
            Operator::Multiply => "*",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Cosine => "cos",
            Operator::Sine => "sin",
        }
    }

    /// Look up an operator by its canonical tree symbol
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    /// Operand bounds for a node in the canonical tree
    ///
    /// Ternary accepts a missing alternate so externally authored trees
    /// like `{"operator": "?", "operands": [c, a]}` still render.
    pub fn arity(self) -> Arity {
        match self {
            Operator::Add | Operator::And | Operator::Or => Arity::at_least(2),
            Operator::Ternary => Arity::range(2, 3),
            Operator::Subtract
            | Operator::Divide
            | Operator::Multiply
            | Operator::LessThan
            | Operator::LessOrEqual
            | Operator::GreaterThan
            | Operator::GreaterOrEqual
            | Operator::Equal
            | Operator::NotEqual => Arity::exactly(2),
            Operator::ToString
            | Operator::ToNumber
            | Operator::ToDate
            | Operator::ToLocaleString
            | Operator::ToLocaleDateString
            | Operator::ToLocaleTimeString
            | Operator::Cosine
            | Operator::Sine => Arity::exactly(1),
        }
    }

    /// Inline operators render as infix (`a + b`), the rest as calls (`AND(a, b)`)
    pub fn is_inline(self) -> bool {
        matches!(
            self,
            Operator::Add
                | Operator::Subtract
                | Operator::Divide
                | Operator::Multiply
                | Operator::LessThan
                | Operator::LessOrEqual
                | Operator::GreaterThan
                | Operator::GreaterOrEqual
                | Operator::Equal
                | Operator::NotEqual
        )
    }

    /// Function name used when rendering in call style
    pub fn call_name(self) -> &'static str {
        match self {
            Operator::Add => "CONCATENATE",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Ternary => "IF",
            Operator::ToString => "TOSTRING",
            Operator::ToNumber => "NUMBER",
            Operator::ToDate => "DATE",
            Operator::ToLocaleString => "TOLOCALESTRING",
            Operator::ToLocaleDateString => "TOLOCALEDATESTRING",
            Operator::ToLocaleTimeString => "TOLOCALETIMESTRING",
            Operator::Cosine => "COS",
            Operator::Sine => "SIN",
            other => other.symbol(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Minimum and (optional) maximum operand count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    /// `None` means unbounded
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: n,
            max: Some(n),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    /// `1 argument`, `2 arguments`, `2-3 arguments`, `at least 2 arguments`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            None => write!(f, "at least {} arguments", self.min),
            Some(max) if max == self.min => {
                let noun = if max == 1 { "argument" } else { "arguments" };
                write!(f, "{} {}", max, noun)
            }
            Some(max) => write!(f, "{}-{} arguments", self.min, max),
        }
    }
}

//==============================================================================
// Field references
//==============================================================================

/// Reserved tokens standing for dynamic values rather than literal text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRef {
    CurrentField,
    CurrentFieldEmail,
    CurrentFieldId,
    CurrentFieldTitle,
    CurrentFieldSip,
    CurrentFieldPicture,
    CurrentFieldLookupId,
    CurrentFieldLookupValue,
    CurrentFieldDesc,
    Me,
    Now,
    WindowInnerHeight,
    WindowInnerWidth,
}

impl FieldRef {
    pub const ALL: [FieldRef; 13] = [
        FieldRef::CurrentField,
        FieldRef::CurrentFieldEmail,
        FieldRef::CurrentFieldId,
        FieldRef::CurrentFieldTitle,
        FieldRef::CurrentFieldSip,
        FieldRef::CurrentFieldPicture,
        FieldRef::CurrentFieldLookupId,
        FieldRef::CurrentFieldLookupValue,
        FieldRef::CurrentFieldDesc,
        FieldRef::Me,
        FieldRef::Now,
        FieldRef::WindowInnerHeight,
        FieldRef::WindowInnerWidth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldRef::CurrentField => "@currentField",
            FieldRef::CurrentFieldEmail => "@currentField.email",
            FieldRef::CurrentFieldId => "@currentField.id",
            FieldRef::CurrentFieldTitle => "@currentField.title",
            FieldRef::CurrentFieldSip => "@currentField.sip",
            FieldRef::CurrentFieldPicture => "@currentField.picture",
            FieldRef::CurrentFieldLookupId => "@currentField.lookupId",
            FieldRef::CurrentFieldLookupValue => "@currentField.lookupValue",
            FieldRef::CurrentFieldDesc => "@currentField.desc",
            FieldRef::Me => "@me",
            FieldRef::Now => "@now",
            FieldRef::WindowInnerHeight => "@window.innerHeight",
            FieldRef::WindowInnerWidth => "@window.innerWidth",
        }
    }

    /// Parse a full token such as `@currentField.title`
    pub fn from_token(token: &str) -> Option<FieldRef> {
        Self::ALL.iter().copied().find(|f| f.as_str() == token)
    }

    /// Bare `@name` identifiers that stand on their own
    pub fn identifier(name: &str) -> Option<FieldRef> {
        match name {
            "@currentField" => Some(FieldRef::CurrentField),
            "@me" => Some(FieldRef::Me),
            "@now" => Some(FieldRef::Now),
            _ => None,
        }
    }

    /// Dotted sub-path of an `@` object, e.g. (`@window`, `innerWidth`)
    pub fn member(object: &str, property: &str) -> Option<FieldRef> {
        match (object, property) {
            ("@currentField", "email") => Some(FieldRef::CurrentFieldEmail),
            ("@currentField", "id") => Some(FieldRef::CurrentFieldId),
            ("@currentField", "title") => Some(FieldRef::CurrentFieldTitle),
            ("@currentField", "sip") => Some(FieldRef::CurrentFieldSip),
            ("@currentField", "picture") => Some(FieldRef::CurrentFieldPicture),
            ("@currentField", "lookupId") => Some(FieldRef::CurrentFieldLookupId),
            ("@currentField", "lookupValue") => Some(FieldRef::CurrentFieldLookupValue),
            ("@currentField", "desc") => Some(FieldRef::CurrentFieldDesc),
            ("@window", "innerHeight") => Some(FieldRef::WindowInnerHeight),
            ("@window", "innerWidth") => Some(FieldRef::WindowInnerWidth),
            _ => None,
        }
    }

    /// Whether `name` is an `@` object that accepts member access
    pub fn has_members(name: &str) -> bool {
        matches!(name, "@currentField" | "@window")
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//==============================================================================
// Canonical tree
//==============================================================================

/// Leaf value of the canonical tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Boolean(bool),
    Field(FieldRef),
}

impl Value {
    /// Classify a JSON string: reserved tokens become field references
    pub fn from_json_string(s: String) -> Self {
        match FieldRef::from_token(&s) {
            Some(field) => Value::Field(field),
            None => Value::Text(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            // Integral values go out as JSON integers (`1`, not `1.0`)
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Field(field) => serializer.serialize_str(field.as_str()),
        }
    }
}

/// Operator applied to an ordered list of operands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(alias = "operation")]
    pub operator: Operator,
    #[serde(default)]
    pub operands: Vec<Node>,
}

impl Operation {
    pub fn new(operator: Operator, operands: Vec<Node>) -> Self {
        Self { operator, operands }
    }
}

/// A node of the canonical operator tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Value(Value),
    Operation(Operation),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Value(Value::Text(s.into()))
    }

    pub fn number(n: f64) -> Self {
        Node::Value(Value::Number(n))
    }

    pub fn boolean(b: bool) -> Self {
        Node::Value(Value::Boolean(b))
    }

    pub fn field(field: FieldRef) -> Self {
        Node::Value(Value::Field(field))
    }

    pub fn operation(operator: Operator, operands: Vec<Node>) -> Self {
        Node::Operation(Operation::new(operator, operands))
    }

    pub fn as_operation(&self) -> Option<&Operation> {
        match self {
            Node::Operation(op) => Some(op),
            Node::Value(_) => None,
        }
    }

    /// Operation with the given operator, if this node is one
    pub fn as_operator(&self, operator: Operator) -> Option<&Operation> {
        self.as_operation().filter(|op| op.operator == operator)
    }

    /// The `""` placeholder used for absent IF/SWITCH defaults
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Node::Value(Value::Text(s)) if s.is_empty())
    }

    /// Number of nodes in this subtree
    pub fn size(&self) -> usize {
        match self {
            Node::Value(_) => 1,
            Node::Operation(op) => 1 + op.operands.iter().map(Node::size).sum::<usize>(),
        }
    }

    /// Parse a canonical tree from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Value(value) => value.serialize(serializer),
            Node::Operation(op) => op.serialize(serializer),
        }
    }
}

/// Wire shape of a node; classified once into [`Node`]
#[derive(Deserialize)]
#[serde(untagged)]
enum RawNode {
    Operation(Operation),
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawNode::deserialize(deserializer)? {
            RawNode::Operation(op) => Node::Operation(op),
            RawNode::Boolean(b) => Node::boolean(b),
            RawNode::Number(n) => Node::number(n),
            RawNode::Text(s) => Node::Value(Value::from_json_string(s)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbol_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(Operator::from_symbol("^"), None);
    }

    #[test]
    fn test_arity_display() {
        assert_eq!(Arity::exactly(1).to_string(), "1 argument");
        assert_eq!(Arity::exactly(2).to_string(), "2 arguments");
        assert_eq!(Arity::range(2, 3).to_string(), "2-3 arguments");
        assert_eq!(Arity::at_least(3).to_string(), "at least 3 arguments");
    }

    #[test]
    fn test_arity_contains() {
        assert!(Arity::at_least(2).contains(50));
        assert!(!Arity::at_least(2).contains(1));
        assert!(Arity::range(2, 3).contains(3));
        assert!(!Arity::range(2, 3).contains(4));
    }

    #[test]
    fn test_inline_classification() {
        assert!(Operator::Add.is_inline());
        assert!(Operator::GreaterOrEqual.is_inline());
        assert!(!Operator::And.is_inline());
        assert!(!Operator::Ternary.is_inline());
        assert!(!Operator::Cosine.is_inline());
    }

    #[test]
    fn test_field_ref_tokens() {
        for field in FieldRef::ALL {
            assert_eq!(FieldRef::from_token(field.as_str()), Some(field));
        }
        assert_eq!(FieldRef::from_token("@currentField.bogus"), None);
        assert_eq!(
            FieldRef::member("@window", "innerWidth"),
            Some(FieldRef::WindowInnerWidth)
        );
        assert_eq!(FieldRef::member("@me", "title"), None);
        assert_eq!(FieldRef::identifier("@window"), None);
    }

    #[test]
    fn test_serialize_operation() {
        let node = Node::operation(
            Operator::Add,
            vec![Node::field(FieldRef::CurrentFieldTitle), Node::text("!")],
        );
        assert_eq!(
            node.to_json().unwrap(),
            r#"{"operator":"+","operands":["@currentField.title","!"]}"#
        );
    }

    #[test]
    fn test_serialize_numbers() {
        assert_eq!(Node::number(3.0).to_json().unwrap(), "3");
        assert_eq!(Node::number(-2.0).to_json().unwrap(), "-2");
        assert_eq!(Node::number(1.5).to_json().unwrap(), "1.5");
    }

    #[test]
    fn test_deserialize_classifies_leaves() {
        let node = Node::from_json(
            r#"{"operator":"?","operands":[true,"@me",{"operator":"cos","operands":[0]}]}"#,
        )
        .unwrap();
        assert_eq!(
            node,
            Node::operation(
                Operator::Ternary,
                vec![
                    Node::boolean(true),
                    Node::field(FieldRef::Me),
                    Node::operation(Operator::Cosine, vec![Node::number(0.0)]),
                ]
            )
        );
    }

    #[test]
    fn test_deserialize_legacy_operation_key() {
        let node = Node::from_json(r#"{"operation":"&&","operands":[true,false]}"#).unwrap();
        assert_eq!(
            node,
            Node::operation(Operator::And, vec![Node::boolean(true), Node::boolean(false)])
        );
    }

    #[test]
    fn test_deserialize_unknown_operator_fails() {
        assert!(Node::from_json(r#"{"operator":"^","operands":[1,2]}"#).is_err());
    }

    #[test]
    fn test_deserialize_unreserved_at_string_is_text() {
        let node = Node::from_json(r#""@currentField.bogus""#).unwrap();
        assert_eq!(node, Node::text("@currentField.bogus"));
    }
}
