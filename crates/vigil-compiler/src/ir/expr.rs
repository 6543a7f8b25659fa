//! Expressions and specifier trees.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Literal {
    /// Number in source notation, kept as text so no precision is lost.
    Number(String),
    String(String),
    Bool(bool),
    Null,
}

/// An expression of the monitored application.
///
/// Lowering only needs the shape of property-access chains (change-event
/// emitters) and literal values (thresholds, initializers). Everything else
/// is carried as target-language source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Expr {
    Literal {
        value: Literal,
    },
    /// `receiver.feature`; `receiver` is absent for the innermost segment.
    FeatureCall {
        #[serde(default)]
        receiver: Option<Box<Expr>>,
        feature: String,
        /// Canonical name of the type declaring `feature`, when the front end
        /// resolved it.
        #[serde(default, rename = "declaredClass")]
        declared_class: Option<String>,
    },
    Source {
        text: String,
    },
}

impl Expr {
    pub fn number(text: impl Into<String>) -> Self {
        Expr::Literal {
            value: Literal::Number(text.into()),
        }
    }

    pub fn string(text: impl Into<String>) -> Self {
        Expr::Literal {
            value: Literal::String(text.into()),
        }
    }

    /// Builds the chain `a.b.c` from its segments in source order.
    pub fn chain<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut expr: Option<Expr> = None;
        for segment in segments {
            expr = Some(Expr::FeatureCall {
                receiver: expr.map(Box::new),
                feature: segment.as_ref().to_string(),
                declared_class: None,
            });
        }
        expr.unwrap_or(Expr::Source {
            text: String::new(),
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => match value {
                Literal::Number(n) => f.write_str(n),
                Literal::String(s) => write!(f, "{s:?}"),
                Literal::Bool(b) => write!(f, "{b}"),
                Literal::Null => f.write_str("null"),
            },
            Expr::FeatureCall {
                receiver, feature, ..
            } => match receiver {
                Some(receiver) => write!(f, "{receiver}.{feature}"),
                None => f.write_str(feature),
            },
            Expr::Source { text } => f.write_str(text),
        }
    }
}

/// Relational operator of a specifier leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationalOp {
    Above,
    Below,
    Equal,
}

impl RelationalOp {
    /// Operator text in generated code.
    pub fn symbol(self) -> &'static str {
        match self {
            RelationalOp::Above => ">",
            RelationalOp::Below => "<",
            RelationalOp::Equal => "==",
        }
    }
}

/// Logical combinator of a specifier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationalLeaf {
    pub operator: RelationalOp,
    /// Threshold; must be a literal.
    pub value: Expr,
    #[serde(default)]
    pub percentage: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    pub operator: LogicalOp,
    pub left: Box<SpecifierNode>,
    pub right: Box<SpecifierNode>,
}

/// Boolean filter over a change event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpecifierNode {
    Relational(RelationalLeaf),
    Logical(LogicalNode),
}

impl SpecifierNode {
    pub fn leaf(operator: RelationalOp, value: Expr, percentage: bool) -> Self {
        SpecifierNode::Relational(RelationalLeaf {
            operator,
            value,
            percentage,
        })
    }

    pub fn and(left: SpecifierNode, right: SpecifierNode) -> Self {
        Self::logical(LogicalOp::And, left, right)
    }

    pub fn or(left: SpecifierNode, right: SpecifierNode) -> Self {
        Self::logical(LogicalOp::Or, left, right)
    }

    fn logical(operator: LogicalOp, left: SpecifierNode, right: SpecifierNode) -> Self {
        SpecifierNode::Logical(LogicalNode {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }
}
