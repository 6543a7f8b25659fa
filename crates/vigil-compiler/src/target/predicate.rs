//! Compiled specifier predicates.
//!
//! A [`PredicateExpr`] is the boolean body of a generated predicate type. It
//! renders to Rust source and evaluates directly over a change event; both
//! agree on meaning, including the one that surprises: logical nodes are
//! joined without parentheses, so evaluation follows Rust precedence (`&&`
//! binds tighter than `||`) rather than the shape of the source tree.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use vigil_runtime::event::ChangeEvent;
use vigil_runtime::source::Predicate;
use vigil_runtime::value::{change_delta, numeric, percentage_of};

use crate::ir::{LogicalOp, RelationalOp};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PredicateExpr {
    /// Compares the event against the threshold field `threshold`.
    Compare {
        operator: RelationalOp,
        threshold: String,
        percentage: bool,
    },
    Logical {
        operator: LogicalOp,
        left: Box<PredicateExpr>,
        right: Box<PredicateExpr>,
    },
}

enum Token<'a> {
    Compare(&'a PredicateExpr),
    Op(LogicalOp),
}

impl PredicateExpr {
    /// Rust source of the expression over the change event bound to `event`.
    pub fn render(&self, event: &str) -> String {
        match self {
            PredicateExpr::Compare {
                operator,
                threshold,
                percentage: false,
            } => format!(
                "numeric(&{event}.current)? {} self.{threshold}",
                operator.symbol()
            ),
            PredicateExpr::Compare {
                operator,
                threshold,
                percentage: true,
            } => format!(
                "change_delta(&{event}.previous, &{event}.current)? {} percentage_of(&{event}.previous, self.{threshold})?",
                operator.symbol()
            ),
            PredicateExpr::Logical {
                operator,
                left,
                right,
            } => format!(
                "{} {} {}",
                left.render(event),
                operator.symbol(),
                right.render(event)
            ),
        }
    }

    /// Threshold field names, left to right.
    pub fn thresholds(&self) -> Vec<&str> {
        self.tokens()
            .into_iter()
            .filter_map(|token| match token {
                Token::Compare(PredicateExpr::Compare { threshold, .. }) => Some(threshold.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Evaluates the rendered expression.
    ///
    /// The tree is flattened in order and regrouped into `||`-separated runs
    /// of `&&` terms, evaluated left to right with short-circuiting, exactly
    /// like the rendered source.
    pub fn evaluate(
        &self,
        event: &ChangeEvent,
        thresholds: &BTreeMap<String, Decimal>,
    ) -> vigil_runtime::Result<bool> {
        let tokens = self.tokens();
        let mut groups: Vec<Vec<&PredicateExpr>> = vec![Vec::new()];
        for token in tokens {
            match token {
                Token::Compare(leaf) => {
                    if let Some(group) = groups.last_mut() {
                        group.push(leaf);
                    }
                }
                Token::Op(LogicalOp::And) => {}
                Token::Op(LogicalOp::Or) => groups.push(Vec::new()),
            }
        }

        for group in &groups {
            let mut all = true;
            for leaf in group {
                if !compare(leaf, event, thresholds)? {
                    all = false;
                    break;
                }
            }
            if all {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn tokens(&self) -> Vec<Token<'_>> {
        let mut out = Vec::new();
        self.flatten(&mut out);
        out
    }

    fn flatten<'a>(&'a self, out: &mut Vec<Token<'a>>) {
        match self {
            PredicateExpr::Compare { .. } => out.push(Token::Compare(self)),
            PredicateExpr::Logical {
                operator,
                left,
                right,
            } => {
                left.flatten(out);
                out.push(Token::Op(*operator));
                right.flatten(out);
            }
        }
    }
}

fn compare(
    leaf: &PredicateExpr,
    event: &ChangeEvent,
    thresholds: &BTreeMap<String, Decimal>,
) -> vigil_runtime::Result<bool> {
    let PredicateExpr::Compare {
        operator,
        threshold,
        percentage,
    } = leaf
    else {
        return Ok(false);
    };
    let threshold = thresholds.get(threshold).copied().ok_or_else(|| {
        vigil_runtime::Error::UnknownMember {
            kind: "threshold",
            name: threshold.clone(),
        }
    })?;

    let (lhs, rhs) = if *percentage {
        (
            change_delta(&event.previous, &event.current)?,
            percentage_of(&event.previous, threshold)?,
        )
    } else {
        (numeric(&event.current)?, threshold)
    };

    Ok(match operator {
        RelationalOp::Above => lhs > rhs,
        RelationalOp::Below => lhs < rhs,
        RelationalOp::Equal => lhs == rhs,
    })
}

/// Runtime predicate built from a generated predicate type.
///
/// Two predicates never compare equal, not even with themselves.
#[derive(Debug, Clone)]
pub struct SpecifierPredicate {
    expr: PredicateExpr,
    thresholds: BTreeMap<String, Decimal>,
}

impl SpecifierPredicate {
    pub fn new(expr: PredicateExpr, thresholds: BTreeMap<String, Decimal>) -> Self {
        Self { expr, thresholds }
    }

    pub fn apply(&self, event: &ChangeEvent) -> vigil_runtime::Result<bool> {
        self.expr.evaluate(event, &self.thresholds)
    }
}

impl PartialEq for SpecifierPredicate {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl Predicate for SpecifierPredicate {
    fn test(&self, event: &ChangeEvent) -> vigil_runtime::Result<bool> {
        self.apply(event)
    }
}
