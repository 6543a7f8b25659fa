//! Specifier compilation.
//!
//! A specifier tree becomes one constant decimal field per relational leaf
//! (`threshold_0`, `threshold_1`, ... in left-to-right order) and a boolean
//! expression over the change event that reads those fields.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::diagnostic::CompilerError;
use crate::ir::{Expr, Literal, SpecifierNode};
use crate::target::{Field, FieldInit, FieldType, NameGen, PredicateExpr, SpecifierPredicate};

/// Output of [`compile_specifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSpecifier {
    /// Threshold fields in creation order.
    pub fields: Vec<Field>,
    pub expr: PredicateExpr,
    /// `expr` rendered over the event variable it was compiled for.
    pub source: String,
}

impl CompiledSpecifier {
    /// Threshold values by field name.
    pub fn thresholds(&self) -> BTreeMap<String, Decimal> {
        self.fields
            .iter()
            .filter_map(|field| match &field.init {
                Some(FieldInit::Decimal { value }) => Some((field.name.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    /// The runtime predicate this specifier lowers to.
    pub fn predicate(&self) -> SpecifierPredicate {
        SpecifierPredicate::new(self.expr.clone(), self.thresholds())
    }
}

/// Compiles `node` into threshold fields and a boolean expression over the
/// change event bound to `event_var`.
///
/// Fails with [`CompilerError::InvalidThreshold`] when a leaf compares against
/// anything but a numeric literal.
pub fn compile_specifier(
    node: &SpecifierNode,
    event_var: &str,
    names: &mut NameGen,
) -> Result<CompiledSpecifier, CompilerError> {
    let mut fields = Vec::new();
    let expr = compile_node(node, names, &mut fields)?;
    let source = expr.render(event_var);
    Ok(CompiledSpecifier {
        fields,
        expr,
        source,
    })
}

fn compile_node(
    node: &SpecifierNode,
    names: &mut NameGen,
    fields: &mut Vec<Field>,
) -> Result<PredicateExpr, CompilerError> {
    match node {
        SpecifierNode::Relational(leaf) => {
            let value = threshold_value(&leaf.value)?;
            let name = names.fresh("threshold");
            fields.push(
                Field::new(name.clone(), FieldType::Threshold)
                    .with_init(FieldInit::Decimal { value }),
            );
            Ok(PredicateExpr::Compare {
                operator: leaf.operator,
                threshold: name,
                percentage: leaf.percentage,
            })
        }
        SpecifierNode::Logical(logical) => {
            let left = compile_node(&logical.left, names, fields)?;
            let right = compile_node(&logical.right, names, fields)?;
            Ok(PredicateExpr::Logical {
                operator: logical.operator,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    }
}

/// Decimal value of a threshold literal. Numeric strings are accepted.
fn threshold_value(expr: &Expr) -> Result<Decimal, CompilerError> {
    let invalid = || CompilerError::InvalidThreshold {
        found: expr.to_string(),
    };
    let text = match expr {
        Expr::Literal {
            value: Literal::Number(text) | Literal::String(text),
        } => text.trim(),
        _ => return Err(invalid()),
    };
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RelationalOp;
    use serde_json::json;
    use vigil_runtime::event::ChangeEvent;

    fn leaf(op: RelationalOp, value: &str) -> SpecifierNode {
        SpecifierNode::leaf(op, Expr::number(value), false)
    }

    fn pct(op: RelationalOp, value: &str) -> SpecifierNode {
        SpecifierNode::leaf(op, Expr::number(value), true)
    }

    fn compile(node: &SpecifierNode) -> CompiledSpecifier {
        compile_specifier(node, "event", &mut NameGen::new()).unwrap()
    }

    fn change(previous: serde_json::Value, current: serde_json::Value) -> ChangeEvent {
        ChangeEvent::new("load", previous, current)
    }

    #[test]
    fn single_leaf_renders_decimal_comparison() {
        let compiled = compile(&leaf(RelationalOp::Above, "10"));
        assert_eq!(compiled.source, "numeric(&event.current)? > self.threshold_0");
        assert_eq!(compiled.fields.len(), 1);
        assert_eq!(compiled.fields[0].ty, FieldType::Threshold);
        assert!(compiled.fields[0].constant);
        assert_eq!(
            compiled.fields[0].init,
            Some(FieldInit::Decimal {
                value: Decimal::from(10)
            })
        );
    }

    #[test]
    fn relational_operators_compare_decimals() {
        let above = compile(&leaf(RelationalOp::Above, "10")).predicate();
        let below = compile(&leaf(RelationalOp::Below, "10")).predicate();
        let equal = compile(&leaf(RelationalOp::Equal, "10")).predicate();

        assert!(above.apply(&change(json!(0), json!("10.5"))).unwrap());
        assert!(!above.apply(&change(json!(0), json!(10))).unwrap());
        assert!(below.apply(&change(json!(0), json!(9.99))).unwrap());
        assert!(!below.apply(&change(json!(0), json!(10))).unwrap());
        assert!(equal.apply(&change(json!(0), json!("10.0"))).unwrap());
        assert!(equal.apply(&change(json!(0), json!(10))).unwrap());
    }

    #[test]
    fn percentage_compares_relative_change() {
        let prev_100_cur_90 = change(json!(100), json!(90));
        let five = compile(&pct(RelationalOp::Above, "5")).predicate();
        let twenty = compile(&pct(RelationalOp::Above, "20")).predicate();
        assert!(five.apply(&prev_100_cur_90).unwrap());
        assert!(!twenty.apply(&prev_100_cur_90).unwrap());

        let source = compile(&pct(RelationalOp::Above, "5")).source;
        assert_eq!(
            source,
            "change_delta(&event.previous, &event.current)? > percentage_of(&event.previous, self.threshold_0)?"
        );
    }

    #[test]
    fn percentage_overflow_is_an_error() {
        let five = compile(&pct(RelationalOp::Above, "5")).predicate();
        let extremes = change(json!(Decimal::MAX.to_string()), json!(Decimal::MIN.to_string()));
        assert!(matches!(
            five.apply(&extremes),
            Err(vigil_runtime::Error::Overflow(_))
        ));
        assert!(five.apply(&change(json!(100), json!(3))).unwrap());
    }

    #[test]
    fn logical_nodes_follow_truth_tables() {
        let above_5 = || leaf(RelationalOp::Above, "5");
        let below_8 = || leaf(RelationalOp::Below, "8");
        let and = compile(&SpecifierNode::and(above_5(), below_8())).predicate();
        let or = compile(&SpecifierNode::or(above_5(), below_8())).predicate();

        // (above 5, below 8) per value: 6 -> (t, t), 9 -> (t, f), 4 -> (f, t)
        assert!(and.apply(&change(json!(0), json!(6))).unwrap());
        assert!(!and.apply(&change(json!(0), json!(9))).unwrap());
        assert!(!and.apply(&change(json!(0), json!(4))).unwrap());
        assert!(or.apply(&change(json!(0), json!(6))).unwrap());
        assert!(or.apply(&change(json!(0), json!(9))).unwrap());
        assert!(or.apply(&change(json!(0), json!(4))).unwrap());

        let never = compile(&SpecifierNode::and(
            leaf(RelationalOp::Above, "8"),
            leaf(RelationalOp::Below, "5"),
        ))
        .predicate();
        let either = compile(&SpecifierNode::or(
            leaf(RelationalOp::Above, "8"),
            leaf(RelationalOp::Below, "5"),
        ))
        .predicate();
        assert!(!never.apply(&change(json!(0), json!(6))).unwrap());
        assert!(!either.apply(&change(json!(0), json!(6))).unwrap());
    }

    #[test]
    fn thresholds_are_numbered_left_to_right() {
        let node = SpecifierNode::or(
            SpecifierNode::and(leaf(RelationalOp::Above, "1"), leaf(RelationalOp::Below, "2")),
            leaf(RelationalOp::Equal, "3"),
        );
        let compiled = compile(&node);
        let names: Vec<_> = compiled.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["threshold_0", "threshold_1", "threshold_2"]);
        assert_eq!(compiled.expr.thresholds(), names);
        assert_eq!(
            compiled.source,
            "numeric(&event.current)? > self.threshold_0 && numeric(&event.current)? < self.threshold_1 || numeric(&event.current)? == self.threshold_2"
        );
    }

    #[test]
    fn counters_continue_across_specifiers_of_one_declaration() {
        let mut names = NameGen::new();
        compile_specifier(&leaf(RelationalOp::Above, "1"), "e", &mut names).unwrap();
        let second = compile_specifier(&leaf(RelationalOp::Above, "1"), "e", &mut names).unwrap();
        assert_eq!(second.fields[0].name, "threshold_1");
    }

    #[test]
    fn nested_logic_is_not_parenthesized() {
        // a AND (b OR c) renders as `a && b || c`, which groups as (a && b) || c.
        let node = SpecifierNode::and(
            leaf(RelationalOp::Above, "100"),
            SpecifierNode::or(leaf(RelationalOp::Below, "0"), leaf(RelationalOp::Equal, "7")),
        );
        let compiled = compile(&node);
        assert_eq!(
            compiled.source,
            "numeric(&event.current)? > self.threshold_0 && numeric(&event.current)? < self.threshold_1 || numeric(&event.current)? == self.threshold_2"
        );

        // a = false, b = false, c = true
        let predicate = compiled.predicate();
        assert!(predicate.apply(&change(json!(0), json!(7))).unwrap());
    }

    #[test]
    fn non_literal_thresholds_are_rejected() {
        let node = SpecifierNode::leaf(RelationalOp::Above, Expr::chain(&["limits", "max"]), false);
        let err = compile_specifier(&node, "event", &mut NameGen::new()).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidThreshold { found } if found == "limits.max"));

        let node = SpecifierNode::leaf(RelationalOp::Above, Expr::string("lots"), false);
        assert!(compile_specifier(&node, "event", &mut NameGen::new()).is_err());
    }

    #[test]
    fn string_and_scientific_thresholds() {
        let compiled = compile(&SpecifierNode::leaf(RelationalOp::Equal, Expr::string(" 90.5 "), false));
        assert_eq!(compiled.thresholds()["threshold_0"], Decimal::from_str("90.5").unwrap());
        let compiled = compile(&leaf(RelationalOp::Equal, "1e2"));
        assert_eq!(compiled.thresholds()["threshold_0"], Decimal::from(100));
    }

    #[test]
    fn predicates_never_compare_equal() {
        let predicate = compile(&leaf(RelationalOp::Above, "1")).predicate();
        assert!(predicate != predicate.clone());
    }
}
