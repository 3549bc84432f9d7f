//! Stack-based morph formulas.
//!
//! A formula is a short postfix program. `push` places a literal (or the
//! current value of a referenced morph) on the stack and each arithmetic
//! operation pops two operands `a` (top) and `b` and pushes `a OP b`. The top
//! of the stack is the result.

use serde_json::Value;
use thiserror::Error;

use crate::diagnostics::UNRESOLVED_OPERAND_VALUE;
use crate::document::raw::{RawFormula, RawOperation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("stack underflow at operation {0}")]
    StackUnderflow(usize),

    #[error("unsupported operation '{0}'")]
    Unsupported(String),

    #[error("no result on the stack")]
    EmptyStack,
}

pub type FormulaResult<T> = Result<T, FormulaError>;

/// How results targeting the same output combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Sum,
    Mult,
}

impl Stage {
    /// Anything other than `sum` multiplies.
    pub fn parse(s: &str) -> Stage {
        if s == "sum" {
            Stage::Sum
        } else {
            Stage::Mult
        }
    }

    pub fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Stage::Sum => acc + value,
            Stage::Mult => acc * value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Push `value`, or the value `url` resolves to when present.
    Push { value: f64, url: Option<String> },
    Add,
    Sub,
    Mult,
    Div,
    Unsupported(String),
}

impl Operation {
    pub fn from_raw(raw: &RawOperation) -> Operation {
        match raw.op.as_str() {
            "push" => Operation::Push {
                value: raw.val.as_ref().and_then(Value::as_f64).unwrap_or(0.0),
                url: raw.url.clone().filter(|u| !u.is_empty()),
            },
            "add" => Operation::Add,
            "sub" => Operation::Sub,
            "mult" => Operation::Mult,
            "div" => Operation::Div,
            other => Operation::Unsupported(other.to_string()),
        }
    }

    fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Operation::Add => a + b,
            Operation::Sub => a - b,
            Operation::Mult => a * b,
            Operation::Div => a / b,
            Operation::Push { .. } | Operation::Unsupported(_) => a,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    /// Reference to the property this formula drives.
    pub output: String,
    pub operations: Vec<Operation>,
    pub stage: Stage,
}

/// Result of running a formula.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    /// Push references that did not resolve; each contributed
    /// [`UNRESOLVED_OPERAND_VALUE`].
    pub unresolved: Vec<String>,
}

impl Formula {
    pub fn from_raw(raw: &RawFormula) -> Formula {
        Formula {
            output: raw.output.clone(),
            operations: raw.operations.iter().map(Operation::from_raw).collect(),
            stage: raw.stage.as_deref().map(Stage::parse).unwrap_or_default(),
        }
    }

    /// Name of the first operation the evaluator does not implement.
    pub fn unsupported_operation(&self) -> Option<&str> {
        self.operations.iter().find_map(|op| match op {
            Operation::Unsupported(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Run the program. `resolve` maps a push reference to a value.
    pub fn evaluate(&self, mut resolve: impl FnMut(&str) -> Option<f64>) -> FormulaResult<Evaluation> {
        let mut stack: Vec<f64> = Vec::with_capacity(self.operations.len());
        let mut unresolved = Vec::new();

        for (i, op) in self.operations.iter().enumerate() {
            match op {
                Operation::Push { value, url: None } => stack.push(*value),
                Operation::Push { url: Some(url), .. } => match resolve(url) {
                    Some(v) => stack.push(v),
                    None => {
                        unresolved.push(url.clone());
                        stack.push(UNRESOLVED_OPERAND_VALUE);
                    }
                },
                Operation::Unsupported(name) => return Err(FormulaError::Unsupported(name.clone())),
                arith => {
                    let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                        return Err(FormulaError::StackUnderflow(i));
                    };
                    stack.push(arith.apply(a, b));
                }
            }
        }

        let value = stack.pop().ok_or(FormulaError::EmptyStack)?;
        if !stack.is_empty() {
            log::debug!("{}: {} operands left on the stack", self.output, stack.len());
        }
        Ok(Evaluation { value, unresolved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn push(value: f64) -> Operation {
        Operation::Push { value, url: None }
    }

    fn formula(operations: Vec<Operation>) -> Formula {
        Formula {
            output: "hip:#hip?rotation/x".to_string(),
            operations,
            stage: Stage::Sum,
        }
    }

    #[test]
    fn test_top_operand_comes_first() {
        let f = formula(vec![push(3.0), push(10.0), Operation::Sub]);
        let result = f.evaluate(|_| None).unwrap();
        assert!((result.value - 7.0).abs() < EPS);
        assert!(result.unresolved.is_empty());

        let f = formula(vec![push(2.0), push(10.0), Operation::Div]);
        assert!((f.evaluate(|_| None).unwrap().value - 5.0).abs() < EPS);
    }

    #[test]
    fn test_push_resolves_morph_value() {
        let f = formula(vec![
            Operation::Push {
                value: 0.0,
                url: Some("body:#PBMNavel?value".to_string()),
            },
            push(15.0),
            Operation::Mult,
        ]);
        let result = f.evaluate(|url| url.contains("PBMNavel").then_some(0.5)).unwrap();
        assert!((result.value - 7.5).abs() < EPS);
    }

    #[test]
    fn test_unresolved_push_uses_sentinel() {
        let f = formula(vec![Operation::Push {
            value: 1.0,
            url: Some("lThigh:#lThigh?rotation/x".to_string()),
        }]);
        let result = f.evaluate(|_| None).unwrap();
        assert!((result.value - UNRESOLVED_OPERAND_VALUE).abs() < EPS);
        assert_eq!(result.unresolved, vec!["lThigh:#lThigh?rotation/x".to_string()]);
    }

    #[test]
    fn test_malformed_programs() {
        assert_eq!(
            formula(vec![push(1.0), Operation::Add]).evaluate(|_| None),
            Err(FormulaError::StackUnderflow(1))
        );
        assert_eq!(formula(vec![]).evaluate(|_| None), Err(FormulaError::EmptyStack));
    }

    #[test]
    fn test_parse_operations() {
        let raw: RawFormula = serde_json::from_str(
            r#"{ "output": "x:#x?value", "stage": "mult", "operations": [
                { "op": "push", "url": "y:#y?value" },
                { "op": "push", "val": 2 },
                { "op": "spline_tcb", "val": [[0, 0], [1, 1]] }
            ] }"#,
        )
        .unwrap();
        let f = Formula::from_raw(&raw);
        assert_eq!(f.stage, Stage::Mult);
        assert_eq!(f.operations[1], push(2.0));
        assert_eq!(f.unsupported_operation(), Some("spline_tcb"));
        assert_eq!(
            f.evaluate(|_| Some(1.0)),
            Err(FormulaError::Unsupported("spline_tcb".to_string()))
        );
    }

    #[test]
    fn test_stage_combine() {
        assert_eq!(Stage::parse("sum").combine(1.0, 2.0), 3.0);
        assert_eq!(Stage::parse("mult").combine(3.0, 2.0), 6.0);
        assert_eq!(Stage::parse("anything").combine(3.0, 2.0), 6.0);
    }
}
