//! Compiled filter evaluation

use std::borrow::Cow;

use contracts::{ContractError, Event, FilterPredicate};
use serde_json::Value;

use crate::ast::{CmpOp, Expr, Field, Literal};

/// Filter compiled from text, ready to be shared across workers
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    text: String,
    expr: Expr,
}

/// A resolved field value
#[derive(Debug, Clone, PartialEq)]
enum FieldValue<'a> {
    Num(f64),
    Text(Cow<'a, str>),
    Bool(bool),
    Null,
}

impl FieldValue<'_> {
    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Num(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s.as_ref()),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Null => Cow::Borrowed("null"),
        }
    }

    fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn from_json(value: Value) -> FieldValue<'static> {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Num)
                .unwrap_or_else(|| FieldValue::Text(Cow::Owned(n.to_string()))),
            Value::String(s) => FieldValue::Text(Cow::Owned(s)),
            other => FieldValue::Text(Cow::Owned(other.to_string())),
        }
    }
}

impl CompiledFilter {
    pub(crate) fn new(text: &str, expr: Expr) -> Self {
        Self {
            text: text.to_string(),
            expr,
        }
    }

    /// Parsed expression tree
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    fn eval(expr: &Expr, event: &mut Event) -> Result<bool, ContractError> {
        match expr {
            Expr::And(lhs, rhs) => Ok(Self::eval(lhs, event)? && Self::eval(rhs, event)?),
            Expr::Or(lhs, rhs) => Ok(Self::eval(lhs, event)? || Self::eval(rhs, event)?),
            Expr::Not(inner) => Ok(!Self::eval(inner, event)?),
            Expr::Exists(field) => Ok(Self::resolve(field, event)?.is_some()),
            Expr::Compare { field, op, value } => match Self::resolve(field, event)? {
                Some(actual) => Self::compare(field, &actual, *op, value),
                None => Ok(false),
            },
            Expr::In { field, values } => match Self::resolve(field, event)? {
                Some(actual) => Ok(values.iter().any(|v| Self::equals(&actual, v))),
                None => Ok(false),
            },
        }
    }

    /// Resolve a field; `Ok(None)` when the field is absent on this event
    fn resolve<'e>(
        field: &Field,
        event: &'e mut Event,
    ) -> Result<Option<FieldValue<'e>>, ContractError> {
        let value = match field {
            Field::Num => FieldValue::Num(event.num as f64),
            Field::SourceId => FieldValue::Num(f64::from(event.source_id)),
            Field::Len => FieldValue::Num(event.payload.len() as f64),
            Field::Payload => FieldValue::Text(event.payload_str()),
            Field::Source => match event.source_info() {
                Some(info) => FieldValue::Text(Cow::Borrowed(info.name.as_str())),
                None => return Ok(None),
            },
            Field::EventSource => match event.source_info() {
                Some(info) => FieldValue::Text(Cow::Borrowed(info.event_source.as_str())),
                None => return Ok(None),
            },
            Field::Json(path) => {
                let fields = event.fields()?;
                let Some((first, rest)) = path.split_first() else {
                    return Ok(None);
                };
                let mut current = match fields.get(first) {
                    Some(v) => v,
                    None => return Ok(None),
                };
                for segment in rest {
                    current = match current.get(segment) {
                        Some(v) => v,
                        None => return Ok(None),
                    };
                }
                FieldValue::from_json(current.clone())
            }
        };
        Ok(Some(value))
    }

    fn equals(actual: &FieldValue<'_>, expected: &Literal) -> bool {
        match (actual, expected) {
            (FieldValue::Num(a), Literal::Num(b)) => a == b,
            (FieldValue::Bool(a), Literal::Bool(b)) => a == b,
            (FieldValue::Text(a), Literal::Num(b)) => {
                a.trim().parse::<f64>().is_ok_and(|a| a == *b)
            }
            _ => actual.as_text() == expected.to_string(),
        }
    }

    fn compare(
        field: &Field,
        actual: &FieldValue<'_>,
        op: CmpOp,
        expected: &Literal,
    ) -> Result<bool, ContractError> {
        match op {
            CmpOp::Eq => Ok(Self::equals(actual, expected)),
            CmpOp::Ne => Ok(!Self::equals(actual, expected)),
            CmpOp::Contains => Ok(actual.as_text().contains(&expected.to_string())),
            CmpOp::StartsWith => Ok(actual.as_text().starts_with(&expected.to_string())),
            CmpOp::EndsWith => Ok(actual.as_text().ends_with(&expected.to_string())),
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                let Literal::Num(rhs) = expected else {
                    return Err(ContractError::type_mismatch(
                        field.to_string(),
                        format!("ordering against non-numeric operand '{expected}'"),
                    ));
                };
                let lhs = actual.as_num().ok_or_else(|| {
                    ContractError::type_mismatch(
                        field.to_string(),
                        format!("value '{}' is not numeric", actual.as_text()),
                    )
                })?;
                Ok(match op {
                    CmpOp::Lt => lhs < *rhs,
                    CmpOp::Le => lhs <= *rhs,
                    CmpOp::Gt => lhs > *rhs,
                    _ => lhs >= *rhs,
                })
            }
        }
    }
}

impl FilterPredicate for CompiledFilter {
    fn evaluate(&self, event: &mut Event) -> Result<bool, ContractError> {
        Self::eval(&self.expr, event)
    }

    fn source_text(&self) -> &str {
        &self.text
    }
}
