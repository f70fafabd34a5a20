//! Filter evaluation for in-memory document matching.
//!
//! This module provides the evaluation engine for filter expressions and the
//! ordering used when sorting query results.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use docproxy_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 and symbols compare as strings. Kinds
/// without a natural ordering (binary, decimal, object ids, ...) only support
/// equality.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) | Bson::Symbol(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of this value's kind in the cross-type sort order.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Other(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Total ordering used for sorting; missing fields sort as null.
pub(crate) fn sort_order(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    let left = left.map(Comparable::from).unwrap_or(Comparable::Null);
    let right = right.map(Comparable::from).unwrap_or(Comparable::Null);

    left.type_rank()
        .cmp(&right.type_rank())
        .then_with(|| left.partial_cmp(&right).unwrap_or(Ordering::Equal))
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }
}

/// Equality with array membership: an array field equals a scalar it contains.
fn matches_eq(field_value: &Bson, value: &Bson) -> bool {
    let left = Comparable::from(field_value);
    let right = Comparable::from(value);

    if left == right {
        return true;
    }

    match left {
        Comparable::Array(items) => items.iter().any(|item| item == &right),
        _ => false,
    }
}

/// Ordered comparison; an array field matches if any of its elements does.
fn matches_ordering(field_value: &Bson, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let right = Comparable::from(value);

    match Comparable::from(field_value) {
        Comparable::Array(items) => items
            .iter()
            .any(|item| item.partial_cmp(&right).is_some_and(&accept)),
        left => left.partial_cmp(&right).is_some_and(accept),
    }
}

fn candidates(value: &Bson) -> &[Bson] {
    match value {
        Bson::Array(values) => values,
        single => std::slice::from_ref(single),
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.document.contains_key(field) == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let Some(field_value) = self.document.get(field) else {
            // A missing field behaves like null.
            return Ok(match op {
                FieldOp::Eq => matches!(value, Bson::Null),
                FieldOp::Ne => !matches!(value, Bson::Null),
                FieldOp::AnyOf => candidates(value).contains(&Bson::Null),
                FieldOp::NoneOf => !candidates(value).contains(&Bson::Null),
                _ => false,
            });
        };

        Ok(match op {
            FieldOp::Eq => matches_eq(field_value, value),
            FieldOp::Ne => !matches_eq(field_value, value),
            FieldOp::Gt => matches_ordering(field_value, value, |ordering| ordering == Ordering::Greater),
            FieldOp::Gte => matches_ordering(field_value, value, |ordering| ordering != Ordering::Less),
            FieldOp::Lt => matches_ordering(field_value, value, |ordering| ordering == Ordering::Less),
            FieldOp::Lte => matches_ordering(field_value, value, |ordering| ordering != Ordering::Greater),
            FieldOp::AnyOf => candidates(value)
                .iter()
                .any(|candidate| matches_eq(field_value, candidate)),
            FieldOp::NoneOf => !candidates(value)
                .iter()
                .any(|candidate| matches_eq(field_value, candidate)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: &Document, filter: Document) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&Expr::parse(&filter).unwrap())
            .unwrap()
    }

    #[test]
    fn test_equality_and_array_membership() {
        let document = doc! { "color": "red", "tags": ["a", "b"] };

        assert!(matches(&document, doc! { "color": "red" }));
        assert!(!matches(&document, doc! { "color": "blue" }));
        assert!(matches(&document, doc! { "tags": "a" }));
        assert!(matches(&document, doc! { "tags": ["a", "b"] }));
        assert!(!matches(&document, doc! { "tags": "c" }));
    }

    #[test]
    fn test_numeric_comparisons_across_widths() {
        let document = doc! { "count": 3i64 };

        assert!(matches(&document, doc! { "count": 3 }));
        assert!(matches(&document, doc! { "count": { "$gt": 2.5 } }));
        assert!(matches(&document, doc! { "count": { "$gte": 3, "$lt": 4 } }));
        assert!(!matches(&document, doc! { "count": { "$lt": "z" } }));
    }

    #[test]
    fn test_missing_field_behaves_like_null() {
        let document = doc! { "color": "red" };

        assert!(matches(&document, doc! { "size": null }));
        assert!(matches(&document, doc! { "size": { "$ne": 1 } }));
        assert!(matches(&document, doc! { "size": { "$nin": [1, 2] } }));
        assert!(!matches(&document, doc! { "size": { "$gt": 1 } }));
        assert!(matches(&document, doc! { "size": { "$exists": false } }));
    }

    #[test]
    fn test_logical_operators() {
        let document = doc! { "color": "red", "count": 1 };

        assert!(matches(&document, doc! { "$or": [{ "color": "blue" }, { "count": 1 }] }));
        assert!(!matches(&document, doc! { "$and": [{ "color": "blue" }, { "count": 1 }] }));
        assert!(matches(&document, doc! { "$nor": [{ "color": "blue" }] }));
        assert!(matches(&document, doc! { "count": { "$not": { "$gt": 5 } } }));
    }

    #[test]
    fn test_sort_order_ranks_types() {
        let number = Bson::Int32(5);
        let string = Bson::String("a".to_string());

        assert_eq!(sort_order(None, Some(&number)), Ordering::Less);
        assert_eq!(sort_order(Some(&string), Some(&number)), Ordering::Greater);
        assert_eq!(sort_order(Some(&Bson::Double(5.0)), Some(&number)), Ordering::Equal);
    }
}
