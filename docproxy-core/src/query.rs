//! Filter expressions for record lookups.
//!
//! Conditions travel to the store as filter documents (`{ "color": "red" }`,
//! `{ "count": { "$gt": 3 } }`). This module offers a typed way to build them
//! and a parsed form that backends without a native query engine can evaluate.
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of`, `none_of`
//! - Logical: `and`, `or`
//!
//! ```ignore
//! use docproxy::query::Filter;
//! use bson::Document;
//!
//! let filter: Document = Filter::eq("color", "red").and(Filter::gt("count", 3)).into();
//! ```

use std::convert::Infallible;

use bson::{Bson, Document, doc};

use crate::error::{DocumentStoreError, DocumentStoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    AnyOf,
    NoneOf,
}

impl FieldOp {
    fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }

    fn from_operator(operator: &str) -> Option<Self> {
        Some(match operator {
            "$eq" => FieldOp::Eq,
            "$ne" => FieldOp::Ne,
            "$gt" => FieldOp::Gt,
            "$gte" => FieldOp::Gte,
            "$lt" => FieldOp::Lt,
            "$lte" => FieldOp::Lte,
            "$in" => FieldOp::AnyOf,
            "$nin" => FieldOp::NoneOf,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Parses a filter document. An empty document matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] for unknown operators or
    /// malformed operands.
    pub fn parse(filter: &Document) -> DocumentStoreResult<Self> {
        let mut clauses = filter
            .iter()
            .map(|(key, value)| match key.as_str() {
                "$and" => Ok(Expr::And(parse_clauses(key, value)?)),
                "$or" => Ok(Expr::Or(parse_clauses(key, value)?)),
                "$nor" => Ok(Expr::Or(parse_clauses(key, value)?).not()),
                operator if operator.starts_with('$') => Err(DocumentStoreError::InvalidDocument(
                    format!("unsupported top-level operator `{operator}`"),
                )),
                field => parse_field(field, value),
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        Ok(match clauses.len() {
            1 => clauses.remove(0),
            _ => Expr::And(clauses),
        })
    }

    /// Renders this expression as a filter document.
    pub fn to_document(&self) -> Document {
        match FilterRenderer.visit_expr(self) {
            Ok(document) => document,
            Err(never) => match never {},
        }
    }
}

impl From<Expr> for Document {
    fn from(expr: Expr) -> Self {
        expr.to_document()
    }
}

fn parse_clauses(operator: &str, value: &Bson) -> DocumentStoreResult<Vec<Expr>> {
    match value {
        Bson::Array(items) => items
            .iter()
            .map(|item| match item {
                Bson::Document(clause) => Expr::parse(clause),
                other => Err(DocumentStoreError::InvalidDocument(format!(
                    "`{operator}` expects documents, got {other}"
                ))),
            })
            .collect(),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "`{operator}` expects an array, got {other}"
        ))),
    }
}

fn parse_field(field: &str, value: &Bson) -> DocumentStoreResult<Expr> {
    let operators = match value {
        Bson::Document(operators)
            if !operators.is_empty() && operators.keys().all(|key| key.starts_with('$')) =>
        {
            operators
        }
        _ => return Ok(Expr::field(field.to_string(), FieldOp::Eq, value.clone())),
    };

    let mut clauses = operators
        .iter()
        .map(|(operator, operand)| match operator.as_str() {
            "$exists" => match operand {
                Bson::Boolean(should_exist) => Ok(Expr::Exists(field.to_string(), *should_exist)),
                other => Err(DocumentStoreError::InvalidDocument(format!(
                    "`$exists` expects a boolean, got {other}"
                ))),
            },
            "$not" => Ok(parse_field(field, operand)?.not()),
            "$in" | "$nin" if !matches!(operand, Bson::Array(_)) => {
                Err(DocumentStoreError::InvalidDocument(format!(
                    "`{operator}` expects an array, got {operand}"
                )))
            }
            operator => match FieldOp::from_operator(operator) {
                Some(op) => Ok(Expr::field(field.to_string(), op, operand.clone())),
                None => Err(DocumentStoreError::InvalidDocument(format!(
                    "unsupported field operator `{operator}`"
                ))),
            },
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => Expr::And(clauses),
    })
}

pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn any_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, value.into())
    }

    pub fn none_of(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, value.into())
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Renders expressions into MongoDB-style filter documents.
struct FilterRenderer;

impl QueryVisitor for FilterRenderer {
    type Output = Document;
    type Error = Infallible;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        // An empty conjunction matches everything.
        if exprs.is_empty() {
            return Ok(Document::new());
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { op.operator(): value.clone() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_equality() {
        assert_eq!(
            Expr::parse(&doc! { "color": "red" }).unwrap(),
            Filter::eq("color", "red")
        );
    }

    #[test]
    fn test_parse_empty_matches_everything() {
        let expr = Expr::parse(&doc! {}).unwrap();

        assert_eq!(expr, Expr::And(vec![]));
        assert_eq!(expr.to_document(), doc! {});
    }

    #[test]
    fn test_parse_operators() {
        let expr = Expr::parse(&doc! {
            "count": { "$gt": 1, "$lte": 5 },
            "tags": { "$in": ["a", "b"] },
            "gone": { "$exists": false },
        })
        .unwrap();

        assert_eq!(
            expr,
            Expr::And(vec![
                Expr::And(vec![Filter::gt("count", 1), Filter::lte("count", 5)]),
                Filter::any_of("tags", vec!["a", "b"]),
                Filter::not_exists("gone"),
            ])
        );
    }

    #[test]
    fn test_parse_embedded_document_is_equality() {
        let expr = Expr::parse(&doc! { "size": { "w": 1 } }).unwrap();

        assert_eq!(expr, Filter::eq("size", doc! { "w": 1 }));
    }

    #[test]
    fn test_parse_rejects_unknown_operator() {
        assert!(matches!(
            Expr::parse(&doc! { "name": { "$regex": "^a" } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_rendered_filter_parses_back() {
        let expr = Filter::or([
            Filter::eq("color", "red"),
            Filter::gte("count", 3).and(Filter::exists("tags")),
        ]);
        let rendered = expr.to_document();

        assert_eq!(Expr::parse(&rendered).unwrap(), expr);
    }

    #[test]
    fn test_not_renders_as_nor() {
        let rendered = Document::from(Filter::eq("color", "red").not());

        assert_eq!(rendered, doc! { "$nor": [{ "color": { "$eq": "red" } }] });
        assert_eq!(
            Expr::parse(&rendered).unwrap(),
            Expr::Or(vec![Filter::eq("color", "red")]).not()
        );
    }
}
