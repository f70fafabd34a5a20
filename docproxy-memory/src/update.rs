//! Application of atomic update operators to stored documents.
//!
//! Supports `$set`, `$unset`, `$push` and `$inc` on top-level fields. An update
//! is applied to a copy of the document and only committed if every operator
//! succeeds.

use bson::{Bson, Document};

use docproxy_core::{
    backend::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Applies `update` to `document`, returning whether the document changed.
///
/// On error `document` is left untouched.
pub(crate) fn apply_update(document: &mut Document, update: &Document) -> DocumentStoreResult<bool> {
    if update.is_empty() {
        return Err(DocumentStoreError::InvalidDocument(
            "update document must not be empty".to_string(),
        ));
    }

    let mut updated = document.clone();

    for (operator, operand) in update {
        let Bson::Document(assignments) = operand else {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "operand of {operator} must be a document"
            )));
        };

        for (field, value) in assignments {
            if field == ID_FIELD {
                return Err(DocumentStoreError::StoreOperationFailed(format!(
                    "performing an update on '{ID_FIELD}' would modify an immutable field"
                )));
            }

            match operator.as_str() {
                "$set" => {
                    updated.insert(field.clone(), value.clone());
                }
                "$unset" => {
                    updated.remove(field);
                }
                "$push" => push(&mut updated, field, value)?,
                "$inc" => increment(&mut updated, field, value)?,
                other => {
                    return Err(DocumentStoreError::InvalidDocument(format!(
                        "unknown update operator {other}"
                    )));
                }
            }
        }
    }

    let modified = updated != *document;
    *document = updated;

    Ok(modified)
}

fn push(document: &mut Document, field: &str, value: &Bson) -> DocumentStoreResult<()> {
    match document.get_mut(field) {
        None => {
            document.insert(field, Bson::Array(vec![value.clone()]));
        }
        Some(Bson::Array(items)) => items.push(value.clone()),
        Some(other) => {
            return Err(DocumentStoreError::StoreOperationFailed(format!(
                "the field '{field}' must be an array but is of type {:?}",
                other.element_type()
            )));
        }
    }

    Ok(())
}

fn increment(document: &mut Document, field: &str, amount: &Bson) -> DocumentStoreResult<()> {
    if matches!(amount, Bson::Decimal128(_))
        || matches!(document.get(field), Some(Bson::Decimal128(_)))
    {
        return Err(DocumentStoreError::StoreOperationFailed(format!(
            "cannot apply $inc to '{field}': decimal128 arithmetic is not supported in memory"
        )));
    }

    if !is_numeric(amount) {
        return Err(DocumentStoreError::StoreOperationFailed(format!(
            "cannot increment with non-numeric argument {amount}"
        )));
    }

    let incremented = match document.get(field) {
        None => amount.clone(),
        Some(current) if is_numeric(current) => add(current, amount).ok_or_else(|| {
            DocumentStoreError::StoreOperationFailed(format!(
                "failed to apply $inc to '{field}': result out of range"
            ))
        })?,
        Some(other) => {
            return Err(DocumentStoreError::StoreOperationFailed(format!(
                "cannot apply $inc to '{field}' of non-numeric type {:?}",
                other.element_type()
            )));
        }
    };

    document.insert(field, incremented);

    Ok(())
}

fn is_numeric(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Adds two numbers, widening the way the server does: int32 overflows into
/// int64 and anything involving a double is a double.
fn add(current: &Bson, amount: &Bson) -> Option<Bson> {
    match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b)
                .map(Bson::Int32)
                .unwrap_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b))),
        ),
        (Bson::Double(_), _) | (_, Bson::Double(_)) => Some(Bson::Double(as_f64(current)? + as_f64(amount)?)),
        _ => as_i64(current)?.checked_add(as_i64(amount)?).map(Bson::Int64),
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_set_is_idempotent() {
        let mut document = doc! { "color": "blue" };

        assert!(apply_update(&mut document, &doc! { "$set": { "color": "red", "size": 2 } }).unwrap());
        assert!(!apply_update(&mut document, &doc! { "$set": { "color": "red", "size": 2 } }).unwrap());
        assert_eq!(document, doc! { "color": "red", "size": 2 });
    }

    #[test]
    fn test_unset_removes_field() {
        let mut document = doc! { "color": "blue", "size": 2 };

        apply_update(&mut document, &doc! { "$unset": { "color": "" } }).unwrap();

        assert_eq!(document, doc! { "size": 2 });
    }

    #[test]
    fn test_push_creates_and_appends() {
        let mut document = doc! {};

        apply_update(&mut document, &doc! { "$push": { "tags": "a" } }).unwrap();
        apply_update(&mut document, &doc! { "$push": { "tags": "b" } }).unwrap();

        assert_eq!(document, doc! { "tags": ["a", "b"] });
    }

    #[test]
    fn test_push_onto_scalar_fails_without_change() {
        let mut document = doc! { "name": "widget" };

        let result = apply_update(&mut document, &doc! { "$push": { "name": "x" } });

        assert!(matches!(result, Err(DocumentStoreError::StoreOperationFailed(_))));
        assert_eq!(document, doc! { "name": "widget" });
    }

    #[test]
    fn test_inc_missing_and_existing() {
        let mut document = doc! {};

        apply_update(&mut document, &doc! { "$inc": { "count": 1i64 } }).unwrap();
        apply_update(&mut document, &doc! { "$inc": { "count": 1i64 } }).unwrap();
        apply_update(&mut document, &doc! { "$inc": { "ratio": 0.5 } }).unwrap();
        apply_update(&mut document, &doc! { "$inc": { "ratio": 1 } }).unwrap();

        assert_eq!(document, doc! { "count": 2i64, "ratio": 1.5 });
    }

    #[test]
    fn test_inc_widens_int32_overflow() {
        let mut document = doc! { "count": i32::MAX };

        apply_update(&mut document, &doc! { "$inc": { "count": 1 } }).unwrap();

        assert_eq!(document.get("count"), Some(&Bson::Int64(i64::from(i32::MAX) + 1)));
    }

    #[test]
    fn test_inc_rejects_non_numeric() {
        let mut document = doc! { "name": "widget" };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "name": 1 } }),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "count": "x" } }),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "count": i64::MAX } })
                .and_then(|_| apply_update(&mut document, &doc! { "$inc": { "count": 1i64 } })),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
    }

    #[test]
    fn test_inc_with_decimal_is_unsupported() {
        let amount = bson::Decimal128::from_bytes([0; 16]);
        let mut document = doc! { "count": 1, "price": amount };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "count": amount } }),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "$inc": { "price": 1 } }),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
        assert_eq!(document, doc! { "count": 1, "price": amount });
    }

    #[test]
    fn test_rejects_id_and_unknown_operators() {
        let mut document = doc! { "_id": 1 };

        assert!(matches!(
            apply_update(&mut document, &doc! { "$set": { "_id": 2 } }),
            Err(DocumentStoreError::StoreOperationFailed(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "$rename": { "a": "b" } }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            apply_update(&mut document, &doc! { "color": "red" }),
            Err(DocumentStoreError::InvalidDocument(_))
        ));
    }
}
