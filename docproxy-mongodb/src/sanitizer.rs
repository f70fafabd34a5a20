//! BSON key sanitization for MongoDB compatibility.
//!
//! MongoDB interprets dots in keys as paths and dollar-prefixed keys as
//! operators. Keys of embedded documents stored as field *values* are escaped
//! on the way in and restored on the way out, so maps with arbitrary keys
//! round-trip. `%` itself is escaped, which keeps the encoding reversible. Top-level field names and operator documents are left alone.

use bson::{Bson, Document};


pub(crate) struct ValueSanitizer;

impl ValueSanitizer {
    /// Escape character and the characters it encodes, as percent-encoding.
    const ESCAPE: char = '%';
    const REPLACEMENTS: [(char, &'static str); 3] = [
        ('%', "%25"),
        ('.', "%2E"),
        ('$', "%24"),
    ];

    /// Recursively escapes the keys of embedded documents within a value.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::sanitize_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_string(input: &str) -> String {
        let mut sanitized = String::with_capacity(input.len());
        for ch in input.chars() {
            match Self::REPLACEMENTS.iter().find(|(target, _)| *target == ch) {
                Some((_, replacement)) => sanitized.push_str(replacement),
                None => sanitized.push(ch),
            }
        }
        sanitized
    }

    /// Inverse of [`sanitize_value`](Self::sanitize_value).
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(
                arr
                    .iter()
                    .map(Self::restore_value)
                    .collect(),
            ),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    /// Decodes escapes left to right. Unknown sequences are kept verbatim.
    pub(crate) fn restore_string(input: &str) -> String {
        let mut restored = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(position) = rest.find(Self::ESCAPE) {
            restored.push_str(&rest[..position]);
            rest = &rest[position..];

            match Self::REPLACEMENTS
                .iter()
                .find(|(_, replacement)| rest.starts_with(*replacement))
            {
                Some((target, replacement)) => {
                    restored.push(*target);
                    rest = &rest[replacement.len()..];
                }
                None => {
                    restored.push(Self::ESCAPE);
                    rest = &rest[Self::ESCAPE.len_utf8()..];
                }
            }
        }

        restored.push_str(rest);
        restored
    }

    /// Escapes the values of every top-level field, keeping field names as they are.
    pub(crate) fn sanitize_fields(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (k.clone(), Self::sanitize_value(v)))
            .collect()
    }

    /// Restores the values of every top-level field of a stored document.
    pub(crate) fn restore_fields(document: &Document) -> Document {
        document
            .iter()
            .map(|(k, v)| (k.clone(), Self::restore_value(v)))
            .collect()
    }

    /// Escapes the comparison values of a filter, keeping its structure intact.
    ///
    /// Logical operators (`$and`, `$or`, `$nor`) are descended into, operator
    /// documents keep their operators, and anything else is a value.
    pub(crate) fn sanitize_filter(filter: &Document) -> Document {
        filter
            .iter()
            .map(|(key, value)| {
                let value = match (key.as_str(), value) {
                    ("$and" | "$or" | "$nor", Bson::Array(clauses)) => Bson::Array(
                        clauses
                            .iter()
                            .map(|clause| match clause {
                                Bson::Document(clause) => Bson::Document(Self::sanitize_filter(clause)),
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    (_, Bson::Document(operators)) if Self::is_operator_document(operators) => {
                        Bson::Document(Self::sanitize_operators(operators))
                    }
                    _ => Self::sanitize_value(value),
                };

                (key.clone(), value)
            })
            .collect()
    }

    fn sanitize_operators(operators: &Document) -> Document {
        operators
            .iter()
            .map(|(operator, operand)| {
                let operand = match (operator.as_str(), operand) {
                    ("$not", Bson::Document(inner)) if Self::is_operator_document(inner) => {
                        Bson::Document(Self::sanitize_operators(inner))
                    }
                    _ => Self::sanitize_value(operand),
                };

                (operator.clone(), operand)
            })
            .collect()
    }

    fn is_operator_document(document: &Document) -> bool {
        !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
    }

    /// Escapes the operand values of an update, keeping operators and field names.
    pub(crate) fn sanitize_update(update: &Document) -> Document {
        update
            .iter()
            .map(|(operator, operand)| {
                let operand = match operand {
                    Bson::Document(assignments) => Bson::Document(Self::sanitize_fields(assignments)),
                    other => other.clone(),
                };

                (operator.clone(), operand)
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_embedded_keys_round_trip() {
        let value = Bson::Document(doc! { "a.b": { "$c": 1 }, "list": [{ "x.y": "v.w" }] });

        let sanitized = ValueSanitizer::sanitize_value(&value);
        assert_eq!(
            sanitized,
            Bson::Document(doc! { "a%2Eb": { "%24c": 1 }, "list": [{ "x%2Ey": "v.w" }] })
        );
        assert_eq!(ValueSanitizer::restore_value(&sanitized), value);
    }

    #[test]
    fn test_keys_resembling_escapes_round_trip() {
        let value = Bson::Document(doc! {
            "a__dot__b": 1,
            "100%": 2,
            "%2E": 3,
            "50%25.x$": { "%": "%24" },
        });

        let sanitized = ValueSanitizer::sanitize_value(&value);
        assert_eq!(
            sanitized,
            Bson::Document(doc! {
                "a__dot__b": 1,
                "100%25": 2,
                "%252E": 3,
                "50%2525%2Ex%24": { "%25": "%24" },
            })
        );
        assert_eq!(ValueSanitizer::restore_value(&sanitized), value);
    }

    #[test]
    fn test_restore_keeps_unknown_escapes() {
        assert_eq!(ValueSanitizer::restore_string("100%"), "100%");
        assert_eq!(ValueSanitizer::restore_string("%zz%2E"), "%zz.");
    }

    #[test]
    fn test_update_keeps_operators_and_field_names() {
        let update = doc! { "$set": { "meta": { "k.1": true } }, "$inc": { "count": 1 } };

        assert_eq!(
            ValueSanitizer::sanitize_update(&update),
            doc! { "$set": { "meta": { "k%2E1": true } }, "$inc": { "count": 1 } }
        );
    }

    #[test]
    fn test_filter_values_sanitized_operators_kept() {
        let filter = doc! {
            "meta": { "k.1": true },
            "count": { "$gt": 1, "$not": { "$eq": 5 } },
            "$or": [{ "opts": { "$in": [{ "a.b": 1 }] } }, { "name": { "$regex": "^w" } }],
        };

        assert_eq!(
            ValueSanitizer::sanitize_filter(&filter),
            doc! {
                "meta": { "k%2E1": true },
                "count": { "$gt": 1, "$not": { "$eq": 5 } },
                "$or": [{ "opts": { "$in": [{ "a%2Eb": 1 }] } }, { "name": { "$regex": "^w" } }],
            }
        );
    }
}
